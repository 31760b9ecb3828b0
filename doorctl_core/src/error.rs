use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum DoorError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for echo")]
    Timeout,
    #[error("invalid state: {0}")]
    State(String),
    #[error("calibration error: {0}")]
    Calibration(#[from] MarkerError),
    #[error("io error: {0}")]
    Io(String),
}

/// Why a position-marker update was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarkerError {
    #[error("open range {open} overlaps closed range {closed}")]
    Overlap { open: String, closed: String },
    #[error("{which} range is disabled or inverted ({min}..={max})")]
    Inverted {
        which: &'static str,
        min: u16,
        max: u16,
    },
    #[error("malformed position markers: {0}")]
    Parse(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing ranging pins")]
    MissingRangingPins,
    #[error("missing motor actuator")]
    MissingActuator,
    #[error("missing hub link")]
    MissingHub,
    #[error("dispatch chain is full ({0} units)")]
    ChainFull(usize),
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
