use thiserror::Error;

/// Failures of the sensor and relay adapters.
#[derive(Debug, Error)]
pub enum HwError {
    /// Pin could not be claimed or driven.
    #[error("gpio error: {0}")]
    Gpio(String),
    /// The falling echo edge never arrived (nothing in range, or a wiring fault).
    #[error("echo timeout")]
    EchoTimeout,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
