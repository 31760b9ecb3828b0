use doorctl_traits::{CurrentDoorState, TargetDoorState};

/// One ranging result.
///
/// `raw` is present whenever a measurement succeeded, even when it is
/// implausible; `filtered` is the median-filtered value and only present for
/// plausible readings. Units are centimetres. `seq` counts published
/// measurements, so a repeated answer to the same query can be told apart
/// from a new reading of the same distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionSample {
    pub filtered: Option<u16>,
    pub raw: Option<u16>,
    pub seq: u32,
}

/// Hub-facing status derived from the last classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubMessage {
    pub current: CurrentDoorState,
    pub target: TargetDoorState,
    pub obstruction: bool,
}

/// Commands an operator issues through the diagnostics collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Persist the current calibration record.
    SaveCalibration,
    /// Derive the Open stop range from recent position samples.
    LearnOpenRange,
    /// Derive the Closed stop range from recent position samples.
    LearnClosedRange,
    /// Derive travel durations from the recorded runs.
    LearnTravelTimes,
    ClearEventLog,
}
