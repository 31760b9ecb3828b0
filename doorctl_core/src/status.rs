//! Door and motor state enums shared by every unit.

/// Door classification, re-derived every control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DoorState {
    #[default]
    Unknown,
    Open,
    Closed,
    MovingOrStopped,
    Stalled,
    Failed,
}

impl DoorState {
    /// Stable numeric code used in the event log dump.
    pub const fn code(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Open => 1,
            Self::Closed => 2,
            Self::MovingOrStopped => 3,
            Self::Stalled => 4,
            Self::Failed => 5,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Unknown,
            1 => Self::Open,
            2 => Self::Closed,
            3 => Self::MovingOrStopped,
            4 => Self::Stalled,
            5 => Self::Failed,
            _ => return None,
        })
    }

    /// True for the two calibrated end positions.
    pub const fn is_stop(self) -> bool {
        matches!(self, Self::Open | Self::Closed)
    }
}

/// What the controller believes the opener's motor is doing.
///
/// There is no motor feedback; this is a model kept in step with the trigger
/// pulses and the observed door movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotorState {
    #[default]
    Unknown,
    Stopped,
    Opening,
    Closing,
}

impl MotorState {
    pub const fn code(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Stopped => 1,
            Self::Opening => 2,
            Self::Closing => 3,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Unknown,
            1 => Self::Stopped,
            2 => Self::Opening,
            3 => Self::Closing,
            _ => return None,
        })
    }

    pub const fn is_moving(self) -> bool {
        matches!(self, Self::Opening | Self::Closing)
    }

    /// Reverse travel direction; `None` for non-moving states.
    pub const fn reversed(self) -> Option<Self> {
        match self {
            Self::Opening => Some(Self::Closing),
            Self::Closing => Some(Self::Opening),
            _ => None,
        }
    }
}

/// Motor model plus the direction of the last run, which survives `Stopped`
/// so an ambiguous re-trigger can be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotorInfo {
    pub state: MotorState,
    pub last_direction: MotorState,
}
