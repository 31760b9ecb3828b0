//! Values pushed to the home-automation hub.

/// Door position as the hub understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentDoorState {
    Open,
    Closed,
    Opening,
    Closing,
    Stopped,
}

/// What the hub (or a human through it) wants the door to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetDoorState {
    Open,
    Closed,
}

/// Outbound half of the hub connection.
///
/// Callers only push values that changed; an unconditional push could clobber
/// a target the hub set on its own.
pub trait HubLink {
    fn set_target_state(&mut self, state: TargetDoorState);
    fn set_current_state(&mut self, state: CurrentDoorState);
    fn set_obstruction_detected(&mut self, obstructed: bool);
}
