use std::time::Duration;

use doorctl_traits::MotorActuator;

use crate::dispatch::{Link, Request, Unit};
use crate::hw_error::map_hw_error;

/// Turns `on_triggered` into a physical pulse on the opener's button input.
pub struct MotorTriggerUnit<A: MotorActuator> {
    actuator: A,
    pulse: Duration,
    pulses: u32,
}

impl<A: MotorActuator> MotorTriggerUnit<A> {
    pub fn new(actuator: A, pulse: Duration) -> Self {
        Self {
            actuator,
            pulse,
            pulses: 0,
        }
    }

    /// Pulses issued successfully.
    pub const fn pulses(&self) -> u32 {
        self.pulses
    }
}

impl<A: MotorActuator> Unit for MotorTriggerUnit<A> {
    fn name(&self) -> &'static str {
        "motor_trigger"
    }

    fn on_triggered(&mut self, req: &mut Request<()>, _link: &mut Link<'_>) {
        match self.actuator.pulse(self.pulse) {
            Ok(()) => {
                self.pulses = self.pulses.saturating_add(1);
                tracing::info!(pulse_ms = self.pulse.as_millis() as u64, "motor triggered");
            }
            Err(e) => {
                tracing::error!(error = %map_hw_error(e.as_ref()), "motor trigger failed");
            }
        }
        req.claim();
    }
}
