//! Hardware and collaborator seams for the door controller.
//!
//! Everything the control core touches outside its own memory goes through a
//! trait defined here: the ultrasonic ranging pins, the opener's trigger relay,
//! the key/value store holding the calibration record, and the home-automation
//! hub. Errors cross these boundaries boxed; `doorctl_core` maps them to typed
//! errors.

pub mod clock;
pub mod echo;
pub mod hub;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use echo::EchoCell;
pub use hub::{CurrentDoorState, HubLink, TargetDoorState};

/// Trigger/echo pins of a pulse-echo distance sensor.
///
/// The echo edge itself is not read through this trait: the interrupt handler
/// writes its timestamp into an [`EchoCell`].
pub trait RangingPins {
    fn set_trigger(&mut self, high: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Mask (`false`) or unmask (`true`) the echo interrupt.
    fn set_echo_interrupt(&mut self, enabled: bool);

    /// Busy-wait for a few microseconds (trigger pulse width).
    fn delay_us(&mut self, us: u32);

    /// Free-running microsecond counter on the same timebase the echo
    /// interrupt stamps with. Wraps.
    fn micros(&self) -> u32;
}

/// The opener's push-button input, driven by a relay or transistor.
pub trait MotorActuator {
    /// Hold the trigger high for `width`, then release it.
    fn pulse(
        &mut self,
        width: std::time::Duration,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Small persistent key/value store (flash page, file, ...).
pub trait KeyValueStore {
    fn load(&mut self, key: &str) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error + Send + Sync>>;
    fn save(
        &mut self,
        key: &str,
        bytes: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: RangingPins + ?Sized> RangingPins for Box<T> {
    fn set_trigger(&mut self, high: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_trigger(high)
    }

    fn set_echo_interrupt(&mut self, enabled: bool) {
        (**self).set_echo_interrupt(enabled);
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us);
    }

    fn micros(&self) -> u32 {
        (**self).micros()
    }
}

impl<T: MotorActuator + ?Sized> MotorActuator for Box<T> {
    fn pulse(
        &mut self,
        width: std::time::Duration,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).pulse(width)
    }
}
