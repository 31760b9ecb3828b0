//! Units shipped with the controller, in the order the builder stacks them.

pub mod door_control;
pub mod event_recorder;
pub mod motor_trigger;
pub mod range_finder;

pub use door_control::DoorControlUnit;
pub use event_recorder::EventRecorderUnit;
pub use motor_trigger::MotorTriggerUnit;
pub use range_finder::RangeFinderUnit;
