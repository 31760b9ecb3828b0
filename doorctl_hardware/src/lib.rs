//! Hardware adapters for the door controller.
//!
//! `sim` runs everywhere; `gpio` (feature `hardware`) drives a Raspberry Pi.

pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
pub mod sim;
pub mod util;

pub use sim::{SimDoor, SimDoorCfg, SimMotion, SimSonar, SimTrigger};
