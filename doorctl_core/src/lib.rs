#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core door-control logic (hardware-agnostic).
//!
//! A motorized door is controlled with nothing but a noisy distance sensor and
//! a single trigger input on the opener. All hardware interactions go through
//! the `doorctl_traits` seams (`RangingPins`, `MotorActuator`, `HubLink`,
//! `KeyValueStore`).
//!
//! ## Architecture
//!
//! - **Dispatch** (`dispatch`): chain of units, called last-added-first, with
//!   super-calls (`Link::below`) and re-issued calls (`Link::top`)
//! - **Units** (`units`): motor trigger, range finder, door control, event recorder
//! - **Ranging** (`ranging`): interrupt-driven pulse/echo state machine + median filter
//! - **Event log** (`event_log`) and **learning** (`learning`): stop ranges from
//!   position spread, travel times from transition patterns
//! - **Calibration** (`calibration`): persisted position markers and travel times
//! - **Runner** (`runner`): cooperative loop over the `scheduler` timers
//!
//! ## Units of measure
//!
//! Positions are `u16` centimetres (0 = none). Durations in the event log and
//! calibration record are `u16` centiseconds.

pub mod bounded;
pub mod builder;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod dispatch;
pub mod error;
pub mod event_log;
pub mod fixed_point;
pub mod hw_error;
pub mod learning;
pub mod mocks;
pub mod ranging;
pub mod runner;
pub mod scheduler;
pub mod status;
pub mod store;
pub mod types;
pub mod units;

pub use builder::ControllerBuilder;
pub use calibration::{CalibrationRecord, PositionRange, TravelInfo};
pub use config::{ControlCfg, EventLogCfg, LearnCfg, RangingCfg};
pub use dispatch::{DispatchChain, Env, Link, Request, Route, SetupContext, SharedEventLog, Unit};
pub use error::{BuildError, DoorError, MarkerError};
pub use event_log::{EventCode, EventEntry, EventLog, PositionStats};
pub use runner::{Controller, HubCommand};
pub use status::{DoorState, MotorInfo, MotorState};
pub use store::{FileStore, MemoryStore};
pub use types::{HubMessage, OperatorCommand, PositionSample};
