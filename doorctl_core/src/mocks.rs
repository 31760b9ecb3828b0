//! Test and helper mocks for doorctl_core

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use doorctl_traits::{
    CurrentDoorState, EchoCell, HubLink, ManualClock, MotorActuator, RangingPins,
    TargetDoorState,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One value pushed to the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubPush {
    Target(TargetDoorState),
    Current(CurrentDoorState),
    Obstruction(bool),
}

/// Hub that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHub;

impl HubLink for NullHub {
    fn set_target_state(&mut self, _state: TargetDoorState) {}
    fn set_current_state(&mut self, _state: CurrentDoorState) {}
    fn set_obstruction_detected(&mut self, _obstructed: bool) {}
}

/// Hub that records every push. Clones share the record.
#[derive(Debug, Default, Clone)]
pub struct RecordingHub {
    pushes: Arc<Mutex<Vec<HubPush>>>,
}

impl RecordingHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pushes(&self) -> Vec<HubPush> {
        self.pushes.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn currents(&self) -> Vec<CurrentDoorState> {
        self.pushes()
            .into_iter()
            .filter_map(|p| match p {
                HubPush::Current(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn targets(&self) -> Vec<TargetDoorState> {
        self.pushes()
            .into_iter()
            .filter_map(|p| match p {
                HubPush::Target(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn obstructions(&self) -> Vec<bool> {
        self.pushes()
            .into_iter()
            .filter_map(|p| match p {
                HubPush::Obstruction(o) => Some(o),
                _ => None,
            })
            .collect()
    }

    fn push(&self, p: HubPush) {
        if let Ok(mut v) = self.pushes.lock() {
            v.push(p);
        }
    }
}

impl HubLink for RecordingHub {
    fn set_target_state(&mut self, state: TargetDoorState) {
        self.push(HubPush::Target(state));
    }
    fn set_current_state(&mut self, state: CurrentDoorState) {
        self.push(HubPush::Current(state));
    }
    fn set_obstruction_detected(&mut self, obstructed: bool) {
        self.push(HubPush::Obstruction(obstructed));
    }
}

/// Actuator that counts pulses; can be told to fail.
#[derive(Debug, Default, Clone)]
pub struct RecordingActuator {
    pulses: Arc<AtomicU32>,
    fail: Arc<AtomicBool>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pulses(&self) -> u32 {
        self.pulses.load(Ordering::Relaxed)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }
}

impl MotorActuator for RecordingActuator {
    fn pulse(&mut self, _width: Duration) -> Result<(), BoxError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(Box::new(std::io::Error::other("relay stuck")));
        }
        self.pulses.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Ranging pins that answer every pulse with an echo for a settable distance.
///
/// The echo is stamped when the trigger falls, provided the echo interrupt is
/// unmasked. A distance of 0 produces no echo. Time comes from a shared
/// [`ManualClock`].
#[derive(Debug, Clone)]
pub struct FixedRangePins {
    clock: ManualClock,
    echo: Arc<EchoCell>,
    distance_cm: Arc<AtomicU16>,
    us_per_cm: u32,
    irq_enabled: bool,
    trigger_high: bool,
}

impl FixedRangePins {
    pub fn new(clock: ManualClock, echo: Arc<EchoCell>, us_per_cm: u32) -> Self {
        Self {
            clock,
            echo,
            distance_cm: Arc::new(AtomicU16::new(0)),
            us_per_cm,
            irq_enabled: false,
            trigger_high: false,
        }
    }

    /// Shared handle to the simulated distance.
    pub fn distance_handle(&self) -> Arc<AtomicU16> {
        Arc::clone(&self.distance_cm)
    }

    pub fn set_distance(&self, cm: u16) {
        self.distance_cm.store(cm, Ordering::Relaxed);
    }
}

impl RangingPins for FixedRangePins {
    fn set_trigger(&mut self, high: bool) -> Result<(), BoxError> {
        let falling = self.trigger_high && !high;
        self.trigger_high = high;
        let cm = self.distance_cm.load(Ordering::Relaxed);
        if falling && self.irq_enabled && cm != 0 {
            let round_trip = u32::from(cm) * self.us_per_cm;
            self.echo.record(self.micros().wrapping_add(round_trip));
        }
        Ok(())
    }

    fn set_echo_interrupt(&mut self, enabled: bool) {
        self.irq_enabled = enabled;
    }

    fn delay_us(&mut self, _us: u32) {}

    fn micros(&self) -> u32 {
        self.clock.elapsed().as_micros() as u32
    }
}
