//! Type-state builder for [`Controller`].
//!
//! The builder enforces at compile time that ranging pins and the motor
//! actuator are provided before `build()` is available. `try_build()` is always
//! available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use doorctl_traits::clock::{Clock, MonotonicClock};
use doorctl_traits::{EchoCell, HubLink, KeyValueStore, MotorActuator, RangingPins};

use crate::calibration::CalibrationRecord;
use crate::config::{ControlCfg, EventLogCfg, LearnCfg, RangingCfg};
use crate::dispatch::{DispatchChain, Env, MAX_UNITS, Unit};
use crate::error::{BuildError, Result};
use crate::ranging::RangeFinder;
use crate::runner::Controller;
use crate::store::MemoryStore;
use crate::units::{DoorControlUnit, EventRecorderUnit, MotorTriggerUnit, RangeFinderUnit};

/// Store key used when none is configured.
pub const DEFAULT_STORE_KEY: &str = "calib";

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct ControllerBuilder<R, A> {
    pins: Option<(Box<dyn RangingPins>, Arc<EchoCell>)>,
    actuator: Option<Box<dyn MotorActuator>>,
    hub: Option<Box<dyn HubLink>>,
    store: Option<Box<dyn KeyValueStore>>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    ranging: RangingCfg,
    control: ControlCfg,
    learn: LearnCfg,
    event_log: EventLogCfg,
    store_key: String,
    default_record: CalibrationRecord,
    extra: Vec<Box<dyn Unit>>,
    _r: PhantomData<R>,
    _a: PhantomData<A>,
}

impl Default for ControllerBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            pins: None,
            actuator: None,
            hub: None,
            store: None,
            clock: None,
            ranging: RangingCfg::default(),
            control: ControlCfg::default(),
            learn: LearnCfg::default(),
            event_log: EventLogCfg::default(),
            store_key: DEFAULT_STORE_KEY.to_owned(),
            default_record: CalibrationRecord::default(),
            extra: Vec::new(),
            _r: PhantomData,
            _a: PhantomData,
        }
    }
}

impl Controller {
    /// Start building a Controller.
    pub fn builder() -> ControllerBuilder<Missing, Missing> {
        ControllerBuilder::default()
    }
}

fn validate(
    ranging: &RangingCfg,
    control: &ControlCfg,
    learn: &LearnCfg,
    event_log: &EventLogCfg,
    default_record: &CalibrationRecord,
) -> std::result::Result<(), BuildError> {
    if ranging.stressed_hz == 0 || ranging.relaxed_hz == 0 {
        return Err(BuildError::InvalidConfig("ranging rates must be > 0"));
    }
    if ranging.us_per_cm == 0 {
        return Err(BuildError::InvalidConfig("us_per_cm must be > 0"));
    }
    if ranging.median_window == 0 {
        return Err(BuildError::InvalidConfig("median_window must be >= 1"));
    }
    if ranging.min_valid_cm > ranging.max_valid_cm {
        return Err(BuildError::InvalidConfig(
            "min_valid_cm must be <= max_valid_cm",
        ));
    }
    if control.cycle_hz == 0 {
        return Err(BuildError::InvalidConfig("cycle_hz must be > 0"));
    }
    if learn.recent_runs == 0 || learn.learn_window == 0 {
        return Err(BuildError::InvalidConfig(
            "learning windows must be >= 1",
        ));
    }
    if event_log.capacity == 0 || event_log.transition_capacity < 4 {
        return Err(BuildError::InvalidConfig(
            "event log needs capacity >= 1 and transition_capacity >= 4",
        ));
    }
    if default_record.validate().is_err() {
        return Err(BuildError::InvalidConfig(
            "default calibration markers are invalid",
        ));
    }
    Ok(())
}

impl<R, A> ControllerBuilder<R, A> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Controller> {
        let (pins, echo) = self
            .pins
            .ok_or_else(|| eyre::Report::new(BuildError::MissingRangingPins))?;
        let actuator = self
            .actuator
            .ok_or_else(|| eyre::Report::new(BuildError::MissingActuator))?;
        let hub = self
            .hub
            .ok_or_else(|| eyre::Report::new(BuildError::MissingHub))?;
        validate(
            &self.ranging,
            &self.control,
            &self.learn,
            &self.event_log,
            &self.default_record,
        )?;

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };
        let store = self
            .store
            .unwrap_or_else(|| Box::new(MemoryStore::new()) as Box<dyn KeyValueStore>);
        let mut env = Env::new(clock, hub, store);

        let mut chain = DispatchChain::with_capacity(MAX_UNITS);
        chain.add(Box::new(MotorTriggerUnit::new(
            actuator,
            self.control.trigger_pulse(),
        )))?;
        chain.add(Box::new(RangeFinderUnit::new(RangeFinder::new(
            pins,
            echo,
            self.ranging,
        ))))?;
        chain.add(Box::new(DoorControlUnit::new(
            self.control,
            self.learn,
            self.store_key,
            self.default_record,
        )))?;
        chain.add(Box::new(EventRecorderUnit::new(&self.event_log)))?;
        for unit in self.extra {
            chain.add(unit)?;
        }
        chain.setup(&mut env);

        Ok(Controller::new(chain, env))
    }
}

/// Chainable setters that do not affect type-state.
impl<R, A> ControllerBuilder<R, A> {
    pub fn with_hub(mut self, hub: impl HubLink + 'static) -> Self {
        self.hub = Some(Box::new(hub));
        self
    }
    pub fn with_store(mut self, store: impl KeyValueStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    pub fn with_ranging(mut self, ranging: RangingCfg) -> Self {
        self.ranging = ranging;
        self
    }
    pub fn with_control(mut self, control: ControlCfg) -> Self {
        self.control = control;
        self
    }
    pub fn with_learning(mut self, learn: LearnCfg) -> Self {
        self.learn = learn;
        self
    }
    pub fn with_event_log(mut self, event_log: EventLogCfg) -> Self {
        self.event_log = event_log;
        self
    }
    pub fn with_store_key(mut self, key: impl Into<String>) -> Self {
        self.store_key = key.into();
        self
    }
    /// Record used when the store holds nothing usable.
    pub fn with_default_calibration(mut self, record: CalibrationRecord) -> Self {
        self.default_record = record;
        self
    }
    /// Add a unit on top of the standard stack; it sees every call first.
    pub fn with_unit(mut self, unit: impl Unit + 'static) -> Self {
        self.extra.push(Box::new(unit));
        self
    }
}

// Setters that advance type-state
impl<A> ControllerBuilder<Missing, A> {
    pub fn with_ranging_pins(
        self,
        pins: impl RangingPins + 'static,
        echo: Arc<EchoCell>,
    ) -> ControllerBuilder<Set, A> {
        ControllerBuilder {
            pins: Some((Box::new(pins), echo)),
            actuator: self.actuator,
            hub: self.hub,
            store: self.store,
            clock: self.clock,
            ranging: self.ranging,
            control: self.control,
            learn: self.learn,
            event_log: self.event_log,
            store_key: self.store_key,
            default_record: self.default_record,
            extra: self.extra,
            _r: PhantomData,
            _a: PhantomData,
        }
    }
}

impl<R> ControllerBuilder<R, Missing> {
    pub fn with_actuator(self, actuator: impl MotorActuator + 'static) -> ControllerBuilder<R, Set> {
        ControllerBuilder {
            pins: self.pins,
            actuator: Some(Box::new(actuator)),
            hub: self.hub,
            store: self.store,
            clock: self.clock,
            ranging: self.ranging,
            control: self.control,
            learn: self.learn,
            event_log: self.event_log,
            store_key: self.store_key,
            default_record: self.default_record,
            extra: self.extra,
            _r: PhantomData,
            _a: PhantomData,
        }
    }
}

impl ControllerBuilder<Set, Set> {
    /// Validate and build. Only available once ranging pins and actuator are set.
    pub fn build(self) -> Result<Controller> {
        self.try_build()
    }
}
