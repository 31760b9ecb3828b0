//! Chain-of-responsibility dispatch over pluggable units.
//!
//! Units are stored in insertion order and called **last-added-first**. Every
//! call carries a [`Request`]: the value being built plus a `handled` flag;
//! the chain stops at the first unit that claims it. A unit reaches the rest of
//! the chain through the [`Link`] it is handed:
//!
//! - [`Link::below`] forwards the same kind of call to the units added before
//!   it (a super-call),
//! - [`Link::top`] re-issues a call to the whole chain as an external caller
//!   would.
//!
//! While a unit runs its slot is vacated, so any call that reaches back into
//! the chain skips it. That makes super-calls one-shot per top-level call and
//! rules out recursion without per-unit guard flags.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use doorctl_traits::{Clock, HubLink, KeyValueStore, TargetDoorState};

use crate::calibration::CalibrationRecord;
use crate::error::BuildError;
use crate::event_log::EventLog;
use crate::scheduler::{Scheduler, TimerId};
use crate::status::{DoorState, MotorInfo};
use crate::types::{HubMessage, OperatorCommand, PositionSample};

/// Upper bound on chain length.
pub const MAX_UNITS: usize = 8;

pub type SharedEventLog = Rc<RefCell<EventLog>>;

/// A value travelling through the chain plus its claim flag.
#[derive(Debug, Clone, Default)]
pub struct Request<T> {
    pub value: T,
    pub handled: bool,
}

impl<T> Request<T> {
    pub const fn new(value: T) -> Self {
        Self {
            value,
            handled: false,
        }
    }

    pub fn claim(&mut self) {
        self.handled = true;
    }

    /// Set the value and claim.
    pub fn answer(&mut self, value: T) {
        self.value = value;
        self.handled = true;
    }

    /// The value if someone claimed it. Unclaimed means unavailable.
    pub fn into_option(self) -> Option<T> {
        self.handled.then_some(self.value)
    }
}

/// Collaborators shared by every unit: time, timers, hub and storage.
pub struct Env {
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    pub scheduler: Scheduler,
    pub hub: Box<dyn HubLink>,
    pub store: Box<dyn KeyValueStore>,
}

impl Env {
    pub fn new(
        clock: Arc<dyn Clock + Send + Sync>,
        hub: Box<dyn HubLink>,
        store: Box<dyn KeyValueStore>,
    ) -> Self {
        let epoch = clock.now();
        Self {
            clock,
            epoch,
            scheduler: Scheduler::new(),
            hub,
            store,
        }
    }

    /// Milliseconds since the controller was built.
    pub fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }
}

/// Handed to [`Unit::setup`]; timers registered here fire [`Unit::on_timer`].
pub struct SetupContext<'a> {
    scheduler: &'a mut Scheduler,
    owner: usize,
    now_ms: u64,
}

impl SetupContext<'_> {
    pub fn every(&mut self, period_ms: u64) -> TimerId {
        self.scheduler.every(self.owner, period_ms, self.now_ms)
    }

    /// Position of the unit in the chain (0 = added first).
    pub const fn slot(&self) -> usize {
        self.owner
    }
}

/// A behaviour module participating in the chain.
///
/// Every operation defaults to ignoring the call.
#[allow(unused_variables)]
pub trait Unit {
    fn name(&self) -> &'static str;

    fn setup(&mut self, ctx: &mut SetupContext<'_>) {}
    fn start(&mut self, link: &mut Link<'_>) {}
    fn on_timer(&mut self, timer: TimerId, link: &mut Link<'_>) {}

    fn query_sensor_data(&mut self, req: &mut Request<PositionSample>, link: &mut Link<'_>) {}
    fn query_door_state(&mut self, req: &mut Request<DoorState>, link: &mut Link<'_>) {}
    fn write_door_state(&mut self, req: &mut Request<DoorState>, link: &mut Link<'_>) {}
    fn read_motor_info(&mut self, req: &mut Request<MotorInfo>, link: &mut Link<'_>) {}
    fn write_motor_info(&mut self, req: &mut Request<MotorInfo>, link: &mut Link<'_>) {}
    fn query_next_message(&mut self, req: &mut Request<Option<HubMessage>>, link: &mut Link<'_>) {}
    fn on_target_state_changed(&mut self, req: &mut Request<TargetDoorState>, link: &mut Link<'_>) {}
    fn on_triggered(&mut self, req: &mut Request<()>, link: &mut Link<'_>) {}
    fn read_calibration(&mut self, req: &mut Request<CalibrationRecord>, link: &mut Link<'_>) {}
    fn write_calibration(&mut self, req: &mut Request<CalibrationRecord>, link: &mut Link<'_>) {}
    fn query_event_log(&mut self, req: &mut Request<Option<SharedEventLog>>, link: &mut Link<'_>) {}
    fn on_command(&mut self, req: &mut Request<OperatorCommand>, link: &mut Link<'_>) {}
}

type Slot = Option<Box<dyn Unit>>;

/// A unit's view of the chain during one call.
pub struct Link<'a> {
    slots: &'a mut [Slot],
    index: usize,
    env: &'a mut Env,
}

impl Link<'_> {
    pub fn env(&mut self) -> &mut Env {
        &mut *self.env
    }

    pub fn now_ms(&self) -> u64 {
        self.env.now_ms()
    }

    /// Units added before this one.
    pub fn below(&mut self) -> Route<'_> {
        Route {
            slots: &mut *self.slots,
            end: self.index,
            env: &mut *self.env,
        }
    }

    /// The whole chain (this unit excluded while it is running).
    pub fn top(&mut self) -> Route<'_> {
        let end = self.slots.len();
        Route {
            slots: &mut *self.slots,
            end,
            env: &mut *self.env,
        }
    }

    pub fn set_period(&mut self, timer: TimerId, period_ms: u64) {
        let now = self.env.now_ms();
        self.env.scheduler.set_period(timer, period_ms, now);
    }

    pub fn fire_now(&mut self, timer: TimerId) {
        let now = self.env.now_ms();
        self.env.scheduler.fire_now(timer, now);
    }
}

/// Entry point for a call into (part of) the chain.
pub struct Route<'r> {
    slots: &'r mut [Slot],
    end: usize,
    env: &'r mut Env,
}

macro_rules! route_ops {
    ($($op:ident: $t:ty;)*) => {
        $(
            pub fn $op(&mut self, req: &mut Request<$t>) {
                self.dispatch(req, |u, r, l| u.$op(r, l));
            }
        )*
    };
}

impl Route<'_> {
    fn dispatch<T>(
        &mut self,
        req: &mut Request<T>,
        mut call: impl FnMut(&mut dyn Unit, &mut Request<T>, &mut Link<'_>),
    ) {
        for i in (0..self.end).rev() {
            if req.handled {
                break;
            }
            // Vacant while the unit is already on the call stack.
            let Some(mut unit) = self.slots[i].take() else {
                continue;
            };
            let mut link = Link {
                slots: &mut *self.slots,
                index: i,
                env: &mut *self.env,
            };
            call(unit.as_mut(), req, &mut link);
            self.slots[i] = Some(unit);
        }
    }

    route_ops! {
        query_sensor_data: PositionSample;
        query_door_state: DoorState;
        write_door_state: DoorState;
        read_motor_info: MotorInfo;
        write_motor_info: MotorInfo;
        query_next_message: Option<HubMessage>;
        on_target_state_changed: TargetDoorState;
        on_triggered: ();
        read_calibration: CalibrationRecord;
        write_calibration: CalibrationRecord;
        query_event_log: Option<SharedEventLog>;
        on_command: OperatorCommand;
    }

    pub fn sensor_data(&mut self) -> Option<PositionSample> {
        let mut req = Request::new(PositionSample::default());
        self.query_sensor_data(&mut req);
        req.into_option()
    }

    pub fn motor_info(&mut self) -> Option<MotorInfo> {
        let mut req = Request::new(MotorInfo::default());
        self.read_motor_info(&mut req);
        req.into_option()
    }

    pub fn door_state(&mut self) -> Option<DoorState> {
        let mut req = Request::new(DoorState::Unknown);
        self.query_door_state(&mut req);
        req.into_option()
    }

    pub fn calibration(&mut self) -> Option<CalibrationRecord> {
        let mut req = Request::new(CalibrationRecord::default());
        self.read_calibration(&mut req);
        req.into_option()
    }

    pub fn event_log(&mut self) -> Option<SharedEventLog> {
        let mut req = Request::new(None);
        self.query_event_log(&mut req);
        req.into_option().flatten()
    }
}

/// Ordered, fixed-capacity collection of units.
pub struct DispatchChain {
    slots: Vec<Slot>,
    capacity: usize,
}

impl Default for DispatchChain {
    fn default() -> Self {
        Self::with_capacity(MAX_UNITS)
    }
}

impl DispatchChain {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a unit; it will be asked before every unit already present.
    pub fn add(&mut self, unit: Box<dyn Unit>) -> Result<usize, BuildError> {
        if self.slots.len() >= self.capacity {
            return Err(BuildError::ChainFull(self.capacity));
        }
        self.slots.push(Some(unit));
        Ok(self.slots.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Unit names, first added first.
    pub fn names(&self) -> Vec<&'static str> {
        self.slots.iter().flatten().map(|u| u.name()).collect()
    }

    pub fn setup(&mut self, env: &mut Env) {
        let now_ms = env.now_ms();
        for (owner, slot) in self.slots.iter_mut().enumerate() {
            if let Some(unit) = slot {
                let mut ctx = SetupContext {
                    scheduler: &mut env.scheduler,
                    owner,
                    now_ms,
                };
                unit.setup(&mut ctx);
            }
        }
    }

    /// Start every unit, first added first.
    pub fn start(&mut self, env: &mut Env) {
        for i in 0..self.slots.len() {
            self.with_unit(i, env, |u, l| u.start(l));
        }
    }

    pub fn fire_timer(&mut self, owner: usize, timer: TimerId, env: &mut Env) {
        self.with_unit(owner, env, |u, l| u.on_timer(timer, l));
    }

    /// Call into the whole chain from outside.
    pub fn route<'r>(&'r mut self, env: &'r mut Env) -> Route<'r> {
        let end = self.slots.len();
        Route {
            slots: self.slots.as_mut_slice(),
            end,
            env,
        }
    }

    fn with_unit(&mut self, i: usize, env: &mut Env, f: impl FnOnce(&mut dyn Unit, &mut Link<'_>)) {
        let Some(mut unit) = self.slots.get_mut(i).and_then(Option::take) else {
            return;
        };
        let mut link = Link {
            slots: self.slots.as_mut_slice(),
            index: i,
            env,
        };
        f(unit.as_mut(), &mut link);
        self.slots[i] = Some(unit);
    }
}
