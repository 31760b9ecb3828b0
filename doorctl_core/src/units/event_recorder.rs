use std::cell::RefCell;
use std::rc::Rc;

use crate::config::EventLogCfg;
use crate::dispatch::{Link, Request, SharedEventLog, Unit};
use crate::event_log::{EventCode, EventLog};
use crate::fixed_point::ms_to_tick_cs;
use crate::status::{DoorState, MotorInfo};
use crate::types::{OperatorCommand, PositionSample};

/// How long a trigger stays the start time of the next motor run.
const TRIGGER_PENDING_MS: u64 = 10_000;

/// Watches the chain and records positions and transitions into the event log.
///
/// Sits on top of the chain so every sensor query, motor write and door-state
/// write passes through it; it forwards each one unchanged.
///
/// Each measurement is logged once, however often it is queried. A motor run
/// that follows a trigger from standstill is stamped with the trigger time,
/// since the motor started when the button was pressed and not when the door
/// was first seen between the stop ranges.
pub struct EventRecorderUnit {
    log: SharedEventLog,
    last_seq: Option<u32>,
    motor_moving: bool,
    trigger_ms: Option<u64>,
}

impl EventRecorderUnit {
    pub fn new(cfg: &EventLogCfg) -> Self {
        Self {
            log: Rc::new(RefCell::new(EventLog::new(cfg))),
            last_seq: None,
            motor_moving: false,
            trigger_ms: None,
        }
    }

    pub fn log(&self) -> SharedEventLog {
        Rc::clone(&self.log)
    }
}

fn now_cs(link: &Link<'_>) -> u16 {
    ms_to_tick_cs(link.now_ms())
}

impl Unit for EventRecorderUnit {
    fn name(&self) -> &'static str {
        "event_recorder"
    }

    fn query_sensor_data(&mut self, req: &mut Request<PositionSample>, link: &mut Link<'_>) {
        link.below().query_sensor_data(req);
        if !req.handled || self.last_seq == Some(req.value.seq) {
            return;
        }
        self.last_seq = Some(req.value.seq);
        let now = now_cs(link);
        let mut log = self.log.borrow_mut();
        match (req.value.filtered, req.value.raw) {
            (Some(pos), _) => log.add_position(now, pos, false),
            (None, Some(raw)) => log.add_position(now, raw, true),
            (None, None) => {}
        }
    }

    fn write_door_state(&mut self, req: &mut Request<DoorState>, link: &mut Link<'_>) {
        let now = now_cs(link);
        self.log
            .borrow_mut()
            .add_event(now, EventCode::Door(req.value));
        link.below().write_door_state(req);
    }

    fn write_motor_info(&mut self, req: &mut Request<MotorInfo>, link: &mut Link<'_>) {
        let now = link.now_ms();
        let moving = req.value.state.is_moving();
        let started = self
            .trigger_ms
            .take()
            .filter(|&t| moving && now.saturating_sub(t) <= TRIGGER_PENDING_MS)
            .unwrap_or(now);
        self.motor_moving = moving;
        self.log
            .borrow_mut()
            .add_event(ms_to_tick_cs(started), EventCode::Motor(req.value.state));
        link.below().write_motor_info(req);
    }

    fn on_triggered(&mut self, req: &mut Request<()>, link: &mut Link<'_>) {
        // a press while moving stops or reverses a run already logged
        if !self.motor_moving {
            self.trigger_ms = Some(link.now_ms());
        }
        link.below().on_triggered(req);
    }

    fn query_event_log(&mut self, req: &mut Request<Option<SharedEventLog>>, _link: &mut Link<'_>) {
        req.answer(Some(Rc::clone(&self.log)));
    }

    fn on_command(&mut self, req: &mut Request<OperatorCommand>, _link: &mut Link<'_>) {
        if req.value == OperatorCommand::ClearEventLog {
            self.log.borrow_mut().clear();
            tracing::info!("event log cleared");
            req.claim();
        }
    }
}
