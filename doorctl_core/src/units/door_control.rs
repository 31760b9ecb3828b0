//! Door state machine: classifies positions, drives the motor model, reports
//! to the hub and owns the calibration record.
//!
//! One decision cycle (on the unit's own timer):
//!
//! 1. ask the chain for the latest sensor sample (skip the cycle if nobody answers),
//! 2. classify the filtered position against the stop ranges,
//! 3. update the motor from (motor state, classification),
//! 4. publish a changed classification through `write_door_state`,
//! 5. push changed hub values.
//!
//! Motor writes in step 3 precede the door-state write in step 4, so the event
//! log sees `MotorStopped` before `DoorOpen`/`DoorClosed`; travel-time learning
//! relies on that order.

use doorctl_traits::{CurrentDoorState, TargetDoorState};

use crate::calibration::CalibrationRecord;
use crate::config::{ControlCfg, LearnCfg};
use crate::dispatch::{Link, Request, SetupContext, Unit};
use crate::learning::{learn_travel_info, try_get_stop_position_range};
use crate::scheduler::{TimerId, hz_to_period_ms};
use crate::status::{DoorState, MotorInfo, MotorState};
use crate::types::{HubMessage, OperatorCommand};

/// Values last pushed to the hub; `None` until first pushed.
#[derive(Debug, Default, Clone, Copy)]
struct Pushed {
    current: Option<CurrentDoorState>,
    target: Option<TargetDoorState>,
    obstruction: Option<bool>,
}

pub struct DoorControlUnit {
    cfg: ControlCfg,
    learn: LearnCfg,
    store_key: String,
    default_record: CalibrationRecord,
    calibration: CalibrationRecord,
    state: DoorState,
    last_stop: Option<DoorState>,
    cooldown: u8,
    motor: MotorInfo,
    /// Last time the door was seen at a stop range or the travel countdown was reset.
    marker_ms: u64,
    wrong_dir_cycles: u32,
    /// A trigger has been seen since boot.
    triggered: bool,
    target: Option<TargetDoorState>,
    pushed: Pushed,
    timer: Option<TimerId>,
}

impl DoorControlUnit {
    pub fn new(
        cfg: ControlCfg,
        learn: LearnCfg,
        store_key: impl Into<String>,
        default_record: CalibrationRecord,
    ) -> Self {
        Self {
            cfg,
            learn,
            store_key: store_key.into(),
            default_record,
            calibration: default_record,
            state: DoorState::Unknown,
            last_stop: None,
            cooldown: 0,
            motor: MotorInfo::default(),
            marker_ms: 0,
            wrong_dir_cycles: 0,
            triggered: false,
            target: None,
            pushed: Pushed::default(),
            timer: None,
        }
    }

    pub const fn state(&self) -> DoorState {
        self.state
    }

    pub const fn motor(&self) -> MotorInfo {
        self.motor
    }

    pub const fn calibration(&self) -> &CalibrationRecord {
        &self.calibration
    }

    fn cycle(&mut self, link: &mut Link<'_>) {
        let Some(sample) = link.top().sensor_data() else {
            tracing::warn!("no sensor data, skipping control cycle");
            return;
        };
        let now = link.now_ms();
        let next = self.classify(sample.filtered, now);
        self.drive_motor(next, link);
        if next != self.state {
            match next {
                DoorState::Failed => {
                    tracing::warn!(position = ?sample.filtered, markers = %self.calibration, "position outside known ranges");
                }
                DoorState::Stalled => {
                    tracing::error!(since_marker_ms = now.saturating_sub(self.marker_ms), "door stalled");
                }
                _ => tracing::info!(from = ?self.state, to = ?next, "door state"),
            }
            self.state = next;
            let mut req = Request::new(next);
            link.top().write_door_state(&mut req);
        }
        self.report(link);
    }

    /// Classify one filtered position. Updates cooldown, marker time and last stop.
    fn classify(&mut self, filtered: Option<u16>, now: u64) -> DoorState {
        let Some(pos) = filtered else {
            return self.state;
        };
        if self.cooldown > 0 {
            self.cooldown -= 1;
            if self.state.is_stop() {
                self.marker_ms = now;
            }
            return self.state;
        }
        let cal = &self.calibration;
        let next = if cal.open.contains(pos) {
            DoorState::Open
        } else if cal.closed.contains(pos) {
            DoorState::Closed
        } else if cal.is_between(pos) {
            DoorState::MovingOrStopped
        } else {
            DoorState::Failed
        };
        match next {
            DoorState::Open | DoorState::Closed => {
                self.marker_ms = now;
                self.last_stop = Some(next);
                if next != self.state {
                    self.cooldown = self.cfg.cooldown_cycles;
                }
                next
            }
            DoorState::MovingOrStopped
                if self.calibration.travel.total_known()
                    && now.saturating_sub(self.marker_ms)
                        > u64::from(self.calibration.travel.total_cs) * 10 =>
            {
                DoorState::Stalled
            }
            other => other,
        }
    }

    fn drive_motor(&mut self, next: DoorState, link: &mut Link<'_>) {
        match (self.motor.state, next) {
            (MotorState::Opening, DoorState::Open) | (MotorState::Closing, DoorState::Closed) => {
                self.wrong_dir_cycles = 0;
                self.set_motor(MotorState::Stopped, link);
            }
            (MotorState::Opening, DoorState::Closed) | (MotorState::Closing, DoorState::Open) => {
                self.wrong_dir_cycles += 1;
                if self.wrong_dir_cycles >= self.cfg.wrong_direction_cycles() {
                    tracing::warn!(
                        motor = ?self.motor.state,
                        door = ?next,
                        cycles = self.wrong_dir_cycles,
                        "door never left its stop range, stopping motor"
                    );
                    self.wrong_dir_cycles = 0;
                    self.set_motor(MotorState::Stopped, link);
                }
            }
            (MotorState::Opening | MotorState::Closing, DoorState::Stalled) => {
                tracing::error!(motor = ?self.motor.state, "force-stopping stalled motor");
                self.wrong_dir_cycles = 0;
                self.set_motor(MotorState::Stopped, link);
            }
            (MotorState::Stopped | MotorState::Unknown, DoorState::MovingOrStopped) => {
                self.wrong_dir_cycles = 0;
                let Some(dir) = self.toggle_direction() else {
                    tracing::debug!("door between ranges with no travel history");
                    return;
                };
                tracing::info!(direction = ?dir, "door moving without command");
                self.set_motor(dir, link);
            }
            _ => self.wrong_dir_cycles = 0,
        }
    }

    /// Opposite of the last travel direction; inferred from the last stop
    /// range when no direction is known yet.
    ///
    /// `None` for a door parked between the ranges since boot: nothing says
    /// it is moving at all until a trigger is seen.
    fn toggle_direction(&self) -> Option<MotorState> {
        if let Some(dir) = self.motor.last_direction.reversed() {
            return Some(dir);
        }
        match self.last_stop {
            Some(DoorState::Open) => Some(MotorState::Closing),
            Some(_) => Some(MotorState::Opening),
            None if self.triggered => Some(MotorState::Opening),
            None => None,
        }
    }

    fn set_motor(&mut self, state: MotorState, link: &mut Link<'_>) {
        if state.is_moving() {
            self.motor.last_direction = state;
        }
        if self.motor.state == state {
            return;
        }
        tracing::info!(from = ?self.motor.state, to = ?state, "motor");
        self.motor.state = state;
        let mut req = Request::new(self.motor);
        link.top().write_motor_info(&mut req);
    }

    pub fn next_message(&self) -> HubMessage {
        let current = match self.state {
            DoorState::Open => CurrentDoorState::Open,
            DoorState::Closed => CurrentDoorState::Closed,
            DoorState::MovingOrStopped => match self.motor.state {
                MotorState::Opening => CurrentDoorState::Opening,
                MotorState::Closing => CurrentDoorState::Closing,
                _ => CurrentDoorState::Stopped,
            },
            DoorState::Stalled | DoorState::Failed | DoorState::Unknown => {
                CurrentDoorState::Stopped
            }
        };
        let target = match (self.motor.state, self.state) {
            (MotorState::Opening, _) | (_, DoorState::Open) => TargetDoorState::Open,
            (MotorState::Closing, _) | (_, DoorState::Closed) => TargetDoorState::Closed,
            _ => self.target.unwrap_or(TargetDoorState::Closed),
        };
        HubMessage {
            current,
            target,
            obstruction: self.state == DoorState::Stalled,
        }
    }

    /// Push hub values that differ from what was pushed last.
    fn report(&mut self, link: &mut Link<'_>) {
        let mut req = Request::new(None);
        link.top().query_next_message(&mut req);
        let msg = req
            .into_option()
            .flatten()
            .unwrap_or_else(|| self.next_message());
        let hub = &mut link.env().hub;
        if self.pushed.current != Some(msg.current) {
            hub.set_current_state(msg.current);
            self.pushed.current = Some(msg.current);
        }
        if self.pushed.target != Some(msg.target) {
            hub.set_target_state(msg.target);
            self.pushed.target = Some(msg.target);
        }
        if self.pushed.obstruction != Some(msg.obstruction) {
            hub.set_obstruction_detected(msg.obstruction);
            self.pushed.obstruction = Some(msg.obstruction);
        }
    }

    fn learn_range(&mut self, open_side: bool, link: &mut Link<'_>) {
        let Some(log) = link.top().event_log() else {
            tracing::warn!("no event log to learn from");
            return;
        };
        let stats = log.borrow().recent_position_std_dev(self.learn.learn_window);
        let Some(stats) = stats else {
            tracing::warn!("no positions logged yet");
            return;
        };
        let Some(range) = try_get_stop_position_range(&stats, &self.learn) else {
            tracing::warn!(mean = stats.mean, sigma = stats.sigma, "positions too noisy to learn a stop range");
            return;
        };
        let mut candidate = self.calibration;
        if open_side {
            candidate.open = range;
        } else {
            candidate.closed = range;
        }
        self.apply_calibration(candidate);
    }

    fn learn_travel(&mut self, link: &mut Link<'_>) {
        let Some(log) = link.top().event_log() else {
            tracing::warn!("no event log to learn from");
            return;
        };
        let learned = learn_travel_info(&log.borrow(), &self.learn);
        self.calibration.travel.merge_known(&learned);
        tracing::info!(markers = %self.calibration, "travel times learned");
    }

    fn apply_calibration(&mut self, record: CalibrationRecord) -> bool {
        match record.validate() {
            Ok(()) => {
                self.calibration = record;
                tracing::info!(markers = %record, "position markers updated");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "position markers rejected");
                false
            }
        }
    }
}

impl Unit for DoorControlUnit {
    fn name(&self) -> &'static str {
        "door_control"
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) {
        self.timer = Some(ctx.every(hz_to_period_ms(self.cfg.cycle_hz)));
    }

    fn start(&mut self, link: &mut Link<'_>) {
        self.calibration = CalibrationRecord::load_or_default(
            link.env().store.as_mut(),
            &self.store_key,
            self.default_record,
        );
        tracing::info!(markers = %self.calibration, "calibration loaded");
        self.marker_ms = link.now_ms();
        self.set_motor(MotorState::Stopped, link);
    }

    fn on_timer(&mut self, timer: TimerId, link: &mut Link<'_>) {
        if Some(timer) == self.timer {
            self.cycle(link);
        }
    }

    fn query_door_state(&mut self, req: &mut Request<DoorState>, _link: &mut Link<'_>) {
        req.answer(self.state);
    }

    fn write_door_state(&mut self, req: &mut Request<DoorState>, _link: &mut Link<'_>) {
        self.state = req.value;
        self.cooldown = 0;
        req.claim();
    }

    fn read_motor_info(&mut self, req: &mut Request<MotorInfo>, _link: &mut Link<'_>) {
        req.answer(self.motor);
    }

    fn write_motor_info(&mut self, req: &mut Request<MotorInfo>, _link: &mut Link<'_>) {
        self.motor = req.value;
        req.claim();
    }

    fn query_next_message(&mut self, req: &mut Request<Option<HubMessage>>, _link: &mut Link<'_>) {
        req.answer(Some(self.next_message()));
    }

    fn on_target_state_changed(&mut self, req: &mut Request<TargetDoorState>, link: &mut Link<'_>) {
        let target = req.value;
        req.claim();
        self.target = Some(target);
        self.pushed.target = Some(target);
        let (dir, stop) = match target {
            TargetDoorState::Open => (MotorState::Opening, DoorState::Open),
            TargetDoorState::Closed => (MotorState::Closing, DoorState::Closed),
        };
        if self.state == stop {
            tracing::info!(?target, "door already there");
            return;
        }
        if self.motor.state == dir {
            tracing::debug!(?target, "already heading there");
            return;
        }
        tracing::info!(?target, "target requested");
        self.marker_ms = link.now_ms();
        self.wrong_dir_cycles = 0;
        self.set_motor(dir, link);
        link.top().on_triggered(&mut Request::new(()));
    }

    fn on_triggered(&mut self, _req: &mut Request<()>, link: &mut Link<'_>) {
        self.triggered = true;
        self.marker_ms = link.now_ms();
        self.wrong_dir_cycles = 0;
    }

    fn read_calibration(&mut self, req: &mut Request<CalibrationRecord>, _link: &mut Link<'_>) {
        req.answer(self.calibration);
    }

    fn write_calibration(&mut self, req: &mut Request<CalibrationRecord>, _link: &mut Link<'_>) {
        if self.apply_calibration(req.value) {
            req.claim();
        }
    }

    fn on_command(&mut self, req: &mut Request<OperatorCommand>, link: &mut Link<'_>) {
        match req.value {
            OperatorCommand::SaveCalibration => {
                let key = self.store_key.as_str();
                match self.calibration.save(link.env().store.as_mut(), key) {
                    Ok(()) => tracing::info!(key, markers = %self.calibration, "calibration saved"),
                    Err(e) => tracing::error!(key, error = %e, "calibration save failed"),
                }
            }
            OperatorCommand::LearnOpenRange => self.learn_range(true, link),
            OperatorCommand::LearnClosedRange => self.learn_range(false, link),
            OperatorCommand::LearnTravelTimes => self.learn_travel(link),
            OperatorCommand::ClearEventLog => return,
        }
        req.claim();
    }
}
