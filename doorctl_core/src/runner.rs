//! Cooperative control loop.
//!
//! All chain access happens on the thread that owns the [`Controller`]. Other
//! threads (hub server, stdin reader) talk to it through [`HubCommand`]s on a
//! bounded channel that the loop drains once per iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use doorctl_traits::TargetDoorState;

use crate::calibration::CalibrationRecord;
use crate::dispatch::{DispatchChain, Env, Request, SharedEventLog};
use crate::error::{DoorError, Result};
use crate::status::{DoorState, MotorInfo};
use crate::types::{HubMessage, OperatorCommand, PositionSample};

/// Commands accepted from outside the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubCommand {
    SetTarget(TargetDoorState),
    Trigger,
    Operator(OperatorCommand),
    WriteCalibration(CalibrationRecord),
}

/// Capacity of the inbound command queue.
pub const COMMAND_QUEUE: usize = 32;

/// Longest the real-time loop idles before checking the stop flag again.
const MAX_IDLE_MS: u64 = 100;

pub struct Controller {
    chain: DispatchChain,
    env: Env,
    tx: Sender<HubCommand>,
    rx: Receiver<HubCommand>,
    started: bool,
}

impl Controller {
    /// Wrap an already set-up chain.
    pub(crate) fn new(chain: DispatchChain, env: Env) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(COMMAND_QUEUE);
        Self {
            chain,
            env,
            tx,
            rx,
            started: false,
        }
    }

    /// Start every unit (loads calibration). Idempotent.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        tracing::info!(units = ?self.chain.names(), "controller start");
        self.chain.start(&mut self.env);
    }

    /// Handle for other threads to queue commands.
    pub fn command_sender(&self) -> Sender<HubCommand> {
        self.tx.clone()
    }

    pub fn now_ms(&self) -> u64 {
        self.env.now_ms()
    }

    pub fn unit_names(&self) -> Vec<&'static str> {
        self.chain.names()
    }

    /// One loop iteration: drain queued commands, then fire due timers.
    /// Returns the number of timers fired.
    pub fn poll(&mut self) -> usize {
        self.start();
        while let Ok(cmd) = self.rx.try_recv() {
            self.handle(cmd);
        }
        let now = self.env.now_ms();
        let due = self.env.scheduler.due(now);
        for &(timer, owner) in &due {
            self.chain.fire_timer(owner, timer, &mut self.env);
        }
        due.len()
    }

    /// Run for `span` of clock time, sleeping on the clock between deadlines.
    ///
    /// With a `ManualClock` this advances simulated time without blocking.
    pub fn run_for(&mut self, span: Duration) {
        let end = self
            .env
            .now_ms()
            .saturating_add(u64::try_from(span.as_millis()).unwrap_or(u64::MAX));
        loop {
            self.poll();
            let now = self.env.now_ms();
            if now >= end {
                break;
            }
            let next = self.env.scheduler.next_deadline_ms().unwrap_or(end).min(end);
            self.env
                .clock()
                .sleep(Duration::from_millis(next.saturating_sub(now).max(1)));
        }
    }

    /// Run in real time until `stop` is set. Commands wake the loop early.
    pub fn run_until(&mut self, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            self.poll();
            let now = self.env.now_ms();
            let wait_ms = self
                .env
                .scheduler
                .next_deadline_ms()
                .map_or(MAX_IDLE_MS, |d| d.saturating_sub(now))
                .min(MAX_IDLE_MS);
            match self.rx.recv_timeout(Duration::from_millis(wait_ms)) {
                Ok(cmd) => self.handle(cmd),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {}
            }
        }
        tracing::info!("controller stopped");
    }

    fn handle(&mut self, cmd: HubCommand) {
        tracing::debug!(?cmd, "command");
        let handled = match cmd {
            HubCommand::SetTarget(t) => {
                self.set_target(t);
                true
            }
            HubCommand::Trigger => {
                self.trigger();
                true
            }
            HubCommand::Operator(c) => self.command(c),
            HubCommand::WriteCalibration(rec) => self.write_calibration(rec).is_ok(),
        };
        if !handled {
            tracing::warn!(?cmd, "command not handled");
        }
    }

    pub fn set_target(&mut self, target: TargetDoorState) {
        self.start();
        let mut req = Request::new(target);
        self.chain.route(&mut self.env).on_target_state_changed(&mut req);
        if !req.handled {
            tracing::warn!(?target, "target change not handled");
        }
    }

    /// Manual trigger: same path as a wall-button press.
    pub fn trigger(&mut self) {
        self.start();
        let mut req = Request::new(());
        self.chain.route(&mut self.env).on_triggered(&mut req);
        if !req.handled {
            tracing::warn!("trigger not handled");
        }
    }

    /// Returns whether some unit handled the command.
    pub fn command(&mut self, cmd: OperatorCommand) -> bool {
        self.start();
        let mut req = Request::new(cmd);
        self.chain.route(&mut self.env).on_command(&mut req);
        req.handled
    }

    pub fn door_state(&mut self) -> Option<DoorState> {
        self.chain.route(&mut self.env).door_state()
    }

    pub fn motor_info(&mut self) -> Option<MotorInfo> {
        self.chain.route(&mut self.env).motor_info()
    }

    pub fn sensor_data(&mut self) -> Option<PositionSample> {
        self.chain.route(&mut self.env).sensor_data()
    }

    pub fn calibration(&mut self) -> Option<CalibrationRecord> {
        self.chain.route(&mut self.env).calibration()
    }

    /// Replace the position markers. Overlapping or inverted ranges are rejected
    /// and the current record stays in place.
    pub fn write_calibration(&mut self, record: CalibrationRecord) -> Result<()> {
        record.validate().map_err(DoorError::from)?;
        let mut req = Request::new(record);
        self.chain.route(&mut self.env).write_calibration(&mut req);
        if req.handled {
            Ok(())
        } else {
            Err(DoorError::State("no unit accepted the calibration".into()).into())
        }
    }

    pub fn event_log(&mut self) -> Option<SharedEventLog> {
        self.chain.route(&mut self.env).event_log()
    }

    pub fn next_message(&mut self) -> Option<HubMessage> {
        let mut req = Request::new(None);
        self.chain.route(&mut self.env).query_next_message(&mut req);
        req.into_option().flatten()
    }

    /// `OpenMin;OpenMax;ClosedMin;ClosedMax;TotalSecs;OpeningSecs;ClosingSecs`
    pub fn markers_summary(&mut self) -> Option<String> {
        self.calibration().map(|c| c.to_string())
    }

    /// Event log as `index;position;eventCode` lines.
    pub fn event_log_dump(&mut self) -> Option<String> {
        let log = self.event_log()?;
        let mut out = String::new();
        log.borrow().dump(&mut out).ok()?;
        Some(out)
    }
}
