//! Calibration learning from the event history.
//!
//! Stop ranges come from the spread of recent filtered positions while the
//! door sits still; travel times come from matching four-entry transition
//! patterns (motor start, door leaves range, motor stop, door arrives) and
//! taking the median of the last few accepted runs.

use crate::bounded::BoundedDeque;
use crate::calibration::{PositionRange, TravelInfo};
use crate::config::LearnCfg;
use crate::event_log::{EventCode, EventEntry, EventLog, PositionStats};
use crate::fixed_point::median_u16;
use crate::status::{DoorState, MotorState};

/// Propose a stop range from position statistics.
///
/// `None` when the sample is too noisy (sigma at or above the ceiling).
pub fn try_get_stop_position_range(stats: &PositionStats, cfg: &LearnCfg) -> Option<PositionRange> {
    if !stats.sigma.is_finite() || stats.sigma >= cfg.sigma_ceiling || stats.count == 0 {
        return None;
    }
    let spread = stats.sigma.max(cfg.sigma_floor) * cfg.sigma_factor + f32::from(cfg.safety_margin);
    let lo = (stats.mean - spread).round().max(1.0);
    let hi = (stats.mean + spread).round().max(lo);
    Some(PositionRange {
        min: clamp_u16(lo),
        max: clamp_u16(hi),
    })
}

fn clamp_u16(v: f32) -> u16 {
    if v >= f32::from(u16::MAX) {
        u16::MAX
    } else {
        v as u16
    }
}

/// Direction of an extracted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Opening,
    Closing,
}

/// One observed open or close cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub kind: RunKind,
    /// Motor start until the door left its stop range.
    pub lead_cs: u16,
    /// Motor start until the door reached the opposite stop range.
    pub total_cs: u16,
}

fn match_run(w: &[EventEntry]) -> Option<Run> {
    let [a, b, c, d] = w else {
        return None;
    };
    let kind = match (a.code, b.code, c.code, d.code) {
        (
            EventCode::Motor(MotorState::Opening),
            EventCode::Door(DoorState::MovingOrStopped),
            EventCode::Motor(MotorState::Stopped),
            EventCode::Door(DoorState::Open),
        ) => RunKind::Opening,
        (
            EventCode::Motor(MotorState::Closing),
            EventCode::Door(DoorState::MovingOrStopped),
            EventCode::Motor(MotorState::Stopped),
            EventCode::Door(DoorState::Closed),
        ) => RunKind::Closing,
        _ => return None,
    };
    Some(Run {
        kind,
        lead_cs: b.timestamp_cs.wrapping_sub(a.timestamp_cs),
        total_cs: d.timestamp_cs.wrapping_sub(a.timestamp_cs),
    })
}

fn plausible(run: &Run, cfg: &LearnCfg) -> bool {
    run.lead_cs > cfg.min_lead_cs
        && run.lead_cs <= cfg.max_lead_cs
        && run.total_cs > cfg.min_total_cs
        && run.total_cs <= cfg.max_total_cs
}

/// Every plausible run in the transition history, oldest first.
pub fn extract_runs(log: &EventLog, cfg: &LearnCfg) -> Vec<Run> {
    let entries: Vec<EventEntry> = log.transitions().iter().copied().collect();
    entries
        .windows(4)
        .filter_map(match_run)
        .filter(|r| {
            let ok = plausible(r, cfg);
            if !ok {
                tracing::debug!(kind = ?r.kind, lead_cs = r.lead_cs, total_cs = r.total_cs, "rejected run");
            }
            ok
        })
        .collect()
}

/// Learned travel times: median over the most recent accepted runs.
///
/// Fields with no accepted run stay 0 (unknown).
pub fn learn_travel_info(log: &EventLog, cfg: &LearnCfg) -> TravelInfo {
    let mut totals = BoundedDeque::with_capacity(cfg.recent_runs);
    let mut opening = BoundedDeque::with_capacity(cfg.recent_runs);
    let mut closing = BoundedDeque::with_capacity(cfg.recent_runs);
    for run in extract_runs(log, cfg) {
        totals.push(run.total_cs);
        match run.kind {
            RunKind::Opening => opening.push(run.lead_cs),
            RunKind::Closing => closing.push(run.lead_cs),
        };
    }
    TravelInfo {
        total_cs: median_of(&totals),
        opening_lead_cs: median_of(&opening),
        closing_lead_cs: median_of(&closing),
    }
}

fn median_of(buf: &BoundedDeque<u16>) -> u16 {
    let mut v: Vec<u16> = buf.iter().copied().collect();
    median_u16(&mut v).unwrap_or(0)
}
