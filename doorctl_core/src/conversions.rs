//! `From` implementations bridging `doorctl_config` types to `doorctl_core` types.

use crate::calibration::{CalibrationRecord, PositionRange, TravelInfo};
use crate::config::{ControlCfg, EventLogCfg, LearnCfg, RangingCfg};
use crate::fixed_point::secs_to_cs_u16;

// ── RangingCfg ───────────────────────────────────────────────────────────────

impl From<&doorctl_config::RangingCfg> for RangingCfg {
    fn from(c: &doorctl_config::RangingCfg) -> Self {
        Self {
            stressed_hz: c.stressed_hz,
            relaxed_hz: c.relaxed_hz,
            us_per_cm: c.us_per_cm,
            max_round_trip_us: c.max_round_trip_us,
            min_valid_cm: c.min_valid_cm,
            max_valid_cm: c.max_valid_cm,
            median_window: c.median_window,
            pulse_us: c.pulse_us,
        }
    }
}

// ── ControlCfg ───────────────────────────────────────────────────────────────

impl From<&doorctl_config::ControlCfg> for ControlCfg {
    fn from(c: &doorctl_config::ControlCfg) -> Self {
        Self {
            cycle_hz: c.cycle_hz,
            cooldown_cycles: c.cooldown_cycles,
            wrong_direction_timeout_ms: c.wrong_direction_timeout_ms,
            trigger_pulse_ms: c.trigger_pulse_ms,
        }
    }
}

// ── LearnCfg ─────────────────────────────────────────────────────────────────

impl From<&doorctl_config::LearningCfg> for LearnCfg {
    fn from(c: &doorctl_config::LearningCfg) -> Self {
        Self {
            sigma_ceiling: c.sigma_ceiling,
            sigma_floor: c.sigma_floor,
            sigma_factor: c.sigma_factor,
            safety_margin: c.safety_margin,
            min_lead_cs: c.min_lead_cs,
            max_lead_cs: c.max_lead_cs,
            min_total_cs: c.min_total_cs,
            max_total_cs: c.max_total_cs,
            recent_runs: c.recent_runs,
            learn_window: c.learn_window,
        }
    }
}

// ── EventLogCfg ──────────────────────────────────────────────────────────────

impl From<&doorctl_config::EventLogCfg> for EventLogCfg {
    fn from(c: &doorctl_config::EventLogCfg) -> Self {
        Self {
            capacity: c.capacity,
            transition_capacity: c.transition_capacity,
        }
    }
}

// ── CalibrationRecord ────────────────────────────────────────────────────────

impl From<&doorctl_config::DefaultCalibration> for CalibrationRecord {
    fn from(c: &doorctl_config::DefaultCalibration) -> Self {
        Self {
            open: PositionRange::new(c.open_min, c.open_max),
            closed: PositionRange::new(c.closed_min, c.closed_max),
            travel: TravelInfo {
                total_cs: secs_to_cs_u16(c.total_secs),
                opening_lead_cs: secs_to_cs_u16(c.opening_secs),
                closing_lead_cs: secs_to_cs_u16(c.closing_secs),
            },
        }
    }
}
