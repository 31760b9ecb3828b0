//! Runtime configuration for the control core.
//!
//! These are separate from the TOML-deserialized config in `doorctl_config`;
//! see `conversions` for the bridge.

use std::time::Duration;

/// Ultrasonic ranging parameters.
#[derive(Debug, Clone)]
pub struct RangingCfg {
    /// Sampling rate while the motor runs.
    pub stressed_hz: u32,
    /// Sampling rate while the motor is idle.
    pub relaxed_hz: u32,
    /// Echo round-trip microseconds per centimetre of distance.
    pub us_per_cm: u32,
    /// Echoes later than this are treated as lost.
    pub max_round_trip_us: u32,
    /// Readings outside `[min_valid_cm, max_valid_cm]` are published raw only.
    pub min_valid_cm: u16,
    pub max_valid_cm: u16,
    /// Median filter window (samples).
    pub median_window: usize,
    /// Trigger pulse width in microseconds.
    pub pulse_us: u32,
}

impl Default for RangingCfg {
    fn default() -> Self {
        Self {
            stressed_hz: 8,
            relaxed_hz: 1,
            us_per_cm: 58,
            max_round_trip_us: 30_000,
            min_valid_cm: 2,
            max_valid_cm: 400,
            median_window: 3,
            pulse_us: 10,
        }
    }
}

/// Control-cycle parameters for the door state machine.
#[derive(Debug, Clone)]
pub struct ControlCfg {
    /// Decision cycle rate.
    pub cycle_hz: u32,
    /// Cycles an Open/Closed classification is held before re-evaluation.
    pub cooldown_cycles: u8,
    /// Force-stop after the door sits in the wrong stop range this long
    /// while the motor is believed to be running.
    pub wrong_direction_timeout_ms: u64,
    /// High time of the opener trigger pulse.
    pub trigger_pulse_ms: u64,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            cycle_hz: 2,
            cooldown_cycles: 4,
            wrong_direction_timeout_ms: 10_000,
            trigger_pulse_ms: 100,
        }
    }
}

impl ControlCfg {
    pub fn trigger_pulse(&self) -> Duration {
        Duration::from_millis(self.trigger_pulse_ms)
    }

    /// Wrong-direction timeout expressed in control cycles (at least one).
    pub fn wrong_direction_cycles(&self) -> u32 {
        let period = crate::scheduler::hz_to_period_ms(self.cycle_hz);
        u32::try_from(self.wrong_direction_timeout_ms / period)
            .unwrap_or(u32::MAX)
            .max(1)
    }
}

/// Calibration learning parameters.
#[derive(Debug, Clone)]
pub struct LearnCfg {
    /// No stop-range proposal when sigma is at or above this.
    pub sigma_ceiling: f32,
    /// Lower bound on the sigma used to size a proposed range.
    pub sigma_floor: f32,
    /// Range half-width in sigmas.
    pub sigma_factor: f32,
    /// Fixed centimetres added on each side of a proposed range.
    pub safety_margin: u16,
    /// A run's lead time (motor start to leaving the stop range) must exceed
    /// this; shorter leads are accidental taps.
    pub min_lead_cs: u16,
    pub max_lead_cs: u16,
    /// A run's total duration must exceed this.
    pub min_total_cs: u16,
    pub max_total_cs: u16,
    /// Size of the per-measure recency buffer the median is taken over.
    pub recent_runs: usize,
    /// Most recent position samples used to learn a stop range.
    pub learn_window: usize,
}

impl Default for LearnCfg {
    fn default() -> Self {
        Self {
            sigma_ceiling: 8.0,
            sigma_floor: 1.0,
            sigma_factor: 3.0,
            safety_margin: 2,
            min_lead_cs: 10,
            max_lead_cs: 1_000,
            min_total_cs: 100,
            max_total_cs: 12_000,
            recent_runs: 5,
            learn_window: 20,
        }
    }
}

/// Event history capacities.
#[derive(Debug, Clone)]
pub struct EventLogCfg {
    /// All entries, including raw positions.
    pub capacity: usize,
    /// Door/motor transitions only.
    pub transition_capacity: usize,
}

impl Default for EventLogCfg {
    fn default() -> Self {
        Self {
            capacity: 200,
            transition_capacity: 40,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_direction_cycles_at_default_rate() {
        assert_eq!(ControlCfg::default().wrong_direction_cycles(), 20);
    }

    #[test]
    fn wrong_direction_cycles_never_zero() {
        let cfg = ControlCfg {
            wrong_direction_timeout_ms: 0,
            ..ControlCfg::default()
        };
        assert_eq!(cfg.wrong_direction_cycles(), 1);
    }
}
