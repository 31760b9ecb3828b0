//! Interrupt-driven ultrasonic ranging.
//!
//! The echo interrupt only stamps [`EchoCell`]; everything else happens here,
//! on the control loop, one `tick()` at a time:
//!
//! ```text
//! Idle ──► Restart ──► Waiting ──(echo | timeout)──► Restart ...
//! ```
//!
//! A restart masks the echo interrupt while the stale stamp is cleared and the
//! trigger goes high, unmasks it, holds the pulse and records the start time.

use std::sync::Arc;

use doorctl_traits::{EchoCell, RangingPins};

use crate::bounded::BoundedDeque;
use crate::config::RangingCfg;
use crate::error::Result;
use crate::fixed_point::median_u16;
use crate::hw_error::map_hw_error;
use crate::types::PositionSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangingState {
    Idle,
    Restart,
    Waiting,
}

/// Convert an echo round trip to centimetres, saturating.
#[inline]
pub fn round_trip_to_cm(elapsed_us: u32, us_per_cm: u32) -> u16 {
    u16::try_from(elapsed_us / us_per_cm.max(1)).unwrap_or(u16::MAX)
}

pub struct RangeFinder<P: RangingPins> {
    pins: P,
    echo: Arc<EchoCell>,
    cfg: RangingCfg,
    state: RangingState,
    started_us: u32,
    window: BoundedDeque<u16>,
    latest: Option<PositionSample>,
    published: u32,
    faults: u32,
}

impl<P: RangingPins> RangeFinder<P> {
    pub fn new(pins: P, echo: Arc<EchoCell>, cfg: RangingCfg) -> Self {
        let window = BoundedDeque::with_capacity(cfg.median_window);
        Self {
            pins,
            echo,
            cfg,
            state: RangingState::Idle,
            started_us: 0,
            window,
            latest: None,
            published: 0,
            faults: 0,
        }
    }

    pub const fn state(&self) -> RangingState {
        self.state
    }

    /// Most recent published sample.
    pub const fn latest(&self) -> Option<PositionSample> {
        self.latest
    }

    /// Lost or late echoes since construction.
    pub const fn faults(&self) -> u32 {
        self.faults
    }

    pub fn cfg(&self) -> &RangingCfg {
        &self.cfg
    }

    /// Advance the state machine. Returns the sample published by this tick.
    pub fn tick(&mut self) -> Result<Option<PositionSample>> {
        match self.state {
            RangingState::Idle => {
                self.state = RangingState::Restart;
                self.restart()?;
                Ok(None)
            }
            RangingState::Restart => {
                self.restart()?;
                Ok(None)
            }
            RangingState::Waiting => {
                let published = if let Some(stamp) = self.echo.take() {
                    let elapsed = stamp.wrapping_sub(self.started_us);
                    if elapsed <= self.cfg.max_round_trip_us {
                        Some(self.publish(round_trip_to_cm(elapsed, self.cfg.us_per_cm)))
                    } else {
                        self.fault(elapsed, "late echo");
                        None
                    }
                } else {
                    let waited = self.pins.micros().wrapping_sub(self.started_us);
                    if waited <= self.cfg.max_round_trip_us {
                        return Ok(None);
                    }
                    self.fault(waited, "no echo");
                    None
                };
                self.state = RangingState::Restart;
                self.restart()?;
                Ok(published)
            }
        }
    }

    fn restart(&mut self) -> Result<()> {
        self.pins.set_echo_interrupt(false);
        self.echo.clear();
        self.pins
            .set_trigger(true)
            .map_err(|e| map_hw_error(e.as_ref()))?;
        self.pins.set_echo_interrupt(true);
        self.pins.delay_us(self.cfg.pulse_us);
        self.pins
            .set_trigger(false)
            .map_err(|e| map_hw_error(e.as_ref()))?;
        self.started_us = self.pins.micros();
        self.state = RangingState::Waiting;
        Ok(())
    }

    fn fault(&mut self, waited_us: u32, what: &'static str) {
        self.faults = self.faults.saturating_add(1);
        tracing::warn!(waited_us, faults = self.faults, "{what}, restarting ranging");
    }

    fn publish(&mut self, cm: u16) -> PositionSample {
        let in_range = cm >= self.cfg.min_valid_cm && cm <= self.cfg.max_valid_cm;
        let filtered = if in_range {
            self.window.push(cm);
            let mut v: Vec<u16> = self.window.iter().copied().collect();
            median_u16(&mut v)
        } else {
            None
        };
        self.published = self.published.wrapping_add(1);
        let sample = PositionSample {
            filtered,
            raw: Some(cm),
            seq: self.published,
        };
        tracing::trace!(raw = cm, ?filtered, "range sample");
        self.latest = Some(sample);
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_saturates() {
        assert_eq!(round_trip_to_cm(5_800, 58), 100);
        assert_eq!(round_trip_to_cm(u32::MAX, 1), u16::MAX);
        assert_eq!(round_trip_to_cm(100, 0), 100);
    }
}
