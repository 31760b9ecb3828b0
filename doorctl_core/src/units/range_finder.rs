use doorctl_traits::RangingPins;

use crate::dispatch::{Link, Request, SetupContext, Unit};
use crate::ranging::RangeFinder;
use crate::scheduler::{TimerId, hz_to_period_ms};
use crate::status::MotorInfo;
use crate::types::PositionSample;

/// Ticks kept at full rate after a trigger before the motor is known to move.
const TRIGGER_LINGER_TICKS: u8 = 16;

/// Samples the distance sensor on its own timer and answers sensor queries.
///
/// Runs "stressed" (full rate) while the motor moves and after a trigger,
/// "relaxed" otherwise.
pub struct RangeFinderUnit<P: RangingPins> {
    finder: RangeFinder<P>,
    timer: Option<TimerId>,
    stressed: bool,
    linger: u8,
}

impl<P: RangingPins> RangeFinderUnit<P> {
    pub fn new(finder: RangeFinder<P>) -> Self {
        Self {
            finder,
            timer: None,
            stressed: true,
            linger: 0,
        }
    }

    pub fn finder(&self) -> &RangeFinder<P> {
        &self.finder
    }

    fn stress(&mut self, link: &mut Link<'_>) {
        if let Some(t) = self.timer {
            if !self.stressed {
                tracing::debug!("ranging stressed");
            }
            self.stressed = true;
            link.set_period(t, hz_to_period_ms(self.finder.cfg().stressed_hz));
            link.fire_now(t);
        }
    }

    fn relax(&mut self, link: &mut Link<'_>) {
        if let Some(t) = self.timer {
            if self.stressed {
                tracing::debug!("ranging relaxed");
            }
            self.stressed = false;
            link.set_period(t, hz_to_period_ms(self.finder.cfg().relaxed_hz));
        }
    }
}

impl<P: RangingPins> Unit for RangeFinderUnit<P> {
    fn name(&self) -> &'static str {
        "range_finder"
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) {
        self.timer = Some(ctx.every(hz_to_period_ms(self.finder.cfg().stressed_hz)));
    }

    fn on_timer(&mut self, timer: TimerId, link: &mut Link<'_>) {
        if Some(timer) != self.timer {
            return;
        }
        if let Err(e) = self.finder.tick() {
            tracing::warn!(error = %e, "ranging tick failed");
        }
        self.linger = self.linger.saturating_sub(1);
        let moving = link.top().motor_info().is_some_and(|m| m.state.is_moving());
        if !moving && self.linger == 0 && self.stressed {
            self.relax(link);
        }
    }

    fn query_sensor_data(&mut self, req: &mut Request<PositionSample>, _link: &mut Link<'_>) {
        if let Some(sample) = self.finder.latest() {
            req.answer(sample);
        }
    }

    fn write_motor_info(&mut self, req: &mut Request<MotorInfo>, link: &mut Link<'_>) {
        if req.value.state.is_moving() && !self.stressed {
            self.stress(link);
        }
    }

    fn on_triggered(&mut self, _req: &mut Request<()>, link: &mut Link<'_>) {
        self.linger = TRIGGER_LINGER_TICKS;
        self.stress(link);
    }
}
