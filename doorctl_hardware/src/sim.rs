//! Workstation stand-in for the garage: a single-button opener moving a door
//! under an ultrasonic sensor.
//!
//! One button press starts the motor, the next one stops it, and the press
//! after a stop runs the other way. Travel is linear between the two end
//! positions. The sonar reports the door position with a little noise.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use doorctl_traits::{Clock, EchoCell, MotorActuator, RangingPins};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Echoes from farther than this are lost.
const MAX_ECHO_CM: u16 = 450;

#[derive(Debug, Clone)]
pub struct SimDoorCfg {
    /// Sensor reading with the door closed.
    pub closed_cm: u16,
    /// Sensor reading with the door open.
    pub open_cm: u16,
    /// Full travel time between the end positions.
    pub travel: Duration,
    /// Readings jitter by up to this many centimetres either way.
    pub noise_cm: u16,
    pub seed: u32,
}

impl Default for SimDoorCfg {
    fn default() -> Self {
        Self {
            closed_cm: 250,
            open_cm: 30,
            travel: Duration::from_secs(12),
            noise_cm: 1,
            seed: 0x5EED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimMotion {
    Idle,
    Opening,
    Closing,
}

#[derive(Debug)]
struct Model {
    cfg: SimDoorCfg,
    pos: f32,
    motion: SimMotion,
    /// Direction of the last run; decides where the next press goes.
    last_run: SimMotion,
    last_update: Option<Instant>,
    obstruction: Option<u16>,
    rng: u32,
    presses: u32,
}

impl Model {
    fn end_of(&self, motion: SimMotion) -> Option<f32> {
        match motion {
            SimMotion::Opening => Some(f32::from(self.cfg.open_cm)),
            SimMotion::Closing => Some(f32::from(self.cfg.closed_cm)),
            SimMotion::Idle => None,
        }
    }

    fn advance(&mut self, now: Instant) {
        let Some(last) = self.last_update.replace(now) else {
            return;
        };
        let Some(end) = self.end_of(self.motion) else {
            return;
        };
        let span = f32::from(self.cfg.closed_cm.abs_diff(self.cfg.open_cm));
        let speed = span / self.cfg.travel.as_secs_f32().max(0.001);
        let step = speed * now.saturating_duration_since(last).as_secs_f32();
        let before = self.pos;
        let remaining = end - before;
        self.pos = if remaining.abs() <= step {
            end
        } else {
            before + step.copysign(remaining)
        };
        if let Some(block) = self.obstruction.map(f32::from) {
            let (lo, hi) = if before <= self.pos {
                (before, self.pos)
            } else {
                (self.pos, before)
            };
            if block >= lo && block <= hi && (block - before).abs() > f32::EPSILON {
                self.pos = block;
                self.motion = SimMotion::Idle;
                tracing::debug!(position = block, "simulated door blocked");
                return;
            }
        }
        if (self.pos - end).abs() <= f32::EPSILON {
            self.motion = SimMotion::Idle;
            tracing::debug!(position = end, "simulated door reached end stop");
        }
    }

    fn jitter(&mut self) -> f32 {
        if self.cfg.noise_cm == 0 {
            return 0.0;
        }
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        let span = u32::from(self.cfg.noise_cm) * 2 + 1;
        (x % span) as f32 - f32::from(self.cfg.noise_cm)
    }
}

/// Shared handle to the simulated door. Clones see the same door.
#[derive(Debug, Clone)]
pub struct SimDoor {
    inner: Arc<Mutex<Model>>,
}

impl SimDoor {
    /// A door resting at its closed position.
    pub fn new(cfg: SimDoorCfg) -> Self {
        let pos = f32::from(cfg.closed_cm);
        let rng = cfg.seed.max(1);
        Self {
            inner: Arc::new(Mutex::new(Model {
                cfg,
                pos,
                motion: SimMotion::Idle,
                last_run: SimMotion::Closing,
                last_update: None,
                obstruction: None,
                rng,
                presses: 0,
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Model) -> R) -> R {
        let mut m = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut m)
    }

    /// The opener's button.
    pub fn press(&self, now: Instant) {
        self.with(|m| {
            m.advance(now);
            m.presses = m.presses.saturating_add(1);
            m.motion = match m.motion {
                SimMotion::Idle => match m.last_run {
                    SimMotion::Opening => SimMotion::Closing,
                    _ => SimMotion::Opening,
                },
                SimMotion::Opening | SimMotion::Closing => SimMotion::Idle,
            };
            if m.motion != SimMotion::Idle {
                m.last_run = m.motion;
            }
            tracing::debug!(motion = ?m.motion, position = m.pos, "simulated opener pressed");
        });
    }

    /// Noisy sensor reading at `now`.
    pub fn reading_cm(&self, now: Instant) -> u16 {
        self.with(|m| {
            m.advance(now);
            let v = (m.pos + m.jitter()).round().max(0.0);
            v as u16
        })
    }

    /// Exact position at `now`.
    pub fn position_cm(&self, now: Instant) -> f32 {
        self.with(|m| {
            m.advance(now);
            m.pos
        })
    }

    pub fn motion(&self, now: Instant) -> SimMotion {
        self.with(|m| {
            m.advance(now);
            m.motion
        })
    }

    /// Block the door at `at` centimetres (or clear the block).
    pub fn obstruct(&self, at: Option<u16>) {
        self.with(|m| m.obstruction = at);
    }

    pub fn presses(&self) -> u32 {
        self.with(|m| m.presses)
    }
}

/// Ranging pins that answer from a [`SimDoor`].
///
/// The echo is stamped on the falling trigger edge when the echo interrupt
/// is unmasked, at `now + distance * us_per_cm`.
pub struct SimSonar {
    door: SimDoor,
    clock: Arc<dyn Clock + Send + Sync>,
    echo: Arc<EchoCell>,
    epoch: Instant,
    us_per_cm: u32,
    irq: bool,
    trigger_high: bool,
}

impl SimSonar {
    pub fn new(
        door: SimDoor,
        clock: Arc<dyn Clock + Send + Sync>,
        echo: Arc<EchoCell>,
        us_per_cm: u32,
    ) -> Self {
        let epoch = clock.now();
        Self {
            door,
            clock,
            echo,
            epoch,
            us_per_cm,
            irq: false,
            trigger_high: false,
        }
    }
}

impl RangingPins for SimSonar {
    fn set_trigger(&mut self, high: bool) -> Result<(), BoxError> {
        let falling = self.trigger_high && !high;
        self.trigger_high = high;
        if falling && self.irq {
            let cm = self.door.reading_cm(self.clock.now());
            if cm > 0 && cm <= MAX_ECHO_CM {
                let round_trip = u32::from(cm) * self.us_per_cm;
                self.echo.record(self.micros().wrapping_add(round_trip));
            }
        }
        Ok(())
    }

    fn set_echo_interrupt(&mut self, enabled: bool) {
        self.irq = enabled;
    }

    fn delay_us(&mut self, _us: u32) {}

    fn micros(&self) -> u32 {
        // wraps like the hardware counter
        (self.clock.us_since(self.epoch) & u64::from(u32::MAX)) as u32
    }
}

/// Opener button driven by the controller; holds for the pulse width on the
/// shared clock, then presses the simulated button.
pub struct SimTrigger {
    door: SimDoor,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl SimTrigger {
    pub fn new(door: SimDoor, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { door, clock }
    }
}

impl MotorActuator for SimTrigger {
    fn pulse(&mut self, width: Duration) -> Result<(), BoxError> {
        self.clock.sleep(width);
        self.door.press(self.clock.now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> SimDoorCfg {
        SimDoorCfg {
            noise_cm: 0,
            travel: Duration::from_secs(10),
            ..SimDoorCfg::default()
        }
    }

    #[test]
    fn jitter_stays_within_noise() {
        let door = SimDoor::new(SimDoorCfg {
            noise_cm: 3,
            ..SimDoorCfg::default()
        });
        let t = Instant::now();
        for _ in 0..200 {
            let r = door.reading_cm(t);
            assert!((247..=253).contains(&r), "reading {r}");
        }
    }

    #[test]
    fn travel_is_linear() {
        let door = SimDoor::new(quiet());
        let t0 = Instant::now();
        door.press(t0);
        let mid = door.position_cm(t0 + Duration::from_secs(5));
        assert!((mid - 140.0).abs() < 0.5, "mid {mid}");
    }
}
