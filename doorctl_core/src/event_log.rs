//! Bounded history of position samples and door/motor transitions.
//!
//! Two sequences are kept side by side: every entry (positions included)
//! feeds the position statistics, while the transition-only sequence feeds
//! travel-time learning.

use std::fmt;

use crate::bounded::BoundedDeque;
use crate::config::EventLogCfg;
use crate::status::{DoorState, MotorState};

/// What an [`EventEntry`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCode {
    /// Filtered (in-range) position sample.
    Position,
    /// Raw position that failed the plausibility window.
    RawPosition,
    Door(DoorState),
    Motor(MotorState),
}

impl EventCode {
    /// Numeric code used in the diagnostic dump.
    pub const fn code(self) -> u8 {
        match self {
            Self::Position => 0,
            Self::RawPosition => 1,
            Self::Motor(m) => 10 + m.code(),
            Self::Door(d) => 20 + d.code(),
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Position),
            1 => Some(Self::RawPosition),
            10..=19 => match MotorState::from_code(code - 10) {
                Some(m) => Some(Self::Motor(m)),
                None => None,
            },
            20..=29 => match DoorState::from_code(code - 20) {
                Some(d) => Some(Self::Door(d)),
                None => None,
            },
            _ => None,
        }
    }

    pub const fn is_transition(self) -> bool {
        matches!(self, Self::Door(_) | Self::Motor(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventEntry {
    /// Coarse timestamp in centiseconds; wraps every ~655 s.
    pub timestamp_cs: u16,
    /// Distance in centimetres, 0 when the entry carries none.
    pub position: u16,
    pub code: EventCode,
}

/// Mean and population standard deviation of logged positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionStats {
    pub mean: f32,
    pub sigma: f32,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct EventLog {
    entries: BoundedDeque<EventEntry>,
    transitions: BoundedDeque<EventEntry>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(&EventLogCfg::default())
    }
}

impl EventLog {
    pub fn new(cfg: &EventLogCfg) -> Self {
        Self {
            entries: BoundedDeque::with_capacity(cfg.capacity),
            transitions: BoundedDeque::with_capacity(cfg.transition_capacity),
        }
    }

    pub fn add_position(&mut self, now_cs: u16, position: u16, raw: bool) {
        let code = if raw {
            EventCode::RawPosition
        } else {
            EventCode::Position
        };
        self.entries.push(EventEntry {
            timestamp_cs: now_cs,
            position,
            code,
        });
    }

    pub fn add_event(&mut self, now_cs: u16, code: EventCode) {
        let entry = EventEntry {
            timestamp_cs: now_cs,
            position: 0,
            code,
        };
        self.entries.push(entry);
        if code.is_transition() {
            self.transitions.push(entry);
        }
    }

    pub fn entries(&self) -> &BoundedDeque<EventEntry> {
        &self.entries
    }

    pub fn transitions(&self) -> &BoundedDeque<EventEntry> {
        &self.transitions
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.transitions.clear();
    }

    /// Statistics over every logged filtered position.
    pub fn position_std_dev(&self) -> Option<PositionStats> {
        self.recent_position_std_dev(usize::MAX)
    }

    /// Statistics over the `window` most recent filtered positions.
    ///
    /// Raw positions and zero positions never count. Returns `None` when no
    /// position qualifies.
    pub fn recent_position_std_dev(&self, window: usize) -> Option<PositionStats> {
        let positions: Vec<u16> = self
            .entries
            .iter()
            .rev()
            .filter(|e| e.code == EventCode::Position && e.position != 0)
            .take(window)
            .map(|e| e.position)
            .collect();
        stats(&positions)
    }

    /// Write `index;position;eventCode` lines, oldest first.
    pub fn dump(&self, out: &mut impl fmt::Write) -> fmt::Result {
        for (i, e) in self.entries.iter().enumerate() {
            writeln!(out, "{i};{};{}", e.position, e.code.code())?;
        }
        Ok(())
    }
}

fn stats(positions: &[u16]) -> Option<PositionStats> {
    if positions.is_empty() {
        return None;
    }
    let n = positions.len() as f64;
    let mean = positions.iter().map(|&p| f64::from(p)).sum::<f64>() / n;
    let var = positions
        .iter()
        .map(|&p| {
            let d = f64::from(p) - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    Some(PositionStats {
        mean: mean as f32,
        sigma: var.sqrt() as f32,
        count: positions.len(),
    })
}
