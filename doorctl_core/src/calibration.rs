//! Position markers and travel times: the persisted calibration record.
//!
//! ## Binary layout (32 bytes, little-endian)
//!
//! | offset | field                     |
//! |--------|---------------------------|
//! | 0      | magic `b'D'`              |
//! | 1      | version (1)               |
//! | 2..16  | open min/max, closed min/max, total, opening lead, closing lead (`u16` each) |
//! | 16..32 | reserved, zero            |
//!
//! Travel fields are centiseconds; 0 means unknown.

use std::fmt;
use std::str::FromStr;

use doorctl_traits::KeyValueStore;

use crate::error::{DoorError, MarkerError, Result};
use crate::fixed_point::{cs_to_secs, secs_to_cs_u16};
use crate::hw_error::map_hw_error;

pub const RECORD_LEN: usize = 32;
const MAGIC: u8 = b'D';
const VERSION: u8 = 1;

/// Inclusive distance interval identifying a stop position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionRange {
    pub min: u16,
    pub max: u16,
}

impl PositionRange {
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    pub const fn contains(&self, pos: u16) -> bool {
        pos >= self.min && pos <= self.max
    }

    pub const fn intersects(&self, other: &Self) -> bool {
        self.min <= other.max && other.min <= self.max
    }

    /// Zero in either bound disables the range; so does an inverted pair.
    pub const fn is_valid(&self) -> bool {
        self.min != 0 && self.max != 0 && self.min <= self.max
    }
}

impl fmt::Display for PositionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TravelInfo {
    pub total_cs: u16,
    pub opening_lead_cs: u16,
    pub closing_lead_cs: u16,
}

impl TravelInfo {
    pub const fn total_known(&self) -> bool {
        self.total_cs != 0
    }

    /// Take every known (non-zero) field from `learned`, keep the rest.
    pub fn merge_known(&mut self, learned: &Self) {
        if learned.total_cs != 0 {
            self.total_cs = learned.total_cs;
        }
        if learned.opening_lead_cs != 0 {
            self.opening_lead_cs = learned.opening_lead_cs;
        }
        if learned.closing_lead_cs != 0 {
            self.closing_lead_cs = learned.closing_lead_cs;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationRecord {
    pub open: PositionRange,
    pub closed: PositionRange,
    pub travel: TravelInfo,
}

impl Default for CalibrationRecord {
    /// Sensor mounted above the door: short distance when open.
    fn default() -> Self {
        Self {
            open: PositionRange::new(5, 50),
            closed: PositionRange::new(180, 300),
            travel: TravelInfo::default(),
        }
    }
}

impl CalibrationRecord {
    pub fn validate(&self) -> std::result::Result<(), MarkerError> {
        for (which, r) in [("open", self.open), ("closed", self.closed)] {
            if !r.is_valid() {
                return Err(MarkerError::Inverted {
                    which,
                    min: r.min,
                    max: r.max,
                });
            }
        }
        if self.open.intersects(&self.closed) {
            return Err(MarkerError::Overlap {
                open: self.open.to_string(),
                closed: self.closed.to_string(),
            });
        }
        Ok(())
    }

    /// Door is strictly between the two stop ranges.
    ///
    /// Orientation follows the ranges: if the open range lies above the closed
    /// range, travel positions are above `closed.max` and below `open.min`.
    pub const fn is_between(&self, pos: u16) -> bool {
        if self.open.min > self.closed.max {
            pos > self.closed.max && pos < self.open.min
        } else {
            pos > self.open.max && pos < self.closed.min
        }
    }

    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[0] = MAGIC;
        out[1] = VERSION;
        let fields = [
            self.open.min,
            self.open.max,
            self.closed.min,
            self.closed.max,
            self.travel.total_cs,
            self.travel.opening_lead_cs,
            self.travel.closing_lead_cs,
        ];
        for (i, v) in fields.iter().enumerate() {
            let at = 2 + i * 2;
            out[at..at + 2].copy_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// Strict decode: exact length, magic, version and a valid marker pair.
    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, MarkerError> {
        if bytes.len() != RECORD_LEN {
            return Err(MarkerError::Parse(format!(
                "record is {} bytes, expected {RECORD_LEN}",
                bytes.len()
            )));
        }
        if bytes[0] != MAGIC || bytes[1] != VERSION {
            return Err(MarkerError::Parse(format!(
                "bad header {:#04x} v{}",
                bytes[0], bytes[1]
            )));
        }
        let field = |i: usize| {
            let at = 2 + i * 2;
            u16::from_le_bytes([bytes[at], bytes[at + 1]])
        };
        let rec = Self {
            open: PositionRange::new(field(0), field(1)),
            closed: PositionRange::new(field(2), field(3)),
            travel: TravelInfo {
                total_cs: field(4),
                opening_lead_cs: field(5),
                closing_lead_cs: field(6),
            },
        };
        rec.validate()?;
        Ok(rec)
    }

    /// Load `key` from the store, falling back to `default` when the entry is
    /// missing or structurally invalid. Store I/O failures also fall back.
    pub fn load_or_default(store: &mut dyn KeyValueStore, key: &str, default: Self) -> Self {
        match store.load(key) {
            Ok(Some(bytes)) => match Self::decode(&bytes) {
                Ok(rec) => rec,
                Err(e) => {
                    tracing::warn!(key, error = %e, "stored calibration invalid, using default");
                    default
                }
            },
            Ok(None) => {
                tracing::info!(key, "no stored calibration, using default");
                default
            }
            Err(e) => {
                tracing::warn!(key, error = %map_hw_error(e.as_ref()), "calibration load failed, using default");
                default
            }
        }
    }

    pub fn save(&self, store: &mut dyn KeyValueStore, key: &str) -> Result<()> {
        self.validate().map_err(DoorError::from)?;
        store
            .save(key, &self.encode())
            .map_err(|e| map_hw_error(e.as_ref()))?;
        Ok(())
    }
}

impl fmt::Display for CalibrationRecord {
    /// `OpenMin;OpenMax;ClosedMin;ClosedMax;TotalSecs;OpeningSecs;ClosingSecs`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{};{};{:.2};{:.2};{:.2}",
            self.open.min,
            self.open.max,
            self.closed.min,
            self.closed.max,
            cs_to_secs(self.travel.total_cs),
            cs_to_secs(self.travel.opening_lead_cs),
            cs_to_secs(self.travel.closing_lead_cs),
        )
    }
}

impl FromStr for CalibrationRecord {
    type Err = MarkerError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(';').map(str::trim).collect();
        if parts.len() != 7 {
            return Err(MarkerError::Parse(format!(
                "expected 7 fields, got {}",
                parts.len()
            )));
        }
        let pos = |i: usize| {
            parts[i]
                .parse::<u16>()
                .map_err(|e| MarkerError::Parse(format!("field {}: {e}", i + 1)))
        };
        let secs = |i: usize| {
            parts[i]
                .parse::<f32>()
                .map(secs_to_cs_u16)
                .map_err(|e| MarkerError::Parse(format!("field {}: {e}", i + 1)))
        };
        let rec = Self {
            open: PositionRange::new(pos(0)?, pos(1)?),
            closed: PositionRange::new(pos(2)?, pos(3)?),
            travel: TravelInfo {
                total_cs: secs(4)?,
                opening_lead_cs: secs(5)?,
                closing_lead_cs: secs(6)?,
            },
        };
        rec.validate()?;
        Ok(rec)
    }
}
