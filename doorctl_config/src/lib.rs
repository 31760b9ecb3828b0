#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and diagnostic-dump parsing for the door controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The `;`-separated event-log dump (`index;position;eventCode`) can be
//!   loaded back for offline stop-range learning.
use serde::Deserialize;

/// One line of an event-log dump.
///
/// Example:
/// ```text
/// 0;187;0
/// 1;0;22
/// ```
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct DumpRow {
    pub index: usize,
    pub position: u16,
    pub code: u8,
}

/// BCM pin numbers; only read by hardware builds.
#[derive(Debug, Deserialize)]
pub struct Pins {
    pub trigger: u8,
    pub echo: u8,
    pub motor: u8,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RangingCfg {
    pub stressed_hz: u32,
    pub relaxed_hz: u32,
    /// Echo round-trip microseconds per centimetre (~58 at room temperature)
    pub us_per_cm: u32,
    pub max_round_trip_us: u32,
    pub min_valid_cm: u16,
    pub max_valid_cm: u16,
    pub median_window: usize,
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlCfg {
    pub cycle_hz: u32,
    /// Cycles an Open/Closed classification is held before re-evaluation
    pub cooldown_cycles: u8,
    pub wrong_direction_timeout_ms: u64,
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LearningCfg {
    pub sigma_ceiling: f32,
    pub sigma_floor: f32,
    pub sigma_factor: f32,
    pub safety_margin: u16,
    /// Runs whose lead time is at or below this are taps, not travel (centiseconds)
    pub min_lead_cs: u16,
    pub max_lead_cs: u16,
    pub min_total_cs: u16,
    pub max_total_cs: u16,
    pub recent_runs: usize,
    pub learn_window: usize,
}

impl Default for LearningCfg {
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EventLogCfg {
    pub capacity: usize,
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageCfg {
    /// Directory of the file-backed key/value store; in-memory when absent
    pub dir: Option<String>,
    pub key: String,
}

impl Default for StorageCfg {
    fn default() -> Self {
        Self {
            dir: None,
            key: "calib".to_owned(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Simulated door used by builds without the `hardware` feature.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimCfg {
    pub closed_cm: u16,
    pub open_cm: u16,
    /// Full travel time between the end positions
    pub travel_ms: u64,
    pub noise_cm: u16,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            closed_cm: 250,
            open_cm: 30,
            travel_ms: 12_000,
            noise_cm: 1,
        }
    }
}

/// Operator-supplied fallback markers, used when the store has no valid record.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct DefaultCalibration {
    pub open_min: u16,
    pub open_max: u16,
    pub closed_min: u16,
    pub closed_max: u16,
    #[serde(default)]
    pub total_secs: f32,
    #[serde(default)]
    pub opening_secs: f32,
    #[serde(default)]
    pub closing_secs: f32,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub ranging: RangingCfg,
    #[serde(default)]
    pub control: ControlCfg,
    #[serde(default)]
    pub learning: LearningCfg,
    #[serde(default)]
    pub event_log: EventLogCfg,
    #[serde(default)]
    pub storage: StorageCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub calibration: Option<DefaultCalibration>,
    #[serde(default)]
    pub sim: SimCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Parse an event-log dump from any reader.
pub fn parse_position_dump(reader: impl std::io::Read) -> eyre::Result<Vec<DumpRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b';')
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<DumpRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid dump line {}: {}", idx + 1, e);
            }
        }
    }
    Ok(rows)
}

pub fn load_position_dump(path: &std::path::Path) -> eyre::Result<Vec<DumpRow>> {
    let file = std::fs::File::open(path)
        .map_err(|e| eyre::eyre!("open position dump {:?}: {}", path, e))?;
    parse_position_dump(file)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Ranging
        if self.ranging.stressed_hz == 0 {
            eyre::bail!("ranging.stressed_hz must be > 0");
        }
        if self.ranging.relaxed_hz == 0 {
            eyre::bail!("ranging.relaxed_hz must be > 0");
        }
        if self.ranging.relaxed_hz > self.ranging.stressed_hz {
            eyre::bail!("ranging.relaxed_hz must be <= ranging.stressed_hz");
        }
        if self.ranging.us_per_cm == 0 {
            eyre::bail!("ranging.us_per_cm must be > 0");
        }
        if self.ranging.max_round_trip_us == 0 {
            eyre::bail!("ranging.max_round_trip_us must be > 0");
        }
        if self.ranging.min_valid_cm > self.ranging.max_valid_cm {
            eyre::bail!("ranging.min_valid_cm must be <= ranging.max_valid_cm");
        }
        if self.ranging.median_window == 0 {
            eyre::bail!("ranging.median_window must be >= 1");
        }
        if self.ranging.pulse_us == 0 || self.ranging.pulse_us > 1_000 {
            eyre::bail!("ranging.pulse_us must be in [1, 1000]");
        }

        // Control
        if self.control.cycle_hz == 0 {
            eyre::bail!("control.cycle_hz must be > 0");
        }
        if self.control.trigger_pulse_ms == 0 || self.control.trigger_pulse_ms > 2_000 {
            eyre::bail!("control.trigger_pulse_ms must be in [1, 2000]");
        }
        if self.control.wrong_direction_timeout_ms > 10 * 60 * 1000 {
            eyre::bail!("control.wrong_direction_timeout_ms is unreasonably large (>10min)");
        }

        // Learning
        let l = &self.learning;
        if !(l.sigma_ceiling.is_finite() && l.sigma_ceiling > 0.0) {
            eyre::bail!("learning.sigma_ceiling must be > 0");
        }
        if !(l.sigma_floor.is_finite() && l.sigma_floor >= 0.0) {
            eyre::bail!("learning.sigma_floor must be >= 0");
        }
        if !(l.sigma_factor.is_finite() && l.sigma_factor > 0.0) {
            eyre::bail!("learning.sigma_factor must be > 0");
        }
        if l.min_lead_cs >= l.max_lead_cs {
            eyre::bail!("learning.min_lead_cs must be < learning.max_lead_cs");
        }
        if l.min_total_cs >= l.max_total_cs {
            eyre::bail!("learning.min_total_cs must be < learning.max_total_cs");
        }
        if l.recent_runs == 0 {
            eyre::bail!("learning.recent_runs must be >= 1");
        }
        if l.learn_window == 0 {
            eyre::bail!("learning.learn_window must be >= 1");
        }

        // Event log
        if self.event_log.capacity == 0 {
            eyre::bail!("event_log.capacity must be >= 1");
        }
        if self.event_log.transition_capacity < 4 {
            eyre::bail!("event_log.transition_capacity must be >= 4");
        }

        // Storage
        let key_ok = !self.storage.key.is_empty()
            && self
                .storage
                .key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !key_ok {
            eyre::bail!("storage.key must be non-empty [A-Za-z0-9_-]");
        }

        // Simulation
        if self.sim.travel_ms == 0 {
            eyre::bail!("sim.travel_ms must be > 0");
        }
        if self.sim.open_cm == self.sim.closed_cm {
            eyre::bail!("sim.open_cm must differ from sim.closed_cm");
        }

        // Calibration fallback
        if let Some(c) = &self.calibration {
            if c.open_min == 0 || c.open_min > c.open_max {
                eyre::bail!("calibration.open_min must be in [1, open_max]");
            }
            if c.closed_min == 0 || c.closed_min > c.closed_max {
                eyre::bail!("calibration.closed_min must be in [1, closed_max]");
            }
            if c.open_min <= c.closed_max && c.closed_min <= c.open_max {
                eyre::bail!("calibration open and closed ranges must not overlap");
            }
            for (name, v) in [
                ("total_secs", c.total_secs),
                ("opening_secs", c.opening_secs),
                ("closing_secs", c.closing_secs),
            ] {
                if !v.is_finite() || v < 0.0 {
                    eyre::bail!("calibration.{name} must be >= 0");
                }
            }
        }

        Ok(())
    }
}
