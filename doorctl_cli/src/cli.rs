//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[inline]
pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(name = "doorctl", version, about = "Garage door controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/doorctl.toml")]
    pub config: PathBuf,

    /// Log and print results as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Which stop range `learn-range` proposes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Side {
    Open,
    Closed,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the control loop until Ctrl-C (or for a fixed time)
    Run {
        /// Stop after this many seconds
        #[arg(long, value_name = "SECS")]
        seconds: Option<u64>,
        /// Read hub commands from stdin, one per line
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Read hub commands from stdin, one per line:\n  open | close        set the target state\n  trigger             press the opener button\n  save                persist the calibration record\n  learn-open | learn-closed | learn-travel\n  clear-log           drop the event history\nUnknown lines are logged and ignored."
        )]
        stdin: bool,
    },
    /// Take one blocking distance measurement
    SelfCheck,
    /// Show or replace the stored position markers
    Markers {
        /// New record: OpenMin;OpenMax;ClosedMin;ClosedMax;TotalSecs;OpeningSecs;ClosingSecs
        #[arg(long, value_name = "RECORD", allow_hyphen_values = true)]
        set: Option<String>,
    },
    /// Propose a stop range from an event-log dump
    LearnRange {
        /// Dump file with `index;position;eventCode` lines
        #[arg(long, value_name = "FILE")]
        dump: PathBuf,
        /// Stop range the samples were taken at
        #[arg(long, value_enum)]
        side: Side,
        /// Only use the last N position samples
        #[arg(long, value_name = "N")]
        window: Option<usize>,
    },
}
