//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// A remote preset scheduled for a given tick of `run`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScheduledRemote {
    pub code: i32,
    pub tick: u64,
}

/// Parse `CODE@TICK`, e.g. `2@10`.
pub fn parse_scheduled_remote(s: &str) -> Result<ScheduledRemote, String> {
    let (code, tick) = s
        .split_once('@')
        .ok_or_else(|| format!("expected CODE@TICK, got '{s}'"))?;
    let code = code
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("bad remote code '{code}': {e}"))?;
    let tick = tick
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("bad tick '{tick}': {e}"))?;
    Ok(ScheduledRemote { code, tick })
}

#[derive(Parser, Debug)]
#[command(name = "kettlefill", version, about = "Automatic kettle filler")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/kettlefill.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Log level (error|warn|info|debug|trace); defaults to `[logging] level`, then info
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the control loop until Ctrl-C or --max-ticks; with --virtual-time a fault also ends it
    Run {
        /// Stop after this many ticks
        #[arg(long, value_name = "N")]
        max_ticks: Option<u64>,
        /// Deliver a remote preset at a tick, e.g. `--remote 2@10` (repeatable)
        #[arg(long, value_name = "CODE@TICK", value_parser = parse_scheduled_remote)]
        remote: Vec<ScheduledRemote>,
        /// Print a status line every N ticks
        #[arg(long, value_name = "N")]
        status_every: Option<u64>,
        /// Simulated backend only: advance a virtual clock instead of sleeping
        #[arg(long, action = ArgAction::SetTrue)]
        virtual_time: bool,
    },
    /// Calibrate the raw-to-gram factor against a known mass
    CalibrateFactor {
        /// Mass of the reference weight in grams
        #[arg(long, value_name = "GRAMS")]
        known_grams: f32,
        /// Raw conversions to average (defaults to scale.factor_samples)
        #[arg(long, value_name = "N")]
        samples: Option<usize>,
        /// Skip the prompts: no tare, apply the proposed factor
        #[arg(long, action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Print the current weight, calibration record and outputs
    Status,
    /// Erase the stored calibration record (factory reset)
    ResetCalibration,
    /// Restore the default factor, keeping the empty-kettle weight
    ResetFactor,
    /// Deliver one remote preset code (1..=7 fill, 8 stop) and report the outcome
    Remote {
        #[arg(allow_negative_numbers = true)]
        code: i32,
    },
    /// Quick health check (peripherals open, load cell converting)
    SelfCheck,
}
