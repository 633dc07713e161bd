//! Command-line argument parsing for the arena server.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Arena server command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "arena-server", about = "Authoritative combat and matchmaking server")]
pub struct CliArgs {
    /// Combat tick period in milliseconds.
    #[arg(long)]
    pub combat_tick_ms: Option<u64>,

    /// Enemy AI frequency in Hz.
    #[arg(long)]
    pub ai_tick_rate: Option<u32>,

    /// Regeneration sweep period in seconds.
    #[arg(long)]
    pub regen_interval: Option<u64>,

    /// Pause between matchmaking handoff phases, in milliseconds.
    #[arg(long)]
    pub settle_delay_ms: Option<u64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Directory for JSON log files (debug builds only).
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ms) = args.combat_tick_ms {
            self.server.combat_tick_ms = ms;
        }
        if let Some(hz) = args.ai_tick_rate {
            self.ai.tick_rate_hz = hz;
        }
        if let Some(secs) = args.regen_interval {
            self.regen.interval_secs = secs;
        }
        if let Some(ms) = args.settle_delay_ms {
            self.matchmaking.settle_delay_ms = ms;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
