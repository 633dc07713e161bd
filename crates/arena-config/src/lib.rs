//! Configuration system for the arena server.
//!
//! Provides runtime-configurable settings that persist to disk as RON files.
//! Supports CLI overrides via clap, hot-reload detection, and forward/backward
//! compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    AiConfig, CombatConfig, Config, DebugConfig, EnemySpawnConfig, EnemyStatsConfig,
    ExperienceConfig, MatchmakingConfig, QueueConfig, RegenConfig, ServerConfig,
    default_config_dir,
};
pub use error::ConfigError;
