//! Configuration structs with sensible defaults and RON persistence.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use arena_protocol::{CombatKind, EnemyKind};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Loop cadence and housekeeping.
    pub server: ServerConfig,
    /// Combat resolution rules.
    pub combat: CombatConfig,
    /// Enemy perception and movement.
    pub ai: AiConfig,
    /// Queue table and handoff timing.
    pub matchmaking: MatchmakingConfig,
    /// Out-of-combat recovery.
    pub regen: RegenConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Loop cadence and housekeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Period of the combat tick loop in milliseconds.
    pub combat_tick_ms: u64,
    /// How long an empty zone stays in memory, in seconds.
    pub zone_idle_secs: u64,
    /// Period of the zone eviction / instance reaping sweep, in seconds.
    pub maintenance_interval_secs: u64,
}

/// Combat resolution rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CombatConfig {
    /// Seconds with no connected participant before an instance is abandoned.
    pub abandon_timeout_secs: u64,
    /// Seconds ended instances keep their combatant records.
    pub cleanup_grace_secs: u64,
    /// Capacity of each instance's action log.
    pub action_log_capacity: usize,
    /// Power restored to each living combatant per combat tick.
    pub power_regen_per_tick: i32,
    /// Distance between players placed around an arena spawn point.
    pub spawn_spread: f32,
    /// Experience rewards.
    pub experience: ExperienceConfig,
    /// Stat block for enemies spawned without explicit stats.
    pub default_enemy: EnemyStatsConfig,
}

/// Experience awarded when a combat instance ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExperienceConfig {
    pub victory_bonus: u32,
    pub draw_bonus: u32,
    pub defeat_bonus: u32,
    pub abandoned_bonus: u32,
    pub per_enemy_kill: u32,
    pub per_pvp_opponent: u32,
    /// Floor applied to the total award.
    pub minimum: u32,
}

/// Base numbers for an enemy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnemyStatsConfig {
    pub health: i32,
    pub power: i32,
    pub attack: i32,
    pub defense: i32,
}

/// Enemy perception and movement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AiConfig {
    /// AI loop frequency in Hz.
    pub tick_rate_hz: u32,
    /// Radius within which an enemy can notice a player.
    pub detection_radius: f32,
    /// Half-angle of the forward vision cone, in degrees.
    pub fov_half_angle_deg: f32,
    pub melee_range: f32,
    pub cast_range: f32,
    pub attack_cooldown_ms: u64,
    pub cast_cooldown_ms: u64,
    /// Multiplier on attack used as the base damage of a cast.
    pub cast_damage_multiplier: f32,
    pub melee_speed: f32,
    pub caster_speed: f32,
    pub tank_speed: f32,
    /// Fraction of chase speed used while wandering.
    pub wander_speed_factor: f32,
    pub wander_min_ms: u64,
    pub wander_max_ms: u64,
    /// Fixed seed for wander decisions. Random when unset.
    pub rng_seed: Option<u64>,
}

/// Queue table and handoff timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchmakingConfig {
    pub queues: Vec<QueueConfig>,
    /// Pause between handoff phases, in milliseconds.
    pub settle_delay_ms: u64,
    /// Radius of the first enemy on the PvE spawn ring.
    pub spawn_ring_radius: f32,
    /// Radius added per subsequent enemy.
    pub spawn_ring_step: f32,
}

/// One matchmaking queue type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueConfig {
    pub name: String,
    pub kind: CombatKind,
    pub min_players: usize,
    pub max_players: usize,
    pub countdown_secs: u32,
    pub team_size: usize,
    /// Enemy composition at full population.
    #[serde(default)]
    pub enemies: Vec<EnemySpawnConfig>,
}

/// Enemy composition entry for PvE queues.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnemySpawnConfig {
    pub kind: EnemyKind,
    pub count: u32,
    /// Overrides the default enemy stat block.
    #[serde(default)]
    pub stats: Option<EnemyStatsConfig>,
}

/// Out-of-combat recovery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegenConfig {
    /// Sweep period in seconds.
    pub interval_secs: u64,
    /// Fraction of max health restored per sweep.
    pub health_fraction: f32,
    /// Fraction of max power restored per sweep.
    pub power_fraction: f32,
    pub min_health: i32,
    pub min_power: i32,
    /// Multiplier applied while the player is resting.
    pub resting_multiplier: i32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            combat_tick_ms: 1000,
            zone_idle_secs: 60,
            maintenance_interval_secs: 5,
        }
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            abandon_timeout_secs: 15,
            cleanup_grace_secs: 5,
            action_log_capacity: 100,
            power_regen_per_tick: 1,
            spawn_spread: 2.0,
            experience: ExperienceConfig::default(),
            default_enemy: EnemyStatsConfig::default(),
        }
    }
}

impl Default for ExperienceConfig {
    fn default() -> Self {
        Self {
            victory_bonus: 50,
            draw_bonus: 25,
            defeat_bonus: 10,
            abandoned_bonus: 0,
            per_enemy_kill: 15,
            per_pvp_opponent: 20,
            minimum: 10,
        }
    }
}

impl Default for EnemyStatsConfig {
    fn default() -> Self {
        Self {
            health: 100,
            power: 50,
            attack: 10,
            defense: 5,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 20,
            detection_radius: 15.0,
            fov_half_angle_deg: 60.0,
            melee_range: 2.5,
            cast_range: 12.0,
            attack_cooldown_ms: 1500,
            cast_cooldown_ms: 3000,
            cast_damage_multiplier: 1.5,
            melee_speed: 3.0,
            caster_speed: 2.5,
            tank_speed: 1.8,
            wander_speed_factor: 0.4,
            wander_min_ms: 2000,
            wander_max_ms: 5000,
            rng_seed: None,
        }
    }
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            queues: vec![
                QueueConfig {
                    name: "duel".to_string(),
                    kind: CombatKind::Pvp,
                    min_players: 2,
                    max_players: 2,
                    countdown_secs: 5,
                    team_size: 1,
                    enemies: Vec::new(),
                },
                QueueConfig {
                    name: "skirmish".to_string(),
                    kind: CombatKind::TeamPvp,
                    min_players: 4,
                    max_players: 4,
                    countdown_secs: 10,
                    team_size: 2,
                    enemies: Vec::new(),
                },
                QueueConfig {
                    name: "dungeon".to_string(),
                    kind: CombatKind::Pve,
                    min_players: 1,
                    max_players: 4,
                    countdown_secs: 5,
                    team_size: 4,
                    enemies: vec![
                        EnemySpawnConfig {
                            kind: EnemyKind::Melee,
                            count: 4,
                            stats: None,
                        },
                        EnemySpawnConfig {
                            kind: EnemyKind::Caster,
                            count: 2,
                            stats: None,
                        },
                    ],
                },
                QueueConfig {
                    name: "raid".to_string(),
                    kind: CombatKind::TeamPve,
                    min_players: 2,
                    max_players: 6,
                    countdown_secs: 10,
                    team_size: 3,
                    enemies: vec![
                        EnemySpawnConfig {
                            kind: EnemyKind::Melee,
                            count: 6,
                            stats: None,
                        },
                        EnemySpawnConfig {
                            kind: EnemyKind::Caster,
                            count: 3,
                            stats: None,
                        },
                        EnemySpawnConfig {
                            kind: EnemyKind::Tank,
                            count: 2,
                            stats: Some(EnemyStatsConfig {
                                health: 300,
                                power: 20,
                                attack: 14,
                                defense: 20,
                            }),
                        },
                    ],
                },
            ],
            settle_delay_ms: 250,
            spawn_ring_radius: 6.0,
            spawn_ring_step: 1.5,
        }
    }
}

impl Default for RegenConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            health_fraction: 0.02,
            power_fraction: 0.05,
            min_health: 2,
            min_power: 2,
            resting_multiplier: 2,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// --- Derived values ---

impl ServerConfig {
    pub fn combat_tick(&self) -> Duration {
        Duration::from_millis(self.combat_tick_ms.max(1))
    }

    pub fn zone_idle(&self) -> Duration {
        Duration::from_secs(self.zone_idle_secs)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs.max(1))
    }
}

impl CombatConfig {
    pub fn abandon_timeout(&self) -> Duration {
        Duration::from_secs(self.abandon_timeout_secs)
    }

    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_secs(self.cleanup_grace_secs)
    }
}

impl AiConfig {
    /// Duration of one AI frame.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }
}

impl MatchmakingConfig {
    /// Look up a queue definition by name.
    pub fn queue(&self, name: &str) -> Option<&QueueConfig> {
        self.queues.iter().find(|q| q.name == name)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl RegenConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

// --- Load / Save / Reload ---

/// Default location of `config.ron` (the platform config dir, falling back to
/// the working directory).
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("arena-server"))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            config.validate()?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(4)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
        new_config.validate()?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Reject queue tables the matchmaker cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for queue in &self.matchmaking.queues {
            let bounds_ok = queue.min_players >= 1 && queue.min_players <= queue.max_players;
            if !bounds_ok || !names.insert(queue.name.as_str()) {
                return Err(ConfigError::InvalidQueue(queue.name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(4))
                .unwrap();
        assert!(ron_str.contains("abandon_timeout_secs: 15"));
        assert!(ron_str.contains("action_log_capacity: 100"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(server: (), combat: (), debug: ())";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.regen, RegenConfig::default());
        assert_eq!(config.matchmaking, MatchmakingConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_default_queues_present() {
        let mm = MatchmakingConfig::default();
        let duel = mm.queue("duel").unwrap();
        assert_eq!(duel.kind, CombatKind::Pvp);
        assert_eq!((duel.min_players, duel.max_players), (2, 2));
        assert!(mm.queue("dungeon").unwrap().kind.is_pve());
        assert!(mm.queue("nope").is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.combat.abandon_timeout_secs = 30;
        config.ai.tick_rate_hz = 30;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.regen.interval_secs = 10;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert_eq!(result.unwrap().regen.interval_secs, 10);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();
        assert!(config.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_queue_rejected() {
        let mut config = Config::default();
        let duel = config.matchmaking.queues[0].clone();
        config.matchmaking.queues.push(duel);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidQueue(name)) if name == "duel"
        ));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut config = Config::default();
        config.matchmaking.queues[0].min_players = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ai_tick_interval() {
        let ai = AiConfig::default();
        assert_eq!(ai.tick_interval(), Duration::from_millis(50));
    }
}
