//! Persisted hero records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use arena_protocol::{HeroId, PlayerId, ZoneId};

use crate::error::StoreError;

/// A player's active hero as stored between fights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroSnapshot {
    pub hero_id: HeroId,
    pub player_id: PlayerId,
    pub name: String,
    pub level: u32,
    /// Progress toward the next level.
    pub experience: u32,
    pub health: i32,
    pub max_health: i32,
    pub power: i32,
    pub max_power: i32,
    pub attack: i32,
    pub defense: i32,
    /// The player opted into resting, doubling out-of-combat recovery.
    pub resting: bool,
}

impl HeroSnapshot {
    /// Eligible to queue or enter combat.
    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Below max health or power.
    pub fn needs_regen(&self) -> bool {
        self.health < self.max_health || self.power < self.max_power
    }
}

/// Hero persistence.
#[async_trait]
pub trait HeroStore: Send + Sync {
    /// The player's active hero, if any.
    async fn active_hero(&self, player: PlayerId) -> Result<Option<HeroSnapshot>, StoreError>;

    /// Write back current health and power.
    async fn save_vitals(&self, hero: HeroId, health: i32, power: i32) -> Result<(), StoreError>;

    /// Write back level and experience progress.
    async fn save_progress(
        &self,
        hero: HeroId,
        level: u32,
        experience: u32,
    ) -> Result<(), StoreError>;

    /// Add health and power to whatever is stored now, capped at max, in a
    /// single read-modify-write. Returns the stored values afterwards.
    async fn regen_vitals(
        &self,
        hero: HeroId,
        health: i32,
        power: i32,
    ) -> Result<(i32, i32), StoreError>;

    /// Every hero below max health or power.
    async fn heroes_needing_regen(&self) -> Result<Vec<HeroSnapshot>, StoreError>;

    /// Record the zone the player is now in.
    async fn set_player_zone(&self, player: PlayerId, zone: ZoneId) -> Result<(), StoreError>;
}
