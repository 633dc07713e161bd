//! In-memory persistence backend.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use arena_protocol::{HeroId, PlayerId, ZoneId};

use crate::error::StoreError;
use crate::hero::{HeroSnapshot, HeroStore};
use crate::history::{MatchHistory, MatchRecord};
use crate::zone::{ZoneDirectory, ZoneInfo};

/// Implements [`HeroStore`], [`ZoneDirectory`] and [`MatchHistory`] over
/// plain maps.
#[derive(Default)]
pub struct MemoryStore {
    /// Hero records keyed by hero id.
    heroes: RwLock<HashMap<HeroId, HeroSnapshot>>,
    /// Player → active hero.
    active: RwLock<HashMap<PlayerId, HeroId>>,
    zones: RwLock<HashMap<ZoneId, ZoneInfo>>,
    player_zones: RwLock<HashMap<PlayerId, ZoneId>>,
    records: RwLock<Vec<MatchRecord>>,
    /// Heroes whose writes fail, for exercising partial-failure paths.
    failing: RwLock<HashSet<HeroId>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a hero and make it the player's active hero.
    pub async fn insert_hero(&self, hero: HeroSnapshot) {
        self.active
            .write()
            .await
            .insert(hero.player_id, hero.hero_id);
        self.heroes.write().await.insert(hero.hero_id, hero);
    }

    /// Insert or replace a zone definition.
    pub async fn insert_zone(&self, zone: ZoneInfo) {
        self.zones.write().await.insert(zone.id, zone);
    }

    /// Current record for a hero.
    pub async fn hero(&self, hero: HeroId) -> Option<HeroSnapshot> {
        self.heroes.read().await.get(&hero).cloned()
    }

    /// Zone last recorded for a player.
    pub async fn player_zone(&self, player: PlayerId) -> Option<ZoneId> {
        self.player_zones.read().await.get(&player).copied()
    }

    /// Every match recorded so far.
    pub async fn records(&self) -> Vec<MatchRecord> {
        self.records.read().await.clone()
    }

    /// Make every subsequent write for `hero` fail with a backend error.
    pub async fn fail_writes_for(&self, hero: HeroId) {
        self.failing.write().await.insert(hero);
    }

    async fn check_writable(&self, hero: HeroId) -> Result<(), StoreError> {
        if self.failing.read().await.contains(&hero) {
            return Err(StoreError::Backend(format!("write refused for {hero}")));
        }
        Ok(())
    }
}

#[async_trait]
impl HeroStore for MemoryStore {
    async fn active_hero(&self, player: PlayerId) -> Result<Option<HeroSnapshot>, StoreError> {
        let Some(hero_id) = self.active.read().await.get(&player).copied() else {
            return Ok(None);
        };
        Ok(self.heroes.read().await.get(&hero_id).cloned())
    }

    async fn save_vitals(&self, hero: HeroId, health: i32, power: i32) -> Result<(), StoreError> {
        self.check_writable(hero).await?;
        let mut heroes = self.heroes.write().await;
        let record = heroes.get_mut(&hero).ok_or(StoreError::UnknownHero(hero))?;
        record.health = health.clamp(0, record.max_health);
        record.power = power.clamp(0, record.max_power);
        Ok(())
    }

    async fn save_progress(
        &self,
        hero: HeroId,
        level: u32,
        experience: u32,
    ) -> Result<(), StoreError> {
        self.check_writable(hero).await?;
        let mut heroes = self.heroes.write().await;
        let record = heroes.get_mut(&hero).ok_or(StoreError::UnknownHero(hero))?;
        record.level = level;
        record.experience = experience;
        Ok(())
    }

    async fn regen_vitals(
        &self,
        hero: HeroId,
        health: i32,
        power: i32,
    ) -> Result<(i32, i32), StoreError> {
        self.check_writable(hero).await?;
        let mut heroes = self.heroes.write().await;
        let record = heroes.get_mut(&hero).ok_or(StoreError::UnknownHero(hero))?;
        record.health = record.health.saturating_add(health.max(0)).min(record.max_health);
        record.power = record.power.saturating_add(power.max(0)).min(record.max_power);
        Ok((record.health, record.power))
    }

    async fn heroes_needing_regen(&self) -> Result<Vec<HeroSnapshot>, StoreError> {
        let mut heroes: Vec<HeroSnapshot> = self
            .heroes
            .read()
            .await
            .values()
            .filter(|h| h.needs_regen())
            .cloned()
            .collect();
        heroes.sort_by_key(|h| h.hero_id);
        Ok(heroes)
    }

    async fn set_player_zone(&self, player: PlayerId, zone: ZoneId) -> Result<(), StoreError> {
        self.player_zones.write().await.insert(player, zone);
        Ok(())
    }
}

#[async_trait]
impl ZoneDirectory for MemoryStore {
    async fn zones(&self) -> Result<Vec<ZoneInfo>, StoreError> {
        let mut zones: Vec<ZoneInfo> = self.zones.read().await.values().cloned().collect();
        zones.sort_by_key(|z| z.id);
        Ok(zones)
    }

    async fn zone(&self, id: ZoneId) -> Result<Option<ZoneInfo>, StoreError> {
        Ok(self.zones.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl MatchHistory for MemoryStore {
    async fn record_match(&self, record: MatchRecord) -> Result<(), StoreError> {
        tracing::debug!(
            "Recording {} result {:?} ({} participants)",
            record.instance,
            record.result,
            record.participants.len()
        );
        self.records.write().await.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hero(player: u64, health: i32) -> HeroSnapshot {
        HeroSnapshot {
            hero_id: HeroId(player * 10),
            player_id: PlayerId(player),
            name: format!("hero{player}"),
            level: 1,
            experience: 0,
            health,
            max_health: 100,
            power: 50,
            max_power: 50,
            attack: 10,
            defense: 4,
            resting: false,
        }
    }

    #[tokio::test]
    async fn test_active_hero_lookup() {
        let store = MemoryStore::new();
        store.insert_hero(hero(1, 80)).await;
        let found = store.active_hero(PlayerId(1)).await.unwrap().unwrap();
        assert_eq!(found.health, 80);
        assert!(store.active_hero(PlayerId(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_vitals_clamps() {
        let store = MemoryStore::new();
        store.insert_hero(hero(1, 80)).await;
        store.save_vitals(HeroId(10), 500, -3).await.unwrap();
        let saved = store.hero(HeroId(10)).await.unwrap();
        assert_eq!(saved.health, 100);
        assert_eq!(saved.power, 0);
    }

    #[tokio::test]
    async fn test_unknown_hero_write_fails() {
        let store = MemoryStore::new();
        let err = store.save_progress(HeroId(99), 2, 0).await.unwrap_err();
        assert_eq!(err, StoreError::UnknownHero(HeroId(99)));
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let store = MemoryStore::new();
        store.insert_hero(hero(1, 80)).await;
        store.fail_writes_for(HeroId(10)).await;
        assert!(matches!(
            store.save_vitals(HeroId(10), 10, 10).await,
            Err(StoreError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn test_regen_candidates() {
        let store = MemoryStore::new();
        store.insert_hero(hero(1, 100)).await;
        store.insert_hero(hero(2, 40)).await;
        let needing = store.heroes_needing_regen().await.unwrap();
        assert_eq!(needing.len(), 1);
        assert_eq!(needing[0].player_id, PlayerId(2));
    }

    #[tokio::test]
    async fn test_regen_adds_to_current_value() {
        let store = MemoryStore::new();
        store.insert_hero(hero(1, 40)).await;
        store.save_vitals(HeroId(10), 10, 20).await.unwrap();

        let after = store.regen_vitals(HeroId(10), 4, 45).await.unwrap();
        assert_eq!(after, (14, 50));
        let saved = store.hero(HeroId(10)).await.unwrap();
        assert_eq!((saved.health, saved.power), (14, 50));
    }
}
