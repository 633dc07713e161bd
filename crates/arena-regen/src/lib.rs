//! Out-of-combat recovery.
//!
//! A periodic sweep over every persisted hero below max health or power.
//! Heroes whose player is fighting are left alone; the combat engine owns
//! their vitals until the fight ends and writes them back itself.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use arena_combat::CombatEngine;
use arena_config::RegenConfig;
use arena_protocol::PlayerId;
use arena_store::{HeroSnapshot, HeroStore, StoreError};

/// Answers whether a player is currently owned by a combat instance.
pub trait CombatPresence: Send + Sync {
    fn in_active_combat(&self, player: PlayerId) -> bool;
}

impl CombatPresence for CombatEngine {
    fn in_active_combat(&self, player: PlayerId) -> bool {
        self.is_in_active_combat(player)
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegenReport {
    pub updated: usize,
    pub skipped_in_combat: usize,
    pub failed: usize,
}

/// Health and power a hero recovers in one sweep: a fraction of max with a
/// floor, multiplied while resting, never past max.
pub fn regen_amounts(config: &RegenConfig, hero: &HeroSnapshot) -> (i32, i32) {
    let multiplier = if hero.resting { config.resting_multiplier.max(1) } else { 1 };
    let gain = |max: i32, fraction: f32, floor: i32| {
        ((max as f32 * fraction).floor() as i32).max(floor) * multiplier
    };
    let health = gain(hero.max_health, config.health_fraction, config.min_health)
        .min(hero.max_health - hero.health)
        .max(0);
    let power = gain(hero.max_power, config.power_fraction, config.min_power)
        .min(hero.max_power - hero.power)
        .max(0);
    (health, power)
}

pub struct RegenSweep {
    config: RegenConfig,
    heroes: Arc<dyn HeroStore>,
    combat: Arc<dyn CombatPresence>,
}

impl RegenSweep {
    pub fn new(
        config: RegenConfig,
        heroes: Arc<dyn HeroStore>,
        combat: Arc<dyn CombatPresence>,
    ) -> Self {
        Self {
            config,
            heroes,
            combat,
        }
    }

    pub fn config(&self) -> &RegenConfig {
        &self.config
    }

    /// Regenerate every eligible hero. Players in `online` go first; everyone
    /// eligible is still updated in the same pass. A failed write is logged
    /// and counted without stopping the sweep.
    pub async fn sweep(
        &self,
        online: Option<&HashSet<PlayerId>>,
    ) -> Result<RegenReport, StoreError> {
        let mut heroes = self.heroes.heroes_needing_regen().await?;
        if let Some(online) = online {
            heroes.sort_by_key(|h| !online.contains(&h.player_id));
        }

        let mut report = RegenReport::default();
        for hero in heroes {
            if self.combat.in_active_combat(hero.player_id) {
                report.skipped_in_combat += 1;
                continue;
            }
            let (health, power) = regen_amounts(&self.config, &hero);
            if health == 0 && power == 0 {
                continue;
            }
            // Applied as a delta: combat may have written this hero since the
            // snapshot was read.
            match self.heroes.regen_vitals(hero.hero_id, health, power).await {
                Ok(_) => report.updated += 1,
                Err(e) => {
                    warn!("Regen write failed for {}: {e}", hero.hero_id);
                    report.failed += 1;
                }
            }
        }
        debug!(
            "Regen sweep: {} updated, {} in combat, {} failed",
            report.updated, report.skipped_in_combat, report.failed
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use tokio::sync::Notify;

    use async_trait::async_trait;
    use arena_protocol::{HeroId, ZoneId};
    use arena_store::MemoryStore;

    struct Fighting(HashSet<PlayerId>);

    impl CombatPresence for Fighting {
        fn in_active_combat(&self, player: PlayerId) -> bool {
            self.0.contains(&player)
        }
    }

    fn hero(id: u64, health: i32, power: i32, resting: bool) -> HeroSnapshot {
        HeroSnapshot {
            hero_id: HeroId(id),
            player_id: PlayerId(id),
            name: format!("hero-{id}"),
            level: 1,
            experience: 0,
            health,
            max_health: 200,
            power,
            max_power: 100,
            attack: 10,
            defense: 4,
            resting,
        }
    }

    #[test]
    fn test_amounts_use_fraction_and_floor() {
        let config = RegenConfig::default();
        // 2% of 200 = 4 health; 5% of 100 = 5 power.
        assert_eq!(regen_amounts(&config, &hero(1, 50, 10, false)), (4, 5));

        let small = HeroSnapshot {
            max_health: 50,
            max_power: 20,
            ..hero(1, 10, 10, false)
        };
        // Floors of 2 beat 1 and 1.
        assert_eq!(regen_amounts(&config, &small), (2, 2));
    }

    #[test]
    fn test_resting_doubles() {
        let config = RegenConfig::default();
        assert_eq!(regen_amounts(&config, &hero(1, 50, 10, true)), (8, 10));
    }

    #[test]
    fn test_amounts_capped_at_max() {
        let config = RegenConfig::default();
        assert_eq!(regen_amounts(&config, &hero(1, 199, 100, false)), (1, 0));
    }

    #[tokio::test]
    async fn test_sweep_skips_fighters() {
        let store = Arc::new(MemoryStore::new());
        store.insert_hero(hero(1, 50, 10, false)).await;
        store.insert_hero(hero(2, 50, 10, false)).await;
        store.insert_hero(hero(3, 200, 100, false)).await;
        let fighting = Arc::new(Fighting(HashSet::from([PlayerId(2)])));
        let sweep = RegenSweep::new(RegenConfig::default(), store.clone(), fighting);

        let report = sweep.sweep(None).await.unwrap();
        assert_eq!(
            report,
            RegenReport {
                updated: 1,
                skipped_in_combat: 1,
                failed: 0
            }
        );
        assert_eq!(store.hero(HeroId(1)).await.unwrap().health, 54);
        assert_eq!(store.hero(HeroId(2)).await.unwrap().health, 50);
    }

    #[tokio::test]
    async fn test_failed_write_does_not_stop_sweep() {
        let store = Arc::new(MemoryStore::new());
        store.insert_hero(hero(1, 50, 10, false)).await;
        store.insert_hero(hero(2, 50, 10, false)).await;
        store.fail_writes_for(HeroId(1)).await;
        let idle = Arc::new(Fighting(HashSet::new()));
        let sweep = RegenSweep::new(RegenConfig::default(), store.clone(), idle);

        let report = sweep.sweep(None).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(store.hero(HeroId(2)).await.unwrap().power, 15);
    }

    /// Records the order heroes are written in.
    struct Recording {
        heroes: Vec<HeroSnapshot>,
        writes: Mutex<Vec<HeroId>>,
    }

    #[async_trait]
    impl HeroStore for Recording {
        async fn active_hero(&self, _: PlayerId) -> Result<Option<HeroSnapshot>, StoreError> {
            Ok(None)
        }

        async fn save_vitals(&self, _: HeroId, _: i32, _: i32) -> Result<(), StoreError> {
            Ok(())
        }

        async fn save_progress(&self, _: HeroId, _: u32, _: u32) -> Result<(), StoreError> {
            Ok(())
        }

        async fn regen_vitals(
            &self,
            hero: HeroId,
            _: i32,
            _: i32,
        ) -> Result<(i32, i32), StoreError> {
            self.writes.lock().unwrap().push(hero);
            Ok((0, 0))
        }

        async fn heroes_needing_regen(&self) -> Result<Vec<HeroSnapshot>, StoreError> {
            Ok(self.heroes.clone())
        }

        async fn set_player_zone(&self, _: PlayerId, _: ZoneId) -> Result<(), StoreError> {
            Ok(())
        }
    }

    /// Holds the first regen write until released, so other writers can
    /// land in between.
    struct Held {
        inner: Arc<MemoryStore>,
        reached: Notify,
        release: Notify,
        held: AtomicBool,
    }

    #[async_trait]
    impl HeroStore for Held {
        async fn active_hero(&self, player: PlayerId) -> Result<Option<HeroSnapshot>, StoreError> {
            self.inner.active_hero(player).await
        }

        async fn save_vitals(
            &self,
            hero: HeroId,
            health: i32,
            power: i32,
        ) -> Result<(), StoreError> {
            self.inner.save_vitals(hero, health, power).await
        }

        async fn save_progress(&self, hero: HeroId, level: u32, xp: u32) -> Result<(), StoreError> {
            self.inner.save_progress(hero, level, xp).await
        }

        async fn regen_vitals(
            &self,
            hero: HeroId,
            health: i32,
            power: i32,
        ) -> Result<(i32, i32), StoreError> {
            if !self.held.swap(true, Ordering::SeqCst) {
                self.reached.notify_one();
                self.release.notified().await;
            }
            self.inner.regen_vitals(hero, health, power).await
        }

        async fn heroes_needing_regen(&self) -> Result<Vec<HeroSnapshot>, StoreError> {
            self.inner.heroes_needing_regen().await
        }

        async fn set_player_zone(&self, player: PlayerId, zone: ZoneId) -> Result<(), StoreError> {
            self.inner.set_player_zone(player, zone).await
        }
    }

    #[tokio::test]
    async fn test_sweep_keeps_combat_write_landing_mid_sweep() {
        let memory = Arc::new(MemoryStore::new());
        memory.insert_hero(hero(1, 150, 10, false)).await;
        memory.insert_hero(hero(2, 160, 10, false)).await;
        let store = Arc::new(Held {
            inner: memory.clone(),
            reached: Notify::new(),
            release: Notify::new(),
            held: AtomicBool::new(false),
        });
        let sweep = Arc::new(RegenSweep::new(
            RegenConfig::default(),
            store.clone(),
            Arc::new(Fighting(HashSet::new())),
        ));

        let online = HashSet::from([PlayerId(1)]);
        let task = {
            let sweep = Arc::clone(&sweep);
            tokio::spawn(async move { sweep.sweep(Some(&online)).await })
        };
        store.reached.notified().await;

        // A fight ends for hero 2 while the sweep is parked on hero 1.
        memory.save_vitals(HeroId(2), 10, 0).await.unwrap();
        store.release.notify_one();

        let report = task.await.unwrap().unwrap();
        assert_eq!(report.updated, 2);
        let hero2 = memory.hero(HeroId(2)).await.unwrap();
        // 2% of 200 on top of what the fight left, not on the stale 160.
        assert_eq!(hero2.health, 14);
        assert_eq!(hero2.power, 5);
    }

    #[tokio::test]
    async fn test_online_players_first() {
        let store = Arc::new(Recording {
            heroes: vec![hero(1, 50, 10, false), hero(2, 50, 10, false), hero(3, 50, 10, false)],
            writes: Mutex::new(Vec::new()),
        });
        let idle = Arc::new(Fighting(HashSet::new()));
        let sweep = RegenSweep::new(RegenConfig::default(), store.clone(), idle);
        let online = HashSet::from([PlayerId(3)]);

        sweep.sweep(Some(&online)).await.unwrap();
        assert_eq!(
            *store.writes.lock().unwrap(),
            vec![HeroId(3), HeroId(1), HeroId(2)]
        );
    }
}
