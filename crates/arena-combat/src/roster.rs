//! Registry of every live enemy, in open zones and inside instances.

use dashmap::DashMap;
use tracing::debug;

use arena_protocol::{EnemyId, EnemyKind, IdGenerator, InstanceId, MatchId, Vec3, ZoneId};

use crate::effects::EffectList;
use crate::state::{Animation, EnemyState, EnemyStats};
use crate::vitals::Vitals;

/// Enemy ids start here so they never collide visually with player ids.
const FIRST_ENEMY_ID: u64 = 10_000;

/// Everything needed to place a new enemy.
#[derive(Debug, Clone)]
pub struct EnemySeed {
    pub kind: EnemyKind,
    pub zone: ZoneId,
    pub position: Vec3,
    /// Falls back to the roster's default block.
    pub stats: Option<EnemyStats>,
    pub match_id: Option<MatchId>,
}

impl EnemySeed {
    pub fn new(kind: EnemyKind, zone: ZoneId, position: Vec3) -> Self {
        Self {
            kind,
            zone,
            position,
            stats: None,
            match_id: None,
        }
    }

    pub fn with_stats(mut self, stats: EnemyStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn for_match(mut self, match_id: MatchId) -> Self {
        self.match_id = Some(match_id);
        self
    }
}

pub struct EnemyRoster {
    pub(crate) enemies: DashMap<EnemyId, EnemyState>,
    ids: IdGenerator,
    default_stats: EnemyStats,
}

impl EnemyRoster {
    pub fn new(default_stats: EnemyStats) -> Self {
        Self {
            enemies: DashMap::new(),
            ids: IdGenerator::starting_at(FIRST_ENEMY_ID),
            default_stats,
        }
    }

    pub fn spawn(&self, seed: EnemySeed) -> EnemyId {
        let id: EnemyId = self.ids.next_id();
        let stats = seed.stats.unwrap_or(self.default_stats);
        let enemy = EnemyState {
            id,
            kind: seed.kind,
            zone: seed.zone,
            instance: None,
            match_id: seed.match_id,
            vitals: Vitals::new(stats.health, stats.health, stats.power, stats.power),
            attack: stats.attack,
            defense: stats.defense,
            position: seed.position,
            facing: 0.0,
            animation: Animation::Idle,
            affinities: seed.kind.default_affinities(),
            effects: EffectList::new(),
            last_attack: None,
            last_cast: None,
            next_wander_at: None,
        };
        debug!("Spawned {id} ({:?}) in {}", seed.kind, seed.zone);
        self.enemies.insert(id, enemy);
        id
    }

    /// Copy of an enemy's current state.
    pub fn get(&self, id: EnemyId) -> Option<EnemyState> {
        self.enemies.get(&id).map(|e| e.clone())
    }

    /// Run `f` against one enemy under its shard lock.
    pub fn with_enemy_mut<R>(
        &self,
        id: EnemyId,
        f: impl FnOnce(&mut EnemyState) -> R,
    ) -> Option<R> {
        self.enemies.get_mut(&id).map(|mut e| f(&mut e))
    }

    /// A missing enemy counts as dead.
    pub fn is_alive(&self, id: EnemyId) -> bool {
        self.enemies.get(&id).is_some_and(|e| e.is_alive())
    }

    /// Tie an enemy to an instance. Fails if it is missing or already bound
    /// elsewhere.
    pub fn bind_instance(&self, id: EnemyId, instance: InstanceId) -> bool {
        match self.enemies.get_mut(&id) {
            Some(mut e) if e.instance.is_none() || e.instance == Some(instance) => {
                e.instance = Some(instance);
                true
            }
            _ => false,
        }
    }

    pub fn despawn(&self, id: EnemyId) -> Option<EnemyState> {
        self.enemies.remove(&id).map(|(_, e)| e)
    }

    pub fn despawn_zone(&self, zone: ZoneId) -> Vec<EnemyId> {
        self.despawn_where(|e| e.zone == zone)
    }

    pub fn despawn_match(&self, match_id: MatchId) -> Vec<EnemyId> {
        self.despawn_where(|e| e.match_id == Some(match_id))
    }

    pub fn despawn_instance(&self, instance: InstanceId) -> Vec<EnemyId> {
        self.despawn_where(|e| e.instance == Some(instance))
    }

    pub fn in_zone(&self, zone: ZoneId) -> Vec<EnemyId> {
        let mut ids: Vec<EnemyId> = self
            .enemies
            .iter()
            .filter(|e| e.zone == zone)
            .map(|e| *e.key())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.enemies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enemies.is_empty()
    }

    fn despawn_where(&self, pred: impl Fn(&EnemyState) -> bool) -> Vec<EnemyId> {
        let mut removed: Vec<EnemyId> = self
            .enemies
            .iter()
            .filter(|e| pred(e.value()))
            .map(|e| *e.key())
            .collect();
        removed.retain(|id| self.enemies.remove(id).is_some());
        removed.sort();
        if !removed.is_empty() {
            debug!("Despawned {} enemies", removed.len());
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> EnemyRoster {
        EnemyRoster::new(EnemyStats {
            health: 100,
            power: 50,
            attack: 10,
            defense: 5,
        })
    }

    #[test]
    fn test_spawn_uses_default_stats() {
        let roster = roster();
        let id = roster.spawn(EnemySeed::new(EnemyKind::Melee, ZoneId(1), Vec3::ZERO));
        assert_eq!(id, EnemyId(FIRST_ENEMY_ID));
        let enemy = roster.get(id).unwrap();
        assert_eq!(enemy.vitals.health(), 100);
        assert_eq!(enemy.attack, 10);
        assert!(enemy.affinities.is_empty());
    }

    #[test]
    fn test_spawn_with_stats_and_affinity() {
        let roster = roster();
        let stats = EnemyStats {
            health: 300,
            power: 20,
            attack: 14,
            defense: 20,
        };
        let seed = EnemySeed::new(EnemyKind::Caster, ZoneId(1), Vec3::ZERO).with_stats(stats);
        let id = roster.spawn(seed);
        let enemy = roster.get(id).unwrap();
        assert_eq!(enemy.vitals.max_health(), 300);
        assert_eq!(enemy.affinities, vec!["arcane".to_string()]);
    }

    #[test]
    fn test_bind_instance_once() {
        let roster = roster();
        let id = roster.spawn(EnemySeed::new(EnemyKind::Melee, ZoneId(1), Vec3::ZERO));
        assert!(roster.bind_instance(id, InstanceId(1)));
        assert!(roster.bind_instance(id, InstanceId(1)));
        assert!(!roster.bind_instance(id, InstanceId(2)));
        assert!(!roster.bind_instance(EnemyId(1), InstanceId(1)));
    }

    #[test]
    fn test_despawn_by_zone_and_match() {
        let roster = roster();
        let a = roster.spawn(EnemySeed::new(EnemyKind::Melee, ZoneId(1), Vec3::ZERO));
        let b = roster
            .spawn(EnemySeed::new(EnemyKind::Melee, ZoneId(2), Vec3::ZERO).for_match(MatchId(4)));
        let c = roster.spawn(EnemySeed::new(EnemyKind::Tank, ZoneId(2), Vec3::ZERO));

        assert_eq!(roster.despawn_match(MatchId(4)), vec![b]);
        assert_eq!(roster.in_zone(ZoneId(2)), vec![c]);
        assert_eq!(roster.despawn_zone(ZoneId(1)), vec![a]);
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_missing_enemy_counts_as_dead() {
        let roster = roster();
        assert!(!roster.is_alive(EnemyId(42)));
    }
}
