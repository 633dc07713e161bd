//! The Combat Engine: owner of every combat instance and player combat
//! record.
//!
//! Lock order is always instance mutex first, then individual map entries.
//! Map entry guards are never held across an `.await`, and no two guards on
//! the same map are held at once.

mod cast;
mod outcome;
mod tick;

use std::f32::consts::TAU;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use arena_config::CombatConfig;
use arena_protocol::{
    Broadcaster, CombatKind, CombatSnapshot, CombatantId, EnemyId, EnemyKind, IdGenerator,
    InstanceId, MatchId, PlayerId, Recipient, ServerEvent, Vec3, ZoneId,
};
use arena_store::{HeroStore, MatchHistory, SpellCatalog, ZoneInfo};
use arena_zone::ZoneTracker;

use crate::ai::AiTarget;
use crate::error::CombatError;
use crate::instance::{ActionEntry, CombatInstance};
use crate::roster::{EnemyRoster, EnemySeed};
use crate::state::{EnemyStats, PlayerCombatState};
use crate::targeting::Candidate;

pub use cast::SpellCast;
pub use outcome::{CombatConditions, apply_experience, evaluate_conditions, experience_award};
pub use tick::TickOutcome;

/// External services the engine reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub heroes: Arc<dyn HeroStore>,
    pub history: Arc<dyn MatchHistory>,
    pub catalog: Arc<dyn SpellCatalog>,
    pub events: Arc<dyn Broadcaster>,
}

/// Who takes part in a new instance.
#[derive(Debug, Clone, Default)]
pub struct Participants {
    pub players: Vec<PlayerId>,
    /// Enemies that already exist in the roster.
    pub enemies: Vec<EnemyId>,
    /// Enemies to spawn for this instance.
    pub spawn: Vec<EnemySeed>,
    pub teams: Option<Vec<Vec<PlayerId>>>,
    pub match_id: Option<MatchId>,
}

impl Participants {
    pub fn players(players: impl IntoIterator<Item = PlayerId>) -> Self {
        Self {
            players: players.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_enemies(mut self, enemies: impl IntoIterator<Item = EnemyId>) -> Self {
        self.enemies.extend(enemies);
        self
    }
}

/// Placement data for the arena an instance runs in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneGeometry {
    pub spawn: Vec3,
}

impl From<&ZoneInfo> for ZoneGeometry {
    fn from(zone: &ZoneInfo) -> Self {
        Self { spawn: zone.spawn }
    }
}

pub struct CombatEngine {
    config: CombatConfig,
    instances: DashMap<InstanceId, Arc<Mutex<CombatInstance>>>,
    players: DashMap<PlayerId, PlayerCombatState>,
    /// Player to the active instance that owns them.
    owners: DashMap<PlayerId, InstanceId>,
    /// Ended instances waiting out the cleanup grace period.
    reap_at: DashMap<InstanceId, Instant>,
    enemies: Arc<EnemyRoster>,
    zones: Arc<ZoneTracker>,
    heroes: Arc<dyn HeroStore>,
    history: Arc<dyn MatchHistory>,
    catalog: Arc<dyn SpellCatalog>,
    events: Arc<dyn Broadcaster>,
    ids: IdGenerator,
}

impl CombatEngine {
    pub fn new(
        config: CombatConfig,
        collaborators: Collaborators,
        zones: Arc<ZoneTracker>,
        enemies: Arc<EnemyRoster>,
    ) -> Self {
        Self {
            config,
            instances: DashMap::new(),
            players: DashMap::new(),
            owners: DashMap::new(),
            reap_at: DashMap::new(),
            enemies,
            zones,
            heroes: collaborators.heroes,
            history: collaborators.history,
            catalog: collaborators.catalog,
            events: collaborators.events,
            ids: IdGenerator::new(),
        }
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    pub fn roster(&self) -> &Arc<EnemyRoster> {
        &self.enemies
    }

    pub fn zones(&self) -> &Arc<ZoneTracker> {
        &self.zones
    }

    /// Create an instance and seed its combatants. Players without a living
    /// active hero, or already fighting elsewhere, are left out with a
    /// warning; the call fails only if nobody is left.
    pub async fn initialize_combat_instance(
        &self,
        kind: CombatKind,
        participants: Participants,
        geometry: ZoneGeometry,
        zone: ZoneId,
        is_matchmaking: bool,
        now: Instant,
    ) -> Result<InstanceId, CombatError> {
        let id: InstanceId = self.ids.next_id();

        let count = participants.players.len();
        let mut seeded = Vec::with_capacity(count);
        for (index, player) in participants.players.iter().copied().enumerate() {
            if let Some(owner) = self.owner_of(player) {
                warn!("{player} is already in {owner}, excluded from {id}");
                continue;
            }
            match self.heroes.active_hero(player).await {
                Ok(Some(hero)) if hero.is_alive() => {
                    let position =
                        spawn_position(geometry.spawn, index, count, self.config.spawn_spread);
                    seeded.push(PlayerCombatState::from_hero(&hero, id, position));
                }
                Ok(Some(hero)) => {
                    warn!("{player} has {} health, excluded from {id}", hero.health);
                }
                Ok(None) => warn!("{player} has no active hero, excluded from {id}"),
                Err(e) => warn!("Failed to load hero for {player}: {e}"),
            }
        }

        // Claim ownership only now that every await is behind us.
        let mut players = Vec::with_capacity(seeded.len());
        for state in seeded {
            let player = state.player;
            match self.owners.entry(player) {
                dashmap::mapref::entry::Entry::Occupied(o) => {
                    warn!("{player} joined {} concurrently, excluded from {id}", o.get());
                }
                dashmap::mapref::entry::Entry::Vacant(v) => {
                    v.insert(id);
                    self.players.insert(player, state);
                    players.push(player);
                }
            }
        }
        if players.is_empty() {
            return Err(CombatError::NoEligiblePlayers);
        }

        let mut enemies = Vec::new();
        for enemy in participants.enemies {
            if self.enemies.bind_instance(enemy, id) {
                enemies.push(enemy);
            } else {
                warn!("{enemy} is missing or already fighting, excluded from {id}");
            }
        }
        for seed in participants.spawn {
            let enemy = self.enemies.spawn(EnemySeed { zone, ..seed });
            self.enemies.bind_instance(enemy, id);
            enemies.push(enemy);
        }

        let mut instance = CombatInstance::new(
            id,
            kind,
            zone,
            players.clone(),
            enemies,
            self.config.action_log_capacity,
            now,
        );
        instance.is_matchmaking = is_matchmaking;
        instance.match_id = participants.match_id;
        instance.teams = participants.teams;
        let enemy_count = instance.enemies.len();

        self.instances.insert(id, Arc::new(Mutex::new(instance)));
        self.zones.register_combat(zone, id);
        info!(
            "Combat {id} ({kind:?}) started in {zone}: {} players, {enemy_count} enemies",
            players.len()
        );
        Ok(id)
    }

    /// The active instance a player belongs to.
    pub fn owner_of(&self, player: PlayerId) -> Option<InstanceId> {
        self.owners.get(&player).map(|i| *i)
    }

    pub fn is_in_active_combat(&self, player: PlayerId) -> bool {
        self.owners.contains_key(&player)
    }

    /// Every instance that has not been reaped yet.
    pub fn instance_ids(&self) -> Vec<InstanceId> {
        let mut ids: Vec<InstanceId> = self.instances.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    pub fn active_instance_count(&self) -> usize {
        self.instances.len().saturating_sub(self.reap_at.len())
    }

    /// Copy of a player's combat state.
    pub fn player_state(&self, player: PlayerId) -> Option<PlayerCombatState> {
        self.players.get(&player).map(|s| s.clone())
    }

    /// Copy of an instance's bookkeeping.
    pub async fn instance(&self, id: InstanceId) -> Result<CombatInstance, CombatError> {
        let handle = self.handle(id)?;
        let instance = handle.lock().await;
        Ok(instance.clone())
    }

    pub async fn mark_player_disconnected(&self, player: PlayerId, now: Instant) -> bool {
        let Some(id) = self.owner_of(player) else { return false };
        let Ok(handle) = self.handle(id) else { return false };
        let mut instance = handle.lock().await;
        let changed = instance.is_active() && instance.mark_disconnected(player, now);
        if changed {
            debug!("{player} disconnected from {id}");
        }
        changed
    }

    pub async fn mark_player_reconnected(&self, player: PlayerId) -> bool {
        let Some(id) = self.owner_of(player) else { return false };
        let Ok(handle) = self.handle(id) else { return false };
        let mut instance = handle.lock().await;
        let changed = instance.is_active() && instance.mark_reconnected(player);
        if changed {
            debug!("{player} reconnected to {id}");
        }
        changed
    }

    /// Move a player. Combat position is left alone while frozen; zone
    /// presence always follows. Returns whether the combat position changed.
    pub fn update_player_position(&self, player: PlayerId, position: Vec3, now: Instant) -> bool {
        self.zones.update_position(player, position);
        let Some(mut state) = self.players.get_mut(&player) else { return false };
        if !self.owners.get(&player).is_some_and(|i| *i == state.instance)
            || state.effects.is_frozen(now)
        {
            return false;
        }
        state.position = position;
        true
    }

    /// Place an enemy in an open zone.
    pub fn spawn_enemy(
        &self,
        zone: ZoneId,
        kind: EnemyKind,
        position: Vec3,
        stats: Option<EnemyStats>,
    ) -> EnemyId {
        self.enemies.spawn(EnemySeed {
            stats,
            ..EnemySeed::new(kind, zone, position)
        })
    }

    /// Remove every enemy in a zone and tell the zone.
    pub fn despawn_zone_enemies(&self, zone: ZoneId) -> Vec<EnemyId> {
        let removed = self.enemies.despawn_zone(zone);
        for enemy in &removed {
            self.events.send(
                Recipient::Zone(zone),
                ServerEvent::EnemyDestroyed { enemy: *enemy, zone },
            );
        }
        removed
    }

    /// Vitals, positions and effects of everyone in an instance.
    pub async fn combat_snapshot(
        &self,
        id: InstanceId,
        now: Instant,
    ) -> Result<CombatSnapshot, CombatError> {
        let handle = self.handle(id)?;
        let instance = handle.lock().await;
        Ok(self.snapshot_locked(&instance, now))
    }

    /// Apply an enemy's hit to a player through the normal damage path.
    /// Returns the player's health afterwards.
    pub async fn apply_enemy_attack(
        &self,
        enemy: EnemyId,
        player: PlayerId,
        action: &str,
        damage: i32,
        now: Instant,
    ) -> Result<i32, CombatError> {
        let id = self.owner_of(player).ok_or(CombatError::NotInCombat(player))?;
        let handle = self.handle(id)?;
        let mut instance = handle.lock().await;
        if !instance.is_active() {
            return Err(CombatError::AlreadyEnded(id));
        }

        let (lost, health, died) = {
            let mut state = self
                .players
                .get_mut(&player)
                .filter(|s| s.instance == id)
                .ok_or(CombatError::MissingCombatant(CombatantId::Player(player)))?;
            let was_alive = state.is_alive();
            let lost = state.vitals.take_damage(damage);
            (lost, state.vitals.health(), was_alive && !state.is_alive())
        };
        if died {
            instance.stats_mut(player).deaths += 1;
            info!("{player} was killed by {enemy} in {id}");
        }
        instance.log.push(ActionEntry {
            at: now,
            actor: CombatantId::Enemy(enemy),
            action: action.to_string(),
            targets: vec![CombatantId::Player(player)],
            damage: lost,
            healing: 0,
        });
        Ok(health)
    }

    /// Living players the AI may pursue: anyone with a live combat record,
    /// tagged with their instance.
    pub fn ai_targets(&self) -> Vec<AiTarget> {
        let mut targets: Vec<AiTarget> = self
            .players
            .iter()
            .filter(|s| {
                s.is_alive()
                    && self
                        .owners
                        .get(&s.player)
                        .is_some_and(|i| *i == s.instance)
            })
            .filter_map(|s| {
                let zone = self.zones.zone_of(s.player)?;
                Some(AiTarget {
                    player: s.player,
                    zone,
                    instance: Some(s.instance),
                    position: s.position,
                    defense: s.defense,
                })
            })
            .collect();
        targets.sort_by_key(|t| t.player);
        targets
    }

    /// Remove ended instances whose grace period has run out. A player's
    /// record is dropped only if it still belongs to the reaped instance.
    pub async fn reap_ended(&self, now: Instant) -> Vec<InstanceId> {
        let due: Vec<InstanceId> = self
            .reap_at
            .iter()
            .filter(|e| *e.value() <= now)
            .map(|e| *e.key())
            .collect();

        let mut reaped = Vec::with_capacity(due.len());
        for id in due {
            self.reap_at.remove(&id);
            let Some((_, handle)) = self.instances.remove(&id) else { continue };
            let players = handle.lock().await.players.clone();
            for player in players {
                self.players.remove_if(&player, |_, s| s.instance == id);
            }
            self.enemies.despawn_instance(id);
            debug!("Reaped {id}");
            reaped.push(id);
        }
        reaped
    }

    fn handle(&self, id: InstanceId) -> Result<Arc<Mutex<CombatInstance>>, CombatError> {
        self.instances
            .get(&id)
            .map(|h| Arc::clone(h.value()))
            .ok_or(CombatError::MissingInstance(id))
    }

    fn snapshot_locked(&self, instance: &CombatInstance, now: Instant) -> CombatSnapshot {
        let mut combatants = Vec::with_capacity(instance.players.len() + instance.enemies.len());
        for player in &instance.players {
            if let Some(state) = self.players.get(player).filter(|s| s.instance == instance.id) {
                combatants.push(state.view(now));
            }
        }
        for enemy in &instance.enemies {
            if let Some(state) = self.enemies.enemies.get(enemy) {
                combatants.push(state.combatant_view(now));
            }
        }
        CombatSnapshot {
            instance: instance.id,
            kind: instance.kind,
            zone: instance.zone,
            elapsed_ms: instance.elapsed(now).as_millis() as u64,
            combatants,
        }
    }

    /// Positional view of every combatant in an instance.
    fn candidates(&self, instance: &CombatInstance) -> Vec<Candidate> {
        let mut out = Vec::with_capacity(instance.players.len() + instance.enemies.len());
        for player in &instance.players {
            if let Some(state) = self.players.get(player).filter(|s| s.instance == instance.id) {
                out.push(Candidate {
                    id: CombatantId::Player(*player),
                    position: state.position,
                    alive: state.is_alive(),
                });
            }
        }
        for enemy in &instance.enemies {
            if let Some(state) = self.enemies.enemies.get(enemy) {
                out.push(Candidate {
                    id: CombatantId::Enemy(*enemy),
                    position: state.position,
                    alive: state.is_alive(),
                });
            }
        }
        out
    }
}

/// Spread players evenly on a small circle around the spawn point.
fn spawn_position(spawn: Vec3, index: usize, count: usize, spread: f32) -> Vec3 {
    if count <= 1 {
        return spawn;
    }
    let angle = TAU * index as f32 / count as f32;
    spawn + Vec3::new(angle.cos() * spread, 0.0, angle.sin() * spread)
}
