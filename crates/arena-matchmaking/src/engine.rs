//! The Matchmaking Engine.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use arena_combat::{CombatEngine, EnemySeed, Participants, ZoneGeometry};
use arena_config::{MatchmakingConfig, QueueConfig};
use arena_protocol::{Broadcaster, EnemyId, IdGenerator, MatchId, PlayerId, ServerEvent, ZoneId};
use arena_store::{HeroStore, ZoneDirectory, ZoneInfo};
use arena_zone::ZoneTracker;

use crate::arena::{assign_teams, ring_positions, scaled_enemy_count, select_arena};
use crate::error::{MatchError, QueueError};
use crate::matches::{Match, MatchPhase};
use crate::queue::{QueueBook, QueueEntry, QueueStatus};

pub struct MatchmakingEngine {
    config: MatchmakingConfig,
    /// Queues and their player index change together under this lock.
    book: Mutex<QueueBook>,
    matches: DashMap<MatchId, Match>,
    /// Player to the match they were pulled into.
    matched: DashMap<PlayerId, MatchId>,
    ids: IdGenerator,
    combat: Arc<CombatEngine>,
    zones: Arc<ZoneTracker>,
    directory: Arc<dyn ZoneDirectory>,
    heroes: Arc<dyn HeroStore>,
    events: Arc<dyn Broadcaster>,
}

impl MatchmakingEngine {
    pub fn new(
        config: MatchmakingConfig,
        combat: Arc<CombatEngine>,
        directory: Arc<dyn ZoneDirectory>,
        heroes: Arc<dyn HeroStore>,
        events: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            config,
            book: Mutex::new(QueueBook::new()),
            matches: DashMap::new(),
            matched: DashMap::new(),
            ids: IdGenerator::new(),
            zones: Arc::clone(combat.zones()),
            combat,
            directory,
            heroes,
            events,
        }
    }

    pub fn config(&self) -> &MatchmakingConfig {
        &self.config
    }

    /// Put a player in a queue, then try to form a match from it.
    pub async fn join_queue(
        self: &Arc<Self>,
        player: PlayerId,
        queue: &str,
    ) -> Result<QueueStatus, QueueError> {
        let queue_config = self
            .config
            .queue(queue)
            .cloned()
            .ok_or_else(|| QueueError::UnknownQueue(queue.to_string()))?;
        if self.matched.contains_key(&player) {
            return Err(QueueError::AlreadyMatched);
        }
        if self.combat.is_in_active_combat(player) {
            return Err(QueueError::InCombat);
        }
        if let Some(existing) = self.book.lock().await.status(player) {
            return Err(QueueError::AlreadyQueued(existing.queue));
        }

        let hero = self
            .heroes
            .active_hero(player)
            .await?
            .filter(|h| h.is_alive())
            .ok_or(QueueError::NoEligibleHero)?;
        let origin = self.zones.zone_of(player).ok_or(QueueError::NotInZone)?;

        let entry = QueueEntry {
            player,
            hero_name: hero.name,
            level: hero.level,
            origin,
            joined_at: Instant::now(),
        };
        let (status, popped) = {
            let mut book = self.book.lock().await;
            let status = book.join(queue, entry)?;
            let popped =
                book.pop_match(queue, queue_config.min_players, queue_config.max_players);
            (status, popped)
        };

        debug!("{player} joined {queue} at {}/{}", status.position, status.size);
        self.events.to_player(
            player,
            ServerEvent::QueueJoined {
                queue: status.queue.clone(),
                position: status.position,
                size: status.size,
            },
        );
        if let Some(entries) = popped {
            self.create_match(&queue_config, entries);
        }
        Ok(status)
    }

    pub async fn leave_queue(&self, player: PlayerId) -> Result<String, QueueError> {
        let queue = self.book.lock().await.leave(player).ok_or(QueueError::NotQueued)?;
        debug!("{player} left {queue}");
        self.events.to_player(player, ServerEvent::QueueLeft { queue: queue.clone() });
        Ok(queue)
    }

    pub async fn queue_status(&self, player: PlayerId) -> Option<QueueStatus> {
        self.book.lock().await.status(player)
    }

    pub fn match_of(&self, player: PlayerId) -> Option<MatchId> {
        self.matched.get(&player).map(|m| *m)
    }

    pub fn match_phase(&self, id: MatchId) -> Option<MatchPhase> {
        self.matches.get(&id).map(|m| m.phase)
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Drop a player from matchmaking. Queued players leave their queue; a
    /// countdown match containing them is cancelled; a match already handing
    /// off remembers the disconnect for the instance it creates.
    pub async fn handle_disconnect(&self, player: PlayerId) {
        if self.book.lock().await.leave(player).is_some() {
            debug!("{player} dropped from queue on disconnect");
        }
        let Some(id) = self.match_of(player) else { return };

        let phase = {
            let Some(mut m) = self.matches.get_mut(&id) else { return };
            if m.phase != MatchPhase::Countdown && m.instance.is_none() {
                m.disconnected.insert(player);
            }
            m.phase
        };
        match phase {
            MatchPhase::Countdown => {
                let reason = format!("{player} disconnected");
                if let Err(e) = self.cancel_match(id, &reason) {
                    debug!("Cancel of {id} lost a race with the handoff: {e}");
                }
            }
            _ => {
                self.combat.mark_player_disconnected(player, Instant::now()).await;
            }
        }
    }

    /// Undo a disconnect recorded during the handoff.
    pub async fn handle_reconnect(&self, player: PlayerId) {
        if let Some(id) = self.match_of(player)
            && let Some(mut m) = self.matches.get_mut(&id)
        {
            m.disconnected.remove(&player);
        }
        self.combat.mark_player_reconnected(player).await;
    }

    /// Cancel a match still in its countdown. Every player goes back to
    /// unqueued and any enemies spawned for the match are removed.
    pub fn cancel_match(&self, id: MatchId, reason: &str) -> Result<(), MatchError> {
        let removed = self
            .matches
            .remove_if(&id, |_, m| m.is_cancellable())
            .map(|(_, m)| m);
        let Some(m) = removed else {
            return Err(match self.matches.get(&id) {
                Some(_) => MatchError::NotCancellable(id),
                None => MatchError::MissingMatch(id),
            });
        };
        m.cancel.send_replace(true);
        self.teardown(&m, reason);
        Ok(())
    }

    /// Forget matches whose instance has finished.
    pub fn prune_finished(&self) -> usize {
        let done: Vec<MatchId> = self
            .matches
            .iter()
            .filter(|m| m.phase == MatchPhase::InProgress)
            .filter(|m| {
                m.instance
                    .is_none_or(|i| !m.players.iter().any(|p| self.combat.owner_of(*p) == Some(i)))
            })
            .map(|m| m.id)
            .collect();
        for id in &done {
            self.matches.remove(id);
        }
        done.len()
    }

    fn create_match(self: &Arc<Self>, queue: &QueueConfig, entries: Vec<QueueEntry>) {
        let id: MatchId = self.ids.next_id();
        let players: Vec<PlayerId> = entries.iter().map(|e| e.player).collect();
        let (cancel, cancelled) = watch::channel(false);
        for player in &players {
            self.matched.insert(*player, id);
        }
        self.matches.insert(
            id,
            Match {
                id,
                queue: queue.name.clone(),
                kind: queue.kind,
                players: players.clone(),
                origins: entries.iter().map(|e| (e.player, e.origin)).collect(),
                phase: MatchPhase::Countdown,
                created_at: Instant::now(),
                arena: None,
                instance: None,
                enemies: Vec::new(),
                disconnected: HashSet::new(),
                cancel,
            },
        );
        info!("Match {id} formed from {}: {} players", queue.name, players.len());
        for player in &players {
            self.events.to_player(
                *player,
                ServerEvent::MatchFound {
                    match_id: id,
                    queue: queue.name.clone(),
                    players: players.clone(),
                    countdown_secs: queue.countdown_secs,
                },
            );
        }

        let engine = Arc::clone(self);
        let countdown = queue.countdown_secs;
        tokio::spawn(async move {
            engine.run_countdown(id, countdown, cancelled).await;
        });
    }

    async fn run_countdown(
        self: Arc<Self>,
        id: MatchId,
        secs: u32,
        mut cancelled: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await;

        for remaining in (1..=secs).rev() {
            if *cancelled.borrow() {
                return;
            }
            self.to_match(id, ServerEvent::MatchCountdown {
                match_id: id,
                remaining_secs: remaining,
            });
            tokio::select! {
                _ = interval.tick() => {}
                _ = cancelled.changed() => return,
            }
        }
        if *cancelled.borrow() {
            return;
        }
        if let Err(e) = self.start_match(id).await {
            warn!("Match {id} failed to start: {e}");
        }
    }

    /// Pick an arena and run the three-phase handoff.
    pub async fn start_match(&self, id: MatchId) -> Result<(), MatchError> {
        let (queue_name, player_count) = {
            let m = self.matches.get(&id).ok_or(MatchError::MissingMatch(id))?;
            (m.queue.clone(), m.players.len())
        };
        let Some(queue) = self.config.queue(&queue_name).cloned() else {
            self.cancel_match(id, "queue no longer configured")?;
            return Err(MatchError::NoArena);
        };

        let zones = match self.directory.zones().await {
            Ok(zones) => zones,
            Err(e) => {
                warn!("Zone lookup failed for {id}: {e}");
                Vec::new()
            }
        };
        let Some(arena) =
            select_arena(&zones, |z| self.zones.load(z.id), &queue, player_count).cloned()
        else {
            self.cancel_match(id, "no arena available")?;
            return Err(MatchError::NoArena);
        };

        // Claim the match. A cancel that got here first wins.
        let (players, origins) = {
            let mut m = self.matches.get_mut(&id).ok_or(MatchError::MissingMatch(id))?;
            if m.phase != MatchPhase::Countdown {
                return Err(MatchError::NotCancellable(id));
            }
            m.phase = MatchPhase::Transferring;
            m.arena = Some(arena.id);
            (m.players.clone(), m.origins.clone())
        };
        info!("Match {id} assigned to {} ({})", arena.name, arena.id);

        let enemies = self.spawn_match_enemies(id, &queue, &arena, players.len());
        if let Some(mut m) = self.matches.get_mut(&id) {
            m.enemies = enemies.clone();
        }

        // Phase 1: move everyone, and wait for all of it.
        self.transfer_players(&origins, &arena).await;
        self.settle().await;

        // Phase 2: announce the zone change.
        self.set_phase(id, MatchPhase::NotifyingZone);
        for player in &players {
            self.events.to_player(
                *player,
                ServerEvent::ZoneChanged {
                    match_id: Some(id),
                    zone: arena.id,
                    spawn: arena.spawn,
                },
            );
        }
        self.settle().await;

        let participants = Participants {
            players: players.clone(),
            enemies: enemies.clone(),
            spawn: Vec::new(),
            teams: assign_teams(queue.kind, &players, queue.team_size),
            match_id: Some(id),
        };
        let instance = match self
            .combat
            .initialize_combat_instance(
                queue.kind,
                participants,
                ZoneGeometry::from(&arena),
                arena.id,
                true,
                Instant::now(),
            )
            .await
        {
            Ok(instance) => instance,
            Err(e) => {
                if let Some((_, m)) = self.matches.remove(&id) {
                    self.teardown(&m, "combat could not be started");
                }
                return Err(e.into());
            }
        };

        let dropped = {
            let Some(mut m) = self.matches.get_mut(&id) else {
                return Err(MatchError::MissingMatch(id));
            };
            m.instance = Some(instance);
            m.phase = MatchPhase::NotifyingStart;
            std::mem::take(&mut m.disconnected)
        };
        let now = Instant::now();
        for player in dropped {
            self.combat.mark_player_disconnected(player, now).await;
        }

        // Phase 3: announce the start.
        for player in &players {
            self.events.to_player(
                *player,
                ServerEvent::MatchStarted {
                    match_id: id,
                    instance,
                    arena: arena.id,
                    kind: queue.kind,
                    enemies: enemies.clone(),
                },
            );
        }
        self.set_phase(id, MatchPhase::InProgress);
        for player in &players {
            self.matched.remove_if(player, |_, m| *m == id);
        }
        info!("Match {id} in progress as {instance}");
        Ok(())
    }

    fn spawn_match_enemies(
        &self,
        id: MatchId,
        queue: &QueueConfig,
        arena: &ZoneInfo,
        matched: usize,
    ) -> Vec<EnemyId> {
        if !queue.kind.is_pve() {
            return Vec::new();
        }
        let mut seeds = Vec::new();
        for group in &queue.enemies {
            for _ in 0..scaled_enemy_count(group.count, matched, queue.max_players) {
                seeds.push((group.kind, group.stats));
            }
        }
        let ring = ring_positions(
            arena.spawn,
            seeds.len(),
            self.config.spawn_ring_radius,
            self.config.spawn_ring_step,
        );
        seeds
            .into_iter()
            .zip(ring)
            .map(|((kind, stats), position)| {
                let mut seed = EnemySeed::new(kind, arena.id, position).for_match(id);
                seed.stats = stats.map(Into::into);
                self.combat.roster().spawn(seed)
            })
            .collect()
    }

    async fn transfer_players(&self, origins: &[(PlayerId, ZoneId)], arena: &ZoneInfo) {
        let mut transfers = JoinSet::new();
        for (player, origin) in origins.iter().copied() {
            let zones = Arc::clone(&self.zones);
            let heroes = Arc::clone(&self.heroes);
            let (to, spawn) = (arena.id, arena.spawn);
            transfers.spawn(async move {
                zones.transfer_player(origin, to, player, spawn);
                heroes.set_player_zone(player, to).await.map_err(|e| (player, e))
            });
        }
        while let Some(joined) = transfers.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err((player, e))) => warn!("Failed to persist zone for {player}: {e}"),
                Err(e) => warn!("Transfer task failed: {e}"),
            }
        }
    }

    async fn settle(&self) {
        let delay = self.config.settle_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn set_phase(&self, id: MatchId, phase: MatchPhase) {
        if let Some(mut m) = self.matches.get_mut(&id) {
            m.phase = phase;
        }
    }

    fn to_match(&self, id: MatchId, event: ServerEvent) {
        let players = match self.matches.get(&id) {
            Some(m) => m.players.clone(),
            None => return,
        };
        for player in players {
            self.events.to_player(player, event.clone());
        }
    }

    fn teardown(&self, m: &Match, reason: &str) {
        for player in &m.players {
            self.matched.remove_if(player, |_, id| *id == m.id);
        }
        let despawned = self.combat.roster().despawn_match(m.id);
        info!(
            "Match {} cancelled ({reason}), {} enemies removed",
            m.id,
            despawned.len()
        );
        for player in &m.players {
            self.events.to_player(
                *player,
                ServerEvent::MatchCancelled {
                    match_id: m.id,
                    reason: reason.to_string(),
                },
            );
        }
    }
}
