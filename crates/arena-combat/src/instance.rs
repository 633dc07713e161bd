//! A single running battle: who is in it, how long it has run, and what
//! happened.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

use arena_protocol::{
    CombatKind, CombatResult, CombatantId, EnemyId, InstanceId, MatchId, PlayerId, ZoneId,
};

/// Lifecycle of an instance. Only `Active` instances accept actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Active,
    Ended,
}

/// One resolved action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionEntry {
    pub at: Instant,
    pub actor: CombatantId,
    pub action: String,
    pub targets: Vec<CombatantId>,
    pub damage: i32,
    pub healing: i32,
}

/// Bounded action history. Pushing onto a full log drops the oldest entry.
#[derive(Debug, Clone)]
pub struct ActionLog {
    entries: VecDeque<ActionEntry>,
    capacity: usize,
}

impl ActionLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: ActionEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&ActionEntry> {
        self.entries.back()
    }
}

/// Per-player tallies kept for match history and experience.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParticipantStats {
    pub damage_dealt: u32,
    pub healing_done: u32,
    /// Every combatant this player finished off.
    pub kills: u32,
    /// The enemy subset of `kills`.
    pub enemy_kills: u32,
    pub deaths: u32,
}

/// Result of checking whether everyone has left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abandonment {
    /// At least one player is connected.
    Occupied,
    /// Nobody is connected; the timeout has not yet elapsed.
    Waiting(Duration),
    /// Nobody has been connected for the full timeout.
    Expired,
}

#[derive(Debug, Clone)]
pub struct CombatInstance {
    pub id: InstanceId,
    pub kind: CombatKind,
    pub zone: ZoneId,
    pub is_matchmaking: bool,
    pub match_id: Option<MatchId>,
    pub players: Vec<PlayerId>,
    pub enemies: Vec<EnemyId>,
    /// Team partition for team kinds, as supplied at creation.
    pub teams: Option<Vec<Vec<PlayerId>>>,
    pub state: InstanceState,
    pub result: Option<CombatResult>,
    pub started_at: Instant,
    pub ended_at: Option<Instant>,
    /// Players currently connected.
    pub connected: HashSet<PlayerId>,
    /// Set while nobody is connected.
    pub empty_since: Option<Instant>,
    pub log: ActionLog,
    pub stats: HashMap<PlayerId, ParticipantStats>,
}

impl CombatInstance {
    pub fn new(
        id: InstanceId,
        kind: CombatKind,
        zone: ZoneId,
        players: Vec<PlayerId>,
        enemies: Vec<EnemyId>,
        log_capacity: usize,
        now: Instant,
    ) -> Self {
        Self {
            id,
            kind,
            zone,
            is_matchmaking: false,
            match_id: None,
            connected: players.iter().copied().collect(),
            stats: players.iter().map(|p| (*p, ParticipantStats::default())).collect(),
            players,
            enemies,
            teams: None,
            state: InstanceState::Active,
            result: None,
            started_at: now,
            ended_at: None,
            empty_since: None,
            log: ActionLog::with_capacity(log_capacity),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == InstanceState::Active
    }

    pub fn has_player(&self, player: PlayerId) -> bool {
        self.players.contains(&player)
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.ended_at.unwrap_or(now).saturating_duration_since(self.started_at)
    }

    /// Returns `false` if the player was already disconnected or is not a
    /// participant. The abandonment timer starts when the last player leaves.
    pub fn mark_disconnected(&mut self, player: PlayerId, now: Instant) -> bool {
        if !self.connected.remove(&player) {
            return false;
        }
        if self.connected.is_empty() && self.empty_since.is_none() {
            self.empty_since = Some(now);
        }
        true
    }

    /// Returns `false` if the player was already connected or is not a
    /// participant. Any reconnect disarms the abandonment timer.
    pub fn mark_reconnected(&mut self, player: PlayerId) -> bool {
        if !self.has_player(player) || !self.connected.insert(player) {
            return false;
        }
        self.empty_since = None;
        true
    }

    pub fn abandonment(&mut self, now: Instant, timeout: Duration) -> Abandonment {
        if !self.connected.is_empty() {
            self.empty_since = None;
            return Abandonment::Occupied;
        }
        let since = *self.empty_since.get_or_insert(now);
        let empty_for = now.saturating_duration_since(since);
        if empty_for >= timeout {
            Abandonment::Expired
        } else {
            Abandonment::Waiting(timeout - empty_for)
        }
    }

    pub fn stats_mut(&mut self, player: PlayerId) -> &mut ParticipantStats {
        self.stats.entry(player).or_default()
    }

    pub fn stats(&self, player: PlayerId) -> ParticipantStats {
        self.stats.get(&player).copied().unwrap_or_default()
    }
}
