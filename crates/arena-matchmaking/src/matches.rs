//! Matches between queue pop and combat start.

use std::collections::HashSet;

use tokio::sync::watch;
use tokio::time::Instant;

use arena_protocol::{CombatKind, EnemyId, InstanceId, MatchId, PlayerId, ZoneId};

/// Lifecycle of a match. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchPhase {
    Countdown,
    Transferring,
    NotifyingZone,
    NotifyingStart,
    InProgress,
}

#[derive(Debug)]
pub struct Match {
    pub id: MatchId,
    pub queue: String,
    pub kind: CombatKind,
    pub players: Vec<PlayerId>,
    /// Zone each player queued from.
    pub origins: Vec<(PlayerId, ZoneId)>,
    pub phase: MatchPhase,
    pub created_at: Instant,
    pub arena: Option<ZoneId>,
    pub instance: Option<InstanceId>,
    pub enemies: Vec<EnemyId>,
    /// Players that dropped after the countdown, applied to the instance
    /// once it exists.
    pub disconnected: HashSet<PlayerId>,
    /// Flipped to stop the countdown task.
    pub(crate) cancel: watch::Sender<bool>,
}

impl Match {
    pub fn is_cancellable(&self) -> bool {
        self.phase == MatchPhase::Countdown
    }

    pub fn has_player(&self, player: PlayerId) -> bool {
        self.players.contains(&player)
    }
}
