//! Matchmaking errors.

use arena_combat::CombatError;
use arena_protocol::MatchId;
use arena_store::StoreError;

/// Why a queue request was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("unknown queue '{0}'")]
    UnknownQueue(String),

    #[error("already queued for {0}")]
    AlreadyQueued(String),

    #[error("already in a match")]
    AlreadyMatched,

    #[error("already in combat")]
    InCombat,

    #[error("no living active hero")]
    NoEligibleHero,

    #[error("not present in any zone")]
    NotInZone,

    #[error("not queued")]
    NotQueued,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures while running a match.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("{0} does not exist")]
    MissingMatch(MatchId),

    #[error("{0} is past its countdown and cannot be cancelled")]
    NotCancellable(MatchId),

    #[error("no arena available")]
    NoArena,

    #[error(transparent)]
    Combat(#[from] CombatError),
}
