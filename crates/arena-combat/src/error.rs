//! Combat error types.
//!
//! [`CastError`] covers expected, user-facing rejections; the `Display`
//! text is what the player sees. [`CombatError`] covers consistency
//! problems that abort the triggering action and get logged.

use arena_protocol::{CombatantId, InstanceId, PlayerId};

/// Why a spell cast was refused. No state changes accompany a rejection.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CastError {
    #[error("you are not in an active combat")]
    NotInCombat,

    #[error("you cannot cast while dead")]
    CasterDead,

    #[error("not enough power: have {have}, need {need}")]
    InsufficientPower { have: i32, need: i32 },

    #[error("{spell} is on cooldown for another {remaining_ms} ms")]
    OnCooldown { spell: String, remaining_ms: u64 },

    #[error("target out of range: {distance:.1} > {range:.1}")]
    OutOfRange { distance: f32, range: f32 },

    #[error("unknown spell '{0}'")]
    UnknownSpell(String),
}

/// Internal consistency failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CombatError {
    #[error("{0} does not exist")]
    MissingInstance(InstanceId),

    #[error("{0} has already ended")]
    AlreadyEnded(InstanceId),

    #[error("no combat state for {0}")]
    MissingCombatant(CombatantId),

    #[error("{0} is not in an active combat")]
    NotInCombat(PlayerId),

    #[error("no eligible players for a new combat instance")]
    NoEligiblePlayers,
}
