//! Authoritative combat: instances, combatant state, spell resolution,
//! status effects, win/loss evaluation, and the enemy AI that fights back.
//!
//! The [`CombatEngine`] owns every combat instance and player combat record.
//! Each instance sits behind its own async mutex, and every mutation of the
//! combatants inside it happens while that lock is held, so casts, ticks and
//! enemy attacks against the same instance are serialized while unrelated
//! instances proceed in parallel. Persistence is never awaited under an
//! instance lock.

pub mod ai;
pub mod effects;
pub mod engine;
pub mod error;
pub mod instance;
pub mod roster;
pub mod state;
pub mod targeting;
pub mod vitals;

pub use ai::{AiTarget, EnemyAction, EnemyAi, EnemyUpdate};
pub use effects::{EffectList, StatusEffect};
pub use engine::{
    CombatConditions, CombatEngine, Collaborators, Participants, SpellCast, TickOutcome,
    ZoneGeometry,
};
pub use error::{CastError, CombatError};
pub use instance::{
    Abandonment, ActionEntry, ActionLog, CombatInstance, InstanceState, ParticipantStats,
};
pub use roster::{EnemyRoster, EnemySeed};
pub use state::{Animation, EnemyState, EnemyStats, PlayerCombatState};
pub use vitals::{Vitals, compute_damage, heal_amount};
