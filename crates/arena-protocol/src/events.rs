//! Named, structured events the core emits toward connected players.
//!
//! Framing and encoding belong to the transport; the core only guarantees the
//! shape of each event and the order in which it hands them to a
//! [`Broadcaster`](crate::Broadcaster).

use serde::{Deserialize, Serialize};

use crate::effects::EffectKind;
use crate::geometry::Vec3;
use crate::ids::{CombatantId, EnemyId, InstanceId, MatchId, PlayerId, ZoneId};
use crate::kinds::{CombatKind, CombatResult};

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// An active status effect as seen by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectView {
    pub kind: EffectKind,
    /// Milliseconds until expiry, `None` for permanent effects.
    pub remaining_ms: Option<u64>,
    pub source_spell: String,
}

/// Vitals and placement of one combatant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatantView {
    pub id: CombatantId,
    pub health: i32,
    pub max_health: i32,
    pub power: i32,
    pub max_power: i32,
    pub position: Vec3,
    pub alive: bool,
    pub effects: Vec<EffectView>,
}

/// Full state of a combat instance, broadcast every combat tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatSnapshot {
    pub instance: InstanceId,
    pub kind: CombatKind,
    pub zone: ZoneId,
    pub elapsed_ms: u64,
    pub combatants: Vec<CombatantView>,
}

/// Effect of a resolved cast on a single target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetHit {
    pub target: CombatantId,
    pub damage: i32,
    pub healing: i32,
    pub health_after: i32,
    pub killed: bool,
}

/// Summary of one resolved spell cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSummary {
    pub instance: InstanceId,
    pub caster: PlayerId,
    pub spell_key: String,
    pub target_point: Vec3,
    pub hits: Vec<TargetHit>,
    /// Caster power after the cost was paid.
    pub caster_power: i32,
    /// Healing the caster received from lifesteal.
    pub caster_healing: i32,
}

/// Per-player experience award at the end of a fight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelUpSummary {
    pub player: PlayerId,
    pub outcome: CombatResult,
    pub experience_gained: u32,
    pub level: u32,
    pub experience: u32,
    pub leveled_up: bool,
}

/// Position and animation of one enemy after an AI tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyView {
    pub enemy: EnemyId,
    pub position: Vec3,
    pub facing: f32,
    pub animation: String,
    pub health: i32,
    pub max_health: i32,
}

/// Offensive action an enemy performed during an AI tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyActionKind {
    Attack,
    Cast,
}

// ---------------------------------------------------------------------------
// ServerEvent
// ---------------------------------------------------------------------------

/// Every event the core can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    // --- Combat ---
    CombatState(CombatSnapshot),
    ActionResolved(ActionSummary),
    CombatEnded {
        instance: InstanceId,
        result: CombatResult,
        winners: Vec<CombatantId>,
        losers: Vec<CombatantId>,
        players: Vec<LevelUpSummary>,
    },

    // --- Matchmaking ---
    QueueJoined {
        queue: String,
        position: usize,
        size: usize,
    },
    QueueLeft {
        queue: String,
    },
    MatchFound {
        match_id: MatchId,
        queue: String,
        players: Vec<PlayerId>,
        countdown_secs: u32,
    },
    MatchCountdown {
        match_id: MatchId,
        remaining_secs: u32,
    },
    MatchCancelled {
        match_id: MatchId,
        reason: String,
    },
    ZoneChanged {
        match_id: Option<MatchId>,
        zone: ZoneId,
        spawn: Vec3,
    },
    MatchStarted {
        match_id: MatchId,
        instance: InstanceId,
        arena: ZoneId,
        kind: CombatKind,
        enemies: Vec<EnemyId>,
    },

    // --- Enemies ---
    EnemyState {
        zone: ZoneId,
        enemies: Vec<EnemyView>,
    },
    EnemyAttack {
        enemy: EnemyId,
        target: PlayerId,
        action: EnemyActionKind,
        damage: i32,
        target_health: i32,
    },
    EnemyDestroyed {
        enemy: EnemyId,
        zone: ZoneId,
    },

    // --- Errors ---
    /// A user-facing action was refused; nothing changed.
    Rejected {
        action: String,
        reason: String,
    },
}

impl ServerEvent {
    /// Wire name of the event, matching the serialized tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CombatState(_) => "combat-state",
            Self::ActionResolved(_) => "action-resolved",
            Self::CombatEnded { .. } => "combat-ended",
            Self::QueueJoined { .. } => "queue-joined",
            Self::QueueLeft { .. } => "queue-left",
            Self::MatchFound { .. } => "match-found",
            Self::MatchCountdown { .. } => "match-countdown",
            Self::MatchCancelled { .. } => "match-cancelled",
            Self::ZoneChanged { .. } => "zone-changed",
            Self::MatchStarted { .. } => "match-started",
            Self::EnemyState { .. } => "enemy-state",
            Self::EnemyAttack { .. } => "enemy-attack",
            Self::EnemyDestroyed { .. } => "enemy-destroyed",
            Self::Rejected { .. } => "rejected",
        }
    }

    /// Build a rejection from any displayable error.
    pub fn rejected(action: &str, reason: impl ToString) -> Self {
        Self::Rejected {
            action: action.to_string(),
            reason: reason.to_string(),
        }
    }
}
