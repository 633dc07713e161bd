//! Shared vocabulary of the arena core: identifiers, combat kinds, status
//! effect parameters, outbound events, and the broadcast seam through which
//! engines reach connected players.

pub mod broadcast;
pub mod effects;
pub mod events;
pub mod geometry;
pub mod ids;
pub mod kinds;

pub use broadcast::{Broadcaster, ChannelBroadcaster, Outbound, Recipient};
pub use effects::{EffectKind, EffectSpec};
pub use events::{
    ActionSummary, CombatSnapshot, CombatantView, EffectView, EnemyActionKind, EnemyView,
    LevelUpSummary, ServerEvent, TargetHit,
};
pub use geometry::{Vec3, ground_distance};
pub use ids::{CombatantId, EnemyId, HeroId, IdGenerator, InstanceId, MatchId, PlayerId, ZoneId};
pub use kinds::{CombatKind, CombatResult, EnemyKind};
