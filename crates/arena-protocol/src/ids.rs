//! Opaque identifiers for players, enemies, zones, combat instances and
//! matches, plus a monotonic generator shared by the engines.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Authenticated player identity, assigned by the session layer.
    PlayerId,
    "player"
);
define_id!(
    /// Hostile NPC identity, allocated by the enemy roster.
    EnemyId,
    "enemy"
);
define_id!(
    /// Persisted hero record backing a player's combat stats.
    HeroId,
    "hero"
);
define_id!(
    /// World zone identity.
    ZoneId,
    "zone"
);
define_id!(
    /// A single running battle.
    InstanceId,
    "instance"
);
define_id!(
    /// A matchmaking match between queue pop and combat start.
    MatchId,
    "match"
);

/// Either side of a fight. Used for target lists, winners and losers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "side", content = "id", rename_all = "snake_case")]
pub enum CombatantId {
    /// A player combatant.
    Player(PlayerId),
    /// An enemy combatant.
    Enemy(EnemyId),
}

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player(id) => id.fmt(f),
            Self::Enemy(id) => id.fmt(f),
        }
    }
}

/// Atomic generator for monotonically increasing identifiers.
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// Create a new generator starting at 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create a generator whose first id is `first`. Used to keep enemy ids
    /// visually distinct from player ids in logs.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Return the next unique identifier.
    pub fn next_id<T: From<u64>>(&self) -> T {
        T::from(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
