//! Status effect parameters as carried by spell definitions and state
//! snapshots. The timing envelope (`applied_at`, `expires_at`) is added by the
//! combat engine when an effect lands.

use serde::{Deserialize, Serialize};

/// The type-specific half of a status effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectKind {
    /// Periodic damage.
    Poison {
        /// Damage dealt per tick.
        tick_damage: i32,
        /// Milliseconds between ticks.
        tick_rate_ms: u64,
    },
    /// Target cannot move or attack.
    Freeze,
    /// Movement speed reduced by `percent` (0–100).
    Slow { percent: f32 },
    /// Horizontal push away from the caster, resolved on impact.
    Knockback { force: f32 },
    /// Caster heals for `percent` of raw damage dealt to enemies.
    Lifesteal { percent: f32 },
    /// The hit jumps to up to `bounces` further enemies within `range`.
    Chain { bounces: u32, range: f32 },
}

impl EffectKind {
    /// Wire name of the effect tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Poison { .. } => "poison",
            Self::Freeze => "freeze",
            Self::Slow { .. } => "slow",
            Self::Knockback { .. } => "knockback",
            Self::Lifesteal { .. } => "lifesteal",
            Self::Chain { .. } => "chain",
        }
    }

    /// Effects that resolve entirely at cast time and never sit on a
    /// combatant's effect list.
    pub fn is_instant(&self) -> bool {
        matches!(
            self,
            Self::Knockback { .. } | Self::Lifesteal { .. } | Self::Chain { .. }
        )
    }
}

/// An effect attached to a spell definition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectSpec {
    pub kind: EffectKind,
    /// Lifetime in milliseconds from cast time; `None` is permanent.
    pub duration_ms: Option<u64>,
}

impl EffectSpec {
    /// Shorthand for a timed effect.
    pub fn timed(kind: EffectKind, duration_ms: u64) -> Self {
        Self {
            kind,
            duration_ms: Some(duration_ms),
        }
    }

    /// Shorthand for an effect resolved on impact.
    pub fn instant(kind: EffectKind) -> Self {
        Self {
            kind,
            duration_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_effects() {
        assert!(EffectKind::Knockback { force: 2.0 }.is_instant());
        assert!(EffectKind::Chain { bounces: 2, range: 5.0 }.is_instant());
        assert!(!EffectKind::Freeze.is_instant());
        assert!(
            !EffectKind::Poison {
                tick_damage: 3,
                tick_rate_ms: 1000
            }
            .is_instant()
        );
    }

    #[test]
    fn test_effect_tagged_serialization() {
        let json = serde_json::to_string(&EffectKind::Slow { percent: 40.0 }).unwrap();
        assert!(json.contains("\"type\":\"slow\""));
        assert!(json.contains("\"percent\":40.0"));
    }
}
