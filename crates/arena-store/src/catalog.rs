//! Spell definitions. The combat engine never derives spell numbers itself;
//! it asks a [`SpellCatalog`] for the values scaled to the caster's level.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use arena_protocol::{EffectKind, EffectSpec};

/// Damage growth per caster level above 1.
const DAMAGE_SCALING_PER_LEVEL: f32 = 0.08;

/// Scaled numbers for one spell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellDef {
    pub key: String,
    /// Positive values damage, negative values heal.
    pub damage: i32,
    pub power_cost: i32,
    pub cooldown_ms: u64,
    pub range: f32,
    pub area_radius: f32,
    pub effects: Vec<EffectSpec>,
}

impl SpellDef {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn is_heal(&self) -> bool {
        self.damage < 0
    }
}

/// Source of spell definitions.
pub trait SpellCatalog: Send + Sync {
    /// The spell scaled for `caster_level`, or `None` for an unknown key.
    fn spell(&self, key: &str, caster_level: u32) -> Option<SpellDef>;
}

/// In-memory catalog of level-1 definitions with linear damage scaling.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    spells: HashMap<String, SpellDef>,
}

impl StaticCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a level-1 definition.
    pub fn insert(&mut self, spell: SpellDef) {
        self.spells.insert(spell.key.clone(), spell);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, spell: SpellDef) -> Self {
        self.insert(spell);
        self
    }

    /// The stock spell book.
    pub fn with_defaults() -> Self {
        let spell = |key: &str, damage, power_cost, cooldown_ms, range, area_radius, effects| {
            SpellDef {
                key: key.to_string(),
                damage,
                power_cost,
                cooldown_ms,
                range,
                area_radius,
                effects,
            }
        };
        Self::new()
            .with(spell("fireball", 30, 20, 2000, 20.0, 3.0, vec![]))
            .with(spell(
                "frost_bolt",
                15,
                10,
                1500,
                20.0,
                1.0,
                vec![EffectSpec::timed(EffectKind::Slow { percent: 40.0 }, 3000)],
            ))
            .with(spell(
                "frost_nova",
                10,
                25,
                8000,
                1.0,
                6.0,
                vec![EffectSpec::timed(EffectKind::Freeze, 2000)],
            ))
            .with(spell("heal", -40, 25, 4000, 15.0, 1.5, vec![]))
            .with(spell(
                "poison_cloud",
                5,
                20,
                6000,
                18.0,
                4.0,
                vec![EffectSpec::timed(
                    EffectKind::Poison {
                        tick_damage: 4,
                        tick_rate_ms: 1000,
                    },
                    5000,
                )],
            ))
            .with(spell(
                "chain_lightning",
                20,
                30,
                5000,
                20.0,
                1.0,
                vec![EffectSpec::instant(EffectKind::Chain {
                    bounces: 2,
                    range: 6.0,
                })],
            ))
            .with(spell(
                "shockwave",
                12,
                15,
                4000,
                5.0,
                4.0,
                vec![EffectSpec::instant(EffectKind::Knockback { force: 3.0 })],
            ))
            .with(spell(
                "drain_life",
                18,
                20,
                3000,
                12.0,
                1.0,
                vec![EffectSpec::instant(EffectKind::Lifesteal { percent: 50.0 })],
            ))
    }
}

impl SpellCatalog for StaticCatalog {
    fn spell(&self, key: &str, caster_level: u32) -> Option<SpellDef> {
        let base = self.spells.get(key)?;
        let levels_above_one = caster_level.saturating_sub(1) as f32;
        let scale = 1.0 + DAMAGE_SCALING_PER_LEVEL * levels_above_one;
        Some(SpellDef {
            damage: (base.damage as f32 * scale).round() as i32,
            ..base.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_spell() {
        assert!(StaticCatalog::with_defaults().spell("meteor", 1).is_none());
    }

    #[test]
    fn test_level_one_is_base() {
        let fireball = StaticCatalog::with_defaults().spell("fireball", 1).unwrap();
        assert_eq!(fireball.damage, 30);
        assert_eq!(fireball.cooldown(), Duration::from_secs(2));
    }

    #[test]
    fn test_damage_scales_with_level() {
        let catalog = StaticCatalog::with_defaults();
        let fireball = catalog.spell("fireball", 11).unwrap();
        // 30 * 1.8
        assert_eq!(fireball.damage, 54);
        assert_eq!(fireball.power_cost, 20);
    }

    #[test]
    fn test_heal_scaling_keeps_sign() {
        let heal = StaticCatalog::with_defaults().spell("heal", 6).unwrap();
        assert!(heal.is_heal());
        assert_eq!(heal.damage, -56);
    }
}
