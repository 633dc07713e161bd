//! Spell validation and resolution.

use tokio::time::Instant;
use tracing::{debug, info};

use arena_protocol::{
    ActionSummary, CombatantId, EffectKind, PlayerId, ServerEvent, TargetHit, Vec3,
    ground_distance,
};
use arena_store::SpellDef;

use super::CombatEngine;
use crate::error::CastError;
use crate::instance::ActionEntry;
use crate::state::{Animation, PlayerCombatState};
use crate::targeting::{TargetPolicy, area_targets, chain_targets};
use crate::vitals::{compute_damage, heal_amount};

/// A player's request to cast.
#[derive(Debug, Clone, PartialEq)]
pub struct SpellCast {
    pub spell_key: String,
    pub target: Vec3,
    /// Client-reported caster position, if sent with the cast.
    pub caster_position: Option<Vec3>,
}

impl SpellCast {
    pub fn new(spell_key: impl Into<String>, target: Vec3) -> Self {
        Self {
            spell_key: spell_key.into(),
            target,
            caster_position: None,
        }
    }

    pub fn from_position(mut self, position: Vec3) -> Self {
        self.caster_position = Some(position);
        self
    }
}

/// Alive, power and cooldown checks, in that order.
fn check_readiness(
    caster: &PlayerCombatState,
    spell: &SpellDef,
    now: Instant,
) -> Result<(), CastError> {
    if !caster.is_alive() {
        return Err(CastError::CasterDead);
    }
    if caster.vitals.power() < spell.power_cost {
        return Err(CastError::InsufficientPower {
            have: caster.vitals.power(),
            need: spell.power_cost,
        });
    }
    if let Some(remaining) = caster.cooldown_remaining(&spell.key, spell.cooldown(), now) {
        return Err(CastError::OnCooldown {
            spell: spell.key.clone(),
            remaining_ms: remaining.as_millis().max(1) as u64,
        });
    }
    Ok(())
}

impl CombatEngine {
    /// Check a cast without changing anything.
    pub async fn validate_spell_cast(
        &self,
        player: PlayerId,
        cast: &SpellCast,
        spell: &SpellDef,
        now: Instant,
    ) -> Result<(), CastError> {
        let id = self.owner_of(player).ok_or(CastError::NotInCombat)?;
        let handle = self.handle(id).map_err(|_| CastError::NotInCombat)?;
        let instance = handle.lock().await;
        if !instance.is_active() {
            return Err(CastError::NotInCombat);
        }

        let caster = self
            .players
            .get(&player)
            .filter(|s| s.instance == id)
            .ok_or(CastError::NotInCombat)?;
        check_readiness(&caster, spell, now)?;

        let from = cast.caster_position.unwrap_or(caster.position);
        let distance = ground_distance(from, cast.target);
        if distance > spell.range {
            return Err(CastError::OutOfRange {
                distance,
                range: spell.range,
            });
        }
        Ok(())
    }

    /// Resolve a cast. Readiness is checked again under the instance lock, so
    /// a cast that passed validation but lost a race is still refused cleanly.
    pub async fn execute_spell_cast(
        &self,
        player: PlayerId,
        cast: &SpellCast,
        spell: &SpellDef,
        now: Instant,
    ) -> Result<ActionSummary, CastError> {
        let id = self.owner_of(player).ok_or(CastError::NotInCombat)?;
        let handle = self.handle(id).map_err(|_| CastError::NotInCombat)?;
        let mut instance = handle.lock().await;
        if !instance.is_active() {
            return Err(CastError::NotInCombat);
        }

        let (caster_position, caster_attack, caster_power) = {
            let mut caster = self
                .players
                .get_mut(&player)
                .filter(|s| s.instance == id)
                .ok_or(CastError::NotInCombat)?;
            check_readiness(&caster, spell, now)?;
            if let Some(position) = cast.caster_position
                && !caster.effects.is_frozen(now)
            {
                caster.position = position;
            }
            caster.vitals.spend_power(spell.power_cost);
            caster.cooldowns.insert(spell.key.clone(), now);
            (caster.position, caster.attack, caster.vitals.power())
        };

        let heal = spell.is_heal();
        let candidates = self.candidates(&instance);
        let policy = TargetPolicy {
            kind: instance.kind,
            caster: player,
            heal,
        };
        let mut targets = area_targets(&policy, &candidates, cast.target, spell.area_radius);
        if !heal {
            for effect in &spell.effects {
                if let EffectKind::Chain { bounces, range } = effect.kind {
                    let extra = chain_targets(&targets, &candidates, bounces, range);
                    targets.extend(extra);
                }
            }
        }

        let lifesteal: f32 = spell
            .effects
            .iter()
            .filter_map(|e| match e.kind {
                EffectKind::Lifesteal { percent } => Some(percent),
                _ => None,
            })
            .sum();
        let knockback: f32 = spell
            .effects
            .iter()
            .filter_map(|e| match e.kind {
                EffectKind::Knockback { force } => Some(force),
                _ => None,
            })
            .sum();

        let mut hits = Vec::with_capacity(targets.len());
        let mut stolen = 0;
        for target in targets {
            let hit = match target {
                CombatantId::Player(p) => {
                    let Some(mut state) = self.players.get_mut(&p).filter(|s| s.instance == id)
                    else {
                        continue;
                    };
                    let was_alive = state.is_alive();
                    let (damage, healing) = if heal {
                        (0, state.vitals.heal(heal_amount(spell.damage)))
                    } else {
                        let raw = compute_damage(spell.damage, caster_attack, state.defense);
                        (state.vitals.take_damage(raw), 0)
                    };
                    for effect in &spell.effects {
                        state.effects.apply(effect, &spell.key, now);
                    }
                    if knockback > 0.0 {
                        state.position = pushed(state.position, caster_position, knockback);
                    }
                    TargetHit {
                        target,
                        damage,
                        healing,
                        health_after: state.vitals.health(),
                        killed: was_alive && !state.is_alive(),
                    }
                }
                CombatantId::Enemy(e) => {
                    let hit = self.enemies.with_enemy_mut(e, |enemy| {
                        let was_alive = enemy.is_alive();
                        let (damage, healing) = if heal {
                            (0, enemy.vitals.heal(heal_amount(spell.damage)))
                        } else {
                            let raw = compute_damage(spell.damage, caster_attack, enemy.defense);
                            if lifesteal > 0.0 {
                                stolen += (raw as f32 * lifesteal / 100.0).floor() as i32;
                            }
                            (enemy.vitals.take_damage(raw), 0)
                        };
                        for effect in &spell.effects {
                            enemy.effects.apply(effect, &spell.key, now);
                        }
                        if knockback > 0.0 {
                            enemy.position = pushed(enemy.position, caster_position, knockback);
                        }
                        let killed = was_alive && !enemy.is_alive();
                        if killed {
                            enemy.animation = Animation::Dead;
                        }
                        TargetHit {
                            target,
                            damage,
                            healing,
                            health_after: enemy.vitals.health(),
                            killed,
                        }
                    });
                    let Some(hit) = hit else { continue };
                    hit
                }
            };
            hits.push(hit);
        }

        let caster_healing = if stolen > 0 {
            self.players
                .get_mut(&player)
                .map(|mut s| s.vitals.heal(stolen))
                .unwrap_or(0)
        } else {
            0
        };

        let damage: i32 = hits.iter().map(|h| h.damage).sum();
        let healing: i32 = hits.iter().map(|h| h.healing).sum::<i32>() + caster_healing;
        {
            let stats = instance.stats_mut(player);
            stats.damage_dealt += damage.max(0) as u32;
            stats.healing_done += healing.max(0) as u32;
            for hit in hits.iter().filter(|h| h.killed) {
                stats.kills += 1;
                if matches!(hit.target, CombatantId::Enemy(_)) {
                    stats.enemy_kills += 1;
                }
            }
        }
        for hit in hits.iter().filter(|h| h.killed) {
            if let CombatantId::Player(victim) = hit.target {
                instance.stats_mut(victim).deaths += 1;
            }
        }
        instance.log.push(ActionEntry {
            at: now,
            actor: CombatantId::Player(player),
            action: spell.key.clone(),
            targets: hits.iter().map(|h| h.target).collect(),
            damage,
            healing,
        });
        let zone = instance.zone;
        drop(instance);

        let summary = ActionSummary {
            instance: id,
            caster: player,
            spell_key: spell.key.clone(),
            target_point: cast.target,
            hits,
            caster_power,
            caster_healing,
        };
        debug!(
            "{player} cast {} in {id}: {} hits, {damage} damage, {healing} healing",
            spell.key,
            summary.hits.len()
        );
        self.events.to_instance(id, ServerEvent::ActionResolved(summary.clone()));
        for hit in summary.hits.iter().filter(|h| h.killed) {
            info!("{} was killed by {player} in {id}", hit.target);
            if let CombatantId::Enemy(enemy) = hit.target {
                self.events.to_instance(id, ServerEvent::EnemyDestroyed { enemy, zone });
            }
        }
        Ok(summary)
    }

    /// Look the spell up for the caster's level, validate, then execute.
    pub async fn cast(
        &self,
        player: PlayerId,
        cast: &SpellCast,
        now: Instant,
    ) -> Result<ActionSummary, CastError> {
        let level = self
            .players
            .get(&player)
            .filter(|s| self.owners.get(&player).is_some_and(|i| *i == s.instance))
            .map(|s| s.level)
            .ok_or(CastError::NotInCombat)?;
        let spell = self
            .catalog
            .spell(&cast.spell_key, level)
            .ok_or_else(|| CastError::UnknownSpell(cast.spell_key.clone()))?;
        self.validate_spell_cast(player, cast, &spell, now).await?;
        self.execute_spell_cast(player, cast, &spell, now).await
    }
}

/// `target` displaced horizontally away from `origin` by `force`.
fn pushed(target: Vec3, origin: Vec3, force: f32) -> Vec3 {
    let away = Vec3::new(target.x - origin.x, 0.0, target.z - origin.z).normalize_or_zero();
    target + away * force
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pushed_is_horizontal() {
        let moved = pushed(Vec3::new(3.0, 1.0, 0.0), Vec3::new(0.0, 5.0, 0.0), 2.0);
        assert_eq!(moved, Vec3::new(5.0, 1.0, 0.0));
    }

    #[test]
    fn test_pushed_in_place_without_direction() {
        let at = Vec3::new(1.0, 0.0, 1.0);
        assert_eq!(pushed(at, at, 3.0), at);
    }
}
