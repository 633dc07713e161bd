//! The once-per-second instance tick.

use tokio::time::Instant;
use tracing::{debug, info, trace};

use arena_protocol::{CombatResult, InstanceId, LevelUpSummary, ServerEvent};

use super::CombatEngine;
use crate::error::CombatError;
use crate::instance::Abandonment;
use crate::state::Animation;

/// What a tick did to an instance.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Still running.
    Continue,
    /// Nobody stayed connected; the instance was ended as abandoned.
    Abandoned(Vec<LevelUpSummary>),
    /// Someone won, lost or drew.
    Finished(CombatResult, Vec<LevelUpSummary>),
    /// Was already over before this tick.
    AlreadyEnded,
}

impl CombatEngine {
    /// Abandonment check, then power regeneration, effect expiry and poison
    /// for every living combatant.
    pub async fn process_combat_tick(
        &self,
        id: InstanceId,
        now: Instant,
    ) -> Result<TickOutcome, CombatError> {
        let handle = self.handle(id)?;
        let mut instance = handle.lock().await;
        if !instance.is_active() {
            return Ok(TickOutcome::AlreadyEnded);
        }

        match instance.abandonment(now, self.config.abandon_timeout()) {
            Abandonment::Expired => {
                drop(instance);
                info!("Combat {id} abandoned");
                let results = self.end_combat_instance(id, CombatResult::Abandoned, now).await?;
                return Ok(TickOutcome::Abandoned(results));
            }
            Abandonment::Waiting(left) => trace!("{id} empty, {left:?} until abandoned"),
            Abandonment::Occupied => {}
        }

        let regen = self.config.power_regen_per_tick;
        let mut deaths = Vec::new();
        for player in &instance.players {
            let Some(mut state) = self.players.get_mut(player).filter(|s| s.instance == id) else {
                continue;
            };
            if !state.is_alive() {
                continue;
            }
            state.vitals.restore_power(regen);
            state.effects.prune(now);
            let poison = state.effects.poison_damage_due(now);
            if poison > 0 {
                state.vitals.take_damage(poison);
                trace!("{player} took {poison} poison damage");
                if !state.is_alive() {
                    deaths.push(*player);
                }
            }
        }
        for enemy in &instance.enemies {
            self.enemies.with_enemy_mut(*enemy, |state| {
                if !state.is_alive() {
                    return;
                }
                state.vitals.restore_power(regen);
                state.effects.prune(now);
                let poison = state.effects.poison_damage_due(now);
                if poison > 0 {
                    state.vitals.take_damage(poison);
                    if !state.is_alive() {
                        state.animation = Animation::Dead;
                    }
                }
            });
        }
        for player in deaths {
            debug!("{player} succumbed to poison in {id}");
            instance.stats_mut(player).deaths += 1;
        }
        Ok(TickOutcome::Continue)
    }

    /// One full tick: upkeep, win/loss evaluation, then the state broadcast.
    pub async fn tick_instance(
        &self,
        id: InstanceId,
        now: Instant,
    ) -> Result<TickOutcome, CombatError> {
        match self.process_combat_tick(id, now).await? {
            TickOutcome::Continue => {}
            other => return Ok(other),
        }

        let conditions = self.check_combat_conditions(id).await?;
        if let Some(result) = conditions.result.filter(|_| conditions.ended) {
            let results = self.end_combat_instance(id, result, now).await?;
            return Ok(TickOutcome::Finished(result, results));
        }

        let snapshot = self.combat_snapshot(id, now).await?;
        self.events.to_instance(id, ServerEvent::CombatState(snapshot));
        Ok(TickOutcome::Continue)
    }
}
