//! Win/loss evaluation, experience and the end of an instance.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use arena_config::ExperienceConfig;
use arena_protocol::{
    CombatKind, CombatResult, CombatantId, EnemyId, InstanceId, LevelUpSummary, PlayerId,
    ServerEvent,
};
use arena_store::{MatchRecord, ParticipantRecord};

use super::CombatEngine;
use crate::error::CombatError;
use crate::instance::InstanceState;

/// Whether a fight is over and who came out on top.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CombatConditions {
    pub ended: bool,
    pub result: Option<CombatResult>,
    pub winners: Vec<CombatantId>,
    pub losers: Vec<CombatantId>,
}

impl CombatConditions {
    fn ongoing() -> Self {
        Self::default()
    }

    fn ended(result: CombatResult, winners: Vec<CombatantId>, losers: Vec<CombatantId>) -> Self {
        Self {
            ended: true,
            result: Some(result),
            winners,
            losers,
        }
    }
}

/// Decide a fight from who is still standing.
pub fn evaluate_conditions(
    kind: CombatKind,
    players: &[(PlayerId, bool)],
    enemies: &[(EnemyId, bool)],
) -> CombatConditions {
    let all_players = || players.iter().map(|(p, _)| CombatantId::Player(*p)).collect::<Vec<_>>();
    let all_enemies = || enemies.iter().map(|(e, _)| CombatantId::Enemy(*e)).collect::<Vec<_>>();

    if kind.is_pve() && !enemies.is_empty() && enemies.iter().all(|(_, alive)| !alive) {
        return CombatConditions::ended(CombatResult::Victory, all_players(), all_enemies());
    }

    if kind.is_pvp() {
        let (alive, dead): (Vec<(PlayerId, bool)>, Vec<(PlayerId, bool)>) =
            players.iter().copied().partition(|(_, alive)| *alive);
        if alive.is_empty() {
            return CombatConditions::ended(CombatResult::Draw, all_players(), Vec::new());
        }
        if alive.len() == 1 && !dead.is_empty() {
            return CombatConditions::ended(
                CombatResult::Victory,
                vec![CombatantId::Player(alive[0].0)],
                dead.iter().map(|(p, _)| CombatantId::Player(*p)).collect(),
            );
        }
        return CombatConditions::ongoing();
    }

    if !players.is_empty() && players.iter().all(|(_, alive)| !alive) {
        return CombatConditions::ended(CombatResult::Defeat, all_enemies(), all_players());
    }
    CombatConditions::ongoing()
}

/// Winner and loser sets recorded in history, derived from final health.
fn sides(
    result: CombatResult,
    kind: CombatKind,
    players: &[(PlayerId, bool)],
    enemies: &[(EnemyId, bool)],
) -> (Vec<CombatantId>, Vec<CombatantId>) {
    let player_ids = |want: Option<bool>| {
        players
            .iter()
            .filter(|(_, alive)| want.is_none_or(|w| *alive == w))
            .map(|(p, _)| CombatantId::Player(*p))
            .collect::<Vec<_>>()
    };
    let enemy_ids = || enemies.iter().map(|(e, _)| CombatantId::Enemy(*e)).collect::<Vec<_>>();

    match result {
        CombatResult::Draw => (player_ids(None), Vec::new()),
        CombatResult::Defeat => (enemy_ids(), player_ids(None)),
        CombatResult::Victory if kind.is_pve() => (player_ids(None), enemy_ids()),
        CombatResult::Victory | CombatResult::Abandoned => {
            let mut losers = player_ids(Some(false));
            losers.extend(
                enemies
                    .iter()
                    .filter(|(_, alive)| !alive)
                    .map(|(e, _)| CombatantId::Enemy(*e)),
            );
            (player_ids(Some(true)), losers)
        }
    }
}

/// Experience for one player: a tenth of the fight's seconds, the outcome
/// bonus, and bounties for kills and PvP opponents, with a floor.
pub fn experience_award(
    config: &ExperienceConfig,
    elapsed: Duration,
    outcome: CombatResult,
    enemy_kills: u32,
    opponents: u32,
) -> u32 {
    let bonus = match outcome {
        CombatResult::Victory => config.victory_bonus,
        CombatResult::Draw => config.draw_bonus,
        CombatResult::Defeat => config.defeat_bonus,
        CombatResult::Abandoned => config.abandoned_bonus,
    };
    let time = u32::try_from(elapsed.as_secs() / 10).unwrap_or(u32::MAX);
    time.saturating_add(bonus)
        .saturating_add(enemy_kills.saturating_mul(config.per_enemy_kill))
        .saturating_add(opponents.saturating_mul(config.per_pvp_opponent))
        .max(config.minimum)
}

/// Add experience, levelling up as many times as it covers. Each level
/// needs `100 * level` experience. Returns `(level, experience, leveled_up)`.
pub fn apply_experience(level: u32, experience: u32, gained: u32) -> (u32, u32, bool) {
    let mut level = level.max(1);
    let mut experience = experience.saturating_add(gained);
    let start = level;
    while experience >= 100 * level {
        experience -= 100 * level;
        level += 1;
    }
    (level, experience, level > start)
}

impl CombatEngine {
    pub async fn check_combat_conditions(
        &self,
        id: InstanceId,
    ) -> Result<CombatConditions, CombatError> {
        let handle = self.handle(id)?;
        let instance = handle.lock().await;
        if !instance.is_active() {
            return Ok(CombatConditions {
                ended: true,
                result: instance.result,
                ..CombatConditions::default()
            });
        }
        let (players, enemies) = self.standing(&instance.players, &instance.enemies, id);
        Ok(evaluate_conditions(instance.kind, &players, &enemies))
    }

    /// End an instance: award experience, persist heroes, record history,
    /// notify the instance and schedule cleanup. Persistence failures are
    /// logged per player and never stop the rest.
    pub async fn end_combat_instance(
        &self,
        id: InstanceId,
        result: CombatResult,
        now: Instant,
    ) -> Result<Vec<LevelUpSummary>, CombatError> {
        let handle = self.handle(id)?;
        let instance = {
            let mut instance = handle.lock().await;
            if instance.state == InstanceState::Ended {
                return Err(CombatError::AlreadyEnded(id));
            }
            instance.state = InstanceState::Ended;
            instance.result = Some(result);
            instance.ended_at = Some(now);
            instance.empty_since = None;
            instance.clone()
        };

        self.zones.unregister_combat(instance.zone, id);
        self.reap_at.insert(id, now + self.config.cleanup_grace());

        let finals: Vec<_> = instance
            .players
            .iter()
            .filter_map(|p| {
                self.players
                    .get(p)
                    .filter(|s| s.instance == id)
                    .map(|s| s.clone())
            })
            .collect();
        let (players, enemies) = self.standing(&instance.players, &instance.enemies, id);
        let (winners, losers) = sides(result, instance.kind, &players, &enemies);

        let elapsed = instance.elapsed(now);
        let opponents = if instance.kind.is_pvp() {
            u32::try_from(instance.players.len().saturating_sub(1)).unwrap_or(u32::MAX)
        } else {
            0
        };

        let mut summaries = Vec::with_capacity(finals.len());
        for state in &finals {
            let outcome = match result {
                CombatResult::Abandoned | CombatResult::Draw => result,
                _ if winners.contains(&CombatantId::Player(state.player)) => CombatResult::Victory,
                _ => CombatResult::Defeat,
            };
            let stats = instance.stats(state.player);
            let gained = experience_award(
                &self.config.experience,
                elapsed,
                outcome,
                stats.enemy_kills,
                opponents,
            );
            let (level, experience, leveled_up) =
                apply_experience(state.level, state.experience, gained);

            if let Err(e) = self.heroes.save_progress(state.hero, level, experience).await {
                warn!("Failed to save progress for {}: {e}", state.player);
            }
            if let Err(e) = self
                .heroes
                .save_vitals(state.hero, state.vitals.health(), state.vitals.power())
                .await
            {
                warn!("Failed to save vitals for {}: {e}", state.player);
            }
            if leveled_up {
                info!("{} reached level {level}", state.player);
            }
            summaries.push(LevelUpSummary {
                player: state.player,
                outcome,
                experience_gained: gained,
                level,
                experience,
                leveled_up,
            });
        }
        // Players stay owned until their heroes are written back, so regen
        // cannot slip in between.
        for player in &instance.players {
            self.owners.remove_if(player, |_, owner| *owner == id);
        }

        let record = MatchRecord {
            instance: id,
            kind: instance.kind,
            zone: instance.zone,
            result,
            duration_secs: elapsed.as_secs(),
            participants: instance
                .players
                .iter()
                .map(|p| {
                    let s = instance.stats(*p);
                    ParticipantRecord {
                        player: *p,
                        damage_dealt: s.damage_dealt,
                        healing_done: s.healing_done,
                        kills: s.kills,
                        deaths: s.deaths,
                    }
                })
                .collect(),
            winners: winners.clone(),
            losers: losers.clone(),
        };
        if let Err(e) = self.history.record_match(record).await {
            warn!("Failed to record history for {id}: {e}");
        }

        info!("Combat {id} ended: {result:?} after {}s", elapsed.as_secs());
        self.events.to_instance(
            id,
            ServerEvent::CombatEnded {
                instance: id,
                result,
                winners,
                losers,
                players: summaries.clone(),
            },
        );
        Ok(summaries)
    }

    /// `(id, alive)` for every player and enemy of an instance.
    fn standing(
        &self,
        players: &[PlayerId],
        enemies: &[EnemyId],
        id: InstanceId,
    ) -> (Vec<(PlayerId, bool)>, Vec<(EnemyId, bool)>) {
        let players = players
            .iter()
            .map(|p| {
                let alive = self
                    .players
                    .get(p)
                    .is_some_and(|s| s.instance == id && s.is_alive());
                (*p, alive)
            })
            .collect();
        let enemies = enemies.iter().map(|e| (*e, self.enemies.is_alive(*e))).collect();
        (players, enemies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: u64, alive: bool) -> (PlayerId, bool) {
        (PlayerId(id), alive)
    }

    fn e(id: u64, alive: bool) -> (EnemyId, bool) {
        (EnemyId(id), alive)
    }

    #[test]
    fn test_duel_victory() {
        let c = evaluate_conditions(CombatKind::Pvp, &[p(1, true), p(2, false)], &[]);
        assert!(c.ended);
        assert_eq!(c.result, Some(CombatResult::Victory));
        assert_eq!(c.winners, vec![CombatantId::Player(PlayerId(1))]);
        assert_eq!(c.losers, vec![CombatantId::Player(PlayerId(2))]);
    }

    #[test]
    fn test_pvp_draw_when_nobody_stands() {
        let c = evaluate_conditions(CombatKind::TeamPvp, &[p(1, false), p(2, false)], &[]);
        assert_eq!(c.result, Some(CombatResult::Draw));
        assert_eq!(c.winners.len(), 2);
    }

    #[test]
    fn test_pvp_continues_with_two_standing() {
        let c = evaluate_conditions(CombatKind::Pvp, &[p(1, true), p(2, true), p(3, false)], &[]);
        assert!(!c.ended);
    }

    #[test]
    fn test_pve_victory() {
        let c = evaluate_conditions(CombatKind::Pve, &[p(1, true), p(2, false)], &[e(10, false)]);
        assert_eq!(c.result, Some(CombatResult::Victory));
        assert_eq!(
            c.winners,
            vec![CombatantId::Player(PlayerId(1)), CombatantId::Player(PlayerId(2))]
        );
    }

    #[test]
    fn test_pve_defeat() {
        let c = evaluate_conditions(CombatKind::TeamPve, &[p(1, false)], &[e(10, true)]);
        assert_eq!(c.result, Some(CombatResult::Defeat));
        assert_eq!(c.winners, vec![CombatantId::Enemy(EnemyId(10))]);
    }

    #[test]
    fn test_pve_without_enemies_only_ends_on_defeat() {
        assert!(!evaluate_conditions(CombatKind::Pve, &[p(1, true)], &[]).ended);
        assert!(evaluate_conditions(CombatKind::Pve, &[p(1, false)], &[]).ended);
    }

    #[test]
    fn test_experience_floor() {
        let config = ExperienceConfig::default();
        let xp = experience_award(&config, Duration::from_secs(3), CombatResult::Abandoned, 0, 0);
        assert_eq!(xp, config.minimum);
    }

    #[test]
    fn test_experience_components() {
        let config = ExperienceConfig::default();
        let xp = experience_award(&config, Duration::from_secs(95), CombatResult::Victory, 2, 1);
        assert_eq!(
            xp,
            9 + config.victory_bonus + 2 * config.per_enemy_kill + config.per_pvp_opponent
        );
    }

    #[test]
    fn test_multi_level_up() {
        // 100 for level 1, 200 for level 2, 30 left over at level 3.
        assert_eq!(apply_experience(1, 20, 310), (3, 30, true));
        assert_eq!(apply_experience(4, 10, 50), (4, 60, false));
    }

    #[test]
    fn test_sides_for_pvp_victory() {
        let (winners, losers) =
            sides(CombatResult::Victory, CombatKind::Pvp, &[p(1, true), p(2, false)], &[]);
        assert_eq!(winners, vec![CombatantId::Player(PlayerId(1))]);
        assert_eq!(losers, vec![CombatantId::Player(PlayerId(2))]);
    }
}
