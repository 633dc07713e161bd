//! Enemy AI: a small per-enemy state machine stepped at the AI tick rate.
//!
//! Each tick an enemy is frozen, engaged or wandering. Engagement needs a
//! player both inside the detection radius and inside the forward vision
//! cone, so approaching from behind goes unnoticed. Offensive actions are
//! only reported here; the orchestrator applies them through
//! [`CombatEngine::apply_enemy_attack`](crate::CombatEngine::apply_enemy_attack).

use std::f32::consts::TAU;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::time::Instant;
use tracing::{debug, trace};

use arena_config::AiConfig;
use arena_protocol::{
    EnemyActionKind, EnemyId, EnemyKind, EnemyView, InstanceId, PlayerId, Vec3, ZoneId,
    ground_distance,
};

use crate::roster::EnemyRoster;
use crate::state::{Animation, EnemyState};
use crate::vitals::compute_damage;

/// A player an enemy may chase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AiTarget {
    pub player: PlayerId,
    pub zone: ZoneId,
    pub instance: Option<InstanceId>,
    pub position: Vec3,
    pub defense: i32,
}

/// An attack or cast for the orchestrator to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnemyAction {
    pub kind: EnemyActionKind,
    pub target: PlayerId,
    pub damage: i32,
}

/// What one enemy did this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct EnemyUpdate {
    pub enemy: EnemyId,
    pub zone: ZoneId,
    pub instance: Option<InstanceId>,
    pub view: EnemyView,
    pub action: Option<EnemyAction>,
    /// Died to poison this tick.
    pub died: bool,
}

pub struct EnemyAi {
    config: AiConfig,
    roster: Arc<EnemyRoster>,
    fov_cos: f32,
    rng: Mutex<ChaCha8Rng>,
}

impl EnemyAi {
    pub fn new(config: AiConfig, roster: Arc<EnemyRoster>) -> Self {
        let seed = config.rng_seed.unwrap_or_else(|| rand::rng().random());
        Self {
            fov_cos: config.fov_half_angle_deg.to_radians().cos(),
            config,
            roster,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Step every living enemy by `dt` seconds. Unbound enemies that die
    /// here leave the roster immediately; instance enemies stay until the
    /// instance is cleaned up. Match enemies stay inert until their
    /// instance binds them.
    pub fn tick(&self, targets: &[AiTarget], now: Instant, dt: f32) -> Vec<EnemyUpdate> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let mut updates = Vec::new();
        for mut entry in self.roster.enemies.iter_mut() {
            let enemy = entry.value_mut();
            if !enemy.is_alive() || enemy.is_staged() {
                continue;
            }
            let action = self.step(enemy, targets, now, dt, &mut rng);
            let died = !enemy.is_alive();
            updates.push(EnemyUpdate {
                enemy: enemy.id,
                zone: enemy.zone,
                instance: enemy.instance,
                view: enemy.view(),
                action,
                died,
            });
        }
        drop(rng);

        for update in updates.iter().filter(|u| u.died && u.instance.is_none()) {
            self.roster.despawn(update.enemy);
        }
        updates.sort_by_key(|u| u.enemy);
        updates
    }

    fn step(
        &self,
        enemy: &mut EnemyState,
        targets: &[AiTarget],
        now: Instant,
        dt: f32,
        rng: &mut ChaCha8Rng,
    ) -> Option<EnemyAction> {
        enemy.effects.prune(now);
        let poison = enemy.effects.poison_damage_due(now);
        if poison > 0 {
            enemy.vitals.take_damage(poison);
            if !enemy.is_alive() {
                debug!("{} succumbed to poison", enemy.id);
                enemy.animation = Animation::Dead;
                return None;
            }
        }

        if enemy.effects.is_frozen(now) {
            enemy.animation = Animation::Idle;
            return None;
        }

        let speed = self.speed(enemy.kind) * enemy.effects.slow_factor(now);
        match self.spot(enemy, targets) {
            Some(target) => self.engage(enemy, target, now, dt, speed),
            None => {
                self.wander(enemy, now, dt, speed, rng);
                None
            }
        }
    }

    /// Nearest eligible player the enemy can see, ties broken by id.
    fn spot<'a>(&self, enemy: &EnemyState, targets: &'a [AiTarget]) -> Option<&'a AiTarget> {
        targets
            .iter()
            .filter(|t| match enemy.instance {
                Some(instance) => t.instance == Some(instance),
                None => t.zone == enemy.zone,
            })
            .map(|t| (ground_distance(enemy.position, t.position), t))
            .filter(|(d, t)| *d <= self.config.detection_radius && self.in_view(enemy, t.position))
            .min_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.player.cmp(&b.1.player)))
            .map(|(_, t)| t)
    }

    fn in_view(&self, enemy: &EnemyState, point: Vec3) -> bool {
        let to = Vec3::new(point.x - enemy.position.x, 0.0, point.z - enemy.position.z);
        let Some(dir) = to.try_normalize() else { return true };
        forward(enemy.facing).dot(dir) >= self.fov_cos
    }

    fn engage(
        &self,
        enemy: &mut EnemyState,
        target: &AiTarget,
        now: Instant,
        dt: f32,
        speed: f32,
    ) -> Option<EnemyAction> {
        let distance = ground_distance(enemy.position, target.position);
        let dx = target.position.x - enemy.position.x;
        let dz = target.position.z - enemy.position.z;
        if distance > f32::EPSILON {
            enemy.facing = dz.atan2(dx);
        }

        if distance <= self.config.melee_range {
            let cooldown = Duration::from_millis(self.config.attack_cooldown_ms);
            if !ready(enemy.last_attack, cooldown, now) {
                enemy.animation = Animation::Idle;
                return None;
            }
            enemy.last_attack = Some(now);
            enemy.animation = Animation::Attack;
            let damage = compute_damage(enemy.attack, enemy.attack, target.defense);
            trace!("{} attacks {} for {damage}", enemy.id, target.player);
            return Some(EnemyAction {
                kind: EnemyActionKind::Attack,
                target: target.player,
                damage,
            });
        }

        if distance <= self.config.cast_range && !enemy.affinities.is_empty() {
            let cooldown = Duration::from_millis(self.config.cast_cooldown_ms);
            if !ready(enemy.last_cast, cooldown, now) {
                enemy.animation = Animation::Idle;
                return None;
            }
            enemy.last_cast = Some(now);
            enemy.animation = Animation::Cast;
            let base = (enemy.attack as f32 * self.config.cast_damage_multiplier).floor() as i32;
            let damage = compute_damage(base, enemy.attack, target.defense);
            trace!("{} casts at {} for {damage}", enemy.id, target.player);
            return Some(EnemyAction {
                kind: EnemyActionKind::Cast,
                target: target.player,
                damage,
            });
        }

        let step = (speed * dt).min(distance);
        enemy.position += forward(enemy.facing) * step;
        enemy.animation = Animation::Run;
        None
    }

    fn wander(
        &self,
        enemy: &mut EnemyState,
        now: Instant,
        dt: f32,
        speed: f32,
        rng: &mut ChaCha8Rng,
    ) {
        if enemy.next_wander_at.is_none_or(|at| now >= at) {
            enemy.facing = rng.random_range(0.0..TAU);
            let lo = self.config.wander_min_ms;
            let hi = self.config.wander_max_ms.max(lo);
            enemy.next_wander_at = Some(now + Duration::from_millis(rng.random_range(lo..=hi)));
        }
        let step = speed * self.config.wander_speed_factor * dt;
        enemy.position += forward(enemy.facing) * step;
        enemy.animation = if step > 0.0 { Animation::Walk } else { Animation::Idle };
    }

    fn speed(&self, kind: EnemyKind) -> f32 {
        match kind {
            EnemyKind::Melee => self.config.melee_speed,
            EnemyKind::Caster => self.config.caster_speed,
            EnemyKind::Tank => self.config.tank_speed,
        }
    }
}

/// Unit heading on the XZ plane.
fn forward(facing: f32) -> Vec3 {
    Vec3::new(facing.cos(), 0.0, facing.sin())
}

fn ready(last: Option<Instant>, cooldown: Duration, now: Instant) -> bool {
    last.is_none_or(|at| now.saturating_duration_since(at) >= cooldown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::EnemySeed;
    use crate::state::EnemyStats;
    use arena_protocol::{EffectKind, EffectSpec, MatchId};

    const ZONE: ZoneId = ZoneId(1);

    fn setup() -> (EnemyAi, Arc<EnemyRoster>) {
        let roster = Arc::new(EnemyRoster::new(EnemyStats {
            health: 100,
            power: 50,
            attack: 10,
            defense: 5,
        }));
        let config = AiConfig {
            rng_seed: Some(7),
            ..AiConfig::default()
        };
        (EnemyAi::new(config, Arc::clone(&roster)), roster)
    }

    fn target(id: u64, x: f32, z: f32) -> AiTarget {
        AiTarget {
            player: PlayerId(id),
            zone: ZONE,
            instance: None,
            position: Vec3::new(x, 0.0, z),
            defense: 4,
        }
    }

    fn spawn(roster: &EnemyRoster, kind: EnemyKind) -> EnemyId {
        roster.spawn(EnemySeed::new(kind, ZONE, Vec3::ZERO))
    }

    #[test]
    fn test_melee_attack_in_front() {
        let (ai, roster) = setup();
        let id = spawn(&roster, EnemyKind::Melee);
        let now = Instant::now();

        let updates = ai.tick(&[target(1, 2.0, 0.0)], now, 0.05);
        let action = updates[0].action.unwrap();
        assert_eq!(action.kind, EnemyActionKind::Attack);
        assert_eq!(action.target, PlayerId(1));
        // 10 + floor(1.0) - floor(2.0)
        assert_eq!(action.damage, 9);
        assert_eq!(roster.get(id).unwrap().animation, Animation::Attack);
    }

    #[test]
    fn test_attack_respects_cooldown() {
        let (ai, roster) = setup();
        spawn(&roster, EnemyKind::Melee);
        let now = Instant::now();
        let targets = [target(1, 2.0, 0.0)];

        assert!(ai.tick(&targets, now, 0.05)[0].action.is_some());
        assert!(ai.tick(&targets, now + Duration::from_millis(500), 0.05)[0].action.is_none());
        assert!(ai.tick(&targets, now + Duration::from_millis(1500), 0.05)[0].action.is_some());
    }

    #[test]
    fn test_player_behind_goes_unnoticed() {
        let (ai, roster) = setup();
        let id = spawn(&roster, EnemyKind::Melee);
        let updates = ai.tick(&[target(1, -2.0, 0.0)], Instant::now(), 0.05);
        assert!(updates[0].action.is_none());
        assert_eq!(roster.get(id).unwrap().animation, Animation::Walk);
    }

    #[test]
    fn test_player_outside_radius_ignored() {
        let (ai, roster) = setup();
        spawn(&roster, EnemyKind::Melee);
        let updates = ai.tick(&[target(1, 20.0, 0.0)], Instant::now(), 0.05);
        assert!(updates[0].action.is_none());
    }

    #[test]
    fn test_caster_casts_at_range() {
        let (ai, roster) = setup();
        spawn(&roster, EnemyKind::Caster);
        let updates = ai.tick(&[target(1, 8.0, 0.0)], Instant::now(), 0.05);
        let action = updates[0].action.unwrap();
        assert_eq!(action.kind, EnemyActionKind::Cast);
        // floor(10 * 1.5) + 1 - 2
        assert_eq!(action.damage, 14);
    }

    #[test]
    fn test_melee_chases_at_range() {
        let (ai, roster) = setup();
        let id = spawn(&roster, EnemyKind::Melee);
        let updates = ai.tick(&[target(1, 8.0, 0.0)], Instant::now(), 0.5);
        assert!(updates[0].action.is_none());
        let enemy = roster.get(id).unwrap();
        assert_eq!(enemy.animation, Animation::Run);
        assert!((enemy.position.x - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_slow_scales_chase_speed() {
        let (ai, roster) = setup();
        let id = spawn(&roster, EnemyKind::Melee);
        let now = Instant::now();
        roster.with_enemy_mut(id, |e| {
            let slow = EffectSpec::timed(EffectKind::Slow { percent: 50.0 }, 3000);
            e.effects.apply(&slow, "frost_bolt", now);
        });
        ai.tick(&[target(1, 8.0, 0.0)], now, 0.5);
        assert!((roster.get(id).unwrap().position.x - 0.75).abs() < 1e-5);
    }

    #[test]
    fn test_frozen_enemy_holds_still() {
        let (ai, roster) = setup();
        let id = spawn(&roster, EnemyKind::Melee);
        let now = Instant::now();
        roster.with_enemy_mut(id, |e| {
            e.effects.apply(&EffectSpec::timed(EffectKind::Freeze, 2000), "frost_nova", now);
        });
        let updates = ai.tick(&[target(1, 2.0, 0.0)], now, 0.5);
        assert!(updates[0].action.is_none());
        let enemy = roster.get(id).unwrap();
        assert_eq!(enemy.position, Vec3::ZERO);
        assert_eq!(enemy.animation, Animation::Idle);
    }

    #[test]
    fn test_instance_enemy_ignores_outsiders() {
        let (ai, roster) = setup();
        let id = spawn(&roster, EnemyKind::Melee);
        roster.bind_instance(id, InstanceId(5));

        let outsider = target(1, 2.0, 0.0);
        let updates = ai.tick(&[outsider], Instant::now(), 0.05);
        assert!(updates[0].action.is_none());

        let member = AiTarget {
            instance: Some(InstanceId(5)),
            ..target(2, 2.0, 0.0)
        };
        roster.with_enemy_mut(id, |e| {
            e.position = Vec3::ZERO;
            e.facing = 0.0;
        });
        let updates = ai.tick(&[outsider, member], Instant::now(), 0.05);
        assert_eq!(updates[0].action.map(|a| a.target), Some(PlayerId(2)));
    }

    #[test]
    fn test_match_enemy_waits_for_instance() {
        let (ai, roster) = setup();
        let seed = EnemySeed::new(EnemyKind::Melee, ZONE, Vec3::ZERO).for_match(MatchId(3));
        let id = roster.spawn(seed);
        let now = Instant::now();

        // A player of another fight stands right in front of it.
        let bystander = target(1, 2.0, 0.0);
        assert!(ai.tick(&[bystander], now, 0.5).is_empty());
        let enemy = roster.get(id).unwrap();
        assert_eq!(enemy.position, Vec3::ZERO);
        assert!(enemy.last_attack.is_none());

        roster.bind_instance(id, InstanceId(4));
        let member = AiTarget {
            instance: Some(InstanceId(4)),
            ..target(2, 2.0, 0.0)
        };
        let updates = ai.tick(&[bystander, member], now, 0.05);
        assert_eq!(updates[0].action.map(|a| a.target), Some(PlayerId(2)));
    }

    #[test]
    fn test_poison_death_despawns_roaming_enemy() {
        let (ai, roster) = setup();
        let id = spawn(&roster, EnemyKind::Melee);
        let start = Instant::now();
        roster.with_enemy_mut(id, |e| {
            e.vitals.take_damage(98);
            e.effects.apply(
                &EffectSpec::timed(EffectKind::Poison { tick_damage: 4, tick_rate_ms: 1000 }, 5000),
                "poison_cloud",
                start,
            );
        });
        let updates = ai.tick(&[], start + Duration::from_secs(1), 0.05);
        assert!(updates[0].died);
        assert_eq!(updates[0].view.animation, "dead");
        assert!(roster.get(id).is_none());
    }
}
