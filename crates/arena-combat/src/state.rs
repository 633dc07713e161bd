//! Per-combatant state held by the engine.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use arena_config::EnemyStatsConfig;
use arena_protocol::{
    CombatantId, CombatantView, EnemyId, EnemyKind, EnemyView, HeroId, InstanceId, MatchId,
    PlayerId, Vec3, ZoneId,
};
use arena_store::HeroSnapshot;

use crate::effects::EffectList;
use crate::vitals::Vitals;

/// A player's fighting state for the lifetime of one instance.
#[derive(Debug, Clone)]
pub struct PlayerCombatState {
    pub player: PlayerId,
    pub instance: InstanceId,
    pub hero: HeroId,
    pub name: String,
    pub level: u32,
    pub experience: u32,
    pub vitals: Vitals,
    pub attack: i32,
    pub defense: i32,
    pub position: Vec3,
    /// Spell key to last cast time.
    pub cooldowns: HashMap<String, Instant>,
    pub effects: EffectList,
}

impl PlayerCombatState {
    pub fn from_hero(hero: &HeroSnapshot, instance: InstanceId, position: Vec3) -> Self {
        Self {
            player: hero.player_id,
            instance,
            hero: hero.hero_id,
            name: hero.name.clone(),
            level: hero.level,
            experience: hero.experience,
            vitals: Vitals::new(hero.health, hero.max_health, hero.power, hero.max_power),
            attack: hero.attack,
            defense: hero.defense,
            position,
            cooldowns: HashMap::new(),
            effects: EffectList::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.vitals.is_alive()
    }

    /// Time left before `spell` may be cast again.
    pub fn cooldown_remaining(
        &self,
        spell: &str,
        cooldown: Duration,
        now: Instant,
    ) -> Option<Duration> {
        let last = self.cooldowns.get(spell)?;
        let ready_at = *last + cooldown;
        (now < ready_at).then(|| ready_at - now)
    }

    pub fn view(&self, now: Instant) -> CombatantView {
        CombatantView {
            id: CombatantId::Player(self.player),
            health: self.vitals.health(),
            max_health: self.vitals.max_health(),
            power: self.vitals.power(),
            max_power: self.vitals.max_power(),
            position: self.position,
            alive: self.is_alive(),
            effects: self.effects.views(now),
        }
    }
}

/// Stat block for a freshly spawned enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnemyStats {
    pub health: i32,
    pub power: i32,
    pub attack: i32,
    pub defense: i32,
}

impl From<EnemyStatsConfig> for EnemyStats {
    fn from(c: EnemyStatsConfig) -> Self {
        Self {
            health: c.health,
            power: c.power,
            attack: c.attack,
            defense: c.defense,
        }
    }
}

/// What an enemy is visibly doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Animation {
    #[default]
    Idle,
    Walk,
    Run,
    Attack,
    Cast,
    Dead,
}

impl Animation {
    pub fn as_str(self) -> &'static str {
        match self {
            Animation::Idle => "idle",
            Animation::Walk => "walk",
            Animation::Run => "run",
            Animation::Attack => "attack",
            Animation::Cast => "cast",
            Animation::Dead => "dead",
        }
    }
}

/// A live enemy. Enemies bound to an instance only fight that instance's
/// players; unbound ones roam their zone.
#[derive(Debug, Clone)]
pub struct EnemyState {
    pub id: EnemyId,
    pub kind: EnemyKind,
    pub zone: ZoneId,
    pub instance: Option<InstanceId>,
    pub match_id: Option<MatchId>,
    pub vitals: Vitals,
    pub attack: i32,
    pub defense: i32,
    pub position: Vec3,
    /// Heading in radians; forward is `(cos, sin)` on the XZ plane.
    pub facing: f32,
    pub animation: Animation,
    /// Magic schools this enemy can cast. Empty means melee only.
    pub affinities: Vec<String>,
    pub effects: EffectList,
    pub last_attack: Option<Instant>,
    pub last_cast: Option<Instant>,
    pub next_wander_at: Option<Instant>,
}

impl EnemyState {
    pub fn is_alive(&self) -> bool {
        self.vitals.is_alive()
    }

    /// Spawned for a match whose instance does not exist yet.
    pub fn is_staged(&self) -> bool {
        self.match_id.is_some() && self.instance.is_none()
    }

    pub fn combatant_view(&self, now: Instant) -> CombatantView {
        CombatantView {
            id: CombatantId::Enemy(self.id),
            health: self.vitals.health(),
            max_health: self.vitals.max_health(),
            power: self.vitals.power(),
            max_power: self.vitals.max_power(),
            position: self.position,
            alive: self.is_alive(),
            effects: self.effects.views(now),
        }
    }

    pub fn view(&self) -> EnemyView {
        EnemyView {
            enemy: self.id,
            position: self.position,
            facing: self.facing,
            animation: self.animation.as_str().to_string(),
            health: self.vitals.health(),
            max_health: self.vitals.max_health(),
        }
    }
}
