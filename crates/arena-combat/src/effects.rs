//! Status effects attached to combatants.
//!
//! Instant kinds (knockback, lifesteal, chain) resolve at cast time and
//! never land here. Everything else is wrapped in a [`StatusEffect`]
//! envelope that records where it came from and when it runs out.

use std::time::Duration;

use tokio::time::Instant;

use arena_protocol::{EffectKind, EffectSpec, EffectView};

/// One active effect on a combatant.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEffect {
    pub kind: EffectKind,
    pub applied_at: Instant,
    /// `None` keeps the effect until something removes it.
    pub expires_at: Option<Instant>,
    pub source_spell: String,
    /// Last time a periodic effect fired.
    pub last_tick: Instant,
}

impl StatusEffect {
    pub fn from_spec(spec: &EffectSpec, source_spell: &str, now: Instant) -> Self {
        Self {
            kind: spec.kind.clone(),
            applied_at: now,
            expires_at: spec.duration_ms.map(|ms| now + Duration::from_millis(ms)),
            source_spell: source_spell.to_string(),
            last_tick: now,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    pub fn view(&self, now: Instant) -> EffectView {
        EffectView {
            kind: self.kind.clone(),
            remaining_ms: self
                .expires_at
                .map(|at| at.saturating_duration_since(now).as_millis() as u64),
            source_spell: self.source_spell.clone(),
        }
    }
}

/// The active effects of one combatant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectList {
    effects: Vec<StatusEffect>,
}

impl EffectList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a timed effect. Re-applying the same kind from the same spell
    /// refreshes the existing entry instead of stacking a second one.
    /// Returns `false` for instant kinds, which are never stored.
    pub fn apply(&mut self, spec: &EffectSpec, source_spell: &str, now: Instant) -> bool {
        if spec.kind.is_instant() {
            return false;
        }
        let fresh = StatusEffect::from_spec(spec, source_spell, now);
        match self.effects.iter_mut().find(|e| {
            e.source_spell == source_spell && e.kind.name() == fresh.kind.name()
        }) {
            Some(existing) => *existing = fresh,
            None => self.effects.push(fresh),
        }
        true
    }

    /// Drop expired effects. Returns how many were removed.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.effects.len();
        self.effects.retain(|e| !e.is_expired(now));
        before - self.effects.len()
    }

    /// Total poison damage due at `now`. Each poison fires at most once per
    /// call and only when a full tick period has passed since it last fired.
    pub fn poison_damage_due(&mut self, now: Instant) -> i32 {
        let mut total = 0;
        for effect in &mut self.effects {
            if effect.is_expired(now) {
                continue;
            }
            if let EffectKind::Poison {
                tick_damage,
                tick_rate_ms,
            } = effect.kind
                && now.saturating_duration_since(effect.last_tick)
                    >= Duration::from_millis(tick_rate_ms)
            {
                total += tick_damage.max(0);
                effect.last_tick = now;
            }
        }
        total
    }

    pub fn is_frozen(&self, now: Instant) -> bool {
        self.live(now).any(|e| matches!(e.kind, EffectKind::Freeze))
    }

    /// Movement multiplier from the strongest active slow, in `0.0..=1.0`.
    pub fn slow_factor(&self, now: Instant) -> f32 {
        self.live(now)
            .filter_map(|e| match e.kind {
                EffectKind::Slow { percent } => Some((1.0 - percent / 100.0).clamp(0.0, 1.0)),
                _ => None,
            })
            .fold(1.0, f32::min)
    }

    pub fn views(&self, now: Instant) -> Vec<EffectView> {
        self.live(now).map(|e| e.view(now)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatusEffect> {
        self.effects.iter()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    fn live(&self, now: Instant) -> impl Iterator<Item = &StatusEffect> {
        self.effects.iter().filter(move |e| !e.is_expired(now))
    }
}
