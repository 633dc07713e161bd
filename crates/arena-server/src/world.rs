//! Construction of the engines and the collaborators they share.

use std::sync::Arc;

use arena_combat::{Collaborators, CombatEngine, EnemyAi, EnemyRoster};
use arena_config::Config;
use arena_matchmaking::MatchmakingEngine;
use arena_protocol::Broadcaster;
use arena_regen::{CombatPresence, RegenSweep};
use arena_store::{HeroStore, MatchHistory, MemoryStore, SpellCatalog, ZoneDirectory};
use arena_zone::ZoneTracker;

/// Persistence and catalog services the engines run against.
#[derive(Clone)]
pub struct Backend {
    pub heroes: Arc<dyn HeroStore>,
    pub directory: Arc<dyn ZoneDirectory>,
    pub history: Arc<dyn MatchHistory>,
    pub catalog: Arc<dyn SpellCatalog>,
}

impl Backend {
    /// Every service backed by one in-memory store.
    pub fn memory(store: Arc<MemoryStore>, catalog: impl SpellCatalog + 'static) -> Self {
        Self {
            heroes: store.clone(),
            directory: store.clone(),
            history: store,
            catalog: Arc::new(catalog),
        }
    }
}

/// Everything the loops and the session facade act on.
pub struct World {
    pub config: Config,
    pub zones: Arc<ZoneTracker>,
    pub combat: Arc<CombatEngine>,
    pub ai: EnemyAi,
    pub matchmaking: Arc<MatchmakingEngine>,
    pub regen: RegenSweep,
    pub heroes: Arc<dyn HeroStore>,
    pub events: Arc<dyn Broadcaster>,
}

impl World {
    pub fn new(config: Config, backend: Backend, events: Arc<dyn Broadcaster>) -> Self {
        let zones = Arc::new(ZoneTracker::new());
        let roster = Arc::new(EnemyRoster::new(config.combat.default_enemy.into()));
        let combat = Arc::new(CombatEngine::new(
            config.combat.clone(),
            Collaborators {
                heroes: Arc::clone(&backend.heroes),
                history: backend.history,
                catalog: backend.catalog,
                events: Arc::clone(&events),
            },
            Arc::clone(&zones),
            Arc::clone(&roster),
        ));
        let matchmaking = Arc::new(MatchmakingEngine::new(
            config.matchmaking.clone(),
            Arc::clone(&combat),
            backend.directory,
            Arc::clone(&backend.heroes),
            Arc::clone(&events),
        ));
        let presence: Arc<dyn CombatPresence> = combat.clone();
        let regen = RegenSweep::new(config.regen.clone(), Arc::clone(&backend.heroes), presence);

        Self {
            ai: EnemyAi::new(config.ai.clone(), roster),
            zones,
            combat,
            matchmaking,
            regen,
            heroes: backend.heroes,
            events,
            config,
        }
    }
}
