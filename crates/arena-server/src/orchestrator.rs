//! The scheduled loops that drive the world forward.
//!
//! Four independent tasks: the combat tick, the enemy AI frame, the
//! regeneration sweep and housekeeping. Each runs on its own interval and
//! stops when the shutdown channel flips. A failure inside one step is
//! logged and the loop carries on.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use arena_combat::{AiTarget, CombatEngine, EnemyAction, EnemyUpdate, TickOutcome};
use arena_protocol::{EnemyActionKind, EnemyView, Recipient, ServerEvent, ZoneId};

use crate::session::Sessions;
use crate::world::World;

/// Handle to the running loops.
pub struct Orchestrator {
    shutdown: watch::Sender<bool>,
    tasks: JoinSet<()>,
}

impl Orchestrator {
    /// Spawn every loop on the current runtime.
    pub fn start(sessions: Arc<Sessions>) -> Self {
        let (shutdown, _) = watch::channel(false);
        let world = Arc::clone(sessions.world());
        let mut tasks = JoinSet::new();

        let combat = Arc::clone(&world.combat);
        tasks.spawn(run_every(
            "combat",
            world.config.server.combat_tick(),
            shutdown.subscribe(),
            move |now| {
                let combat = Arc::clone(&combat);
                async move {
                    combat_tick(&combat, now).await;
                }
            },
        ));

        let ai_world = Arc::clone(&world);
        let mut last = Instant::now();
        tasks.spawn(run_every(
            "ai",
            world.config.ai.tick_interval(),
            shutdown.subscribe(),
            move |now| {
                let dt = now.saturating_duration_since(last).as_secs_f32();
                last = now;
                let world = Arc::clone(&ai_world);
                async move {
                    ai_tick(&world, now, dt).await;
                }
            },
        ));

        let regen_sessions = Arc::clone(&sessions);
        tasks.spawn(run_every(
            "regen",
            world.config.regen.interval(),
            shutdown.subscribe(),
            move |_| {
                let sessions = Arc::clone(&regen_sessions);
                async move {
                    let online = sessions.online_players();
                    if let Err(e) = sessions.world().regen.sweep(Some(&online)).await {
                        warn!("Regen sweep failed: {e}");
                    }
                }
            },
        ));

        let upkeep_world = Arc::clone(&world);
        tasks.spawn(run_every(
            "maintenance",
            world.config.server.maintenance_interval(),
            shutdown.subscribe(),
            move |now| {
                let world = Arc::clone(&upkeep_world);
                async move {
                    maintenance(&world, now).await;
                }
            },
        ));

        info!("Orchestrator started");
        Self { shutdown, tasks }
    }

    /// Signal every loop and wait for them to stop.
    pub async fn shutdown(mut self) {
        self.shutdown.send_replace(true);
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                warn!("Loop task ended abnormally: {e}");
            }
        }
        info!("Orchestrator stopped");
    }
}

async fn run_every<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut step: F,
) where
    F: FnMut(Instant) -> Fut + Send,
    Fut: Future<Output = ()> + Send,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!("{name} loop every {period:?}");
    loop {
        tokio::select! {
            _ = interval.tick() => step(Instant::now()).await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("{name} loop stopped");
}

/// Tick every instance concurrently. Returns how many ended this tick.
pub async fn combat_tick(combat: &Arc<CombatEngine>, now: Instant) -> usize {
    let mut set = JoinSet::new();
    for id in combat.instance_ids() {
        let combat = Arc::clone(combat);
        set.spawn(async move { (id, combat.tick_instance(id, now).await) });
    }

    let mut ended = 0;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((_, Ok(TickOutcome::Finished(..) | TickOutcome::Abandoned(_)))) => ended += 1,
            Ok((_, Ok(_))) => {}
            Ok((id, Err(e))) => warn!("Tick of {id} failed: {e}"),
            Err(e) => warn!("Combat tick task failed: {e}"),
        }
    }
    ended
}

/// One AI frame: step the enemies, apply their hits and fan the results out
/// per zone. Returns how many hits landed.
pub async fn ai_tick(world: &World, now: Instant, dt: f32) -> usize {
    let targets = world.combat.ai_targets();
    let updates = world.ai.tick(&targets, now, dt);

    let mut landed = 0;
    let mut views: BTreeMap<ZoneId, Vec<EnemyView>> = BTreeMap::new();
    for update in updates {
        if let Some(action) = update.action
            && apply_action(world, &update, action, &targets, now).await
        {
            landed += 1;
        }
        if update.died {
            world.events.send(
                Recipient::Zone(update.zone),
                ServerEvent::EnemyDestroyed {
                    enemy: update.enemy,
                    zone: update.zone,
                },
            );
        }
        views.entry(update.zone).or_default().push(update.view);
    }
    for (zone, enemies) in views {
        world
            .events
            .send(Recipient::Zone(zone), ServerEvent::EnemyState { zone, enemies });
    }
    landed
}

async fn apply_action(
    world: &World,
    update: &EnemyUpdate,
    action: EnemyAction,
    targets: &[AiTarget],
    now: Instant,
) -> bool {
    let label = match action.kind {
        EnemyActionKind::Attack => "attack",
        EnemyActionKind::Cast => "cast",
    };
    let target_health = match world
        .combat
        .apply_enemy_attack(update.enemy, action.target, label, action.damage, now)
        .await
    {
        Ok(health) => health,
        Err(e) => {
            debug!("{} {label} on {} dropped: {e}", update.enemy, action.target);
            return false;
        }
    };

    let to = targets
        .iter()
        .find(|t| t.player == action.target)
        .and_then(|t| t.instance)
        .map_or(Recipient::Zone(update.zone), Recipient::Instance);
    world.events.send(
        to,
        ServerEvent::EnemyAttack {
            enemy: update.enemy,
            target: action.target,
            action: action.kind,
            damage: action.damage,
            target_health,
        },
    );
    trace!("{} hit {} for {}", update.enemy, action.target, action.damage);
    true
}

/// Zone eviction, reaping of ended instances and finished matches.
pub async fn maintenance(world: &World, now: Instant) {
    let evicted = world.zones.evict_idle(now, world.config.server.zone_idle());
    let reaped = world.combat.reap_ended(now).await;
    let pruned = world.matchmaking.prune_finished();
    if !evicted.is_empty() || !reaped.is_empty() || pruned > 0 {
        debug!(
            "Maintenance: {} zones evicted, {} instances reaped, {pruned} matches pruned",
            evicted.len(),
            reaped.len()
        );
    }
}
