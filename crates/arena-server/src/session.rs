//! Player-facing entry points.
//!
//! The transport resolves a connection to a [`PlayerId`] and calls in here.
//! Every refused action is answered with a `rejected` event to the player
//! carrying the error's message; the error is also returned to the caller.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use arena_combat::{CastError, SpellCast};
use arena_matchmaking::{QueueError, QueueStatus};
use arena_protocol::{ActionSummary, PlayerId, ServerEvent, Vec3, ZoneId};

use crate::world::World;

pub struct Sessions {
    world: Arc<World>,
    /// Connected players and the zone they connected into.
    online: DashMap<PlayerId, ZoneId>,
}

impl Sessions {
    pub fn new(world: Arc<World>) -> Self {
        Self {
            world,
            online: DashMap::new(),
        }
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    /// Players with a live connection, used to prioritise regeneration.
    pub fn online_players(&self) -> HashSet<PlayerId> {
        self.online.iter().map(|e| *e.key()).collect()
    }

    pub fn is_online(&self, player: PlayerId) -> bool {
        self.online.contains_key(&player)
    }

    /// A player connected (or reconnected) into `zone`. A player whose
    /// combat instance is still running rejoins it in place.
    pub async fn connect(&self, player: PlayerId, zone: ZoneId, position: Vec3) {
        self.online.insert(player, zone);
        let zone = match self.world.combat.player_state(player) {
            Some(state) if self.world.combat.owner_of(player) == Some(state.instance) => {
                match self.world.combat.instance(state.instance).await {
                    Ok(instance) => instance.zone,
                    Err(_) => zone,
                }
            }
            _ => zone,
        };
        self.world.zones.add_player(zone, player, position);
        if let Err(e) = self.world.heroes.set_player_zone(player, zone).await {
            warn!("Could not record {zone} for {player}: {e}");
        }
        self.world.matchmaking.handle_reconnect(player).await;
        info!("{player} connected in {zone}");
    }

    /// Connection lost. Queue entries and countdown matches are dropped; a
    /// running fight starts its abandonment clock.
    pub async fn disconnect(&self, player: PlayerId) {
        if self.online.remove(&player).is_none() {
            debug!("{player} was not connected");
        }
        self.world.matchmaking.handle_disconnect(player).await;
        self.world
            .combat
            .mark_player_disconnected(player, Instant::now())
            .await;
        if let Some(zone) = self.world.zones.zone_of(player) {
            self.world.zones.remove_player(zone, player);
        }
        info!("{player} disconnected");
    }

    pub async fn cast(
        &self,
        player: PlayerId,
        cast: SpellCast,
    ) -> Result<ActionSummary, CastError> {
        self.world
            .combat
            .cast(player, &cast, Instant::now())
            .await
            .inspect_err(|e| self.reject(player, "cast", e))
    }

    /// Position report from the client.
    pub fn move_to(&self, player: PlayerId, position: Vec3) -> bool {
        self.world
            .combat
            .update_player_position(player, position, Instant::now())
    }

    pub async fn join_queue(
        &self,
        player: PlayerId,
        queue: &str,
    ) -> Result<QueueStatus, QueueError> {
        self.world
            .matchmaking
            .join_queue(player, queue)
            .await
            .inspect_err(|e| self.reject(player, "join-queue", e))
    }

    pub async fn leave_queue(&self, player: PlayerId) -> Result<String, QueueError> {
        self.world
            .matchmaking
            .leave_queue(player)
            .await
            .inspect_err(|e| self.reject(player, "leave-queue", e))
    }

    pub async fn queue_status(&self, player: PlayerId) -> Option<QueueStatus> {
        self.world.matchmaking.queue_status(player).await
    }

    fn reject(&self, player: PlayerId, action: &str, reason: &dyn std::fmt::Display) {
        debug!("{player} {action} refused: {reason}");
        self.world
            .events
            .to_player(player, ServerEvent::rejected(action, reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_config::Config;
    use arena_protocol::{ChannelBroadcaster, HeroId, Outbound, Recipient};
    use arena_store::{HeroSnapshot, MemoryStore, StaticCatalog};
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::world::Backend;

    const TOWN: ZoneId = ZoneId(1);

    async fn sessions() -> (Sessions, Arc<MemoryStore>, UnboundedReceiver<Outbound>) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_hero(HeroSnapshot {
                hero_id: HeroId(101),
                player_id: PlayerId(1),
                name: "Ash".to_string(),
                level: 1,
                experience: 0,
                health: 100,
                max_health: 100,
                power: 60,
                max_power: 60,
                attack: 10,
                defense: 4,
                resting: false,
            })
            .await;
        let (events, rx) = ChannelBroadcaster::channel();
        let world = World::new(
            Config::default(),
            Backend::memory(store.clone(), StaticCatalog::with_defaults()),
            Arc::new(events),
        );
        (Sessions::new(Arc::new(world)), store, rx)
    }

    #[tokio::test]
    async fn test_connect_tracks_presence() {
        let (sessions, store, _rx) = sessions().await;
        sessions.connect(PlayerId(1), TOWN, Vec3::ZERO).await;

        assert!(sessions.is_online(PlayerId(1)));
        assert_eq!(sessions.world().zones.zone_of(PlayerId(1)), Some(TOWN));
        assert_eq!(store.player_zone(PlayerId(1)).await, Some(TOWN));

        sessions.disconnect(PlayerId(1)).await;
        assert!(!sessions.is_online(PlayerId(1)));
        assert_eq!(sessions.world().zones.zone_of(PlayerId(1)), None);
    }

    #[tokio::test]
    async fn test_cast_outside_combat_is_rejected() {
        let (sessions, _store, mut rx) = sessions().await;
        sessions.connect(PlayerId(1), TOWN, Vec3::ZERO).await;

        let err = sessions
            .cast(PlayerId(1), SpellCast::new("fireball", Vec3::ZERO))
            .await
            .unwrap_err();
        assert_eq!(err, CastError::NotInCombat);

        let out = rx.try_recv().unwrap();
        assert_eq!(out.to, Recipient::Player(PlayerId(1)));
        assert!(matches!(out.event, ServerEvent::Rejected { ref action, .. } if action == "cast"));
    }

    #[tokio::test]
    async fn test_unknown_queue_is_rejected() {
        let (sessions, _store, mut rx) = sessions().await;
        sessions.connect(PlayerId(1), TOWN, Vec3::ZERO).await;

        let err = sessions.join_queue(PlayerId(1), "ladder").await.unwrap_err();
        assert!(matches!(err, QueueError::UnknownQueue(_)));
        let out = rx.try_recv().unwrap();
        match out.event {
            ServerEvent::Rejected { action, reason } => {
                assert_eq!(action, "join-queue");
                assert_eq!(reason, err.to_string());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_leave_without_queue() {
        let (sessions, _store, _rx) = sessions().await;
        sessions.connect(PlayerId(1), TOWN, Vec3::ZERO).await;
        assert!(matches!(
            sessions.leave_queue(PlayerId(1)).await,
            Err(QueueError::NotQueued)
        ));
        assert!(sessions.queue_status(PlayerId(1)).await.is_none());
    }
}
