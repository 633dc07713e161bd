//! Zone population tracking: which players are present in which zone, and
//! which combat instances each zone hosts.
//!
//! Pure bookkeeping over a sharded map. Each zone record is only touched
//! while its shard entry is held, and no method blocks. Empty zones linger
//! for an idle period before [`ZoneTracker::evict_idle`] drops them so a
//! brief reconnect gap does not lose the record.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

use arena_protocol::{InstanceId, PlayerId, Vec3, ZoneId};

/// A player's presence in a zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Presence {
    pub player: PlayerId,
    pub position: Vec3,
    pub joined_at: Instant,
}

/// Load figures used for arena selection and capacity checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoneLoad {
    pub player_count: usize,
    pub combat_count: usize,
}

/// Roster of one zone.
#[derive(Debug, Clone)]
struct ZoneState {
    players: HashMap<PlayerId, Presence>,
    combats: HashSet<InstanceId>,
    /// When the zone last became empty.
    empty_since: Option<Instant>,
}

impl ZoneState {
    fn new() -> Self {
        Self {
            players: HashMap::new(),
            combats: HashSet::new(),
            empty_since: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.players.is_empty() && self.combats.is_empty()
    }

    fn refresh_idle(&mut self, now: Instant) {
        if self.is_empty() {
            self.empty_since.get_or_insert(now);
        } else {
            self.empty_since = None;
        }
    }
}

/// Per-zone rosters, created lazily on first use.
#[derive(Default)]
pub struct ZoneTracker {
    zones: DashMap<ZoneId, ZoneState>,
    /// Player → zone they are present in.
    locations: DashMap<PlayerId, ZoneId>,
}

impl ZoneTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a player as present in `zone`, removing them from any other
    /// zone first.
    pub fn add_player(&self, zone: ZoneId, player: PlayerId, position: Vec3) {
        let now = Instant::now();
        if let Some(previous) = self.locations.insert(player, zone)
            && previous != zone
        {
            self.detach(previous, player, now);
        }
        let mut state = self.zones.entry(zone).or_insert_with(ZoneState::new);
        state.players.insert(
            player,
            Presence {
                player,
                position,
                joined_at: now,
            },
        );
        state.refresh_idle(now);
        tracing::debug!("{player} entered {zone}");
    }

    /// Remove a player from `zone`. Returns `false` if they were not there.
    pub fn remove_player(&self, zone: ZoneId, player: PlayerId) -> bool {
        let removed = self.detach(zone, player, Instant::now());
        if removed {
            self.locations.remove_if(&player, |_, z| *z == zone);
        }
        removed
    }

    /// Move a player between zones, keeping the location index consistent.
    pub fn transfer_player(&self, from: ZoneId, to: ZoneId, player: PlayerId, position: Vec3) {
        self.detach(from, player, Instant::now());
        self.add_player(to, player, position);
    }

    /// Update a present player's position. Returns `false` if the player is
    /// not tracked in any zone.
    pub fn update_position(&self, player: PlayerId, position: Vec3) -> bool {
        let Some(zone) = self.zone_of(player) else {
            return false;
        };
        match self.zones.get_mut(&zone) {
            Some(mut state) => match state.players.get_mut(&player) {
                Some(presence) => {
                    presence.position = position;
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    /// Zone the player is currently present in.
    pub fn zone_of(&self, player: PlayerId) -> Option<ZoneId> {
        self.locations.get(&player).map(|z| *z)
    }

    /// Presence records of every player in `zone`, ordered by player id.
    pub fn players(&self, zone: ZoneId) -> Vec<Presence> {
        let mut players: Vec<Presence> = self
            .zones
            .get(&zone)
            .map(|state| state.players.values().copied().collect())
            .unwrap_or_default();
        players.sort_by_key(|p| p.player);
        players
    }

    /// Register a combat instance as hosted by `zone`.
    pub fn register_combat(&self, zone: ZoneId, instance: InstanceId) {
        let mut state = self.zones.entry(zone).or_insert_with(ZoneState::new);
        state.combats.insert(instance);
        state.refresh_idle(Instant::now());
    }

    /// Remove a combat instance from `zone`. Returns `false` if it was not
    /// registered there.
    pub fn unregister_combat(&self, zone: ZoneId, instance: InstanceId) -> bool {
        match self.zones.get_mut(&zone) {
            Some(mut state) => {
                let removed = state.combats.remove(&instance);
                state.refresh_idle(Instant::now());
                removed
            }
            None => false,
        }
    }

    /// Combat instances hosted by `zone`, ordered by id.
    pub fn combats(&self, zone: ZoneId) -> Vec<InstanceId> {
        let mut combats: Vec<InstanceId> = self
            .zones
            .get(&zone)
            .map(|state| state.combats.iter().copied().collect())
            .unwrap_or_default();
        combats.sort();
        combats
    }

    /// Current player and combat counts. Unknown zones report zero load.
    pub fn load(&self, zone: ZoneId) -> ZoneLoad {
        self.zones
            .get(&zone)
            .map(|state| ZoneLoad {
                player_count: state.players.len(),
                combat_count: state.combats.len(),
            })
            .unwrap_or_default()
    }

    /// Whether a record for `zone` is currently held in memory.
    pub fn is_tracked(&self, zone: ZoneId) -> bool {
        self.zones.contains_key(&zone)
    }

    /// Drop zones that have been empty for at least `idle`. Returns the
    /// evicted zone ids.
    pub fn evict_idle(&self, now: Instant, idle: Duration) -> Vec<ZoneId> {
        let mut evicted = Vec::new();
        self.zones.retain(|zone, state| {
            let expired = state.is_empty()
                && state
                    .empty_since
                    .is_some_and(|since| now.saturating_duration_since(since) >= idle);
            if expired {
                evicted.push(*zone);
            }
            !expired
        });
        if !evicted.is_empty() {
            tracing::debug!("Evicted idle zones {evicted:?}");
        }
        evicted
    }

    fn detach(&self, zone: ZoneId, player: PlayerId, now: Instant) -> bool {
        match self.zones.entry(zone) {
            Entry::Occupied(mut entry) => {
                let state = entry.get_mut();
                let removed = state.players.remove(&player).is_some();
                state.refresh_idle(now);
                removed
            }
            Entry::Vacant(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: ZoneId = ZoneId(1);
    const B: ZoneId = ZoneId(2);

    #[tokio::test]
    async fn test_presence_add_remove() {
        let tracker = ZoneTracker::new();
        tracker.add_player(A, PlayerId(1), Vec3::ZERO);
        tracker.add_player(A, PlayerId(2), Vec3::ONE);
        assert_eq!(tracker.load(A).player_count, 2);
        assert_eq!(tracker.zone_of(PlayerId(1)), Some(A));

        assert!(tracker.remove_player(A, PlayerId(1)));
        assert!(!tracker.remove_player(A, PlayerId(1)));
        assert_eq!(tracker.zone_of(PlayerId(1)), None);
        assert_eq!(tracker.load(A).player_count, 1);
    }

    #[tokio::test]
    async fn test_adding_to_new_zone_leaves_old_one() {
        let tracker = ZoneTracker::new();
        tracker.add_player(A, PlayerId(1), Vec3::ZERO);
        tracker.add_player(B, PlayerId(1), Vec3::ZERO);
        assert_eq!(tracker.load(A).player_count, 0);
        assert_eq!(tracker.load(B).player_count, 1);
        assert_eq!(tracker.zone_of(PlayerId(1)), Some(B));
    }

    #[tokio::test]
    async fn test_transfer_player() {
        let tracker = ZoneTracker::new();
        tracker.add_player(A, PlayerId(7), Vec3::ZERO);
        tracker.transfer_player(A, B, PlayerId(7), Vec3::new(5.0, 0.0, 5.0));
        assert!(tracker.players(A).is_empty());
        let present = tracker.players(B);
        assert_eq!(present.len(), 1);
        assert_eq!(present[0].position, Vec3::new(5.0, 0.0, 5.0));
    }

    #[tokio::test]
    async fn test_combat_registration_counts() {
        let tracker = ZoneTracker::new();
        tracker.register_combat(A, InstanceId(1));
        tracker.register_combat(A, InstanceId(2));
        assert_eq!(tracker.load(A).combat_count, 2);
        assert_eq!(tracker.combats(A), vec![InstanceId(1), InstanceId(2)]);
        assert!(tracker.unregister_combat(A, InstanceId(1)));
        assert!(!tracker.unregister_combat(B, InstanceId(1)));
        assert_eq!(tracker.load(A).combat_count, 1);
    }

    #[tokio::test]
    async fn test_unknown_zone_reports_zero_load() {
        let tracker = ZoneTracker::new();
        assert_eq!(tracker.load(ZoneId(99)), ZoneLoad::default());
        assert!(!tracker.update_position(PlayerId(1), Vec3::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_zone_evicted_after_idle_period() {
        let tracker = ZoneTracker::new();
        tracker.add_player(A, PlayerId(1), Vec3::ZERO);
        tracker.remove_player(A, PlayerId(1));

        let idle = Duration::from_secs(60);
        assert!(tracker.evict_idle(Instant::now(), idle).is_empty());
        assert!(tracker.is_tracked(A));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(tracker.evict_idle(Instant::now(), idle), vec![A]);
        assert!(!tracker.is_tracked(A));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejoin_cancels_eviction() {
        let tracker = ZoneTracker::new();
        tracker.add_player(A, PlayerId(1), Vec3::ZERO);
        tracker.remove_player(A, PlayerId(1));
        tokio::time::advance(Duration::from_secs(30)).await;
        tracker.add_player(A, PlayerId(1), Vec3::ZERO);
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(
            tracker
                .evict_idle(Instant::now(), Duration::from_secs(60))
                .is_empty()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_zone_with_combat_not_evicted() {
        let tracker = ZoneTracker::new();
        tracker.register_combat(A, InstanceId(3));
        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(
            tracker
                .evict_idle(Instant::now(), Duration::from_secs(60))
                .is_empty()
        );
    }
}
