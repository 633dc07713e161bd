//! Starter content for running the server without a database.

use arena_protocol::{EnemyKind, HeroId, PlayerId, Vec3, ZoneId};
use arena_store::{HeroSnapshot, MemoryStore, ZoneInfo};

use crate::world::World;

pub const TOWN: ZoneId = ZoneId(1);
pub const WILDS: ZoneId = ZoneId(2);

fn zone(id: u64, name: &str, combat_capable: bool, pvp: bool, spawn: Vec3) -> ZoneInfo {
    ZoneInfo {
        id: ZoneId(id),
        name: name.to_string(),
        capacity: 32,
        min_level: 1,
        spawn,
        active: true,
        combat_capable,
        pvp,
    }
}

/// Two open zones, three arenas and a handful of heroes.
pub async fn seed_store(store: &MemoryStore) {
    store.insert_zone(zone(1, "Town", false, false, Vec3::ZERO)).await;
    store.insert_zone(zone(2, "Wilds", false, false, Vec3::new(40.0, 0.0, 0.0))).await;
    store.insert_zone(zone(10, "Colosseum", true, true, Vec3::ZERO)).await;
    store.insert_zone(zone(11, "Pit", true, true, Vec3::new(0.0, 0.0, 20.0))).await;
    store.insert_zone(zone(12, "Crypt", true, false, Vec3::new(-20.0, 0.0, 0.0))).await;

    let names = ["Ash", "Bryn", "Cato", "Dara"];
    for (i, name) in names.iter().enumerate() {
        let player = i as u64 + 1;
        store
            .insert_hero(HeroSnapshot {
                hero_id: HeroId(player + 100),
                player_id: PlayerId(player),
                name: (*name).to_string(),
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
    }
}

/// A few wandering enemies in the open wilds.
pub fn spawn_wildlife(world: &World) {
    let kinds = [EnemyKind::Melee, EnemyKind::Caster, EnemyKind::Tank];
    for (i, kind) in kinds.into_iter().enumerate() {
        let offset = i as f32 * 6.0;
        world
            .combat
            .spawn_enemy(WILDS, kind, Vec3::new(40.0 + offset, 0.0, offset), None);
    }
}
