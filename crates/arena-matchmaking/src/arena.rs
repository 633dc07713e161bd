//! Arena selection and spawn layout.

use std::f32::consts::TAU;

use arena_config::QueueConfig;
use arena_protocol::{CombatKind, PlayerId, Vec3};
use arena_store::ZoneInfo;
use arena_zone::ZoneLoad;

/// Pick the arena for a match: an active, combat-capable zone (PvP-flagged
/// unless the queue is PvE) with room for everyone, hosting the fewest
/// combats. Ties go to the zone with fewer players present, then the lower id.
pub fn select_arena<'a>(
    zones: &'a [ZoneInfo],
    load: impl Fn(&ZoneInfo) -> ZoneLoad,
    queue: &QueueConfig,
    players: usize,
) -> Option<&'a ZoneInfo> {
    zones
        .iter()
        .filter(|z| z.active && z.combat_capable && (queue.kind.is_pve() || z.pvp))
        .map(|z| (z, load(z)))
        .filter(|(z, l)| l.player_count + players <= z.capacity)
        .min_by_key(|(z, l)| (l.combat_count, l.player_count, z.id))
        .map(|(z, _)| z)
}

/// Spawn points on a ring around `center`, evenly spaced by angle, each one
/// a little further out than the last.
pub fn ring_positions(center: Vec3, count: usize, radius: f32, step: f32) -> Vec<Vec3> {
    (0..count)
        .map(|i| {
            let angle = TAU * i as f32 / count as f32;
            let r = radius + step * i as f32;
            center + Vec3::new(angle.cos() * r, 0.0, angle.sin() * r)
        })
        .collect()
}

/// Enemy count scaled to how full the match is, never below one.
pub fn scaled_enemy_count(count: u32, matched: usize, max_players: usize) -> u32 {
    if count == 0 {
        return 0;
    }
    let max = max_players.max(1) as u64;
    let scaled = (u64::from(count) * matched as u64).div_ceil(max);
    u32::try_from(scaled).unwrap_or(count).clamp(1, count)
}

/// Team partition for team kinds, in match order.
pub fn assign_teams(
    kind: CombatKind,
    players: &[PlayerId],
    team_size: usize,
) -> Option<Vec<Vec<PlayerId>>> {
    matches!(kind, CombatKind::TeamPvp | CombatKind::TeamPve)
        .then(|| players.chunks(team_size.max(1)).map(<[PlayerId]>::to_vec).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_protocol::ZoneId;

    fn zone(id: u64, pvp: bool) -> ZoneInfo {
        ZoneInfo {
            id: ZoneId(id),
            name: format!("arena-{id}"),
            capacity: 20,
            min_level: 1,
            spawn: Vec3::ZERO,
            active: true,
            combat_capable: true,
            pvp,
        }
    }

    fn duel() -> QueueConfig {
        QueueConfig {
            name: "duel".into(),
            kind: CombatKind::Pvp,
            min_players: 2,
            max_players: 2,
            countdown_secs: 5,
            team_size: 1,
            enemies: Vec::new(),
        }
    }

    #[test]
    fn test_fewest_combats_wins() {
        let zones = [zone(1, true), zone(2, true), zone(3, true)];
        let combats = [3, 1, 2];
        let pick = select_arena(
            &zones,
            |z| ZoneLoad {
                combat_count: combats[(z.id.0 - 1) as usize],
                player_count: 0,
            },
            &duel(),
            2,
        );
        assert_eq!(pick.map(|z| z.id), Some(ZoneId(2)));
    }

    #[test]
    fn test_tie_broken_by_players() {
        let zones = [zone(1, true), zone(2, true)];
        let pick = select_arena(
            &zones,
            |z| ZoneLoad {
                combat_count: 1,
                player_count: if z.id == ZoneId(1) { 5 } else { 2 },
            },
            &duel(),
            2,
        );
        assert_eq!(pick.map(|z| z.id), Some(ZoneId(2)));
    }

    #[test]
    fn test_pvp_queue_needs_pvp_zone() {
        let zones = [zone(1, false)];
        assert!(select_arena(&zones, |_| ZoneLoad::default(), &duel(), 2).is_none());

        let dungeon = QueueConfig {
            kind: CombatKind::Pve,
            ..duel()
        };
        assert!(select_arena(&zones, |_| ZoneLoad::default(), &dungeon, 2).is_some());
    }

    #[test]
    fn test_inactive_and_full_zones_skipped() {
        let mut inactive = zone(1, true);
        inactive.active = false;
        let mut full = zone(2, true);
        full.capacity = 3;
        let zones = [inactive, full];
        let load = |_: &ZoneInfo| ZoneLoad {
            player_count: 2,
            combat_count: 0,
        };
        assert!(select_arena(&zones, load, &duel(), 2).is_none());
    }

    #[test]
    fn test_ring_positions() {
        let ring = ring_positions(Vec3::ZERO, 4, 6.0, 1.5);
        assert_eq!(ring.len(), 4);
        assert!((ring[0] - Vec3::new(6.0, 0.0, 0.0)).length() < 1e-5);
        assert!((ring[1] - Vec3::new(0.0, 0.0, 7.5)).length() < 1e-4);
        assert!(ring.iter().all(|p| p.y == 0.0));
    }

    #[test]
    fn test_enemy_scaling() {
        assert_eq!(scaled_enemy_count(4, 4, 4), 4);
        assert_eq!(scaled_enemy_count(4, 1, 4), 1);
        assert_eq!(scaled_enemy_count(6, 3, 6), 3);
        assert_eq!(scaled_enemy_count(3, 1, 6), 1);
        assert_eq!(scaled_enemy_count(2, 3, 4), 2);
        assert_eq!(scaled_enemy_count(0, 3, 4), 0);
    }

    #[test]
    fn test_teams_only_for_team_kinds() {
        let players = [PlayerId(1), PlayerId(2), PlayerId(3), PlayerId(4)];
        assert!(assign_teams(CombatKind::Pvp, &players, 1).is_none());
        let teams = assign_teams(CombatKind::TeamPvp, &players, 2).unwrap();
        assert_eq!(teams, vec![vec![PlayerId(1), PlayerId(2)], vec![PlayerId(3), PlayerId(4)]]);
    }
}
