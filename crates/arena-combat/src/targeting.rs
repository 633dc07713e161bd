//! Who a spell lands on. Pure functions over a positional snapshot of the
//! instance, so ordering is deterministic and testable without an engine.

use std::cmp::Ordering;

use arena_protocol::{CombatKind, CombatantId, PlayerId, Vec3, ground_distance};

/// Where a combatant stands and whether it can still be hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub id: CombatantId,
    pub position: Vec3,
    pub alive: bool,
}

/// Eligibility rules for one cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetPolicy {
    pub kind: CombatKind,
    pub caster: PlayerId,
    pub heal: bool,
}

impl TargetPolicy {
    /// Living enemies are always eligible. The caster is only hit by heals,
    /// and other players only take damage outside enemy-facing fights.
    pub fn eligible(&self, candidate: &Candidate) -> bool {
        if !candidate.alive {
            return false;
        }
        match candidate.id {
            CombatantId::Enemy(_) => true,
            CombatantId::Player(p) if p == self.caster => self.heal,
            CombatantId::Player(_) => self.heal || !self.kind.is_pve(),
        }
    }
}

/// Eligible candidates within `radius` of `point`, nearest first, ties by id.
pub fn area_targets(
    policy: &TargetPolicy,
    candidates: &[Candidate],
    point: Vec3,
    radius: f32,
) -> Vec<CombatantId> {
    let mut hits: Vec<(f32, CombatantId)> = candidates
        .iter()
        .filter(|c| policy.eligible(c))
        .map(|c| (ground_distance(c.position, point), c.id))
        .filter(|(d, _)| *d <= radius)
        .collect();
    hits.sort_by(by_distance_then_id);
    hits.into_iter().map(|(_, id)| id).collect()
}

/// Extra enemies a chain effect bounces to. Starts at the first enemy in
/// `primary` and repeatedly jumps to the nearest living enemy within
/// `range` that has not been hit yet.
pub fn chain_targets(
    primary: &[CombatantId],
    candidates: &[Candidate],
    bounces: u32,
    range: f32,
) -> Vec<CombatantId> {
    let Some(mut from) = primary
        .iter()
        .find(|id| matches!(id, CombatantId::Enemy(_)))
        .and_then(|id| candidates.iter().find(|c| c.id == *id))
        .map(|c| c.position)
    else {
        return Vec::new();
    };

    let mut hit: Vec<CombatantId> = primary.to_vec();
    let mut extra = Vec::new();
    for _ in 0..bounces {
        let next = candidates
            .iter()
            .filter(|c| c.alive && matches!(c.id, CombatantId::Enemy(_)) && !hit.contains(&c.id))
            .map(|c| (ground_distance(c.position, from), c.id, c.position))
            .filter(|(d, _, _)| *d <= range)
            .min_by(|a, b| by_distance_then_id(&(a.0, a.1), &(b.0, b.1)));
        let Some((_, id, position)) = next else { break };
        hit.push(id);
        extra.push(id);
        from = position;
    }
    extra
}

fn by_distance_then_id(a: &(f32, CombatantId), b: &(f32, CombatantId)) -> Ordering {
    a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_protocol::EnemyId;

    fn player(id: u64, x: f32) -> Candidate {
        Candidate {
            id: CombatantId::Player(PlayerId(id)),
            position: Vec3::new(x, 0.0, 0.0),
            alive: true,
        }
    }

    fn enemy(id: u64, x: f32) -> Candidate {
        Candidate {
            id: CombatantId::Enemy(EnemyId(id)),
            position: Vec3::new(x, 0.0, 0.0),
            alive: true,
        }
    }

    fn policy(kind: CombatKind, heal: bool) -> TargetPolicy {
        TargetPolicy {
            kind,
            caster: PlayerId(1),
            heal,
        }
    }

    #[test]
    fn test_damage_skips_caster_and_dead() {
        let mut dead = player(3, 0.5);
        dead.alive = false;
        let all = [player(1, 0.0), player(2, 1.0), dead];
        let hits = area_targets(&policy(CombatKind::Pvp, false), &all, Vec3::ZERO, 3.0);
        assert_eq!(hits, vec![CombatantId::Player(PlayerId(2))]);
    }

    #[test]
    fn test_pve_damage_spares_players() {
        let all = [player(1, 0.0), player(2, 0.5), enemy(10, 1.0)];
        let hits = area_targets(&policy(CombatKind::TeamPve, false), &all, Vec3::ZERO, 3.0);
        assert_eq!(hits, vec![CombatantId::Enemy(EnemyId(10))]);
    }

    #[test]
    fn test_heal_targets_players_including_caster() {
        let all = [player(1, 0.0), player(2, 1.0)];
        let hits = area_targets(&policy(CombatKind::Pve, true), &all, Vec3::ZERO, 1.5);
        assert_eq!(
            hits,
            vec![CombatantId::Player(PlayerId(1)), CombatantId::Player(PlayerId(2))]
        );
    }

    #[test]
    fn test_heal_can_target_enemies() {
        let all = [player(1, 0.0), player(2, 1.0), enemy(10, 0.2)];
        let hits = area_targets(&policy(CombatKind::Pve, true), &all, Vec3::ZERO, 1.5);
        assert_eq!(
            hits,
            vec![
                CombatantId::Player(PlayerId(1)),
                CombatantId::Enemy(EnemyId(10)),
                CombatantId::Player(PlayerId(2)),
            ]
        );

        let mut dead = enemy(11, 0.0);
        dead.alive = false;
        assert!(area_targets(&policy(CombatKind::Pvp, true), &[dead], Vec3::ZERO, 1.0).is_empty());
    }

    #[test]
    fn test_nearest_first_with_id_tiebreak() {
        let all = [enemy(12, 2.0), enemy(11, -2.0), enemy(10, 1.0)];
        let hits = area_targets(&policy(CombatKind::Pve, false), &all, Vec3::ZERO, 3.0);
        assert_eq!(
            hits,
            vec![
                CombatantId::Enemy(EnemyId(10)),
                CombatantId::Enemy(EnemyId(11)),
                CombatantId::Enemy(EnemyId(12)),
            ]
        );
    }

    #[test]
    fn test_radius_is_inclusive() {
        let all = [enemy(10, 3.0)];
        assert_eq!(area_targets(&policy(CombatKind::Pve, false), &all, Vec3::ZERO, 3.0).len(), 1);
    }

    #[test]
    fn test_chain_bounces_to_nearest_unhit() {
        let all = [enemy(10, 0.0), enemy(11, 4.0), enemy(12, 9.0), enemy(13, 30.0)];
        let primary = [CombatantId::Enemy(EnemyId(10))];
        let extra = chain_targets(&primary, &all, 3, 6.0);
        assert_eq!(
            extra,
            vec![CombatantId::Enemy(EnemyId(11)), CombatantId::Enemy(EnemyId(12))]
        );
    }

    #[test]
    fn test_chain_needs_an_enemy_hit() {
        let all = [player(2, 0.0), enemy(10, 1.0)];
        let primary = [CombatantId::Player(PlayerId(2))];
        assert!(chain_targets(&primary, &all, 2, 6.0).is_empty());
    }
}
