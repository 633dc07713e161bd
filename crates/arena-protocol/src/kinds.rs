//! Enumerations describing what kind of fight is running and how it ended.

use serde::{Deserialize, Serialize};

/// Shape of a combat instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatKind {
    /// Free-for-all between players.
    Pvp,
    /// Players against enemies.
    Pve,
    /// Team against team.
    TeamPvp,
    /// A team of players against enemies.
    TeamPve,
}

impl CombatKind {
    /// Returns `true` for the enemy-facing kinds.
    pub fn is_pve(self) -> bool {
        matches!(self, Self::Pve | Self::TeamPve)
    }

    /// Returns `true` for the player-facing kinds.
    pub fn is_pvp(self) -> bool {
        matches!(self, Self::Pvp | Self::TeamPvp)
    }
}

/// Outcome of a finished combat instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatResult {
    Victory,
    Defeat,
    Draw,
    /// No participant stayed connected long enough for the fight to matter.
    Abandoned,
}

/// Archetype of a hostile NPC. Drives movement speed and default affinities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyKind {
    Melee,
    Caster,
    Tank,
}

impl EnemyKind {
    /// Magic affinities an enemy of this kind spawns with.
    pub fn default_affinities(self) -> Vec<String> {
        match self {
            Self::Caster => vec!["arcane".to_string()],
            Self::Melee | Self::Tank => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert!(CombatKind::Pve.is_pve());
        assert!(CombatKind::TeamPve.is_pve());
        assert!(CombatKind::Pvp.is_pvp());
        assert!(CombatKind::TeamPvp.is_pvp());
        assert!(!CombatKind::TeamPvp.is_pve());
    }

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&CombatKind::TeamPve).unwrap(),
            "\"team_pve\""
        );
        assert_eq!(
            serde_json::to_string(&CombatResult::Abandoned).unwrap(),
            "\"abandoned\""
        );
    }

    #[test]
    fn test_only_casters_have_affinities() {
        assert!(!EnemyKind::Caster.default_affinities().is_empty());
        assert!(EnemyKind::Tank.default_affinities().is_empty());
    }
}
