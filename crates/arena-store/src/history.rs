//! Completed-match summaries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use arena_protocol::{CombatKind, CombatResult, CombatantId, InstanceId, PlayerId, ZoneId};

use crate::error::StoreError;

/// Per-player line of a match record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub player: PlayerId,
    pub damage_dealt: u32,
    pub healing_done: u32,
    pub kills: u32,
    pub deaths: u32,
}

/// Summary of a finished combat instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub instance: InstanceId,
    pub kind: CombatKind,
    pub zone: ZoneId,
    pub result: CombatResult,
    pub duration_secs: u64,
    pub participants: Vec<ParticipantRecord>,
    pub winners: Vec<CombatantId>,
    pub losers: Vec<CombatantId>,
}

/// Append-only match history.
#[async_trait]
pub trait MatchHistory: Send + Sync {
    async fn record_match(&self, record: MatchRecord) -> Result<(), StoreError>;
}
