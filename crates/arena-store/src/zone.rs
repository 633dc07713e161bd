//! Zone metadata.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use arena_protocol::{Vec3, ZoneId};

use crate::error::StoreError;

/// Static description of a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneInfo {
    pub id: ZoneId,
    pub name: String,
    /// Maximum players present at once.
    pub capacity: usize,
    pub min_level: u32,
    pub spawn: Vec3,
    pub active: bool,
    /// Eligible to host matchmaking battles.
    pub combat_capable: bool,
    /// Eligible to host player-versus-player battles.
    pub pvp: bool,
}

/// Read access to zone metadata.
#[async_trait]
pub trait ZoneDirectory: Send + Sync {
    async fn zones(&self) -> Result<Vec<ZoneInfo>, StoreError>;

    async fn zone(&self, id: ZoneId) -> Result<Option<ZoneInfo>, StoreError>;
}
