//! Persistence error type.

use arena_protocol::{HeroId, PlayerId};

/// Errors surfaced by persistence collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The player has no active hero.
    #[error("no active hero for {0}")]
    NoActiveHero(PlayerId),

    /// The hero record does not exist.
    #[error("unknown {0}")]
    UnknownHero(HeroId),

    /// The backend refused or failed the operation.
    #[error("storage backend failure: {0}")]
    Backend(String),
}
