//! Matchmaking: queues, countdown matches, arena selection and the
//! three-phase handoff from queue into a combat instance.
//!
//! A match moves through [`MatchPhase`]s in one direction only. While it is
//! counting down it can be cancelled; once the handoff claims it, each phase
//! (transfer every player, announce the zone change, announce the start) is
//! awaited in full before the next begins.

pub mod arena;
pub mod engine;
pub mod error;
pub mod matches;
pub mod queue;

pub use arena::{assign_teams, ring_positions, scaled_enemy_count, select_arena};
pub use engine::MatchmakingEngine;
pub use error::{MatchError, QueueError};
pub use matches::{Match, MatchPhase};
pub use queue::{QueueBook, QueueEntry, QueueStatus, take_match};
