//! The arena server: engine wiring, the scheduled loops and the
//! player-facing session facade.

pub mod demo;
pub mod orchestrator;
pub mod session;
pub mod world;

pub use orchestrator::{Orchestrator, ai_tick, combat_tick, maintenance};
pub use session::Sessions;
pub use world::{Backend, World};
