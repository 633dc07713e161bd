//! Read/write contracts the core needs from its external collaborators:
//! hero persistence, zone metadata, match history and the spell catalog.
//!
//! [`MemoryStore`] implements every persistence trait in memory and backs
//! the standalone server binary and the test suites. A relational backend
//! would implement the same traits.

pub mod catalog;
pub mod error;
pub mod hero;
pub mod history;
pub mod memory;
pub mod zone;

pub use catalog::{SpellCatalog, SpellDef, StaticCatalog};
pub use error::StoreError;
pub use hero::{HeroSnapshot, HeroStore};
pub use history::{MatchHistory, MatchRecord, ParticipantRecord};
pub use memory::MemoryStore;
pub use zone::{ZoneDirectory, ZoneInfo};
