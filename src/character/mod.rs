//! Character Module
//!
//! Immutable character catalog loaded from TOML, and the per-session roster
//! holding each character's XP, status and unlock state.

pub mod definition;
pub mod registry;
pub mod roster;

pub use definition::{CharacterDefinition, Role};
pub use registry::CharacterRegistry;
pub use roster::{CharacterRecord, CharacterStatus, Roster, RosterChange};
