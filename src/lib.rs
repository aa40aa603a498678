//! Quest progression engine for a turn-based guild management game.
//!
//! Characters are dispatched on timed missions drawn from a catalog of
//! prerequisite-gated quests. The engine decides what is on offer, tracks
//! missions across turns, rolls their outcome and persists the session.

pub mod character;
pub mod config;
pub mod engine;
pub mod error;
pub mod ids;
pub mod quest;
pub mod save;
pub mod skills;

pub use character::{CharacterDefinition, CharacterRegistry, CharacterStatus, Role, Roster};
pub use config::EngineConfig;
pub use engine::{CharacterView, QuestEngine};
pub use error::{EngineError, RequirementError};
pub use quest::{
    DispatchReceipt, EngineHooks, MissionReport, NoopHooks, Outcome, QuestDefinition, QuestRegistry,
    TurnReport,
};
pub use save::{LoadReport, SaveDocument, SaveStore};
