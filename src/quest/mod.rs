//! Quest System Module
//!
//! TOML-defined quests gated by requirement grammar, missions that run for a
//! number of turns, and stochastic resolution against party stats.

pub mod availability;
pub mod definition;
pub mod events;
pub mod outcome;
pub mod registry;
pub mod requirement;
pub mod state;

pub use availability::{AvailabilityContext, AvailabilityScan, is_available};
pub use definition::{QuestDefinition, QuestTag, Reward};
pub use events::{DispatchReceipt, EngineHooks, LevelUp, MissionReport, NoopHooks, TurnReport};
pub use outcome::{Outcome, PartyMember, Roll, RollBand, roll_outcome, success_probability};
pub use registry::QuestRegistry;
pub use requirement::{Requirement, RequirementSet};
pub use state::{ActiveMission, ProgressState};
