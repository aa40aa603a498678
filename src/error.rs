//! Engine Error Types
//!
//! Structured failures returned by engine commands and loaders.

use thiserror::Error;

/// Failure of an engine command, catalog load or save operation
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("quest '{0}' not found")]
    QuestNotFound(String),

    #[error("character '{0}' not found")]
    CharacterNotFound(String),

    #[error("no valid idle character selected for quest '{0}'")]
    NoValidCharacters(String),

    #[error("quest '{quest_id}' allows at most {max} characters, got {requested}")]
    PartyTooLarge {
        quest_id: String,
        max: usize,
        requested: usize,
    },

    #[error("quest '{0}' is already in progress")]
    QuestAlreadyActive(String),

    #[error("quest '{0}' is not in progress")]
    MissionNotActive(String),

    #[error("save slot '{0}' not found")]
    SaveSlotNotFound(String),

    #[error("invalid save slot name '{0}'")]
    InvalidSlotName(String),

    #[error("invalid definition '{id}': {reason}")]
    InvalidDefinition { id: String, reason: String },

    #[error(transparent)]
    Requirement(#[from] RequirementError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to encode or decode save: {0}")]
    Json(#[from] serde_json::Error),
}

/// A requirement token that does not follow the `id` / `id_id_...` grammar
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequirementError {
    #[error("empty requirement token")]
    Empty,

    #[error("requirement token '{0}' has an empty group member")]
    EmptyMember(String),
}
