//! Save Slots
//!
//! The persisted form of a session and the directory of JSON slot files it
//! is written to. Documents refer to quests and characters only by id; the
//! engine re-resolves them against the loaded catalogs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::character::CharacterStatus;
use crate::error::EngineError;
use crate::ids;
use crate::quest::state::FIRST_TURN;

const SAVE_EXTENSION: &str = "json";

// ============================================================================
// Document
// ============================================================================

/// One saved session. Every field is optional on read so older or partial
/// documents still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveDocument {
    #[serde(default = "first_turn")]
    pub current_turn: u32,
    /// Quest id -> characters who completed it
    #[serde(default, deserialize_with = "completed_quests")]
    pub completed_quests: BTreeMap<String, Vec<String>>,
    #[serde(default, deserialize_with = "ids::many")]
    pub failed_quests: Vec<String>,
    #[serde(default, alias = "unlocked_heroes", deserialize_with = "ids::many")]
    pub unlocked_characters: Vec<String>,
    #[serde(default, alias = "heroes")]
    pub characters: Vec<CharacterSnapshot>,
    #[serde(default)]
    pub active_quests: BTreeMap<String, MissionSnapshot>,
    /// Only quests that have been offered appear here
    #[serde(default)]
    pub available_since: BTreeMap<String, u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Default for SaveDocument {
    fn default() -> Self {
        Self {
            current_turn: FIRST_TURN,
            completed_quests: BTreeMap::new(),
            failed_quests: Vec::new(),
            unlocked_characters: Vec::new(),
            characters: Vec::new(),
            active_quests: BTreeMap::new(),
            available_since: BTreeMap::new(),
            saved_at: None,
        }
    }
}

fn first_turn() -> u32 {
    FIRST_TURN
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSnapshot {
    #[serde(deserialize_with = "ids::one")]
    pub id: String,
    #[serde(default)]
    pub xp: u64,
    #[serde(default)]
    pub status: CharacterStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionSnapshot {
    pub turns_left: u32,
    #[serde(default, alias = "heroes", deserialize_with = "ids::many")]
    pub characters: Vec<String>,
}

#[derive(Deserialize)]
struct IdList(#[serde(deserialize_with = "ids::many")] Vec<String>);

/// Current saves map quest -> contributors; older ones only list quest ids
#[derive(Deserialize)]
#[serde(untagged)]
enum CompletedFormat {
    ByQuest(BTreeMap<String, IdList>),
    Legacy(IdList),
}

fn completed_quests<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match CompletedFormat::deserialize(deserializer)? {
        CompletedFormat::ByQuest(map) => map
            .into_iter()
            .map(|(quest, IdList(who))| (quest.trim().to_string(), who))
            .collect(),
        CompletedFormat::Legacy(IdList(quests)) => {
            quests.into_iter().map(|quest| (quest, Vec::new())).collect()
        }
    })
}

/// Records skipped while applying a document to the current catalogs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub diagnostics: Vec<String>,
}

impl LoadReport {
    pub fn skip(&mut self, message: String) {
        warn!("{}", message);
        self.diagnostics.push(message);
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

// ============================================================================
// Slot Storage
// ============================================================================

/// A save slot on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSlotInfo {
    pub slot: String,
    pub modified: DateTime<Utc>,
}

/// Directory of `<slot>.json` files
#[derive(Debug, Clone)]
pub struct SaveStore {
    dir: PathBuf,
}

impl SaveStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a slot file. Slot names may carry a `.json` suffix and are
    /// otherwise limited to letters, digits, `-` and `_`.
    pub fn path_for(&self, slot: &str) -> Result<PathBuf, EngineError> {
        let name = slot.strip_suffix(".json").unwrap_or(slot).trim();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(EngineError::InvalidSlotName(slot.to_string()));
        }
        Ok(self.dir.join(format!("{}.{}", name, SAVE_EXTENSION)))
    }

    pub fn exists(&self, slot: &str) -> bool {
        self.path_for(slot).is_ok_and(|path| path.is_file())
    }

    /// Write a document; the slot file is replaced in one rename
    pub fn save(&self, slot: &str, document: &SaveDocument) -> Result<PathBuf, EngineError> {
        let path = self.path_for(slot)?;
        std::fs::create_dir_all(&self.dir)?;

        let json = serde_json::to_string_pretty(document)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;

        info!("Saved game to {:?}", path);
        Ok(path)
    }

    pub fn load(&self, slot: &str) -> Result<SaveDocument, EngineError> {
        let path = self.path_for(slot)?;
        if !path.is_file() {
            return Err(EngineError::SaveSlotNotFound(slot.to_string()));
        }

        let content = std::fs::read_to_string(&path)?;
        let document: SaveDocument = serde_json::from_str(&content)?;
        info!("Loaded game from {:?}", path);
        Ok(document)
    }

    pub fn delete(&self, slot: &str) -> Result<(), EngineError> {
        let path = self.path_for(slot)?;
        if !path.is_file() {
            return Err(EngineError::SaveSlotNotFound(slot.to_string()));
        }
        std::fs::remove_file(path)?;
        Ok(())
    }

    /// All slots, most recently written first
    pub fn list(&self) -> Result<Vec<SaveSlotInfo>, EngineError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut slots = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.extension().is_some_and(|ext| ext == SAVE_EXTENSION) {
                continue;
            }
            let Some(slot) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let modified = match std::fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(time) => DateTime::<Utc>::from(time),
                Err(e) => {
                    debug!("No modification time for {:?}: {}", path, e);
                    DateTime::<Utc>::from(std::time::UNIX_EPOCH)
                }
            };
            slots.push(SaveSlotInfo {
                slot: slot.to_string(),
                modified,
            });
        }

        slots.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.slot.cmp(&b.slot)));
        Ok(slots)
    }
}
