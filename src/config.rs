//! Engine configuration, read from a TOML file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root holding the `quests/` and `characters/` catalogs
    pub data_dir: PathBuf,
    pub save_dir: PathBuf,
    /// Locale used to resolve quest text at load
    pub locale: String,
    /// Slot written after every resolved mission; empty disables autosave
    pub autosave_slot: String,
    /// Fixed RNG seed for reproducible sessions
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            save_dir: PathBuf::from("saves"),
            locale: "en".to_string(),
            autosave_slot: "auto_save".to_string(),
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Read a config file; a missing file falls back to defaults
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        if !path.exists() {
            warn!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn autosave(&self) -> Option<&str> {
        let slot = self.autosave_slot.trim();
        (!slot.is_empty()).then_some(slot)
    }
}
