//! Character Registry
//!
//! Loads and caches character definitions from TOML files.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::definition::{CharacterDefinition, RawCharacter};
use crate::error::EngineError;

/// Registry for all character definitions
#[derive(Debug, Default)]
pub struct CharacterRegistry {
    characters: BTreeMap<String, Arc<CharacterDefinition>>,
}

impl CharacterRegistry {
    pub fn new() -> Self {
        Self {
            characters: BTreeMap::new(),
        }
    }

    /// Build a registry from already resolved definitions
    pub fn from_definitions(defs: impl IntoIterator<Item = CharacterDefinition>) -> Self {
        let mut registry = Self::new();
        for def in defs {
            registry.insert(def);
        }
        registry
    }

    /// Load all character definitions from `<data_dir>/characters`
    pub fn load_from_directory(&mut self, data_dir: &Path) -> Result<(), EngineError> {
        let characters_dir = data_dir.join("characters");

        if !characters_dir.exists() {
            warn!("Characters directory does not exist: {:?}", characters_dir);
            return Ok(());
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&characters_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "toml") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            let content = std::fs::read_to_string(&path)?;
            let table: BTreeMap<String, RawCharacter> = toml::from_str(&content)?;

            for (id, raw) in table {
                if self.characters.contains_key(&id) {
                    warn!("Duplicate character ID '{}' in {:?}, overwriting", id, path);
                }
                let character = CharacterDefinition::from_raw(&id, &raw);
                info!(
                    "Loaded character: {} ({}) - {} perks",
                    character.name,
                    id,
                    character.perks.len()
                );
                self.insert(character);
            }
        }

        info!("Loaded {} character definitions", self.characters.len());

        Ok(())
    }

    pub fn insert(&mut self, def: CharacterDefinition) {
        self.characters.insert(def.id.clone(), Arc::new(def));
    }

    /// Get a character definition by ID
    pub fn get(&self, id: &str) -> Option<&Arc<CharacterDefinition>> {
        self.characters.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.characters.contains_key(id)
    }

    /// All definitions in id order
    pub fn all(&self) -> impl Iterator<Item = &Arc<CharacterDefinition>> {
        self.characters.values()
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}
