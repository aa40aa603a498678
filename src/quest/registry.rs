//! Quest Registry
//!
//! Loads and caches quest definitions from TOML files. Definitions are
//! immutable for the lifetime of a session.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::definition::{QuestDefinition, RawQuestFile};
use crate::character::CharacterRegistry;
use crate::error::EngineError;

/// Registry for all quest definitions
#[derive(Debug, Default)]
pub struct QuestRegistry {
    quests: BTreeMap<String, Arc<QuestDefinition>>,
}

impl QuestRegistry {
    pub fn new() -> Self {
        Self {
            quests: BTreeMap::new(),
        }
    }

    /// Build a registry from already resolved definitions
    pub fn from_definitions(defs: impl IntoIterator<Item = QuestDefinition>) -> Self {
        let mut registry = Self::new();
        for def in defs {
            registry.insert(def);
        }
        registry
    }

    /// Load all quest definitions from `<data_dir>/quests`, resolving text in `locale`
    pub fn load_from_directory(&mut self, data_dir: &Path, locale: &str) -> Result<(), EngineError> {
        let quests_dir = data_dir.join("quests");
        info!("Loading quests from {:?}", quests_dir);

        if !quests_dir.exists() {
            warn!("Quest directory does not exist: {:?}", quests_dir);
            return Ok(());
        }

        let mut paths = Vec::new();
        collect_toml_files(&quests_dir, &mut paths)?;
        paths.sort();

        let mut count = 0;
        for path in paths {
            match self.load_quest_file(&path, locale) {
                Ok(loaded) => count += loaded,
                Err(e) => warn!("Failed to load quest file {:?}: {}", path, e),
            }
        }
        info!("Loaded {} quest definitions", count);

        Ok(())
    }

    /// Load a single quest file; malformed quests are skipped, the rest load
    fn load_quest_file(&mut self, path: &Path, locale: &str) -> Result<usize, EngineError> {
        let content = std::fs::read_to_string(path)?;
        let file: RawQuestFile = toml::from_str(&content)?;

        let mut count = 0;
        for raw in file.quests {
            let raw_id = raw.id.clone();
            match QuestDefinition::from_raw(raw, locale) {
                Ok(quest) => {
                    if self.quests.contains_key(&quest.id) {
                        warn!("Duplicate quest ID '{}' in {:?}, overwriting", quest.id, path);
                    }
                    info!("Loaded quest: {} ({})", quest.name, quest.id);
                    self.insert(quest);
                    count += 1;
                }
                Err(e) => warn!("Rejected quest '{}' in {:?}: {}", raw_id, path, e),
            }
        }

        Ok(count)
    }

    /// Report requirement references to ids that are not in either catalog
    pub fn validate_references(&self, characters: &CharacterRegistry) -> usize {
        let mut problems = 0;

        for quest in self.quests.values() {
            let quest_refs = quest
                .required_quests
                .referenced_ids()
                .chain(quest.forbidden_quests.iter())
                .chain(quest.required_fail_quests.iter());
            for id in quest_refs {
                if !self.quests.contains_key(id) {
                    warn!("Quest '{}' references non-existent quest '{}'", quest.id, id);
                    problems += 1;
                }
            }

            let has_character_rules =
                !quest.required_characters.is_empty() || !quest.forbidden_characters.is_empty();
            if has_character_rules && quest.required_quests.is_empty() {
                warn!(
                    "Quest '{}' has character rules but no required quests; they are ignored",
                    quest.id
                );
            }

            let character_refs = quest
                .required_characters
                .referenced_ids()
                .chain(quest.forbidden_characters.iter());
            for id in character_refs {
                if !characters.contains(id) {
                    warn!("Quest '{}' references non-existent character '{}'", quest.id, id);
                    problems += 1;
                }
            }
        }

        for character in characters.all() {
            let refs = character
                .unlock_by_quest
                .iter()
                .chain(character.leave_on_quest.iter());
            for id in refs {
                if !self.quests.contains_key(id) {
                    warn!("Character '{}' references non-existent quest '{}'", character.id, id);
                    problems += 1;
                }
            }
        }

        problems
    }

    pub fn insert(&mut self, def: QuestDefinition) {
        self.quests.insert(def.id.clone(), Arc::new(def));
    }

    /// Get a quest by ID
    pub fn get(&self, quest_id: &str) -> Option<&Arc<QuestDefinition>> {
        self.quests.get(quest_id)
    }

    pub fn contains(&self, quest_id: &str) -> bool {
        self.quests.contains_key(quest_id)
    }

    /// All quests in id order
    pub fn all(&self) -> impl Iterator<Item = &Arc<QuestDefinition>> {
        self.quests.values()
    }

    pub fn len(&self) -> usize {
        self.quests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }
}

fn collect_toml_files(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<(), EngineError> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_toml_files(&path, paths)?;
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            paths.push(path);
        }
    }
    Ok(())
}
