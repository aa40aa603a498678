//! Quest Definition Structures
//!
//! These structures are deserialized from TOML quest files and resolved
//! once, at load, into immutable [`QuestDefinition`]s.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::requirement::RequirementSet;
use crate::error::EngineError;
use crate::ids;
use crate::skills::Perk;

const FALLBACK_LOCALE: &str = "en";

/// A quest file: an array of `[[quest]]` tables
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuestFile {
    #[serde(default, rename = "quest")]
    pub quests: Vec<RawQuest>,
}

/// Text given either once or per locale
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LocalizedText {
    Plain(String),
    PerLocale(BTreeMap<String, String>),
}

impl Default for LocalizedText {
    fn default() -> Self {
        LocalizedText::Plain(String::new())
    }
}

impl LocalizedText {
    /// Pick the requested locale, then English, then anything
    pub fn resolve(&self, locale: &str) -> String {
        match self {
            LocalizedText::Plain(text) => text.clone(),
            LocalizedText::PerLocale(texts) => texts
                .get(locale)
                .or_else(|| texts.get(FALLBACK_LOCALE))
                .or_else(|| texts.values().next())
                .cloned()
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// Raw quest data as it appears in TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuest {
    #[serde(deserialize_with = "ids::one")]
    pub id: String,
    pub name: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    #[serde(default, rename = "type")]
    pub quest_type: OneOrMany,
    #[serde(default = "default_duration")]
    pub duration: u32,
    pub difficulty: f64,
    #[serde(default)]
    pub rewards: RawReward,
    #[serde(default, deserialize_with = "ids::many")]
    pub required_quests: Vec<String>,
    #[serde(default, deserialize_with = "ids::many")]
    pub forbidden_quests: Vec<String>,
    #[serde(default, alias = "trigger_on_fail", deserialize_with = "ids::many")]
    pub required_fail_quests: Vec<String>,
    #[serde(default, alias = "required_heroes", deserialize_with = "ids::many")]
    pub required_characters: Vec<String>,
    #[serde(default, alias = "forbidden_heroes", deserialize_with = "ids::many")]
    pub forbidden_characters: Vec<String>,
    #[serde(default)]
    pub max_party: Option<usize>,
    #[serde(default)]
    pub min_level: Option<u32>,
    #[serde(default)]
    pub available_from_turn: Option<u32>,
    #[serde(default, alias = "expired_at")]
    pub expires_after: Option<u32>,
}

fn default_duration() -> u32 {
    1
}

/// Raw reward table as it appears in TOML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReward {
    #[serde(default)]
    pub xp: u64,
}

// ============================================================================
// Resolved Quest Structures (after parsing)
// ============================================================================

/// A quest type tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum QuestTag {
    /// Rated by each character's best attribute
    Combat,
    /// Rated through the perk's attribute
    Skill(Perk),
    /// Unrecognised tag; contributes nothing to the success chance
    Other(String),
}

impl QuestTag {
    pub fn parse(s: &str) -> Self {
        let normalized = s.trim().to_lowercase();
        if normalized == "combat" || normalized == "fight" {
            return QuestTag::Combat;
        }
        match Perk::parse(&normalized) {
            Some(perk) => QuestTag::Skill(perk),
            None => QuestTag::Other(normalized),
        }
    }
}

/// Quest rewards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reward {
    pub xp: u64,
}

/// A fully resolved quest definition
#[derive(Debug, Clone)]
pub struct QuestDefinition {
    pub id: String,
    /// Name in the session's locale
    pub name: String,
    pub description: String,
    pub tags: Vec<QuestTag>,
    /// Turns a dispatched party is away
    pub duration: u32,
    pub difficulty: f64,
    pub rewards: Reward,
    pub required_quests: RequirementSet,
    pub forbidden_quests: Vec<String>,
    /// Non-empty: offered only after one of these quests failed
    pub required_fail_quests: Vec<String>,
    pub required_characters: RequirementSet,
    pub forbidden_characters: Vec<String>,
    pub max_party: Option<usize>,
    pub min_level: Option<u32>,
    pub available_from_turn: u32,
    /// Turns the quest stays on offer before expiring
    pub expires_after: Option<u32>,
}

impl QuestDefinition {
    /// Create a QuestDefinition from raw TOML data in the given locale
    pub fn from_raw(raw: RawQuest, locale: &str) -> Result<Self, EngineError> {
        let invalid = |reason: &str| EngineError::InvalidDefinition {
            id: raw.id.clone(),
            reason: reason.to_string(),
        };

        if raw.id.is_empty() {
            return Err(invalid("empty id"));
        }
        if raw.duration == 0 {
            return Err(invalid("duration must be at least one turn"));
        }
        if !raw.difficulty.is_finite() || raw.difficulty <= 0.0 {
            return Err(invalid("difficulty must be a positive number"));
        }
        if raw.max_party == Some(0) {
            return Err(invalid("max_party must allow at least one character"));
        }

        let required_quests = RequirementSet::parse_all(&raw.required_quests)?;
        let required_characters = RequirementSet::parse_all(&raw.required_characters)?;

        Ok(Self {
            name: raw.name.resolve(locale),
            description: raw.description.resolve(locale),
            tags: raw
                .quest_type
                .into_vec()
                .iter()
                .map(|t| QuestTag::parse(t))
                .collect(),
            duration: raw.duration,
            difficulty: raw.difficulty,
            rewards: Reward { xp: raw.rewards.xp },
            required_quests,
            forbidden_quests: raw.forbidden_quests,
            required_fail_quests: raw.required_fail_quests,
            required_characters,
            forbidden_characters: raw.forbidden_characters,
            max_party: raw.max_party,
            min_level: raw.min_level,
            available_from_turn: raw.available_from_turn.unwrap_or(0),
            expires_after: raw.expires_after,
            id: raw.id,
        })
    }

    pub fn is_combat(&self) -> bool {
        self.tags.contains(&QuestTag::Combat)
    }

    /// Perk tags declared by this quest
    pub fn skill_tags(&self) -> impl Iterator<Item = Perk> + '_ {
        self.tags.iter().filter_map(|t| match t {
            QuestTag::Skill(perk) => Some(*perk),
            _ => None,
        })
    }

    /// Whether the quest has been on offer long enough to expire
    pub fn is_expired(&self, available_since: Option<u32>, current_turn: u32) -> bool {
        match (self.expires_after, available_since) {
            (Some(ttl), Some(since)) => current_turn.saturating_sub(since) >= ttl,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::requirement::Requirement;

    fn parse_one(toml_str: &str) -> RawQuest {
        let mut file: RawQuestFile = toml::from_str(toml_str).unwrap();
        file.quests.remove(0)
    }

    #[test]
    fn test_parse_quest() {
        let raw = parse_one(
            r#"
            [[quest]]
            id = 7
            name = { en = "Goblin Cave", pt = "Caverna dos Goblins" }
            description = "Clear the cave."
            type = ["fight", "stealth"]
            duration = 3
            difficulty = 4.5
            rewards = { xp = 120 }
            required_quests = ["5_6", 2]
            forbidden_quests = [9]
            trigger_on_fail = ["3"]
            required_heroes = ["aria"]
            max_party = 4
            min_level = 2
            available_from_turn = 5
            expired_at = 6
            "#,
        );

        let quest = QuestDefinition::from_raw(raw.clone(), "pt").unwrap();
        assert_eq!(quest.id, "7");
        assert_eq!(quest.name, "Caverna dos Goblins");
        assert_eq!(quest.description, "Clear the cave.");
        assert_eq!(quest.tags, vec![QuestTag::Combat, QuestTag::Skill(Perk::Stealth)]);
        assert!(quest.is_combat());
        assert_eq!(quest.rewards.xp, 120);
        assert_eq!(
            quest.required_quests.alternatives(),
            &[
                Requirement::AllOf(vec!["5".into(), "6".into()]),
                Requirement::Single("2".into()),
            ]
        );
        assert_eq!(quest.forbidden_quests, vec!["9"]);
        assert_eq!(quest.required_fail_quests, vec!["3"]);
        assert_eq!(quest.max_party, Some(4));
        assert_eq!(quest.available_from_turn, 5);
        assert_eq!(quest.expires_after, Some(6));

        let quest = QuestDefinition::from_raw(raw, "de").unwrap();
        assert_eq!(quest.name, "Goblin Cave");
    }

    #[test]
    fn test_quest_defaults() {
        let raw = parse_one(
            r#"
            [[quest]]
            id = "herbs"
            name = "Gather Herbs"
            type = "nature"
            difficulty = 2
            "#,
        );
        let quest = QuestDefinition::from_raw(raw, "en").unwrap();
        assert_eq!(quest.duration, 1);
        assert_eq!(quest.tags, vec![QuestTag::Skill(Perk::Nature)]);
        assert!(quest.required_quests.is_empty());
        assert_eq!(quest.available_from_turn, 0);
        assert_eq!(quest.expires_after, None);
        assert_eq!(quest.rewards.xp, 0);
    }

    #[test]
    fn test_invalid_quests_are_rejected() {
        let zero_difficulty = parse_one(
            r#"
            [[quest]]
            id = "1"
            name = "Broken"
            difficulty = 0
            "#,
        );
        assert!(matches!(
            QuestDefinition::from_raw(zero_difficulty, "en"),
            Err(EngineError::InvalidDefinition { .. })
        ));

        let bad_token = parse_one(
            r#"
            [[quest]]
            id = "2"
            name = "Broken"
            difficulty = 1
            required_quests = ["1__3"]
            "#,
        );
        assert!(matches!(
            QuestDefinition::from_raw(bad_token, "en"),
            Err(EngineError::Requirement(_))
        ));
    }

    #[test]
    fn test_unknown_tag_is_kept() {
        assert_eq!(QuestTag::parse("Cooking"), QuestTag::Other("cooking".into()));
        assert_eq!(QuestTag::parse("Fight"), QuestTag::Combat);
    }

    #[test]
    fn test_expiry_window() {
        let raw = parse_one(
            r#"
            [[quest]]
            id = "1"
            name = "Timed"
            difficulty = 1
            expires_after = 3
            "#,
        );
        let quest = QuestDefinition::from_raw(raw, "en").unwrap();
        assert!(!quest.is_expired(None, 10));
        assert!(!quest.is_expired(Some(2), 4));
        assert!(quest.is_expired(Some(2), 5));
    }
}
