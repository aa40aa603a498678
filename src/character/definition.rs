//! Character Definitions
//!
//! Raw TOML structures plus the resolved, immutable catalog entry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ids;
use crate::skills::{Perk, Stats};

/// Party role used by the synergy rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tank,
    Dps,
    Healer,
}

// ============================================================================
// Raw TOML Structures
// ============================================================================

/// Raw character entry as it appears in TOML (keyed by id)
#[derive(Debug, Clone, Deserialize)]
pub struct RawCharacter {
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub perks: Vec<String>,
    #[serde(default)]
    pub defects: Vec<String>,
    #[serde(default)]
    pub story: String,
    #[serde(default)]
    pub starter: bool,
    #[serde(default, deserialize_with = "ids::many")]
    pub unlock_by_quest: Vec<String>,
    #[serde(default, deserialize_with = "ids::many")]
    pub leave_on_quest: Vec<String>,
    #[serde(default)]
    pub available_from_turn: Option<u32>,
    /// Stats per level, keyed by level number
    #[serde(default)]
    pub growth: BTreeMap<String, Stats>,
}

// ============================================================================
// Resolved Structures
// ============================================================================

/// An immutable character definition
#[derive(Debug, Clone)]
pub struct CharacterDefinition {
    pub id: String,
    pub name: String,
    pub role: Option<Role>,
    pub perks: Vec<Perk>,
    pub defects: Vec<String>,
    pub story: String,
    /// Unlocked at the start of a new game regardless of gates
    pub starter: bool,
    /// All of these quests must be completed before the character joins
    pub unlock_by_quest: Vec<String>,
    /// Completing any of these quests makes the character leave
    pub leave_on_quest: Vec<String>,
    /// Earliest turn the character may join
    pub available_from_turn: Option<u32>,
    growth: BTreeMap<u32, Stats>,
}

impl CharacterDefinition {
    /// Create a CharacterDefinition from raw TOML data
    pub fn from_raw(id: &str, raw: &RawCharacter) -> Self {
        let perks = raw
            .perks
            .iter()
            .filter_map(|p| {
                let perk = Perk::parse(p);
                if perk.is_none() {
                    warn!("Character '{}' has unknown perk '{}', ignoring", id, p);
                }
                perk
            })
            .collect();

        let growth = raw
            .growth
            .iter()
            .filter_map(|(level, stats)| match level.trim().parse::<u32>() {
                Ok(level) => Some((level, *stats)),
                Err(_) => {
                    warn!("Character '{}' has invalid growth level '{}', ignoring", id, level);
                    None
                }
            })
            .collect();

        Self {
            id: id.to_string(),
            name: raw
                .name
                .clone()
                .unwrap_or_else(|| id.replace('_', " ")),
            role: raw.role,
            perks,
            defects: raw.defects.clone(),
            story: raw.story.clone(),
            starter: raw.starter,
            unlock_by_quest: raw.unlock_by_quest.clone(),
            leave_on_quest: raw.leave_on_quest.clone(),
            available_from_turn: raw.available_from_turn,
            growth,
        }
    }

    /// Stats at a level: that level's row, else the closest lower row, else zeros
    pub fn stats_at(&self, level: u32) -> Stats {
        self.growth
            .range(..=level)
            .next_back()
            .map(|(_, stats)| *stats)
            .unwrap_or_default()
    }

    /// Unlocked at new game without any gate
    pub fn is_initially_unlocked(&self) -> bool {
        self.starter
            || (self.unlock_by_quest.is_empty()
                && matches!(self.available_from_turn, None | Some(0)))
    }

    pub fn has_perk(&self, perk: Perk) -> bool {
        self.perks.contains(&perk)
    }
}
