//! Character attributes, perks and the experience curve.
//!
//! Levels follow a linear-cost curve:
//! - Level 1: 0 XP
//! - Level 2: 100 XP
//! - Level 3: 300 XP (100 + 200)
//! - Level 4: 600 XP (100 + 200 + 300)

use serde::{Deserialize, Serialize};

/// Cost of the first level-up; every following level costs this much more
pub const XP_STEP: u64 = 100;

/// Core attributes tracked in a character's growth table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    Strength,
    Dexterity,
    Intelligence,
    Wisdom,
}

impl Attribute {
    pub const ALL: [Attribute; 4] = [
        Attribute::Strength,
        Attribute::Dexterity,
        Attribute::Intelligence,
        Attribute::Wisdom,
    ];
}

/// Absolute attribute values at one level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub strength: u32,
    #[serde(default)]
    pub dexterity: u32,
    #[serde(default)]
    pub intelligence: u32,
    #[serde(default)]
    pub wisdom: u32,
}

impl Stats {
    pub fn get(&self, attribute: Attribute) -> u32 {
        match attribute {
            Attribute::Strength => self.strength,
            Attribute::Dexterity => self.dexterity,
            Attribute::Intelligence => self.intelligence,
            Attribute::Wisdom => self.wisdom,
        }
    }

    /// Highest of the four attributes (used for combat rating)
    pub fn best(&self) -> u32 {
        Attribute::ALL.iter().map(|a| self.get(*a)).max().unwrap_or(0)
    }
}

/// Non-combat specialities. A quest tagged with a perk name is rated by the
/// attribute the perk maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perk {
    Stealth,
    Thievery,
    Survival,
    Nature,
    Alchemy,
    Arcana,
    Diplomacy,
    Intimidation,
    Healing,
    Religion,
    Mining,
    Blacksmith,
    Athletics,
}

impl Perk {
    /// Case-insensitive perk name
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "stealth" => Some(Perk::Stealth),
            "thievery" => Some(Perk::Thievery),
            "survival" => Some(Perk::Survival),
            "nature" => Some(Perk::Nature),
            "alchemy" => Some(Perk::Alchemy),
            "arcana" => Some(Perk::Arcana),
            "diplomacy" => Some(Perk::Diplomacy),
            "intimidation" => Some(Perk::Intimidation),
            "healing" => Some(Perk::Healing),
            "religion" => Some(Perk::Religion),
            "mining" => Some(Perk::Mining),
            "blacksmith" => Some(Perk::Blacksmith),
            "athletics" => Some(Perk::Athletics),
            _ => None,
        }
    }

    /// Attribute a perk draws on
    pub fn attribute(&self) -> Attribute {
        match self {
            Perk::Stealth | Perk::Thievery => Attribute::Dexterity,
            Perk::Survival | Perk::Nature => Attribute::Wisdom,
            Perk::Alchemy | Perk::Arcana => Attribute::Intelligence,
            Perk::Diplomacy => Attribute::Wisdom,
            Perk::Intimidation => Attribute::Strength,
            Perk::Healing | Perk::Religion => Attribute::Wisdom,
            Perk::Mining | Perk::Blacksmith | Perk::Athletics => Attribute::Strength,
        }
    }
}

/// Total XP required to reach a level, saturating at `u64::MAX`.
/// Level 1 = 0 XP, Level 2 = 100 XP, Level 3 = 300 XP, Level 4 = 600 XP
pub fn total_xp_for_level(level: u32) -> u64 {
    if level <= 1 {
        return 0;
    }
    let steps = u128::from(level - 1);
    let total = u128::from(XP_STEP) * steps * (steps + 1) / 2;
    u64::try_from(total).unwrap_or(u64::MAX)
}

/// Level reached with the given amount of XP.
///
/// `steps` level-ups cost `50 * steps * (steps + 1)`, so the level is the
/// largest `steps` with `steps * (steps + 1) <= xp / 50`, plus one.
pub fn level_for_xp(xp: u64) -> u32 {
    let n = xp / (XP_STEP / 2);
    let steps = ((4 * n + 1).isqrt() - 1) / 2;
    u32::try_from(steps + 1).unwrap_or(u32::MAX)
}
