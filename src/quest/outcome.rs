//! Mission Outcome
//!
//! Success chance from party stats against quest difficulty, a role synergy
//! adjustment, and a single uniform draw deciding success or failure.

use rand::Rng;
use serde::Serialize;

use super::definition::QuestDefinition;
use crate::character::{CharacterDefinition, Role};

pub const MIN_CHANCE: f64 = 0.05;
pub const MAX_CHANCE: f64 = 0.95;

const PAIR_SYNERGY: f64 = 0.10;
const FULL_PARTY_SYNERGY: f64 = 0.20;

/// One dispatched character as the resolver sees it
#[derive(Debug, Clone, Copy)]
pub struct PartyMember<'a> {
    pub definition: &'a CharacterDefinition,
    pub level: u32,
}

/// A single character's contribution to a quest
pub fn member_rating(member: &PartyMember<'_>, quest: &QuestDefinition) -> u32 {
    let stats = member.definition.stats_at(member.level);

    if quest.is_combat() {
        return stats.best();
    }

    quest
        .skill_tags()
        .filter(|perk| member.definition.has_perk(*perk))
        .map(|perk| stats.get(perk.attribute()))
        .max()
        .unwrap_or(0)
}

/// Summed rating of the whole party
pub fn party_rating(party: &[PartyMember<'_>], quest: &QuestDefinition) -> u32 {
    party.iter().map(|m| member_rating(m, quest)).sum()
}

/// Bonus or penalty for the party's role mix
pub fn synergy_adjustment(roles: &[Option<Role>]) -> f64 {
    let count = |role: Role| roles.iter().filter(|r| **r == Some(role)).count();
    let tanks = count(Role::Tank);
    let healers = count(Role::Healer);
    let dps = count(Role::Dps);

    match roles.len() {
        2 => {
            if tanks + healers >= 1 && dps >= 1 {
                PAIR_SYNERGY
            } else {
                -PAIR_SYNERGY
            }
        }
        n if n >= 4 => {
            if tanks >= 1 && healers >= 1 && dps >= 2 {
                FULL_PARTY_SYNERGY
            } else {
                -FULL_PARTY_SYNERGY
            }
        }
        _ => 0.0,
    }
}

/// Unclamped chance before the synergy adjustment
pub fn base_chance(party: &[PartyMember<'_>], quest: &QuestDefinition) -> f64 {
    party_rating(party, quest) as f64 / (quest.difficulty * 2.0)
}

/// Chance of the party succeeding, in `[MIN_CHANCE, MAX_CHANCE]`.
///
/// Returns 0.0 when there is nothing to rate: an empty party, a quest with no
/// recognised tag, or a difficulty that is not a positive number.
pub fn success_probability(party: &[PartyMember<'_>], quest: &QuestDefinition) -> f64 {
    if party.is_empty() {
        return 0.0;
    }
    if !quest.difficulty.is_finite() || quest.difficulty <= 0.0 {
        return 0.0;
    }
    if !quest.is_combat() && quest.skill_tags().next().is_none() {
        return 0.0;
    }

    let roles: Vec<Option<Role>> = party.iter().map(|m| m.definition.role).collect();
    let chance = base_chance(party, quest) + synergy_adjustment(&roles);
    chance.clamp(MIN_CHANCE, MAX_CHANCE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

/// Narrative classification of a roll; never changes the outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RollBand {
    Standard,
    /// A near-certain mission rolled in the top 5%
    Critical,
    /// A long shot rolled in the bottom 5%
    CriticalFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Roll {
    pub chance: f64,
    pub draw: f64,
    pub outcome: Outcome,
    pub band: RollBand,
}

/// Classify a known draw in `[0, 1)` against a chance
pub fn roll_with_draw(chance: f64, draw: f64) -> Roll {
    let outcome = if draw < chance {
        Outcome::Success
    } else {
        Outcome::Failure
    };

    let band = if chance >= 0.9 && draw > 0.95 {
        RollBand::Critical
    } else if chance < 0.2 && draw < 0.05 {
        RollBand::CriticalFailure
    } else {
        RollBand::Standard
    };

    Roll {
        chance,
        draw,
        outcome,
        band,
    }
}

/// Draw once from `rng` and classify
pub fn roll_outcome<R: Rng + ?Sized>(chance: f64, rng: &mut R) -> Roll {
    let draw: f64 = rng.gen_range(0.0..1.0);
    roll_with_draw(chance, draw)
}
