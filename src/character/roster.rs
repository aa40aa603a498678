//! Character Roster
//!
//! The single owning table of mutable per-character progress (XP and
//! status), plus the unlock tracker deciding who is currently recruitable.
//! Every other structure refers to characters by id and resolves through here.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::registry::CharacterRegistry;
use crate::skills::level_for_xp;

/// Whether a character is free to be dispatched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterStatus {
    #[default]
    Idle,
    OnMission,
}

/// Mutable progress for one character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterRecord {
    pub id: String,
    pub xp: u64,
    pub status: CharacterStatus,
}

impl CharacterRecord {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            xp: 0,
            status: CharacterStatus::Idle,
        }
    }

    pub fn level(&self) -> u32 {
        level_for_xp(self.xp)
    }

    /// Add XP, returning the new level if the character leveled up
    pub fn add_xp(&mut self, amount: u64) -> Option<u32> {
        let old_level = self.level();
        self.xp = self.xp.saturating_add(amount);
        let new_level = self.level();
        (new_level > old_level).then_some(new_level)
    }

    pub fn is_idle(&self) -> bool {
        self.status == CharacterStatus::Idle
    }
}

/// Change to the unlocked set produced by an unlock check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterChange {
    Joined(String),
    Left(String),
}

/// Per-session character progress and unlock state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    records: BTreeMap<String, CharacterRecord>,
    unlocked: BTreeSet<String>,
}

impl Roster {
    /// Fresh roster for a new game
    pub fn new(registry: &CharacterRegistry) -> Self {
        let mut roster = Self::default();
        roster.reset(registry);
        roster
    }

    /// Zero all progress and re-apply the new-game unlocks
    pub fn reset(&mut self, registry: &CharacterRegistry) {
        self.records = registry
            .all()
            .map(|def| (def.id.clone(), CharacterRecord::new(&def.id)))
            .collect();
        self.unlocked = registry
            .all()
            .filter(|def| def.is_initially_unlocked())
            .map(|def| def.id.clone())
            .collect();
    }

    pub fn get(&self, id: &str) -> Option<&CharacterRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut CharacterRecord> {
        self.records.get_mut(id)
    }

    pub fn records(&self) -> impl Iterator<Item = &CharacterRecord> {
        self.records.values()
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut CharacterRecord> {
        self.records.values_mut()
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.unlocked.contains(id)
    }

    pub fn unlocked_ids(&self) -> impl Iterator<Item = &String> {
        self.unlocked.iter()
    }

    /// Replace the unlocked set (used when restoring a save)
    pub fn set_unlocked(&mut self, ids: impl IntoIterator<Item = String>) {
        self.unlocked = ids.into_iter().collect();
    }

    /// Unlocked characters currently available for dispatch
    pub fn idle_unlocked(&self) -> impl Iterator<Item = &CharacterRecord> {
        self.records
            .values()
            .filter(|r| r.is_idle() && self.unlocked.contains(&r.id))
    }

    /// Whether a character can be sent on a mission right now
    pub fn is_dispatchable(&self, id: &str) -> bool {
        self.is_unlocked(id) && self.get(id).is_some_and(|r| r.is_idle())
    }

    /// Update unlocks from completed quests and the current turn
    pub fn check_unlocks(
        &mut self,
        registry: &CharacterRegistry,
        completed: &BTreeMap<String, BTreeSet<String>>,
        current_turn: u32,
    ) -> Vec<RosterChange> {
        let mut changes = Vec::new();

        for def in registry.all() {
            if def.leave_on_quest.iter().any(|q| completed.contains_key(q)) {
                if self.unlocked.remove(&def.id) {
                    info!("Character {} left the roster", def.id);
                    changes.push(RosterChange::Left(def.id.clone()));
                }
                continue;
            }

            if self.unlocked.contains(&def.id) {
                continue;
            }

            let turn_ok = def.available_from_turn.is_none_or(|t| current_turn >= t);
            let quests_ok = def.unlock_by_quest.iter().all(|q| completed.contains_key(q));
            let gated = !def.unlock_by_quest.is_empty() || def.available_from_turn.is_some();

            if gated && turn_ok && quests_ok {
                debug!("Unlock gates passed for {} at turn {}", def.id, current_turn);
                info!("Character {} joined the roster", def.id);
                self.unlocked.insert(def.id.clone());
                changes.push(RosterChange::Joined(def.id.clone()));
            }
        }

        changes
    }
}
