//! Quest State Tracking
//!
//! Turn counter, completed/failed sets, missions in flight and the
//! "available since" markers used by expiry.

use std::collections::{BTreeMap, BTreeSet};

/// First turn of a new game
pub const FIRST_TURN: u32 = 1;

/// A party away on a quest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveMission {
    pub characters: Vec<String>,
    pub turns_left: u32,
}

impl ActiveMission {
    pub fn new(characters: Vec<String>, duration: u32) -> Self {
        Self {
            characters,
            turns_left: duration,
        }
    }

    /// Age the mission by one turn, returning true once it is due
    pub fn tick(&mut self) -> bool {
        self.turns_left = self.turns_left.saturating_sub(1);
        self.turns_left == 0
    }
}

/// All mutable quest progress for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressState {
    pub current_turn: u32,
    /// Completed quest id -> characters who completed it
    pub completed: BTreeMap<String, BTreeSet<String>>,
    pub failed: BTreeSet<String>,
    /// Quest id -> mission in flight
    pub active: BTreeMap<String, ActiveMission>,
    /// Quest id -> turn it was first offered
    pub available_since: BTreeMap<String, u32>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            current_turn: FIRST_TURN,
            completed: BTreeMap::new(),
            failed: BTreeSet::new(),
            active: BTreeMap::new(),
            available_since: BTreeMap::new(),
        }
    }
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_completed(&self, quest_id: &str) -> bool {
        self.completed.contains_key(quest_id)
    }

    pub fn is_failed(&self, quest_id: &str) -> bool {
        self.failed.contains(quest_id)
    }

    pub fn is_active(&self, quest_id: &str) -> bool {
        self.active.contains_key(quest_id)
    }

    /// Neither in flight nor resolved
    pub fn is_open(&self, quest_id: &str) -> bool {
        !self.is_completed(quest_id) && !self.is_failed(quest_id) && !self.is_active(quest_id)
    }

    /// Characters who completed a quest (empty if it was not completed)
    pub fn contributors(&self, quest_id: &str) -> impl Iterator<Item = &String> {
        self.completed.get(quest_id).into_iter().flatten()
    }

    /// Record a character as having completed a quest
    pub fn record_completion(&mut self, quest_id: &str, character_id: &str) {
        self.completed
            .entry(quest_id.to_string())
            .or_default()
            .insert(character_id.to_string());
    }

    pub fn record_failure(&mut self, quest_id: &str) {
        self.failed.insert(quest_id.to_string());
    }

    pub fn available_since(&self, quest_id: &str) -> Option<u32> {
        self.available_since.get(quest_id).copied()
    }

    /// Stamp the first turn a quest was offered; returns true if newly stamped
    pub fn mark_available(&mut self, quest_id: &str) -> bool {
        if self.available_since.contains_key(quest_id) {
            return false;
        }
        self.available_since
            .insert(quest_id.to_string(), self.current_turn);
        true
    }

    /// Whether a character is part of any mission in flight
    pub fn is_character_assigned(&self, character_id: &str) -> bool {
        self.active
            .values()
            .any(|m| m.characters.iter().any(|c| c == character_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_game_state() {
        let state = ProgressState::new();
        assert_eq!(state.current_turn, 1);
        assert!(state.completed.is_empty());
        assert!(state.is_open("1"));
    }

    #[test]
    fn test_mission_tick() {
        let mut mission = ActiveMission::new(vec!["brom".into()], 2);
        assert!(!mission.tick());
        assert!(mission.tick());
        assert!(mission.tick());
        assert_eq!(mission.turns_left, 0);
    }

    #[test]
    fn test_completion_and_contributors() {
        let mut state = ProgressState::new();
        state.record_completion("1", "brom");
        state.record_completion("1", "lysa");
        state.record_completion("1", "brom");

        assert!(state.is_completed("1"));
        assert!(!state.is_open("1"));
        let who: Vec<_> = state.contributors("1").cloned().collect();
        assert_eq!(who, vec!["brom", "lysa"]);
        assert_eq!(state.contributors("2").count(), 0);
    }

    #[test]
    fn test_mark_available_stamps_once() {
        let mut state = ProgressState::new();
        state.current_turn = 3;
        assert!(state.mark_available("1"));
        state.current_turn = 5;
        assert!(!state.mark_available("1"));
        assert_eq!(state.available_since("1"), Some(3));
        assert_eq!(state.available_since("2"), None);
    }

    #[test]
    fn test_character_assignment() {
        let mut state = ProgressState::new();
        state
            .active
            .insert("1".into(), ActiveMission::new(vec!["brom".into()], 2));
        assert!(state.is_character_assigned("brom"));
        assert!(!state.is_character_assigned("lysa"));
    }
}
