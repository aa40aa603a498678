//! Engine Notifications
//!
//! Hooks the host implements to narrate what the engine does, plus the
//! machine-readable results commands hand back.

use serde::Serialize;

use super::outcome::{Outcome, Roll};

/// Notifications fired by the engine. Fire-and-forget; every method has a
/// no-op default so hosts only implement what they narrate.
pub trait EngineHooks {
    /// Player-facing narration line
    fn on_log(&mut self, _message: &str) {}

    fn on_mission_started(&mut self, _receipt: &DispatchReceipt) {}

    fn on_mission_resolved(&mut self, _report: &MissionReport) {}

    /// Names of every quest that expired in one availability pass
    fn on_quests_expired(&mut self, _quest_names: &[String]) {}

    /// Number of quests offered for the first time in one availability pass
    fn on_new_quests(&mut self, _count: usize) {}

    /// Something the UI shows has changed
    fn on_state_changed(&mut self) {}
}

/// Hooks that ignore everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl EngineHooks for NoopHooks {}

/// Confirmation of a successful dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReceipt {
    pub quest_id: String,
    /// Characters actually sent, after filtering
    pub characters: Vec<String>,
    /// Ids that were requested but could not be sent
    pub skipped: Vec<String>,
    pub turns_remaining: u32,
}

/// A character that gained a level from a mission reward
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelUp {
    pub character_id: String,
    pub level: u32,
}

/// Everything the host needs to narrate one resolved mission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissionReport {
    pub quest_id: String,
    pub quest_name: String,
    pub characters: Vec<String>,
    pub outcome: Outcome,
    /// The roll, absent for forced failures
    pub roll: Option<Roll>,
    pub xp_awarded: u64,
    pub level_ups: Vec<LevelUp>,
    /// Failed by cancellation rather than by a roll
    pub cancelled: bool,
    /// Characters who joined the roster because of this resolution
    pub joined: Vec<String>,
    pub left: Vec<String>,
}

impl MissionReport {
    pub fn rolled(quest_id: &str, quest_name: &str, characters: Vec<String>, roll: Roll) -> Self {
        Self {
            quest_id: quest_id.to_string(),
            quest_name: quest_name.to_string(),
            characters,
            outcome: roll.outcome,
            roll: Some(roll),
            xp_awarded: 0,
            level_ups: Vec::new(),
            cancelled: false,
            joined: Vec::new(),
            left: Vec::new(),
        }
    }

    pub fn cancelled(quest_id: &str, quest_name: &str, characters: Vec<String>) -> Self {
        Self {
            quest_id: quest_id.to_string(),
            quest_name: quest_name.to_string(),
            characters,
            outcome: Outcome::Failure,
            roll: None,
            xp_awarded: 0,
            level_ups: Vec::new(),
            cancelled: true,
            joined: Vec::new(),
            left: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Result of one `advance_turn`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TurnReport {
    /// The turn just entered
    pub turn: u32,
    /// Missions resolved during the advance, in quest id order
    pub resolved: Vec<MissionReport>,
    /// Characters who joined the roster
    pub joined: Vec<String>,
    /// Characters who left the roster
    pub left: Vec<String>,
}
