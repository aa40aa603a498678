//! Quest Engine
//!
//! Owns the catalogs, the session's progress and roster, the random source
//! and the host's hooks. All mutation goes through the commands here, one
//! call at a time.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, error, info, warn};

use crate::character::{
    CharacterDefinition, CharacterRecord, CharacterRegistry, CharacterStatus, Roster, RosterChange,
};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::quest::availability;
use crate::quest::events::{DispatchReceipt, EngineHooks, LevelUp, MissionReport, NoopHooks, TurnReport};
use crate::quest::outcome::{PartyMember, roll_outcome, success_probability};
use crate::quest::state::{ActiveMission, FIRST_TURN, ProgressState};
use crate::quest::{QuestDefinition, QuestRegistry};
use crate::save::{CharacterSnapshot, LoadReport, MissionSnapshot, SaveDocument, SaveStore};

/// A character's catalog entry together with its session progress
#[derive(Debug, Clone, Copy)]
pub struct CharacterView<'a> {
    pub definition: &'a Arc<CharacterDefinition>,
    pub record: &'a CharacterRecord,
}

impl CharacterView<'_> {
    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn level(&self) -> u32 {
        self.record.level()
    }
}

pub struct QuestEngine {
    quests: QuestRegistry,
    characters: CharacterRegistry,
    state: ProgressState,
    roster: Roster,
    rng: Box<dyn RngCore>,
    hooks: Box<dyn EngineHooks>,
    store: SaveStore,
    autosave_slot: Option<String>,
}

impl QuestEngine {
    /// New game over the given catalogs, with an entropy-seeded RNG and no hooks
    pub fn new(quests: QuestRegistry, characters: CharacterRegistry) -> Self {
        let roster = Roster::new(&characters);
        let defaults = EngineConfig::default();
        Self {
            quests,
            characters,
            state: ProgressState::new(),
            roster,
            rng: Box::new(StdRng::from_entropy()),
            hooks: Box::new(NoopHooks),
            store: SaveStore::new(defaults.save_dir),
            autosave_slot: None,
        }
    }

    /// Load both catalogs and set up saving as configured
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut characters = CharacterRegistry::new();
        characters.load_from_directory(&config.data_dir)?;

        let mut quests = QuestRegistry::new();
        quests.load_from_directory(&config.data_dir, &config.locale)?;

        let problems = quests.validate_references(&characters);
        if problems > 0 {
            warn!("{} dangling catalog references", problems);
        }

        let engine = Self::new(quests, characters).with_save_store(
            SaveStore::new(config.save_dir.clone()),
            config.autosave().map(str::to_string),
        );

        Ok(match config.seed {
            Some(seed) => {
                info!("Using fixed RNG seed {}", seed);
                engine.with_seed(seed)
            }
            None => engine,
        })
    }

    pub fn with_rng(mut self, rng: impl RngCore + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_hooks(mut self, hooks: impl EngineHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    /// Where slots live, and the slot written after every resolution
    pub fn with_save_store(mut self, store: SaveStore, autosave_slot: Option<String>) -> Self {
        self.store = store;
        self.autosave_slot = autosave_slot;
        self
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Quests currently on offer, in id order.
    ///
    /// Expires stale quests first (reported in one `on_quests_expired` call)
    /// and stamps quests offered for the first time.
    pub fn available_quests(&mut self) -> Vec<Arc<QuestDefinition>> {
        let scan = availability::scan(&self.quests, &mut self.state, &self.roster);

        if !scan.expired.is_empty() {
            let names: Vec<String> = scan.expired.iter().map(|q| q.name.clone()).collect();
            self.hooks.on_quests_expired(&names);
            self.hooks.on_state_changed();
        }
        if scan.newly_available > 0 {
            debug!("{} quests offered for the first time", scan.newly_available);
            self.hooks.on_new_quests(scan.newly_available);
        }

        scan.available
    }

    pub fn active_quests(&self) -> &BTreeMap<String, ActiveMission> {
        &self.state.active
    }

    pub fn completed_quest_ids(&self) -> impl Iterator<Item = &String> {
        self.state.completed.keys()
    }

    pub fn failed_quest_ids(&self) -> impl Iterator<Item = &String> {
        self.state.failed.iter()
    }

    /// Characters who completed a quest
    pub fn contributors(&self, quest_id: &str) -> impl Iterator<Item = &String> {
        self.state.contributors(quest_id)
    }

    pub fn get_quest(&self, quest_id: &str) -> Option<&Arc<QuestDefinition>> {
        self.quests.get(quest_id)
    }

    pub fn get_character(&self, character_id: &str) -> Option<CharacterView<'_>> {
        Some(CharacterView {
            definition: self.characters.get(character_id)?,
            record: self.roster.get(character_id)?,
        })
    }

    pub fn current_turn(&self) -> u32 {
        self.state.current_turn
    }

    pub fn available_since(&self, quest_id: &str) -> Option<u32> {
        self.state.available_since(quest_id)
    }

    pub fn unlocked_characters(&self) -> Vec<CharacterView<'_>> {
        self.roster
            .unlocked_ids()
            .filter_map(|id| self.get_character(id))
            .collect()
    }

    /// Unlocked characters free to be dispatched
    pub fn idle_characters(&self) -> Vec<CharacterView<'_>> {
        self.roster
            .idle_unlocked()
            .filter_map(|record| self.get_character(&record.id))
            .collect()
    }

    /// Chance a party would have on a quest, without dispatching it
    pub fn success_chance<S: AsRef<str>>(
        &self,
        quest_id: &str,
        character_ids: &[S],
    ) -> Result<f64, EngineError> {
        let quest = self
            .quests
            .get(quest_id)
            .ok_or_else(|| EngineError::QuestNotFound(quest_id.to_string()))?;

        let party = character_ids
            .iter()
            .map(|id| {
                let id = id.as_ref();
                self.party_member(id)
                    .ok_or_else(|| EngineError::CharacterNotFound(id.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(success_probability(&party, quest))
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn quest_registry(&self) -> &QuestRegistry {
        &self.quests
    }

    pub fn character_registry(&self) -> &CharacterRegistry {
        &self.characters
    }

    pub fn save_store(&self) -> &SaveStore {
        &self.store
    }

    fn party_member(&self, character_id: &str) -> Option<PartyMember<'_>> {
        Some(PartyMember {
            definition: self.characters.get(character_id)?,
            level: self.roster.get(character_id)?.level(),
        })
    }

    fn character_name(&self, character_id: &str) -> String {
        self.characters
            .get(character_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| character_id.to_string())
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Send a party on a quest.
    ///
    /// Unknown, locked and busy characters are skipped; the call fails if
    /// nobody is left. Nothing changes when an error is returned.
    pub fn dispatch<S: AsRef<str>>(
        &mut self,
        quest_id: &str,
        character_ids: &[S],
    ) -> Result<DispatchReceipt, EngineError> {
        let quest = self
            .quests
            .get(quest_id)
            .cloned()
            .ok_or_else(|| EngineError::QuestNotFound(quest_id.to_string()))?;

        if self.state.is_active(&quest.id) {
            return Err(EngineError::QuestAlreadyActive(quest.id.clone()));
        }

        let mut party: Vec<String> = Vec::new();
        let mut skipped: Vec<String> = Vec::new();
        for id in character_ids {
            let id = id.as_ref().trim();
            if party.iter().any(|p| p == id) {
                continue;
            }
            if self.roster.is_dispatchable(id) {
                party.push(id.to_string());
            } else {
                debug!("Skipping {} for quest {}: not an idle, unlocked character", id, quest.id);
                skipped.push(id.to_string());
            }
        }

        if party.is_empty() {
            return Err(EngineError::NoValidCharacters(quest.id.clone()));
        }
        if let Some(max) = quest.max_party {
            if party.len() > max {
                return Err(EngineError::PartyTooLarge {
                    quest_id: quest.id.clone(),
                    max,
                    requested: party.len(),
                });
            }
        }

        for id in &party {
            if let Some(record) = self.roster.get_mut(id) {
                record.status = CharacterStatus::OnMission;
            }
        }
        self.state
            .active
            .insert(quest.id.clone(), ActiveMission::new(party.clone(), quest.duration));

        info!(
            "Dispatched {:?} on quest {} for {} turns",
            party, quest.id, quest.duration
        );

        let receipt = DispatchReceipt {
            quest_id: quest.id.clone(),
            characters: party,
            skipped,
            turns_remaining: quest.duration,
        };

        let names: Vec<String> = receipt
            .characters
            .iter()
            .map(|id| self.character_name(id))
            .collect();
        self.hooks.on_log(&format!(
            "{} set out on '{}' ({} turns)",
            names.join(", "),
            quest.name,
            quest.duration
        ));
        self.hooks.on_mission_started(&receipt);
        self.hooks.on_state_changed();

        Ok(receipt)
    }

    /// Move to the next turn and resolve every mission that comes due
    pub fn advance_turn(&mut self) -> TurnReport {
        self.state.current_turn += 1;
        let turn = self.state.current_turn;
        info!("Advancing to turn {}", turn);

        let due: Vec<String> = self
            .state
            .active
            .iter_mut()
            .filter_map(|(quest_id, mission)| mission.tick().then(|| quest_id.clone()))
            .collect();

        let mut report = TurnReport {
            turn,
            ..Default::default()
        };

        for quest_id in due {
            let Some(mission) = self.state.active.remove(&quest_id) else {
                continue;
            };
            if let Some(resolved) = self.resolve_mission(&quest_id, mission) {
                report.resolved.push(resolved);
            }
        }

        for resolved in &report.resolved {
            report.joined.extend(resolved.joined.iter().cloned());
            report.left.extend(resolved.left.iter().cloned());
        }
        let (joined, left) = self.apply_unlocks();
        report.joined.extend(joined);
        report.left.extend(left);

        self.hooks.on_log(&format!("Turn {} begins", turn));
        self.hooks.on_state_changed();

        report
    }

    /// Fail an active mission immediately, without a roll
    pub fn cancel(&mut self, quest_id: &str) -> Result<MissionReport, EngineError> {
        let mission = self
            .state
            .active
            .remove(quest_id)
            .ok_or_else(|| EngineError::MissionNotActive(quest_id.to_string()))?;

        let name = self
            .quests
            .get(quest_id)
            .map(|q| q.name.clone())
            .unwrap_or_else(|| quest_id.to_string());

        info!("Cancelled quest {}", quest_id);
        let mut report = MissionReport::cancelled(quest_id, &name, mission.characters);
        self.state.record_failure(quest_id);
        self.release_party(&report.characters);
        self.finish_resolution(&mut report);

        Ok(report)
    }

    /// Write the session to a slot
    pub fn save(&self, slot: &str) -> Result<PathBuf, EngineError> {
        let mut document = self.to_document();
        document.saved_at = Some(Utc::now());
        self.store.save(slot, &document)
    }

    /// Replace the session with a saved slot
    pub fn load(&mut self, slot: &str) -> Result<LoadReport, EngineError> {
        let document = self.store.load(slot)?;
        Ok(self.apply_document(document))
    }

    /// Back to a new game over the same catalogs
    pub fn reset_progress(&mut self) {
        self.state = ProgressState::new();
        self.roster.reset(&self.characters);
        info!("Progress reset");
        self.hooks.on_log("A new campaign begins");
        self.hooks.on_state_changed();
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Roll and apply the outcome of a mission that came due
    fn resolve_mission(&mut self, quest_id: &str, mission: ActiveMission) -> Option<MissionReport> {
        let Some(quest) = self.quests.get(quest_id).cloned() else {
            warn!("Active mission for unknown quest {}, releasing party", quest_id);
            self.release_party(&mission.characters);
            return None;
        };

        let chance = {
            let party: Vec<PartyMember<'_>> = mission
                .characters
                .iter()
                .filter_map(|id| self.party_member(id))
                .collect();
            success_probability(&party, &quest)
        };
        let roll = roll_outcome(chance, &mut *self.rng);
        debug!(
            "Quest {}: chance {:.2}, draw {:.3} -> {}",
            quest.id,
            chance,
            roll.draw,
            roll.outcome.as_str()
        );

        let mut report = MissionReport::rolled(&quest.id, &quest.name, mission.characters, roll);

        if report.is_success() {
            report.xp_awarded = quest.rewards.xp;
            for id in &report.characters {
                if let Some(record) = self.roster.get_mut(id) {
                    if let Some(level) = record.add_xp(quest.rewards.xp) {
                        report.level_ups.push(LevelUp {
                            character_id: id.clone(),
                            level,
                        });
                    }
                }
                self.state.record_completion(&quest.id, id);
            }
            info!("Quest {} ({}) succeeded", quest.name, quest.id);
        } else {
            self.state.record_failure(&quest.id);
            info!("Quest {} ({}) failed", quest.name, quest.id);
        }

        self.release_party(&report.characters);
        self.finish_resolution(&mut report);

        Some(report)
    }

    fn release_party(&mut self, characters: &[String]) {
        for id in characters {
            if let Some(record) = self.roster.get_mut(id) {
                record.status = CharacterStatus::Idle;
            }
        }
    }

    /// Unlocks, autosave and notifications shared by every resolution
    fn finish_resolution(&mut self, report: &mut MissionReport) {
        let (joined, left) = self.apply_unlocks();
        report.joined = joined;
        report.left = left;
        self.autosave();

        let names: Vec<String> = report
            .characters
            .iter()
            .map(|id| self.character_name(id))
            .collect();
        let message = match (report.cancelled, report.is_success()) {
            (true, _) => format!("'{}' was abandoned", report.quest_name),
            (false, true) => format!(
                "{} completed '{}' and earned {} XP",
                names.join(", "),
                report.quest_name,
                report.xp_awarded
            ),
            (false, false) => format!("{} failed '{}'", names.join(", "), report.quest_name),
        };
        self.hooks.on_log(&message);

        for level_up in &report.level_ups {
            let line = format!(
                "{} reached level {}",
                self.character_name(&level_up.character_id),
                level_up.level
            );
            self.hooks.on_log(&line);
        }

        self.hooks.on_mission_resolved(report);
        self.hooks.on_state_changed();
    }

    /// Run the unlock tracker, returning who joined and who left
    fn apply_unlocks(&mut self) -> (Vec<String>, Vec<String>) {
        let changes =
            self.roster
                .check_unlocks(&self.characters, &self.state.completed, self.state.current_turn);

        let mut joined = Vec::new();
        let mut left = Vec::new();
        for change in changes {
            let line = match &change {
                RosterChange::Joined(id) => format!("{} joined the guild", self.character_name(id)),
                RosterChange::Left(id) => format!("{} left the guild", self.character_name(id)),
            };
            self.hooks.on_log(&line);
            match change {
                RosterChange::Joined(id) => joined.push(id),
                RosterChange::Left(id) => left.push(id),
            }
        }
        (joined, left)
    }

    fn autosave(&self) {
        let Some(slot) = self.autosave_slot.as_deref() else {
            return;
        };
        if let Err(e) = self.save(slot) {
            error!("Autosave to slot '{}' failed: {}", slot, e);
        }
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Snapshot of the session as a save document
    pub fn to_document(&self) -> SaveDocument {
        SaveDocument {
            current_turn: self.state.current_turn,
            completed_quests: self
                .state
                .completed
                .iter()
                .map(|(quest, who)| (quest.clone(), who.iter().cloned().collect()))
                .collect(),
            failed_quests: self.state.failed.iter().cloned().collect(),
            unlocked_characters: self.roster.unlocked_ids().cloned().collect(),
            characters: self
                .roster
                .records()
                .map(|r| CharacterSnapshot {
                    id: r.id.clone(),
                    xp: r.xp,
                    status: r.status,
                })
                .collect(),
            active_quests: self
                .state
                .active
                .iter()
                .map(|(quest, mission)| {
                    (
                        quest.clone(),
                        MissionSnapshot {
                            turns_left: mission.turns_left,
                            characters: mission.characters.clone(),
                        },
                    )
                })
                .collect(),
            available_since: self.state.available_since.clone(),
            saved_at: None,
        }
    }

    /// Rebuild the session from a document.
    ///
    /// Ids missing from the current catalogs are dropped with a diagnostic;
    /// everything else is restored as saved, including availability stamps.
    pub fn apply_document(&mut self, document: SaveDocument) -> LoadReport {
        let mut report = LoadReport::default();
        let mut state = ProgressState::new();
        let mut roster = Roster::new(&self.characters);

        state.current_turn = document.current_turn.max(FIRST_TURN);

        for (quest_id, who) in document.completed_quests {
            if !self.quests.contains(&quest_id) {
                report.skip(format!("Completed quest '{}' is not in the catalog", quest_id));
                continue;
            }
            let contributors: BTreeSet<String> = who
                .into_iter()
                .filter(|id| {
                    let known = self.characters.contains(id);
                    if !known {
                        report.skip(format!(
                            "Contributor '{}' of quest '{}' is not in the catalog",
                            id, quest_id
                        ));
                    }
                    known
                })
                .collect();
            state.completed.insert(quest_id, contributors);
        }

        for quest_id in document.failed_quests {
            if self.quests.contains(&quest_id) {
                state.failed.insert(quest_id);
            } else {
                report.skip(format!("Failed quest '{}' is not in the catalog", quest_id));
            }
        }

        let mut unlocked = Vec::new();
        for id in document.unlocked_characters {
            if self.characters.contains(&id) {
                unlocked.push(id);
            } else {
                report.skip(format!("Unlocked character '{}' is not in the catalog", id));
            }
        }
        roster.set_unlocked(unlocked);

        for snapshot in document.characters {
            match roster.get_mut(&snapshot.id) {
                Some(record) => {
                    record.xp = snapshot.xp;
                    record.status = snapshot.status;
                }
                None => report.skip(format!("Character '{}' is not in the catalog", snapshot.id)),
            }
        }

        for (quest_id, snapshot) in document.active_quests {
            if !self.quests.contains(&quest_id) {
                report.skip(format!("Active quest '{}' is not in the catalog", quest_id));
                continue;
            }

            let mut characters = Vec::new();
            for id in snapshot.characters {
                if self.characters.contains(&id) {
                    characters.push(id);
                } else {
                    report.skip(format!(
                        "Character '{}' on quest '{}' is not in the catalog",
                        id, quest_id
                    ));
                }
            }
            if characters.is_empty() {
                report.skip(format!("Active quest '{}' has no known characters, dropping", quest_id));
                continue;
            }

            state.active.insert(
                quest_id,
                ActiveMission::new(characters, snapshot.turns_left.max(1)),
            );
        }

        // Status follows the surviving missions
        for record in roster.records_mut() {
            let assigned = state.is_character_assigned(&record.id);
            if assigned {
                record.status = CharacterStatus::OnMission;
            } else if record.status == CharacterStatus::OnMission {
                debug!("{} was on a mission that no longer exists, now idle", record.id);
                record.status = CharacterStatus::Idle;
            }
        }

        for (quest_id, turn) in document.available_since {
            if self.quests.contains(&quest_id) {
                state.available_since.insert(quest_id, turn);
            } else {
                debug!("Dropping availability stamp for unknown quest {}", quest_id);
            }
        }

        self.state = state;
        self.roster = roster;

        info!(
            "Restored turn {} with {} active missions ({} records skipped)",
            self.state.current_turn,
            self.state.active.len(),
            report.diagnostics.len()
        );
        self.hooks.on_state_changed();

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::definition::RawCharacter;
    use crate::quest::definition::RawQuestFile;
    use crate::quest::outcome::Outcome;
    use rand::rngs::mock::StepRng;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    const CHARACTERS: &str = r#"
        [brom]
        name = "Brom"
        role = "tank"
        [brom.growth]
        1 = { strength = 6, dexterity = 2, intelligence = 1, wisdom = 2 }

        [lysa]
        name = "Lysa"
        role = "healer"
        perks = ["nature"]
        [lysa.growth]
        1 = { strength = 1, dexterity = 2, intelligence = 3, wisdom = 5 }

        [mira]
        name = "Mira"
        role = "dps"
        perks = ["stealth"]
        [mira.growth]
        1 = { strength = 2, dexterity = 5, intelligence = 1, wisdom = 1 }

        [kael]
        name = "Kael"
        role = "dps"
        unlock_by_quest = ["1"]
    "#;

    const QUESTS: &str = r#"
        [[quest]]
        id = 1
        name = "Rat Cellar"
        type = "combat"
        duration = 1
        difficulty = 2
        rewards = { xp = 120 }

        [[quest]]
        id = 2
        name = "Escort"
        type = "combat"
        duration = 3
        difficulty = 4
        rewards = { xp = 50 }

        [[quest]]
        id = 3
        name = "Herbs"
        type = "nature"
        duration = 2
        difficulty = 3
        expires_after = 2

        [[quest]]
        id = 4
        name = "Smuggle"
        type = "stealth"
        difficulty = 3
        expires_after = 2
        max_party = 1

        [[quest]]
        id = 5
        name = "Sequel"
        type = "combat"
        difficulty = 3
        required_quests = ["1"]
    "#;

    #[derive(Debug, Default)]
    struct Recorded {
        logs: Vec<String>,
        started: Vec<DispatchReceipt>,
        resolved: Vec<MissionReport>,
        expired: Vec<Vec<String>>,
        new_quests: Vec<usize>,
        state_changes: usize,
    }

    struct RecordingHooks(Rc<RefCell<Recorded>>);

    impl EngineHooks for RecordingHooks {
        fn on_log(&mut self, message: &str) {
            self.0.borrow_mut().logs.push(message.to_string());
        }

        fn on_mission_started(&mut self, receipt: &DispatchReceipt) {
            self.0.borrow_mut().started.push(receipt.clone());
        }

        fn on_mission_resolved(&mut self, report: &MissionReport) {
            self.0.borrow_mut().resolved.push(report.clone());
        }

        fn on_quests_expired(&mut self, quest_names: &[String]) {
            self.0.borrow_mut().expired.push(quest_names.to_vec());
        }

        fn on_new_quests(&mut self, count: usize) {
            self.0.borrow_mut().new_quests.push(count);
        }

        fn on_state_changed(&mut self) {
            self.0.borrow_mut().state_changes += 1;
        }
    }

    fn catalogs() -> (QuestRegistry, CharacterRegistry) {
        let file: RawQuestFile = toml::from_str(QUESTS).unwrap();
        let quests = QuestRegistry::from_definitions(
            file.quests
                .into_iter()
                .map(|raw| QuestDefinition::from_raw(raw, "en").unwrap()),
        );
        let table: BTreeMap<String, RawCharacter> = toml::from_str(CHARACTERS).unwrap();
        let characters = CharacterRegistry::from_definitions(
            table.iter().map(|(id, raw)| CharacterDefinition::from_raw(id, raw)),
        );
        (quests, characters)
    }

    /// Every roll succeeds
    fn lucky_engine() -> (QuestEngine, Rc<RefCell<Recorded>>) {
        engine_with(StepRng::new(0, 0))
    }

    /// Every roll fails
    fn unlucky_engine() -> (QuestEngine, Rc<RefCell<Recorded>>) {
        engine_with(StepRng::new(u64::MAX, 0))
    }

    fn engine_with(rng: StepRng) -> (QuestEngine, Rc<RefCell<Recorded>>) {
        let (quests, characters) = catalogs();
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let engine = QuestEngine::new(quests, characters)
            .with_rng(rng)
            .with_hooks(RecordingHooks(recorded.clone()));
        (engine, recorded)
    }

    fn ids(views: &[CharacterView<'_>]) -> Vec<String> {
        views.iter().map(|v| v.id().to_string()).collect()
    }

    #[test]
    fn test_new_game() {
        let (mut engine, recorded) = lucky_engine();
        assert_eq!(engine.current_turn(), 1);
        assert_eq!(ids(&engine.unlocked_characters()), vec!["brom", "lysa", "mira"]);

        let available: Vec<_> = engine.available_quests().iter().map(|q| q.id.clone()).collect();
        assert_eq!(available, vec!["1", "2", "3", "4"]);
        assert_eq!(recorded.borrow().new_quests, vec![4]);
        assert_eq!(engine.available_since("1"), Some(1));

        // A second query offers nothing new
        engine.available_quests();
        assert_eq!(recorded.borrow().new_quests, vec![4]);
    }

    #[test]
    fn test_dispatch_marks_party_busy() {
        let (mut engine, recorded) = lucky_engine();
        let receipt = engine.dispatch("2", &["brom", "lysa", "kael", "nobody"]).unwrap();

        assert_eq!(receipt.characters, vec!["brom", "lysa"]);
        assert_eq!(receipt.skipped, vec!["kael", "nobody"]);
        assert_eq!(receipt.turns_remaining, 3);
        assert_eq!(
            engine.get_character("brom").unwrap().record.status,
            CharacterStatus::OnMission
        );
        assert_eq!(ids(&engine.idle_characters()), vec!["mira"]);
        assert_eq!(engine.active_quests()["2"].turns_left, 3);
        assert_eq!(recorded.borrow().started, vec![receipt]);

        // Busy characters cannot be sent again
        assert!(matches!(
            engine.dispatch("1", &["brom"]),
            Err(EngineError::NoValidCharacters(_))
        ));
        assert!(matches!(
            engine.dispatch("2", &["mira"]),
            Err(EngineError::QuestAlreadyActive(_))
        ));
    }

    #[test]
    fn test_rejected_dispatch_changes_nothing() {
        let (mut engine, _) = lucky_engine();
        let before = (engine.state().clone(), engine.roster().clone());

        assert!(matches!(
            engine.dispatch("99", &["brom"]),
            Err(EngineError::QuestNotFound(_))
        ));
        assert!(matches!(
            engine.dispatch("1", &["kael"]),
            Err(EngineError::NoValidCharacters(_))
        ));
        assert!(matches!(
            engine.dispatch::<&str>("1", &[]),
            Err(EngineError::NoValidCharacters(_))
        ));
        assert!(matches!(
            engine.dispatch("4", &["mira", "brom"]),
            Err(EngineError::PartyTooLarge { max: 1, requested: 2, .. })
        ));

        assert_eq!((engine.state().clone(), engine.roster().clone()), before);
    }

    #[test]
    fn test_due_mission_resolves_once() {
        let (mut engine, recorded) = lucky_engine();
        engine.dispatch("1", &["brom"]).unwrap();
        engine.dispatch("2", &["lysa", "mira"]).unwrap();

        let report = engine.advance_turn();
        assert_eq!(report.turn, 2);
        assert_eq!(report.resolved.len(), 1);
        assert_eq!(report.resolved[0].quest_id, "1");
        assert_eq!(report.resolved[0].outcome, Outcome::Success);

        assert!(!engine.active_quests().contains_key("1"));
        assert_eq!(engine.active_quests()["2"].turns_left, 2);
        assert_eq!(recorded.borrow().resolved.len(), 1);

        let report = engine.advance_turn();
        assert!(report.resolved.is_empty());
        assert_eq!(engine.active_quests()["2"].turns_left, 1);
        assert_eq!(recorded.borrow().resolved.len(), 1);
    }

    #[test]
    fn test_success_applies_rewards_and_unlocks() {
        let (mut engine, recorded) = lucky_engine();
        engine.dispatch("1", &["brom", "lysa"]).unwrap();
        let report = engine.advance_turn();

        let mission = &report.resolved[0];
        assert!(mission.is_success());
        assert_eq!(mission.xp_awarded, 120);
        assert_eq!(
            mission.level_ups,
            vec![
                LevelUp {
                    character_id: "brom".into(),
                    level: 2
                },
                LevelUp {
                    character_id: "lysa".into(),
                    level: 2
                },
            ]
        );

        let brom = engine.get_character("brom").unwrap();
        assert_eq!(brom.record.xp, 120);
        assert_eq!(brom.level(), 2);
        assert!(brom.record.is_idle());

        let contributors: Vec<_> = engine.contributors("1").cloned().collect();
        assert_eq!(contributors, vec!["brom", "lysa"]);
        assert_eq!(report.joined, vec!["kael"]);
        assert!(engine.roster().is_unlocked("kael"));

        // The follow-up quest opens, the completed one does not come back
        let available: Vec<_> = engine.available_quests().iter().map(|q| q.id.clone()).collect();
        assert!(available.contains(&"5".to_string()));
        assert!(!available.contains(&"1".to_string()));

        let recorded = recorded.borrow();
        let logs = &recorded.logs;
        assert!(logs.iter().any(|l| l == "Brom reached level 2"));
        assert!(logs.iter().any(|l| l == "Kael joined the guild"));
    }

    #[test]
    fn test_failure_records_failed_quest() {
        let (mut engine, _) = unlucky_engine();
        engine.dispatch("1", &["brom"]).unwrap();
        let report = engine.advance_turn();

        let mission = &report.resolved[0];
        assert_eq!(mission.outcome, Outcome::Failure);
        assert!(mission.roll.is_some());
        assert!(mission.level_ups.is_empty());
        assert_eq!(engine.failed_quest_ids().cloned().collect::<Vec<_>>(), vec!["1"]);
        assert_eq!(engine.completed_quest_ids().count(), 0);
        assert_eq!(engine.get_character("brom").unwrap().record.xp, 0);
        assert!(engine.get_character("brom").unwrap().record.is_idle());
        assert!(report.joined.is_empty());
    }

    #[test]
    fn test_cancel() {
        let (mut engine, recorded) = lucky_engine();
        engine.dispatch("2", &["brom"]).unwrap();

        let report = engine.cancel("2").unwrap();
        assert!(report.cancelled);
        assert_eq!(report.outcome, Outcome::Failure);
        assert!(report.roll.is_none());
        assert!(engine.active_quests().is_empty());
        assert!(engine.state().is_failed("2"));
        assert!(engine.get_character("brom").unwrap().record.is_idle());
        assert_eq!(recorded.borrow().resolved.len(), 1);

        assert!(matches!(engine.cancel("2"), Err(EngineError::MissionNotActive(_))));
        assert!(matches!(engine.cancel("1"), Err(EngineError::MissionNotActive(_))));
    }

    #[test]
    fn test_expiry_reported_once_for_all_quests() {
        let (mut engine, recorded) = lucky_engine();
        engine.available_quests();
        engine.advance_turn();
        engine.advance_turn();

        let available: Vec<_> = engine.available_quests().iter().map(|q| q.id.clone()).collect();
        assert_eq!(available, vec!["1", "2"]);
        assert_eq!(
            recorded.borrow().expired,
            vec![vec!["Herbs".to_string(), "Smuggle".to_string()]]
        );
        assert!(engine.state().is_failed("3"));
        assert!(engine.state().is_failed("4"));

        engine.available_quests();
        assert_eq!(recorded.borrow().expired.len(), 1);
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let (mut engine, _) = lucky_engine();
        engine = engine.with_save_store(SaveStore::new(temp_dir.path()), None);

        engine.available_quests();
        engine.dispatch("1", &["brom"]).unwrap();
        engine.dispatch("2", &["lysa"]).unwrap();
        engine.advance_turn();
        engine.dispatch("4", &["mira"]).unwrap();

        let state = engine.state().clone();
        let roster = engine.roster().clone();
        engine.save("slot_1").unwrap();

        engine.reset_progress();
        assert_ne!(engine.state(), &state);

        let report = engine.load("slot_1").unwrap();
        assert!(report.is_clean(), "{:?}", report.diagnostics);
        assert_eq!(engine.state(), &state);
        assert_eq!(engine.roster(), &roster);

        // Saving the restored session gives the same document
        assert_eq!(engine.to_document(), {
            let (mut other, _) = lucky_engine();
            other.apply_document(engine.to_document());
            other.to_document()
        });
    }

    #[test]
    fn test_load_skips_deleted_quest() {
        let (mut engine, _) = lucky_engine();
        let json = r#"{
            "current_turn": 5,
            "completed_quests": { "1": ["brom"], "gone": ["brom"] },
            "failed_quests": ["old"],
            "unlocked_characters": ["brom", "lysa", "mira", "ghost"],
            "characters": [
                { "id": "brom", "xp": 120, "status": "on_mission" },
                { "id": "lysa", "xp": 10, "status": "on_mission" },
                { "id": "ghost", "xp": 999, "status": "idle" }
            ],
            "active_quests": {
                "2": { "turns_left": 2, "characters": ["brom"] },
                "deleted": { "turns_left": 1, "characters": ["lysa"] }
            },
            "available_since": { "2": 3, "deleted": 3 }
        }"#;
        let document: SaveDocument = serde_json::from_str(json).unwrap();
        let report = engine.apply_document(document);

        assert_eq!(report.diagnostics.len(), 5);
        assert_eq!(engine.current_turn(), 5);
        assert_eq!(engine.active_quests().len(), 1);
        assert_eq!(engine.active_quests()["2"].characters, vec!["brom"]);
        assert_eq!(engine.available_since("2"), Some(3));
        assert_eq!(engine.available_since("deleted"), None);

        // Lysa's mission is gone, so she is free again
        assert!(engine.get_character("lysa").unwrap().record.is_idle());
        assert_eq!(
            engine.get_character("brom").unwrap().record.status,
            CharacterStatus::OnMission
        );

        let report = engine.advance_turn();
        assert!(report.resolved.is_empty());
        assert_eq!(engine.active_quests()["2"].turns_left, 1);
    }

    #[test]
    fn test_missing_slot_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let (engine, _) = lucky_engine();
        let mut engine = engine.with_save_store(SaveStore::new(temp_dir.path()), None);
        assert!(matches!(engine.load("nothing"), Err(EngineError::SaveSlotNotFound(_))));
    }

    #[test]
    fn test_autosave_after_resolution() {
        let temp_dir = TempDir::new().unwrap();
        let (engine, _) = lucky_engine();
        let mut engine = engine.with_save_store(
            SaveStore::new(temp_dir.path()),
            Some("auto_save".to_string()),
        );

        engine.dispatch("1", &["brom"]).unwrap();
        engine.dispatch("2", &["lysa"]).unwrap();
        assert!(!engine.save_store().exists("auto_save"));

        engine.advance_turn();
        let saved = engine.save_store().load("auto_save").unwrap();
        assert!(saved.completed_quests.contains_key("1"));
        // The resolved mission is gone, the other one is still in flight
        assert!(!saved.active_quests.contains_key("1"));
        assert!(saved.active_quests.contains_key("2"));
    }

    #[test]
    fn test_failed_autosave_does_not_stop_the_turn() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("saves");
        std::fs::write(&blocker, "not a directory").unwrap();

        let (engine, recorded) = lucky_engine();
        let mut engine =
            engine.with_save_store(SaveStore::new(blocker.clone()), Some("auto_save".to_string()));

        engine.dispatch("1", &["brom", "lysa"]).unwrap();
        let report = engine.advance_turn();

        assert_eq!(report.turn, 2);
        assert_eq!(report.resolved.len(), 1);
        assert!(report.resolved[0].is_success());
        assert!(engine.completed_quest_ids().any(|id| id == "1"));
        assert!(engine.active_quests().is_empty());
        assert!(engine.get_character("brom").unwrap().record.is_idle());
        assert!(engine.get_character("lysa").unwrap().record.is_idle());
        assert_eq!(recorded.borrow().resolved.len(), 1);
        assert!(!engine.save_store().exists("auto_save"));
    }

    #[test]
    fn test_reset_progress() {
        let (mut engine, _) = lucky_engine();
        engine.dispatch("1", &["brom"]).unwrap();
        engine.advance_turn();
        engine.reset_progress();

        assert_eq!(engine.current_turn(), 1);
        assert_eq!(engine.completed_quest_ids().count(), 0);
        assert!(engine.active_quests().is_empty());
        assert!(!engine.roster().is_unlocked("kael"));
        assert_eq!(engine.get_character("brom").unwrap().record.xp, 0);
    }

    #[test]
    fn test_success_chance_preview() {
        let (engine, _) = lucky_engine();
        let chance = engine.success_chance("1", &["brom"]).unwrap();
        // 6 / 4, clamped
        assert_eq!(chance, 0.95);
        assert!(matches!(
            engine.success_chance("1", &["nobody"]),
            Err(EngineError::CharacterNotFound(_))
        ));
    }

    #[test]
    fn test_shipped_catalog() {
        let data_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data");
        let temp_dir = TempDir::new().unwrap();
        let config = EngineConfig {
            data_dir,
            save_dir: temp_dir.path().to_path_buf(),
            seed: Some(11),
            ..Default::default()
        };
        let mut engine = QuestEngine::from_config(&config).unwrap();
        assert_eq!(engine.quest_registry().len(), 9);
        assert_eq!(engine.character_registry().len(), 5);
        assert_eq!(
            engine
                .quest_registry()
                .validate_references(engine.character_registry()),
            0
        );

        let available: Vec<_> = engine.available_quests().iter().map(|q| q.id.clone()).collect();
        assert_eq!(available, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_from_config() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");
        std::fs::create_dir_all(data_dir.join("quests")).unwrap();
        std::fs::create_dir_all(data_dir.join("characters")).unwrap();
        std::fs::write(data_dir.join("quests").join("main.toml"), QUESTS).unwrap();
        std::fs::write(data_dir.join("characters").join("guild.toml"), CHARACTERS).unwrap();

        let config = EngineConfig {
            data_dir,
            save_dir: temp_dir.path().join("saves"),
            seed: Some(3),
            ..Default::default()
        };
        let mut engine = QuestEngine::from_config(&config).unwrap();
        assert_eq!(engine.quest_registry().len(), 5);
        assert_eq!(engine.character_registry().len(), 4);

        engine.dispatch("1", &["brom"]).unwrap();
        engine.advance_turn();
        assert!(engine.save_store().exists("auto_save"));
    }
}
