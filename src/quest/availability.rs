//! Quest Availability
//!
//! A fixed, ordered chain of independent predicates. Each is a pure function
//! of the quest and the current progress; a quest is offered only when all
//! of them pass. Expiry is processed before the chain runs so a quest never
//! shows up in the same pass it expires.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::definition::QuestDefinition;
use super::registry::QuestRegistry;
use super::state::ProgressState;
use crate::character::Roster;

/// Read-only view of everything the predicates look at
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityContext<'a> {
    pub state: &'a ProgressState,
    pub roster: &'a Roster,
}

pub type Predicate = fn(&QuestDefinition, &AvailabilityContext<'_>) -> bool;

/// The predicate chain, in evaluation order
pub const PREDICATES: [(&str, Predicate); 7] = [
    ("not_completed", not_completed),
    ("trigger_on_fail", trigger_on_fail),
    ("requirements", requirements),
    ("min_character_level", min_character_level),
    ("not_active", not_active),
    ("not_expired", not_expired),
    ("turn_gate", turn_gate),
];

/// Whether a quest passes every predicate
pub fn is_available(quest: &QuestDefinition, ctx: &AvailabilityContext<'_>) -> bool {
    first_failing(quest, ctx).is_none()
}

/// Name of the first predicate that rejects the quest
pub fn first_failing(quest: &QuestDefinition, ctx: &AvailabilityContext<'_>) -> Option<&'static str> {
    PREDICATES
        .iter()
        .find(|(_, predicate)| !predicate(quest, ctx))
        .map(|(name, _)| *name)
}

pub fn not_completed(quest: &QuestDefinition, ctx: &AvailabilityContext<'_>) -> bool {
    !ctx.state.is_completed(&quest.id)
}

/// Quests with a fail-trigger list only appear after one of those quests failed
pub fn trigger_on_fail(quest: &QuestDefinition, ctx: &AvailabilityContext<'_>) -> bool {
    quest.required_fail_quests.is_empty()
        || quest
            .required_fail_quests
            .iter()
            .any(|id| ctx.state.is_failed(id))
}

/// Required/forbidden quests, then required/forbidden characters among the
/// contributors of the satisfied required quests. Character rules only apply
/// to quests that have required quests to draw contributors from.
pub fn requirements(quest: &QuestDefinition, ctx: &AvailabilityContext<'_>) -> bool {
    let state = ctx.state;

    if !quest.required_quests.is_satisfied(|id| state.is_completed(id)) {
        return false;
    }

    if quest.forbidden_quests.iter().any(|id| state.is_completed(id)) {
        return false;
    }

    if quest.required_quests.is_empty() {
        return true;
    }

    let contributors = satisfied_contributors(quest, state);

    if !quest
        .required_characters
        .is_satisfied(|id| contributors.contains(id))
    {
        return false;
    }

    !quest
        .forbidden_characters
        .iter()
        .any(|id| contributors.contains(id.as_str()))
}

/// Characters who completed any required quest whose requirement holds
pub fn satisfied_contributors<'a>(
    quest: &'a QuestDefinition,
    state: &'a ProgressState,
) -> BTreeSet<&'a str> {
    quest
        .required_quests
        .satisfied(move |id| state.is_completed(id))
        .flat_map(|req| req.ids().iter())
        .flat_map(move |id| state.contributors(id))
        .map(String::as_str)
        .collect()
}

/// At least one unlocked, idle character meets the minimum level
pub fn min_character_level(quest: &QuestDefinition, ctx: &AvailabilityContext<'_>) -> bool {
    match quest.min_level {
        None | Some(0) => true,
        Some(min) => ctx.roster.idle_unlocked().any(|c| c.level() >= min),
    }
}

pub fn not_active(quest: &QuestDefinition, ctx: &AvailabilityContext<'_>) -> bool {
    !ctx.state.is_active(&quest.id)
}

pub fn not_expired(quest: &QuestDefinition, ctx: &AvailabilityContext<'_>) -> bool {
    !quest.is_expired(ctx.state.available_since(&quest.id), ctx.state.current_turn)
}

pub fn turn_gate(quest: &QuestDefinition, ctx: &AvailabilityContext<'_>) -> bool {
    ctx.state.current_turn >= quest.available_from_turn
}

/// Move every open quest whose window has run out to the failed set
pub fn process_expired(registry: &QuestRegistry, state: &mut ProgressState) -> Vec<Arc<QuestDefinition>> {
    let expired: Vec<Arc<QuestDefinition>> = registry
        .all()
        .filter(|q| state.is_open(&q.id))
        .filter(|q| q.is_expired(state.available_since(&q.id), state.current_turn))
        .cloned()
        .collect();

    for quest in &expired {
        info!("Quest {} ({}) expired at turn {}", quest.name, quest.id, state.current_turn);
        state.record_failure(&quest.id);
    }

    expired
}

/// Result of one availability query
#[derive(Debug, Clone, Default)]
pub struct AvailabilityScan {
    /// Quests that expired during this pass
    pub expired: Vec<Arc<QuestDefinition>>,
    /// Quests on offer, in id order
    pub available: Vec<Arc<QuestDefinition>>,
    /// How many of them were offered for the first time
    pub newly_available: usize,
}

/// Process expiry, evaluate the chain for every open quest and stamp first offers
pub fn scan(registry: &QuestRegistry, state: &mut ProgressState, roster: &Roster) -> AvailabilityScan {
    let expired = process_expired(registry, state);

    let available: Vec<Arc<QuestDefinition>> = {
        let ctx = AvailabilityContext {
            state: &*state,
            roster,
        };
        registry
            .all()
            .filter(|q| ctx.state.is_open(&q.id))
            .filter(|q| match first_failing(q, &ctx) {
                None => true,
                Some(predicate) => {
                    debug!("Quest {} held back by {}", q.id, predicate);
                    false
                }
            })
            .cloned()
            .collect()
    };

    let newly_available = available
        .iter()
        .filter(|q| state.mark_available(&q.id))
        .count();

    AvailabilityScan {
        expired,
        available,
        newly_available,
    }
}
