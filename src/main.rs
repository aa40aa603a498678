use std::path::PathBuf;
use std::process::ExitCode;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use questboard::quest::{DispatchReceipt, RollBand};
use questboard::{EngineConfig, EngineError, EngineHooks, MissionReport, QuestEngine};

const DEFAULT_CONFIG: &str = "questboard.toml";
const DEFAULT_TURNS: u32 = 10;
const SESSION_SLOT: &str = "last_session";

// ============================================================================
// Host
// ============================================================================

/// Prints narration to stdout
struct ConsoleHost;

impl EngineHooks for ConsoleHost {
    fn on_log(&mut self, message: &str) {
        println!("  {}", message);
    }

    fn on_mission_started(&mut self, receipt: &DispatchReceipt) {
        if !receipt.skipped.is_empty() {
            println!("  (left behind: {})", receipt.skipped.join(", "));
        }
    }

    fn on_mission_resolved(&mut self, report: &MissionReport) {
        if let Some(roll) = &report.roll {
            let flourish = match roll.band {
                RollBand::Critical => " (critical roll)",
                RollBand::CriticalFailure => " (critical failure roll)",
                RollBand::Standard => "",
            };
            println!(
                "  [{}] chance {:.0}%, rolled {:.0}{}",
                report.quest_name,
                roll.chance * 100.0,
                roll.draw * 100.0,
                flourish
            );
        }
    }

    fn on_quests_expired(&mut self, quest_names: &[String]) {
        println!("  No one answered: {}", quest_names.join(", "));
    }

    fn on_new_quests(&mut self, count: usize) {
        println!("  {} new request(s) on the board", count);
    }
}

/// Send idle characters on every quest that is on offer, best levels first
fn dispatch_everyone(engine: &mut QuestEngine) {
    for quest in engine.available_quests() {
        let mut idle: Vec<(String, u32)> = engine
            .idle_characters()
            .iter()
            .map(|c| (c.id().to_string(), c.level()))
            .collect();
        if idle.is_empty() {
            break;
        }
        idle.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let size = quest.max_party.unwrap_or(2).min(idle.len());
        let party: Vec<String> = idle.into_iter().take(size).map(|(id, _)| id).collect();

        if let Err(e) = engine.dispatch(&quest.id, &party) {
            warn!("Could not dispatch quest {}: {}", quest.id, e);
        }
    }
}

fn run(config: &EngineConfig, turns: u32) -> Result<(), EngineError> {
    let mut engine = QuestEngine::from_config(config)?.with_hooks(ConsoleHost);

    if let Some(slot) = config.autosave() {
        if engine.save_store().exists(slot) {
            let report = engine.load(slot)?;
            info!(
                "Resumed from '{}' at turn {} ({} records skipped)",
                slot,
                engine.current_turn(),
                report.diagnostics.len()
            );
        }
    }

    for _ in 0..turns {
        println!("== Turn {} ==", engine.current_turn());
        dispatch_everyone(&mut engine);
        engine.advance_turn();
    }

    let path = engine.save(SESSION_SLOT)?;
    info!(
        "Session saved to {:?}: {} completed, {} failed, {} in flight",
        path,
        engine.completed_quest_ids().count(),
        engine.failed_quest_ids().count(),
        engine.active_quests().len()
    );

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("questboard=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let turns = match args.next().map(|t| t.parse::<u32>()) {
        None => DEFAULT_TURNS,
        Some(Ok(turns)) => turns,
        Some(Err(e)) => {
            error!("Invalid turn count: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = match EngineConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config {:?}: {}", config_path, e);
            return ExitCode::FAILURE;
        }
    };

    match run(&config, turns) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
