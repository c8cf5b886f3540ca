use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use titansim_core::{EventLogObserver, Game, History, SplitPredictor};

mod loader;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a saved action log and print predicted legion contents
    Replay {
        /// Action log, one `Name {json}` line per action
        history: PathBuf,

        /// Predict as this player sees the game (default: track everyone)
        #[arg(long)]
        observer: Option<String>,

        /// JSON game config
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write every applied action here as JSONL
        #[arg(long)]
        event_log: Option<PathBuf>,

        /// Creature table CSV (default: the standard set)
        #[arg(long)]
        creatures: Option<PathBuf>,
    },
    /// Parse an action log and report its undo/redo state
    Check {
        history: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = std::str::FromStr::from_str(&args.log_level).unwrap_or(log::LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    match args.command {
        Commands::Replay {
            history,
            observer,
            config,
            event_log,
            creatures,
        } => replay(
            &history,
            observer,
            config.as_deref(),
            event_log.as_deref(),
            creatures.as_deref(),
        ),
        Commands::Check { history } => check(&history),
    }
}

fn replay(
    history: &Path,
    observer: Option<String>,
    config: Option<&Path>,
    event_log: Option<&Path>,
    creatures: Option<&Path>,
) -> Result<()> {
    let actions = loader::load_actions(history)?;
    let Some(first) = actions.first() else {
        println!("No actions in {}", history.display());
        return Ok(());
    };
    let config = loader::load_config(config)?;
    let table = loader::load_creatures(creatures)?;

    let mut game = Game::new(first.game_name(), table.clone(), config.clone());
    let predictor =
        SplitPredictor::new(observer.clone(), table).with_check(config.check_predictions);
    let predictions = predictor.handle();
    game.register_observer(Box::new(predictor));
    if let Some(path) = event_log {
        let log_observer = EventLogObserver::file(path)
            .with_context(|| format!("Failed to create event log {}", path.display()))?;
        game.register_observer(Box::new(log_observer));
    }

    log::info!("Replaying {} actions of game {}", actions.len(), game.name());
    for (idx, action) in actions.iter().enumerate() {
        let followups = game
            .apply(action)
            .with_context(|| format!("Action {} ({}) failed", idx + 1, action.name()))?;
        for followup in followups {
            log::debug!("Implied by action {}: {}", idx + 1, followup);
        }
    }
    game.shutdown();

    println!(
        "Game {}: {} actions, turn {}",
        game.name(),
        actions.len(),
        game.turn()
    );
    for player in game.players() {
        println!(
            "  {} ({}): score {}, {} legions{}",
            player.name,
            player.color.as_deref().unwrap_or("no color"),
            player.score,
            player.num_legions(),
            if player.dead { ", dead" } else { "" }
        );
    }
    match &observer {
        Some(viewer) => println!("Predicted legions as seen by {}:", viewer),
        None => println!("Predicted legions:"),
    }
    println!("{}", predictions.leaves_summary()?);
    Ok(())
}

fn check(path: &Path) -> Result<()> {
    let actions = loader::load_actions(path)?;
    let mut history = History::new();
    for action in &actions {
        history.update(action);
    }

    println!(
        "{} actions read, {} recorded, {} undone",
        actions.len(),
        history.len(),
        history.undone().len()
    );
    if let Some(last) = history.last_action() {
        println!("Last action: {}", last);
        if let Some(playername) = last.playername().filter(|_| last.is_undoable()) {
            println!("Undoable by {}", playername);
        }
    }
    if let Some(redo) = history.undone().last() {
        println!("Next redo: {}", redo);
    }
    Ok(())
}
