use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use titandata::CreatureTable;
use titansim_core::{Action, GameConfig, History};

/// Reads a saved action log, one `Name {json}` action per line.
///
/// Undo actions are kept as written so a replay sees exactly what the
/// server sent.
pub fn load_actions(path: &Path) -> Result<Vec<Action>> {
    log::info!("Loading actions from {:?}", path);
    let mut history = History::new();
    history
        .load_file(path)
        .with_context(|| format!("Failed to read history {}", path.display()))?;
    Ok(history.actions().to_vec())
}

pub fn load_config(path: Option<&Path>) -> Result<GameConfig> {
    match path {
        Some(path) => GameConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(GameConfig::default()),
    }
}

pub fn load_creatures(path: Option<&Path>) -> Result<Arc<CreatureTable>> {
    let table = match path {
        Some(path) => CreatureTable::load_csv(path)
            .with_context(|| format!("Failed to load creatures {}", path.display()))?,
        None => CreatureTable::builtin().context("Built-in creature table is invalid")?,
    };
    Ok(Arc::new(table))
}
