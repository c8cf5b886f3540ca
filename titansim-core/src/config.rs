use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rule and bookkeeping settings for one game.
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Points per angel a legion may acquire.
    pub angel_points: u32,
    /// Points per archangel; replaces an angel acquisition at this multiple.
    pub archangel_points: u32,
    /// Tallest a legion may grow by recruiting.
    pub max_legion_height: usize,
    /// Run `AllPredictSplits::check` after every predictor update.
    pub check_predictions: bool,
    /// Fail `Game::apply` when any observer reports an error.
    pub strict_checks: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            angel_points: 100,
            archangel_points: 500,
            max_legion_height: 7,
            check_predictions: true,
            strict_checks: false,
        }
    }
}

impl GameConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        log::info!("Loading game config from {:?}", path);
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
