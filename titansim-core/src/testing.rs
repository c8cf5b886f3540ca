use crate::action::Action;
use crate::config::GameConfig;
use crate::game::{Game, GameError};
use crate::observer::GameObserver;
use crate::player::color_abbreviation;
use std::sync::Arc;
use titandata::{CreatureTable, STARTING_CREATURES};

/// Builds a game through the same actions a server would send.
pub struct GameBuilder {
    name: String,
    players: Vec<(String, String)>,
    config: GameConfig,
    creature_table: Option<Arc<CreatureTable>>,
    observers: Vec<Box<dyn GameObserver>>,
    starting_legions: bool,
}

impl GameBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            players: Vec::new(),
            config: GameConfig::default(),
            creature_table: None,
            observers: Vec::new(),
            starting_legions: false,
        }
    }

    pub fn with_player(mut self, name: &str, color: &str) -> Self {
        self.players.push((name.to_string(), color.to_string()));
        self
    }

    pub fn with_config(mut self, config: GameConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_table(mut self, table: Arc<CreatureTable>) -> Self {
        self.creature_table = Some(table);
        self
    }

    /// Registered before any action is applied.
    pub fn with_observer(mut self, observer: Box<dyn GameObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Gives each player a full starting legion `<abbrev>01` and opens
    /// turn 1 for the first player.
    pub fn with_starting_legions(mut self) -> Self {
        self.starting_legions = true;
        self
    }

    pub fn build(self) -> Result<Game, GameError> {
        let table = match self.creature_table {
            Some(table) => table,
            None => Arc::new(CreatureTable::builtin()?),
        };
        let mut game = Game::new(self.name.clone(), table, self.config);
        for observer in self.observers {
            game.register_observer(observer);
        }

        let g = self.name;
        for (name, color) in &self.players {
            game.apply(&Action::JoinGame {
                game_name: g.clone(),
                playername: name.clone(),
            })?;
            game.apply(&Action::PickedColor {
                game_name: g.clone(),
                playername: name.clone(),
                color: color.clone(),
            })?;
        }
        if !self.starting_legions {
            return Ok(game);
        }
        for (name, color) in &self.players {
            let abbrev =
                color_abbreviation(color).ok_or_else(|| GameError::UnknownColor(color.clone()))?;
            game.apply(&Action::CreateStartingLegion {
                game_name: g.clone(),
                playername: name.clone(),
                markerid: format!("{}01", abbrev),
                creature_names: STARTING_CREATURES.iter().map(|s| s.to_string()).collect(),
            })?;
        }
        if let Some((first, _)) = self.players.first() {
            game.apply(&Action::StartSplitPhase {
                game_name: g,
                playername: first.clone(),
                turn: 1,
            })?;
        }
        Ok(game)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_methods() {
        let game = GameBuilder::new("g")
            .with_player("p0", "Green")
            .with_config(GameConfig {
                max_legion_height: 8,
                ..GameConfig::default()
            })
            .build()
            .unwrap();

        assert_eq!(game.players().len(), 1);
        assert_eq!(game.players()[0].color.as_deref(), Some("Green"));
        assert!(game.find_legion("Gr01").is_none());
        assert_eq!(game.config().max_legion_height, 8);
    }

    #[test]
    fn test_unknown_color_is_error() {
        let result = GameBuilder::new("g").with_player("p0", "Mauve").build();
        assert!(matches!(result, Err(GameError::UnknownColor(_))));
    }
}
