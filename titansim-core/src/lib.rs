//! # Titan Game Core
//!
//! Masterboard state, action vocabulary and split prediction for the board
//! game Titan.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ Action log  │────▶│  Game::apply │────▶│   History   │
//! │ (text/JSON) │     │  (validate)  │     │ (undo/redo) │
//! └─────────────┘     └──────┬───────┘     └─────────────┘
//!                            │
//!                     ┌──────▼───────┐     ┌──────────────────┐
//!                     │  Observers   │────▶│ AllPredictSplits │
//!                     │  (side fx)   │     │ (hidden legions) │
//!                     └──────────────┘     └──────────────────┘
//! ```
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Action`] | Every game event, with a `Name {json}` text form |
//! | [`Game`] | Players, legions and caretaker; applies actions |
//! | [`History`] | Confirmed actions plus the redo stack |
//! | [`PredictSplits`] | Hypothesis tree for one starting legion |
//! | [`GameObserver`] | Trait for following applied actions |
//!
//! ## Observers
//!
//! - [`EventLogObserver`]: JSONL log of applied actions
//! - [`SplitPredictor`]: keeps split predictions current for one viewer

pub mod action;
pub mod caretaker;
pub mod config;
pub mod creature;
pub mod game;
pub mod history;
pub mod legion;
pub mod observer;
pub mod player;
pub mod predictsplits;
pub mod testing;

pub use action::{Action, ActionParseError, HexLabel, MarkerId};
pub use caretaker::{Caretaker, CaretakerError};
pub use config::{ConfigError, GameConfig};
pub use creature::Creature;
pub use game::{Game, GameError, Phase};
pub use history::{History, HistoryError};
pub use legion::Legion;
pub use observer::{
    EventLogObserver, GameObserver, ObserverError, ObserverRegistry, PredictorHandle,
    SplitPredictor,
};
pub use player::Player;
pub use predictsplits::{AllPredictSplits, Node, NodeId, PredictError, PredictSplits};
