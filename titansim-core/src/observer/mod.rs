//! Observer pattern for following a game's action stream.
//!
//! Observers see every action after [`Game`](crate::game::Game) has applied
//! and recorded it. They cannot change game state: each gets a shared
//! reference to the action and keeps whatever it needs behind its own
//! interior mutability.
//!
//! # Architecture
//!
//! ```text
//! GameObserver trait
//!        │
//!        ├── EventLogObserver (JSONL action log)
//!        └── SplitPredictor   (hidden legion contents)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let mut registry = ObserverRegistry::new();
//! registry.register(Box::new(EventLogObserver::stdout()));
//! let failures = registry.notify(&action);
//! ```

pub mod event_log;
pub mod predict;

pub use event_log::EventLogObserver;
pub use predict::{PredictorHandle, SplitPredictor};

use crate::action::Action;
use crate::predictsplits::PredictError;
use thiserror::Error;

/// Errors that can occur during observation.
#[derive(Error, Debug)]
pub enum ObserverError {
    /// I/O error (e.g., writing the log)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error (e.g., JSON output)
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The prediction trees contradict the action stream
    #[error("Prediction error: {0}")]
    Predict(#[from] PredictError),
    /// Shared state unusable (poisoned lock)
    #[error("Lock error: {0}")]
    Lock(String),
}

/// Trait for game observers.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a game can be driven from any
/// thread.
///
/// # Error Handling
///
/// Errors returned from `on_action` are logged and counted by the registry.
/// Whether they fail the action is up to the game's configuration.
pub trait GameObserver: Send + Sync {
    /// Called once per applied action, in order.
    fn on_action(&self, action: &Action) -> Result<(), ObserverError>;

    /// Human-readable name for logging/debugging.
    fn name(&self) -> &str;

    /// Called when the game ends or the observer is dropped.
    fn on_shutdown(&self) {}
}

/// Registry for managing multiple observers.
pub struct ObserverRegistry {
    observers: Vec<Box<dyn GameObserver>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self { observers: vec![] }
    }

    pub fn register(&mut self, observer: Box<dyn GameObserver>) {
        log::info!("Registered observer: {}", observer.name());
        self.observers.push(observer);
    }

    /// Notifies every observer; returns how many failed.
    ///
    /// One failure does not stop the others from seeing the action.
    pub fn notify(&self, action: &Action) -> usize {
        let mut failures = 0;
        for observer in &self.observers {
            if let Err(e) = observer.on_action(action) {
                log::warn!("Observer '{}' error on {}: {}", observer.name(), action.name(), e);
                failures += 1;
            }
        }
        failures
    }

    /// Shuts down and detaches every observer.
    pub fn shutdown(&mut self) {
        for observer in self.observers.drain(..) {
            observer.on_shutdown();
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ObserverRegistry {
    fn drop(&mut self) {
        // Flush writers before the game goes away
        self.shutdown();
    }
}
