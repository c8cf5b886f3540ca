//! Undo/redo-capable log of confirmed actions for one game.
//!
//! Two sequences describe the whole state: `actions` (confirmed, oldest
//! first) and `undone` (available to redo, most recently undone last).
//! Both only change through [`History::update`].

use crate::action::Action;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: crate::action::ActionParseError,
    },
}

#[derive(Debug, Clone, Default)]
pub struct History {
    actions: Vec<Action>,
    undone: Vec<Action>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Confirmed actions, oldest first.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Undone actions, most recently undone last.
    pub fn undone(&self) -> &[Action] {
        &self.undone
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn last_action(&self) -> Option<&Action> {
        self.actions.last()
    }

    /// Record one action coming off the wire.
    pub fn update(&mut self, action: &Action) {
        if action.is_undo() {
            self.undo(action);
        } else if action.is_ephemeral() {
            log::trace!("Not recording ephemeral {}", action.name());
        } else {
            self.actions.push(action.clone());
            if let Some(redo) = self.undone.pop() {
                // Replaying exactly the last undone action is a redo; anything
                // else invalidates the redo stack.
                if &redo != action {
                    self.undone.clear();
                }
            }
        }
    }

    fn undo(&mut self, action: &Action) {
        let Some(last) = self.actions.last() else {
            return;
        };
        if last.payload_hash() != action.payload_hash() || !last.same_payload(action) {
            log::debug!(
                "Ignoring {} that does not match last action {}",
                action.name(),
                last.name()
            );
            return;
        }
        if let Some(last) = self.actions.pop() {
            self.undone.push(last);
        }
    }

    /// True if `playername` may undo the last action.
    pub fn can_undo(&self, playername: &str) -> bool {
        self.actions
            .last()
            .is_some_and(|a| a.is_undoable() && a.playername() == Some(playername))
    }

    /// True if `playername` may redo the most recently undone action.
    pub fn can_redo(&self, playername: &str) -> bool {
        self.undone
            .last()
            .is_some_and(|a| a.playername() == Some(playername))
    }

    /// The action `playername` would replay to redo, if any.
    pub fn redo_action(&self, playername: &str) -> Option<&Action> {
        self.undone
            .last()
            .filter(|a| a.playername() == Some(playername))
    }

    /// Most recent split by `playername` that touched either marker.
    pub fn find_last_split(
        &self,
        playername: &str,
        markerid1: &str,
        markerid2: &str,
    ) -> Option<&Action> {
        self.actions.iter().rev().find(|action| match action {
            Action::SplitLegion {
                playername: who,
                parent_markerid,
                child_markerid,
                ..
            } => {
                who == playername
                    && [markerid1, markerid2].iter().any(|m| {
                        parent_markerid.as_str() == *m || child_markerid.as_str() == *m
                    })
            }
            _ => false,
        })
    }

    /// Writes one action per line in text form.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<(), HistoryError> {
        for action in &self.actions {
            writeln!(writer, "{}", action)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Replaces `actions` with the parsed lines and clears `undone`.
    ///
    /// Blank lines are skipped. On error the history is left unchanged.
    pub fn load<R: BufRead>(&mut self, reader: R) -> Result<(), HistoryError> {
        let mut actions = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let action = line.parse().map_err(|source| HistoryError::Parse {
                line: idx + 1,
                source,
            })?;
            actions.push(action);
        }
        log::debug!("Loaded {} actions", actions.len());
        self.actions = actions;
        self.undone.clear();
        Ok(())
    }

    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<(), HistoryError> {
        let file = std::fs::File::create(path)?;
        self.save(&mut BufWriter::new(file))
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), HistoryError> {
        let file = std::fs::File::open(path)?;
        self.load(BufReader::new(file))
    }
}
