//! The caretaker's stacks: how many of each creature are left to recruit.

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use titandata::{CharacterType, CreatureTable};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaretakerError {
    #[error("Unknown creature type {0}")]
    Unknown(String),
    #[error("No {0} left in the caretaker's stacks")]
    Exhausted(String),
}

#[derive(Debug, Clone, Default)]
pub struct Caretaker {
    counts: BTreeMap<String, u32>,
    max_counts: BTreeMap<String, u32>,
    graveyard: BTreeMap<String, u32>,
    /// Lords and demilords come back to the stacks when they die.
    immortal: BTreeSet<String>,
}

impl Caretaker {
    /// Full stacks for every creature in `table`.
    pub fn from_table(table: &CreatureTable) -> Self {
        let mut caretaker = Self::default();
        for creature in table.iter() {
            caretaker
                .counts
                .insert(creature.name.clone(), creature.max_count);
            caretaker
                .max_counts
                .insert(creature.name.clone(), creature.max_count);
            caretaker.graveyard.insert(creature.name.clone(), 0);
            if creature.character_type != CharacterType::Creature {
                caretaker.immortal.insert(creature.name.clone());
            }
        }
        caretaker
    }

    pub fn num_left(&self, name: &str) -> u32 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    pub fn max_count(&self, name: &str) -> u32 {
        self.max_counts.get(name).copied().unwrap_or(0)
    }

    pub fn num_dead(&self, name: &str) -> u32 {
        self.graveyard.get(name).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &BTreeMap<String, u32> {
        &self.counts
    }

    pub fn take_one(&mut self, name: &str) -> Result<(), CaretakerError> {
        let count = self
            .counts
            .get_mut(name)
            .ok_or_else(|| CaretakerError::Unknown(name.to_string()))?;
        if *count == 0 {
            return Err(CaretakerError::Exhausted(name.to_string()));
        }
        *count -= 1;
        Ok(())
    }

    /// Returns a creature to the stacks, never beyond its maximum.
    pub fn put_one_back(&mut self, name: &str) -> Result<(), CaretakerError> {
        let max = self.max_count(name);
        let count = self
            .counts
            .get_mut(name)
            .ok_or_else(|| CaretakerError::Unknown(name.to_string()))?;
        if *count >= max {
            log::warn!("Caretaker already holds all {} {}", max, name);
            return Ok(());
        }
        *count += 1;
        Ok(())
    }

    /// A creature died: lords go back to the stacks, others to the graveyard.
    pub fn kill_one(&mut self, name: &str) -> Result<(), CaretakerError> {
        if self.immortal.contains(name) {
            return self.put_one_back(name);
        }
        let dead = self
            .graveyard
            .get_mut(name)
            .ok_or_else(|| CaretakerError::Unknown(name.to_string()))?;
        *dead += 1;
        Ok(())
    }
}
