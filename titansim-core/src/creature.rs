use std::sync::Arc;
use titandata::{CreatureTable, CreatureType};

/// One live creature in a legion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creature {
    kind: Arc<CreatureType>,
}

impl Creature {
    pub fn new(kind: Arc<CreatureType>) -> Self {
        Self { kind }
    }

    /// Looks the creature type up by name.
    pub fn from_table(table: &CreatureTable, name: &str) -> Option<Self> {
        table.get(name).cloned().map(Self::new)
    }

    pub fn name(&self) -> &str {
        &self.kind.name
    }

    pub fn kind(&self) -> &CreatureType {
        &self.kind
    }

    pub fn score(&self) -> u32 {
        self.kind.score()
    }

    pub fn is_lord(&self) -> bool {
        self.kind.is_lord()
    }

    pub fn is_titan(&self) -> bool {
        self.kind.is_titan()
    }
}
