//! Split prediction for hidden legion contents.
//!
//! Opponents only ever see legion heights and occasional reveals. For every
//! starting legion of a tracked player we keep a tree of hypotheses
//! ([`PredictSplits`]): each split of a legion adds two child [`Node`]s, and
//! each reveal, recruit or loss refines which creatures we are *certain*
//! about. Certainty learned at a leaf percolates up to the root and back down
//! through re-splits, so a sibling can be resolved by elimination.
//!
//! # Architecture
//!
//! ```text
//! AllPredictSplits ── one PredictSplits per tracked starting legion
//!        │
//!        └── PredictSplits ── arena of Nodes, root at index 0
//!                   │
//!                   ├── Node Rd01(0)            (root, all certain)
//!                   │     ├── Node Rd01(1)      (kept half)
//!                   │     └── Node Rd02(1)      (split-off half)
//! ```
//!
//! Nodes are addressed by [`NodeId`]; a node stores its parent id as a
//! non-owning back-link and owns exactly zero or two children.
//!
//! # Failure model
//!
//! Contradictions that indicate a bug or a corrupted action stream
//! (over-height nodes, duplicate same-turn leaves, removal from an empty
//! legion) are returned as [`PredictError`]. A split that cannot be resolved
//! yet is *not* an error: it is skipped and redone once certainty percolates.

mod all;
mod node;
mod tree;

pub use all::AllPredictSplits;
pub use node::{Node, NodeId};
pub use tree::PredictSplits;

use std::collections::BTreeMap;
use thiserror::Error;

/// Largest legion: a full starting stack.
pub const MAX_NODE_HEIGHT: usize = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PredictError {
    #[error("Certainty error in {markerid}: {count} certain creatures but height is {height}")]
    Certainty {
        markerid: String,
        count: usize,
        height: usize,
    },
    #[error("Cannot remove {name} from empty legion {markerid}")]
    EmptyLegion { markerid: String, name: String },
    #[error("Legion {markerid} has no certain {name} to remove")]
    NoSuchCreature { markerid: String, name: String },
    #[error("Legion {markerid} would exceed {max} creatures")]
    TooTall { markerid: String, max: usize },
    #[error("Two leaves named {markerid} created on turn {turn}")]
    DuplicateLeaf { markerid: String, turn: u32 },
    #[error("Cannot merge {markerid1} and {markerid2}: not split from the same parent")]
    NotSiblings { markerid1: String, markerid2: String },
    #[error("Player {playername} has exactly one uncertain legion")]
    OneUncertainLegion { playername: String },
}

/// One creature in a hypothesised legion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatureInfo {
    pub name: String,
    /// Known to be in this legion, by reveal or inference
    pub certain: bool,
    /// Present when the legion last split (rather than added since)
    pub at_split: bool,
}

impl CreatureInfo {
    pub fn new(name: impl Into<String>, certain: bool, at_split: bool) -> Self {
        Self {
            name: name.into(),
            certain,
            at_split,
        }
    }
}

impl std::fmt::Display for CreatureInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.certain {
            write!(f, "?")?;
        }
        if !self.at_split {
            write!(f, "*")?;
        }
        Ok(())
    }
}

/// Name -> multiplicity, in name order.
pub(crate) fn name_counts<S: AsRef<str>>(names: &[S]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for name in names {
        *counts.entry(name.as_ref()).or_insert(0) += 1;
    }
    counts
}

/// True if `big` contains every name of `little`, with multiplicity.
pub(crate) fn is_superset<S: AsRef<str>, T: AsRef<str>>(big: &[S], little: &[T]) -> bool {
    let big = name_counts(big);
    name_counts(little)
        .into_iter()
        .all(|(name, n)| big.get(name).copied().unwrap_or(0) >= n)
}

/// Removes the first occurrence of `name`; returns whether one was found.
pub(crate) fn take_name(names: &mut Vec<String>, name: &str) -> bool {
    match names.iter().position(|n| n == name) {
        Some(pos) => {
            names.remove(pos);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superset_counts_multiplicity() {
        assert!(is_superset(&["Ogre", "Ogre", "Titan"], &["Ogre", "Ogre"]));
        assert!(!is_superset(&["Ogre", "Titan"], &["Ogre", "Ogre"]));
        assert!(is_superset::<&str, &str>(&["Ogre"], &[]));
    }

    #[test]
    fn test_take_name_removes_one() {
        let mut names = vec!["Ogre".to_string(), "Ogre".to_string()];
        assert!(take_name(&mut names, "Ogre"));
        assert_eq!(names.len(), 1);
        assert!(!take_name(&mut names, "Titan"));
    }

    #[test]
    fn test_creature_info_display() {
        assert_eq!(CreatureInfo::new("Ogre", true, true).to_string(), "Ogre");
        assert_eq!(CreatureInfo::new("Ogre", false, true).to_string(), "Ogre?");
        assert_eq!(CreatureInfo::new("Lion", true, false).to_string(), "Lion*");
    }
}
