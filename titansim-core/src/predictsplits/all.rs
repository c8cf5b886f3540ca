use super::{Node, NodeId, PredictError, PredictSplits};
use itertools::Itertools;

/// Every tracked prediction tree, addressed by legion marker.
///
/// Operations on a marker no tree knows about are skipped and report
/// `Ok(false)`; the caller decides whether that matters.
#[derive(Debug, Clone, Default)]
pub struct AllPredictSplits {
    trees: Vec<PredictSplits>,
}

impl AllPredictSplits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tree: PredictSplits) {
        log::debug!("Tracking splits for {}", tree.playername());
        self.trees.push(tree);
    }

    /// Stops tracking every tree of `playername`; returns how many were dropped.
    pub fn remove_player(&mut self, playername: &str) -> usize {
        let before = self.trees.len();
        self.trees.retain(|tree| tree.playername() != playername);
        before - self.trees.len()
    }

    pub fn trees(&self) -> &[PredictSplits] {
        &self.trees
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// (tree index, node) of the current leaf carrying `markerid`.
    pub fn find_leaf(&self, markerid: &str) -> Result<Option<(usize, NodeId)>, PredictError> {
        for (idx, tree) in self.trees.iter().enumerate() {
            if let Some(id) = tree.get_leaf(markerid)? {
                return Ok(Some((idx, id)));
            }
        }
        Ok(None)
    }

    pub fn get_leaf(&self, markerid: &str) -> Result<Option<&Node>, PredictError> {
        Ok(self
            .find_leaf(markerid)?
            .map(|(idx, id)| self.trees[idx].node(id)))
    }

    pub fn reveal<S: AsRef<str>>(&mut self, markerid: &str, names: &[S]) -> Result<bool, PredictError> {
        let Some((idx, id)) = self.tracked(markerid)? else {
            return Ok(false);
        };
        self.trees[idx].reveal_creatures(id, names)?;
        Ok(true)
    }

    pub fn split(
        &mut self,
        markerid: &str,
        child_size: usize,
        other_markerid: &str,
        turn: u32,
    ) -> Result<bool, PredictError> {
        let Some((idx, id)) = self.tracked(markerid)? else {
            return Ok(false);
        };
        self.trees[idx].split(id, child_size, other_markerid, Some(turn))?;
        Ok(true)
    }

    /// Merges two leaves of the same tree; `markerid` names the survivor
    /// when the split is not simply erased.
    pub fn merge(&mut self, markerid: &str, other_markerid: &str, turn: u32) -> Result<bool, PredictError> {
        let first = self.tracked(markerid)?;
        let second = self.tracked(other_markerid)?;
        match (first, second) {
            (Some((idx1, id1)), Some((idx2, id2))) if idx1 == idx2 => {
                self.trees[idx1].merge(id1, id2, turn)?;
                Ok(true)
            }
            (None, None) => Ok(false),
            _ => Err(PredictError::NotSiblings {
                markerid1: markerid.to_string(),
                markerid2: other_markerid.to_string(),
            }),
        }
    }

    pub fn add_creature(&mut self, markerid: &str, name: &str) -> Result<bool, PredictError> {
        let Some((idx, id)) = self.tracked(markerid)? else {
            return Ok(false);
        };
        self.trees[idx].add_creature(id, name)?;
        Ok(true)
    }

    pub fn remove_creature(&mut self, markerid: &str, name: &str) -> Result<bool, PredictError> {
        let Some((idx, id)) = self.tracked(markerid)? else {
            return Ok(false);
        };
        self.trees[idx].remove_creature(id, name)?;
        Ok(true)
    }

    pub fn remove_creatures<S: AsRef<str>>(
        &mut self,
        markerid: &str,
        names: &[S],
    ) -> Result<bool, PredictError> {
        let Some((idx, id)) = self.tracked(markerid)? else {
            return Ok(false);
        };
        self.trees[idx].remove_creatures(id, names)?;
        Ok(true)
    }

    /// A lone uncertain leaf in a tree means inference failed to finish.
    pub fn check(&self) -> Result<(), PredictError> {
        for tree in &self.trees {
            if tree.num_uncertain_legions()? == 1 {
                return Err(PredictError::OneUncertainLegion {
                    playername: tree.playername().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Every leaf of every tree, one per line.
    pub fn leaves_summary(&self) -> Result<String, PredictError> {
        let summaries: Vec<String> = self
            .trees
            .iter()
            .map(|tree| tree.leaves_summary())
            .collect::<Result<_, _>>()?;
        Ok(summaries.into_iter().filter(|s| !s.is_empty()).join("\n"))
    }

    fn tracked(&self, markerid: &str) -> Result<Option<(usize, NodeId)>, PredictError> {
        let found = self.find_leaf(markerid)?;
        if found.is_none() {
            log::debug!("No prediction tree holds {}", markerid);
        }
        Ok(found)
    }
}
