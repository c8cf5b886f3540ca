use super::{
    is_superset, name_counts, take_name, CreatureInfo, Node, NodeId, PredictError,
    MAX_NODE_HEIGHT,
};
use itertools::Itertools;
use std::collections::BTreeSet;
use std::sync::Arc;
use titandata::CreatureTable;

const ROOT: NodeId = NodeId(0);

/// Prediction tree for one starting legion and everything split from it.
///
/// Nodes live in an arena and are never freed: a merge detaches children,
/// which then become unreachable. Growth is bounded by the number of splits.
#[derive(Debug, Clone)]
pub struct PredictSplits {
    playername: String,
    nodes: Vec<Node>,
    creature_table: Arc<CreatureTable>,
}

impl PredictSplits {
    /// Starts a tree whose root holds `creature_names`, all certain.
    pub fn new<S: AsRef<str>>(
        playername: impl Into<String>,
        root_markerid: impl Into<String>,
        creature_names: &[S],
        creature_table: Arc<CreatureTable>,
    ) -> Self {
        let creatures = creature_names
            .iter()
            .map(|name| CreatureInfo::new(name.as_ref(), true, true))
            .collect();
        Self {
            playername: playername.into(),
            nodes: vec![Node::new(root_markerid, 0, creatures, None)],
            creature_table,
        }
    }

    pub fn playername(&self) -> &str {
        &self.playername
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Every reachable node, pre-order from the root.
    pub fn get_nodes(&self) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            nodes.push(id);
            if let Some((child1, child2)) = self.node(id).children {
                stack.push(child2);
                stack.push(child1);
            }
        }
        nodes
    }

    /// Childless, non-empty nodes: the legions currently on the board.
    ///
    /// When two leaves share a marker the older one is dropped; two leaves
    /// with the same marker and creation turn are an error.
    pub fn get_leaves(&self) -> Result<Vec<NodeId>, PredictError> {
        let leaves: Vec<NodeId> = self
            .get_nodes()
            .into_iter()
            .filter(|&id| {
                let node = self.node(id);
                !node.has_split() && node.height() > 0
            })
            .collect();

        let mut pruned = BTreeSet::new();
        for (idx, &a) in leaves.iter().enumerate() {
            for &b in &leaves[idx + 1..] {
                let (leaf1, leaf2) = (self.node(a), self.node(b));
                if leaf1.markerid != leaf2.markerid {
                    continue;
                }
                match leaf1.turn_created.cmp(&leaf2.turn_created) {
                    std::cmp::Ordering::Equal => {
                        return Err(PredictError::DuplicateLeaf {
                            markerid: leaf1.markerid.clone(),
                            turn: leaf1.turn_created,
                        })
                    }
                    std::cmp::Ordering::Less => {
                        pruned.insert(a);
                    }
                    std::cmp::Ordering::Greater => {
                        pruned.insert(b);
                    }
                }
            }
        }
        Ok(leaves
            .into_iter()
            .filter(|id| !pruned.contains(id))
            .collect())
    }

    pub fn get_leaf(&self, markerid: &str) -> Result<Option<NodeId>, PredictError> {
        Ok(self
            .get_leaves()?
            .into_iter()
            .find(|&id| self.node(id).markerid == markerid))
    }

    /// Number of leaves with at least one uncertain creature.
    pub fn num_uncertain_legions(&self) -> Result<usize, PredictError> {
        Ok(self
            .get_leaves()?
            .into_iter()
            .filter(|&id| !self.node(id).all_certain())
            .count())
    }

    /// True if every node below `id` is fully certain.
    pub fn all_descendants_certain(&self, id: NodeId) -> bool {
        match self.node(id).children {
            None => true,
            Some((child1, child2)) => [child1, child2].into_iter().all(|child| {
                self.node(child).all_certain() && self.all_descendants_certain(child)
            }),
        }
    }

    /// Marks `names` as known to be in the legion at `id`.
    ///
    /// Uncertain entries with a matching name are promoted first; any
    /// remaining revealed creatures replace uncertain guesses, keeping the
    /// height unchanged. Returns true if the news was passed to the parent.
    pub fn reveal_creatures<S: AsRef<str>>(
        &mut self,
        id: NodeId,
        names: &[S],
    ) -> Result<bool, PredictError> {
        if names.is_empty() {
            return Ok(false);
        }
        let node = self.node(id);
        let certain = node.certain_names();
        if is_superset(&certain, names) && self.all_descendants_certain(id) {
            return Ok(false);
        }

        // Everything already certain must still fit next to the revealed names.
        let mut unmatched: Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
        let mut count = unmatched.len();
        for name in &certain {
            if !take_name(&mut unmatched, name) {
                count += 1;
            }
        }
        if count > node.height() {
            return Err(PredictError::Certainty {
                markerid: node.markerid.clone(),
                count,
                height: node.height(),
            });
        }

        let node = self.node_mut(id);
        let mut added = 0;
        for (name, wanted) in name_counts(names) {
            let known = node
                .creatures
                .iter()
                .filter(|ci| ci.certain && ci.name == name)
                .count();
            let mut needed = wanted.saturating_sub(known);
            for ci in node
                .creatures
                .iter_mut()
                .filter(|ci| !ci.certain && ci.name == name)
            {
                if needed == 0 {
                    break;
                }
                ci.certain = true;
                needed -= 1;
            }
            for _ in 0..needed {
                // Anything added after the split would already be certain.
                node.creatures.push(CreatureInfo::new(name, true, true));
                added += 1;
            }
        }
        for _ in 0..added {
            node.remove_last_uncertain_creature();
        }
        log::trace!("Revealed creatures in {}", node);

        let parent = node.parent;
        match parent {
            Some(parent) => {
                self.update_child_contents(parent)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Pulls settled child contents into `id`, then re-splits if the news
    /// stopped here.
    pub(crate) fn update_child_contents(&mut self, id: NodeId) -> Result<(), PredictError> {
        let Some((child1, child2)) = self.node(id).children else {
            return Ok(());
        };
        let mut names = self.node(child1).certain_at_split_or_removed_names();
        names.extend(self.node(child2).certain_at_split_or_removed_names());

        let told_parent = self.reveal_creatures(id, &names)?;
        if !told_parent {
            let node = self.node(id);
            let child_size = node.child_size2;
            let turn = node.turn_split;
            let other_markerid = self.node(child2).markerid.clone();
            self.split(id, child_size, &other_markerid, turn)?;
        }
        Ok(())
    }

    /// Splits `child_size` creatures off `id` under `other_markerid`.
    ///
    /// The kept half retains this node's marker. If the node has already
    /// split, the existing children are regenerated in place with whatever
    /// is now known. A split that contradicts current certainty is skipped;
    /// it will be redone once the information reaches this node.
    pub fn split(
        &mut self,
        id: NodeId,
        child_size: usize,
        other_markerid: &str,
        turn: Option<u32>,
    ) -> Result<(), PredictError> {
        let node = self.node(id);
        if node.height() > MAX_NODE_HEIGHT {
            return Err(PredictError::TooTall {
                markerid: node.markerid.clone(),
                max: MAX_NODE_HEIGHT,
            });
        }
        let turn = turn.or(node.turn_split).unwrap_or(node.turn_created);

        let (known_keep, known_split) = match node.children {
            Some((child1, child2)) => (
                self.node(child1).certain_at_split_or_removed_names(),
                self.node(child2).certain_at_split_or_removed_names(),
            ),
            None => (Vec::new(), Vec::new()),
        };
        let known_combo: Vec<&String> = known_keep.iter().chain(known_split.iter()).collect();
        if !is_superset(&node.certain_names(), &known_combo) {
            log::debug!(
                "Deferring split of {}: children know more than the parent",
                node.full_name()
            );
            return Ok(());
        }

        let possibles = self.find_all_possible_splits(id, child_size, &known_keep, &known_split);
        let Some(split_off) = self.choose_creatures_to_split_out(id, &possibles) else {
            log::debug!(
                "Deferring split of {}: no legal way to split off {}",
                self.node(id).full_name(),
                child_size
            );
            return Ok(());
        };

        let node = self.node(id);
        let mut split_off_left = split_off.clone();
        let mut keep_known = known_keep;
        let mut split_known = known_split;
        let mut strong = Vec::new();
        let mut weak = Vec::new();
        for ci in &node.creatures {
            let mut info = CreatureInfo::new(ci.name.clone(), false, true);
            if take_name(&mut split_off_left, &ci.name) {
                info.certain = take_name(&mut split_known, &ci.name);
                weak.push(info);
            } else {
                info.certain = take_name(&mut keep_known, &ci.name);
                strong.push(info);
            }
        }

        // With the parent fully known, creatures every legal split puts on
        // the same side are known too.
        if node.all_certain() {
            let total = name_counts(&node.creature_names())
                .into_iter()
                .map(|(name, n)| (name.to_string(), n))
                .collect::<Vec<_>>();
            for (name, n) in total {
                let counts = possibles
                    .iter()
                    .map(|pos| pos.iter().filter(|p| **p == name).count());
                let min_split = counts.clone().min().unwrap_or(0);
                let max_split = counts.max().unwrap_or(0);
                promote(&mut weak, &name, min_split);
                promote(&mut strong, &name, n.saturating_sub(max_split));
            }
        }

        log::trace!(
            "Split {} -> keep {:?}, split off {:?} as {}",
            node.full_name(),
            strong.iter().map(|ci| ci.name.as_str()).collect::<Vec<_>>(),
            split_off,
            other_markerid
        );

        let markerid = node.markerid.clone();
        let children = node.children;
        match children {
            Some((child1, child2)) => {
                restore_post_split(&mut strong, self.node(child1));
                restore_post_split(&mut weak, self.node(child2));
                self.node_mut(child1).creatures = strong;
                let split_child = self.node_mut(child2);
                split_child.creatures = weak;
                split_child.markerid = other_markerid.to_string();
            }
            None => {
                let child1 = self.push_node(Node::new(markerid, turn, strong, Some(id)));
                let child2 = self.push_node(Node::new(other_markerid, turn, weak, Some(id)));
                self.node_mut(id).children = Some((child1, child2));
            }
        }
        let node = self.node_mut(id);
        node.child_size2 = child_size;
        node.turn_split = Some(turn);

        // Push the refined contents further down the lineage.
        if let Some((child1, child2)) = self.node(id).children {
            for child in [child1, child2] {
                let child_node = self.node(child);
                if let Some((_, grandchild2)) = child_node.children {
                    let size = child_node.child_size2;
                    let turn = child_node.turn_split;
                    let other = self.node(grandchild2).markerid.clone();
                    self.split(child, size, &other, turn)?;
                }
            }
        }
        Ok(())
    }

    /// Every distinct (sorted) name list that could have been split off.
    #[tracing::instrument(skip_all, name = "find_all_possible_splits")]
    pub fn find_all_possible_splits(
        &self,
        id: NodeId,
        child_size: usize,
        known_keep: &[String],
        known_split: &[String],
    ) -> Vec<Vec<String>> {
        let node = self.node(id);
        let height = node.height();
        if child_size > height
            || known_split.len() > child_size
            || known_keep.len() > height - child_size
        {
            return Vec::new();
        }

        let mut unknowns = node.creature_names();
        for name in known_split.iter().chain(known_keep.iter()) {
            if !take_name(&mut unknowns, name) {
                return Vec::new();
            }
        }

        let num_unknowns_to_split = child_size - known_split.len();
        let mut possibles = BTreeSet::new();
        for combo in unknowns.iter().combinations(num_unknowns_to_split) {
            let mut possible = known_split.to_vec();
            possible.extend(combo.into_iter().cloned());
            possible.sort();
            // Only the starting stack is this tall, and it must split
            // one lord to each side.
            if height == MAX_NODE_HEIGHT
                && child_size < height
                && !Node::is_legal_initial_splitoff(&possible)
            {
                continue;
            }
            possibles.insert(possible);
        }
        possibles.into_iter().collect()
    }

    /// Best guess among `possibles`.
    ///
    /// A split-off larger than half is assumed to be the strong half
    /// (maximise total sort value); otherwise the weak half (minimise).
    /// Ties go to the lexicographically first name list.
    pub fn choose_creatures_to_split_out(
        &self,
        id: NodeId,
        possibles: &[Vec<String>],
    ) -> Option<Vec<String>> {
        let first = possibles.first()?;
        let maximize = 2 * first.len() > self.node(id).height();

        let mut ordered: Vec<&Vec<String>> = possibles.iter().collect();
        ordered.sort();
        let mut best: Option<(u32, &Vec<String>)> = None;
        for possible in ordered {
            let value: u32 = possible
                .iter()
                .map(|name| self.creature_table.sort_value(name))
                .sum();
            let better = match best {
                None => true,
                Some((best_value, _)) if maximize => value > best_value,
                Some((best_value, _)) => value < best_value,
            };
            if better {
                best = Some((value, possible));
            }
        }
        best.map(|(_, possible)| possible.clone())
    }

    /// Recombines two sibling legions whose split was undone.
    ///
    /// If either keeps the parent's marker the split is erased; the parent
    /// absorbs any recruits and losses the halves had since. Otherwise the
    /// parent is re-split with everything going to `id`'s marker.
    pub fn merge(&mut self, id: NodeId, other: NodeId, turn: u32) -> Result<(), PredictError> {
        let parent = self
            .node(id)
            .parent
            .filter(|&p| id != other && self.node(other).parent == Some(p));
        let Some(parent) = parent else {
            return Err(PredictError::NotSiblings {
                markerid1: self.node(id).markerid.clone(),
                markerid2: self.node(other).markerid.clone(),
            });
        };

        let parent_markerid = &self.node(parent).markerid;
        if &self.node(id).markerid == parent_markerid
            || &self.node(other).markerid == parent_markerid
        {
            let mut creatures = self.node(parent).creatures.clone();
            let mut removed = Vec::new();
            for child in [id, other] {
                let child = self.node(child);
                for lost in &child.removed {
                    let pos = creatures
                        .iter()
                        .position(|ci| ci.certain && ci.name == lost.name)
                        .or_else(|| creatures.iter().position(|ci| ci.name == lost.name));
                    if let Some(pos) = pos {
                        let ci = creatures.remove(pos);
                        if ci.at_split {
                            removed.push(ci);
                        }
                    }
                }
                creatures.extend(child.after_split_creatures());
            }
            if creatures.len() > MAX_NODE_HEIGHT {
                return Err(PredictError::TooTall {
                    markerid: parent_markerid.clone(),
                    max: MAX_NODE_HEIGHT,
                });
            }
            let parent = self.node_mut(parent);
            parent.creatures = creatures;
            parent.removed.extend(removed);
            parent.children = None;
            log::debug!("Merged split back into {}", parent);
        } else {
            let child_size = self.node(id).height() + self.node(other).height();
            if child_size > MAX_NODE_HEIGHT {
                return Err(PredictError::TooTall {
                    markerid: self.node(id).markerid.clone(),
                    max: MAX_NODE_HEIGHT,
                });
            }
            let markerid = self.node(id).markerid.clone();
            self.node_mut(parent).children = None;
            self.split(parent, child_size, &markerid, Some(turn))?;
        }
        Ok(())
    }

    /// Records a recruit or summon; always observed, so certain.
    pub fn add_creature(&mut self, id: NodeId, name: &str) -> Result<(), PredictError> {
        let node = self.node_mut(id);
        if node.height() >= MAX_NODE_HEIGHT {
            return Err(PredictError::TooTall {
                markerid: node.markerid.clone(),
                max: MAX_NODE_HEIGHT,
            });
        }
        node.creatures.push(CreatureInfo::new(name, true, false));
        Ok(())
    }

    /// Records the loss of one creature, which also reveals it.
    pub fn remove_creature(&mut self, id: NodeId, name: &str) -> Result<(), PredictError> {
        let node = self.node(id);
        if node.height() == 0 {
            return Err(PredictError::EmptyLegion {
                markerid: node.markerid.clone(),
                name: name.to_string(),
            });
        }
        self.reveal_creatures(id, &[name])?;

        let node = self.node_mut(id);
        // Prefer a later addition: claiming an at-split loss would assert
        // more than we know.
        let pos = node
            .creatures
            .iter()
            .rposition(|ci| ci.certain && !ci.at_split && ci.name == name)
            .or_else(|| {
                node.creatures
                    .iter()
                    .position(|ci| ci.certain && ci.name == name)
            });
        let Some(pos) = pos else {
            return Err(PredictError::NoSuchCreature {
                markerid: node.markerid.clone(),
                name: name.to_string(),
            });
        };
        let ci = node.creatures.remove(pos);
        if ci.at_split {
            node.removed.push(ci);
        }
        Ok(())
    }

    /// Removes several creatures seen together (e.g. battle losses).
    pub fn remove_creatures<S: AsRef<str>>(
        &mut self,
        id: NodeId,
        names: &[S],
    ) -> Result<(), PredictError> {
        if names.is_empty() {
            return Ok(());
        }
        self.reveal_creatures(id, names)?;
        for name in names {
            self.remove_creature(id, name.as_ref())?;
        }
        Ok(())
    }

    /// One line per leaf.
    pub fn leaves_summary(&self) -> Result<String, PredictError> {
        let mut leaves = self.get_leaves()?;
        leaves.sort_by(|&a, &b| self.node(a).markerid.cmp(&self.node(b).markerid));
        Ok(leaves
            .into_iter()
            .map(|id| self.node(id).to_string())
            .join("\n"))
    }

    /// One line per node, ordered by creation turn then marker.
    pub fn nodes_summary(&self) -> String {
        let mut nodes = self.get_nodes();
        nodes.sort_by(|&a, &b| {
            let (a, b) = (self.node(a), self.node(b));
            (a.turn_created, &a.markerid).cmp(&(b.turn_created, &b.markerid))
        });
        nodes
            .into_iter()
            .map(|id| self.node(id).to_string())
            .join("\n")
    }
}

/// Ensures at least `min` entries named `name` are certain.
fn promote(list: &mut [CreatureInfo], name: &str, min: usize) {
    let mut certain = list
        .iter()
        .filter(|ci| ci.certain && ci.name == name)
        .count();
    for ci in list.iter_mut().filter(|ci| !ci.certain && ci.name == name) {
        if certain >= min {
            break;
        }
        ci.certain = true;
        certain += 1;
    }
}

/// Re-applies a child's post-split history to freshly split contents.
fn restore_post_split(list: &mut Vec<CreatureInfo>, child: &Node) {
    for lost in &child.removed {
        let pos = list
            .iter()
            .position(|ci| ci.certain && ci.name == lost.name)
            .or_else(|| list.iter().position(|ci| ci.name == lost.name));
        if let Some(pos) = pos {
            list.remove(pos);
        }
    }
    list.extend(child.after_split_creatures());
}
