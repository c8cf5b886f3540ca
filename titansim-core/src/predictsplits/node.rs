use super::CreatureInfo;

/// Index of a node in its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

/// A hypothesis about one legion at one point in its split lineage.
#[derive(Debug, Clone)]
pub struct Node {
    pub markerid: String,
    /// Turn this hypothesis came into being; disambiguates reused markers
    pub turn_created: u32,
    pub creatures: Vec<CreatureInfo>,
    /// At-split creatures lost since the split
    pub removed: Vec<CreatureInfo>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Option<(NodeId, NodeId)>,
    pub(crate) child_size2: usize,
    pub(crate) turn_split: Option<u32>,
}

impl Node {
    pub(crate) fn new(
        markerid: impl Into<String>,
        turn_created: u32,
        creatures: Vec<CreatureInfo>,
        parent: Option<NodeId>,
    ) -> Self {
        Self {
            markerid: markerid.into(),
            turn_created,
            creatures,
            removed: Vec::new(),
            parent,
            children: None,
            child_size2: 0,
            turn_split: None,
        }
    }

    /// `Rd01(3)`: marker plus creation turn.
    pub fn full_name(&self) -> String {
        format!("{}({})", self.markerid, self.turn_created)
    }

    pub fn height(&self) -> usize {
        self.creatures.len()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// (kept child, split-off child)
    pub fn children(&self) -> Option<(NodeId, NodeId)> {
        self.children
    }

    pub fn has_split(&self) -> bool {
        self.children.is_some()
    }

    /// Size of the split-off half the last time this node split.
    pub fn child_size2(&self) -> usize {
        self.child_size2
    }

    pub fn turn_split(&self) -> Option<u32> {
        self.turn_split
    }

    pub fn creature_names(&self) -> Vec<String> {
        self.creatures.iter().map(|ci| ci.name.clone()).collect()
    }

    pub fn certain_creatures(&self) -> Vec<&CreatureInfo> {
        self.creatures.iter().filter(|ci| ci.certain).collect()
    }

    pub fn certain_names(&self) -> Vec<String> {
        self.creatures
            .iter()
            .filter(|ci| ci.certain)
            .map(|ci| ci.name.clone())
            .collect()
    }

    /// Names whose membership at split time is settled: certain at-split
    /// creatures still here, plus those removed since.
    pub fn certain_at_split_or_removed_names(&self) -> Vec<String> {
        self.creatures
            .iter()
            .filter(|ci| ci.certain && ci.at_split)
            .chain(self.removed.iter())
            .map(|ci| ci.name.clone())
            .collect()
    }

    /// Creatures added since the split (recruits, summons, acquisitions).
    pub fn after_split_creatures(&self) -> Vec<CreatureInfo> {
        self.creatures
            .iter()
            .filter(|ci| !ci.at_split)
            .cloned()
            .collect()
    }

    pub fn all_certain(&self) -> bool {
        self.creatures.iter().all(|ci| ci.certain)
    }

    pub fn num_uncertain_creatures(&self) -> usize {
        self.creatures.iter().filter(|ci| !ci.certain).count()
    }

    /// A turn-1 split-off: four creatures, exactly one of Titan or Angel.
    pub fn is_legal_initial_splitoff<S: AsRef<str>>(names: &[S]) -> bool {
        names.len() == 4
            && names
                .iter()
                .filter(|n| matches!(n.as_ref(), "Titan" | "Angel"))
                .count()
                == 1
    }

    /// Drops the last uncertain creature; false if all are certain.
    pub(crate) fn remove_last_uncertain_creature(&mut self) -> bool {
        match self.creatures.iter().rposition(|ci| !ci.certain) {
            Some(pos) => {
                self.creatures.remove(pos);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sorted: Vec<&CreatureInfo> = self.creatures.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        write!(f, "{}:", self.full_name())?;
        for ci in sorted {
            write!(f, " {}", ci)?;
        }
        if !self.removed.is_empty() {
            let removed: Vec<&str> = self.removed.iter().map(|ci| ci.name.as_str()).collect();
            write!(f, " (removed: {})", removed.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(entries: &[(&str, bool, bool)]) -> Node {
        let creatures = entries
            .iter()
            .map(|(name, certain, at_split)| CreatureInfo::new(*name, *certain, *at_split))
            .collect();
        Node::new("Rd02", 1, creatures, None)
    }

    #[test]
    fn test_certainty_queries() {
        let n = node(&[
            ("Angel", true, true),
            ("Ogre", false, true),
            ("Lion", true, false),
        ]);
        assert_eq!(n.height(), 3);
        assert!(!n.all_certain());
        assert_eq!(n.num_uncertain_creatures(), 1);
        assert_eq!(n.certain_names(), vec!["Angel", "Lion"]);
        assert_eq!(n.certain_at_split_or_removed_names(), vec!["Angel"]);
        assert_eq!(n.after_split_creatures().len(), 1);
    }

    #[test]
    fn test_removed_counts_as_settled() {
        let mut n = node(&[("Angel", true, true)]);
        n.removed.push(CreatureInfo::new("Ogre", true, true));
        assert_eq!(n.certain_at_split_or_removed_names(), vec!["Angel", "Ogre"]);
    }

    #[test]
    fn test_legal_initial_splitoff() {
        assert!(Node::is_legal_initial_splitoff(&[
            "Titan", "Ogre", "Ogre", "Centaur"
        ]));
        assert!(!Node::is_legal_initial_splitoff(&[
            "Titan", "Angel", "Ogre", "Centaur"
        ]));
        assert!(!Node::is_legal_initial_splitoff(&[
            "Gargoyle", "Ogre", "Ogre", "Centaur"
        ]));
        assert!(!Node::is_legal_initial_splitoff(&["Angel", "Ogre", "Ogre"]));
    }

    #[test]
    fn test_remove_last_uncertain() {
        let mut n = node(&[
            ("Angel", false, true),
            ("Ogre", true, true),
            ("Troll", false, true),
        ]);
        assert!(n.remove_last_uncertain_creature());
        assert_eq!(n.creature_names(), vec!["Angel", "Ogre"]);
        assert!(n.remove_last_uncertain_creature());
        assert!(!n.remove_last_uncertain_creature());
    }

    #[test]
    fn test_display() {
        let mut n = node(&[("Ogre", false, true), ("Angel", true, true)]);
        n.removed.push(CreatureInfo::new("Centaur", true, true));
        assert_eq!(n.to_string(), "Rd02(1): Angel Ogre? (removed: Centaur)");
    }
}
