use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Built-in creature table for the standard game.
const BUILTIN_CSV: &str = include_str!("../data/creatures.csv");

/// Contents of every player's first legion, before the turn-1 split.
pub const STARTING_CREATURES: [&str; 8] = [
    "Titan", "Angel", "Ogre", "Ogre", "Centaur", "Centaur", "Gargoyle", "Gargoyle",
];

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Duplicate creature name: {0}")]
    Duplicate(String),
    #[error("Invalid creature {name}: {reason}")]
    Invalid { name: String, reason: String },
}

/// Rank of a creature in the summoning / legality rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterType {
    Lord,
    Demilord,
    Creature,
}

/// One row of the creature table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatureType {
    pub name: String,
    pub plural_name: String,
    pub power: u32,
    pub skill: u32,
    pub rangestrikes: bool,
    pub flies: bool,
    pub character_type: CharacterType,
    pub summonable: bool,
    /// Points needed per acquisition (0 = not acquirable)
    pub acquirable_every: u32,
    /// Total number of this creature in the caretaker's stacks
    pub max_count: u32,
}

impl CreatureType {
    /// Points awarded for killing one of these.
    pub fn score(&self) -> u32 {
        self.power * self.skill
    }

    /// Rough recruiting value, used to rank candidate splits.
    ///
    /// Integer-scaled so that ties are exact and ordering is deterministic.
    pub fn sort_value(&self) -> u32 {
        let mut value = 100 * self.power * self.skill;
        if self.flies {
            value += 30;
        }
        if self.rangestrikes {
            value += 25;
        }
        if self.acquirable_every > 0 {
            value += 20;
        }
        if self.skill == 4 {
            value += 15;
        }
        if self.is_titan() {
            value += 10_000;
        }
        value
    }

    pub fn is_lord(&self) -> bool {
        self.character_type == CharacterType::Lord
    }

    pub fn is_titan(&self) -> bool {
        self.name == "Titan"
    }
}

/// Name-indexed creature table.
#[derive(Debug, Clone, Default)]
pub struct CreatureTable {
    by_name: BTreeMap<String, Arc<CreatureType>>,
}

impl CreatureTable {
    /// The standard creature set, parsed from the embedded CSV.
    pub fn builtin() -> Result<Self, DataError> {
        Self::from_reader(BUILTIN_CSV.as_bytes())
    }

    /// Loads a creature table from a CSV file on disk.
    pub fn load_csv(path: &Path) -> Result<Self, DataError> {
        log::info!("Loading creature table from {:?}", path);
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Parses headerless CSV rows; `#` starts a comment line.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DataError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut by_name = BTreeMap::new();
        for result in reader.deserialize() {
            let creature: CreatureType = result?;
            if creature.name.is_empty() {
                return Err(DataError::Invalid {
                    name: creature.plural_name,
                    reason: "empty name".to_string(),
                });
            }
            if creature.power == 0 || creature.skill == 0 {
                return Err(DataError::Invalid {
                    name: creature.name,
                    reason: "power and skill must be positive".to_string(),
                });
            }
            if by_name.contains_key(&creature.name) {
                return Err(DataError::Duplicate(creature.name));
            }
            by_name.insert(creature.name.clone(), Arc::new(creature));
        }
        log::debug!("Loaded {} creature types", by_name.len());
        Ok(Self { by_name })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<CreatureType>> {
        self.by_name.get(name)
    }

    /// Sort value by name; unknown names rank lowest.
    pub fn sort_value(&self, name: &str) -> u32 {
        match self.by_name.get(name) {
            Some(creature) => creature.sort_value(),
            None => {
                log::warn!("No creature type named {}, using sort value 0", name);
                0
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Creature types in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<CreatureType>> {
        self.by_name.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_table_loads() {
        let table = CreatureTable::builtin().unwrap();
        assert_eq!(table.len(), 24);
        for name in STARTING_CREATURES {
            assert!(table.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_character_types() {
        let table = CreatureTable::builtin().unwrap();
        assert!(table.get("Titan").unwrap().is_lord());
        assert!(table.get("Angel").unwrap().is_lord());
        assert_eq!(
            table.get("Guardian").unwrap().character_type,
            CharacterType::Demilord
        );
        assert!(!table.get("Ogre").unwrap().is_lord());
    }

    #[test]
    fn test_sort_values_rank_starting_creatures() {
        let table = CreatureTable::builtin().unwrap();
        let ogre = table.sort_value("Ogre");
        let centaur = table.sort_value("Centaur");
        let gargoyle = table.sort_value("Gargoyle");
        assert_eq!(ogre, 1200);
        assert!(ogre < centaur);
        assert!(centaur < gargoyle);
        assert!(table.sort_value("Angel") < table.sort_value("Titan"));
        assert_eq!(table.sort_value("Nonexistent"), 0);
    }

    #[test]
    fn test_score_is_power_times_skill() {
        let table = CreatureTable::builtin().unwrap();
        assert_eq!(table.get("Serpent").unwrap().score(), 36);
        assert_eq!(table.get("Angel").unwrap().score(), 24);
    }

    #[test]
    fn test_duplicate_rejected() {
        let csv = "Ogre,Ogres,6,2,false,false,creature,false,0,25\n\
                   Ogre,Ogres,6,2,false,false,creature,false,0,25\n";
        let result = CreatureTable::from_reader(csv.as_bytes());
        assert!(matches!(result, Err(DataError::Duplicate(name)) if name == "Ogre"));
    }

    #[test]
    fn test_zero_power_rejected() {
        let csv = "Wisp,Wisps,0,2,false,true,creature,false,0,5\n";
        let result = CreatureTable::from_reader(csv.as_bytes());
        assert!(matches!(result, Err(DataError::Invalid { .. })));
    }

    #[test]
    fn test_load_csv_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# custom set").unwrap();
        writeln!(file, "Titan,Titans,6,4,false,false,lord,false,0,6").unwrap();
        writeln!(file, "Troll,Trolls,8,2,false,false,creature,false,0,28").unwrap();
        let table = CreatureTable::load_csv(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("Troll").unwrap().max_count, 28);
    }
}
