use crate::action::{Action, HexLabel, MarkerId};
use crate::caretaker::Caretaker;
use crate::config::GameConfig;
use crate::creature::Creature;
use crate::game::GameError;
use crate::legion::Legion;
use std::collections::{BTreeMap, BTreeSet};

/// Legion markers per color.
pub const MARKERS_PER_COLOR: u32 = 12;

/// Two-letter marker prefix for a player color.
pub fn color_abbreviation(color: &str) -> Option<&'static str> {
    Some(match color {
        "Black" => "Bk",
        "Blue" => "Bu",
        "Brown" => "Br",
        "Gold" => "Gd",
        "Green" => "Gr",
        "Red" => "Rd",
        "Indigo" => "In",
        "Orange" => "Or",
        "Purple" => "Pu",
        "Silver" => "Si",
        "Sky" => "Sk",
        "Pine" => "Pi",
        _ => return None,
    })
}

#[derive(Debug, Clone)]
pub struct Player {
    pub name: String,
    pub color: Option<String>,
    pub tower: Option<u32>,
    pub score: u32,
    pub dead: bool,
    pub movement_roll: Option<u8>,
    pub mulligans_left: u8,
    markerids_left: BTreeSet<MarkerId>,
    legions: BTreeMap<MarkerId, Legion>,
}

impl Player {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
            tower: None,
            score: 0,
            dead: false,
            movement_roll: None,
            mulligans_left: 1,
            markerids_left: BTreeSet::new(),
            legions: BTreeMap::new(),
        }
    }

    /// Takes a color and the full set of markers that goes with it.
    pub fn pick_color(&mut self, color: &str) -> Result<(), GameError> {
        let abbrev =
            color_abbreviation(color).ok_or_else(|| GameError::UnknownColor(color.to_string()))?;
        self.color = Some(color.to_string());
        self.markerids_left = (1..=MARKERS_PER_COLOR)
            .map(|n| format!("{}{:02}", abbrev, n))
            .collect();
        Ok(())
    }

    pub fn markerids_left(&self) -> &BTreeSet<MarkerId> {
        &self.markerids_left
    }

    pub fn legions(&self) -> impl Iterator<Item = &Legion> {
        self.legions.values()
    }

    pub fn legions_mut(&mut self) -> impl Iterator<Item = &mut Legion> {
        self.legions.values_mut()
    }

    pub fn num_legions(&self) -> usize {
        self.legions.len()
    }

    pub fn legion(&self, markerid: &str) -> Option<&Legion> {
        self.legions.get(markerid)
    }

    pub fn legion_mut(&mut self, markerid: &str) -> Result<&mut Legion, GameError> {
        self.legions
            .get_mut(markerid)
            .ok_or_else(|| GameError::UnknownLegion(markerid.to_string()))
    }

    pub fn has_titan(&self) -> bool {
        self.legions.values().any(Legion::has_titan)
    }

    fn take_marker(&mut self, markerid: &str) -> Result<(), GameError> {
        if !self.markerids_left.remove(markerid) {
            return Err(GameError::MarkerUnavailable(markerid.to_string()));
        }
        Ok(())
    }

    /// Places the first legion in the player's tower.
    pub fn create_starting_legion(
        &mut self,
        game_name: &str,
        markerid: &str,
        creatures: Vec<Creature>,
        hexlabel: HexLabel,
    ) -> Result<Action, GameError> {
        if !self.legions.is_empty() {
            return Err(GameError::AlreadyStarted(self.name.clone()));
        }
        self.take_marker(markerid)?;
        let legion = Legion::new(markerid, self.name.clone(), creatures, hexlabel);
        let creature_names = legion.creature_names();
        log::debug!("{} starts with {} {:?}", self.name, markerid, creature_names);
        self.legions.insert(markerid.to_string(), legion);
        Ok(Action::CreateStartingLegion {
            game_name: game_name.to_string(),
            playername: self.name.clone(),
            markerid: markerid.to_string(),
            creature_names,
        })
    }

    /// Divides a legion, the split-off half going under `child_markerid`.
    pub fn split_legion(
        &mut self,
        game_name: &str,
        parent_markerid: &str,
        child_markerid: &str,
        parent_creature_names: &[String],
        child_creature_names: &[String],
    ) -> Result<Action, GameError> {
        if !self.markerids_left.contains(child_markerid) {
            return Err(GameError::MarkerUnavailable(child_markerid.to_string()));
        }
        let name = self.name.clone();
        let parent = self
            .legions
            .get_mut(parent_markerid)
            .ok_or_else(|| GameError::UnknownLegion(parent_markerid.to_string()))?;

        // Deal the parent's creatures out by name, in the order given.
        let mut pool: Vec<Creature> = parent.creatures().to_vec();
        let mut deal = |names: &[String]| -> Option<Vec<Creature>> {
            names
                .iter()
                .map(|name| {
                    let pos = pool.iter().position(|c| c.name() == name)?;
                    Some(pool.remove(pos))
                })
                .collect()
        };
        let wrong = || GameError::WrongCreatures {
            markerid: parent_markerid.to_string(),
        };
        let kept = deal(parent_creature_names).ok_or_else(wrong)?;
        let split_off = deal(child_creature_names).ok_or_else(wrong)?;
        if !pool.is_empty() {
            return Err(wrong());
        }

        let mut kept = Legion::new(parent_markerid, name.clone(), kept, parent.hexlabel);
        let split_off = Legion::new(child_markerid, name, split_off, parent.hexlabel);
        if !parent.is_legal_split(&kept, &split_off) {
            return Err(GameError::IllegalSplit {
                markerid: parent_markerid.to_string(),
            });
        }
        parent.replace_creatures(kept.take_all());

        self.markerids_left.remove(child_markerid);
        self.legions.insert(child_markerid.to_string(), split_off);
        log::debug!(
            "{} split {} off {}",
            self.name,
            child_markerid,
            parent_markerid
        );

        Ok(Action::SplitLegion {
            game_name: game_name.to_string(),
            playername: self.name.clone(),
            parent_markerid: parent_markerid.to_string(),
            child_markerid: child_markerid.to_string(),
            parent_creature_names: parent_creature_names.to_vec(),
            child_creature_names: child_creature_names.to_vec(),
        })
    }

    /// Folds `child_markerid` back into `parent_markerid` and frees its marker.
    /// Returns both legions' creature names from before the fold.
    fn recombine(
        &mut self,
        parent_markerid: &str,
        child_markerid: &str,
    ) -> Result<(Vec<String>, Vec<String>), GameError> {
        if !self.legions.contains_key(parent_markerid) {
            return Err(GameError::UnknownLegion(parent_markerid.to_string()));
        }
        let mut child = self
            .legions
            .remove(child_markerid)
            .ok_or_else(|| GameError::UnknownLegion(child_markerid.to_string()))?;
        let child_names = child.creature_names();
        let parent = self.legion_mut(parent_markerid)?;
        let parent_names = parent.creature_names();
        for creature in child.take_all() {
            parent.push(creature);
        }
        self.markerids_left.insert(child_markerid.to_string());
        Ok((parent_names, child_names))
    }

    pub fn undo_split(
        &mut self,
        game_name: &str,
        parent_markerid: &str,
        child_markerid: &str,
    ) -> Result<Action, GameError> {
        let (parent_creature_names, child_creature_names) =
            self.recombine(parent_markerid, child_markerid)?;
        Ok(Action::UndoSplit {
            game_name: game_name.to_string(),
            playername: self.name.clone(),
            parent_markerid: parent_markerid.to_string(),
            child_markerid: child_markerid.to_string(),
            parent_creature_names,
            child_creature_names,
        })
    }

    /// Recombines two legions that share a hex, e.g. when a split half
    /// could not move.
    pub fn merge_legions(
        &mut self,
        game_name: &str,
        parent_markerid: &str,
        child_markerid: &str,
    ) -> Result<Action, GameError> {
        let (parent_creature_names, child_creature_names) =
            self.recombine(parent_markerid, child_markerid)?;
        Ok(Action::MergeLegions {
            game_name: game_name.to_string(),
            playername: self.name.clone(),
            parent_markerid: parent_markerid.to_string(),
            child_markerid: child_markerid.to_string(),
            parent_creature_names,
            child_creature_names,
        })
    }

    pub fn roll_movement(&mut self, game_name: &str, movement_roll: u8, mulligans_left: u8) -> Action {
        self.movement_roll = Some(movement_roll);
        self.mulligans_left = mulligans_left;
        Action::RollMovement {
            game_name: game_name.to_string(),
            playername: self.name.clone(),
            movement_roll,
            mulligans_left,
        }
    }

    /// Adds to the score; when a legion earned the points, credits its
    /// angel acquisitions too.
    pub fn add_points(
        &mut self,
        points: u32,
        markerid: Option<&str>,
        config: &GameConfig,
    ) -> Result<(u32, u32), GameError> {
        let before = self.score;
        self.score += points;
        match markerid {
            Some(markerid) => Ok(self.legion_mut(markerid)?.add_points(before, points, config)),
            None => Ok((0, 0)),
        }
    }

    /// Removes a dead legion and returns its marker.
    pub fn remove_legion(&mut self, markerid: &str) -> Option<Legion> {
        let legion = self.legions.remove(markerid)?;
        self.markerids_left.insert(markerid.to_string());
        Some(legion)
    }

    pub fn reset_turn(&mut self) {
        self.movement_roll = None;
        for legion in self.legions.values_mut() {
            legion.reset_turn();
        }
    }

    /// Eliminates the player. Every remaining legion dies; the killer, if
    /// any, earns half their value. Returns (points for the killer, action).
    pub fn die(
        &mut self,
        game_name: &str,
        killer: Option<&str>,
        caretaker: &mut Caretaker,
    ) -> Result<(u32, Action), GameError> {
        let mut points = 0;
        let markerids: Vec<MarkerId> = self.legions.keys().cloned().collect();
        for markerid in markerids {
            if let Some(mut legion) = self.remove_legion(&markerid) {
                points += legion.die(caretaker)?.0;
            }
        }
        self.dead = true;
        log::info!("Player {} eliminated", self.name);
        Ok((
            points / 2,
            Action::EliminatePlayer {
                game_name: game_name.to_string(),
                winner_playername: killer.unwrap_or_default().to_string(),
                loser_playername: self.name.clone(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use titandata::{CreatureTable, STARTING_CREATURES};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn started() -> (Player, Caretaker) {
        let table = CreatureTable::builtin().unwrap();
        let mut caretaker = Caretaker::from_table(&table);
        let mut player = Player::new("p0");
        player.pick_color("Red").unwrap();
        let creatures = STARTING_CREATURES
            .iter()
            .map(|n| {
                caretaker.take_one(n).unwrap();
                Creature::from_table(&table, n).unwrap()
            })
            .collect();
        player
            .create_starting_legion("g", "Rd01", creatures, 100)
            .unwrap();
        (player, caretaker)
    }

    fn split_turn1(player: &mut Player) -> Action {
        player
            .split_legion(
                "g",
                "Rd01",
                "Rd02",
                &names(&["Titan", "Centaur", "Gargoyle", "Gargoyle"]),
                &names(&["Angel", "Centaur", "Ogre", "Ogre"]),
            )
            .unwrap()
    }

    #[test]
    fn test_pick_color_assigns_markers() {
        let mut player = Player::new("p0");
        player.pick_color("Blue").unwrap();
        assert_eq!(player.markerids_left().len(), 12);
        assert!(player.markerids_left().contains("Bu01"));
        assert!(player.markerids_left().contains("Bu12"));
        assert!(matches!(
            player.pick_color("Plaid"),
            Err(GameError::UnknownColor(_))
        ));
    }

    #[test]
    fn test_starting_legion() {
        let (mut player, _) = started();
        assert_eq!(player.num_legions(), 1);
        assert_eq!(player.legion("Rd01").unwrap().height(), 8);
        assert!(!player.markerids_left().contains("Rd01"));
        assert!(matches!(
            player.create_starting_legion("g", "Rd02", vec![], 100),
            Err(GameError::AlreadyStarted(_))
        ));
    }

    #[test]
    fn test_split_legion() {
        let (mut player, _) = started();
        let action = split_turn1(&mut player);
        assert!(matches!(action, Action::SplitLegion { .. }));
        assert_eq!(player.legion("Rd01").unwrap().creature_names(), names(&["Titan", "Centaur", "Gargoyle", "Gargoyle"]));
        let rd02 = player.legion("Rd02").unwrap();
        assert_eq!(rd02.height(), 4);
        assert_eq!(rd02.hexlabel, 100);
        assert!(!player.markerids_left().contains("Rd02"));
    }

    #[test]
    fn test_split_rejects_bad_requests() {
        let (mut player, _) = started();
        let keep = names(&["Titan", "Centaur", "Gargoyle", "Gargoyle"]);
        let split = names(&["Angel", "Centaur", "Ogre", "Ogre"]);
        assert!(matches!(
            player.split_legion("g", "Rd01", "Bu02", &keep, &split),
            Err(GameError::MarkerUnavailable(_))
        ));
        assert!(matches!(
            player.split_legion("g", "Rd01", "Rd02", &keep, &names(&["Angel", "Troll", "Ogre", "Ogre"])),
            Err(GameError::WrongCreatures { .. })
        ));
        assert!(matches!(
            player.split_legion(
                "g",
                "Rd01",
                "Rd02",
                &names(&["Titan", "Angel", "Gargoyle", "Gargoyle"]),
                &names(&["Centaur", "Centaur", "Ogre", "Ogre"]),
            ),
            Err(GameError::IllegalSplit { .. })
        ));
        // Nothing changed.
        assert_eq!(player.legion("Rd01").unwrap().height(), 8);
        assert!(player.markerids_left().contains("Rd02"));
    }

    #[test]
    fn test_undo_split_pairs_with_split() {
        let (mut player, _) = started();
        let split = split_turn1(&mut player);
        let undo = player.undo_split("g", "Rd01", "Rd02").unwrap();
        assert_eq!(split.undo_action(), Some(undo));
        assert_eq!(player.legion("Rd01").unwrap().height(), 8);
        assert!(player.legion("Rd02").is_none());
        assert!(player.markerids_left().contains("Rd02"));
    }

    #[test]
    fn test_merge_legions() {
        let (mut player, _) = started();
        split_turn1(&mut player);
        let action = player.merge_legions("g", "Rd01", "Rd02").unwrap();
        assert!(matches!(action, Action::MergeLegions { .. }));
        assert_eq!(player.num_legions(), 1);
        assert!(matches!(
            player.merge_legions("g", "Rd01", "Rd02"),
            Err(GameError::UnknownLegion(_))
        ));
    }

    #[test]
    fn test_roll_and_points() {
        let (mut player, _) = started();
        let action = player.roll_movement("g", 4, 0);
        assert_eq!(player.movement_roll, Some(4));
        assert!(matches!(action, Action::RollMovement { movement_roll: 4, .. }));

        split_turn1(&mut player);
        let config = GameConfig::default();
        assert_eq!(player.add_points(120, Some("Rd02"), &config).unwrap(), (1, 0));
        assert_eq!(player.score, 120);
        assert_eq!(player.add_points(10, None, &config).unwrap(), (0, 0));
        assert_eq!(player.score, 130);
    }

    #[test]
    fn test_die_kills_everything() {
        let (mut player, mut caretaker) = started();
        split_turn1(&mut player);
        let (points, action) = player.die("g", Some("p1"), &mut caretaker).unwrap();
        assert!(player.dead);
        assert_eq!(player.num_legions(), 0);
        // Titan, Angel and each pair are worth 24 apiece: 120, halved.
        assert_eq!(points, 60);
        assert_eq!(
            action,
            Action::EliminatePlayer {
                game_name: "g".into(),
                winner_playername: "p1".into(),
                loser_playername: "p0".into(),
            }
        );
        assert_eq!(caretaker.num_dead("Ogre"), 2);
    }
}
