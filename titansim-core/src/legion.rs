//! A stack of creatures under one marker, as the server knows it.

use crate::action::{Action, HexLabel, MarkerId};
use crate::caretaker::{Caretaker, CaretakerError};
use crate::config::GameConfig;
use crate::creature::Creature;
use crate::game::GameError;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Legion {
    pub markerid: MarkerId,
    pub playername: String,
    creatures: Vec<Creature>,
    pub hexlabel: HexLabel,
    pub previous_hexlabel: Option<HexLabel>,
    pub moved: bool,
    pub teleported: bool,
    pub entry_side: Option<u8>,
    /// This turn's recruit and its recruiters, if any.
    recruited: Option<(String, Vec<String>)>,
    pub angels_pending: u32,
    pub archangels_pending: u32,
}

impl Legion {
    pub fn new(
        markerid: impl Into<MarkerId>,
        playername: impl Into<String>,
        creatures: Vec<Creature>,
        hexlabel: HexLabel,
    ) -> Self {
        Self {
            markerid: markerid.into(),
            playername: playername.into(),
            creatures,
            hexlabel,
            previous_hexlabel: None,
            moved: false,
            teleported: false,
            entry_side: None,
            recruited: None,
            angels_pending: 0,
            archangels_pending: 0,
        }
    }

    pub fn height(&self) -> usize {
        self.creatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creatures.is_empty()
    }

    pub fn creatures(&self) -> &[Creature] {
        &self.creatures
    }

    pub fn creature_names(&self) -> Vec<String> {
        self.creatures.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn has_titan(&self) -> bool {
        self.creatures.iter().any(Creature::is_titan)
    }

    pub fn num_lords(&self) -> usize {
        self.creatures.iter().filter(|c| c.is_lord()).count()
    }

    /// Points for killing the whole legion.
    pub fn score(&self) -> u32 {
        self.creatures.iter().map(Creature::score).sum()
    }

    pub fn recruited(&self) -> Option<&str> {
        self.recruited.as_ref().map(|(name, _)| name.as_str())
    }

    pub fn can_recruit(&self, max_height: usize) -> bool {
        self.recruited.is_none() && self.height() < max_height
    }

    /// Checks that `child1` and `child2` are a legal division of this legion.
    pub fn is_legal_split(&self, child1: &Legion, child2: &Legion) -> bool {
        if self.height() < 4 {
            return false;
        }
        if child1.height() + child2.height() != self.height() {
            return false;
        }
        if child1.height() < 2 || child2.height() < 2 {
            return false;
        }
        let mut combined = child1.creature_names();
        combined.extend(child2.creature_names());
        combined.sort();
        let mut mine = self.creature_names();
        mine.sort();
        if combined != mine {
            return false;
        }
        if self.height() == 8 {
            // The starting stack splits evenly, one lord per half.
            return child1.height() == 4
                && child2.height() == 4
                && child1.num_lords() == 1
                && child2.num_lords() == 1;
        }
        true
    }

    pub(crate) fn push(&mut self, creature: Creature) {
        self.creatures.push(creature);
    }

    /// Removes the last creature called `name`.
    pub(crate) fn remove_creature(&mut self, name: &str) -> Result<Creature, GameError> {
        let pos = self
            .creatures
            .iter()
            .rposition(|c| c.name() == name)
            .ok_or_else(|| GameError::NoSuchCreature {
                markerid: self.markerid.clone(),
                name: name.to_string(),
            })?;
        Ok(self.creatures.remove(pos))
    }

    pub(crate) fn replace_creatures(&mut self, creatures: Vec<Creature>) {
        self.creatures = creatures;
    }

    pub(crate) fn take_all(&mut self) -> Vec<Creature> {
        std::mem::take(&mut self.creatures)
    }

    /// Adds a recruit from the caretaker.
    ///
    /// Repeating this turn's recruit is a no-op and returns `Ok(false)`.
    pub fn recruit(
        &mut self,
        creature: Creature,
        recruiter_names: &[String],
        caretaker: &mut Caretaker,
        max_height: usize,
    ) -> Result<bool, GameError> {
        if let Some((name, recruiters)) = &self.recruited {
            if name == creature.name() && recruiters.as_slice() == recruiter_names {
                log::debug!("{} already recruited {}", self.markerid, name);
                return Ok(false);
            }
            return Err(GameError::AlreadyRecruited {
                markerid: self.markerid.clone(),
                name: name.clone(),
            });
        }
        if self.height() >= max_height {
            return Err(GameError::TooTall {
                markerid: self.markerid.clone(),
                max: max_height,
            });
        }
        let mut available: BTreeMap<&str, usize> = BTreeMap::new();
        for c in &self.creatures {
            *available.entry(c.name()).or_insert(0) += 1;
        }
        for name in recruiter_names {
            match available.get_mut(name.as_str()) {
                Some(n) if *n > 0 => *n -= 1,
                _ => {
                    return Err(GameError::NoSuchCreature {
                        markerid: self.markerid.clone(),
                        name: name.clone(),
                    })
                }
            }
        }

        caretaker.take_one(creature.name())?;
        self.recruited = Some((creature.name().to_string(), recruiter_names.to_vec()));
        self.creatures.push(creature);
        Ok(true)
    }

    /// Returns this turn's recruit to the caretaker; a no-op if there is none.
    pub fn undo_recruit(&mut self, caretaker: &mut Caretaker) -> Result<Option<String>, GameError> {
        let Some(name) = self.recruited().map(str::to_string) else {
            return Ok(None);
        };
        self.remove_creature(&name)?;
        caretaker.put_one_back(&name)?;
        self.recruited = None;
        Ok(Some(name))
    }

    pub fn move_to(&mut self, hexlabel: HexLabel, entry_side: u8, teleport: bool) {
        self.previous_hexlabel = Some(self.hexlabel);
        self.hexlabel = hexlabel;
        self.entry_side = Some(entry_side);
        self.teleported = teleport;
        self.moved = true;
    }

    pub fn undo_move(&mut self) {
        if !self.moved {
            return;
        }
        if let Some(previous) = self.previous_hexlabel.take() {
            self.hexlabel = previous;
        }
        self.entry_side = None;
        self.teleported = false;
        self.moved = false;
    }

    /// Clears per-turn movement and muster state.
    pub fn reset_turn(&mut self) {
        self.moved = false;
        self.teleported = false;
        self.entry_side = None;
        self.previous_hexlabel = None;
        self.recruited = None;
    }

    /// Credits acquisitions for the owner's score moving from `before` to
    /// `before + points`. Returns the new (angels, archangels) entitlement.
    ///
    /// Each `angel_points` threshold crossed earns one acquisition; crossing
    /// an `archangel_points` threshold upgrades one of them. Acquisitions
    /// never exceed the room left in the legion.
    pub fn add_points(&mut self, before: u32, points: u32, config: &GameConfig) -> (u32, u32) {
        if config.angel_points == 0 || points == 0 {
            return (0, 0);
        }
        let after = before + points;
        let mut total = after / config.angel_points - before / config.angel_points;
        let mut archangels = if config.archangel_points == 0 {
            0
        } else {
            (after / config.archangel_points - before / config.archangel_points).min(total)
        };
        let room = config.max_legion_height.saturating_sub(
            self.height() + (self.angels_pending + self.archangels_pending) as usize,
        ) as u32;
        total = total.min(room);
        archangels = archangels.min(total);
        let angels = total - archangels;
        self.angels_pending += angels;
        self.archangels_pending += archangels;
        (angels, archangels)
    }

    /// Takes pending acquisitions from the caretaker.
    ///
    /// An archangel entitlement may be spent on an angel instead. Nothing
    /// changes unless every creature can be acquired.
    pub fn acquire_angels(
        &mut self,
        creatures: Vec<Creature>,
        caretaker: &mut Caretaker,
        max_height: usize,
    ) -> Result<(), GameError> {
        if self.height() + creatures.len() > max_height {
            return Err(GameError::TooTall {
                markerid: self.markerid.clone(),
                max: max_height,
            });
        }
        let mut angels = self.angels_pending;
        let mut archangels = self.archangels_pending;
        let mut wanted: BTreeMap<&str, u32> = BTreeMap::new();
        for creature in &creatures {
            let name = creature.name();
            if name == "Archangel" && archangels > 0 {
                archangels -= 1;
            } else if name == "Angel" && angels > 0 {
                angels -= 1;
            } else if name == "Angel" && archangels > 0 {
                archangels -= 1;
            } else {
                return Err(GameError::CannotAcquire {
                    markerid: self.markerid.clone(),
                    name: name.to_string(),
                });
            }
            *wanted.entry(name).or_insert(0) += 1;
        }
        for (name, count) in &wanted {
            if caretaker.num_left(name) < *count {
                return Err(CaretakerError::Exhausted(name.to_string()).into());
            }
        }

        for creature in creatures {
            caretaker.take_one(creature.name())?;
            self.creatures.push(creature);
        }
        self.angels_pending = angels;
        self.archangels_pending = archangels;
        Ok(())
    }

    pub fn clear_acquisitions(&mut self) {
        self.angels_pending = 0;
        self.archangels_pending = 0;
    }

    /// Shows the legion's contents to everyone.
    pub fn reveal(&self, game_name: &str) -> Action {
        Action::RevealLegion {
            game_name: game_name.to_string(),
            markerid: self.markerid.clone(),
            creature_names: self.creature_names(),
        }
    }

    /// Sends every creature to the caretaker. Returns (points, had titan).
    pub fn die(&mut self, caretaker: &mut Caretaker) -> Result<(u32, bool), GameError> {
        let points = self.score();
        let had_titan = self.has_titan();
        for creature in self.take_all() {
            caretaker.kill_one(creature.name())?;
        }
        self.clear_acquisitions();
        log::debug!("Legion {} died", self.markerid);
        Ok((points, had_titan))
    }
}
