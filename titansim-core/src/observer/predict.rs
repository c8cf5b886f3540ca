//! Observer that feeds the action stream into split prediction.
//!
//! The predictor sees the game the way one player does: it tracks every
//! other player's starting legions (or everyone's, when no viewer is set)
//! and folds splits, recruits, reveals and battle results into the
//! [`AllPredictSplits`] trees. A [`PredictorHandle`] reads the trees while
//! the observer itself is owned by the game.

use super::{GameObserver, ObserverError};
use crate::action::Action;
use crate::predictsplits::{AllPredictSplits, PredictError, PredictSplits};
use std::sync::{Arc, Mutex, MutexGuard};
use titandata::CreatureTable;

#[derive(Debug)]
struct PredictorState {
    aps: AllPredictSplits,
    turn: u32,
}

pub struct SplitPredictor {
    viewer: Option<String>,
    creature_table: Arc<CreatureTable>,
    check: bool,
    state: Arc<Mutex<PredictorState>>,
}

/// Read access to a [`SplitPredictor`]'s trees.
#[derive(Clone)]
pub struct PredictorHandle {
    state: Arc<Mutex<PredictorState>>,
}

fn lock(state: &Mutex<PredictorState>) -> Result<MutexGuard<'_, PredictorState>, ObserverError> {
    state
        .lock()
        .map_err(|_| ObserverError::Lock("SplitPredictor state lock poisoned".into()))
}

impl SplitPredictor {
    /// Predicts for `viewer`; `None` tracks every player.
    pub fn new(viewer: Option<String>, creature_table: Arc<CreatureTable>) -> Self {
        Self {
            viewer,
            creature_table,
            check: true,
            state: Arc::new(Mutex::new(PredictorState {
                aps: AllPredictSplits::new(),
                turn: 1,
            })),
        }
    }

    /// Whether to verify the trees after every action.
    pub fn with_check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    pub fn handle(&self) -> PredictorHandle {
        PredictorHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn tracks(&self, playername: &str) -> bool {
        self.viewer.as_deref() != Some(playername)
    }

    fn update(&self, state: &mut PredictorState, action: &Action) -> Result<(), PredictError> {
        let turn = state.turn;
        let aps = &mut state.aps;
        match action {
            Action::CreateStartingLegion {
                playername,
                markerid,
                creature_names,
                ..
            } if self.tracks(playername) => {
                aps.push(PredictSplits::new(
                    playername.clone(),
                    markerid.clone(),
                    creature_names.as_slice(),
                    Arc::clone(&self.creature_table),
                ));
            }
            Action::StartSplitPhase { turn, .. }
            | Action::StartMovePhase { turn, .. }
            | Action::StartFightPhase { turn, .. }
            | Action::StartMusterPhase { turn, .. } => {
                state.turn = *turn;
            }
            Action::SplitLegion {
                parent_markerid,
                child_markerid,
                child_creature_names,
                ..
            } => {
                aps.split(parent_markerid, child_creature_names.len(), child_markerid, turn)?;
            }
            Action::UndoSplit {
                parent_markerid,
                child_markerid,
                ..
            }
            | Action::MergeLegions {
                parent_markerid,
                child_markerid,
                ..
            } => {
                aps.merge(parent_markerid, child_markerid, turn)?;
            }
            Action::RecruitCreature {
                markerid,
                creature_name,
                recruiter_names,
                ..
            } => {
                aps.reveal(markerid, recruiter_names.as_slice())?;
                aps.add_creature(markerid, creature_name)?;
            }
            Action::UndoRecruit {
                markerid,
                creature_name,
                ..
            } => {
                aps.remove_creature(markerid, creature_name)?;
            }
            Action::SummonAngel {
                markerid,
                donor_markerid,
                creature_name,
                ..
            } => {
                aps.remove_creature(donor_markerid, creature_name)?;
                aps.add_creature(markerid, creature_name)?;
            }
            Action::UnsummonAngel {
                markerid,
                donor_markerid,
                creature_name,
                ..
            } => {
                aps.remove_creature(markerid, creature_name)?;
                aps.add_creature(donor_markerid, creature_name)?;
            }
            Action::AcquireAngels {
                markerid,
                angel_names,
                ..
            } => {
                for name in angel_names {
                    aps.add_creature(markerid, name)?;
                }
            }
            Action::RevealLegion {
                markerid,
                creature_names,
                ..
            } => {
                aps.reveal(markerid, creature_names.as_slice())?;
            }
            Action::BattleOver {
                winner_markerid,
                winner_creature_names,
                winner_losses,
                loser_markerid,
                loser_creature_names,
                loser_losses,
                ..
            } => {
                aps.reveal(winner_markerid, winner_creature_names.as_slice())?;
                aps.reveal(loser_markerid, loser_creature_names.as_slice())?;
                aps.remove_creatures(winner_markerid, winner_losses.as_slice())?;
                aps.remove_creatures(loser_markerid, loser_losses.as_slice())?;
            }
            Action::EliminatePlayer {
                loser_playername, ..
            } => {
                aps.remove_player(loser_playername);
            }
            Action::Withdraw { playername, .. } => {
                aps.remove_player(playername);
            }
            _ => {}
        }
        if self.check {
            state.aps.check()?;
        }
        Ok(())
    }
}

impl GameObserver for SplitPredictor {
    fn on_action(&self, action: &Action) -> Result<(), ObserverError> {
        let mut state = lock(&self.state)?;
        self.update(&mut state, action)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "SplitPredictor"
    }

    fn on_shutdown(&self) {
        if let Ok(state) = self.state.lock() {
            log::debug!("SplitPredictor tracked {} trees", state.aps.len());
        }
    }
}

impl PredictorHandle {
    /// Every tracked leaf, one per line.
    pub fn leaves_summary(&self) -> Result<String, ObserverError> {
        Ok(lock(&self.state)?.aps.leaves_summary()?)
    }

    /// (all predicted names, certain names) of the leaf carrying `markerid`.
    pub fn leaf_names(
        &self,
        markerid: &str,
    ) -> Result<Option<(Vec<String>, Vec<String>)>, ObserverError> {
        let state = lock(&self.state)?;
        Ok(state
            .aps
            .get_leaf(markerid)?
            .map(|node| (node.creature_names(), node.certain_names())))
    }

    pub fn num_trees(&self) -> Result<usize, ObserverError> {
        Ok(lock(&self.state)?.aps.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Game;
    use crate::testing::GameBuilder;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn sorted(mut names: Vec<String>) -> Vec<String> {
        names.sort();
        names
    }

    fn table() -> Arc<CreatureTable> {
        Arc::new(CreatureTable::builtin().unwrap())
    }

    #[test]
    fn test_viewer_legions_not_tracked() {
        let predictor = SplitPredictor::new(Some("p0".into()), table());
        let handle = predictor.handle();
        let game = GameBuilder::new("g")
            .with_player("p0", "Red")
            .with_player("p1", "Blue")
            .with_observer(Box::new(predictor))
            .with_starting_legions()
            .build()
            .unwrap();
        assert_eq!(game.players().len(), 2);
        assert_eq!(handle.num_trees().unwrap(), 1);
        assert!(handle.leaf_names("Rd01").unwrap().is_none());
        let (all, certain) = handle.leaf_names("Bu01").unwrap().unwrap();
        assert_eq!(all.len(), 8);
        assert_eq!(certain.len(), 8);
    }

    #[test]
    fn test_split_recruit_and_battle() {
        let predictor = SplitPredictor::new(None, table());
        let handle = predictor.handle();
        let mut game = GameBuilder::new("g")
            .with_player("p0", "Red")
            .with_player("p1", "Blue")
            .with_observer(Box::new(predictor))
            .with_starting_legions()
            .build()
            .unwrap();

        game.apply(&Action::SplitLegion {
            game_name: "g".into(),
            playername: "p0".into(),
            parent_markerid: "Rd01".into(),
            child_markerid: "Rd02".into(),
            parent_creature_names: names(&["Titan", "Centaur", "Gargoyle", "Gargoyle"]),
            child_creature_names: names(&["Angel", "Centaur", "Ogre", "Ogre"]),
        })
        .unwrap();
        let (all, certain) = handle.leaf_names("Rd02").unwrap().unwrap();
        assert_eq!(all.len(), 4);
        assert!(certain.is_empty());

        game.apply(&Action::RecruitCreature {
            game_name: "g".into(),
            playername: "p0".into(),
            markerid: "Rd02".into(),
            creature_name: "Troll".into(),
            recruiter_names: names(&["Ogre", "Ogre"]),
        })
        .unwrap();
        let (all, certain) = handle.leaf_names("Rd02").unwrap().unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(sorted(certain), names(&["Ogre", "Ogre", "Troll"]));

        // The whole of Rd02 is revealed in battle; Rd01 follows by elimination.
        game.apply(&Action::BattleOver {
            game_name: "g".into(),
            hexlabel: 6,
            winner_playername: "p0".into(),
            winner_markerid: "Rd02".into(),
            winner_creature_names: names(&["Angel", "Centaur", "Ogre", "Ogre", "Troll"]),
            winner_losses: names(&["Ogre"]),
            loser_playername: "p1".into(),
            loser_markerid: "Bu01".into(),
            loser_creature_names: names(&[
                "Titan", "Angel", "Centaur", "Centaur", "Gargoyle", "Gargoyle", "Ogre", "Ogre",
            ]),
            loser_losses: names(&["Ogre"]),
            fled: false,
            mutual: false,
        })
        .unwrap();
        let (all, certain) = handle.leaf_names("Rd02").unwrap().unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(certain.len(), 4);
        let (_, certain) = handle.leaf_names("Rd01").unwrap().unwrap();
        assert_eq!(
            sorted(certain),
            names(&["Centaur", "Gargoyle", "Gargoyle", "Titan"])
        );
        assert_eq!(handle.leaves_summary().unwrap().lines().count(), 3);
    }

    fn tracked_game() -> (Game, PredictorHandle) {
        let predictor = SplitPredictor::new(None, table());
        let handle = predictor.handle();
        let game = GameBuilder::new("g")
            .with_player("p0", "Red")
            .with_player("p1", "Blue")
            .with_observer(Box::new(predictor))
            .with_starting_legions()
            .build()
            .unwrap();
        (game, handle)
    }

    fn red_split() -> Action {
        Action::SplitLegion {
            game_name: "g".into(),
            playername: "p0".into(),
            parent_markerid: "Rd01".into(),
            child_markerid: "Rd02".into(),
            parent_creature_names: names(&["Titan", "Centaur", "Gargoyle", "Gargoyle"]),
            child_creature_names: names(&["Angel", "Centaur", "Ogre", "Ogre"]),
        }
    }

    fn assert_whole_starting_legion(handle: &PredictorHandle) {
        assert!(handle.leaf_names("Rd02").unwrap().is_none());
        let (all, certain) = handle.leaf_names("Rd01").unwrap().unwrap();
        assert_eq!(all.len(), 8);
        assert_eq!(certain.len(), 8);
    }

    #[test]
    fn test_undo_split_and_merge_restore_parent() {
        let (mut game, handle) = tracked_game();
        let split = red_split();
        game.apply(&split).unwrap();
        game.apply(&split.undo_action().unwrap()).unwrap();
        assert_whole_starting_legion(&handle);

        game.apply(&split).unwrap();
        assert_eq!(handle.leaf_names("Rd02").unwrap().unwrap().0.len(), 4);
        game.apply(&Action::MergeLegions {
            game_name: "g".into(),
            playername: "p0".into(),
            parent_markerid: "Rd01".into(),
            child_markerid: "Rd02".into(),
            parent_creature_names: names(&["Titan", "Centaur", "Gargoyle", "Gargoyle"]),
            child_creature_names: names(&["Angel", "Centaur", "Ogre", "Ogre"]),
        })
        .unwrap();
        assert_whole_starting_legion(&handle);
    }

    #[test]
    fn test_summon_and_unsummon_move_angel() {
        let (mut game, handle) = tracked_game();
        game.apply(&red_split()).unwrap();
        let summon = Action::SummonAngel {
            game_name: "g".into(),
            playername: "p0".into(),
            markerid: "Rd01".into(),
            donor_markerid: "Rd02".into(),
            creature_name: "Angel".into(),
        };
        game.apply(&summon).unwrap();
        let (all, _) = handle.leaf_names("Rd02").unwrap().unwrap();
        assert_eq!(all.len(), 3);
        assert!(!all.contains(&"Angel".to_string()));
        let (all, certain) = handle.leaf_names("Rd01").unwrap().unwrap();
        assert_eq!(all.len(), 5);
        // The angel came from Rd02, so the split left the Titan in Rd01.
        assert!(certain.contains(&"Angel".to_string()));
        assert!(certain.contains(&"Titan".to_string()));

        game.apply(&summon.undo_action().unwrap()).unwrap();
        let (all, _) = handle.leaf_names("Rd01").unwrap().unwrap();
        assert_eq!(all.len(), 4);
        assert!(!all.contains(&"Angel".to_string()));
        let (all, certain) = handle.leaf_names("Rd02").unwrap().unwrap();
        assert_eq!(all.len(), 4);
        assert!(certain.contains(&"Angel".to_string()));
    }

    #[test]
    fn test_acquired_angel_is_certain() {
        let (mut game, handle) = tracked_game();
        game.apply(&red_split()).unwrap();
        game.apply(&Action::CanAcquireAngels {
            game_name: "g".into(),
            playername: "p0".into(),
            markerid: "Rd02".into(),
            angels: 1,
            archangels: 0,
        })
        .unwrap();
        game.apply(&Action::AcquireAngels {
            game_name: "g".into(),
            playername: "p0".into(),
            markerid: "Rd02".into(),
            angel_names: names(&["Angel"]),
        })
        .unwrap();
        let (all, certain) = handle.leaf_names("Rd02").unwrap().unwrap();
        assert_eq!(all.len(), 5);
        assert!(certain.contains(&"Angel".to_string()));
    }

    #[test]
    fn test_reveal_resolves_both_halves() {
        let (mut game, handle) = tracked_game();
        game.apply(&red_split()).unwrap();
        game.apply(&Action::RevealLegion {
            game_name: "g".into(),
            markerid: "Rd02".into(),
            creature_names: names(&["Angel", "Centaur", "Ogre", "Ogre"]),
        })
        .unwrap();
        let (_, certain) = handle.leaf_names("Rd02").unwrap().unwrap();
        assert_eq!(sorted(certain), names(&["Angel", "Centaur", "Ogre", "Ogre"]));
        let (_, certain) = handle.leaf_names("Rd01").unwrap().unwrap();
        assert_eq!(
            sorted(certain),
            names(&["Centaur", "Gargoyle", "Gargoyle", "Titan"])
        );
    }

    #[test]
    fn test_undo_recruit_removes_recruit() {
        let (mut game, handle) = tracked_game();
        game.apply(&red_split()).unwrap();
        let recruit = Action::RecruitCreature {
            game_name: "g".into(),
            playername: "p0".into(),
            markerid: "Rd02".into(),
            creature_name: "Troll".into(),
            recruiter_names: names(&["Ogre", "Ogre"]),
        };
        game.apply(&recruit).unwrap();
        game.apply(&recruit.undo_action().unwrap()).unwrap();
        let (all, certain) = handle.leaf_names("Rd02").unwrap().unwrap();
        assert_eq!(all.len(), 4);
        assert!(!all.contains(&"Troll".to_string()));
        // The recruiters stay revealed.
        assert_eq!(sorted(certain), names(&["Ogre", "Ogre"]));
    }

    #[test]
    fn test_eliminate_drops_trees() {
        let (mut game, handle) = tracked_game();
        game.apply(&Action::EliminatePlayer {
            game_name: "g".into(),
            winner_playername: "p0".into(),
            loser_playername: "p1".into(),
        })
        .unwrap();
        assert_eq!(handle.num_trees().unwrap(), 1);
        assert!(handle.leaf_names("Bu01").unwrap().is_none());
        assert!(handle.leaf_names("Rd01").unwrap().is_some());
    }

    #[test]
    fn test_poisoned_state_is_lock_error() {
        let predictor = SplitPredictor::new(None, table());
        let handle = predictor.handle();
        let state = Arc::clone(&handle.state);
        let _ = std::thread::spawn(move || {
            let _guard = state.lock().unwrap();
            panic!("poison the predictor state");
        })
        .join();
        assert!(matches!(handle.num_trees(), Err(ObserverError::Lock(_))));
        assert!(matches!(
            predictor.on_action(&red_split()),
            Err(ObserverError::Lock(_))
        ));
    }

    #[test]
    fn test_withdraw_drops_trees() {
        let predictor = SplitPredictor::new(None, table());
        let handle = predictor.handle();
        let mut game = GameBuilder::new("g")
            .with_player("p0", "Red")
            .with_player("p1", "Blue")
            .with_observer(Box::new(predictor))
            .with_starting_legions()
            .build()
            .unwrap();
        game.apply(&Action::Withdraw {
            game_name: "g".into(),
            playername: "p1".into(),
        })
        .unwrap();
        assert_eq!(handle.num_trees().unwrap(), 1);
        assert!(handle.leaf_names("Bu01").unwrap().is_none());
    }
}
