//! Ground truth for one game: players, legions, the caretaker and history.
//!
//! Every state change enters through [`Game::apply`], which validates the
//! action against the current state, performs it through [`Player`] and
//! [`Legion`], records it in the [`History`] and passes it on to the
//! registered observers. Follow-up actions the rules imply (an elimination
//! when a Titan dies, angels a legion may now acquire) are returned to the
//! caller rather than applied.

use crate::action::{Action, HexLabel};
use crate::caretaker::{Caretaker, CaretakerError};
use crate::config::GameConfig;
use crate::creature::Creature;
use crate::history::History;
use crate::legion::Legion;
use crate::observer::{GameObserver, ObserverRegistry};
use crate::player::Player;
use std::sync::Arc;
use thiserror::Error;
use titandata::CreatureTable;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Action for game {got} sent to game {expected}")]
    WrongGame { expected: String, got: String },
    #[error("No player named {0}")]
    UnknownPlayer(String),
    #[error("Player {0} is dead")]
    PlayerDead(String),
    #[error("Player {0} already has a starting legion")]
    AlreadyStarted(String),
    #[error("Unknown color {0}")]
    UnknownColor(String),
    #[error("No legion {0}")]
    UnknownLegion(String),
    #[error("Marker {0} is not available")]
    MarkerUnavailable(String),
    #[error("No creature type named {0}")]
    UnknownCreature(String),
    #[error("Legion {markerid} has no {name}")]
    NoSuchCreature { markerid: String, name: String },
    #[error("Split of {markerid} does not match its creatures")]
    WrongCreatures { markerid: String },
    #[error("Illegal split of {markerid}")]
    IllegalSplit { markerid: String },
    #[error("Legion {markerid} would exceed {max} creatures")]
    TooTall { markerid: String, max: usize },
    #[error("Legion {markerid} already recruited {name} this turn")]
    AlreadyRecruited { markerid: String, name: String },
    #[error("Legion {markerid} cannot acquire {name}")]
    CannotAcquire { markerid: String, name: String },
    #[error(transparent)]
    Caretaker(#[from] CaretakerError),
    #[error("Creature data: {0}")]
    Data(#[from] titandata::DataError),
    #[error("{0} observer(s) failed")]
    ObserversFailed(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Split,
    Move,
    Fight,
    Muster,
}

/// Tower hexes on the masterboard, by tower number.
const TOWERS: [HexLabel; 6] = [100, 200, 300, 400, 500, 600];

pub struct Game {
    name: String,
    turn: u32,
    phase: Phase,
    active_player: Option<String>,
    players: Vec<Player>,
    caretaker: Caretaker,
    history: History,
    observers: ObserverRegistry,
    config: GameConfig,
    creature_table: Arc<CreatureTable>,
    over: bool,
}

fn find_player<'a>(players: &'a mut [Player], name: &str) -> Result<&'a mut Player, GameError> {
    players
        .iter_mut()
        .find(|p| p.name == name)
        .ok_or_else(|| GameError::UnknownPlayer(name.to_string()))
}

impl Game {
    pub fn new(name: impl Into<String>, creature_table: Arc<CreatureTable>, config: GameConfig) -> Self {
        let caretaker = Caretaker::from_table(&creature_table);
        Self {
            name: name.into(),
            turn: 1,
            phase: Phase::Split,
            active_player: None,
            players: Vec::new(),
            caretaker,
            history: History::new(),
            observers: ObserverRegistry::new(),
            config,
            creature_table,
            over: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn active_player(&self) -> Option<&str> {
        self.active_player.as_deref()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    pub fn living_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| !p.dead)
    }

    pub fn caretaker(&self) -> &Caretaker {
        &self.caretaker
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn creature_table(&self) -> &Arc<CreatureTable> {
        &self.creature_table
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    pub fn register_observer(&mut self, observer: Box<dyn GameObserver>) {
        self.observers.register(observer);
    }

    pub fn find_legion(&self, markerid: &str) -> Option<&Legion> {
        self.players.iter().find_map(|p| p.legion(markerid))
    }

    fn creature(&self, name: &str) -> Result<Creature, GameError> {
        Creature::from_table(&self.creature_table, name)
            .ok_or_else(|| GameError::UnknownCreature(name.to_string()))
    }

    fn creatures(&self, names: &[String]) -> Result<Vec<Creature>, GameError> {
        names.iter().map(|name| self.creature(name)).collect()
    }

    fn living_player(&mut self, name: &str) -> Result<&mut Player, GameError> {
        let player = find_player(&mut self.players, name)?;
        if player.dead {
            return Err(GameError::PlayerDead(name.to_string()));
        }
        Ok(player)
    }

    /// Applies one action, records it and notifies observers.
    ///
    /// Returns follow-up actions implied by the rules.
    pub fn apply(&mut self, action: &Action) -> Result<Vec<Action>, GameError> {
        if action.game_name() != self.name {
            return Err(GameError::WrongGame {
                expected: self.name.clone(),
                got: action.game_name().to_string(),
            });
        }
        let Some(followups) = self.execute(action)? else {
            log::debug!("{} changed nothing; not recorded", action.name());
            return Ok(Vec::new());
        };
        self.history.update(action);

        let failures = self.observers.notify(action);
        if failures > 0 && self.config.strict_checks {
            return Err(GameError::ObserversFailed(failures));
        }
        Ok(followups)
    }

    /// Performs an action. `None` means it repeated state already reached.
    fn execute(&mut self, action: &Action) -> Result<Option<Vec<Action>>, GameError> {
        let game_name = self.name.clone();
        let mut followups = Vec::new();
        match action {
            Action::JoinGame { playername, .. } => {
                if self.player(playername).is_none() {
                    log::info!("{} joined {}", playername, game_name);
                    self.players.push(Player::new(playername.clone()));
                }
            }
            Action::AssignTower {
                playername,
                tower_num,
                ..
            } => {
                find_player(&mut self.players, playername)?.tower = Some(*tower_num);
            }
            Action::PickedColor {
                playername, color, ..
            } => {
                find_player(&mut self.players, playername)?.pick_color(color)?;
            }
            Action::CreateStartingLegion {
                playername,
                markerid,
                creature_names,
                ..
            } => {
                let creatures = self.creatures(creature_names)?;
                let player = find_player(&mut self.players, playername)?;
                let tower = player
                    .tower
                    .and_then(|t| TOWERS.get(t.saturating_sub(1) as usize).copied())
                    .unwrap_or(TOWERS[0]);
                player.create_starting_legion(&game_name, markerid, creatures, tower)?;
                for name in creature_names {
                    self.caretaker.take_one(name)?;
                }
            }
            Action::StartSplitPhase {
                playername, turn, ..
            } => {
                self.start_phase(playername, *turn, Phase::Split)?;
                self.living_player(playername)?.reset_turn();
            }
            Action::StartMovePhase {
                playername, turn, ..
            } => self.start_phase(playername, *turn, Phase::Move)?,
            Action::StartFightPhase {
                playername, turn, ..
            } => self.start_phase(playername, *turn, Phase::Fight)?,
            Action::StartMusterPhase {
                playername, turn, ..
            } => self.start_phase(playername, *turn, Phase::Muster)?,
            Action::SplitLegion {
                playername,
                parent_markerid,
                child_markerid,
                parent_creature_names,
                child_creature_names,
                ..
            } => {
                self.living_player(playername)?.split_legion(
                    &game_name,
                    parent_markerid,
                    child_markerid,
                    parent_creature_names,
                    child_creature_names,
                )?;
            }
            Action::UndoSplit {
                playername,
                parent_markerid,
                child_markerid,
                ..
            } => {
                let player = self.living_player(playername)?;
                if player.legion(child_markerid).is_none()
                    && player.legion(parent_markerid).is_some()
                    && player.markerids_left().contains(child_markerid.as_str())
                {
                    log::debug!("Split of {} already undone", child_markerid);
                    return Ok(None);
                }
                player.undo_split(&game_name, parent_markerid, child_markerid)?;
            }
            Action::MergeLegions {
                playername,
                parent_markerid,
                child_markerid,
                ..
            } => {
                self.living_player(playername)?
                    .merge_legions(&game_name, parent_markerid, child_markerid)?;
            }
            Action::RollMovement {
                playername,
                movement_roll,
                mulligans_left,
                ..
            } => {
                self.living_player(playername)?
                    .roll_movement(&game_name, *movement_roll, *mulligans_left);
            }
            Action::MoveLegion {
                playername,
                markerid,
                hexlabel,
                entry_side,
                teleport,
                ..
            } => {
                self.living_player(playername)?
                    .legion_mut(markerid)?
                    .move_to(*hexlabel, *entry_side, *teleport);
            }
            Action::UndoMoveLegion {
                playername,
                markerid,
                ..
            } => {
                self.living_player(playername)?.legion_mut(markerid)?.undo_move();
            }
            Action::DoNotMoveLegion {
                playername,
                markerid,
                ..
            } => {
                self.living_player(playername)?.legion_mut(markerid)?;
            }
            Action::BattleOver {
                winner_playername,
                winner_markerid,
                winner_losses,
                loser_playername,
                loser_markerid,
                loser_losses,
                fled,
                mutual,
                ..
            } => {
                followups = self.resolve_battle(
                    (winner_playername, winner_markerid, winner_losses),
                    (loser_playername, loser_markerid, loser_losses),
                    *fled,
                    *mutual,
                )?;
            }
            Action::RecruitCreature {
                playername,
                markerid,
                creature_name,
                recruiter_names,
                ..
            } => {
                let creature = self.creature(creature_name)?;
                let max_height = self.config.max_legion_height;
                let player = find_player(&mut self.players, playername)?;
                let recruited = player.legion_mut(markerid)?.recruit(
                    creature,
                    recruiter_names,
                    &mut self.caretaker,
                    max_height,
                )?;
                if !recruited {
                    return Ok(None);
                }
            }
            Action::UndoRecruit {
                playername,
                markerid,
                ..
            } => {
                let player = find_player(&mut self.players, playername)?;
                let undone = player.legion_mut(markerid)?.undo_recruit(&mut self.caretaker)?;
                if undone.is_none() {
                    return Ok(None);
                }
            }
            Action::SummonAngel {
                playername,
                markerid,
                donor_markerid,
                creature_name,
                ..
            } => {
                self.transfer(playername, donor_markerid, markerid, creature_name)?;
            }
            Action::UnsummonAngel {
                playername,
                markerid,
                donor_markerid,
                creature_name,
                ..
            } => {
                self.transfer(playername, markerid, donor_markerid, creature_name)?;
            }
            Action::CanAcquireAngels {
                playername,
                markerid,
                angels,
                archangels,
                ..
            } => {
                let legion = self.living_player(playername)?.legion_mut(markerid)?;
                legion.angels_pending = *angels;
                legion.archangels_pending = *archangels;
            }
            Action::AcquireAngels {
                playername,
                markerid,
                angel_names,
                ..
            } => {
                let creatures = self.creatures(angel_names)?;
                let max_height = self.config.max_legion_height;
                let player = find_player(&mut self.players, playername)?;
                let legion = player.legion_mut(markerid)?;
                legion.acquire_angels(creatures, &mut self.caretaker, max_height)?;
                legion.clear_acquisitions();
            }
            Action::DoNotAcquireAngels {
                playername,
                markerid,
                ..
            } => {
                self.living_player(playername)?
                    .legion_mut(markerid)?
                    .clear_acquisitions();
            }
            Action::RevealLegion {
                markerid,
                creature_names,
                ..
            } => {
                let legion = self
                    .find_legion(markerid)
                    .ok_or_else(|| GameError::UnknownLegion(markerid.clone()))?;
                let mut actual = legion.creature_names();
                let mut revealed = creature_names.clone();
                actual.sort();
                revealed.sort();
                if actual != revealed {
                    log::warn!(
                        "Reveal of {} shows {:?} but it holds {:?}",
                        markerid,
                        revealed,
                        actual
                    );
                }
            }
            Action::EliminatePlayer {
                winner_playername,
                loser_playername,
                ..
            } => {
                followups = self.eliminate(loser_playername, Some(winner_playername.as_str()), None)?;
            }
            Action::Withdraw { playername, .. } => {
                followups = self.eliminate(playername, None, None)?;
            }
            Action::GameOver { winner_names, .. } => {
                log::info!("Game {} over, won by {:?}", game_name, winner_names);
                self.over = true;
            }
            Action::ResolvingEngagement { .. }
            | Action::Flee { .. }
            | Action::DoNotFlee { .. }
            | Action::Concede { .. }
            | Action::MoveCreature { .. }
            | Action::UndoMoveCreature { .. }
            | Action::Strike { .. }
            | Action::DoNotSummonAngel { .. }
            | Action::Chat { .. }
            | Action::PauseAI { .. }
            | Action::ResumeAI { .. } => {
                log::trace!("{} changes no masterboard state", action.name());
            }
        }
        Ok(Some(followups))
    }

    fn start_phase(&mut self, playername: &str, turn: u32, phase: Phase) -> Result<(), GameError> {
        self.living_player(playername)?;
        self.turn = turn;
        self.phase = phase;
        self.active_player = Some(playername.to_string());
        log::debug!("Turn {}: {} {:?} phase", turn, playername, phase);
        Ok(())
    }

    /// Moves one creature between two legions of the same player.
    fn transfer(
        &mut self,
        playername: &str,
        from_markerid: &str,
        to_markerid: &str,
        creature_name: &str,
    ) -> Result<(), GameError> {
        let player = self.living_player(playername)?;
        let to_height = player
            .legion(to_markerid)
            .ok_or_else(|| GameError::UnknownLegion(to_markerid.to_string()))?
            .height();
        if to_height >= self.config.max_legion_height {
            return Err(GameError::TooTall {
                markerid: to_markerid.to_string(),
                max: self.config.max_legion_height,
            });
        }
        let player = find_player(&mut self.players, playername)?;
        let creature = player.legion_mut(from_markerid)?.remove_creature(creature_name)?;
        player.legion_mut(to_markerid)?.push(creature);
        if player.legion(from_markerid).is_some_and(Legion::is_empty) {
            player.remove_legion(from_markerid);
        }
        Ok(())
    }

    /// Checks that a legion holds every named loss.
    fn check_losses(
        &self,
        playername: &str,
        markerid: &str,
        losses: &[String],
    ) -> Result<(), GameError> {
        let legion = self
            .player(playername)
            .ok_or_else(|| GameError::UnknownPlayer(playername.to_string()))?
            .legion(markerid)
            .ok_or_else(|| GameError::UnknownLegion(markerid.to_string()))?;
        let mut remaining = legion.creature_names();
        for name in losses {
            let pos = remaining
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| GameError::NoSuchCreature {
                    markerid: markerid.to_string(),
                    name: name.clone(),
                })?;
            remaining.swap_remove(pos);
        }
        Ok(())
    }

    /// Kills each named creature of one legion. Returns (points, legion gone).
    fn remove_losses(
        &mut self,
        playername: &str,
        markerid: &str,
        losses: &[String],
    ) -> Result<(u32, bool), GameError> {
        self.check_losses(playername, markerid, losses)?;
        let player = find_player(&mut self.players, playername)?;
        let legion = player.legion_mut(markerid)?;
        let mut points = 0;
        for name in losses {
            let creature = legion.remove_creature(name)?;
            points += creature.score();
            self.caretaker.kill_one(name)?;
        }
        Ok((points, legion.is_empty()))
    }

    fn resolve_battle(
        &mut self,
        winner: (&String, &String, &Vec<String>),
        loser: (&String, &String, &Vec<String>),
        fled: bool,
        mutual: bool,
    ) -> Result<Vec<Action>, GameError> {
        let (winner_player, winner_marker, winner_losses) = winner;
        let (loser_player, loser_marker, loser_losses) = loser;
        let mut followups = Vec::new();

        self.check_losses(winner_player, winner_marker, winner_losses)?;
        self.check_losses(loser_player, loser_marker, loser_losses)?;
        let (_, winner_gone) = self.remove_losses(winner_player, winner_marker, winner_losses)?;
        let (mut points, loser_gone) = self.remove_losses(loser_player, loser_marker, loser_losses)?;
        if fled {
            points /= 2;
        }

        if !mutual && !winner_gone && points > 0 {
            followups.extend(self.award_points(winner_player, winner_marker, points)?);
        }
        for (gone, playername, markerid, losses, killer) in [
            (winner_gone, winner_player, winner_marker, winner_losses, loser_player),
            (loser_gone, loser_player, loser_marker, loser_losses, winner_player),
        ] {
            if !gone {
                continue;
            }
            find_player(&mut self.players, playername)?.remove_legion(markerid);
            if losses.iter().any(|name| name == "Titan") {
                let scorer = (!mutual && markerid == loser_marker && !winner_gone)
                    .then_some(winner_marker.as_str());
                followups.extend(self.eliminate(playername, Some(killer.as_str()), scorer)?);
            }
        }
        Ok(followups)
    }

    /// Credits a legion's owner and reports any angels it may now take.
    fn award_points(
        &mut self,
        playername: &str,
        markerid: &str,
        points: u32,
    ) -> Result<Vec<Action>, GameError> {
        let config = self.config.clone();
        let player = find_player(&mut self.players, playername)?;
        let (angels, archangels) = player.add_points(points, Some(markerid), &config)?;
        log::debug!("{} scores {} with {}", playername, points, markerid);
        if angels + archangels == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![Action::CanAcquireAngels {
            game_name: self.name.clone(),
            playername: playername.to_string(),
            markerid: markerid.to_string(),
            angels,
            archangels,
        }])
    }

    /// Kills a player; a no-op if they are already dead.
    fn eliminate(
        &mut self,
        loser: &str,
        killer: Option<&str>,
        scoring_markerid: Option<&str>,
    ) -> Result<Vec<Action>, GameError> {
        let game_name = self.name.clone();
        let player = find_player(&mut self.players, loser)?;
        if player.dead {
            log::debug!("{} is already dead", loser);
            return Ok(Vec::new());
        }
        let (points, action) = player.die(&game_name, killer, &mut self.caretaker)?;
        let mut followups = vec![action];

        let killer = killer.filter(|k| !k.is_empty());
        if let Some(killer) = killer {
            match scoring_markerid {
                Some(markerid) => followups.extend(self.award_points(killer, markerid, points)?),
                None => {
                    let config = self.config.clone();
                    find_player(&mut self.players, killer)?.add_points(points, None, &config)?;
                }
            }
        }
        Ok(followups)
    }

    /// Flushes and detaches observers.
    pub fn shutdown(&mut self) {
        self.observers.shutdown();
    }
}
