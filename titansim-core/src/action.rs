//! Game actions: the event vocabulary shared by the server, observers and history.
//!
//! Every distinguishable game event is one variant of [`Action`]. Actions are
//! flat records of strings, numbers and name lists, so they double as the
//! undo/redo record and as the persisted history format.
//!
//! # Text form
//!
//! ```text
//! SplitLegion {"child_creature_names":["Angel","Ogre"],"child_markerid":"Rd02",...}
//! ```
//!
//! The variant name, one space, then a JSON object of the fields.
//! [`Display`](std::fmt::Display) writes it and [`FromStr`] reads it back.
//!
//! # Hash / equality
//!
//! [`Hash`] covers the field values only, not the variant, so an action and
//! its paired undo action (same fields) hash identically. `PartialEq` also
//! compares the variant, so they are never equal. [`Action::same_payload`]
//! is the explicit form of the comparison the history relies on.

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

pub type MarkerId = String;
/// Masterboard hex label.
pub type HexLabel = u32;

#[derive(Error, Debug)]
pub enum ActionParseError {
    #[error("Expected '<Name> <fields>', got {0:?}")]
    Format(String),
    #[error("Invalid action JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    // Setup
    JoinGame {
        game_name: String,
        playername: String,
    },
    AssignTower {
        game_name: String,
        playername: String,
        tower_num: u32,
    },
    PickedColor {
        game_name: String,
        playername: String,
        color: String,
    },
    CreateStartingLegion {
        game_name: String,
        playername: String,
        markerid: MarkerId,
        creature_names: Vec<String>,
    },

    // Phases
    StartSplitPhase {
        game_name: String,
        playername: String,
        turn: u32,
    },
    StartMovePhase {
        game_name: String,
        playername: String,
        turn: u32,
    },
    StartFightPhase {
        game_name: String,
        playername: String,
        turn: u32,
    },
    StartMusterPhase {
        game_name: String,
        playername: String,
        turn: u32,
    },

    // Splitting
    SplitLegion {
        game_name: String,
        playername: String,
        parent_markerid: MarkerId,
        child_markerid: MarkerId,
        parent_creature_names: Vec<String>,
        child_creature_names: Vec<String>,
    },
    UndoSplit {
        game_name: String,
        playername: String,
        parent_markerid: MarkerId,
        child_markerid: MarkerId,
        parent_creature_names: Vec<String>,
        child_creature_names: Vec<String>,
    },
    /// Forced recombination of a split whose halves could not both move.
    MergeLegions {
        game_name: String,
        playername: String,
        parent_markerid: MarkerId,
        child_markerid: MarkerId,
        parent_creature_names: Vec<String>,
        child_creature_names: Vec<String>,
    },

    // Movement
    RollMovement {
        game_name: String,
        playername: String,
        movement_roll: u8,
        mulligans_left: u8,
    },
    MoveLegion {
        game_name: String,
        playername: String,
        markerid: MarkerId,
        hexlabel: HexLabel,
        entry_side: u8,
        teleport: bool,
        teleporting_lord: Option<String>,
        previous_hexlabel: HexLabel,
    },
    UndoMoveLegion {
        game_name: String,
        playername: String,
        markerid: MarkerId,
        hexlabel: HexLabel,
        entry_side: u8,
        teleport: bool,
        teleporting_lord: Option<String>,
        previous_hexlabel: HexLabel,
    },
    DoNotMoveLegion {
        game_name: String,
        playername: String,
        markerid: MarkerId,
    },

    // Engagements
    ResolvingEngagement {
        game_name: String,
        hexlabel: HexLabel,
    },
    Flee {
        game_name: String,
        playername: String,
        markerid: MarkerId,
        enemy_markerid: MarkerId,
        hexlabel: HexLabel,
    },
    DoNotFlee {
        game_name: String,
        playername: String,
        markerid: MarkerId,
        enemy_markerid: MarkerId,
        hexlabel: HexLabel,
    },
    Concede {
        game_name: String,
        playername: String,
        markerid: MarkerId,
        enemy_markerid: MarkerId,
        hexlabel: HexLabel,
    },

    // Battle
    MoveCreature {
        game_name: String,
        playername: String,
        creature_name: String,
        /// None when entering the battle map
        old_hexlabel: Option<String>,
        new_hexlabel: String,
    },
    UndoMoveCreature {
        game_name: String,
        playername: String,
        creature_name: String,
        old_hexlabel: Option<String>,
        new_hexlabel: String,
    },
    Strike {
        game_name: String,
        playername: String,
        striker_name: String,
        striker_hexlabel: String,
        target_name: String,
        target_hexlabel: String,
        num_dice: u8,
        strike_number: u8,
        rolls: Vec<u8>,
        hits: u8,
        carries: u8,
    },
    /// Engagement result. Creature lists are the contents at the start of
    /// the battle; losses are the creatures that died.
    BattleOver {
        game_name: String,
        hexlabel: HexLabel,
        winner_playername: String,
        winner_markerid: MarkerId,
        winner_creature_names: Vec<String>,
        winner_losses: Vec<String>,
        loser_playername: String,
        loser_markerid: MarkerId,
        loser_creature_names: Vec<String>,
        loser_losses: Vec<String>,
        fled: bool,
        mutual: bool,
    },

    // Muster
    RecruitCreature {
        game_name: String,
        playername: String,
        markerid: MarkerId,
        creature_name: String,
        recruiter_names: Vec<String>,
    },
    UndoRecruit {
        game_name: String,
        playername: String,
        markerid: MarkerId,
        creature_name: String,
        recruiter_names: Vec<String>,
    },
    SummonAngel {
        game_name: String,
        playername: String,
        markerid: MarkerId,
        donor_markerid: MarkerId,
        creature_name: String,
    },
    UnsummonAngel {
        game_name: String,
        playername: String,
        markerid: MarkerId,
        donor_markerid: MarkerId,
        creature_name: String,
    },
    DoNotSummonAngel {
        game_name: String,
        playername: String,
        markerid: MarkerId,
    },
    CanAcquireAngels {
        game_name: String,
        playername: String,
        markerid: MarkerId,
        angels: u32,
        archangels: u32,
    },
    AcquireAngels {
        game_name: String,
        playername: String,
        markerid: MarkerId,
        angel_names: Vec<String>,
    },
    DoNotAcquireAngels {
        game_name: String,
        playername: String,
        markerid: MarkerId,
    },

    // Information
    RevealLegion {
        game_name: String,
        markerid: MarkerId,
        creature_names: Vec<String>,
    },

    // Endgame
    EliminatePlayer {
        game_name: String,
        winner_playername: String,
        loser_playername: String,
    },
    Withdraw {
        game_name: String,
        playername: String,
    },
    GameOver {
        game_name: String,
        winner_names: Vec<String>,
        finish_time: u64,
    },

    // Ephemeral
    Chat {
        game_name: String,
        playername: String,
        message: String,
    },
    PauseAI {
        game_name: String,
        playername: String,
    },
    ResumeAI {
        game_name: String,
        playername: String,
    },
}

impl Action {
    /// Splits the serialized form into variant name and field object.
    fn tagged(&self) -> (String, Value) {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => match map.into_iter().next() {
                Some((name, fields)) => (name, fields),
                None => (String::new(), Value::Null),
            },
            _ => (String::new(), Value::Null),
        }
    }

    /// Variant name, as used in the text form.
    pub fn name(&self) -> String {
        self.tagged().0
    }

    pub fn game_name(&self) -> &str {
        match self {
            Action::JoinGame { game_name, .. }
            | Action::AssignTower { game_name, .. }
            | Action::PickedColor { game_name, .. }
            | Action::CreateStartingLegion { game_name, .. }
            | Action::StartSplitPhase { game_name, .. }
            | Action::StartMovePhase { game_name, .. }
            | Action::StartFightPhase { game_name, .. }
            | Action::StartMusterPhase { game_name, .. }
            | Action::SplitLegion { game_name, .. }
            | Action::UndoSplit { game_name, .. }
            | Action::MergeLegions { game_name, .. }
            | Action::RollMovement { game_name, .. }
            | Action::MoveLegion { game_name, .. }
            | Action::UndoMoveLegion { game_name, .. }
            | Action::DoNotMoveLegion { game_name, .. }
            | Action::ResolvingEngagement { game_name, .. }
            | Action::Flee { game_name, .. }
            | Action::DoNotFlee { game_name, .. }
            | Action::Concede { game_name, .. }
            | Action::MoveCreature { game_name, .. }
            | Action::UndoMoveCreature { game_name, .. }
            | Action::Strike { game_name, .. }
            | Action::BattleOver { game_name, .. }
            | Action::RecruitCreature { game_name, .. }
            | Action::UndoRecruit { game_name, .. }
            | Action::SummonAngel { game_name, .. }
            | Action::UnsummonAngel { game_name, .. }
            | Action::DoNotSummonAngel { game_name, .. }
            | Action::CanAcquireAngels { game_name, .. }
            | Action::AcquireAngels { game_name, .. }
            | Action::DoNotAcquireAngels { game_name, .. }
            | Action::RevealLegion { game_name, .. }
            | Action::EliminatePlayer { game_name, .. }
            | Action::Withdraw { game_name, .. }
            | Action::GameOver { game_name, .. }
            | Action::Chat { game_name, .. }
            | Action::PauseAI { game_name, .. }
            | Action::ResumeAI { game_name, .. } => game_name,
        }
    }

    /// The player who performed this action, if it belongs to one player.
    pub fn playername(&self) -> Option<&str> {
        match self {
            Action::JoinGame { playername, .. }
            | Action::AssignTower { playername, .. }
            | Action::PickedColor { playername, .. }
            | Action::CreateStartingLegion { playername, .. }
            | Action::StartSplitPhase { playername, .. }
            | Action::StartMovePhase { playername, .. }
            | Action::StartFightPhase { playername, .. }
            | Action::StartMusterPhase { playername, .. }
            | Action::SplitLegion { playername, .. }
            | Action::UndoSplit { playername, .. }
            | Action::MergeLegions { playername, .. }
            | Action::RollMovement { playername, .. }
            | Action::MoveLegion { playername, .. }
            | Action::UndoMoveLegion { playername, .. }
            | Action::DoNotMoveLegion { playername, .. }
            | Action::Flee { playername, .. }
            | Action::DoNotFlee { playername, .. }
            | Action::Concede { playername, .. }
            | Action::MoveCreature { playername, .. }
            | Action::UndoMoveCreature { playername, .. }
            | Action::Strike { playername, .. }
            | Action::RecruitCreature { playername, .. }
            | Action::UndoRecruit { playername, .. }
            | Action::SummonAngel { playername, .. }
            | Action::UnsummonAngel { playername, .. }
            | Action::DoNotSummonAngel { playername, .. }
            | Action::CanAcquireAngels { playername, .. }
            | Action::AcquireAngels { playername, .. }
            | Action::DoNotAcquireAngels { playername, .. }
            | Action::Withdraw { playername, .. }
            | Action::Chat { playername, .. }
            | Action::PauseAI { playername, .. }
            | Action::ResumeAI { playername, .. } => Some(playername),
            Action::ResolvingEngagement { .. }
            | Action::BattleOver { .. }
            | Action::RevealLegion { .. }
            | Action::EliminatePlayer { .. }
            | Action::GameOver { .. } => None,
        }
    }

    /// Undo actions pop the matching action off the history instead of
    /// being appended to it.
    pub fn is_undo(&self) -> bool {
        matches!(
            self,
            Action::UndoSplit { .. }
                | Action::UndoMoveLegion { .. }
                | Action::UndoMoveCreature { .. }
                | Action::UndoRecruit { .. }
                | Action::UnsummonAngel { .. }
        )
    }

    /// Ephemeral actions are transient signals and never recorded.
    pub fn is_ephemeral(&self) -> bool {
        matches!(
            self,
            Action::Chat { .. } | Action::PauseAI { .. } | Action::ResumeAI { .. }
        )
    }

    /// The inverse action, for actions that can be undone.
    pub fn undo_action(&self) -> Option<Action> {
        match self.clone() {
            Action::SplitLegion {
                game_name,
                playername,
                parent_markerid,
                child_markerid,
                parent_creature_names,
                child_creature_names,
            } => Some(Action::UndoSplit {
                game_name,
                playername,
                parent_markerid,
                child_markerid,
                parent_creature_names,
                child_creature_names,
            }),
            Action::MoveLegion {
                game_name,
                playername,
                markerid,
                hexlabel,
                entry_side,
                teleport,
                teleporting_lord,
                previous_hexlabel,
            } => Some(Action::UndoMoveLegion {
                game_name,
                playername,
                markerid,
                hexlabel,
                entry_side,
                teleport,
                teleporting_lord,
                previous_hexlabel,
            }),
            Action::MoveCreature {
                game_name,
                playername,
                creature_name,
                old_hexlabel,
                new_hexlabel,
            } => Some(Action::UndoMoveCreature {
                game_name,
                playername,
                creature_name,
                old_hexlabel,
                new_hexlabel,
            }),
            Action::RecruitCreature {
                game_name,
                playername,
                markerid,
                creature_name,
                recruiter_names,
            } => Some(Action::UndoRecruit {
                game_name,
                playername,
                markerid,
                creature_name,
                recruiter_names,
            }),
            Action::SummonAngel {
                game_name,
                playername,
                markerid,
                donor_markerid,
                creature_name,
            } => Some(Action::UnsummonAngel {
                game_name,
                playername,
                markerid,
                donor_markerid,
                creature_name,
            }),
            _ => None,
        }
    }

    pub fn is_undoable(&self) -> bool {
        self.undo_action().is_some()
    }

    /// Hash of the field values, ignoring the variant.
    pub fn payload_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.tagged().1.to_string().hash(&mut hasher);
        hasher.finish()
    }

    /// True if both actions carry identical field values, whatever their variants.
    pub fn same_payload(&self, other: &Action) -> bool {
        self.tagged().1 == other.tagged().1
    }
}

impl Hash for Action {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.payload_hash());
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (name, fields) = self.tagged();
        write!(f, "{} {}", name, fields)
    }
}

impl FromStr for Action {
    type Err = ActionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, fields) = s
            .trim()
            .split_once(' ')
            .ok_or_else(|| ActionParseError::Format(s.to_string()))?;
        let fields: Value = serde_json::from_str(fields)?;
        let mut tagged = Map::new();
        tagged.insert(name.to_string(), fields);
        Ok(serde_json::from_value(Value::Object(tagged))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn split() -> Action {
        Action::SplitLegion {
            game_name: "g".to_string(),
            playername: "p0".to_string(),
            parent_markerid: "Rd01".to_string(),
            child_markerid: "Rd02".to_string(),
            parent_creature_names: vec!["Titan".into(), "Ogre".into()],
            child_creature_names: vec!["Angel".into(), "Centaur".into()],
        }
    }

    fn std_hash(action: &Action) -> u64 {
        let mut hasher = DefaultHasher::new();
        action.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_undo_pair_hash_collides_but_not_equal() {
        let action = split();
        let undo = action.undo_action().unwrap();
        assert!(matches!(undo, Action::UndoSplit { .. }));
        assert_eq!(action.payload_hash(), undo.payload_hash());
        assert_eq!(std_hash(&action), std_hash(&undo));
        assert!(action.same_payload(&undo));
        assert_ne!(action, undo);
    }

    #[test]
    fn test_different_fields_differ() {
        let a = split();
        let b = Action::SplitLegion {
            game_name: "g".to_string(),
            playername: "p0".to_string(),
            parent_markerid: "Rd01".to_string(),
            child_markerid: "Rd03".to_string(),
            parent_creature_names: vec!["Titan".into(), "Ogre".into()],
            child_creature_names: vec!["Angel".into(), "Centaur".into()],
        };
        assert_ne!(a.payload_hash(), b.payload_hash());
        assert!(!a.same_payload(&b));
    }

    #[test]
    fn test_text_form_round_trip() {
        let action = split();
        let text = action.to_string();
        assert!(text.starts_with("SplitLegion {"));
        let parsed: Action = text.parse().unwrap();
        assert_eq!(parsed, action);
    }

    #[test]
    fn test_parse_optional_and_numeric_fields() {
        let text = r#"MoveLegion {"game_name":"g","playername":"p1","markerid":"Bu03","hexlabel":101,"entry_side":3,"teleport":true,"teleporting_lord":"Titan","previous_hexlabel":200}"#;
        let action: Action = text.parse().unwrap();
        match action {
            Action::MoveLegion {
                teleporting_lord,
                hexlabel,
                ..
            } => {
                assert_eq!(teleporting_lord.as_deref(), Some("Titan"));
                assert_eq!(hexlabel, 101);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "NoFieldsHere".parse::<Action>(),
            Err(ActionParseError::Format(_))
        ));
        assert!(matches!(
            "SplitLegion {not json}".parse::<Action>(),
            Err(ActionParseError::Json(_))
        ));
        assert!(matches!(
            r#"NotAnAction {"game_name":"g"}"#.parse::<Action>(),
            Err(ActionParseError::Json(_))
        ));
    }

    #[test]
    fn test_classification() {
        let chat = Action::Chat {
            game_name: "g".into(),
            playername: "p0".into(),
            message: "hi".into(),
        };
        assert!(chat.is_ephemeral());
        assert!(!chat.is_undo());
        assert!(!chat.is_undoable());

        let action = split();
        assert!(action.is_undoable());
        assert!(!action.is_undo());
        assert!(action.undo_action().unwrap().is_undo());
        assert_eq!(action.name(), "SplitLegion");
        assert_eq!(action.playername(), Some("p0"));
        assert_eq!(action.game_name(), "g");

        let reveal = Action::RevealLegion {
            game_name: "g".into(),
            markerid: "Rd01".into(),
            creature_names: vec![],
        };
        assert_eq!(reveal.playername(), None);
    }

    #[test]
    fn test_every_undo_pairs_back() {
        let recruit = Action::RecruitCreature {
            game_name: "g".into(),
            playername: "p0".into(),
            markerid: "Rd01".into(),
            creature_name: "Lion".into(),
            recruiter_names: vec!["Centaur".into(), "Centaur".into()],
        };
        let summon = Action::SummonAngel {
            game_name: "g".into(),
            playername: "p0".into(),
            markerid: "Rd01".into(),
            donor_markerid: "Rd02".into(),
            creature_name: "Angel".into(),
        };
        let moved = Action::MoveCreature {
            game_name: "g".into(),
            playername: "p0".into(),
            creature_name: "Ogre".into(),
            old_hexlabel: None,
            new_hexlabel: "A1".into(),
        };
        for action in [recruit, summon, moved] {
            let undo = action.undo_action().unwrap();
            assert!(undo.is_undo());
            assert_eq!(action.payload_hash(), undo.payload_hash());
            assert!(undo.undo_action().is_none());
        }
    }
}
