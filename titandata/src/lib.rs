//! Static reference data for the Titan rules: the creature table.
//!
//! Data is immutable once loaded and is shared between every game and
//! prediction tree in a process via `Arc`.

pub mod creatures;

pub use creatures::{
    CharacterType, CreatureTable, CreatureType, DataError, STARTING_CREATURES,
};
