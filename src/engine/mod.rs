//! The game façade and its read/write views.

pub mod game;
pub mod reader;

pub use game::{Game, PlayerWriter};
pub use reader::{GameReader, GameWriter};
