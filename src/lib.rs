//! Minesweeper with bots for mines.
//!
//! [`Board`] holds the minefield and implements reveal, flagging and chord
//! clearing. [`Game`] wraps the single live board with the cursor, the
//! alive/dead state and the cheat preview that a front end drives.

pub use board::*;
pub use error::*;
pub use game::*;

mod board;
mod error;
mod game;
