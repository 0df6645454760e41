//! Rule modules for the two-player games Parlor hosts.
//!
//! Each game owns its board, move validation, turn order, and win/draw
//! detection. The rules are fixed per game; [`Board`] dispatches a [`Move`]
//! to the right module and reports a [`Progress`] describing what happened.

pub mod battleship;
pub mod board;
pub mod connect_four;
pub mod dice;
pub mod error;
pub mod seat;
pub mod tictactoe;

pub use battleship::{Battleship, Coord, Orientation, ShipKind};
pub use board::{Board, Move, Progress, Report};
pub use connect_four::ConnectFour;
pub use dice::DiceMatch;
pub use error::{GameError, GameResult};
pub use seat::{GameKind, Outcome, Seat};
pub use tictactoe::TicTacToe;
