//! Seats, game kinds, and terminal outcomes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which side of a session a player sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seat {
    /// The player who issued the challenge. Always moves first.
    Challenger,
    /// The challenged player.
    Opponent,
}

impl Seat {
    /// The other seat.
    pub fn other(self) -> Self {
        match self {
            Seat::Challenger => Seat::Opponent,
            Seat::Opponent => Seat::Challenger,
        }
    }

    /// Index into per-seat arrays.
    pub fn index(self) -> usize {
        match self {
            Seat::Challenger => 0,
            Seat::Opponent => 1,
        }
    }

    /// Board symbol for this seat.
    pub fn symbol(self) -> char {
        match self {
            Seat::Challenger => 'X',
            Seat::Opponent => 'O',
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seat::Challenger => write!(f, "challenger"),
            Seat::Opponent => write!(f, "opponent"),
        }
    }
}

/// The games a session can be played with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    /// Best-of-N die-roll duel.
    Dice,
    /// Four-in-a-row on a 6x7 grid.
    ConnectFour,
    /// Three-in-a-row on a 3x3 grid.
    TicTacToe,
    /// Hidden-fleet naval battle on two 10x10 grids.
    Battleship,
}

impl GameKind {
    /// All supported games, in menu order.
    pub const ALL: [GameKind; 4] = [
        GameKind::Dice,
        GameKind::ConnectFour,
        GameKind::TicTacToe,
        GameKind::Battleship,
    ];
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameKind::Dice => write!(f, "dice"),
            GameKind::ConnectFour => write!(f, "connect four"),
            GameKind::TicTacToe => write!(f, "tic-tac-toe"),
            GameKind::Battleship => write!(f, "battleship"),
        }
    }
}

impl FromStr for GameKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "dice" => Ok(GameKind::Dice),
            "connectfour" | "connect4" => Ok(GameKind::ConnectFour),
            "tictactoe" | "ttt" => Ok(GameKind::TicTacToe),
            "battleship" => Ok(GameKind::Battleship),
            _ => Err(format!("unknown game: {s}")),
        }
    }
}

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result", content = "seat")]
pub enum Outcome {
    /// The given seat won.
    Win(Seat),
    /// Nobody won.
    Draw,
}
