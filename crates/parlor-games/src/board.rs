//! Game-type dispatch.
//!
//! A session carries one [`Board`]. Moves arrive as typed [`Move`] values and
//! are routed to the owning rule module; every accepted move yields a
//! [`Progress`]. A rejected move leaves the board exactly as it was.

use serde::{Deserialize, Serialize};

use crate::battleship::{Battleship, Coord, Orientation, Placement, Shot};
use crate::connect_four::ConnectFour;
use crate::dice::{DiceMatch, RollEffect};
use crate::error::{GameError, GameResult};
use crate::seat::{GameKind, Outcome, Seat};
use crate::tictactoe::TicTacToe;

/// A move submitted by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Move {
    /// A die roll. `value` is filled by the platform or the engine.
    Roll {
        /// Face value 1-6.
        value: u8,
    },
    /// Drop a connect-four piece into a 0-based column.
    Drop {
        /// Target column.
        column: usize,
    },
    /// Mark a tic-tac-toe cell (0-8).
    Mark {
        /// Target cell.
        cell: usize,
    },
    /// Place the next battleship.
    Place {
        /// Bow cell.
        origin: Coord,
        /// Direction the hull extends.
        orientation: Orientation,
    },
    /// Fire at a battleship cell.
    Fire {
        /// Target cell on the other grid.
        target: Coord,
    },
}

/// What an accepted move did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "report")]
pub enum Report {
    /// Dice roll recorded.
    Rolled {
        /// The value rolled.
        value: u8,
        /// Round effect.
        effect: RollEffect,
    },
    /// Connect-four piece landed.
    Dropped {
        /// Column played.
        column: usize,
        /// Row it landed in (0 = top).
        row: usize,
    },
    /// Tic-tac-toe cell marked.
    Marked {
        /// Cell played.
        cell: usize,
    },
    /// Battleship placed.
    Placed(Placement),
    /// Battleship attack resolved.
    Fired(Shot),
}

/// Result of an accepted move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// What happened.
    pub report: Report,
    /// Set when this move ended the game.
    pub outcome: Option<Outcome>,
}

/// Game-specific state of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "game", content = "state")]
pub enum Board {
    /// Dice duel.
    Dice(DiceMatch),
    /// Connect-four grid.
    ConnectFour(ConnectFour),
    /// Tic-tac-toe grid.
    TicTacToe(TicTacToe),
    /// Battleship grids.
    Battleship(Box<Battleship>),
}

impl Board {
    /// Fresh board for `kind`. `rounds` is only consulted for dice.
    pub fn new(kind: GameKind, rounds: Option<u8>) -> GameResult<Self> {
        Ok(match kind {
            GameKind::Dice => {
                Board::Dice(DiceMatch::new(rounds.ok_or(GameError::InvalidRounds(0))?)?)
            }
            GameKind::ConnectFour => Board::ConnectFour(ConnectFour::new()),
            GameKind::TicTacToe => Board::TicTacToe(TicTacToe::new()),
            GameKind::Battleship => Board::Battleship(Box::default()),
        })
    }

    /// The game this board belongs to.
    pub fn kind(&self) -> GameKind {
        match self {
            Board::Dice(_) => GameKind::Dice,
            Board::ConnectFour(_) => GameKind::ConnectFour,
            Board::TicTacToe(_) => GameKind::TicTacToe,
            Board::Battleship(_) => GameKind::Battleship,
        }
    }

    /// Whether `seat` may move right now.
    pub fn can_act(&self, seat: Seat) -> bool {
        match self {
            Board::Dice(m) => m.can_roll(seat),
            Board::ConnectFour(g) => g.turn() == Some(seat),
            Board::TicTacToe(g) => g.turn() == Some(seat),
            Board::Battleship(g) => g.can_act(seat),
        }
    }

    /// The seat to move, when exactly one seat holds the turn.
    pub fn turn(&self) -> Option<Seat> {
        match self {
            Board::Dice(m) => m.waiting_on(),
            Board::ConnectFour(g) => g.turn(),
            Board::TicTacToe(g) => g.turn(),
            Board::Battleship(g) => g.turn(),
        }
    }

    /// The result, once decided.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Board::Dice(m) => m.outcome(),
            Board::ConnectFour(g) => g.outcome(),
            Board::TicTacToe(g) => g.outcome(),
            Board::Battleship(g) => g.outcome(),
        }
    }

    /// Apply `mv` for `seat`.
    pub fn apply(&mut self, seat: Seat, mv: &Move) -> GameResult<Progress> {
        let report = match (&mut *self, mv) {
            (Board::Dice(m), Move::Roll { value }) => Report::Rolled {
                value: *value,
                effect: m.roll(seat, *value)?,
            },
            (Board::ConnectFour(g), Move::Drop { column }) => Report::Dropped {
                column: *column,
                row: g.drop_piece(seat, *column)?,
            },
            (Board::TicTacToe(g), Move::Mark { cell }) => {
                g.mark(seat, *cell)?;
                Report::Marked { cell: *cell }
            }
            (
                Board::Battleship(g),
                Move::Place {
                    origin,
                    orientation,
                },
            ) => Report::Placed(g.place(seat, *origin, *orientation)?),
            (Board::Battleship(g), Move::Fire { target }) => Report::Fired(g.fire(seat, *target)?),
            (board, _) => return Err(GameError::WrongGame(board.kind())),
        };
        Ok(Progress {
            report,
            outcome: self.outcome(),
        })
    }

    /// Public text rendering of the board.
    pub fn render(&self) -> String {
        match self {
            Board::Dice(m) => m.render(),
            Board::ConnectFour(g) => g.render(),
            Board::TicTacToe(g) => g.render(),
            Board::Battleship(g) => {
                if g.in_placement() {
                    "ships are being placed".to_string()
                } else {
                    format!(
                        "challenger's shots:\n{}\n\nopponent's shots:\n{}",
                        g.render_target(Seat::Challenger),
                        g.render_target(Seat::Opponent)
                    )
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_boards() {
        assert_eq!(Board::new(GameKind::TicTacToe, None).unwrap().kind(), GameKind::TicTacToe);
        assert_eq!(
            Board::new(GameKind::Dice, None),
            Err(GameError::InvalidRounds(0))
        );
        assert!(Board::new(GameKind::Dice, Some(5)).is_ok());
    }

    #[test]
    fn wrong_move_for_game() {
        let mut b = Board::new(GameKind::ConnectFour, None).unwrap();
        let before = b.clone();
        assert_eq!(
            b.apply(Seat::Challenger, &Move::Mark { cell: 1 }),
            Err(GameError::WrongGame(GameKind::ConnectFour))
        );
        assert_eq!(b, before);
    }

    #[test]
    fn progress_reports_outcome() {
        let mut b = Board::new(GameKind::TicTacToe, None).unwrap();
        for (seat, cell) in [
            (Seat::Challenger, 0),
            (Seat::Opponent, 3),
            (Seat::Challenger, 1),
            (Seat::Opponent, 4),
        ] {
            let p = b.apply(seat, &Move::Mark { cell }).unwrap();
            assert_eq!(p.outcome, None);
        }
        let p = b.apply(Seat::Challenger, &Move::Mark { cell: 2 }).unwrap();
        assert_eq!(p.outcome, Some(Outcome::Win(Seat::Challenger)));
    }

    #[test]
    fn dice_turn_is_open_until_first_roll() {
        let mut b = Board::new(GameKind::Dice, Some(3)).unwrap();
        assert!(b.can_act(Seat::Challenger));
        assert!(b.can_act(Seat::Opponent));
        b.apply(Seat::Opponent, &Move::Roll { value: 2 }).unwrap();
        assert!(!b.can_act(Seat::Opponent));
        assert_eq!(b.turn(), Some(Seat::Challenger));
    }

    #[test]
    fn move_json_is_tagged() {
        let mv: Move = serde_json::from_str(r#"{"kind":"fire","target":{"col":1,"row":6}}"#).unwrap();
        assert_eq!(
            mv,
            Move::Fire {
                target: Coord { col: 1, row: 6 }
            }
        );
    }
}
