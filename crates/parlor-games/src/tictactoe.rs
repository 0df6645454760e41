//! Tic-tac-toe on a 3x3 grid. Cells are numbered 0-8, row by row.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, GameResult};
use crate::seat::{Outcome, Seat};

/// The eight winning lines.
pub const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// A tic-tac-toe game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicTacToe {
    cells: [Option<Seat>; 9],
    turn: Seat,
    outcome: Option<Outcome>,
}

impl Default for TicTacToe {
    fn default() -> Self {
        Self::new()
    }
}

impl TicTacToe {
    /// Empty grid with the challenger to move.
    pub fn new() -> Self {
        Self {
            cells: [None; 9],
            turn: Seat::Challenger,
            outcome: None,
        }
    }

    /// The seat to move, if the game is still running.
    pub fn turn(&self) -> Option<Seat> {
        self.outcome.is_none().then_some(self.turn)
    }

    /// The result, once decided.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Owner of a cell.
    pub fn cell(&self, index: usize) -> Option<Seat> {
        self.cells.get(index).copied().flatten()
    }

    /// Mark `cell` for `seat`.
    pub fn mark(&mut self, seat: Seat, cell: usize) -> GameResult<()> {
        if self.outcome.is_some() {
            return Err(GameError::GameOver);
        }
        if seat != self.turn {
            return Err(GameError::NotYourTurn);
        }
        let slot = self.cells.get_mut(cell).ok_or(GameError::NoSuchCell(cell))?;
        if slot.is_some() {
            return Err(GameError::CellTaken(cell));
        }
        *slot = Some(seat);

        if self.has_line(seat) {
            self.outcome = Some(Outcome::Win(seat));
        } else if self.cells.iter().all(Option::is_some) {
            self.outcome = Some(Outcome::Draw);
        } else {
            self.turn = seat.other();
        }
        Ok(())
    }

    fn has_line(&self, seat: Seat) -> bool {
        LINES
            .iter()
            .any(|line| line.iter().all(|&i| self.cells[i] == Some(seat)))
    }

    /// Text rendering, free cells shown by number (1-9).
    pub fn render(&self) -> String {
        self.cells
            .chunks(3)
            .enumerate()
            .map(|(r, row)| {
                row.iter()
                    .enumerate()
                    .map(|(c, cell)| match cell {
                        Some(seat) => seat.symbol(),
                        None => char::from(b'1' + (r * 3 + c) as u8),
                    })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn challenger_moves_first() {
        let mut g = TicTacToe::new();
        assert_eq!(g.mark(Seat::Opponent, 4), Err(GameError::NotYourTurn));
        g.mark(Seat::Challenger, 4).unwrap();
        assert_eq!(g.turn(), Some(Seat::Opponent));
    }

    #[test]
    fn occupied_cell_rejected() {
        let mut g = TicTacToe::new();
        g.mark(Seat::Challenger, 0).unwrap();
        assert_eq!(g.mark(Seat::Opponent, 0), Err(GameError::CellTaken(0)));
        assert_eq!(g.mark(Seat::Opponent, 9), Err(GameError::NoSuchCell(9)));
        assert_eq!(g.turn(), Some(Seat::Opponent));
    }

    #[test]
    fn every_line_wins_on_third_mark() {
        for line in LINES {
            let spare: Vec<usize> = (0..9).filter(|i| !line.contains(i)).collect();
            let mut g = TicTacToe::new();
            // Opponent fills cells that cannot complete a line with two marks.
            let fillers = [spare[0], spare[spare.len() - 1]];
            for (step, &cell) in line.iter().enumerate() {
                g.mark(Seat::Challenger, cell).unwrap();
                if step < 2 {
                    assert_eq!(g.outcome(), None, "line {line:?} too early");
                    g.mark(Seat::Opponent, fillers[step]).unwrap();
                }
            }
            assert_eq!(g.outcome(), Some(Outcome::Win(Seat::Challenger)), "line {line:?}");
        }
    }

    #[test]
    fn draw_on_full_board() {
        let mut g = TicTacToe::new();
        for (i, cell) in [0, 1, 2, 4, 3, 5, 7, 6, 8].into_iter().enumerate() {
            let seat = if i % 2 == 0 { Seat::Challenger } else { Seat::Opponent };
            g.mark(seat, cell).unwrap();
        }
        assert_eq!(g.outcome(), Some(Outcome::Draw));
    }

    #[test]
    fn render_numbers_free_cells() {
        let mut g = TicTacToe::new();
        g.mark(Seat::Challenger, 4).unwrap();
        assert_eq!(g.render(), "123\n4X6\n789");
    }

    proptest! {
        #[test]
        fn off_turn_marks_leave_board_unchanged(
            moves in proptest::collection::vec((any::<bool>(), 0usize..9), 0..20)
        ) {
            let mut g = TicTacToe::new();
            for (challenger, cell) in moves {
                let seat = if challenger { Seat::Challenger } else { Seat::Opponent };
                let before = g.clone();
                let res = g.mark(seat, cell);
                if before.turn() != Some(seat) {
                    prop_assert!(res.is_err());
                    prop_assert_eq!(&g, &before);
                }
            }
        }
    }
}
