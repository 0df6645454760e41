//! Connect-four on a 6x7 grid.
//!
//! Row 0 is the top of the grid. A piece dropped into a column lands in the
//! lowest empty row. The game is drawn once the top row is full with no line.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, GameResult};
use crate::seat::{Outcome, Seat};

/// Grid height.
pub const ROWS: usize = 6;
/// Grid width.
pub const COLS: usize = 7;

const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// A connect-four game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectFour {
    grid: [[Option<Seat>; COLS]; ROWS],
    turn: Seat,
    outcome: Option<Outcome>,
}

impl Default for ConnectFour {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectFour {
    /// Empty grid with the challenger to move.
    pub fn new() -> Self {
        Self {
            grid: [[None; COLS]; ROWS],
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
    pub fn cell(&self, row: usize, col: usize) -> Option<Seat> {
        self.grid.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    /// Drop a piece for `seat` into `column` (0-based). Returns the landing row.
    pub fn drop_piece(&mut self, seat: Seat, column: usize) -> GameResult<usize> {
        if self.outcome.is_some() {
            return Err(GameError::GameOver);
        }
        if seat != self.turn {
            return Err(GameError::NotYourTurn);
        }
        if column >= COLS {
            return Err(GameError::NoSuchColumn(column));
        }
        let row = (0..ROWS)
            .rev()
            .find(|&r| self.grid[r][column].is_none())
            .ok_or(GameError::ColumnFull(column))?;

        self.grid[row][column] = Some(seat);
        if self.wins_at(row, column) {
            self.outcome = Some(Outcome::Win(seat));
        } else if self.grid[0].iter().all(Option::is_some) {
            self.outcome = Some(Outcome::Draw);
        } else {
            self.turn = seat.other();
        }
        Ok(row)
    }

    fn wins_at(&self, row: usize, col: usize) -> bool {
        let Some(owner) = self.grid[row][col] else {
            return false;
        };
        DIRECTIONS.iter().any(|&(dr, dc)| {
            1 + self.run(row, col, dr, dc, owner) + self.run(row, col, -dr, -dc, owner) >= 4
        })
    }

    fn run(&self, row: usize, col: usize, dr: isize, dc: isize, owner: Seat) -> usize {
        let mut count = 0;
        let (mut r, mut c) = (row as isize + dr, col as isize + dc);
        while (0..ROWS as isize).contains(&r)
            && (0..COLS as isize).contains(&c)
            && self.grid[r as usize][c as usize] == Some(owner)
        {
            count += 1;
            r += dr;
            c += dc;
        }
        count
    }

    /// Text rendering with 1-based column labels.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for row in &self.grid {
            for cell in row {
                out.push(cell.map_or('.', Seat::symbol));
            }
            out.push('\n');
        }
        out.push_str("1234567");
        out
    }
}

/// Every winning line on the grid, as four (row, col) cells.
pub fn winning_lines() -> Vec<[(usize, usize); 4]> {
    let mut lines = Vec::new();
    for r in 0..ROWS as isize {
        for c in 0..COLS as isize {
            for &(dr, dc) in &DIRECTIONS {
                let end_r = r + 3 * dr;
                let end_c = c + 3 * dc;
                if (0..ROWS as isize).contains(&end_r) && (0..COLS as isize).contains(&end_c) {
                    let mut line = [(0, 0); 4];
                    for (i, cell) in line.iter_mut().enumerate() {
                        let i = i as isize;
                        *cell = ((r + i * dr) as usize, (c + i * dc) as usize);
                    }
                    lines.push(line);
                }
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn play(game: &mut ConnectFour, columns: &[usize]) {
        for &c in columns {
            let seat = game.turn().unwrap();
            game.drop_piece(seat, c).unwrap();
        }
    }

    #[test]
    fn pieces_stack_from_bottom() {
        let mut g = ConnectFour::new();
        assert_eq!(g.drop_piece(Seat::Challenger, 3), Ok(5));
        assert_eq!(g.drop_piece(Seat::Opponent, 3), Ok(4));
        assert_eq!(g.cell(5, 3), Some(Seat::Challenger));
        assert_eq!(g.cell(4, 3), Some(Seat::Opponent));
    }

    #[test]
    fn full_column_rejected() {
        let mut g = ConnectFour::new();
        play(&mut g, &[0, 0, 0, 0, 0, 0]);
        let before = g.clone();
        assert_eq!(
            g.drop_piece(g.turn().unwrap(), 0),
            Err(GameError::ColumnFull(0))
        );
        assert_eq!(g, before);
    }

    #[test]
    fn bad_column_and_turn() {
        let mut g = ConnectFour::new();
        assert_eq!(g.drop_piece(Seat::Challenger, 7), Err(GameError::NoSuchColumn(7)));
        assert_eq!(g.drop_piece(Seat::Opponent, 0), Err(GameError::NotYourTurn));
    }

    #[test]
    fn vertical_win() {
        let mut g = ConnectFour::new();
        play(&mut g, &[0, 1, 0, 1, 0, 1, 0]);
        assert_eq!(g.outcome(), Some(Outcome::Win(Seat::Challenger)));
        assert_eq!(g.turn(), None);
        assert_eq!(g.drop_piece(Seat::Opponent, 2), Err(GameError::GameOver));
    }

    #[test]
    fn diagonal_win() {
        let mut g = ConnectFour::new();
        // X builds a rising diagonal from (5,0) to (2,3).
        play(&mut g, &[0, 1, 1, 2, 2, 3, 2, 3, 3, 6, 3]);
        assert_eq!(g.outcome(), Some(Outcome::Win(Seat::Challenger)));
    }

    #[test]
    fn draw_when_top_row_full() {
        let mut g = ConnectFour::new();
        // Column pairs filled in an order that never lines up four.
        let order = [
            0, 1, 0, 1, 0, 1, 1, 0, 1, 0, 1, 0, 2, 3, 2, 3, 2, 3, 3, 2, 3, 2, 3, 2, 4, 5, 4, 5, 4,
            5, 5, 4, 5, 4, 5, 4, 6, 6, 6, 6, 6, 6,
        ];
        play(&mut g, &order);
        assert_eq!(g.outcome(), Some(Outcome::Draw));
    }

    #[test]
    fn there_are_69_lines() {
        assert_eq!(winning_lines().len(), 69);
    }

    #[test]
    fn every_line_detected_on_final_piece() {
        for line in winning_lines() {
            let mut g = ConnectFour::new();
            for (i, &(r, c)) in line.iter().enumerate() {
                g.grid[r][c] = Some(Seat::Opponent);
                let won = line[..=i].iter().any(|&(r, c)| g.wins_at(r, c));
                assert_eq!(won, i == 3, "line {line:?} after {} pieces", i + 1);
            }
        }
    }

    proptest! {
        #[test]
        fn off_turn_moves_leave_board_unchanged(
            moves in proptest::collection::vec((any::<bool>(), 0usize..COLS), 0..60)
        ) {
            let mut g = ConnectFour::new();
            for (challenger, col) in moves {
                let seat = if challenger { Seat::Challenger } else { Seat::Opponent };
                let before = g.clone();
                let res = g.drop_piece(seat, col);
                if before.turn() != Some(seat) {
                    prop_assert!(res.is_err());
                    prop_assert_eq!(&g, &before);
                }
            }
        }
    }
}
