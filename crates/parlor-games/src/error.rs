//! Error types for the rule modules.

use crate::battleship::Coord;
use crate::seat::GameKind;

/// Errors raised when a move is rejected. A rejected move never changes the board.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// The acting player does not hold the turn.
    #[error("it is not your turn")]
    NotYourTurn,

    /// The game has already been decided.
    #[error("the game is already over")]
    GameOver,

    /// The move does not belong to this game.
    #[error("that move is not valid in {0}")]
    WrongGame(GameKind),

    /// A die value outside 1-6.
    #[error("invalid die value: {0}")]
    InvalidDie(u8),

    /// An unsupported best-of round count.
    #[error("invalid round count: {0}")]
    InvalidRounds(u8),

    /// A connect-four column outside the grid.
    #[error("column {0} does not exist")]
    NoSuchColumn(usize),

    /// A connect-four column with no free cells.
    #[error("column {0} is full")]
    ColumnFull(usize),

    /// A tic-tac-toe cell outside the grid.
    #[error("cell {0} does not exist")]
    NoSuchCell(usize),

    /// A tic-tac-toe cell that is already marked.
    #[error("cell {0} is already taken")]
    CellTaken(usize),

    /// A battleship coordinate that could not be parsed.
    #[error("invalid coordinate '{0}', expected a column A-J and a row 1-10 (e.g. B7)")]
    BadCoordinate(String),

    /// A battleship placement that could not be parsed.
    #[error("invalid placement '{0}', expected a coordinate and H or V (e.g. A1 H)")]
    BadPlacement(String),

    /// A ship that would extend past the grid edge.
    #[error("ship does not fit on the board from {0}")]
    OutOfBounds(Coord),

    /// A ship that would overlap another ship.
    #[error("ship overlaps another ship at {0}")]
    Overlap(Coord),

    /// A player tried to place a ship after finishing their fleet.
    #[error("your fleet is already placed")]
    FleetPlaced,

    /// A player tried to fire before both fleets are placed.
    #[error("both fleets must be placed before firing")]
    PlacementPending,

    /// A player tried to place a ship during the firing phase.
    #[error("ships can no longer be placed")]
    PlacementClosed,

    /// A cell that has already been fired at.
    #[error("{0} has already been fired at")]
    AlreadyFired(Coord),
}

/// Convenience result type for rule operations.
pub type GameResult<T> = Result<T, GameError>;
