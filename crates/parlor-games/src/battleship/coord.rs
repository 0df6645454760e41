//! Grid coordinates and ship orientation.
//!
//! Coordinates are written as a column letter A-J followed by a row number
//! 1-10, e.g. `B7`. Placements append `H` (rightwards) or `V` (downwards).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GameError;

/// Side length of a battleship grid.
pub const SIZE: u8 = 10;

/// A cell on a 10x10 grid, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawCoord")]
pub struct Coord {
    /// Column, 0 = A.
    pub col: u8,
    /// Row, 0 = 1.
    pub row: u8,
}

impl Coord {
    /// A coordinate, if it lies on the grid.
    pub fn new(col: u8, row: u8) -> Option<Self> {
        (col < SIZE && row < SIZE).then_some(Self { col, row })
    }

    /// Step `n` cells in `orientation`, if the result stays on the grid.
    pub fn step(self, orientation: Orientation, n: u8) -> Option<Self> {
        match orientation {
            Orientation::Horizontal => Coord::new(self.col.checked_add(n)?, self.row),
            Orientation::Vertical => Coord::new(self.col, self.row.checked_add(n)?),
        }
    }
}

#[derive(Deserialize)]
struct RawCoord {
    col: u8,
    row: u8,
}

impl TryFrom<RawCoord> for Coord {
    type Error = GameError;

    fn try_from(raw: RawCoord) -> Result<Self, Self::Error> {
        Coord::new(raw.col, raw.row)
            .ok_or_else(|| GameError::BadCoordinate(format!("col {} row {}", raw.col, raw.row)))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = char::from_u32(u32::from(b'A') + u32::from(self.col)).unwrap_or('?');
        write!(f, "{letter}{}", u16::from(self.row) + 1)
    }
}

impl FromStr for Coord {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || GameError::BadCoordinate(s.to_string());
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let letter = chars.next().ok_or_else(bad)?.to_ascii_uppercase();
        if !('A'..='J').contains(&letter) {
            return Err(bad());
        }
        let row: u8 = chars.as_str().parse().map_err(|_| bad())?;
        if !(1..=SIZE).contains(&row) {
            return Err(bad());
        }
        Ok(Coord {
            col: letter as u8 - b'A',
            row: row - 1,
        })
    }
}

/// Direction a ship extends from its origin cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Towards higher columns.
    Horizontal,
    /// Towards higher rows.
    Vertical,
}

impl FromStr for Orientation {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "H" => Ok(Orientation::Horizontal),
            "V" => Ok(Orientation::Vertical),
            _ => Err(GameError::BadPlacement(s.to_string())),
        }
    }
}

/// Parse a placement such as `A1 H`.
pub fn parse_placement(s: &str) -> Result<(Coord, Orientation), GameError> {
    let mut parts = s.split_whitespace();
    let (Some(coord), Some(orientation), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(GameError::BadPlacement(s.to_string()));
    };
    let coord = coord
        .parse()
        .map_err(|_| GameError::BadPlacement(s.to_string()))?;
    let orientation = orientation
        .parse()
        .map_err(|_| GameError::BadPlacement(s.to_string()))?;
    Ok((coord, orientation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_corners() {
        assert_eq!("A1".parse::<Coord>(), Ok(Coord { col: 0, row: 0 }));
        assert_eq!("j10".parse::<Coord>(), Ok(Coord { col: 9, row: 9 }));
        assert_eq!(Coord { col: 1, row: 6 }.to_string(), "B7");
    }

    #[test]
    fn parse_rejects_off_grid() {
        for bad in ["", "K1", "A0", "A11", "1A", "AA", "B-1"] {
            assert!(bad.parse::<Coord>().is_err(), "{bad}");
        }
    }

    #[test]
    fn placement_notation() {
        assert_eq!(
            parse_placement("c3 v"),
            Ok((Coord { col: 2, row: 2 }, Orientation::Vertical))
        );
        assert!(parse_placement("C3").is_err());
        assert!(parse_placement("C3 H extra").is_err());
        assert!(parse_placement("C3 X").is_err());
    }

    #[test]
    fn deserialize_checks_bounds() {
        let c: Coord = serde_json::from_str(r#"{"col": 9, "row": 0}"#).unwrap();
        assert_eq!(c, Coord { col: 9, row: 0 });
        let err = serde_json::from_str::<Coord>(r#"{"col": 10, "row": 0}"#).unwrap_err();
        assert!(err.to_string().contains("invalid coordinate"));
        assert!(serde_json::from_str::<Coord>(r#"{"col": 0, "row": 255}"#).is_err());
    }

    #[test]
    fn display_never_overflows() {
        assert_eq!(Coord { col: 10, row: 0 }.to_string(), "K1");
        assert!(Coord { col: 255, row: 255 }.to_string().ends_with("256"));
    }

    #[test]
    fn stepping_off_grid() {
        let c = Coord::new(8, 0).unwrap();
        assert_eq!(c.step(Orientation::Horizontal, 1), Coord::new(9, 0));
        assert_eq!(c.step(Orientation::Horizontal, 2), None);
        assert_eq!(c.step(Orientation::Vertical, 9), Coord::new(8, 9));
    }
}
