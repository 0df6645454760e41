//! Battleship: two hidden 10x10 grids and a fixed five-ship fleet.
//!
//! Play has two phases. During placement each player independently places
//! their ships in [`FLEET`] order. Once both fleets are down, players take
//! turns firing at single cells of the other grid, challenger first.

mod coord;

pub use coord::{Coord, Orientation, SIZE, parse_placement};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, GameResult};
use crate::seat::{Outcome, Seat};

/// Ship classes, placed in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipKind {
    /// Five cells.
    Carrier,
    /// Four cells.
    Battleship,
    /// Three cells.
    Cruiser,
    /// Three cells.
    Submarine,
    /// Two cells.
    Destroyer,
}

/// The fleet every player must place.
pub const FLEET: [ShipKind; 5] = [
    ShipKind::Carrier,
    ShipKind::Battleship,
    ShipKind::Cruiser,
    ShipKind::Submarine,
    ShipKind::Destroyer,
];

impl ShipKind {
    /// Number of cells the ship occupies.
    pub fn size(self) -> u8 {
        match self {
            ShipKind::Carrier => 5,
            ShipKind::Battleship => 4,
            ShipKind::Cruiser | ShipKind::Submarine => 3,
            ShipKind::Destroyer => 2,
        }
    }
}

impl fmt::Display for ShipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShipKind::Carrier => "Carrier",
            ShipKind::Battleship => "Battleship",
            ShipKind::Cruiser => "Cruiser",
            ShipKind::Submarine => "Submarine",
            ShipKind::Destroyer => "Destroyer",
        };
        write!(f, "{name} ({})", self.size())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Cell {
    Water,
    Ship(u8),
    Miss,
    Hit(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Ship {
    kind: ShipKind,
    cells: Vec<Coord>,
    hits: u8,
}

impl Ship {
    fn is_sunk(&self) -> bool {
        self.hits as usize >= self.cells.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Fleet {
    grid: [[Cell; SIZE as usize]; SIZE as usize],
    ships: Vec<Ship>,
}

impl Fleet {
    fn new() -> Self {
        Self {
            grid: [[Cell::Water; SIZE as usize]; SIZE as usize],
            ships: Vec::new(),
        }
    }

    fn at(&self, c: Coord) -> Cell {
        self.grid[c.row as usize][c.col as usize]
    }

    fn set(&mut self, c: Coord, cell: Cell) {
        self.grid[c.row as usize][c.col as usize] = cell;
    }

    fn next_ship(&self) -> Option<ShipKind> {
        FLEET.get(self.ships.len()).copied()
    }

    fn is_placed(&self) -> bool {
        self.ships.len() == FLEET.len()
    }

    fn all_sunk(&self) -> bool {
        self.is_placed() && self.ships.iter().all(Ship::is_sunk)
    }

    fn place(&mut self, origin: Coord, orientation: Orientation) -> GameResult<ShipKind> {
        let kind = self.next_ship().ok_or(GameError::FleetPlaced)?;
        let cells = (0..kind.size())
            .map(|n| origin.step(orientation, n))
            .collect::<Option<Vec<_>>>()
            .ok_or(GameError::OutOfBounds(origin))?;
        if let Some(&clash) = cells.iter().find(|&&c| self.at(c) != Cell::Water) {
            return Err(GameError::Overlap(clash));
        }
        let index = self.ships.len() as u8;
        for &c in &cells {
            self.set(c, Cell::Ship(index));
        }
        self.ships.push(Ship {
            kind,
            cells,
            hits: 0,
        });
        Ok(kind)
    }

    fn receive(&mut self, target: Coord) -> GameResult<Shot> {
        match self.at(target) {
            Cell::Miss | Cell::Hit(_) => Err(GameError::AlreadyFired(target)),
            Cell::Water => {
                self.set(target, Cell::Miss);
                Ok(Shot {
                    target,
                    hit: false,
                    sunk: None,
                })
            }
            Cell::Ship(index) => {
                self.set(target, Cell::Hit(index));
                let ship = &mut self.ships[index as usize];
                ship.hits += 1;
                Ok(Shot {
                    target,
                    hit: true,
                    sunk: ship.is_sunk().then_some(ship.kind),
                })
            }
        }
    }

    fn render(&self, reveal: bool) -> String {
        let mut out = String::from("  ABCDEFGHIJ\n");
        for (r, row) in self.grid.iter().enumerate() {
            out.push_str(&format!("{:>2}", r + 1));
            for cell in row {
                out.push(match cell {
                    Cell::Water => '~',
                    Cell::Ship(_) if reveal => '#',
                    Cell::Ship(_) => '~',
                    Cell::Miss => 'o',
                    Cell::Hit(_) => 'x',
                });
            }
            out.push('\n');
        }
        out.truncate(out.trim_end().len());
        out
    }
}

/// Result of a single attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shot {
    /// The attacked cell.
    pub target: Coord,
    /// Whether a ship segment was struck.
    pub hit: bool,
    /// The ship sunk by this shot, if any.
    pub sunk: Option<ShipKind>,
}

/// Result of placing a ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// The ship just placed.
    pub ship: ShipKind,
    /// The placing player's next ship, if any remain.
    pub next: Option<ShipKind>,
    /// Whether both fleets are now complete and firing may begin.
    pub battle_ready: bool,
}

/// A battleship game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Battleship {
    fleets: [Fleet; 2],
    turn: Seat,
    outcome: Option<Outcome>,
}

impl Default for Battleship {
    fn default() -> Self {
        Self::new()
    }
}

impl Battleship {
    /// Fresh game in the placement phase.
    pub fn new() -> Self {
        Self {
            fleets: [Fleet::new(), Fleet::new()],
            turn: Seat::Challenger,
            outcome: None,
        }
    }

    /// Whether either fleet still has ships to place.
    pub fn in_placement(&self) -> bool {
        !self.fleets.iter().all(Fleet::is_placed)
    }

    /// The next ship `seat` must place, if any.
    pub fn next_ship(&self, seat: Seat) -> Option<ShipKind> {
        self.fleets[seat.index()].next_ship()
    }

    /// The seat to fire next, once the firing phase has begun.
    pub fn turn(&self) -> Option<Seat> {
        (self.outcome.is_none() && !self.in_placement()).then_some(self.turn)
    }

    /// Whether `seat` may act right now.
    pub fn can_act(&self, seat: Seat) -> bool {
        if self.outcome.is_some() {
            false
        } else if self.in_placement() {
            self.next_ship(seat).is_some()
        } else {
            self.turn == seat
        }
    }

    /// The result, once decided.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Place `seat`'s next ship.
    pub fn place(
        &mut self,
        seat: Seat,
        origin: Coord,
        orientation: Orientation,
    ) -> GameResult<Placement> {
        if self.outcome.is_some() {
            return Err(GameError::GameOver);
        }
        if !self.in_placement() {
            return Err(GameError::PlacementClosed);
        }
        let fleet = &mut self.fleets[seat.index()];
        let ship = fleet.place(origin, orientation)?;
        Ok(Placement {
            ship,
            next: fleet.next_ship(),
            battle_ready: !self.in_placement(),
        })
    }

    /// Fire at `target` on the other player's grid.
    pub fn fire(&mut self, seat: Seat, target: Coord) -> GameResult<Shot> {
        if self.outcome.is_some() {
            return Err(GameError::GameOver);
        }
        if self.in_placement() {
            return Err(GameError::PlacementPending);
        }
        if seat != self.turn {
            return Err(GameError::NotYourTurn);
        }
        let target = Coord::new(target.col, target.row).ok_or(GameError::OutOfBounds(target))?;
        let defender = &mut self.fleets[seat.other().index()];
        let shot = defender.receive(target)?;
        if defender.all_sunk() {
            self.outcome = Some(Outcome::Win(seat));
        } else {
            self.turn = seat.other();
        }
        Ok(shot)
    }

    /// `seat`'s own grid with ships visible.
    pub fn render_own(&self, seat: Seat) -> String {
        self.fleets[seat.index()].render(true)
    }

    /// `seat`'s view of the other grid: hits and misses only.
    pub fn render_target(&self, seat: Seat) -> String {
        self.fleets[seat.other().index()].render(false)
    }
}
