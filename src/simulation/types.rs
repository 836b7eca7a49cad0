//! Core types for the traffic simulation
//!
//! Identifiers, grid coordinates and the vehicle taxonomy shared by every
//! other simulation module.

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimId(pub usize);

/// A wrapper type for vehicle IDs
///
/// IDs are handed out in increasing order, so sorting by ID yields creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VehicleId(pub SimId);

/// Kind of vehicle in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleKind {
    /// Regular car, the only kind whose behavior varies
    Car,
    /// Slow heavy vehicle, always drives cautiously
    Truck,
    /// Emergency vehicle that projects an area of effect
    Ambulance,
}

/// Decision policy fixed at spawn time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Behavior {
    /// Always yields and keeps its distance
    Cautious,
    /// Flips a coin between cautious and reckless at every decision
    Semi,
    /// Ignores right-of-way and tailgates
    Reckless,
}

/// Heading on the grid. `y` grows towards the south.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Unit offset of one step in this direction
    pub fn delta(self) -> (i64, i64) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }
}

/// A cell position in the tile grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TileCoord {
    pub x: usize,
    pub y: usize,
}

impl TileCoord {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// The neighbouring coordinate in `direction`, or `None` when it would be negative.
    /// Upper bounds are checked by the grid.
    pub fn step(&self, direction: Direction) -> Option<TileCoord> {
        let (dx, dy) = direction.delta();
        let x = self.x.checked_add_signed(dx as isize)?;
        let y = self.y.checked_add_signed(dy as isize)?;
        Some(TileCoord { x, y })
    }

    pub fn distance(&self, other: &TileCoord) -> f32 {
        let dx = self.x as f32 - other.x as f32;
        let dy = self.y as f32 - other.y as f32;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Progress a vehicle must accumulate before it may move one tile
pub const TILE_LENGTH: f32 = 100.0;

/// Radius, in tiles, of an ambulance's area of effect
pub const AOE_RADIUS: f32 = 3.0;

/// Maximum number of ambulances alive at the same time
pub const MAX_AMBULANCES: usize = 5;

/// Share of risky cars that get the semi behavior instead of reckless
pub const SEMI_SHARE: f64 = 0.3;

/// Chance that a reckless driver still yields to an emergency override
pub const RECKLESS_YIELD_PROBABILITY: f64 = 0.5;

/// Chance that a semi driver acts recklessly on a given decision
pub const SEMI_RECKLESS_PROBABILITY: f64 = 0.5;

/// Simulated milliseconds between two statistics samples
pub const STATISTICS_INTERVAL_MS: u64 = 500;
