//! Tile grid the vehicles drive on
//!
//! The grid owns per-tile occupancy: which vehicle holds a lane, and which
//! vehicles are currently crossing an intersection.

use anyhow::{bail, Context, Result};

use super::intersection::IntersectionState;
use super::types::{Direction, TileCoord, VehicleId};

/// A single cell of the map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tile {
    Empty,
    Obstacle,
    /// One-way lane; at most one vehicle at a time
    Lane {
        direction: Direction,
        occupant: Option<VehicleId>,
    },
    Intersection(IntersectionState),
}

impl Tile {
    pub fn lane(direction: Direction) -> Self {
        Tile::Lane {
            direction,
            occupant: None,
        }
    }

    pub fn intersection() -> Self {
        Tile::Intersection(IntersectionState::new())
    }

    pub fn is_drivable(&self) -> bool {
        matches!(self, Tile::Lane { .. } | Tile::Intersection(_))
    }

    pub fn lane_direction(&self) -> Option<Direction> {
        match self {
            Tile::Lane { direction, .. } => Some(*direction),
            _ => None,
        }
    }
}

/// Rectangular grid of tiles, stored row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileGrid {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
}

impl TileGrid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            tiles: vec![Tile::Empty; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, coord: TileCoord) -> bool {
        coord.x < self.width && coord.y < self.height
    }

    fn index(&self, coord: TileCoord) -> Option<usize> {
        self.contains(coord).then(|| coord.y * self.width + coord.x)
    }

    pub fn get(&self, coord: TileCoord) -> Option<&Tile> {
        self.index(coord).and_then(|i| self.tiles.get(i))
    }

    fn get_mut(&mut self, coord: TileCoord) -> Option<&mut Tile> {
        self.index(coord).and_then(|i| self.tiles.get_mut(i))
    }

    pub fn set(&mut self, coord: TileCoord, tile: Tile) -> Result<()> {
        let slot = self
            .get_mut(coord)
            .with_context(|| format!("Tile {:?} is outside the grid", coord))?;
        *slot = tile;
        Ok(())
    }

    /// Neighbour of `coord` in `direction`, if it lies on the grid
    pub fn neighbor(&self, coord: TileCoord, direction: Direction) -> Option<TileCoord> {
        coord.step(direction).filter(|next| self.contains(*next))
    }

    /// All coordinates in row-major order
    pub fn coords(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| TileCoord::new(x, y)))
    }

    /// Whether a lane tile is taken. Intersections and non-drivable tiles report `false`.
    pub fn lane_occupied(&self, coord: TileCoord) -> bool {
        matches!(
            self.get(coord),
            Some(Tile::Lane {
                occupant: Some(_),
                ..
            })
        )
    }

    pub fn intersection(&self, coord: TileCoord) -> Option<&IntersectionState> {
        match self.get(coord) {
            Some(Tile::Intersection(state)) => Some(state),
            _ => None,
        }
    }

    /// Place a vehicle on a tile
    ///
    /// Fails if the tile is not drivable or is a lane held by another vehicle.
    pub fn occupy(&mut self, coord: TileCoord, vehicle_id: VehicleId) -> Result<()> {
        match self.get_mut(coord) {
            Some(Tile::Lane { occupant, .. }) => match occupant {
                Some(other) if *other != vehicle_id => {
                    bail!("Lane {:?} already held by {:?}", coord, other)
                }
                _ => {
                    *occupant = Some(vehicle_id);
                    Ok(())
                }
            },
            Some(Tile::Intersection(state)) => {
                state.enter(vehicle_id);
                Ok(())
            }
            Some(_) => bail!("Tile {:?} is not drivable", coord),
            None => bail!("Tile {:?} is outside the grid", coord),
        }
    }

    /// Remove a vehicle from a tile; no-op if it was not there
    pub fn vacate(&mut self, coord: TileCoord, vehicle_id: VehicleId) {
        match self.get_mut(coord) {
            Some(Tile::Lane { occupant, .. }) if *occupant == Some(vehicle_id) => {
                *occupant = None;
            }
            Some(Tile::Intersection(state)) => state.release(vehicle_id),
            _ => {}
        }
    }

    /// Drop every occupant, keeping the layout
    pub fn clear_occupants(&mut self) {
        for tile in &mut self.tiles {
            match tile {
                Tile::Lane { occupant, .. } => *occupant = None,
                Tile::Intersection(state) => state.clear(),
                _ => {}
            }
        }
    }

    /// Number of lane tiles held by `vehicle_id`; used by invariant checks
    pub fn lanes_held_by(&self, vehicle_id: VehicleId) -> usize {
        self.tiles
            .iter()
            .filter(|t| matches!(t, Tile::Lane { occupant: Some(id), .. } if *id == vehicle_id))
            .count()
    }

    /// Default map: two two-lane roads in each axis crossing in four junctions
    ///
    /// Traffic drives on the right, which gives eight entry lanes on the border.
    pub fn crossroads() -> Self {
        const SIZE: usize = 16;
        const ROADS: [usize; 2] = [4, 10];

        let mut grid = TileGrid::new(SIZE, SIZE);
        for coord in (0..SIZE).flat_map(|y| (0..SIZE).map(move |x| TileCoord::new(x, y))) {
            let horizontal = ROADS.iter().find(|r| coord.y == **r || coord.y == **r + 1);
            let vertical = ROADS.iter().find(|c| coord.x == **c || coord.x == **c + 1);

            let tile = match (horizontal, vertical) {
                (Some(_), Some(_)) => Tile::intersection(),
                (Some(row), None) if coord.y == *row => Tile::lane(Direction::West),
                (Some(_), None) => Tile::lane(Direction::East),
                (None, Some(col)) if coord.x == *col => Tile::lane(Direction::South),
                (None, Some(_)) => Tile::lane(Direction::North),
                (None, None) => Tile::Obstacle,
            };
            if let Some(slot) = grid.get_mut(coord) {
                *slot = tile;
            }
        }
        grid
    }
}
