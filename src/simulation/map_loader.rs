//! Map sources
//!
//! The engine only needs something that can hand it a fresh [`TileGrid`].
//! Three sources ship with the crate: the built-in crossroads map, a small
//! text layout with one character per tile, and the same layout kept in a
//! file that is read again on every load.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::tile::{Tile, TileGrid};
use super::types::{Direction, TileCoord};

/// Produces the tile layout for a new world
pub trait MapLoader: Send {
    fn load(&self) -> Result<TileGrid>;
}

/// The default two-by-two crossroads map
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossroadsLoader;

impl MapLoader for CrossroadsLoader {
    fn load(&self) -> Result<TileGrid> {
        Ok(TileGrid::crossroads())
    }
}

/// Text layout, one row per line:
///
/// | char            | tile                    |
/// |-----------------|-------------------------|
/// | `.`             | empty                   |
/// | `#`             | obstacle                |
/// | `^` `>` `v` `<` | lane heading N, E, S, W |
/// | `+`             | intersection            |
#[derive(Debug, Clone)]
pub struct AsciiMapLoader {
    layout: String,
}

impl AsciiMapLoader {
    pub fn new(layout: impl Into<String>) -> Self {
        Self {
            layout: layout.into(),
        }
    }
}

impl MapLoader for AsciiMapLoader {
    fn load(&self) -> Result<TileGrid> {
        let rows: Vec<&str> = self
            .layout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let Some(first) = rows.first() else {
            bail!("Map layout is empty");
        };
        let width = first.chars().count();

        let mut grid = TileGrid::new(width, rows.len());
        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                bail!(
                    "Map row {} has {} tiles, expected {}",
                    y,
                    row.chars().count(),
                    width
                );
            }
            for (x, symbol) in row.chars().enumerate() {
                let tile = match symbol {
                    '.' => Tile::Empty,
                    '#' => Tile::Obstacle,
                    '^' => Tile::lane(Direction::North),
                    '>' => Tile::lane(Direction::East),
                    'v' => Tile::lane(Direction::South),
                    '<' => Tile::lane(Direction::West),
                    '+' => Tile::intersection(),
                    other => bail!("Unknown map symbol {:?} at ({}, {})", other, x, y),
                };
                grid.set(TileCoord::new(x, y), tile)?;
            }
        }

        Ok(grid)
    }
}

/// Text layout stored on disk
///
/// The file is read on every `load`, so a reset with reload picks up edits.
#[derive(Debug, Clone)]
pub struct FileMapLoader {
    path: PathBuf,
}

impl FileMapLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MapLoader for FileMapLoader {
    fn load(&self) -> Result<TileGrid> {
        let layout = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read map file {}", self.path.display()))?;
        AsciiMapLoader::new(layout)
            .load()
            .with_context(|| format!("Invalid map file {}", self.path.display()))
    }
}
