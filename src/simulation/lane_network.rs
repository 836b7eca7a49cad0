//! Lane connectivity graph
//!
//! Built once from a [`TileGrid`]. Nodes are drivable tiles, edges are legal
//! single-tile moves labelled with the direction of travel.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};

use super::tile::{Tile, TileGrid};
use super::types::{Direction, TileCoord};

#[derive(Debug, Default, Clone)]
pub struct SimLaneNetwork {
    /// The underlying petgraph directed graph
    graph: DiGraph<TileCoord, Direction>,

    /// Maps tile coordinates to their node indices in the graph
    tile_to_node: HashMap<TileCoord, NodeIndex>,

    /// Boundary lanes pointing into the map, with their direction
    entry_points: Vec<(TileCoord, Direction)>,

    /// Boundary lanes pointing off the map
    exits: HashSet<TileCoord>,
}

impl SimLaneNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the graph from the grid layout
    pub fn build(grid: &TileGrid) -> Self {
        let mut network = Self::new();

        for coord in grid.coords() {
            if grid.get(coord).is_some_and(Tile::is_drivable) {
                let node = network.graph.add_node(coord);
                network.tile_to_node.insert(coord, node);
            }
        }

        for coord in grid.coords() {
            match grid.get(coord) {
                Some(Tile::Lane { direction, .. }) => {
                    let direction = *direction;
                    match grid.neighbor(coord, direction) {
                        Some(next) => {
                            let accepts = match grid.get(next) {
                                Some(Tile::Intersection(_)) => true,
                                Some(tile) => tile.lane_direction() == Some(direction),
                                None => false,
                            };
                            if accepts {
                                network.add_move(coord, next, direction);
                            }
                        }
                        None => {
                            network.exits.insert(coord);
                        }
                    }

                    if grid.neighbor(coord, direction.opposite()).is_none() {
                        network.entry_points.push((coord, direction));
                    }
                }
                Some(Tile::Intersection(_)) => {
                    for direction in Direction::ALL {
                        let Some(next) = grid.neighbor(coord, direction) else {
                            continue;
                        };
                        let accepts = match grid.get(next) {
                            Some(Tile::Intersection(_)) => true,
                            // Only leave along a lane heading away from the junction
                            Some(tile) => tile.lane_direction() == Some(direction),
                            None => false,
                        };
                        if accepts {
                            network.add_move(coord, next, direction);
                        }
                    }
                }
                _ => {}
            }
        }

        network
    }

    fn add_move(&mut self, from: TileCoord, to: TileCoord, direction: Direction) {
        if let (Some(&a), Some(&b)) = (self.tile_to_node.get(&from), self.tile_to_node.get(&to)) {
            self.graph.add_edge(a, b, direction);
        }
    }

    /// Legal moves out of `from`, ordered by target coordinate
    pub fn moves(&self, from: TileCoord) -> Vec<(TileCoord, Direction)> {
        let Some(&node) = self.tile_to_node.get(&from) else {
            return Vec::new();
        };
        let mut moves: Vec<(TileCoord, Direction)> = self
            .graph
            .edges(node)
            .filter_map(|edge| self.graph.node_weight(edge.target()).map(|c| (*c, *edge.weight())))
            .collect();
        moves.sort_by_key(|(coord, _)| *coord);
        moves
    }

    pub fn is_exit(&self, coord: TileCoord) -> bool {
        self.exits.contains(&coord)
    }

    pub fn entry_points(&self) -> &[(TileCoord, Direction)] {
        &self.entry_points
    }

    pub fn tile_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn move_count(&self) -> usize {
        self.graph.edge_count()
    }
}
