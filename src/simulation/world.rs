//! Main simulation world that ties everything together
//!
//! `SimWorld` owns the tile grid, the live vehicles and everything derived
//! from them (ratio counters, emergency priority areas). All vehicle
//! creation and removal goes through here so the derived state can never
//! drift from the vehicle set.

use anyhow::{bail, Context, Result};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;
use rand::SeedableRng;
use sorted_vec::SortedVec;
use std::collections::HashMap;

use super::behavior::speed_band;
use super::emergency::{AreaOfEffect, PriorityMap};
use super::lane_network::SimLaneNetwork;
use super::population::FleetCounters;
use super::tile::{Tile, TileGrid};
use super::types::{Behavior, SimId, TileCoord, VehicleId, VehicleKind};
use super::vehicle::{SimVehicle, VehicleUpdateResult};

/// Aggregate fleet numbers sampled for charts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetStatistics {
    pub tick: u64,
    pub vehicles: usize,
    pub cars: usize,
    pub trucks: usize,
    pub ambulances: usize,
    /// Cars with semi or reckless behavior
    pub reckless: usize,
    pub cautious: usize,
    pub yielding: usize,
}

/// Owned copy of the world handed to the presentation layer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldSnapshot {
    pub tick: u64,
    /// Live vehicles in creation order
    pub vehicles: Vec<SimVehicle>,
    pub counters: FleetCounters,
    pub areas: Vec<AreaOfEffect>,
}

/// The main simulation world
pub struct SimWorld {
    grid: TileGrid,

    /// Legal moves derived from the grid
    lane_network: SimLaneNetwork,

    /// All live vehicles
    vehicles: HashMap<VehicleId, SimVehicle>,

    /// Live vehicle ids in creation order; drives the stepping order
    order: SortedVec<VehicleId>,

    counters: FleetCounters,

    /// Areas of effect of live ambulances
    priority: PriorityMap,

    /// Presentation-only flag copied into new areas of effect
    areas_visible: bool,

    /// Next ID to assign
    next_id: usize,

    rng: StdRng,
}

impl SimWorld {
    fn new_internal(grid: TileGrid, rng: StdRng) -> Self {
        let lane_network = SimLaneNetwork::build(&grid);
        Self {
            grid,
            lane_network,
            vehicles: HashMap::new(),
            order: SortedVec::new(),
            counters: FleetCounters::default(),
            priority: PriorityMap::new(),
            areas_visible: false,
            next_id: 0,
            rng,
        }
    }

    pub fn new(grid: TileGrid) -> Self {
        Self::new_internal(grid, StdRng::from_os_rng())
    }

    /// Create a new SimWorld with a seeded RNG for reproducible simulations
    pub fn new_with_seed(grid: TileGrid, seed: u64) -> Self {
        Self::new_internal(grid, StdRng::seed_from_u64(seed))
    }

    pub fn with_optional_seed(grid: TileGrid, seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::new_with_seed(grid, seed),
            None => Self::new(grid),
        }
    }

    fn next_sim_id(&mut self) -> SimId {
        let id = SimId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(super) fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn lane_network(&self) -> &SimLaneNetwork {
        &self.lane_network
    }

    /// The map layout without any vehicles on it
    pub fn layout(&self) -> TileGrid {
        let mut grid = self.grid.clone();
        grid.clear_occupants();
        grid
    }

    pub fn counters(&self) -> &FleetCounters {
        &self.counters
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&SimVehicle> {
        self.vehicles.get(&id)
    }

    /// Live vehicles in creation order
    pub fn vehicles(&self) -> impl Iterator<Item = &SimVehicle> + '_ {
        self.order.iter().filter_map(|id| self.vehicles.get(id))
    }

    pub fn priority(&self) -> &PriorityMap {
        &self.priority
    }

    pub fn is_yield_required(&self, coord: TileCoord) -> bool {
        self.priority.is_yield_required(coord)
    }

    /// Show or hide ambulance areas. Has no effect on the simulation itself.
    pub fn set_areas_visible(&mut self, visible: bool) {
        self.areas_visible = visible;
        self.priority.set_visible(visible);
    }

    /// Spawn a vehicle on a random free entry lane
    ///
    /// Returns `None` when every entry lane is taken; nothing changes in that case.
    pub fn spawn_vehicle(
        &mut self,
        kind: VehicleKind,
        behavior: Behavior,
        max_speed: f32,
    ) -> Option<VehicleId> {
        let free_entries: Vec<TileCoord> = self
            .lane_network
            .entry_points()
            .iter()
            .map(|(coord, _)| *coord)
            .filter(|coord| !self.grid.lane_occupied(*coord))
            .collect();
        let position = *free_entries.choose(&mut self.rng)?;

        match self.spawn_vehicle_at(kind, behavior, position, max_speed) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to spawn {:?} at {:?}: {:#}", kind, position, e);
                None
            }
        }
    }

    /// Spawn a vehicle on a specific free lane, heading along it
    pub fn spawn_vehicle_at(
        &mut self,
        kind: VehicleKind,
        behavior: Behavior,
        position: TileCoord,
        max_speed: f32,
    ) -> Result<VehicleId> {
        let heading = self
            .grid
            .get(position)
            .and_then(Tile::lane_direction)
            .with_context(|| format!("Tile {:?} is not a lane", position))?;
        if self.grid.lane_occupied(position) {
            bail!("Lane {:?} is already taken", position);
        }

        let speed = max_speed * self.rng.random_range(speed_band(kind, behavior));
        let id = VehicleId(self.next_sim_id());
        let vehicle = SimVehicle::new(id, kind, behavior, position, heading, speed);
        self.grid.occupy(position, id)?;

        if kind == VehicleKind::Ambulance {
            self.priority
                .attach(AreaOfEffect::new(id, position, self.areas_visible));
        }
        self.counters.record_spawn(&vehicle);
        self.order.insert(id);
        self.vehicles.insert(id, vehicle);

        debug!(
            "Spawned {:?} {:?} ({:?}) at {:?} heading {:?}, speed {:.1}",
            id.0, kind, behavior, position, heading, speed
        );
        Ok(id)
    }

    /// Remove a vehicle and everything derived from it in one step
    ///
    /// Removing a vehicle that is not in the world is a caller bug and fails
    /// without touching any state.
    pub fn remove_vehicle(&mut self, id: VehicleId) -> Result<SimVehicle> {
        let Some(mut vehicle) = self.vehicles.remove(&id) else {
            bail!("Vehicle {:?} is not in the world", id);
        };

        self.grid.vacate(vehicle.position, id);
        self.order.remove_item(&id);
        self.counters.record_removal(&vehicle);
        if vehicle.kind() == VehicleKind::Ambulance {
            self.priority.retract(id);
        }
        vehicle.alive = false;

        debug!("Removed {:?} {:?} at {:?}", id.0, vehicle.kind(), vehicle.position);
        Ok(vehicle)
    }

    /// Drop every vehicle, resetting counters and priority areas
    pub fn clear_vehicles(&mut self) -> Vec<SimVehicle> {
        let ids: Vec<VehicleId> = self.order.iter().copied().collect();
        ids.into_iter()
            .filter_map(|id| self.remove_vehicle(id).ok())
            .collect()
    }

    /// Move every vehicle by one step, in creation order
    ///
    /// Vehicles leaving the map are removed within the same call and returned.
    pub fn advance(&mut self, max_speed: f32) -> Vec<SimVehicle> {
        let mut removed = Vec::new();

        for vehicle in self.vehicles.values() {
            if vehicle.kind() == VehicleKind::Ambulance {
                self.priority.recenter(vehicle.id(), vehicle.position);
            }
        }

        // Collect IDs to avoid borrow issues
        let ids: Vec<VehicleId> = self.order.iter().copied().collect();

        for id in ids {
            let Some(mut vehicle) = self.vehicles.remove(&id) else {
                continue;
            };
            let result = vehicle.update(
                max_speed,
                &mut self.grid,
                &self.lane_network,
                &self.priority,
                &mut self.rng,
            );
            if vehicle.kind() == VehicleKind::Ambulance {
                self.priority.recenter(id, vehicle.position);
            }
            self.vehicles.insert(id, vehicle);

            let leaving = match result {
                Ok(VehicleUpdateResult::Continue) => false,
                Ok(VehicleUpdateResult::Exited) => true,
                Ok(VehicleUpdateResult::DeadEnd) => {
                    debug!("Vehicle {:?} reached a dead end", id.0);
                    true
                }
                Err(e) => {
                    warn!("Vehicle {:?} failed to update, removing it: {:#}", id.0, e);
                    true
                }
            };

            if leaving {
                match self.remove_vehicle(id) {
                    Ok(vehicle) => removed.push(vehicle),
                    Err(e) => error!("{:#}", e),
                }
            }
        }

        removed
    }

    pub fn statistics(&self, tick: u64) -> FleetStatistics {
        let mut stats = FleetStatistics {
            tick,
            vehicles: self.vehicle_count(),
            trucks: self.counters.trucks(),
            ambulances: self.counters.ambulances(),
            reckless: self.counters.reckless(),
            ..Default::default()
        };
        for vehicle in self.vehicles.values() {
            if vehicle.kind() == VehicleKind::Car {
                stats.cars += 1;
                if vehicle.behavior() == Behavior::Cautious {
                    stats.cautious += 1;
                }
            }
            if vehicle.yielding {
                stats.yielding += 1;
            }
        }
        stats
    }

    pub fn snapshot(&self, tick: u64) -> WorldSnapshot {
        WorldSnapshot {
            tick,
            vehicles: self.vehicles().cloned().collect(),
            counters: self.counters,
            areas: self.priority.areas(),
        }
    }

    /// Verify that derived state matches the vehicle set
    pub fn check_invariants(&self) -> Result<()> {
        let tally = FleetCounters::tally(self.vehicles.values());
        if tally != self.counters {
            bail!("Counters drifted: running {:?}, actual {:?}", self.counters, tally);
        }
        if self.order.len() != self.vehicles.len() {
            bail!(
                "Order tracks {} vehicles but {} are alive",
                self.order.len(),
                self.vehicles.len()
            );
        }
        if self.priority.len() != self.counters.ambulances() {
            bail!(
                "{} priority areas for {} ambulances",
                self.priority.len(),
                self.counters.ambulances()
            );
        }
        for vehicle in self.vehicles.values() {
            let held = self.grid.lanes_held_by(vehicle.id());
            match self.grid.get(vehicle.position).context("Vehicle off the grid")? {
                Tile::Lane { occupant, .. } => {
                    if *occupant != Some(vehicle.id()) || held != 1 {
                        bail!("Lane occupancy broken for {:?}", vehicle.id());
                    }
                }
                Tile::Intersection(state) => {
                    if !state.is_held_by(vehicle.id()) || held != 0 {
                        bail!("Intersection occupancy broken for {:?}", vehicle.id());
                    }
                }
                _ => bail!("Vehicle {:?} on a non-drivable tile", vehicle.id()),
            }
        }
        Ok(())
    }

    /// Log a summary of the world state
    pub fn log_summary(&self) {
        let stats = self.statistics(0);
        info!(
            "Map: {}x{}, drivable tiles: {}, moves: {}, entry lanes: {}",
            self.grid.width(),
            self.grid.height(),
            self.lane_network.tile_count(),
            self.lane_network.move_count(),
            self.lane_network.entry_points().len()
        );
        info!(
            "Vehicles: {} (cars: {}, trucks: {}, ambulances: {})",
            stats.vehicles, stats.cars, stats.trucks, stats.ambulances
        );
        info!(
            "Reckless or semi: {}, cautious cars: {}, yielding: {}",
            stats.reckless, stats.cautious, stats.yielding
        );
    }
}
