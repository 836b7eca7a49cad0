//! Vehicle movement logic for the traffic simulation

use anyhow::{Context, Result};
use ordered_float::OrderedFloat;
use rand::seq::IndexedRandom;
use rand::Rng;

use super::behavior::DrivingPolicy;
use super::emergency::PriorityMap;
use super::lane_network::SimLaneNetwork;
use super::tile::TileGrid;
use super::types::{Behavior, Direction, TileCoord, VehicleId, VehicleKind, TILE_LENGTH};

/// Result of a vehicle update indicating what action should be taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleUpdateResult {
    Continue, // Vehicle stays on the map (moved or waiting)
    Exited,   // Vehicle drove off the map boundary
    DeadEnd,  // Vehicle has nowhere left to go
}

/// A vehicle in the traffic simulation
///
/// Identity, kind and behavior are fixed at creation; the counters in
/// `SimWorld` depend on them never changing.
#[derive(Debug, Clone, PartialEq)]
pub struct SimVehicle {
    id: VehicleId,
    kind: VehicleKind,
    behavior: Behavior,
    pub position: TileCoord,
    pub heading: Direction,
    /// Preferred speed; capped by the configured max speed on every step
    pub speed: f32,
    /// Distance covered towards the next tile
    pub progress: OrderedFloat<f32>,
    /// Whether the last update held back at a junction for an emergency override
    pub yielding: bool,
    pub alive: bool,
}

impl SimVehicle {
    pub fn new(
        id: VehicleId,
        kind: VehicleKind,
        behavior: Behavior,
        position: TileCoord,
        heading: Direction,
        speed: f32,
    ) -> Self {
        Self {
            id,
            kind,
            behavior,
            position,
            heading,
            speed,
            progress: OrderedFloat(0.0),
            yielding: false,
            alive: true,
        }
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn kind(&self) -> VehicleKind {
        self.kind
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    /// Counts towards the reckless ratio counter
    pub fn is_risky_car(&self) -> bool {
        self.kind == VehicleKind::Car
            && matches!(self.behavior, Behavior::Semi | Behavior::Reckless)
    }

    /// Update vehicle movement logic
    /// Returns VehicleUpdateResult indicating what action should be taken with the vehicle
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        max_speed: f32,
        grid: &mut TileGrid,
        network: &SimLaneNetwork,
        priority: &PriorityMap,
        rng: &mut R,
    ) -> Result<VehicleUpdateResult> {
        // Only a yield that blocks this step counts
        self.yielding = false;

        let speed = self.speed.min(max_speed).max(0.0);
        self.progress = OrderedFloat((self.progress.into_inner() + speed).min(TILE_LENGTH));

        if self.progress < OrderedFloat(TILE_LENGTH) {
            return Ok(VehicleUpdateResult::Continue);
        }

        let reverse = self.heading.opposite();
        let candidates: Vec<(TileCoord, Direction)> = network
            .moves(self.position)
            .into_iter()
            .filter(|(_, direction)| *direction != reverse)
            .collect();

        if candidates.is_empty() {
            if network.is_exit(self.position) {
                return Ok(VehicleUpdateResult::Exited);
            }
            return Ok(VehicleUpdateResult::DeadEnd);
        }

        let policy = DrivingPolicy::resolve(self.kind, self.behavior, rng);
        let (target, direction) = *candidates
            .choose(rng)
            .context("No move available from current tile")?;

        let allowed = match (grid.intersection(self.position), grid.intersection(target)) {
            // Entering a junction from a lane: right-of-way applies
            (None, Some(junction)) => {
                self.yielding =
                    priority.is_yield_required(self.position) && policy.yields_to_emergency(rng);
                !self.yielding && junction.can_enter(policy)
            }
            // Already inside: keep clearing the junction
            (Some(_), Some(_)) => true,
            (_, None) => has_clearance(grid, target, direction, policy),
        };

        if !allowed {
            // Hold at full progress and try again next tick
            return Ok(VehicleUpdateResult::Continue);
        }

        grid.vacate(self.position, self.id);
        grid.occupy(target, self.id)
            .with_context(|| format!("Vehicle {:?} failed to move", self.id))?;
        self.position = target;
        self.heading = direction;
        self.progress = OrderedFloat(0.0);

        Ok(VehicleUpdateResult::Continue)
    }
}

/// Check the lane tiles straight ahead against the policy's following distance
fn has_clearance(
    grid: &TileGrid,
    target: TileCoord,
    direction: Direction,
    policy: DrivingPolicy,
) -> bool {
    let mut coord = target;
    for step in 0..policy.following_distance() {
        if step > 0 {
            match grid.neighbor(coord, direction) {
                Some(next) => coord = next,
                None => break,
            }
        }
        if grid.lane_occupied(coord) {
            return false;
        }
    }
    true
}
