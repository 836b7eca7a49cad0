//! Intersection right-of-way bookkeeping
//!
//! Unlike lanes, an intersection tile may hold several vehicles at once.
//! Whether a vehicle is allowed in is decided by its driving policy.

use super::behavior::DrivingPolicy;
use super::types::VehicleId;

/// Occupancy of a single intersection tile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntersectionState {
    /// Vehicles currently on this tile, in arrival order
    occupants: Vec<VehicleId>,
}

impl IntersectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn occupants(&self) -> &[VehicleId] {
        &self.occupants
    }

    pub fn is_free(&self) -> bool {
        self.occupants.is_empty()
    }

    pub fn is_held_by(&self, vehicle_id: VehicleId) -> bool {
        self.occupants.contains(&vehicle_id)
    }

    /// Check if a vehicle coming off a lane may enter
    /// Cautious drivers wait for an empty tile; everyone else pushes in
    pub fn can_enter(&self, policy: DrivingPolicy) -> bool {
        match policy {
            DrivingPolicy::Cautious => self.is_free(),
            DrivingPolicy::Reckless | DrivingPolicy::Emergency => true,
        }
    }

    pub fn enter(&mut self, vehicle_id: VehicleId) {
        if !self.is_held_by(vehicle_id) {
            self.occupants.push(vehicle_id);
        }
    }

    /// Release the tile for a vehicle that moved on or was removed
    pub fn release(&mut self, vehicle_id: VehicleId) {
        self.occupants.retain(|id| *id != vehicle_id);
    }

    pub fn clear(&mut self) {
        self.occupants.clear();
    }
}
