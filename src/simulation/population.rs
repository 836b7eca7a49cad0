//! Population control
//!
//! Steers the fleet towards the configured car/truck and reckless/normal
//! ratios, one spawn per evaluation. The ratio counters themselves live in
//! [`FleetCounters`] and can only be changed by `SimWorld` when a vehicle is
//! actually inserted or removed.

use log::debug;
use rand::Rng;

use super::behavior::implicit_behavior;
use super::config::SimulationConfig;
use super::types::{Behavior, VehicleId, VehicleKind, MAX_AMBULANCES, SEMI_SHARE};
use super::vehicle::SimVehicle;
use super::world::SimWorld;

/// Running counts derived from the live vehicle set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FleetCounters {
    trucks: usize,
    /// Cars with semi or reckless behavior
    reckless: usize,
    ambulances: usize,
}

impl FleetCounters {
    pub fn trucks(&self) -> usize {
        self.trucks
    }

    pub fn reckless(&self) -> usize {
        self.reckless
    }

    pub fn ambulances(&self) -> usize {
        self.ambulances
    }

    pub(super) fn record_spawn(&mut self, vehicle: &SimVehicle) {
        match vehicle.kind() {
            VehicleKind::Truck => self.trucks += 1,
            VehicleKind::Ambulance => self.ambulances += 1,
            VehicleKind::Car if vehicle.is_risky_car() => self.reckless += 1,
            VehicleKind::Car => {}
        }
    }

    pub(super) fn record_removal(&mut self, vehicle: &SimVehicle) {
        match vehicle.kind() {
            VehicleKind::Truck => self.trucks = self.trucks.saturating_sub(1),
            VehicleKind::Ambulance => self.ambulances = self.ambulances.saturating_sub(1),
            VehicleKind::Car if vehicle.is_risky_car() => {
                self.reckless = self.reckless.saturating_sub(1)
            }
            VehicleKind::Car => {}
        }
    }

    /// Recount from scratch; used to verify the running counts
    pub fn tally<'a>(vehicles: impl IntoIterator<Item = &'a SimVehicle>) -> Self {
        let mut counters = Self::default();
        for vehicle in vehicles {
            counters.record_spawn(vehicle);
        }
        counters
    }
}

/// Outcome of one spawn evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnDecision {
    /// Vehicle cap reached
    Hold,
    Truck,
    Car(Behavior),
}

impl SpawnDecision {
    pub fn kind_and_behavior(self) -> Option<(VehicleKind, Behavior)> {
        match self {
            SpawnDecision::Hold => None,
            SpawnDecision::Truck => {
                Some((VehicleKind::Truck, implicit_behavior(VehicleKind::Truck)))
            }
            SpawnDecision::Car(behavior) => Some((VehicleKind::Car, behavior)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PopulationController;

impl PopulationController {
    /// Pick what to spawn given the current counts
    ///
    /// The truck deficit is checked before the behavior deficit; swapping the
    /// two changes the long-run fleet composition.
    pub fn decide<R: Rng + ?Sized>(
        counters: &FleetCounters,
        total_vehicles: usize,
        config: &SimulationConfig,
        rng: &mut R,
    ) -> SpawnDecision {
        if total_vehicles >= config.max_vehicles {
            return SpawnDecision::Hold;
        }

        let total = total_vehicles as f64;
        if (counters.trucks() as f64) < (1.0 - config.car_truck_ratio) * total {
            return SpawnDecision::Truck;
        }

        if (counters.reckless() as f64) < config.reckless_normal_ratio * total {
            let behavior = if rng.random_bool(SEMI_SHARE) {
                Behavior::Semi
            } else {
                Behavior::Reckless
            };
            return SpawnDecision::Car(behavior);
        }

        SpawnDecision::Car(Behavior::Cautious)
    }

    /// Run one spawn evaluation against the world
    /// Returns the spawned vehicle, if any
    pub fn evaluate(&self, world: &mut SimWorld, config: &SimulationConfig) -> Option<VehicleId> {
        let counters = *world.counters();
        let total = world.vehicle_count();
        let decision = Self::decide(&counters, total, config, world.rng());

        let (kind, behavior) = decision.kind_and_behavior()?;
        let spawned = world.spawn_vehicle(kind, behavior, config.max_speed as f32);
        if spawned.is_none() {
            debug!("No free entry lane for {:?} ({:?}), skipping spawn", kind, behavior);
        }
        spawned
    }

    /// Spawn an ambulance unless the cap is reached
    ///
    /// Requests at the cap are dropped silently so repeated requests stay harmless.
    pub fn spawn_ambulance(
        &self,
        world: &mut SimWorld,
        config: &SimulationConfig,
    ) -> Option<VehicleId> {
        if world.counters().ambulances() >= MAX_AMBULANCES {
            debug!("Ambulance cap of {} reached, ignoring request", MAX_AMBULANCES);
            return None;
        }
        world.spawn_vehicle(
            VehicleKind::Ambulance,
            implicit_behavior(VehicleKind::Ambulance),
            config.max_speed as f32,
        )
    }
}
