//! Vehicle decision policy
//!
//! A vehicle's [`Behavior`] never changes after spawn. What varies is the
//! [`DrivingPolicy`] resolved for each individual decision: semi drivers roll
//! a fresh coin every time, so two of them in the same spot may disagree.

use rand::Rng;

use super::types::{
    Behavior, VehicleKind, RECKLESS_YIELD_PROBABILITY, SEMI_RECKLESS_PROBABILITY,
};

/// The policy a driver applies to one decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrivingPolicy {
    Cautious,
    Reckless,
    /// Ambulances: ignore right-of-way, never yield
    Emergency,
}

impl DrivingPolicy {
    /// Resolve the policy for a single decision
    pub fn resolve<R: Rng + ?Sized>(kind: VehicleKind, behavior: Behavior, rng: &mut R) -> Self {
        match (kind, behavior) {
            (VehicleKind::Ambulance, _) => DrivingPolicy::Emergency,
            (VehicleKind::Truck, _) => DrivingPolicy::Cautious,
            (VehicleKind::Car, Behavior::Cautious) => DrivingPolicy::Cautious,
            (VehicleKind::Car, Behavior::Reckless) => DrivingPolicy::Reckless,
            (VehicleKind::Car, Behavior::Semi) => {
                if rng.random_bool(SEMI_RECKLESS_PROBABILITY) {
                    DrivingPolicy::Reckless
                } else {
                    DrivingPolicy::Cautious
                }
            }
        }
    }

    /// Number of free tiles required straight ahead before moving
    pub fn following_distance(self) -> usize {
        match self {
            DrivingPolicy::Cautious => 2,
            DrivingPolicy::Reckless | DrivingPolicy::Emergency => 1,
        }
    }

    /// Whether the driver yields to an active emergency override
    pub fn yields_to_emergency<R: Rng + ?Sized>(self, rng: &mut R) -> bool {
        match self {
            DrivingPolicy::Cautious => true,
            DrivingPolicy::Reckless => rng.random_bool(RECKLESS_YIELD_PROBABILITY),
            DrivingPolicy::Emergency => false,
        }
    }
}

/// Behavior a vehicle of `kind` is created with when the caller has no say
pub fn implicit_behavior(kind: VehicleKind) -> Behavior {
    match kind {
        VehicleKind::Truck => Behavior::Cautious,
        VehicleKind::Ambulance => Behavior::Reckless,
        VehicleKind::Car => Behavior::Cautious,
    }
}

/// Fraction of the configured max speed a freshly spawned vehicle drives at
pub fn speed_band(kind: VehicleKind, behavior: Behavior) -> std::ops::Range<f32> {
    match (kind, behavior) {
        (VehicleKind::Ambulance, _) => 0.95..1.0,
        (VehicleKind::Truck, _) => 0.5..0.7,
        (VehicleKind::Car, Behavior::Cautious) => 0.6..0.85,
        (VehicleKind::Car, Behavior::Semi) => 0.7..0.95,
        (VehicleKind::Car, Behavior::Reckless) => 0.85..1.0,
    }
}
