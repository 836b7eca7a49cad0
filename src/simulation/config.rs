//! Simulation parameters
//!
//! Values are taken as given. Degenerate inputs (zero tick time, ratios
//! outside `[0, 1]`) lead to odd but non-crashing behavior.

use std::time::Duration;

/// Default period between two ticks, in milliseconds
pub const DEFAULT_TICK_TIME_MS: u64 = 50;
/// Default number of ticks between spawn evaluations
pub const DEFAULT_SPAWN_DELAY: u64 = 25;
pub const DEFAULT_MAX_VEHICLES: usize = 25;
pub const DEFAULT_MAX_SPEED: u32 = 50;
/// Desired share of cars among cars and trucks
pub const DEFAULT_CAR_TRUCK_RATIO: f64 = 0.7;
/// Desired share of reckless (and semi) drivers among all vehicles
pub const DEFAULT_RECKLESS_NORMAL_RATIO: f64 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub tick_time_ms: u64,
    pub spawn_delay: u64,
    pub max_vehicles: usize,
    pub max_speed: u32,
    pub car_truck_ratio: f64,
    pub reckless_normal_ratio: f64,
    /// Seed for reproducible runs; `None` draws from the OS
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_time_ms: DEFAULT_TICK_TIME_MS,
            spawn_delay: DEFAULT_SPAWN_DELAY,
            max_vehicles: DEFAULT_MAX_VEHICLES,
            max_speed: DEFAULT_MAX_SPEED,
            car_truck_ratio: DEFAULT_CAR_TRUCK_RATIO,
            reckless_normal_ratio: DEFAULT_RECKLESS_NORMAL_RATIO,
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_time_ms)
    }

    /// Whether `tick` is a spawn evaluation tick
    /// A zero delay evaluates on every tick
    pub fn is_spawn_tick(&self, tick: u64) -> bool {
        self.spawn_delay == 0 || tick % self.spawn_delay == 0
    }
}
