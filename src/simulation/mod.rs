//! Standalone traffic simulation module
//!
//! This module contains the simulation engine: the tile world, vehicle
//! behavior, population control, emergency priority and the clock that drives
//! them. Rendering and charting live outside and only see [`SimEvent`]s.

mod behavior;
mod clock;
mod config;
mod emergency;
mod engine;
mod events;
mod intersection;
mod lane_network;
mod map_loader;
mod population;
mod tile;
mod types;
mod vehicle;
mod world;

// Re-export public types for external use
pub use behavior::{implicit_behavior, speed_band, DrivingPolicy};
pub use clock::{ClockHandle, SimulationClock, StopHandle, TickReport};
pub use config::{
    SimulationConfig, DEFAULT_CAR_TRUCK_RATIO, DEFAULT_MAX_SPEED, DEFAULT_MAX_VEHICLES,
    DEFAULT_RECKLESS_NORMAL_RATIO, DEFAULT_SPAWN_DELAY, DEFAULT_TICK_TIME_MS,
};
pub use emergency::{AreaOfEffect, PriorityMap, AOE_DEBUG_OPACITY};
pub use engine::SimulationEngine;
pub use events::{
    event_channel, pump_events, EventReceiver, EventSender, PresentationSink, SimEvent,
};
pub use intersection::IntersectionState;
pub use lane_network::SimLaneNetwork;
pub use map_loader::{AsciiMapLoader, CrossroadsLoader, FileMapLoader, MapLoader};
pub use population::{FleetCounters, PopulationController, SpawnDecision};
pub use tile::{Tile, TileGrid};
pub use types::{
    Behavior, Direction, SimId, TileCoord, VehicleId, VehicleKind, AOE_RADIUS, MAX_AMBULANCES,
    RECKLESS_YIELD_PROBABILITY, SEMI_RECKLESS_PROBABILITY, SEMI_SHARE, STATISTICS_INTERVAL_MS,
    TILE_LENGTH,
};
pub use vehicle::{SimVehicle, VehicleUpdateResult};
pub use world::{FleetStatistics, SimWorld, WorldSnapshot};
