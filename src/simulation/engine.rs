//! Simulation engine
//!
//! The application root constructs one [`SimulationEngine`] and passes it
//! around by reference. It owns the shared world, the live configuration,
//! the clock thread and the sending half of the presentation channel.

use anyhow::{Context, Result};
use log::{debug, error, info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::clock::{ClockHandle, SimulationClock, StopHandle};
use super::config::SimulationConfig;
use super::events::{event_channel, EventReceiver, EventSender, SimEvent};
use super::map_loader::MapLoader;
use super::population::{FleetCounters, PopulationController};
use super::types::{VehicleId, VehicleKind, MAX_AMBULANCES};
use super::vehicle::SimVehicle;
use super::world::{SimWorld, WorldSnapshot};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SimulationEngine {
    world: Arc<Mutex<SimWorld>>,
    config: Arc<Mutex<SimulationConfig>>,
    /// Configuration restored on reset
    initial_config: SimulationConfig,
    loader: Box<dyn MapLoader>,
    events: EventSender,
    clock: Option<ClockHandle>,
    /// Tick the last clock stopped at
    last_tick: u64,
    debug: bool,
    population: PopulationController,
}

impl SimulationEngine {
    /// Build an engine and the receiver the presentation layer drains
    pub fn new(
        config: SimulationConfig,
        loader: Box<dyn MapLoader>,
    ) -> Result<(Self, EventReceiver)> {
        let grid = loader.load().context("Failed to load map")?;
        let world = SimWorld::with_optional_seed(grid, config.seed);
        let (events, receiver) = event_channel();

        let engine = Self {
            world: Arc::new(Mutex::new(world)),
            config: Arc::new(Mutex::new(config.clone())),
            initial_config: config,
            loader,
            events,
            clock: None,
            last_tick: 0,
            debug: false,
            population: PopulationController,
        };
        Ok((engine, receiver))
    }

    /// Start the clock. No-op if it is already running.
    pub fn start_simulation(&mut self) -> Result<()> {
        if self.is_running() {
            debug!("Simulation already running");
            return Ok(());
        }
        // A finished thread may still be parked here; reap it first
        self.stop_simulation();

        let clock = ClockHandle::spawn(
            SimulationClock::new(),
            Arc::clone(&self.world),
            Arc::clone(&self.config),
            self.events.clone(),
        )?;
        self.clock = Some(clock);
        self.events.send(SimEvent::AmbulanceAvailability(
            self.counters().ambulances() < MAX_AMBULANCES,
        ));
        info!("Simulation started");
        Ok(())
    }

    /// Stop the clock and wait for its thread. Safe to call repeatedly.
    pub fn stop_simulation(&mut self) {
        if let Some(mut clock) = self.clock.take() {
            if let Some(tick) = clock.stop() {
                self.last_tick = tick;
            }
            info!("Simulation stopped at tick {}", self.last_tick);
        }
    }

    pub fn is_running(&self) -> bool {
        self.clock.as_ref().is_some_and(ClockHandle::is_running)
    }

    /// Stop signal usable from other threads; `None` when not running
    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.clock.as_ref().map(ClockHandle::stop_handle)
    }

    /// Tick of the running clock, or where the last one stopped
    pub fn current_tick(&self) -> u64 {
        self.clock
            .as_ref()
            .map_or(self.last_tick, ClockHandle::current_tick)
    }

    /// Stop, then rebuild the world from scratch
    ///
    /// With `reload_map` the layout comes from the map loader again, otherwise
    /// the current layout is reused without its vehicles. Config and the debug
    /// flag go back to their initial values.
    pub fn reset_simulation(&mut self, reload_map: bool) -> Result<()> {
        self.stop_simulation();

        let mut world = lock(&self.world);
        let grid = if reload_map {
            self.loader.load().context("Failed to reload map")?
        } else {
            world.layout()
        };
        *world = SimWorld::with_optional_seed(grid, self.initial_config.seed);
        drop(world);

        *lock(&self.config) = self.initial_config.clone();
        self.last_tick = 0;
        self.debug = false;

        self.events.send(SimEvent::Reset);
        self.events.send(SimEvent::DebugToggled(false));
        self.events.send(SimEvent::AmbulanceAvailability(false));
        info!("Simulation reset (map reloaded: {})", reload_map);
        Ok(())
    }

    /// Replace the map source used by `reset_simulation(true)`
    ///
    /// The running world keeps its layout until the next reload.
    pub fn set_map_loader(&mut self, loader: Box<dyn MapLoader>) {
        self.loader = loader;
        info!("Map source replaced; applies on next reset with reload");
    }

    /// Presentation toggle; simulation results are unaffected
    pub fn set_debug_flag(&mut self, enabled: bool) {
        self.debug = enabled;
        lock(&self.world).set_areas_visible(enabled);
        self.events.send(SimEvent::DebugToggled(enabled));
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Request an ambulance; silently ignored at the cap
    pub fn spawn_ambulance(&self) -> Option<VehicleId> {
        let config = self.config();
        let mut world = lock(&self.world);
        let id = self.population.spawn_ambulance(&mut world, &config)?;

        if let Some(vehicle) = world.vehicle(id) {
            self.events.send(SimEvent::VehicleSpawned(vehicle.clone()));
        }
        self.events.send(SimEvent::AmbulanceAvailability(
            world.counters().ambulances() < MAX_AMBULANCES,
        ));
        Some(id)
    }

    /// Remove a live vehicle
    ///
    /// Fails loudly if the vehicle is unknown, since that means the caller's
    /// view of the world is out of sync.
    pub fn remove_vehicle(&self, id: VehicleId) -> Result<SimVehicle> {
        let mut world = lock(&self.world);
        let vehicle = match world.remove_vehicle(id) {
            Ok(vehicle) => vehicle,
            Err(e) => {
                error!("{:#}", e);
                return Err(e);
            }
        };

        self.events.send(SimEvent::VehicleRemoved(vehicle.clone()));
        if vehicle.kind() == VehicleKind::Ambulance {
            self.events.send(SimEvent::AmbulanceAvailability(
                world.counters().ambulances() < MAX_AMBULANCES,
            ));
        }
        Ok(vehicle)
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        let tick = self.current_tick();
        lock(&self.world).snapshot(tick)
    }

    pub fn counters(&self) -> FleetCounters {
        *lock(&self.world).counters()
    }

    /// Read the world under the lock
    pub fn with_world<T>(&self, f: impl FnOnce(&SimWorld) -> T) -> T {
        let world = lock(&self.world);
        f(&*world)
    }

    /// Copy of the configuration the next tick will use
    pub fn config(&self) -> SimulationConfig {
        lock(&self.config).clone()
    }

    pub fn tick_time_ms(&self) -> u64 {
        lock(&self.config).tick_time_ms
    }

    pub fn set_tick_time_ms(&self, tick_time_ms: u64) {
        lock(&self.config).tick_time_ms = tick_time_ms;
    }

    pub fn spawn_delay(&self) -> u64 {
        lock(&self.config).spawn_delay
    }

    pub fn set_spawn_delay(&self, spawn_delay: u64) {
        lock(&self.config).spawn_delay = spawn_delay;
    }

    pub fn max_vehicles(&self) -> usize {
        lock(&self.config).max_vehicles
    }

    pub fn set_max_vehicles(&self, max_vehicles: usize) {
        lock(&self.config).max_vehicles = max_vehicles;
    }

    pub fn max_speed(&self) -> u32 {
        lock(&self.config).max_speed
    }

    pub fn set_max_speed(&self, max_speed: u32) {
        lock(&self.config).max_speed = max_speed;
    }

    pub fn car_truck_ratio(&self) -> f64 {
        lock(&self.config).car_truck_ratio
    }

    pub fn set_car_truck_ratio(&self, ratio: f64) {
        lock(&self.config).car_truck_ratio = ratio;
    }

    pub fn reckless_normal_ratio(&self) -> f64 {
        lock(&self.config).reckless_normal_ratio
    }

    pub fn set_reckless_normal_ratio(&self, ratio: f64) {
        lock(&self.config).reckless_normal_ratio = ratio;
    }
}

impl Drop for SimulationEngine {
    fn drop(&mut self) {
        self.stop_simulation();
    }
}
