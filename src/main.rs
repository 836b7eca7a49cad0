use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tile_traffic::simulation::{
    pump_events, CrossroadsLoader, FileMapLoader, FleetStatistics, MapLoader, PresentationSink,
    SimVehicle, SimulationConfig, SimulationEngine, VehicleKind, WorldSnapshot,
    DEFAULT_CAR_TRUCK_RATIO, DEFAULT_MAX_SPEED, DEFAULT_MAX_VEHICLES,
    DEFAULT_RECKLESS_NORMAL_RATIO, DEFAULT_SPAWN_DELAY, DEFAULT_TICK_TIME_MS,
};

#[derive(Parser)]
#[command(name = "tile_traffic")]
#[command(about = "Tile-based traffic simulation running headless")]
struct Cli {
    /// Wall-clock seconds to run the simulation for
    #[arg(long, default_value = "10")]
    duration_secs: f32,

    /// Milliseconds between ticks
    #[arg(long, default_value_t = DEFAULT_TICK_TIME_MS)]
    tick_time: u64,

    /// Ticks between spawn evaluations
    #[arg(long, default_value_t = DEFAULT_SPAWN_DELAY)]
    spawn_delay: u64,

    #[arg(long, default_value_t = DEFAULT_MAX_VEHICLES)]
    max_vehicles: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_SPEED)]
    max_speed: u32,

    /// Desired share of cars among cars and trucks
    #[arg(long, default_value_t = DEFAULT_CAR_TRUCK_RATIO)]
    car_truck_ratio: f64,

    /// Desired share of reckless drivers
    #[arg(long, default_value_t = DEFAULT_RECKLESS_NORMAL_RATIO)]
    reckless_ratio: f64,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Ambulances to request right after start
    #[arg(long, default_value = "0")]
    ambulances: usize,

    /// Text map layout; the built-in crossroads map is used otherwise
    #[arg(long)]
    map: Option<PathBuf>,

    /// Show ambulance areas of effect
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn config(&self) -> SimulationConfig {
        SimulationConfig {
            tick_time_ms: self.tick_time,
            spawn_delay: self.spawn_delay,
            max_vehicles: self.max_vehicles,
            max_speed: self.max_speed,
            car_truck_ratio: self.car_truck_ratio,
            reckless_normal_ratio: self.reckless_ratio,
            seed: self.seed,
        }
    }

    fn loader(&self) -> Box<dyn MapLoader> {
        match &self.map {
            Some(path) => Box::new(FileMapLoader::new(path.clone())),
            None => Box::new(CrossroadsLoader),
        }
    }
}

/// Presentation stand-in that reports through the log
#[derive(Default)]
struct LogSink {
    spawned: usize,
    removed: usize,
    ambulances_spawned: usize,
    last_tick: Option<u64>,
    last_stats: Option<FleetStatistics>,
}

impl PresentationSink for LogSink {
    fn on_tick(&mut self, snapshot: &WorldSnapshot) {
        self.last_tick = Some(snapshot.tick);
    }

    fn on_vehicle_spawned(&mut self, vehicle: &SimVehicle) {
        self.spawned += 1;
        if vehicle.kind() == VehicleKind::Ambulance {
            self.ambulances_spawned += 1;
        }
        debug!(
            "Spawned {:?} {:?} ({:?}) at {:?}",
            vehicle.id().0,
            vehicle.kind(),
            vehicle.behavior(),
            vehicle.position
        );
    }

    fn on_vehicle_removed(&mut self, vehicle: &SimVehicle) {
        self.removed += 1;
        debug!("Removed {:?} {:?}", vehicle.id().0, vehicle.kind());
    }

    fn on_statistics_sample(&mut self, stats: &FleetStatistics) {
        info!(
            "Tick {}: vehicles={}, cars={}, trucks={}, ambulances={}, reckless={}, yielding={}",
            stats.tick,
            stats.vehicles,
            stats.cars,
            stats.trucks,
            stats.ambulances,
            stats.reckless,
            stats.yielding
        );
        self.last_stats = Some(stats.clone());
    }

    fn on_ambulance_availability(&mut self, available: bool) {
        debug!("Ambulance requests available: {}", available);
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let duration = Duration::try_from_secs_f32(cli.duration_secs)
        .with_context(|| format!("Invalid duration: {} seconds", cli.duration_secs))?;
    let deadline = Instant::now()
        .checked_add(duration)
        .context("Run duration is too long")?;
    let (mut engine, events) = SimulationEngine::new(cli.config(), cli.loader())?;

    info!("Running tile traffic simulation in headless mode...");
    engine.with_world(|world| world.log_summary());
    engine.set_debug_flag(cli.debug);
    engine.start_simulation()?;

    for _ in 0..cli.ambulances {
        engine.spawn_ambulance();
    }

    let mut sink = LogSink::default();
    while Instant::now() < deadline {
        pump_events(&events, &mut sink);
        std::thread::sleep(Duration::from_millis(100));
    }

    engine.stop_simulation();
    pump_events(&events, &mut sink);

    info!("=== SIMULATION COMPLETE ===");
    info!("Ticks run: {}", engine.current_tick());
    if let Some(tick) = sink.last_tick {
        info!("Last tick presented: {}", tick);
    }
    info!("Total vehicles spawned: {}", sink.spawned);
    info!("Ambulances spawned: {}", sink.ambulances_spawned);
    info!("Total vehicles removed: {}", sink.removed);
    info!("Active vehicles: {}", engine.snapshot().vehicles.len());
    if let Some(stats) = &sink.last_stats {
        info!("Last sample at tick {}: {} vehicles", stats.tick, stats.vehicles);
    }
    engine.with_world(|world| world.log_summary());

    Ok(())
}
