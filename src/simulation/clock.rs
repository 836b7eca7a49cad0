//! Fixed-rate simulation clock
//!
//! [`SimulationClock`] holds the tick counter and knows what one tick does.
//! [`ClockHandle`] runs it on a dedicated thread, sleeping `tick_time_ms`
//! between ticks. The world lock is held for exactly one whole tick, so a
//! stop request can only ever land between ticks.

use anyhow::{Context, Result};
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use super::config::SimulationConfig;
use super::events::{EventSender, SimEvent};
use super::population::PopulationController;
use super::types::{VehicleId, VehicleKind, MAX_AMBULANCES, STATISTICS_INTERVAL_MS};
use super::world::SimWorld;

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub sampled: bool,
    pub spawned: Option<VehicleId>,
    pub removed: Vec<VehicleId>,
}

#[derive(Debug, Clone, Default)]
pub struct SimulationClock {
    tick: u64,
    population: PopulationController,
}

impl SimulationClock {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Start from an arbitrary tick, e.g. to exercise the wrap-around
    pub fn starting_at(tick: u64) -> Self {
        Self {
            tick,
            population: PopulationController,
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Whether `tick` falls on a statistics boundary of simulated time
    pub fn is_sample_tick(tick: u64, tick_time_ms: u64) -> bool {
        let elapsed = u128::from(tick) * u128::from(tick_time_ms);
        elapsed % u128::from(STATISTICS_INTERVAL_MS) == 0
    }

    /// Run one full tick: sample, maybe spawn, advance, publish
    pub fn run_tick(
        &mut self,
        world: &mut SimWorld,
        config: &SimulationConfig,
        events: &EventSender,
    ) -> TickReport {
        let tick = self.tick;
        let mut report = TickReport {
            tick,
            ..Default::default()
        };

        if Self::is_sample_tick(tick, config.tick_time_ms) {
            report.sampled = true;
            events.send(SimEvent::StatisticsSample(world.statistics(tick)));
        }

        if config.is_spawn_tick(tick) {
            report.spawned = self.population.evaluate(world, config);
            if let Some(vehicle) = report.spawned.and_then(|id| world.vehicle(id)) {
                events.send(SimEvent::VehicleSpawned(vehicle.clone()));
            }
        }

        let removed = world.advance(config.max_speed as f32);
        let ambulance_left = removed.iter().any(|v| v.kind() == VehicleKind::Ambulance);
        for vehicle in removed {
            report.removed.push(vehicle.id());
            events.send(SimEvent::VehicleRemoved(vehicle));
        }
        if ambulance_left {
            events.send(SimEvent::AmbulanceAvailability(
                world.counters().ambulances() < MAX_AMBULANCES,
            ));
        }

        events.send(SimEvent::Tick(world.snapshot(tick)));

        // Wrap instead of overflowing
        self.tick = tick.checked_add(1).unwrap_or(0);
        report
    }
}

/// Cloneable stop signal, safe to fire from any thread any number of times
#[derive(Debug, Clone)]
pub struct StopHandle {
    stop: Arc<AtomicBool>,
    wake: Sender<()>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        // Cut a pending sleep short; the loop may already be gone
        let _ = self.wake.send(());
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// A running clock thread
pub struct ClockHandle {
    stopper: StopHandle,
    /// Next tick to run, published after every tick
    tick: Arc<AtomicU64>,
    thread: Option<JoinHandle<u64>>,
}

impl ClockHandle {
    pub fn spawn(
        clock: SimulationClock,
        world: Arc<Mutex<SimWorld>>,
        config: Arc<Mutex<SimulationConfig>>,
        events: EventSender,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let (wake_tx, wake_rx) = mpsc::channel();
        let tick = Arc::new(AtomicU64::new(clock.tick_count()));
        let shared = LoopShared {
            world,
            config,
            events,
            stop: Arc::clone(&stop),
            tick: Arc::clone(&tick),
        };

        let thread = thread::Builder::new()
            .name("simulation-clock".to_string())
            .spawn(move || run_loop(clock, shared, wake_rx))
            .context("Failed to spawn simulation clock thread")?;

        Ok(Self {
            stopper: StopHandle {
                stop,
                wake: wake_tx,
            },
            tick,
            thread: Some(thread),
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stopper.clone()
    }

    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signal the loop and wait for it to exit
    /// Returns the tick the clock stopped at, or `None` if already stopped or
    /// the thread panicked
    pub fn stop(&mut self) -> Option<u64> {
        self.stopper.stop();
        let thread = self.thread.take()?;
        match thread.join() {
            Ok(tick) => Some(tick),
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("Simulation clock thread panicked: {}", reason);
                None
            }
        }
    }
}

impl Drop for ClockHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State the clock thread shares with its handle and the engine
struct LoopShared {
    world: Arc<Mutex<SimWorld>>,
    config: Arc<Mutex<SimulationConfig>>,
    events: EventSender,
    stop: Arc<AtomicBool>,
    tick: Arc<AtomicU64>,
}

fn run_loop(mut clock: SimulationClock, shared: LoopShared, wake: Receiver<()>) -> u64 {
    info!("Simulation clock started at tick {}", clock.tick_count());

    loop {
        if shared.stop.load(Ordering::SeqCst) {
            break;
        }

        // Changes made by setters apply from here on, never mid-tick
        let config = shared
            .config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        {
            let mut world = shared.world.lock().unwrap_or_else(PoisonError::into_inner);
            let report = clock.run_tick(&mut world, &config, &shared.events);
            shared.tick.store(clock.tick_count(), Ordering::SeqCst);
            if report.spawned.is_some() || !report.removed.is_empty() {
                debug!(
                    "Tick {}: spawned {:?}, removed {:?}",
                    report.tick, report.spawned, report.removed
                );
            }
        }

        match wake.recv_timeout(config.tick_period()) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!("Simulation clock stopped at tick {}", clock.tick_count());
    clock.tick_count()
}
