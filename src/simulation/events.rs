//! Outbound notifications for the presentation layer
//!
//! The clock never calls into presentation code. It pushes [`SimEvent`]s onto
//! an unbounded channel; whoever renders drains it at its own pace with
//! [`pump_events`]. Sends never block, and a dropped receiver is ignored.

use log::trace;
use std::sync::mpsc::{self, Receiver, Sender};

use super::vehicle::SimVehicle;
use super::world::{FleetStatistics, WorldSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Tick(WorldSnapshot),
    VehicleSpawned(SimVehicle),
    VehicleRemoved(SimVehicle),
    StatisticsSample(FleetStatistics),
    /// Whether another ambulance may be requested right now
    AmbulanceAvailability(bool),
    DebugToggled(bool),
    Reset,
}

/// Receiver side of the presentation contract
///
/// Every callback defaults to a no-op. Missed or late events never affect the
/// simulation.
pub trait PresentationSink {
    fn on_tick(&mut self, _snapshot: &WorldSnapshot) {}
    fn on_vehicle_spawned(&mut self, _vehicle: &SimVehicle) {}
    fn on_vehicle_removed(&mut self, _vehicle: &SimVehicle) {}
    fn on_statistics_sample(&mut self, _stats: &FleetStatistics) {}
    fn on_ambulance_availability(&mut self, _available: bool) {}
    fn on_debug_toggled(&mut self, _enabled: bool) {}
    fn on_reset(&mut self) {}
}

impl SimEvent {
    pub fn dispatch<S: PresentationSink + ?Sized>(&self, sink: &mut S) {
        match self {
            SimEvent::Tick(snapshot) => sink.on_tick(snapshot),
            SimEvent::VehicleSpawned(vehicle) => sink.on_vehicle_spawned(vehicle),
            SimEvent::VehicleRemoved(vehicle) => sink.on_vehicle_removed(vehicle),
            SimEvent::StatisticsSample(stats) => sink.on_statistics_sample(stats),
            SimEvent::AmbulanceAvailability(available) => {
                sink.on_ambulance_availability(*available)
            }
            SimEvent::DebugToggled(enabled) => sink.on_debug_toggled(*enabled),
            SimEvent::Reset => sink.on_reset(),
        }
    }
}

/// Fire-and-forget sending half
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<SimEvent>,
}

impl EventSender {
    pub fn send(&self, event: SimEvent) {
        if self.tx.send(event).is_err() {
            trace!("Presentation receiver dropped, discarding event");
        }
    }
}

pub type EventReceiver = Receiver<SimEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel();
    (EventSender { tx }, rx)
}

/// Deliver every event currently queued to `sink`
/// Returns how many were delivered
pub fn pump_events<S: PresentationSink + ?Sized>(rx: &EventReceiver, sink: &mut S) -> usize {
    let mut delivered = 0;
    for event in rx.try_iter() {
        event.dispatch(sink);
        delivered += 1;
    }
    delivered
}
