//! Emergency right-of-way overrides
//!
//! Every live ambulance owns one [`AreaOfEffect`]. Tiles inside any area are
//! "yield required" for all other traffic. Opacity exists for the presentation
//! layer only and is never read by the simulation.

use std::collections::HashMap;

use super::types::{TileCoord, VehicleId, AOE_RADIUS};

/// Opacity of an area when debug visualisation is on
pub const AOE_DEBUG_OPACITY: f32 = 0.25;

/// Influence radius around an ambulance
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfEffect {
    pub source: VehicleId,
    pub center: TileCoord,
    pub radius: f32,
    pub opacity: f32,
}

impl AreaOfEffect {
    pub fn new(source: VehicleId, center: TileCoord, visible: bool) -> Self {
        Self {
            source,
            center,
            radius: AOE_RADIUS,
            opacity: if visible { AOE_DEBUG_OPACITY } else { 0.0 },
        }
    }

    pub fn covers(&self, coord: TileCoord) -> bool {
        self.center.distance(&coord) <= self.radius
    }
}

/// All active areas of effect, keyed by the ambulance that projects them
#[derive(Debug, Clone, Default)]
pub struct PriorityMap {
    zones: HashMap<VehicleId, AreaOfEffect>,
}

impl PriorityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, area: AreaOfEffect) {
        self.zones.insert(area.source, area);
    }

    /// Retract the area of an ambulance. Returns it if one was attached.
    pub fn retract(&mut self, source: VehicleId) -> Option<AreaOfEffect> {
        self.zones.remove(&source)
    }

    /// Follow the ambulance to its new tile
    pub fn recenter(&mut self, source: VehicleId, center: TileCoord) {
        if let Some(area) = self.zones.get_mut(&source) {
            area.center = center;
        }
    }

    /// Whether traffic on `coord` must give way
    pub fn is_yield_required(&self, coord: TileCoord) -> bool {
        self.zones.values().any(|area| area.covers(coord))
    }

    pub fn set_visible(&mut self, visible: bool) {
        let opacity = if visible { AOE_DEBUG_OPACITY } else { 0.0 };
        for area in self.zones.values_mut() {
            area.opacity = opacity;
        }
    }

    /// Areas ordered by source id
    pub fn areas(&self) -> Vec<AreaOfEffect> {
        let mut areas: Vec<AreaOfEffect> = self.zones.values().cloned().collect();
        areas.sort_by_key(|a| a.source);
        areas
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}
