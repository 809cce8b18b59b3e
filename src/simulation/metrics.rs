//! Per-tick congestion metrics
//!
//! Snapshots are computed from the occupancy scan taken after vehicles have
//! moved. Once recorded they are never changed.

use std::collections::{HashMap, VecDeque};

use super::topology::Topology;
use super::types::{IntersectionId, SegmentId};
use super::vehicle::{VehicleFleet, VehicleStatus};

/// Occupancy of one segment at the end of a tick
#[derive(Debug, Clone, PartialEq)]
pub struct DensitySnapshot {
    pub segment: SegmentId,
    pub occupants: usize,
    pub capacity: u32,
    /// occupants / capacity
    pub density: f64,
    pub incident: bool,
}

/// Vehicles held at an intersection's outgoing segments by its signal
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionLoad {
    pub intersection: IntersectionId,
    pub queued: usize,
    pub capacity: u32,
}

impl IntersectionLoad {
    pub fn is_saturated(&self) -> bool {
        self.queued >= self.capacity as usize
    }
}

/// Everything recorded for one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickMetrics {
    pub tick: u64,
    pub densities: Vec<DensitySnapshot>,
    pub intersections: Vec<IntersectionLoad>,
    pub moving: usize,
    pub waiting: usize,
    pub arrived: usize,
    pub active_incidents: usize,
}

impl TickMetrics {
    pub fn density_of(&self, segment: SegmentId) -> Option<&DensitySnapshot> {
        self.densities.iter().find(|d| d.segment == segment)
    }

    pub fn peak_density(&self) -> f64 {
        self.densities
            .iter()
            .map(|d| d.density)
            .fold(0.0, f64::max)
    }
}

/// Ordered series of tick metrics
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    history: VecDeque<TickMetrics>,
    retention: Option<usize>,
    peak_density: f64,
    incidents_created: usize,
}

impl MetricsAggregator {
    pub fn new(retention: Option<usize>) -> Self {
        Self {
            retention,
            ..Self::default()
        }
    }

    /// Build and append the snapshot for `tick`. Occupancy must already be
    /// rescanned for the end of the tick.
    pub fn record(&mut self, tick: u64, topology: &Topology, fleet: &VehicleFleet) -> &TickMetrics {
        let densities: Vec<DensitySnapshot> = topology
            .segments()
            .iter()
            .map(|segment| DensitySnapshot {
                segment: segment.id,
                occupants: segment.occupant_count(),
                capacity: segment.capacity,
                density: segment.density(),
                incident: segment.has_incident(),
            })
            .collect();

        // Waiting vehicles on an unobstructed segment are held by the signal
        // at the segment's origin.
        let mut queued: HashMap<IntersectionId, usize> = HashMap::new();
        for vehicle in fleet.iter() {
            if vehicle.status() != VehicleStatus::Waiting {
                continue;
            }
            let Some(segment) = vehicle
                .current_segment()
                .and_then(|id| topology.segment(id).ok())
            else {
                continue;
            };
            if !segment.has_incident() {
                *queued.entry(segment.origin).or_default() += 1;
            }
        }

        let intersections = topology
            .intersections()
            .map(|intersection| IntersectionLoad {
                intersection: intersection.id,
                queued: queued.get(&intersection.id).copied().unwrap_or(0),
                capacity: intersection.capacity,
            })
            .collect();

        let metrics = TickMetrics {
            tick,
            active_incidents: densities.iter().filter(|d| d.incident).count(),
            densities,
            intersections,
            moving: fleet.count_with(VehicleStatus::Moving),
            waiting: fleet.count_with(VehicleStatus::Waiting),
            arrived: fleet.count_with(VehicleStatus::Arrived),
        };

        self.peak_density = self.peak_density.max(metrics.peak_density());
        if let Some(limit) = self.retention {
            while self.history.len() >= limit {
                self.history.pop_front();
            }
        }
        self.history.push_back(metrics);
        &self.history[self.history.len() - 1]
    }

    pub fn note_incidents_created(&mut self, count: usize) {
        self.incidents_created += count;
    }

    pub fn latest(&self) -> Option<&TickMetrics> {
        self.history.back()
    }

    /// Snapshot for a given tick, if it is still retained
    pub fn at_tick(&self, tick: u64) -> Option<&TickMetrics> {
        let first = self.history.front()?.tick;
        let offset = tick.checked_sub(first)?;
        self.history.get(offset as usize)
    }

    pub fn history(&self) -> impl Iterator<Item = &TickMetrics> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Highest segment density seen over the whole run
    pub fn peak_density(&self) -> f64 {
        self.peak_density
    }

    pub fn incidents_created(&self) -> usize {
        self.incidents_created
    }
}
