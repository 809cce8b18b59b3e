//! Vehicle movement logic for the traffic simulation
//!
//! Vehicles follow a fixed route one segment at a time. Progress only ever
//! increases; the only things that hold a vehicle back are an incident ahead
//! on its segment and a non-green signal at the segment's origin.

use log::warn;
use std::cmp::Ordering;

use super::error::SimError;
use super::router::Router;
use super::signal::SignalState;
use super::topology::Topology;
use super::types::{IntersectionId, Position, SegmentId, VehicleId};

/// Tolerance for float accumulation when comparing progress to a threshold
const PROGRESS_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleStatus {
    Waiting,
    Moving,
    Arrived,
}

/// What happened to a vehicle during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleUpdate {
    /// Already arrived; nothing to do
    Idle,
    /// Held behind an incident
    BlockedByIncident,
    /// Held by a red or yellow signal
    HeldAtSignal,
    /// Advanced along the current segment
    Moved,
    /// Finished a segment and moved onto the next one
    Crossed(IntersectionId),
    /// Reached the final node of the route
    Arrived(IntersectionId),
}

/// Conditions on the vehicle's current segment for this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentConditions {
    pub incident_position: Option<f64>,
    pub signal: Option<SignalState>,
}

/// A vehicle in the traffic simulation
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: VehicleId,
    route: Vec<IntersectionId>,
    /// `legs[i]` runs from `route[i]` to `route[i + 1]`
    legs: Vec<SegmentId>,
    path_index: usize,
    progress: f64,
    status: VehicleStatus,
}

impl Vehicle {
    /// Create a vehicle on a route, resolving the segment for every leg. A
    /// single-node route is arrived from the start.
    pub fn new(
        id: VehicleId,
        route: Vec<IntersectionId>,
        topology: &Topology,
    ) -> Result<Self, SimError> {
        let legs = route
            .windows(2)
            .map(|pair| topology.segment_between(pair[0], pair[1]))
            .collect::<Result<Vec<_>, _>>()?;

        let status = if route.len() <= 1 {
            VehicleStatus::Arrived
        } else {
            VehicleStatus::Waiting
        };

        Ok(Self {
            id,
            route,
            legs,
            path_index: 0,
            progress: 0.0,
            status,
        })
    }

    pub fn route(&self) -> &[IntersectionId] {
        &self.route
    }

    pub fn path_index(&self) -> usize {
        self.path_index
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn status(&self) -> VehicleStatus {
        self.status
    }

    pub fn is_arrived(&self) -> bool {
        self.status == VehicleStatus::Arrived
    }

    /// The intersection the vehicle last left (or its final node once arrived)
    pub fn current_node(&self) -> Option<IntersectionId> {
        self.route.get(self.path_index).copied()
    }

    pub fn next_node(&self) -> Option<IntersectionId> {
        if self.is_arrived() {
            return None;
        }
        self.route.get(self.path_index + 1).copied()
    }

    /// The segment being traversed, or `None` once arrived
    pub fn current_segment(&self) -> Option<SegmentId> {
        if self.is_arrived() {
            return None;
        }
        self.legs.get(self.path_index).copied()
    }

    /// Lexicographic (path index, progress) ordering used to check that
    /// vehicles only ever move forward
    pub fn compare_position(&self, other: &Vehicle) -> Ordering {
        self.path_index
            .cmp(&other.path_index)
            .then(self.progress.total_cmp(&other.progress))
    }

    /// Advance by one tick under the given segment conditions
    pub fn update(&mut self, conditions: SegmentConditions, increment: f64) -> VehicleUpdate {
        if self.is_arrived() {
            return VehicleUpdate::Idle;
        }

        let before = (self.path_index, self.progress);
        let update = match conditions.incident_position {
            Some(position) => self.approach_incident(position, increment),
            None => self.pass_signal(conditions.signal, increment),
        };

        debug_assert!(
            (self.path_index, self.progress) >= before,
            "vehicle {} moved backwards",
            self.id
        );
        debug_assert!((0.0..1.0).contains(&self.progress));
        update
    }

    /// Progress is clamped at the incident position rather than overshooting
    /// it by part of an increment, so an approaching vehicle stops exactly
    /// at the blockage.
    fn approach_incident(&mut self, position: f64, increment: f64) -> VehicleUpdate {
        if self.progress + PROGRESS_EPSILON >= position {
            self.status = VehicleStatus::Waiting;
            return VehicleUpdate::BlockedByIncident;
        }

        self.progress = (self.progress + increment).min(position);
        if self.progress + PROGRESS_EPSILON >= position {
            self.status = VehicleStatus::Waiting;
        } else {
            self.status = VehicleStatus::Moving;
        }
        VehicleUpdate::Moved
    }

    fn pass_signal(&mut self, signal: Option<SignalState>, increment: f64) -> VehicleUpdate {
        if let Some(state) = signal {
            if !state.allows_entry() {
                self.status = VehicleStatus::Waiting;
                return VehicleUpdate::HeldAtSignal;
            }
        }

        self.status = VehicleStatus::Moving;
        self.progress += increment;
        if self.progress + PROGRESS_EPSILON < 1.0 {
            return VehicleUpdate::Moved;
        }

        self.progress = 0.0;
        self.path_index += 1;
        let reached = self.route[self.path_index];
        if self.path_index + 1 >= self.route.len() {
            self.status = VehicleStatus::Arrived;
            VehicleUpdate::Arrived(reached)
        } else {
            VehicleUpdate::Crossed(reached)
        }
    }
}

/// Read-only vehicle state for renderers and loggers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleView {
    pub id: VehicleId,
    pub segment: Option<SegmentId>,
    pub path_index: usize,
    pub progress: f64,
    pub status: VehicleStatus,
    /// Position interpolated between the segment's endpoints
    pub position: Position,
}

/// The set of vehicles in a run
#[derive(Debug, Default)]
pub struct VehicleFleet {
    vehicles: Vec<Vehicle>,
}

impl VehicleFleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route and add a vehicle. `RouteNotFound` leaves the fleet unchanged.
    pub fn spawn(
        &mut self,
        origin: IntersectionId,
        destination: IntersectionId,
        topology: &Topology,
        router: &mut Router,
    ) -> Result<VehicleId, SimError> {
        let route = router.shortest_path(topology, origin, destination)?;
        let id = VehicleId(self.vehicles.len());
        let vehicle = Vehicle::new(id, route, topology)?;
        self.vehicles.push(vehicle);
        Ok(id)
    }

    pub fn get(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.iter()
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn all_arrived(&self) -> bool {
        self.vehicles.iter().all(Vehicle::is_arrived)
    }

    pub fn count_with(&self, status: VehicleStatus) -> usize {
        self.vehicles.iter().filter(|v| v.status == status).count()
    }

    /// Recompute every segment's occupant list from scratch
    pub fn scan_occupancy(&self, topology: &mut Topology) {
        for segment in topology.segments_mut() {
            segment.clear_occupants();
        }

        for vehicle in &self.vehicles {
            let Some(segment_id) = vehicle.current_segment() else {
                continue;
            };
            match topology.segment_mut(segment_id) {
                Ok(segment) => segment.add_occupant(vehicle.id, vehicle.progress),
                Err(err) => warn!("Vehicle {} is not on a known segment: {}", vehicle.id, err),
            }
        }
    }

    /// Move every vehicle that has not arrived by one tick. Returns the
    /// updates worth reporting (crossings and arrivals).
    pub fn update(&mut self, topology: &Topology, increment: f64) -> Vec<(VehicleId, VehicleUpdate)> {
        let mut results = Vec::new();

        for vehicle in &mut self.vehicles {
            let Some(segment_id) = vehicle.current_segment() else {
                continue;
            };

            let incident_position = topology
                .segment(segment_id)
                .ok()
                .and_then(|segment| segment.incident.as_ref())
                .map(|incident| incident.position);

            let signal = vehicle
                .current_node()
                .and_then(|node| topology.intersection(node).ok())
                .and_then(|intersection| intersection.signal.as_ref())
                .map(|signal| signal.state());

            let update = vehicle.update(
                SegmentConditions {
                    incident_position,
                    signal,
                },
                increment,
            );

            if matches!(update, VehicleUpdate::Crossed(_) | VehicleUpdate::Arrived(_)) {
                results.push((vehicle.id, update));
            }
        }

        results
    }

    /// Renderer view of one vehicle
    pub fn view(&self, vehicle: &Vehicle, topology: &Topology) -> VehicleView {
        let node_position = |id: Option<IntersectionId>| {
            id.and_then(|id| topology.intersection(id).ok())
                .map(|intersection| intersection.position)
                .unwrap_or_default()
        };

        let from = node_position(vehicle.current_node());
        let position = match vehicle.next_node() {
            Some(next) => from.lerp(&node_position(Some(next)), vehicle.progress as f32),
            None => from,
        };

        VehicleView {
            id: vehicle.id,
            segment: vehicle.current_segment(),
            path_index: vehicle.path_index,
            progress: vehicle.progress,
            status: vehicle.status,
            position,
        }
    }

    pub fn views(&self, topology: &Topology) -> Vec<VehicleView> {
        self.vehicles
            .iter()
            .map(|vehicle| self.view(vehicle, topology))
            .collect()
    }
}
