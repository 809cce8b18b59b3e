//! Traffic microsimulation core
//!
//! Discrete-tick simulation of vehicles routed over a fixed directed graph
//! of intersections and road segments, with cycling signals, random
//! incidents and per-segment density metrics.

mod config;
mod error;
mod incident;
mod metrics;
mod router;
mod scenario;
mod signal;
mod topology;
mod types;
mod vehicle;
mod world;

pub use config::{
    SignalTimings, SimConfig, DEFAULT_ACCIDENT_PROBABILITY, DEFAULT_INTERSECTION_CAPACITY,
    DEFAULT_ROAD_CAPACITY, DEFAULT_VEHICLE_COUNT, GREEN_DURATION, INCIDENT_MAX_DURATION,
    INCIDENT_MIN_DURATION, INCIDENT_MIN_OCCUPANTS, PROGRESS_INCREMENT, RED_DURATION,
    SIGNAL_WARMUP_MAX, SIGNAL_WARMUP_MIN, YELLOW_DURATION,
};
pub use error::SimError;
pub use incident::{update_incidents, Incident, IncidentModel};
pub use metrics::{DensitySnapshot, IntersectionLoad, MetricsAggregator, TickMetrics};
pub use router::{shortest_path, Router};
pub use scenario::{downtown_grid, AVENUES, STREETS};
pub use signal::{update_signals, Signal, SignalState};
pub use topology::{Intersection, IntersectionDef, RoadSegment, SegmentDef, Topology};
pub use types::{IntersectionId, Position, SegmentId, VehicleId};
pub use vehicle::{
    SegmentConditions, Vehicle, VehicleFleet, VehicleStatus, VehicleUpdate, VehicleView,
};
pub use world::{RunOutcome, SimWorld, SpawnReport, TickOutcome};
