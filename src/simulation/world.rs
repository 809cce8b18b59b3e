//! Main simulation world that ties everything together
//!
//! `SimWorld` owns all mutable simulation state and drives ticks in a fixed
//! order: signals, occupancy scan, incident spawn/clear, vehicle movement,
//! metrics. A tick is never partially applied; hosts may stop between ticks.

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use super::config::{SignalTimings, SimConfig};
use super::error::SimError;
use super::incident::{update_incidents, Incident, IncidentModel};
use super::metrics::{MetricsAggregator, TickMetrics};
use super::router::Router;
use super::signal::{update_signals, Signal};
use super::topology::Topology;
use super::types::{IntersectionId, SegmentId, VehicleId};
use super::vehicle::{VehicleFleet, VehicleUpdate, VehicleView};

/// Whether the run continues after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running,
    AllArrived,
}

/// How a call to `SimWorld::run` ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every vehicle arrived
    Completed { ticks: u64 },
    /// The tick limit was reached first
    TickLimit { ticks: u64 },
    /// The host asked to stop
    Cancelled { ticks: u64 },
}

impl RunOutcome {
    pub fn ticks(&self) -> u64 {
        match *self {
            RunOutcome::Completed { ticks }
            | RunOutcome::TickLimit { ticks }
            | RunOutcome::Cancelled { ticks } => ticks,
        }
    }
}

/// Result of populating the world with random trips
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpawnReport {
    pub spawned: Vec<VehicleId>,
    pub skipped: Vec<SimError>,
}

/// The main simulation world
pub struct SimWorld {
    topology: Topology,
    router: Router,
    fleet: VehicleFleet,
    metrics: MetricsAggregator,
    config: SimConfig,
    timings: SignalTimings,
    incidents: IncidentModel,
    rng: StdRng,
    seed: u64,
    tick: u64,
}

impl SimWorld {
    /// Create a world over `topology`. Signals are not attached; see
    /// `attach_random_signals` and `attach_signal`.
    pub fn new(topology: Topology, config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        info!(
            "Simulation seeded with {} ({} intersections, {} segments)",
            seed,
            topology.intersection_count(),
            topology.segment_count()
        );

        Ok(Self {
            timings: config.signal_timings(),
            incidents: IncidentModel {
                probability: config.accident_probability,
                min_duration: config.incident_min_duration,
                max_duration: config.incident_max_duration,
            },
            metrics: MetricsAggregator::new(config.metrics_retention),
            topology,
            router: Router::new(),
            fleet: VehicleFleet::new(),
            config,
            rng: StdRng::seed_from_u64(seed),
            seed,
            tick: 0,
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn fleet(&self) -> &VehicleFleet {
        &self.fleet
    }

    pub fn metrics(&self) -> &MetricsAggregator {
        &self.metrics
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of completed ticks
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Give every intersection a signal with a random state and a random
    /// first phase
    pub fn attach_random_signals(&mut self) {
        let (min, max) = (self.config.signal_warmup_min, self.config.signal_warmup_max);
        for intersection in self.topology.intersections_mut() {
            intersection.signal = Some(Signal::randomized(&mut self.rng, min, max));
        }
    }

    pub fn attach_signal(&mut self, intersection: IntersectionId, signal: Signal) -> Result<(), SimError> {
        self.topology.intersection_mut(intersection)?.signal = Some(signal);
        Ok(())
    }

    /// Place an incident directly, e.g. to set up a scenario
    pub fn inject_incident(
        &mut self,
        segment: SegmentId,
        position: f64,
        duration: u32,
    ) -> Result<(), SimError> {
        let incident = Incident::new(segment, position, duration)?;
        let road = self.topology.segment_mut(segment)?;
        if road.incident.is_some() {
            return Err(SimError::IncidentActive(segment));
        }
        road.incident = Some(incident);
        self.metrics.note_incidents_created(1);
        Ok(())
    }

    /// Route a vehicle and add it to the fleet
    pub fn spawn_vehicle(
        &mut self,
        origin: IntersectionId,
        destination: IntersectionId,
    ) -> Result<VehicleId, SimError> {
        let id = self
            .fleet
            .spawn(origin, destination, &self.topology, &mut self.router)?;
        self.fleet.scan_occupancy(&mut self.topology);
        Ok(id)
    }

    /// Create up to `count` vehicles between random distinct intersections.
    /// Trips that cannot be routed are skipped and reported.
    pub fn populate(&mut self, count: usize) -> SpawnReport {
        let mut report = SpawnReport::default();
        let nodes = self.topology.intersection_ids();
        if nodes.len() < 2 {
            warn!("Cannot create trips on a network with fewer than two intersections");
            return report;
        }

        for _ in 0..count {
            let (origin, destination) = loop {
                let origin = nodes.choose(&mut self.rng).copied();
                let destination = nodes.choose(&mut self.rng).copied();
                let (Some(origin), Some(destination)) = (origin, destination) else {
                    return report;
                };
                if origin != destination {
                    break (origin, destination);
                }
            };

            match self
                .fleet
                .spawn(origin, destination, &self.topology, &mut self.router)
            {
                Ok(id) => report.spawned.push(id),
                Err(err) => {
                    warn!("Skipping vehicle: {}", err);
                    report.skipped.push(err);
                }
            }
        }

        self.fleet.scan_occupancy(&mut self.topology);
        debug!(
            "Populated {} vehicles ({} skipped, {} distinct routes)",
            report.spawned.len(),
            report.skipped.len(),
            self.router.cached_routes()
        );
        report
    }

    /// Run one full tick
    pub fn tick(&mut self) -> TickOutcome {
        self.tick += 1;

        update_signals(&mut self.topology, &self.timings);

        self.fleet.scan_occupancy(&mut self.topology);
        let created = self.incidents.spawn(&mut self.topology, &mut self.rng);
        self.metrics.note_incidents_created(created.len());
        update_incidents(&mut self.topology);

        let updates = self
            .fleet
            .update(&self.topology, self.config.progress_increment);
        for (vehicle, update) in &updates {
            if let VehicleUpdate::Arrived(at) = update {
                debug!("Vehicle {} arrived at {} on tick {}", vehicle, at, self.tick);
            }
        }

        self.fleet.scan_occupancy(&mut self.topology);
        self.metrics.record(self.tick, &self.topology, &self.fleet);

        if self.fleet.all_arrived() {
            TickOutcome::AllArrived
        } else {
            TickOutcome::Running
        }
    }

    /// Tick until every vehicle has arrived, `max_ticks` more ticks have run,
    /// or `keep_going` returns false. `keep_going` is consulted before each
    /// tick.
    pub fn run<F>(&mut self, max_ticks: Option<u64>, mut keep_going: F) -> RunOutcome
    where
        F: FnMut(&SimWorld) -> bool,
    {
        let start = self.tick;
        if self.fleet.all_arrived() {
            return RunOutcome::Completed { ticks: 0 };
        }

        loop {
            let ticks = self.tick - start;
            if max_ticks.is_some_and(|limit| ticks >= limit) {
                return RunOutcome::TickLimit { ticks };
            }
            if !keep_going(self) {
                info!("Simulation cancelled after {} ticks", ticks);
                return RunOutcome::Cancelled { ticks };
            }
            if self.tick() == TickOutcome::AllArrived {
                return RunOutcome::Completed {
                    ticks: self.tick - start,
                };
            }
        }
    }

    pub fn latest_metrics(&self) -> Option<&TickMetrics> {
        self.metrics.latest()
    }

    pub fn vehicle_views(&self) -> Vec<VehicleView> {
        self.fleet.views(&self.topology)
    }

    /// Print a summary of the world state
    pub fn print_summary(&self) {
        println!("=== Traffic Simulation Summary ===");
        println!("Tick: {}", self.tick);
        println!(
            "Intersections: {}, Segments: {}",
            self.topology.intersection_count(),
            self.topology.segment_count()
        );

        if let Some(latest) = self.metrics.latest() {
            println!(
                "Vehicles: {} moving, {} waiting, {} arrived",
                latest.moving, latest.waiting, latest.arrived
            );
            println!(
                "Active incidents: {}, peak density this tick: {:.2}",
                latest.active_incidents,
                latest.peak_density()
            );

            let saturated = latest
                .intersections
                .iter()
                .filter(|load| load.is_saturated())
                .count();
            println!("Saturated intersections: {}", saturated);
        } else {
            println!("Vehicles: {}", self.fleet.len());
        }

        let mut congested: Vec<_> = self
            .topology
            .segments()
            .iter()
            .filter(|segment| segment.occupant_count() > 0)
            .collect();
        congested.sort_by(|a, b| b.density().total_cmp(&a.density()));
        if !congested.is_empty() {
            println!("--- Busiest Segments ---");
            for segment in congested.iter().take(5) {
                println!(
                    "  {} {}: density={:.2}{}",
                    segment.id,
                    segment.name,
                    segment.density(),
                    if segment.has_incident() { " (incident)" } else { "" }
                );
            }
        }
    }
}
