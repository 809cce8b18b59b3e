//! End-to-end simulation behaviour

use std::collections::HashMap;

use traffic_microsim::simulation::{
    downtown_grid, Intersection, IntersectionId, Position, RoadSegment, RunOutcome, SegmentId,
    Signal, SignalState, SimConfig, SimError, SimWorld, TickOutcome, Topology, VehicleId,
    VehicleStatus, INCIDENT_MAX_DURATION, INCIDENT_MIN_DURATION,
};

const A: IntersectionId = IntersectionId(0);
const B: IntersectionId = IntersectionId(1);
const AB: SegmentId = SegmentId(0);

fn quiet_config() -> SimConfig {
    SimConfig {
        accident_probability: 0.0,
        seed: Some(1),
        ..SimConfig::default()
    }
}

/// A --> B, one segment of capacity 10, no signals
fn two_node_world(config: SimConfig) -> SimWorld {
    let mut topology = Topology::new();
    topology
        .add_intersection(Intersection::new(A, "A", Position::new(0.0, 0.0), 5))
        .unwrap();
    topology
        .add_intersection(Intersection::new(B, "B", Position::new(10.0, 0.0), 5))
        .unwrap();
    topology
        .add_segment(RoadSegment::new(AB, "A to B", A, B, 10))
        .unwrap();
    SimWorld::new(topology, config).unwrap()
}

fn vehicle(world: &SimWorld, id: VehicleId) -> (usize, f64, VehicleStatus) {
    let v = world.fleet().get(id).unwrap();
    (v.path_index(), v.progress(), v.status())
}

#[test]
fn test_single_vehicle_arrives_after_100_ticks() {
    let mut world = two_node_world(quiet_config());
    let id = world.spawn_vehicle(A, B).unwrap();
    assert_eq!(vehicle(&world, id).2, VehicleStatus::Waiting);

    for _ in 0..99 {
        assert_eq!(world.tick(), TickOutcome::Running);
    }
    let (index, progress, status) = vehicle(&world, id);
    assert_eq!(index, 0);
    assert!((progress - 0.99).abs() < 1e-9);
    assert_eq!(status, VehicleStatus::Moving);

    assert_eq!(world.tick(), TickOutcome::AllArrived);
    let (index, progress, status) = vehicle(&world, id);
    assert_eq!(status, VehicleStatus::Arrived);
    assert_eq!(index, 1);
    assert_eq!(progress, 0.0);
    assert_eq!(world.tick_count(), 100);
}

#[test]
fn test_red_signal_holds_vehicle() {
    let mut world = two_node_world(quiet_config());
    world.attach_signal(A, Signal::fixed(SignalState::Red)).unwrap();
    let id = world.spawn_vehicle(A, B).unwrap();

    let outcome = world.run(Some(1000), |_| true);
    assert_eq!(outcome, RunOutcome::TickLimit { ticks: 1000 });

    let (index, progress, status) = vehicle(&world, id);
    assert_eq!(index, 0);
    assert_eq!(progress, 0.0);
    assert_eq!(status, VehicleStatus::Waiting);
}

#[test]
fn test_signal_at_origin_gates_movement() {
    let mut world = two_node_world(quiet_config());
    world.attach_signal(A, Signal::new(SignalState::Red, 10)).unwrap();
    let id = world.spawn_vehicle(A, B).unwrap();

    // Red for 9 ticks, green from tick 10 for 60 ticks
    for _ in 0..9 {
        world.tick();
    }
    assert_eq!(vehicle(&world, id), (0, 0.0, VehicleStatus::Waiting));

    world.tick();
    let (_, progress, status) = vehicle(&world, id);
    assert_eq!(status, VehicleStatus::Moving);
    assert!((progress - 0.01).abs() < 1e-9);
}

/// Incidents age before vehicles move, so a 50-tick incident at 0.5 is
/// cleared on the same tick the vehicle would reach it and never holds it.
#[test]
fn test_incident_expires_as_vehicle_reaches_it() {
    let mut world = two_node_world(quiet_config());
    world.inject_incident(AB, 0.5, 50).unwrap();
    let id = world.spawn_vehicle(A, B).unwrap();

    for tick in 1..=49u32 {
        world.tick();
        let incident = world.topology().segment(AB).unwrap().incident.clone().unwrap();
        assert_eq!(incident.elapsed, tick);
        let (_, progress, status) = vehicle(&world, id);
        assert!(progress < 0.5);
        assert_eq!(status, VehicleStatus::Moving);
    }

    // Cleared on the tick elapsed reaches the duration, before vehicles move
    world.tick();
    assert!(world.topology().segment(AB).unwrap().incident.is_none());

    let outcome = world.run(Some(1000), |_| true);
    assert_eq!(outcome, RunOutcome::Completed { ticks: 50 });
    assert_eq!(world.tick_count(), 100);
}

#[test]
fn test_incident_holds_vehicle_until_cleared() {
    let mut world = two_node_world(quiet_config());
    world.inject_incident(AB, 0.5, 80).unwrap();
    let id = world.spawn_vehicle(A, B).unwrap();

    for _ in 0..50 {
        world.tick();
    }
    let (_, progress, status) = vehicle(&world, id);
    assert!((progress - 0.5).abs() < 1e-9);
    assert!(progress <= 0.5);
    assert_eq!(status, VehicleStatus::Waiting);

    // Held through ticks 51 to 79
    for _ in 51..80 {
        world.tick();
        let (_, held, status) = vehicle(&world, id);
        assert_eq!(held, progress);
        assert_eq!(status, VehicleStatus::Waiting);
    }

    world.tick();
    assert!(world.topology().segment(AB).unwrap().incident.is_none());
    let (_, resumed, status) = vehicle(&world, id);
    assert_eq!(status, VehicleStatus::Moving);
    assert!(resumed > progress);

    let outcome = world.run(Some(1000), |_| true);
    // 100 moving ticks in total: 1 to 50 and 80 to 129
    assert_eq!(outcome, RunOutcome::Completed { ticks: 49 });
    assert_eq!(world.tick_count(), 129);
}

#[test]
fn test_vehicle_stops_exactly_at_incident() {
    let mut world = two_node_world(quiet_config());
    world.inject_incident(AB, 0.505, 200).unwrap();
    let id = world.spawn_vehicle(A, B).unwrap();

    for _ in 0..50 {
        world.tick();
    }
    let (_, progress, status) = vehicle(&world, id);
    assert!(progress < 0.505);
    assert_eq!(status, VehicleStatus::Moving);

    world.tick();
    assert_eq!(vehicle(&world, id), (0, 0.505, VehicleStatus::Waiting));

    for _ in 0..20 {
        world.tick();
        assert_eq!(vehicle(&world, id), (0, 0.505, VehicleStatus::Waiting));
    }
}

#[test]
fn test_vehicle_past_incident_is_still_blocked() {
    let mut world = two_node_world(quiet_config());
    let id = world.spawn_vehicle(A, B).unwrap();
    for _ in 0..30 {
        world.tick();
    }
    let (_, progress, _) = vehicle(&world, id);

    world.inject_incident(AB, 0.1, 20).unwrap();
    for _ in 0..19 {
        world.tick();
        assert_eq!(vehicle(&world, id), (0, progress, VehicleStatus::Waiting));
    }
    world.tick();
    assert_eq!(vehicle(&world, id).2, VehicleStatus::Moving);
}

#[test]
fn test_incident_lifecycle() {
    let mut world = two_node_world(quiet_config());
    world.inject_incident(AB, 0.25, 5).unwrap();
    assert_eq!(world.metrics().incidents_created(), 1);

    let mut last_elapsed = 0;
    for _ in 0..4 {
        world.tick();
        let incident = world.topology().segment(AB).unwrap().incident.clone().unwrap();
        assert!(incident.elapsed > last_elapsed);
        assert!(incident.elapsed < incident.duration);
        assert_eq!(incident.remaining(), 5 - incident.elapsed);
        last_elapsed = incident.elapsed;
    }
    assert_eq!(last_elapsed, 4);

    world.tick();
    let segment = world.topology().segment(AB).unwrap();
    assert!(segment.incident.is_none());
    assert!(!world.latest_metrics().unwrap().density_of(AB).unwrap().incident);

    // The segment is immediately eligible again
    world.inject_incident(AB, 0.75, 3).unwrap();
}

#[test]
fn test_inject_incident_errors() {
    let mut world = two_node_world(quiet_config());

    assert_eq!(
        world.inject_incident(SegmentId(7), 0.5, 10),
        Err(SimError::SegmentNotFound(SegmentId(7)))
    );
    assert!(matches!(
        world.inject_incident(AB, 1.0, 10),
        Err(SimError::InvalidIncident { .. })
    ));
    assert!(matches!(
        world.inject_incident(AB, 0.5, 0),
        Err(SimError::InvalidIncident { .. })
    ));

    world.inject_incident(AB, 0.5, 10).unwrap();
    assert_eq!(
        world.inject_incident(AB, 0.2, 10),
        Err(SimError::IncidentActive(AB))
    );
}

#[test]
fn test_random_incident_needs_two_occupants() {
    let config = SimConfig {
        accident_probability: 1.0,
        ..quiet_config()
    };

    let mut lone = two_node_world(config.clone());
    lone.spawn_vehicle(A, B).unwrap();
    lone.tick();
    assert!(lone.topology().segment(AB).unwrap().incident.is_none());

    let mut pair = two_node_world(config);
    pair.spawn_vehicle(A, B).unwrap();
    pair.spawn_vehicle(A, B).unwrap();
    pair.tick();

    let incident = pair.topology().segment(AB).unwrap().incident.clone().unwrap();
    assert!((0.0..1.0).contains(&incident.position));
    assert!((INCIDENT_MIN_DURATION..=INCIDENT_MAX_DURATION).contains(&incident.duration));
    assert_eq!(incident.elapsed, 1);
    assert_eq!(pair.metrics().incidents_created(), 1);
}

#[test]
fn test_degenerate_and_unroutable_trips() {
    let mut world = two_node_world(quiet_config());

    let id = world.spawn_vehicle(A, A).unwrap();
    assert_eq!(vehicle(&world, id), (0, 0.0, VehicleStatus::Arrived));
    assert_eq!(world.fleet().get(id).unwrap().route(), &[A]);

    assert_eq!(
        world.spawn_vehicle(B, A),
        Err(SimError::RouteNotFound {
            origin: B,
            destination: A
        })
    );
    assert_eq!(world.fleet().len(), 1);

    assert_eq!(world.run(None, |_| true), RunOutcome::Completed { ticks: 0 });
}

#[test]
fn test_populate_skips_unroutable_trips() {
    let mut world = two_node_world(quiet_config());
    let report = world.populate(50);

    // Only A -> B can be routed
    assert_eq!(report.spawned.len() + report.skipped.len(), 50);
    assert!(!report.spawned.is_empty());
    assert!(!report.skipped.is_empty());
    for err in &report.skipped {
        assert!(matches!(err, SimError::RouteNotFound { .. }));
    }
    for id in &report.spawned {
        assert_eq!(world.fleet().get(*id).unwrap().route(), &[A, B]);
    }
}

#[test]
fn test_vehicles_move_forward_and_are_counted_once() {
    let config = SimConfig {
        accident_probability: 0.01,
        seed: Some(2024),
        metrics_retention: Some(4),
        ..SimConfig::default()
    };
    let mut world = SimWorld::new(downtown_grid(10, 5), config).unwrap();
    world.attach_random_signals();
    let report = world.populate(200);
    assert_eq!(report.spawned.len(), 200);

    for _ in 0..1500 {
        let before: Vec<_> = world.fleet().iter().cloned().collect();
        world.tick();

        for (old, new) in before.iter().zip(world.fleet().iter()) {
            assert!(
                new.compare_position(old).is_ge(),
                "vehicle {} moved backwards",
                new.id
            );
            if old.is_arrived() {
                assert!(new.is_arrived());
            }
        }

        let mut seen: HashMap<VehicleId, usize> = HashMap::new();
        let latest = world.latest_metrics().unwrap();
        for segment in world.topology().segments() {
            for occupant in segment.occupants() {
                *seen.entry(occupant).or_default() += 1;
                let v = world.fleet().get(occupant).unwrap();
                assert_eq!(v.current_segment(), Some(segment.id));
            }
            let snapshot = latest.density_of(segment.id).unwrap();
            assert_eq!(snapshot.occupants, segment.occupant_count());
            assert_eq!(
                snapshot.density,
                segment.occupant_count() as f64 / segment.capacity as f64
            );
        }
        for v in world.fleet().iter() {
            let expected = if v.is_arrived() { 0 } else { 1 };
            assert_eq!(seen.get(&v.id).copied().unwrap_or(0), expected);
        }
    }

    assert!(world.metrics().len() <= 4);
}

#[test]
fn test_grid_run_completes() {
    let config = SimConfig {
        seed: Some(5),
        metrics_retention: Some(16),
        ..SimConfig::default()
    };
    let mut world = SimWorld::new(downtown_grid(10, 5), config).unwrap();
    world.attach_random_signals();
    world.populate(30);

    let outcome = world.run(Some(50_000), |_| true);
    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    assert!(world.fleet().all_arrived());

    let latest = world.latest_metrics().unwrap();
    assert_eq!(latest.tick, outcome.ticks());
    assert_eq!(latest.arrived, 30);
    assert!(latest.densities.iter().all(|d| d.occupants == 0));
}

#[test]
fn test_same_seed_same_run() {
    let run = |seed| {
        let config = SimConfig {
            accident_probability: 0.05,
            seed: Some(seed),
            ..SimConfig::default()
        };
        let mut world = SimWorld::new(downtown_grid(10, 5), config).unwrap();
        world.attach_random_signals();
        world.populate(100);
        world.run(Some(600), |_| true);
        (
            world.vehicle_views(),
            world.latest_metrics().cloned(),
            world.metrics().incidents_created(),
        )
    };

    assert_eq!(run(77), run(77));
}

#[test]
fn test_cancel_between_ticks() {
    let mut world = two_node_world(quiet_config());
    let id = world.spawn_vehicle(A, B).unwrap();

    let outcome = world.run(None, |w| w.tick_count() < 10);
    assert_eq!(outcome, RunOutcome::Cancelled { ticks: 10 });
    assert_eq!(world.tick_count(), 10);
    assert_eq!(world.metrics().len(), 10);
    assert_eq!(world.latest_metrics().unwrap().tick, 10);
    assert!((vehicle(&world, id).1 - 0.1).abs() < 1e-9);

    // Resuming picks up where the run stopped
    let outcome = world.run(None, |_| true);
    assert_eq!(outcome, RunOutcome::Completed { ticks: 90 });
}

#[test]
fn test_metrics_series() {
    let mut world = two_node_world(quiet_config());
    world.attach_signal(A, Signal::fixed(SignalState::Red)).unwrap();
    for _ in 0..3 {
        world.spawn_vehicle(A, B).unwrap();
    }
    for _ in 0..5 {
        world.tick();
    }

    let metrics = world.metrics();
    assert_eq!(metrics.len(), 5);
    for tick in 1..=5 {
        assert_eq!(metrics.at_tick(tick).unwrap().tick, tick);
    }
    assert!(metrics.at_tick(0).is_none());
    assert!(metrics.at_tick(6).is_none());

    let latest = metrics.latest().unwrap();
    let density = latest.density_of(AB).unwrap();
    assert_eq!(density.occupants, 3);
    assert_eq!(density.capacity, 10);
    assert!((density.density - 0.3).abs() < 1e-12);
    assert!(!density.incident);
    assert_eq!((latest.moving, latest.waiting, latest.arrived), (0, 3, 0));

    let load = latest
        .intersections
        .iter()
        .find(|load| load.intersection == A)
        .unwrap();
    assert_eq!(load.queued, 3);
    assert!(!load.is_saturated());
    assert!((metrics.peak_density() - 0.3).abs() < 1e-12);
}

#[test]
fn test_vehicle_view_interpolates_position() {
    let mut world = two_node_world(quiet_config());
    let id = world.spawn_vehicle(A, B).unwrap();
    for _ in 0..25 {
        world.tick();
    }

    let views = world.vehicle_views();
    let view = views.iter().find(|v| v.id == id).unwrap();
    assert_eq!(view.segment, Some(AB));
    assert_eq!(view.status, VehicleStatus::Moving);
    assert!((view.position.x - 2.5).abs() < 1e-4);
    assert_eq!(view.position.y, 0.0);
}

#[test]
fn test_occupants_ordered_by_progress() {
    let mut world = two_node_world(quiet_config());
    let first = world.spawn_vehicle(A, B).unwrap();
    for _ in 0..10 {
        world.tick();
    }
    let second = world.spawn_vehicle(A, B).unwrap();
    world.tick();

    let occupants: Vec<_> = world.topology().segment(AB).unwrap().occupants().collect();
    assert_eq!(occupants, vec![second, first]);
}

#[test]
fn test_config_validation() {
    assert!(SimConfig::default().validate().is_ok());

    let invalid = [
        SimConfig {
            accident_probability: -0.1,
            ..SimConfig::default()
        },
        SimConfig {
            road_capacity: 0,
            ..SimConfig::default()
        },
        SimConfig {
            yellow_duration: 0,
            ..SimConfig::default()
        },
        SimConfig {
            progress_increment: 0.0,
            ..SimConfig::default()
        },
        SimConfig {
            incident_min_duration: 700,
            ..SimConfig::default()
        },
        SimConfig {
            signal_warmup_max: 5,
            ..SimConfig::default()
        },
        SimConfig {
            metrics_retention: Some(0),
            ..SimConfig::default()
        },
    ];
    for config in invalid {
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));
        assert!(SimWorld::new(Topology::new(), config).is_err());
    }
}
