use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::time::Instant;

use traffic_microsim::simulation::{downtown_grid, RunOutcome, SimConfig, SimWorld};

#[derive(Parser)]
#[command(name = "traffic_microsim")]
#[command(about = "Headless traffic microsimulation over a downtown street grid")]
struct Cli {
    /// Number of vehicles to create
    #[arg(long, default_value_t = traffic_microsim::simulation::DEFAULT_VEHICLE_COUNT)]
    vehicles: usize,

    /// Per-tick incident probability for each segment holding two or more vehicles
    #[arg(long, default_value_t = traffic_microsim::simulation::DEFAULT_ACCIDENT_PROBABILITY)]
    accident_probability: f64,

    /// Vehicle capacity of every road segment
    #[arg(long, default_value_t = traffic_microsim::simulation::DEFAULT_ROAD_CAPACITY)]
    road_capacity: u32,

    /// Queue capacity of every intersection
    #[arg(long, default_value_t = traffic_microsim::simulation::DEFAULT_INTERSECTION_CAPACITY)]
    intersection_capacity: u32,

    /// Green phase length in ticks
    #[arg(long, default_value_t = traffic_microsim::simulation::GREEN_DURATION)]
    green: u32,

    /// Yellow phase length in ticks
    #[arg(long, default_value_t = traffic_microsim::simulation::YELLOW_DURATION)]
    yellow: u32,

    /// Red phase length in ticks
    #[arg(long, default_value_t = traffic_microsim::simulation::RED_DURATION)]
    red: u32,

    /// Progress gained per tick of movement
    #[arg(long, default_value_t = traffic_microsim::simulation::PROGRESS_INCREMENT)]
    increment: f64,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many ticks even if vehicles are still travelling
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Print a summary every N ticks (0 disables)
    #[arg(long, default_value = "0")]
    report_every: u64,
}

impl Cli {
    fn to_config(&self) -> SimConfig {
        SimConfig {
            vehicle_count: self.vehicles,
            accident_probability: self.accident_probability,
            road_capacity: self.road_capacity,
            intersection_capacity: self.intersection_capacity,
            green_duration: self.green,
            yellow_duration: self.yellow,
            red_duration: self.red,
            progress_increment: self.increment,
            seed: self.seed,
            ..SimConfig::default()
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    run_headless(cli.to_config(), cli.max_ticks, cli.report_every)
}

/// Run the simulation in headless mode (no graphics)
fn run_headless(config: SimConfig, max_ticks: Option<u64>, report_every: u64) -> Result<()> {
    let started = Instant::now();

    let topology = downtown_grid(config.road_capacity, config.intersection_capacity);
    let vehicle_count = config.vehicle_count;
    let mut world = SimWorld::new(topology, config).context("Invalid simulation configuration")?;
    world.attach_random_signals();

    let report = world.populate(vehicle_count);
    info!(
        "Created {} vehicles ({} could not be routed)",
        report.spawned.len(),
        report.skipped.len()
    );

    let outcome = world.run(max_ticks, |world| {
        let tick = world.tick_count();
        if report_every > 0 && tick > 0 && tick % report_every == 0 {
            world.print_summary();
            println!();
        }
        true
    });

    let elapsed = started.elapsed().as_secs_f64();
    let metrics = world.metrics();
    let arrived = metrics.latest().map(|m| m.arrived).unwrap_or(0);

    info!("=== SIMULATION COMPLETE ===");
    info!(
        "Outcome: {}",
        match outcome {
            RunOutcome::Completed { .. } => "all vehicles arrived",
            RunOutcome::TickLimit { .. } => "tick limit reached",
            RunOutcome::Cancelled { .. } => "cancelled",
        }
    );
    info!("Ticks: {}", outcome.ticks());
    info!("Seed: {}", world.seed());
    info!("Vehicles spawned: {}", report.spawned.len());
    info!("Vehicles skipped: {}", report.skipped.len());
    info!("Vehicles arrived: {}", arrived);
    info!("Incidents created: {}", metrics.incidents_created());
    info!("Peak density: {:.2}", metrics.peak_density());
    info!("Execution time: {:.3}s", elapsed);

    world.print_summary();
    Ok(())
}
