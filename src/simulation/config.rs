//! Simulation configuration
//!
//! Every recognised option with its default. Hosts override fields on
//! `SimConfig::default()` and call `validate()` before building a world.

use super::error::SimError;

/// Number of vehicles created by `SimWorld::populate` in the headless driver
pub const DEFAULT_VEHICLE_COUNT: usize = 1000;
/// Per-tick chance that a qualifying segment gets an incident
pub const DEFAULT_ACCIDENT_PROBABILITY: f64 = 0.001;
/// Vehicles per road segment before the density reaches 1.0
pub const DEFAULT_ROAD_CAPACITY: u32 = 10;
/// Vehicles that may queue at an intersection
pub const DEFAULT_INTERSECTION_CAPACITY: u32 = 5;

/// Signal phase durations in ticks
pub const GREEN_DURATION: u32 = 60;
pub const YELLOW_DURATION: u32 = 30;
pub const RED_DURATION: u32 = 60;

/// Progress gained along a segment per tick of movement
pub const PROGRESS_INCREMENT: f64 = 0.01;

/// Inclusive range of incident lifetimes in ticks
pub const INCIDENT_MIN_DURATION: u32 = 300;
pub const INCIDENT_MAX_DURATION: u32 = 600;

/// Inclusive range of the randomized first phase of every signal
pub const SIGNAL_WARMUP_MIN: u32 = 10;
pub const SIGNAL_WARMUP_MAX: u32 = 30;

/// Minimum occupants before a segment can have an incident
pub const INCIDENT_MIN_OCCUPANTS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub vehicle_count: usize,
    pub accident_probability: f64,
    pub road_capacity: u32,
    pub intersection_capacity: u32,
    pub green_duration: u32,
    pub yellow_duration: u32,
    pub red_duration: u32,
    pub progress_increment: f64,
    pub incident_min_duration: u32,
    pub incident_max_duration: u32,
    pub signal_warmup_min: u32,
    pub signal_warmup_max: u32,
    /// Seed for the shared RNG. `None` draws a fresh seed, which is logged.
    pub seed: Option<u64>,
    /// Keep only the most recent N tick snapshots. `None` keeps all of them.
    pub metrics_retention: Option<usize>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            vehicle_count: DEFAULT_VEHICLE_COUNT,
            accident_probability: DEFAULT_ACCIDENT_PROBABILITY,
            road_capacity: DEFAULT_ROAD_CAPACITY,
            intersection_capacity: DEFAULT_INTERSECTION_CAPACITY,
            green_duration: GREEN_DURATION,
            yellow_duration: YELLOW_DURATION,
            red_duration: RED_DURATION,
            progress_increment: PROGRESS_INCREMENT,
            incident_min_duration: INCIDENT_MIN_DURATION,
            incident_max_duration: INCIDENT_MAX_DURATION,
            signal_warmup_min: SIGNAL_WARMUP_MIN,
            signal_warmup_max: SIGNAL_WARMUP_MAX,
            seed: None,
            metrics_retention: None,
        }
    }
}

impl SimConfig {
    /// Reject settings that would break a component's invariants
    pub fn validate(&self) -> Result<(), SimError> {
        if !(0.0..=1.0).contains(&self.accident_probability) {
            return Err(SimError::InvalidConfig(format!(
                "accident probability {} is outside [0, 1]",
                self.accident_probability
            )));
        }
        if self.road_capacity == 0 || self.intersection_capacity == 0 {
            return Err(SimError::InvalidConfig(
                "capacities must be at least 1".to_string(),
            ));
        }
        if self.green_duration == 0 || self.yellow_duration == 0 || self.red_duration == 0 {
            return Err(SimError::InvalidConfig(
                "signal durations must be at least one tick".to_string(),
            ));
        }
        if !(self.progress_increment > 0.0 && self.progress_increment <= 1.0) {
            return Err(SimError::InvalidConfig(format!(
                "progress increment {} is outside (0, 1]",
                self.progress_increment
            )));
        }
        if self.incident_min_duration == 0 || self.incident_min_duration > self.incident_max_duration
        {
            return Err(SimError::InvalidConfig(format!(
                "incident duration range {}..={} is empty or starts at zero",
                self.incident_min_duration, self.incident_max_duration
            )));
        }
        if self.signal_warmup_min == 0 || self.signal_warmup_min > self.signal_warmup_max {
            return Err(SimError::InvalidConfig(format!(
                "signal warm-up range {}..={} is empty or starts at zero",
                self.signal_warmup_min, self.signal_warmup_max
            )));
        }
        if self.metrics_retention == Some(0) {
            return Err(SimError::InvalidConfig(
                "metrics retention must keep at least one tick".to_string(),
            ));
        }
        Ok(())
    }

    /// Phase durations in the order the controller needs them
    pub fn signal_timings(&self) -> SignalTimings {
        SignalTimings {
            green: self.green_duration,
            yellow: self.yellow_duration,
            red: self.red_duration,
        }
    }
}

/// Phase durations applied on every signal transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalTimings {
    pub green: u32,
    pub yellow: u32,
    pub red: u32,
}

impl Default for SignalTimings {
    fn default() -> Self {
        Self {
            green: GREEN_DURATION,
            yellow: YELLOW_DURATION,
            red: RED_DURATION,
        }
    }
}

impl SignalTimings {
    /// Length of one full red, green, yellow cycle
    pub fn cycle_length(&self) -> u32 {
        self.green + self.yellow + self.red
    }
}
