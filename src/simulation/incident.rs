//! Incidents: temporary point blockages on road segments
//!
//! A segment carries at most one incident. Vehicles never pass the incident's
//! position while it is active.

use log::debug;
use rand::Rng;

use super::config::INCIDENT_MIN_OCCUPANTS;
use super::error::SimError;
use super::topology::Topology;
use super::types::SegmentId;

#[derive(Debug, Clone, PartialEq)]
pub struct Incident {
    pub segment: SegmentId,
    /// Normalized position in [0, 1) along the segment
    pub position: f64,
    /// Lifetime in ticks
    pub duration: u32,
    pub elapsed: u32,
}

impl Incident {
    pub fn new(segment: SegmentId, position: f64, duration: u32) -> Result<Self, SimError> {
        if !(0.0..1.0).contains(&position) || duration == 0 {
            return Err(SimError::InvalidIncident { position, duration });
        }
        Ok(Self {
            segment,
            position,
            duration,
            elapsed: 0,
        })
    }

    pub fn remaining(&self) -> u32 {
        self.duration.saturating_sub(self.elapsed)
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Parameters for random incident creation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncidentModel {
    pub probability: f64,
    pub min_duration: u32,
    pub max_duration: u32,
}

impl IncidentModel {
    /// Roll for a new incident on every unobstructed segment holding at least
    /// two vehicles. Occupancy must be current. Returns the affected segments.
    pub fn spawn<R: Rng>(&self, topology: &mut Topology, rng: &mut R) -> Vec<SegmentId> {
        let mut created = Vec::new();

        for segment in topology.segments_mut() {
            if segment.incident.is_some() || segment.occupant_count() < INCIDENT_MIN_OCCUPANTS {
                continue;
            }
            if rng.random::<f64>() >= self.probability {
                continue;
            }

            let position = rng.random::<f64>();
            let duration = rng.random_range(self.min_duration..=self.max_duration);
            debug!(
                "Incident on {} ({}) at {:.2} for {} ticks",
                segment.id, segment.name, position, duration
            );
            segment.incident = Some(Incident {
                segment: segment.id,
                position,
                duration,
                elapsed: 0,
            });
            created.push(segment.id);
        }

        created
    }
}

/// Age every active incident by one tick and clear the ones that have run
/// their course. Returns the cleared segments.
pub fn update_incidents(topology: &mut Topology) -> Vec<SegmentId> {
    let mut cleared = Vec::new();

    for segment in topology.segments_mut() {
        let expired = match segment.incident.as_mut() {
            Some(incident) => {
                incident.elapsed += 1;
                incident.is_expired()
            }
            None => false,
        };

        if expired {
            debug!("Incident on {} cleared", segment.id);
            segment.incident = None;
            cleared.push(segment.id);
        }
    }

    cleared
}
