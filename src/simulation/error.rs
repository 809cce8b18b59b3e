//! Errors raised by the simulation core

use thiserror::Error;

use super::types::{IntersectionId, SegmentId};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("intersection {0} not found")]
    IntersectionNotFound(IntersectionId),

    #[error("road segment {0} not found")]
    SegmentNotFound(SegmentId),

    #[error("no road segment connects {from} to {to}")]
    NoSegmentBetween {
        from: IntersectionId,
        to: IntersectionId,
    },

    /// The destination cannot be reached from the origin. Recoverable: the
    /// caller skips the vehicle.
    #[error("no route from {origin} to {destination}")]
    RouteNotFound {
        origin: IntersectionId,
        destination: IntersectionId,
    },

    #[error("intersection {0} is defined twice")]
    DuplicateIntersection(IntersectionId),

    #[error("road segment {0} is defined twice")]
    DuplicateSegment(SegmentId),

    #[error("road segment {0} already has an active incident")]
    IncidentActive(SegmentId),

    #[error("invalid incident (position {position}, duration {duration})")]
    InvalidIncident { position: f64, duration: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SimError {
    /// True for failed id lookups into the topology.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SimError::IntersectionNotFound(_)
                | SimError::SegmentNotFound(_)
                | SimError::NoSegmentBetween { .. }
        )
    }
}
