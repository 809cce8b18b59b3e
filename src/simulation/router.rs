//! Shortest-path routing over the road network
//!
//! Every segment costs one hop. Among equally short routes the one returned
//! depends on graph iteration order; only the hop count matters downstream.

use petgraph::algo::astar;
use std::collections::HashMap;

use super::error::SimError;
use super::topology::Topology;
use super::types::IntersectionId;

/// Routes are fixed once handed out, so results are cached per
/// origin/destination pair.
///
/// The cache is not keyed on the topology. A router must only ever be used
/// with one topology; build a new one for a different network.
#[derive(Debug, Default)]
pub struct Router {
    path_cache: HashMap<(IntersectionId, IntersectionId), Vec<IntersectionId>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordered intersections from `origin` to `destination`, both included.
    /// `origin == destination` yields the single node.
    pub fn shortest_path(
        &mut self,
        topology: &Topology,
        origin: IntersectionId,
        destination: IntersectionId,
    ) -> Result<Vec<IntersectionId>, SimError> {
        if let Some(path) = self.path_cache.get(&(origin, destination)) {
            return Ok(path.clone());
        }

        let path = shortest_path(topology, origin, destination)?;
        self.path_cache
            .insert((origin, destination), path.clone());
        Ok(path)
    }

    pub fn cached_routes(&self) -> usize {
        self.path_cache.len()
    }
}

/// Uncached unit-cost shortest path (A* with a null heuristic, i.e. Dijkstra)
pub fn shortest_path(
    topology: &Topology,
    origin: IntersectionId,
    destination: IntersectionId,
) -> Result<Vec<IntersectionId>, SimError> {
    let start = topology.node_index(origin)?;
    let goal = topology.node_index(destination)?;

    let (_, nodes) = astar(
        topology.graph(),
        start,
        |node| node == goal,
        |_| 1u32,
        |_| 0,
    )
    .ok_or(SimError::RouteNotFound {
        origin,
        destination,
    })?;

    nodes
        .into_iter()
        .map(|node| {
            topology
                .intersection_at(node)
                .ok_or(SimError::RouteNotFound {
                    origin,
                    destination,
                })
        })
        .collect()
}
