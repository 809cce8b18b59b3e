//! Road network: intersections, directed road segments and the graph that
//! connects them
//!
//! The graph structure is fixed once built. Only the derived occupant lists,
//! incidents and signals change while the simulation runs.

use log::warn;
use ordered_float::OrderedFloat;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::error::SimError;
use super::incident::Incident;
use super::signal::Signal;
use super::types::{IntersectionId, Position, SegmentId, VehicleId};

/// Intersection record handed over by an external topology loader
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionDef {
    pub id: IntersectionId,
    pub name: String,
    pub position: Position,
}

/// Directed segment record handed over by an external topology loader
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDef {
    pub id: SegmentId,
    /// Defaults to "<origin name> to <destination name>"
    pub name: Option<String>,
    pub origin: IntersectionId,
    pub destination: IntersectionId,
}

#[derive(Debug, Clone)]
pub struct Intersection {
    pub id: IntersectionId,
    pub name: String,
    pub position: Position,
    /// Vehicles that may queue here before the intersection counts as saturated
    pub capacity: u32,
    pub signal: Option<Signal>,
}

impl Intersection {
    pub fn new(id: IntersectionId, name: impl Into<String>, position: Position, capacity: u32) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            capacity,
            signal: None,
        }
    }
}

/// A directed road between two intersections
#[derive(Debug, Clone)]
pub struct RoadSegment {
    pub id: SegmentId,
    pub name: String,
    pub origin: IntersectionId,
    pub destination: IntersectionId,
    pub capacity: u32,
    pub incident: Option<Incident>,
    /// Vehicles on this segment as of the last occupancy scan, ordered by
    /// progress (rearmost first)
    occupants: BTreeSet<(OrderedFloat<f64>, VehicleId)>,
}

impl RoadSegment {
    pub fn new(
        id: SegmentId,
        name: impl Into<String>,
        origin: IntersectionId,
        destination: IntersectionId,
        capacity: u32,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            origin,
            destination,
            capacity,
            incident: None,
            occupants: BTreeSet::new(),
        }
    }

    pub fn occupant_count(&self) -> usize {
        self.occupants.len()
    }

    /// Occupants from the rearmost vehicle to the one furthest along
    pub fn occupants(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.occupants.iter().map(|(_, vehicle)| *vehicle)
    }

    /// Occupant count relative to capacity
    pub fn density(&self) -> f64 {
        self.occupants.len() as f64 / self.capacity as f64
    }

    pub fn has_incident(&self) -> bool {
        self.incident.is_some()
    }

    pub(crate) fn clear_occupants(&mut self) {
        self.occupants.clear();
    }

    pub(crate) fn add_occupant(&mut self, vehicle: VehicleId, progress: f64) {
        self.occupants.insert((OrderedFloat(progress), vehicle));
    }
}

/// The road network graph plus the records it indexes
#[derive(Debug, Default)]
pub struct Topology {
    /// Directed graph; edge weights are segment ids
    graph: DiGraph<IntersectionId, SegmentId>,

    /// Maps intersection IDs to their node indices in the graph
    intersection_to_node: HashMap<IntersectionId, NodeIndex>,

    /// Intersections in id order so iteration is reproducible
    intersections: BTreeMap<IntersectionId, Intersection>,

    /// Segments in insertion order
    segments: Vec<RoadSegment>,

    /// Maps segment IDs to their slot in `segments`
    segment_index: HashMap<SegmentId, usize>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a topology from loader records. Segments referring to unknown
    /// intersections, and duplicate records, are skipped and reported; the
    /// rest of the graph is still built.
    pub fn from_definitions(
        intersections: &[IntersectionDef],
        segments: &[SegmentDef],
        road_capacity: u32,
        intersection_capacity: u32,
    ) -> (Self, Vec<SimError>) {
        let mut topology = Self::new();
        let mut rejected = Vec::new();

        for def in intersections {
            let intersection = Intersection::new(
                def.id,
                def.name.clone(),
                def.position,
                intersection_capacity,
            );
            if let Err(err) = topology.add_intersection(intersection) {
                warn!("Skipping intersection {}: {}", def.id, err);
                rejected.push(err);
            }
        }

        for def in segments {
            let name = match &def.name {
                Some(name) => name.clone(),
                None => topology.default_segment_name(def.origin, def.destination),
            };
            let segment = RoadSegment::new(def.id, name, def.origin, def.destination, road_capacity);
            if let Err(err) = topology.add_segment(segment) {
                warn!("Skipping road segment {}: {}", def.id, err);
                rejected.push(err);
            }
        }

        (topology, rejected)
    }

    /// Build a grid with two-way segments between horizontal and vertical
    /// neighbours. Intersection ids run row by row from zero and are named
    /// "<column> / <row>".
    pub fn grid(
        columns: &[&str],
        rows: &[&str],
        road_capacity: u32,
        intersection_capacity: u32,
    ) -> Self {
        let width = columns.len();
        let id_at = |col: usize, row: usize| IntersectionId(row * width + col);

        let mut intersections = Vec::with_capacity(columns.len() * rows.len());
        for (row, row_name) in rows.iter().enumerate() {
            for (col, col_name) in columns.iter().enumerate() {
                intersections.push(IntersectionDef {
                    id: id_at(col, row),
                    name: format!("{} / {}", col_name, row_name),
                    position: Position::new(col as f32, row as f32),
                });
            }
        }

        let mut segments = Vec::new();
        let mut link = |from: IntersectionId, to: IntersectionId| {
            let id = SegmentId(segments.len());
            segments.push(SegmentDef {
                id,
                name: None,
                origin: from,
                destination: to,
            });
        };
        for row in 0..rows.len() {
            for col in 0..width {
                if col + 1 < width {
                    link(id_at(col, row), id_at(col + 1, row));
                    link(id_at(col + 1, row), id_at(col, row));
                }
                if row + 1 < rows.len() {
                    link(id_at(col, row), id_at(col, row + 1));
                    link(id_at(col, row + 1), id_at(col, row));
                }
            }
        }

        let (topology, rejected) =
            Self::from_definitions(&intersections, &segments, road_capacity, intersection_capacity);
        debug_assert!(rejected.is_empty());
        topology
    }

    fn default_segment_name(&self, origin: IntersectionId, destination: IntersectionId) -> String {
        let name_of = |id: IntersectionId| {
            self.intersections
                .get(&id)
                .map(|i| i.name.clone())
                .unwrap_or_else(|| id.to_string())
        };
        format!("{} to {}", name_of(origin), name_of(destination))
    }

    /// Adds an intersection to the network graph
    pub fn add_intersection(&mut self, intersection: Intersection) -> Result<(), SimError> {
        let id = intersection.id;
        if self.intersection_to_node.contains_key(&id) {
            return Err(SimError::DuplicateIntersection(id));
        }

        let node_index = self.graph.add_node(id);
        self.intersection_to_node.insert(id, node_index);
        self.intersections.insert(id, intersection);
        Ok(())
    }

    /// Adds a directed segment. Both endpoints must already exist; nothing is
    /// modified when they don't.
    pub fn add_segment(&mut self, segment: RoadSegment) -> Result<(), SimError> {
        if self.segment_index.contains_key(&segment.id) {
            return Err(SimError::DuplicateSegment(segment.id));
        }
        let origin = self.node_of(segment.origin)?;
        let destination = self.node_of(segment.destination)?;

        self.graph.add_edge(origin, destination, segment.id);
        self.segment_index.insert(segment.id, self.segments.len());
        self.segments.push(segment);
        Ok(())
    }

    fn node_of(&self, id: IntersectionId) -> Result<NodeIndex, SimError> {
        self.intersection_to_node
            .get(&id)
            .copied()
            .ok_or(SimError::IntersectionNotFound(id))
    }

    pub(crate) fn graph(&self) -> &DiGraph<IntersectionId, SegmentId> {
        &self.graph
    }

    pub(crate) fn node_index(&self, id: IntersectionId) -> Result<NodeIndex, SimError> {
        self.node_of(id)
    }

    pub(crate) fn intersection_at(&self, node: NodeIndex) -> Option<IntersectionId> {
        self.graph.node_weight(node).copied()
    }

    pub fn intersection(&self, id: IntersectionId) -> Result<&Intersection, SimError> {
        self.intersections
            .get(&id)
            .ok_or(SimError::IntersectionNotFound(id))
    }

    pub fn intersection_mut(&mut self, id: IntersectionId) -> Result<&mut Intersection, SimError> {
        self.intersections
            .get_mut(&id)
            .ok_or(SimError::IntersectionNotFound(id))
    }

    pub fn segment(&self, id: SegmentId) -> Result<&RoadSegment, SimError> {
        self.segment_index
            .get(&id)
            .map(|&slot| &self.segments[slot])
            .ok_or(SimError::SegmentNotFound(id))
    }

    pub fn segment_mut(&mut self, id: SegmentId) -> Result<&mut RoadSegment, SimError> {
        match self.segment_index.get(&id) {
            Some(&slot) => Ok(&mut self.segments[slot]),
            None => Err(SimError::SegmentNotFound(id)),
        }
    }

    /// Segments leaving the given intersection
    pub fn outgoing(&self, id: IntersectionId) -> Result<Vec<&RoadSegment>, SimError> {
        let node = self.node_of(id)?;
        Ok(self
            .graph
            .edges(node)
            .filter_map(|edge| self.segment(*edge.weight()).ok())
            .collect())
    }

    /// Finds the segment running from one intersection to another
    pub fn segment_between(
        &self,
        from: IntersectionId,
        to: IntersectionId,
    ) -> Result<SegmentId, SimError> {
        let from_node = self.node_of(from)?;
        let to_node = self.node_of(to)?;

        self.graph
            .edges(from_node)
            .find(|edge| edge.target() == to_node)
            .map(|edge| *edge.weight())
            .ok_or(SimError::NoSegmentBetween { from, to })
    }

    pub fn intersections(&self) -> impl Iterator<Item = &Intersection> {
        self.intersections.values()
    }

    pub fn intersections_mut(&mut self) -> impl Iterator<Item = &mut Intersection> {
        self.intersections.values_mut()
    }

    pub fn intersection_ids(&self) -> Vec<IntersectionId> {
        self.intersections.keys().copied().collect()
    }

    pub fn segments(&self) -> &[RoadSegment] {
        &self.segments
    }

    pub fn segments_mut(&mut self) -> &mut [RoadSegment] {
        &mut self.segments
    }

    pub fn intersection_count(&self) -> usize {
        self.intersections.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}
