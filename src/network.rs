//! The taxiway graph and its reservation tables.

use crate::geom::{self, Geod};
use crate::util::Interval;
use crate::{NodeId, ParticipantId, SegmentId};
use std::cell::Cell;

/// Routing penalty for entering a parking node, in m.
const PARKING_PENALTY: f64 = 10_000.0;

/// Routing penalty for entering a node on a runway, in m.
const RUNWAY_PENALTY: f64 = 1_000.0;

/// Cost quantization of the route search, in steps per m.
const COST_SCALE: f64 = 10.0;

/// A node of the taxi network.
pub struct TaxiNode {
    index: NodeId,
    geod: Geod,
    /// Terrain elevation in m, resolved on first use and then stable.
    elevation: Cell<Option<f64>>,
    on_runway: bool,
    is_parking: bool,
}

/// The attributes of a node.
#[derive(Clone, Copy, Debug, Default)]
pub struct NodeAttributes {
    /// Position of the node.
    pub geod: Geod,
    /// Whether the node lies on a runway.
    pub on_runway: bool,
    /// Whether the node is a parking position.
    pub is_parking: bool,
}

impl TaxiNode {
    /// The node's id.
    pub fn index(&self) -> NodeId {
        self.index
    }

    /// The node's position.
    pub fn geod(&self) -> &Geod {
        &self.geod
    }

    /// Whether the node lies on a runway.
    pub fn on_runway(&self) -> bool {
        self.on_runway
    }

    /// Whether the node is a parking position.
    pub fn is_parking(&self) -> bool {
        self.is_parking
    }

    /// The cached terrain elevation, resolving it with `resolve` on first
    /// use.
    pub fn elevation_or_resolve(&self, resolve: impl FnOnce(&Geod) -> f64) -> f64 {
        match self.elevation.get() {
            Some(elevation) => elevation,
            None => {
                let elevation = resolve(&self.geod);
                self.elevation.set(Some(elevation));
                elevation
            }
        }
    }
}

/// A time-boxed claim on a segment by one participant.
#[derive(Clone, Copy, Debug)]
pub struct Reservation {
    owner: ParticipantId,
    window: Interval<f64>,
}

impl Reservation {
    /// The participant holding the reservation.
    pub fn owner(&self) -> ParticipantId {
        self.owner
    }

    /// The reserved time window in s.
    pub fn window(&self) -> Interval<f64> {
        self.window
    }
}

/// A directed edge of the taxi network.
///
/// Geometry is fixed at creation; only the reservation table mutates, and
/// only the scheduler writes to it.
pub struct TaxiSegment {
    index: SegmentId,
    start: NodeId,
    end: NodeId,
    /// Length in m.
    length: f64,
    /// True heading from start to end in degrees.
    heading: f64,
    /// The reverse-direction segment sharing the same two nodes.
    opposite: Option<SegmentId>,
    reservations: Vec<Reservation>,
}

impl TaxiSegment {
    /// The segment's id.
    pub fn index(&self) -> SegmentId {
        self.index
    }

    /// The node the segment starts at.
    pub fn start(&self) -> NodeId {
        self.start
    }

    /// The node the segment ends at.
    pub fn end(&self) -> NodeId {
        self.end
    }

    /// Length in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// True heading from start to end in degrees.
    pub fn heading(&self) -> f64 {
        self.heading
    }

    /// The reverse-direction segment, if the network has one.
    pub fn opposite(&self) -> Option<SegmentId> {
        self.opposite
    }

    /// The current reservation table.
    pub fn reservations(&self) -> &[Reservation] {
        &self.reservations
    }

    /// Whether any reservation window contains `now`.
    pub fn has_block(&self, now: f64) -> bool {
        self.reservations.iter().any(|r| r.window.contains(now))
    }

    /// Whether a reservation held by a *different* participant contains
    /// `now`. A participant's own claims never block it.
    pub fn blocked_for(&self, owner: ParticipantId, now: f64) -> bool {
        self.reservations
            .iter()
            .any(|r| r.owner != owner && r.window.contains(now))
    }

    /// Grants `owner` a reservation, or refreshes an existing one.
    pub(crate) fn reserve(&mut self, owner: ParticipantId, window: Interval<f64>) {
        match self.reservations.iter_mut().find(|r| r.owner == owner) {
            Some(reservation) => reservation.window = window,
            None => self.reservations.push(Reservation { owner, window }),
        }
    }

    /// Drops every reservation whose window has closed.
    pub(crate) fn unblock_expired(&mut self, now: f64) {
        self.reservations.retain(|r| r.window.max > now);
    }
}

/// A route through the network, as produced by the shortest-route search.
#[derive(Clone, Debug, Default)]
pub struct TaxiRoute {
    /// The nodes visited, start to destination.
    pub nodes: Vec<NodeId>,
    /// The segments traversed, in travel order.
    pub segments: Vec<SegmentId>,
}

/// The taxi network: nodes, directed segments and their reservations.
#[derive(Default)]
pub struct TaxiNetwork {
    nodes: Vec<TaxiNode>,
    segments: Vec<TaxiSegment>,
    initialized: bool,
}

impl TaxiNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a node to the network.
    pub fn add_node(&mut self, attributes: &NodeAttributes) -> NodeId {
        let index = NodeId(self.nodes.len() as u32);
        self.nodes.push(TaxiNode {
            index,
            geod: attributes.geod,
            elevation: Cell::new(None),
            on_runway: attributes.on_runway,
            is_parking: attributes.is_parking,
        });
        index
    }

    /// Adds a directed segment between two existing nodes; length and
    /// heading are derived from the node positions.
    ///
    /// # Panics
    /// Panics if either node id is unknown.
    pub fn add_segment(&mut self, from: NodeId, to: NodeId) -> SegmentId {
        let start = &self.nodes[from.index()];
        let end = &self.nodes[to.index()];
        let index = SegmentId(self.segments.len() as u32);
        self.segments.push(TaxiSegment {
            index,
            start: from,
            end: to,
            length: geom::distance_m(&start.geod, &end.geod),
            heading: geom::course_deg(&start.geod, &end.geod),
            opposite: None,
            reservations: Vec::new(),
        });
        index
    }

    /// Establishes the opposite-direction pairing between segments sharing
    /// reversed endpoints. Call once after loading the network.
    pub fn init(&mut self) {
        if self.initialized {
            log::warn!("duplicate ground network init");
            return;
        }
        for idx in 0..self.segments.len() {
            if self.segments[idx].opposite.is_some() {
                continue;
            }
            let (own, start, end) = {
                let seg = &self.segments[idx];
                (seg.index, seg.start, seg.end)
            };
            if let Some(opp) = self.find_segment_between(end, start) {
                self.segments[idx].opposite = Some(opp);
                self.segments[opp.index()].opposite = Some(own);
            }
        }
        self.initialized = true;
    }

    /// Gets a node by id.
    pub fn node(&self, id: NodeId) -> Option<&TaxiNode> {
        self.nodes.get(id.index())
    }

    /// Gets a segment by id.
    pub fn find_segment(&self, id: SegmentId) -> Option<&TaxiSegment> {
        self.segments.get(id.index())
    }

    pub(crate) fn segment_mut(&mut self, id: SegmentId) -> Option<&mut TaxiSegment> {
        self.segments.get_mut(id.index())
    }

    /// The reverse-direction segment sharing the same two nodes.
    pub fn find_opposite(&self, id: SegmentId) -> Option<SegmentId> {
        self.find_segment(id)?.opposite()
    }

    /// The segment running from one node to another, if there is one.
    pub fn find_segment_between(&self, from: NodeId, to: NodeId) -> Option<SegmentId> {
        self.segments
            .iter()
            .find(|seg| seg.start == from && seg.end == to)
            .map(|seg| seg.index)
    }

    /// Returns an iterator over all segments.
    pub fn segments(&self) -> impl Iterator<Item = &TaxiSegment> {
        self.segments.iter()
    }

    /// Expires every reservation whose window has closed.
    pub fn unblock_expired(&mut self, now: f64) {
        for segment in &mut self.segments {
            segment.unblock_expired(now);
        }
    }

    /// Finds the shortest route between two nodes, weighting in penalties
    /// that keep taxi routes off parking positions and runways.
    pub fn find_shortest_route(&self, start: NodeId, end: NodeId) -> Option<TaxiRoute> {
        let (nodes, _cost) = pathfinding::directed::dijkstra::dijkstra(
            &start,
            |node| self.successors(*node),
            |node| *node == end,
        )?;

        let segments = nodes
            .windows(2)
            .map(|pair| self.find_segment_between(pair[0], pair[1]))
            .collect::<Option<Vec<_>>>()?;

        Some(TaxiRoute { nodes, segments })
    }

    fn successors(&self, from: NodeId) -> impl Iterator<Item = (NodeId, u64)> + '_ {
        self.segments
            .iter()
            .filter(move |seg| seg.start == from)
            .map(|seg| {
                let penalty = edge_penalty(&self.nodes[seg.end.index()]);
                (seg.end, (COST_SCALE * (seg.length + penalty)) as u64)
            })
    }
}

fn edge_penalty(node: &TaxiNode) -> f64 {
    let mut penalty = 0.0;
    if node.is_parking {
        penalty += PARKING_PENALTY;
    }
    if node.on_runway {
        penalty += RUNWAY_PENALTY;
    }
    penalty
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    /// A row of nodes along the equator, `spacing_deg` of longitude apart.
    fn row_network(count: usize, spacing_deg: f64) -> (TaxiNetwork, Vec<NodeId>) {
        let mut network = TaxiNetwork::new();
        let nodes = (0..count)
            .map(|i| {
                network.add_node(&NodeAttributes {
                    geod: Geod::from_deg(0.0, i as f64 * spacing_deg),
                    ..Default::default()
                })
            })
            .collect();
        (network, nodes)
    }

    #[test]
    fn init_pairs_opposite_segments() {
        let (mut network, nodes) = row_network(2, 0.001);
        let ab = network.add_segment(nodes[0], nodes[1]);
        let ba = network.add_segment(nodes[1], nodes[0]);
        network.init();
        assert_eq!(network.find_opposite(ab), Some(ba));
        assert_eq!(network.find_opposite(ba), Some(ab));
    }

    #[test]
    fn segment_geometry_comes_from_the_nodes() {
        let (mut network, nodes) = row_network(2, 0.001);
        let ab = network.add_segment(nodes[0], nodes[1]);
        let segment = network.find_segment(ab).unwrap();
        assert_approx_eq!(segment.length(), 111.19, 0.1);
        assert_approx_eq!(segment.heading(), 90.0, 1e-6);
    }

    #[test]
    fn reservations_refresh_rather_than_duplicate() {
        let (mut network, nodes) = row_network(2, 0.001);
        let ab = network.add_segment(nodes[0], nodes[1]);
        let owner = ParticipantId(7);
        let segment = network.segment_mut(ab).unwrap();
        segment.reserve(owner, Interval::new(0.0, 50.0));
        segment.reserve(owner, Interval::new(10.0, 60.0));
        assert_eq!(segment.reservations().len(), 1);
        assert_approx_eq!(segment.reservations()[0].window().max, 60.0);
    }

    #[test]
    fn expiry_is_monotonic() {
        let (mut network, nodes) = row_network(2, 0.001);
        let ab = network.add_segment(nodes[0], nodes[1]);
        let segment = network.segment_mut(ab).unwrap();
        segment.reserve(ParticipantId(1), Interval::new(0.0, 50.0));
        segment.reserve(ParticipantId(2), Interval::new(0.0, 200.0));
        network.unblock_expired(100.0);
        let segment = network.find_segment(ab).unwrap();
        assert!(segment.reservations().iter().all(|r| r.window().max > 100.0));
        assert_eq!(segment.reservations().len(), 1);
    }

    #[test]
    fn own_reservations_do_not_block() {
        let (mut network, nodes) = row_network(2, 0.001);
        let ab = network.add_segment(nodes[0], nodes[1]);
        let segment = network.segment_mut(ab).unwrap();
        segment.reserve(ParticipantId(1), Interval::new(0.0, 100.0));
        assert!(segment.has_block(50.0));
        assert!(!segment.blocked_for(ParticipantId(1), 50.0));
        assert!(segment.blocked_for(ParticipantId(2), 50.0));
        assert!(!segment.blocked_for(ParticipantId(2), 150.0));
    }

    #[test]
    fn shortest_route_avoids_runway_nodes() {
        // Two parallel two-hop paths; the short one crosses a runway node,
        // so the search should take the longer plain taxiway.
        let mut network = TaxiNetwork::new();
        let start = network.add_node(&NodeAttributes {
            geod: Geod::from_deg(0.0, 0.0),
            ..Default::default()
        });
        let runway = network.add_node(&NodeAttributes {
            geod: Geod::from_deg(0.0005, 0.001),
            on_runway: true,
            ..Default::default()
        });
        let taxiway = network.add_node(&NodeAttributes {
            geod: Geod::from_deg(-0.002, 0.001),
            ..Default::default()
        });
        let end = network.add_node(&NodeAttributes {
            geod: Geod::from_deg(0.0, 0.002),
            ..Default::default()
        });
        network.add_segment(start, runway);
        network.add_segment(runway, end);
        network.add_segment(start, taxiway);
        network.add_segment(taxiway, end);
        network.init();

        let route = network.find_shortest_route(start, end).unwrap();
        assert_eq!(route.nodes, vec![start, taxiway, end]);
        assert_eq!(route.segments.len(), 2);
    }

    #[test]
    fn node_elevation_is_resolved_once() {
        let (network, nodes) = row_network(1, 0.001);
        let node = network.node(nodes[0]).unwrap();
        assert_approx_eq!(node.elevation_or_resolve(|_| 12.5), 12.5);
        // Later resolutions must not override the cached value.
        assert_approx_eq!(node.elevation_or_resolve(|_| 99.0), 12.5);
    }
}
