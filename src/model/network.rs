// Weft: collision-free scheduling for time-triggered networks
// Copyright (C) 2024 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Network topology: nodes, links, and the self-healing protocol settings.
//! All of this data is created during ingestion and immutable afterwards,
//! except for the single renormalization pass of the time model.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::error::Error;

/// Identifier of a node. Node ids are small, dense, non-negative integers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(pub usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Identifier of a link. Link ids are small, dense, non-negative integers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct LinkId(pub usize);

impl std::fmt::Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// The physical kind of a link.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum LinkKind {
    /// A wired (switched ethernet) link.
    Wired,
    /// A wireless link.
    Wireless,
}

impl FromStr for LinkKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Wired" => Ok(Self::Wired),
            "Wireless" => Ok(Self::Wireless),
            _ => Err(Error::InvalidInput(format!("unknown link category: {s}"))),
        }
    }
}

/// A directed link of the network.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Link {
    /// Identifier of the link.
    id: LinkId,
    /// Kind of the link (wired or wireless).
    kind: LinkKind,
    /// Speed of the link in KB/s.
    speed: u64,
}

impl Link {
    /// Create a new link. The speed is given in KB/s and must be non-zero.
    pub fn new(id: LinkId, kind: LinkKind, speed: u64) -> Result<Self, Error> {
        if speed == 0 {
            return Err(Error::InvalidInput(format!("link {id} has speed 0")));
        }
        Ok(Self { id, kind, speed })
    }

    /// Identifier of the link.
    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Kind of the link.
    pub fn kind(&self) -> LinkKind {
        self.kind
    }

    /// Speed of the link in KB/s.
    pub fn speed(&self) -> u64 {
        self.speed
    }

    /// Time in nanoseconds to transmit `size` bytes over this link, rounded
    /// up to at least one nanosecond.
    pub fn transmission_ns(&self, size: u64) -> u64 {
        (size * 8_000).div_ceil(self.speed).max(1)
    }
}

/// The role a node plays in the network.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NodeKind {
    /// An end system, source or sink of traffic.
    EndSystem,
    /// A switch forwarding traffic.
    Switch,
    /// A wireless access point.
    AccessPoint,
}

impl FromStr for NodeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EndSystem" => Ok(Self::EndSystem),
            "Switch" => Ok(Self::Switch),
            "AccessPoint" => Ok(Self::AccessPoint),
            _ => Err(Error::InvalidInput(format!("unknown node category: {s}"))),
        }
    }
}

/// A node of the network.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Node {
    /// Identifier of the node.
    id: NodeId,
    /// Role of the node.
    kind: NodeKind,
}

impl Node {
    /// Create a new node.
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self { id, kind }
    }

    /// Identifier of the node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Role of the node.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }
}

/// Settings of the self-healing protocol: the period at which bandwidth is
/// reserved on every link, and the duration of each reservation. Both are in
/// nanoseconds until the time model renormalizes them to timeslots.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SelfHealingProtocol {
    /// Period of the reservation.
    period: u64,
    /// Duration of each reservation window.
    duration: u64,
}

impl SelfHealingProtocol {
    /// Create a new protocol description. A period of zero means the protocol
    /// is inactive, which is represented as `None` in the [`Network`].
    pub fn new(period: u64, duration: u64) -> Result<Self, Error> {
        if period == 0 {
            return Err(Error::InvalidInput(
                "self-healing protocol with period 0".to_string(),
            ));
        }
        if duration == 0 || duration > period {
            return Err(Error::InvalidTiming(format!(
                "self-healing protocol reserves {duration}ns every {period}ns"
            )));
        }
        Ok(Self { period, duration })
    }

    /// Period of the reservation.
    pub fn period(&self) -> u64 {
        self.period
    }

    /// Duration of each reservation window.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Divide both durations by the chosen timeslot length.
    pub(crate) fn renormalize(&mut self, timeslot: u64) {
        self.period /= timeslot;
        self.duration /= timeslot;
    }
}

/// The network over which frames are scheduled: a directed graph of nodes
/// connected by identified links, together with the per-switch minimum
/// forwarding delay and the optional self-healing protocol.
#[derive(Clone, Debug)]
pub struct Network {
    /// Connection graph. Edges are weighted with the id of the traversed link.
    graph: DiGraph<Node, LinkId>,
    /// Lookup from node id to graph index.
    node_lookup: HashMap<NodeId, NodeIndex>,
    /// All links of the network, ordered by id.
    links: BTreeMap<LinkId, Link>,
    /// Minimum time a switch needs between receiving a frame and forwarding
    /// it. In nanoseconds until renormalization.
    switch_min_time: u64,
    /// Self-healing protocol settings, `None` when inactive.
    shp: Option<SelfHealingProtocol>,
}

impl Network {
    /// Create an empty network.
    pub fn new(switch_min_time: u64) -> Self {
        Self {
            graph: DiGraph::new(),
            node_lookup: HashMap::new(),
            links: BTreeMap::new(),
            switch_min_time,
            shp: None,
        }
    }

    /// Activate the self-healing protocol.
    pub fn set_self_healing(&mut self, shp: SelfHealingProtocol) {
        self.shp = Some(shp);
    }

    /// Self-healing protocol settings, `None` when inactive.
    pub fn self_healing(&self) -> Option<&SelfHealingProtocol> {
        self.shp.as_ref()
    }

    /// Minimum switch forwarding delay.
    pub fn switch_min_time(&self) -> u64 {
        self.switch_min_time
    }

    /// Add a node to the network.
    pub fn add_node(&mut self, node: Node) -> Result<(), Error> {
        if self.node_lookup.contains_key(&node.id()) {
            return Err(Error::Topology(format!("duplicate node id {}", node.id())));
        }
        let idx = self.graph.add_node(node);
        self.node_lookup.insert(node.id(), idx);
        Ok(())
    }

    /// Add a directed connection from `from` to `to` over the given link.
    pub fn add_connection(&mut self, from: NodeId, to: NodeId, link: Link) -> Result<(), Error> {
        if from == to {
            return Err(Error::Topology(format!("node {from} connects to itself")));
        }
        let from_idx = *self
            .node_lookup
            .get(&from)
            .ok_or_else(|| Error::InvalidInput(format!("unknown node {from}")))?;
        let to_idx = *self
            .node_lookup
            .get(&to)
            .ok_or_else(|| Error::InvalidInput(format!("unknown node {to}")))?;
        if self.graph.edges(from_idx).any(|e| *e.weight() == link.id()) {
            return Err(Error::Topology(format!(
                "node {from} has two connections over link {}",
                link.id()
            )));
        }
        if self.links.contains_key(&link.id()) {
            return Err(Error::Topology(format!("link {} defined twice", link.id())));
        }
        self.links.insert(link.id(), link);
        self.graph.add_edge(from_idx, to_idx, link.id());
        Ok(())
    }

    /// Check whether a node exists.
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_lookup.contains_key(&id)
    }

    /// Get a link by id.
    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    /// Iterate over all links, ordered by id.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// The largest link id in the network, `None` when there are no links.
    pub fn max_link_id(&self) -> Option<LinkId> {
        self.links.keys().next_back().copied()
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of links.
    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    /// The peer reached when leaving `from` over `link`, if such a
    /// connection exists.
    pub fn next_hop(&self, from: NodeId, link: LinkId) -> Option<NodeId> {
        let from_idx = *self.node_lookup.get(&from)?;
        self.graph
            .edges(from_idx)
            .find(|e| *e.weight() == link)
            .map(|e| self.graph[e.target()].id())
    }

    /// Divide the switch delay and the self-healing protocol durations by the
    /// chosen timeslot length.
    pub(crate) fn renormalize(&mut self, timeslot: u64) {
        self.switch_min_time /= timeslot;
        if let Some(shp) = self.shp.as_mut() {
            shp.renormalize(timeslot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a three node chain N0 - N1 - N2 with links L0 and L1.
    fn chain() -> Network {
        let mut net = Network::new(0);
        net.add_node(Node::new(NodeId(0), NodeKind::EndSystem)).unwrap();
        net.add_node(Node::new(NodeId(1), NodeKind::Switch)).unwrap();
        net.add_node(Node::new(NodeId(2), NodeKind::EndSystem)).unwrap();
        net.add_connection(
            NodeId(0),
            NodeId(1),
            Link::new(LinkId(0), LinkKind::Wired, 1_000_000).unwrap(),
        )
        .unwrap();
        net.add_connection(
            NodeId(1),
            NodeId(2),
            Link::new(LinkId(1), LinkKind::Wired, 1_000_000).unwrap(),
        )
        .unwrap();
        net
    }

    #[test]
    fn walk_links() {
        let net = chain();
        assert_eq!(net.next_hop(NodeId(0), LinkId(0)), Some(NodeId(1)));
        assert_eq!(net.next_hop(NodeId(1), LinkId(1)), Some(NodeId(2)));
        assert_eq!(net.next_hop(NodeId(0), LinkId(1)), None);
        assert_eq!(net.max_link_id(), Some(LinkId(1)));
    }

    #[test]
    fn transmission_time() {
        // 125 byte over a 1000 MB/s link takes a single nanosecond.
        let l = Link::new(LinkId(0), LinkKind::Wired, 1_000_000).unwrap();
        assert_eq!(l.transmission_ns(125), 1);
        // a slow link rounds up
        let l = Link::new(LinkId(0), LinkKind::Wired, 3).unwrap();
        assert_eq!(l.transmission_ns(1), 2667);
    }

    #[test]
    fn self_loop_rejected() {
        let mut net = chain();
        let err = net
            .add_connection(
                NodeId(1),
                NodeId(1),
                Link::new(LinkId(2), LinkKind::Wired, 1000).unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Topology(_)));
    }

    #[test]
    fn duplicate_link_rejected() {
        let mut net = chain();
        let err = net
            .add_connection(
                NodeId(1),
                NodeId(0),
                Link::new(LinkId(1), LinkKind::Wired, 1000).unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Topology(_)));
    }

    #[test]
    fn duplicate_node_rejected() {
        let mut net = chain();
        let err = net
            .add_node(Node::new(NodeId(0), NodeKind::Switch))
            .unwrap_err();
        assert!(matches!(err, Error::Topology(_)));
    }
}
