// SnapNet: Snapping public-transport schedules onto multimodal network graphs
// Copyright (C) 2024 The SnapNet Developers
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

//! The multimodal network graph: an arena of immutable node and link records over a
//! directed multigraph, with modal subgraph extraction and shortest-path queries.

use std::collections::{BTreeSet, HashMap};

use ordered_float::OrderedFloat;
use petgraph::algo::{astar, dijkstra};
use petgraph::prelude::*;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::IntoEdgeReferences;

use crate::geocell::CellId;
use crate::types::{IndexType, LinkId, LinkWeight, NetworkError, NodeId};

/// A node of the network graph. Immutable after ingest.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct NetworkNode {
    /// Stable id of the node.
    pub id: String,
    /// Geocell containing the node.
    pub cell: CellId,
    /// Projected x coordinate.
    pub x: f64,
    /// Projected y coordinate.
    pub y: f64,
}

impl NetworkNode {
    /// Create a new network node.
    pub fn new(id: impl Into<String>, x: f64, y: f64, cell: CellId) -> Self {
        Self {
            id: id.into(),
            cell,
            x,
            y,
        }
    }
}

/// A link of the network graph. Parallel links between the same endpoints are permitted;
/// each carries a distinct id. Immutable after ingest.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct NetworkLink {
    /// Stable id of the link.
    pub id: String,
    /// Length of the link in meters.
    pub length: LinkWeight,
    /// Set of mode tags allowed on the link.
    pub modes: BTreeSet<String>,
    /// Free-flow speed on the link, if known.
    pub freespeed: Option<f64>,
}

impl NetworkLink {
    /// Create a new network link.
    pub fn new(
        id: impl Into<String>,
        length: LinkWeight,
        modes: BTreeSet<String>,
        freespeed: Option<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            length,
            modes,
            freespeed,
        }
    }

    /// Whether the link's mode set intersects the given modes.
    pub fn allows_any(&self, modes: &BTreeSet<&str>) -> bool {
        self.modes.iter().any(|m| modes.contains(m.as_str()))
    }
}

/// Directed multigraph over [`NetworkNode`]s and [`NetworkLink`]s.
#[derive(Debug, Clone, Default)]
pub struct NetworkGraph {
    /// The graph arena itself.
    graph: StableDiGraph<NetworkNode, NetworkLink, IndexType>,
    /// Node lookup by id.
    node_ids: HashMap<String, NodeId>,
    /// Link lookup by id.
    link_ids: HashMap<String, LinkId>,
}

impl NetworkGraph {
    /// Create an empty network graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph. Fails if a node with the same id already exists.
    pub fn add_node(&mut self, node: NetworkNode) -> Result<NodeId, NetworkError> {
        if self.node_ids.contains_key(&node.id) {
            return Err(NetworkError::DuplicateNode(node.id));
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.node_ids.insert(id, idx);
        Ok(idx)
    }

    /// Add a link between two nodes given by id. Fails if either endpoint is unknown or
    /// a link with the same id already exists.
    pub fn add_link(
        &mut self,
        link: NetworkLink,
        from: &str,
        to: &str,
    ) -> Result<LinkId, NetworkError> {
        if self.link_ids.contains_key(&link.id) {
            return Err(NetworkError::DuplicateLink(link.id));
        }
        let from = self.node_index(from)?;
        let to = self.node_index(to)?;
        let id = link.id.clone();
        let idx = self.graph.add_edge(from, to, link);
        self.link_ids.insert(id, idx);
        Ok(idx)
    }

    /// Look up the graph handle of a node by id.
    pub fn node_index(&self, id: &str) -> Result<NodeId, NetworkError> {
        self.node_ids
            .get(id)
            .copied()
            .ok_or_else(|| NetworkError::NodeNotFound(id.to_string()))
    }

    /// Get a node record by id.
    pub fn node(&self, id: &str) -> Option<&NetworkNode> {
        self.node_ids.get(id).map(|idx| &self.graph[*idx])
    }

    /// Get the node record behind a graph handle.
    pub fn node_data(&self, idx: NodeId) -> &NetworkNode {
        &self.graph[idx]
    }

    /// Get a link record by id.
    pub fn link(&self, id: &str) -> Option<&NetworkLink> {
        self.link_ids.get(id).map(|idx| &self.graph[*idx])
    }

    /// Get the endpoint node ids of a link.
    pub fn link_endpoints(&self, id: &str) -> Option<(&str, &str)> {
        let idx = self.link_ids.get(id)?;
        let (from, to) = self.graph.edge_endpoints(*idx)?;
        Some((self.graph[from].id.as_str(), self.graph[to].id.as_str()))
    }

    /// Iterate over all node records.
    pub fn nodes(&self) -> impl Iterator<Item = &NetworkNode> {
        self.graph.node_weights()
    }

    /// Iterate over all link records.
    pub fn links(&self) -> impl Iterator<Item = &NetworkLink> {
        self.graph.edge_weights()
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of links in the graph.
    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// The union of the mode sets of all links incident to the given node.
    pub fn node_modes(&self, id: &str) -> BTreeSet<String> {
        let mut modes = BTreeSet::new();
        if let Ok(idx) = self.node_index(id) {
            for direction in [Outgoing, Incoming] {
                for edge in self.graph.edges_directed(idx, direction) {
                    modes.extend(edge.weight().modes.iter().cloned());
                }
            }
        }
        modes
    }

    /// Extract the subgraph containing exactly those links whose mode set intersects the
    /// given modes, together with their endpoint nodes.
    pub fn modal_subgraph(&self, modes: &BTreeSet<&str>) -> NetworkGraph {
        let mut subgraph = NetworkGraph::new();
        for edge in self.graph.edge_references() {
            if !edge.weight().allows_any(modes) {
                continue;
            }
            for endpoint in [edge.source(), edge.target()] {
                let node = &self.graph[endpoint];
                if !subgraph.node_ids.contains_key(&node.id) {
                    // the id is fresh in the subgraph, this cannot fail
                    let _ = subgraph.add_node(node.clone());
                }
            }
            let _ = subgraph.add_link(
                edge.weight().clone(),
                &self.graph[edge.source()].id,
                &self.graph[edge.target()].id,
            );
        }
        subgraph
    }

    /// Shortest-path lengths, weighted by link length, from `source` to every reachable
    /// node. The source itself is reachable with length 0.
    pub fn shortest_path_lengths(&self, source: NodeId) -> HashMap<NodeId, LinkWeight> {
        dijkstra(&self.graph, source, None, |e| e.weight().length)
    }

    /// Shortest path, weighted by link length, from `from` to `to`. Returns the total
    /// length and the ordered node sequence, or `None` if `to` is unreachable.
    pub fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<(LinkWeight, Vec<NodeId>)> {
        astar(&self.graph, from, |n| n == to, |e| e.weight().length, |_| 0.0)
    }

    /// Select one link from the parallel bundle between `from` and `to`: among the links
    /// whose mode set contains `mode`, the one minimizing `(length, id)`. When no link
    /// of the bundle matches the mode, the whole bundle is eligible (the subgraph still
    /// guarantees a match at the mode-family level). Returns `None` for an empty bundle.
    pub fn shortest_path_link(&self, from: NodeId, to: NodeId, mode: &str) -> Option<&NetworkLink> {
        let bundle: Vec<&NetworkLink> = self
            .graph
            .edges_connecting(from, to)
            .map(|e| e.weight())
            .collect();
        let matching: Vec<&NetworkLink> = bundle
            .iter()
            .copied()
            .filter(|l| l.modes.contains(mode))
            .collect();
        let eligible = if matching.is_empty() { bundle } else { matching };
        eligible
            .into_iter()
            .min_by(|a, b| (OrderedFloat(a.length), &a.id).cmp(&(OrderedFloat(b.length), &b.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreeset;
    use pretty_assertions::assert_eq;

    /// A triangle with a parallel bundle between `a` and `b`.
    fn small_net() -> NetworkGraph {
        let mut net = NetworkGraph::new();
        for (id, lat, lng) in [("a", 49.0, -7.0), ("b", 49.001, -7.0), ("c", 49.002, -7.0)] {
            net.add_node(NetworkNode::new(id, 0.0, 0.0, CellId::from_degrees(lat, lng)))
                .unwrap();
        }
        net.add_link(
            NetworkLink::new("l1", 3.0, btreeset! {"car".to_string()}, None),
            "a",
            "b",
        )
        .unwrap();
        net.add_link(
            NetworkLink::new("l2", 2.0, btreeset! {"bus".to_string()}, Some(13.8)),
            "a",
            "b",
        )
        .unwrap();
        net.add_link(
            NetworkLink::new("l3", 1.0, btreeset! {"car".to_string()}, None),
            "b",
            "c",
        )
        .unwrap();
        net
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut net = small_net();
        assert_eq!(
            net.add_node(NetworkNode::new("a", 0.0, 0.0, CellId::from_degrees(0.0, 0.0))),
            Err(NetworkError::DuplicateNode("a".to_string()))
        );
        assert_eq!(
            net.add_link(
                NetworkLink::new("l1", 1.0, btreeset! {"car".to_string()}, None),
                "b",
                "c"
            ),
            Err(NetworkError::DuplicateLink("l1".to_string()))
        );
        assert_eq!(
            net.add_link(
                NetworkLink::new("l4", 1.0, btreeset! {"car".to_string()}, None),
                "missing",
                "c"
            ),
            Err(NetworkError::NodeNotFound("missing".to_string()))
        );
    }

    #[test]
    fn modal_subgraph_filters_links_and_keeps_endpoints() {
        let net = small_net();
        let sub = net.modal_subgraph(&btreeset! {"bus"});
        assert_eq!(sub.link_count(), 1);
        assert_eq!(sub.node_count(), 2);
        assert!(sub.link("l2").is_some());
        assert!(sub.link("l3").is_none());
        assert_eq!(sub.link_endpoints("l2"), Some(("a", "b")));
    }

    #[test]
    fn shortest_paths_take_the_cheapest_parallel_link() {
        let net = small_net();
        let a = net.node_index("a").unwrap();
        let c = net.node_index("c").unwrap();
        let (length, nodes) = net.shortest_path(a, c).unwrap();
        assert_eq!(length, 3.0);
        assert_eq!(nodes.len(), 3);

        let lengths = net.shortest_path_lengths(a);
        assert_eq!(lengths[&a], 0.0);
        assert_eq!(lengths[&c], 3.0);
    }

    #[test]
    fn link_selection_prefers_the_route_mode() {
        let net = small_net();
        let a = net.node_index("a").unwrap();
        let b = net.node_index("b").unwrap();
        assert_eq!(net.shortest_path_link(a, b, "bus").unwrap().id, "l2");
        assert_eq!(net.shortest_path_link(a, b, "car").unwrap().id, "l1");
        // an unmatched mode falls back to the whole bundle, minimizing (length, id)
        assert_eq!(net.shortest_path_link(a, b, "rail").unwrap().id, "l2");
        let c = net.node_index("c").unwrap();
        assert!(net.shortest_path_link(c, a, "car").is_none());
    }
}
