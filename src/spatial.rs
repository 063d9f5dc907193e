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

//! Spatial index over the nodes of a network graph.
//!
//! The [`SpatialTree`] is a directed tree whose leaves are graph nodes and whose inner
//! vertices are geocells at the fixed [`INDEXING_LEVELS`](crate::geocell::INDEXING_LEVELS).
//! The root is a synthetic super-root above the level-0 cells. Radius-bounded
//! nearest-node queries descend the tree and prune every branch whose cell cannot
//! intersect the query cap.

use std::collections::{BTreeSet, HashMap};

use petgraph::prelude::*;

use crate::geocell::{Cap, CellId, EARTH_RADIUS};
use crate::network::NetworkGraph;
use crate::types::IndexType;

/// Lookup key of a spatial tree vertex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SpatialKey {
    /// An inner cell, keyed by its raw cell id. The super-root uses the sentinel id 0.
    Cell(u64),
    /// A leaf graph node, keyed by its id.
    Node(String),
}

/// Data of a spatial tree vertex.
#[derive(Debug, Clone)]
enum SpatialVertex {
    /// The synthetic super-root above the level-0 cells.
    Root,
    /// An inner cell at one of the indexing levels. Carries the union of the mode sets
    /// of all graph nodes indexed beneath it.
    Cell {
        /// The cell this vertex stands for.
        cell: CellId,
        /// Union of the mode sets of all nodes beneath this cell.
        modes: BTreeSet<String>,
    },
    /// A leaf graph node.
    Node {
        /// Id of the graph node.
        id: String,
        /// Mode set of the graph node.
        modes: BTreeSet<String>,
    },
}

/// Hierarchy of network graph nodes, indexed by the geocells containing them.
#[derive(Debug, Clone)]
pub struct SpatialTree {
    /// The tree itself. Edges point from coarse cells towards finer cells and leaves.
    graph: DiGraph<SpatialVertex, (), IndexType>,
    /// Vertex lookup table.
    indices: HashMap<SpatialKey, NodeIndex<IndexType>>,
}

impl Default for SpatialTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialTree {
    /// Create an empty spatial tree, containing only the super-root.
    pub fn new() -> Self {
        let mut graph = DiGraph::default();
        let root = graph.add_node(SpatialVertex::Root);
        let mut indices = HashMap::new();
        indices.insert(SpatialKey::Cell(0), root);
        Self { graph, indices }
    }

    /// Index every node of the given network graph. The mode set attached to each node
    /// is the union of the mode sets of its incident links.
    pub fn from_network(network: &NetworkGraph) -> Self {
        let mut tree = Self::new();
        tree.insert_nodes(
            network
                .nodes()
                .map(|n| (n.id.clone(), n.cell, network.node_modes(&n.id))),
        );
        tree
    }

    /// Index the given `(node_id, cell, modes)` triples. For each node, the ancestor
    /// chain of its cell at the indexing levels is added to the tree; when an inner cell
    /// is encountered a second time, its mode set is merged by set union.
    pub fn insert_nodes(
        &mut self,
        nodes: impl IntoIterator<Item = (String, CellId, BTreeSet<String>)>,
    ) {
        for (node_id, cell, modes) in nodes {
            let chain = cell.ancestors();
            let mut parent = self.indices[&SpatialKey::Cell(0)];
            for ancestor in chain {
                let child = self.ensure_cell(ancestor, &modes);
                self.ensure_edge(parent, child);
                parent = child;
            }
            let leaf = self.ensure_leaf(&node_id, &modes);
            self.ensure_edge(parent, leaf);
        }
    }

    /// Get the inner-cell vertex for `cell`, creating it if needed, and merge `modes`
    /// into its mode set.
    fn ensure_cell(&mut self, cell: CellId, modes: &BTreeSet<String>) -> NodeIndex<IndexType> {
        let key = SpatialKey::Cell(cell.id());
        if let Some(idx) = self.indices.get(&key) {
            if let SpatialVertex::Cell { modes: m, .. } = &mut self.graph[*idx] {
                m.extend(modes.iter().cloned());
            }
            *idx
        } else {
            let idx = self.graph.add_node(SpatialVertex::Cell {
                cell,
                modes: modes.clone(),
            });
            self.indices.insert(key, idx);
            idx
        }
    }

    /// Get the leaf vertex for the graph node `id`, creating it if needed, and merge
    /// `modes` into its mode set.
    fn ensure_leaf(&mut self, id: &str, modes: &BTreeSet<String>) -> NodeIndex<IndexType> {
        let key = SpatialKey::Node(id.to_string());
        if let Some(idx) = self.indices.get(&key) {
            if let SpatialVertex::Node { modes: m, .. } = &mut self.graph[*idx] {
                m.extend(modes.iter().cloned());
            }
            *idx
        } else {
            let idx = self.graph.add_node(SpatialVertex::Node {
                id: id.to_string(),
                modes: modes.clone(),
            });
            self.indices.insert(key, idx);
            idx
        }
    }

    /// Add the edge `parent -> child` unless it is already present.
    fn ensure_edge(&mut self, parent: NodeIndex<IndexType>, child: NodeIndex<IndexType>) {
        if self.graph.find_edge(parent, child).is_none() {
            self.graph.add_edge(parent, child, ());
        }
    }

    /// Ids of all graph nodes in the tree.
    pub fn leaves(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .filter_map(|idx| match &self.graph[idx] {
                SpatialVertex::Node { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Raw ids of the tree roots. Always the single super-root sentinel 0.
    pub fn roots(&self) -> Vec<u64> {
        vec![0]
    }

    /// Whether the given id names a leaf graph node of the tree.
    pub fn is_leaf(&self, id: &str) -> bool {
        self.indices.contains_key(&SpatialKey::Node(id.to_string()))
    }

    /// Number of vertices in the tree, including cells and the super-root.
    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges in the tree.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Find all graph nodes within `radius_m` meters of the given cell.
    ///
    /// A cap of angle `radius_m / EARTH_RADIUS` is constructed around the cell and the
    /// tree is descended, taking a child branch only if the child cell may intersect the
    /// cap. Every node within the radius is returned; false positives are possible at
    /// cell boundaries. The result is sorted lexicographically.
    pub fn find_closest_nodes(&self, cell: CellId, radius_m: f64) -> Vec<String> {
        let cap = Cap::from_cell(cell, radius_m / EARTH_RADIUS);
        let mut found = Vec::new();
        let mut stack = vec![self.indices[&SpatialKey::Cell(0)]];
        while let Some(parent) = stack.pop() {
            for child in self.graph.neighbors(parent) {
                match &self.graph[child] {
                    SpatialVertex::Node { id, .. } => found.push(id.clone()),
                    SpatialVertex::Cell { cell, .. } if cap.may_intersect(*cell) => {
                        stack.push(child)
                    }
                    _ => {}
                }
            }
        }
        found.sort();
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreeset;
    use pretty_assertions::assert_eq;

    /// Index a single node and check the resulting tree shape: one edge per indexing
    /// level, plus the root edge and the leaf edge.
    #[test]
    fn single_node_tree_shape() {
        let mut tree = SpatialTree::new();
        let cell = CellId::from_degrees(51.5074, -0.1278);
        tree.insert_nodes([("1".to_string(), cell, btreeset! {"car".to_string()})]);

        // super-root + 7 cells + 1 leaf
        assert_eq!(tree.vertex_count(), 9);
        assert_eq!(tree.edge_count(), 8);
        assert_eq!(tree.leaves(), vec!["1"]);
        assert_eq!(tree.roots(), vec![0]);
        assert!(tree.is_leaf("1"));
        assert!(!tree.is_leaf("2"));
    }

    /// Two nodes in the same cell share the whole inner chain, and the inner cells carry
    /// the union of both mode sets.
    #[test]
    fn nodes_in_same_cell_merge_mode_sets() {
        let mut tree = SpatialTree::new();
        let cell = CellId::from_degrees(51.5074, -0.1278);
        tree.insert_nodes([
            (
                "1".to_string(),
                cell,
                btreeset! {"subway".to_string(), "walk".to_string(), "car".to_string()},
            ),
            (
                "2".to_string(),
                cell,
                btreeset! {"bike".to_string(), "walk".to_string()},
            ),
        ]);

        // the second node only adds a leaf and its edge
        assert_eq!(tree.vertex_count(), 10);
        assert_eq!(tree.edge_count(), 9);
        let mut leaves = tree.leaves();
        leaves.sort_unstable();
        assert_eq!(leaves, vec!["1", "2"]);

        let expected: BTreeSet<String> = btreeset! {
            "subway".to_string(),
            "walk".to_string(),
            "car".to_string(),
            "bike".to_string()
        };
        for idx in tree.graph.node_indices() {
            if let SpatialVertex::Cell { modes, .. } = &tree.graph[idx] {
                assert_eq!(modes, &expected);
            }
        }
    }

    #[test]
    fn find_closest_nodes_returns_nodes_within_the_radius() {
        let mut tree = SpatialTree::new();
        let here = CellId::from_degrees(51.5074, -0.1278);
        let nearby = CellId::from_degrees(51.50745, -0.1278); // ~6 m
        let far = CellId::from_degrees(51.52, -0.1278); // ~1.4 km
        tree.insert_nodes([
            ("here".to_string(), here, btreeset! {"car".to_string()}),
            ("nearby".to_string(), nearby, btreeset! {"car".to_string()}),
            ("far".to_string(), far, btreeset! {"car".to_string()}),
        ]);

        assert_eq!(
            tree.find_closest_nodes(here, 30.0),
            vec!["here".to_string(), "nearby".to_string()]
        );
        // a node whose cell coincides with the query cell is returned at radius zero
        assert!(tree
            .find_closest_nodes(here, 0.0)
            .contains(&"here".to_string()));
    }
}
