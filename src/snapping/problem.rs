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

//! Builder of the maximum-stable-set problem graph for a schedule element.
//!
//! The problem graph extends the schedule graph of the element: its vertices are the
//! network nodes closest to the stops, one vertex per `(network node, stop)` pair, each
//! carrying the number and total length of shortest paths towards the candidates of
//! neighboring stops. Edges connect vertices that must not be chosen together: vertices
//! of the same candidate pool, and vertices with no network path between them.

use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use log::{info, warn};
use petgraph::prelude::*;

use crate::geocell::CellId;
use crate::network::NetworkGraph;
use crate::schedule::{ScheduleElement, ScheduleGraph};
use crate::spatial::SpatialTree;
use crate::types::{IndexType, LinkWeight, NodeId, RoutingError};

/// Lower bound on the accumulated path lengths when computing vertex weights, guarding
/// the division for candidates whose every path has length zero.
const MIN_TOTAL_PATH_LENGTH: LinkWeight = 1e-6;

/// A candidate vertex of the problem graph: a network node drawn from the candidate pool
/// of a stop.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemVertex {
    /// Disambiguated key `"{network_node}-{stop}"`. The same network node appearing in
    /// the pools of two stops yields two distinct vertices.
    pub key: String,
    /// Id of the network node.
    pub node: String,
    /// Id of the stop whose pool this vertex belongs to.
    pub stop: String,
    /// Sum of the shortest-path lengths between this candidate and the candidates of
    /// neighboring stops.
    pub total_path_lengths: LinkWeight,
    /// Number of shortest paths between this candidate and the candidates of neighboring
    /// stops.
    pub total_paths: usize,
}

impl ProblemVertex {
    /// The disambiguated key of a `(network node, stop)` pair.
    pub fn key_for(node: &str, stop: &str) -> String {
        format!("{node}-{stop}")
    }

    /// Spatial-proximity coefficient of the vertex: the number of paths over their total
    /// length, i.e. the reciprocal average path length. Larger is better.
    pub fn weight(&self) -> f64 {
        self.total_paths as f64 / self.total_path_lengths.max(MIN_TOTAL_PATH_LENGTH)
    }
}

/// The conflict graph of a schedule element, an undirected simple graph over candidate
/// vertices.
#[derive(Debug, Clone)]
pub struct ProblemGraph {
    /// The conflict graph itself.
    graph: UnGraph<ProblemVertex, (), IndexType>,
    /// Vertex lookup by disambiguated key.
    indices: HashMap<String, NodeIndex<IndexType>>,
    /// Number of stops in the schedule element the problem was built for.
    pub total_stops: usize,
    /// Id of the schedule element the problem was built for.
    pub element_id: String,
}

impl ProblemGraph {
    /// Create an empty problem graph for a schedule element.
    fn new(total_stops: usize, element_id: &str) -> Self {
        Self {
            graph: UnGraph::default(),
            indices: HashMap::new(),
            total_stops,
            element_id: element_id.to_string(),
        }
    }

    /// Add a fresh candidate vertex for the given network node and stop.
    fn add_vertex(&mut self, node: &str, stop: &str) {
        let key = ProblemVertex::key_for(node, stop);
        let idx = self.graph.add_node(ProblemVertex {
            key: key.clone(),
            node: node.to_string(),
            stop: stop.to_string(),
            total_path_lengths: 0.0,
            total_paths: 0,
        });
        self.indices.insert(key, idx);
    }

    /// Add a conflict edge between two vertices, keeping the graph simple.
    fn add_conflict(&mut self, a: &str, b: &str) {
        let a = self.indices[a];
        let b = self.indices[b];
        self.graph.update_edge(a, b, ());
    }

    /// Account a successful shortest path of length `length` on the given vertex.
    fn add_path(&mut self, key: &str, length: LinkWeight) {
        let idx = self.indices[key];
        let vertex = &mut self.graph[idx];
        vertex.total_path_lengths += length;
        vertex.total_paths += 1;
    }

    /// Get a vertex by key.
    pub fn vertex(&self, key: &str) -> Option<&ProblemVertex> {
        self.indices.get(key).map(|idx| &self.graph[*idx])
    }

    /// Whether a vertex with the given key exists.
    pub fn contains(&self, key: &str) -> bool {
        self.indices.contains_key(key)
    }

    /// Number of conflict neighbors of a vertex.
    pub fn degree(&self, key: &str) -> usize {
        self.indices
            .get(key)
            .map(|idx| self.graph.neighbors(*idx).count())
            .unwrap_or(0)
    }

    /// Iterate over all vertices.
    pub fn vertices(&self) -> impl Iterator<Item = &ProblemVertex> {
        self.graph.node_weights()
    }

    /// All vertices, sorted by key. This is the canonical iteration order of the solver,
    /// making tie-breaking deterministic.
    pub fn vertices_sorted(&self) -> Vec<&ProblemVertex> {
        self.graph
            .node_weights()
            .sorted_by(|a, b| a.key.cmp(&b.key))
            .collect()
    }

    /// Iterate over all conflict edges as key pairs.
    pub fn conflicts(&self) -> impl Iterator<Item = (&str, &str)> {
        self.graph.edge_references().map(|e| {
            (
                self.graph[e.source()].key.as_str(),
                self.graph[e.target()].key.as_str(),
            )
        })
    }

    /// The surviving candidate pools, keyed by stop id, each sorted by vertex key.
    pub fn pools(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut pools: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for vertex in self.graph.node_weights() {
            pools
                .entry(vertex.stop.as_str())
                .or_default()
                .push(vertex.key.as_str());
        }
        for pool in pools.values_mut() {
            pool.sort_unstable();
        }
        pools
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of conflict edges.
    pub fn conflict_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Remove every vertex without any successful path, rebuilding the lookup table.
    fn purge_unconnected(&mut self) {
        self.graph.retain_nodes(|g, idx| g[idx].total_paths > 0);
        self.indices = self
            .graph
            .node_indices()
            .map(|idx| (self.graph[idx].key.clone(), idx))
            .collect();
    }
}

/// Build the problem graph and the schedule graph for a schedule element.
///
/// For every stop of the element, the candidate pool is looked up in the spatial tree
/// within `snapping_distance` meters. Pool members of the same stop are pairwise
/// conflicting; members of the pools of consecutive stops either contribute a shortest
/// path to their weights or, when no path exists, become conflicting as well. Vertices
/// without any path are purged.
///
/// Fails with [`RoutingError::EmptyCandidatePool`] when a stop finds no nodes at all,
/// and with [`RoutingError::FullyConnectedPair`] when the pools of two consecutive stops
/// are mutually unroutable.
pub fn build_problem_graph(
    subgraph: &NetworkGraph,
    tree: &SpatialTree,
    element: &ScheduleElement<'_>,
    snapping_distance: f64,
) -> Result<(ProblemGraph, ScheduleGraph), RoutingError> {
    let mut schedule_g = element.build_schedule_graph();
    info!(
        "Building Problem Graph for {} id: {}",
        element.kind(),
        element.id()
    );

    let mut problem = ProblemGraph::new(schedule_g.node_count(), element.id());

    // candidate pools, one per unique stop
    let stops: Vec<(String, CellId)> = schedule_g
        .stops()
        .map(|s| (s.stop.id.clone(), s.stop.cell))
        .collect();
    for (stop_id, cell) in &stops {
        let pool = tree.find_closest_nodes(*cell, snapping_distance);
        if pool.is_empty() {
            warn!(
                "One of the stops: {stop_id} has found no network nodes within the specified threshold"
            );
            return Err(RoutingError::EmptyCandidatePool(stop_id.clone()));
        }
        for node in &pool {
            problem.add_vertex(node, stop_id);
        }
        for (a, b) in pool.iter().tuple_combinations() {
            problem.add_conflict(
                &ProblemVertex::key_for(a, stop_id),
                &ProblemVertex::key_for(b, stop_id),
            );
        }
        if let Some(stop) = schedule_g.stop_mut(stop_id) {
            stop.closest_nodes = pool;
        }
    }

    info!("Computing shortest paths");
    let pairs: Vec<(String, String)> = schedule_g
        .edges()
        .map(|(u, v, _)| (u.to_string(), v.to_string()))
        .collect();
    // shortest-path length maps, computed once per source candidate
    let mut cache: HashMap<NodeId, HashMap<NodeId, LinkWeight>> = HashMap::new();
    for (u, v) in &pairs {
        let pool_u = pool_of(&schedule_g, u);
        let pool_v = pool_of(&schedule_g, v);
        for a in &pool_u {
            let a_idx = subgraph.node_index(a)?;
            let lengths = cache
                .entry(a_idx)
                .or_insert_with(|| subgraph.shortest_path_lengths(a_idx));
            let a_key = ProblemVertex::key_for(a, u);
            for b in &pool_v {
                let b_idx = subgraph.node_index(b)?;
                let b_key = ProblemVertex::key_for(b, v);
                match lengths.get(&b_idx) {
                    Some(length) => {
                        let length = *length;
                        problem.add_path(&a_key, length);
                        problem.add_path(&b_key, length);
                    }
                    None => problem.add_conflict(&a_key, &b_key),
                }
            }
        }
    }

    // check that some viable candidate pair is left for each consecutive stop pair
    for (u, v) in &pairs {
        let pool_u = pool_of(&schedule_g, u);
        let pool_v = pool_of(&schedule_g, v);
        let total = pool_u.len() + pool_v.len();
        let mut keys = pool_u
            .iter()
            .map(|n| ProblemVertex::key_for(n, u))
            .chain(pool_v.iter().map(|n| ProblemVertex::key_for(n, v)));
        if keys.all(|k| problem.degree(&k) >= total - 1) {
            warn!(
                "Two stops: {u} and {v} are completely connected, suggesting that one or more \
                 stops has found no viable network nodes within the specified threshold"
            );
            return Err(RoutingError::FullyConnectedPair(u.clone(), v.clone()));
        }
    }

    problem.purge_unconnected();

    Ok((problem, schedule_g))
}

/// The candidate pool of a stop in the schedule graph.
fn pool_of(schedule_g: &ScheduleGraph, stop_id: &str) -> Vec<String> {
    schedule_g
        .stop(stop_id)
        .map(|s| s.closest_nodes.clone())
        .unwrap_or_default()
}
