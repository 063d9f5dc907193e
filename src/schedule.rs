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

//! The public-transport schedule data model, and the schedule graph built from a
//! schedule element for routing.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use itertools::Itertools;
use petgraph::prelude::*;

use crate::geocell::CellId;
use crate::types::IndexType;

/// A schedule stop. `link_ref_id` is the network link the stop is attached to; it is
/// written by routing and respected by subsequent routing passes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Stop {
    /// Id of the stop, unique within a schedule.
    pub id: String,
    /// Projected x coordinate.
    pub x: f64,
    /// Projected y coordinate.
    pub y: f64,
    /// Geocell containing the stop.
    pub cell: CellId,
    /// Network link the stop is attached to, if it has been routed.
    pub link_ref_id: Option<String>,
}

impl Stop {
    /// Create a new, unrouted stop.
    pub fn new(id: impl Into<String>, x: f64, y: f64, cell: CellId) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            cell,
            link_ref_id: None,
        }
    }

    /// Whether the stop has been attached to a network link.
    pub fn has_link_ref(&self) -> bool {
        self.link_ref_id.is_some()
    }
}

/// An ordered sequence of stops served under a single mode, together with the network
/// link sequence realizing it after routing.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Route {
    /// Id of the route.
    pub id: String,
    /// Mode tag of the route.
    pub mode: String,
    /// Ordered stops of the route.
    pub stops: Vec<Stop>,
    /// Ordered network link ids realizing the route. Empty until routed.
    pub network_route: Vec<String>,
}

impl Route {
    /// Create a new, unrouted route.
    pub fn new(id: impl Into<String>, mode: impl Into<String>, stops: Vec<Stop>) -> Self {
        Self {
            id: id.into(),
            mode: mode.into(),
            stops,
            network_route: Vec::new(),
        }
    }

    /// Get a stop of the route by id.
    pub fn stop(&self, id: &str) -> Option<&Stop> {
        self.stops.iter().find(|s| s.id == id)
    }
}

/// A collection of routes operated together.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Service {
    /// Id of the service.
    pub id: String,
    /// Routes of the service.
    pub routes: Vec<Route>,
}

impl Service {
    /// Create a new service.
    pub fn new(id: impl Into<String>, routes: Vec<Route>) -> Self {
        Self {
            id: id.into(),
            routes,
        }
    }

    /// The set of mode tags used by the routes of this service.
    pub fn unique_modes(&self) -> BTreeSet<String> {
        self.routes.iter().map(|r| r.mode.clone()).collect()
    }
}

/// A whole schedule: services indexed by id.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Schedule {
    /// Services of the schedule, by id.
    pub services: BTreeMap<String, Service>,
}

impl Schedule {
    /// Create a schedule from a collection of services.
    pub fn new(services: impl IntoIterator<Item = Service>) -> Self {
        Self {
            services: services.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    /// The set of mode tags used anywhere in the schedule.
    pub fn unique_modes(&self) -> BTreeSet<String> {
        self.services
            .values()
            .flat_map(Service::unique_modes)
            .collect()
    }

    /// Get a service by id.
    pub fn service(&self, id: &str) -> Option<&Service> {
        self.services.get(id)
    }

    /// Get a route by id, searching all services.
    pub fn route(&self, id: &str) -> Option<&Route> {
        self.services
            .values()
            .flat_map(|s| s.routes.iter())
            .find(|r| r.id == id)
    }

    /// Get a stop by id, searching all routes. When several routes carry a stop with the
    /// same id, the first in service/route order is returned.
    pub fn stop(&self, id: &str) -> Option<&Stop> {
        self.services
            .values()
            .flat_map(|s| s.routes.iter())
            .find_map(|r| r.stop(id))
    }

    /// Whether the schedule has been fully routed: every route with at least two stops
    /// has a non-empty network route, and every stop of such a route is attached to a
    /// network link.
    pub fn is_valid(&self) -> bool {
        self.services
            .values()
            .flat_map(|s| s.routes.iter())
            .filter(|r| r.stops.len() >= 2)
            .all(|r| !r.network_route.is_empty() && r.stops.iter().all(Stop::has_link_ref))
    }

    /// Serialize the schedule (including any routing results) to a JSON string.
    #[cfg(feature = "serde")]
    #[allow(clippy::missing_panics_doc)]
    pub fn as_json_str(&self) -> String {
        serde_json::to_string(self).unwrap()
    }

    /// Restore a schedule from its JSON representation.
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A schedule element accepted by the problem-graph builder: a single route, a service,
/// or a whole schedule.
#[derive(Debug, Clone, Copy)]
pub enum ScheduleElement<'a> {
    /// A single route.
    Route(&'a Route),
    /// A service with all its routes.
    Service(&'a Service),
    /// A whole schedule. Routing a schedule as one element is possible but rarely what
    /// you want; the orchestrator routes service by service.
    Schedule(&'a Schedule),
}

impl<'a> ScheduleElement<'a> {
    /// The kind of the element, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Route(_) => "Route",
            Self::Service(_) => "Service",
            Self::Schedule(_) => "Schedule",
        }
    }

    /// The id of the element. A whole schedule has no id of its own.
    pub fn id(&self) -> &str {
        match self {
            Self::Route(r) => &r.id,
            Self::Service(s) => &s.id,
            Self::Schedule(_) => "schedule",
        }
    }

    /// All routes of the element, in service/route order.
    pub fn routes(&self) -> Vec<&'a Route> {
        match self {
            Self::Route(r) => vec![r],
            Self::Service(s) => s.routes.iter().collect(),
            Self::Schedule(s) => s
                .services
                .values()
                .flat_map(|s| s.routes.iter())
                .collect(),
        }
    }

    /// Build the schedule graph of this element: one vertex per unique stop id, one edge
    /// per consecutive stop pair within each route. A stop shared by several routes
    /// yields a single vertex.
    pub fn build_schedule_graph(&self) -> ScheduleGraph {
        let mut graph = ScheduleGraph::new(self.kind(), self.id());
        for route in self.routes() {
            for stop in &route.stops {
                graph.ensure_stop(stop);
            }
            for (u, v) in route.stops.iter().tuple_windows() {
                graph.ensure_edge(&u.id, &v.id, &route.mode);
            }
        }
        graph
    }
}

/// A stop vertex of the [`ScheduleGraph`], carrying the routing working state.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleStop {
    /// The stop record this vertex stands for.
    pub stop: Stop,
    /// Network node ids of the stop's candidate pool.
    pub closest_nodes: Vec<String>,
    /// Network node chosen for this stop by the solver.
    pub closest_node: Option<String>,
    /// Network link the stop is attached to. Seeded from the stop record, reconciled
    /// during route materialization.
    pub link_ref_id: Option<String>,
}

/// An edge of the [`ScheduleGraph`]: a consecutive stop pair within some route.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEdge {
    /// Mode tag of the route that contributed this stop pair.
    pub mode: String,
    /// Ordered network link ids realizing this stop pair. Empty until materialized.
    pub network_route: Vec<String>,
}

/// Directed graph of the stops of a schedule element, with consecutive stop pairs as
/// edges. Transient: built per schedule element, solved, materialized, then applied back
/// onto the schedule entities.
#[derive(Debug, Clone)]
pub struct ScheduleGraph {
    /// Kind of the element this graph was built from, for logging.
    kind: &'static str,
    /// Id of the element this graph was built from.
    element_id: String,
    /// The graph itself. Edge insertion order follows route stop order.
    graph: DiGraph<ScheduleStop, ScheduleEdge, IndexType>,
    /// Vertex lookup by stop id.
    indices: HashMap<String, NodeIndex<IndexType>>,
}

impl ScheduleGraph {
    /// Create an empty schedule graph for the given element.
    fn new(kind: &'static str, element_id: &str) -> Self {
        Self {
            kind,
            element_id: element_id.to_string(),
            graph: DiGraph::default(),
            indices: HashMap::new(),
        }
    }

    /// Kind of the element this graph was built from.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Id of the element this graph was built from.
    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    /// Add a vertex for the given stop unless one with the same id exists. The first
    /// occurrence of a stop id wins; its `link_ref_id` seeds the working state.
    fn ensure_stop(&mut self, stop: &Stop) {
        if self.indices.contains_key(&stop.id) {
            return;
        }
        let idx = self.graph.add_node(ScheduleStop {
            stop: stop.clone(),
            closest_nodes: Vec::new(),
            closest_node: None,
            link_ref_id: stop.link_ref_id.clone(),
        });
        self.indices.insert(stop.id.clone(), idx);
    }

    /// Add the edge `u -> v` unless it is already present.
    fn ensure_edge(&mut self, u: &str, v: &str, mode: &str) {
        let u = self.indices[u];
        let v = self.indices[v];
        if self.graph.find_edge(u, v).is_none() {
            self.graph.add_edge(
                u,
                v,
                ScheduleEdge {
                    mode: mode.to_string(),
                    network_route: Vec::new(),
                },
            );
        }
    }

    /// Number of stops in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of consecutive stop pairs in the graph.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Iterate over the stop vertices in insertion order.
    pub fn stops(&self) -> impl Iterator<Item = &ScheduleStop> {
        self.graph.node_weights()
    }

    /// Get a stop vertex by stop id.
    pub fn stop(&self, id: &str) -> Option<&ScheduleStop> {
        self.indices.get(id).map(|idx| &self.graph[*idx])
    }

    /// Get a mutable stop vertex by stop id.
    pub(crate) fn stop_mut(&mut self, id: &str) -> Option<&mut ScheduleStop> {
        let idx = *self.indices.get(id)?;
        Some(&mut self.graph[idx])
    }

    /// Iterate over the edges in insertion order, as `(from_stop, to_stop, edge)`.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &ScheduleEdge)> {
        self.graph.edge_references().map(|e| {
            (
                self.graph[e.source()].stop.id.as_str(),
                self.graph[e.target()].stop.id.as_str(),
                e.weight(),
            )
        })
    }

    /// The materialized link sequence between two consecutive stops, if any.
    pub fn network_route_between(&self, u: &str, v: &str) -> Option<&[String]> {
        let u = *self.indices.get(u)?;
        let v = *self.indices.get(v)?;
        let edge = self.graph.find_edge(u, v)?;
        Some(&self.graph[edge].network_route)
    }

    /// Edge handles in insertion order.
    pub(crate) fn edge_indices(&self) -> Vec<EdgeIndex<IndexType>> {
        self.graph.edge_indices().collect()
    }

    /// Endpoint vertices of an edge.
    pub(crate) fn edge_endpoints(
        &self,
        edge: EdgeIndex<IndexType>,
    ) -> (NodeIndex<IndexType>, NodeIndex<IndexType>) {
        // edge handles come from `edge_indices` and the graph is append-only
        self.graph.edge_endpoints(edge).expect("edge of this graph")
    }

    /// Get a stop vertex by graph handle.
    pub(crate) fn stop_at(&self, idx: NodeIndex<IndexType>) -> &ScheduleStop {
        &self.graph[idx]
    }

    /// Get a mutable stop vertex by graph handle.
    pub(crate) fn stop_at_mut(&mut self, idx: NodeIndex<IndexType>) -> &mut ScheduleStop {
        &mut self.graph[idx]
    }

    /// Get a mutable edge by graph handle.
    pub(crate) fn edge_at_mut(&mut self, edge: EdgeIndex<IndexType>) -> &mut ScheduleEdge {
        &mut self.graph[edge]
    }

    /// Stop ids in insertion order.
    pub fn stop_ids(&self) -> Vec<&str> {
        self.graph
            .node_weights()
            .map(|s| s.stop.id.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Two routes sharing a stop id must collapse onto a single vertex, and consecutive
    /// pairs of both routes become edges.
    #[test]
    fn schedule_graph_of_a_service_with_shared_stop() {
        let cell = CellId::from_degrees(49.766, -7.557);
        let service = Service::new(
            "service_1",
            vec![
                Route::new(
                    "route_1",
                    "bus",
                    vec![
                        Stop::new("stop_1", 1.0, 2.5, cell),
                        Stop::new("stop_2", 2.0, 2.5, cell),
                    ],
                ),
                Route::new(
                    "route_2",
                    "bus",
                    vec![
                        Stop::new("stop_2", 2.0, 2.5, cell),
                        Stop::new("stop_3", 5.5, 2.0, cell),
                    ],
                ),
            ],
        );
        let graph = ScheduleElement::Service(&service).build_schedule_graph();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        let edges: Vec<(&str, &str)> = graph.edges().map(|(u, v, _)| (u, v)).collect();
        assert_eq!(edges, vec![("stop_1", "stop_2"), ("stop_2", "stop_3")]);
        assert_eq!(graph.kind(), "Service");
        assert_eq!(graph.element_id(), "service_1");
    }

    /// A single-stop route yields a vertex but no edges.
    #[test]
    fn schedule_graph_of_a_single_stop_route() {
        let cell = CellId::from_degrees(49.766, -7.557);
        let route = Route::new("route_1", "bus", vec![Stop::new("stop_1", 1.0, 2.5, cell)]);
        let graph = ScheduleElement::Route(&route).build_schedule_graph();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn unique_modes_are_collected_across_services() {
        let cell = CellId::from_degrees(49.766, -7.557);
        let schedule = Schedule::new([
            Service::new(
                "s1",
                vec![Route::new("r1", "bus", vec![Stop::new("a", 0.0, 0.0, cell)])],
            ),
            Service::new(
                "s2",
                vec![Route::new("r2", "rail", vec![Stop::new("b", 0.0, 0.0, cell)])],
            ),
        ]);
        let modes: Vec<String> = schedule.unique_modes().into_iter().collect();
        assert_eq!(modes, vec!["bus".to_string(), "rail".to_string()]);
    }
}
