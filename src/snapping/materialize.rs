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

//! Materialization of network routes from a solved schedule graph.
//!
//! For every consecutive stop pair, the shortest node path between the chosen network
//! nodes is turned into a link sequence, picking one link per parallel bundle. The
//! `linkRefId` of each stop is reconciled against the sequence: a stop without one is
//! attached to its first link; a stop that already carries a different one (because it
//! is shared with an already-routed pair) keeps it, and the sequence is extended so it
//! remains traversable.

use itertools::Itertools;
use petgraph::prelude::*;

use crate::network::NetworkGraph;
use crate::schedule::ScheduleGraph;
use crate::types::{IndexType, RoutingError};

/// Reconstruct the network link sequence of every edge of the schedule graph, and
/// reconcile the `linkRefId` of every stop on an edge.
///
/// Fails with [`RoutingError::NoPathAfterSolve`] when no path exists between two chosen
/// nodes; the problem builder verified one, so this indicates the graph mutated during
/// routing and is fatal to the schedule element.
pub fn materialize_routes(
    subgraph: &NetworkGraph,
    schedule_g: &mut ScheduleGraph,
) -> Result<(), RoutingError> {
    for edge in schedule_g.edge_indices() {
        let (u_idx, v_idx) = schedule_g.edge_endpoints(edge);
        let chosen_u = chosen_node(schedule_g, u_idx)?;
        let chosen_v = chosen_node(schedule_g, v_idx)?;
        let mode = schedule_g.edge_at_mut(edge).mode.clone();

        let a = subgraph.node_index(&chosen_u)?;
        let b = subgraph.node_index(&chosen_v)?;
        let (_, nodes) = subgraph
            .shortest_path(a, b)
            .ok_or_else(|| RoutingError::NoPathAfterSolve(chosen_u.clone(), chosen_v.clone()))?;

        let mut network_route = Vec::with_capacity(nodes.len().saturating_sub(1));
        for (n_i, n_j) in nodes.iter().tuple_windows() {
            let link = subgraph.shortest_path_link(*n_i, *n_j, &mode).ok_or_else(|| {
                RoutingError::NoPathAfterSolve(
                    subgraph.node_data(*n_i).id.clone(),
                    subgraph.node_data(*n_j).id.clone(),
                )
            })?;
            network_route.push(link.id.clone());
        }

        // both stops chose the same network node: the pair contributes no new links, but
        // an already-assigned linkRefId still propagates to the downstream stop
        if network_route.is_empty() {
            if let Some(l) = schedule_g.stop_at(u_idx).link_ref_id.clone() {
                network_route.push(l);
            }
        }

        if let Some(first) = network_route.first().cloned() {
            let stop_u = schedule_g.stop_at_mut(u_idx);
            match &stop_u.link_ref_id {
                None => stop_u.link_ref_id = Some(first),
                Some(l) if *l != first => network_route.insert(0, l.clone()),
                _ => {}
            }
        }
        if let Some(last) = network_route.last().cloned() {
            let stop_v = schedule_g.stop_at_mut(v_idx);
            match &stop_v.link_ref_id {
                None => stop_v.link_ref_id = Some(last),
                Some(l) if *l != last => network_route.push(l.clone()),
                _ => {}
            }
        }

        schedule_g.edge_at_mut(edge).network_route = network_route;
    }
    Ok(())
}

/// The network node chosen by the solver for the stop at the given vertex.
fn chosen_node(
    schedule_g: &ScheduleGraph,
    idx: NodeIndex<IndexType>,
) -> Result<String, RoutingError> {
    let stop = schedule_g.stop_at(idx);
    stop.closest_node
        .clone()
        .ok_or_else(|| RoutingError::MissingAssignment(stop.stop.id.clone()))
}
