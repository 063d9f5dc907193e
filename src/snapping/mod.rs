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

//! Snapping a schedule element onto a network subgraph.
//!
//! The pipeline has three stages: [`problem`] builds the conflict graph over the
//! candidate pools of all stops, [`ilp`] solves the maximum-weight stable set on it, and
//! [`materialize`] reconstructs the network link sequence for every consecutive stop
//! pair of the solved element.

pub mod ilp;
pub mod materialize;
pub mod problem;

pub use ilp::solve_maximum_stable_set;
pub use materialize::materialize_routes;
pub use problem::{build_problem_graph, ProblemGraph, ProblemVertex};

use crate::network::NetworkGraph;
use crate::schedule::{ScheduleElement, ScheduleGraph};
use crate::spatial::SpatialTree;
use crate::types::{RoutingConfig, RoutingError};

/// Snap a schedule element onto the given network subgraph and materialize the network
/// route of every consecutive stop pair. On success, the returned schedule graph carries
/// the chosen network node, the reconciled `linkRefId` of every stop, and the link
/// sequence of every edge. On failure the schedule entities are left untouched.
pub fn snap_and_route(
    subgraph: &NetworkGraph,
    tree: &SpatialTree,
    element: &ScheduleElement<'_>,
    config: &RoutingConfig,
) -> Result<ScheduleGraph, RoutingError> {
    let (problem_g, mut schedule_g) =
        build_problem_graph(subgraph, tree, element, config.snapping_distance)?;
    let solution = solve_maximum_stable_set(&problem_g, config.solver_timeout)?;
    for (stop_id, node_id) in solution {
        if let Some(stop) = schedule_g.stop_mut(&stop_id) {
            stop.closest_node = Some(node_id);
        }
    }
    materialize_routes(subgraph, &mut schedule_g)?;
    Ok(schedule_g)
}
