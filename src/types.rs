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

//! Module containing all shared type definitions.

use std::time::Duration;

use petgraph::prelude::*;
use thiserror::Error;

/// Index type used for all graphs in this crate.
pub(crate) type IndexType = u32;
/// Handle of a node in the [`crate::network::NetworkGraph`].
pub type NodeId = NodeIndex<IndexType>;
/// Handle of a link in the [`crate::network::NetworkGraph`].
pub type LinkId = EdgeIndex<IndexType>;
/// Weight of a link, used for shortest-path computations (meters).
pub type LinkWeight = f64;

/// Callback invoked when routing is about to overwrite the `linkRefId` of a stop that is
/// shared between several routes or services. The arguments are the stop id, the old link
/// id, and the new link id. The new value always wins (last-writer-wins).
pub type LinkRefConflictHook = fn(&str, &str, &str);

/// Configuration of a routing pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingConfig {
    /// Search radius in meters used to build the candidate pool of each stop. There is no
    /// sensible default; it depends on the coordinate quality of the schedule.
    pub snapping_distance: f64,
    /// Time budget handed to the ILP solver for each schedule element. `None` lets the
    /// solver run to completion.
    pub solver_timeout: Option<Duration>,
    /// Hook observing overwrites of already-assigned stop `linkRefId`s.
    pub on_link_ref_conflict: Option<LinkRefConflictHook>,
}

impl RoutingConfig {
    /// Create a new configuration with the given snapping distance (in meters).
    pub fn new(snapping_distance: f64) -> Self {
        Self {
            snapping_distance,
            solver_timeout: None,
            on_link_ref_conflict: None,
        }
    }

    /// Set the time budget for each solver invocation.
    pub fn with_solver_timeout(mut self, timeout: Duration) -> Self {
        self.solver_timeout = Some(timeout);
        self
    }

    /// Set the hook observing `linkRefId` overwrites on shared stops.
    pub fn with_link_ref_conflict_hook(mut self, hook: LinkRefConflictHook) -> Self {
        self.on_link_ref_conflict = Some(hook);
        self
    }
}

/// Network graph errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum NetworkError {
    /// Node id was not found in the graph
    #[error("Network node was not found in the graph: {0}")]
    NodeNotFound(String),
    /// Link id was not found in the graph
    #[error("Network link was not found in the graph: {0}")]
    LinkNotFound(String),
    /// A node with the same id was already added
    #[error("A node with id {0} already exists in the graph")]
    DuplicateNode(String),
    /// A link with the same id was already added
    #[error("A link with id {0} already exists in the graph")]
    DuplicateLink(String),
}

/// Routing errors. Every error is local to a single schedule element; the orchestrator
/// logs the error and continues with the next element.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RoutingError {
    /// A stop has no network nodes within the snapping radius.
    #[error("Stop {0} has found no network nodes within the specified threshold")]
    EmptyCandidatePool(String),
    /// Two consecutive stops have mutually unroutable candidate pools.
    #[error("Stops {0} and {1} are completely connected: one or more stops has found no viable network nodes within the specified threshold")]
    FullyConnectedPair(String, String),
    /// No assignment satisfies the one-candidate-per-stop and conflict constraints.
    #[error("The solver found no feasible assignment of stops to network nodes")]
    SolverInfeasible,
    /// The solver exceeded the caller-supplied time budget.
    #[error("The solver exceeded its time budget")]
    SolverTimeout,
    /// The solver backend failed for another reason.
    #[error("The solver failed: {0}")]
    Solver(String),
    /// Shortest path between two chosen candidates failed despite earlier success. This
    /// indicates a graph mutated during routing and is fatal to the schedule element.
    #[error("No path in the network between chosen nodes {0} and {1}")]
    NoPathAfterSolve(String, String),
    /// A stop on a schedule-graph edge was left without a chosen network node.
    #[error("Stop {0} was left without a chosen network node")]
    MissingAssignment(String),
    /// Error in the underlying network graph.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
}
