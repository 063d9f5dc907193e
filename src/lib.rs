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

//! # SnapNet: Snapping public-transport schedules onto multimodal network graphs
//!
//! SnapNet attaches the stops of a public-transport schedule to the nodes of a
//! multimodal road/rail network graph and produces, for each schedule route, the
//! ordered sequence of network links realizing it. Each stop has several plausible
//! nearby network nodes (its candidate pool), and the correct assignment is jointly
//! constrained: the chosen candidates of consecutive stops must be connected by a
//! shortest path of the right mode, while the overall assignment minimizes spatial
//! displacement. The assignment is solved as a maximum-weight stable set over a
//! conflict graph.
//!
//! ## Structure
//! The source code of this crate is structured as follows:
//! - The module [`geocell`] provides hierarchical geospatial cell ids, spherical caps,
//!   and great-circle distances.
//! - The module [`spatial`] indexes the nodes of a network graph into a [`spatial::SpatialTree`]
//!   for radius-bounded nearest-node queries.
//! - The module [`network`] holds the directed multigraph of network nodes and links,
//!   modal subgraph extraction, and shortest-path queries.
//! - The module [`schedule`] defines the schedule data model ([`schedule::Stop`],
//!   [`schedule::Route`], [`schedule::Service`], [`schedule::Schedule`]) and the
//!   transient [`schedule::ScheduleGraph`] built per schedule element.
//! - The module [`snapping`] contains the routing pipeline: the problem-graph builder
//!   ([`snapping::problem`]), the ILP stable-set solver ([`snapping::ilp`]), and the
//!   route materializer ([`snapping::materialize`]).
//! - The module [`routing`] orchestrates a routing pass over a whole schedule,
//!   partitioning modes into routing families.

#![deny(
    missing_docs,
    clippy::missing_docs_in_private_items,
    missing_debug_implementations,
    rust_2018_idioms
)]

pub mod geocell;
pub mod network;
pub mod routing;
pub mod schedule;
pub mod snapping;
pub mod spatial;
pub mod types;

#[cfg(test)]
mod test;

pub use routing::{find_route_for_route, find_routes_for_schedule, find_routes_for_service};
pub use types::{RoutingConfig, RoutingError};

/// Re-exports of the types needed for a typical routing pass.
pub mod prelude {
    pub use crate::geocell::{CellId, EARTH_RADIUS};
    pub use crate::network::{NetworkGraph, NetworkLink, NetworkNode};
    pub use crate::routing::{
        find_route_for_route, find_routes_for_schedule, find_routes_for_service,
    };
    pub use crate::schedule::{Route, Schedule, ScheduleElement, Service, Stop};
    pub use crate::snapping::snap_and_route;
    pub use crate::spatial::SpatialTree;
    pub use crate::types::{RoutingConfig, RoutingError};
}
