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

//! Orchestration of a routing pass over a schedule.
//!
//! Schedule modes are partitioned into routing families of modes sharing the same
//! infrastructure. For each family present in the schedule, the modal subgraph is
//! extracted once, a spatial tree is built over it, and every service touching the
//! family is snapped and routed. Failures are local to a service: they are logged and
//! the pass continues.

use std::collections::BTreeSet;

use itertools::Itertools;
use lazy_static::lazy_static;
use log::{info, warn};
use maplit::btreeset;

use crate::network::NetworkGraph;
use crate::schedule::{Route, Schedule, ScheduleElement, ScheduleGraph, Service};
use crate::snapping::snap_and_route;
use crate::spatial::SpatialTree;
use crate::types::{RoutingConfig, RoutingError};

lazy_static! {
    /// Modes sharing infrastructure, used to carve modal subgraphs for routing.
    static ref ROUTING_MODE_MAP: Vec<(&'static str, BTreeSet<&'static str>)> = vec![
        ("drive", btreeset! {"bus", "car"}),
        ("rail", btreeset! {"rail", "tram", "subway", "funicular"}),
        ("ferry", btreeset! {"ferry"}),
        ("cable", btreeset! {"gondola", "cable car"}),
    ];
}

/// Route every service of the schedule, family by family.
///
/// For each routing family whose modes intersect the schedule's modes, the modal
/// subgraph is extracted; services touching the family are snapped and routed on it.
/// Per-service failures are logged and skipped, leaving the service's routes unrouted
/// and its stops unchanged. Use [`Schedule::is_valid`] to detect leftovers.
pub fn find_routes_for_schedule(
    network: &NetworkGraph,
    schedule: &mut Schedule,
    config: &RoutingConfig,
) {
    let schedule_modes = schedule.unique_modes();
    for (family, modes) in ROUTING_MODE_MAP.iter() {
        if !schedule_modes.iter().any(|m| modes.contains(m.as_str())) {
            continue;
        }
        info!("Routing for subgraph: {family}");
        let subgraph = network.modal_subgraph(modes);
        if subgraph.link_count() == 0 {
            warn!("Modal subgraph for {family} is empty.");
            continue;
        }
        let tree = SpatialTree::from_network(&subgraph);
        for service in schedule.services.values_mut() {
            if !service
                .unique_modes()
                .iter()
                .any(|m| modes.contains(m.as_str()))
            {
                continue;
            }
            // failures are logged by `route_service`; the pass continues regardless
            let _ = route_service(&subgraph, &tree, service, config);
        }
    }
}

/// Route a single service on the given modal subgraph. Equivalent to one inner step of
/// [`find_routes_for_schedule`]; the caller supplies the subgraph and the mode-family
/// partitioning is skipped.
pub fn find_routes_for_service(
    subgraph: &NetworkGraph,
    service: &mut Service,
    config: &RoutingConfig,
) -> Result<(), RoutingError> {
    let tree = SpatialTree::from_network(subgraph);
    route_service(subgraph, &tree, service, config)
}

/// Route a single route on the given modal subgraph.
pub fn find_route_for_route(
    subgraph: &NetworkGraph,
    route: &mut Route,
    config: &RoutingConfig,
) -> Result<(), RoutingError> {
    let tree = SpatialTree::from_network(subgraph);
    let result = snap_and_route(subgraph, &tree, &ScheduleElement::Route(route), config);
    match result {
        Ok(solved) => {
            apply_to_route(route, &solved, config);
            Ok(())
        }
        Err(e) => {
            warn!("Routing failed for Route: {}", route.id);
            Err(e)
        }
    }
}

/// Snap and route one service, then write the results back onto its routes and stops.
fn route_service(
    subgraph: &NetworkGraph,
    tree: &SpatialTree,
    service: &mut Service,
    config: &RoutingConfig,
) -> Result<(), RoutingError> {
    let result = snap_and_route(subgraph, tree, &ScheduleElement::Service(service), config);
    match result {
        Ok(solved) => {
            for route in &mut service.routes {
                apply_to_route(route, &solved, config);
            }
            Ok(())
        }
        Err(e) => {
            warn!("Routing failed for Service: {}", service.id);
            Err(e)
        }
    }
}

/// Write the solved schedule graph back onto a route: concatenate the per-pair link
/// sequences in stop order, and attach every stop to its reconciled link. Writing the
/// link of a shared stop is last-writer-wins; an already-assigned different link is
/// reported through the configured conflict hook.
fn apply_to_route(route: &mut Route, solved: &ScheduleGraph, config: &RoutingConfig) {
    let mut network_route = Vec::new();
    for (u, v) in route.stops.iter().tuple_windows() {
        if let Some(part) = solved.network_route_between(&u.id, &v.id) {
            network_route.extend_from_slice(part);
        }
    }
    route.network_route = network_route;

    for stop in &mut route.stops {
        let Some(assigned) = solved.stop(&stop.id).and_then(|s| s.link_ref_id.clone()) else {
            continue;
        };
        if let Some(old) = &stop.link_ref_id {
            if *old != assigned {
                if let Some(hook) = config.on_link_ref_conflict {
                    hook(&stop.id, old, &assigned);
                }
            }
        }
        stop.link_ref_id = Some(assigned);
    }
}
