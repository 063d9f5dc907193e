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

//! End-to-end tests on a small fixture network.
//!
//! The fixture is a 9-node network along a street grid, with one parallel bundle
//! (`link_1`/`link_2`) and a bus shortcut (`link_5`). Grid units are chosen so that a
//! snapping distance of 30 meters puts exactly the two nearest grid nodes into each
//! stop's candidate pool: one x unit is about 57 m, one y unit about 45 m.
//!
//! ```text
//! node_2 --l3-> node_3
//!   ^             |
//!   | l1,l2       | l4
//!   |             v
//! node_1 --l5-> node_4 -l6-> node_5 -l7-> node_6 -l8-> node_7 -l9-> node_8 -l10-> node_9
//! ```

use std::collections::BTreeSet;

use crate::geocell::CellId;
use crate::network::{NetworkGraph, NetworkLink, NetworkNode};
use crate::schedule::{Route, Schedule, Service, Stop};
use crate::types::RoutingConfig;


/// Origin of the fixture grid.
const LAT_0: f64 = 49.7660;
/// Origin of the fixture grid.
const LNG_0: f64 = -7.5570;
/// Longitude degrees per grid x unit (about 57 m at this latitude).
const X_UNIT: f64 = 0.0008;
/// Latitude degrees per grid y unit (about 45 m).
const Y_UNIT: f64 = 0.0004;

/// The geocell of a fixture grid position.
fn cell(x: f64, y: f64) -> CellId {
    CellId::from_degrees(LAT_0 + y * Y_UNIT, LNG_0 + x * X_UNIT)
}

/// A fixture stop at a grid position.
fn stop(id: &str, x: f64, y: f64) -> Stop {
    Stop::new(id, x, y, cell(x, y))
}

/// Mode set from string literals.
fn modes(tags: &[&str]) -> BTreeSet<String> {
    tags.iter().map(|t| t.to_string()).collect()
}

/// The 9-node fixture network. All links have length 1 so shortest paths count hops.
fn network() -> NetworkGraph {
    let mut net = NetworkGraph::new();
    for (id, x, y) in [
        ("node_1", 1.0, 2.0),
        ("node_2", 1.0, 3.0),
        ("node_3", 2.0, 3.0),
        ("node_4", 2.0, 2.0),
        ("node_5", 3.0, 2.0),
        ("node_6", 4.0, 2.0),
        ("node_7", 5.0, 2.0),
        ("node_8", 6.0, 2.0),
        ("node_9", 7.0, 2.0),
    ] {
        net.add_node(NetworkNode::new(id, x, y, cell(x, y))).unwrap();
    }
    for (id, from, to, mode) in [
        ("link_1", "node_1", "node_2", "car"),
        ("link_2", "node_1", "node_2", "bus"),
        ("link_3", "node_2", "node_3", "car"),
        ("link_4", "node_3", "node_4", "car"),
        ("link_5", "node_1", "node_4", "bus"),
        ("link_6", "node_4", "node_5", "car"),
        ("link_7", "node_5", "node_6", "car"),
        ("link_8", "node_6", "node_7", "car"),
        ("link_9", "node_7", "node_8", "car"),
        ("link_10", "node_8", "node_9", "car"),
    ] {
        net.add_link(NetworkLink::new(id, 1.0, modes(&[mode]), Some(1.0)), from, to)
            .unwrap();
    }
    net
}

/// The bus service: `route_1` from stop_1 to stop_2, `route_2` from stop_2 to stop_3.
/// Candidate pools at 30 m: stop_1 `{node_1, node_2}`, stop_2 `{node_5, node_6}`,
/// stop_3 `{node_7, node_8}`.
fn bus_service() -> Service {
    Service::new(
        "service_1",
        vec![
            Route::new(
                "service_1_route_1",
                "bus",
                vec![stop("stop_1", 1.0, 2.5), stop("stop_2", 3.5, 2.0)],
            ),
            Route::new(
                "service_1_route_2",
                "bus",
                vec![stop("stop_2", 3.5, 2.0), stop("stop_3", 5.5, 2.0)],
            ),
        ],
    )
}

/// A rail service over the same stops. The fixture network has no rail links, so its
/// modal subgraph is empty.
fn rail_service() -> Service {
    Service::new(
        "service_rail",
        vec![
            Route::new(
                "service_rail_route_1",
                "rail",
                vec![stop("stop_1", 1.0, 2.5), stop("stop_2", 3.5, 2.0)],
            ),
            Route::new(
                "service_rail_route_2",
                "rail",
                vec![stop("stop_2", 3.5, 2.0), stop("stop_3", 5.5, 2.0)],
            ),
        ],
    )
}

/// The fixture schedule: the bus service plus the rail service.
fn schedule() -> Schedule {
    Schedule::new([bus_service(), rail_service()])
}

/// The fixture routing configuration: 30 m snapping distance.
fn config() -> RoutingConfig {
    RoutingConfig::new(30.0)
}
