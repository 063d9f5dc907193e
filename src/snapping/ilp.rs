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

//! Maximum-weight stable set solver on the problem graph, via ILP.
//!
//! One binary variable per candidate vertex; one `x_a + x_b <= 1` constraint per
//! conflict edge; one `sum = 1` constraint per candidate pool, so every stop receives
//! exactly one network node. The objective maximizes the sum of the chosen vertices'
//! spatial-proximity coefficients.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use good_lp::{
    constraint,
    solvers::coin_cbc::coin_cbc as create_solver,
    variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable,
};
use log::{debug, info};

use crate::snapping::problem::ProblemGraph;
use crate::types::RoutingError;

/// Solve the maximum-weight stable set on the given problem graph.
///
/// Returns the chosen network node for every stop that still has candidates. Variables
/// are created, and the solution is read back, in lexicographic key order, so ties
/// between equally good optima resolve deterministically.
pub fn solve_maximum_stable_set(
    problem: &ProblemGraph,
    timeout: Option<Duration>,
) -> Result<HashMap<String, String>, RoutingError> {
    // nothing to choose, e.g. a single-stop element whose pool was purged
    if problem.vertex_count() == 0 {
        return Ok(HashMap::new());
    }

    info!("Passing problem to solver");

    let mut vars = ProblemVariables::new();
    let vertices = problem.vertices_sorted();
    let x: HashMap<&str, Variable> = vertices
        .iter()
        .map(|v| (v.key.as_str(), vars.add(variable().binary())))
        .collect();

    let objective: Expression = vertices.iter().map(|v| x[v.key.as_str()] * v.weight()).sum();
    let mut model = create_solver(vars.maximise(objective));

    // disable logging during tests
    #[cfg(any(test, feature = "hide-cbc-output"))]
    {
        model.set_parameter("logLevel", "0");
    }

    if let Some(t) = timeout {
        model.set_parameter("seconds", &t.as_secs().to_string());
    }

    // mutual exclusion along every conflict edge
    let mut rows = 0usize;
    for (a, b) in problem.conflicts() {
        model.add_constraint(constraint!(x[a] + x[b] <= 1));
        rows += 1;
    }
    // exactly one candidate per stop
    for (_, pool) in problem.pools() {
        let sum: Expression = pool.iter().map(|k| Expression::from(x[*k])).sum();
        model.add_constraint(constraint!(sum == 1));
        rows += 1;
    }
    debug!(
        "{} variables, {} equations for {} stops",
        vertices.len(),
        rows,
        problem.total_stops
    );

    let start = Instant::now();
    let solution = model.solve().map_err(|e| match e {
        ResolutionError::Infeasible => RoutingError::SolverInfeasible,
        other => match timeout {
            Some(t) if start.elapsed() >= t => RoutingError::SolverTimeout,
            _ => RoutingError::Solver(other.to_string()),
        },
    })?;

    let mut assignment: HashMap<String, String> = HashMap::new();
    for vertex in vertices {
        if solution.value(x[vertex.key.as_str()]) > 0.5 {
            assignment
                .entry(vertex.stop.clone())
                .or_insert_with(|| vertex.node.clone());
        }
    }
    Ok(assignment)
}
