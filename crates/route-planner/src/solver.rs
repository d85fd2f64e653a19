//! Open-tour route solvers
//!
//! Strategy interface over a validated distance matrix. The greedy
//! nearest-neighbor heuristic is always available; the exact Held-Karp
//! solver is compiled in behind the `exact` feature and capped by instance
//! size. When the exact path is requested but cannot run, the planner falls
//! back to greedy and flags the result as degraded rather than failing —
//! absence of the optional solver is a quality downgrade, not an error.

use crate::{DistanceMatrix, PlannerError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Solver strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SolverMode {
    /// Greedy nearest-neighbor heuristic.
    Greedy,
    /// Exact Held-Karp, degrading to greedy when unavailable or too large.
    Exact,
    /// Exact when compiled in and the instance fits, else greedy.
    Auto,
}

#[derive(Debug, Clone, Copy)]
pub struct SolverOptions {
    pub mode: SolverMode,
    pub start_index: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            mode: SolverMode::Auto,
            start_index: 0,
        }
    }
}

/// An ordering strategy over a complete, symmetric, non-negative matrix.
///
/// Implementations return a permutation of `0..N` beginning at `start`
/// (an open tour; no return edge). An empty matrix yields an empty order;
/// `start >= N` is rejected even when called outside [`plan_route`].
pub trait TourSolver {
    fn name(&self) -> &'static str;
    fn solve(&self, matrix: &DistanceMatrix, start: usize) -> Result<Vec<usize>>;
}

/// Greedy nearest-neighbor: repeatedly step to the closest unvisited node.
/// Ties break toward the lowest node index.
pub struct GreedyNearestNeighbor;

impl TourSolver for GreedyNearestNeighbor {
    fn name(&self) -> &'static str {
        "greedy-nearest-neighbor"
    }

    fn solve(&self, matrix: &DistanceMatrix, start: usize) -> Result<Vec<usize>> {
        let n = matrix.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        if start >= n {
            return Err(PlannerError::StartOutOfRange(start, n));
        }
        let mut visited = vec![false; n];
        let mut order = Vec::with_capacity(n);
        order.push(start);
        visited[start] = true;

        for _ in 1..n {
            let last = order[order.len() - 1];
            let mut next: Option<(usize, f64)> = None;
            for j in 0..n {
                if visited[j] {
                    continue;
                }
                let w = matrix.get(last, j);
                // Strict `<` keeps the lowest index on ties
                match next {
                    Some((_, best)) if w >= best => {}
                    _ => next = Some((j, w)),
                }
            }
            // Matrix is complete, so an unvisited node is always reachable
            let (j, w) = next.expect("unvisited node must exist");
            debug!("step {} -> {} (weight {:.3})", last, j, w);
            order.push(j);
            visited[j] = true;
        }

        Ok(order)
    }
}

/// One visited node position with its 0-based rank in the tour.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RouteStop {
    /// Index into the matrix / input segment ordering.
    pub position: usize,
    /// Rank in visitation sequence.
    pub order: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteMetadata {
    /// Name of the solver that actually produced the tour.
    pub solver: String,
    pub requested_mode: SolverMode,
    /// True when the exact solver was requested but greedy ran instead.
    pub degraded: bool,
    pub node_count: usize,
    /// Sum of edge weights along the open tour.
    pub total_weight: f64,
    pub generated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePlan {
    pub stops: Vec<RouteStop>,
    pub metadata: RouteMetadata,
}

/// Order all nodes of the matrix into an open tour.
///
/// Validates the matrix and `start_index` up front; an empty matrix yields
/// an empty plan rather than an error so upstream stages that legitimately
/// produce no candidates stay composable.
pub fn plan_route(matrix: &DistanceMatrix, options: &SolverOptions) -> Result<RoutePlan> {
    matrix.validate()?;

    let n = matrix.len();
    if n == 0 {
        return Ok(RoutePlan {
            stops: Vec::new(),
            metadata: metadata("none", options.mode, false, 0, 0.0),
        });
    }
    if options.start_index >= n {
        return Err(PlannerError::StartOutOfRange(options.start_index, n));
    }

    let (order, solver_name, degraded) = dispatch(matrix, options)?;
    debug_assert_eq!(order.len(), n);
    debug_assert_eq!(order[0], options.start_index);

    let total_weight: f64 = order.windows(2).map(|w| matrix.get(w[0], w[1])).sum();

    info!(
        "Planned route over {} nodes with {} (total weight {:.2} km{})",
        n,
        solver_name,
        total_weight,
        if degraded { ", degraded" } else { "" }
    );

    let stops = order
        .into_iter()
        .enumerate()
        .map(|(order, position)| RouteStop { position, order })
        .collect();

    Ok(RoutePlan {
        stops,
        metadata: metadata(solver_name, options.mode, degraded, n, total_weight),
    })
}

fn metadata(
    solver: &str,
    requested_mode: SolverMode,
    degraded: bool,
    node_count: usize,
    total_weight: f64,
) -> RouteMetadata {
    RouteMetadata {
        solver: solver.to_string(),
        requested_mode,
        degraded,
        node_count,
        total_weight,
        generated_at: chrono::Utc::now().to_rfc3339(),
    }
}

/// Resolve the mode to a concrete solver run. Returns the visit order, the
/// solver that produced it, and whether an exact request was downgraded.
fn dispatch(
    matrix: &DistanceMatrix,
    options: &SolverOptions,
) -> Result<(Vec<usize>, &'static str, bool)> {
    let greedy = GreedyNearestNeighbor;

    match options.mode {
        SolverMode::Greedy => {
            let order = greedy.solve(matrix, options.start_index)?;
            Ok((order, greedy.name(), false))
        }
        SolverMode::Exact => match try_exact(matrix, options.start_index) {
            Some(result) => {
                let order = result?;
                Ok((order, exact_name(), false))
            }
            None => {
                warn!("Exact solver unavailable or instance too large; using greedy");
                let order = greedy.solve(matrix, options.start_index)?;
                Ok((order, greedy.name(), true))
            }
        },
        SolverMode::Auto => match try_exact(matrix, options.start_index) {
            Some(result) => {
                let order = result?;
                Ok((order, exact_name(), false))
            }
            None => {
                let order = greedy.solve(matrix, options.start_index)?;
                Ok((order, greedy.name(), false))
            }
        },
    }
}

#[cfg(feature = "exact")]
fn try_exact(matrix: &DistanceMatrix, start: usize) -> Option<Result<Vec<usize>>> {
    let solver = crate::exact::HeldKarp;
    match solver.solve(matrix, start) {
        Err(PlannerError::ExactInstanceTooLarge(n, cap)) => {
            debug!("Instance of {} nodes exceeds exact cap {}", n, cap);
            None
        }
        other => Some(other),
    }
}

#[cfg(not(feature = "exact"))]
fn try_exact(_matrix: &DistanceMatrix, _start: usize) -> Option<Result<Vec<usize>>> {
    None
}

#[cfg(feature = "exact")]
fn exact_name() -> &'static str {
    crate::exact::HeldKarp.name()
}

#[cfg(not(feature = "exact"))]
fn exact_name() -> &'static str {
    "exact"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix_from(points: &[(f64, f64)]) -> DistanceMatrix {
        let n = points.len();
        let mut weights = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let w = crate::haversine_km(points[i].1, points[i].0, points[j].1, points[j].0);
                weights[i][j] = w;
                weights[j][i] = w;
            }
        }
        DistanceMatrix::from_weights(weights).unwrap()
    }

    #[test]
    fn test_greedy_on_collinear_points() {
        let m = matrix_from(&[(0.0, 0.0), (0.1, 0.1), (0.2, 0.2)]);
        let plan = plan_route(
            &m,
            &SolverOptions {
                mode: SolverMode::Greedy,
                start_index: 0,
            },
        )
        .unwrap();

        assert_eq!(plan.stops.len(), 3);
        assert_eq!(plan.stops[0].position, 0);
        let positions: Vec<usize> = plan.stops.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        let orders: Vec<usize> = plan.stops.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn test_greedy_is_a_permutation() {
        let m = matrix_from(&[
            (32.5, 15.5),
            (36.0, 19.0),
            (33.0, 13.0),
            (30.0, 18.5),
            (34.5, 16.2),
        ]);
        let plan = plan_route(
            &m,
            &SolverOptions {
                mode: SolverMode::Greedy,
                start_index: 2,
            },
        )
        .unwrap();

        let mut positions: Vec<usize> = plan.stops.iter().map(|s| s.position).collect();
        assert_eq!(positions[0], 2);
        positions.sort_unstable();
        assert_eq!(positions, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_greedy_tie_breaks_to_lowest_index() {
        // Nodes 1 and 2 are equidistant from 0; the scan must pick 1
        let weights = vec![
            vec![0.0, 5.0, 5.0],
            vec![5.0, 0.0, 1.0],
            vec![5.0, 1.0, 0.0],
        ];
        let m = DistanceMatrix::from_weights(weights).unwrap();
        let order = GreedyNearestNeighbor.solve(&m, 0).unwrap();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_matrix_empty_plan() {
        let m = DistanceMatrix::from_weights(vec![]).unwrap();
        let plan = plan_route(&m, &SolverOptions::default()).unwrap();
        assert!(plan.stops.is_empty());
        assert_eq!(plan.metadata.node_count, 0);
        assert!(!plan.metadata.degraded);
    }

    #[test]
    fn test_start_out_of_range() {
        let m = matrix_from(&[(0.0, 0.0), (1.0, 1.0)]);
        let result = plan_route(
            &m,
            &SolverOptions {
                mode: SolverMode::Greedy,
                start_index: 2,
            },
        );
        assert!(matches!(result, Err(PlannerError::StartOutOfRange(2, 2))));
    }

    #[test]
    fn test_malformed_matrix_rejected() {
        let ragged = vec![vec![0.0, 1.0, 2.0], vec![1.0, 0.0]];
        assert!(matches!(
            DistanceMatrix::from_weights(ragged),
            Err(PlannerError::NonSquareMatrix(..))
        ));
    }

    #[test]
    fn test_total_weight_sums_tour_edges() {
        let weights = vec![
            vec![0.0, 2.0, 9.0],
            vec![2.0, 0.0, 3.0],
            vec![9.0, 3.0, 0.0],
        ];
        let m = DistanceMatrix::from_weights(weights).unwrap();
        let plan = plan_route(
            &m,
            &SolverOptions {
                mode: SolverMode::Greedy,
                start_index: 0,
            },
        )
        .unwrap();
        // 0 -> 1 (2.0) -> 2 (3.0)
        assert!((plan.metadata.total_weight - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_exact_fallback_sets_degraded_flag() {
        // With the exact solver compiled in, exceed its instance cap; with
        // it compiled out, any exact request must degrade.
        #[cfg(feature = "exact")]
        let n = crate::exact::MAX_EXACT_NODES + 1;
        #[cfg(not(feature = "exact"))]
        let n = 5;

        let mut weights = vec![vec![1.0; n]; n];
        for (i, row) in weights.iter_mut().enumerate() {
            row[i] = 0.0;
        }
        let m = DistanceMatrix::from_weights(weights).unwrap();

        let plan = plan_route(
            &m,
            &SolverOptions {
                mode: SolverMode::Exact,
                start_index: 0,
            },
        )
        .unwrap();

        assert!(plan.metadata.degraded);
        assert_eq!(plan.metadata.solver, "greedy-nearest-neighbor");
        let mut positions: Vec<usize> = plan.stops.iter().map(|s| s.position).collect();
        assert_eq!(positions[0], 0);
        positions.sort_unstable();
        assert_eq!(positions, (0..n).collect::<Vec<usize>>());
    }

    #[test]
    fn test_greedy_direct_call_validates_start() {
        let m = matrix_from(&[(0.0, 0.0), (1.0, 1.0)]);
        assert!(matches!(
            GreedyNearestNeighbor.solve(&m, 9),
            Err(PlannerError::StartOutOfRange(9, 2))
        ));

        let empty = DistanceMatrix::from_weights(vec![]).unwrap();
        assert_eq!(GreedyNearestNeighbor.solve(&empty, 0).unwrap(), Vec::<usize>::new());
    }

    #[cfg(feature = "exact")]
    #[test]
    fn test_auto_uses_exact_on_small_instance() {
        let m = matrix_from(&[(32.5, 15.5), (36.0, 19.0), (33.0, 13.0), (30.0, 18.5)]);
        let plan = plan_route(
            &m,
            &SolverOptions {
                mode: SolverMode::Auto,
                start_index: 0,
            },
        )
        .unwrap();
        assert_eq!(plan.metadata.solver, "held-karp");
        assert!(!plan.metadata.degraded);
    }

    #[test]
    fn test_single_node() {
        let m = DistanceMatrix::from_weights(vec![vec![0.0]]).unwrap();
        let plan = plan_route(&m, &SolverOptions::default()).unwrap();
        assert_eq!(plan.stops.len(), 1);
        assert_eq!(plan.stops[0].position, 0);
        assert_eq!(plan.metadata.total_weight, 0.0);
    }
}
