//! Exact open-tour solver (Held-Karp dynamic program)
//!
//! Minimizes total weighted path length from a fixed start over all
//! permutations, in O(2^m * m^2) for m = N - 1 free nodes. Hard-capped at
//! [`MAX_EXACT_NODES`] nodes; larger instances report
//! `ExactInstanceTooLarge` and the dispatcher degrades to greedy.

use crate::solver::TourSolver;
use crate::{DistanceMatrix, PlannerError, Result};

/// Largest instance the DP will attempt. Keeps the cost/parent tables in
/// the tens of megabytes; anything bigger belongs to the heuristic.
pub const MAX_EXACT_NODES: usize = 18;

pub struct HeldKarp;

impl TourSolver for HeldKarp {
    fn name(&self) -> &'static str {
        "held-karp"
    }

    fn solve(&self, matrix: &DistanceMatrix, start: usize) -> Result<Vec<usize>> {
        let n = matrix.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        if start >= n {
            return Err(PlannerError::StartOutOfRange(start, n));
        }
        if n > MAX_EXACT_NODES {
            return Err(PlannerError::ExactInstanceTooLarge(n, MAX_EXACT_NODES));
        }
        if n <= 2 {
            // Trivial tours: start alone, or start plus the only other node
            let mut order = vec![start];
            order.extend((0..n).filter(|&j| j != start));
            return Ok(order);
        }

        // Free nodes are everything but the start, indexed 0..m
        let free: Vec<usize> = (0..n).filter(|&j| j != start).collect();
        let m = free.len();
        let full = (1usize << m) - 1;

        // cost[mask][k]: cheapest path from start visiting exactly `mask`,
        // ending at free[k]. parent[mask][k] reconstructs the path.
        let mut cost = vec![vec![f64::INFINITY; m]; full + 1];
        let mut parent = vec![vec![usize::MAX; m]; full + 1];

        for k in 0..m {
            cost[1 << k][k] = matrix.get(start, free[k]);
        }

        for mask in 1..=full {
            for k in 0..m {
                if mask & (1 << k) == 0 || !cost[mask][k].is_finite() {
                    continue;
                }
                let base = cost[mask][k];
                for j in 0..m {
                    if mask & (1 << j) != 0 {
                        continue;
                    }
                    let next_mask = mask | (1 << j);
                    let candidate = base + matrix.get(free[k], free[j]);
                    if candidate < cost[next_mask][j] {
                        cost[next_mask][j] = candidate;
                        parent[next_mask][j] = k;
                    }
                }
            }
        }

        // Open tour: no return edge, so just take the cheapest endpoint
        let mut best_k = 0;
        for k in 1..m {
            if cost[full][k] < cost[full][best_k] {
                best_k = k;
            }
        }

        let mut order = Vec::with_capacity(n);
        let mut mask = full;
        let mut k = best_k;
        while k != usize::MAX {
            order.push(free[k]);
            let prev = parent[mask][k];
            mask &= !(1 << k);
            k = prev;
        }
        order.push(start);
        order.reverse();

        Ok(order)
    }
}
