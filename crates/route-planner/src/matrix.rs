//! Risk-weighted distance matrix over segment midpoints
//!
//! Edge weight between nodes i and j is the haversine distance scaled by
//! `1 + risk_weight * (risk_i + risk_j) / 2`. With `risk_weight = 0` this
//! degenerates to plain great-circle distance. The weighted matrix is no
//! longer a true metric, but the multiplier preserves the ordering the
//! nearest-neighbor heuristic relies on.

use crate::{haversine_km, PlannerError, Result, ScoredSegment};
use serde::{Deserialize, Serialize};

/// Symmetry tolerance for externally supplied matrices.
const SYMMETRY_EPS: f64 = 1e-9;

/// Square, symmetric, non-negative matrix with a zero diagonal.
///
/// Indexed by position in the segment slice it was built from; the caller
/// owns the position-to-segment correspondence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrix {
    weights: Vec<Vec<f64>>,
}

impl DistanceMatrix {
    /// Build the weighted matrix from scored segments. O(N^2), which is fine
    /// for the bounded candidate counts this planner works with.
    pub fn build(segments: &[ScoredSegment], risk_weight: f64) -> Result<Self> {
        if !risk_weight.is_finite() || risk_weight < 0.0 {
            return Err(PlannerError::InvalidRiskWeight(risk_weight));
        }
        for s in segments {
            if !(s.segment.lon.is_finite() && s.segment.lat.is_finite() && s.risk.is_finite()) {
                return Err(PlannerError::NonFiniteSegment(s.segment.segment_id.clone()));
            }
        }

        let n = segments.len();
        let mut weights = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let base = haversine_km(
                    segments[i].segment.lat,
                    segments[i].segment.lon,
                    segments[j].segment.lat,
                    segments[j].segment.lon,
                );
                let penalty = 1.0 + risk_weight * (segments[i].risk + segments[j].risk) / 2.0;
                let w = base * penalty;
                if !w.is_finite() {
                    return Err(PlannerError::NonFiniteWeight(i, j));
                }
                weights[i][j] = w;
                weights[j][i] = w;
            }
        }

        Ok(Self { weights })
    }

    /// Wrap a caller-supplied matrix, validating the solver's preconditions.
    pub fn from_weights(weights: Vec<Vec<f64>>) -> Result<Self> {
        let matrix = Self { weights };
        matrix.validate()?;
        Ok(matrix)
    }

    /// Check squareness, symmetry, non-negativity, finiteness, and a zero
    /// diagonal. Fails fast on the first violation.
    pub fn validate(&self) -> Result<()> {
        let n = self.weights.len();
        for (i, row) in self.weights.iter().enumerate() {
            if row.len() != n {
                return Err(PlannerError::NonSquareMatrix(n, i, row.len()));
            }
        }
        for i in 0..n {
            if self.weights[i][i] != 0.0 {
                return Err(PlannerError::NonzeroDiagonal(i, self.weights[i][i]));
            }
            for j in (i + 1)..n {
                let a = self.weights[i][j];
                let b = self.weights[j][i];
                if !a.is_finite() || !b.is_finite() {
                    return Err(PlannerError::NonFiniteWeight(i, j));
                }
                if a < 0.0 {
                    return Err(PlannerError::NegativeWeight(i, j, a));
                }
                if (a - b).abs() > SYMMETRY_EPS {
                    return Err(PlannerError::AsymmetricMatrix(i, j, a, b));
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.weights[i][j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.weights[i]
    }
}
