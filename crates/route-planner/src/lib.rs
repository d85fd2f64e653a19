//! Risk-Aware Route Planner
//!
//! Orders conflict-zone road segments into an open tour that trades off
//! geodesic distance against accumulated risk exposure.
//!
//! Pipeline:
//! 1. Smooth per-region event rates with the Gamma-Poisson model
//!    (`risk-model` crate).
//! 2. Score each segment: `risk = events / length_m` (or the region's
//!    smoothed rate when the segment has no counts of its own).
//! 3. Build a symmetric distance matrix over segment midpoints where each
//!    edge is `haversine * (1 + risk_weight * mean(risk_i, risk_j))`.
//! 4. Order the nodes with greedy nearest-neighbor, or the exact Held-Karp
//!    solver for small instances (`exact` feature).
//!
//! The risk penalty is a multiplier rather than an additive term so a risky
//! long leg costs more than a risky short one.

use risk_model::{
    estimate_region_rates, GammaPoissonPrior, RegionObservation, RiskEstimate, RiskModelError,
};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

pub mod loader;
pub mod matrix;
pub mod scorer;
pub mod solver;

#[cfg(feature = "exact")]
pub mod exact;

pub use matrix::DistanceMatrix;
pub use scorer::{RiskPrecedence, ScorerConfig};
pub use solver::{plan_route, RouteMetadata, RoutePlan, RouteStop, SolverMode, SolverOptions};

/// Mean Earth radius in km (spherical model).
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Segment lengths below this floor are treated as this many metres when
/// dividing, so degenerate zero-length geometry keeps its node instead of
/// producing an infinite risk.
pub const LENGTH_FLOOR_M: f64 = 1.0;

/// Default risk-sensitivity multiplier for the distance matrix.
pub const DEFAULT_RISK_WEIGHT: f64 = 1.0;

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Model(#[from] RiskModelError),
    #[error("No road segments found in input")]
    NoSegments,
    #[error("risk_weight must be finite and >= 0, got {0}")]
    InvalidRiskWeight(f64),
    #[error("Matrix is not square: {0} rows, row {1} has {2} columns")]
    NonSquareMatrix(usize, usize, usize),
    #[error("Matrix is not symmetric at ({0}, {1}): {2} vs {3}")]
    AsymmetricMatrix(usize, usize, f64, f64),
    #[error("Matrix entry ({0}, {1}) is not finite")]
    NonFiniteWeight(usize, usize),
    #[error("Matrix entry ({0}, {1}) is negative: {2}")]
    NegativeWeight(usize, usize, f64),
    #[error("Matrix diagonal at {0} is nonzero: {1}")]
    NonzeroDiagonal(usize, f64),
    #[error("start_index {0} out of range for {1} nodes")]
    StartOutOfRange(usize, usize),
    #[error("Segment {0} has non-finite coordinates or risk")]
    NonFiniteSegment(String),
    #[error("Instance too large for exact solver: {0} nodes, cap is {1}")]
    ExactInstanceTooLarge(usize, usize),
}

pub type Result<T> = std::result::Result<T, PlannerError>;

/// One routable node: a road segment reduced to its midpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadSegment {
    pub segment_id: String,
    /// Midpoint longitude, WGS84 degrees.
    pub lon: f64,
    /// Midpoint latitude, WGS84 degrees.
    pub lat: f64,
    /// Segment length in metres.
    pub length_m: f64,
    /// Events observed on this segment, when counted directly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_count: Option<u64>,
    /// Administrative region the segment falls in, for rate joins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
}

impl RoadSegment {
    pub fn new(segment_id: impl Into<String>, lon: f64, lat: f64, length_m: f64) -> Self {
        Self {
            segment_id: segment_id.into(),
            lon,
            lat,
            length_m,
            event_count: None,
            region_id: None,
        }
    }

    pub fn with_event_count(mut self, events: u64) -> Self {
        self.event_count = Some(events);
        self
    }

    pub fn with_region(mut self, region_id: impl Into<String>) -> Self {
        self.region_id = Some(region_id.into());
        self
    }
}

/// Where a scored segment's risk numerator came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateSource {
    /// The segment's own event count.
    SegmentEvents,
    /// The region-level smoothed rate.
    RegionRate,
    /// Neither available; risk defaults to zero.
    Unresolved,
}

/// A road segment with its risk intensity attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredSegment {
    pub segment: RoadSegment,
    /// Events per metre of segment, always finite and >= 0.
    pub risk: f64,
    pub rate_source: RateSource,
}

/// End-to-end planner configuration.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub prior: GammaPoissonPrior,
    pub risk_weight: f64,
    pub scorer: ScorerConfig,
    pub solver: SolverOptions,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            prior: GammaPoissonPrior::default(),
            risk_weight: DEFAULT_RISK_WEIGHT,
            scorer: ScorerConfig::default(),
            solver: SolverOptions::default(),
        }
    }
}

/// A fully planned route over scored segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedRoute {
    pub stops: Vec<PlannedStop>,
    pub metadata: RouteMetadata,
}

/// One visited segment with its 0-based rank in the tour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedStop {
    #[serde(flatten)]
    pub scored: ScoredSegment,
    pub order: usize,
}

/// Haversine distance between two points in km.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1 * PI / 180.0;
    let lat2_rad = lat2 * PI / 180.0;
    let dlat = (lat2 - lat1) * PI / 180.0;
    let dlon = (lon2 - lon1) * PI / 180.0;

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Run the full pipeline: estimate region rates, score segments, build the
/// weighted matrix, and order the nodes.
///
/// Empty segment input produces an empty route, not an error.
pub fn plan_segment_route(
    segments: Vec<RoadSegment>,
    observations: &[RegionObservation],
    config: &PlannerConfig,
) -> Result<PlannedRoute> {
    let rates: Vec<RiskEstimate> = estimate_region_rates(observations, &config.prior);
    let scored = scorer::score_segments(segments, &rates, &config.scorer);
    let matrix = DistanceMatrix::build(&scored, config.risk_weight)?;
    let plan = solver::plan_route(&matrix, &config.solver)?;

    let stops = plan
        .stops
        .iter()
        .map(|stop| PlannedStop {
            scored: scored[stop.position].clone(),
            order: stop.order,
        })
        .collect();

    Ok(PlannedRoute {
        stops,
        metadata: plan.metadata,
    })
}

/// Export a planned route to GeoJSON: one LineString for the tour plus a
/// Point per stop.
pub fn to_geojson(route: &PlannedRoute) -> serde_json::Value {
    let line: Vec<serde_json::Value> = route
        .stops
        .iter()
        .map(|s| serde_json::json!([s.scored.segment.lon, s.scored.segment.lat]))
        .collect();

    let mut features = vec![serde_json::json!({
        "type": "Feature",
        "geometry": {
            "type": "LineString",
            "coordinates": line
        },
        "properties": {
            "solver": route.metadata.solver,
            "total_weight_km": route.metadata.total_weight
        }
    })];

    features.extend(route.stops.iter().map(|s| {
        serde_json::json!({
            "type": "Feature",
            "geometry": {
                "type": "Point",
                "coordinates": [s.scored.segment.lon, s.scored.segment.lat]
            },
            "properties": {
                "segment_id": s.scored.segment.segment_id,
                "order": s.order,
                "risk": s.scored.risk,
                "rate_source": format!("{:?}", s.scored.rate_source)
            }
        })
    }));

    serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
        "metadata": route.metadata
    })
}
