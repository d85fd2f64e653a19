//! Segment risk scoring
//!
//! Joins region-level smoothed rates onto road segments and produces a
//! risk intensity in events per metre. Which numerator wins when a segment
//! has both its own count and a resolvable region rate is an explicit
//! policy (`RiskPrecedence`), not an accident of join order.

use crate::{RateSource, RoadSegment, ScoredSegment, LENGTH_FLOOR_M};
use risk_model::RiskEstimate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Which risk numerator to prefer when both are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskPrecedence {
    /// The segment's own event count wins; region rate is the fallback.
    PreferSegmentEvents,
    /// The region's smoothed rate wins; the raw count is the fallback.
    PreferRegionRate,
}

#[derive(Debug, Clone)]
pub struct ScorerConfig {
    pub precedence: RiskPrecedence,
    /// Lengths below this are clamped up to it before dividing.
    pub length_floor_m: f64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            precedence: RiskPrecedence::PreferSegmentEvents,
            length_floor_m: LENGTH_FLOOR_M,
        }
    }
}

/// Score all segments against the region rate table.
///
/// Unresolved joins score 0.0 so the solver always sees a real-valued,
/// totally ordered risk per node. Output order matches input order.
pub fn score_segments(
    segments: Vec<RoadSegment>,
    rates: &[RiskEstimate],
    config: &ScorerConfig,
) -> Vec<ScoredSegment> {
    let rate_by_region: HashMap<&str, f64> = rates
        .iter()
        .map(|r| (r.region_id.as_str(), r.predicted_rate))
        .collect();

    segments
        .into_iter()
        .map(|segment| score_segment(segment, &rate_by_region, config))
        .collect()
}

fn score_segment(
    segment: RoadSegment,
    rate_by_region: &HashMap<&str, f64>,
    config: &ScorerConfig,
) -> ScoredSegment {
    let region_rate = segment
        .region_id
        .as_deref()
        .and_then(|r| rate_by_region.get(r).copied());
    let own_count = segment.event_count.map(|c| c as f64);

    let (numerator, rate_source) = match config.precedence {
        RiskPrecedence::PreferSegmentEvents => match (own_count, region_rate) {
            (Some(c), _) => (c, RateSource::SegmentEvents),
            (None, Some(r)) => (r, RateSource::RegionRate),
            (None, None) => (0.0, RateSource::Unresolved),
        },
        RiskPrecedence::PreferRegionRate => match (own_count, region_rate) {
            (_, Some(r)) => (r, RateSource::RegionRate),
            (Some(c), None) => (c, RateSource::SegmentEvents),
            (None, None) => (0.0, RateSource::Unresolved),
        },
    };

    let risk = numerator / segment.length_m.max(config.length_floor_m);

    debug!(
        "Scored {}: risk={:.6} ({:?}, length_m={:.1})",
        segment.segment_id, risk, rate_source, segment.length_m
    );

    ScoredSegment {
        segment,
        risk,
        rate_source,
    }
}
