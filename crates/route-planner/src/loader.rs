//! Data loading from JSON files
//!
//! Tabular rows come in loosely typed (every field optional); rows are
//! validated into `RoadSegment` / `RegionObservation` records at this
//! boundary and anything malformed is skipped and counted, never coerced.

use crate::{PlannerError, Result, RoadSegment};
use risk_model::RegionObservation;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// Validate latitude is in valid range
fn is_valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && lat.is_finite()
}

/// Validate longitude is in valid range
fn is_valid_longitude(lon: f64) -> bool {
    (-180.0..=180.0).contains(&lon) && lon.is_finite()
}

/// Sanitize ID (alphanumeric, dash, underscore only)
fn sanitize_id(id: String) -> String {
    id.chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(128)
        .collect()
}

/// Raw road segment row from JSON
#[derive(Debug, Deserialize)]
struct RawSegmentRow {
    segment_id: Option<String>,
    lon: Option<f64>,
    lat: Option<f64>,
    length_m: Option<f64>,
    event_count: Option<u64>,
    region_id: Option<String>,
}

/// Raw region row: either pre-aggregated (`observed_months` present) or one
/// row per region-month (`observed_months` absent, counted as one month).
#[derive(Debug, Deserialize)]
struct RawRegionRow {
    region_id: Option<String>,
    events: Option<u64>,
    observed_months: Option<u32>,
}

/// Load road segments from a JSON file (a bare array or an object with a
/// `segments` field). At most `limit` valid rows are kept, in file order.
pub fn load_segments(path: impl AsRef<Path>, limit: usize) -> Result<Vec<RoadSegment>> {
    let path = path.as_ref();
    info!("Loading road segments from {:?}", path);

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let raw: serde_json::Value = serde_json::from_reader(reader)?;

    let rows: Vec<RawSegmentRow> = if let Some(segments) = raw.get("segments") {
        serde_json::from_value(segments.clone())?
    } else if raw.is_array() {
        serde_json::from_value(raw)?
    } else {
        return Err(PlannerError::NoSegments);
    };

    let mut segments = Vec::new();
    let mut skipped = 0;

    for (i, row) in rows.into_iter().enumerate() {
        if segments.len() >= limit {
            break;
        }

        let lat = match row.lat {
            Some(l) if is_valid_latitude(l) => l,
            _ => {
                skipped += 1;
                continue;
            }
        };
        let lon = match row.lon {
            Some(l) if is_valid_longitude(l) => l,
            _ => {
                skipped += 1;
                continue;
            }
        };
        let length_m = match row.length_m {
            Some(l) if l.is_finite() && l >= 0.0 => l,
            _ => {
                skipped += 1;
                continue;
            }
        };
        // A segment with neither its own counts nor a region to join on
        // carries no risk information at all; reject rather than coerce
        if row.event_count.is_none() && row.region_id.is_none() {
            skipped += 1;
            continue;
        }

        let segment_id = sanitize_id(row.segment_id.unwrap_or_else(|| format!("seg-{}", i)));

        segments.push(RoadSegment {
            segment_id,
            lon,
            lat,
            length_m,
            event_count: row.event_count,
            region_id: row.region_id,
        });
    }

    info!(
        "Loaded {} road segments ({} skipped as malformed)",
        segments.len(),
        skipped
    );

    Ok(segments)
}

/// Load region observations from a JSON array, aggregating per-month rows.
///
/// Pre-aggregated rows contribute their `observed_months`; monthly rows
/// contribute one month each. A region appearing in both shapes sums up.
pub fn load_region_observations(path: impl AsRef<Path>) -> Result<Vec<RegionObservation>> {
    let path = path.as_ref();
    info!("Loading region observations from {:?}", path);

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let rows: Vec<RawRegionRow> = serde_json::from_reader(reader)?;

    let mut grouped: BTreeMap<String, (u64, u32)> = BTreeMap::new();
    let mut skipped = 0;

    for row in rows {
        let region_id = match row.region_id {
            Some(r) if !r.is_empty() => r,
            _ => {
                skipped += 1;
                continue;
            }
        };
        let events = match row.events {
            Some(e) => e,
            None => {
                skipped += 1;
                continue;
            }
        };
        let months = match row.observed_months {
            Some(0) => {
                skipped += 1;
                continue;
            }
            Some(m) => m,
            None => 1,
        };

        let entry = grouped.entry(region_id).or_insert((0, 0));
        entry.0 += events;
        entry.1 += months;
    }

    let observations: Vec<RegionObservation> = grouped
        .into_iter()
        .map(|(region_id, (events, observed_months))| {
            RegionObservation::new(region_id, events, observed_months)
        })
        .collect::<risk_model::Result<_>>()?;

    info!(
        "Loaded {} regions ({} rows skipped as malformed)",
        observations.len(),
        skipped
    );

    Ok(observations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_segments_bare_array() {
        let file = write_temp(
            r#"[
                {"segment_id": "r-1", "lon": 32.5, "lat": 15.5, "length_m": 1200.0, "event_count": 3},
                {"segment_id": "r-2", "lon": 33.0, "lat": 16.0, "length_m": 800.0, "region_id": "kassala"},
                {"segment_id": "bad", "lon": 200.0, "lat": 15.0, "length_m": 100.0, "event_count": 1},
                {"segment_id": "no-risk-info", "lon": 33.5, "lat": 16.5, "length_m": 100.0}
            ]"#,
        );

        let segments = load_segments(file.path(), 50).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].segment_id, "r-1");
        assert_eq!(segments[0].event_count, Some(3));
        assert_eq!(segments[1].region_id.as_deref(), Some("kassala"));
    }

    #[test]
    fn test_load_segments_wrapped_and_limited() {
        let file = write_temp(
            r#"{"segments": [
                {"segment_id": "r-1", "lon": 32.0, "lat": 15.0, "length_m": 100.0, "event_count": 0},
                {"segment_id": "r-2", "lon": 33.0, "lat": 16.0, "length_m": 100.0, "event_count": 0},
                {"segment_id": "r-3", "lon": 34.0, "lat": 17.0, "length_m": 100.0, "event_count": 0}
            ]}"#,
        );

        let segments = load_segments(file.path(), 2).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].segment_id, "r-2");
    }

    #[test]
    fn test_load_segments_sanitizes_ids() {
        let file = write_temp(
            r#"[{"segment_id": "r 1; drop--", "lon": 32.0, "lat": 15.0, "length_m": 5.0, "event_count": 1}]"#,
        );
        let segments = load_segments(file.path(), 10).unwrap();
        assert_eq!(segments[0].segment_id, "r1drop--");
    }

    #[test]
    fn test_load_region_observations_monthly_rows() {
        let file = write_temp(
            r#"[
                {"region_id": "north", "events": 2},
                {"region_id": "north", "events": 1},
                {"region_id": "south", "events": 0, "observed_months": 6},
                {"events": 9}
            ]"#,
        );

        let obs = load_region_observations(file.path()).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].region_id, "north");
        assert_eq!(obs[0].events, 3);
        assert_eq!(obs[0].observed_months, 2);
        assert_eq!(obs[1].region_id, "south");
        assert_eq!(obs[1].observed_months, 6);
    }

    #[test]
    fn test_non_array_segment_file_rejected() {
        let file = write_temp(r#"{"not_segments": true}"#);
        assert!(matches!(
            load_segments(file.path(), 10),
            Err(PlannerError::NoSegments)
        ));
    }
}
