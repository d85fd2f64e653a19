//! Region Risk Model
//!
//! Bayesian smoothing of per-region conflict event rates. Event counts are
//! modeled as Poisson draws with a Gamma(alpha, beta) prior on the unknown
//! monthly rate; the posterior mean `(alpha + events) / (beta + months)` is
//! the smoothed estimate. Regions with few or zero observed months shrink
//! toward the prior mean `alpha / beta` instead of reporting a zero rate,
//! so under-observed regions are never treated as risk-free.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskModelError {
    #[error("Invalid prior: alpha and beta must be positive and finite (alpha={0}, beta={1})")]
    InvalidPrior(f64, f64),
    #[error("Region id must not be empty")]
    EmptyRegionId,
    #[error("Region {0} has zero observed months")]
    ZeroObservedMonths(String),
}

pub type Result<T> = std::result::Result<T, RiskModelError>;

/// Aggregated history for one region: total events across all observed months.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionObservation {
    pub region_id: String,
    pub events: u64,
    pub observed_months: u32,
}

impl RegionObservation {
    pub fn new(region_id: impl Into<String>, events: u64, observed_months: u32) -> Result<Self> {
        let region_id = region_id.into();
        if region_id.is_empty() {
            return Err(RiskModelError::EmptyRegionId);
        }
        if observed_months == 0 {
            return Err(RiskModelError::ZeroObservedMonths(region_id));
        }
        Ok(Self {
            region_id,
            events,
            observed_months,
        })
    }
}

/// Smoothed monthly event rate for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskEstimate {
    pub region_id: String,
    pub predicted_rate: f64,
}

/// Gamma(alpha, beta) prior on the monthly event rate.
///
/// `alpha` is the prior event pseudo-count, `beta` the prior month
/// pseudo-count. Both must be strictly positive or the posterior is
/// degenerate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GammaPoissonPrior {
    alpha: f64,
    beta: f64,
}

impl Default for GammaPoissonPrior {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 1.0,
        }
    }
}

impl GammaPoissonPrior {
    pub fn new(alpha: f64, beta: f64) -> Result<Self> {
        if !(alpha.is_finite() && beta.is_finite() && alpha > 0.0 && beta > 0.0) {
            return Err(RiskModelError::InvalidPrior(alpha, beta));
        }
        Ok(Self { alpha, beta })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Prior mean rate, the shrinkage target for unobserved regions.
    pub fn mean(&self) -> f64 {
        self.alpha / self.beta
    }

    /// Posterior mean rate after observing `events` over `months`.
    pub fn posterior_mean(&self, events: u64, months: u32) -> f64 {
        (self.alpha + events as f64) / (self.beta + f64::from(months))
    }
}

/// Fold raw per-region-month rows into one observation per region.
///
/// Months = row count per region, events = sum. Regions come out in
/// lexicographic order so downstream joins are deterministic.
pub fn aggregate_monthly<I, S>(rows: I) -> Vec<RegionObservation>
where
    I: IntoIterator<Item = (S, u64)>,
    S: Into<String>,
{
    let mut grouped: BTreeMap<String, (u64, u32)> = BTreeMap::new();
    for (region_id, events) in rows {
        let entry = grouped.entry(region_id.into()).or_insert((0, 0));
        entry.0 += events;
        entry.1 += 1;
    }
    grouped
        .into_iter()
        .map(|(region_id, (events, observed_months))| RegionObservation {
            region_id,
            events,
            observed_months,
        })
        .collect()
}

/// Posterior-mean rate per region.
///
/// Empty input yields empty output. Every returned rate is strictly
/// positive because the prior is.
pub fn estimate_region_rates(
    observations: &[RegionObservation],
    prior: &GammaPoissonPrior,
) -> Vec<RiskEstimate> {
    observations
        .iter()
        .map(|obs| RiskEstimate {
            region_id: obs.region_id.clone(),
            predicted_rate: prior.posterior_mean(obs.events, obs.observed_months),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prior_rejects_nonpositive() {
        assert!(GammaPoissonPrior::new(0.0, 1.0).is_err());
        assert!(GammaPoissonPrior::new(1.0, -1.0).is_err());
        assert!(GammaPoissonPrior::new(f64::NAN, 1.0).is_err());
        assert!(GammaPoissonPrior::new(1.0, f64::INFINITY).is_err());
        assert!(GammaPoissonPrior::new(0.5, 2.0).is_ok());
    }

    #[test]
    fn test_posterior_mean_concrete() {
        let prior = GammaPoissonPrior::default();
        // Two months with 2 and 1 events: (1 + 3) / (1 + 2)
        let rate = prior.posterior_mean(3, 2);
        assert!((rate - 4.0 / 3.0).abs() < 1e-12);
        // One month with zero events shrinks toward the prior, not zero
        let rate = prior.posterior_mean(0, 1);
        assert!((rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_rates_strictly_positive() {
        let prior = GammaPoissonPrior::new(0.1, 5.0).unwrap();
        let obs = vec![
            RegionObservation::new("a", 0, 1).unwrap(),
            RegionObservation::new("b", 0, 120).unwrap(),
        ];
        for est in estimate_region_rates(&obs, &prior) {
            assert!(est.predicted_rate > 0.0, "{:?}", est);
        }
    }

    #[test]
    fn test_monotone_in_events_and_months() {
        let prior = GammaPoissonPrior::default();
        // More events at fixed months never lowers the rate
        assert!(prior.posterior_mean(5, 4) > prior.posterior_mean(3, 4));
        // More months at fixed events never raises it (dilution)
        assert!(prior.posterior_mean(3, 6) < prior.posterior_mean(3, 4));
    }

    #[test]
    fn test_aggregate_monthly_groups_and_sorts() {
        let rows = vec![("north", 2), ("south", 0), ("north", 1)];
        let obs = aggregate_monthly(rows);
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].region_id, "north");
        assert_eq!(obs[0].events, 3);
        assert_eq!(obs[0].observed_months, 2);
        assert_eq!(obs[1].region_id, "south");
        assert_eq!(obs[1].events, 0);
        assert_eq!(obs[1].observed_months, 1);
    }

    #[test]
    fn test_empty_input_empty_output() {
        let prior = GammaPoissonPrior::default();
        assert!(estimate_region_rates(&[], &prior).is_empty());
        assert!(aggregate_monthly(Vec::<(String, u64)>::new()).is_empty());
    }

    #[test]
    fn test_observation_validation() {
        assert!(RegionObservation::new("", 1, 1).is_err());
        assert!(RegionObservation::new("a", 1, 0).is_err());
    }
}
