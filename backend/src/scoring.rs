use rayon::prelude::*;

use crate::{
    config::ScoringConfig,
    elevation::{build_profile, ElevationSource},
    error::RouteError,
    metrics::route_metrics,
    models::{CandidateOutcome, CandidateRoute, RouteMetrics, ScoreReport, SelectionParams},
    resample::{resample, TEN_FEET_M},
    selection::select_routes,
};

/// Resamples, profiles and measures candidate routes, then picks among them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteScorer {
    pub step_m: f64,
    pub params: SelectionParams,
}

impl Default for RouteScorer {
    fn default() -> Self {
        Self {
            step_m: TEN_FEET_M,
            params: SelectionParams::default(),
        }
    }
}

impl From<&ScoringConfig> for RouteScorer {
    fn from(config: &ScoringConfig) -> Self {
        Self {
            step_m: config.resample_step_m,
            params: config.selection,
        }
    }
}

impl RouteScorer {
    pub fn new(step_m: f64, params: SelectionParams) -> Self {
        Self { step_m, params }
    }

    /// One outcome per candidate, in input order. Candidates that cannot be
    /// measured come back as `Failed` with the reason.
    pub fn score<S>(&self, candidates: &[CandidateRoute], source: &S) -> Vec<CandidateOutcome>
    where
        S: ElevationSource + ?Sized,
    {
        candidates
            .par_iter()
            .enumerate()
            .map(|(idx, candidate)| {
                let name = candidate
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("route_{}", idx + 1));
                match self.measure(&name, candidate, source) {
                    Ok(metrics) => CandidateOutcome::Scored(metrics),
                    Err(err) => {
                        tracing::warn!("candidate {} could not be scored: {}", name, err);
                        CandidateOutcome::Failed {
                            name,
                            reason: err.to_string(),
                        }
                    }
                }
            })
            .collect()
    }

    /// Score every candidate and select the shortest, flattest and
    /// compromise routes among those that scored.
    pub fn evaluate<S>(&self, candidates: &[CandidateRoute], source: &S) -> Result<ScoreReport, RouteError>
    where
        S: ElevationSource + ?Sized,
    {
        let routes = self.score(candidates, source);
        let scored: Vec<RouteMetrics> = routes
            .iter()
            .filter_map(|outcome| outcome.metrics().cloned())
            .collect();
        tracing::info!("scored {} of {} candidates", scored.len(), routes.len());

        let choices = select_routes(&scored, &self.params)?;
        Ok(ScoreReport {
            params: self.params,
            routes,
            choices,
        })
    }

    fn measure<S>(&self, name: &str, candidate: &CandidateRoute, source: &S) -> Result<RouteMetrics, RouteError>
    where
        S: ElevationSource + ?Sized,
    {
        let path = resample(&candidate.to_coordinates(), self.step_m)?;
        let profile = build_profile(path.coords(), source);
        tracing::debug!(
            "candidate {}: {} samples, {} gap-filled",
            name,
            profile.len(),
            profile.filled
        );
        route_metrics(name, &path, &profile.elevations)
    }
}
