use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Build from the (longitude, latitude) order used by routing providers.
    pub fn from_lon_lat(lon: f64, lat: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// Quantitative description of one candidate route.
///
/// `abs_gain_m` counts uphill and downhill deltas alike. It is deliberately
/// not the net (uphill only) gain used to weigh graph edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteMetrics {
    pub name: String,
    pub distance_m: f64,
    pub abs_gain_m: f64,
    /// Population standard deviation of the per-step absolute gain.
    pub grade_smoothness: f64,
    pub gain_per_step_m: f64,
    pub steps: usize,
}

impl RouteMetrics {
    /// Copy with values rounded for human-facing reports.
    pub fn rounded(&self) -> Self {
        Self {
            name: self.name.clone(),
            distance_m: round_to(self.distance_m, 2),
            abs_gain_m: round_to(self.abs_gain_m, 2),
            grade_smoothness: round_to(self.grade_smoothness, 4),
            gain_per_step_m: round_to(self.gain_per_step_m, 4),
            steps: self.steps,
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionParams {
    /// Fractional distance tolerance of the flattest pick relative to the
    /// shortest candidate.
    #[serde(default = "default_tau")]
    pub tau: f64,
    #[serde(default = "default_weight_distance")]
    pub weight_distance: f64,
    #[serde(default = "default_weight_gain")]
    pub weight_gain: f64,
    #[serde(default = "default_weight_smoothness")]
    pub weight_smoothness: f64,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            tau: default_tau(),
            weight_distance: default_weight_distance(),
            weight_gain: default_weight_gain(),
            weight_smoothness: default_weight_smoothness(),
        }
    }
}

pub fn default_tau() -> f64 {
    0.15
}

pub fn default_weight_distance() -> f64 {
    0.4
}

pub fn default_weight_gain() -> f64 {
    0.4
}

pub fn default_weight_smoothness() -> f64 {
    0.2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub shortest: RouteMetrics,
    pub flattest: RouteMetrics,
    pub compromise: RouteMetrics,
    pub params: SelectionParams,
}

impl Selection {
    pub fn rounded(&self) -> Self {
        Self {
            shortest: self.shortest.rounded(),
            flattest: self.flattest.rounded(),
            compromise: self.compromise.rounded(),
            params: self.params,
        }
    }
}

/// Raw geometry of one candidate, coordinates in (longitude, latitude) pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRoute {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub coordinates: Vec<[f64; 2]>,
}

impl CandidateRoute {
    pub fn to_coordinates(&self) -> Vec<Coordinate> {
        self.coordinates
            .iter()
            .map(|[lon, lat]| Coordinate::from_lon_lat(*lon, *lat))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CandidateOutcome {
    Scored(RouteMetrics),
    Failed { name: String, reason: String },
}

impl CandidateOutcome {
    pub fn name(&self) -> &str {
        match self {
            CandidateOutcome::Scored(metrics) => &metrics.name,
            CandidateOutcome::Failed { name, .. } => name,
        }
    }

    pub fn metrics(&self) -> Option<&RouteMetrics> {
        match self {
            CandidateOutcome::Scored(metrics) => Some(metrics),
            CandidateOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRequest {
    pub candidates: Vec<CandidateRoute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<SelectionParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_m: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    pub params: SelectionParams,
    pub routes: Vec<CandidateOutcome>,
    pub choices: Selection,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ElevationSummary {
    pub min_elevation: Option<f64>,
    pub max_elevation: Option<f64>,
    pub total_ascent: f64,
    pub total_descent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}
