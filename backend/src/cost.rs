use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::graph::Edge;

/// Edge cost policies for path search. Every variant is non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CostFunction {
    /// Edge length in meters.
    Shortest,
    /// Net elevation gain in meters.
    Flattest,
    /// `alpha * distance + beta * net gain`.
    WeightedBlend { alpha: f64, beta: f64 },
}

impl CostFunction {
    /// Even blend of distance and net gain.
    pub const BALANCED: Self = Self::WeightedBlend {
        alpha: 0.5,
        beta: 0.5,
    };

    pub fn weighted_blend(alpha: f64, beta: f64) -> Result<Self, RouteError> {
        let cost = Self::WeightedBlend { alpha, beta };
        cost.validate()?;
        Ok(cost)
    }

    /// Blend coefficients must be finite and non-negative.
    pub fn validate(&self) -> Result<(), RouteError> {
        match *self {
            Self::Shortest | Self::Flattest => Ok(()),
            Self::WeightedBlend { alpha, beta } => {
                for (label, value) in [("alpha", alpha), ("beta", beta)] {
                    if !value.is_finite() || value < 0.0 {
                        return Err(RouteError::invalid(format!(
                            "{label} must be a finite non-negative number, got {value}"
                        )));
                    }
                }
                Ok(())
            }
        }
    }

    pub fn cost(&self, edge: &Edge) -> f64 {
        match *self {
            Self::Shortest => edge.distance_m(),
            Self::Flattest => edge.elevation_gain_m(),
            Self::WeightedBlend { alpha, beta } => {
                alpha * edge.distance_m() + beta * edge.elevation_gain_m()
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Shortest => "shortest",
            Self::Flattest => "flattest",
            Self::WeightedBlend { .. } => "weighted",
        }
    }
}
