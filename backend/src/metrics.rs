use crate::error::RouteError;
use crate::models::RouteMetrics;
use crate::resample::ResampledPath;

/// Reduce a resampled path and its aligned elevations to route metrics.
///
/// `distance_m` is read from the path's own running length so it always
/// agrees with the cadence the path was resampled at.
pub fn route_metrics(
    name: impl Into<String>,
    path: &ResampledPath,
    elevations: &[f64],
) -> Result<RouteMetrics, RouteError> {
    if elevations.len() != path.len() {
        return Err(RouteError::invalid(format!(
            "{} elevations for {} resampled points",
            elevations.len(),
            path.len()
        )));
    }
    Ok(metrics_from_series(name, path.distance_m(), elevations))
}

pub fn metrics_from_series(
    name: impl Into<String>,
    distance_m: f64,
    elevations: &[f64],
) -> RouteMetrics {
    let gains = per_step_gain(elevations);
    let steps = gains.len();
    let abs_gain_m: f64 = gains.iter().sum();
    let gain_per_step_m = if steps == 0 {
        0.0
    } else {
        abs_gain_m / steps as f64
    };

    RouteMetrics {
        name: name.into(),
        distance_m,
        abs_gain_m,
        grade_smoothness: population_std_dev(&gains),
        gain_per_step_m,
        steps,
    }
}

/// `|elev[i+1] - elev[i]|` for every consecutive pair.
pub fn per_step_gain(elevations: &[f64]) -> Vec<f64> {
    elevations.windows(2).map(|w| (w[1] - w[0]).abs()).collect()
}

/// Sum of rises only; descents contribute nothing.
pub fn net_gain(elevations: &[f64]) -> f64 {
    elevations
        .windows(2)
        .map(|w| (w[1] - w[0]).max(0.0))
        .sum()
}

/// 0 for fewer than two values.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SlopeStats {
    /// Signed grade in percent between consecutive samples.
    pub slopes: Vec<f64>,
    pub max_slope_pct: f64,
    pub avg_slope_pct: f64,
}

/// Grades between consecutive samples; a zero run counts as a 0 % grade.
pub fn slope_stats(cumulative_m: &[f64], elevations: &[f64]) -> SlopeStats {
    let slopes: Vec<f64> = cumulative_m
        .windows(2)
        .zip(elevations.windows(2))
        .map(|(d, e)| {
            let run = d[1] - d[0];
            if run > 0.0 {
                (e[1] - e[0]) / run * 100.0
            } else {
                0.0
            }
        })
        .collect();

    if slopes.is_empty() {
        return SlopeStats::default();
    }

    let max_slope_pct = slopes.iter().map(|s| s.abs()).fold(0.0, f64::max);
    let avg_slope_pct = slopes.iter().map(|s| s.abs()).sum::<f64>() / slopes.len() as f64;
    SlopeStats {
        slopes,
        max_slope_pct,
        avg_slope_pct,
    }
}
