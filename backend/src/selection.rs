use crate::error::RouteError;
use crate::models::{RouteMetrics, Selection, SelectionParams};

pub fn validate_params(params: &SelectionParams) -> Result<(), RouteError> {
    let fields = [
        ("tau", params.tau),
        ("weight_distance", params.weight_distance),
        ("weight_gain", params.weight_gain),
        ("weight_smoothness", params.weight_smoothness),
    ];
    for (label, value) in fields {
        if !value.is_finite() || value < 0.0 {
            return Err(RouteError::invalid(format!(
                "{label} must be a finite non-negative number, got {value}"
            )));
        }
    }
    Ok(())
}

/// Pick the shortest, the flattest within `tau` of the shortest, and the
/// best weighted compromise. Ties go to the earliest candidate.
pub fn select_routes(
    candidates: &[RouteMetrics],
    params: &SelectionParams,
) -> Result<Selection, RouteError> {
    if candidates.is_empty() {
        return Err(RouteError::EmptyCandidateSet);
    }
    validate_params(params)?;

    let shortest = argmin(candidates.iter().map(|m| m.distance_m)).unwrap_or(0);
    let flattest = flattest_within(candidates, candidates[shortest].distance_m, params.tau);
    let compromise = best_compromise(candidates, params);

    tracing::info!(
        "selected shortest={} flattest={} compromise={} from {} candidates",
        candidates[shortest].name,
        candidates[flattest].name,
        candidates[compromise].name,
        candidates.len()
    );

    Ok(Selection {
        shortest: candidates[shortest].clone(),
        flattest: candidates[flattest].clone(),
        compromise: candidates[compromise].clone(),
        params: *params,
    })
}

fn flattest_within(candidates: &[RouteMetrics], shortest_m: f64, tau: f64) -> usize {
    let bound = (1.0 + tau) * shortest_m;
    let feasible = argmin(candidates.iter().map(|m| {
        if m.distance_m <= bound {
            m.abs_gain_m
        } else {
            f64::INFINITY
        }
    }))
    .filter(|idx| candidates[*idx].distance_m <= bound);

    // an empty feasible set means the bound is ignored
    feasible.unwrap_or_else(|| argmin(candidates.iter().map(|m| m.abs_gain_m)).unwrap_or(0))
}

fn best_compromise(candidates: &[RouteMetrics], params: &SelectionParams) -> usize {
    let distance = normalize(candidates.iter().map(|m| m.distance_m));
    let gain = normalize(candidates.iter().map(|m| m.abs_gain_m));
    let smoothness = normalize(candidates.iter().map(|m| m.grade_smoothness));

    let scores = (0..candidates.len()).map(|i| {
        params.weight_distance * distance[i]
            + params.weight_gain * gain[i]
            + params.weight_smoothness * smoothness[i]
    });
    argmin(scores).unwrap_or(0)
}

/// Min-max scale to `[0, 1]`; a zero range maps everything to 0.
pub fn normalize(values: impl Iterator<Item = f64> + Clone) -> Vec<f64> {
    let (lo, hi) = values
        .clone()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let range = hi - lo;
    values
        .map(|v| if range > 0.0 { (v - lo) / range } else { 0.0 })
        .collect()
}

/// Index of the first minimum.
fn argmin(values: impl Iterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, value) in values.enumerate() {
        match best {
            Some((_, current)) if value >= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}
