use crate::error::RouteError;
use crate::models::Coordinate;
use crate::projection::{LocalProjection, PlanarPoint, UtmZone};

/// Cadence of the candidate route scorer: 10 ft.
pub const TEN_FEET_M: f64 = 3.048;

/// Smallest cadence accepted from callers.
pub const MIN_STEP_M: f64 = 0.1;

/// Upper bound on the samples one path may expand to.
pub const MAX_SAMPLES: usize = 1_000_000;

/// Trailing distance under which the final sample coincides with the path end.
const END_EPSILON_M: f64 = 1e-6;

/// A path re-sampled at a fixed cadence, together with the metric frame it
/// was measured in.
#[derive(Debug, Clone)]
pub struct ResampledPath {
    coords: Vec<Coordinate>,
    planar: Vec<PlanarPoint>,
    cumulative_m: Vec<f64>,
    zone: UtmZone,
    step_m: f64,
}

impl ResampledPath {
    pub fn coords(&self) -> &[Coordinate] {
        &self.coords
    }

    pub fn planar(&self) -> &[PlanarPoint] {
        &self.planar
    }

    /// Distance along the resampled path at every sample, starting at 0.
    pub fn cumulative_m(&self) -> &[f64] {
        &self.cumulative_m
    }

    pub fn distance_m(&self) -> f64 {
        self.cumulative_m.last().copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn zone(&self) -> UtmZone {
        self.zone
    }

    pub fn step_m(&self) -> f64 {
        self.step_m
    }

    pub fn into_coords(self) -> Vec<Coordinate> {
        self.coords
    }
}

/// Running length of a planar polyline. This is the single distance
/// accumulation shared by resampling and reporting.
pub fn cumulative_lengths(points: &[PlanarPoint]) -> Vec<f64> {
    let mut cumulative = Vec::with_capacity(points.len());
    let mut total = 0.0;
    if !points.is_empty() {
        cumulative.push(0.0);
    }
    for pair in points.windows(2) {
        total += pair[0].distance(pair[1]);
        cumulative.push(total);
    }
    cumulative
}

/// Length of a geographic path measured in its local metric frame.
///
/// `None` when the path is empty or does not fit in one metric frame.
pub fn path_length_m(path: &[Coordinate]) -> Option<f64> {
    let projection = LocalProjection::for_path(path)?;
    let planar = path
        .iter()
        .map(|c| projection.project(*c))
        .collect::<Option<Vec<_>>>()?;
    cumulative_lengths(&planar).last().copied()
}

/// Re-sample `path` every `step_m` meters along its length.
///
/// The first and last samples are the original end points, bit for bit.
/// Samples are emitted at `i * step_m` for every `i` with
/// `i * step_m < L - 1e-6`, then the end point is appended, so a path of
/// length `L` yields `ceil(L / step_m)` or `ceil(L / step_m) + 1` samples.
pub fn resample(path: &[Coordinate], step_m: f64) -> Result<ResampledPath, RouteError> {
    if path.len() < 2 {
        return Err(RouteError::invalid(format!(
            "a path needs at least 2 coordinates, got {}",
            path.len()
        )));
    }
    if !step_m.is_finite() || step_m <= 0.0 {
        return Err(RouteError::invalid(format!(
            "resampling step must be positive, got {step_m}"
        )));
    }
    if let Some(bad) = path.iter().position(|c| !c.is_finite()) {
        return Err(RouteError::invalid(format!(
            "coordinate #{bad} is not a finite number"
        )));
    }

    let projection = LocalProjection::for_path(path)
        .ok_or_else(|| RouteError::invalid("empty path"))?;
    let source = path
        .iter()
        .enumerate()
        .map(|(i, c)| {
            projection.project(*c).ok_or_else(|| {
                RouteError::invalid(format!(
                    "coordinate #{i} cannot be projected into UTM zone {}",
                    projection.zone().epsg()
                ))
            })
        })
        .collect::<Result<Vec<PlanarPoint>, _>>()?;
    let source_cumulative = cumulative_lengths(&source);
    let total = source_cumulative.last().copied().unwrap_or(0.0);
    if !total.is_finite() {
        return Err(RouteError::invalid("path length is not a finite number"));
    }

    let samples = (total / step_m).ceil();
    if samples > MAX_SAMPLES as f64 {
        return Err(RouteError::invalid(format!(
            "{total:.1} m at a {step_m} m step needs more than {MAX_SAMPLES} samples"
        )));
    }
    let estimate = samples as usize + 2;
    let mut coords = Vec::with_capacity(estimate);
    let mut planar = Vec::with_capacity(estimate);
    coords.push(path[0]);
    planar.push(source[0]);

    let mut segment = 0;
    let mut index = 1usize;
    loop {
        let target = index as f64 * step_m;
        if target >= total - END_EPSILON_M {
            break;
        }
        while segment + 1 < source.len() - 1 && source_cumulative[segment + 1] < target {
            segment += 1;
        }
        let seg_start = source_cumulative[segment];
        let seg_len = source_cumulative[segment + 1] - seg_start;
        // zero-length segments are never interpolated into
        let t = if seg_len > 0.0 {
            ((target - seg_start) / seg_len).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let point = source[segment].lerp(source[segment + 1], t);
        let coord = projection.unproject(point).ok_or_else(|| {
            RouteError::invalid(format!("sample at {target:.1} m cannot be unprojected"))
        })?;
        planar.push(point);
        coords.push(coord);
        index += 1;
    }

    let last = path.len() - 1;
    coords.push(path[last]);
    planar.push(source[last]);

    let cumulative_m = cumulative_lengths(&planar);
    tracing::debug!(
        "resampled {} input points ({:.1} m) into {} samples at {} m",
        path.len(),
        total,
        coords.len(),
        step_m
    );

    Ok(ResampledPath {
        coords,
        planar,
        cumulative_m,
        zone: projection.zone(),
        step_m,
    })
}
