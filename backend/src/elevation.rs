use crate::models::{Coordinate, ElevationSummary};

/// Point elevation lookup.
///
/// `None` is the NO_DATA answer (outside coverage, raster void). It is kept
/// distinct from a valid 0 m. Opened sources are read-only and shared
/// between threads without locking.
pub trait ElevationSource: Send + Sync {
    fn elevation_at(&self, lat: f64, lon: f64) -> Option<f64>;
}

impl<F> ElevationSource for F
where
    F: Fn(f64, f64) -> Option<f64> + Send + Sync,
{
    fn elevation_at(&self, lat: f64, lon: f64) -> Option<f64> {
        self(lat, lon)
    }
}

/// Elevation series aligned 1:1 with a resampled path.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationProfile {
    pub elevations: Vec<f64>,
    /// Samples that came back as NO_DATA and were filled from a neighbour.
    pub filled: usize,
    pub all_missing: bool,
    pub summary: ElevationSummary,
}

impl ElevationProfile {
    pub fn len(&self) -> usize {
        self.elevations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elevations.is_empty()
    }
}

/// Look up every coordinate and fill the gaps.
pub fn build_profile<S>(coords: &[Coordinate], source: &S) -> ElevationProfile
where
    S: ElevationSource + ?Sized,
{
    let raw: Vec<Option<f64>> = coords
        .iter()
        .map(|c| source.elevation_at(c.lat, c.lon).filter(|v| v.is_finite()))
        .collect();
    profile_from_samples(&raw)
}

/// Gap-fill raw samples and summarise them.
pub fn profile_from_samples(raw: &[Option<f64>]) -> ElevationProfile {
    let (elevations, filled) = fill_gaps(raw);
    let all_missing = !raw.is_empty() && filled == raw.len();

    if all_missing {
        tracing::warn!(
            "no elevation data for any of {} samples; treating profile as flat",
            raw.len()
        );
    } else if filled > 0 {
        tracing::debug!("gap-filled {} of {} elevation samples", filled, raw.len());
    }

    let valid = raw.iter().flatten().copied();
    let min_elevation = valid.clone().reduce(f64::min);
    let max_elevation = valid.reduce(f64::max);

    let mut total_ascent = 0.0;
    let mut total_descent = 0.0;
    for window in elevations.windows(2) {
        let diff = window[1] - window[0];
        if diff > 0.0 {
            total_ascent += diff;
        } else {
            total_descent += diff.abs();
        }
    }

    ElevationProfile {
        elevations,
        filled,
        all_missing,
        summary: ElevationSummary {
            min_elevation,
            max_elevation,
            total_ascent,
            total_descent,
        },
    }
}

/// Forward-fill from the nearest earlier valid sample; leading gaps take the
/// first valid sample found later. An entirely empty series becomes a
/// constant 0 m. Returns the filled series and how many entries were filled.
pub fn fill_gaps(raw: &[Option<f64>]) -> (Vec<f64>, usize) {
    let first_valid = raw.iter().flatten().copied().next();
    let Some(first_valid) = first_valid else {
        return (vec![0.0; raw.len()], raw.len());
    };

    let mut filled = 0;
    let mut last = first_valid;
    let values = raw
        .iter()
        .map(|sample| match sample {
            Some(value) => {
                last = *value;
                *value
            }
            None => {
                filled += 1;
                last
            }
        })
        .collect();
    (values, filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(n: usize) -> Vec<Coordinate> {
        (0..n)
            .map(|i| Coordinate {
                lat: 47.6,
                lon: -122.3 + i as f64 * 0.0001,
            })
            .collect()
    }

    #[test]
    fn forward_fills_interior_gaps() {
        let (values, filled) = fill_gaps(&[Some(10.0), None, None, Some(14.0), None]);
        assert_eq!(values, vec![10.0, 10.0, 10.0, 14.0, 14.0]);
        assert_eq!(filled, 3);
    }

    #[test]
    fn leading_gaps_take_first_valid_sample() {
        let (values, filled) = fill_gaps(&[None, None, Some(7.5), Some(8.0)]);
        assert_eq!(values, vec![7.5, 7.5, 7.5, 8.0]);
        assert_eq!(filled, 2);
    }

    #[test]
    fn all_missing_is_constant_not_nan() {
        let (values, filled) = fill_gaps(&[None, None, None]);
        assert_eq!(values, vec![0.0, 0.0, 0.0]);
        assert_eq!(filled, 3);
    }

    #[test]
    fn zero_is_a_valid_elevation() {
        let (values, filled) = fill_gaps(&[Some(0.0), None, Some(3.0)]);
        assert_eq!(values, vec![0.0, 0.0, 3.0]);
        assert_eq!(filled, 1);
    }

    #[test]
    fn empty_series() {
        let profile = profile_from_samples(&[]);
        assert!(profile.is_empty());
        assert!(!profile.all_missing);
        assert_eq!(profile.summary, ElevationSummary::default());
    }

    #[test]
    fn profile_is_aligned_with_coordinates() {
        let path = coords(6);
        let source = |_lat: f64, lon: f64| Some((lon + 122.3) * 10_000.0);
        let profile = build_profile(&path, &source);
        assert_eq!(profile.len(), path.len());
        assert_eq!(profile.filled, 0);
        assert!((profile.summary.total_ascent - 5.0).abs() < 1e-6);
        assert_eq!(profile.summary.total_descent, 0.0);
    }

    #[test]
    fn non_finite_lookups_count_as_no_data() {
        let path = coords(3);
        let source = |_lat: f64, lon: f64| {
            if lon > -122.29995 {
                Some(f64::NAN)
            } else {
                Some(100.0)
            }
        };
        let profile = build_profile(&path, &source);
        assert_eq!(profile.elevations, vec![100.0, 100.0, 100.0]);
        assert_eq!(profile.filled, 2);
    }

    #[test]
    fn summary_tracks_ascent_descent_and_extremes() {
        let profile = profile_from_samples(&[Some(100.0), Some(110.0), None, Some(95.0)]);
        assert_eq!(profile.summary.min_elevation, Some(95.0));
        assert_eq!(profile.summary.max_elevation, Some(110.0));
        assert_eq!(profile.summary.total_ascent, 10.0);
        assert_eq!(profile.summary.total_descent, 15.0);
    }

    #[test]
    fn no_coverage_profile_reports_flat() {
        let path = coords(4);
        let source = |_lat: f64, _lon: f64| None;
        let profile = build_profile(&path, &source);
        assert!(profile.all_missing);
        assert_eq!(profile.elevations, vec![0.0; 4]);
        assert_eq!(profile.summary.min_elevation, None);
        assert_eq!(profile.summary.total_ascent, 0.0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_fill_never_yields_nan(raw in prop::collection::vec(prop::option::of(-500.0f64..9000.0), 0..64)) {
                let (values, filled) = fill_gaps(&raw);
                prop_assert_eq!(values.len(), raw.len());
                prop_assert!(values.iter().all(|v| v.is_finite()));
                prop_assert_eq!(filled, raw.iter().filter(|v| v.is_none()).count());
            }

            #[test]
            fn prop_valid_samples_are_untouched(raw in prop::collection::vec(prop::option::of(-500.0f64..9000.0), 1..64)) {
                let (values, _) = fill_gaps(&raw);
                for (value, sample) in values.iter().zip(&raw) {
                    if let Some(sample) = sample {
                        prop_assert_eq!(value, sample);
                    }
                }
            }
        }
    }
}
