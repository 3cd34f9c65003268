use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::OnceLock;

use crate::models::Coordinate;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const UTM_K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Position in a projected metric frame (easting, northing in meters).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarPoint {
    pub x: f64,
    pub y: f64,
}

impl PlanarPoint {
    pub fn distance(self, other: Self) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    pub number: u8,
    pub north: bool,
}

impl UtmZone {
    pub fn containing(coord: Coordinate) -> Self {
        let number = (((coord.lon + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u8;
        Self {
            number,
            north: coord.lat >= 0.0,
        }
    }

    pub fn central_meridian(&self) -> f64 {
        f64::from(self.number) * 6.0 - 183.0
    }

    pub fn epsg(&self) -> u32 {
        let base = if self.north { 32600 } else { 32700 };
        base + u32::from(self.number)
    }

    fn false_northing(&self) -> f64 {
        if self.north {
            0.0
        } else {
            FALSE_NORTHING_SOUTH
        }
    }
}

/// Metric frame chosen for one path: the UTM zone of its bounding-box center.
///
/// Every length derived from a path (resampling cadence, reported distance,
/// slope runs) must go through the same `LocalProjection` so the numbers
/// cannot drift apart. Points are transformed by PROJ. When PROJ cannot
/// build the transformation for the zone, the built-in transverse Mercator
/// series is used instead.
pub struct LocalProjection {
    zone: UtmZone,
    transform: Option<Rc<ProjPair>>,
}

impl LocalProjection {
    pub fn for_zone(zone: UtmZone) -> Self {
        Self {
            zone,
            transform: cached_transform(zone),
        }
    }

    /// Projection suited to the geographic extent of `path`.
    ///
    /// Returns `None` for an empty path.
    pub fn for_path(path: &[Coordinate]) -> Option<Self> {
        let first = path.first()?;
        let (mut min_lat, mut max_lat, mut min_lon, mut max_lon) =
            (first.lat, first.lat, first.lon, first.lon);
        for c in path {
            min_lat = min_lat.min(c.lat);
            max_lat = max_lat.max(c.lat);
            min_lon = min_lon.min(c.lon);
            max_lon = max_lon.max(c.lon);
        }
        let center = Coordinate {
            lat: (min_lat + max_lat) / 2.0,
            lon: (min_lon + max_lon) / 2.0,
        };
        Some(Self::for_zone(UtmZone::containing(center)))
    }

    pub fn zone(&self) -> UtmZone {
        self.zone
    }

    /// Whether points go through PROJ rather than the built-in series.
    pub fn uses_proj(&self) -> bool {
        self.transform.is_some()
    }

    /// `None` when the point cannot be represented in this zone (too far
    /// from the central meridian, or rejected by PROJ).
    pub fn project(&self, coord: Coordinate) -> Option<PlanarPoint> {
        let point = match &self.transform {
            Some(transform) => transform.forward(coord)?,
            None => transverse_mercator_forward(coord, self.zone),
        };
        (point.x.is_finite() && point.y.is_finite()).then_some(point)
    }

    pub fn unproject(&self, point: PlanarPoint) -> Option<Coordinate> {
        let coord = match &self.transform {
            Some(transform) => transform.inverse(point)?,
            None => transverse_mercator_inverse(point, self.zone),
        };
        coord.is_finite().then_some(coord)
    }
}

/// WGS84 <-> UTM transformations, one pair per zone and per thread.
struct ProjPair {
    to_metric: proj::Proj,
    to_geographic: proj::Proj,
}

impl ProjPair {
    fn new(zone: UtmZone) -> Option<Self> {
        let target = format!("EPSG:{}", zone.epsg());
        let to_metric = proj::Proj::new_known_crs("EPSG:4326", &target, None);
        let to_geographic = proj::Proj::new_known_crs(&target, "EPSG:4326", None);
        match (to_metric, to_geographic) {
            (Ok(to_metric), Ok(to_geographic)) => Some(Self {
                to_metric,
                to_geographic,
            }),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!("Failed to create projection for {}: {}", target, e);
                None
            }
        }
    }

    fn forward(&self, coord: Coordinate) -> Option<PlanarPoint> {
        // proj expects (lon, lat) order for geographic coordinates
        match self.to_metric.convert((coord.lon, coord.lat)) {
            Ok((x, y)) => Some(PlanarPoint { x, y }),
            Err(e) => {
                tracing::warn!("Failed to project ({}, {}): {}", coord.lat, coord.lon, e);
                None
            }
        }
    }

    fn inverse(&self, point: PlanarPoint) -> Option<Coordinate> {
        match self.to_geographic.convert((point.x, point.y)) {
            Ok((lon, lat)) => Some(Coordinate { lat, lon }),
            Err(e) => {
                tracing::warn!("Failed to unproject ({}, {}): {}", point.x, point.y, e);
                None
            }
        }
    }
}

/// `proj::Proj` is not `Send`, so every worker thread keeps its own
/// transformations. A zone that failed once is not retried on that thread.
fn cached_transform(zone: UtmZone) -> Option<Rc<ProjPair>> {
    thread_local! {
        static TRANSFORMS: RefCell<HashMap<u32, Option<Rc<ProjPair>>>> =
            RefCell::new(HashMap::new());
    }

    TRANSFORMS.with(|cell| {
        cell.borrow_mut()
            .entry(zone.epsg())
            .or_insert_with(|| ProjPair::new(zone).map(Rc::new))
            .clone()
    })
}

/// Krüger series coefficients for WGS84, third order in `n`. Fallback for
/// hosts where PROJ has no usable database.
struct KruegerSeries {
    k0_a: f64,
    e: f64,
    alpha: [f64; 3],
    beta: [f64; 3],
    delta: [f64; 3],
}

fn series() -> &'static KruegerSeries {
    static SERIES: OnceLock<KruegerSeries> = OnceLock::new();
    SERIES.get_or_init(|| {
        let n = WGS84_F / (2.0 - WGS84_F);
        let (n2, n3) = (n * n, n * n * n);
        let a_rect = WGS84_A / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0);
        KruegerSeries {
            k0_a: UTM_K0 * a_rect,
            e: (WGS84_F * (2.0 - WGS84_F)).sqrt(),
            alpha: [
                n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
                13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
                61.0 * n3 / 240.0,
            ],
            beta: [
                n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
                n2 / 48.0 + n3 / 15.0,
                17.0 * n3 / 480.0,
            ],
            delta: [
                2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
                7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
                56.0 * n3 / 15.0,
            ],
        }
    })
}

fn transverse_mercator_forward(coord: Coordinate, zone: UtmZone) -> PlanarPoint {
    let s = series();
    let phi = coord.lat.to_radians();
    let dlambda = (coord.lon - zone.central_meridian()).to_radians();

    let sin_phi = phi.sin();
    let t = (sin_phi.atanh() - s.e * (s.e * sin_phi).atanh()).sinh();
    let xi_p = t.atan2(dlambda.cos());
    let eta_p = (dlambda.sin() / (1.0 + t * t).sqrt()).atanh();

    let (mut x, mut y) = (eta_p, xi_p);
    for (j, alpha) in s.alpha.iter().enumerate() {
        let k = 2.0 * (j + 1) as f64;
        x += alpha * (k * xi_p).cos() * (k * eta_p).sinh();
        y += alpha * (k * xi_p).sin() * (k * eta_p).cosh();
    }

    PlanarPoint {
        x: FALSE_EASTING + s.k0_a * x,
        y: zone.false_northing() + s.k0_a * y,
    }
}

fn transverse_mercator_inverse(point: PlanarPoint, zone: UtmZone) -> Coordinate {
    let s = series();
    let xi = (point.y - zone.false_northing()) / s.k0_a;
    let eta = (point.x - FALSE_EASTING) / s.k0_a;

    let (mut xi_p, mut eta_p) = (xi, eta);
    for (j, beta) in s.beta.iter().enumerate() {
        let k = 2.0 * (j + 1) as f64;
        xi_p -= beta * (k * xi).sin() * (k * eta).cosh();
        eta_p -= beta * (k * xi).cos() * (k * eta).sinh();
    }

    let chi = (xi_p.sin() / eta_p.cosh()).asin();
    let mut phi = chi;
    for (j, delta) in s.delta.iter().enumerate() {
        let k = 2.0 * (j + 1) as f64;
        phi += delta * (k * chi).sin();
    }
    let lambda = eta_p.sinh().atan2(xi_p.cos());

    Coordinate {
        lat: phi.to_degrees(),
        lon: zone.central_meridian() + lambda.to_degrees(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seattle_zone() -> LocalProjection {
        LocalProjection::for_zone(UtmZone::containing(Coordinate {
            lat: 47.6,
            lon: -122.3,
        }))
    }

    #[test]
    fn zone_selection_follows_six_degree_bands() {
        let zone = UtmZone::containing(Coordinate {
            lat: 47.6,
            lon: -122.3,
        });
        assert_eq!(zone, UtmZone { number: 10, north: true });
        assert_eq!(zone.central_meridian(), -123.0);
        assert_eq!(zone.epsg(), 32610);

        let south = UtmZone::containing(Coordinate {
            lat: -33.86,
            lon: 151.21,
        });
        assert_eq!(south.number, 56);
        assert!(!south.north);
        assert_eq!(south.epsg(), 32756);
    }

    #[test]
    fn equator_on_central_meridian_maps_to_false_origin() {
        let zone = UtmZone { number: 31, north: true };
        let p = transverse_mercator_forward(Coordinate { lat: 0.0, lon: 3.0 }, zone);
        assert!((p.x - 500_000.0).abs() < 1e-6);
        assert!(p.y.abs() < 1e-6);
    }

    #[test]
    fn one_degree_of_meridian_arc_is_scaled_by_k0() {
        let zone = UtmZone { number: 31, north: true };
        let p = transverse_mercator_forward(Coordinate { lat: 1.0, lon: 3.0 }, zone);
        assert!((p.y - 110_530.16).abs() < 0.5, "northing was {}", p.y);
    }

    #[test]
    fn known_utm_position_of_seattle() {
        let p = seattle_zone()
            .project(Coordinate {
                lat: 47.6062,
                lon: -122.3321,
            })
            .expect("inside zone");
        assert!((p.x - 550_200.2).abs() < 1.0, "easting was {}", p.x);
        assert!((p.y - 5_272_748.6).abs() < 1.0, "northing was {}", p.y);
    }

    #[test]
    fn proj_transform_is_built_for_utm_zones() {
        let zone = UtmZone {
            number: 10,
            north: true,
        };
        let pair = ProjPair::new(zone).expect("EPSG:32610 transformation");
        let p = pair
            .forward(Coordinate {
                lat: 47.6062,
                lon: -122.3321,
            })
            .expect("forward");
        assert!((p.x - 550_200.2).abs() < 1.0, "easting was {}", p.x);
        assert!((p.y - 5_272_748.6).abs() < 1.0, "northing was {}", p.y);
        assert!(LocalProjection::for_zone(zone).uses_proj());
    }

    #[test]
    fn proj_and_series_agree_inside_a_zone() {
        let zone = UtmZone::containing(Coordinate {
            lat: -33.86,
            lon: 151.21,
        });
        let pair = ProjPair::new(zone).expect("EPSG:32756 transformation");
        for (lat, lon) in [(-33.86, 151.21), (-34.5, 149.1), (-31.0, 155.9)] {
            let coord = Coordinate { lat, lon };
            let by_proj = pair.forward(coord).expect("forward");
            let by_series = transverse_mercator_forward(coord, zone);
            assert!(by_proj.distance(by_series) < 1e-2, "{coord:?} differs");
        }
    }

    #[test]
    fn points_a_quarter_turn_off_the_meridian_are_rejected() {
        let projection = LocalProjection::for_zone(UtmZone {
            number: 31,
            north: true,
        });
        assert!(projection
            .project(Coordinate { lat: 0.0, lon: 93.0 })
            .is_none());
        assert!(projection
            .project(Coordinate {
                lat: 0.0,
                lon: -87.0
            })
            .is_none());
    }

    #[test]
    fn series_blows_up_a_quarter_turn_off_the_meridian() {
        let zone = UtmZone {
            number: 31,
            north: true,
        };
        let p = transverse_mercator_forward(Coordinate { lat: 0.0, lon: 93.0 }, zone);
        assert!(!p.x.is_finite() || !p.y.is_finite());
    }

    #[test]
    fn round_trip_stays_below_a_millimeter() {
        let projection = seattle_zone();
        let original = Coordinate {
            lat: 47.6062,
            lon: -122.3321,
        };
        let back = projection
            .unproject(projection.project(original).expect("forward"))
            .expect("inverse");
        assert!((back.lat - original.lat).abs() < 1e-7);
        assert!((back.lon - original.lon).abs() < 1e-7);
    }

    #[test]
    fn series_round_trip_stays_below_a_millimeter() {
        let zone = UtmZone::containing(Coordinate {
            lat: 47.6,
            lon: -122.3,
        });
        let original = Coordinate {
            lat: 47.6062,
            lon: -122.3321,
        };
        let back = transverse_mercator_inverse(transverse_mercator_forward(original, zone), zone);
        assert!((back.lat - original.lat).abs() < 1e-7);
        assert!((back.lon - original.lon).abs() < 1e-7);
    }

    #[test]
    fn southern_hemisphere_round_trip() {
        let projection = LocalProjection::for_path(&[
            Coordinate {
                lat: -33.86,
                lon: 151.21,
            },
            Coordinate {
                lat: -33.87,
                lon: 151.20,
            },
        ])
        .expect("projection");
        let original = Coordinate {
            lat: -33.86,
            lon: 151.21,
        };
        let p = projection.project(original).expect("forward");
        assert!(p.y > 6_000_000.0);
        let back = projection.unproject(p).expect("inverse");
        assert!((back.lat - original.lat).abs() < 1e-7);
        assert!((back.lon - original.lon).abs() < 1e-7);
    }

    #[test]
    fn planar_distance_is_close_to_great_circle() {
        let projection = seattle_zone();
        let a = Coordinate {
            lat: 47.60,
            lon: -122.33,
        };
        let b = Coordinate {
            lat: 47.61,
            lon: -122.32,
        };
        let planar = projection
            .project(a)
            .zip(projection.project(b))
            .map(|(a, b)| a.distance(b))
            .expect("both inside zone");
        // ~1341 m on the sphere; UTM scale error stays within 0.1 %
        assert!((planar - 1341.1).abs() < 1.5, "planar distance was {planar}");
    }

    #[test]
    fn empty_path_has_no_projection() {
        assert!(LocalProjection::for_path(&[]).is_none());
    }
}
