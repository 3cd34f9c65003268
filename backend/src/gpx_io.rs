use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::{Path, PathBuf},
};

use geo_types::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};
use thiserror::Error;

use crate::models::{CandidateRoute, Coordinate};

#[derive(Debug, Error)]
pub enum GpxIoError {
    #[error("failed to open GPX file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
}

/// Every track (segments joined) and every route in the document becomes
/// one candidate. Unnamed entries are called `<stem>_<n>`.
pub fn read_candidates(reader: impl Read, stem: &str) -> Result<Vec<CandidateRoute>, GpxIoError> {
    let document = gpx::read(reader)?;

    let tracks = document.tracks.iter().map(|track| {
        let points = track
            .segments
            .iter()
            .flat_map(|segment| segment.points.iter());
        (track.name.clone(), to_pairs(points))
    });
    let routes = document
        .routes
        .iter()
        .map(|route| (route.name.clone(), to_pairs(route.points.iter())));

    Ok(tracks
        .chain(routes)
        .enumerate()
        .map(|(idx, (name, coordinates))| CandidateRoute {
            name: Some(name.unwrap_or_else(|| format!("{stem}_{}", idx + 1))),
            coordinates,
        })
        .collect())
}

pub fn candidates_from_path(path: impl AsRef<Path>) -> Result<Vec<CandidateRoute>, GpxIoError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| GpxIoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("track");
    read_candidates(BufReader::new(file), stem)
}

/// Single-track GPX 1.1 document for `path`.
pub fn encode_path_as_gpx(name: &str, path: &[Coordinate]) -> Result<String, GpxIoError> {
    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some("rise_over_run".into()),
        ..Default::default()
    };
    let mut track = Track {
        name: Some(name.into()),
        ..Default::default()
    };

    let mut segment = TrackSegment::new();
    segment.points.extend(path.iter().map(to_waypoint));
    track.segments.push(segment);
    gpx.tracks.push(track);

    let mut buffer = Vec::new();
    gpx::write(&gpx, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn to_pairs<'a>(points: impl Iterator<Item = &'a Waypoint>) -> Vec<[f64; 2]> {
    points
        .map(|waypoint| {
            let point = waypoint.point();
            [point.x(), point.y()]
        })
        .collect()
}

fn to_waypoint(coord: &Coordinate) -> Waypoint {
    Waypoint::new(Point::new(coord.lon, coord.lat))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_TRACKS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>waterfront</name>
    <trkseg>
      <trkpt lat="47.6000" lon="-122.3400"></trkpt>
      <trkpt lat="47.6010" lon="-122.3400"></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="47.6020" lon="-122.3390"></trkpt>
    </trkseg>
  </trk>
  <trk>
    <trkseg>
      <trkpt lat="47.6000" lon="-122.3300"></trkpt>
      <trkpt lat="47.6020" lon="-122.3300"></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    #[test]
    fn each_track_is_one_candidate() {
        let candidates = read_candidates(TWO_TRACKS.as_bytes(), "walks").expect("gpx");
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name.as_deref(), Some("waterfront"));
        assert_eq!(candidates[0].coordinates.len(), 3);
        assert_eq!(candidates[0].coordinates[2], [-122.339, 47.602]);
        assert_eq!(candidates[1].name.as_deref(), Some("walks_2"));
    }

    #[test]
    fn encoded_path_reads_back_as_a_candidate() {
        let path = vec![
            Coordinate {
                lat: 47.6,
                lon: -122.33,
            },
            Coordinate {
                lat: 47.601,
                lon: -122.331,
            },
        ];
        let xml = encode_path_as_gpx("flattest", &path).expect("encode");
        assert!(xml.contains("rise_over_run"));

        let candidates = read_candidates(xml.as_bytes(), "x").expect("decode");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name.as_deref(), Some("flattest"));
        assert_eq!(candidates[0].to_coordinates(), path);
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(matches!(
            read_candidates("<gpx".as_bytes(), "x"),
            Err(GpxIoError::Gpx(_))
        ));
        assert!(matches!(
            candidates_from_path("/nonexistent/walk.gpx"),
            Err(GpxIoError::Io { .. })
        ));
    }
}
