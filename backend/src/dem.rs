use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::elevation::ElevationSource;

const SRTM_VOID: i16 = -32768;

#[derive(Debug, Error)]
pub enum DemLoadError {
    #[error("failed to open DEM file {path:?}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("DEM file missing header field `{0}`")]
    MissingHeader(&'static str),
    #[error("DEM file has invalid numeric header for `{field}`: {source}")]
    InvalidHeader {
        field: &'static str,
        #[source]
        source: std::num::ParseFloatError,
    },
    #[error("DEM file has invalid integer header for `{field}`: {source}")]
    InvalidHeaderInt {
        field: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("DEM cell #{index} is not a number: {source}")]
    InvalidCell {
        index: usize,
        #[source]
        source: std::num::ParseFloatError,
    },
    #[error("DEM grid has {expected} cells but file provided {actual}")]
    UnexpectedCellCount { expected: usize, actual: usize },
    #[error("DEM grid must have positive dimensions and cell size")]
    EmptyGrid,
    #[error("cannot infer tile origin from SRTM file name {0:?}")]
    InvalidTileName(PathBuf),
    #[error("SRTM tile {path:?} has {len} bytes, expected a 1201² or 3601² grid")]
    InvalidTileSize { path: PathBuf, len: usize },
    #[error("unsupported elevation file format {0:?} (expected .asc or .hgt)")]
    UnsupportedFormat(PathBuf),
    #[error("no elevation sources were configured")]
    NoSources,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> DemLoadError + '_ {
    move |source| DemLoadError::Io {
        source,
        path: path.into(),
    }
}

/// ESRI ArcInfo ASCII grid in geographic degrees.
#[derive(Debug)]
pub struct ArcAsciiDem {
    ncols: usize,
    nrows: usize,
    /// Center of the south-west cell.
    lon_min: f64,
    lat_min: f64,
    cellsize: f64,
    nodata: f64,
    lat_max: f64,
    lon_max: f64,
    values: Vec<f64>,
}

impl ArcAsciiDem {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DemLoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(io_error(path))?;
        let dem = Self::from_reader(BufReader::new(file), path)?;
        tracing::info!(
            "Loaded {}x{} DEM grid from {}",
            dem.ncols,
            dem.nrows,
            path.display()
        );
        Ok(dem)
    }

    pub fn from_reader(mut reader: impl BufRead, path: &Path) -> Result<Self, DemLoadError> {
        let mut header_buf = String::new();

        let mut ncols: Option<usize> = None;
        let mut nrows: Option<usize> = None;
        let mut xll = None;
        let mut yll = None;
        let mut corner_registered = true;
        let mut cellsize = None;
        let mut nodata = None;

        for _ in 0..6 {
            header_buf.clear();
            if reader.read_line(&mut header_buf).map_err(io_error(path))? == 0 {
                break;
            }
            let mut parts = header_buf.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };

            match key.to_lowercase().as_str() {
                "ncols" => ncols = Some(parse_int("ncols", value)?),
                "nrows" => nrows = Some(parse_int("nrows", value)?),
                "xllcorner" => xll = Some(parse_float("xllcorner", value)?),
                "xllcenter" => {
                    xll = Some(parse_float("xllcenter", value)?);
                    corner_registered = false;
                }
                "yllcorner" => yll = Some(parse_float("yllcorner", value)?),
                "yllcenter" => {
                    yll = Some(parse_float("yllcenter", value)?);
                    corner_registered = false;
                }
                "cellsize" => cellsize = Some(parse_float("cellsize", value)?),
                "nodata_value" => nodata = Some(parse_float("nodata_value", value)?),
                _ => {}
            };
        }

        let ncols = ncols.ok_or(DemLoadError::MissingHeader("ncols"))?;
        let nrows = nrows.ok_or(DemLoadError::MissingHeader("nrows"))?;
        let xll = xll.ok_or(DemLoadError::MissingHeader("xllcorner"))?;
        let yll = yll.ok_or(DemLoadError::MissingHeader("yllcorner"))?;
        let cellsize = cellsize.ok_or(DemLoadError::MissingHeader("cellsize"))?;
        let nodata = nodata.unwrap_or(-9999.0);
        if ncols == 0 || nrows == 0 || cellsize.is_nan() || cellsize <= 0.0 {
            return Err(DemLoadError::EmptyGrid);
        }

        let half = if corner_registered { cellsize / 2.0 } else { 0.0 };
        let lon_min = xll + half;
        let lat_min = yll + half;
        let lat_max = lat_min + cellsize * ((nrows - 1) as f64);
        let lon_max = lon_min + cellsize * ((ncols - 1) as f64);

        let mut values = Vec::with_capacity(ncols * nrows);
        for line in reader.lines() {
            let line = line.map_err(io_error(path))?;
            for token in line.split_whitespace() {
                let value = token
                    .parse::<f64>()
                    .map_err(|source| DemLoadError::InvalidCell {
                        index: values.len(),
                        source,
                    })?;
                values.push(value);
            }
        }

        let expected = ncols * nrows;
        if values.len() != expected {
            return Err(DemLoadError::UnexpectedCellCount {
                expected,
                actual: values.len(),
            });
        }

        Ok(Self {
            ncols,
            nrows,
            lon_min,
            lat_min,
            cellsize,
            nodata,
            lat_max,
            lon_max,
            values,
        })
    }

    /// Bilinear sample, falling back to the mean of the valid corners when
    /// some of them are NODATA.
    pub fn sample(&self, lat: f64, lon: f64) -> Option<f64> {
        if lon < self.lon_min || lon > self.lon_max || lat < self.lat_min || lat > self.lat_max {
            return None;
        }
        let col = ((lon - self.lon_min) / self.cellsize).clamp(0.0, (self.ncols - 1) as f64);
        let row = ((self.lat_max - lat) / self.cellsize).clamp(0.0, (self.nrows - 1) as f64);

        let x0 = col.floor() as usize;
        let y0 = row.floor() as usize;
        let x1 = (x0 + 1).min(self.ncols - 1);
        let y1 = (y0 + 1).min(self.nrows - 1);

        let q11 = self.value(y0, x0);
        let q21 = self.value(y0, x1);
        let q12 = self.value(y1, x0);
        let q22 = self.value(y1, x1);

        let tx = col - x0 as f64;
        let ty = row - y0 as f64;

        match (q11, q21, q12, q22) {
            (Some(a), Some(b), Some(c), Some(d)) => {
                let top = a * (1.0 - tx) + b * tx;
                let bottom = c * (1.0 - tx) + d * tx;
                Some(top * (1.0 - ty) + bottom * ty)
            }
            _ => {
                let valid: Vec<f64> = [q11, q21, q12, q22].into_iter().flatten().collect();
                if valid.is_empty() {
                    None
                } else {
                    Some(valid.iter().sum::<f64>() / valid.len() as f64)
                }
            }
        }
    }

    fn value(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.nrows || col >= self.ncols {
            return None;
        }
        let value = self.values.get(row * self.ncols + col).copied()?;
        if (value - self.nodata).abs() < f64::EPSILON {
            None
        } else {
            Some(value)
        }
    }
}

impl ElevationSource for ArcAsciiDem {
    fn elevation_at(&self, lat: f64, lon: f64) -> Option<f64> {
        self.sample(lat, lon)
    }
}

fn parse_int(field: &'static str, value: &str) -> Result<usize, DemLoadError> {
    value
        .parse()
        .map_err(|source| DemLoadError::InvalidHeaderInt { field, source })
}

fn parse_float(field: &'static str, value: &str) -> Result<f64, DemLoadError> {
    value
        .parse()
        .map_err(|source| DemLoadError::InvalidHeader { field, source })
}

/// One SRTM `.hgt` tile (1°×1°, big-endian i16 samples, north row first).
#[derive(Debug)]
pub struct SrtmTile {
    /// South-west corner of the tile.
    lat0: f64,
    lon0: f64,
    size: usize,
    samples: Vec<i16>,
}

impl SrtmTile {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DemLoadError> {
        let path = path.as_ref();
        let (lat0, lon0) = parse_tile_origin(path)
            .ok_or_else(|| DemLoadError::InvalidTileName(path.into()))?;
        let bytes = std::fs::read(path).map_err(io_error(path))?;
        let tile = Self::from_bytes(lat0, lon0, &bytes)
            .ok_or_else(|| DemLoadError::InvalidTileSize {
                path: path.into(),
                len: bytes.len(),
            })?;
        tracing::info!("Loaded SRTM tile {} ({}²)", path.display(), tile.size);
        Ok(tile)
    }

    /// Build a tile from raw `.hgt` bytes; `None` if the length is not a
    /// known SRTM grid.
    pub fn from_bytes(lat0: f64, lon0: f64, bytes: &[u8]) -> Option<Self> {
        let size = match bytes.len() {
            len if len == 2 * 1201 * 1201 => 1201,
            len if len == 2 * 3601 * 3601 => 3601,
            _ => return None,
        };
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        Some(Self {
            lat0,
            lon0,
            size,
            samples,
        })
    }

    pub fn sample(&self, lat: f64, lon: f64) -> Option<f64> {
        if lat < self.lat0 || lat > self.lat0 + 1.0 || lon < self.lon0 || lon > self.lon0 + 1.0 {
            return None;
        }
        let last = (self.size - 1) as f64;
        let row = ((self.lat0 + 1.0 - lat) * last).round().clamp(0.0, last) as usize;
        let col = ((lon - self.lon0) * last).round().clamp(0.0, last) as usize;
        match self.samples.get(row * self.size + col).copied()? {
            SRTM_VOID => None,
            value => Some(f64::from(value)),
        }
    }
}

impl ElevationSource for SrtmTile {
    fn elevation_at(&self, lat: f64, lon: f64) -> Option<f64> {
        self.sample(lat, lon)
    }
}

/// `N47W122.hgt` -> (47, -122)
fn parse_tile_origin(path: &Path) -> Option<(f64, f64)> {
    let stem = path.file_stem()?.to_str()?.to_ascii_uppercase();
    let lat_sign = match stem.get(0..1)? {
        "N" => 1.0,
        "S" => -1.0,
        _ => return None,
    };
    let lat: f64 = stem.get(1..3)?.parse().ok()?;
    let lon_sign = match stem.get(3..4)? {
        "E" => 1.0,
        "W" => -1.0,
        _ => return None,
    };
    let lon: f64 = stem.get(4..7)?.parse().ok()?;
    Some((lat_sign * lat, lon_sign * lon))
}

/// Ordered set of elevation sources; the first one with data wins.
pub struct DemStack {
    sources: Vec<Box<dyn ElevationSource>>,
}

impl DemStack {
    pub fn new(sources: Vec<Box<dyn ElevationSource>>) -> Result<Self, DemLoadError> {
        if sources.is_empty() {
            return Err(DemLoadError::NoSources);
        }
        Ok(Self { sources })
    }

    /// Open every file, choosing the reader from the extension.
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self, DemLoadError> {
        let sources = paths
            .iter()
            .map(|path| open_source(path.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!("loaded {} elevation sources", sources.len());
        Self::new(sources)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl ElevationSource for DemStack {
    fn elevation_at(&self, lat: f64, lon: f64) -> Option<f64> {
        self.sources
            .iter()
            .find_map(|source| source.elevation_at(lat, lon))
    }
}

fn open_source(path: &Path) -> Result<Box<dyn ElevationSource>, DemLoadError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("asc") => Ok(Box::new(ArcAsciiDem::from_path(path)?)),
        Some("hgt") => Ok(Box::new(SrtmTile::from_path(path)?)),
        _ => Err(DemLoadError::UnsupportedFormat(path.into())),
    }
}
