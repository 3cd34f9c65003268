use std::{
    ffi::OsStr,
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    dem::{DemLoadError, DemStack},
    models::SelectionParams,
    resample::{MIN_STEP_M, TEN_FEET_M},
    selection::validate_params,
};

/// Colon-separated list of DEM files.
pub const DEM_PATH_ENV: &str = "LOCAL_DEM_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Cadence candidate routes are resampled at.
    pub resample_step_m: f64,
    /// Cadence graph edges are profiled at.
    pub edge_step_m: f64,
    pub selection: SelectionParams,
    /// `.asc` and `.hgt` files, searched in order.
    pub dem_paths: Vec<PathBuf>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            resample_step_m: TEN_FEET_M,
            edge_step_m: 5.0,
            selection: SelectionParams::default(),
            dem_paths: Vec::new(),
        }
    }
}

impl ScoringConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Defaults, overlaid by the optional JSON file, overlaid by the
    /// environment. Command-line overrides are applied by the caller.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        if let Some(value) = std::env::var_os(DEM_PATH_ENV) {
            config.apply_dem_path_list(&value);
        }
        Ok(config)
    }

    /// Replace `dem_paths` with the entries of a platform path list.
    pub fn apply_dem_path_list(&mut self, value: &OsStr) {
        let paths: Vec<PathBuf> = std::env::split_paths(value)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        if !paths.is_empty() {
            self.dem_paths = paths;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (label, value) in [
            ("resample_step_m", self.resample_step_m),
            ("edge_step_m", self.edge_step_m),
        ] {
            if !value.is_finite() || value < MIN_STEP_M {
                return Err(ConfigError::Invalid(format!(
                    "{label} must be at least {MIN_STEP_M} m, got {value}"
                )));
            }
        }
        validate_params(&self.selection).map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    pub fn open_dem(&self) -> Result<DemStack, DemLoadError> {
        DemStack::open(&self.dem_paths)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_route_scorer() {
        let config = ScoringConfig::default();
        assert_eq!(config.resample_step_m, 3.048);
        assert_eq!(config.edge_step_m, 5.0);
        assert_eq!(config.selection.tau, 0.15);
        assert!(config.dem_paths.is_empty());
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().expect("tempfile");
        write!(tmp, r#"{{"edge_step_m": 10.0, "selection": {{"tau": 0.3}}}}"#).expect("write");

        let config = ScoringConfig::from_path(tmp.path()).expect("config");
        assert_eq!(config.edge_step_m, 10.0);
        assert_eq!(config.resample_step_m, 3.048);
        assert_eq!(config.selection.tau, 0.3);
        assert_eq!(config.selection.weight_distance, 0.4);
    }

    #[test]
    fn missing_and_malformed_files_are_errors() {
        assert!(matches!(
            ScoringConfig::from_path("/nonexistent/config.json"),
            Err(ConfigError::Io { .. })
        ));

        let mut tmp = tempfile::NamedTempFile::new().expect("tempfile");
        write!(tmp, "{{ not json").expect("write");
        assert!(matches!(
            ScoringConfig::from_path(tmp.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn dem_path_list_replaces_configured_paths() {
        let mut config = ScoringConfig {
            dem_paths: vec![PathBuf::from("old.asc")],
            ..ScoringConfig::default()
        };
        config.apply_dem_path_list(OsStr::new("/data/a.hgt:/data/b.asc"));
        assert_eq!(
            config.dem_paths,
            vec![PathBuf::from("/data/a.hgt"), PathBuf::from("/data/b.asc")]
        );

        config.apply_dem_path_list(OsStr::new(""));
        assert_eq!(config.dem_paths.len(), 2);
    }

    #[test]
    fn validation_rejects_bad_steps_and_weights() {
        let zero_step = ScoringConfig {
            resample_step_m: 0.0,
            ..ScoringConfig::default()
        };
        assert!(matches!(zero_step.validate(), Err(ConfigError::Invalid(_))));

        let microscopic_step = ScoringConfig {
            edge_step_m: 1e-9,
            ..ScoringConfig::default()
        };
        assert!(matches!(
            microscopic_step.validate(),
            Err(ConfigError::Invalid(_))
        ));

        let mut negative_weight = ScoringConfig::default();
        negative_weight.selection.weight_gain = -0.5;
        assert!(matches!(
            negative_weight.validate(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn empty_dem_list_cannot_be_opened() {
        assert!(matches!(
            ScoringConfig::default().open_dem(),
            Err(DemLoadError::NoSources)
        ));
    }
}
