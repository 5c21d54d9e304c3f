//! Pipeline configuration.
//!
//! Every section has defaults matching the operational settings, so an empty
//! TOML file is a valid configuration.

use crate::core::rainfall::ZRelation;
use crate::core::scan_cleaner::CleaningParams;
use crate::types::{RadarError, RadarResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sub-directory of the output root holding per-scan intensities
pub const INTENSITY_DIR: &str = "rainfall_intensities";
/// Sub-directory of the output root holding accumulated products
pub const ACCUMULATION_DIR: &str = "accumulated_rainfall";

/// Worker pool and input selection for batch processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchParams {
    /// Worker threads; `None` means available parallelism minus one
    pub workers: Option<usize>,
    /// Range bins a conforming sweep must have (rays are always 360)
    pub range_bins: usize,
    /// File extension of raw scan files
    pub input_extension: String,
}

impl Default for BatchParams {
    fn default() -> Self {
        Self {
            workers: None,
            range_bins: 833,
            input_extension: "h5".to_string(),
        }
    }
}

impl BatchParams {
    /// Effective worker count, never below one
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(default_workers).max(1)
    }
}

/// Available parallelism minus one, leaving a core for the caller
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Accumulation windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccumulationParams {
    /// Window lengths in hours
    pub windows_hours: Vec<u32>,
    /// Assumed spacing of the instantaneous rasters, minutes
    pub cadence_minutes: u32,
}

impl Default for AccumulationParams {
    fn default() -> Self {
        Self {
            windows_hours: vec![1],
            cadence_minutes: 5,
        }
    }
}

impl AccumulationParams {
    /// Frames summed into one window of `hours`
    pub fn frames_per_window(&self, hours: u32) -> RadarResult<usize> {
        hours
            .checked_mul(60)
            .and_then(|minutes| minutes.checked_div(self.cadence_minutes))
            .map(|frames| frames as usize)
            .ok_or_else(|| {
                RadarError::Config(format!(
                    "Cannot form a {}h window at a {} minute cadence",
                    hours, self.cadence_minutes
                ))
            })
    }
}

/// Input and output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathParams {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for PathParams {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data/radar_unzipped"),
            output_dir: PathBuf::from("data/radar_rainfall"),
        }
    }
}

impl PathParams {
    pub fn intensity_dir(&self) -> PathBuf {
        self.output_dir.join(INTENSITY_DIR)
    }

    pub fn accumulation_dir(&self) -> PathBuf {
        self.output_dir.join(ACCUMULATION_DIR)
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub cleaning: CleaningParams,
    pub conversion: ZRelation,
    pub batch: BatchParams,
    pub accumulation: AccumulationParams,
    pub paths: PathParams,
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> RadarResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| RadarError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> RadarResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> RadarResult<String> {
        toml::to_string_pretty(self).map_err(|e| RadarError::Config(e.to_string()))
    }

    pub fn validate(&self) -> RadarResult<()> {
        self.cleaning
            .validate()
            .map_err(|e| RadarError::Config(e.to_string()))?;

        if !(self.conversion.a > 0.0) || !(self.conversion.b > 0.0) {
            return Err(RadarError::Config(format!(
                "Z-R coefficients must be positive, got a={} b={}",
                self.conversion.a, self.conversion.b
            )));
        }
        if self.batch.range_bins == 0 {
            return Err(RadarError::Config("range_bins must be positive".to_string()));
        }
        if self.batch.workers == Some(0) {
            return Err(RadarError::Config("workers must be at least 1".to_string()));
        }

        let cadence = self.accumulation.cadence_minutes;
        if cadence == 0 || 60 % cadence != 0 {
            return Err(RadarError::Config(format!(
                "cadence_minutes must divide an hour, got {}",
                cadence
            )));
        }
        if self.accumulation.windows_hours.iter().any(|&h| h == 0) {
            return Err(RadarError::Config("accumulation windows must be at least 1 hour".to_string()));
        }
        for &hours in &self.accumulation.windows_hours {
            self.accumulation.frames_per_window(hours)?;
        }
        Ok(())
    }
}
