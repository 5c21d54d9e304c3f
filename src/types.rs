use chrono::NaiveDateTime;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Reflectivity sample in dBZ, or rainfall in mm/h (mm when accumulated)
pub type RadarReal = f32;

/// 2D polar grid (azimuth x range)
pub type PolarImage = Array2<RadarReal>;

/// Reflectivity grid in dBZ
pub type ReflectivityImage = PolarImage;

/// Rainfall grid in mm/h (instantaneous) or mm (accumulated)
pub type RainfallImage = PolarImage;

/// "No data" marker used in every grid. Distinct from a true zero reading.
pub const NO_DATA: RadarReal = RadarReal::NAN;

/// Number of azimuth rays in a conforming sweep
pub const AZIMUTH_RAYS: usize = 360;

/// Radar site location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadarSite {
    pub latitude: f64,  // degrees
    pub longitude: f64, // degrees
    pub altitude: f64,  // metres above sea level
}

/// One elevation pass of a volume scan
#[derive(Debug, Clone)]
pub struct PolarSweep {
    /// Elevation angle in degrees
    pub elevation: f64,
    /// Reflectivity field (rays x bins), NaN where no echo was recorded
    pub reflectivity: ReflectivityImage,
    /// Range-bin centres in metres
    pub ranges: Array1<f64>,
    /// Ray centres in degrees clockwise from north
    pub azimuths: Array1<f64>,
}

impl PolarSweep {
    /// Grid dimensions as (rays, bins)
    pub fn shape(&self) -> (usize, usize) {
        self.reflectivity.dim()
    }
}

/// A full polar volume as read from one scan file
#[derive(Debug, Clone)]
pub struct PolarVolume {
    pub site: RadarSite,
    pub sweeps: Vec<PolarSweep>,
}

impl PolarVolume {
    /// The sweep with the smallest elevation angle
    pub fn lowest_sweep(&self) -> Option<&PolarSweep> {
        self.sweeps
            .iter()
            .min_by(|a, b| a.elevation.total_cmp(&b.elevation))
    }
}

/// An accumulated product: sum of instantaneous rasters ending at `end`
#[derive(Debug, Clone)]
pub struct AccumulatedRaster {
    pub window_hours: u32,
    pub end: NaiveDateTime,
    pub frame_count: usize,
    pub data: RainfallImage,
}

/// Error types for radar processing
#[derive(Debug, thiserror::Error)]
pub enum RadarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input could not be parsed as a radar product
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Cannot derive timestamp from '{0}'")]
    Timestamp(String),

    #[error("Insufficient history for anchor {anchor}: {available} of {required} frames")]
    InsufficientHistory {
        anchor: NaiveDateTime,
        available: usize,
        required: usize,
    },

    #[error("Failed to read constituent frame {path}: {reason}")]
    ConstituentRead { path: PathBuf, reason: String },

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("NPY error: {0}")]
    Npy(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

impl RadarError {
    /// Whether the failure is local to one file or anchor and the run may continue
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            RadarError::Io(_)
                | RadarError::Processing(_)
                | RadarError::Config(_)
                | RadarError::Npy(_)
        )
    }
}

impl From<ndarray_npy::ReadNpyError> for RadarError {
    fn from(e: ndarray_npy::ReadNpyError) -> Self {
        RadarError::Npy(e.to_string())
    }
}

impl From<ndarray_npy::WriteNpyError> for RadarError {
    fn from(e: ndarray_npy::WriteNpyError) -> Self {
        RadarError::Npy(e.to_string())
    }
}

/// Result type for radar operations
pub type RadarResult<T> = Result<T, RadarError>;
