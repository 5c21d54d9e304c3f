//! Shared fixtures for integration tests.
//!
//! Scan files are small text files instead of ODIM_H5 volumes: the first
//! token is a uniform reflectivity in dBZ, an optional second token
//! overrides the number of rays. Anything unparseable is rejected the way
//! a corrupt HDF5 file would be.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use ndarray::{Array1, Array2};
use radar_rainfall::config::BatchParams;
use radar_rainfall::io::raster::TIMESTAMP_FORMAT;
use radar_rainfall::io::ScanReader;
use radar_rainfall::types::{PolarSweep, PolarVolume, RadarError, RadarResult, RadarSite, AZIMUTH_RAYS};
use std::path::{Path, PathBuf};

pub const RANGE_BINS: usize = 40;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct TextScanReader;

impl TextScanReader {
    fn sweep(elevation: f64, dbz: f32, rays: usize) -> PolarSweep {
        PolarSweep {
            elevation,
            reflectivity: Array2::from_elem((rays, RANGE_BINS), dbz),
            ranges: Array1::from_shape_fn(RANGE_BINS, |i| 250.0 * (i as f64 + 0.5)),
            azimuths: Array1::from_shape_fn(rays, |i| i as f64 + 0.5),
        }
    }
}

impl ScanReader for TextScanReader {
    fn read_volume(&self, path: &Path) -> RadarResult<PolarVolume> {
        let text = std::fs::read_to_string(path)?;
        let mut tokens = text.split_whitespace();
        let invalid = || RadarError::InvalidFormat(format!("unreadable fixture {}", path.display()));

        let dbz: f32 = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(invalid)?;
        let rays = match tokens.next() {
            Some(t) => t.parse().map_err(|_| invalid())?,
            None => AZIMUTH_RAYS,
        };

        // the higher sweep is listed first so selection must go by angle
        Ok(PolarVolume {
            site: RadarSite { latitude: 58.4823, longitude: 25.5187, altitude: 157.0 },
            sweeps: vec![Self::sweep(1.5, 60.0, rays), Self::sweep(0.5, dbz, rays)],
        })
    }
}

pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 11, 9).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

pub fn scan_name(timestamp: NaiveDateTime) -> String {
    format!("HAR.{}.h5", timestamp.format(TIMESTAMP_FORMAT))
}

/// Write `count` scans five minutes apart starting at `start`
pub fn write_scans(dir: &Path, start: NaiveDateTime, count: usize, content: &str) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let path = dir.join(scan_name(start + Duration::minutes(5 * i as i64)));
            std::fs::write(&path, content).expect("Failed to write fixture scan");
            path
        })
        .collect()
}

pub fn batch_params(workers: usize) -> BatchParams {
    BatchParams {
        workers: Some(workers),
        range_bins: RANGE_BINS,
        ..Default::default()
    }
}
