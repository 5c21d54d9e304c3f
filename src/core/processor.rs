use crate::core::rainfall::ZRelation;
use crate::core::scan_cleaner::{CleaningParams, ScanCleaner};
use crate::io::geometry::RadarGeometry;
use crate::io::odim::ScanReader;
use crate::io::raster::{rainfall_path, scan_timestamp, write_npy_atomic};
use crate::types::{RadarError, RadarResult, AZIMUTH_RAYS};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// Result of processing one scan file
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// A new rainfall raster was written
    Written { timestamp: NaiveDateTime, path: PathBuf },
    /// The raster for this timestamp was already on disk
    AlreadyProcessed { timestamp: NaiveDateTime, path: PathBuf },
    /// The lowest sweep does not have the expected shape; skipped
    NonConforming { expected: (usize, usize), found: (usize, usize) },
}

/// Turns one raw scan file into one rainfall-intensity raster
pub struct ScanProcessor<'a, R: ScanReader> {
    reader: &'a R,
    cleaner: ScanCleaner,
    relation: ZRelation,
    expected_shape: (usize, usize),
    output_dir: PathBuf,
}

impl<'a, R: ScanReader> ScanProcessor<'a, R> {
    pub fn new(
        reader: &'a R,
        cleaning: CleaningParams,
        relation: ZRelation,
        range_bins: usize,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            reader,
            cleaner: ScanCleaner::with_params(cleaning),
            relation,
            expected_shape: (AZIMUTH_RAYS, range_bins),
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Process a single scan file.
    ///
    /// Re-running on the same input is a no-op: an existing output is
    /// detected from its timestamped name before the scan is even opened.
    pub fn process(&self, scan_file: &Path) -> RadarResult<ProcessOutcome> {
        let timestamp = scan_timestamp(scan_file)?;
        let output = rainfall_path(&self.output_dir, timestamp);

        if output.exists() {
            log::info!("Skipping existing file: {}", output.display());
            return Ok(ProcessOutcome::AlreadyProcessed { timestamp, path: output });
        }

        let volume = self.reader.read_volume(scan_file)?;
        let sweep = volume.lowest_sweep().ok_or_else(|| {
            RadarError::InvalidFormat(format!("{} has no sweeps", scan_file.display()))
        })?;

        if sweep.shape() != self.expected_shape {
            log::warn!(
                "Skipping {}: sweep shape {:?}, expected {:?}",
                scan_file.display(),
                sweep.shape(),
                self.expected_shape
            );
            return Ok(ProcessOutcome::NonConforming {
                expected: self.expected_shape,
                found: sweep.shape(),
            });
        }

        let cleaned = self.cleaner.clean(&sweep.reflectivity)?;
        let rainfall = self.relation.convert(&cleaned);
        write_npy_atomic(&output, &rainfall)?;
        log::info!("Saved: {}", output.display());

        RadarGeometry::from_sweep(sweep, volume.site).persist_once(&self.output_dir)?;

        Ok(ProcessOutcome::Written { timestamp, path: output })
    }
}
