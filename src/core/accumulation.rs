use crate::config::AccumulationParams;
use crate::io::raster::{list_rainfall_rasters, rainfall_path, read_raster, write_npy_atomic};
use crate::types::{AccumulatedRaster, RadarError, RadarResult, RainfallImage};
use chrono::{NaiveDateTime, Timelike};
use std::path::{Path, PathBuf};

/// One instantaneous raster on disk
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub timestamp: NaiveDateTime,
    pub path: PathBuf,
}

/// Summary of one accumulation run
#[derive(Debug, Default)]
pub struct AccumulationReport {
    pub written: Vec<PathBuf>,
    /// Anchors skipped for lack of preceding frames
    pub insufficient_history: usize,
    /// Anchors abandoned because a constituent frame could not be read
    pub failed: Vec<(NaiveDateTime, String)>,
}

/// Sums instantaneous rainfall rasters into fixed windows ending on full hours.
///
/// The window for an anchor at position `i` is frames `i - N ..= i - 1`.
/// Windows are formed by position in the time-sorted frame list, not by
/// checking the actual spacing between frames: a gap in the 5-minute cadence
/// goes unnoticed and the window silently reaches further back.
pub struct AccumulationEngine {
    params: AccumulationParams,
}

impl AccumulationEngine {
    pub fn new(params: AccumulationParams) -> Self {
        Self { params }
    }

    /// Time-sorted instantaneous frames in `dir`
    pub fn frames(dir: &Path) -> RadarResult<Vec<Frame>> {
        Ok(list_rainfall_rasters(dir)?
            .into_iter()
            .map(|(timestamp, path)| Frame { timestamp, path })
            .collect())
    }

    /// Positions of frames that fall exactly on a full hour
    pub fn anchor_indices(frames: &[Frame]) -> Vec<usize> {
        frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.timestamp.minute() == 0 && f.timestamp.second() == 0)
            .map(|(i, _)| i)
            .collect()
    }

    /// Sum the `window_hours` worth of frames immediately preceding
    /// `frames[anchor]`. The anchor itself is not part of its window.
    pub fn accumulate_at(
        &self,
        frames: &[Frame],
        anchor: usize,
        window_hours: u32,
    ) -> RadarResult<AccumulatedRaster> {
        let required = self.params.frames_per_window(window_hours)?;
        let end = frames[anchor].timestamp;
        if anchor < required {
            return Err(RadarError::InsufficientHistory { anchor: end, available: anchor, required });
        }

        let window = &frames[anchor - required..anchor];
        let mut total: Option<RainfallImage> = None;

        for frame in window {
            let rainfall = read_raster(&frame.path).map_err(|e| RadarError::ConstituentRead {
                path: frame.path.clone(),
                reason: e.to_string(),
            })?;

            match total.as_mut() {
                None => total = Some(rainfall.mapv(|v| if v.is_nan() { 0.0 } else { v })),
                Some(sum) if sum.dim() == rainfall.dim() => {
                    // no-data counts as zero rain
                    sum.zip_mut_with(&rainfall, |acc, &v| {
                        if !v.is_nan() {
                            *acc += v;
                        }
                    });
                }
                Some(sum) => {
                    return Err(RadarError::ConstituentRead {
                        path: frame.path.clone(),
                        reason: format!("shape {:?} differs from {:?}", rainfall.dim(), sum.dim()),
                    })
                }
            }
        }

        let data = total.ok_or_else(|| {
            RadarError::Processing(format!("Empty accumulation window at {}", end))
        })?;

        Ok(AccumulatedRaster {
            window_hours,
            end,
            frame_count: window.len(),
            data,
        })
    }

    /// Build every configured window length from the frames in
    /// `intensity_dir`, writing into `<output_dir>/<H>h/`
    pub fn run(&self, intensity_dir: &Path, output_dir: &Path) -> RadarResult<AccumulationReport> {
        let frames = Self::frames(intensity_dir)?;
        let anchors = Self::anchor_indices(&frames);
        log::info!(
            "Accumulating {} frames with {} full-hour anchors from {}",
            frames.len(),
            anchors.len(),
            intensity_dir.display()
        );

        let mut report = AccumulationReport::default();
        for &hours in &self.params.windows_hours {
            let window_dir = output_dir.join(format!("{}h", hours));
            std::fs::create_dir_all(&window_dir)?;

            for &anchor in &anchors {
                match self.accumulate_at(&frames, anchor, hours) {
                    Ok(product) => {
                        let path = rainfall_path(&window_dir, product.end);
                        write_npy_atomic(&path, &product.data)?;
                        log::info!("Saved accumulated rainfall: {}", path.display());
                        report.written.push(path);
                    }
                    Err(RadarError::InsufficientHistory { anchor, available, required }) => {
                        log::debug!(
                            "Not enough history for {} ({}h): {} of {} frames",
                            anchor, hours, available, required
                        );
                        report.insufficient_history += 1;
                    }
                    Err(e) if e.is_recoverable() => {
                        log::warn!("Skipping anchor {} ({}h): {}", frames[anchor].timestamp, hours, e);
                        report.failed.push((frames[anchor].timestamp, e.to_string()));
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(report)
    }
}
