use crate::core::filters::{self, Connectivity};
use crate::types::{RadarError, RadarReal, RadarResult, ReflectivityImage, NO_DATA};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Percentile used as the representative value of a ray
const ROW_PERCENTILE: f64 = 95.0;

/// Scan cleaning parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningParams {
    /// Median window size along azimuth and range (must be odd)
    pub window_size: usize,
    /// Allowed deviation of a ray from its azimuthal neighbourhood, dBZ
    pub outlier_threshold: f32,
    /// Values below this become no-data, dBZ
    pub background_cutoff: f32,
    /// Regions with this many pixels or fewer are discarded
    pub min_area: usize,
    /// Adjacency used to build regions
    pub connectivity: Connectivity,
    /// Despeckle neighbourhood along range (3 or 5)
    pub despeckle_size: usize,
}

impl Default for CleaningParams {
    fn default() -> Self {
        Self {
            window_size: 5,
            outlier_threshold: 8.0,
            background_cutoff: 0.0,
            min_area: 10,
            connectivity: Connectivity::Four,
            despeckle_size: 5,
        }
    }
}

impl CleaningParams {
    pub fn validate(&self) -> RadarResult<()> {
        if self.window_size == 0 || self.window_size % 2 == 0 {
            return Err(RadarError::Processing(format!(
                "Window size must be odd and positive, got {}",
                self.window_size
            )));
        }
        if self.despeckle_size != 3 && self.despeckle_size != 5 {
            return Err(RadarError::Processing(format!(
                "Despeckle size must be 3 or 5, got {}",
                self.despeckle_size
            )));
        }
        Ok(())
    }
}

/// What the cleaner changed, for logging
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleaningStats {
    pub outlier_rows: usize,
    pub regions_removed: usize,
    pub speckles_removed: usize,
    pub valid_pixels: usize,
}

/// Removes azimuthal artefacts (spokes, interference rays) and clutter
/// speckle from a reflectivity sweep
pub struct ScanCleaner {
    params: CleaningParams,
}

impl ScanCleaner {
    /// Create a cleaner with default parameters
    pub fn new() -> Self {
        Self {
            params: CleaningParams::default(),
        }
    }

    /// Create a cleaner with custom parameters
    pub fn with_params(params: CleaningParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CleaningParams {
        &self.params
    }

    /// Clean a reflectivity grid. The input is left untouched.
    pub fn clean(&self, dbz: &ReflectivityImage) -> RadarResult<ReflectivityImage> {
        self.clean_with_stats(dbz).map(|(cleaned, _)| cleaned)
    }

    /// Clean a reflectivity grid and report what was removed
    pub fn clean_with_stats(
        &self,
        dbz: &ReflectivityImage,
    ) -> RadarResult<(ReflectivityImage, CleaningStats)> {
        self.params.validate()?;
        log::debug!("Cleaning {:?} grid with {:?}", dbz.dim(), self.params);

        let mut stats = CleaningStats::default();
        let mut cleaned = dbz.clone();

        // Rays that stand out from their azimuthal neighbours
        let outliers = self.detect_outlier_rows(dbz);
        for row in (0..outliers.len()).filter(|&row| outliers[row]) {
            let replacement = filters::median_filter_row(dbz, row, self.params.window_size);
            cleaned.row_mut(row).assign(&replacement);
            stats.outlier_rows += 1;
        }

        let cutoff = self.params.background_cutoff;
        cleaned.mapv_inplace(|v| if v < cutoff { NO_DATA } else { v });

        stats.regions_removed =
            filters::remove_small_regions(&mut cleaned, self.params.min_area, self.params.connectivity);
        stats.speckles_removed = filters::despeckle(&mut cleaned, self.params.despeckle_size);
        stats.valid_pixels = cleaned.iter().filter(|v| v.is_finite()).count();

        log::debug!(
            "Cleaning removed {} outlier rays, {} small regions, {} speckles; {} valid pixels remain",
            stats.outlier_rows,
            stats.regions_removed,
            stats.speckles_removed,
            stats.valid_pixels
        );

        Ok((cleaned, stats))
    }

    /// Per-ray flag: true when the ray's 95th percentile deviates from the
    /// median of its azimuthal neighbourhood by more than the threshold
    pub fn detect_outlier_rows(&self, dbz: &ReflectivityImage) -> Vec<bool> {
        let profile = row_profile(dbz);
        let neighbourhood = filters::median_filter_1d(profile.view(), self.params.window_size);

        profile
            .iter()
            .zip(neighbourhood.iter())
            .map(|(&own, &local)| (own - local).abs() > self.params.outlier_threshold)
            .collect()
    }
}

impl Default for ScanCleaner {
    fn default() -> Self {
        Self::new()
    }
}

/// 95th percentile of every ray, negatives and empty rays floored at 0
fn row_profile(dbz: &ReflectivityImage) -> Array1<RadarReal> {
    dbz.rows()
        .into_iter()
        .map(|row| {
            filters::percentile_finite(row, ROW_PERCENTILE)
                .unwrap_or(0.0)
                .max(0.0)
        })
        .collect()
}
