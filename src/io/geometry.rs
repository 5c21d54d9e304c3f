use crate::io::raster::write_npy_atomic;
use crate::types::{PolarSweep, RadarError, RadarResult, RadarSite};
use ndarray::{arr1, Array1};
use ndarray_npy::ReadNpyExt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub const RANGES_FILE: &str = "ranges.npy";
pub const AZIMUTHS_FILE: &str = "azimuths.npy";
pub const SITE_FILE: &str = "radar_metadata.npy";

/// Polar grid geometry of the deployment, shared by every raster.
///
/// Written once next to the rainfall rasters from the first scan processed
/// and never regenerated, even if a later scan reports different values.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarGeometry {
    /// Range-bin centres in metres
    pub ranges: Array1<f64>,
    /// Ray centres in degrees
    pub azimuths: Array1<f64>,
    pub site: RadarSite,
}

impl RadarGeometry {
    pub fn from_sweep(sweep: &PolarSweep, site: RadarSite) -> Self {
        Self {
            ranges: sweep.ranges.clone(),
            azimuths: sweep.azimuths.clone(),
            site,
        }
    }

    fn paths(dir: &Path) -> [PathBuf; 3] {
        [
            dir.join(RANGES_FILE),
            dir.join(AZIMUTHS_FILE),
            dir.join(SITE_FILE),
        ]
    }

    /// True when all three geometry files are present
    pub fn is_persisted(dir: &Path) -> bool {
        Self::paths(dir).iter().all(|p| p.exists())
    }

    /// Write the geometry files unconditionally
    pub fn persist(&self, dir: &Path) -> RadarResult<()> {
        let [ranges, azimuths, site] = Self::paths(dir);
        write_npy_atomic(&ranges, &self.ranges)?;
        write_npy_atomic(&azimuths, &self.azimuths)?;
        let meta = arr1(&[self.site.latitude, self.site.longitude, self.site.altitude]);
        write_npy_atomic(&site, &meta)?;
        Ok(())
    }

    /// Write the geometry unless it already exists. Returns whether it wrote.
    ///
    /// Concurrent callers may both pass the existence check; each file is
    /// renamed into place atomically so the loser simply replaces it.
    pub fn persist_once(&self, dir: &Path) -> RadarResult<bool> {
        if Self::is_persisted(dir) {
            return Ok(false);
        }
        self.persist(dir)?;
        log::info!("Saved radar geometry to {}", dir.display());
        Ok(true)
    }

    /// Read previously persisted geometry
    pub fn load(dir: &Path) -> RadarResult<Self> {
        let [ranges, azimuths, site] = Self::paths(dir);
        let ranges = read_vector(&ranges)?;
        let azimuths = read_vector(&azimuths)?;
        let meta = read_vector(&site)?;
        if meta.len() != 3 {
            return Err(RadarError::InvalidFormat(format!(
                "Radar metadata must hold latitude, longitude and altitude, found {} values",
                meta.len()
            )));
        }

        Ok(Self {
            ranges,
            azimuths,
            site: RadarSite {
                latitude: meta[0],
                longitude: meta[1],
                altitude: meta[2],
            },
        })
    }
}

fn read_vector(path: &Path) -> RadarResult<Array1<f64>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(Array1::<f64>::read_npy(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use tempfile::TempDir;

    fn geometry(first_range: f64) -> RadarGeometry {
        let sweep = PolarSweep {
            elevation: 0.5,
            reflectivity: Array2::zeros((4, 3)),
            ranges: arr1(&[first_range, first_range + 250.0, first_range + 500.0]),
            azimuths: arr1(&[45.0, 135.0, 225.0, 315.0]),
        };
        let site = RadarSite { latitude: 58.48, longitude: 25.52, altitude: 157.0 };
        RadarGeometry::from_sweep(&sweep, site)
    }

    #[test]
    fn test_persist_and_load() {
        let dir = TempDir::new().unwrap();
        let original = geometry(125.0);
        assert!(original.persist_once(dir.path()).unwrap());
        assert!(RadarGeometry::is_persisted(dir.path()));
        assert_eq!(RadarGeometry::load(dir.path()).unwrap(), original);
    }

    #[test]
    fn test_first_geometry_is_authoritative() {
        let dir = TempDir::new().unwrap();
        geometry(125.0).persist_once(dir.path()).unwrap();
        assert!(!geometry(999.0).persist_once(dir.path()).unwrap());
        assert_eq!(RadarGeometry::load(dir.path()).unwrap().ranges[0], 125.0);
    }
}
