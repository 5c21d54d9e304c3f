use crate::types::{PolarSweep, PolarVolume, RadarError, RadarResult, RadarSite, ReflectivityImage, NO_DATA};
use gdal::{Dataset, Metadata};
use ndarray::{Array1, Array2};
use std::path::Path;
use std::str::FromStr;

/// Source of polar volumes. The batch pipeline is generic over it so the
/// on-disk format stays an implementation detail of the reader.
pub trait ScanReader: Send + Sync {
    /// Read every sweep of the volume stored at `path`
    fn read_volume(&self, path: &Path) -> RadarResult<PolarVolume>;
}

/// Packing of one ODIM quantity: `physical = raw * gain + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Packing {
    pub gain: f64,
    pub offset: f64,
    pub nodata: Option<f64>,
}

impl Default for Packing {
    fn default() -> Self {
        Self { gain: 1.0, offset: 0.0, nodata: None }
    }
}

impl Packing {
    /// Unpack raw samples. `nodata` becomes NaN; `undetect` is unpacked like
    /// any other value and ends up below the background cutoff.
    pub fn unpack(&self, raw: &[f64], shape: (usize, usize)) -> RadarResult<ReflectivityImage> {
        let values: Vec<f32> = raw
            .iter()
            .map(|&v| match self.nodata {
                Some(nodata) if v == nodata => NO_DATA,
                _ => (v * self.gain + self.offset) as f32,
            })
            .collect();

        Array2::from_shape_vec(shape, values)
            .map_err(|e| RadarError::InvalidFormat(format!("Sweep data does not fit {:?}: {}", shape, e)))
    }
}

/// Bin centres in metres from ODIM `rstart` (km) and `rscale` (m)
pub fn range_centres(nbins: usize, rstart_km: f64, rscale_m: f64) -> Array1<f64> {
    Array1::from_shape_fn(nbins, |i| rstart_km * 1000.0 + rscale_m * (i as f64 + 0.5))
}

/// Ray centres in degrees; ODIM stores rays ordered from north
pub fn azimuth_centres(nrays: usize) -> Array1<f64> {
    let width = 360.0 / nrays as f64;
    Array1::from_shape_fn(nrays, |i| (i as f64 + 0.5) * width)
}

/// ODIM_H5 polar volume reader backed by GDAL's HDF5 driver.
///
/// GDAL flattens HDF5 attribute paths into metadata keys, e.g.
/// `/dataset1/where/elangle` becomes `dataset1_where_elangle`.
pub struct OdimReader {
    quantity: String,
}

impl OdimReader {
    /// Reader for horizontal reflectivity (`DBZH`)
    pub fn new() -> Self {
        Self::for_quantity("DBZH")
    }

    pub fn for_quantity(quantity: &str) -> Self {
        Self { quantity: quantity.to_string() }
    }

    fn open(path: &str) -> RadarResult<Dataset> {
        Dataset::open(path)
            .map_err(|e| RadarError::InvalidFormat(format!("Failed to open {}: {}", path, e)))
    }

    fn attr<T: FromStr>(root: &Dataset, key: &str) -> Option<T> {
        root.metadata_item(key, "")
            .and_then(|v| v.trim().parse::<T>().ok())
    }

    fn required<T: FromStr>(root: &Dataset, key: &str) -> RadarResult<T> {
        Self::attr(root, key)
            .ok_or_else(|| RadarError::InvalidFormat(format!("Missing or invalid attribute {}", key)))
    }

    /// Attribute of the data group, falling back to the dataset group
    fn what<T: FromStr>(root: &Dataset, dataset: usize, data: usize, name: &str) -> Option<T> {
        Self::attr(root, &format!("dataset{}_data{}_what_{}", dataset, data, name))
            .or_else(|| Self::attr(root, &format!("dataset{}_what_{}", dataset, name)))
    }

    /// Index of the data group carrying our quantity within `datasetN`
    fn find_quantity(&self, root: &Dataset, dataset: usize) -> Option<usize> {
        (1..)
            .map_while(|data| {
                root.metadata_item(&format!("dataset{}_data{}_what_quantity", dataset, data), "")
                    .map(|quantity| (data, quantity))
            })
            .find(|(_, quantity)| quantity.trim() == self.quantity)
            .map(|(data, _)| data)
    }

    fn read_sweep(&self, path: &Path, root: &Dataset, dataset: usize) -> RadarResult<Option<PolarSweep>> {
        let Some(data) = self.find_quantity(root, dataset) else {
            log::debug!("dataset{} has no {} field", dataset, self.quantity);
            return Ok(None);
        };

        let elevation: f64 = Self::required(root, &format!("dataset{}_where_elangle", dataset))?;
        let rstart: f64 = Self::attr(root, &format!("dataset{}_where_rstart", dataset)).unwrap_or(0.0);
        let rscale: f64 = Self::required(root, &format!("dataset{}_where_rscale", dataset))?;
        let packing = Packing {
            gain: Self::what(root, dataset, data, "gain").unwrap_or(1.0),
            offset: Self::what(root, dataset, data, "offset").unwrap_or(0.0),
            nodata: Self::what(root, dataset, data, "nodata"),
        };

        let subdataset = format!("HDF5:\"{}\"://dataset{}/data{}/data", path.display(), dataset, data);
        let sweep_ds = Self::open(&subdataset)?;
        let (nbins, nrays) = sweep_ds.raster_size();
        let band = sweep_ds.rasterband(1)?;
        let buffer = band.read_as::<f64>((0, 0), (nbins, nrays), (nbins, nrays), None)?;
        let reflectivity = packing.unpack(&buffer.data, (nrays, nbins))?;

        log::debug!(
            "dataset{}: elevation {:.2} deg, {} rays x {} bins, gain {} offset {}",
            dataset, elevation, nrays, nbins, packing.gain, packing.offset
        );

        Ok(Some(PolarSweep {
            elevation,
            reflectivity,
            ranges: range_centres(nbins, rstart, rscale),
            azimuths: azimuth_centres(nrays),
        }))
    }
}

impl Default for OdimReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanReader for OdimReader {
    fn read_volume(&self, path: &Path) -> RadarResult<PolarVolume> {
        let root = Self::open(&path.to_string_lossy())?;

        let object: Option<String> = Self::attr(&root, "what_object");
        if let Some(object) = object.as_deref() {
            if object != "PVOL" && object != "SCAN" {
                return Err(RadarError::InvalidFormat(format!(
                    "{} holds an ODIM {} product, not a polar volume",
                    path.display(),
                    object
                )));
            }
        }

        let site = RadarSite {
            latitude: Self::required(&root, "where_lat")?,
            longitude: Self::required(&root, "where_lon")?,
            altitude: Self::attr(&root, "where_height").unwrap_or(0.0),
        };

        let mut sweeps = Vec::new();
        let mut dataset = 1;
        while root.metadata_item(&format!("dataset{}_where_elangle", dataset), "").is_some() {
            if let Some(sweep) = self.read_sweep(path, &root, dataset)? {
                sweeps.push(sweep);
            }
            dataset += 1;
        }

        if sweeps.is_empty() {
            return Err(RadarError::InvalidFormat(format!(
                "{} contains no {} sweep",
                path.display(),
                self.quantity
            )));
        }

        Ok(PolarVolume { site, sweeps })
    }
}
