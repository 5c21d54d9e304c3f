use crate::types::{RadarReal, RainfallImage, ReflectivityImage};
use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Z-R power law `Z = a * R^b` used to turn reflectivity into rain rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZRelation {
    pub a: f64,
    pub b: f64,
}

impl Default for ZRelation {
    fn default() -> Self {
        // Marshall-Palmer style coefficients
        Self { a: 300.0, b: 1.5 }
    }
}

impl ZRelation {
    pub fn new(a: f64, b: f64) -> Self {
        Self { a, b }
    }

    /// Rain rate in mm/h for a single reflectivity value in dBZ
    pub fn intensity<T: Float>(&self, dbz: T) -> T {
        let a = T::from(self.a).unwrap_or_else(T::nan);
        let b = T::from(self.b).unwrap_or_else(T::nan);
        intensity(dbz, a, b)
    }

    /// Convert a reflectivity grid (dBZ) to rainfall intensity (mm/h).
    ///
    /// NaN cells stay NaN so that "no data" survives into the stored raster.
    pub fn convert(&self, reflectivity: &ReflectivityImage) -> RainfallImage {
        log::debug!("Converting {:?} grid with a={}, b={}", reflectivity.dim(), self.a, self.b);
        let a = self.a as RadarReal;
        let b = self.b as RadarReal;
        reflectivity.mapv(|dbz| intensity(dbz, a, b))
    }
}

/// `(10^(dbz/10) / a)^(1/b)`
pub fn intensity<T: Float>(dbz: T, a: T, b: T) -> T {
    let ten = T::from(10.0).unwrap_or_else(T::one);
    let z = ten.powf(dbz / ten);
    (z / a).powf(b.recip())
}
