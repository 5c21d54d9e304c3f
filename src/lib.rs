//! radar-rainfall: weather radar reflectivity to rainfall products
//!
//! Cleans the lowest sweep of each ODIM_H5 polar volume, converts it to
//! instantaneous rainfall intensity with a Z-R relation, and sums the
//! intensities into hourly accumulations. Every product is written once,
//! so re-running the pipeline over a growing archive only does new work.

pub mod types;
pub mod io;
pub mod core;
pub mod config;

// Re-export main types and functions for easier access
pub use types::{
    RadarReal, PolarImage, ReflectivityImage, RainfallImage, PolarSweep, PolarVolume,
    RadarSite, AccumulatedRaster, RadarError, RadarResult,
};

pub use config::PipelineConfig;
pub use io::{OdimReader, ScanReader, RadarGeometry};
pub use crate::core::{
    AccumulationEngine, BatchDispatcher, ProcessOutcome, ScanCleaner, ScanProcessor, ZRelation,
};
