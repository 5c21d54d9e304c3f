//! I/O modules for reading radar volumes and persisting rasters

pub mod odim;
pub mod raster;
pub mod geometry;

pub use odim::{OdimReader, ScanReader};
pub use geometry::RadarGeometry;
