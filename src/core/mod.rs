//! Core radar processing modules

pub mod filters;
pub mod scan_cleaner;
pub mod rainfall;
pub mod processor;
pub mod batch;
pub mod accumulation;

// Re-export main types
pub use filters::Connectivity;
pub use scan_cleaner::{ScanCleaner, CleaningParams, CleaningStats};
pub use rainfall::ZRelation;
pub use processor::{ScanProcessor, ProcessOutcome};
pub use batch::{BatchDispatcher, BatchReport};
pub use accumulation::{AccumulationEngine, AccumulationReport, Frame};
