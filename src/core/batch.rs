use crate::config::BatchParams;
use crate::core::processor::{ProcessOutcome, ScanProcessor};
use crate::core::rainfall::ZRelation;
use crate::core::scan_cleaner::CleaningParams;
use crate::io::odim::ScanReader;
use crate::types::{RadarError, RadarResult};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Summary of one batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: usize,
    pub already_processed: usize,
    pub non_conforming: usize,
    /// Files skipped because of a recoverable error, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.written + self.already_processed + self.non_conforming + self.failed.len()
    }
}

/// Runs the scan processor over every raw file of a directory
pub struct BatchDispatcher<R: ScanReader> {
    reader: R,
    cleaning: CleaningParams,
    relation: ZRelation,
    params: BatchParams,
}

impl<R: ScanReader> BatchDispatcher<R> {
    pub fn new(reader: R, cleaning: CleaningParams, relation: ZRelation, params: BatchParams) -> Self {
        Self { reader, cleaning, relation, params }
    }

    /// Raw scan files in `input_dir`, sorted by name
    pub fn list_inputs(&self, input_dir: &Path) -> RadarResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(input_dir)? {
            let path = entry?.path();
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| e.eq_ignore_ascii_case(&self.params.input_extension));
            if matches && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Process every scan of `input_dir` into `output_dir`.
    ///
    /// Recoverable failures are logged and reported; the first fatal error
    /// (e.g. an unwritable output directory) is returned once every task
    /// has finished.
    pub fn run(&self, input_dir: &Path, output_dir: &Path) -> RadarResult<BatchReport> {
        std::fs::create_dir_all(output_dir)?;
        let files = self.list_inputs(input_dir)?;
        let workers = self.params.worker_count();
        log::info!(
            "Processing {} scan files from {} with {} workers",
            files.len(),
            input_dir.display(),
            workers
        );

        let processor = ScanProcessor::new(
            &self.reader,
            self.cleaning.clone(),
            self.relation,
            self.params.range_bins,
            output_dir,
        );

        let start = Instant::now();
        let results = Self::dispatch(&processor, &files, workers)?;
        let report = Self::summarise(results)?;

        log::info!(
            "Batch finished in {:.1?}: {} written, {} already present, {} non-conforming, {} failed",
            start.elapsed(),
            report.written,
            report.already_processed,
            report.non_conforming,
            report.failed.len()
        );
        Ok(report)
    }

    #[cfg(feature = "parallel")]
    fn dispatch(
        processor: &ScanProcessor<'_, R>,
        files: &[PathBuf],
        workers: usize,
    ) -> RadarResult<Vec<(PathBuf, RadarResult<ProcessOutcome>)>> {
        use rayon::prelude::*;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("scan-worker-{}", i))
            .build()
            .map_err(|e| RadarError::Processing(format!("Failed to build worker pool: {}", e)))?;

        Ok(pool.install(|| {
            files
                .par_iter()
                .map(|file| (file.clone(), processor.process(file)))
                .collect()
        }))
    }

    #[cfg(not(feature = "parallel"))]
    fn dispatch(
        processor: &ScanProcessor<'_, R>,
        files: &[PathBuf],
        _workers: usize,
    ) -> RadarResult<Vec<(PathBuf, RadarResult<ProcessOutcome>)>> {
        Ok(files
            .iter()
            .map(|file| (file.clone(), processor.process(file)))
            .collect())
    }

    fn summarise(results: Vec<(PathBuf, RadarResult<ProcessOutcome>)>) -> RadarResult<BatchReport> {
        let mut report = BatchReport::default();
        let mut fatal = None;

        for (file, result) in results {
            match result {
                Ok(ProcessOutcome::Written { .. }) => report.written += 1,
                Ok(ProcessOutcome::AlreadyProcessed { .. }) => report.already_processed += 1,
                Ok(ProcessOutcome::NonConforming { .. }) => report.non_conforming += 1,
                Err(e) if e.is_recoverable() => {
                    log::warn!("Failed to process {}: {}", file.display(), e);
                    report.failed.push((file, e.to_string()));
                }
                Err(e) => {
                    log::error!("Fatal error while processing {}: {}", file.display(), e);
                    fatal.get_or_insert(e);
                }
            }
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}
