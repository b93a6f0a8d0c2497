use crate::error::{Result, ZipMergeError};
use crate::extractor::executor::{ExtractionExecutor, RetryPolicy};
use crate::extractor::log::ExtractionLog;
use crate::extractor::path_filter::PathFilter;
use crate::extractor::planner::{self, ContainerSummary};
use crate::extractor::scheduler::{ProgressObserver, Scheduler};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_WORKERS: usize = 4;

/// Immutable engine configuration, fixed for the lifetime of an [`Extractor`].
#[derive(Debug, Clone)]
pub struct ExtractorOptions {
    pub destination: PathBuf,
    pub start_path: String,
    pub workers: usize,
    pub dry_run: bool,
    pub retry: RetryPolicy,
}

impl ExtractorOptions {
    pub fn new<P: Into<PathBuf>>(destination: P) -> Self {
        Self {
            destination: destination.into(),
            start_path: String::new(),
            workers: DEFAULT_WORKERS,
            dry_run: false,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_start_path<S: Into<String>>(mut self, start_path: S) -> Self {
        self.start_path = start_path.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Plans and extracts containers into one destination tree, accumulating
/// every outcome in a single [`ExtractionLog`].
#[derive(Debug)]
pub struct Extractor {
    options: ExtractorOptions,
    filter: PathFilter,
    scheduler: Scheduler,
    log: ExtractionLog,
}

impl Extractor {
    pub fn new(options: ExtractorOptions) -> Self {
        let filter = PathFilter::new(&options.start_path);
        let scheduler = Scheduler::new(
            options.workers,
            options.dry_run,
            ExtractionExecutor::new(options.retry),
        );

        Self {
            options,
            filter,
            scheduler,
            log: ExtractionLog::new(),
        }
    }

    pub fn options(&self) -> &ExtractorOptions {
        &self.options
    }

    pub fn log(&self) -> &ExtractionLog {
        &self.log
    }

    /// Creates the destination root. Dry runs leave the filesystem alone.
    pub fn prepare_destination(&self) -> Result<()> {
        if self.options.dry_run {
            return Ok(());
        }

        fs::create_dir_all(&self.options.destination).map_err(|source| {
            ZipMergeError::DestinationRoot {
                path: self.options.destination.clone(),
                source,
            }
        })
    }

    pub fn estimate(&self, container: &Path) -> Result<ContainerSummary> {
        planner::estimate(container, &self.filter, &self.options.destination)
    }

    /// Extracts one container. Records land in [`Extractor::log`] whether or
    /// not the container succeeds as a whole.
    pub fn extract(&self, container: &Path, observer: Option<ProgressObserver<'_>>) -> Result<()> {
        self.scheduler.run(
            container,
            &self.filter,
            &self.options.destination,
            &self.log,
            observer,
        )
    }
}
