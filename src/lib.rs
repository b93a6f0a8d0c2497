pub mod cli;
pub mod config;
pub mod container;
pub mod error;
pub mod extractor;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Config, ExtractionSettings, OutputSettings};
pub use error::{Result, UserFriendlyError, ZipMergeError};

// Core functionality re-exports
pub use container::{ContainerEntry, ZipContainer};
pub use extractor::{
    ContainerSummary, CsvLogSink, ExtractionLog, ExtractionProgress, ExtractionRecord,
    ExtractionStatus, Extractor, ExtractorOptions,
};
pub use ui::{GracefulShutdown, OutputFormatter, OutputMode, ProgressManager, CANCELLED_EXIT_CODE};

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Counts gathered over one run, across every container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub dry_run: bool,
    pub containers_planned: usize,
    pub containers_skipped: usize,
    pub containers_processed: usize,
    pub containers_failed: usize,
    pub extracted: usize,
    pub skipped: usize,
    pub replaced: usize,
    pub retried: usize,
    pub failed: usize,
    pub would_extract: usize,
}

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    pub fn tally(&mut self, records: &[ExtractionRecord]) {
        for record in records {
            match record.status {
                ExtractionStatus::Extracted => self.extracted += 1,
                ExtractionStatus::Skipped => self.skipped += 1,
                ExtractionStatus::Replacing => self.replaced += 1,
                ExtractionStatus::Retry => self.retried += 1,
                ExtractionStatus::Failed => self.failed += 1,
                ExtractionStatus::WouldExtract => self.would_extract += 1,
            }
        }
    }

    pub fn has_failures(&self) -> bool {
        self.containers_failed > 0 || self.failed > 0
    }

    /// 0 on a clean run, 2 when any container or entry failed.
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            2
        } else {
            0
        }
    }
}

/// Main library interface: plans, confirms and extracts a list of ZIP files
/// into one destination.
pub struct ZipMerge {
    config: Config,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
}

impl ZipMerge {
    /// Create a new ZipMerge instance with the provided configuration
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let progress_manager = ProgressManager::new(output_formatter.shows_progress());
        let shutdown = GracefulShutdown::new()?;

        Ok(Self {
            config,
            output_formatter,
            progress_manager,
            shutdown,
        })
    }

    /// Create a new ZipMerge instance for testing (no signal handler conflicts)
    #[cfg(test)]
    pub fn new_for_test(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let progress_manager = ProgressManager::new(false);
        let shutdown = GracefulShutdown::new_for_test();

        Self {
            config,
            output_formatter,
            progress_manager,
            shutdown,
        }
    }

    /// Create ZipMerge instance from CLI arguments
    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        let output_mode = match cli_args.output_format {
            OutputFormat::Human => OutputMode::Human,
            OutputFormat::Json => OutputMode::Json,
            OutputFormat::Plain => OutputMode::Plain,
        };

        Self::new(config, output_mode, cli_args.verbose, cli_args.quiet)
    }

    /// Plans every container, asks for confirmation, then extracts the
    /// confirmed ones in order.
    ///
    /// Only a destination that cannot be created or a Ctrl+C between
    /// containers ends the run early; a broken container is reported and
    /// the rest still run.
    pub fn run(&self, destination: &Path, containers: &[PathBuf]) -> Result<RunReport> {
        let dry_run = self.config.extraction.dry_run;
        let extractor = Extractor::new(self.config.engine_options(destination));
        extractor.prepare_destination()?;

        let sink = self.config.output.log_file.as_ref().map(CsvLogSink::new);
        let mut report = RunReport::new(dry_run);

        if dry_run {
            self.output_formatter
                .info("DRY RUN - no files will be modified");
        }

        let confirmed = self.plan(&extractor, containers, &mut report)?;
        if confirmed.is_empty() {
            self.output_formatter.success("No extractions needed.");
            return Ok(report);
        }

        self.output_formatter.print_extraction_plan(&confirmed);
        if !self.ask("Proceed with extraction?") {
            self.output_formatter.warning("Extraction canceled.");
            return Ok(report);
        }

        for summary in &confirmed {
            self.shutdown.check_shutdown()?;
            self.process_container(&extractor, summary, sink.as_ref(), &mut report);
        }

        self.output_formatter.print_run_summary(&report);
        Ok(report)
    }

    fn plan(
        &self,
        extractor: &Extractor,
        containers: &[PathBuf],
        report: &mut RunReport,
    ) -> Result<Vec<ContainerSummary>> {
        let mut confirmed = Vec::new();

        for container in containers {
            self.shutdown.check_shutdown()?;
            report.containers_planned += 1;

            let spinner = self
                .progress_manager
                .create_spinner(&format!("Scanning {}", container.display()));
            let estimate = extractor.estimate(container);
            spinner.finish_and_clear();

            let summary = match estimate {
                Ok(summary) => summary,
                Err(e) => {
                    log::warn!("skipping {}: {}", container.display(), e);
                    report.containers_failed += 1;
                    self.output_formatter.print_user_friendly_error(&e);
                    continue;
                }
            };

            self.output_formatter.print_container_summary(&summary);

            if summary.is_up_to_date() {
                self.output_formatter
                    .success("Everything already extracted. Skipping...");
                report.containers_skipped += 1;
                continue;
            }

            if !self.ask("Confirm extraction for this ZIP?") {
                self.output_formatter.info("Skipping...");
                report.containers_skipped += 1;
                continue;
            }

            confirmed.push(summary);
        }

        Ok(confirmed)
    }

    fn process_container(
        &self,
        extractor: &Extractor,
        summary: &ContainerSummary,
        sink: Option<&CsvLogSink>,
        report: &mut RunReport,
    ) {
        let container = summary.path.as_path();
        log::info!("extracting {}", container.display());

        let start = extractor.log().len();
        let pb = self
            .progress_manager
            .create_container_progress(container, summary.total_files as u64);
        let observer = |progress: &ExtractionProgress| {
            ui::progress::update_container_progress(&pb, progress);
        };

        let result = extractor.extract(container, Some(&observer));
        ui::progress::finish_container_progress(&pb, result.is_err());

        let records = extractor.log().since(start);
        report.tally(&records);
        self.output_formatter
            .print_extraction_log(container, &records, extractor.options().dry_run);

        if let Some(sink) = sink {
            if !records.is_empty() {
                if let Err(e) = sink.append(&records) {
                    self.output_formatter
                        .warning(&format!("Failed to write logs to file: {}", e));
                }
            }
        }

        report.containers_processed += 1;
        if let Err(e) = result {
            log::warn!("{} finished with errors: {}", container.display(), e);
            report.containers_failed += 1;
            self.output_formatter.print_user_friendly_error(&e);
        }
    }

    fn ask(&self, question: &str) -> bool {
        if self.config.output.auto_confirm {
            return true;
        }

        let answer = self
            .progress_manager
            .suspend(|| ui::prompt::confirm_on_terminal(question));
        match answer {
            Ok(answer) => answer,
            Err(e) => {
                self.output_formatter
                    .warning(&format!("Could not read answer: {}", e));
                false
            }
        }
    }

    /// Generate sample configuration file
    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config)?;
        Ok(())
    }

    /// Get configuration reference
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get output formatter reference
    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    /// Check if shutdown has been requested
    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    /// Request graceful shutdown
    pub fn request_shutdown(&self) {
        self.shutdown.request_shutdown();
    }

    /// Handle error with user-friendly output
    pub fn handle_error(&self, error: &ZipMergeError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}
