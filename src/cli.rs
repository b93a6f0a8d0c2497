use crate::config::{CliOverrides, Config};
use crate::error::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "zipmerge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Merge ZIP exports into one folder, skipping files that are already there")]
#[command(
    long_about = "zipmerge extracts one or more ZIP archives into a single destination folder. \
                  Files that already exist with the same size, timestamp and content are \
                  skipped, so repeated or multi-source merges only copy what changed."
)]
#[command(after_help = "EXAMPLES:\n  \
    zipmerge ~/Drive takeout-001.zip takeout-002.zip\n  \
    zipmerge ~/Drive takeout-*.zip --base-path Takeout/Drive --auto\n  \
    zipmerge ~/Drive takeout-*.zip --dry-run --log merge-log.csv\n  \
    zipmerge --generate-config --config zipmerge.toml")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Destination folder all archives are merged into
    #[arg(required_unless_present = "generate_config")]
    pub destination: Option<PathBuf>,

    /// ZIP archives to extract, processed in order
    #[arg(required_unless_present = "generate_config", num_args = 1..)]
    pub containers: Vec<PathBuf>,

    /// Number of concurrent extraction workers (0 = one per CPU)
    #[arg(short, long, env = "ZIPMERGE_WORKERS")]
    pub workers: Option<usize>,

    /// Extract without asking for confirmation
    #[arg(long, help = "Skip all confirmation prompts")]
    pub auto: bool,

    /// Dry run (show what would be done without executing)
    #[arg(long, help = "Show what would be extracted without writing anything")]
    pub dry_run: bool,

    /// Path inside each archive to start extraction from
    #[arg(long, value_name = "PATH")]
    pub base_path: Option<String>,

    /// Append per-file results to this CSV file
    #[arg(long, value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Write a sample configuration file and exit")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    /// Flags only override the configuration file when given.
    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_workers(self.workers)
            .with_start_path(self.base_path.clone())
            .with_dry_run(self.dry_run.then_some(true))
            .with_auto_confirm(self.auto.then_some(true))
            .with_log_file(self.log.clone())
    }

    pub fn config_output_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from("zipmerge.toml"))
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    /// Default filter for diagnostic logging when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        match self.verbosity_level() {
            0 => "zipmerge=warn",
            1 => "zipmerge=info",
            _ => "zipmerge=debug",
        }
    }
}
