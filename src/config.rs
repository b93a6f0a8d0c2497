use crate::error::{Result, ZipMergeError};
use crate::extractor::path_filter::clean_start_path;
use crate::extractor::{ExtractorOptions, DEFAULT_WORKERS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub extraction: ExtractionSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Concurrent workers per container; 0 means one per logical CPU.
    pub workers: usize,
    pub start_path: String,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputSettings {
    pub auto_confirm: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            start_path: String::new(),
            dry_run: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ZipMergeError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ZipMergeError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ZipMergeError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["zipmerge.toml", ".zipmerge.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        log::debug!("using configuration from {}", default_path);
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(workers) = cli_args.workers {
            self.extraction.workers = workers;
        }

        if let Some(ref start_path) = cli_args.start_path {
            self.extraction.start_path = start_path.clone();
        }

        if let Some(dry_run) = cli_args.dry_run {
            self.extraction.dry_run = dry_run;
        }

        if let Some(auto_confirm) = cli_args.auto_confirm {
            self.output.auto_confirm = auto_confirm;
        }

        if let Some(ref log_file) = cli_args.log_file {
            self.output.log_file = Some(log_file.clone());
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| ZipMergeError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| ZipMergeError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let start_path = clean_start_path(&self.extraction.start_path);
        if start_path.starts_with('/') {
            return Err(ZipMergeError::Config {
                message: format!(
                    "Base path must be relative to the archive root: {}",
                    self.extraction.start_path
                ),
            });
        }

        if start_path.split('/').any(|segment| segment == "..") {
            return Err(ZipMergeError::Config {
                message: format!(
                    "Base path must not leave the archive root: {}",
                    self.extraction.start_path
                ),
            });
        }

        if let Some(ref log_file) = self.output.log_file {
            if log_file.is_dir() {
                return Err(ZipMergeError::Config {
                    message: format!("Log file path is a directory: {}", log_file.display()),
                });
            }
        }

        Ok(())
    }

    /// Worker count with 0 resolved to the number of logical CPUs.
    pub fn effective_workers(&self) -> usize {
        match self.extraction.workers {
            0 => num_cpus::get(),
            n => n,
        }
    }

    pub fn engine_options<P: Into<PathBuf>>(&self, destination: P) -> ExtractorOptions {
        ExtractorOptions::new(destination)
            .with_start_path(self.extraction.start_path.clone())
            .with_workers(self.effective_workers())
            .with_dry_run(self.extraction.dry_run)
    }

    pub fn create_sample_config() -> String {
        let mut sample_config = Self::default();
        sample_config.output.log_file = Some(PathBuf::from("zipmerge-log.csv"));
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub workers: Option<usize>,
    pub start_path: Option<String>,
    pub dry_run: Option<bool>,
    pub auto_confirm: Option<bool>,
    pub log_file: Option<PathBuf>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_start_path(mut self, start_path: Option<String>) -> Self {
        self.start_path = start_path;
        self
    }

    pub fn with_dry_run(mut self, dry_run: Option<bool>) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_auto_confirm(mut self, auto_confirm: Option<bool>) -> Self {
        self.auto_confirm = auto_confirm;
        self
    }

    pub fn with_log_file(mut self, log_file: Option<PathBuf>) -> Self {
        self.log_file = log_file;
        self
    }
}
