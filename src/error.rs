use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZipMergeError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open container {path}: {message}")]
    ContainerOpen { path: String, message: String },

    #[error("Cannot create destination folder {}", path.display())]
    DestinationRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to extract {failed} file(s) from {container}: {first_error}")]
    EntriesFailed {
        container: String,
        failed: usize,
        first_error: String,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Failed to write extraction log {path}: {message}")]
    LogSink { path: String, message: String },

    #[error("Operation was cancelled by user")]
    Cancelled,

    #[error("Path validation failed: {path}")]
    InvalidPath { path: String },
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for ZipMergeError {
    fn user_message(&self) -> String {
        match self {
            ZipMergeError::ContainerOpen { path, message } => {
                format!("Skipping ZIP due to error: {} ({})", path, message)
            }
            ZipMergeError::DestinationRoot { path, source } => {
                format!(
                    "Error creating destination folder {}: {}",
                    path.display(),
                    source
                )
            }
            ZipMergeError::EntriesFailed {
                container,
                failed,
                first_error,
            } => {
                format!(
                    "{} file(s) could not be extracted from {}; first error: {}",
                    failed, container, first_error
                )
            }
            ZipMergeError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            ZipMergeError::LogSink { path, message } => {
                format!("Failed to write logs to {}: {}", path, message)
            }
            ZipMergeError::Cancelled => "Operation was cancelled by user".to_string(),
            ZipMergeError::InvalidPath { path } => {
                format!("Invalid file path: {}", path)
            }
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            ZipMergeError::ContainerOpen { .. } => Some(
                "Check that the file is a complete ZIP archive; partially downloaded exports are a common cause.".to_string()
            ),
            ZipMergeError::DestinationRoot { .. } => Some(
                "Ensure the destination's parent directory exists and is writable.".to_string()
            ),
            ZipMergeError::EntriesFailed { .. } => Some(
                "Run again to retry the failed files; files that were extracted successfully will be skipped.".to_string()
            ),
            ZipMergeError::Config { .. } => Some(
                "Check your configuration file syntax and ensure all required fields are present.".to_string()
            ),
            ZipMergeError::LogSink { .. } => Some(
                "Choose a writable location with --log.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for ZipMergeError {
    fn from(error: toml::de::Error) -> Self {
        ZipMergeError::Config {
            message: error.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for ZipMergeError {
    fn from(error: zip::result::ZipError) -> Self {
        match error {
            zip::result::ZipError::Io(e) => ZipMergeError::Io(e),
            other => ZipMergeError::ContainerOpen {
                path: "archive".to_string(),
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ZipMergeError>;
