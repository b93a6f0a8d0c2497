use crate::error::{Result, ZipMergeError};
use crate::extractor::log::ExtractionRecord;
use csv::{QuoteStyle, WriterBuilder};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

pub const CSV_HEADER: [&str; 7] = [
    "Timestamp",
    "Path",
    "DestPath",
    "Size",
    "Status",
    "Reason",
    "DryRun",
];

/// Appends extraction records to a CSV file that may already hold earlier runs.
#[derive(Debug, Clone)]
pub struct CsvLogSink {
    path: PathBuf,
}

impl CsvLogSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the header only when the file is empty, then one row per record.
    pub fn append(&self, records: &[ExtractionRecord]) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.sink_error(e))?;
        let is_empty = file.metadata().map_err(|e| self.sink_error(e))?.len() == 0;

        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::NonNumeric)
            .from_writer(file);

        if is_empty {
            writer
                .write_record(CSV_HEADER)
                .map_err(|e| self.sink_error(e))?;
        }

        for record in records {
            let size = record.size.to_string();
            let dest_path = record.dest_path.display().to_string();
            let timestamp = record.timestamp.to_rfc3339();
            let dry_run = record.dry_run.to_string();

            writer
                .write_record([
                    timestamp.as_str(),
                    record.source_path.as_str(),
                    dest_path.as_str(),
                    size.as_str(),
                    record.status.as_str(),
                    record.reason.as_str(),
                    dry_run.as_str(),
                ])
                .map_err(|e| self.sink_error(e))?;
        }

        writer.flush().map_err(|e| self.sink_error(e))?;
        log::debug!("appended {} records to {}", records.len(), self.path.display());
        Ok(())
    }

    fn sink_error<E: std::fmt::Display>(&self, error: E) -> ZipMergeError {
        ZipMergeError::LogSink {
            path: self.path.display().to_string(),
            message: error.to_string(),
        }
    }
}
