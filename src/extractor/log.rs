use crate::container::ContainerEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtractionStatus {
    Extracted,
    Skipped,
    Replacing,
    Retry,
    Failed,
    WouldExtract,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStatus::Extracted => "Extracted",
            ExtractionStatus::Skipped => "Skipped",
            ExtractionStatus::Replacing => "Replacing",
            ExtractionStatus::Retry => "Retry",
            ExtractionStatus::Failed => "Failed",
            ExtractionStatus::WouldExtract => "Would Extract",
        }
    }
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outcome for one entry. Never mutated after it is appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub source_path: String,
    pub dest_path: PathBuf,
    pub size: u64,
    pub status: ExtractionStatus,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub dry_run: bool,
}

impl ExtractionRecord {
    pub fn new<S: Into<String>>(
        entry: &ContainerEntry,
        dest_path: &Path,
        status: ExtractionStatus,
        reason: S,
        dry_run: bool,
    ) -> Self {
        Self {
            source_path: entry.name.clone(),
            dest_path: dest_path.to_path_buf(),
            size: entry.size,
            status,
            reason: reason.into(),
            timestamp: Utc::now(),
            dry_run,
        }
    }
}

/// Append-only record sequence shared by all workers of a run.
///
/// Records from every container accumulate here; slice with
/// [`ExtractionLog::since`] using a length taken before a container started.
#[derive(Debug, Default)]
pub struct ExtractionLog {
    records: Mutex<Vec<ExtractionRecord>>,
}

impl ExtractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: ExtractionRecord) {
        self.lock().push(record);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of every record appended so far.
    pub fn snapshot(&self) -> Vec<ExtractionRecord> {
        self.lock().clone()
    }

    /// Copy of the records appended at or after position `start`.
    pub fn since(&self, start: usize) -> Vec<ExtractionRecord> {
        let records = self.lock();
        records.get(start..).map(<[_]>::to_vec).unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ExtractionRecord>> {
        // A panicking appender cannot leave a half-pushed record behind.
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
