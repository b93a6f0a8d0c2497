use crate::container::ZipContainer;
use crate::error::Result;
use crate::extractor::equality::DestinationFileState;
use crate::extractor::path_filter::{resolve_destination, PathFilter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Throughput assumed when estimating how long pending bytes take to extract.
pub const ASSUMED_THROUGHPUT: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatedDuration {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl EstimatedDuration {
    pub fn from_seconds(total: u64) -> Self {
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }

    pub fn from_bytes(pending_bytes: u64) -> Self {
        Self::from_seconds(pending_bytes / ASSUMED_THROUGHPUT)
    }

    pub fn total_seconds(&self) -> u64 {
        self.hours * 3600 + self.minutes * 60 + self.seconds
    }
}

impl fmt::Display for EstimatedDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "~{}h {}m {}s", self.hours, self.minutes, self.seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub path: PathBuf,
    pub total_files: usize,
    pub already_extracted: usize,
    pub pending_bytes: u64,
    pub estimated_time: EstimatedDuration,
}

impl ContainerSummary {
    pub fn files_to_extract(&self) -> usize {
        self.total_files.saturating_sub(self.already_extracted)
    }

    pub fn is_up_to_date(&self) -> bool {
        self.files_to_extract() == 0
    }
}

/// Read-only estimation pass over one container.
///
/// Presence is decided by existence alone, so a stale file at the destination
/// counts as already extracted here even though extraction would replace it.
pub fn estimate(
    container_path: &Path,
    filter: &PathFilter,
    destination: &Path,
) -> Result<ContainerSummary> {
    let mut container = ZipContainer::open(container_path)?;

    let mut total_files = 0;
    let mut already_extracted = 0;
    let mut pending_bytes = 0u64;

    for entry in container.entries()? {
        let Some(relative) = filter.relative_path(&entry.name) else {
            continue;
        };
        if entry.is_dir {
            continue;
        }

        let dest_path = match resolve_destination(destination, relative) {
            Ok(path) => path,
            Err(e) => {
                log::warn!("not planning {}: {}", entry.name, e);
                continue;
            }
        };

        total_files += 1;
        if DestinationFileState::exists(&dest_path) {
            already_extracted += 1;
        } else {
            pending_bytes += entry.size;
        }
    }

    log::debug!(
        "planned {}: {} files, {} present, {} bytes pending",
        container_path.display(),
        total_files,
        already_extracted,
        pending_bytes
    );

    Ok(ContainerSummary {
        path: container_path.to_path_buf(),
        total_files,
        already_extracted,
        pending_bytes,
        estimated_time: EstimatedDuration::from_bytes(pending_bytes),
    })
}
