use crate::container::{ContainerEntry, EntryReader};
use crate::error::Result;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Entries at or above this size are compared on size and time only.
pub const HASH_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Allowed modification-time drift, absorbing filesystem timestamp granularity.
pub const MTIME_TOLERANCE: Duration = Duration::from_secs(2);

/// What is currently on disk at a destination path.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationFileState {
    pub size: u64,
    pub modified: SystemTime,
    pub mode: u32,
}

impl DestinationFileState {
    /// Stats a destination path. A directory is reported as an error.
    pub fn observe(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        if metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "path is a directory",
            ));
        }

        Ok(Self {
            size: metadata.len(),
            modified: metadata.modified()?,
            mode: file_mode(&metadata),
        })
    }

    /// True when a regular file (not a directory) exists at `path`.
    pub fn exists(path: &Path) -> bool {
        fs::metadata(path).map(|m| !m.is_dir()).unwrap_or(false)
    }
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EqualityVerdict {
    pub equal: bool,
    pub reason: String,
}

impl EqualityVerdict {
    pub fn equal() -> Self {
        Self {
            equal: true,
            reason: String::new(),
        }
    }

    pub fn differs<S: Into<String>>(reason: S) -> Self {
        Self {
            equal: false,
            reason: reason.into(),
        }
    }
}

/// Decides whether an existing destination file already matches an entry.
///
/// Checks run cheapest first: stat, size, modification time, then a SHA-256
/// comparison for entries below [`HASH_THRESHOLD`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualityOracle;

impl EqualityOracle {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(
        &self,
        entry: &ContainerEntry,
        dest_path: &Path,
        reader: &mut dyn EntryReader,
    ) -> EqualityVerdict {
        let state = match DestinationFileState::observe(dest_path) {
            Ok(state) => state,
            Err(e) => return EqualityVerdict::differs(format!("error accessing file: {}", e)),
        };

        if state.size != entry.size {
            return EqualityVerdict::differs(format!(
                "size mismatch: zip={}, existing={}",
                entry.size, state.size
            ));
        }

        if time_distance(state.modified, entry.modified) > MTIME_TOLERANCE {
            return EqualityVerdict::differs(format!(
                "time mismatch: zip={}, existing={}",
                format_time(entry.modified),
                format_time(state.modified)
            ));
        }

        if entry.size >= HASH_THRESHOLD {
            return EqualityVerdict::equal();
        }

        match same_content(entry, dest_path, reader) {
            Ok(true) => EqualityVerdict::equal(),
            Ok(false) => EqualityVerdict::differs("content mismatch (different hash)"),
            Err(e) => EqualityVerdict::differs(format!("hash comparison error: {}", e)),
        }
    }
}

fn same_content(
    entry: &ContainerEntry,
    dest_path: &Path,
    reader: &mut dyn EntryReader,
) -> Result<bool> {
    let entry_digest = {
        let mut stream = reader.open_entry(entry.index)?;
        digest(&mut stream)?
    };

    let mut existing = fs::File::open(dest_path)?;
    let existing_digest = digest(&mut existing)?;

    Ok(entry_digest == existing_digest)
}

fn digest<R: io::Read + ?Sized>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut hasher = Sha256::new();
    io::copy(reader, &mut hasher)?;
    Ok(hasher.finalize().to_vec())
}

fn time_distance(a: SystemTime, b: SystemTime) -> Duration {
    match a.duration_since(b) {
        Ok(diff) => diff,
        Err(e) => e.duration(),
    }
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}
