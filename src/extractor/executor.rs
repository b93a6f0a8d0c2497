use crate::container::{ContainerEntry, EntryReader};
use crate::error::{Result, ZipMergeError};
use filetime::FileTime;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Attempts made per entry before it is reported as failed.
pub const MAX_ATTEMPTS: u32 = 3;

/// Pause between a failed attempt and the next one.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(2);

const COPY_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            backoff: RETRY_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

/// Writes one entry to disk and restores its permission bits and timestamps.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionExecutor {
    policy: RetryPolicy,
}

impl ExtractionExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Runs up to `max_attempts` attempts. `on_retry` is called with the
    /// attempt number and error of every failed attempt except the last;
    /// the last error is returned once all attempts are exhausted.
    pub fn extract_with_retry<F>(
        &self,
        entry: &ContainerEntry,
        dest_path: &Path,
        reader: &mut dyn EntryReader,
        mut on_retry: F,
    ) -> Result<u64>
    where
        F: FnMut(u32, &ZipMergeError),
    {
        let mut attempt = 1;
        loop {
            match self.extract_once(entry, dest_path, reader) {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempt < self.policy.max_attempts => {
                    log::debug!(
                        "attempt {}/{} for {} failed: {}",
                        attempt,
                        self.policy.max_attempts,
                        dest_path.display(),
                        e
                    );
                    on_retry(attempt, &e);
                    thread::sleep(self.policy.backoff);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// A single attempt. Any failure, including restoring metadata after the
    /// bytes landed, fails the whole attempt.
    pub fn extract_once(
        &self,
        entry: &ContainerEntry,
        dest_path: &Path,
        reader: &mut dyn EntryReader,
    ) -> Result<u64> {
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut source = reader.open_entry(entry.index)?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(entry.mode);
        }
        let dest_file = options.open(dest_path)?;

        let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, dest_file);
        let copied = io::copy(&mut source, &mut writer)?;
        writer.flush()?;
        let dest_file = writer.into_inner().map_err(|e| e.into_error())?;
        drop(dest_file);

        if copied != entry.size {
            return Err(ZipMergeError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("copied {} of {} bytes", copied, entry.size),
            )));
        }

        restore_permissions(dest_path, entry.mode)?;

        let modified = FileTime::from_system_time(entry.modified);
        filetime::set_file_times(dest_path, modified, modified).map_err(|e| {
            ZipMergeError::Io(io::Error::new(
                e.kind(),
                format!("failed to set file times: {}", e),
            ))
        })?;

        Ok(copied)
    }
}

impl Default for ExtractionExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[cfg(unix)]
fn restore_permissions(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn restore_permissions(path: &Path, mode: u32) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(mode & 0o222 == 0);
    fs::set_permissions(path, permissions)
}
