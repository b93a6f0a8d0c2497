use crate::container::{ContainerEntry, ContainerHandle, EntryReader, ZipContainer};
use crate::error::{Result, ZipMergeError};
use crate::extractor::equality::{DestinationFileState, EqualityOracle};
use crate::extractor::executor::ExtractionExecutor;
use crate::extractor::log::{ExtractionLog, ExtractionRecord, ExtractionStatus};
use crate::extractor::path_filter::{resolve_destination, PathFilter};
use crossbeam_channel::bounded;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

/// A regular-file entry paired with where it lands on disk.
#[derive(Debug, Clone)]
pub struct ExtractionTask {
    pub entry: ContainerEntry,
    pub dest_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionProgress {
    pub processed: usize,
    pub total: usize,
    pub current_file: String,
}

impl ExtractionProgress {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.processed as f64 / self.total as f64) * 100.0
        }
    }

    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

/// Called once per finished task, from whichever worker finished it.
pub type ProgressObserver<'a> = &'a (dyn Fn(&ExtractionProgress) + Sync);

/// Fans the entries of one container out over a fixed pool of workers.
#[derive(Debug, Clone)]
pub struct Scheduler {
    workers: usize,
    dry_run: bool,
    oracle: EqualityOracle,
    executor: ExtractionExecutor,
}

struct PassState<'a> {
    log: &'a ExtractionLog,
    observer: Option<ProgressObserver<'a>>,
    total: usize,
    processed: AtomicUsize,
    failed: AtomicUsize,
    first_error: Mutex<Option<String>>,
}

impl<'a> PassState<'a> {
    fn new(log: &'a ExtractionLog, observer: Option<ProgressObserver<'a>>, total: usize) -> Self {
        Self {
            log,
            observer,
            total,
            processed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            first_error: Mutex::new(None),
        }
    }

    fn record_failure(&self, message: String) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        let mut first = self
            .first_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if first.is_none() {
            *first = Some(message);
        }
    }

    fn advance(&self, current_file: &str) {
        let processed = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(observer) = self.observer {
            observer(&ExtractionProgress {
                processed,
                total: self.total,
                current_file: current_file.to_string(),
            });
        }
    }

    fn into_result(self, container: &Path) -> Result<()> {
        let failed = self.failed.into_inner();
        if failed == 0 {
            return Ok(());
        }

        let first_error = self
            .first_error
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .unwrap_or_default();
        Err(ZipMergeError::EntriesFailed {
            container: container.display().to_string(),
            failed,
            first_error,
        })
    }
}

impl Scheduler {
    pub fn new(workers: usize, dry_run: bool, executor: ExtractionExecutor) -> Self {
        Self {
            workers: workers.max(1),
            dry_run,
            oracle: EqualityOracle::new(),
            executor,
        }
    }

    /// Processes every entry of `container_path` under `filter`.
    ///
    /// Every task runs to completion even when some fail; the failures are
    /// folded into a single [`ZipMergeError::EntriesFailed`] afterwards.
    pub fn run(
        &self,
        container_path: &Path,
        filter: &PathFilter,
        destination: &Path,
        log: &ExtractionLog,
        observer: Option<ProgressObserver<'_>>,
    ) -> Result<()> {
        let mut container = ZipContainer::open(container_path)?;
        let entries = container.entries()?;

        let mut tasks = Vec::new();
        let mut rejected = Vec::new();
        for entry in entries {
            let Some(relative) = filter.relative_path(&entry.name) else {
                continue;
            };

            if entry.is_dir {
                if !self.dry_run {
                    self.create_directory(&entry, relative, destination);
                }
                continue;
            }

            match resolve_destination(destination, relative) {
                Ok(dest_path) => tasks.push(ExtractionTask { entry, dest_path }),
                Err(e) => rejected.push((entry, e)),
            }
        }

        log::info!(
            "processing {} ({} files, {} workers{})",
            container_path.display(),
            tasks.len(),
            self.workers,
            if self.dry_run { ", dry run" } else { "" }
        );

        let state = PassState::new(log, observer, tasks.len() + rejected.len());

        for (entry, e) in rejected {
            log::warn!("refusing to write {}: {}", entry.name, e);
            let dest_path = destination.join(entry.name.trim_start_matches('/'));
            log.append(ExtractionRecord::new(
                &entry,
                &dest_path,
                ExtractionStatus::Failed,
                e.to_string(),
                self.dry_run,
            ));
            state.record_failure(e.to_string());
            state.advance(&entry.name);
        }

        if self.dry_run {
            for task in &tasks {
                self.preview_task(task, &mut container, &state);
            }
        } else {
            self.dispatch(container_path, tasks, &state);
        }

        state.into_result(container_path)
    }

    fn create_directory(&self, entry: &ContainerEntry, relative: &str, destination: &Path) {
        if relative.trim_end_matches('/').is_empty() {
            return;
        }

        match resolve_destination(destination, relative) {
            Ok(dir_path) => {
                if let Err(e) = fs::create_dir_all(&dir_path) {
                    log::warn!("failed to create directory {}: {}", dir_path.display(), e);
                }
            }
            Err(e) => log::warn!("skipping directory {}: {}", entry.name, e),
        }
    }

    fn dispatch(&self, container_path: &Path, tasks: Vec<ExtractionTask>, state: &PassState<'_>) {
        self.dispatch_with(tasks, state, || ContainerHandle::new(container_path));
    }

    /// Each worker builds its own reader with `open_reader` and keeps it for
    /// the whole pass.
    fn dispatch_with<R, F>(&self, tasks: Vec<ExtractionTask>, state: &PassState<'_>, open_reader: F)
    where
        R: EntryReader,
        F: Fn() -> R + Sync,
    {
        // Zero capacity: a send waits until a worker is free to take the task.
        let (sender, receiver) = bounded::<ExtractionTask>(0);
        let open_reader = &open_reader;

        thread::scope(|scope| {
            for _ in 0..self.workers {
                let receiver = receiver.clone();
                scope.spawn(move || {
                    let mut reader = open_reader();
                    for task in receiver.iter() {
                        self.process_task(&task, &mut reader, state);
                    }
                });
            }
            drop(receiver);

            for task in tasks {
                if sender.send(task).is_err() {
                    break;
                }
            }
            drop(sender);
        });
    }

    fn process_task(&self, task: &ExtractionTask, reader: &mut dyn EntryReader, state: &PassState<'_>) {
        let entry = &task.entry;
        let dest_path = task.dest_path.as_path();
        let record = |status: ExtractionStatus, reason: String| {
            state
                .log
                .append(ExtractionRecord::new(entry, dest_path, status, reason, false));
        };

        let verdict = self.oracle.evaluate(entry, dest_path, reader);
        if verdict.equal {
            log::debug!("skipping {}: already matches", entry.name);
            record(
                ExtractionStatus::Skipped,
                "File already exists and matches".to_string(),
            );
            state.advance(&entry.name);
            return;
        }

        if DestinationFileState::exists(dest_path) {
            log::debug!("replacing {}: {}", dest_path.display(), verdict.reason);
            record(ExtractionStatus::Replacing, verdict.reason);
        }

        let max_attempts = self.executor.policy().max_attempts;
        let result = self
            .executor
            .extract_with_retry(entry, dest_path, reader, |attempt, e| {
                record(
                    ExtractionStatus::Retry,
                    format!("Attempt {}/{} failed: {}", attempt, max_attempts, e),
                );
            });

        match result {
            Ok(bytes) => {
                log::debug!("extracted {} ({} bytes)", dest_path.display(), bytes);
                record(ExtractionStatus::Extracted, String::new());
            }
            Err(e) => {
                let reason = format!("All {} attempts failed: {}", max_attempts, e);
                record(ExtractionStatus::Failed, reason.clone());
                state.record_failure(format!("{}: {}", dest_path.display(), reason));
            }
        }

        state.advance(&entry.name);
    }

    fn preview_task(&self, task: &ExtractionTask, reader: &mut dyn EntryReader, state: &PassState<'_>) {
        let entry = &task.entry;
        let verdict = self.oracle.evaluate(entry, &task.dest_path, reader);

        let (status, reason) = if verdict.equal {
            (
                ExtractionStatus::Skipped,
                "File already exists and matches".to_string(),
            )
        } else if DestinationFileState::exists(&task.dest_path) {
            (
                ExtractionStatus::WouldExtract,
                format!("File exists but {}", verdict.reason),
            )
        } else {
            (
                ExtractionStatus::WouldExtract,
                "File does not exist".to_string(),
            )
        };

        state
            .log
            .append(ExtractionRecord::new(entry, &task.dest_path, status, reason, true));
        state.advance(&entry.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::testing::ZipFixture;
    use crate::extractor::executor::{RetryPolicy, MAX_ATTEMPTS};
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    fn scheduler(workers: usize, dry_run: bool) -> Scheduler {
        let policy = RetryPolicy::new(MAX_ATTEMPTS, Duration::from_millis(5));
        Scheduler::new(workers, dry_run, ExtractionExecutor::new(policy))
    }

    fn sample_container(dir: &Path) -> PathBuf {
        ZipFixture::new()
            .dir("Takeout/")
            .dir("Takeout/Drive/")
            .file("Takeout/Drive/a.txt", b"alpha")
            .file("Takeout/Drive/b.txt", b"bravo bravo")
            .dir("Takeout/Drive/Photos/")
            .file("Takeout/Drive/Photos/c.jpg", b"not really a jpeg")
            .file("Takeout/Mail/inbox.mbox", b"From nobody")
            .write_to(dir.join("takeout-001.zip"))
    }

    fn tree(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let relative = e.path().strip_prefix(root).unwrap().to_path_buf();
                (relative, fs::read(e.path()).unwrap())
            })
            .collect()
    }

    fn statuses(log: &ExtractionLog) -> Vec<ExtractionStatus> {
        log.snapshot().iter().map(|r| r.status).collect()
    }

    #[test]
    fn test_extracts_every_file() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = sample_container(temp_dir.path());
        let dest = temp_dir.path().join("dest");

        let log = ExtractionLog::new();
        scheduler(4, false)
            .run(&zip_path, &PathFilter::new(""), &dest, &log, None)
            .unwrap();

        assert_eq!(log.len(), 4);
        assert!(statuses(&log)
            .iter()
            .all(|s| *s == ExtractionStatus::Extracted));
        assert_eq!(
            fs::read(dest.join("Takeout/Drive/Photos/c.jpg")).unwrap(),
            b"not really a jpeg"
        );
    }

    #[test]
    fn test_second_run_only_skips() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = sample_container(temp_dir.path());
        let dest = temp_dir.path().join("dest");
        let filter = PathFilter::new("");

        let log = ExtractionLog::new();
        scheduler(2, false)
            .run(&zip_path, &filter, &dest, &log, None)
            .unwrap();
        let first_tree = tree(&dest);

        let before = log.len();
        scheduler(2, false)
            .run(&zip_path, &filter, &dest, &log, None)
            .unwrap();

        let second_pass = log.since(before);
        assert_eq!(second_pass.len(), 4);
        assert!(second_pass
            .iter()
            .all(|r| r.status == ExtractionStatus::Skipped
                && r.reason == "File already exists and matches"));
        assert_eq!(tree(&dest), first_tree);
    }

    #[test]
    fn test_stale_file_is_replaced() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = ZipFixture::new()
            .file("doc.txt", b"fresh content")
            .write_to(temp_dir.path().join("a.zip"));
        let dest = temp_dir.path().join("dest");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("doc.txt"), b"old").unwrap();

        let log = ExtractionLog::new();
        scheduler(1, false)
            .run(&zip_path, &PathFilter::new(""), &dest, &log, None)
            .unwrap();

        let records = log.snapshot();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, ExtractionStatus::Replacing);
        assert!(records[0].reason.contains("size mismatch"));
        assert_eq!(records[1].status, ExtractionStatus::Extracted);
        assert_eq!(fs::read(dest.join("doc.txt")).unwrap(), b"fresh content");
    }

    #[test]
    fn test_start_path_limits_extraction() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = sample_container(temp_dir.path());
        let dest = temp_dir.path().join("dest");

        let log = ExtractionLog::new();
        scheduler(3, false)
            .run(&zip_path, &PathFilter::new("Takeout/Drive"), &dest, &log, None)
            .unwrap();

        assert_eq!(log.len(), 3);
        assert!(dest.join("a.txt").is_file());
        assert!(dest.join("Photos/c.jpg").is_file());
        assert!(!dest.join("Takeout").exists());
        assert!(!dest.join("Mail").exists());
    }

    #[test]
    fn test_dry_run_creates_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = sample_container(temp_dir.path());
        let dest = temp_dir.path().join("dest");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("stale.txt"), b"untouched").unwrap();
        let before = tree(&dest);
        let dirs_before = WalkDir::new(&dest).into_iter().count();

        let log = ExtractionLog::new();
        scheduler(4, true)
            .run(&zip_path, &PathFilter::new(""), &dest, &log, None)
            .unwrap();

        let records = log.snapshot();
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.dry_run));
        assert!(records
            .iter()
            .all(|r| r.status == ExtractionStatus::WouldExtract
                && r.reason == "File does not exist"));
        assert_eq!(tree(&dest), before);
        assert_eq!(WalkDir::new(&dest).into_iter().count(), dirs_before);
    }

    #[test]
    fn test_dry_run_reports_mismatch_reason() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = ZipFixture::new()
            .file("doc.txt", b"fresh content")
            .write_to(temp_dir.path().join("a.zip"));
        let dest = temp_dir.path().join("dest");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("doc.txt"), b"old").unwrap();

        let log = ExtractionLog::new();
        scheduler(1, true)
            .run(&zip_path, &PathFilter::new(""), &dest, &log, None)
            .unwrap();

        let records = log.snapshot();
        assert_eq!(records.len(), 1);
        assert!(records[0].reason.starts_with("File exists but size mismatch"));
        assert_eq!(fs::read(dest.join("doc.txt")).unwrap(), b"old");
    }

    #[test]
    fn test_retry_exhaustion_is_logged_and_aggregated() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = ZipFixture::new()
            .file("blocked/doc.txt", b"content")
            .file("fine.txt", b"fine")
            .write_to(temp_dir.path().join("a.zip"));
        let dest = temp_dir.path().join("dest");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("blocked"), b"a file, not a directory").unwrap();

        let log = ExtractionLog::new();
        let result = scheduler(2, false).run(&zip_path, &PathFilter::new(""), &dest, &log, None);

        match result {
            Err(ZipMergeError::EntriesFailed { failed, .. }) => assert_eq!(failed, 1),
            other => panic!("expected EntriesFailed, got {:?}", other),
        }

        let blocked: Vec<_> = log
            .snapshot()
            .into_iter()
            .filter(|r| r.source_path == "blocked/doc.txt")
            .collect();
        assert_eq!(blocked.len(), 3);
        assert_eq!(blocked[0].status, ExtractionStatus::Retry);
        assert!(blocked[0].reason.starts_with("Attempt 1/3 failed"));
        assert_eq!(blocked[1].status, ExtractionStatus::Retry);
        assert!(blocked[1].reason.starts_with("Attempt 2/3 failed"));
        assert_eq!(blocked[2].status, ExtractionStatus::Failed);
        assert!(blocked[2].reason.contains("All 3 attempts failed"));

        assert_eq!(fs::read(dest.join("fine.txt")).unwrap(), b"fine");
    }

    #[test]
    fn test_traversing_entry_is_failed_not_written() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = ZipFixture::new()
            .file("../escape.txt", b"outside")
            .file("inside.txt", b"inside")
            .write_to(temp_dir.path().join("a.zip"));
        let dest = temp_dir.path().join("dest");

        let log = ExtractionLog::new();
        let result = scheduler(2, false).run(&zip_path, &PathFilter::new(""), &dest, &log, None);

        assert!(matches!(result, Err(ZipMergeError::EntriesFailed { .. })));
        assert!(!temp_dir.path().join("escape.txt").exists());
        assert!(dest.join("inside.txt").is_file());

        let failed: Vec<_> = log
            .snapshot()
            .into_iter()
            .filter(|r| r.status == ExtractionStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].source_path, "../escape.txt");
    }

    #[test]
    fn test_progress_observer_sees_every_task() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = sample_container(temp_dir.path());
        let dest = temp_dir.path().join("dest");

        let seen = Mutex::new(Vec::new());
        let observer = |progress: &ExtractionProgress| {
            seen.lock().unwrap().push(progress.clone());
        };

        let log = ExtractionLog::new();
        scheduler(4, false)
            .run(&zip_path, &PathFilter::new(""), &dest, &log, Some(&observer))
            .unwrap();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|p| p.total == 4));
        assert!(seen.iter().any(|p| p.is_complete()));
    }

    #[test]
    fn test_corrupt_container_is_open_error() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = temp_dir.path().join("corrupt.zip");
        fs::write(&zip_path, b"definitely not a zip").unwrap();

        let log = ExtractionLog::new();
        let result = scheduler(2, false).run(
            &zip_path,
            &PathFilter::new(""),
            temp_dir.path(),
            &log,
            None,
        );
        assert!(matches!(result, Err(ZipMergeError::ContainerOpen { .. })));
        assert!(log.is_empty());
    }

    #[test]
    fn test_directory_at_destination_is_not_an_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = ZipFixture::new()
            .file("doc.txt", b"content")
            .write_to(temp_dir.path().join("a.zip"));
        let dest = temp_dir.path().join("dest");
        fs::create_dir_all(dest.join("doc.txt")).unwrap();

        let preview = ExtractionLog::new();
        scheduler(1, true)
            .run(&zip_path, &PathFilter::new(""), &dest, &preview, None)
            .unwrap();
        let records = preview.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ExtractionStatus::WouldExtract);
        assert_eq!(records[0].reason, "File does not exist");

        let log = ExtractionLog::new();
        let result = scheduler(1, false).run(&zip_path, &PathFilter::new(""), &dest, &log, None);
        assert!(matches!(result, Err(ZipMergeError::EntriesFailed { .. })));
        assert!(!statuses(&log).contains(&ExtractionStatus::Replacing));
        assert!(dest.join("doc.txt").is_dir());
    }

    #[test]
    fn test_dry_run_skips_matching_files() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = sample_container(temp_dir.path());
        let dest = temp_dir.path().join("dest");
        let filter = PathFilter::new("");

        scheduler(2, false)
            .run(&zip_path, &filter, &dest, &ExtractionLog::new(), None)
            .unwrap();
        let before = tree(&dest);
        let mtime_before = fs::metadata(dest.join("Takeout/Drive/a.txt"))
            .unwrap()
            .modified()
            .unwrap();

        let log = ExtractionLog::new();
        scheduler(2, true)
            .run(&zip_path, &filter, &dest, &log, None)
            .unwrap();

        let records = log.snapshot();
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.dry_run
            && r.status == ExtractionStatus::Skipped
            && r.reason == "File already exists and matches"));
        assert_eq!(tree(&dest), before);
        assert_eq!(
            fs::metadata(dest.join("Takeout/Drive/a.txt"))
                .unwrap()
                .modified()
                .unwrap(),
            mtime_before
        );
    }

    /// Reader that tracks how many workers are inside `open_entry` at once.
    struct GaugedReader<'a> {
        inner: ZipContainer,
        active: &'a AtomicUsize,
        peak: &'a AtomicUsize,
    }

    impl EntryReader for GaugedReader<'_> {
        fn open_entry(&mut self, index: usize) -> Result<Box<dyn std::io::Read + '_>> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.inner.open_entry(index)
        }
    }

    #[test]
    fn test_in_flight_tasks_never_exceed_workers() {
        let temp_dir = TempDir::new().unwrap();
        let mut fixture = ZipFixture::new();
        for i in 0..12 {
            fixture = fixture.file(&format!("file-{:02}.txt", i), b"payload");
        }
        let zip_path = fixture.write_to(temp_dir.path().join("many.zip"));
        let dest = temp_dir.path().join("dest");

        let tasks: Vec<ExtractionTask> = ZipContainer::open(&zip_path)
            .unwrap()
            .entries()
            .unwrap()
            .into_iter()
            .map(|entry| ExtractionTask {
                dest_path: dest.join(&entry.name),
                entry,
            })
            .collect();

        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let log = ExtractionLog::new();
        let state = PassState::new(&log, None, tasks.len());

        scheduler(3, false).dispatch_with(tasks, &state, || GaugedReader {
            inner: ZipContainer::open(&zip_path).unwrap(),
            active: &active,
            peak: &peak,
        });
        state.into_result(&zip_path).unwrap();

        let peak = peak.into_inner();
        assert!(peak >= 1 && peak <= 3, "peak concurrency was {}", peak);
        assert_eq!(log.len(), 12);
        assert!(statuses(&log)
            .iter()
            .all(|s| *s == ExtractionStatus::Extracted));
    }

    #[test]
    fn test_progress_percentage() {
        let progress = ExtractionProgress {
            processed: 1,
            total: 4,
            current_file: "a.txt".to_string(),
        };
        assert_eq!(progress.percentage(), 25.0);
        assert!(!progress.is_complete());
    }
}
