use crate::container::entry::{dos_time_to_system_time, ContainerEntry};
use crate::container::EntryReader;
use crate::error::{Result, ZipMergeError};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use zip::extra_fields::ExtraField;
use zip::ZipArchive;

/// A ZIP archive opened for reading.
///
/// Archive readers are not shareable between threads, so every worker opens
/// its own `ZipContainer` over the same path.
pub struct ZipContainer {
    path: PathBuf,
    archive: ZipArchive<BufReader<File>>,
}

impl ZipContainer {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let open_error = |message: String| ZipMergeError::ContainerOpen {
            path: path.display().to_string(),
            message,
        };

        let file = File::open(path).map_err(|e| open_error(e.to_string()))?;
        let archive =
            ZipArchive::new(BufReader::new(file)).map_err(|e| open_error(e.to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            archive,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// Reads the metadata of every entry, in central-directory order.
    pub fn entries(&mut self) -> Result<Vec<ContainerEntry>> {
        let mut entries = Vec::with_capacity(self.archive.len());

        for index in 0..self.archive.len() {
            let file = self
                .archive
                .by_index_raw(index)
                .map_err(|e| ZipMergeError::ContainerOpen {
                    path: self.path.display().to_string(),
                    message: format!("entry {}: {}", index, e),
                })?;

            let modified = extended_mod_time(file.extra_data_fields()).unwrap_or_else(|| {
                file.last_modified()
                    .map(|dt| {
                        dos_time_to_system_time(
                            dt.year(),
                            dt.month(),
                            dt.day(),
                            dt.hour(),
                            dt.minute(),
                            dt.second(),
                        )
                    })
                    .unwrap_or(SystemTime::UNIX_EPOCH)
            });

            entries.push(ContainerEntry::new(
                index,
                file.name().to_string(),
                file.size(),
                modified,
                file.unix_mode(),
                file.is_dir(),
            ));
        }

        Ok(entries)
    }
}

/// Modification time from the 0x5455 extended-timestamp field, which is
/// already UTC. Takes precedence over the zone-less DOS fields.
fn extended_mod_time<'a>(mut fields: impl Iterator<Item = &'a ExtraField>) -> Option<SystemTime> {
    fields.find_map(|field| match field {
        ExtraField::ExtendedTimestamp(ts) => ts
            .mod_time()
            .map(|secs| SystemTime::UNIX_EPOCH + Duration::from_secs(u64::from(secs))),
        _ => None,
    })
}

impl EntryReader for ZipContainer {
    fn open_entry(&mut self, index: usize) -> Result<Box<dyn Read + '_>> {
        let file = self.archive.by_index(index)?;
        Ok(Box::new(file))
    }
}

/// Lazily opened per-worker handle on a container path.
///
/// A failed open is reported to the caller and retried on the next request,
/// so a transient failure only costs the attempt that hit it.
pub struct ContainerHandle {
    path: PathBuf,
    container: Option<ZipContainer>,
}

impl ContainerHandle {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            container: None,
        }
    }
}

impl EntryReader for ContainerHandle {
    fn open_entry(&mut self, index: usize) -> Result<Box<dyn Read + '_>> {
        if self.container.is_none() {
            self.container = Some(ZipContainer::open(&self.path)?);
        }

        match self.container.as_mut() {
            Some(container) => container.open_entry(index),
            None => Err(ZipMergeError::ContainerOpen {
                path: self.path.display().to_string(),
                message: "container handle unavailable".to_string(),
            }),
        }
    }
}
