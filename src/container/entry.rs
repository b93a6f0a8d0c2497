use chrono::{NaiveDate, TimeZone, Utc};
use std::time::SystemTime;

const DEFAULT_FILE_MODE: u32 = 0o644;
const DEFAULT_DIR_MODE: u32 = 0o755;

/// Metadata of one file or directory record inside a container.
///
/// Content is not held here; it is streamed on demand through an
/// [`EntryReader`](crate::container::EntryReader) using `index`.
#[derive(Debug, Clone)]
pub struct ContainerEntry {
    pub index: usize,
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
    pub mode: u32,
    pub is_dir: bool,
}

impl ContainerEntry {
    pub fn new(
        index: usize,
        name: String,
        size: u64,
        modified: SystemTime,
        mode: Option<u32>,
        is_dir: bool,
    ) -> Self {
        let mode = match mode {
            Some(bits) if bits & 0o777 != 0 => bits & 0o7777,
            _ if is_dir => DEFAULT_DIR_MODE,
            _ => DEFAULT_FILE_MODE,
        };

        Self {
            index,
            name,
            size,
            modified,
            mode,
            is_dir,
        }
    }
}

/// Converts a DOS date/time pair into a `SystemTime`.
///
/// ZIP timestamps carry no zone; they are read as UTC. Out-of-range values
/// fall back to the Unix epoch.
pub fn dos_time_to_system_time(
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
) -> SystemTime {
    NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, second as u32))
        .map(|naive| SystemTime::from(Utc.from_utc_datetime(&naive)))
        .unwrap_or(SystemTime::UNIX_EPOCH)
}
