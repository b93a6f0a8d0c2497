use crate::error::{Result, ZipMergeError};
use std::path::{Component, Path, PathBuf};

/// Restricts extraction to the entries under a start path inside a container.
///
/// Matching is a literal string-prefix test, not segment-aware: a start path
/// of `subfolder` also admits `subfolderX/file.txt`.
#[derive(Debug, Clone)]
pub struct PathFilter {
    start_path: String,
}

impl PathFilter {
    pub fn new(start_path: &str) -> Self {
        Self {
            start_path: clean_start_path(start_path),
        }
    }

    pub fn start_path(&self) -> &str {
        &self.start_path
    }

    pub fn is_unrestricted(&self) -> bool {
        self.start_path.is_empty()
    }

    /// Returns the destination-relative path of an entry, or `None` when the
    /// entry lies outside the start path.
    pub fn relative_path<'a>(&self, entry_name: &'a str) -> Option<&'a str> {
        if self.is_unrestricted() {
            return Some(entry_name);
        }

        entry_name
            .strip_prefix(self.start_path.as_str())
            .map(|rest| rest.trim_start_matches('/'))
    }
}

/// Lexically cleans a start path: backslashes become `/`, empty and `.`
/// segments are dropped, and `..` pops the previous segment. `""` and `"."`
/// both clean to the empty string, meaning no restriction.
pub fn clean_start_path(raw: &str) -> String {
    let normalized = raw.replace('\\', "/");
    let absolute = normalized.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(last) if *last != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push(segment);
                }
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Joins an entry's relative path onto the destination root.
///
/// Rejects empty paths and any path with a root, drive prefix or `..`
/// component, so the result never escapes `root`.
pub fn resolve_destination(root: &Path, relative: &str) -> Result<PathBuf> {
    let trimmed = relative.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ZipMergeError::InvalidPath {
            path: format!("empty relative path for entry '{}'", relative),
        });
    }

    let relative_path = Path::new(trimmed);
    for component in relative_path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ZipMergeError::InvalidPath {
                    path: format!("{} escapes the destination root", relative),
                });
            }
        }
    }

    Ok(root.join(relative_path))
}
