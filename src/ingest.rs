//! File discovery and console formatting helpers

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::IngestError;
use crate::partition::PartitionPath;

/// Default pattern for partitioned CSV files
pub const DEFAULT_PATTERN: &str = "**/*.csv";

/// A discovered file below a table directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Absolute (or base-relative) path to the file
    pub path: PathBuf,
    /// Path relative to the table directory, `/`-separated
    pub relative_path: String,
    /// File size in bytes
    pub size: u64,
}

impl DiscoveredFile {
    /// Create a new discovered file
    pub fn new(path: PathBuf, relative_path: impl Into<String>, size: u64) -> Self {
        Self {
            path,
            relative_path: relative_path.into(),
            size,
        }
    }

    /// Base name used as the ledger key
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Partition pairs encoded in the relative path
    pub fn partition(&self) -> PartitionPath {
        PartitionPath::parse(&self.relative_path)
    }
}

/// Discover files matching `pattern` below `table_path`, sorted by path.
///
/// A missing table directory yields no files. A directory or file that
/// exists but cannot be read is a [`IngestError::ReadFailure`].
pub fn discover_table_files(
    table_path: &Path,
    pattern: &str,
) -> Result<Vec<DiscoveredFile>, IngestError> {
    if !table_path.is_dir() {
        tracing::warn!(path = %table_path.display(), "Table directory not found");
        return Ok(Vec::new());
    }

    let full_pattern = format!("{}/{}", table_path.display(), pattern);
    let entries = glob::glob(&full_pattern)
        .map_err(|e| IngestError::Configuration(format!("invalid pattern {pattern}: {e}")))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| IngestError::ReadFailure {
            path: e.path().to_path_buf(),
            reason: e.error().to_string(),
        })?;
        if !path.is_file() {
            continue;
        }
        let metadata = fs::metadata(&path).map_err(|e| IngestError::ReadFailure {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let relative = relative_to(&path, table_path);
        files.push(DiscoveredFile::new(path, relative, metadata.len()));
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn relative_to(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Format a duration as `Ns`, `Nm Ns` or `Nh Nm Ns`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Format a number with thousand separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
