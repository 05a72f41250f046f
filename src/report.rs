//! Run summaries for loads and expansions

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ExpansionTarget;
use crate::ingest::{format_duration, format_number};
use crate::validate::HeaderMismatch;

/// A file committed together with its ledger record
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedFile {
    pub relative_path: String,
    pub rows: u64,
}

/// A file that did not load; it stays eligible for the next run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFile {
    pub relative_path: String,
    pub reason: String,
    /// Whether a plain re-run can succeed
    pub retryable: bool,
}

/// Outcome of loading one table
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReport {
    pub table_name: String,
    pub files_discovered: usize,
    pub header_mismatches: Vec<HeaderMismatch>,
    /// Base names skipped because the ledger already has them
    pub skipped: Vec<String>,
    pub loaded: Vec<LoadedFile>,
    pub failed: Vec<FailedFile>,
    /// Set when a file or directory could not be read; no further files
    /// were loaded for the table
    pub read_failure: Option<String>,
    /// Table-level failure such as DDL or a ledger read
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl TableReport {
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.header_mismatches.is_empty()
            && self.failed.is_empty()
            && self.read_failure.is_none()
            && self.error.is_none()
    }

    pub fn rows_loaded(&self) -> u64 {
        self.loaded.iter().map(|f| f.rows).sum()
    }

    /// One-line summary for console output
    pub fn summary(&self) -> String {
        format!(
            "{}: {} discovered, {} skipped, {} loaded ({} rows), {} rejected, {} failed in {}",
            self.table_name,
            self.files_discovered,
            self.skipped.len(),
            self.loaded.len(),
            format_number(self.rows_loaded()),
            self.header_mismatches.len(),
            self.failed.len(),
            format_duration(std::time::Duration::from_millis(self.duration_ms)),
        )
    }
}

/// Outcome of one ingestion run across tables
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub tables: Vec<TableReport>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.tables.iter().all(TableReport::is_success)
    }

    pub fn files_loaded(&self) -> usize {
        self.tables.iter().map(|t| t.loaded.len()).sum()
    }

    pub fn files_failed(&self) -> usize {
        self.tables.iter().map(|t| t.failed.len()).sum()
    }

    pub fn rows_loaded(&self) -> u64 {
        self.tables.iter().map(TableReport::rows_loaded).sum()
    }
}

/// A shard that failed; its rows in the target were left untouched
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedShard {
    pub shard: usize,
    pub reason: String,
}

/// Outcome of materializing one derived table
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandReport {
    pub target: ExpansionTarget,
    pub source_table: String,
    pub target_table: String,
    pub shards_total: usize,
    pub shards_processed: usize,
    pub rows_read: u64,
    /// Business keys after deduplication
    pub groups: u64,
    pub rows_emitted: u64,
    /// Empty seller segments dropped by the skip policy
    pub rows_skipped: u64,
    pub failed_shards: Vec<FailedShard>,
    pub duration_ms: u64,
}

impl ExpandReport {
    pub fn new(target: ExpansionTarget, shards_total: usize) -> Self {
        Self {
            target,
            source_table: target.source_table().to_string(),
            target_table: target.target_table().to_string(),
            shards_total,
            shards_processed: 0,
            rows_read: 0,
            groups: 0,
            rows_emitted: 0,
            rows_skipped: 0,
            failed_shards: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed_shards.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} -> {}: {}/{} shards, {} rows read, {} groups, {} rows emitted, {} skipped, {} failed shards in {}",
            self.source_table,
            self.target_table,
            self.shards_processed,
            self.shards_total,
            format_number(self.rows_read),
            format_number(self.groups),
            format_number(self.rows_emitted),
            format_number(self.rows_skipped),
            self.failed_shards.len(),
            format_duration(std::time::Duration::from_millis(self.duration_ms)),
        )
    }
}
