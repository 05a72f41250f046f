//! Error types for ingestion, ledger and expansion operations

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by the destination store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Database cannot be opened or reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// Table missing from the destination
    #[error("Table not initialized: {0}")]
    NotInitialized(String),

    /// Query error
    #[error("Query error: {0}")]
    Query(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unknown table name
    #[error("Unknown table: {0}")]
    UnknownTable(String),
}

/// Errors that can occur while validating or loading partitioned files
#[derive(Error, Debug)]
pub enum IngestError {
    /// Header does not match the expected file columns
    #[error("Header mismatch in {path}: missing {missing:?}, extra {extra:?}")]
    SchemaMismatch {
        path: PathBuf,
        missing: BTreeSet<String>,
        extra: BTreeSet<String>,
    },

    /// CSV unreadable or corrupt
    #[error("Cannot read {path}: {reason}")]
    ReadFailure { path: PathBuf, reason: String },

    /// Destination rejected the bulk load
    #[error("Load failed for {path}: {reason}")]
    LoadFailure { path: PathBuf, reason: String },

    /// Bulk load exceeded its deadline and was rolled back
    #[error("Load of {path} timed out after {elapsed:?}")]
    Timeout { path: PathBuf, elapsed: Duration },

    /// Ledger upsert failed; the paired load was rolled back
    #[error("Ledger write failed: {0}")]
    LedgerWrite(String),

    /// Partition value cannot be mapped to its typed column
    #[error("Invalid partition value {key}={value} in {path}")]
    InvalidPartition {
        path: PathBuf,
        key: String,
        value: String,
    },

    /// Invalid pattern or unusable configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Store error wrapper
    #[error(transparent)]
    Store(#[from] StoreError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while materializing normalized tables
#[derive(Error, Debug)]
pub enum ExpandError {
    /// A shard failed to transform or upsert
    #[error("Shard {shard} failed: {reason}")]
    Shard { shard: usize, reason: String },

    /// Nothing to do
    #[error("Invalid expansion configuration: {0}")]
    Configuration(String),

    /// Store error wrapper
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StoreError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            StoreError::NotInitialized(table) => {
                format!("Table '{table}' does not exist.\n\nHint: Run 'hive-loader init' first.")
            }
            StoreError::Connection(msg) => {
                format!("Cannot open the database: {msg}\n\nHint: Check --database or the [database] path in your config file.")
            }
            StoreError::InvalidConfig(msg) => {
                format!("Invalid configuration: {msg}\n\nHint: Check the [database] section of your config file.")
            }
            StoreError::UnknownTable(table) => {
                format!("Unknown table: {table}\n\nHint: Table names come from the built-in registry (e.g. tb_sales_estimates_weekly_v2).")
            }
            _ => self.to_string(),
        }
    }
}

impl IngestError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            IngestError::SchemaMismatch {
                path,
                missing,
                extra,
            } => {
                format!(
                    "Header mismatch in {}\n  missing: {missing:?}\n  extra:   {extra:?}\n\n\
                    Hint: The CSV header must list exactly the table columns that are not partition keys.",
                    path.display()
                )
            }
            IngestError::ReadFailure { path, reason } => {
                format!(
                    "Cannot read {}: {reason}\n\nHint: Check that the file is a comma-separated CSV with a header row.",
                    path.display()
                )
            }
            IngestError::Timeout { path, elapsed } => {
                format!(
                    "Load of {} timed out after {}s.\n\nHint: Raise --timeout-secs; the file stays eligible for the next run.",
                    path.display(),
                    elapsed.as_secs()
                )
            }
            IngestError::InvalidPartition { path, key, value } => {
                format!(
                    "Invalid partition value {key}={value} in {}\n\nHint: Partition directories must be named key=value with typed values.",
                    path.display()
                )
            }
            IngestError::Store(err) => err.user_message(),
            _ => self.to_string(),
        }
    }

    /// Whether the error ends the whole run rather than one table
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IngestError::Configuration(_)
                | IngestError::Store(
                    StoreError::Connection(_)
                        | StoreError::InvalidConfig(_)
                        | StoreError::UnknownTable(_)
                )
        )
    }

    /// Whether the file stays eligible for a retry on the next run
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IngestError::LoadFailure { .. }
                | IngestError::Timeout { .. }
                | IngestError::LedgerWrite(_)
                | IngestError::Store(_)
                | IngestError::Io(_)
        )
    }
}

#[cfg(feature = "duckdb-backend")]
impl From<duckdb::Error> for StoreError {
    fn from(err: duckdb::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}
