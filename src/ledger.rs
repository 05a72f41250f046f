//! Load ledger: which files have already been ingested per table
//!
//! A record is written in the same transaction as the file's rows, so a
//! file either has both its data and its record or neither. Anything not
//! recorded stays eligible for the next run.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, StoreError};
use crate::ingest::DiscoveredFile;
use crate::partition::PartitionPath;

pub const DEFAULT_MARKETPLACE: &str = "0";
pub const DEFAULT_ROOT_CATEGORY_ID: i64 = -1;
pub const DEFAULT_YEAR: i32 = 0;
pub const DEFAULT_WEEK: &str = "0";

/// Identity of one ingested file; every field is part of the key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadRecord {
    pub table_name: String,
    pub marketplace: String,
    pub root_category_id: i64,
    pub year: i32,
    pub week: String,
    pub file_name: String,
}

impl LoadRecord {
    /// Build a record from a file's partition values. Keys the path does
    /// not carry take the ledger defaults.
    pub fn from_partition(
        table_name: &str,
        partition: &PartitionPath,
        path: &Path,
        file_name: &str,
    ) -> Result<Self, IngestError> {
        let invalid = |key: &str, value: &str| IngestError::InvalidPartition {
            path: path.to_path_buf(),
            key: key.to_string(),
            value: value.to_string(),
        };

        let root_category_id = match partition.get("root_category_id") {
            Some(value) => value
                .parse::<i64>()
                .map_err(|_| invalid("root_category_id", value))?,
            None => DEFAULT_ROOT_CATEGORY_ID,
        };
        let year = match partition.get("year") {
            Some(value) => value.parse::<i32>().map_err(|_| invalid("year", value))?,
            None => DEFAULT_YEAR,
        };

        Ok(Self {
            table_name: table_name.to_string(),
            marketplace: partition
                .get("marketplace")
                .unwrap_or(DEFAULT_MARKETPLACE)
                .to_string(),
            root_category_id,
            year,
            week: partition.get("week").unwrap_or(DEFAULT_WEEK).to_string(),
            file_name: file_name.to_string(),
        })
    }
}

/// Durable per-table record of loaded files
pub trait LoadLedger: Send + Sync {
    /// Base names of every file recorded for `table_name`
    fn already_loaded(&self, table_name: &str) -> Result<HashSet<String>, StoreError>;

    /// Insert the record, or overwrite it if the key already exists
    fn mark_loaded(&self, record: &LoadRecord) -> Result<(), StoreError>;

    /// `files` minus those whose base name is already recorded
    fn pending(
        &self,
        table_name: &str,
        files: Vec<DiscoveredFile>,
    ) -> Result<Vec<DiscoveredFile>, StoreError> {
        let loaded = self.already_loaded(table_name)?;
        Ok(files
            .into_iter()
            .filter(|f| !loaded.contains(&f.file_name()))
            .collect())
    }
}
