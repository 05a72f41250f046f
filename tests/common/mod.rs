//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use hive_loader::schema::registry::SALES_ESTIMATES_WEEKLY_V2;
use hive_loader::{
    BulkLoader, IngestError, LoadLedger, LoadRecord, LoadRequest, SchemaDescriptor, StoreError,
};

pub const WEEKLY_DIR: &str = "version=2/format=csv/table=sales_estimates_weekly_v2";
pub const LATEST_DIR: &str = "version=2/format=csv/table=sales_estimates_weekly_v2_latest";

/// In-memory store that counts loads per file and keeps a ledger
#[derive(Default)]
pub struct RecordingStore {
    loads: Mutex<HashMap<String, usize>>,
    ledger: Mutex<HashSet<LoadRecord>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make loads of `file_name` fail until [`RecordingStore::heal`]
    pub fn fail_on(&self, file_name: &str) {
        self.failing.lock().unwrap().insert(file_name.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Committed loads of `file_name`
    pub fn load_count(&self, file_name: &str) -> usize {
        self.loads
            .lock()
            .unwrap()
            .get(file_name)
            .copied()
            .unwrap_or(0)
    }

    pub fn ledger_len(&self) -> usize {
        self.ledger.lock().unwrap().len()
    }
}

impl BulkLoader for RecordingStore {
    fn ensure_table(&self, _schema: &SchemaDescriptor) -> Result<(), StoreError> {
        Ok(())
    }

    fn load_and_record(
        &self,
        request: &LoadRequest<'_>,
        record: &LoadRecord,
        _deadline: Option<Instant>,
    ) -> Result<u64, IngestError> {
        if self.failing.lock().unwrap().contains(&record.file_name) {
            return Err(IngestError::LoadFailure {
                path: request.path.to_path_buf(),
                reason: "connection reset".to_string(),
            });
        }

        let body = fs::read_to_string(request.path)?;
        let rows = body.lines().skip(1).filter(|l| !l.is_empty()).count() as u64;

        *self
            .loads
            .lock()
            .unwrap()
            .entry(record.file_name.clone())
            .or_default() += 1;
        self.mark_loaded(record)?;
        Ok(rows)
    }
}

impl LoadLedger for RecordingStore {
    fn already_loaded(&self, table_name: &str) -> Result<HashSet<String>, StoreError> {
        Ok(self
            .ledger
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.table_name == table_name)
            .map(|r| r.file_name.clone())
            .collect())
    }

    fn mark_loaded(&self, record: &LoadRecord) -> Result<(), StoreError> {
        self.ledger.lock().unwrap().insert(record.clone());
        Ok(())
    }
}

/// Header of a weekly sales file whose path carries every partition key
pub fn weekly_header() -> String {
    SALES_ESTIMATES_WEEKLY_V2
        .expected_file_columns(["marketplace", "root_category_id", "year", "week"])
        .join(",")
}

/// One sales row in [`weekly_header`] column order
pub fn weekly_row(asin: &str, seller_id_mode: &str, revenue: &str) -> String {
    sales_row(asin, seller_id_mode, revenue, "1|2", "2024-01-28")
}

/// Sales row with an explicit breadcrumb and start date
pub fn sales_row(
    asin: &str,
    seller_id_mode: &str,
    revenue: &str,
    breadcrumb: &str,
    start_date: &str,
) -> String {
    [
        start_date,
        "2024-02-03",
        asin,
        "1",
        "10",
        "",
        "Acme",
        "\"Widget, large\"",
        "",
        "19.99",
        "5",
        "4.5",
        breadcrumb,
        "",
        "2023-05-01 00:00:00",
        revenue,
        "",
        "",
        "30",
        "",
        "",
        "",
        seller_id_mode,
        "FBA",
    ]
    .join(",")
}

fn write_file(dir: PathBuf, file_name: &str, header: &str, rows: &[String]) -> PathBuf {
    fs::create_dir_all(&dir).unwrap();
    let mut body = String::from(header);
    body.push('\n');
    for row in rows {
        body.push_str(row);
        body.push('\n');
    }
    let path = dir.join(file_name);
    fs::write(&path, body).unwrap();
    path
}

/// Write `file_name` below the weekly table's partition directories
pub fn write_weekly(base: &Path, week: &str, file_name: &str, rows: &[String]) -> PathBuf {
    write_weekly_with_header(base, week, file_name, &weekly_header(), rows)
}

pub fn write_weekly_with_header(
    base: &Path,
    week: &str,
    file_name: &str,
    header: &str,
    rows: &[String],
) -> PathBuf {
    let dir = base
        .join(WEEKLY_DIR)
        .join("marketplace=US")
        .join("root_category_id=7")
        .join("year=2024")
        .join(format!("week={week}"));
    write_file(dir, file_name, header, rows)
}

/// Write `file_name` below the latest snapshot table
pub fn write_latest(base: &Path, file_name: &str, rows: &[String]) -> PathBuf {
    let dir = base
        .join(LATEST_DIR)
        .join("marketplace=US")
        .join("root_category_id=7");
    write_file(dir, file_name, &weekly_header(), rows)
}
