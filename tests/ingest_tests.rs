//! Integration tests for validation, loading and the ledger

mod common;

use std::fs;
use std::sync::Arc;

use hive_loader::schema::source_tables;
use hive_loader::{BulkLoadExecutor, IngestConfig, LoadLedger};
use tempfile::TempDir;

use common::{RecordingStore, weekly_header, weekly_row, write_weekly, write_weekly_with_header};

const WEEKLY: &str = "tb_sales_estimates_weekly_v2";

fn executor(store: &Arc<RecordingStore>, base: &std::path::Path) -> BulkLoadExecutor {
    let config = IngestConfig::builder()
        .base_path(base)
        .table(WEEKLY)
        .workers(3)
        .build()
        .expect("valid config");
    BulkLoadExecutor::new(store.clone(), store.clone(), config).expect("executor")
}

#[test]
fn test_each_file_loads_once_across_runs() {
    let dir = TempDir::new().unwrap();
    write_weekly(dir.path(), "01", "a.csv", &[weekly_row("B01", "A", "10")]);
    write_weekly(dir.path(), "01", "b.csv", &[weekly_row("B02", "A|B", "20")]);
    write_weekly(dir.path(), "02", "c.csv", &[weekly_row("B03", "C", "30")]);

    let store = Arc::new(RecordingStore::new());
    let exec = executor(&store, dir.path());

    let first = exec.run().unwrap();
    assert!(first.is_success());
    assert_eq!(first.files_loaded(), 3);
    assert_eq!(first.rows_loaded(), 3);

    let second = exec.run().unwrap();
    assert!(second.is_success());
    assert_eq!(second.files_loaded(), 0);
    assert_eq!(second.tables[0].skipped.len(), 3);

    for file in ["a.csv", "b.csv", "c.csv"] {
        assert_eq!(store.load_count(file), 1, "{file} loaded more than once");
    }
    let loaded = store.already_loaded(WEEKLY).unwrap();
    assert_eq!(loaded.len(), 3);
}

#[test]
fn test_renamed_column_excludes_only_that_file() {
    let dir = TempDir::new().unwrap();
    let renamed = weekly_header().replace("revenue_1p", "Revenue_1p");
    write_weekly(dir.path(), "01", "good.csv", &[weekly_row("B01", "A", "10")]);
    write_weekly_with_header(
        dir.path(),
        "01",
        "renamed.csv",
        &renamed,
        &[weekly_row("B02", "A", "10")],
    );

    let store = Arc::new(RecordingStore::new());
    let report = executor(&store, dir.path()).run().unwrap();
    let table = &report.tables[0];

    assert!(!report.is_success());
    assert_eq!(table.loaded.len(), 1);
    assert_eq!(table.header_mismatches.len(), 1);
    let mismatch = &table.header_mismatches[0];
    assert!(mismatch.relative_path.ends_with("renamed.csv"));
    assert!(mismatch.missing.contains("revenue_1p"));
    assert!(mismatch.extra.contains("Revenue_1p"));
    assert_eq!(store.load_count("renamed.csv"), 0);
    assert_eq!(store.load_count("good.csv"), 1);
}

#[test]
fn test_failed_load_is_retried_on_next_run() {
    let dir = TempDir::new().unwrap();
    write_weekly(dir.path(), "01", "a.csv", &[weekly_row("B01", "A", "10")]);
    write_weekly(dir.path(), "01", "b.csv", &[weekly_row("B02", "B", "10")]);

    let store = Arc::new(RecordingStore::new());
    store.fail_on("b.csv");
    let exec = executor(&store, dir.path());

    let first = exec.run().unwrap();
    let table = &first.tables[0];
    assert_eq!(table.loaded.len(), 1);
    assert_eq!(table.failed.len(), 1);
    assert!(table.failed[0].retryable);
    assert!(!store.already_loaded(WEEKLY).unwrap().contains("b.csv"));

    store.heal();
    let second = exec.run().unwrap();
    assert!(second.is_success());
    assert_eq!(second.tables[0].loaded.len(), 1);
    assert!(second.tables[0].loaded[0].relative_path.ends_with("b.csv"));
    assert_eq!(store.load_count("a.csv"), 1);
    assert_eq!(store.load_count("b.csv"), 1);
}

#[test]
fn test_unreadable_file_aborts_table() {
    let dir = TempDir::new().unwrap();
    write_weekly(dir.path(), "01", "a.csv", &[weekly_row("B01", "A", "10")]);
    let bad = write_weekly(dir.path(), "01", "z.csv", &[]);
    fs::write(&bad, [0xff, 0xfe, 0x00, b',', 0xc3, b'\n']).unwrap();

    let store = Arc::new(RecordingStore::new());
    let report = executor(&store, dir.path()).run().unwrap();
    let table = &report.tables[0];

    assert!(!report.is_success());
    assert!(table.read_failure.is_some());
    assert!(table.loaded.is_empty());
    assert_eq!(store.load_count("a.csv"), 0);
    assert_eq!(store.ledger_len(), 0);
}

#[test]
fn test_ledger_records_partition_values() {
    let dir = TempDir::new().unwrap();
    write_weekly(dir.path(), "05", "part-0.csv", &[weekly_row("B01", "A", "10")]);

    let store = Arc::new(RecordingStore::new());
    executor(&store, dir.path()).run().unwrap();
    assert_eq!(store.ledger_len(), 1);
    assert_eq!(store.already_loaded("tb_category_tree_v2").unwrap().len(), 0);
}

#[test]
fn test_missing_table_directories_are_empty_tables() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(RecordingStore::new());
    let config = IngestConfig::builder()
        .base_path(dir.path())
        .build()
        .unwrap();
    let report = BulkLoadExecutor::new(store.clone(), store, config)
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.tables.len(), source_tables().len());
    assert!(report.is_success());
    assert!(report.tables.iter().all(|t| t.files_discovered == 0));
}

#[cfg(feature = "duckdb-backend")]
mod duckdb_backend {
    use super::*;
    use hive_loader::Warehouse;

    #[test]
    fn test_rerun_leaves_tables_unchanged() {
        let dir = TempDir::new().unwrap();
        write_weekly(
            dir.path(),
            "01",
            "a.csv",
            &[weekly_row("B01", "A|B|C", "300"), weekly_row("B02", "S", "5")],
        );
        write_weekly(dir.path(), "02", "b.csv", &[weekly_row("B01", "A", "7")]);

        let warehouse = Arc::new(Warehouse::memory().unwrap());
        warehouse.init().unwrap();
        let config = IngestConfig::builder()
            .base_path(dir.path())
            .workers(2)
            .timeout_secs(60)
            .build()
            .unwrap();
        let exec = BulkLoadExecutor::new(warehouse.clone(), warehouse.clone(), config).unwrap();

        let first = exec.run().unwrap();
        assert!(first.is_success());
        assert_eq!(first.rows_loaded(), 3);
        let snapshot = warehouse
            .query("SELECT week, asin, CAST(revenue AS DOUBLE) AS revenue FROM tb_sales_estimates_weekly_v2 ORDER BY week, asin")
            .unwrap();

        let second = exec.run().unwrap();
        assert_eq!(second.files_loaded(), 0);
        assert_eq!(
            warehouse
                .query("SELECT week, asin, CAST(revenue AS DOUBLE) AS revenue FROM tb_sales_estimates_weekly_v2 ORDER BY week, asin")
                .unwrap(),
            snapshot
        );
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0]["week"], "01");
        assert_eq!(warehouse.count_rows("tb_loaded_records").unwrap(), 2);
    }

    #[test]
    fn test_partition_values_come_from_path() {
        let dir = TempDir::new().unwrap();
        write_weekly(dir.path(), "09", "a.csv", &[weekly_row("B01", "A", "1")]);

        let warehouse = Arc::new(Warehouse::memory().unwrap());
        warehouse.init().unwrap();
        let config = IngestConfig::builder()
            .base_path(dir.path())
            .table(WEEKLY)
            .build()
            .unwrap();
        BulkLoadExecutor::new(warehouse.clone(), warehouse.clone(), config)
            .unwrap()
            .run()
            .unwrap();

        let rows = warehouse
            .query("SELECT marketplace, root_category_id, year, week FROM tb_sales_estimates_weekly_v2")
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["marketplace"], "US");
        assert_eq!(rows[0]["root_category_id"], 7);
        assert_eq!(rows[0]["year"], 2024);
        assert_eq!(rows[0]["week"], "09");

        let records = warehouse.loaded_records(WEEKLY).unwrap();
        assert_eq!(records[0].week, "09");
        assert_eq!(records[0].marketplace, "US");
    }
}
