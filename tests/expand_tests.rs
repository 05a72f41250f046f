//! End-to-end tests: load wide tables, then expand sellers

#![cfg(feature = "duckdb-backend")]

mod common;

use std::path::Path;
use std::sync::Arc;

use hive_loader::{
    BulkLoadExecutor, EmptySellerPolicy, ExpandConfig, ExpansionTarget, IngestConfig,
    MultiValueExpander, Warehouse,
};
use tempfile::TempDir;

use common::{sales_row, weekly_row, write_latest, write_weekly};

fn load(warehouse: &Arc<Warehouse>, base: &Path) {
    let config = IngestConfig::builder()
        .base_path(base)
        .workers(2)
        .build()
        .expect("valid ingest config");
    let report = BulkLoadExecutor::new(warehouse.clone(), warehouse.clone(), config)
        .expect("executor")
        .run()
        .expect("ingestion run");
    assert!(report.is_success(), "ingestion failed: {report:?}");
}

fn expand(warehouse: &Arc<Warehouse>, target: ExpansionTarget, policy: EmptySellerPolicy) {
    let config = ExpandConfig::builder()
        .shards(8)
        .workers(2)
        .empty_seller(policy)
        .target(target)
        .build()
        .expect("valid expand config");
    let reports = MultiValueExpander::new(warehouse.clone(), config)
        .expect("expander")
        .run()
        .expect("expansion run");
    assert!(reports.iter().all(|r| r.is_success()));
    assert_eq!(reports[0].shards_processed, 8);
}

fn warehouse() -> Arc<Warehouse> {
    let warehouse = Arc::new(Warehouse::memory().expect("in-memory database"));
    warehouse.init().expect("create tables");
    warehouse
}

#[test]
fn test_week_metrics_split_evenly_across_sellers() {
    let dir = TempDir::new().unwrap();
    write_weekly(
        dir.path(),
        "05",
        "part-0.csv",
        &[weekly_row("B01", "A|B|C", "300"), weekly_row("B02", "S", "42")],
    );

    let warehouse = warehouse();
    load(&warehouse, dir.path());
    expand(&warehouse, ExpansionTarget::Week, EmptySellerPolicy::Skip);

    let rows = warehouse
        .query(
            "SELECT seller_id, CAST(revenue AS DOUBLE) AS revenue,
                    CAST(revenue_org AS DOUBLE) AS revenue_org,
                    CAST(sales AS DOUBLE) AS sales, seller_num, week
             FROM tb_data_week WHERE asin = 'B01' ORDER BY seller_id",
        )
        .unwrap();
    assert_eq!(rows.len(), 3);
    for (row, seller) in rows.iter().zip(["A", "B", "C"]) {
        assert_eq!(row["seller_id"], seller);
        assert_eq!(row["revenue"], 100.0);
        assert_eq!(row["revenue_org"], 300.0);
        assert_eq!(row["sales"], 10.0);
        assert_eq!(row["seller_num"], 3);
        assert_eq!(row["week"], "05");
    }

    let single = warehouse
        .query(
            "SELECT seller_id, CAST(revenue AS DOUBLE) AS revenue, seller_num
             FROM tb_data_week WHERE asin = 'B02'",
        )
        .unwrap();
    assert_eq!(single.len(), 1);
    assert_eq!(single[0]["seller_id"], "S");
    assert_eq!(single[0]["revenue"], 42.0);
    assert_eq!(single[0]["seller_num"], 1);
}

#[test]
fn test_expansion_rerun_is_stable() {
    let dir = TempDir::new().unwrap();
    write_weekly(dir.path(), "01", "a.csv", &[weekly_row("B01", "A|B", "10")]);

    let warehouse = warehouse();
    load(&warehouse, dir.path());
    expand(&warehouse, ExpansionTarget::Week, EmptySellerPolicy::Skip);
    expand(&warehouse, ExpansionTarget::Week, EmptySellerPolicy::Skip);

    assert_eq!(warehouse.count_rows("tb_data_week").unwrap(), 2);
}

#[test]
fn test_product_keeps_greatest_representative() {
    let dir = TempDir::new().unwrap();
    write_latest(
        dir.path(),
        "part-0.csv",
        &[
            sales_row("B01", "X", "10", "1|2", "2024-01-21"),
            sales_row("B01", "Y", "10", "1|3", "2024-01-28"),
        ],
    );

    let warehouse = warehouse();
    load(&warehouse, dir.path());
    expand(&warehouse, ExpansionTarget::Product, EmptySellerPolicy::Skip);

    let rows = warehouse
        .query(
            "SELECT seller_id, category_path, category_id0, category_id1, category_id2, seller_num
             FROM tb_data_product WHERE asin = 'B01'",
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["seller_id"], "Y");
    assert_eq!(rows[0]["category_path"], "1 > 3");
    assert_eq!(rows[0]["category_id0"], 1);
    assert_eq!(rows[0]["category_id1"], 3);
    assert!(rows[0]["category_id2"].is_null());
    assert_eq!(rows[0]["seller_num"], 1);
}

#[test]
fn test_empty_seller_policy() {
    let dir = TempDir::new().unwrap();
    write_weekly(dir.path(), "01", "a.csv", &[weekly_row("B09", "", "8")]);

    let warehouse = warehouse();
    load(&warehouse, dir.path());

    expand(&warehouse, ExpansionTarget::Week, EmptySellerPolicy::Skip);
    assert_eq!(warehouse.count_rows("tb_data_week").unwrap(), 0);

    expand(
        &warehouse,
        ExpansionTarget::Week,
        EmptySellerPolicy::Placeholder("UNKNOWN".to_string()),
    );
    let rows = warehouse
        .query("SELECT seller_id, CAST(revenue AS DOUBLE) AS revenue FROM tb_data_week")
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["seller_id"], "UNKNOWN");
    assert_eq!(rows[0]["revenue"], 8.0);
}

#[test]
fn test_repeated_sellers_keep_the_packed_total() {
    let dir = TempDir::new().unwrap();
    write_weekly(
        dir.path(),
        "01",
        "a.csv",
        &[weekly_row("B01", "A||", "30"), weekly_row("B02", "X|X", "10")],
    );

    let warehouse = warehouse();
    load(&warehouse, dir.path());
    expand(
        &warehouse,
        ExpansionTarget::Week,
        EmptySellerPolicy::Placeholder("UNKNOWN".to_string()),
    );

    let rows = warehouse
        .query(
            "SELECT asin, seller_id, CAST(revenue AS DOUBLE) AS revenue,
                    CAST(revenue_org AS DOUBLE) AS revenue_org
             FROM tb_data_week ORDER BY asin, seller_id",
        )
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["seller_id"], "A");
    assert_eq!(rows[0]["revenue"], 10.0);
    assert_eq!(rows[1]["seller_id"], "UNKNOWN");
    assert_eq!(rows[1]["revenue"], 20.0);
    assert_eq!(rows[2]["seller_id"], "X");
    assert_eq!(rows[2]["revenue"], 10.0);
    assert_eq!(rows[2]["revenue_org"], 10.0);
}
