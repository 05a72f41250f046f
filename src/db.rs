//! DuckDB destination
//!
//! `Warehouse` owns one root connection; every unit of work runs on a
//! cloned connection to the same database so loads and shards can proceed
//! on separate worker threads.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Instant;

use duckdb::types::Value;
use duckdb::{Connection, params, params_from_iter};
use tracing::debug;

use crate::error::{IngestError, StoreError};
use crate::executor::{BulkLoader, LoadRequest};
use crate::expand::{
    ExpansionTarget, Metrics, ProductRow, ShardStore, WeekRow, WideRow,
};
use crate::ledger::{LoadLedger, LoadRecord};
use crate::schema::{
    DATA_PRODUCT, DATA_WEEK, LOADED_RECORDS, SchemaDescriptor, all_tables, lookup, quote_ident,
};

const LEDGER_COLUMNS: [&str; 6] = [
    "table_name",
    "marketplace",
    "root_category_id",
    "year",
    "week",
    "file_name",
];

const WEEK_COLUMNS: [&str; 27] = [
    "marketplace",
    "root_category_id",
    "year",
    "week",
    "start_date",
    "end_date",
    "asin",
    "seller_id",
    "is_available",
    "category_rank",
    "subcategory_rank",
    "price",
    "review_count",
    "ratings",
    "revenue",
    "revenue_1p",
    "revenue_3p",
    "sales",
    "sales_1p",
    "sales_3p",
    "revenue_org",
    "revenue_1p_org",
    "revenue_3p_org",
    "sales_org",
    "sales_1p_org",
    "sales_3p_org",
    "seller_num",
];

const PRODUCT_COLUMNS: [&str; 18] = [
    "marketplace",
    "root_category_id",
    "asin",
    "seller_id",
    "brand",
    "name",
    "image_url",
    "category_path",
    "category_id0",
    "category_id1",
    "category_id2",
    "category_id3",
    "category_id4",
    "category_id5",
    "category_id6",
    "first_date_available",
    "seller_num",
    "seller_types",
];

/// Embedded DuckDB warehouse holding the source, derived and ledger tables
pub struct Warehouse {
    conn: Mutex<Connection>,
    path: Option<String>,
}

impl Warehouse {
    /// Open or create a database at the given path
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Get the database path (if not in-memory)
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// A new connection to the same database
    fn connection(&self) -> Result<Connection, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Connection("connection lock poisoned".to_string()))?;
        conn.try_clone()
            .map_err(|e| StoreError::Connection(e.to_string()))
    }

    /// Create every registered table
    pub fn init(&self) -> Result<(), StoreError> {
        let conn = self.connection()?;
        for schema in all_tables() {
            conn.execute_batch(&schema.create_table_sql())?;
        }
        Ok(())
    }

    /// Check whether `table_name` exists
    pub fn table_exists(&self, table_name: &str) -> Result<bool, StoreError> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Row count of a registered table
    pub fn count_rows(&self, table_name: &str) -> Result<i64, StoreError> {
        let schema =
            lookup(table_name).ok_or_else(|| StoreError::UnknownTable(table_name.to_string()))?;
        if !self.table_exists(schema.table_name)? {
            return Err(StoreError::NotInitialized(schema.table_name.to_string()));
        }
        let conn = self.connection()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(schema.table_name)),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Execute a read-only query and return rows as JSON objects
    pub fn query(&self, sql: &str) -> Result<Vec<serde_json::Value>, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;

        let column_count = rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
        let column_names: Vec<String> = (0..column_count)
            .map(|i| {
                rows.as_ref()
                    .and_then(|r| r.column_name(i).ok())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("col{}", i))
            })
            .collect();

        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let mut obj = serde_json::Map::new();
            for (i, name) in column_names.iter().enumerate() {
                let value: Value = row.get(i)?;
                let json_value = match value {
                    Value::Null => serde_json::Value::Null,
                    Value::Boolean(b) => serde_json::Value::Bool(b),
                    Value::Int(n) => serde_json::Value::Number(n.into()),
                    Value::BigInt(n) => serde_json::Value::Number(n.into()),
                    Value::Double(f) => serde_json::Number::from_f64(f)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null),
                    Value::Text(s) => serde_json::Value::String(s),
                    other => serde_json::Value::String(format!("{:?}", other)),
                };
                obj.insert(name.clone(), json_value);
            }
            results.push(serde_json::Value::Object(obj));
        }

        Ok(results)
    }

    /// Ledger entries for a table, ordered by partition and file
    pub fn loaded_records(&self, table_name: &str) -> Result<Vec<LoadRecord>, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT table_name, marketplace, root_category_id, year, week, file_name
             FROM tb_loaded_records
             WHERE table_name = ?
             ORDER BY marketplace, root_category_id, year, week, file_name",
        )?;
        let rows = stmt.query_map([table_name], |row| {
            Ok(LoadRecord {
                table_name: row.get(0)?,
                marketplace: row.get(1)?,
                root_category_id: row.get(2)?,
                year: row.get(3)?,
                week: row.get(4)?,
                file_name: row.get(5)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

/// Empty fields, quoted or not, are stored as NULL
fn cell(value: &str) -> Option<&str> {
    if value.is_empty() { None } else { Some(value) }
}

fn text(value: &Option<String>) -> Value {
    value.clone().map_or(Value::Null, Value::Text)
}

fn double(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::Double)
}

fn bigint(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::BigInt)
}

fn int(value: Option<i32>) -> Value {
    value.map_or(Value::Null, Value::Int)
}

impl BulkLoader for Warehouse {
    fn ensure_table(&self, schema: &SchemaDescriptor) -> Result<(), StoreError> {
        let conn = self.connection()?;
        conn.execute_batch(&schema.create_table_sql())?;
        Ok(())
    }

    fn load_and_record(
        &self,
        request: &LoadRequest<'_>,
        record: &LoadRecord,
        deadline: Option<Instant>,
    ) -> Result<u64, IngestError> {
        let start = Instant::now();
        let path = request.path;
        let load_failure = |e: duckdb::Error| IngestError::LoadFailure {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let read_failure = |e: csv::Error| IngestError::ReadFailure {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let check_deadline = || match deadline {
            Some(deadline) if Instant::now() >= deadline => Err(IngestError::Timeout {
                path: path.to_path_buf(),
                elapsed: start.elapsed(),
            }),
            _ => Ok(()),
        };

        let upsert = request.schema.upsert_sql(&request.target_columns())?;
        let ledger_upsert = LOADED_RECORDS.upsert_sql(&LEDGER_COLUMNS)?;

        let mut conn = self.connection()?;
        // Dropping the transaction without commit rolls it back
        let tx = conn.transaction().map_err(load_failure)?;

        let mut rows = 0u64;
        {
            let mut stmt = tx.prepare(&upsert).map_err(load_failure)?;
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .from_path(path)
                .map_err(read_failure)?;

            for result in reader.records() {
                let record = result.map_err(read_failure)?;
                check_deadline()?;

                let values: Vec<Option<&str>> = record
                    .iter()
                    .map(cell)
                    .chain(request.constants.iter().map(|(_, v)| Some(v.as_str())))
                    .collect();
                stmt.execute(params_from_iter(values.iter()))
                    .map_err(load_failure)?;
                rows += 1;
            }
        }

        check_deadline()?;
        tx.execute(
            &ledger_upsert,
            params![
                record.table_name,
                record.marketplace,
                record.root_category_id,
                record.year,
                record.week,
                record.file_name,
            ],
        )
        .map_err(|e| IngestError::LedgerWrite(e.to_string()))?;

        tx.commit().map_err(load_failure)?;
        debug!(
            table = request.schema.table_name,
            file = %record.file_name,
            rows,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Committed file and ledger record"
        );
        Ok(rows)
    }
}

impl LoadLedger for Warehouse {
    fn already_loaded(&self, table_name: &str) -> Result<HashSet<String>, StoreError> {
        let conn = self.connection()?;
        conn.execute_batch(&LOADED_RECORDS.create_table_sql())?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT file_name FROM tb_loaded_records WHERE table_name = ?")?;
        let rows = stmt.query_map([table_name], |row| row.get::<_, String>(0))?;

        let mut names = HashSet::new();
        for row in rows {
            names.insert(row?);
        }
        Ok(names)
    }

    fn mark_loaded(&self, record: &LoadRecord) -> Result<(), StoreError> {
        let conn = self.connection()?;
        conn.execute(
            &LOADED_RECORDS.upsert_sql(&LEDGER_COLUMNS)?,
            params![
                record.table_name,
                record.marketplace,
                record.root_category_id,
                record.year,
                record.week,
                record.file_name,
            ],
        )?;
        Ok(())
    }
}

fn shard_select(target: ExpansionTarget) -> String {
    let (year_week, order) = match target {
        ExpansionTarget::Week => (
            "year, week",
            "marketplace, root_category_id, year, week, start_date, end_date, asin",
        ),
        ExpansionTarget::Product => (
            "CAST(NULL AS INTEGER), CAST(NULL AS VARCHAR)",
            "marketplace, root_category_id, start_date, end_date, asin",
        ),
    };

    format!(
        "SELECT marketplace, root_category_id, {year_week},
                CAST(start_date AS VARCHAR), CAST(end_date AS VARCHAR), asin,
                is_available, category_rank, subcategory_rank, brand, name, image_url,
                CAST(price AS DOUBLE), review_count, CAST(ratings AS DOUBLE),
                breadcrumb_path_category_ids, CAST(first_date_available AS VARCHAR),
                CAST(revenue AS DOUBLE), CAST(revenue_1p AS DOUBLE), CAST(revenue_3p AS DOUBLE),
                CAST(sales AS DOUBLE), CAST(sales_1p AS DOUBLE), CAST(sales_3p AS DOUBLE),
                seller_id_mode, seller_types
         FROM {table}
         WHERE CAST(hash(asin) % CAST(? AS UBIGINT) AS BIGINT) = CAST(? AS BIGINT)
         ORDER BY {order}",
        table = quote_ident(target.source_table()),
    )
}

fn week_values(row: &WeekRow) -> Vec<Value> {
    let mut values = vec![
        Value::Text(row.marketplace.clone()),
        Value::BigInt(row.root_category_id),
        int(row.year),
        text(&row.week),
        text(&row.start_date),
        text(&row.end_date),
        Value::Text(row.asin.clone()),
        Value::Text(row.seller_id.clone()),
        int(row.is_available),
        bigint(row.category_rank),
        bigint(row.subcategory_rank),
        double(row.price),
        bigint(row.review_count),
        double(row.ratings),
    ];
    values.extend(row.metrics.values().into_iter().map(double));
    values.extend(row.metrics_org.values().into_iter().map(double));
    values.push(Value::Int(row.seller_num));
    values
}

fn product_values(row: &ProductRow) -> Vec<Value> {
    let mut values = vec![
        Value::Text(row.marketplace.clone()),
        Value::BigInt(row.root_category_id),
        Value::Text(row.asin.clone()),
        Value::Text(row.seller_id.clone()),
        text(&row.brand),
        text(&row.name),
        text(&row.image_url),
        text(&row.category_path),
    ];
    values.extend(row.category_ids.iter().copied().map(bigint));
    values.push(text(&row.first_date_available));
    values.push(Value::Int(row.seller_num));
    values.push(text(&row.seller_types));
    values
}

impl Warehouse {
    fn upsert_all<T>(
        &self,
        schema: &SchemaDescriptor,
        columns: &[&str],
        rows: &[T],
        to_values: impl Fn(&T) -> Vec<Value>,
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let sql = schema.upsert_sql(columns)?;
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                stmt.execute(params_from_iter(to_values(row)))?;
            }
        }
        tx.commit()?;
        Ok(rows.len() as u64)
    }
}

impl ShardStore for Warehouse {
    fn ensure_table(&self, schema: &SchemaDescriptor) -> Result<(), StoreError> {
        BulkLoader::ensure_table(self, schema)
    }

    fn fetch_shard(
        &self,
        target: ExpansionTarget,
        shard: usize,
        shard_count: usize,
    ) -> Result<Vec<WideRow>, StoreError> {
        let source = target.source_table();
        if !self.table_exists(source)? {
            return Err(StoreError::NotInitialized(source.to_string()));
        }

        let conn = self.connection()?;
        let mut stmt = conn.prepare(&shard_select(target))?;
        let rows = stmt.query_map(params![shard_count as i64, shard as i64], |row| {
            Ok(WideRow {
                marketplace: row.get(0)?,
                root_category_id: row.get(1)?,
                year: row.get(2)?,
                week: row.get(3)?,
                start_date: row.get(4)?,
                end_date: row.get(5)?,
                asin: row.get(6)?,
                is_available: row.get(7)?,
                category_rank: row.get(8)?,
                subcategory_rank: row.get(9)?,
                brand: row.get(10)?,
                name: row.get(11)?,
                image_url: row.get(12)?,
                price: row.get(13)?,
                review_count: row.get(14)?,
                ratings: row.get(15)?,
                breadcrumb_path_category_ids: row.get(16)?,
                first_date_available: row.get(17)?,
                metrics: Metrics {
                    revenue: row.get(18)?,
                    revenue_1p: row.get(19)?,
                    revenue_3p: row.get(20)?,
                    sales: row.get(21)?,
                    sales_1p: row.get(22)?,
                    sales_3p: row.get(23)?,
                },
                seller_id_mode: row.get(24)?,
                seller_types: row.get(25)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn upsert_week(&self, rows: &[WeekRow]) -> Result<u64, StoreError> {
        self.upsert_all(&DATA_WEEK, &WEEK_COLUMNS, rows, week_values)
    }

    fn upsert_product(&self, rows: &[ProductRow]) -> Result<u64, StoreError> {
        self.upsert_all(&DATA_PRODUCT, &PRODUCT_COLUMNS, rows, product_values)
    }
}
