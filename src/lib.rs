//! Hive Loader - partitioned CSV ingestion and seller normalization
//!
//! Provides:
//! - Hive-style partition path parsing (`marketplace=US/year=2024/...`)
//! - Static table schemas and header validation
//! - An idempotent load ledger so re-runs skip ingested files
//! - A concurrent bulk-load executor committing rows and ledger together
//! - Expansion of pipe-packed seller columns into normalized tables

pub mod config;
#[cfg(feature = "duckdb-backend")]
pub mod db;
pub mod error;
pub mod executor;
pub mod expand;
pub mod ingest;
pub mod ledger;
pub mod partition;
pub mod progress;
pub mod report;
pub mod schema;
pub mod validate;

pub use config::{
    EmptySellerPolicy, ExpandConfig, ExpansionTarget, IngestConfig, LoaderConfig,
};
#[cfg(feature = "duckdb-backend")]
pub use db::Warehouse;
pub use error::{ExpandError, IngestError, StoreError};
pub use executor::{BulkLoadExecutor, BulkLoader, FileState, LoadRequest};
pub use expand::{
    CategoryPath, MultiValueExpander, ProductRow, ShardStore, WeekRow, WideRow, expand_product,
    expand_week, select_representatives, split_sellers,
};
pub use ingest::{DiscoveredFile, discover_table_files};
pub use ledger::{LoadLedger, LoadRecord};
pub use partition::{PartitionPath, parse_keys, parse_pairs};
pub use progress::ProgressSink;
pub use report::{ExpandReport, RunReport, TableReport};
pub use schema::{ColumnDef, ColumnType, SchemaDescriptor};
pub use validate::{HeaderCheck, read_header, validate, validate_table};
