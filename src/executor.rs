//! Concurrent bulk loading of validated partition files
//!
//! Per table the executor discovers files, drops those the ledger already
//! has, validates headers and loads the survivors on a bounded worker pool.
//! Each load commits its rows together with the ledger record. A failed
//! file is reported and left unrecorded so the next run retries it.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::IngestConfig;
use crate::error::{IngestError, StoreError};
use crate::ingest::discover_table_files;
use crate::ledger::{LoadLedger, LoadRecord};
use crate::progress::ProgressSink;
use crate::report::{FailedFile, LoadedFile, RunReport, TableReport};
use crate::schema::{SchemaDescriptor, SourceTable, source_tables};
use crate::validate::{ValidatedFile, validate_table};

/// One file's load instructions
#[derive(Debug, Clone)]
pub struct LoadRequest<'a> {
    pub schema: &'static SchemaDescriptor,
    pub path: &'a Path,
    /// File columns in header order
    pub columns: &'a [String],
    /// Partition columns assigned from the path, bound as parameters
    pub constants: Vec<(&'static str, String)>,
}

impl LoadRequest<'_> {
    /// Destination columns in bind order: file columns, then constants
    pub fn target_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(String::as_str)
            .chain(self.constants.iter().map(|(name, _)| *name))
            .collect()
    }
}

/// Destination primitives needed by the executor
pub trait BulkLoader: Send + Sync {
    /// Create the table if it does not exist
    fn ensure_table(&self, schema: &SchemaDescriptor) -> Result<(), StoreError>;

    /// Upsert every row of the file and the ledger record in one unit of
    /// work. Either both commit or neither does. Returns the row count.
    fn load_and_record(
        &self,
        request: &LoadRequest<'_>,
        record: &LoadRecord,
        deadline: Option<Instant>,
    ) -> Result<u64, IngestError>;
}

/// Lifecycle of one file within a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum FileState {
    /// Already in the ledger
    Skipped,
    Loading,
    Loaded { rows: u64 },
    /// Not recorded; eligible for the next run
    Failed { reason: String, retryable: bool },
}

/// Runs validated loads for one or more tables
pub struct BulkLoadExecutor {
    loader: Arc<dyn BulkLoader>,
    ledger: Arc<dyn LoadLedger>,
    config: IngestConfig,
    pool: rayon::ThreadPool,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl BulkLoadExecutor {
    /// Create a new executor
    pub fn new(
        loader: Arc<dyn BulkLoader>,
        ledger: Arc<dyn LoadLedger>,
        config: IngestConfig,
    ) -> Result<Self, IngestError> {
        config.validate().map_err(IngestError::Configuration)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("hive-load-{i}"))
            .build()
            .map_err(|e| IngestError::Configuration(e.to_string()))?;

        Ok(Self {
            loader,
            ledger,
            config,
            pool,
            progress: None,
        })
    }

    /// Report progress to `sink`
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Load every registered source table, or only the configured one
    pub fn run(&self) -> Result<RunReport, IngestError> {
        let run_id = Uuid::new_v4().to_string();
        let _span = info_span!("ingest_run", run_id = %run_id).entered();
        let started_at = Utc::now();
        let start = Instant::now();

        let tables: Vec<&SourceTable> = match &self.config.table {
            Some(name) => {
                let table = source_tables()
                    .iter()
                    .find(|t| t.schema.table_name == name)
                    .ok_or_else(|| StoreError::UnknownTable(name.clone()))?;
                vec![table]
            }
            None => source_tables().iter().collect(),
        };

        info!(
            base = %self.config.base_path.display(),
            tables = tables.len(),
            workers = self.config.workers,
            "Starting ingestion"
        );

        let mut reports = Vec::with_capacity(tables.len());
        for table in tables {
            reports.push(self.load_table(table)?);
        }

        let report = RunReport {
            run_id,
            started_at,
            tables: reports,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            files_loaded = report.files_loaded(),
            files_failed = report.files_failed(),
            rows = report.rows_loaded(),
            success = report.is_success(),
            "Ingestion finished"
        );
        Ok(report)
    }

    /// Validate and load the files of one table.
    ///
    /// Errors that only concern this table (DDL, discovery, ledger reads,
    /// unreadable files) are recorded on the report. Configuration and
    /// connection errors are returned.
    pub fn load_table(&self, table: &SourceTable) -> Result<TableReport, IngestError> {
        let schema = table.schema;
        let _span = info_span!("load_table", table = schema.table_name).entered();
        let start = Instant::now();
        let mut report = TableReport::new(schema.table_name);

        if let Err(err) = self.fill_table(table, &mut report) {
            if err.is_fatal() {
                return Err(err);
            }
            error!(error = %err, "Table aborted; nothing further loaded");
            match err {
                IngestError::ReadFailure { .. } | IngestError::Io(_) => {
                    report.read_failure = Some(err.to_string())
                }
                _ => report.error = Some(err.to_string()),
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        if let Some(progress) = &self.progress {
            progress.finish(&report.summary());
        }

        if report.is_success() {
            info!(
                loaded = report.loaded.len(),
                skipped = report.skipped.len(),
                rows = report.rows_loaded(),
                "Table ok"
            );
        } else {
            warn!(
                loaded = report.loaded.len(),
                rejected = report.header_mismatches.len(),
                failed = report.failed.len(),
                "Table not ok"
            );
        }

        Ok(report)
    }

    fn fill_table(&self, table: &SourceTable, report: &mut TableReport) -> Result<(), IngestError> {
        let schema = table.schema;
        self.loader.ensure_table(schema)?;

        let table_path = self.config.base_path.join(table.relative_path);
        let files = discover_table_files(&table_path, &self.config.pattern)?;
        report.files_discovered = files.len();

        let pending = self.ledger.pending(schema.table_name, files.clone())?;
        report.skipped = files
            .iter()
            .filter(|f| !pending.iter().any(|p| p.path == f.path))
            .map(|f| f.file_name())
            .collect();
        for name in &report.skipped {
            debug!(file = %name, state = ?FileState::Skipped, "Already loaded");
        }

        let validation = validate_table(schema, pending);
        report.header_mismatches = validation.rejected;
        if let Some(err) = validation.read_failure {
            return Err(err);
        }

        if let Some(progress) = &self.progress {
            progress.start(schema.table_name, validation.accepted.len() as u64);
        }

        let timeout = self.config.timeout();
        let outcomes: Vec<(String, FileState)> = self.pool.install(|| {
            validation
                .accepted
                .par_iter()
                .map(|file| {
                    let state = self.load_file(schema, file, timeout);
                    (file.file.relative_path.clone(), state)
                })
                .collect()
        });

        for (relative_path, state) in outcomes {
            match state {
                FileState::Loaded { rows } => {
                    report.loaded.push(LoadedFile {
                        relative_path,
                        rows,
                    });
                }
                FileState::Failed { reason, retryable } => {
                    report.failed.push(FailedFile {
                        relative_path,
                        reason,
                        retryable,
                    });
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn load_file(
        &self,
        schema: &'static SchemaDescriptor,
        file: &ValidatedFile,
        timeout: Option<Duration>,
    ) -> FileState {
        let relative = &file.file.relative_path;
        debug!(file = %relative, state = ?FileState::Loading, "Loading");

        let state = match self.try_load(schema, file, timeout) {
            Ok(rows) => {
                info!(file = %relative, rows, "Loaded");
                FileState::Loaded { rows }
            }
            Err(e) => {
                error!(file = %relative, error = %e, retryable = e.is_retryable(), "Load failed");
                FileState::Failed {
                    reason: e.to_string(),
                    retryable: e.is_retryable(),
                }
            }
        };

        if let Some(progress) = &self.progress {
            match &state {
                FileState::Failed { reason, .. } => progress.warn(&format!("{relative}: {reason}")),
                _ => progress.advance(relative),
            }
        }
        state
    }

    fn try_load(
        &self,
        schema: &'static SchemaDescriptor,
        file: &ValidatedFile,
        timeout: Option<Duration>,
    ) -> Result<u64, IngestError> {
        let record = LoadRecord::from_partition(
            schema.table_name,
            &file.partition,
            &file.file.path,
            &file.file.file_name(),
        )?;

        let constants: Vec<(&'static str, String)> = file
            .partition
            .pairs()
            .iter()
            .filter_map(|(key, value)| {
                schema
                    .columns
                    .iter()
                    .find(|c| c.name == key)
                    .map(|c| (c.name, value.clone()))
            })
            .collect();

        let request = LoadRequest {
            schema,
            path: &file.file.path,
            columns: &file.columns,
            constants,
        };
        let deadline = timeout.map(|t| Instant::now() + t);
        self.loader.load_and_record(&request, &record, deadline)
    }
}
