//! Shard-parallel materialization of the normalized tables

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, error, info, info_span};

use super::{
    ExpansionTarget, ProductRow, WeekRow, WideRow, expand_product, expand_week,
    select_representatives,
};
use crate::config::ExpandConfig;
use crate::error::{ExpandError, StoreError};
use crate::progress::ProgressSink;
use crate::report::{ExpandReport, FailedShard};
use crate::schema::SchemaDescriptor;

/// Destination primitives needed by the expander
pub trait ShardStore: Send + Sync {
    /// Create the table if it does not exist
    fn ensure_table(&self, schema: &SchemaDescriptor) -> Result<(), StoreError>;

    /// Rows of `target`'s source table whose asin hashes to `shard`,
    /// in primary-key order
    fn fetch_shard(
        &self,
        target: ExpansionTarget,
        shard: usize,
        shard_count: usize,
    ) -> Result<Vec<WideRow>, StoreError>;

    /// Upsert week rows in one transaction
    fn upsert_week(&self, rows: &[WeekRow]) -> Result<u64, StoreError>;

    /// Upsert product rows in one transaction
    fn upsert_product(&self, rows: &[ProductRow]) -> Result<u64, StoreError>;
}

#[derive(Debug, Default, Clone, Copy)]
struct ShardStats {
    rows_read: u64,
    groups: u64,
    rows_emitted: u64,
    rows_skipped: u64,
}

/// Expands packed seller columns shard by shard
pub struct MultiValueExpander {
    store: Arc<dyn ShardStore>,
    config: ExpandConfig,
    pool: rayon::ThreadPool,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl MultiValueExpander {
    /// Create a new expander
    pub fn new(store: Arc<dyn ShardStore>, config: ExpandConfig) -> Result<Self, ExpandError> {
        config.validate().map_err(ExpandError::Configuration)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("hive-expand-{i}"))
            .build()
            .map_err(|e| ExpandError::Configuration(e.to_string()))?;

        Ok(Self {
            store,
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

    /// Materialize every configured target
    pub fn run(&self) -> Result<Vec<ExpandReport>, ExpandError> {
        self.config
            .targets
            .iter()
            .map(|target| self.expand(*target))
            .collect()
    }

    /// Materialize one target across all shards. Shard failures are
    /// recorded in the report and do not stop the other shards.
    pub fn expand(&self, target: ExpansionTarget) -> Result<ExpandReport, ExpandError> {
        let _span = info_span!("expand", target = target.target_table()).entered();
        let start = Instant::now();
        let shard_count = self.config.shards;

        let schema = match target {
            ExpansionTarget::Week => &crate::schema::DATA_WEEK,
            ExpansionTarget::Product => &crate::schema::DATA_PRODUCT,
        };
        self.store.ensure_table(schema)?;

        info!(
            source = target.source_table(),
            shards = shard_count,
            workers = self.config.workers,
            "Starting expansion"
        );
        if let Some(progress) = &self.progress {
            progress.start(target.target_table(), shard_count as u64);
        }

        let results: Vec<(usize, Result<ShardStats, ExpandError>)> = self.pool.install(|| {
            (0..shard_count)
                .into_par_iter()
                .map(|shard| (shard, self.process_shard(target, shard)))
                .collect()
        });

        let mut report = ExpandReport::new(target, shard_count);
        for (shard, result) in results {
            match result {
                Ok(stats) => {
                    report.shards_processed += 1;
                    report.rows_read += stats.rows_read;
                    report.groups += stats.groups;
                    report.rows_emitted += stats.rows_emitted;
                    report.rows_skipped += stats.rows_skipped;
                }
                Err(e) => {
                    error!(shard, error = %e, "Shard failed");
                    report.failed_shards.push(FailedShard {
                        shard,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        if let Some(progress) = &self.progress {
            progress.finish(&report.summary());
        }
        info!(
            rows_read = report.rows_read,
            rows_emitted = report.rows_emitted,
            rows_skipped = report.rows_skipped,
            failed_shards = report.failed_shards.len(),
            duration_ms = report.duration_ms,
            "Expansion finished"
        );
        Ok(report)
    }

    fn process_shard(
        &self,
        target: ExpansionTarget,
        shard: usize,
    ) -> Result<ShardStats, ExpandError> {
        let start = Instant::now();
        let shard_err = |e: StoreError| ExpandError::Shard {
            shard,
            reason: e.to_string(),
        };

        let rows = self
            .store
            .fetch_shard(target, shard, self.config.shards)
            .map_err(shard_err)?;
        let mut stats = ShardStats {
            rows_read: rows.len() as u64,
            ..Default::default()
        };

        let chosen = select_representatives(target, rows);
        stats.groups = chosen.len() as u64;
        let policy = &self.config.empty_seller;

        stats.rows_emitted = match target {
            ExpansionTarget::Week => {
                let mut out = Vec::with_capacity(chosen.len());
                for row in &chosen {
                    let expansion = expand_week(row, policy);
                    stats.rows_skipped += expansion.skipped as u64;
                    out.extend(expansion.rows);
                }
                self.store.upsert_week(&out).map_err(shard_err)?
            }
            ExpansionTarget::Product => {
                let mut out = Vec::with_capacity(chosen.len());
                for row in &chosen {
                    let expansion = expand_product(row, policy);
                    stats.rows_skipped += expansion.skipped as u64;
                    out.extend(expansion.rows);
                }
                self.store.upsert_product(&out).map_err(shard_err)?
            }
        };

        debug!(
            shard,
            rows_read = stats.rows_read,
            rows_emitted = stats.rows_emitted,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Shard done"
        );
        if let Some(progress) = &self.progress {
            progress.advance(&format!("shard {shard}"));
        }
        Ok(stats)
    }
}
