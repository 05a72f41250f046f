//! Subcommand handlers

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use hive_loader::schema::{SourceTable, source_tables};
use hive_loader::{
    BulkLoadExecutor, LoaderConfig, MultiValueExpander, Warehouse, discover_table_files,
    validate_table,
};
use tracing::info;

use crate::output;
use crate::progress::{LoadProgress, Spinner};

/// Read the config file, or fall back to defaults
pub fn load_config(path: Option<&Path>) -> anyhow::Result<LoaderConfig> {
    match path {
        Some(path) => LoaderConfig::from_file(path).map_err(|e| anyhow!(e.user_message())),
        None => Ok(LoaderConfig::default()),
    }
}

fn open_warehouse(config: &LoaderConfig) -> anyhow::Result<Warehouse> {
    config.validate().map_err(|e| anyhow!(e.user_message()))?;
    let warehouse = Warehouse::open(&config.database.path)
        .with_context(|| format!("Failed to open database {}", config.database.path))?;
    warehouse.init().map_err(|e| anyhow!(e.user_message()))?;
    Ok(warehouse)
}

fn selected_tables(table: Option<&str>) -> anyhow::Result<Vec<&'static SourceTable>> {
    match table {
        Some(name) => {
            let table = source_tables()
                .iter()
                .find(|t| t.schema.table_name == name)
                .ok_or_else(|| anyhow!("Unknown table: {name}"))?;
            Ok(vec![table])
        }
        None => Ok(source_tables().iter().collect()),
    }
}

/// Handle the `init` command
pub fn init(config: &LoaderConfig) -> anyhow::Result<bool> {
    let spinner = Spinner::new("Creating tables...");
    open_warehouse(config)?;
    spinner.finish(&format!("Database initialized at: {}", config.database.path));
    Ok(true)
}

/// Handle the `validate` command
pub fn validate(config: &LoaderConfig, table: Option<&str>, json: bool) -> anyhow::Result<bool> {
    let mut all_ok = true;
    let mut results = Vec::new();

    for source in selected_tables(table)? {
        let table_path = config.ingest.base_path.join(source.relative_path);
        let files = discover_table_files(&table_path, &config.ingest.pattern)
            .map_err(|e| anyhow!(e.user_message()))?;
        let discovered = files.len();
        let validation = validate_table(source.schema, files);
        all_ok &= validation.is_ok();

        info!(
            table = source.schema.table_name,
            files = discovered,
            rejected = validation.rejected.len(),
            ok = validation.is_ok(),
            "Validated table"
        );
        results.push((source.schema.table_name, discovered, validation));
    }

    if json {
        let value: Vec<serde_json::Value> = results
            .iter()
            .map(|(name, discovered, v)| {
                serde_json::json!({
                    "tableName": name,
                    "filesDiscovered": discovered,
                    "accepted": v.accepted.len(),
                    "headerMismatches": v.rejected,
                    "readFailure": v.read_failure.as_ref().map(|e| e.to_string()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        for (name, discovered, v) in &results {
            print!("{}", output::format_validation(name, *discovered, v));
        }
    }

    Ok(all_ok)
}

/// Handle the `load` command
pub fn load(config: &LoaderConfig, json: bool, show_progress: bool) -> anyhow::Result<bool> {
    if !config.ingest.base_path.is_dir() {
        bail!(
            "Base directory not found: {}",
            config.ingest.base_path.display()
        );
    }

    let warehouse = Arc::new(open_warehouse(config)?);
    let mut executor =
        BulkLoadExecutor::new(warehouse.clone(), warehouse, config.ingest.clone())
            .map_err(|e| anyhow!(e.user_message()))?;
    if show_progress && !json {
        executor = executor.with_progress(Arc::new(LoadProgress::new("files")));
    }

    let report = executor.run().map_err(|e| anyhow!(e.user_message()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", output::format_run_report(&report));
    }
    Ok(report.is_success())
}

/// Handle the `expand` command
pub fn expand(config: &LoaderConfig, json: bool, show_progress: bool) -> anyhow::Result<bool> {
    let warehouse = Arc::new(open_warehouse(config)?);
    let mut expander = MultiValueExpander::new(warehouse, config.expand.clone())
        .map_err(|e| anyhow!(e.to_string()))?;
    if show_progress && !json {
        expander = expander.with_progress(Arc::new(LoadProgress::new("shards")));
    }

    let reports = expander.run().context("Expansion failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print!("{}", output::format_expand_reports(&reports));
    }
    Ok(reports.iter().all(|r| r.is_success()))
}

/// Handle the `ledger` command
pub fn ledger(config: &LoaderConfig, table: &str, json: bool) -> anyhow::Result<bool> {
    let warehouse = open_warehouse(config)?;
    let records = warehouse
        .loaded_records(table)
        .map_err(|e| anyhow!(e.user_message()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print!("{}", output::format_ledger(table, &records));
    }
    Ok(true)
}
