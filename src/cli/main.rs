//! hive-loader command line

mod commands;
mod output;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use hive_loader::{EmptySellerPolicy, ExpansionTarget};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "hive-loader",
    version,
    about = "Load hive-partitioned CSV exports into DuckDB and normalize seller columns"
)]
struct Cli {
    /// TOML config file supplying defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// DuckDB database file (overrides the config file)
    #[arg(long, global = true)]
    database: Option<String>,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create every registered table
    Init,

    /// Check CSV headers without loading anything
    Validate {
        /// Base directory holding the table directories
        #[arg(long)]
        base: Option<PathBuf>,

        /// Only this table
        #[arg(long)]
        table: Option<String>,
    },

    /// Validate and load new files, recording them in the ledger
    Load {
        #[arg(long)]
        base: Option<PathBuf>,

        #[arg(long)]
        table: Option<String>,

        /// Parallel load workers
        #[arg(long)]
        workers: Option<usize>,

        /// Per-file timeout; a file that exceeds it is rolled back
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Hide progress bars
        #[arg(long)]
        no_progress: bool,
    },

    /// Expand packed seller ids into the normalized tables
    Expand {
        /// week or product; both when omitted
        #[arg(long)]
        target: Option<ExpansionTarget>,

        #[arg(long)]
        shards: Option<usize>,

        #[arg(long)]
        workers: Option<usize>,

        /// skip, or placeholder=<id>
        #[arg(long)]
        empty_seller: Option<EmptySellerPolicy>,

        #[arg(long)]
        no_progress: bool,
    },

    /// List files recorded in the ledger for a table
    Ledger {
        #[arg(long)]
        table: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = commands::load_config(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database.path = database;
    }

    match cli.command {
        Command::Init => commands::init(&config),
        Command::Validate { base, table } => {
            if let Some(base) = base {
                config.ingest.base_path = base;
            }
            commands::validate(&config, table.as_deref(), cli.json)
        }
        Command::Load {
            base,
            table,
            workers,
            timeout_secs,
            no_progress,
        } => {
            if let Some(base) = base {
                config.ingest.base_path = base;
            }
            if table.is_some() {
                config.ingest.table = table;
            }
            if let Some(workers) = workers {
                config.ingest.workers = workers;
            }
            if timeout_secs.is_some() {
                config.ingest.timeout_secs = timeout_secs;
            }
            commands::load(&config, cli.json, !no_progress)
        }
        Command::Expand {
            target,
            shards,
            workers,
            empty_seller,
            no_progress,
        } => {
            if let Some(target) = target {
                config.expand.targets = vec![target];
            }
            if let Some(shards) = shards {
                config.expand.shards = shards;
            }
            if let Some(workers) = workers {
                config.expand.workers = workers;
            }
            if let Some(policy) = empty_seller {
                config.expand.empty_seller = policy;
            }
            commands::expand(&config, cli.json, !no_progress)
        }
        Command::Ledger { table } => commands::ledger(&config, &table, cli.json),
    }
}
