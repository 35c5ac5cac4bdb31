//! # Product Search CLI (`psearch`)
//!
//! ## Usage
//!
//! ```bash
//! psearch --config ./config/psearch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `psearch serve` | Start the HTTP search server |
//! | `psearch search "<query>"` | Run one tiered search and print the results |
//! | `psearch ingest <file>` | Embed a records file and reload the Qdrant collection |
//!
//! ## Examples
//!
//! ```bash
//! # Load the catalog
//! psearch ingest ./data/products.csv
//! psearch ingest ./data/export.txt --format json-lines
//!
//! # Query from the terminal
//! psearch search "apple juice"
//! psearch search "apple juice" --json
//!
//! # Serve GET /search on [server].bind
//! psearch serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use product_search::{config, ingest, search, server};

/// Tiered product search: exact first-word matches, then first-word
/// prefixes, then semantic neighbours.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/psearch.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "psearch", version, about = "Tiered exact / prefix / semantic product search")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/psearch.toml")]
    config: PathBuf,

    /// Log at debug level (`RUST_LOG` takes precedence).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP search server.
    ///
    /// Binds to `[server].bind` and serves `GET /search` and `GET /health`.
    Serve,

    /// Run one search and print the ranked results.
    Search {
        /// The search query string.
        query: String,

        /// Print the JSON body `GET /search` would return.
        #[arg(long)]
        json: bool,
    },

    /// Embed a records file and reload the collection.
    ///
    /// Accepts CSV with a header row, a JSON array, or JSON Lines of
    /// `{ "ID", "Name", "Description" }` records. The collection is dropped
    /// and recreated before upload.
    Ingest {
        /// Path to the records file.
        path: PathBuf,

        /// Record layout; defaults to the file extension (`.csv`, `.json`,
        /// anything else JSON Lines).
        #[arg(long, value_enum)]
        format: Option<ingest::RecordFormat>,

        /// Points per upsert request (overrides `[ingest].chunk_size`).
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Parse and count records without embedding or uploading.
        #[arg(long)]
        dry_run: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "product_search={0},product_search_core={0},psearch={0}",
            default_level
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Search { query, json } => {
            search::run_search(&cfg, &query, json).await?;
        }
        Commands::Ingest {
            path,
            format,
            chunk_size,
            dry_run,
        } => {
            let stats = ingest::run_ingest(&cfg, &path, format, chunk_size, dry_run).await?;
            if dry_run {
                println!(
                    "Dry run: {} records parsed, {} skipped",
                    stats.records, stats.skipped
                );
            } else {
                println!(
                    "Ingested {} of {} records ({} skipped)",
                    stats.uploaded, stats.records, stats.skipped
                );
            }
        }
    }

    Ok(())
}
