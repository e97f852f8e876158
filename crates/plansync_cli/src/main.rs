//! PlanSync CLI
//!
//! Maintenance tools for a PlanSync local store directory.
//!
//! # Commands
//!
//! - `inspect` - Display table counts, ledger summary and journal size
//! - `pending` - List pending-operation ledger records
//! - `requeue` - Reset failed ledger records so they sync again
//! - `compact` - Rewrite the journal with only live state

mod commands;

use clap::{Parser, Subcommand};
use plansync_store::{LocalStore, StoreConfig};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// PlanSync command-line store tools.
#[derive(Parser)]
#[command(name = "plansync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display table counts, ledger summary and journal size
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List pending-operation ledger records
    Pending {
        /// Only show failed records
        #[arg(long)]
        failed: bool,

        /// Only show records of this table (e.g. tasks)
        #[arg(short, long)]
        table: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Reset failed ledger records to pending with a fresh retry budget
    Requeue {
        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Rewrite the journal with only live state
    Compact,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose.
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let store = open_store(cli.path.as_deref(), "inspect")?;
            print!("{}", commands::inspect::run(&store, &format)?);
        }
        Commands::Pending {
            failed,
            table,
            format,
        } => {
            let store = open_store(cli.path.as_deref(), "pending")?;
            print!(
                "{}",
                commands::pending::run(&store, failed, table.as_deref(), &format)?
            );
        }
        Commands::Requeue { dry_run } => {
            let store = open_store(cli.path.as_deref(), "requeue")?;
            print!("{}", commands::requeue::run(&store, dry_run)?);
        }
        Commands::Compact => {
            let store = open_store(cli.path.as_deref(), "compact")?;
            print!("{}", commands::compact::run(&store)?);
        }
        Commands::Version => {
            println!("PlanSync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn open_store(
    path: Option<&Path>,
    command: &str,
) -> Result<LocalStore, Box<dyn std::error::Error>> {
    let path = path.ok_or_else(|| format!("Store path required for {command}"))?;
    debug!(path = %path.display(), command, "opening store");
    let config = StoreConfig::default().create_if_missing(false);
    LocalStore::open(path, config)
        .map_err(|e| format!("Cannot open store at {}: {e}", path.display()).into())
}
