//! Sisyphus: reverts OSM changesets made by watched accounts.
//!
//! # Usage
//!
//! ```text
//! sisyphus [--config PATH] [-v] run [--dry-run]
//! sisyphus revert <ID>... [--dry-run]
//! sisyphus status [--json]
//! sisyphus cursor show
//! sisyphus cursor set <N> [--force]
//! sisyphus init [--user UID]... [--fail-mail ADDR] [--force]
//! ```
//!
//! `run` is meant to be invoked periodically by an external scheduler (cron,
//! a systemd timer); each invocation resumes from the persisted cursor.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{
    cursor::CursorCommand, init::InitArgs, revert::RevertArgs, run::RunArgs, status::StatusArgs,
};
use sisyphus_core::config;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "sisyphus",
    version,
    about = "Revert OpenStreetMap changesets made by watched accounts",
    long_about = None,
)]
struct Cli {
    /// Config file (default: $SISYPHUS_CONFIG or ~/.sisyphus/config.yaml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process replication units up to the feed head and revert watched changesets.
    Run(RunArgs),

    /// Revert the given changesets now, outside the feed loop.
    Revert(RevertArgs),

    /// Show the feed head, the cursor and the pending range.
    Status(StatusArgs),

    /// Inspect or move the persisted cursor.
    Cursor {
        #[command(subcommand)]
        command: CursorCommand,
    },

    /// Write a starter config file.
    Init(InitArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = match cli.config {
        Some(path) => path,
        None => config::default_config_path().context("cannot locate the config file")?,
    };
    tracing::debug!(config = %config_path.display(), "using config");

    match cli.command {
        Commands::Run(args) => args.run(&config_path),
        Commands::Revert(args) => args.run(&config_path),
        Commands::Status(args) => args.run(&config_path),
        Commands::Cursor { command } => commands::cursor::run(command, &config_path),
        Commands::Init(args) => args.run(&config_path),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
