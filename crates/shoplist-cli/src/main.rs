//! shoplist CLI - Command-line front end for the shoplist SDK
//!
//! Provides commands for:
//! - Running GET requests through the request queue
//! - Browsing locally stored lists and items
//! - Synchronizing lists with the remote service
//! - Inspecting configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use shoplist_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    config::ConfigCommand, fetch::FetchCommand, items::ItemsCommand, lists::ListsCommand,
    sync::SyncCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "shoplist", version, about = "Shopping list SDK client")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a GET request through the request queue
    Fetch(FetchCommand),
    /// List the shopping lists stored locally
    Lists(ListsCommand),
    /// Show the items of a shopping list
    Items(ItemsCommand),
    /// Synchronize lists with the remote service
    Sync(SyncCommand),
    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::default_path);

    let configured = Config::load_or_default(&config_path).logging.level;
    let filter = log_filter(cli.verbose, &configured);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Fetch(cmd) => cmd.execute(&config_path, format).await,
        Commands::Lists(cmd) => cmd.execute(&config_path, format).await,
        Commands::Items(cmd) => cmd.execute(&config_path, format).await,
        Commands::Sync(cmd) => cmd.execute(&config_path, format).await,
        Commands::Config(cmd) => cmd.execute(&config_path, format).await,
    }
}

/// `-v` flags win over `logging.level` from the configuration file
fn log_filter(verbose: u8, configured: &str) -> &str {
    match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    }
}
