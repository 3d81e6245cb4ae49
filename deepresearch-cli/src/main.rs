//! deepresearch CLI: terminal interface for the multi-stage research workflow.
//!
//! Runs a single research session from a subcommand, or shows the interactive
//! main menu when no subcommand is given.

mod commands;
mod progress;
mod repl;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// deepresearch: clarify, plan, search, write, critique, archive
#[derive(Parser, Debug)]
#[command(name = "deepresearch", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (its .deepresearch/config.toml is loaded)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Text-generation model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress log output on stderr
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand (shows the main menu if omitted)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Research a question and print the final report
    Research {
        /// The research question (prompted for if omitted)
        query: Option<String>,
        /// Print every progress message as it happens
        #[arg(long)]
        stream: bool,
        /// Maximum number of critique-driven rewrites
        #[arg(long)]
        max_revisions: Option<u32>,
    },
    /// Search archived reports by title keyword
    Search {
        /// Keyword to match against report titles
        keyword: String,
    },
    /// List all archived reports
    List,
    /// Show the archive analytics dashboard
    Stats,
    /// List saved research sessions
    Sessions,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default configuration file into the workspace
    Init,
    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = deepresearch_core::config::data_dir().join("logs");
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "deepresearch.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    if let Some(command) = cli.command {
        return commands::handle_command(command, &workspace, cli.model).await;
    }

    if !deepresearch_core::config::config_exists(Some(&workspace)) {
        tracing::info!("No config file found, using defaults (run `deepresearch config init`)");
    }
    let mut config = commands::load(&workspace)?;
    if let Some(model) = cli.model {
        config.llm.model = model;
    }
    repl::run_menu(config).await
}
