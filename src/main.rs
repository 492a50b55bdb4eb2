//! Gleaner
//!
//! Host process for the sync engine.
//!
//! # Configuration
//!
//! Read from `--config`, or the default locations (see `gleaner print-config`).
//! Environment variables:
//! - `GLEANER_SOURCES`: Comma separated accounts to track
//! - `GLEANER_POLL_INTERVAL_SECS`: Seconds between passes
//! - `GLEANER_SOURCE_URL` / `GLEANER_SOURCE_TOKEN`: Account API access
//! - `GLEANER_STORE_PATH`: SQLite database path
//! - `RUST_LOG`: Log filter (overrides `logging.level`)

use anyhow::Context;
use clap::{Parser, Subcommand};
use gleaner::config::{generate_default_config, Config, LoadedConfig, LoggingConfig};
use gleaner::source::HttpSourceClient;
use gleaner::store::SqliteStore;
use gleaner::sync::{ManualScheduler, PassOutcome, SyncEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "gleaner")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Incrementally harvest account content into a content store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sync engine (default)
    Run {
        /// Run a single pass, print its report as JSON and exit
        #[arg(long)]
        once: bool,
    },

    /// Print a default configuration file
    PrintConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let once = match cli.command {
        Some(Commands::PrintConfig) => {
            print!("{}", generate_default_config());
            return Ok(());
        }
        Some(Commands::Run { once }) => once,
        None => false,
    };

    let loaded = match &cli.config {
        Some(path) => LoadedConfig::from_file(path)?,
        None => Config::load_default(),
    };
    let config = &loaded.config;
    config.validate()?;

    init_logging(&config.logging);
    tracing::info!("Gleaner v{}", env!("CARGO_PKG_VERSION"));
    loaded.log();

    if config.engine.sources.is_empty() {
        tracing::warn!("No sources configured, passes will do nothing");
    }

    let source = Arc::new(
        HttpSourceClient::new(config.source.to_client_config())
            .context("failed to build source client")?,
    );

    let store_path = config.store.resolved_path();
    tracing::info!("Content store: {:?}", store_path);
    let store = Arc::new(SqliteStore::open(&store_path).context("failed to open content store")?);

    let engine = Arc::new(SyncEngine::new(
        source,
        store,
        config.engine.to_sync_config(),
    ));

    if once {
        // Keep the trigger alive so the schedule does not end mid-pass
        let (scheduler, _trigger) = ManualScheduler::new();
        engine.start_with_scheduler(Box::new(scheduler)).await?;

        if let PassOutcome::Completed(report) = engine.run_pass().await {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        engine.stop().await;
        return Ok(());
    }

    let start = engine.start().await?;
    tracing::info!(
        seeded = start.seeded.len(),
        degraded = !start.failures.is_empty(),
        "Engine started, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");
    engine.stop().await;

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gleaner={}", config.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
