//! fts-sync server - HTTP full-text search over indexed collections.
//!
//! Opens the collection database, reconciles every target index, then serves
//! `GET /{api_prefix}/{collection}/records/full-text-search?search=...`.

mod handler;
mod server;

use anyhow::{Context, Result};
use clap::Parser;
use fts_sync::{FtsSync, SyncConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "fts-sync-server")]
#[command(about = "Full-text search server for SQLite collections")]
struct Args {
    /// JSON configuration file (targets, expand set, tokenizer)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database file, overrides the configuration
    #[arg(long)]
    db: Option<PathBuf>,

    /// Route prefix for the search endpoint, overrides the configuration
    #[arg(long)]
    api_prefix: Option<String>,

    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "8090")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting fts-sync server");

    let mut config = match &args.config {
        Some(path) => SyncConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => SyncConfig::default(),
    };
    if let Some(db) = args.db {
        config.database_path = db;
    }
    if let Some(prefix) = args.api_prefix {
        config.api_prefix = prefix;
    }

    info!("Database: {}", config.database_path.display());

    let sync = tokio::task::spawn_blocking(move || -> fts_sync::Result<FtsSync> {
        let sync = FtsSync::open(config)?;
        sync.serve()?;
        Ok(sync)
    })
    .await?
    .context("Failed to reconcile full-text indexes")?;

    let api_prefix = sync.config().api_prefix.clone();
    let addr = server::start_server(Arc::new(sync), &api_prefix, &args.host, args.port).await?;

    // Intentional stdout so wrappers can discover an auto-assigned port.
    println!("FTS_SYNC_PORT={}", addr.port());

    info!("Search server running on {}", addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
