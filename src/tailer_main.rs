//! Chain-tailing indexer binary
//!
//! Tails the chain through a node's JSON-RPC endpoint and projects
//! naming-system cells into the local read model. Handles forks with
//! single-step rollbacks and shuts down cleanly on Ctrl+C.

use anyhow::{Context, Result};
use clap::Parser;
use nomen::config::load_contracts;
use nomen::notify::{Notifier, DEFAULT_SUPPRESS_AFTER};
use nomen::rpc::ChainRpcClient;
use nomen::store::RocksProjectionStore;
use nomen::tailer::{Tailer, TailerConfig};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, Level};

/// Naming-system chain tailer
#[derive(Parser)]
#[command(name = "tailer")]
#[command(about = "Tail the chain and project naming-system cells into a local read model")]
struct Args {
    /// RPC endpoint URL of the chain node
    #[arg(short, long, default_value = "http://127.0.0.1:8114")]
    rpc_url: String,

    /// Path to the contracts seed file (one contract per line)
    #[arg(short, long, default_value = "contracts.txt")]
    contracts: PathBuf,

    /// Path to the RocksDB database directory
    #[arg(short, long, default_value = "./index_db")]
    db_path: PathBuf,

    /// Block height to start from on an empty database
    #[arg(long, default_value_t = 0)]
    start_height: u64,

    /// Trailing blocks behind tip treated as final
    #[arg(long, default_value_t = 3)]
    confirmations: u64,

    /// Blocks per catch-up batch
    #[arg(long, default_value_t = 10)]
    catchup_window: u64,

    /// Webhook URL for handler-failure alerts (optional)
    #[arg(long)]
    webhook_url: Option<String>,

    /// Keep retrying on a contract major-version mismatch instead of
    /// stopping
    #[arg(long, default_value_t = false)]
    continue_on_version_mismatch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let args = Args::parse();

    info!("Starting naming-system tailer");
    info!("RPC URL: {}", args.rpc_url);
    info!("Contracts: {:?}", args.contracts);
    info!("Database: {:?}", args.db_path);

    let registry = load_contracts(&args.contracts)
        .with_context(|| format!("Failed to load contracts from {:?}", args.contracts))?;

    let store = RocksProjectionStore::open(&args.db_path)
        .with_context(|| format!("Failed to open database at {:?}", args.db_path))?;

    let chain = ChainRpcClient::new(args.rpc_url);
    let notifier = Notifier::new(args.webhook_url, DEFAULT_SUPPRESS_AFTER);
    let config = TailerConfig {
        confirmations: args.confirmations,
        catchup_window: args.catchup_window,
        start_height: args.start_height,
        stop_on_version_mismatch: !args.continue_on_version_mismatch,
        ..TailerConfig::default()
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tailer = Tailer::new(chain, store, registry, notifier, config, shutdown_rx);

    // Periodic progress line from the published status
    let status_rx = tailer.status();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(30)).await;
            let status = *status_rx.borrow();
            info!(
                "Cursor at {} / tip {} (at_tip={})",
                status.current_height, status.tip_height, status.at_tip
            );
        }
    });

    // Handle Ctrl+C gracefully: the loop stops between iterations
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = shutdown_tx.send(true);
        }
    });

    tailer.run().await.context("Tailer error")?;
    info!("Tailer stopped");
    Ok(())
}
