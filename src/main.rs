//! Ledger load generator
//!
//! Entry point: loads the configuration and the sender keys, then runs every
//! sender against the configured RPC node and prints what could not be
//! confirmed.

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loadgen::config::Config;
use loadgen::dispatch::{RunCoordinator, SenderSpec};
use loadgen::endpoints;
use loadgen::rpc_manager::JsonRpcTransport;
use loadgen::types::{RunReport, UnresolvedKind};
use loadgen::wallet::KeyStore;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "loadgen.toml", env = "LOADGEN_CONFIG")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Serve Prometheus metrics on this port (overrides the config)
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Total transactions across all senders (overrides the config)
    #[arg(long)]
    total_tx: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.json_logs)?;

    info!("Starting ledger load generator");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    info!("Loading configuration from: {}", args.config);
    let mut config = load_config(&args.config)?;
    if let Some(total_tx) = args.total_tx {
        config.load.total_tx = total_tx;
    }
    if let Some(port) = args.metrics_port {
        config.monitoring.enable_metrics = true;
        config.monitoring.metrics_port = port;
    }
    config.validate().context("Invalid configuration")?;

    // Initialize metrics
    if config.monitoring.enable_metrics {
        let metrics_port = config.monitoring.metrics_port;
        info!("Starting metrics server on port {}", metrics_port);
        tokio::spawn(async move {
            if let Err(e) = endpoints::endpoint_server(metrics_port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    // Load sender keys
    let store = KeyStore::new(config.credentials_dir(), config.network_id.clone());
    let mut senders = Vec::new();
    for account in config.sender_accounts() {
        let signer = store
            .load_signer(&account.account_id)
            .with_context(|| format!("Failed to load key of {}", account.account_id))?;
        senders.push(SenderSpec {
            account_id: account.account_id,
            nickname: account.nickname,
            signer: Arc::new(signer),
        });
    }

    let transport = JsonRpcTransport::new(config.rpc_url(), config.rpc_timeout())
        .context("Failed to create RPC client")?;
    info!(
        rpc = %transport.url(),
        senders = senders.len(),
        tx_per_sender = config.tx_per_sender(),
        queue_size = config.queue_size(),
        tx_sleep_ms = config.tx_sleep().as_millis() as u64,
        "Configuration loaded"
    );

    let mut coordinator = RunCoordinator::new(
        Arc::new(transport),
        config.resolver_config(),
        config.dispatch_config(),
        config.workload()?,
    );
    if let Some(explorer) = &config.monitoring.explorer_url {
        coordinator = coordinator.with_explorer(explorer.clone());
    }

    let report = coordinator.run(senders).await;
    println!("Run {}", coordinator.run_id());
    print_report(&report);

    if report.total_unresolved() > 0 {
        warn!(
            unresolved = report.total_unresolved(),
            "Some transactions could not be confirmed"
        );
    }
    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "loadgen=debug,info"
    } else {
        "loadgen=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}

/// Load configuration from file
fn load_config(path: &str) -> Result<Config> {
    Config::from_file_with_env(path).with_context(|| format!("Failed to load config from {}", path))
}

/// Per-sender summary of the transactions that need a second look
fn print_report(report: &RunReport) {
    for (sender, final_offset) in report.senders.iter().zip(&report.final_offsets) {
        if let Some(err) = &sender.setup_error {
            println!("{}: did not run ({})", sender.nickname, err);
            continue;
        }
        println!(
            "{}: {} confirmed, {} superseded, highest confirmed offset {}",
            sender.nickname, sender.confirmed, sender.superseded, final_offset
        );
        if sender.unresolved.is_empty() {
            continue;
        }
        println!(
            "{} had {} txs that could not be confirmed ({} ambiguous, {} failed)",
            sender.nickname,
            sender.unresolved.len(),
            sender.ambiguous_count(),
            sender.failed_count()
        );
        for tx in &sender.unresolved {
            let hash = tx.hash.map(|h| h.to_string()).unwrap_or_else(|| "-".to_string());
            match &tx.kind {
                UnresolvedKind::Ambiguous => println!(
                    "  offset {} nonce {} {}: not found, may still execute",
                    tx.offset, tx.nonce, hash
                ),
                UnresolvedKind::Failed(reason) => println!(
                    "  offset {} nonce {} {}: {}",
                    tx.offset, tx.nonce, hash, reason
                ),
            }
        }
    }
}
