//! Ledger Runtime
//!
//! Reads JSON ledger requests (one per line) and prints one JSON response per
//! line to stdout:
//! - Builds the event sink (SQLite or JSONL) from configuration
//! - Spawns the single-writer ingestion task
//! - Feeds requests from `LEDGER_INPUT_PATH` or stdin until EOF or CTRL+C
//!
//! Usage:
//!   LEDGER_ADMIN=admin LEDGER_VALIDATOR=validator cargo run --bin ledger_runtime < requests.jsonl
//!
//! See `obs_ledger::config` for the full list of environment variables.

use dotenv::dotenv;
use log::{error, info, warn};
use obs_ledger::config::LedgerConfig;
use obs_ledger::ledger::{serve_requests, start_ledger_ingestion, LedgerEngine, LedgerHandle};
use obs_ledger::sink::build_sink;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, BufReader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize environment and logging
    dotenv().ok();
    env_logger::init();

    info!("🚀 Ledger Runtime");

    let config = LedgerConfig::from_env()?;
    info!("   ├─ Admin: {}", config.admin);
    info!("   ├─ Validator: {}", config.validator);
    info!("   ├─ Command buffer: {}", config.command_buffer);
    info!("   ├─ Outbox capacity: {}", config.outbox_capacity);
    info!(
        "   └─ Input: {}",
        config.input_path.as_deref().unwrap_or("<stdin>")
    );

    let input: Box<dyn AsyncRead + Unpin + Send> = match &config.input_path {
        Some(path) => Box::new(tokio::fs::File::open(path).await?),
        None => Box::new(tokio::io::stdin()),
    };

    let sink = build_sink(&config)?;

    let engine = Arc::new(Mutex::new(
        LedgerEngine::new(config.admin.clone(), config.validator.clone())
            .with_outbox_capacity(config.outbox_capacity),
    ));
    info!("✅ LedgerEngine created");

    let (handle, rx) = LedgerHandle::channel(config.command_buffer);
    let ingestion = tokio::spawn(start_ledger_ingestion(
        rx,
        engine.clone(),
        sink,
        config.flush_interval_ms,
    ));

    info!("🔄 Reading requests (CTRL+C to stop)");

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => warn!("⚠️  Received CTRL+C, shutting down..."),
            Err(err) => error!("❌ Failed to listen for CTRL+C: {}", err),
        }
    };
    let mut stdout = tokio::io::stdout();
    let summary = serve_requests(BufReader::new(input), &mut stdout, &handle, shutdown).await;

    // Closing the channel lets ingestion run its final flush
    drop(handle);
    if let Err(e) = ingestion.await {
        error!("❌ Ingestion task failed: {}", e);
    }

    let engine_guard = engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    info!(
        "✅ Ledger runtime stopped ({:?}; {} requests, {} malformed, {} observations, {} undelivered events, {} dropped)",
        summary.stopped_by,
        summary.submitted,
        summary.malformed,
        engine_guard.get_total_observations(),
        engine_guard.pending_events(),
        engine_guard.dropped_events()
    );
    Ok(())
}
