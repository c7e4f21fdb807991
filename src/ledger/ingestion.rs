//! Ledger ingestion - single-writer command loop
//!
//! Every request reaches the engine through one mpsc channel, so mutations
//! are applied in arrival order by exactly one task. The same task drains the
//! engine's event outbox into an `EventSink` on a fixed interval.
//!
//! Flush cycle:
//! - Lock engine, drain the outbox, release the lock
//! - Write the batch to the sink (engine unlocked)
//! - On sink failure, requeue the batch at the front of the outbox

use super::engine::LedgerEngine;
use super::request::{apply_request, LedgerRequest, LedgerResponse};
use crate::sink::EventSink;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Duration};

/// One request plus an optional reply slot
#[derive(Debug)]
pub struct LedgerCommand {
    pub request: LedgerRequest,
    pub reply: Option<oneshot::Sender<LedgerResponse>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandleError {
    #[error("Ledger ingestion task has stopped")]
    ChannelClosed,
}

/// Cloneable front door to a running ingestion task
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    tx: mpsc::Sender<LedgerCommand>,
}

impl LedgerHandle {
    pub fn new(tx: mpsc::Sender<LedgerCommand>) -> Self {
        Self { tx }
    }

    /// Create a handle and the receiver to hand to `start_ledger_ingestion`
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<LedgerCommand>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }

    /// Submit a request and wait for its response
    pub async fn submit(&self, request: LedgerRequest) -> Result<LedgerResponse, HandleError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(LedgerCommand {
                request,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| HandleError::ChannelClosed)?;
        reply_rx.await.map_err(|_| HandleError::ChannelClosed)
    }

    /// Submit a request without waiting for the outcome
    pub async fn send(&self, request: LedgerRequest) -> Result<(), HandleError> {
        self.tx
            .send(LedgerCommand {
                request,
                reply: None,
            })
            .await
            .map_err(|_| HandleError::ChannelClosed)
    }
}

/// Start ledger ingestion from the command channel
///
/// Runs until every sender has been dropped, then flushes the outbox one last
/// time and returns.
pub async fn start_ledger_ingestion(
    mut rx: mpsc::Receiver<LedgerCommand>,
    engine: Arc<Mutex<LedgerEngine>>,
    sink: Arc<dyn EventSink>,
    flush_interval_ms: u64,
) {
    log::info!("🚀 Starting ledger ingestion");
    log::info!("   ├─ Event sink: {}", sink.backend_type());
    log::info!("   └─ Flush interval: {}ms", flush_interval_ms);

    let mut flush_timer = interval(Duration::from_millis(flush_interval_ms.max(1)));
    let mut applied = 0u64;
    let mut rejected = 0u64;

    loop {
        tokio::select! {
            command = rx.recv() => {
                let Some(LedgerCommand { request, reply }) = command else {
                    break;
                };

                let op = request.op_name();
                let mutation = request.is_mutation();
                let response = {
                    let mut engine_guard = engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                    apply_request(&mut engine_guard, request)
                };

                if let LedgerResponse::Err { error, .. } = &response {
                    rejected += 1;
                    log::debug!("Rejected {}: {}", op, error);
                } else if mutation {
                    applied += 1;
                    log::debug!("Applied {}", op);
                }

                if let Some(reply) = reply {
                    // Caller may have given up waiting
                    let _ = reply.send(response);
                }
            }

            _ = flush_timer.tick() => {
                flush_outbox(&engine, sink.as_ref()).await;
            }
        }
    }

    log::info!("🛑 Command channel closed, final flush");
    flush_outbox(&engine, sink.as_ref()).await;
    if let Err(e) = sink.flush().await {
        log::error!("❌ Failed to flush {} sink: {}", sink.backend_type(), e);
    }
    log::info!(
        "✅ Ledger ingestion stopped ({} mutations applied, {} requests rejected)",
        applied,
        rejected
    );
}

/// Deliver pending events; returns how many reached the sink
pub async fn flush_outbox(engine: &Mutex<LedgerEngine>, sink: &dyn EventSink) -> usize {
    let (batch, dropped) = {
        let mut engine_guard = engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        (engine_guard.drain_events(), engine_guard.dropped_events())
    };

    if batch.is_empty() {
        return 0;
    }

    let flush_start = std::time::Instant::now();
    let count = batch.len();
    match sink.write_events(&batch).await {
        Ok(()) => {
            log::info!(
                "📊 Flushed {} events to {} | {}ms",
                count,
                sink.backend_type(),
                flush_start.elapsed().as_millis()
            );
            if dropped > 0 {
                log::warn!("⚠️  {} events dropped from a full outbox so far", dropped);
            }
            count
        }
        Err(e) => {
            log::error!("❌ Failed to write {} events: {}", count, e);
            let mut engine_guard = engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            engine_guard.requeue_events(batch);
            0
        }
    }
}
