//! Event sink trait
//!
//! Defines the interface the ingestion task uses to hand committed ledger
//! events to an external indexer.

use crate::ledger::EventEnvelope;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("{field} value {value} does not fit an SQLite INTEGER")]
    OutOfRange { field: &'static str, value: u64 },
}

/// Backend trait for delivering ledger events
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver a batch of events, oldest first.
    ///
    /// On error the whole batch is treated as undelivered and will be offered
    /// again, so implementations must tolerate seeing a sequence twice.
    async fn write_events(&self, events: &[EventEnvelope]) -> Result<(), SinkError>;

    /// Flush pending writes to storage
    async fn flush(&self) -> Result<(), SinkError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}
