//! Event sinks consuming the ledger outbox
//!
//! - `writer_backend` - `EventSink` trait and `SinkError`
//! - `jsonl_writer`   - append-only JSONL file
//! - `sqlite_writer`  - SQLite projection (events, observations, corrections)

pub mod jsonl_writer;
pub mod sqlite_writer;
pub mod writer_backend;

pub use jsonl_writer::JsonlEventWriter;
pub use sqlite_writer::{run_schema_migrations, SqliteEventWriter};
pub use writer_backend::{EventSink, SinkError};

use crate::config::{BackendType, LedgerConfig};
use std::sync::Arc;

/// Build the sink selected by `LEDGER_EVENT_BACKEND`
pub fn build_sink(config: &LedgerConfig) -> Result<Arc<dyn EventSink>, SinkError> {
    let sink: Arc<dyn EventSink> = match config.backend {
        BackendType::Jsonl => Arc::new(JsonlEventWriter::new(&config.events_path)?),
        BackendType::Sqlite => Arc::new(SqliteEventWriter::open_with_schema(
            &config.db_path,
            &config.schema_dir,
        )?),
    };
    log::info!("✅ Event sink ready ({})", sink.backend_type());
    Ok(sink)
}
