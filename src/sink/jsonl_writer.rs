//! JSONL event sink - one event envelope per line, append-only

use super::writer_backend::{EventSink, SinkError};
use crate::ledger::EventEnvelope;
use async_trait::async_trait;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

pub struct JsonlEventWriter {
    writer: Mutex<BufWriter<fs::File>>,
}

impl JsonlEventWriter {
    /// Open (or create) the output file in append mode, creating parent dirs
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        log::info!("📝 Writing ledger events to: {}", path.display());

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

#[async_trait]
impl EventSink for JsonlEventWriter {
    async fn write_events(&self, events: &[EventEnvelope]) -> Result<(), SinkError> {
        let mut writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for envelope in events {
            let json = serde_json::to_string(envelope)?;
            writeln!(writer, "{}", json)?;
        }
        writer.flush()?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let mut writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writer.flush()?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "JSONL"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Identity, LedgerEvent};
    use tempfile::tempdir;

    fn envelope(sequence: u64) -> EventEnvelope {
        EventEnvelope {
            sequence,
            recorded_at: 1_700_000_000,
            event: LedgerEvent::LedgerPaused {
                by: Identity::from("admin"),
            },
        }
    }

    #[tokio::test]
    async fn test_jsonl_appends_one_line_per_event() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("events.jsonl");

        let writer = JsonlEventWriter::new(&path).unwrap();
        writer.write_events(&[envelope(1), envelope(2)]).await.unwrap();
        drop(writer);

        // Reopening appends instead of truncating
        let writer = JsonlEventWriter::new(&path).unwrap();
        writer.write_events(&[envelope(3)]).await.unwrap();
        writer.flush().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let sequences: Vec<u64> = contents
            .lines()
            .map(|line| serde_json::from_str::<EventEnvelope>(line).unwrap().sequence)
            .collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(writer.backend_type(), "JSONL");
    }
}
