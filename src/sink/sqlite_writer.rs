//! SQLite event sink
//!
//! Tables written (see `/sql/` directory):
//! - `ledger_events` - INSERT OR IGNORE on sequence (raw envelope JSON)
//! - `observations`  - projected from `observation_admitted`
//! - `corrections`   - UPSERT on observation_id from `correction_recorded`
//!
//! Each batch is written in a single transaction. Redelivered envelopes are
//! skipped, so a batch that failed half-way can safely be offered again.
//!
//! SQLite integers are signed 64-bit. Ledger-assigned values (sequence, ids,
//! clock readings) above `i64::MAX` fail the batch with `OutOfRange`. An
//! observation whose own timestamp does not fit is kept in `ledger_events`
//! (the payload is lossless JSON) but not projected into `observations`.

use super::writer_backend::{EventSink, SinkError};
use crate::ledger::{EventEnvelope, LedgerEvent};
use async_trait::async_trait;
use rusqlite::{params, Connection, Transaction};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// Run schema migrations from SQL files
///
/// Reads all .sql files from `schema_dir`, sorted by name, and executes them.
/// Every file uses "IF NOT EXISTS" clauses, so running twice is harmless.
pub fn run_schema_migrations(conn: &mut Connection, schema_dir: &str) -> Result<(), SinkError> {
    let schema_path = Path::new(schema_dir);

    if !schema_path.exists() {
        return Err(SinkError::Schema(format!(
            "Schema directory not found: {}",
            schema_dir
        )));
    }

    conn.pragma_update(None, "journal_mode", "WAL")?;
    log::info!("📊 Enabled WAL mode for SQLite database");

    let mut sql_files: Vec<_> = fs::read_dir(schema_path)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();

    sql_files.sort_by_key(|entry| entry.file_name());

    log::info!("🔧 Running schema migrations from: {}", schema_dir);

    for entry in sql_files {
        let path = entry.path();
        let filename = entry.file_name().to_string_lossy().into_owned();

        log::info!("   ├─ Executing: {}", filename);
        let sql_content = fs::read_to_string(&path)?;
        conn.execute_batch(&sql_content)?;
    }

    log::info!("✅ All schema migrations completed successfully");
    Ok(())
}

fn sql_int(field: &'static str, value: u64) -> Result<i64, SinkError> {
    i64::try_from(value).map_err(|_| SinkError::OutOfRange { field, value })
}

pub struct SqliteEventWriter {
    conn: Mutex<Connection>,
}

impl SqliteEventWriter {
    /// Open (or create) a database and bring its schema up to date
    pub fn open_with_schema(db_path: impl AsRef<Path>, schema_dir: &str) -> Result<Self, SinkError> {
        let mut conn = Connection::open(db_path)?;
        run_schema_migrations(&mut conn, schema_dir)?;
        log::info!("✅ SQLite event writer initialized");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn write_envelope(tx: &Transaction<'_>, envelope: &EventEnvelope) -> Result<(), SinkError> {
        let payload = serde_json::to_string(envelope)?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO ledger_events (sequence, recorded_at, kind, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                sql_int("sequence", envelope.sequence)?,
                sql_int("recorded_at", envelope.recorded_at)?,
                envelope.event.kind(),
                payload,
            ],
        )?;

        if inserted == 0 {
            log::debug!("Skipping already delivered event #{}", envelope.sequence);
            return Ok(());
        }

        match &envelope.event {
            LedgerEvent::ObservationAdmitted {
                observation,
                location_hash,
                region_hash,
            } => {
                let id = sql_int("observation id", observation.id)?;
                let Ok(timestamp) = i64::try_from(observation.timestamp) else {
                    log::warn!(
                        "⚠️  Observation #{} timestamp {} exceeds INTEGER range, kept in ledger_events only",
                        observation.id,
                        observation.timestamp
                    );
                    return Ok(());
                };
                tx.execute(
                    r#"
                    INSERT OR IGNORE INTO observations (
                        id, species, timestamp, latitude, longitude,
                        location_description, evidence_hash, contributor, validator,
                        metadata, confidence_score, location_hash, region_hash
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                    "#,
                    params![
                        id,
                        observation.species,
                        timestamp,
                        observation.latitude,
                        observation.longitude,
                        observation.location_description,
                        observation.evidence_hash.to_hex(),
                        observation.contributor.as_str(),
                        observation.validator.as_str(),
                        observation.metadata,
                        observation.confidence_score,
                        location_hash.to_hex(),
                        region_hash.to_hex(),
                    ],
                )?;
            }
            LedgerEvent::CorrectionRecorded {
                observation_id,
                correction,
            } => {
                tx.execute(
                    r#"
                    INSERT INTO corrections (observation_id, note, corrector, corrected_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(observation_id) DO UPDATE SET
                        note = excluded.note,
                        corrector = excluded.corrector,
                        corrected_at = excluded.corrected_at
                    "#,
                    params![
                        sql_int("observation id", *observation_id)?,
                        correction.note,
                        correction.corrector.as_str(),
                        sql_int("corrected_at", correction.corrected_at)?,
                    ],
                )?;
            }
            LedgerEvent::LedgerPaused { .. }
            | LedgerEvent::LedgerUnpaused { .. }
            | LedgerEvent::AdminTransferred { .. }
            | LedgerEvent::ValidatorChanged { .. } => {}
        }

        Ok(())
    }
}

#[async_trait]
impl EventSink for SqliteEventWriter {
    async fn write_events(&self, events: &[EventEnvelope]) -> Result<(), SinkError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let tx = conn.transaction()?;
        for envelope in events {
            Self::write_envelope(&tx, envelope)?;
        }
        tx.commit()?;

        log::debug!("✅ Wrote {} ledger events to SQLite", events.len());
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        // Every batch commits its own transaction
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
