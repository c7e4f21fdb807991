//! Runtime configuration from environment variables
//!
//! Environment variables:
//! - `LEDGER_ADMIN` (required) - initial admin identity
//! - `LEDGER_VALIDATOR` (required) - initial authorized validator
//! - `LEDGER_EVENT_BACKEND` (default: sqlite) - `sqlite` or `jsonl`
//! - `LEDGER_DB_PATH` (default: ledger.db)
//! - `LEDGER_SCHEMA_DIR` (default: sql)
//! - `LEDGER_EVENTS_PATH` (default: events/ledger.jsonl)
//! - `LEDGER_COMMAND_BUFFER` (default: 1024)
//! - `LEDGER_FLUSH_INTERVAL_MS` (default: 1000)
//! - `LEDGER_OUTBOX_CAPACITY` (default: 10000)
//! - `LEDGER_INPUT_PATH` (default: stdin) - JSONL request stream

use crate::ledger::{Identity, DEFAULT_OUTBOX_CAPACITY};
use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Jsonl,
    Sqlite,
}

impl FromStr for BackendType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jsonl" => Ok(BackendType::Jsonl),
            "sqlite" => Ok(BackendType::Sqlite),
            other => Err(ConfigError::InvalidValue(format!(
                "LEDGER_EVENT_BACKEND must be 'sqlite' or 'jsonl', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub admin: Identity,
    pub validator: Identity,
    pub backend: BackendType,
    pub db_path: String,
    pub schema_dir: String,
    pub events_path: String,
    pub command_buffer: usize,
    pub flush_interval_ms: u64,
    pub outbox_capacity: usize,
    /// JSONL request file; `None` reads stdin
    pub input_path: Option<String>,
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let admin = Identity::new(required("LEDGER_ADMIN")?);
        let validator = Identity::new(required("LEDGER_VALIDATOR")?);

        let backend = match lookup("LEDGER_EVENT_BACKEND") {
            Some(value) => value.parse()?,
            None => BackendType::Sqlite,
        };

        let command_buffer: usize = parse_number(&lookup, "LEDGER_COMMAND_BUFFER", 1024)?;
        if command_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "LEDGER_COMMAND_BUFFER must be greater than zero".to_string(),
            ));
        }

        let flush_interval_ms: u64 = parse_number(&lookup, "LEDGER_FLUSH_INTERVAL_MS", 1000)?;
        if flush_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "LEDGER_FLUSH_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            admin,
            validator,
            backend,
            db_path: or_default("LEDGER_DB_PATH", "ledger.db"),
            schema_dir: or_default("LEDGER_SCHEMA_DIR", "sql"),
            events_path: or_default("LEDGER_EVENTS_PATH", "events/ledger.jsonl"),
            command_buffer,
            flush_interval_ms,
            outbox_capacity: parse_number(&lookup, "LEDGER_OUTBOX_CAPACITY", DEFAULT_OUTBOX_CAPACITY)?,
            input_path: lookup("LEDGER_INPUT_PATH").filter(|path| !path.trim().is_empty()),
        })
    }
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{} is not a valid number: '{}'", key, raw))),
        None => Ok(default),
    }
}
