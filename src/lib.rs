//! Species observation ledger
//!
//! - `ledger` - engine, request envelope, ingestion loop
//! - `sink`   - event sinks (JSONL, SQLite)
//! - `config` - environment configuration

pub mod config;
pub mod ledger;
pub mod sink;
