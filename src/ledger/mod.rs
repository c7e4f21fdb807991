//! Species observation ledger
//!
//! Append-only record of validated species observations with per-species and
//! per-region aggregates, location buckets, admin corrections and a paused
//! lifecycle state.
//!
//! Modules:
//! - `gate`        - caller authorization, pause check, field bounds
//! - `index`       - (species, timestamp) duplicate index and location buckets
//! - `aggregates`  - running species/region statistics
//! - `corrections` - annotations by the admitting validator or the admin
//! - `lifecycle`   - admin, validator, pause flag, id counter
//! - `engine`      - transactional core tying the above together
//! - `events`      - committed-event outbox
//! - `request`     - JSON request/response envelope
//! - `ingestion`   - single-writer command loop and handle
//! - `serve`       - JSONL request stream driver

pub mod aggregates;
pub mod corrections;
pub mod engine;
pub mod error;
pub mod events;
pub mod gate;
pub mod hashing;
pub mod index;
pub mod ingestion;
pub mod lifecycle;
pub mod request;
pub mod serve;
pub mod store;
pub mod types;

pub use engine::LedgerEngine;
pub use error::{LedgerError, LedgerResult};
pub use events::{EventEnvelope, LedgerEvent, Outbox, DEFAULT_OUTBOX_CAPACITY};
pub use hashing::{EvidenceHash, LocationHash, RegionHash};
pub use ingestion::{start_ledger_ingestion, HandleError, LedgerCommand, LedgerHandle};
pub use request::{apply_request, LedgerRequest, LedgerResponse};
pub use serve::{serve_requests, ServeSummary, StopReason};
pub use types::{
    Correction, Identity, Observation, ObservationId, ObservationInput, RegionAggregate,
    SpeciesAggregate,
};
