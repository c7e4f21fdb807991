//! Typed ledger events and the outbox that holds them until delivery
//!
//! Every committed mutation appends one event. The outbox is drained by the
//! ingestion task and handed to an `EventSink`; delivery never affects the
//! outcome of the mutation that produced the event.

use super::hashing::{LocationHash, RegionHash};
use super::types::{Correction, Identity, Observation, ObservationId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of undelivered events kept before the oldest are dropped
pub const DEFAULT_OUTBOX_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    ObservationAdmitted {
        observation: Observation,
        location_hash: LocationHash,
        region_hash: RegionHash,
    },
    CorrectionRecorded {
        observation_id: ObservationId,
        correction: Correction,
    },
    LedgerPaused {
        by: Identity,
    },
    LedgerUnpaused {
        by: Identity,
    },
    AdminTransferred {
        previous: Identity,
        new_admin: Identity,
    },
    ValidatorChanged {
        previous: Identity,
        new_validator: Identity,
    },
}

impl LedgerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::ObservationAdmitted { .. } => "observation_admitted",
            LedgerEvent::CorrectionRecorded { .. } => "correction_recorded",
            LedgerEvent::LedgerPaused { .. } => "ledger_paused",
            LedgerEvent::LedgerUnpaused { .. } => "ledger_unpaused",
            LedgerEvent::AdminTransferred { .. } => "admin_transferred",
            LedgerEvent::ValidatorChanged { .. } => "validator_changed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Monotonic from 1, never reused
    pub sequence: u64,
    /// Unix seconds at commit time
    pub recorded_at: u64,
    #[serde(flatten)]
    pub event: LedgerEvent,
}

#[derive(Debug, Clone)]
pub struct Outbox {
    pending: VecDeque<EventEnvelope>,
    capacity: usize,
    next_sequence: u64,
    dropped: u64,
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOX_CAPACITY)
    }
}

impl Outbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            capacity: capacity.max(1),
            next_sequence: 1,
            dropped: 0,
        }
    }

    pub fn push(&mut self, recorded_at: u64, event: LedgerEvent) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.make_room(1);
        self.pending.push_back(EventEnvelope {
            sequence,
            recorded_at,
            event,
        });
        sequence
    }

    /// Change the bound in place. Sequence numbering and the drop count carry
    /// on; if the new bound is smaller, the oldest pending envelopes are dropped.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.make_room(0);
    }

    /// Take everything pending, oldest first
    pub fn drain(&mut self) -> Vec<EventEnvelope> {
        self.pending.drain(..).collect()
    }

    /// Put back envelopes a sink failed to deliver, ahead of newer ones
    pub fn requeue(&mut self, envelopes: Vec<EventEnvelope>) {
        for envelope in envelopes.into_iter().rev() {
            if self.pending.len() >= self.capacity {
                // Newer events win over the oldest undelivered ones
                self.record_drop(&envelope);
                continue;
            }
            self.pending.push_front(envelope);
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn make_room(&mut self, incoming: usize) {
        while self.pending.len() + incoming > self.capacity {
            match self.pending.pop_front() {
                Some(oldest) => self.record_drop(&oldest),
                None => break,
            }
        }
    }

    fn record_drop(&mut self, envelope: &EventEnvelope) {
        self.dropped += 1;
        log::warn!(
            "⚠️  Outbox full ({}), dropping event #{} ({})",
            self.capacity,
            envelope.sequence,
            envelope.event.kind()
        );
    }
}
