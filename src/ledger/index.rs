//! Derived indexes: species+timestamp lookup and location buckets
//!
//! The species index doubles as the duplicate detector. It only catches exact
//! (species, timestamp) collisions; the same species a second later is a new
//! observation.

use super::error::{LedgerError, LedgerResult};
use super::hashing::LocationHash;
use super::types::{ObservationId, MAX_BUCKET_LEN};
use std::collections::{BTreeMap, HashMap};

/// (species, timestamp) -> observation id, at most one entry per key
#[derive(Debug, Clone, Default)]
pub struct SpeciesIndex {
    entries: HashMap<String, BTreeMap<u64, ObservationId>>,
}

impl SpeciesIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, species: &str, timestamp: u64) -> Option<ObservationId> {
        self.entries
            .get(species)
            .and_then(|timeline| timeline.get(&timestamp))
            .copied()
    }

    /// Fails with `AlreadyExists` if the key is taken
    pub fn ensure_vacant(&self, species: &str, timestamp: u64) -> LedgerResult<()> {
        if self.get(species, timestamp).is_some() {
            Err(LedgerError::AlreadyExists)
        } else {
            Ok(())
        }
    }

    /// Caller must have checked `ensure_vacant` first
    pub(crate) fn insert(&mut self, species: &str, timestamp: u64, id: ObservationId) {
        let previous = self
            .entries
            .entry(species.to_string())
            .or_default()
            .insert(timestamp, id);
        debug_assert!(previous.is_none(), "species index key reused");
    }
}

/// Location hash -> append-only, capacity-checked list of observation ids
#[derive(Debug, Clone)]
pub struct LocationBuckets {
    buckets: HashMap<LocationHash, Vec<ObservationId>>,
    capacity: usize,
}

impl Default for LocationBuckets {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationBuckets {
    pub fn new() -> Self {
        Self::with_capacity(MAX_BUCKET_LEN)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buckets: HashMap::new(),
            capacity,
        }
    }

    pub fn bucket(&self, hash: &LocationHash) -> &[ObservationId] {
        self.buckets.get(hash).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fails with `CapacityExceeded` if one more id would not fit
    pub fn ensure_room(&self, hash: &LocationHash) -> LedgerResult<()> {
        if self.bucket(hash).len() >= self.capacity {
            Err(LedgerError::CapacityExceeded)
        } else {
            Ok(())
        }
    }

    /// Caller must have checked `ensure_room` first
    pub(crate) fn append(&mut self, hash: LocationHash, id: ObservationId) {
        let bucket = self.buckets.entry(hash).or_default();
        debug_assert!(bucket.len() < self.capacity, "location bucket overfilled");
        bucket.push(id);
    }
}
