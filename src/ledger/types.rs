//! Core ledger records
//!
//! Field bounds live here so the gate, the request decoder and the tests all
//! agree on the same limits.

use super::hashing::EvidenceHash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum species name length (characters)
pub const MAX_SPECIES_LEN: usize = 100;

/// Maximum location description length (characters)
pub const MAX_LOCATION_LEN: usize = 200;

/// Maximum metadata length (characters)
pub const MAX_METADATA_LEN: usize = 500;

/// Highest accepted confidence score
pub const MAX_CONFIDENCE: u32 = 100;

/// Maximum number of observation ids in one location bucket
pub const MAX_BUCKET_LEN: usize = 1000;

/// Largest page returned by `get_paginated_observations`
pub const MAX_PAGE_LIMIT: u32 = 100;

pub type ObservationId = u64;

/// Opaque caller identity (principal, account, key fingerprint, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Candidate observation as submitted by the validation process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationInput {
    pub species: String,
    /// Unix seconds
    pub timestamp: u64,
    /// Degrees scaled by 1e6
    pub latitude: i64,
    /// Degrees scaled by 1e6
    pub longitude: i64,
    pub location_description: String,
    pub evidence_hash: EvidenceHash,
    pub metadata: String,
    /// 0..=100, decided by the external quorum
    pub confidence_score: u32,
    pub contributor: Identity,
}

/// An admitted observation. Never modified after it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub id: ObservationId,
    pub species: String,
    pub timestamp: u64,
    pub latitude: i64,
    pub longitude: i64,
    pub location_description: String,
    pub evidence_hash: EvidenceHash,
    pub contributor: Identity,
    /// The caller that admitted this observation
    pub validator: Identity,
    pub metadata: String,
    pub confidence_score: u32,
}

impl Observation {
    pub(crate) fn from_input(id: ObservationId, input: ObservationInput, validator: Identity) -> Self {
        Self {
            id,
            species: input.species,
            timestamp: input.timestamp,
            latitude: input.latitude,
            longitude: input.longitude,
            location_description: input.location_description,
            evidence_hash: input.evidence_hash,
            contributor: input.contributor,
            validator,
            metadata: input.metadata,
            confidence_score: input.confidence_score,
        }
    }
}

/// Per-species summary, recomputed on every admission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesAggregate {
    pub total_observations: u64,
    pub last_observed: u64,
    /// Running mean with floor rounding at every step
    pub avg_confidence: u64,
    /// +1 when the latest admission moved `last_observed` forward, else -1
    pub population_trend: i8,
}

/// Per-region summary keyed by the location description hash
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionAggregate {
    /// Carried forward unchanged; admissions never touch it
    pub species_count: u64,
    pub total_observations: u64,
    pub biodiversity_index: u64,
}

/// The live annotation attached to an observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub note: String,
    pub corrector: Identity,
    /// Unix seconds at which the correction was recorded
    pub corrected_at: u64,
}
