//! Correction log
//!
//! One live correction per observation. A new correction replaces the previous
//! one; the observation itself is never touched.

use super::error::{LedgerError, LedgerResult};
use super::types::{Correction, Identity, Observation, ObservationId};
use std::collections::HashMap;

/// Only the validator that admitted the observation, or the current admin, may
/// annotate it.
pub fn authorize_corrector(
    observation: &Observation,
    caller: &Identity,
    admin: &Identity,
) -> LedgerResult<()> {
    if caller == &observation.validator || caller == admin {
        Ok(())
    } else {
        Err(LedgerError::Unauthorized)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CorrectionLog {
    entries: HashMap<ObservationId, Correction>,
}

impl CorrectionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ObservationId) -> Option<&Correction> {
        self.entries.get(&id)
    }

    /// Set the live correction, returning the one it replaced
    pub(crate) fn set(&mut self, id: ObservationId, correction: Correction) -> Option<Correction> {
        self.entries.insert(id, correction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::hashing::EvidenceHash;

    fn observation() -> Observation {
        Observation {
            id: 1,
            species: "Heron".to_string(),
            timestamp: 1,
            latitude: 0,
            longitude: 0,
            location_description: "Marsh".to_string(),
            evidence_hash: EvidenceHash::from_bytes([0; 32]),
            contributor: Identity::from("contributor"),
            validator: Identity::from("validator"),
            metadata: String::new(),
            confidence_score: 50,
        }
    }

    #[test]
    fn test_validator_and_admin_may_correct() {
        let obs = observation();
        let admin = Identity::from("admin");
        assert_eq!(authorize_corrector(&obs, &Identity::from("validator"), &admin), Ok(()));
        assert_eq!(authorize_corrector(&obs, &admin, &admin), Ok(()));
    }

    #[test]
    fn test_contributor_may_not_correct() {
        let obs = observation();
        assert_eq!(
            authorize_corrector(&obs, &Identity::from("contributor"), &Identity::from("admin")),
            Err(LedgerError::Unauthorized)
        );
    }

    #[test]
    fn test_set_replaces_previous() {
        let mut log = CorrectionLog::new();
        let first = Correction {
            note: "wrong wing pattern".to_string(),
            corrector: Identity::from("validator"),
            corrected_at: 10,
        };
        let second = Correction {
            note: "juvenile, not adult".to_string(),
            corrector: Identity::from("admin"),
            corrected_at: 20,
        };
        assert!(log.set(1, first.clone()).is_none());
        assert_eq!(log.set(1, second.clone()), Some(first));
        assert_eq!(log.get(1), Some(&second));
        assert!(log.get(2).is_none());
    }
}
