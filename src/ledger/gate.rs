//! Bounds & authorization gate
//!
//! Pure predicates over the candidate payload and the lifecycle state. Check
//! order is fixed so that the reported error is deterministic:
//! authorization, then pause, then field bounds.

use super::error::{LedgerError, LedgerResult};
use super::lifecycle::LedgerLifecycleState;
use super::types::{
    Identity, ObservationInput, MAX_CONFIDENCE, MAX_LOCATION_LEN, MAX_METADATA_LEN,
    MAX_SPECIES_LEN,
};

/// Run every admission check in order
pub fn check_admission(
    caller: &Identity,
    lifecycle: &LedgerLifecycleState,
    input: &ObservationInput,
) -> LedgerResult<()> {
    authorize_validator(caller, lifecycle)?;
    ensure_not_paused(lifecycle)?;
    check_bounds(input)
}

pub fn authorize_validator(caller: &Identity, lifecycle: &LedgerLifecycleState) -> LedgerResult<()> {
    if caller == lifecycle.authorized_validator() {
        Ok(())
    } else {
        Err(LedgerError::Unauthorized)
    }
}

pub fn ensure_not_paused(lifecycle: &LedgerLifecycleState) -> LedgerResult<()> {
    if lifecycle.is_paused() {
        Err(LedgerError::Paused)
    } else {
        Ok(())
    }
}

pub fn check_bounds(input: &ObservationInput) -> LedgerResult<()> {
    let within = input.species.chars().count() <= MAX_SPECIES_LEN
        && input.location_description.chars().count() <= MAX_LOCATION_LEN
        && input.metadata.chars().count() <= MAX_METADATA_LEN
        && input.confidence_score <= MAX_CONFIDENCE;

    if within {
        Ok(())
    } else {
        Err(LedgerError::InvalidObservation)
    }
}
