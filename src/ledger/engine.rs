//! Ledger engine - the transactional core
//!
//! Owns the lifecycle state, the observation store, both indexes, the
//! aggregates, the correction log and the event outbox. Every mutating method
//! either commits completely or returns an error having changed nothing.
//!
//! ## Admission
//!
//! ```text
//! add_observation()
//!     ↓
//! gate::check_admission()        Unauthorized / Paused / InvalidObservation
//!     ↓
//! SpeciesIndex::ensure_vacant()  AlreadyExists
//!     ↓
//! stage_admission()              CapacityExceeded (all derived values computed)
//!     ↓
//! commit_admission()             infallible writes + ObservationAdmitted event
//! ```
//!
//! The engine is not internally synchronized. Wrap it in `Arc<Mutex<_>>` and
//! route mutations through a single writer (see `ingestion`).

use super::aggregates::{AggregateBook, StagedAggregates};
use super::corrections::{authorize_corrector, CorrectionLog};
use super::error::{LedgerError, LedgerResult};
use super::events::{EventEnvelope, LedgerEvent, Outbox, DEFAULT_OUTBOX_CAPACITY};
use super::gate;
use super::hashing::{location_hash, region_hash, LocationHash, RegionHash};
use super::index::{LocationBuckets, SpeciesIndex};
use super::lifecycle::LedgerLifecycleState;
use super::store::ObservationStore;
use super::types::{
    Correction, Identity, Observation, ObservationId, ObservationInput, RegionAggregate,
    SpeciesAggregate, MAX_PAGE_LIMIT,
};

/// An admission with every derived value computed but nothing written yet
#[derive(Debug, Clone)]
struct StagedAdmission {
    observation: Observation,
    location_hash: LocationHash,
    region_hash: RegionHash,
    aggregates: StagedAggregates,
}

pub struct LedgerEngine {
    lifecycle: LedgerLifecycleState,
    store: ObservationStore,
    species_index: SpeciesIndex,
    location_buckets: LocationBuckets,
    aggregates: AggregateBook,
    corrections: CorrectionLog,
    outbox: Outbox,

    /// Timestamp function (for testing with mock time)
    now_fn: Box<dyn Fn() -> u64 + Send + Sync>,
}

impl LedgerEngine {
    /// Create an empty ledger using system time for corrections and events
    pub fn new(admin: Identity, validator: Identity) -> Self {
        Self::new_with_timestamp_fn(
            admin,
            validator,
            Box::new(|| chrono::Utc::now().timestamp().max(0) as u64),
        )
    }

    /// Create an empty ledger with a custom clock (Unix seconds)
    pub fn new_with_timestamp_fn(
        admin: Identity,
        validator: Identity,
        now_fn: Box<dyn Fn() -> u64 + Send + Sync>,
    ) -> Self {
        Self {
            lifecycle: LedgerLifecycleState::new(admin, validator),
            store: ObservationStore::new(),
            species_index: SpeciesIndex::new(),
            location_buckets: LocationBuckets::new(),
            aggregates: AggregateBook::new(),
            corrections: CorrectionLog::new(),
            outbox: Outbox::new(DEFAULT_OUTBOX_CAPACITY),
            now_fn,
        }
    }

    /// Replace the outbox bound. Pending events are kept.
    pub fn with_outbox_capacity(mut self, capacity: usize) -> Self {
        self.outbox.set_capacity(capacity);
        self
    }

    /// Override the location bucket bound (defaults to `MAX_BUCKET_LEN`)
    pub fn with_bucket_capacity(mut self, capacity: usize) -> Self {
        self.location_buckets = LocationBuckets::with_capacity(capacity);
        self
    }

    fn now(&self) -> u64 {
        (self.now_fn)()
    }

    fn emit(&mut self, event: LedgerEvent) {
        let now = self.now();
        self.outbox.push(now, event);
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Admit a verified observation. Returns its id.
    pub fn add_observation(
        &mut self,
        caller: &Identity,
        input: ObservationInput,
    ) -> LedgerResult<ObservationId> {
        gate::check_admission(caller, &self.lifecycle, &input)?;
        self.species_index
            .ensure_vacant(&input.species, input.timestamp)?;

        let staged = self.stage_admission(caller, input)?;
        Ok(self.commit_admission(staged))
    }

    fn stage_admission(
        &self,
        caller: &Identity,
        input: ObservationInput,
    ) -> LedgerResult<StagedAdmission> {
        let location_hash = location_hash(input.latitude, input.longitude);
        self.location_buckets.ensure_room(&location_hash)?;

        let region_hash = region_hash(&input.location_description);
        let aggregates = self.aggregates.stage(
            &input.species,
            &region_hash,
            input.timestamp,
            input.confidence_score,
        );
        let id = self.lifecycle.next_observation_id();

        Ok(StagedAdmission {
            observation: Observation::from_input(id, input, caller.clone()),
            location_hash,
            region_hash,
            aggregates,
        })
    }

    fn commit_admission(&mut self, staged: StagedAdmission) -> ObservationId {
        let StagedAdmission {
            observation,
            location_hash,
            region_hash,
            aggregates,
        } = staged;

        let id = self.lifecycle.record_admission();
        debug_assert_eq!(id, observation.id);

        self.species_index
            .insert(&observation.species, observation.timestamp, id);
        self.location_buckets.append(location_hash, id);
        self.aggregates
            .commit(&observation.species, region_hash, aggregates);

        log::debug!(
            "Admitted observation #{} ({} @ {}, confidence {})",
            id,
            observation.species,
            observation.timestamp,
            observation.confidence_score
        );

        self.store.insert(observation.clone());
        self.emit(LedgerEvent::ObservationAdmitted {
            observation,
            location_hash,
            region_hash,
        });

        id
    }

    /// Attach (or replace) the correction for an observation
    pub fn add_correction(
        &mut self,
        caller: &Identity,
        observation_id: ObservationId,
        note: String,
    ) -> LedgerResult<()> {
        let observation = self
            .store
            .get(observation_id)
            .ok_or(LedgerError::NotFound)?;
        authorize_corrector(observation, caller, self.lifecycle.admin())?;

        let correction = Correction {
            note,
            corrector: caller.clone(),
            corrected_at: self.now(),
        };
        if self
            .corrections
            .set(observation_id, correction.clone())
            .is_some()
        {
            log::debug!("Replaced correction for observation #{}", observation_id);
        } else {
            log::debug!("Recorded correction for observation #{}", observation_id);
        }

        self.emit(LedgerEvent::CorrectionRecorded {
            observation_id,
            correction,
        });
        Ok(())
    }

    pub fn pause(&mut self, caller: &Identity) -> LedgerResult<()> {
        self.lifecycle.pause(caller)?;
        log::info!("Ledger paused by {}", caller);
        self.emit(LedgerEvent::LedgerPaused { by: caller.clone() });
        Ok(())
    }

    pub fn unpause(&mut self, caller: &Identity) -> LedgerResult<()> {
        self.lifecycle.unpause(caller)?;
        log::info!("Ledger unpaused by {}", caller);
        self.emit(LedgerEvent::LedgerUnpaused { by: caller.clone() });
        Ok(())
    }

    pub fn transfer_admin(&mut self, caller: &Identity, new_admin: Identity) -> LedgerResult<()> {
        let previous = self.lifecycle.transfer_admin(caller, new_admin.clone())?;
        log::info!("Admin transferred: {} -> {}", previous, new_admin);
        self.emit(LedgerEvent::AdminTransferred {
            previous,
            new_admin,
        });
        Ok(())
    }

    pub fn set_authorized_validator(
        &mut self,
        caller: &Identity,
        new_validator: Identity,
    ) -> LedgerResult<()> {
        let previous = self
            .lifecycle
            .set_authorized_validator(caller, new_validator.clone())?;
        log::info!("Authorized validator changed: {} -> {}", previous, new_validator);
        self.emit(LedgerEvent::ValidatorChanged {
            previous,
            new_validator,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries (read-only, no authorization)
    // ------------------------------------------------------------------

    pub fn get_observation(&self, id: ObservationId) -> Option<&Observation> {
        self.store.get(id)
    }

    pub fn get_species_aggregate(&self, species: &str) -> Option<&SpeciesAggregate> {
        self.aggregates.species(species)
    }

    pub fn get_region_aggregate(&self, region: &RegionHash) -> Option<&RegionAggregate> {
        self.aggregates.region(region)
    }

    pub fn get_correction(&self, id: ObservationId) -> Option<&Correction> {
        self.corrections.get(id)
    }

    pub fn get_total_observations(&self) -> u64 {
        self.lifecycle.total_observations()
    }

    pub fn is_paused(&self) -> bool {
        self.lifecycle.is_paused()
    }

    pub fn get_admin(&self) -> &Identity {
        self.lifecycle.admin()
    }

    pub fn get_authorized_validator(&self) -> &Identity {
        self.lifecycle.authorized_validator()
    }

    /// Observations with ids in `[start, start + limit)`, in id order
    ///
    /// Fails with `InvalidQueryParams` when `limit` is zero or above
    /// `MAX_PAGE_LIMIT`, or when `start` is past the highest assigned id.
    pub fn get_paginated_observations(
        &self,
        start: ObservationId,
        limit: u32,
    ) -> LedgerResult<Vec<&Observation>> {
        if limit == 0 || limit > MAX_PAGE_LIMIT || start > self.lifecycle.max_observation_id() {
            return Err(LedgerError::InvalidQueryParams);
        }

        let end = start.saturating_add(u64::from(limit));
        Ok(self.store.range(start, end).collect())
    }

    /// Look up an observation through the species+timestamp index
    pub fn find_observation(&self, species: &str, timestamp: u64) -> Option<&Observation> {
        self.species_index
            .get(species, timestamp)
            .and_then(|id| self.store.get(id))
    }

    /// Ids admitted at exactly these coordinates, in admission order
    pub fn get_location_bucket(&self, latitude: i64, longitude: i64) -> &[ObservationId] {
        self.location_buckets
            .bucket(&location_hash(latitude, longitude))
    }

    // ------------------------------------------------------------------
    // Outbox
    // ------------------------------------------------------------------

    /// Take all undelivered events, oldest first
    pub fn drain_events(&mut self) -> Vec<EventEnvelope> {
        self.outbox.drain()
    }

    /// Return events a sink failed to deliver
    pub fn requeue_events(&mut self, events: Vec<EventEnvelope>) {
        self.outbox.requeue(events);
    }

    pub fn pending_events(&self) -> usize {
        self.outbox.len()
    }

    pub fn dropped_events(&self) -> u64 {
        self.outbox.dropped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::hashing::EvidenceHash;
    use crate::ledger::types::MAX_BUCKET_LEN;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    const NOW: u64 = 1_700_000_000;

    fn admin() -> Identity {
        Identity::from("admin")
    }

    fn validator() -> Identity {
        Identity::from("validator")
    }

    fn engine() -> LedgerEngine {
        LedgerEngine::new_with_timestamp_fn(admin(), validator(), Box::new(|| NOW))
    }

    fn eagle(timestamp: u64, confidence: u32) -> ObservationInput {
        ObservationInput {
            species: "Bald Eagle".to_string(),
            timestamp,
            latitude: 40_712_345,
            longitude: -74_012_345,
            location_description: "Central Park, NY".to_string(),
            evidence_hash: EvidenceHash::from_bytes([9; 32]),
            metadata: "note".to_string(),
            confidence_score: confidence,
            contributor: Identity::from("contributor"),
        }
    }

    #[test]
    fn test_first_admission_example() {
        let mut ledger = engine();
        let id = ledger
            .add_observation(&validator(), eagle(1_627_849_200, 95))
            .unwrap();
        assert_eq!(id, 1);

        let agg = ledger.get_species_aggregate("Bald Eagle").unwrap();
        assert_eq!(agg.total_observations, 1);
        assert_eq!(agg.last_observed, 1_627_849_200);
        assert_eq!(agg.avg_confidence, 95);
        assert_eq!(agg.population_trend, 1);

        let obs = ledger.get_observation(1).unwrap();
        assert_eq!(obs.validator, validator());
        assert_eq!(obs.contributor.as_str(), "contributor");
        assert_eq!(ledger.get_total_observations(), 1);
    }

    #[test]
    fn test_rejections_do_not_consume_ids() {
        let mut ledger = engine();
        assert_eq!(ledger.add_observation(&validator(), eagle(1, 50)), Ok(1));
        assert_eq!(
            ledger.add_observation(&admin(), eagle(2, 50)),
            Err(LedgerError::Unauthorized)
        );
        assert_eq!(
            ledger.add_observation(&validator(), eagle(1, 60)),
            Err(LedgerError::AlreadyExists)
        );
        assert_eq!(
            ledger.add_observation(&validator(), eagle(3, 101)),
            Err(LedgerError::InvalidObservation)
        );
        assert_eq!(ledger.add_observation(&validator(), eagle(4, 50)), Ok(2));
        assert_eq!(ledger.get_total_observations(), 2);
    }

    #[test]
    fn test_duplicate_leaves_state_untouched() {
        let mut ledger = engine();
        ledger.add_observation(&validator(), eagle(10, 80)).unwrap();
        let before = *ledger.get_species_aggregate("Bald Eagle").unwrap();
        ledger.drain_events();

        let mut dup = eagle(10, 20);
        dup.location_description = "Elsewhere".to_string();
        dup.latitude = 1;
        assert_eq!(
            ledger.add_observation(&validator(), dup),
            Err(LedgerError::AlreadyExists)
        );

        assert_eq!(ledger.get_species_aggregate("Bald Eagle"), Some(&before));
        assert!(ledger.get_region_aggregate(&region_hash("Elsewhere")).is_none());
        assert!(ledger.get_location_bucket(1, -74_012_345).is_empty());
        assert_eq!(ledger.pending_events(), 0);
    }

    #[test]
    fn test_pause_blocks_admissions_until_unpaused() {
        let mut ledger = engine();
        ledger.pause(&admin()).unwrap();
        assert_eq!(
            ledger.add_observation(&validator(), eagle(1, 50)),
            Err(LedgerError::Paused)
        );
        ledger.unpause(&admin()).unwrap();
        assert_eq!(ledger.add_observation(&validator(), eagle(1, 50)), Ok(1));
    }

    #[test]
    fn test_running_average_sequence() {
        let mut ledger = engine();
        let mut averages = Vec::new();
        for (ts, confidence) in [(100, 80), (200, 90), (300, 100)] {
            ledger.add_observation(&validator(), eagle(ts, confidence)).unwrap();
            averages.push(ledger.get_species_aggregate("Bald Eagle").unwrap().avg_confidence);
        }
        assert_eq!(averages, vec![80, 85, 90]);
    }

    #[test]
    fn test_region_aggregate_counts_each_admission_once() {
        let mut ledger = engine();
        for ts in 1..=4 {
            ledger.add_observation(&validator(), eagle(ts, 50)).unwrap();
        }
        let region = ledger
            .get_region_aggregate(&region_hash("Central Park, NY"))
            .unwrap();
        assert_eq!(region.total_observations, 4);
        assert_eq!(region.biodiversity_index, 4);
        assert_eq!(region.species_count, 0);
    }

    #[test]
    fn test_bucket_overflow_rejects_without_partial_writes() {
        let mut ledger = engine().with_bucket_capacity(2);
        ledger.add_observation(&validator(), eagle(1, 50)).unwrap();
        ledger.add_observation(&validator(), eagle(2, 50)).unwrap();
        let species_before = *ledger.get_species_aggregate("Bald Eagle").unwrap();
        let region_before = *ledger
            .get_region_aggregate(&region_hash("Central Park, NY"))
            .unwrap();

        assert_eq!(
            ledger.add_observation(&validator(), eagle(3, 50)),
            Err(LedgerError::CapacityExceeded)
        );
        assert_eq!(ledger.get_species_aggregate("Bald Eagle"), Some(&species_before));
        assert_eq!(
            ledger.get_region_aggregate(&region_hash("Central Park, NY")),
            Some(&region_before)
        );
        assert!(ledger.find_observation("Bald Eagle", 3).is_none());
        assert_eq!(ledger.get_total_observations(), 2);

        // Same species, new coordinates: next id is still 3
        let mut moved = eagle(3, 50);
        moved.latitude += 1;
        assert_eq!(ledger.add_observation(&validator(), moved), Ok(3));
    }

    #[test]
    fn test_default_bucket_holds_exactly_max_len() {
        let mut ledger = engine();
        for ts in 0..MAX_BUCKET_LEN as u64 {
            ledger.add_observation(&validator(), eagle(ts, 50)).unwrap();
        }
        assert_eq!(
            ledger.add_observation(&validator(), eagle(MAX_BUCKET_LEN as u64, 50)),
            Err(LedgerError::CapacityExceeded)
        );
        assert_eq!(
            ledger.get_location_bucket(40_712_345, -74_012_345).len(),
            MAX_BUCKET_LEN
        );
    }

    #[test]
    fn test_corrections() {
        let clock = Arc::new(AtomicU64::new(NOW));
        let ticker = clock.clone();
        let mut ledger = LedgerEngine::new_with_timestamp_fn(
            admin(),
            validator(),
            Box::new(move || ticker.load(Ordering::SeqCst)),
        );
        ledger.add_observation(&validator(), eagle(1, 50)).unwrap();

        assert_eq!(
            ledger.add_correction(&validator(), 99, "missing".to_string()),
            Err(LedgerError::NotFound)
        );
        assert_eq!(
            ledger.add_correction(&Identity::from("contributor"), 1, "mine".to_string()),
            Err(LedgerError::Unauthorized)
        );

        ledger.add_correction(&validator(), 1, "first".to_string()).unwrap();
        clock.store(NOW + 60, Ordering::SeqCst);
        ledger.add_correction(&admin(), 1, "second".to_string()).unwrap();

        let correction = ledger.get_correction(1).unwrap();
        assert_eq!(correction.note, "second");
        assert_eq!(correction.corrector, admin());
        assert_eq!(correction.corrected_at, NOW + 60);

        // The observation and aggregates are untouched
        assert_eq!(ledger.get_observation(1).unwrap().metadata, "note");
        assert_eq!(ledger.get_species_aggregate("Bald Eagle").unwrap().total_observations, 1);
    }

    #[test]
    fn test_correction_allowed_while_paused() {
        let mut ledger = engine();
        ledger.add_observation(&validator(), eagle(1, 50)).unwrap();
        ledger.pause(&admin()).unwrap();
        assert_eq!(ledger.add_correction(&validator(), 1, "late note".to_string()), Ok(()));
    }

    #[test]
    fn test_original_validator_can_correct_after_rotation() {
        let mut ledger = engine();
        ledger.add_observation(&validator(), eagle(1, 50)).unwrap();
        ledger
            .set_authorized_validator(&admin(), Identity::from("validator-2"))
            .unwrap();

        assert_eq!(ledger.add_correction(&validator(), 1, "still mine".to_string()), Ok(()));
        assert_eq!(
            ledger.add_correction(&Identity::from("validator-2"), 1, "not mine".to_string()),
            Err(LedgerError::Unauthorized)
        );
        assert_eq!(
            ledger.add_observation(&validator(), eagle(2, 50)),
            Err(LedgerError::Unauthorized)
        );
        assert_eq!(
            ledger.add_observation(&Identity::from("validator-2"), eagle(2, 50)),
            Ok(2)
        );
    }

    #[test]
    fn test_transfer_admin() {
        let mut ledger = engine();
        ledger.transfer_admin(&admin(), Identity::from("steward")).unwrap();
        assert_eq!(ledger.get_admin().as_str(), "steward");
        assert_eq!(ledger.pause(&admin()), Err(LedgerError::Unauthorized));
        ledger.pause(&Identity::from("steward")).unwrap();
        assert!(ledger.is_paused());
    }

    #[test]
    fn test_pagination() {
        let mut ledger = engine();
        assert_eq!(ledger.get_paginated_observations(0, 10).unwrap().len(), 0);
        assert_eq!(
            ledger.get_paginated_observations(1, 10),
            Err(LedgerError::InvalidQueryParams)
        );

        for ts in 1..=5 {
            ledger.add_observation(&validator(), eagle(ts, 50)).unwrap();
        }

        let page: Vec<_> = ledger
            .get_paginated_observations(2, 2)
            .unwrap()
            .iter()
            .map(|obs| obs.id)
            .collect();
        assert_eq!(page, vec![2, 3]);

        let tail: Vec<_> = ledger
            .get_paginated_observations(4, 50)
            .unwrap()
            .iter()
            .map(|obs| obs.id)
            .collect();
        assert_eq!(tail, vec![4, 5]);

        assert_eq!(ledger.get_paginated_observations(5, 1).unwrap().len(), 1);
        assert_eq!(
            ledger.get_paginated_observations(6, 1),
            Err(LedgerError::InvalidQueryParams)
        );
        assert_eq!(
            ledger.get_paginated_observations(1, 0),
            Err(LedgerError::InvalidQueryParams)
        );
        assert_eq!(
            ledger.get_paginated_observations(1, MAX_PAGE_LIMIT + 1),
            Err(LedgerError::InvalidQueryParams)
        );
    }

    #[test]
    fn test_find_observation_through_index() {
        let mut ledger = engine();
        ledger.add_observation(&validator(), eagle(42, 70)).unwrap();
        assert_eq!(ledger.find_observation("Bald Eagle", 42).unwrap().id, 1);
        assert!(ledger.find_observation("Bald Eagle", 43).is_none());
    }

    #[test]
    fn test_events_follow_commits() {
        let mut ledger = engine();
        ledger.add_observation(&validator(), eagle(1, 50)).unwrap();
        let _ = ledger.add_observation(&validator(), eagle(1, 50));
        ledger.add_correction(&admin(), 1, "fixed".to_string()).unwrap();
        let _ = ledger.pause(&validator());
        ledger.pause(&admin()).unwrap();

        let events = ledger.drain_events();
        let kinds: Vec<_> = events.iter().map(|e| e.event.kind()).collect();
        assert_eq!(
            kinds,
            vec!["observation_admitted", "correction_recorded", "ledger_paused"]
        );
        assert!(events.iter().all(|e| e.recorded_at == NOW));

        match &events[0].event {
            LedgerEvent::ObservationAdmitted {
                observation,
                location_hash: loc,
                region_hash: region,
            } => {
                assert_eq!(observation.id, 1);
                assert_eq!(*loc, location_hash(40_712_345, -74_012_345));
                assert_eq!(*region, region_hash("Central Park, NY"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_outbox_capacity_override_keeps_pending() {
        let mut ledger = engine();
        ledger.pause(&admin()).unwrap();
        let mut ledger = ledger.with_outbox_capacity(1);
        assert_eq!(ledger.pending_events(), 1);
        ledger.unpause(&admin()).unwrap();
        assert_eq!(ledger.pending_events(), 1);
        assert_eq!(ledger.dropped_events(), 1);

        let events: Vec<_> = ledger
            .drain_events()
            .into_iter()
            .map(|e| (e.sequence, e.event.kind()))
            .collect();
        assert_eq!(events, vec![(2, "ledger_unpaused")]);
    }

    #[test]
    fn test_outbox_capacity_override_never_reuses_sequences() {
        let mut ledger = engine();
        ledger.pause(&admin()).unwrap();
        let mut ledger = ledger.with_outbox_capacity(10);
        ledger.unpause(&admin()).unwrap();

        let sequences: Vec<_> = ledger.drain_events().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);
        assert_eq!(ledger.dropped_events(), 0);
    }
}
