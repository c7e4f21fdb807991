//! Observation store: id -> observation, write-once

use super::types::{Observation, ObservationId};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct ObservationStore {
    records: BTreeMap<ObservationId, Observation>,
}

impl ObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ObservationId) -> Option<&Observation> {
        self.records.get(&id)
    }

    /// Ids are handed out sequentially, so an occupied slot is a logic error
    pub(crate) fn insert(&mut self, observation: Observation) {
        let id = observation.id;
        let previous = self.records.insert(id, observation);
        debug_assert!(previous.is_none(), "observation {} written twice", id);
    }

    /// Stored observations with `start <= id < end`, in id order
    pub fn range(&self, start: ObservationId, end: ObservationId) -> impl Iterator<Item = &Observation> {
        self.records.range(start..end).map(|(_, obs)| obs)
    }
}
