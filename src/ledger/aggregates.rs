//! Incremental aggregation engine
//!
//! Each admission touches exactly one species aggregate and one region
//! aggregate. Next values are computed first (`stage`) and written together
//! with the rest of the admission (`commit`).
//!
//! The species average is a running mean floored at every step, so it drifts
//! from the exact mean when scores vary. Downstream consumers depend on the
//! exact sequence of values, e.g. 80, 90, 100 -> 80, 85, 90.

use super::hashing::RegionHash;
use super::types::{RegionAggregate, SpeciesAggregate};
use std::collections::HashMap;

impl SpeciesAggregate {
    /// Aggregate after admitting one more observation
    pub fn next(&self, timestamp: u64, confidence: u32) -> SpeciesAggregate {
        let new_total = self.total_observations + 1;
        let weighted = u128::from(self.avg_confidence) * u128::from(new_total - 1)
            + u128::from(confidence);
        let avg_confidence = (weighted / u128::from(new_total)) as u64;
        let population_trend = if timestamp > self.last_observed { 1 } else { -1 };

        SpeciesAggregate {
            total_observations: new_total,
            last_observed: timestamp,
            avg_confidence,
            population_trend,
        }
    }
}

impl RegionAggregate {
    /// Aggregate after admitting one more observation in this region
    pub fn next(&self) -> RegionAggregate {
        RegionAggregate {
            species_count: self.species_count,
            total_observations: self.total_observations + 1,
            biodiversity_index: self.biodiversity_index + 1,
        }
    }
}

/// Aggregate values computed for an admission that has not been committed yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedAggregates {
    pub species: SpeciesAggregate,
    pub region: RegionAggregate,
}

#[derive(Debug, Clone, Default)]
pub struct AggregateBook {
    species: HashMap<String, SpeciesAggregate>,
    regions: HashMap<RegionHash, RegionAggregate>,
}

impl AggregateBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn species(&self, species: &str) -> Option<&SpeciesAggregate> {
        self.species.get(species)
    }

    pub fn region(&self, region: &RegionHash) -> Option<&RegionAggregate> {
        self.regions.get(region)
    }

    pub fn stage(
        &self,
        species: &str,
        region: &RegionHash,
        timestamp: u64,
        confidence: u32,
    ) -> StagedAggregates {
        let current_species = self.species.get(species).copied().unwrap_or_default();
        let current_region = self.regions.get(region).copied().unwrap_or_default();

        StagedAggregates {
            species: current_species.next(timestamp, confidence),
            region: current_region.next(),
        }
    }

    pub(crate) fn commit(&mut self, species: &str, region: RegionHash, staged: StagedAggregates) {
        self.species.insert(species.to_string(), staged.species);
        self.regions.insert(region, staged.region);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::hashing::region_hash;

    fn admit(book: &mut AggregateBook, species: &str, region: &str, ts: u64, confidence: u32) {
        let region = region_hash(region);
        let staged = book.stage(species, &region, ts, confidence);
        book.commit(species, region, staged);
    }

    #[test]
    fn test_first_admission() {
        let next = SpeciesAggregate::default().next(1_627_849_200, 95);
        assert_eq!(
            next,
            SpeciesAggregate {
                total_observations: 1,
                last_observed: 1_627_849_200,
                avg_confidence: 95,
                population_trend: 1,
            }
        );
    }

    #[test]
    fn test_running_mean_floors_each_step() {
        let mut book = AggregateBook::new();
        let mut averages = Vec::new();
        for (i, confidence) in [80, 90, 100].into_iter().enumerate() {
            admit(&mut book, "Heron", "Marsh", 10 + i as u64, confidence);
            averages.push(book.species("Heron").unwrap().avg_confidence);
        }
        assert_eq!(averages, vec![80, 85, 90]);
    }

    #[test]
    fn test_running_mean_drifts_from_exact_mean() {
        // 99, 100, 100 -> 99, floor(199/2)=99, floor(298/3)=99; exact mean is 99.67
        let mut agg = SpeciesAggregate::default();
        for confidence in [99, 100, 100] {
            agg = agg.next(agg.last_observed + 1, confidence);
        }
        assert_eq!(agg.avg_confidence, 99);
        assert_eq!(agg.total_observations, 3);
    }

    #[test]
    fn test_trend_ties_resolve_negative() {
        let first = SpeciesAggregate::default().next(100, 50);
        assert_eq!(first.population_trend, 1);
        assert_eq!(first.next(100, 50).population_trend, -1);
        assert_eq!(first.next(99, 50).population_trend, -1);
        let later = first.next(99, 50);
        // last_observed follows the latest admission even when it moves backwards
        assert_eq!(later.last_observed, 99);
        assert_eq!(later.next(100, 50).population_trend, 1);
    }

    #[test]
    fn test_zero_timestamp_first_admission_trends_down() {
        assert_eq!(SpeciesAggregate::default().next(0, 10).population_trend, -1);
    }

    #[test]
    fn test_region_species_count_never_moves() {
        let mut book = AggregateBook::new();
        admit(&mut book, "Heron", "Marsh", 1, 50);
        admit(&mut book, "Egret", "Marsh", 2, 50);
        admit(&mut book, "Ibis", "Marsh", 3, 50);

        let region = book.region(&region_hash("Marsh")).unwrap();
        assert_eq!(region.species_count, 0);
        assert_eq!(region.total_observations, 3);
        assert_eq!(region.biodiversity_index, 3);
        assert_eq!(book.species("Ibis").map(|agg| agg.total_observations), Some(1));
    }

    #[test]
    fn test_stage_does_not_mutate() {
        let book = AggregateBook::new();
        let staged = book.stage("Heron", &region_hash("Marsh"), 1, 50);
        assert_eq!(staged.species.total_observations, 1);
        assert!(book.species("Heron").is_none());
        assert!(book.region(&region_hash("Marsh")).is_none());
    }
}
