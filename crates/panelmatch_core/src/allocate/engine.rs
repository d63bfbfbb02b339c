//! One sequential assignment pass over a patient roster.
//!
//! # Responsibility
//! - Route each patient through the locator, then the allocator.
//! - Record exactly one outcome per patient.
//!
//! # Invariants
//! - Patients are processed in input order.
//! - `assigned_count() + unassigned_count() == processed_count()`.
//! - A patient id appears at most once across assignments and unassigned.

use crate::allocate::allocator::{Allocation, RoundRobinAllocator};
use crate::geo::locator::{Locator, MatchMode};
use crate::model::assignment::{UnassignedPatient, UnassignedReason};
use crate::model::roster::{Organization, Patient, PatientId, ProviderId};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;
use uuid::Uuid;

/// Emit a progress event after this many patients.
pub const PROGRESS_LOG_INTERVAL: usize = 500;

/// Tally of which eligibility check decided each patient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchCounts {
    pub distance: usize,
    pub postal_code: usize,
    pub ineligible: usize,
}

/// In-memory result of one engine pass.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentRun {
    run_id: Uuid,
    capacity: u32,
    provider_pool_size: usize,
    assignments: BTreeMap<PatientId, ProviderId>,
    unassigned: Vec<UnassignedPatient>,
    duplicate_patients: usize,
    match_counts: MatchCounts,
    max_probes: usize,
    provider_loads: Vec<(ProviderId, u32)>,
}

impl AssignmentRun {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn provider_pool_size(&self) -> usize {
        self.provider_pool_size
    }

    /// Patient to provider mapping, ordered by patient id.
    pub fn assignments(&self) -> &BTreeMap<PatientId, ProviderId> {
        &self.assignments
    }

    /// Unassigned patients in processing order.
    pub fn unassigned(&self) -> &[UnassignedPatient] {
        &self.unassigned
    }

    pub fn assigned_count(&self) -> usize {
        self.assignments.len()
    }

    pub fn unassigned_count(&self) -> usize {
        self.unassigned.len()
    }

    /// Distinct patients that received an outcome.
    pub fn processed_count(&self) -> usize {
        self.assigned_count() + self.unassigned_count()
    }

    /// Input rows skipped because their id was already processed.
    pub fn duplicate_patients(&self) -> usize {
        self.duplicate_patients
    }

    pub fn match_counts(&self) -> MatchCounts {
        self.match_counts
    }

    /// Largest probe count any single allocation attempt used.
    pub fn max_probes(&self) -> usize {
        self.max_probes
    }

    /// Allocator counters at the end of the pass, in cycle order.
    pub fn provider_loads(&self) -> &[(ProviderId, u32)] {
        &self.provider_loads
    }

    pub fn unassigned_with(&self, reason: UnassignedReason) -> usize {
        self.unassigned
            .iter()
            .filter(|patient| patient.reason == reason)
            .count()
    }
}

/// Locator plus allocator; the allocator state survives across `run` calls.
pub struct AssignmentEngine {
    locator: Locator,
    allocator: RoundRobinAllocator,
}

impl AssignmentEngine {
    pub fn new(organizations: &[Organization], allocator: RoundRobinAllocator) -> Self {
        Self {
            locator: Locator::new(organizations),
            allocator,
        }
    }

    pub fn allocator(&self) -> &RoundRobinAllocator {
        &self.allocator
    }

    pub fn allocator_mut(&mut self) -> &mut RoundRobinAllocator {
        &mut self.allocator
    }

    /// Assigns every patient in order.
    ///
    /// Counters are not reset here. Running the same patients twice on one
    /// engine assigns them twice; callers reset or rebuild the allocator.
    pub fn run(&mut self, patients: &[Patient]) -> AssignmentRun {
        let started_at = Instant::now();
        let run_id = Uuid::new_v4();
        let total = patients.len();
        info!(
            "event=assign_run module=allocate status=start run_id={run_id} patients={total} providers={} capacity={} sites={} postal_codes={}",
            self.allocator.pool_len(),
            self.allocator.capacity(),
            self.locator.site_count(),
            self.locator.postal_code_count()
        );

        let mut assignments = BTreeMap::new();
        let mut unassigned = Vec::new();
        let mut seen = HashSet::with_capacity(total);
        let mut duplicate_patients = 0;
        let mut match_counts = MatchCounts::default();
        let mut max_probes = 0;

        for (index, patient) in patients.iter().enumerate() {
            if (index + 1) % PROGRESS_LOG_INTERVAL == 0 {
                info!(
                    "event=assign_progress module=allocate status=ok run_id={run_id} processed={} total={total}",
                    index + 1
                );
            }

            if !seen.insert(patient.id) {
                duplicate_patients += 1;
                warn!(
                    "event=assign_patient module=allocate status=skipped run_id={run_id} reason=duplicate_patient_id"
                );
                continue;
            }

            match self.locator.locate(patient) {
                Some(MatchMode::Distance { .. }) => match_counts.distance += 1,
                Some(MatchMode::PostalCode) => match_counts.postal_code += 1,
                None => {
                    match_counts.ineligible += 1;
                    debug!(
                        "event=assign_patient module=allocate status=unassigned run_id={run_id} patient_id={} reason={}",
                        patient.id,
                        UnassignedReason::Ineligible
                    );
                    unassigned.push(UnassignedPatient {
                        id: patient.id,
                        reason: UnassignedReason::Ineligible,
                    });
                    continue;
                }
            }

            let allocation = self.allocator.allocate();
            max_probes = max_probes.max(allocation.probes());
            match allocation {
                Allocation::Assigned { provider, .. } => {
                    assignments.insert(patient.id, provider);
                }
                Allocation::Exhausted { probes } => {
                    debug!(
                        "event=assign_patient module=allocate status=unassigned run_id={run_id} patient_id={} reason={} probes={probes}",
                        patient.id,
                        UnassignedReason::CapacityExhausted
                    );
                    unassigned.push(UnassignedPatient {
                        id: patient.id,
                        reason: UnassignedReason::CapacityExhausted,
                    });
                }
            }
        }

        let run = AssignmentRun {
            run_id,
            capacity: self.allocator.capacity().get(),
            provider_pool_size: self.allocator.pool_len(),
            assignments,
            unassigned,
            duplicate_patients,
            match_counts,
            max_probes,
            provider_loads: self.allocator.loads(),
        };

        info!(
            "event=assign_run module=allocate status=ok run_id={run_id} duration_ms={} assigned={} unassigned={} ineligible={} exhausted={} duplicates={duplicate_patients}",
            started_at.elapsed().as_millis(),
            run.assigned_count(),
            run.unassigned_count(),
            run.unassigned_with(UnassignedReason::Ineligible),
            run.unassigned_with(UnassignedReason::CapacityExhausted)
        );
        run
    }
}

#[cfg(test)]
mod tests {
    use super::AssignmentEngine;
    use crate::allocate::allocator::RoundRobinAllocator;
    use crate::model::assignment::UnassignedReason;
    use crate::model::location::{GeoPoint, PostalCode};
    use crate::model::roster::{Organization, Patient};
    use std::num::NonZeroU32;

    fn engine(pool: &[i64], capacity: u32) -> AssignmentEngine {
        let site = GeoPoint::new(40.0, -75.0).unwrap();
        let orgs = vec![Organization::new(1).with_location(site)];
        let capacity = NonZeroU32::new(capacity).unwrap();
        let allocator = RoundRobinAllocator::new(pool.iter().copied(), capacity);
        AssignmentEngine::new(&orgs, allocator)
    }

    fn located(id: i64) -> Patient {
        Patient::new(id).with_location(GeoPoint::new(40.1, -75.1).unwrap())
    }

    #[test]
    fn ineligible_patients_skip_the_allocator() {
        let mut engine = engine(&[100], 1);
        let patients = vec![
            Patient::new(1).with_postal_code(PostalCode::parse("99999").unwrap()),
            located(2),
        ];

        let run = engine.run(&patients);

        assert_eq!(run.assignments().get(&2), Some(&100));
        assert_eq!(run.unassigned_with(UnassignedReason::Ineligible), 1);
        assert_eq!(run.match_counts().ineligible, 1);
        assert_eq!(run.match_counts().distance, 1);
        assert_eq!(engine.allocator().load_of(100), Some(1));
    }

    #[test]
    fn duplicate_patient_rows_get_one_outcome() {
        let mut engine = engine(&[100, 200], 5);
        let run = engine.run(&[located(1), located(1), located(2)]);

        assert_eq!(run.duplicate_patients(), 1);
        assert_eq!(run.processed_count(), 2);
        assert_eq!(run.assignments().get(&1), Some(&100));
        assert_eq!(run.assignments().get(&2), Some(&200));
    }

    #[test]
    fn max_probes_never_exceeds_pool_size() {
        let mut engine = engine(&[1, 2, 3, 4], 2);
        let patients: Vec<_> = (0..20).map(located).collect();

        let run = engine.run(&patients);

        assert_eq!(run.assigned_count(), 8);
        assert_eq!(run.unassigned_with(UnassignedReason::CapacityExhausted), 12);
        assert_eq!(run.max_probes(), 4);
    }
}
