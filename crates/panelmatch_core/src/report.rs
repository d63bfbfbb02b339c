//! End-of-run summary for operators.
//!
//! # Responsibility
//! - Condense an `AssignmentRun` and its persistence outcome into totals.
//! - Render as plain text (`Display`) or JSON.
//!
//! # Invariants
//! - Provider lines only list providers with at least one patient, sorted by id.
//! - Persisted counts come from the write result, never from the in-memory run.

use crate::allocate::engine::{AssignmentRun, MatchCounts};
use crate::model::assignment::UnassignedReason;
use crate::model::roster::{PatientId, ProviderId};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Why the write phase did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    DryRun,
    NothingToWrite,
}

/// Result of the bulk write phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistOutcome {
    Persisted { attempted: usize, succeeded: usize },
    Skipped { reason: SkipReason },
}

impl PersistOutcome {
    /// Rows durably written.
    pub fn succeeded(&self) -> usize {
        match self {
            Self::Persisted { succeeded, .. } => *succeeded,
            Self::Skipped { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderLoad {
    pub provider_id: ProviderId,
    pub patients: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub capacity: u32,
    pub processed: usize,
    pub assigned: usize,
    pub unassigned: usize,
    pub ineligible: usize,
    pub capacity_exhausted: usize,
    pub duplicate_patients: usize,
    pub match_counts: MatchCounts,
    pub provider_pool_size: usize,
    pub providers_with_patients: Vec<ProviderLoad>,
    pub providers_at_capacity: usize,
    pub unassigned_sample: Vec<PatientId>,
    pub unassigned_sample_truncated: bool,
    pub persistence: PersistOutcome,
}

impl RunReport {
    pub fn new(run: &AssignmentRun, persistence: PersistOutcome, sample_limit: usize) -> Self {
        let mut providers_with_patients: Vec<ProviderLoad> = run
            .provider_loads()
            .iter()
            .filter(|(_, load)| *load > 0)
            .map(|(provider_id, patients)| ProviderLoad {
                provider_id: *provider_id,
                patients: *patients,
            })
            .collect();
        providers_with_patients.sort_by_key(|load| load.provider_id);

        let providers_at_capacity = providers_with_patients
            .iter()
            .filter(|load| load.patients >= run.capacity())
            .count();

        let unassigned_sample = run
            .unassigned()
            .iter()
            .take(sample_limit)
            .map(|patient| patient.id)
            .collect();

        Self {
            run_id: run.run_id(),
            capacity: run.capacity(),
            processed: run.processed_count(),
            assigned: run.assigned_count(),
            unassigned: run.unassigned_count(),
            ineligible: run.unassigned_with(UnassignedReason::Ineligible),
            capacity_exhausted: run.unassigned_with(UnassignedReason::CapacityExhausted),
            duplicate_patients: run.duplicate_patients(),
            match_counts: run.match_counts(),
            provider_pool_size: run.provider_pool_size(),
            providers_with_patients,
            providers_at_capacity,
            unassigned_sample,
            unassigned_sample_truncated: run.unassigned_count() > sample_limit,
            persistence,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Display for RunReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "run {}", self.run_id)?;
        writeln!(f)?;
        match self.persistence {
            PersistOutcome::Persisted {
                attempted,
                succeeded,
            } => writeln!(
                f,
                "database update: attempted={attempted} success={succeeded} errors={}",
                attempted.saturating_sub(succeeded)
            )?,
            PersistOutcome::Skipped {
                reason: SkipReason::DryRun,
            } => writeln!(f, "database update: skipped (dry run)")?,
            PersistOutcome::Skipped {
                reason: SkipReason::NothingToWrite,
            } => writeln!(f, "database update: skipped (no assignments made)")?,
        }

        writeln!(f)?;
        writeln!(f, "provider load")?;
        for load in &self.providers_with_patients {
            writeln!(f, "  provider {}: {} patients", load.provider_id, load.patients)?;
        }

        writeln!(f)?;
        writeln!(f, "summary")?;
        writeln!(f, "  patients processed: {}", self.processed)?;
        writeln!(f, "  patients assigned: {}", self.assigned)?;
        writeln!(
            f,
            "  patients unassigned: {} (ineligible={} capacity_exhausted={})",
            self.unassigned, self.ineligible, self.capacity_exhausted
        )?;
        writeln!(
            f,
            "  matched by distance={} postal_code={}",
            self.match_counts.distance, self.match_counts.postal_code
        )?;
        if self.duplicate_patients > 0 {
            writeln!(f, "  duplicate patient rows skipped: {}", self.duplicate_patients)?;
        }
        writeln!(
            f,
            "  providers with patients: {} / {}",
            self.providers_with_patients.len(),
            self.provider_pool_size
        )?;
        writeln!(
            f,
            "  providers at capacity ({}): {}",
            self.capacity, self.providers_at_capacity
        )?;

        if !self.unassigned_sample.is_empty() {
            writeln!(f)?;
            let ids = self
                .unassigned_sample
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let more = if self.unassigned_sample_truncated {
                ", ..."
            } else {
                ""
            };
            writeln!(f, "unassigned patient ids ({}): [{ids}{more}]", self.unassigned)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{PersistOutcome, RunReport, SkipReason};
    use crate::allocate::allocator::RoundRobinAllocator;
    use crate::allocate::engine::{AssignmentEngine, AssignmentRun};
    use crate::model::location::GeoPoint;
    use crate::model::roster::{Organization, Patient};
    use std::num::NonZeroU32;

    fn sample_run() -> AssignmentRun {
        let site = GeoPoint::new(30.0, -90.0).unwrap();
        let orgs = vec![Organization::new(1).with_location(site)];
        let allocator = RoundRobinAllocator::new([30, 10, 20], NonZeroU32::new(2).unwrap());
        let mut engine = AssignmentEngine::new(&orgs, allocator);
        let mut patients: Vec<_> = (1..=5)
            .map(|id| Patient::new(id).with_location(site))
            .collect();
        patients.push(Patient::new(6));
        patients.push(Patient::new(7));
        engine.run(&patients)
    }

    #[test]
    fn lists_loaded_providers_sorted_by_id() {
        let run = sample_run();
        let skipped = PersistOutcome::Skipped {
            reason: SkipReason::DryRun,
        };
        let report = RunReport::new(&run, skipped, 50);

        let ids: Vec<_> = report
            .providers_with_patients
            .iter()
            .map(|load| (load.provider_id, load.patients))
            .collect();
        assert_eq!(ids, vec![(10, 2), (20, 1), (30, 2)]);
        assert_eq!(report.providers_at_capacity, 2);
        assert_eq!(report.ineligible, 2);
        assert_eq!(report.persistence.succeeded(), 0);
    }

    #[test]
    fn unassigned_sample_is_capped() {
        let run = sample_run();
        let report = RunReport::new(
            &run,
            PersistOutcome::Persisted {
                attempted: 5,
                succeeded: 5,
            },
            1,
        );

        assert_eq!(report.unassigned_sample, vec![6]);
        assert!(report.unassigned_sample_truncated);
        let text = report.to_string();
        assert!(text.contains("attempted=5 success=5 errors=0"));
        assert!(text.contains("[6, ...]"));
    }

    #[test]
    fn over_reported_write_count_renders_zero_errors() {
        let run = sample_run();
        let report = RunReport::new(
            &run,
            PersistOutcome::Persisted {
                attempted: 5,
                succeeded: 7,
            },
            50,
        );

        assert!(report
            .to_string()
            .contains("attempted=5 success=7 errors=0"));
    }

    #[test]
    fn json_carries_persistence_status() {
        let run = sample_run();
        let report = RunReport::new(
            &run,
            PersistOutcome::Skipped {
                reason: SkipReason::NothingToWrite,
            },
            50,
        );
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["persistence"]["status"], "skipped");
        assert_eq!(json["persistence"]["reason"], "nothing_to_write");
        assert_eq!(json["assigned"], 5);
    }
}
