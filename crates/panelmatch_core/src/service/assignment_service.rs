//! Panel assignment use-case service.
//!
//! # Responsibility
//! - Fetch roster datasets, check preconditions, run the engine, persist.
//! - Surface fatal failures distinctly from per-patient outcomes.
//!
//! # Invariants
//! - No assignment is attempted when any required dataset is empty.
//! - A failed write reports zero durable rows and drops the in-memory run.
//! - Service layer remains storage-agnostic.

use crate::allocate::allocator::RoundRobinAllocator;
use crate::allocate::engine::{AssignmentEngine, AssignmentRun};
use crate::config::{AssignmentConfig, ConfigError};
use crate::model::roster::{Patient, PatientId, ProviderId};
use crate::report::{PersistOutcome, RunReport, SkipReason};
use crate::repo::roster_repo::{RepoError, RosterRepository};
use log::{error, info, warn};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Roster dataset required before assignment can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Patients,
    Organizations,
    Providers,
}

impl Display for Dataset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Patients => f.write_str("active patients with addresses"),
            Self::Organizations => f.write_str("organizations with addresses"),
            Self::Providers => f.write_str("active providers"),
        }
    }
}

/// Fatal failures of an assignment run.
#[derive(Debug)]
pub enum ServiceError {
    Config(ConfigError),
    /// One or more datasets were empty; nothing was assigned.
    DataUnavailable { missing: Vec<Dataset> },
    /// Reading the roster failed.
    Repo(RepoError),
    /// The bulk write failed and was rolled back.
    PersistenceFailed {
        run_id: Uuid,
        attempted: usize,
        succeeded: usize,
        source: RepoError,
    },
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid configuration: {err}"),
            Self::DataUnavailable { missing } => {
                let names = missing
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "missing required data: {names}")
            }
            Self::Repo(err) => write!(f, "{err}"),
            Self::PersistenceFailed {
                run_id,
                attempted,
                succeeded,
                source,
            } => write!(
                f,
                "run {run_id}: assignment write rolled back (attempted={attempted} success={succeeded} errors={}): {source}",
                attempted.saturating_sub(*succeeded)
            ),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::PersistenceFailed { source, .. } => Some(source),
            Self::DataUnavailable { .. } => None,
        }
    }
}

impl From<ConfigError> for ServiceError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Orchestrates one assignment run against a roster repository.
pub struct AssignmentService<R: RosterRepository> {
    repo: R,
}

impl<R: RosterRepository> AssignmentService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn into_inner(self) -> R {
        self.repo
    }

    /// Computes assignments without writing anything.
    ///
    /// # Errors
    /// - `Config` for invalid tunables.
    /// - `DataUnavailable` listing every empty dataset.
    /// - `Repo` when a fetch fails.
    pub fn plan(&self, config: &AssignmentConfig) -> Result<AssignmentRun, ServiceError> {
        config.validate()?;

        let patients = self.repo.fetch_patients()?;
        let organizations = self.repo.fetch_organizations()?;
        let providers = self.repo.fetch_active_provider_ids()?;

        let missing: Vec<Dataset> = [
            (Dataset::Patients, patients.is_empty()),
            (Dataset::Organizations, organizations.is_empty()),
            (Dataset::Providers, providers.is_empty()),
        ]
        .into_iter()
        .filter_map(|(dataset, empty)| empty.then_some(dataset))
        .collect();
        if !missing.is_empty() {
            warn!(
                "event=assign_precondition module=service status=error missing_datasets={}",
                missing.len()
            );
            return Err(ServiceError::DataUnavailable { missing });
        }

        let allocator = self.build_allocator(providers, &patients, config)?;
        let mut engine = AssignmentEngine::new(&organizations, allocator);
        Ok(engine.run(&patients))
    }

    /// Computes assignments, writes them in one transaction, and reports.
    ///
    /// With `config.dry_run` the write phase is skipped.
    ///
    /// # Errors
    /// Everything `plan` returns, plus `PersistenceFailed` when the bulk
    /// write is rolled back.
    pub fn run(&mut self, config: &AssignmentConfig) -> Result<RunReport, ServiceError> {
        let run = self.plan(config)?;
        let attempted = run.assigned_count();

        let persistence = if config.dry_run {
            PersistOutcome::Skipped {
                reason: SkipReason::DryRun,
            }
        } else if attempted == 0 {
            PersistOutcome::Skipped {
                reason: SkipReason::NothingToWrite,
            }
        } else {
            match self.repo.persist_assignments(run.assignments()) {
                Ok(succeeded) => PersistOutcome::Persisted {
                    attempted,
                    succeeded,
                },
                Err(source) => {
                    error!(
                        "event=assign_persist module=service status=error run_id={} attempted={attempted} succeeded=0",
                        run.run_id()
                    );
                    return Err(ServiceError::PersistenceFailed {
                        run_id: run.run_id(),
                        attempted,
                        succeeded: 0,
                        source,
                    });
                }
            }
        };

        info!(
            "event=assign_complete module=service status=ok run_id={} assigned={attempted} persisted={}",
            run.run_id(),
            persistence.succeeded()
        );
        Ok(RunReport::new(
            &run,
            persistence,
            config.unassigned_sample_limit,
        ))
    }

    fn build_allocator(
        &self,
        providers: Vec<ProviderId>,
        patients: &[Patient],
        config: &AssignmentConfig,
    ) -> Result<RoundRobinAllocator, ServiceError> {
        let allocator = RoundRobinAllocator::new(providers, config.capacity);
        if !config.seed_existing_load {
            return Ok(allocator);
        }

        let current = self.repo.fetch_current_assignments()?;
        let existing = load_outside_roster(&current, patients);
        info!(
            "event=allocator_seed module=service status=ok current_assignments={} providers_with_load={}",
            current.len(),
            existing.len()
        );
        Ok(allocator.with_existing_load(&existing))
    }
}

/// Counts persisted panel members per provider, skipping patients in `roster`.
///
/// Roster patients are placed again by the engine and their old slot is
/// overwritten on write.
fn load_outside_roster(
    current: &BTreeMap<PatientId, ProviderId>,
    roster: &[Patient],
) -> BTreeMap<ProviderId, u32> {
    let in_run: HashSet<PatientId> = roster.iter().map(|patient| patient.id).collect();
    let mut loads = BTreeMap::new();
    for (patient, provider) in current {
        if !in_run.contains(patient) {
            *loads.entry(*provider).or_insert(0u32) += 1;
        }
    }
    loads
}
