//! Core domain logic for panelmatch.
//! Assigns patients to primary-care providers by site proximity under a hard
//! per-provider capacity.

pub mod allocate;
pub mod config;
pub mod db;
pub mod geo;
pub mod logging;
pub mod model;
pub mod report;
pub mod repo;
pub mod service;

pub use allocate::allocator::{Allocation, RoundRobinAllocator};
pub use allocate::engine::{AssignmentEngine, AssignmentRun, MatchCounts, PROGRESS_LOG_INTERVAL};
pub use config::{AssignmentConfig, ConfigError, DEFAULT_CAPACITY};
pub use geo::haversine::distance_miles;
pub use geo::locator::{Locator, MatchMode};
pub use logging::{default_log_level, init_logging, logging_status, LogSink};
pub use model::assignment::{UnassignedPatient, UnassignedReason};
pub use model::location::{GeoPoint, GeoPointError, PostalCode};
pub use model::roster::{Organization, OrganizationId, Patient, PatientId, ProviderId};
pub use report::{PersistOutcome, ProviderLoad, RunReport, SkipReason};
pub use repo::roster_repo::{RepoError, RepoResult, RosterRepository, SqliteRosterRepository};
pub use service::assignment_service::{AssignmentService, Dataset, ServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
