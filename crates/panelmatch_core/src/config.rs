//! Assignment run configuration.
//!
//! # Invariants
//! - Capacity is a positive integer (`NonZeroU32`), default 380.
//! - The unassigned sample limit used in reports is positive.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::num::NonZeroU32;

/// Default number of patients one provider may carry.
pub const DEFAULT_CAPACITY: u32 = 380;
/// Default number of unassigned ids echoed in a report.
pub const DEFAULT_UNASSIGNED_SAMPLE_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroCapacity,
    ZeroSampleLimit,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroCapacity => write!(f, "capacity must be at least 1"),
            Self::ZeroSampleLimit => write!(f, "unassigned sample limit must be at least 1"),
        }
    }
}

impl Error for ConfigError {}

/// Tunables for one assignment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentConfig {
    /// Hard per-provider patient limit.
    pub capacity: NonZeroU32,
    /// Start counters from current persisted panel sizes instead of zero.
    ///
    /// Off by default: counts cover this run's assignments only.
    pub seed_existing_load: bool,
    /// Compute assignments without writing them.
    pub dry_run: bool,
    /// Maximum unassigned patient ids listed in a report.
    pub unassigned_sample_limit: usize,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            capacity: NonZeroU32::new(DEFAULT_CAPACITY).unwrap_or(NonZeroU32::MIN),
            seed_existing_load: false,
            dry_run: false,
            unassigned_sample_limit: DEFAULT_UNASSIGNED_SAMPLE_LIMIT,
        }
    }
}

impl AssignmentConfig {
    /// Builds a config with an explicit capacity, rejecting zero.
    pub fn with_capacity(capacity: u32) -> Result<Self, ConfigError> {
        let capacity = NonZeroU32::new(capacity).ok_or(ConfigError::ZeroCapacity)?;
        Ok(Self {
            capacity,
            ..Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.unassigned_sample_limit == 0 {
            return Err(ConfigError::ZeroSampleLimit);
        }
        Ok(())
    }
}
