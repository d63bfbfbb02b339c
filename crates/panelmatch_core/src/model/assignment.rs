//! Per-patient assignment outcomes.

use crate::model::roster::PatientId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Why a patient ended the run without a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedReason {
    /// No coordinate match and no postal-code match.
    Ineligible,
    /// Eligible, but every provider was at capacity for one full cycle.
    CapacityExhausted,
}

impl Display for UnassignedReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ineligible => f.write_str("ineligible"),
            Self::CapacityExhausted => f.write_str("capacity_exhausted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnassignedPatient {
    pub id: PatientId,
    pub reason: UnassignedReason,
}
