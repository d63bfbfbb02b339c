//! Nearest-site locator with postal-code fallback.
//!
//! # Invariants
//! - Coordinate matching runs first; postal codes are consulted only when it
//!   produced no match.
//! - Any finite nearest distance is a match, however far.

use crate::geo::haversine::distance_miles;
use crate::model::location::{GeoPoint, PostalCode};
use crate::model::roster::{Organization, OrganizationId, Patient};
use serde::Serialize;
use std::collections::HashSet;

/// Which eligibility check fired for a patient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MatchMode {
    /// Nearest coordinate-bearing organization; first in input order on ties.
    Distance {
        nearest: OrganizationId,
        miles: f64,
    },
    /// Exact postal-code match with at least one organization.
    PostalCode,
}

/// Precomputed organization index for eligibility checks.
#[derive(Debug, Clone, Default)]
pub struct Locator {
    sites: Vec<(OrganizationId, GeoPoint)>,
    postal_codes: HashSet<PostalCode>,
}

impl Locator {
    pub fn new(organizations: &[Organization]) -> Self {
        let sites = organizations
            .iter()
            .filter_map(|org| org.location.map(|point| (org.id, point)))
            .collect();
        let postal_codes = organizations
            .iter()
            .filter_map(|org| org.postal_code.clone())
            .collect();
        Self {
            sites,
            postal_codes,
        }
    }

    /// Number of organizations usable for distance matching.
    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    /// Number of distinct organization postal codes.
    pub fn postal_code_count(&self) -> usize {
        self.postal_codes.len()
    }

    /// Returns the match mode for an eligible patient, or `None` when ineligible.
    pub fn locate(&self, patient: &Patient) -> Option<MatchMode> {
        if !patient.has_location_signal() {
            return None;
        }
        if let Some((nearest, miles)) = patient.location.and_then(|origin| self.nearest(origin)) {
            return Some(MatchMode::Distance { nearest, miles });
        }

        patient
            .postal_code
            .as_ref()
            .filter(|code| self.postal_codes.contains(*code))
            .map(|_| MatchMode::PostalCode)
    }

    fn nearest(&self, origin: GeoPoint) -> Option<(OrganizationId, f64)> {
        self.sites
            .iter()
            .map(|(id, point)| (*id, distance_miles(origin, *point)))
            .filter(|(_, miles)| miles.is_finite())
            .fold(None, |best, candidate| match best {
                Some((_, best_miles)) if best_miles <= candidate.1 => best,
                _ => Some(candidate),
            })
    }
}
