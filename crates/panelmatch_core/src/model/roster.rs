//! Roster records read from storage at the start of a run.
//!
//! # Invariants
//! - Ids are stable row ids and unique within their dataset.
//! - A patient with neither coordinates nor a postal code can never be
//!   proximity-matched.

use crate::model::location::{GeoPoint, PostalCode};
use serde::Serialize;

pub type PatientId = i64;
pub type OrganizationId = i64;
pub type ProviderId = i64;

/// A patient needing a primary-care provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Patient {
    pub id: PatientId,
    pub location: Option<GeoPoint>,
    pub postal_code: Option<PostalCode>,
}

impl Patient {
    pub fn new(id: PatientId) -> Self {
        Self {
            id,
            location: None,
            postal_code: None,
        }
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_postal_code(mut self, postal_code: PostalCode) -> Self {
        self.postal_code = Some(postal_code);
        self
    }

    /// Returns whether any proximity signal exists for this patient.
    pub fn has_location_signal(&self) -> bool {
        self.location.is_some() || self.postal_code.is_some()
    }
}

/// A care site used only to decide proximity eligibility.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub location: Option<GeoPoint>,
    pub postal_code: Option<PostalCode>,
}

impl Organization {
    pub fn new(id: OrganizationId) -> Self {
        Self {
            id,
            location: None,
            postal_code: None,
        }
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_postal_code(mut self, postal_code: PostalCode) -> Self {
        self.postal_code = Some(postal_code);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::Patient;
    use crate::model::location::{GeoPoint, PostalCode};

    #[test]
    fn either_coordinates_or_postal_code_is_a_location_signal() {
        assert!(!Patient::new(1).has_location_signal());
        assert!(Patient::new(2)
            .with_location(GeoPoint::new(1.0, 2.0).unwrap())
            .has_location_signal());
        assert!(Patient::new(3)
            .with_postal_code(PostalCode::parse("19104").unwrap())
            .has_location_signal());
    }
}
