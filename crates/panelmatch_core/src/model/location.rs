//! Location value types shared by patients and organizations.
//!
//! # Invariants
//! - `GeoPoint` latitude is within `[-90, 90]` and longitude within `[-180, 180]`.
//! - `PostalCode` is trimmed and never empty.

use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Rejection reasons for raw coordinate input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeoPointError {
    NonFinite { latitude: f64, longitude: f64 },
    LatitudeOutOfRange(f64),
    LongitudeOutOfRange(f64),
}

impl Display for GeoPointError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonFinite {
                latitude,
                longitude,
            } => write!(f, "coordinates must be finite, got ({latitude}, {longitude})"),
            Self::LatitudeOutOfRange(value) => {
                write!(f, "latitude {value} is outside [-90, 90]")
            }
            Self::LongitudeOutOfRange(value) => {
                write!(f, "longitude {value} is outside [-180, 180]")
            }
        }
    }
}

impl Error for GeoPointError {}

/// A validated latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    /// Builds a point, rejecting non-finite or out-of-range degrees.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoPointError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(GeoPointError::NonFinite {
                latitude,
                longitude,
            });
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoPointError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoPointError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Builds a point only when both halves are present.
    ///
    /// A lone latitude or longitude counts as "no coordinates", not as an error.
    pub fn from_parts(
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<Option<Self>, GeoPointError> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Self::new(latitude, longitude).map(Some),
            _ => Ok(None),
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Coarse location code (ZIP) used when coordinates are unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PostalCode(String);

impl PostalCode {
    /// Normalizes raw input; blank values mean "no code".
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for PostalCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{GeoPoint, GeoPointError, PostalCode};

    #[test]
    fn geo_point_rejects_out_of_range_and_non_finite() {
        assert!(matches!(
            GeoPoint::new(91.0, 0.0),
            Err(GeoPointError::LatitudeOutOfRange(_))
        ));
        assert!(matches!(
            GeoPoint::new(0.0, -180.5),
            Err(GeoPointError::LongitudeOutOfRange(_))
        ));
        assert!(matches!(
            GeoPoint::new(f64::NAN, 0.0),
            Err(GeoPointError::NonFinite { .. })
        ));
        assert!(GeoPoint::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn from_parts_treats_half_pair_as_absent() {
        assert_eq!(GeoPoint::from_parts(Some(40.0), None).unwrap(), None);
        assert_eq!(GeoPoint::from_parts(None, Some(-75.0)).unwrap(), None);
        let point = GeoPoint::from_parts(Some(40.0), Some(-75.0))
            .unwrap()
            .expect("both halves present");
        assert_eq!(point.latitude(), 40.0);
        assert_eq!(point.longitude(), -75.0);
    }

    #[test]
    fn postal_code_trims_and_drops_blank() {
        assert_eq!(PostalCode::parse("  "), None);
        assert_eq!(PostalCode::parse(" 19104 ").unwrap().as_str(), "19104");
    }
}
