//! Great-circle distance on a spherical earth.

use crate::model::location::GeoPoint;

/// Mean earth radius (IUGG, 6371.0088 km) expressed in statute miles.
pub const EARTH_RADIUS_MILES: f64 = 3958.7613;

/// Returns the haversine distance between two points in miles.
pub fn distance_miles(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.latitude().to_radians();
    let lat2 = to.latitude().to_radians();
    let half_dlat = (lat2 - lat1) / 2.0;
    let half_dlon = (to.longitude() - from.longitude()).to_radians() / 2.0;

    let h = half_dlat.sin().powi(2) + lat1.cos() * lat2.cos() * half_dlon.sin().powi(2);
    // Rounding can push `h` a hair above 1 for antipodal points.
    2.0 * EARTH_RADIUS_MILES * h.min(1.0).sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::{distance_miles, EARTH_RADIUS_MILES};
    use crate::model::location::GeoPoint;

    fn point(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint::new(latitude, longitude).unwrap()
    }

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} +/- {tolerance}, got {actual}"
        );
    }

    #[test]
    fn same_point_is_zero_miles() {
        let philly = point(39.9526, -75.1652);
        assert_eq!(distance_miles(philly, philly), 0.0);
    }

    #[test]
    fn lyon_to_paris_matches_reference_distance() {
        let lyon = point(45.7597, 4.8422);
        let paris = point(48.8567, 2.3508);
        // 392.2172 km
        assert_close(distance_miles(lyon, paris), 243.71, 0.5);
    }

    #[test]
    fn london_to_new_york_matches_reference_distance() {
        let london = point(51.5074, -0.1278);
        let new_york = point(40.7128, -74.0060);
        assert_close(distance_miles(london, new_york), 3461.0, 10.0);
    }

    #[test]
    fn antipodes_are_half_the_circumference() {
        let d = distance_miles(point(0.0, 0.0), point(0.0, 180.0));
        assert_close(d, std::f64::consts::PI * EARTH_RADIUS_MILES, 1e-6);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = point(34.0522, -118.2437);
        let b = point(41.8781, -87.6298);
        assert_close(distance_miles(a, b), distance_miles(b, a), 1e-9);
    }
}
