//! Great-circle distance between lat/lon fixes.

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometers between two points given in degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_distance() {
        assert_eq!(haversine_km(48.8566, 2.3522, 48.8566, 2.3522), 0.0);
    }

    #[test]
    fn test_short_hop() {
        // Two central-Paris fixes roughly 13 m apart
        let d = haversine_km(48.8566, 2.3522, 48.8567, 2.3523);
        assert!(d > 0.010 && d < 0.016, "got {} km", d);
    }

    #[test]
    fn test_paris_to_lyon() {
        // Known reference: ~392 km great-circle
        let d = haversine_km(48.8566, 2.3522, 45.7640, 4.8357);
        assert_relative_eq!(d, 392.0, max_relative = 0.01);
    }

    #[test]
    fn test_symmetry() {
        let a = haversine_km(45.757, 4.832, 45.759, 4.834);
        let b = haversine_km(45.759, 4.834, 45.757, 4.832);
        assert_relative_eq!(a, b, epsilon = 1e-12);
    }
}
