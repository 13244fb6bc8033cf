/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in km between two points given in decimal degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    // clamp: rounding can push `a` a hair past 1 for antipodal points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_point_is_zero() {
        assert_eq!(haversine_km(52.52, 13.405, 52.52, 13.405), 0.0);
    }

    #[test]
    fn test_symmetric() {
        let ab = haversine_km(52.52, 13.40, 52.50, 13.35);
        let ba = haversine_km(52.50, 13.35, 52.52, 13.40);
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_known_berlin_distance() {
        // Mitte -> Kreuzberg district centers
        let d = haversine_km(52.5200, 13.4050, 52.4981, 13.3918);
        assert!((d - 2.59).abs() < 0.05, "got {d}");
    }

    #[test]
    fn test_quarter_meridian() {
        let d = haversine_km(0.0, 0.0, 90.0, 0.0);
        let expected = EARTH_RADIUS_KM * std::f64::consts::FRAC_PI_2;
        assert!((d - expected).abs() < 1e-6);
    }
}
