//! Geographic utilities.
//!
//! Great-circle distance on a spherical Earth. The radius is fixed at
//! 6371 km so accumulated run distances match what the rest of the app
//! displays; `geo`'s mean radius differs in the fourth significant digit.

use crate::HasCoordinates;

/// Earth radius used for all distance calculations, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Calculate haversine distance between two coordinates in meters.
///
/// Pure function. NaN coordinates propagate to a NaN result.
///
/// # Example
/// ```
/// use pace_tracker::GpsPoint;
/// use pace_tracker::geo_utils::haversine_distance;
///
/// let a = GpsPoint::new(51.5074, -0.1278);
/// let b = GpsPoint::new(51.5083, -0.1278);
/// let d = haversine_distance(&a, &b);
/// assert!((d - 100.0).abs() < 1.0);
/// ```
pub fn haversine_distance<A, B>(a: &A, b: &B) -> f64
where
    A: HasCoordinates + ?Sized,
    B: HasCoordinates + ?Sized,
{
    let lat1 = a.latitude().to_radians();
    let lat2 = b.latitude().to_radians();
    let d_lat = (b.latitude() - a.latitude()).to_radians();
    let d_lon = (b.longitude() - a.longitude()).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    // Rounding can push h a hair above 1 for antipodal points; clamp keeps NaN
    2.0 * EARTH_RADIUS_METERS * h.sqrt().clamp(0.0, 1.0).asin()
}

/// Total length of a path, summing consecutive legs.
pub fn path_distance<P: HasCoordinates>(points: &[P]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance(&pair[0], &pair[1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GpsPoint;

    #[test]
    fn test_same_point_is_zero() {
        let p = GpsPoint::new(47.3769, 8.5417);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_symmetric() {
        let points = [
            GpsPoint::new(51.5074, -0.1278),
            GpsPoint::new(40.7128, -74.0060),
            GpsPoint::new(-33.8688, 151.2093),
            GpsPoint::new(0.0, 179.9999),
            GpsPoint::new(0.0, -179.9999),
        ];
        for a in &points {
            for b in &points {
                assert_eq!(haversine_distance(a, b), haversine_distance(b, a));
            }
        }
    }

    #[test]
    fn test_known_distance() {
        // London -> Paris, ~343.5 km on a 6371 km sphere
        let london = GpsPoint::new(51.5074, -0.1278);
        let paris = GpsPoint::new(48.8566, 2.3522);
        let d = haversine_distance(&london, &paris);
        assert!((d - 343_500.0).abs() < 1_000.0, "got {}", d);
    }

    #[test]
    fn test_one_degree_latitude() {
        let a = GpsPoint::new(0.0, 0.0);
        let b = GpsPoint::new(1.0, 0.0);
        let expected = EARTH_RADIUS_METERS * 1.0_f64.to_radians();
        assert!((haversine_distance(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_antipodal_is_finite() {
        let a = GpsPoint::new(0.0, 0.0);
        let b = GpsPoint::new(0.0, 180.0);
        let d = haversine_distance(&a, &b);
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_METERS).abs() < 1.0);
    }

    #[test]
    fn test_nan_propagates() {
        let a = GpsPoint::new(f64::NAN, 0.0);
        let b = GpsPoint::new(1.0, 0.0);
        assert!(haversine_distance(&a, &b).is_nan());
        assert!(haversine_distance(&b, &a).is_nan());

        let c = GpsPoint::new(0.0, f64::NAN);
        assert!(haversine_distance(&b, &c).is_nan());
    }

    #[test]
    fn test_matches_geo_crate() {
        use geo::{Distance, Haversine, Point};

        let a = GpsPoint::new(52.5200, 13.4050);
        let b = GpsPoint::new(52.5300, 13.4150);
        let ours = haversine_distance(&a, &b);
        let theirs = Haversine::distance(
            Point::new(a.longitude, a.latitude),
            Point::new(b.longitude, b.latitude),
        );
        // Only the sphere radius differs (6371.0 km vs 6371.0088 km)
        assert!(((ours - theirs) / theirs).abs() < 1e-5);
    }

    #[test]
    fn test_path_distance() {
        let path = vec![
            GpsPoint::new(0.0, 0.0),
            GpsPoint::new(0.001, 0.0),
            GpsPoint::new(0.002, 0.0),
        ];
        let direct = haversine_distance(&path[0], &path[2]);
        assert!((path_distance(&path) - direct).abs() < 1e-6);
        assert_eq!(path_distance::<GpsPoint>(&[]), 0.0);
    }
}
