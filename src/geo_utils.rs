//! Geographic utilities: great-circle distance, path length and bounds.

use geo::{Distance, Haversine, Point};

use crate::{Bounds, GpsPoint};

/// Haversine distance between two points in meters.
///
/// NaN coordinates yield NaN.
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Total length of a polyline in meters.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Bounding box of all points with finite coordinates.
///
/// Returns `None` if no point has finite coordinates.
pub fn compute_bounds(points: &[GpsPoint]) -> Option<Bounds> {
    let finite: Vec<GpsPoint> = points
        .iter()
        .filter(|p| p.latitude.is_finite() && p.longitude.is_finite())
        .copied()
        .collect();
    Bounds::from_points(&finite)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_distance() {
        // One degree of longitude on the equator is ~111.2 km
        let p1 = GpsPoint::new(0.0, 0.0);
        let p2 = GpsPoint::new(0.0, 1.0);
        let dist = haversine_distance(&p1, &p2);
        assert!((dist - 111_195.0).abs() < 100.0, "got {}", dist);
    }

    #[test]
    fn test_haversine_same_point() {
        let p = GpsPoint::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_nan() {
        let p1 = GpsPoint::new(f64::NAN, 0.0);
        let p2 = GpsPoint::new(0.0, 1.0);
        assert!(haversine_distance(&p1, &p2).is_nan());
    }

    #[test]
    fn test_polyline_length() {
        let points = vec![
            GpsPoint::new(0.0, 0.0),
            GpsPoint::new(0.0, 1.0),
            GpsPoint::new(0.0, 2.0),
        ];
        let total = polyline_length(&points);
        let single = haversine_distance(&points[0], &points[1]);
        assert!((total - 2.0 * single).abs() < 1e-6);
        assert_eq!(polyline_length(&points[..1]), 0.0);
    }

    #[test]
    fn test_compute_bounds_skips_nan() {
        let points = vec![
            GpsPoint::new(10.0, 20.0),
            GpsPoint::new(f64::NAN, 50.0),
            GpsPoint::new(12.0, 18.0),
        ];
        let bounds = compute_bounds(&points).unwrap();
        assert_eq!(bounds.min_lat, 10.0);
        assert_eq!(bounds.max_lat, 12.0);
        assert_eq!(bounds.min_lng, 18.0);
        assert_eq!(bounds.max_lng, 20.0);

        assert!(compute_bounds(&[GpsPoint::new(f64::NAN, f64::NAN)]).is_none());
    }
}
