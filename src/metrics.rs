//! Per-point track metrics.
//!
//! All queries are read-only over an immutable [`Track`]:
//! - Cumulative distance from the start (haversine, meters)
//! - Elapsed time and time/distance fractions
//! - Point summaries for the map popup
//! - Nearest track point to an arbitrary location
//!
//! Index arguments must be in range; an out-of-range index is a caller bug
//! and panics.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::geo_utils::haversine_distance;
use crate::{GpsPoint, Track};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Summary of one track point, as shown when the user clicks the path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointSummary {
    /// Index into the track's points
    pub index: usize,
    pub timestamp: Option<DateTime<Utc>>,
    /// Minutes since the first point, rounded. `None` if either time is unknown.
    pub elapsed_minutes: Option<i64>,
    /// Elapsed time over total duration (0.0 for a zero-length duration)
    pub time_fraction: f64,
    /// Distance so far over total distance (0.0 for a zero-length track)
    pub distance_fraction: f64,
    /// Elevation in meters, unrounded
    pub elevation: f64,
    /// Distance from the start in whole meters
    pub cumulative_distance_meters: f64,
}

impl PointSummary {
    /// Time fraction as a rounded percentage.
    pub fn time_percent(&self) -> Option<i64> {
        to_percent(self.time_fraction)
    }

    /// Distance fraction as a rounded percentage.
    pub fn distance_percent(&self) -> Option<i64> {
        to_percent(self.distance_fraction)
    }
}

fn to_percent(fraction: f64) -> Option<i64> {
    let percent = (fraction * 100.0).round();
    percent.is_finite().then_some(percent as i64)
}

fn fmt_percent(percent: Option<i64>) -> String {
    match percent {
        Some(p) => format!("{}%", p),
        None => "?%".to_string(),
    }
}

impl fmt::Display for PointSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.elapsed_minutes {
            Some(minutes) => write!(f, "Time: {} min", minutes)?,
            None => write!(f, "Time: unknown")?,
        }
        write!(f, " ({})", fmt_percent(self.time_percent()))?;
        if let Some(ts) = self.timestamp {
            write!(f, " at {}", ts.to_rfc3339())?;
        }
        writeln!(f)?;
        writeln!(f, "Elevation: {} m", self.elevation)?;
        write!(
            f,
            "Distance: {} m ({})",
            self.cumulative_distance_meters,
            fmt_percent(self.distance_percent())
        )
    }
}

/// Metrics engine for one track.
///
/// Computes the cumulative distance table once; every query after that is
/// O(1) except [`find_closest_point`](Self::find_closest_point).
#[derive(Debug, Clone)]
pub struct TrackMetrics<'a> {
    track: &'a Track,
    cumulative: Vec<f64>,
}

impl<'a> TrackMetrics<'a> {
    pub fn new(track: &'a Track) -> Self {
        let points = track.points();
        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        cumulative.push(total);
        for w in points.windows(2) {
            total += haversine_distance(&w[0].position(), &w[1].position());
            cumulative.push(total);
        }

        Self { track, cumulative }
    }

    pub fn track(&self) -> &'a Track {
        self.track
    }

    fn check_index(&self, index: usize) {
        assert!(
            index < self.cumulative.len(),
            "point index {} out of range for track with {} points",
            index,
            self.cumulative.len()
        );
    }

    /// Distance in meters from the first point to `index` along the path.
    pub fn cumulative_distance(&self, index: usize) -> f64 {
        self.check_index(index);
        self.cumulative[index]
    }

    /// Total path length in meters.
    pub fn total_distance(&self) -> f64 {
        self.cumulative[self.cumulative.len() - 1]
    }

    /// Milliseconds from the first point to `index`.
    pub fn elapsed_millis(&self, index: usize) -> Option<i64> {
        self.check_index(index);
        let start = self.track.start_time()?;
        let time = self.track.points()[index].timestamp?;
        Some((time - start).num_milliseconds())
    }

    /// Milliseconds from the first point to the last.
    pub fn total_duration_millis(&self) -> Option<i64> {
        self.elapsed_millis(self.track.last_index())
    }

    /// Elapsed time over total duration.
    ///
    /// 0.0 when the total duration is zero, NaN when a timestamp is unknown.
    pub fn time_fraction(&self, index: usize) -> f64 {
        match (self.elapsed_millis(index), self.total_duration_millis()) {
            (Some(_), Some(0)) => 0.0,
            (Some(elapsed), Some(total)) => elapsed as f64 / total as f64,
            _ => f64::NAN,
        }
    }

    /// Cumulative distance over total distance.
    ///
    /// 0.0 when the track has zero length.
    pub fn distance_fraction(&self, index: usize) -> f64 {
        let total = self.total_distance();
        if total == 0.0 {
            return 0.0;
        }
        self.cumulative_distance(index) / total
    }

    pub fn describe_point(&self, index: usize) -> PointSummary {
        self.check_index(index);
        let point = &self.track.points()[index];

        PointSummary {
            index,
            timestamp: point.timestamp,
            elapsed_minutes: self
                .elapsed_millis(index)
                .map(|ms| (ms as f64 / 60_000.0).round() as i64),
            time_fraction: self.time_fraction(index),
            distance_fraction: self.distance_fraction(index),
            elevation: point.elevation,
            cumulative_distance_meters: self.cumulative_distance(index).round(),
        }
    }

    /// Index of the point nearest to `target`. See [`find_closest_point`].
    pub fn find_closest_point(&self, target: &GpsPoint) -> Option<usize> {
        find_closest_point(self.track, target)
    }
}

/// Distance in meters from the first point to `index` along the path.
///
/// # Panics
/// If `index` is out of range.
pub fn cumulative_distance(track: &Track, index: usize) -> f64 {
    assert!(
        index < track.len(),
        "point index {} out of range for track with {} points",
        index,
        track.len()
    );
    let points = track.points();
    points[..=index]
        .windows(2)
        .map(|w| haversine_distance(&w[0].position(), &w[1].position()))
        .sum()
}

/// Summary of the point at `index`.
///
/// # Panics
/// If `index` is out of range.
pub fn describe_point(track: &Track, index: usize) -> PointSummary {
    TrackMetrics::new(track).describe_point(index)
}

/// Index of the track point nearest to `target` (linear scan).
///
/// Ties go to the lowest index. Points whose distance is NaN never match;
/// `None` is returned only if no point yields a comparable distance.
pub fn find_closest_point(track: &Track, target: &GpsPoint) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (i, point) in track.points().iter().enumerate() {
        let dist = haversine_distance(target, &point.position());
        if dist.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, min)| dist < min) {
            best = Some((i, dist));
        }
    }

    best.map(|(i, _)| i)
}

/// Parallel version of [`find_closest_point`] with the same tie-break.
#[cfg(feature = "parallel")]
pub fn find_closest_point_parallel(track: &Track, target: &GpsPoint) -> Option<usize> {
    track
        .points()
        .par_iter()
        .enumerate()
        .map(|(i, point)| (i, haversine_distance(target, &point.position())))
        .filter(|(_, dist)| !dist.is_nan())
        .reduce_with(|a, b| {
            if b.1 < a.1 || (b.1 == a.1 && b.0 < a.0) {
                b
            } else {
                a
            }
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TrackMetadata, TrackPoint};
    use chrono::{Duration, TimeZone};

    fn make_track(coords: &[(f64, f64)], seconds: &[i64]) -> Track {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let points = coords
            .iter()
            .zip(seconds)
            .enumerate()
            .map(|(i, (&(lat, lon), &s))| TrackPoint {
                latitude: lat,
                longitude: lon,
                elevation: i as f64 * 10.0,
                timestamp: Some(start + Duration::seconds(s)),
            })
            .collect();
        Track::from_parts(TrackMetadata::default(), points).unwrap()
    }

    fn three_point_track() -> Track {
        make_track(&[(0.0, 0.0), (0.0, 1.0), (0.0, 2.0)], &[0, 60, 120])
    }

    #[test]
    fn test_cumulative_distance() {
        let track = three_point_track();
        let metrics = TrackMetrics::new(&track);

        assert_eq!(metrics.cumulative_distance(0), 0.0);
        assert_eq!(cumulative_distance(&track, 0), 0.0);

        let d1 = metrics.cumulative_distance(1);
        let d2 = metrics.cumulative_distance(2);
        assert!(d1 > 0.0 && d2 > d1);
        assert!((d2 - 2.0 * d1).abs() < 1e-6);
        assert!((cumulative_distance(&track, 2) - d2).abs() < 1e-6);
        assert_eq!(metrics.total_distance(), d2);
    }

    #[test]
    fn test_describe_point_scenario() {
        let track = three_point_track();
        let summary = describe_point(&track, 1);

        assert_eq!(summary.index, 1);
        assert_eq!(summary.elapsed_minutes, Some(1));
        assert_eq!(summary.time_fraction, 0.5);
        assert!((summary.distance_fraction - 0.5).abs() < 1e-9);
        assert_eq!(summary.elevation, 10.0);
        assert_eq!(summary.time_percent(), Some(50));
        assert_eq!(summary.distance_percent(), Some(50));
    }

    #[test]
    fn test_describe_first_and_last() {
        let track = three_point_track();
        let metrics = TrackMetrics::new(&track);

        let first = metrics.describe_point(0);
        assert_eq!(first.elapsed_minutes, Some(0));
        assert_eq!(first.time_fraction, 0.0);
        assert_eq!(first.distance_fraction, 0.0);
        assert_eq!(first.cumulative_distance_meters, 0.0);

        let last = metrics.describe_point(2);
        assert_eq!(last.elapsed_minutes, Some(2));
        assert_eq!(last.time_fraction, 1.0);
        assert_eq!(last.distance_fraction, 1.0);
    }

    #[test]
    fn test_elapsed_minutes_rounding() {
        let track = make_track(&[(0.0, 0.0), (0.0, 0.1), (0.0, 0.2)], &[0, 89, 150]);
        let metrics = TrackMetrics::new(&track);
        assert_eq!(metrics.describe_point(1).elapsed_minutes, Some(1));
        assert_eq!(metrics.describe_point(2).elapsed_minutes, Some(3));
    }

    #[test]
    fn test_single_point_track() {
        let track = make_track(&[(10.0, 10.0)], &[0]);
        let summary = describe_point(&track, 0);
        assert_eq!(summary.time_fraction, 0.0);
        assert_eq!(summary.distance_fraction, 0.0);
        assert_eq!(summary.cumulative_distance_meters, 0.0);
    }

    #[test]
    fn test_unknown_timestamp() {
        let mut points = three_point_track().points().to_vec();
        points[0].timestamp = None;
        let track = Track::from_parts(TrackMetadata::default(), points).unwrap();

        let summary = describe_point(&track, 1);
        assert_eq!(summary.elapsed_minutes, None);
        assert!(summary.time_fraction.is_nan());
        assert_eq!(summary.time_percent(), None);
        // Distance does not depend on time
        assert!((summary.distance_fraction - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_nan_coordinates_propagate() {
        let mut points = three_point_track().points().to_vec();
        points[1].latitude = f64::NAN;
        let track = Track::from_parts(TrackMetadata::default(), points).unwrap();
        let metrics = TrackMetrics::new(&track);

        assert_eq!(metrics.cumulative_distance(0), 0.0);
        assert!(metrics.cumulative_distance(1).is_nan());
        assert!(metrics.describe_point(2).distance_fraction.is_nan());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_index_panics() {
        let track = three_point_track();
        TrackMetrics::new(&track).describe_point(3);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_cumulative_distance_out_of_range_panics() {
        let track = three_point_track();
        cumulative_distance(&track, 5);
    }

    #[test]
    fn test_find_closest_point() {
        let track = three_point_track();
        assert_eq!(find_closest_point(&track, &GpsPoint::new(0.0, 1.0)), Some(1));
        assert_eq!(find_closest_point(&track, &GpsPoint::new(0.1, 1.9)), Some(2));
        assert_eq!(find_closest_point(&track, &GpsPoint::new(-5.0, -5.0)), Some(0));
    }

    #[test]
    fn test_find_closest_point_ties_lowest_index() {
        // Out-and-back: points 1 and 3 share coordinates
        let track = make_track(
            &[(0.0, 0.0), (0.0, 1.0), (0.0, 2.0), (0.0, 1.0)],
            &[0, 60, 120, 180],
        );
        assert_eq!(find_closest_point(&track, &GpsPoint::new(0.0, 1.0)), Some(1));
    }

    #[test]
    fn test_find_closest_point_skips_nan() {
        let mut points = three_point_track().points().to_vec();
        points[0].latitude = f64::NAN;
        let track = Track::from_parts(TrackMetadata::default(), points).unwrap();

        assert_eq!(find_closest_point(&track, &GpsPoint::new(0.0, 0.0)), Some(1));
        assert_eq!(find_closest_point(&track, &GpsPoint::new(f64::NAN, 0.0)), None);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_find_closest_point_parallel_matches() {
        let coords: Vec<(f64, f64)> = (0..500).map(|i| (0.0, (i % 50) as f64 * 0.01)).collect();
        let seconds: Vec<i64> = (0..500).collect();
        let track = make_track(&coords, &seconds);

        for target in [GpsPoint::new(0.0, 0.1), GpsPoint::new(0.001, 0.333)] {
            assert_eq!(
                find_closest_point_parallel(&track, &target),
                find_closest_point(&track, &target)
            );
        }
    }

    #[test]
    fn test_summary_display() {
        let track = three_point_track();
        let text = describe_point(&track, 1).to_string();
        assert!(text.starts_with("Time: 1 min (50%) at 2020-01-01T00:01:00+00:00"));
        assert!(text.contains("Elevation: 10 m"));
        assert!(text.contains("Distance: 111195 m (50%)"));
    }
}
