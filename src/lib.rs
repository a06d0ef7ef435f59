//! # Track Viewer
//!
//! GPX track parsing and per-point track metrics for interactive map viewers.
//!
//! This library provides:
//! - A lenient GPX parser producing an immutable [`Track`]
//! - Cumulative distance, time/distance fractions and point summaries
//! - Nearest-point lookup for mapping a click back onto the track
//! - A [`TrackSession`] owning the currently loaded track
//!
//! Map rendering is left to the host: it receives the path
//! ([`Track::coordinates`]), the view bounds ([`Track::bounds`]) and the
//! per-point summaries.
//!
//! ## Features
//!
//! - **`parallel`** - Enable the rayon nearest-point scan for long tracks
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use track_viewer::{parse_gpx, GpsPoint, TrackMetrics};
//!
//! let gpx = r#"<gpx><trk><trkseg>
//!     <trkpt lat="0" lon="0"><ele>0</ele><time>2020-01-01T00:00:00Z</time></trkpt>
//!     <trkpt lat="0" lon="1"><ele>10</ele><time>2020-01-01T00:01:00Z</time></trkpt>
//!     <trkpt lat="0" lon="2"><ele>20</ele><time>2020-01-01T00:02:00Z</time></trkpt>
//! </trkseg></trk></gpx>"#;
//!
//! let track = parse_gpx(gpx).unwrap();
//! assert_eq!(track.metadata().name, "No Name");
//!
//! let metrics = TrackMetrics::new(&track);
//! let index = metrics.find_closest_point(&GpsPoint::new(0.01, 0.98)).unwrap();
//! let summary = metrics.describe_point(index);
//! assert_eq!(summary.elapsed_minutes, Some(1));
//! println!("{}", summary);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, TrackParseError};

// Geographic utilities (distance, bounds)
pub mod geo_utils;

// GPX parsing
pub mod parser;
pub use parser::{parse_gpx, parse_gpx_bytes, parse_gpx_bytes_with_config, parse_gpx_with_config};

// Per-point metrics and nearest-point lookup
pub mod metrics;
#[cfg(feature = "parallel")]
pub use metrics::find_closest_point_parallel;
pub use metrics::{cumulative_distance, describe_point, find_closest_point, PointSummary, TrackMetrics};

// Owned "currently loaded track" state
pub mod session;
pub use session::{LoadOutcome, LoadTicket, PointSelection, TrackSession};

// ============================================================================
// Core Types
// ============================================================================

/// Placeholder name for tracks without a `<metadata><name>`.
pub const DEFAULT_TRACK_NAME: &str = "No Name";

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use track_viewer::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Bounding box for a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from GPS points.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Name and description from the GPX `<metadata>` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub name: String,
    pub description: String,
}

impl Default for TrackMetadata {
    fn default() -> Self {
        Self {
            name: DEFAULT_TRACK_NAME.to_string(),
            description: String::new(),
        }
    }
}

/// A single recorded sample.
///
/// Fields the source document did not provide in a usable form are kept as
/// NaN (numbers) or `None` (timestamp) rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Elevation in meters
    pub elevation: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

impl TrackPoint {
    /// Position of this sample.
    pub fn position(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// A parsed track: metadata plus a non-empty, ordered point sequence.
///
/// Immutable once built. Loading another file replaces the whole value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    metadata: TrackMetadata,
    points: Vec<TrackPoint>,
}

impl Track {
    /// Build a track from parts.
    ///
    /// Returns `None` if `points` is empty.
    pub fn from_parts(metadata: TrackMetadata, points: Vec<TrackPoint>) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        Some(Self { metadata, points })
    }

    pub fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }

    /// Points in recording order.
    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.points.len() - 1
    }

    /// Path coordinates for drawing the track.
    pub fn coordinates(&self) -> Vec<GpsPoint> {
        self.points.iter().map(TrackPoint::position).collect()
    }

    /// Bounding box of the path, ignoring points with NaN coordinates.
    pub fn bounds(&self) -> Option<Bounds> {
        geo_utils::compute_bounds(&self.coordinates())
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.points[0].timestamp
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.points[self.last_index()].timestamp
    }
}

/// Configuration for parsing and querying tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    /// Name used when the document has no usable `<metadata><name>`
    pub untitled_name: String,
    /// Minimum point count before the nearest-point scan runs in parallel
    /// (only with the `parallel` feature)
    pub parallel_threshold: usize,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            untitled_name: DEFAULT_TRACK_NAME.to_string(),
            parallel_threshold: 10_000,
        }
    }
}
