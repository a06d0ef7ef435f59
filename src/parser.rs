//! GPX parsing.
//!
//! Streams the document with `quick-xml` and collects:
//! - `<metadata>` → `<name>` / `<desc>` (first `<metadata>` only)
//! - every `<trkpt>` that is a direct child of a `<trkseg>`, in document order
//!
//! Elements are matched by local name, so namespace prefixes are ignored.
//!
//! Parsing is strict about XML well-formedness and lenient about field
//! content: a `lat` that is not a number becomes NaN, an unparseable
//! `<time>` becomes `None`. Neither is reported as an error.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::{debug, info, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Result, TrackParseError};
use crate::{Track, TrackConfig, TrackMetadata, TrackPoint};

/// Parse GPX text into a [`Track`] using the default configuration.
///
/// # Errors
///
/// - [`TrackParseError::MalformedXml`] if the text is not well-formed XML
/// - [`TrackParseError::NoTrackPoints`] if no `<trkseg>` holds a `<trkpt>`
///
/// # Example
/// ```
/// use track_viewer::{parse_gpx, TrackParseError};
///
/// let gpx = r#"<gpx><metadata><name>Morning ride</name></metadata>
///   <trk><trkseg><trkpt lat="46.5" lon="6.6"><ele>372</ele></trkpt></trkseg></trk>
/// </gpx>"#;
/// let track = parse_gpx(gpx).unwrap();
/// assert_eq!(track.metadata().name, "Morning ride");
/// assert_eq!(track.len(), 1);
///
/// assert_eq!(parse_gpx("<gpx/>"), Err(TrackParseError::NoTrackPoints));
/// ```
pub fn parse_gpx(text: &str) -> Result<Track> {
    parse_gpx_with_config(text, &TrackConfig::default())
}

/// Parse GPX text into a [`Track`].
pub fn parse_gpx_with_config(text: &str, config: &TrackConfig) -> Result<Track> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let document = GpxScanner::default().scan(text)?;

    let metadata = match document.metadata {
        Some(raw) => TrackMetadata {
            name: non_empty_or(raw.name.trim(), &config.untitled_name),
            description: raw.description.trim().to_string(),
        },
        None => {
            debug!("[Parser] Metadata not found");
            TrackMetadata {
                name: config.untitled_name.clone(),
                description: String::new(),
            }
        }
    };

    let points: Vec<TrackPoint> = document.points.iter().map(RawPoint::finish).collect();
    log_lenient_fields(&points);

    let Some(track) = Track::from_parts(metadata, points) else {
        warn!("[Parser] Document has no track points");
        return Err(TrackParseError::NoTrackPoints);
    };

    info!(
        "[Parser] Parsed track '{}' with {} points",
        track.metadata().name,
        track.len()
    );
    Ok(track)
}

/// Parse raw file bytes into a [`Track`] using the default configuration.
///
/// Bytes are decoded as UTF-8; invalid sequences become U+FFFD.
pub fn parse_gpx_bytes(bytes: &[u8]) -> Result<Track> {
    parse_gpx_bytes_with_config(bytes, &TrackConfig::default())
}

/// Parse raw file bytes into a [`Track`].
pub fn parse_gpx_bytes_with_config(bytes: &[u8], config: &TrackConfig) -> Result<Track> {
    let text = String::from_utf8_lossy(bytes);
    if let Cow::Owned(_) = text {
        debug!("[Parser] Input contained invalid UTF-8, replaced with U+FFFD");
    }
    parse_gpx_with_config(&text, config)
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn log_lenient_fields(points: &[TrackPoint]) {
    let bad_coords = points
        .iter()
        .filter(|p| p.latitude.is_nan() || p.longitude.is_nan())
        .count();
    let bad_elevation = points.iter().filter(|p| p.elevation.is_nan()).count();
    let bad_time = points.iter().filter(|p| p.timestamp.is_none()).count();

    if bad_coords + bad_elevation + bad_time > 0 {
        debug!(
            "[Parser] Kept points with unparsed fields: {} coordinates, {} elevations, {} times",
            bad_coords, bad_elevation, bad_time
        );
    }
}

// ============================================================================
// Field parsing
// ============================================================================

/// Parse a decimal number, NaN if missing or malformed.
fn parse_number(text: &str) -> f64 {
    text.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// Parse a GPX timestamp.
///
/// Accepts RFC 3339, ISO date-time without offset (taken as UTC) and a bare
/// ISO date (midnight UTC).
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ============================================================================
// Document scanner
// ============================================================================

/// What an open element means to the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Metadata,
    Name,
    Desc,
    Segment,
    /// Index into `GpxDocument::points`
    Point(usize),
    Elevation(usize),
    Time(usize),
    Other,
}

impl Frame {
    fn captures_text(self) -> bool {
        matches!(
            self,
            Frame::Name | Frame::Desc | Frame::Elevation(_) | Frame::Time(_)
        )
    }
}

#[derive(Debug, Default)]
struct RawMetadata {
    name: String,
    description: String,
}

#[derive(Debug)]
struct RawPoint {
    latitude: f64,
    longitude: f64,
    elevation: String,
    time: String,
}

impl RawPoint {
    fn finish(&self) -> TrackPoint {
        TrackPoint {
            latitude: self.latitude,
            longitude: self.longitude,
            elevation: parse_number(&self.elevation),
            timestamp: parse_timestamp(&self.time),
        }
    }
}

#[derive(Debug, Default)]
struct GpxDocument {
    metadata: Option<RawMetadata>,
    points: Vec<RawPoint>,
}

#[derive(Debug, Default)]
struct GpxScanner {
    stack: Vec<Frame>,
    document: GpxDocument,
    root_seen: bool,
}

impl GpxScanner {
    fn scan(mut self, text: &str) -> Result<GpxDocument> {
        let mut reader = Reader::from_str(text);

        loop {
            let position = reader.buffer_position();
            let event = reader
                .read_event()
                .map_err(|e| TrackParseError::malformed(e.to_string(), position))?;

            match event {
                Event::Start(ref e) => {
                    let frame = self.open(e, position)?;
                    self.stack.push(frame);
                }
                Event::Empty(ref e) => {
                    self.open(e, position)?;
                }
                Event::End(_) => {
                    if self.stack.pop().is_none() {
                        return Err(TrackParseError::malformed(
                            "closing tag without matching opening tag",
                            position,
                        ));
                    }
                }
                Event::Text(ref e) => {
                    let text = e
                        .unescape()
                        .map_err(|err| TrackParseError::malformed(err.to_string(), position))?;
                    self.text(&text, position)?;
                }
                Event::CData(ref e) => {
                    let text = String::from_utf8_lossy(e);
                    self.text(&text, position)?;
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions, doctype
                _ => {}
            }
        }

        let position = reader.buffer_position();
        if !self.stack.is_empty() {
            return Err(TrackParseError::malformed(
                format!("document ends with {} unclosed element(s)", self.stack.len()),
                position,
            ));
        }
        if !self.root_seen {
            return Err(TrackParseError::malformed("no root element", position));
        }

        Ok(self.document)
    }

    /// Classify a newly opened element and record any data it carries.
    fn open(&mut self, element: &BytesStart, position: usize) -> Result<Frame> {
        if self.stack.is_empty() {
            if self.root_seen {
                return Err(TrackParseError::malformed("multiple root elements", position));
            }
            self.root_seen = true;
        }

        // Markup inside a captured field only contributes its text
        if self.capture_target().is_some() {
            return Ok(Frame::Other);
        }

        let parent = self.stack.last().copied();
        let frame = match (parent, element.local_name().as_ref()) {
            (_, b"metadata") if self.document.metadata.is_none() => {
                self.document.metadata = Some(RawMetadata::default());
                Frame::Metadata
            }
            (Some(Frame::Metadata), b"name") => Frame::Name,
            (Some(Frame::Metadata), b"desc") => Frame::Desc,
            (_, b"trkseg") => Frame::Segment,
            (Some(Frame::Segment), b"trkpt") => {
                let point = read_point_attributes(element, position)?;
                self.document.points.push(point);
                Frame::Point(self.document.points.len() - 1)
            }
            (Some(Frame::Point(index)), b"ele") => Frame::Elevation(index),
            (Some(Frame::Point(index)), b"time") => Frame::Time(index),
            _ => Frame::Other,
        };
        Ok(frame)
    }

    /// Nearest structural frame, if it is one whose text is collected.
    fn capture_target(&self) -> Option<Frame> {
        self.stack
            .iter()
            .rev()
            .find(|frame| **frame != Frame::Other)
            .copied()
            .filter(|frame| frame.captures_text())
    }

    fn text(&mut self, text: &str, position: usize) -> Result<()> {
        if self.stack.is_empty() {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(TrackParseError::malformed(
                "text outside the root element",
                position,
            ));
        }

        let target = match self.capture_target() {
            Some(Frame::Name) => self.document.metadata.as_mut().map(|m| &mut m.name),
            Some(Frame::Desc) => self.document.metadata.as_mut().map(|m| &mut m.description),
            Some(Frame::Elevation(index)) => {
                self.document.points.get_mut(index).map(|p| &mut p.elevation)
            }
            Some(Frame::Time(index)) => self.document.points.get_mut(index).map(|p| &mut p.time),
            _ => None,
        };
        if let Some(buffer) = target {
            buffer.push_str(text);
        }
        Ok(())
    }
}

fn read_point_attributes(element: &BytesStart, position: usize) -> Result<RawPoint> {
    let mut point = RawPoint {
        latitude: f64::NAN,
        longitude: f64::NAN,
        elevation: String::new(),
        time: String::new(),
    };

    for attr in element.attributes() {
        let attr = attr.map_err(|e| TrackParseError::malformed(e.to_string(), position))?;
        let value = attr
            .unescape_value()
            .map_err(|e| TrackParseError::malformed(e.to_string(), position))?;
        match attr.key.local_name().as_ref() {
            b"lat" => point.latitude = parse_number(&value),
            b"lon" => point.longitude = parse_number(&value),
            _ => {}
        }
    }

    Ok(point)
}
