//! # Track Session
//!
//! Owns the currently loaded track for a viewer.
//!
//! File reads complete asynchronously in the host. Each read is registered
//! with [`TrackSession::begin_load`] and finished with
//! [`TrackSession::complete_load`]; a completion whose ticket has been
//! superseded by a newer load is discarded without parsing. A failed load
//! leaves the previously loaded track in place.

use log::{debug, info, warn};
use serde::Serialize;

use crate::error::Result;
use crate::metrics::{find_closest_point, PointSummary, TrackMetrics};
use crate::parser::parse_gpx_bytes_with_config;
use crate::{GpsPoint, Track, TrackConfig};

#[cfg(feature = "parallel")]
use crate::metrics::find_closest_point_parallel;

/// Identifies one load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

/// Result of completing a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The new track replaced the previous one
    Loaded { point_count: usize },
    /// A newer load was started; this result was dropped
    Superseded,
}

/// The point picked for a click on the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointSelection {
    pub index: usize,
    /// Where to anchor the popup
    pub position: GpsPoint,
    pub summary: PointSummary,
}

impl PointSelection {
    /// Popup text for this point.
    pub fn description(&self) -> String {
        self.summary.to_string()
    }

    /// JSON payload for a renderer on the other side of a language boundary.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Holder of the currently loaded track.
#[derive(Debug, Default)]
pub struct TrackSession {
    config: TrackConfig,
    current: Option<Track>,
    generation: u64,
}

impl TrackSession {
    pub fn new(config: TrackConfig) -> Self {
        Self {
            config,
            current: None,
            generation: 0,
        }
    }

    pub fn config(&self) -> &TrackConfig {
        &self.config
    }

    /// Register a new load. Tickets from earlier loads become stale.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        debug!("[Session] Begin load #{}", self.generation);
        LoadTicket {
            generation: self.generation,
        }
    }

    /// Finish a load with the file contents read for `ticket`.
    ///
    /// # Errors
    ///
    /// Returns the parse error if the contents are not a usable GPX
    /// document. The current track is unchanged in that case.
    pub fn complete_load(&mut self, ticket: LoadTicket, bytes: &[u8]) -> Result<LoadOutcome> {
        if ticket.generation != self.generation {
            debug!(
                "[Session] Dropping load #{} (superseded by #{})",
                ticket.generation, self.generation
            );
            return Ok(LoadOutcome::Superseded);
        }

        let track = parse_gpx_bytes_with_config(bytes, &self.config).map_err(|e| {
            warn!("[Session] Load #{} rejected: {}", ticket.generation, e);
            e
        })?;

        let point_count = track.len();
        info!(
            "[Session] Load #{} replaced current track with '{}' ({} points)",
            ticket.generation,
            track.metadata().name,
            point_count
        );
        self.current = Some(track);
        Ok(LoadOutcome::Loaded { point_count })
    }

    /// Begin and complete a load in one step.
    pub fn load(&mut self, bytes: &[u8]) -> Result<LoadOutcome> {
        let ticket = self.begin_load();
        self.complete_load(ticket, bytes)
    }

    pub fn track(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    /// Whether a track is loaded (reloading would discard it).
    pub fn has_track(&self) -> bool {
        self.current.is_some()
    }

    /// Drop the current track and invalidate any pending load.
    pub fn clear(&mut self) -> Option<Track> {
        self.generation += 1;
        self.current.take()
    }

    /// Pick the track point closest to a clicked location.
    ///
    /// Returns `None` when no track is loaded or no point has a comparable
    /// distance to `target`.
    pub fn select_point(&self, target: &GpsPoint) -> Option<PointSelection> {
        let track = self.current.as_ref()?;

        #[cfg(feature = "parallel")]
        let index = if track.len() >= self.config.parallel_threshold {
            find_closest_point_parallel(track, target)
        } else {
            find_closest_point(track, target)
        }?;
        #[cfg(not(feature = "parallel"))]
        let index = find_closest_point(track, target)?;

        let summary = TrackMetrics::new(track).describe_point(index);
        Some(PointSelection {
            index,
            position: track.points()[index].position(),
            summary,
        })
    }
}
