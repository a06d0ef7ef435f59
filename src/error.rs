//! Error handling for track loading.
//!
//! Only whole-document problems are errors. Field-level problems inside an
//! otherwise valid `<trkpt>` (bad numbers, unparseable times) are carried
//! into the data model as NaN / `None` instead.

use thiserror::Error;

/// Reasons a GPX document cannot become a [`Track`](crate::Track).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackParseError {
    /// Input is not well-formed XML
    #[error("Invalid XML at byte {position}: {message}")]
    MalformedXml { message: String, position: usize },
    /// Well-formed XML without a single `<trkpt>` inside a `<trkseg>`
    #[error("No points. Malformed GPX?")]
    NoTrackPoints,
}

impl TrackParseError {
    pub(crate) fn malformed(message: impl Into<String>, position: usize) -> Self {
        TrackParseError::MalformedXml {
            message: message.into(),
            position,
        }
    }

    /// Explanatory text to show the user when a load is rejected.
    pub fn user_message(&self) -> &'static str {
        match self {
            TrackParseError::MalformedXml { .. } => {
                "Invalid XML. You should check if this is actually a GPX file."
            }
            TrackParseError::NoTrackPoints => "No points. Malformed GPX?",
        }
    }
}

/// Result type alias for track loading.
pub type Result<T> = std::result::Result<T, TrackParseError>;
