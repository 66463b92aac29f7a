//! Error taxonomy for the PDSC engine.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the PDSC query engine and ingest pipeline.
///
/// Every variant carries a stable machine-readable code (see
/// [`Error::code`]) so remote callers can dispatch without parsing
/// messages. Geometric primitives never construct these; they return
/// structured results instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no index for instrument '{instrument}'")]
    UnknownInstrument { instrument: String },

    #[error("observation '{observation_id}' not found for instrument '{instrument}'")]
    UnknownObservation {
        instrument: String,
        observation_id: String,
    },

    #[error("bad query: {reason}")]
    BadQuery { reason: String },

    #[error("index file {path} is corrupt: {detail}")]
    IndexCorrupt { path: PathBuf, detail: String },

    #[error("no localizer registered for instrument '{instrument}': {reason}")]
    LocalizerUnavailable { instrument: String, reason: String },

    #[error("observation '{observation_id}' has no valid segments")]
    DegenerateSegment { observation_id: String },

    #[error("query cancelled")]
    Cancelled,

    #[error("configuration error: {reason}")]
    Config { reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn bad_query(reason: impl Into<String>) -> Error {
        Error::BadQuery {
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Error {
        Error::Config {
            reason: reason.into(),
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, detail: impl Into<String>) -> Error {
        Error::IndexCorrupt {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Stable error code for machine consumption.
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnknownInstrument { .. } => "unknown-instrument",
            Error::UnknownObservation { .. } => "unknown-observation",
            Error::BadQuery { .. } => "bad-query",
            Error::IndexCorrupt { .. } => "index-corrupt",
            Error::LocalizerUnavailable { .. } => "localizer-unavailable",
            Error::DegenerateSegment { .. } => "degenerate-segment",
            Error::Cancelled => "cancelled",
            Error::Config { .. } => "config",
            Error::Storage(_) => "storage",
            Error::Io(_) => "io",
        }
    }
}
