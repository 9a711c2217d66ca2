//! Error types for the playback engine.

use thiserror::Error;

/// Errors surfaced by playback backends and data loading.
///
/// The manager's command surface never returns these directly; playback
/// failures reach the embedder through the `on_error` callback supplied at
/// registration time.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// IO error while opening a source or reading a data file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source could not be decoded by the backend
    #[error("failed to decode {src}: {reason}")]
    Decode { src: String, reason: String },

    /// No usable audio output device
    #[error("audio device unavailable: {0}")]
    Device(String),

    /// Error reported by the playback backend at runtime
    #[error("backend error: {0}")]
    Backend(String),

    /// Subtitle table could not be parsed
    #[error("invalid subtitle table: {0}")]
    Subtitles(String),
}

/// Result type for backend-facing operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
