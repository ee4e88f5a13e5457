//! Error types for the RoomScan environment abstraction.

use thiserror::Error;

/// Errors reported by a tracking source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Tracking hardware is not available on this device.
    #[error("tracking hardware unavailable")]
    Unavailable,

    /// The requested configuration cannot be honored.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// An operation requires a running source.
    #[error("source is not running")]
    NotRunning,

    /// A map capture request could not be fulfilled.
    #[error("map capture failed: {0}")]
    CaptureFailed(String),

    /// A resume seed could not be understood by the source.
    #[error("resume seed rejected: {0}")]
    SeedRejected(String),

    /// Tracking was lost and cannot recover.
    #[error("tracking lost: {0}")]
    TrackingLost(String),
}

impl SourceError {
    /// Creates an unsupported-configuration error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedConfiguration(msg.into())
    }

    /// Creates a capture-failed error.
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::CaptureFailed(msg.into())
    }
}
