//! Tracking source abstraction for RoomScan sessions.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SourceError;
use crate::types::{SourceConfig, SpatialMap, TrackingEvent};

/// Abstraction over the sensor pipeline that detects anchors.
///
/// # Implementations
///
/// - **Production**: wraps a platform tracking stack
/// - **Simulation/tests**: [`ScriptedSource`](crate::ScriptedSource)
///
/// # Event Flow
///
/// ```text
/// Source                      Channel                  Processing task
///   |                            |                          |
///   |-- Anchor{Added, seq} ----->|                          |
///   |-- Anchor{Updated, seq} --->|-- recv() in order ------>|
///   |                            |                          |
///   |<---------- capture_map() (async, overlapping) --------|
/// ```
///
/// Events are delivered through the sender handed to [`start`]; the
/// consumer relies on channel ordering, so a source must write events
/// in the order it observed them.
///
/// [`start`]: TrackingSource::start
#[async_trait]
pub trait TrackingSource: Send + Sync + 'static {
    /// Configures the source and begins producing events.
    ///
    /// When `config.initial_map` is set, the source re-localizes
    /// against it and re-reports the contained anchors as added.
    ///
    /// # Returns
    /// * `Ok(())` - the source is running and will write to `events`
    /// * `Err(SourceError::Unavailable)` - no tracking hardware
    /// * `Err(SourceError::UnsupportedConfiguration)` - config rejected
    async fn start(
        &self,
        config: SourceConfig,
        events: mpsc::UnboundedSender<TrackingEvent>,
    ) -> Result<(), SourceError>;

    /// Suspends event production without discarding tracking state.
    async fn pause(&self) -> Result<(), SourceError>;

    /// Resumes event production after a pause.
    ///
    /// When `seed` is given, the source re-localizes against it before
    /// resuming, re-reporting the seeded anchors.
    async fn resume(&self, seed: Option<SpatialMap>) -> Result<(), SourceError>;

    /// Stops the source and releases sensor resources.
    async fn stop(&self);

    /// Captures the current tracking map.
    ///
    /// Asynchronous relative to event production: overlapping requests
    /// are permitted and may complete in any order.
    async fn capture_map(&self) -> Result<SpatialMap, SourceError>;
}
