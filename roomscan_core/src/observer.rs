//! Session notification surface.
//!
//! Fire-and-forget callbacks delivered from the session's processing
//! task. The session makes no guarantee beyond delivery; observers
//! must return quickly and must not call back into the session.

use roomscan_env::{Anchor, SourceError};

/// Receives session lifecycle and anchor notifications.
///
/// All methods default to no-ops; implement only what you need.
pub trait SessionObserver: Send + Sync + 'static {
    /// A new anchor was added to the registry.
    fn on_anchor_added(&self, _anchor: &Anchor) {}

    /// A tracked anchor's geometry was refined.
    fn on_anchor_updated(&self, _anchor: &Anchor) {}

    /// An anchor was removed from the registry.
    fn on_anchor_removed(&self, _anchor: &Anchor) {}

    /// Tracking failed unrecoverably; the session is now Failed.
    fn on_session_failed(&self, _error: &SourceError) {}

    /// Sensor input was interrupted (e.g. the device was backgrounded).
    fn on_session_interrupted(&self) {}

    /// Sensor input resumed after an interruption.
    fn on_session_interruption_ended(&self) {}
}

/// Observer that ignores every notification.
pub struct NullObserver;

impl SessionObserver for NullObserver {}
