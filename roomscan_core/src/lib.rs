//! RoomScan Core - Spatial-Tracking Session Engine
//!
//! This library manages a live spatial-tracking session over an
//! abstract sensor source:
//! 1. **Lifecycle**: Idle/Running/Paused/Failed state machine with
//!    explicit, recoverable transition errors
//! 2. **Anchors**: a single-consumer registry of planar surfaces with
//!    per-id ordering and geometry validation
//! 3. **Persistence**: opportunistic world-map captures cached with
//!    last-completion-wins semantics and saved atomically to disk

pub mod anchors;
pub mod config;
pub mod observer;
pub mod session;
pub mod snapshot;
pub mod store;

// Re-export key types for convenience
pub use anchors::{AnchorError, AnchorOutcome, AnchorProcessor};
pub use config::{CapturePolicy, SessionConfig};
pub use observer::{NullObserver, SessionObserver};
pub use session::{SessionController, SessionError, SessionState};
pub use snapshot::MapSnapshotCache;
pub use store::{LoadError, SaveError, WorldMapStore};
