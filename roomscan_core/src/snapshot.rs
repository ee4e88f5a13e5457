//! Cache of the most recent world-map capture.
//!
//! The cache is owned by the session's processing task; everything
//! else observes it through the watch channel, which only ever carries
//! completed captures. Completions are applied in the order they reach
//! the processing task, so the retained capture is the one that
//! completed last - even when an earlier-issued request finishes after
//! a later-issued one.

use roomscan_env::SpatialMap;
use tokio::sync::watch;

/// Holds the latest completed capture and request bookkeeping.
pub struct MapSnapshotCache {
    latest: watch::Sender<Option<SpatialMap>>,
    issued: u64,
    completed: u64,
}

impl MapSnapshotCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            latest,
            issued: 0,
            completed: 0,
        }
    }

    /// Subscribes to the published capture.
    ///
    /// The receiver outlives the cache and keeps the last published
    /// value after the owning task exits.
    pub fn subscribe(&self) -> watch::Receiver<Option<SpatialMap>> {
        self.latest.subscribe()
    }

    /// Records a capture request being issued. Returns its ticket.
    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Stores a completed capture, replacing any previous one.
    pub fn store(&mut self, map: SpatialMap) {
        self.completed += 1;
        self.latest.send_replace(Some(map));
    }

    /// The latest completed capture, if any.
    pub fn latest(&self) -> Option<SpatialMap> {
        self.latest.borrow().clone()
    }

    /// Capture requests issued so far.
    pub fn issued_count(&self) -> u64 {
        self.issued
    }

    /// Captures completed and stored so far.
    pub fn completed_count(&self) -> u64 {
        self.completed
    }
}

impl Default for MapSnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}
