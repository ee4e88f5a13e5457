//! Deterministic in-process tracking source for tests and simulation.
//!
//! `ScriptedSource` plays the role of the sensor pipeline: the test (or
//! sim harness) is the "physical world" and drives detections by hand.
//! Captures encode the currently tracked plane set, so a map saved from
//! one scripted run can seed re-localization in another.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::error::SourceError;
use crate::source::TrackingSource;
use crate::types::{
    Anchor, AnchorEventKind, AnchorId, PlaneDetection, SourceConfig, SpatialMap, TrackingEvent,
};

/// How the scripted source completes `capture_map` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Complete immediately with the current plane set.
    Immediate,
    /// Complete after a fixed delay.
    Delayed(Duration),
    /// Park requests until the driver releases them, in any order.
    Manual,
}

/// A capture request that could not complete under the lock.
enum DeferredCapture {
    /// Parked until the driver releases it.
    Parked(oneshot::Receiver<Result<SpatialMap, SourceError>>),
    /// Completes after a delay.
    Sleep(Duration),
}

struct ScriptedInner {
    capabilities: PlaneDetection,
    available: bool,
    capture_mode: CaptureMode,
    fail_next_capture: bool,
    events: Option<mpsc::UnboundedSender<TrackingEvent>>,
    running: bool,
    paused: bool,
    /// Ground-truth plane set, ordered by id for deterministic payloads.
    planes: BTreeMap<AnchorId, Anchor>,
    next_seq: u64,
    clock_ms: u64,
    pending_captures: VecDeque<oneshot::Sender<Result<SpatialMap, SourceError>>>,
    capture_requests: u64,
}

/// A hand-driven [`TrackingSource`].
///
/// Clone the source to keep a driver handle: one clone goes to the
/// session, the other stays with the test to emit detections, inject
/// failures, and release parked captures.
#[derive(Clone)]
pub struct ScriptedSource {
    inner: Arc<Mutex<ScriptedInner>>,
}

impl std::fmt::Debug for ScriptedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ScriptedSource")
            .field("running", &inner.running)
            .field("paused", &inner.paused)
            .field("planes", &inner.planes.len())
            .finish()
    }
}

impl ScriptedSource {
    /// Creates an available source supporting both plane orientations,
    /// completing captures immediately.
    pub fn new() -> Self {
        Self::with_capabilities(PlaneDetection::Both)
    }

    /// Creates a source that only supports the given plane detection.
    pub fn with_capabilities(capabilities: PlaneDetection) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScriptedInner {
                capabilities,
                available: true,
                capture_mode: CaptureMode::Immediate,
                fail_next_capture: false,
                events: None,
                running: false,
                paused: false,
                planes: BTreeMap::new(),
                next_seq: 0,
                clock_ms: 0,
                pending_captures: VecDeque::new(),
                capture_requests: 0,
            })),
        }
    }

    /// Creates a source whose hardware is absent: `start` always fails.
    pub fn unavailable() -> Self {
        let source = Self::new();
        source.lock().available = false;
        source
    }

    fn lock(&self) -> MutexGuard<'_, ScriptedInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Switches how subsequent capture requests complete.
    pub fn set_capture_mode(&self, mode: CaptureMode) {
        self.lock().capture_mode = mode;
    }

    /// Makes the next capture request fail with an injected error.
    pub fn fail_next_capture(&self) {
        self.lock().fail_next_capture = true;
    }

    /// Reports a newly detected plane.
    pub fn emit_added(&self, anchor: Anchor) {
        let mut inner = self.lock();
        if !inner.running {
            return;
        }
        inner.planes.insert(anchor.id, anchor.clone());
        send_anchor_event(&mut inner, AnchorEventKind::Added, anchor);
    }

    /// Reports refined geometry for a known plane.
    pub fn emit_updated(&self, anchor: Anchor) {
        let mut inner = self.lock();
        if !inner.running {
            return;
        }
        inner.planes.insert(anchor.id, anchor.clone());
        send_anchor_event(&mut inner, AnchorEventKind::Updated, anchor);
    }

    /// Reports that a plane is no longer tracked.
    pub fn emit_removed(&self, id: AnchorId) {
        let mut inner = self.lock();
        if !inner.running {
            return;
        }
        if let Some(anchor) = inner.planes.remove(&id) {
            send_anchor_event(&mut inner, AnchorEventKind::Removed, anchor);
        }
    }

    /// Delivers a raw anchor event with an explicit sequence number.
    ///
    /// Bypasses ground-truth bookkeeping; used to exercise reordered
    /// delivery in consumers.
    pub fn emit_anchor_raw(&self, kind: AnchorEventKind, seq: u64, anchor: Anchor) {
        let inner = self.lock();
        if let Some(events) = &inner.events {
            let _ = events.send(TrackingEvent::Anchor { kind, seq, anchor });
        }
    }

    /// Signals a temporary sensor interruption.
    pub fn interrupt(&self) {
        let inner = self.lock();
        if let Some(events) = &inner.events {
            let _ = events.send(TrackingEvent::Interrupted);
        }
    }

    /// Signals the end of an interruption.
    pub fn end_interruption(&self) {
        let inner = self.lock();
        if let Some(events) = &inner.events {
            let _ = events.send(TrackingEvent::InterruptionEnded);
        }
    }

    /// Reports an unrecoverable tracking failure.
    pub fn fail(&self, error: SourceError) {
        let inner = self.lock();
        if let Some(events) = &inner.events {
            let _ = events.send(TrackingEvent::Failure(error));
        }
    }

    /// Number of capture requests currently parked (Manual mode).
    pub fn pending_capture_count(&self) -> usize {
        self.lock().pending_captures.len()
    }

    /// Total capture requests received since creation.
    pub fn capture_requests(&self) -> u64 {
        self.lock().capture_requests
    }

    /// Completes the oldest parked capture with the current plane set.
    ///
    /// Returns false if nothing was parked.
    pub fn release_next_capture(&self) -> bool {
        let mut inner = self.lock();
        match inner.pending_captures.pop_front() {
            Some(tx) => {
                let snapshot = snapshot_locked(&mut inner);
                let _ = tx.send(snapshot);
                true
            }
            None => false,
        }
    }

    /// Completes the parked capture at `index` with an explicit result.
    ///
    /// Index 0 is the oldest request. Returns false if out of range.
    pub fn release_capture(&self, index: usize, result: Result<SpatialMap, SourceError>) -> bool {
        let mut inner = self.lock();
        match inner.pending_captures.remove(index) {
            Some(tx) => {
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }

    /// Number of planes the source currently tracks.
    pub fn plane_count(&self) -> usize {
        self.lock().planes.len()
    }

    /// Returns true if the source is started and not stopped.
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Returns true if the source is paused.
    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

fn send_anchor_event(inner: &mut ScriptedInner, kind: AnchorEventKind, anchor: Anchor) {
    inner.next_seq += 1;
    let seq = inner.next_seq;
    if let Some(events) = &inner.events {
        let _ = events.send(TrackingEvent::Anchor { kind, seq, anchor });
    }
}

fn snapshot_locked(inner: &mut ScriptedInner) -> Result<SpatialMap, SourceError> {
    inner.clock_ms += 1;
    let planes: Vec<Anchor> = inner.planes.values().cloned().collect();
    let payload = bincode::serialize(&planes)
        .map_err(|e| SourceError::capture(format!("failed to encode plane set: {}", e)))?;
    Ok(SpatialMap::new(payload, inner.clock_ms, planes.len() as u32))
}

fn replay_seed(inner: &mut ScriptedInner, seed: &SpatialMap) -> Result<(), SourceError> {
    let planes: Vec<Anchor> = bincode::deserialize(&seed.payload)
        .map_err(|e| SourceError::SeedRejected(format!("undecodable payload: {}", e)))?;
    for anchor in planes {
        inner.planes.insert(anchor.id, anchor.clone());
        send_anchor_event(inner, AnchorEventKind::Added, anchor);
    }
    Ok(())
}

#[async_trait]
impl TrackingSource for ScriptedSource {
    async fn start(
        &self,
        config: SourceConfig,
        events: mpsc::UnboundedSender<TrackingEvent>,
    ) -> Result<(), SourceError> {
        let mut inner = self.lock();
        if !inner.available {
            return Err(SourceError::Unavailable);
        }
        if !inner.capabilities.supports(config.plane_detection) {
            return Err(SourceError::unsupported(format!(
                "plane detection {:?} exceeds source capability {:?}",
                config.plane_detection, inner.capabilities
            )));
        }

        inner.planes.clear();
        inner.running = true;
        inner.paused = false;
        inner.events = Some(events);

        if let Some(seed) = &config.initial_map {
            replay_seed(&mut inner, seed)?;
        }
        Ok(())
    }

    async fn pause(&self) -> Result<(), SourceError> {
        let mut inner = self.lock();
        if !inner.running {
            return Err(SourceError::NotRunning);
        }
        inner.paused = true;
        Ok(())
    }

    async fn resume(&self, seed: Option<SpatialMap>) -> Result<(), SourceError> {
        let mut inner = self.lock();
        if !inner.running {
            return Err(SourceError::NotRunning);
        }
        inner.paused = false;
        if let Some(seed) = &seed {
            replay_seed(&mut inner, seed)?;
        }
        Ok(())
    }

    async fn stop(&self) {
        let mut inner = self.lock();
        inner.running = false;
        inner.paused = false;
        inner.events = None;
        inner.planes.clear();
        // Parked captures are abandoned; awaiting callers see a
        // capture-failed error.
        inner.pending_captures.clear();
    }

    async fn capture_map(&self) -> Result<SpatialMap, SourceError> {
        let deferred = {
            let mut inner = self.lock();
            if !inner.running {
                return Err(SourceError::NotRunning);
            }
            inner.capture_requests += 1;
            if inner.fail_next_capture {
                inner.fail_next_capture = false;
                return Err(SourceError::capture("injected capture failure"));
            }
            match inner.capture_mode {
                CaptureMode::Immediate => return snapshot_locked(&mut inner),
                CaptureMode::Delayed(delay) => DeferredCapture::Sleep(delay),
                CaptureMode::Manual => {
                    let (tx, rx) = oneshot::channel();
                    inner.pending_captures.push_back(tx);
                    DeferredCapture::Parked(rx)
                }
            }
        };

        match deferred {
            DeferredCapture::Parked(rx) => rx
                .await
                .unwrap_or_else(|_| Err(SourceError::capture("capture abandoned"))),
            DeferredCapture::Sleep(delay) => {
                tokio::time::sleep(delay).await;
                let mut inner = self.lock();
                if !inner.running {
                    return Err(SourceError::NotRunning);
                }
                snapshot_locked(&mut inner)
            }
        }
    }
}
