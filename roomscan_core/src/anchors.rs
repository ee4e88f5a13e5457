//! Anchor registry and scene-instruction emission.
//!
//! The processor consumes the anchor event stream and maintains the
//! authoritative registry keyed by anchor id. Each applied event yields
//! the scene instruction the renderer needs to mirror the change.
//!
//! Per-id ordering: anchor events carry the source's monotonic sequence
//! number. The processor remembers the highest sequence applied per id
//! (kept across removal, since ids are never reused) and drops any
//! event older than it, so reordered delivery can never resurrect a
//! removed anchor or roll geometry backwards.

use std::collections::HashMap;

use nalgebra::Matrix3;

use roomscan_env::{Anchor, AnchorEventKind, AnchorId, SceneInstruction};

/// Transforms with a linear part below this determinant are considered
/// collapsed.
const MIN_TRANSFORM_DET: f64 = 1e-9;

/// Errors raised for malformed anchor geometry.
///
/// The offending event is dropped; the registry is unaffected.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnchorError {
    /// The pose contains NaN or infinite components.
    #[error("anchor {id} transform contains non-finite values")]
    NonFiniteTransform {
        /// Offending anchor.
        id: AnchorId,
    },

    /// The pose collapses space (near-zero determinant).
    #[error("anchor {id} transform is degenerate (det {determinant:.3e})")]
    DegenerateTransform {
        /// Offending anchor.
        id: AnchorId,
        /// Determinant of the linear part.
        determinant: f64,
    },

    /// The patch center contains non-finite components.
    #[error("anchor {id} center contains non-finite values")]
    NonFiniteCenter {
        /// Offending anchor.
        id: AnchorId,
    },

    /// The patch extent is non-finite or negative.
    #[error("anchor {id} has invalid extent ({width}, {depth})")]
    InvalidExtent {
        /// Offending anchor.
        id: AnchorId,
        /// Reported width.
        width: f64,
        /// Reported depth.
        depth: f64,
    },
}

/// Result of applying one anchor event.
#[derive(Debug, Clone, PartialEq)]
pub enum AnchorOutcome {
    /// The registry changed; forward this instruction to the renderer.
    Applied(SceneInstruction),

    /// The event arrived out of order for its id and was dropped.
    Stale,
}

/// The authoritative anchor registry.
pub struct AnchorProcessor {
    /// Active anchors, keyed by id.
    registry: HashMap<AnchorId, Anchor>,

    /// Highest applied sequence per id, retained across removal.
    last_seq: HashMap<AnchorId, u64>,

    /// Events applied since creation.
    applied: u64,

    /// Events dropped as stale since creation.
    stale: u64,
}

impl AnchorProcessor {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            registry: HashMap::new(),
            last_seq: HashMap::new(),
            applied: 0,
            stale: 0,
        }
    }

    /// Applies one anchor event.
    ///
    /// Added and Updated upsert by id; replaying the same event twice
    /// leaves the registry identical to applying it once. Removed
    /// deletes the entry; removing an unknown id is a no-op apart from
    /// the emitted instruction.
    pub fn apply(
        &mut self,
        kind: AnchorEventKind,
        seq: u64,
        anchor: &Anchor,
    ) -> Result<AnchorOutcome, AnchorError> {
        if matches!(kind, AnchorEventKind::Added | AnchorEventKind::Updated) {
            validate_geometry(anchor)?;
        }

        if let Some(&last) = self.last_seq.get(&anchor.id) {
            if seq < last {
                self.stale += 1;
                return Ok(AnchorOutcome::Stale);
            }
        }
        self.last_seq.insert(anchor.id, seq);
        self.applied += 1;

        let instruction = match kind {
            AnchorEventKind::Added | AnchorEventKind::Updated => {
                self.registry.insert(anchor.id, anchor.clone());
                SceneInstruction::UpsertPlane {
                    id: anchor.id,
                    transform: anchor.transform,
                    center: anchor.center,
                    extent: anchor.extent,
                }
            }
            AnchorEventKind::Removed => {
                self.registry.remove(&anchor.id);
                SceneInstruction::RemoveNode { id: anchor.id }
            }
        };

        Ok(AnchorOutcome::Applied(instruction))
    }

    /// Returns the anchor for `id`, if tracked.
    pub fn get(&self, id: &AnchorId) -> Option<&Anchor> {
        self.registry.get(id)
    }

    /// Returns true if `id` is currently tracked.
    pub fn contains(&self, id: &AnchorId) -> bool {
        self.registry.contains_key(id)
    }

    /// Returns a snapshot of all tracked anchors.
    pub fn anchors(&self) -> Vec<Anchor> {
        self.registry.values().cloned().collect()
    }

    /// Number of tracked anchors.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Returns true if no anchors are tracked.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Events applied since creation.
    pub fn applied_events(&self) -> u64 {
        self.applied
    }

    /// Events dropped as stale since creation.
    pub fn stale_events(&self) -> u64 {
        self.stale
    }
}

impl Default for AnchorProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_geometry(anchor: &Anchor) -> Result<(), AnchorError> {
    if !anchor.transform.iter().all(|v| v.is_finite()) {
        return Err(AnchorError::NonFiniteTransform { id: anchor.id });
    }

    let linear: Matrix3<f64> = anchor.transform.fixed_view::<3, 3>(0, 0).into();
    let determinant = linear.determinant();
    if determinant.abs() < MIN_TRANSFORM_DET {
        return Err(AnchorError::DegenerateTransform {
            id: anchor.id,
            determinant,
        });
    }

    if !anchor.center.iter().all(|v| v.is_finite()) {
        return Err(AnchorError::NonFiniteCenter { id: anchor.id });
    }

    let (width, depth) = (anchor.extent.x, anchor.extent.y);
    if !width.is_finite() || !depth.is_finite() || width < 0.0 || depth < 0.0 {
        return Err(AnchorError::InvalidExtent {
            id: anchor.id,
            width,
            depth,
        });
    }

    Ok(())
}
