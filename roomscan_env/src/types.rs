//! Common types for the RoomScan environment abstraction.

use nalgebra::{Matrix4, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a detected anchor.
///
/// Uses UUID v4. An id is unique for the lifetime of the session that
/// produced it and is never reused for a different surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnchorId(pub Uuid);

impl AnchorId {
    /// Creates a new random AnchorId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an AnchorId from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Creates a deterministic AnchorId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AnchorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AnchorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// The category of surface an anchor represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnchorKind {
    /// A planar surface (floor, table, wall).
    Plane,
}

/// A detected physical reference point.
///
/// Anchors are keyed by [`AnchorId`]; the geometric fields describe a
/// planar patch local to `transform`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// Stable identity, unique per producing session.
    pub id: AnchorId,

    /// Surface category.
    pub kind: AnchorKind,

    /// Rigid/affine pose of the anchor in world space.
    pub transform: Matrix4<f64>,

    /// Center of the surface patch, local to `transform`.
    pub center: Vector3<f64>,

    /// Width/depth of the surface patch in meters.
    pub extent: Vector2<f64>,
}

impl Anchor {
    /// Creates a plane anchor from its geometric fields.
    pub fn plane(
        id: AnchorId,
        transform: Matrix4<f64>,
        center: Vector3<f64>,
        extent: Vector2<f64>,
    ) -> Self {
        Self {
            id,
            kind: AnchorKind::Plane,
            transform,
            center,
            extent,
        }
    }

    /// Creates a horizontal plane anchor sitting at `position`.
    ///
    /// Convenience for tests and simulation: the pose is a pure
    /// translation, the patch is centered on the anchor origin.
    pub fn horizontal_plane(id: AnchorId, position: Vector3<f64>, extent: Vector2<f64>) -> Self {
        Self::plane(
            id,
            Matrix4::new_translation(&position),
            Vector3::zeros(),
            extent,
        )
    }
}

/// Which anchor lifecycle change an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorEventKind {
    /// First detection of a surface.
    Added,
    /// Refined geometry for a known surface.
    Updated,
    /// The surface is no longer tracked.
    Removed,
}

/// An event delivered by a [`TrackingSource`](crate::TrackingSource).
///
/// Anchor events carry a per-source monotonic sequence number so the
/// consumer can detect reordered delivery for a given anchor id.
#[derive(Debug, Clone)]
pub enum TrackingEvent {
    /// An anchor was added, updated, or removed.
    Anchor {
        /// Lifecycle change being reported.
        kind: AnchorEventKind,
        /// Monotonic sequence number assigned by the source.
        seq: u64,
        /// The anchor as observed at event time.
        anchor: Anchor,
    },

    /// Unrecoverable tracking failure; the session cannot continue.
    Failure(crate::SourceError),

    /// Sensor input is temporarily unavailable.
    Interrupted,

    /// Sensor input resumed after an interruption.
    InterruptionEnded,
}

/// An opaque capture of accumulated tracking state.
///
/// The payload is produced and consumed by the tracking source; the
/// core treats it as bytes plus metadata. A capture is immutable - a
/// newer capture replaces, never mutates, an older one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialMap {
    /// Capture timestamp in milliseconds (source clock).
    pub captured_at_ms: u64,

    /// Number of anchors contained in the capture.
    pub anchor_count: u32,

    /// The raw serialized tracking state.
    pub payload: Vec<u8>,
}

impl SpatialMap {
    /// Creates a capture from payload bytes and metadata.
    pub fn new(payload: Vec<u8>, captured_at_ms: u64, anchor_count: u32) -> Self {
        Self {
            captured_at_ms,
            anchor_count,
            payload,
        }
    }

    /// Returns the payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// Which plane orientations the source reports as anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaneDetection {
    /// Plane detection disabled.
    None,
    /// Horizontal surfaces only (floors, tables).
    Horizontal,
    /// Vertical surfaces only (walls).
    Vertical,
    /// Both orientations.
    Both,
}

impl PlaneDetection {
    /// Returns true if a source supporting `self` can honor `requested`.
    pub fn supports(self, requested: PlaneDetection) -> bool {
        match (self, requested) {
            (_, PlaneDetection::None) => true,
            (PlaneDetection::Both, _) => true,
            (PlaneDetection::Horizontal, PlaneDetection::Horizontal) => true,
            (PlaneDetection::Vertical, PlaneDetection::Vertical) => true,
            _ => false,
        }
    }
}

/// Whether the source should estimate environment textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentTexturing {
    /// No texture estimation.
    None,
    /// The source decides when to generate texture updates.
    Automatic,
}

/// Configuration handed to a tracking source on start.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Enable sensor autofocus.
    pub auto_focus: bool,

    /// Plane orientations to report.
    pub plane_detection: PlaneDetection,

    /// Environment texture estimation mode.
    pub environment_texturing: EnvironmentTexturing,

    /// Seed map for re-localization against a prior session.
    pub initial_map: Option<SpatialMap>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            auto_focus: true,
            plane_detection: PlaneDetection::Horizontal,
            environment_texturing: EnvironmentTexturing::Automatic,
            initial_map: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_id_from_seed_deterministic() {
        assert_eq!(AnchorId::from_seed(7), AnchorId::from_seed(7));
        assert_ne!(AnchorId::from_seed(7), AnchorId::from_seed(8));
    }

    #[test]
    fn test_plane_detection_support_matrix() {
        use PlaneDetection::*;

        assert!(Both.supports(Horizontal));
        assert!(Both.supports(Vertical));
        assert!(Both.supports(Both));
        assert!(Horizontal.supports(Horizontal));
        assert!(Horizontal.supports(None));
        assert!(!Horizontal.supports(Vertical));
        assert!(!Horizontal.supports(Both));
        assert!(!Vertical.supports(Horizontal));
        assert!(None.supports(None));
        assert!(!None.supports(Horizontal));
    }

    #[test]
    fn test_horizontal_plane_pose() {
        let position = Vector3::new(1.0, 0.0, -2.0);
        let anchor = Anchor::horizontal_plane(
            AnchorId::from_seed(1),
            position,
            Vector2::new(2.0, 1.0),
        );

        assert_eq!(anchor.kind, AnchorKind::Plane);
        assert_eq!(anchor.transform.fixed_view::<3, 1>(0, 3).into_owned(), position);
        assert_eq!(anchor.center, Vector3::zeros());
    }
}
