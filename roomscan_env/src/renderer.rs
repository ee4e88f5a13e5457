//! Scene renderer abstraction.
//!
//! The core never draws; it emits [`SceneInstruction`]s describing node
//! changes and a renderer implementation consumes them. Instructions
//! carry copies of the anchor's geometric fields, so a consumer never
//! observes an anchor that is still being mutated by the session.

use std::sync::Mutex;

use nalgebra::{Matrix4, Vector2, Vector3};

use crate::types::AnchorId;

/// A single fire-and-forget geometry update for the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneInstruction {
    /// Create or update the node for an anchor.
    UpsertPlane {
        /// Anchor the node belongs to.
        id: AnchorId,
        /// World-space pose of the node.
        transform: Matrix4<f64>,
        /// Patch center, local to `transform`.
        center: Vector3<f64>,
        /// Patch width/depth in meters.
        extent: Vector2<f64>,
    },

    /// Remove the node for an anchor.
    RemoveNode {
        /// Anchor whose node should be removed.
        id: AnchorId,
    },
}

impl SceneInstruction {
    /// Returns the anchor id the instruction targets.
    pub fn anchor_id(&self) -> AnchorId {
        match self {
            SceneInstruction::UpsertPlane { id, .. } => *id,
            SceneInstruction::RemoveNode { id } => *id,
        }
    }
}

/// Consumer of scene instructions.
///
/// Implementations must tolerate redundant instructions: an upsert for
/// an existing node updates it, a remove for a missing node is a no-op.
pub trait SceneRenderer: Send + Sync + 'static {
    /// Applies one instruction. Must not block.
    fn apply(&self, instruction: SceneInstruction);
}

/// Renderer double that records every instruction it receives.
///
/// Used by the sim harness and unit tests to assert on the emitted
/// node updates.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    instructions: Mutex<Vec<SceneInstruction>>,
}

impl RecordingRenderer {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything applied so far.
    pub fn instructions(&self) -> Vec<SceneInstruction> {
        self.instructions.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of instructions applied.
    pub fn len(&self) -> usize {
        self.instructions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns true if nothing was applied yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SceneRenderer for RecordingRenderer {
    fn apply(&self, instruction: SceneInstruction) {
        self.instructions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(instruction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_renderer_order() {
        let renderer = RecordingRenderer::new();
        let a = AnchorId::from_seed(1);
        let b = AnchorId::from_seed(2);

        renderer.apply(SceneInstruction::UpsertPlane {
            id: a,
            transform: Matrix4::identity(),
            center: Vector3::zeros(),
            extent: Vector2::new(1.0, 1.0),
        });
        renderer.apply(SceneInstruction::RemoveNode { id: b });

        let recorded = renderer.instructions();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].anchor_id(), a);
        assert_eq!(recorded[1].anchor_id(), b);
    }
}
