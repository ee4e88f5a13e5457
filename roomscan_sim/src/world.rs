//! Ground-truth room model for simulation.
//!
//! The model is the "physical room" a scenario scans: it owns the true
//! plane set, generated deterministically from a seed, and produces the
//! anchors a scripted source reports. Scenarios compare the session's
//! registry against this ground truth.

use std::collections::HashMap;
use std::f64::consts::FRAC_PI_2;

use nalgebra::{Matrix4, Rotation3, Vector2, Vector3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use roomscan_env::{Anchor, AnchorId};

/// Deterministic generator of planar surfaces.
pub struct RoomModel {
    /// RNG for surface placement (seeded)
    rng: ChaCha8Rng,

    /// True plane set, keyed by anchor id
    planes: HashMap<AnchorId, Anchor>,

    /// Next id seed
    next_id: u64,
}

impl RoomModel {
    /// Creates a room model with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            planes: HashMap::new(),
            next_id: 0,
        }
    }

    /// Spawns a horizontal surface (floor or table top).
    pub fn spawn_horizontal(&mut self) -> Anchor {
        let position = Vector3::new(
            self.rng.gen_range(-5.0..5.0),
            self.rng.gen_range(0.0..1.2),
            self.rng.gen_range(-5.0..5.0),
        );
        let extent = Vector2::new(
            self.rng.gen_range(0.4..3.0),
            self.rng.gen_range(0.4..3.0),
        );
        let anchor = Anchor::horizontal_plane(self.next_anchor_id(), position, extent);
        self.planes.insert(anchor.id, anchor.clone());
        anchor
    }

    /// Spawns a vertical surface (wall segment).
    pub fn spawn_vertical(&mut self) -> Anchor {
        let mut transform: Matrix4<f64> =
            Rotation3::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2).to_homogeneous();
        transform[(0, 3)] = self.rng.gen_range(-5.0..5.0);
        transform[(1, 3)] = self.rng.gen_range(0.5..2.5);
        transform[(2, 3)] = self.rng.gen_range(-5.0..5.0);

        let extent = Vector2::new(
            self.rng.gen_range(0.5..4.0),
            self.rng.gen_range(0.5..2.5),
        );
        let anchor = Anchor::plane(self.next_anchor_id(), transform, Vector3::zeros(), extent);
        self.planes.insert(anchor.id, anchor.clone());
        anchor
    }

    /// Grows a surface's extent, as refinement during a scan would.
    ///
    /// Returns the updated anchor, or None if the id is unknown.
    pub fn grow(&mut self, id: AnchorId) -> Option<Anchor> {
        let factor = self.rng.gen_range(1.1..1.5);
        let anchor = self.planes.get_mut(&id)?;
        anchor.extent *= factor;
        Some(anchor.clone())
    }

    /// Removes a surface from the room.
    pub fn remove(&mut self, id: AnchorId) -> Option<Anchor> {
        self.planes.remove(&id)
    }

    /// Ids of all surfaces currently in the room.
    pub fn plane_ids(&self) -> Vec<AnchorId> {
        let mut ids: Vec<AnchorId> = self.planes.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Number of surfaces in the room.
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    fn next_anchor_id(&mut self) -> AnchorId {
        self.next_id += 1;
        // Mix the rng stream in so different seeds give different ids.
        AnchorId::from_seed(self.next_id.wrapping_mul(0x9e3779b97f4a7c15) ^ self.rng.gen::<u64>())
    }
}
