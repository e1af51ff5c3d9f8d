//! Half-space boundary planes and the runtime-selectable plane sets.
//!
//! The domain boundary is a small ordered set of planes `(normal, d)` with
//! the inside defined by `dot(normal, p) + d >= 0`. Two fixed sets exist: a
//! closed box (6 planes from the domain corners) and an open ground (ground
//! plane plus a high ceiling sentinel). Exactly one set is active at a time
//! and the selection may be swapped between frames.

use serde::{Deserialize, Serialize};

/// Which fixed plane set is active. Configuration spells the variants
/// `closed-box` and `open-ground`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryMode {
    /// Six planes enclosing the configured domain box.
    ClosedBox,
    /// Ground plane at the domain floor plus a ceiling sentinel far above;
    /// the sides are open.
    OpenGround,
}

/// A half-space plane. Points with `dot(normal, p) + d >= 0` are inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit inward normal.
    pub normal: [f32; 3],
    /// Plane offset.
    pub d: f32,
}

impl Plane {
    /// Plane through `point` with inward normal `normal`.
    pub fn from_point_normal(point: [f32; 3], normal: [f32; 3]) -> Self {
        let d = -(normal[0] * point[0] + normal[1] * point[1] + normal[2] * point[2]);
        Self { normal, d }
    }

    /// Signed distance of a position to the plane; negative is outside.
    #[inline]
    pub fn signed_distance(&self, pos: &[f32; 4]) -> f32 {
        self.normal[0] * pos[0] + self.normal[1] * pos[1] + self.normal[2] * pos[2] + self.d
    }
}

/// Height of the open-ground ceiling sentinel above the domain floor.
const OPEN_GROUND_CEILING: f32 = 100.0;

/// The two fixed plane sets, with the active one selected by mode.
#[derive(Debug, Clone)]
pub struct BoundarySet {
    box_planes: [Plane; 6],
    ground_planes: [Plane; 2],
    mode: BoundaryMode,
}

impl BoundarySet {
    /// Build both plane sets from the domain corners.
    pub fn new(domain_min: [f32; 3], domain_max: [f32; 3], mode: BoundaryMode) -> Self {
        let box_planes = [
            Plane::from_point_normal([0.0, domain_min[1], 0.0], [0.0, 1.0, 0.0]),
            Plane::from_point_normal([0.0, domain_max[1], 0.0], [0.0, -1.0, 0.0]),
            Plane::from_point_normal([domain_min[0], 0.0, 0.0], [1.0, 0.0, 0.0]),
            Plane::from_point_normal([domain_max[0], 0.0, 0.0], [-1.0, 0.0, 0.0]),
            Plane::from_point_normal([0.0, 0.0, domain_min[2]], [0.0, 0.0, 1.0]),
            Plane::from_point_normal([0.0, 0.0, domain_max[2]], [0.0, 0.0, -1.0]),
        ];
        let ground_planes = [
            Plane::from_point_normal([0.0, domain_min[1], 0.0], [0.0, 1.0, 0.0]),
            Plane::from_point_normal(
                [0.0, domain_min[1] + OPEN_GROUND_CEILING, 0.0],
                [0.0, -1.0, 0.0],
            ),
        ];
        Self {
            box_planes,
            ground_planes,
            mode,
        }
    }

    /// The currently active plane set.
    pub fn active(&self) -> &[Plane] {
        match self.mode {
            BoundaryMode::ClosedBox => &self.box_planes,
            BoundaryMode::OpenGround => &self.ground_planes,
        }
    }

    /// Current mode.
    pub fn mode(&self) -> BoundaryMode {
        self.mode
    }

    /// Select the active plane set. Takes effect for the next frame.
    pub fn set_mode(&mut self, mode: BoundaryMode) {
        self.mode = mode;
    }
}

/// Accumulate boundary force density for one particle against the active
/// planes.
///
/// Within `margin` of a plane the particle receives a spring-like restoring
/// force proportional to the penetration depth, plus damping of any inward
/// normal velocity. Both coefficients are tunables; see the configuration
/// surface.
#[inline]
pub fn accumulate_plane_forces(
    planes: &[Plane],
    pos: &[f32; 4],
    vel: &[f32; 4],
    margin: f32,
    stiffness: f32,
    damping: f32,
    force: &mut [f32; 3],
) {
    for plane in planes {
        let dist = plane.signed_distance(pos);
        if dist >= margin {
            continue;
        }
        let penetration = margin - dist;
        let vn = plane.normal[0] * vel[0] + plane.normal[1] * vel[1] + plane.normal[2] * vel[2];
        // Damp only velocity into the plane; receding particles are free.
        let mag = stiffness * penetration - damping * vn.min(0.0);
        force[0] += plane.normal[0] * mag;
        force[1] += plane.normal[1] * mag;
        force[2] += plane.normal[2] * mag;
    }
}
