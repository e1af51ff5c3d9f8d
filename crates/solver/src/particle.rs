//! Particle data layout: flat arrays of Pod structs, GPU-shaped.
//!
//! Positions and velocities are stored as `[f32; 4]` (xyz + padding) so the
//! canonical buffer can be handed to an external renderer as raw bytes
//! without repacking.

/// A single free particle: position and velocity, each padded to 16 bytes.
///
/// The fourth component of both vectors is padding and is never read by the
/// solver. Index into the canonical buffer is the particle's identity.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Particle {
    /// Position (x, y, z, pad).
    pub pos: [f32; 4],
    /// Velocity (x, y, z, pad).
    pub vel: [f32; 4],
}

impl Particle {
    /// Create a particle at rest at the given position.
    pub fn at_rest(x: f32, y: f32, z: f32) -> Self {
        Self {
            pos: [x, y, z, 0.0],
            vel: [0.0; 4],
        }
    }

    /// Squared distance between this particle's position and another's.
    #[inline]
    pub fn dist_sq(&self, other: &Particle) -> f32 {
        let dx = self.pos[0] - other.pos[0];
        let dy = self.pos[1] - other.pos[1];
        let dz = self.pos[2] - other.pos[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// Allocate a particle buffer of `count` zeroed particles, rejecting the
/// request (rather than aborting) when the allocation cannot be satisfied.
pub fn alloc_particles(count: usize) -> Result<Vec<Particle>, String> {
    let mut v: Vec<Particle> = Vec::new();
    v.try_reserve_exact(count)
        .map_err(|e| format!("Cannot allocate buffer for {count} particles: {e}"))?;
    v.resize(count, Particle::at_rest(0.0, 0.0, 0.0));
    Ok(v)
}
