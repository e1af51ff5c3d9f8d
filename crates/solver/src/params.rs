//! Solver parameters and setup-time validation.

use crate::boundary::BoundaryMode;

/// Default hash table size (buckets).
pub const DEFAULT_NUM_BUCKETS: usize = 1 << 20;

/// Default thread-group width for the block-parallel scan.
pub const DEFAULT_GROUP_WIDTH: usize = 1 << 10;

/// All tunables consumed by the solver. Fixed for the lifetime of a
/// [`FluidSolver`](crate::FluidSolver) except `boundary_mode`, which may be
/// toggled between frames.
#[derive(Debug, Clone)]
pub struct SimParams {
    /// Interaction radius; also the spatial hash cell size.
    pub radius: f32,
    /// Gas stiffness `k` in the linear equation of state `p = k (rho - rho0)`.
    pub gas_constant: f32,
    /// Rest density `rho0`.
    pub rest_density: f32,
    /// Per-particle mass.
    pub particle_mass: f32,
    /// Dynamic viscosity coefficient.
    pub viscosity: f32,
    /// Gravity magnitude, applied along -y.
    pub gravity: f32,
    /// Integration time step (seconds).
    pub delta_time: f32,
    /// Domain minimum corner.
    pub domain_min: [f32; 3],
    /// Domain maximum corner.
    pub domain_max: [f32; 3],
    /// Hash table size `H`. Fixed; independent of particle count.
    pub num_buckets: usize,
    /// Thread-group width `T` for the block-parallel prefix scan.
    pub group_width: usize,
    /// Active boundary plane set.
    pub boundary_mode: BoundaryMode,
    /// Whether negative pressure (density below rest) is clamped to zero
    /// before force accumulation.
    pub clamp_negative_pressure: bool,
    /// Spring coefficient of the boundary plane repulsion.
    pub boundary_stiffness: f32,
    /// Damping coefficient applied to inward normal velocity near a plane.
    pub boundary_damping: f32,
    /// Edge length of the square particle block overwritten per motion
    /// injection (the block holds `injection_block^2` particles).
    pub injection_block: usize,
    /// Velocity assigned to injected particles.
    pub injection_velocity: [f32; 3],
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            radius: 1.0,
            gas_constant: 2000.0,
            rest_density: 10.0,
            particle_mass: 1.0,
            viscosity: 0.01,
            gravity: 9.8,
            delta_time: 0.001,
            domain_min: [-10.0; 3],
            domain_max: [10.0; 3],
            num_buckets: DEFAULT_NUM_BUCKETS,
            group_width: DEFAULT_GROUP_WIDTH,
            boundary_mode: BoundaryMode::ClosedBox,
            clamp_negative_pressure: false,
            boundary_stiffness: 2000.0,
            boundary_damping: 20.0,
            injection_block: 10,
            injection_velocity: [0.0, -70.0, 0.0],
        }
    }
}

impl SimParams {
    /// Validate the parameter set. Violations here are fatal configuration
    /// errors: they would produce silently wrong results at runtime, so the
    /// solver refuses to start instead.
    pub fn validate(&self) -> Result<(), String> {
        if self.radius <= 0.0 {
            return Err("Interaction radius must be positive".to_string());
        }
        if self.rest_density <= 0.0 {
            return Err("Rest density must be positive".to_string());
        }
        if self.particle_mass <= 0.0 {
            return Err("Particle mass must be positive".to_string());
        }
        if self.viscosity < 0.0 {
            return Err("Viscosity must be non-negative".to_string());
        }
        if self.delta_time <= 0.0 {
            return Err("Time step must be positive".to_string());
        }
        for axis in 0..3 {
            if self.domain_min[axis] >= self.domain_max[axis] {
                return Err(format!(
                    "Domain min must be below max on axis {axis}: {} >= {}",
                    self.domain_min[axis], self.domain_max[axis]
                ));
            }
        }
        if self.num_buckets == 0 {
            return Err("Hash table size must be positive".to_string());
        }
        if self.group_width == 0 {
            return Err("Thread-group width must be positive".to_string());
        }
        // Bucket ids, offsets and the scan total are u32 throughout the
        // pipeline.
        if self.num_buckets as u64 > u32::MAX as u64 {
            return Err(format!(
                "Hash table size {} does not fit in 32 bits",
                self.num_buckets
            ));
        }
        // The phase-2 scan runs as a single group over the block sums, so it
        // only covers up to group_width blocks. Beyond that the offsets are
        // silently wrong (lost/duplicated particles downstream).
        if self.num_buckets > self.group_width * self.group_width {
            return Err(format!(
                "Hash table size {} exceeds the prefix-scan bound: num_buckets must be <= group_width^2 = {}",
                self.num_buckets,
                self.group_width * self.group_width
            ));
        }
        if self.injection_block == 0 {
            return Err("Injection block must be positive".to_string());
        }
        Ok(())
    }
}
