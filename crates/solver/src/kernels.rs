//! SPH smoothing kernel functions (Mueller et al. 2003).
//!
//! Three kernels are used for the three field estimates: poly6 for density,
//! the spiky gradient for pressure forces, and the viscosity Laplacian for
//! viscous forces. Each normalization coefficient is a closed-form function
//! of the interaction radius and is computed once at setup.

use std::f32::consts::PI;

/// Precomputed kernel normalization coefficients for a fixed interaction
/// radius `r`.
///
/// ```text
/// poly6:  W(d)      = 315 / (64 pi r^9) * (r^2 - d^2)^3      for d <= r
/// spiky:  |grad W|  =  45 / (pi r^6)    * (r - d)^2          for d <= r
/// visc:   lap W     =  45 / (pi r^6)    * (r - d)            for d <= r
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SmoothingKernels {
    radius: f32,
    radius_sq: f32,
    poly6_coeff: f32,
    spiky_coeff: f32,
    visc_coeff: f32,
}

impl SmoothingKernels {
    /// Derive all coefficients from the interaction radius.
    pub fn new(radius: f32) -> Self {
        let r3 = radius * radius * radius;
        let r6 = r3 * r3;
        let r9 = r6 * r3;
        Self {
            radius,
            radius_sq: radius * radius,
            poly6_coeff: 315.0 / (64.0 * PI * r9),
            spiky_coeff: 45.0 / (PI * r6),
            visc_coeff: 45.0 / (PI * r6),
        }
    }

    /// Interaction radius the coefficients were derived from.
    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Squared interaction radius, for distance rejection tests.
    #[inline]
    pub fn radius_sq(&self) -> f32 {
        self.radius_sq
    }

    /// Poly6 density kernel, evaluated on the squared distance.
    ///
    /// Returns 0 for `dist_sq > radius^2`. The value at `dist_sq = 0` is the
    /// self-contribution weight of an isolated particle.
    #[inline]
    pub fn poly6(&self, dist_sq: f32) -> f32 {
        if dist_sq > self.radius_sq {
            return 0.0;
        }
        let t = self.radius_sq - dist_sq;
        self.poly6_coeff * t * t * t
    }

    /// Magnitude of the spiky kernel gradient at distance `dist`.
    ///
    /// The gradient points from the neighbor toward the particle; callers
    /// multiply by the unit separation vector. Returns 0 beyond the radius.
    #[inline]
    pub fn spiky_gradient(&self, dist: f32) -> f32 {
        if dist > self.radius {
            return 0.0;
        }
        let t = self.radius - dist;
        self.spiky_coeff * t * t
    }

    /// Viscosity kernel Laplacian at distance `dist`. Returns 0 beyond the
    /// radius. Strictly positive inside, which guarantees viscosity is
    /// dissipative.
    #[inline]
    pub fn visc_laplacian(&self, dist: f32) -> f32 {
        if dist > self.radius {
            return 0.0;
        }
        self.visc_coeff * (self.radius - dist)
    }
}
