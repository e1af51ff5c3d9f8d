//! SPH force stage: density, pressure, viscosity, boundary and gravity.
//!
//! Operates entirely on the sorted particle array for memory locality.
//! Candidates come from the 27-bucket neighborhood; exact distance rejection
//! compensates for hash-table collisions (unrelated particles sharing a
//! bucket are filtered here, never earlier).
//!
//! Forces are force densities in the Mueller et al. 2003 sense: the
//! integrator divides by the particle's density, so gravity enters as
//! `rho * g`.

use rayon::prelude::*;

use crate::boundary::{self, Plane};
use crate::hash::SpatialHash;
use crate::kernels::SmoothingKernels;
use crate::params::SimParams;
use crate::particle::Particle;

/// Boundary repulsion activates within this fraction of the interaction
/// radius from a plane.
const BOUNDARY_MARGIN_FACTOR: f32 = 0.5;

/// Candidate traffic counters from one force pass, for the acceptance-rate
/// diagnostic.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeighborStats {
    /// Candidates examined across all particles (self excluded).
    pub accessed: u64,
    /// Candidates within the interaction radius.
    pub accepted: u64,
}

impl NeighborStats {
    /// Fraction of examined candidates that passed the distance check.
    pub fn acceptance_rate(&self) -> f32 {
        if self.accessed == 0 {
            return 0.0;
        }
        self.accepted as f32 / self.accessed as f32
    }
}

/// Compute per-particle density and pressure over the sorted array.
///
/// Density always includes the self-term `mass * W_poly6(0)`, so it is
/// strictly positive even for an isolated particle. Pressure follows the
/// linear equation of state `p = k (rho - rho0)`; clamping of negative
/// values is a configurable policy.
pub fn compute_density_pressure(
    sorted: &[Particle],
    hash: &SpatialHash,
    kernels: &SmoothingKernels,
    params: &SimParams,
    density: &mut [f32],
    pressure: &mut [f32],
) {
    let radius_sq = kernels.radius_sq();
    let mass = params.particle_mass;
    let self_term = mass * kernels.poly6(0.0);

    density
        .par_iter_mut()
        .zip(pressure.par_iter_mut())
        .enumerate()
        .for_each(|(i, (rho_out, p_out))| {
            let pi = &sorted[i];
            let mut rho = self_term;
            hash.for_each_candidate(&pi.pos, |s| {
                if s == i {
                    return;
                }
                let d_sq = pi.dist_sq(&sorted[s]);
                if d_sq <= radius_sq {
                    rho += mass * kernels.poly6(d_sq);
                }
            });

            let mut p = params.gas_constant * (rho - params.rest_density);
            if params.clamp_negative_pressure && p < 0.0 {
                p = 0.0;
            }
            *rho_out = rho;
            *p_out = p;
        });
}

/// Compute the net force density per sorted particle: symmetrized spiky
/// pressure gradient, viscosity Laplacian, boundary plane repulsion and
/// gravity. Returns the candidate traffic counters for diagnostics.
#[allow(clippy::too_many_arguments)]
pub fn compute_forces(
    sorted: &[Particle],
    hash: &SpatialHash,
    kernels: &SmoothingKernels,
    params: &SimParams,
    planes: &[Plane],
    density: &[f32],
    pressure: &[f32],
    forces: &mut [[f32; 3]],
) -> NeighborStats {
    let radius_sq = kernels.radius_sq();
    let mass = params.particle_mass;
    let margin = BOUNDARY_MARGIN_FACTOR * params.radius;

    let (accessed, accepted) = forces
        .par_iter_mut()
        .enumerate()
        .map(|(i, force)| {
            let pi = &sorted[i];
            let rho_i = density[i];
            let p_i = pressure[i];
            let mut f = [0.0f32; 3];
            let mut accessed = 0u64;
            let mut accepted = 0u64;

            hash.for_each_candidate(&pi.pos, |s| {
                if s == i {
                    return;
                }
                accessed += 1;
                let pj = &sorted[s];
                let d_sq = pi.dist_sq(pj);
                if d_sq > radius_sq {
                    return;
                }
                accepted += 1;

                let rho_j = density[s];
                let dist = d_sq.sqrt();

                // Coincident particles have no defined direction; the
                // kernel gradient is taken as zero there.
                if dist > 1.0e-6 {
                    let inv_d = 1.0 / dist;
                    let dir = [
                        (pi.pos[0] - pj.pos[0]) * inv_d,
                        (pi.pos[1] - pj.pos[1]) * inv_d,
                        (pi.pos[2] - pj.pos[2]) * inv_d,
                    ];
                    // -grad W_spiky * m * (p_i + p_j) / (2 rho_j); the
                    // gradient points toward the neighbor, so the force
                    // pushes the pair apart under positive pressure.
                    let press = kernels.spiky_gradient(dist) * mass * (p_i + pressure[s])
                        / (2.0 * rho_j);
                    f[0] += dir[0] * press;
                    f[1] += dir[1] * press;
                    f[2] += dir[2] * press;
                }

                let visc = params.viscosity * mass * kernels.visc_laplacian(dist) / rho_j;
                f[0] += (pj.vel[0] - pi.vel[0]) * visc;
                f[1] += (pj.vel[1] - pi.vel[1]) * visc;
                f[2] += (pj.vel[2] - pi.vel[2]) * visc;
            });

            boundary::accumulate_plane_forces(
                planes,
                &pi.pos,
                &pi.vel,
                margin,
                params.boundary_stiffness,
                params.boundary_damping,
                &mut f,
            );

            // Gravity as a force density so that a = F / rho = g.
            f[1] -= rho_i * params.gravity;

            *force = f;
            (accessed, accepted)
        })
        .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

    NeighborStats { accessed, accepted }
}
