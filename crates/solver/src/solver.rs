//! The solver aggregate: owns all per-frame state and runs the 7-stage
//! pipeline.
//!
//! Stage order per frame (strict barriers between stages, each stage one
//! complete data-parallel pass):
//!
//! 1. HashAssigner        5. HashRangeBuilder
//! 2. BucketCounter       6. SPHForceSolver
//! 3. PrefixScanEngine    7. Integrator
//! 4. ParticleSorter
//!
//! In [`RunMode::Paused`] stages 1-5 still run so the spatial index stays
//! valid for diagnostics; 6-7 are skipped and particle state is frozen. The
//! canonical buffer is only written at the end of a full step (and by the
//! pre-hash motion injection), so an external reader never observes
//! mid-pipeline state.

use std::time::Instant;

use rayon::prelude::*;

use crate::boundary::{BoundaryMode, BoundarySet};
use crate::forces::{self, NeighborStats};
use crate::hash::SpatialHash;
use crate::kernels::SmoothingKernels;
use crate::params::SimParams;
use crate::particle::{alloc_particles, Particle};

/// Frame interval for the periodic step-time log line.
const TIMING_LOG_INTERVAL: u64 = 400;

/// Pipeline run mode. Exactly two states; transitions are an external
/// toggle, never internally driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// All seven stages execute.
    Stepping,
    /// Stages 1-5 execute; forces and integration are skipped.
    Paused,
}

/// A queued external perturbation: overwrite a block of particles near
/// `center` with the configured injection velocity, simulating an external
/// disturbance. Applied once, before the next frame's hash assignment.
#[derive(Debug, Clone, Copy)]
pub struct Injection {
    /// World-space block center.
    pub center: [f32; 3],
}

/// Read-only health counters, refreshed every frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct Diagnostics {
    /// Frames advanced so far (paused frames included).
    pub frame: u64,
    /// Buckets holding at least one particle.
    pub used_buckets: u32,
    /// Largest per-bucket particle count.
    pub max_bucket_count: u32,
    /// Neighbor candidates examined by the last force pass.
    pub accessed_candidates: u64,
    /// Candidates accepted by the exact distance check.
    pub accepted_neighbors: u64,
}

impl Diagnostics {
    /// Fraction of candidate accesses that were genuine neighbors.
    pub fn acceptance_rate(&self) -> f32 {
        NeighborStats {
            accessed: self.accessed_candidates,
            accepted: self.accepted_neighbors,
        }
        .acceptance_rate()
    }
}

/// SPH fluid solver over a fixed-size particle set.
///
/// All buffers are allocated once at construction and reused every frame;
/// the per-frame arrays (sorted particles, densities, pressures, forces) are
/// ephemeral in content but persistent in storage.
pub struct FluidSolver {
    params: SimParams,
    kernels: SmoothingKernels,
    boundary: BoundarySet,
    /// Canonical particle storage; index is particle identity.
    particles: Vec<Particle>,
    /// Bucket-partitioned copy, rebuilt every frame.
    sorted: Vec<Particle>,
    density: Vec<f32>,
    pressure: Vec<f32>,
    forces: Vec<[f32; 3]>,
    hash: SpatialHash,
    mode: RunMode,
    pending_injection: Option<Injection>,
    injection_cursor: usize,
    stats: NeighborStats,
    frame: u64,
    step_time_total: f64,
}

impl FluidSolver {
    /// Build a solver over `particles`. Fails on invalid parameters or when
    /// the fixed-size buffers for this particle count cannot be allocated;
    /// both are fatal configuration errors caught before any frame runs.
    pub fn new(params: SimParams, particles: Vec<Particle>) -> Result<Self, String> {
        params.validate()?;
        let n = particles.len();

        let hash = SpatialHash::new(params.num_buckets, params.group_width, params.radius, n)?;
        let sorted = alloc_particles(n)?;

        fn alloc_scalar<T: Clone>(n: usize, zero: T, what: &str) -> Result<Vec<T>, String> {
            let mut v = Vec::new();
            v.try_reserve_exact(n)
                .map_err(|e| format!("Cannot allocate {what} for {n} particles: {e}"))?;
            v.resize(n, zero);
            Ok(v)
        }

        let solver = Self {
            kernels: SmoothingKernels::new(params.radius),
            boundary: BoundarySet::new(params.domain_min, params.domain_max, params.boundary_mode),
            particles,
            sorted,
            density: alloc_scalar(n, 0.0, "density buffer")?,
            pressure: alloc_scalar(n, 0.0, "pressure buffer")?,
            forces: alloc_scalar(n, [0.0; 3], "force accumulator")?,
            hash,
            mode: RunMode::Stepping,
            pending_injection: None,
            injection_cursor: 0,
            stats: NeighborStats::default(),
            frame: 0,
            step_time_total: 0.0,
            params,
        };

        tracing::info!(
            particles = n,
            buckets = solver.params.num_buckets,
            group_width = solver.params.group_width,
            radius = solver.params.radius,
            "fluid solver ready"
        );
        Ok(solver)
    }

    /// Number of particles. Invariant for the lifetime of the solver.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether the solver holds no particles.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Read-only view of the canonical particle buffer. Safe to hand to an
    /// external renderer between frames; contents change only when a full
    /// step completes.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// The sorted (bucket-partitioned) particle array from the last frame.
    pub fn sorted(&self) -> &[Particle] {
        &self.sorted
    }

    /// The spatial index from the last frame.
    pub fn spatial_hash(&self) -> &SpatialHash {
        &self.hash
    }

    /// Current run mode.
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Set the run mode for subsequent frames.
    pub fn set_mode(&mut self, mode: RunMode) {
        self.mode = mode;
    }

    /// Active boundary mode.
    pub fn boundary_mode(&self) -> BoundaryMode {
        self.boundary.mode()
    }

    /// Swap the active boundary plane set; takes effect next frame.
    pub fn set_boundary_mode(&mut self, mode: BoundaryMode) {
        self.boundary.set_mode(mode);
    }

    /// Queue a motion injection for the next frame. A later call before the
    /// frame runs replaces the earlier one; at most one block is overwritten
    /// per frame.
    pub fn inject_motion(&mut self, injection: Injection) {
        self.pending_injection = Some(injection);
    }

    /// Health counters from the most recent frame.
    pub fn diagnostics(&self) -> Diagnostics {
        let occupancy = self.hash.occupancy();
        Diagnostics {
            frame: self.frame,
            used_buckets: occupancy.used_buckets,
            max_bucket_count: occupancy.max_bucket_count,
            accessed_candidates: self.stats.accessed,
            accepted_neighbors: self.stats.accepted,
        }
    }

    /// Advance one frame: rebuild the spatial index, then (unless paused)
    /// compute forces and integrate.
    pub fn advance(&mut self) {
        let started = Instant::now();

        self.apply_pending_injection();

        // Stages 1-5: always run, keeping the index fresh while paused.
        self.hash.rebuild(&self.particles, &mut self.sorted);

        if self.mode == RunMode::Stepping {
            // Stage 6: density/pressure, then force accumulation.
            forces::compute_density_pressure(
                &self.sorted,
                &self.hash,
                &self.kernels,
                &self.params,
                &mut self.density,
                &mut self.pressure,
            );
            self.stats = forces::compute_forces(
                &self.sorted,
                &self.hash,
                &self.kernels,
                &self.params,
                self.boundary.active(),
                &self.density,
                &self.pressure,
                &mut self.forces,
            );

            // Stage 7: semi-implicit Euler on the sorted array, then gather
            // the results back to canonical order.
            self.integrate();
        }

        self.frame += 1;
        self.step_time_total += started.elapsed().as_secs_f64();
        if self.frame % TIMING_LOG_INTERVAL == 0 {
            tracing::debug!(
                frame = self.frame,
                avg_step_ms = self.step_time_total / self.frame as f64 * 1.0e3,
                acceptance = self.stats.acceptance_rate(),
                "pipeline timing"
            );
        }
    }

    /// Semi-implicit Euler: `v += (F / rho) * dt`, then `pos += v * dt`,
    /// over the sorted array; results are written back to the canonical
    /// buffer through the recorded permutation.
    fn integrate(&mut self) {
        let dt = self.params.delta_time;
        let density = &self.density;
        let forces = &self.forces;

        self.sorted.par_iter_mut().enumerate().for_each(|(s, p)| {
            let inv_rho = 1.0 / density[s];
            p.vel[0] += forces[s][0] * inv_rho * dt;
            p.vel[1] += forces[s][1] * inv_rho * dt;
            p.vel[2] += forces[s][2] * inv_rho * dt;
            p.pos[0] += p.vel[0] * dt;
            p.pos[1] += p.vel[1] * dt;
            p.pos[2] += p.vel[2] * dt;
        });

        // Gather back: canonical index i lives at sorted slot slot_of(i).
        let hash = &self.hash;
        let sorted = &self.sorted;
        self.particles
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, p)| {
                *p = sorted[hash.slot_of(i)];
            });
    }

    /// Overwrite a contiguous block of canonical slots with the queued
    /// injection, arranging the particles in a square grid above the center
    /// point. The cursor wraps so repeated injections cycle through the
    /// whole particle set instead of starving one region.
    fn apply_pending_injection(&mut self) {
        let Some(injection) = self.pending_injection.take() else {
            return;
        };
        let n = self.particles.len();
        if n == 0 {
            return;
        }

        let block = self.params.injection_block;
        let count = block * block;
        let spacing = 0.5 * self.params.radius;
        let half = (block as f32 - 1.0) * 0.5;
        let vel = [
            self.params.injection_velocity[0],
            self.params.injection_velocity[1],
            self.params.injection_velocity[2],
            0.0,
        ];

        for k in 0..count {
            let i = (self.injection_cursor + k) % n;
            let gx = (k % block) as f32 - half;
            let gz = (k / block) as f32 - half;
            self.particles[i].pos = [
                injection.center[0] + gx * spacing,
                injection.center[1],
                injection.center[2] + gz * spacing,
                0.0,
            ];
            self.particles[i].vel = vel;
        }
        self.injection_cursor = (self.injection_cursor + count) % n;

        tracing::debug!(
            center = ?injection.center,
            count,
            cursor = self.injection_cursor,
            "motion injected"
        );
    }
}
