//! Structural invariants of the counting-sort spatial index under a
//! realistic random particle cloud.

use rand::{Rng, SeedableRng};
use solver::{FluidSolver, Particle, RunMode, SimParams, SpatialHash};

const NUM_BUCKETS: usize = 1024;
const GROUP_WIDTH: usize = 64;

fn random_cloud(n: usize, seed: u64) -> Vec<Particle> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            Particle::at_rest(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
            )
        })
        .collect()
}

fn build_index(particles: &[Particle]) -> (SpatialHash, Vec<Particle>) {
    let mut hash = SpatialHash::new(NUM_BUCKETS, GROUP_WIDTH, 1.0, particles.len()).unwrap();
    let mut sorted = particles.to_vec();
    hash.rebuild(particles, &mut sorted);
    (hash, sorted)
}

#[test]
fn offsets_partition_the_particle_set() {
    let particles = random_cloud(2000, 7);
    let (hash, _) = build_index(&particles);

    let mut expected_start = 0u32;
    for b in 0..NUM_BUCKETS {
        let range = hash.bucket_range(b);
        assert_eq!(
            range.start, expected_start,
            "bucket {b} start must equal the running total"
        );
        expected_start += range.count;
    }
    assert_eq!(expected_start as usize, particles.len());
}

#[test]
fn scatter_is_a_bijection() {
    let particles = random_cloud(2000, 11);
    let (hash, sorted) = build_index(&particles);

    let mut seen = vec![false; particles.len()];
    for i in 0..particles.len() {
        let slot = hash.slot_of(i);
        assert!(!seen[slot], "slot {slot} written twice");
        seen[slot] = true;
        // The sorted copy at that slot is the canonical particle, bit for
        // bit.
        assert_eq!(sorted[slot], particles[i]);
    }
    assert!(seen.iter().all(|&s| s));
}

#[test]
fn sorted_particles_lie_in_their_bucket_range() {
    let particles = random_cloud(2000, 13);
    let (hash, sorted) = build_index(&particles);

    for b in 0..NUM_BUCKETS {
        let range = hash.bucket_range(b);
        for s in range.start..range.start + range.count {
            let p = &sorted[s as usize];
            let bucket = hash.bucket_of_cell(hash.cell_of(&p.pos));
            assert_eq!(bucket, b, "slot {s} landed in the wrong bucket range");
        }
    }
}

#[test]
fn count_invariant_across_frames() {
    let params = SimParams {
        num_buckets: NUM_BUCKETS,
        group_width: GROUP_WIDTH,
        ..SimParams::default()
    };
    let particles = random_cloud(2000, 17);
    let n = particles.len();
    let mut sim = FluidSolver::new(params, particles).unwrap();

    for frame in 0..4 {
        // Alternate modes; the index must stay complete either way.
        sim.set_mode(if frame % 2 == 0 {
            RunMode::Stepping
        } else {
            RunMode::Paused
        });
        sim.advance();

        let total: u32 = (0..NUM_BUCKETS)
            .map(|b| sim.spatial_hash().bucket_range(b).count)
            .sum();
        assert_eq!(total as usize, n, "frame {frame} lost or duplicated particles");
        assert_eq!(sim.particles().len(), n);
    }
}
