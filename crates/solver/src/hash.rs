//! Spatial hash and counting-sort pipeline (stages 1-5 of the frame).
//!
//! Every frame the neighbor structure is rebuilt from scratch: particle
//! positions are hashed to buckets of a fixed-size table, buckets are
//! counted with atomic fetch-and-add (the pre-increment value becomes the
//! particle's local rank), a block-parallel prefix scan turns counts into
//! offsets, and a counting-sort scatter places every particle at a globally
//! unique sorted slot. The data layout is flat index-keyed arrays only; no
//! per-particle allocation.
//!
//! Hash collisions are expected: the table size is fixed regardless of
//! particle count. Correctness downstream relies only on every particle
//! landing in the bucket of its cell, never on collision-freedom.

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

use crate::particle::Particle;
use crate::scan;

// Teschner et al. 2003 spatial hash primes.
const P1: u32 = 73_856_093;
const P2: u32 = 19_349_663;
const P3: u32 = 83_492_791;

/// Contiguous window of one bucket inside the sorted particle array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketRange {
    /// First sorted slot belonging to the bucket.
    pub start: u32,
    /// Number of particles in the bucket.
    pub count: u32,
}

/// Hash table occupancy snapshot, for tuning and health checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashOccupancy {
    /// Buckets holding at least one particle.
    pub used_buckets: u32,
    /// Largest per-bucket particle count (collisions included).
    pub max_bucket_count: u32,
}

/// Per-frame spatial index over a fixed-size bucket table.
#[derive(Debug)]
pub struct SpatialHash {
    num_buckets: usize,
    group_width: usize,
    cell_size: f32,
    /// Bucket id per particle.
    hashes: Vec<u32>,
    /// Pre-increment insertion rank per particle, dense within its bucket.
    ranks: Vec<u32>,
    /// Per-bucket particle count, rebuilt each frame via fetch-and-add.
    counts: Vec<AtomicU32>,
    /// Exclusive prefix sum of `counts`.
    offsets: Vec<u32>,
    /// Scan scratch: one partial sum per block.
    block_sums: Vec<u32>,
    /// Per-bucket `(start, count)` window into the sorted array.
    ranges: Vec<BucketRange>,
    /// Sorted slot -> canonical particle index.
    inverse: Vec<AtomicU32>,
}

impl SpatialHash {
    /// Allocate the fixed-size index for `particle_count` particles and
    /// `num_buckets` buckets. Cell size must equal the interaction radius so
    /// the 27-cell neighborhood covers every in-radius pair.
    pub fn new(
        num_buckets: usize,
        group_width: usize,
        cell_size: f32,
        particle_count: usize,
    ) -> Result<Self, String> {
        debug_assert!(num_buckets <= group_width * group_width);

        // Bucket ids and canonical indices travel through u32 arrays.
        if num_buckets as u64 > u32::MAX as u64 {
            return Err(format!("Hash table size {num_buckets} does not fit in 32 bits"));
        }
        if particle_count as u64 > u32::MAX as u64 {
            return Err(format!(
                "Particle count {particle_count} does not fit in 32 bits"
            ));
        }

        fn alloc<T, F: FnMut() -> T>(len: usize, what: &str, mut init: F) -> Result<Vec<T>, String> {
            let mut v = Vec::new();
            v.try_reserve_exact(len)
                .map_err(|e| format!("Cannot allocate {what} ({len} entries): {e}"))?;
            v.resize_with(len, &mut init);
            Ok(v)
        }

        Ok(Self {
            num_buckets,
            group_width,
            cell_size,
            hashes: alloc(particle_count, "hash array", || 0u32)?,
            ranks: alloc(particle_count, "rank array", || 0u32)?,
            counts: alloc(num_buckets, "bucket counters", || AtomicU32::new(0))?,
            offsets: alloc(num_buckets, "bucket offsets", || 0u32)?,
            block_sums: alloc(num_buckets.div_ceil(group_width), "block sums", || 0u32)?,
            ranges: alloc(num_buckets, "bucket ranges", BucketRange::default)?,
            inverse: alloc(particle_count, "inverse permutation", || AtomicU32::new(0))?,
        })
    }

    /// Number of buckets `H`.
    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    /// Integer cell coordinates of a position.
    #[inline]
    pub fn cell_of(&self, pos: &[f32; 4]) -> [i32; 3] {
        [
            (pos[0] / self.cell_size).floor() as i32,
            (pos[1] / self.cell_size).floor() as i32,
            (pos[2] / self.cell_size).floor() as i32,
        ]
    }

    /// Deterministic spatial hash of a cell into `[0, num_buckets)`.
    #[inline]
    pub fn bucket_of_cell(&self, cell: [i32; 3]) -> usize {
        let h = (cell[0] as u32).wrapping_mul(P1)
            ^ (cell[1] as u32).wrapping_mul(P2)
            ^ (cell[2] as u32).wrapping_mul(P3);
        (h % self.num_buckets as u32) as usize
    }

    /// Stage 1, HashAssigner: map each particle position to its bucket id.
    pub fn assign(&mut self, particles: &[Particle]) {
        debug_assert_eq!(particles.len(), self.hashes.len());
        let cell_size = self.cell_size;
        let num_buckets = self.num_buckets as u32;
        self.hashes
            .par_iter_mut()
            .zip(particles.par_iter())
            .for_each(|(h, p)| {
                let cx = (p.pos[0] / cell_size).floor() as i32;
                let cy = (p.pos[1] / cell_size).floor() as i32;
                let cz = (p.pos[2] / cell_size).floor() as i32;
                let mixed = (cx as u32).wrapping_mul(P1)
                    ^ (cy as u32).wrapping_mul(P2)
                    ^ (cz as u32).wrapping_mul(P3);
                *h = mixed % num_buckets;
            });
    }

    /// Stage 2, BucketCounter: reset all counters, then have every particle
    /// atomically increment its bucket and record the pre-increment value as
    /// its local rank. Atomicity (not ordering) guarantees the ranks within
    /// a bucket form a dense `0..count` range with no duplicates.
    pub fn count(&mut self) {
        self.counts
            .par_iter()
            .for_each(|c| c.store(0, Ordering::Relaxed));

        let counts = &self.counts;
        self.ranks
            .par_iter_mut()
            .zip(self.hashes.par_iter())
            .for_each(|(rank, &h)| {
                *rank = counts[h as usize].fetch_add(1, Ordering::Relaxed);
            });
    }

    /// Stage 3, PrefixScanEngine: exclusive scan of bucket counts into
    /// offsets. Returns the total, which always equals the particle count.
    pub fn scan(&mut self) -> u32 {
        scan::exclusive_scan(
            &self.counts,
            &mut self.offsets,
            &mut self.block_sums,
            self.group_width,
        )
    }

    /// Stage 4, ParticleSorter: scatter particles into bucket-partitioned
    /// order and record the inverse permutation.
    ///
    /// `offset[hash] + rank` assigns every particle a globally unique slot
    /// in `[0, n)`, so the scatter is collision-free: the inverse map is
    /// written with plain relaxed stores and the sorted fill is a gather.
    pub fn scatter(&self, particles: &[Particle], sorted: &mut [Particle]) {
        debug_assert_eq!(particles.len(), sorted.len());

        (0..particles.len()).into_par_iter().for_each(|i| {
            let slot =
                self.offsets[self.hashes[i] as usize] as usize + self.ranks[i] as usize;
            self.inverse[slot].store(i as u32, Ordering::Relaxed);
        });

        sorted.par_iter_mut().enumerate().for_each(|(s, p)| {
            *p = particles[self.inverse[s].load(Ordering::Relaxed) as usize];
        });
    }

    /// Stage 5, HashRangeBuilder: per-bucket `(start, count)` lookup windows.
    pub fn build_ranges(&mut self) {
        let counts = &self.counts;
        let offsets = &self.offsets;
        self.ranges
            .par_iter_mut()
            .enumerate()
            .for_each(|(b, range)| {
                *range = BucketRange {
                    start: offsets[b],
                    count: counts[b].load(Ordering::Relaxed),
                };
            });
    }

    /// Sorted-array window of bucket `b`.
    #[inline]
    pub fn bucket_range(&self, b: usize) -> BucketRange {
        self.ranges[b]
    }

    /// Canonical particle index that sorted slot `s` originated from.
    #[inline]
    pub fn inverse_index(&self, s: usize) -> usize {
        self.inverse[s].load(Ordering::Relaxed) as usize
    }

    /// Sorted slot currently holding canonical particle `i`. Valid between
    /// the scatter and the next frame's hash assignment.
    #[inline]
    pub fn slot_of(&self, i: usize) -> usize {
        self.offsets[self.hashes[i] as usize] as usize + self.ranks[i] as usize
    }

    /// Invoke `f` with the sorted slot of every candidate particle in the 27
    /// buckets covering `pos`'s cell and its neighbors. With cell size equal
    /// to the interaction radius this enumeration has no false negatives;
    /// hash collisions can add false positives, which callers must filter by
    /// exact distance.
    #[inline]
    pub fn for_each_candidate<F: FnMut(usize)>(&self, pos: &[f32; 4], mut f: F) {
        let cell = self.cell_of(pos);
        for dz in -1i32..=1 {
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    let b =
                        self.bucket_of_cell([cell[0] + dx, cell[1] + dy, cell[2] + dz]);
                    let range = self.ranges[b];
                    let start = range.start as usize;
                    for s in start..start + range.count as usize {
                        f(s);
                    }
                }
            }
        }
    }

    /// Occupancy statistics over the current frame's bucket counts.
    pub fn occupancy(&self) -> HashOccupancy {
        let (used, max) = self
            .counts
            .par_iter()
            .map(|c| {
                let n = c.load(Ordering::Relaxed);
                (u32::from(n > 0), n)
            })
            .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1.max(b.1)));
        HashOccupancy {
            used_buckets: used,
            max_bucket_count: max,
        }
    }

    /// Run stages 1-5 in order over the canonical buffer, leaving `sorted`
    /// bucket-partitioned. Each stage is a full data-parallel barrier.
    pub fn rebuild(&mut self, particles: &[Particle], sorted: &mut [Particle]) {
        self.assign(particles);
        self.count();
        let total = self.scan();
        debug_assert_eq!(total as usize, particles.len());
        self.scatter(particles, sorted);
        self.build_ranges();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn random_particles(n: usize, extent: f32, seed: u64) -> Vec<Particle> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                Particle::at_rest(
                    rng.gen_range(-extent..extent),
                    rng.gen_range(-extent..extent),
                    rng.gen_range(-extent..extent),
                )
            })
            .collect()
    }

    fn rebuilt(particles: &[Particle], num_buckets: usize, group: usize) -> (SpatialHash, Vec<Particle>) {
        let mut hash = SpatialHash::new(num_buckets, group, 1.0, particles.len()).unwrap();
        let mut sorted = particles.to_vec();
        hash.rebuild(particles, &mut sorted);
        (hash, sorted)
    }

    #[test]
    fn counts_sum_to_particle_count() {
        let particles = random_particles(500, 8.0, 1);
        let mut hash = SpatialHash::new(256, 16, 1.0, 500).unwrap();
        hash.assign(&particles);
        hash.count();
        let total: u32 = hash.counts.iter().map(|c| c.load(Ordering::Relaxed)).sum();
        assert_eq!(total, 500);
        assert_eq!(hash.scan(), 500);
    }

    #[test]
    fn ranks_are_dense_within_each_bucket() {
        let particles = random_particles(300, 5.0, 2);
        let mut hash = SpatialHash::new(64, 8, 1.0, 300).unwrap();
        hash.assign(&particles);
        hash.count();

        let mut per_bucket: Vec<Vec<u32>> = vec![Vec::new(); 64];
        for i in 0..300 {
            per_bucket[hash.hashes[i] as usize].push(hash.ranks[i]);
        }
        for (b, mut ranks) in per_bucket.into_iter().enumerate() {
            ranks.sort_unstable();
            let count = hash.counts[b].load(Ordering::Relaxed) as usize;
            assert_eq!(ranks.len(), count);
            for (expected, &got) in ranks.iter().enumerate() {
                assert_eq!(got as usize, expected, "bucket {b} ranks not dense");
            }
        }
    }

    #[test]
    fn scatter_is_a_permutation() {
        let particles = random_particles(400, 6.0, 3);
        let (hash, sorted) = rebuilt(&particles, 128, 16);

        // Every canonical index appears exactly once in the inverse map.
        let mut seen = vec![false; 400];
        for s in 0..400 {
            let i = hash.inverse_index(s);
            assert!(!seen[i], "particle {i} duplicated in sorted array");
            seen[i] = true;
            assert_eq!(sorted[s], particles[i], "slot {s} holds wrong particle");
        }
        assert!(seen.into_iter().all(|b| b));
    }

    #[test]
    fn slot_of_inverts_inverse_index() {
        let particles = random_particles(200, 4.0, 4);
        let (hash, _sorted) = rebuilt(&particles, 64, 8);
        for i in 0..200 {
            assert_eq!(hash.inverse_index(hash.slot_of(i)), i);
        }
    }

    #[test]
    fn ranges_partition_the_sorted_array() {
        let particles = random_particles(350, 7.0, 5);
        let (hash, _sorted) = rebuilt(&particles, 128, 16);

        let mut covered = 0u32;
        for b in 0..hash.num_buckets() {
            let r = hash.bucket_range(b);
            assert_eq!(r.start, hash.offsets[b]);
            covered += r.count;
        }
        assert_eq!(covered, 350);

        // Sorted slots within a range all hash to that bucket.
        for b in 0..hash.num_buckets() {
            let r = hash.bucket_range(b);
            for s in r.start..r.start + r.count {
                let i = hash.inverse_index(s as usize);
                assert_eq!(hash.hashes[i] as usize, b);
            }
        }
    }

    #[test]
    fn neighborhood_covers_all_pairs_within_radius() {
        // For any pair within the interaction radius, each particle's
        // 27-cell walk must reach the other (cell size == radius).
        let particles = random_particles(300, 3.0, 6);
        let (hash, sorted) = rebuilt(&particles, 512, 32);

        for i in 0..particles.len() {
            for j in 0..particles.len() {
                if i == j || particles[i].dist_sq(&particles[j]) > 1.0 {
                    continue;
                }
                let mut found = false;
                hash.for_each_candidate(&particles[i].pos, |s| {
                    if sorted[s] == particles[j] && hash.inverse_index(s) == j {
                        found = true;
                    }
                });
                assert!(found, "pair ({i}, {j}) missed by the 27-bucket walk");
            }
        }
    }

    #[test]
    fn empty_particle_set() {
        let particles: Vec<Particle> = Vec::new();
        let mut hash = SpatialHash::new(64, 8, 1.0, 0).unwrap();
        let mut sorted = Vec::new();
        hash.rebuild(&particles, &mut sorted);
        assert_eq!(hash.occupancy().used_buckets, 0);
    }

    #[test]
    fn occupancy_counts_used_buckets() {
        // All particles in one cell: exactly one bucket used.
        let particles = vec![Particle::at_rest(0.5, 0.5, 0.5); 10];
        let (hash, _sorted) = rebuilt(&particles, 64, 8);
        let occ = hash.occupancy();
        assert_eq!(occ.used_buckets, 1);
        assert_eq!(occ.max_bucket_count, 10);
    }

    #[test]
    fn particle_count_beyond_u32_rejected() {
        // Rejected before any buffer allocation is attempted.
        let err = SpatialHash::new(64, 8, 1.0, (u32::MAX as usize) + 1).unwrap_err();
        assert!(err.contains("32 bits"), "unexpected error: {err}");
    }

    #[test]
    fn negative_coordinates_hash_consistently() {
        let a = Particle::at_rest(-0.1, -0.1, -0.1);
        let b = Particle::at_rest(-0.9, -0.9, -0.9);
        let hash = SpatialHash::new(64, 8, 1.0, 2).unwrap();
        // Both fall in cell (-1, -1, -1).
        assert_eq!(hash.cell_of(&a.pos), [-1, -1, -1]);
        assert_eq!(
            hash.bucket_of_cell(hash.cell_of(&a.pos)),
            hash.bucket_of_cell(hash.cell_of(&b.pos))
        );
    }
}
