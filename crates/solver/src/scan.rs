//! Block-parallel exclusive prefix sum over bucket counts.
//!
//! The scan mirrors a three-phase GPU workgroup scan: the count array is
//! partitioned into blocks of the configured thread-group width, each block
//! scans itself independently (phase 1), a single group scans the per-block
//! sums (phase 2), and every block then adds its block prefix (phase 3).
//! Blocks are the unit of local synchronization; phases are separated by
//! full barriers (each phase is one complete rayon pass).
//!
//! Phase 2 is single-level: it handles at most `group_width` block sums, so
//! the scan is only correct while `counts.len() <= group_width^2`. That
//! bound is a fatal configuration error checked by
//! [`SimParams::validate`](crate::SimParams::validate) before any frame
//! runs; it is re-asserted here in debug builds.

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

/// Compute the exclusive prefix sum of `counts` into `offsets`, returning
/// the total sum.
///
/// `block_sums` is caller-owned scratch, resized to the number of blocks.
/// After the call: `offsets[0] == 0`, `offsets[b+1] == offsets[b] +
/// counts[b]`, and the returned total equals `offsets[last] + counts[last]`.
/// Buckets with a zero count receive the same offset as their successor;
/// empty buckets are legal.
pub fn exclusive_scan(
    counts: &[AtomicU32],
    offsets: &mut [u32],
    block_sums: &mut Vec<u32>,
    group_width: usize,
) -> u32 {
    debug_assert_eq!(counts.len(), offsets.len());
    if counts.is_empty() {
        return 0;
    }

    let num_blocks = counts.len().div_ceil(group_width);
    debug_assert!(
        num_blocks <= group_width,
        "scan bound violated: {num_blocks} blocks > group width {group_width}"
    );
    block_sums.clear();
    block_sums.resize(num_blocks, 0);

    // Phase 1: each block computes its local exclusive scan and total.
    offsets
        .par_chunks_mut(group_width)
        .zip(counts.par_chunks(group_width))
        .zip(block_sums.par_iter_mut())
        .for_each(|((out, cnt), block_sum)| {
            let mut running = 0u32;
            for (o, c) in out.iter_mut().zip(cnt) {
                *o = running;
                running += c.load(Ordering::Relaxed);
            }
            *block_sum = running;
        });

    // Phase 2: one group scans the block sums in place.
    let mut running = 0u32;
    for b in block_sums.iter_mut() {
        let s = *b;
        *b = running;
        running += s;
    }
    let total = running;

    // Phase 3: each block shifts by its block prefix.
    offsets
        .par_chunks_mut(group_width)
        .zip(block_sums.par_iter())
        .for_each(|(out, &base)| {
            if base != 0 {
                for o in out.iter_mut() {
                    *o += base;
                }
            }
        });

    total
}
