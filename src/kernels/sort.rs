// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Ordering Kernels Module** - *Selection, Label Sorting and Gather*
//!
//! The ordering primitives the aggregation kernels build on: a total
//! floating-point comparator, in-place partial selection (`kth_smallest`),
//! a stable counting-sort of the group label vector, and a gather.

use std::cmp::Ordering;

use minarrow::{Vec64, vec64};
use num_traits::Float;

use crate::types::GroupValue;

/// Total ordering for floating-point values.
///
/// NaN sorts greater than every number, including `+inf`, so selection can
/// push missing values to the tail of a partition. `-0.0` and `+0.0` compare
/// equal; the kernels never need to distinguish them.
#[inline(always)]
pub fn total_cmp_f<T: Float>(a: &T, b: &T) -> Ordering {
    match a.partial_cmp(b) {
        Some(ord) => ord,
        None => {
            if a.is_nan() {
                if b.is_nan() { Ordering::Equal } else { Ordering::Greater }
            } else {
                Ordering::Less
            }
        }
    }
}

/// Selects the k-th smallest element (0-based) of `a` by partitioning in
/// place. The slice is reordered so that everything left of position `k`
/// compares less-or-equal and everything right compares greater-or-equal.
#[inline]
pub fn kth_smallest_f<T: Float>(a: &mut [T], k: usize) -> T {
    let (_, nth, _) = a.select_nth_unstable_by(k, total_cmp_f);
    *nth
}

/// Stable counting-sort argsort of a group label vector.
///
/// Returns `(indexer, bucket_counts)` where `indexer` lists the row indices
/// ordered by label, ascending row index within each label, and
/// `bucket_counts` has `ngroups + 1` entries: slot 0 is the size of the
/// missing-label (`-1`) bucket, slot `g + 1` the size of group `g`. The
/// missing-label rows occupy the front of `indexer`.
///
/// This is the partition index the median kernel uses to carve the value
/// matrix into contiguous per-group spans.
pub fn group_sort_indexer(labels: &[i64], ngroups: usize) -> (Vec64<i64>, Vec64<i64>) {
    let n = labels.len();
    let mut counts = vec64![0i64; ngroups + 1];
    for &lab in labels {
        counts[(lab + 1) as usize] += 1;
    }

    // exclusive prefix sums become write cursors
    let mut cursor = vec64![0i64; ngroups + 1];
    for g in 1..ngroups + 1 {
        cursor[g] = cursor[g - 1] + counts[g - 1];
    }

    let mut indexer = vec64![0i64; n];
    for (i, &lab) in labels.iter().enumerate() {
        let g = (lab + 1) as usize;
        indexer[cursor[g] as usize] = i as i64;
        cursor[g] += 1;
    }
    (indexer, counts)
}

/// Gathers `values` by `indices`. A negative index yields the element
/// type's missing representation, so unsigned callers must not pass one.
pub fn take<T: GroupValue>(values: &[T], indices: &[i64]) -> Vec64<T> {
    let mut out = Vec64::with_capacity(indices.len());
    for &ix in indices {
        out.push(if ix < 0 {
            T::na_value()
        } else {
            values[ix as usize]
        });
    }
    out
}
