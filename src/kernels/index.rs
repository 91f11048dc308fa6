// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Indexer Kernels Module** - *Group-Local Shift and Fill Positions*
//!
//! These kernels never touch values: they emit position vectors a gather can
//! apply afterwards. `-1` marks "no source position" and gathers as missing.

use minarrow::{Bitmask, vec64};

use crate::errors::KernelError;
use crate::utils::{check_len, check_mask};

/// Computes the source position for every row after shifting by `periods`
/// within each group.
///
/// Positive `periods` shifts forward (row `i` receives the value of the
/// `periods`-th earlier row of its group), negative shifts backward. Rows
/// labelled `-1` map to `-1`, as do the first (or last) `|periods|` rows of
/// every group.
///
/// A per-group ring buffer of the last `|periods|` positions is maintained
/// while walking the rows in the signed direction; a slot is emitted the
/// moment it is about to be overwritten.
pub fn group_shift_indexer(
    out: &mut [i64],
    labels: &[i64],
    ngroups: usize,
    periods: i64,
) -> Result<(), KernelError> {
    let fname = "group_shift_indexer";
    check_len(fname, out.len(), labels.len())?;
    let n = labels.len();

    if periods == 0 {
        for i in 0..n {
            out[i] = if labels[i] < 0 { -1 } else { i as i64 };
        }
        return Ok(());
    }

    let (window, offset, sign): (usize, i64, i64) = if periods < 0 {
        ((-periods) as usize, n as i64 - 1, -1)
    } else {
        (periods as usize, 0, 1)
    };

    let mut label_seen = vec64![0i64; ngroups];
    let mut label_indexer = vec64![0i64; ngroups * window];

    for i in 0..n {
        // reverse iteration when shifting backwards
        let ii = (offset + sign * i as i64) as usize;
        let lab = labels[ii];
        if lab == -1 {
            out[ii] = -1;
            continue;
        }
        let lab = lab as usize;
        label_seen[lab] += 1;
        let slot = lab * window + (label_seen[lab] % window as i64) as usize;
        out[ii] = if label_seen[lab] > window as i64 {
            label_indexer[slot]
        } else {
            -1
        };
        label_indexer[slot] = ii as i64;
    }
    Ok(())
}

/// Computes the source position for a group-local forward or backward fill.
///
/// `sorted_labels` holds a stable argsort of the label vector (the caller
/// reverses it for a backward fill); `mask` is the validity of the value
/// column (cleared bit = missing). Non-missing rows map to themselves;
/// missing rows map to the most recent non-missing position of their group,
/// subject to `limit` consecutive fills (`-1` = unbounded). With `dropna`
/// set, rows labelled `-1` map to `-1` instead of forming their own group.
pub fn group_fillna_indexer(
    out: &mut [i64],
    labels: &[i64],
    sorted_labels: &[i64],
    mask: &Bitmask,
    limit: i64,
    dropna: bool,
) -> Result<(), KernelError> {
    let fname = "group_fillna_indexer";
    let n = out.len();
    check_len(fname, labels.len(), n)?;
    check_len(fname, sorted_labels.len(), n)?;
    check_mask(fname, Some(mask), n)?;

    let mut curr_fill_idx: i64 = -1;
    let mut filled_vals: i64 = 0;

    for i in 0..n {
        let idx = sorted_labels[i] as usize;
        if dropna && labels[idx] == -1 {
            curr_fill_idx = -1;
        } else if !mask.get(idx) {
            // missing: stop filling once the limit is hit
            if limit != -1 && filled_vals >= limit {
                curr_fill_idx = -1;
            }
            filled_vals += 1;
        } else {
            filled_vals = 0;
            curr_fill_idx = idx as i64;
        }

        out[idx] = curr_fill_idx;

        // group boundary: reset the carry and the counter
        if i == n - 1 || labels[idx] != labels[sorted_labels[i + 1] as usize] {
            curr_fill_idx = -1;
            filled_vals = 0;
        }
    }
    Ok(())
}
