// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Order-Statistic Kernels Module** - *Grouped Median and Quantile*
//!
//! Median gathers each group's column values into a contiguous scratch span
//! (via the stable label counting-sort) so the selection can partition in
//! place. Quantile rides a caller-provided sort permutation ordering rows by
//! label and then value, with missing entries at the tail of each group, and
//! supports five interpolation modes.

use minarrow::{Bitmask, Vec64, vec64};
use num_traits::{Float, ToPrimitive};

use crate::errors::KernelError;
use crate::kernels::sort::{group_sort_indexer, kth_smallest_f};
use crate::types::{GroupValue, Interpolation, cell_is_na};
use crate::utils::{check_frame, check_len, check_mask, check_min_count_disallowed};

/// Group-wise median for floating-point values.
///
/// Rows are partitioned into contiguous per-group spans with the stable
/// label sort; each span's non-missing values feed an in-place selection.
/// An even count averages the two middle order statistics. Groups with no
/// non-missing entries emit NaN. `counts` receives every group's full row
/// tally (missing rows included).
pub fn group_median_float<T>(
    out: &mut [T],
    counts: &mut [i64],
    values: &[T],
    labels: &[i64],
    ncols: usize,
    mask: Option<&Bitmask>,
    mut result_mask: Option<&mut Bitmask>,
    min_count: i64,
) -> Result<(), KernelError>
where
    T: Float + GroupValue,
{
    let fname = "group_median_float";
    check_min_count_disallowed(fname, min_count)?;
    let nrows = check_frame(fname, values.len(), ncols, labels.len())?;
    let ngroups = counts.len();
    check_len(fname, out.len(), ngroups * ncols)?;
    check_mask(fname, mask, values.len())?;
    check_mask(fname, result_mask.as_deref(), out.len())?;

    let (indexer, sizes) = group_sort_indexer(labels, ngroups);
    for g in 0..ngroups {
        counts[g] = sizes[g + 1];
    }
    let na_block = sizes[0] as usize;

    let mut scratch: Vec64<T> = Vec64::with_capacity(nrows);
    for j in 0..ncols {
        let mut start = na_block;
        for g in 0..ngroups {
            let size = sizes[g + 1] as usize;
            scratch.clear();
            for &row in indexer[start..start + size].iter() {
                let pos = row as usize * ncols + j;
                let val = values[pos];
                if !cell_is_na(val, false, mask, pos) {
                    scratch.push(val);
                }
            }
            start += size;

            let oidx = g * ncols + j;
            let m = scratch.len();
            if m == 0 {
                match result_mask.as_deref_mut() {
                    Some(rm) => {
                        rm.set(oidx, false);
                        out[oidx] = T::zero();
                    }
                    None => out[oidx] = T::na_value(),
                }
                continue;
            }
            let mid = m / 2;
            let median = if m % 2 == 1 {
                kth_smallest_f(&mut scratch, mid)
            } else {
                let hi = kth_smallest_f(&mut scratch, mid);
                let lo = kth_smallest_f(&mut scratch, mid - 1);
                (lo + hi) / T::from(2.0).unwrap()
            };
            out[oidx] = median;
            if let Some(rm) = result_mask.as_deref_mut() {
                rm.set(oidx, true);
            }
        }
    }
    Ok(())
}

/// Group-wise interpolated quantiles over a single value column.
///
/// `sort_indexer` must order the rows by label and then value ascending,
/// with missing values at the tail of each group's span and `-1`-labelled
/// rows after every real group. `out` is `ngroups x qs.len()`, always `f64`.
/// Probabilities outside `[0, 1]` are rejected before any computation.
pub fn group_quantile<T>(
    out: &mut [f64],
    values: &[T],
    labels: &[i64],
    mask: &Bitmask,
    sort_indexer: &[i64],
    qs: &[f64],
    interpolation: Interpolation,
    mut result_mask: Option<&mut Bitmask>,
) -> Result<(), KernelError>
where
    T: Copy + ToPrimitive,
{
    let fname = "group_quantile";
    for &q in qs {
        if !(0.0..=1.0).contains(&q) {
            return Err(KernelError::InvalidArguments(format!(
                "{} => probability {} outside [0, 1]",
                fname, q
            )));
        }
    }
    let nqs = qs.len();
    if nqs == 0 {
        return check_len(fname, out.len(), 0);
    }
    if out.len() % nqs != 0 {
        return Err(KernelError::LengthMismatch(format!(
            "{} => output length {} is not a multiple of qs length {}",
            fname,
            out.len(),
            nqs
        )));
    }
    let ngroups = out.len() / nqs;
    let nrows = check_frame(fname, values.len(), 1, labels.len())?;
    check_len(fname, sort_indexer.len(), nrows)?;
    check_mask(fname, Some(mask), nrows)?;
    check_mask(fname, result_mask.as_deref(), out.len())?;

    let mut grp_counts = vec64![0i64; ngroups];
    let mut non_na_counts = vec64![0i64; ngroups];
    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        grp_counts[lab as usize] += 1;
        if unsafe { mask.get_unchecked(i) } {
            non_na_counts[lab as usize] += 1;
        }
    }

    let mut grp_start = 0usize;
    for g in 0..ngroups {
        let non_na = non_na_counts[g];
        if non_na == 0 {
            for k in 0..nqs {
                let oidx = g * nqs + k;
                match result_mask.as_deref_mut() {
                    Some(rm) => {
                        rm.set(oidx, false);
                        out[oidx] = 0.0;
                    }
                    None => out[oidx] = f64::NAN,
                }
            }
        } else {
            for k in 0..nqs {
                let q = qs[k];
                let pos = q * (non_na - 1) as f64;
                let idx = grp_start + pos as usize;
                let frac = pos - pos.trunc();
                let v_lo = values[sort_indexer[idx] as usize].to_f64().unwrap();
                let result = if frac == 0.0 || interpolation == Interpolation::Lower {
                    v_lo
                } else {
                    let v_hi = values[sort_indexer[idx + 1] as usize].to_f64().unwrap();
                    match interpolation {
                        Interpolation::Linear => v_lo + (v_hi - v_lo) * frac,
                        Interpolation::Higher => v_hi,
                        Interpolation::Midpoint => (v_lo + v_hi) * 0.5,
                        Interpolation::Nearest => {
                            if frac > 0.5 || (frac == 0.5 && q > 0.5) {
                                v_hi
                            } else {
                                v_lo
                            }
                        }
                        Interpolation::Lower => unreachable!(),
                    }
                };
                let oidx = g * nqs + k;
                out[oidx] = result;
                if let Some(rm) = result_mask.as_deref_mut() {
                    rm.set(oidx, true);
                }
            }
        }
        grp_start += grp_counts[g] as usize;
    }
    Ok(())
}
