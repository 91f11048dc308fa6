// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Aggregation Kernels Module** - *Group-Wise Statistical Reductions*
//!
//! Null-aware reduction kernels over a row-partitioned value matrix. Every
//! reducer shares the same two-phase structure:
//!
//! 1. **Accumulate** - one streaming pass over the rows; rows labelled `-1`
//!    are skipped, `counts` tallies every surviving row once, and per-cell
//!    observation counts track the non-missing contributions per group and
//!    column.
//! 2. **Finalize** - one pass over the `ngroups x ncols` output; cells whose
//!    observation count falls below the kernel's effective min-count receive
//!    the element type's missing representation (or a cleared result-mask
//!    bit when the caller uses the nullable representation).
//!
//! ## Numerical care
//! - Floating and complex sums (and means) use Kahan compensation, keeping
//!   the rounding error independent of the group length.
//! - Variance uses Welford's online mean/M2 recurrence.
//!
//! ## Missing-value output
//! Signed 64-bit cells emit the `NAT` sentinel, floats emit NaN, complex
//! cells emit `NaN + NaN·i`, object cells emit `None`. Unsigned 64-bit has
//! no in-band representation: a below-min-count cell without a result mask
//! raises [`KernelError::EmptyGroupUnsigned`] after the accumulation pass.

use std::ops::{Add, Sub};

use minarrow::{Bitmask, vec64};
use num_complex::Complex;
use num_traits::{Float, Zero};

use crate::errors::KernelError;
use crate::types::{GroupValue, RangeSentinel, ValTest, cell_is_na};
use crate::utils::{check_frame, check_len, check_mask, check_min_count_disallowed};

// --- Compensated accumulation helpers ----------------------------------------

/// One Kahan-compensated accumulation step.
///
/// Keeps a running correction term so the accumulated rounding error stays
/// bounded by a small constant times the sum of absolute addends, independent
/// of how many values have been folded in. Also serves the complex
/// categories, where the compensation applies component-wise.
#[inline(always)]
pub(crate) fn kahan_add<T>(sum: &mut T, compensation: &mut T, val: T)
where
    T: Copy + Add<Output = T> + Sub<Output = T>,
{
    let y = val - *compensation;
    let t = *sum + y;
    *compensation = (t - *sum) - y;
    *sum = t;
}

// --- Shared finalize ---------------------------------------------------------

/// Writes the finalize pass for reducers with a min-count policy: cells with
/// fewer than `min_count` observations become missing, the rest receive the
/// accumulated result.
///
/// The unsigned-empty-group failure cannot be raised from inside the loop
/// (the result mask may still absorb later cells), so a flag is carried and
/// the error surfaces once the pass completes.
fn check_below_mincount<T: GroupValue + Zero>(
    fname: &str,
    out: &mut [T],
    resx: &[T],
    nobs: &[i64],
    min_count: i64,
    mut result_mask: Option<&mut Bitmask>,
) -> Result<(), KernelError> {
    let mut unsigned_na = false;
    for idx in 0..out.len() {
        if nobs[idx] < min_count {
            match result_mask.as_deref_mut() {
                Some(rm) => {
                    rm.set(idx, false);
                    // deterministic filler behind the mask
                    out[idx] = T::zero();
                }
                None => {
                    if T::NA_REPRESENTABLE {
                        out[idx] = T::na_value();
                    } else {
                        unsigned_na = true;
                    }
                }
            }
        } else {
            out[idx] = resx[idx];
            if let Some(rm) = result_mask.as_deref_mut() {
                rm.set(idx, true);
            }
        }
    }
    if unsigned_na {
        return Err(KernelError::EmptyGroupUnsigned(format!(
            "{} => output cell needs a missing value but the element type has \
             no in-band representation; supply a result mask",
            fname
        )));
    }
    Ok(())
}

/// Validates the common reducer buffer shapes and returns `(nrows, ngroups)`.
fn check_reduce_shape<T, O>(
    fname: &str,
    out: &[O],
    counts: &[i64],
    values: &[T],
    labels: &[i64],
    ncols: usize,
    mask: Option<&Bitmask>,
    result_mask: Option<&Bitmask>,
) -> Result<(usize, usize), KernelError> {
    let nrows = check_frame(fname, values.len(), ncols, labels.len())?;
    let ngroups = counts.len();
    check_len(fname, out.len(), ngroups * ncols)?;
    check_mask(fname, mask, values.len())?;
    check_mask(fname, result_mask, out.len())?;
    Ok((nrows, ngroups))
}

// --- Sum ---------------------------------------------------------------------

/// Kahan-compensated accumulate/finalize body shared by the float and
/// complex sum kernels.
fn group_sum_compensated<E>(
    fname: &str,
    out: &mut [E],
    counts: &mut [i64],
    values: &[E],
    labels: &[i64],
    ncols: usize,
    mask: Option<&Bitmask>,
    result_mask: Option<&mut Bitmask>,
    min_count: i64,
) -> Result<(), KernelError>
where
    E: GroupValue + Zero + Sub<Output = E>,
{
    let (nrows, ngroups) = check_reduce_shape(
        fname,
        out,
        counts,
        values,
        labels,
        ncols,
        mask,
        result_mask.as_deref(),
    )?;

    let mut nobs = vec64![0i64; ngroups * ncols];
    let mut sumx = vec64![E::zero(); ngroups * ncols];
    let mut compensation = vec64![E::zero(); ngroups * ncols];

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        counts[lab as usize] += 1;
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let val = values[row + j];
            if cell_is_na(val, false, mask, row + j) {
                continue;
            }
            nobs[grp + j] += 1;
            kahan_add(&mut sumx[grp + j], &mut compensation[grp + j], val);
        }
    }

    check_below_mincount(fname, out, &sumx, &nobs, min_count.max(0), result_mask)
}

/// Group-wise Kahan-compensated sum for floating-point values.
///
/// `min_count` is applied exactly as given (default 0): a cell with fewer
/// non-missing contributions becomes missing, so an empty group sums to zero
/// only when `min_count == 0`.
pub fn group_sum_float<T>(
    out: &mut [T],
    counts: &mut [i64],
    values: &[T],
    labels: &[i64],
    ncols: usize,
    mask: Option<&Bitmask>,
    result_mask: Option<&mut Bitmask>,
    min_count: i64,
) -> Result<(), KernelError>
where
    T: Float + GroupValue,
{
    group_sum_compensated(
        "group_sum_float",
        out,
        counts,
        values,
        labels,
        ncols,
        mask,
        result_mask,
        min_count,
    )
}

/// Group-wise compensated sum for complex values; the Kahan correction is
/// applied component-wise.
pub fn group_sum_complex<T>(
    out: &mut [Complex<T>],
    counts: &mut [i64],
    values: &[Complex<T>],
    labels: &[i64],
    ncols: usize,
    mask: Option<&Bitmask>,
    result_mask: Option<&mut Bitmask>,
    min_count: i64,
) -> Result<(), KernelError>
where
    T: Float + 'static,
{
    group_sum_compensated(
        "group_sum_complex",
        out,
        counts,
        values,
        labels,
        ncols,
        mask,
        result_mask,
        min_count,
    )
}

/// Group-wise sum for signed 64-bit values.
///
/// Uses plain wrapping accumulation (no compensation is needed for exact
/// integer arithmetic). With `is_datetimelike` set, the `NAT` sentinel is
/// treated as missing on input and written for missing output cells.
pub fn group_sum_int(
    out: &mut [i64],
    counts: &mut [i64],
    values: &[i64],
    labels: &[i64],
    ncols: usize,
    mask: Option<&Bitmask>,
    result_mask: Option<&mut Bitmask>,
    min_count: i64,
    is_datetimelike: bool,
) -> Result<(), KernelError> {
    let fname = "group_sum_int";
    let (nrows, ngroups) = check_reduce_shape(
        fname,
        out,
        counts,
        values,
        labels,
        ncols,
        mask,
        result_mask.as_deref(),
    )?;

    let mut nobs = vec64![0i64; ngroups * ncols];
    let mut sumx = vec64![0i64; ngroups * ncols];

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        counts[lab as usize] += 1;
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let val = values[row + j];
            if cell_is_na(val, is_datetimelike, mask, row + j) {
                continue;
            }
            nobs[grp + j] += 1;
            sumx[grp + j] = sumx[grp + j].wrapping_add(val);
        }
    }

    check_below_mincount(fname, out, &sumx, &nobs, min_count.max(0), result_mask)
}

/// Group-wise sum for unsigned 64-bit values.
///
/// Missingness can only arrive through the external mask. A below-min-count
/// output cell without a result mask fails with `EmptyGroupUnsigned` once
/// the accumulation pass has completed.
pub fn group_sum_uint(
    out: &mut [u64],
    counts: &mut [i64],
    values: &[u64],
    labels: &[i64],
    ncols: usize,
    mask: Option<&Bitmask>,
    result_mask: Option<&mut Bitmask>,
    min_count: i64,
) -> Result<(), KernelError> {
    let fname = "group_sum_uint";
    let (nrows, ngroups) = check_reduce_shape(
        fname,
        out,
        counts,
        values,
        labels,
        ncols,
        mask,
        result_mask.as_deref(),
    )?;

    let mut nobs = vec64![0i64; ngroups * ncols];
    let mut sumx = vec64![0u64; ngroups * ncols];

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        counts[lab as usize] += 1;
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let val = values[row + j];
            if cell_is_na(val, false, mask, row + j) {
                continue;
            }
            nobs[grp + j] += 1;
            sumx[grp + j] = sumx[grp + j].wrapping_add(val);
        }
    }

    check_below_mincount(fname, out, &sumx, &nobs, min_count.max(0), result_mask)
}

/// Group-wise sum for object elements with a caller-provided missing test.
///
/// Accumulation is plain (no compensation); the first contribution to a cell
/// is *assigned* rather than added, so non-numeric objects are never coerced
/// through a zero seed. Missing output cells are `None`.
pub fn group_sum_object<T, F>(
    out: &mut [Option<T>],
    counts: &mut [i64],
    values: &[T],
    labels: &[i64],
    ncols: usize,
    is_na: F,
    min_count: i64,
) -> Result<(), KernelError>
where
    T: Clone + Add<Output = T>,
    F: Fn(&T) -> bool,
{
    let fname = "group_sum_object";
    let nrows = check_frame(fname, values.len(), ncols, labels.len())?;
    let ngroups = counts.len();
    check_len(fname, out.len(), ngroups * ncols)?;

    let mut nobs = vec64![0i64; ngroups * ncols];
    let mut resx: Vec<Option<T>> = vec![None; ngroups * ncols];

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        counts[lab as usize] += 1;
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let val = &values[row + j];
            if is_na(val) {
                continue;
            }
            nobs[grp + j] += 1;
            resx[grp + j] = match resx[grp + j].take() {
                None => Some(val.clone()),
                Some(acc) => Some(acc + val.clone()),
            };
        }
    }

    let min_count = min_count.max(0);
    for idx in 0..out.len() {
        out[idx] = if nobs[idx] < min_count {
            None
        } else {
            resx[idx].take()
        };
    }
    Ok(())
}

// --- Product -----------------------------------------------------------------

/// Group-wise product for floating-point values. `min_count` is applied
/// exactly as given (default 0), so an empty group yields one.
pub fn group_prod_float<T>(
    out: &mut [T],
    counts: &mut [i64],
    values: &[T],
    labels: &[i64],
    ncols: usize,
    mask: Option<&Bitmask>,
    result_mask: Option<&mut Bitmask>,
    min_count: i64,
) -> Result<(), KernelError>
where
    T: Float + GroupValue,
{
    let fname = "group_prod_float";
    let (nrows, ngroups) = check_reduce_shape(
        fname,
        out,
        counts,
        values,
        labels,
        ncols,
        mask,
        result_mask.as_deref(),
    )?;

    let mut nobs = vec64![0i64; ngroups * ncols];
    let mut prodx = vec64![T::one(); ngroups * ncols];

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        counts[lab as usize] += 1;
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let val = values[row + j];
            if cell_is_na(val, false, mask, row + j) {
                continue;
            }
            nobs[grp + j] += 1;
            prodx[grp + j] = prodx[grp + j] * val;
        }
    }

    check_below_mincount(fname, out, &prodx, &nobs, min_count.max(0), result_mask)
}

// --- Mean --------------------------------------------------------------------

/// Group-wise mean for floating-point values, Kahan-compensated.
///
/// `min_count` must be left at `-1`; the threshold is fixed at one
/// observation and empty cells emit NaN.
pub fn group_mean_float<T>(
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
    let fname = "group_mean_float";
    check_min_count_disallowed(fname, min_count)?;
    let (nrows, ngroups) = check_reduce_shape(
        fname,
        out,
        counts,
        values,
        labels,
        ncols,
        mask,
        result_mask.as_deref(),
    )?;

    let mut nobs = vec64![0i64; ngroups * ncols];
    let mut sumx = vec64![T::zero(); ngroups * ncols];
    let mut compensation = vec64![T::zero(); ngroups * ncols];

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        counts[lab as usize] += 1;
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let val = values[row + j];
            if cell_is_na(val, false, mask, row + j) {
                continue;
            }
            nobs[grp + j] += 1;
            kahan_add(&mut sumx[grp + j], &mut compensation[grp + j], val);
        }
    }

    for idx in 0..out.len() {
        let count = nobs[idx];
        if count == 0 {
            match result_mask.as_deref_mut() {
                Some(rm) => {
                    rm.set(idx, false);
                    out[idx] = T::zero();
                }
                None => out[idx] = T::na_value(),
            }
        } else {
            out[idx] = sumx[idx] / T::from(count).unwrap();
            if let Some(rm) = result_mask.as_deref_mut() {
                rm.set(idx, true);
            }
        }
    }
    Ok(())
}

/// Group-wise mean for complex values, compensated component-wise.
pub fn group_mean_complex<T>(
    out: &mut [Complex<T>],
    counts: &mut [i64],
    values: &[Complex<T>],
    labels: &[i64],
    ncols: usize,
    mask: Option<&Bitmask>,
    mut result_mask: Option<&mut Bitmask>,
    min_count: i64,
) -> Result<(), KernelError>
where
    T: Float + 'static,
{
    let fname = "group_mean_complex";
    check_min_count_disallowed(fname, min_count)?;
    let (nrows, ngroups) = check_reduce_shape(
        fname,
        out,
        counts,
        values,
        labels,
        ncols,
        mask,
        result_mask.as_deref(),
    )?;

    let mut nobs = vec64![0i64; ngroups * ncols];
    let mut sumx = vec64![Complex::<T>::zero(); ngroups * ncols];
    let mut compensation = vec64![Complex::<T>::zero(); ngroups * ncols];

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        counts[lab as usize] += 1;
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let val = values[row + j];
            if cell_is_na(val, false, mask, row + j) {
                continue;
            }
            nobs[grp + j] += 1;
            kahan_add(&mut sumx[grp + j], &mut compensation[grp + j], val);
        }
    }

    for idx in 0..out.len() {
        let count = nobs[idx];
        if count == 0 {
            match result_mask.as_deref_mut() {
                Some(rm) => {
                    rm.set(idx, false);
                    out[idx] = Complex::zero();
                }
                None => out[idx] = Complex::na_value(),
            }
        } else {
            let n = Complex::new(T::from(count).unwrap(), T::zero());
            out[idx] = sumx[idx] / n;
            if let Some(rm) = result_mask.as_deref_mut() {
                rm.set(idx, true);
            }
        }
    }
    Ok(())
}

/// Group-wise mean for datetime-like signed 64-bit values.
///
/// The division truncates toward zero, matching integer semantics for epoch
/// offsets; empty cells emit the `NAT` sentinel.
pub fn group_mean_int(
    out: &mut [i64],
    counts: &mut [i64],
    values: &[i64],
    labels: &[i64],
    ncols: usize,
    mask: Option<&Bitmask>,
    mut result_mask: Option<&mut Bitmask>,
    min_count: i64,
    is_datetimelike: bool,
) -> Result<(), KernelError> {
    let fname = "group_mean_int";
    check_min_count_disallowed(fname, min_count)?;
    let (nrows, ngroups) = check_reduce_shape(
        fname,
        out,
        counts,
        values,
        labels,
        ncols,
        mask,
        result_mask.as_deref(),
    )?;

    let mut nobs = vec64![0i64; ngroups * ncols];
    let mut sumx = vec64![0i64; ngroups * ncols];

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        counts[lab as usize] += 1;
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let val = values[row + j];
            if cell_is_na(val, is_datetimelike, mask, row + j) {
                continue;
            }
            nobs[grp + j] += 1;
            sumx[grp + j] = sumx[grp + j].wrapping_add(val);
        }
    }

    for idx in 0..out.len() {
        let count = nobs[idx];
        if count == 0 {
            match result_mask.as_deref_mut() {
                Some(rm) => {
                    rm.set(idx, false);
                    out[idx] = 0;
                }
                None => out[idx] = i64::na_value(),
            }
        } else {
            out[idx] = sumx[idx] / count;
            if let Some(rm) = result_mask.as_deref_mut() {
                rm.set(idx, true);
            }
        }
    }
    Ok(())
}

// --- Variance ----------------------------------------------------------------

/// Group-wise variance via Welford's online recurrence.
///
/// The M2 statistic accumulates directly in `out`; cells with `nobs <= ddof`
/// emit NaN at finalize.
pub fn group_var_float<T>(
    out: &mut [T],
    counts: &mut [i64],
    values: &[T],
    labels: &[i64],
    ncols: usize,
    mask: Option<&Bitmask>,
    mut result_mask: Option<&mut Bitmask>,
    ddof: i64,
) -> Result<(), KernelError>
where
    T: Float + GroupValue,
{
    let fname = "group_var_float";
    let (nrows, ngroups) = check_reduce_shape(
        fname,
        out,
        counts,
        values,
        labels,
        ncols,
        mask,
        result_mask.as_deref(),
    )?;

    let mut nobs = vec64![0i64; ngroups * ncols];
    let mut mean = vec64![T::zero(); ngroups * ncols];
    for cell in out.iter_mut() {
        *cell = T::zero();
    }

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        counts[lab as usize] += 1;
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let val = values[row + j];
            if cell_is_na(val, false, mask, row + j) {
                continue;
            }
            nobs[grp + j] += 1;
            let n = T::from(nobs[grp + j]).unwrap();
            let delta = val - mean[grp + j];
            mean[grp + j] = mean[grp + j] + delta / n;
            out[grp + j] = out[grp + j] + delta * (val - mean[grp + j]);
        }
    }

    for idx in 0..out.len() {
        let ct = nobs[idx];
        if ct <= ddof {
            match result_mask.as_deref_mut() {
                Some(rm) => {
                    rm.set(idx, false);
                    out[idx] = T::zero();
                }
                None => out[idx] = T::na_value(),
            }
        } else {
            out[idx] = out[idx] / T::from(ct - ddof).unwrap();
            if let Some(rm) = result_mask.as_deref_mut() {
                rm.set(idx, true);
            }
        }
    }
    Ok(())
}

// --- Min / Max ---------------------------------------------------------------

/// Shared running-extremum body for the grouped min and max reductions.
fn group_min_max<T>(
    fname: &str,
    out: &mut [T],
    counts: &mut [i64],
    values: &[T],
    labels: &[i64],
    ncols: usize,
    mask: Option<&Bitmask>,
    result_mask: Option<&mut Bitmask>,
    min_count: i64,
    is_datetimelike: bool,
    compute_max: bool,
) -> Result<(), KernelError>
where
    T: RangeSentinel + PartialOrd + Zero,
{
    let (nrows, ngroups) = check_reduce_shape(
        fname,
        out,
        counts,
        values,
        labels,
        ncols,
        mask,
        result_mask.as_deref(),
    )?;

    let mut nobs = vec64![0i64; ngroups * ncols];
    let seed = if compute_max {
        T::range_min()
    } else {
        T::range_max()
    };
    let mut extrema = vec64![seed; ngroups * ncols];

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        counts[lab as usize] += 1;
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let val = values[row + j];
            if cell_is_na(val, is_datetimelike, mask, row + j) {
                continue;
            }
            nobs[grp + j] += 1;
            if compute_max {
                if val > extrema[grp + j] {
                    extrema[grp + j] = val;
                }
            } else if val < extrema[grp + j] {
                extrema[grp + j] = val;
            }
        }
    }

    check_below_mincount(fname, out, &extrema, &nobs, min_count.max(1), result_mask)
}

/// Group-wise minimum. The effective min-count is `max(min_count, 1)`, so a
/// group with no observations is always missing.
pub fn group_min<T>(
    out: &mut [T],
    counts: &mut [i64],
    values: &[T],
    labels: &[i64],
    ncols: usize,
    mask: Option<&Bitmask>,
    result_mask: Option<&mut Bitmask>,
    min_count: i64,
    is_datetimelike: bool,
) -> Result<(), KernelError>
where
    T: RangeSentinel + PartialOrd + Zero,
{
    group_min_max(
        "group_min",
        out,
        counts,
        values,
        labels,
        ncols,
        mask,
        result_mask,
        min_count,
        is_datetimelike,
        false,
    )
}

/// Group-wise maximum. The effective min-count is `max(min_count, 1)`.
pub fn group_max<T>(
    out: &mut [T],
    counts: &mut [i64],
    values: &[T],
    labels: &[i64],
    ncols: usize,
    mask: Option<&Bitmask>,
    result_mask: Option<&mut Bitmask>,
    min_count: i64,
    is_datetimelike: bool,
) -> Result<(), KernelError>
where
    T: RangeSentinel + PartialOrd + Zero,
{
    group_min_max(
        "group_max",
        out,
        counts,
        values,
        labels,
        ncols,
        mask,
        result_mask,
        min_count,
        is_datetimelike,
        true,
    )
}

// --- First / Nth / Last ------------------------------------------------------

/// Group-wise n-th non-missing observation (`rank` is 1-based).
///
/// The cell freezes on exactly the `rank`-th non-missing value; later
/// observations never overwrite it. Cells whose group never reaches `rank`
/// observations are missing regardless of min-count.
pub fn group_nth<T>(
    out: &mut [T],
    counts: &mut [i64],
    values: &[T],
    labels: &[i64],
    ncols: usize,
    mask: Option<&Bitmask>,
    result_mask: Option<&mut Bitmask>,
    min_count: i64,
    rank: i64,
    is_datetimelike: bool,
) -> Result<(), KernelError>
where
    T: GroupValue + Zero,
{
    let fname = "group_nth";
    let (nrows, ngroups) = check_reduce_shape(
        fname,
        out,
        counts,
        values,
        labels,
        ncols,
        mask,
        result_mask.as_deref(),
    )?;

    let mut nobs = vec64![0i64; ngroups * ncols];
    let mut resx = vec64![T::zero(); ngroups * ncols];
    let mut seen = Bitmask::new_set_all(ngroups * ncols, false);

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        counts[lab as usize] += 1;
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let val = values[row + j];
            if cell_is_na(val, is_datetimelike, mask, row + j) {
                continue;
            }
            nobs[grp + j] += 1;
            if nobs[grp + j] == rank {
                resx[grp + j] = val;
                seen.set(grp + j, true);
            }
        }
    }

    // a cell that never reached `rank` observations holds nothing
    for idx in 0..nobs.len() {
        if !seen.get(idx) {
            nobs[idx] = 0;
        }
    }

    check_below_mincount(fname, out, &resx, &nobs, min_count.max(1), result_mask)
}

/// Group-wise first non-missing observation: `group_nth` with rank 1.
pub fn group_first<T>(
    out: &mut [T],
    counts: &mut [i64],
    values: &[T],
    labels: &[i64],
    ncols: usize,
    mask: Option<&Bitmask>,
    result_mask: Option<&mut Bitmask>,
    min_count: i64,
    is_datetimelike: bool,
) -> Result<(), KernelError>
where
    T: GroupValue + Zero,
{
    group_nth(
        out,
        counts,
        values,
        labels,
        ncols,
        mask,
        result_mask,
        min_count,
        1,
        is_datetimelike,
    )
}

/// Group-wise last non-missing observation (overwrite on every non-missing).
pub fn group_last<T>(
    out: &mut [T],
    counts: &mut [i64],
    values: &[T],
    labels: &[i64],
    ncols: usize,
    mask: Option<&Bitmask>,
    result_mask: Option<&mut Bitmask>,
    min_count: i64,
    is_datetimelike: bool,
) -> Result<(), KernelError>
where
    T: GroupValue + Zero,
{
    let fname = "group_last";
    let (nrows, ngroups) = check_reduce_shape(
        fname,
        out,
        counts,
        values,
        labels,
        ncols,
        mask,
        result_mask.as_deref(),
    )?;

    let mut nobs = vec64![0i64; ngroups * ncols];
    let mut resx = vec64![T::zero(); ngroups * ncols];

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        counts[lab as usize] += 1;
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let val = values[row + j];
            if cell_is_na(val, is_datetimelike, mask, row + j) {
                continue;
            }
            nobs[grp + j] += 1;
            resx[grp + j] = val;
        }
    }

    check_below_mincount(fname, out, &resx, &nobs, min_count.max(1), result_mask)
}

/// Object-element n-th non-missing observation (`rank` is 1-based).
pub fn group_nth_object<T, F>(
    out: &mut [Option<T>],
    counts: &mut [i64],
    values: &[T],
    labels: &[i64],
    ncols: usize,
    is_na: F,
    min_count: i64,
    rank: i64,
) -> Result<(), KernelError>
where
    T: Clone,
    F: Fn(&T) -> bool,
{
    let fname = "group_nth_object";
    let nrows = check_frame(fname, values.len(), ncols, labels.len())?;
    let ngroups = counts.len();
    check_len(fname, out.len(), ngroups * ncols)?;

    let mut nobs = vec64![0i64; ngroups * ncols];
    let mut resx: Vec<Option<T>> = vec![None; ngroups * ncols];

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        counts[lab as usize] += 1;
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let val = &values[row + j];
            if is_na(val) {
                continue;
            }
            nobs[grp + j] += 1;
            if nobs[grp + j] == rank {
                resx[grp + j] = Some(val.clone());
            }
        }
    }

    let min_count = min_count.max(1);
    for idx in 0..out.len() {
        out[idx] = if nobs[idx] < min_count {
            None
        } else {
            resx[idx].take()
        };
    }
    Ok(())
}

/// Object-element first non-missing observation.
pub fn group_first_object<T, F>(
    out: &mut [Option<T>],
    counts: &mut [i64],
    values: &[T],
    labels: &[i64],
    ncols: usize,
    is_na: F,
    min_count: i64,
) -> Result<(), KernelError>
where
    T: Clone,
    F: Fn(&T) -> bool,
{
    group_nth_object(out, counts, values, labels, ncols, is_na, min_count, 1)
}

/// Object-element last non-missing observation.
pub fn group_last_object<T, F>(
    out: &mut [Option<T>],
    counts: &mut [i64],
    values: &[T],
    labels: &[i64],
    ncols: usize,
    is_na: F,
    min_count: i64,
) -> Result<(), KernelError>
where
    T: Clone,
    F: Fn(&T) -> bool,
{
    let fname = "group_last_object";
    let nrows = check_frame(fname, values.len(), ncols, labels.len())?;
    let ngroups = counts.len();
    check_len(fname, out.len(), ngroups * ncols)?;

    let mut nobs = vec64![0i64; ngroups * ncols];
    let mut resx: Vec<Option<T>> = vec![None; ngroups * ncols];

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        counts[lab as usize] += 1;
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let val = &values[row + j];
            if is_na(val) {
                continue;
            }
            nobs[grp + j] += 1;
            resx[grp + j] = Some(val.clone());
        }
    }

    let min_count = min_count.max(1);
    for idx in 0..out.len() {
        out[idx] = if nobs[idx] < min_count {
            None
        } else {
            resx[idx].take()
        };
    }
    Ok(())
}

// --- OHLC --------------------------------------------------------------------

/// Group-wise open/high/low/close over a single value column.
///
/// `out` is `ngroups x 4` (open, high, low, close). The first non-missing
/// value in a group seeds all four columns; later values update high, low
/// and close. Groups with no non-missing entries stay NaN, while `counts`
/// still tallies every row of the group.
pub fn group_ohlc<T>(
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
    let fname = "group_ohlc";
    check_min_count_disallowed(fname, min_count)?;
    if ncols != 1 {
        return Err(KernelError::InvalidArguments(format!(
            "{} => only a single value column is supported, got {}",
            fname, ncols
        )));
    }
    let nrows = check_frame(fname, values.len(), ncols, labels.len())?;
    let ngroups = counts.len();
    check_len(fname, out.len(), ngroups * 4)?;
    check_mask(fname, mask, values.len())?;
    check_mask(fname, result_mask.as_deref(), out.len())?;

    let mut first_seen = Bitmask::new_set_all(ngroups, false);
    for cell in out.iter_mut() {
        *cell = T::na_value();
    }

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        counts[lab as usize] += 1;
        let val = values[i];
        if cell_is_na(val, false, mask, i) {
            continue;
        }
        let o = lab as usize * 4;
        if !first_seen.get(lab as usize) {
            out[o] = val;
            out[o + 1] = val;
            out[o + 2] = val;
            out[o + 3] = val;
            first_seen.set(lab as usize, true);
        } else {
            if val > out[o + 1] {
                out[o + 1] = val;
            }
            if val < out[o + 2] {
                out[o + 2] = val;
            }
            out[o + 3] = val;
        }
    }

    if let Some(rm) = result_mask.as_deref_mut() {
        for g in 0..ngroups {
            let valid = first_seen.get(g);
            for c in 0..4 {
                rm.set(g * 4 + c, valid);
            }
        }
    }
    Ok(())
}

// --- Any / All ---------------------------------------------------------------

/// Group-wise truth reduction over 0/1 values with Kleene semantics.
///
/// Output cells are `1` / `0`, or `-1` when `nullable` is set and a masked
/// cell leaves the result undetermined: with `skipna` unset, a missing cell
/// forces `-1` unless a decisive value was already absorbed. A decisive
/// value (`1` for any, `0` for all) is absorbing in all modes.
pub fn group_any_all(
    out: &mut [i8],
    values: &[i8],
    labels: &[i64],
    ncols: usize,
    mask: &Bitmask,
    val_test: ValTest,
    skipna: bool,
    nullable: bool,
) -> Result<(), KernelError> {
    let fname = "group_any_all";
    let nrows = check_frame(fname, values.len(), ncols, labels.len())?;
    if out.len() % ncols != 0 {
        return Err(KernelError::LengthMismatch(format!(
            "{} => output length {} is not a multiple of ncols {}",
            fname,
            out.len(),
            ncols
        )));
    }
    check_mask(fname, Some(mask), values.len())?;

    let flag_val: i8 = match val_test {
        ValTest::Any => 1,
        ValTest::All => 0,
    };
    for cell in out.iter_mut() {
        *cell = 1 - flag_val;
    }

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let missing = !unsafe { mask.get_unchecked(row + j) };
            if skipna && missing {
                continue;
            }
            if nullable && missing {
                // Kleene: without a decisive value the cell is undetermined
                if out[grp + j] != flag_val {
                    out[grp + j] = -1;
                }
                continue;
            }
            if values[row + j] == flag_val {
                out[grp + j] = flag_val;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use minarrow::vec64;

    use super::*;

    #[test]
    fn test_group_sum_float_na_and_mincount() {
        // values 3x2, labels [0, 0, 1], min_count 2
        let values = vec64![1.0f64, 2.0, f64::NAN, 3.0, 4.0, f64::NAN];
        let labels = [0i64, 0, 1];
        let mut out = vec64![0.0f64; 4];
        let mut counts = vec64![0i64; 2];
        group_sum_float(&mut out, &mut counts, &values, &labels, 2, None, None, 2).unwrap();
        assert!(out[0].is_nan());
        assert_eq!(out[1], 5.0);
        assert!(out[2].is_nan());
        assert!(out[3].is_nan());
        assert_eq!(&counts[..], &[2, 1]);
    }

    #[test]
    fn test_group_sum_float_empty_group_zero_without_mincount() {
        let values = vec64![1.0f64, 2.0];
        let labels = [1i64, 1];
        let mut out = vec64![-1.0f64; 2];
        let mut counts = vec64![0i64; 2];
        group_sum_float(&mut out, &mut counts, &values, &labels, 1, None, None, 0).unwrap();
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 3.0);
    }

    #[test]
    fn test_group_sum_uint_empty_group_requires_result_mask() {
        let values = vec64![1u64, 2];
        let labels = [0i64, 0];
        let mut out = vec64![0u64; 2];
        let mut counts = vec64![0i64; 2];
        let err = group_sum_uint(&mut out, &mut counts, &values, &labels, 1, None, None, 1);
        assert!(matches!(err, Err(KernelError::EmptyGroupUnsigned(_))));

        let mut out = vec64![0u64; 2];
        let mut counts = vec64![0i64; 2];
        let mut rm = Bitmask::new_set_all(2, true);
        group_sum_uint(
            &mut out,
            &mut counts,
            &values,
            &labels,
            1,
            None,
            Some(&mut rm),
            1,
        )
        .unwrap();
        assert_eq!(out[0], 3);
        assert!(rm.get(0));
        assert!(!rm.get(1));
    }

    #[test]
    fn test_group_sum_object_first_assignment() {
        // concatenating accumulator makes the assign-vs-add distinction visible
        #[derive(Clone, PartialEq, Debug)]
        struct Cat(String);
        impl std::ops::Add for Cat {
            type Output = Cat;
            fn add(self, rhs: Cat) -> Cat {
                Cat(self.0 + &rhs.0)
            }
        }

        let values = vec![Cat("a".into()), Cat("b".into()), Cat("c".into())];
        let labels = [0i64, 0, 1];
        let mut out: Vec<Option<Cat>> = vec![None; 2];
        let mut counts = vec64![0i64; 2];
        group_sum_object(
            &mut out,
            &mut counts,
            &values,
            &labels,
            1,
            |s| s.0.is_empty(),
            0,
        )
        .unwrap();
        assert_eq!(out[0], Some(Cat("ab".into())));
        assert_eq!(out[1], Some(Cat("c".into())));
    }

    #[test]
    fn test_group_mean_int_datetimelike_truncates() {
        let values = vec64![100i64, i64::MIN, 200, 300];
        let labels = [0i64, 0, 1, 1];
        let mut out = vec64![0i64; 2];
        let mut counts = vec64![0i64; 2];
        group_mean_int(
            &mut out,
            &mut counts,
            &values,
            &labels,
            1,
            None,
            None,
            -1,
            true,
        )
        .unwrap();
        assert_eq!(&out[..], &[100, 250]);
        assert_eq!(&counts[..], &[2, 2]);
    }

    #[test]
    fn test_group_mean_rejects_min_count() {
        let values = vec64![1.0f64];
        let labels = [0i64];
        let mut out = vec64![0.0f64; 1];
        let mut counts = vec64![0i64; 1];
        let err = group_mean_float(&mut out, &mut counts, &values, &labels, 1, None, None, 2);
        assert!(matches!(err, Err(KernelError::InvalidArguments(_))));
    }

    #[test]
    fn test_group_var_ddof_single_observation() {
        let values = vec64![5.0f64, 7.0, 9.0];
        let labels = [0i64, 0, 1];
        let mut out = vec64![0.0f64; 2];
        let mut counts = vec64![0i64; 2];
        group_var_float(&mut out, &mut counts, &values, &labels, 1, None, None, 1).unwrap();
        assert_eq!(out[0], 2.0);
        assert!(out[1].is_nan());
    }

    #[test]
    fn test_group_min_max_int_sentinels() {
        let values = vec64![3i64, -5, 8, 1];
        let labels = [0i64, 0, 1, 1];
        let mut mn = vec64![0i64; 2];
        let mut mx = vec64![0i64; 2];
        let mut counts = vec64![0i64; 2];
        group_min(&mut mn, &mut counts, &values, &labels, 1, None, None, -1, false).unwrap();
        let mut counts = vec64![0i64; 2];
        group_max(&mut mx, &mut counts, &values, &labels, 1, None, None, -1, false).unwrap();
        assert_eq!(&mn[..], &[-5, 1]);
        assert_eq!(&mx[..], &[3, 8]);
    }

    #[test]
    fn test_group_nth_freezes_on_rank() {
        let values = vec64![1.0f64, f64::NAN, 2.0, 3.0];
        let labels = [0i64, 0, 0, 0];
        let mut out = vec64![0.0f64; 1];
        let mut counts = vec64![0i64; 1];
        group_nth(
            &mut out, &mut counts, &values, &labels, 1, None, None, -1, 2, false,
        )
        .unwrap();
        // second non-missing value is 2.0; the later 3.0 must not overwrite
        assert_eq!(out[0], 2.0);
    }

    #[test]
    fn test_group_nth_unreached_rank_is_missing() {
        let values = vec64![1.0f64, 2.0];
        let labels = [0i64, 0];
        let mut out = vec64![0.0f64; 1];
        let mut counts = vec64![0i64; 1];
        group_nth(
            &mut out, &mut counts, &values, &labels, 1, None, None, -1, 5, false,
        )
        .unwrap();
        assert!(out[0].is_nan());
    }

    #[test]
    fn test_group_last_overwrites() {
        let values = vec64![1.0f64, 4.0, f64::NAN];
        let labels = [0i64, 0, 0];
        let mut out = vec64![0.0f64; 1];
        let mut counts = vec64![0i64; 1];
        group_last(
            &mut out, &mut counts, &values, &labels, 1, None, None, -1, false,
        )
        .unwrap();
        assert_eq!(out[0], 4.0);
    }

    #[test]
    fn test_group_ohlc_identities() {
        let values = vec64![f64::NAN, 2.0, 5.0, 1.0, 3.0];
        let labels = [0i64, 0, 0, 0, 0];
        let mut out = vec64![0.0f64; 4];
        let mut counts = vec64![0i64; 1];
        group_ohlc(&mut out, &mut counts, &values, &labels, 1, None, None, -1).unwrap();
        assert_eq!(&out[..], &[2.0, 5.0, 1.0, 3.0]);
        assert_eq!(counts[0], 5);
    }

    #[test]
    fn test_group_ohlc_rejects_multi_column() {
        let values = vec64![1.0f64, 2.0];
        let labels = [0i64];
        let mut out = vec64![0.0f64; 4];
        let mut counts = vec64![0i64; 1];
        let err = group_ohlc(&mut out, &mut counts, &values, &labels, 2, None, None, -1);
        assert!(matches!(err, Err(KernelError::InvalidArguments(_))));
    }

    #[test]
    fn test_group_any_all_kleene_undetermined() {
        // one masked cell, no decisive 1 seen => -1
        let values = vec64![0i8, 0, 0];
        let labels = [0i64, 0, 0];
        let mask = Bitmask::from_bools(&[false, true, true]);
        let mut out = vec64![0i8; 1];
        group_any_all(
            &mut out,
            &values,
            &labels,
            1,
            &mask,
            ValTest::Any,
            false,
            true,
        )
        .unwrap();
        assert_eq!(out[0], -1);
    }

    #[test]
    fn test_group_any_all_decisive_absorbs() {
        let values = vec64![1i8, 0, 0];
        let labels = [0i64, 0, 0];
        let mask = Bitmask::from_bools(&[true, false, true]);
        let mut out = vec64![0i8; 1];
        group_any_all(
            &mut out,
            &values,
            &labels,
            1,
            &mask,
            ValTest::Any,
            false,
            true,
        )
        .unwrap();
        assert_eq!(out[0], 1);
    }

    #[test]
    fn test_kahan_add_compensates() {
        let mut sum = 0.0f64;
        let mut comp = 0.0f64;
        kahan_add(&mut sum, &mut comp, 1.0);
        for _ in 0..10 {
            kahan_add(&mut sum, &mut comp, 1e-16);
        }
        // naive accumulation would stay at exactly 1.0
        assert!(sum > 1.0);
    }
}
