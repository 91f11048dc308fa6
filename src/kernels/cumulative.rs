// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Cumulative Kernels Module** - *Group-Local Prefix Transforms*
//!
//! Running sum / product / extremum per group, written row-by-row in the
//! original input order: output row `i` depends only on earlier rows of the
//! same group, however the groups interleave. Rows labelled `-1` are left
//! untouched.
//!
//! ## Missing-value protocol
//! A missing input cell always emits a missing output cell. With
//! `skipna` set the accumulator is unaffected and later rows resume; with
//! `skipna` unset the cell's accumulator is poisoned for the rest of the
//! pass and - for cumsum/cumprod - the remaining columns of the *current*
//! row are skipped outright, leaving their output cells untouched. This
//! matches the original ordering-sensitive behaviour downstream code
//! observes.
//!
//! The cumulative extrema keep a per-cell `CLEAN -> SEEN_NA` latch; once
//! latched (with `skipna` unset) every later output in that group/column is
//! missing regardless of input. The caller's input mask is never written;
//! missing outputs travel through the result mask or the in-band
//! representation.

use std::ops::Sub;

use minarrow::{Bitmask, vec64};
use num_complex::Complex;
use num_traits::{Float, Zero};

use crate::errors::KernelError;
use crate::kernels::aggregate::kahan_add;
use crate::types::{GroupValue, RangeSentinel, cell_is_na};
use crate::utils::{check_frame, check_len, check_mask};

/// Validates the common scan buffer shapes and returns the row count.
fn check_scan_shape<T>(
    fname: &str,
    out: &[T],
    values: &[T],
    labels: &[i64],
    ncols: usize,
    mask: Option<&Bitmask>,
    result_mask: Option<&Bitmask>,
) -> Result<usize, KernelError> {
    let nrows = check_frame(fname, values.len(), ncols, labels.len())?;
    check_len(fname, out.len(), values.len())?;
    check_mask(fname, mask, values.len())?;
    check_mask(fname, result_mask, out.len())?;
    Ok(nrows)
}

/// Unsigned elements cannot carry missing values in-band, so a masked input
/// needs a result mask to carry missing outputs. Checked once at entry.
fn check_na_channel<T: GroupValue>(
    fname: &str,
    mask: Option<&Bitmask>,
    result_mask: Option<&Bitmask>,
) -> Result<(), KernelError> {
    if !T::NA_REPRESENTABLE && mask.is_some() && result_mask.is_none() {
        return Err(KernelError::InvalidArguments(format!(
            "{} => element type has no in-band missing representation; \
             a result mask is required when a mask is supplied",
            fname
        )));
    }
    Ok(())
}

/// Writes one missing output cell: cleared result-mask bit when the caller
/// uses the nullable representation, in-band representation otherwise.
#[inline(always)]
fn write_na_cell<T: GroupValue + Zero>(
    out: &mut [T],
    result_mask: &mut Option<&mut Bitmask>,
    pos: usize,
) {
    match result_mask.as_deref_mut() {
        Some(rm) => {
            rm.set(pos, false);
            out[pos] = T::zero();
        }
        None => out[pos] = T::na_value(),
    }
}

// --- Cumulative sum ----------------------------------------------------------

/// Kahan-compensated cumulative-sum body shared by the float and complex
/// kernels.
fn group_cumsum_compensated<E>(
    fname: &str,
    out: &mut [E],
    values: &[E],
    labels: &[i64],
    ngroups: usize,
    ncols: usize,
    mask: Option<&Bitmask>,
    mut result_mask: Option<&mut Bitmask>,
    skipna: bool,
) -> Result<(), KernelError>
where
    E: GroupValue + Zero + Sub<Output = E>,
{
    let nrows = check_scan_shape(
        fname,
        out,
        values,
        labels,
        ncols,
        mask,
        result_mask.as_deref(),
    )?;

    let n_cells = ngroups * ncols;
    let mut accum = vec64![E::zero(); n_cells];
    let mut compensation = vec64![E::zero(); n_cells];
    let mut poisoned = Bitmask::new_set_all(n_cells, false);

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let pos = row + j;
            let cell = grp + j;
            let val = values[pos];
            if cell_is_na(val, false, mask, pos) {
                write_na_cell(out, &mut result_mask, pos);
                if !skipna {
                    poisoned.set(cell, true);
                    break;
                }
                continue;
            }
            if !skipna && poisoned.get(cell) {
                write_na_cell(out, &mut result_mask, pos);
                continue;
            }
            kahan_add(&mut accum[cell], &mut compensation[cell], val);
            out[pos] = accum[cell];
            if let Some(rm) = result_mask.as_deref_mut() {
                rm.set(pos, true);
            }
        }
    }
    Ok(())
}

/// Group-wise cumulative sum for floating-point values, Kahan-compensated.
pub fn group_cumsum_float<T>(
    out: &mut [T],
    values: &[T],
    labels: &[i64],
    ngroups: usize,
    ncols: usize,
    mask: Option<&Bitmask>,
    result_mask: Option<&mut Bitmask>,
    skipna: bool,
) -> Result<(), KernelError>
where
    T: Float + GroupValue,
{
    group_cumsum_compensated(
        "group_cumsum_float",
        out,
        values,
        labels,
        ngroups,
        ncols,
        mask,
        result_mask,
        skipna,
    )
}

/// Group-wise cumulative sum for complex values, compensated component-wise.
pub fn group_cumsum_complex<T>(
    out: &mut [Complex<T>],
    values: &[Complex<T>],
    labels: &[i64],
    ngroups: usize,
    ncols: usize,
    mask: Option<&Bitmask>,
    result_mask: Option<&mut Bitmask>,
    skipna: bool,
) -> Result<(), KernelError>
where
    T: Float + 'static,
{
    group_cumsum_compensated(
        "group_cumsum_complex",
        out,
        values,
        labels,
        ngroups,
        ncols,
        mask,
        result_mask,
        skipna,
    )
}

/// Group-wise cumulative sum for signed 64-bit values. With
/// `is_datetimelike` set, the `NAT` sentinel travels as the missing value.
pub fn group_cumsum_int(
    out: &mut [i64],
    values: &[i64],
    labels: &[i64],
    ngroups: usize,
    ncols: usize,
    mask: Option<&Bitmask>,
    mut result_mask: Option<&mut Bitmask>,
    skipna: bool,
    is_datetimelike: bool,
) -> Result<(), KernelError> {
    let fname = "group_cumsum_int";
    let nrows = check_scan_shape(
        fname,
        out,
        values,
        labels,
        ncols,
        mask,
        result_mask.as_deref(),
    )?;

    let n_cells = ngroups * ncols;
    let mut accum = vec64![0i64; n_cells];
    let mut poisoned = Bitmask::new_set_all(n_cells, false);

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let pos = row + j;
            let cell = grp + j;
            let val = values[pos];
            if cell_is_na(val, is_datetimelike, mask, pos) {
                write_na_cell(out, &mut result_mask, pos);
                if !skipna {
                    poisoned.set(cell, true);
                    break;
                }
                continue;
            }
            if !skipna && poisoned.get(cell) {
                write_na_cell(out, &mut result_mask, pos);
                continue;
            }
            accum[cell] = accum[cell].wrapping_add(val);
            out[pos] = accum[cell];
            if let Some(rm) = result_mask.as_deref_mut() {
                rm.set(pos, true);
            }
        }
    }
    Ok(())
}

/// Group-wise cumulative sum for unsigned 64-bit values. Missingness only
/// travels through the mask / result-mask pair.
pub fn group_cumsum_uint(
    out: &mut [u64],
    values: &[u64],
    labels: &[i64],
    ngroups: usize,
    ncols: usize,
    mask: Option<&Bitmask>,
    mut result_mask: Option<&mut Bitmask>,
    skipna: bool,
) -> Result<(), KernelError> {
    let fname = "group_cumsum_uint";
    check_na_channel::<u64>(fname, mask, result_mask.as_deref())?;
    let nrows = check_scan_shape(
        fname,
        out,
        values,
        labels,
        ncols,
        mask,
        result_mask.as_deref(),
    )?;

    let n_cells = ngroups * ncols;
    let mut accum = vec64![0u64; n_cells];
    let mut poisoned = Bitmask::new_set_all(n_cells, false);

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let pos = row + j;
            let cell = grp + j;
            let val = values[pos];
            if cell_is_na(val, false, mask, pos) {
                write_na_cell(out, &mut result_mask, pos);
                if !skipna {
                    poisoned.set(cell, true);
                    break;
                }
                continue;
            }
            if !skipna && poisoned.get(cell) {
                write_na_cell(out, &mut result_mask, pos);
                continue;
            }
            accum[cell] = accum[cell].wrapping_add(val);
            out[pos] = accum[cell];
            if let Some(rm) = result_mask.as_deref_mut() {
                rm.set(pos, true);
            }
        }
    }
    Ok(())
}

// --- Cumulative product ------------------------------------------------------

/// Group-wise cumulative product for floating-point values.
pub fn group_cumprod_float<T>(
    out: &mut [T],
    values: &[T],
    labels: &[i64],
    ngroups: usize,
    ncols: usize,
    mask: Option<&Bitmask>,
    mut result_mask: Option<&mut Bitmask>,
    skipna: bool,
) -> Result<(), KernelError>
where
    T: Float + GroupValue,
{
    let fname = "group_cumprod_float";
    let nrows = check_scan_shape(
        fname,
        out,
        values,
        labels,
        ncols,
        mask,
        result_mask.as_deref(),
    )?;

    let n_cells = ngroups * ncols;
    let mut accum = vec64![T::one(); n_cells];
    let mut poisoned = Bitmask::new_set_all(n_cells, false);

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let pos = row + j;
            let cell = grp + j;
            let val = values[pos];
            if cell_is_na(val, false, mask, pos) {
                write_na_cell(out, &mut result_mask, pos);
                if !skipna {
                    poisoned.set(cell, true);
                    break;
                }
                continue;
            }
            if !skipna && poisoned.get(cell) {
                write_na_cell(out, &mut result_mask, pos);
                continue;
            }
            accum[cell] = accum[cell] * val;
            out[pos] = accum[cell];
            if let Some(rm) = result_mask.as_deref_mut() {
                rm.set(pos, true);
            }
        }
    }
    Ok(())
}

// --- Cumulative extrema ------------------------------------------------------

/// Shared running-extremum body for the cumulative min and max scans.
fn group_cummin_max<T>(
    fname: &str,
    out: &mut [T],
    values: &[T],
    labels: &[i64],
    ngroups: usize,
    ncols: usize,
    mask: Option<&Bitmask>,
    mut result_mask: Option<&mut Bitmask>,
    skipna: bool,
    is_datetimelike: bool,
    compute_max: bool,
) -> Result<(), KernelError>
where
    T: RangeSentinel + PartialOrd + Zero,
{
    check_na_channel::<T>(fname, mask, result_mask.as_deref())?;
    let nrows = check_scan_shape(
        fname,
        out,
        values,
        labels,
        ncols,
        mask,
        result_mask.as_deref(),
    )?;

    let n_cells = ngroups * ncols;
    let seed = if compute_max {
        T::range_min()
    } else {
        T::range_max()
    };
    let mut accum = vec64![seed; n_cells];
    let mut seen_na = Bitmask::new_set_all(n_cells, false);

    for i in 0..nrows {
        let lab = labels[i];
        if lab < 0 {
            continue;
        }
        let row = i * ncols;
        let grp = lab as usize * ncols;
        for j in 0..ncols {
            let pos = row + j;
            let cell = grp + j;
            if !skipna && seen_na.get(cell) {
                write_na_cell(out, &mut result_mask, pos);
                continue;
            }
            let val = values[pos];
            if cell_is_na(val, is_datetimelike, mask, pos) {
                seen_na.set(cell, true);
                write_na_cell(out, &mut result_mask, pos);
            } else {
                if compute_max {
                    if val > accum[cell] {
                        accum[cell] = val;
                    }
                } else if val < accum[cell] {
                    accum[cell] = val;
                }
                out[pos] = accum[cell];
                if let Some(rm) = result_mask.as_deref_mut() {
                    rm.set(pos, true);
                }
            }
        }
    }
    Ok(())
}

/// Group-wise cumulative minimum.
pub fn group_cummin<T>(
    out: &mut [T],
    values: &[T],
    labels: &[i64],
    ngroups: usize,
    ncols: usize,
    mask: Option<&Bitmask>,
    result_mask: Option<&mut Bitmask>,
    skipna: bool,
    is_datetimelike: bool,
) -> Result<(), KernelError>
where
    T: RangeSentinel + PartialOrd + Zero,
{
    group_cummin_max(
        "group_cummin",
        out,
        values,
        labels,
        ngroups,
        ncols,
        mask,
        result_mask,
        skipna,
        is_datetimelike,
        false,
    )
}

/// Group-wise cumulative maximum.
pub fn group_cummax<T>(
    out: &mut [T],
    values: &[T],
    labels: &[i64],
    ngroups: usize,
    ncols: usize,
    mask: Option<&Bitmask>,
    result_mask: Option<&mut Bitmask>,
    skipna: bool,
    is_datetimelike: bool,
) -> Result<(), KernelError>
where
    T: RangeSentinel + PartialOrd + Zero,
{
    group_cummin_max(
        "group_cummax",
        out,
        values,
        labels,
        ngroups,
        ncols,
        mask,
        result_mask,
        skipna,
        is_datetimelike,
        true,
    )
}

#[cfg(test)]
mod tests {
    use minarrow::vec64;

    use super::*;

    #[test]
    fn test_cumsum_interleaved_groups() {
        let values = vec64![1.0f64, 10.0, 2.0, 20.0];
        let labels = [0i64, 1, 0, 1];
        let mut out = vec64![0.0f64; 4];
        group_cumsum_float(&mut out, &values, &labels, 2, 1, None, None, true).unwrap();
        assert_eq!(&out[..], &[1.0, 10.0, 3.0, 30.0]);
    }

    #[test]
    fn test_cumsum_skipna_resumes() {
        let values = vec64![1.0f64, f64::NAN, 2.0];
        let labels = [0i64, 0, 0];
        let mut out = vec64![0.0f64; 3];
        group_cumsum_float(&mut out, &values, &labels, 1, 1, None, None, true).unwrap();
        assert_eq!(out[0], 1.0);
        assert!(out[1].is_nan());
        assert_eq!(out[2], 3.0);
    }

    #[test]
    fn test_cumsum_no_skipna_poisons_group() {
        let values = vec64![1.0f64, f64::NAN, 2.0];
        let labels = [0i64, 0, 0];
        let mut out = vec64![0.0f64; 3];
        group_cumsum_float(&mut out, &values, &labels, 1, 1, None, None, false).unwrap();
        assert_eq!(out[0], 1.0);
        assert!(out[1].is_nan());
        assert!(out[2].is_nan());
    }

    #[test]
    fn test_cumsum_no_skipna_breaks_row() {
        // missing cell in column 0 skips the remaining columns of that row
        let values = vec64![1.0f64, 5.0, f64::NAN, 6.0, 2.0, 7.0];
        let labels = [0i64, 0, 0];
        let mut out = vec64![777.0f64; 6];
        group_cumsum_float(&mut out, &values, &labels, 1, 2, None, None, false).unwrap();
        assert_eq!(out[1], 5.0);
        assert!(out[2].is_nan());
        // column 1 of the poisoned row was never visited
        assert_eq!(out[3], 777.0);
        // column 1 resumes on the next row
        assert_eq!(out[5], 12.0);
        // column 0 stays missing
        assert!(out[4].is_nan());
    }

    #[test]
    fn test_cumsum_int_nat_datetimelike() {
        let values = vec64![10i64, i64::MIN, 20];
        let labels = [0i64, 0, 0];
        let mut out = vec64![0i64; 3];
        group_cumsum_int(&mut out, &values, &labels, 1, 1, None, None, true, true).unwrap();
        assert_eq!(out[0], 10);
        assert_eq!(out[1], i64::MIN);
        assert_eq!(out[2], 30);
    }

    #[test]
    fn test_cumsum_uint_mask_requires_result_mask() {
        let values = vec64![1u64, 2];
        let labels = [0i64, 0];
        let mask = Bitmask::from_bools(&[true, false]);
        let mut out = vec64![0u64; 2];
        let err = group_cumsum_uint(&mut out, &values, &labels, 1, 1, Some(&mask), None, true);
        assert!(matches!(err, Err(KernelError::InvalidArguments(_))));

        let mut rm = Bitmask::new_set_all(2, true);
        let mut out = vec64![0u64; 2];
        group_cumsum_uint(
            &mut out,
            &values,
            &labels,
            1,
            1,
            Some(&mask),
            Some(&mut rm),
            true,
        )
        .unwrap();
        assert_eq!(out[0], 1);
        assert!(rm.get(0));
        assert!(!rm.get(1));
    }

    #[test]
    fn test_cumprod_basic() {
        let values = vec64![2.0f64, 3.0, 4.0];
        let labels = [0i64, 0, 0];
        let mut out = vec64![0.0f64; 3];
        group_cumprod_float(&mut out, &values, &labels, 1, 1, None, None, true).unwrap();
        assert_eq!(&out[..], &[2.0, 6.0, 24.0]);
    }

    #[test]
    fn test_cummax_no_skipna_latches() {
        let values = vec64![1.0f64, f64::NAN, 2.0];
        let labels = [0i64, 0, 0];
        let mut out = vec64![0.0f64; 3];
        group_cummax(&mut out, &values, &labels, 1, 1, None, None, false, false).unwrap();
        assert_eq!(out[0], 1.0);
        assert!(out[1].is_nan());
        assert!(out[2].is_nan());
    }

    #[test]
    fn test_cummin_skipna_continues() {
        let values = vec64![3.0f64, f64::NAN, 1.0, 2.0];
        let labels = [0i64, 0, 0, 0];
        let mut out = vec64![0.0f64; 4];
        group_cummin(&mut out, &values, &labels, 1, 1, None, None, true, false).unwrap();
        assert_eq!(out[0], 3.0);
        assert!(out[1].is_nan());
        assert_eq!(out[2], 1.0);
        assert_eq!(out[3], 1.0);
    }

    #[test]
    fn test_cummin_input_mask_untouched() {
        let values = vec64![3u64, 9, 1];
        let labels = [0i64, 0, 0];
        let mask = Bitmask::from_bools(&[true, false, true]);
        let before: Vec<bool> = (0..3).map(|i| mask.get(i)).collect();
        let mut rm = Bitmask::new_set_all(3, true);
        let mut out = vec64![0u64; 3];
        group_cummin(
            &mut out,
            &values,
            &labels,
            1,
            1,
            Some(&mask),
            Some(&mut rm),
            true,
            false,
        )
        .unwrap();
        let after: Vec<bool> = (0..3).map(|i| mask.get(i)).collect();
        assert_eq!(before, after);
        assert_eq!(out[0], 3);
        assert!(!rm.get(1));
        assert_eq!(out[2], 1);
    }

    #[test]
    fn test_scan_leaves_na_group_rows_untouched() {
        let values = vec64![1.0f64, 2.0, 3.0];
        let labels = [0i64, -1, 0];
        let mut out = vec64![777.0f64; 3];
        group_cumsum_float(&mut out, &values, &labels, 1, 1, None, None, true).unwrap();
        assert_eq!(&out[..], &[1.0, 777.0, 4.0]);
    }
}
