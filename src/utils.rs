// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Utility Functions** - *Shared Shape and Mask Validation*
//!
//! Length / shape checks shared by every kernel. All failures are reported
//! through [`KernelError`] before the kernel writes anything.

use minarrow::Bitmask;

use crate::errors::{KernelError, log_length_mismatch};

/// Validates the value matrix against the label vector and returns the row
/// count. `values` is flat row-major with `ncols` columns.
#[inline]
pub fn check_frame(
    fname: &str,
    values_len: usize,
    ncols: usize,
    labels_len: usize,
) -> Result<usize, KernelError> {
    if ncols == 0 {
        return Err(KernelError::InvalidArguments(format!(
            "{} => ncols must be nonzero",
            fname
        )));
    }
    if values_len != labels_len * ncols {
        return Err(KernelError::LengthMismatch(log_length_mismatch(
            fname,
            values_len,
            labels_len * ncols,
        )));
    }
    Ok(labels_len)
}

/// Validates that a buffer has exactly the expected length.
#[inline]
pub fn check_len(fname: &str, got: usize, expected: usize) -> Result<(), KernelError> {
    if got != expected {
        return Err(KernelError::LengthMismatch(log_length_mismatch(
            fname, got, expected,
        )));
    }
    Ok(())
}

/// Validates an optional bitmask's logical bit length.
#[inline]
pub fn check_mask(
    fname: &str,
    mask: Option<&Bitmask>,
    expected_bits: usize,
) -> Result<(), KernelError> {
    if let Some(m) = mask {
        if m.len() != expected_bits {
            return Err(KernelError::LengthMismatch(log_length_mismatch(
                fname,
                m.len(),
                expected_bits,
            )));
        }
    }
    Ok(())
}

/// Validates that min-count was left at its `-1` sentinel for kernels whose
/// threshold is fixed (mean, OHLC, median, quantile).
#[inline]
pub fn check_min_count_disallowed(fname: &str, min_count: i64) -> Result<(), KernelError> {
    if min_count != -1 {
        return Err(KernelError::InvalidArguments(format!(
            "{} => min_count must be -1, got {}",
            fname, min_count
        )));
    }
    Ok(())
}
