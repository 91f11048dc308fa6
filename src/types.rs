// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Element Categories** - *Missing-Value Semantics and Kernel Options*
//!
//! The single source of truth for "is this cell missing" across every kernel,
//! plus the per-category missing-value output representation, the extremum
//! sentinels used to seed min/max accumulators, and the option enums shared
//! by the quantile, any/all, fill and rank kernels.
//!
//! ## Element categories
//! - `i64`: real values everywhere, except the [`NAT_SENTINEL`] bit pattern
//!   when the kernel is told the data is datetime-like.
//! - `u64`: carries **no** in-band missing representation; missingness can
//!   only travel through an external mask, and a reduction that needs to
//!   emit a missing cell without a result mask fails with
//!   [`KernelError::EmptyGroupUnsigned`](crate::errors::KernelError).
//! - `f32` / `f64`: IEEE NaN self-inequality.
//! - `Complex<f32>` / `Complex<f64>`: missing when either component is NaN;
//!   the output representation is `NaN + NaN·i`.
//! - Object elements are handled by the `*_object` kernels, which take a
//!   caller-provided predicate and use `Option<T>` on the output side.

use minarrow::Bitmask;
use num_complex::Complex;
use num_traits::Float;

use crate::config::NAT_SENTINEL;

/// Element behaviour needed by the group kernels: the in-band missing-value
/// test and the representation written for missing output cells.
pub trait GroupValue: Copy + PartialEq + 'static {
    /// Whether the type can encode a missing value in-band.
    /// `false` only for unsigned integers.
    const NA_REPRESENTABLE: bool = true;

    /// In-band missing test. `is_datetimelike` activates the integer
    /// sentinel; it is ignored by the floating categories.
    fn is_na(self, is_datetimelike: bool) -> bool;

    /// The representation written into missing output cells.
    ///
    /// For types with `NA_REPRESENTABLE = false` the return value is
    /// meaningless; kernels must consult the flag before calling this.
    fn na_value() -> Self;
}

impl GroupValue for i64 {
    #[inline(always)]
    fn is_na(self, is_datetimelike: bool) -> bool {
        is_datetimelike && self == NAT_SENTINEL
    }

    #[inline(always)]
    fn na_value() -> Self {
        NAT_SENTINEL
    }
}

impl GroupValue for u64 {
    const NA_REPRESENTABLE: bool = false;

    #[inline(always)]
    fn is_na(self, _is_datetimelike: bool) -> bool {
        false
    }

    #[inline(always)]
    fn na_value() -> Self {
        0
    }
}

impl GroupValue for f32 {
    #[inline(always)]
    fn is_na(self, _is_datetimelike: bool) -> bool {
        self.is_nan()
    }

    #[inline(always)]
    fn na_value() -> Self {
        f32::NAN
    }
}

impl GroupValue for f64 {
    #[inline(always)]
    fn is_na(self, _is_datetimelike: bool) -> bool {
        self.is_nan()
    }

    #[inline(always)]
    fn na_value() -> Self {
        f64::NAN
    }
}

impl<T: Float + 'static> GroupValue for Complex<T> {
    #[inline(always)]
    fn is_na(self, _is_datetimelike: bool) -> bool {
        self.re.is_nan() || self.im.is_nan()
    }

    #[inline(always)]
    fn na_value() -> Self {
        Complex::new(T::nan(), T::nan())
    }
}

/// Extremum sentinels seeding the running min/max accumulators.
///
/// `range_min` seeds a *max* accumulator (every real value beats it);
/// `range_max` seeds a *min* accumulator. The signed-integer sentinels are
/// `±i64::MAX` so the seed never collides with the `NAT` bit pattern.
pub trait RangeSentinel: GroupValue {
    fn range_min() -> Self;
    fn range_max() -> Self;
}

impl RangeSentinel for i64 {
    #[inline(always)]
    fn range_min() -> Self {
        -i64::MAX
    }

    #[inline(always)]
    fn range_max() -> Self {
        i64::MAX
    }
}

impl RangeSentinel for u64 {
    #[inline(always)]
    fn range_min() -> Self {
        0
    }

    #[inline(always)]
    fn range_max() -> Self {
        u64::MAX
    }
}

impl RangeSentinel for f32 {
    #[inline(always)]
    fn range_min() -> Self {
        f32::NEG_INFINITY
    }

    #[inline(always)]
    fn range_max() -> Self {
        f32::INFINITY
    }
}

impl RangeSentinel for f64 {
    #[inline(always)]
    fn range_min() -> Self {
        f64::NEG_INFINITY
    }

    #[inline(always)]
    fn range_max() -> Self {
        f64::INFINITY
    }
}

/// Unified missing test for one value cell: the external validity mask wins
/// when present (cleared bit = missing), otherwise the in-band test applies.
#[inline(always)]
pub fn cell_is_na<T: GroupValue>(
    val: T,
    is_datetimelike: bool,
    mask: Option<&Bitmask>,
    bit: usize,
) -> bool {
    match mask {
        Some(m) => !unsafe { m.get_unchecked(bit) },
        None => val.is_na(is_datetimelike),
    }
}

/// Interpolation mode for the grouped quantile kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Lower,
    Higher,
    Nearest,
    Midpoint,
}

/// Truth test applied by the grouped any/all kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValTest {
    Any,
    All,
}

/// Tie resolution for the grouped rank kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiesMethod {
    /// Mean of the positional ranks in the tie run.
    Average,
    /// Lowest positional rank in the tie run.
    Min,
    /// Highest positional rank in the tie run.
    Max,
    /// Positional rank in order of appearance.
    First,
    /// Consecutive run index; ties share one slot.
    Dense,
}

/// Placement of missing values in the grouped rank kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaOption {
    /// Missing rows rank as NaN.
    Keep,
    /// Missing rows take the smallest ranks.
    Top,
    /// Missing rows take the largest ranks.
    Bottom,
}
