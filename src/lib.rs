// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under the Mozilla Public License (MPL) 2.0.
// See LICENSE for details.

//! # **Group Kernels** - *Null-Aware Group-Wise Aggregation Primitives*
//!
//! Dense, typed batch kernels that consume a row-partitioned columnar dataset
//! and produce per-group reductions, per-row cumulative transforms, and
//! group-local rank / shift / fill operations.
//!
//! ## Data model
//! Every kernel operates over caller-owned, preallocated buffers:
//! - `values`: flat row-major `N x K` slice, `ncols = K` passed explicitly.
//! - `labels`: length-`N` `i64` slice with entries in `{-1} ∪ [0, ngroups)`;
//!   label `-1` excludes the row from aggregation.
//! - `mask`: optional [`minarrow::Bitmask`] over the value cells in Arrow
//!   validity convention - a *cleared* bit marks a missing cell, irrespective
//!   of the value's bit pattern.
//! - `out` / `counts` / `result_mask`: preallocated outputs, mutated in place.
//!
//! ## Kernel families
//! - **Reductions**: sum, prod, mean, var, min/max, first/nth/last, OHLC,
//!   median, quantile, any/all - two-phase accumulate/finalize with a shared
//!   min-count policy.
//! - **Scans**: cumulative sum/prod/min/max preserving within-group row order.
//! - **Utilities**: shift indexer, fill indexer, group-aware rank.
//!
//! Floating-point sums are Kahan-compensated; variance uses Welford's online
//! recurrence. Missing-value semantics are uniform across the signed-integer
//! (sentinel), unsigned-integer (mask-only), float (NaN), complex and
//! object element categories.

pub mod kernels {
    pub mod aggregate;
    pub mod cumulative;
    pub mod index;
    pub mod quantile;
    pub mod rank;
    pub mod sort;
}

pub mod config;
pub mod errors;
pub mod types;

pub mod utils;
