// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

// These parameters should rarely need adjustment.

//! # **Configuration Constants** - *Kernel Behaviour Parameters*
//!
//! Global compile-time constants controlling kernel behaviour.

/// Sentinel encoding a missing datetime-like value in signed 64-bit data.
///
/// Matches the "not-a-time" convention used by columnar datetime storage:
/// the most negative representable `i64`. Kernels only honour the sentinel
/// when `is_datetimelike` is set; plain integer data treats every bit
/// pattern as a real value.
pub const NAT_SENTINEL: i64 = i64::MIN;

/// Default delta-degrees-of-freedom for the grouped variance kernel.
pub const DEFAULT_DDOF: i64 = 1;
