// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Error Types** - *Kernel Operation Error Handling*
//!
//! Error types for group-kernel operations with structured error reporting.
//!
//! ## Error Categories
//! - **Dimension Errors**: value / label / output / mask length disagreements
//! - **Argument Errors**: out-of-range quantiles, disallowed min-count values,
//!   malformed OHLC output shapes
//! - **Representation Errors**: an output cell requires a missing-value
//!   representation the element type cannot encode
//!
//! All errors include contextual message space for debugging. Errors are
//! raised synchronously; no kernel retries, and no partial result is
//! guaranteed once a kernel has failed.

use core::fmt;
use std::error::Error;

/// Error type for all group-kernel operations.
///
/// Each variant includes a contextual message string providing specific details
/// about the error condition, enabling precise debugging and error reporting.
#[derive(Debug, Clone)]
pub enum KernelError {
    /// Array length mismatch between the value matrix, label vector,
    /// output buffer or masks.
    LengthMismatch(String),

    /// Invalid arguments provided to a kernel function.
    InvalidArguments(String),

    /// A reduction produced an empty (all-missing) group for an unsigned
    /// element type, and no result mask was supplied to carry the
    /// missing-value flag.
    ///
    /// Unsupported element types have no runtime kind: the kernels are
    /// monomorphized over trait bounds, so an inadmissible type is a
    /// compile error.
    EmptyGroupUnsigned(String),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::LengthMismatch(msg) => write!(f, "Length mismatch: {}", msg),
            KernelError::InvalidArguments(msg) => write!(f, "Invalid arguments: {}", msg),
            KernelError::EmptyGroupUnsigned(msg) => {
                write!(f, "Empty group without NA representation: {}", msg)
            }
        }
    }
}

impl Error for KernelError {}

/// Creates a formatted error message for length mismatches between two buffers.
///
/// # Arguments
/// * `fname` - Function name where the mismatch occurred
/// * `lhs` - Length of the left-hand side buffer
/// * `rhs` - Length of the right-hand side buffer
///
/// # Returns
/// A formatted error message string
pub fn log_length_mismatch(fname: &str, lhs: usize, rhs: usize) -> String {
    format!("{} => Length mismatch: LHS {} RHS {}", fname, lhs, rhs)
}
