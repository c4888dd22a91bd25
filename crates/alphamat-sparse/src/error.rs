//! Unified error types for sparse matrix construction and operations
//!
//! Every structural problem is reported eagerly, at construction time or at
//! the start of an operation. Nothing is silently truncated or padded.
//!
//! # Examples
//!
//! ```
//! use alphamat_sparse::error::{SparseError, SparseResult};
//!
//! fn check_square(shape: (usize, usize)) -> SparseResult<usize> {
//!     if shape.0 != shape.1 {
//!         return Err(SparseError::ShapeMismatch {
//!             op: "check_square",
//!             lhs: shape,
//!             rhs: (shape.1, shape.0),
//!         });
//!     }
//!     Ok(shape.0)
//! }
//!
//! assert!(check_square((3, 3)).is_ok());
//! assert!(check_square((3, 4)).is_err());
//! ```

use thiserror::Error;

/// Top-level error type for all sparse matrix operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SparseError {
    /// Operand dimensions disagree
    ///
    /// Vector operands are reported as `(len, 1)`.
    #[error("Shape mismatch in {op}: {lhs:?} vs {rhs:?}")]
    ShapeMismatch {
        op: &'static str,
        lhs: (usize, usize),
        rhs: (usize, usize),
    },

    /// Parallel arrays disagree in length
    #[error("Length mismatch: {what} has {got} elements, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// More stored entries than the declared shape can hold
    #[error("Too many entries: {nnz} entries for a {rows}×{cols} matrix")]
    TooManyEntries { nnz: usize, rows: usize, cols: usize },

    /// Malformed CSR row pointer array
    #[error("Invalid row pointer: {reason}")]
    InvalidRowPointer { reason: String },

    /// Coordinate outside the declared shape
    #[error("Index out of bounds: ({row}, {col}) in a {rows}×{cols} matrix")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
}

/// Result type alias for sparse matrix operations
pub type SparseResult<T> = Result<T, SparseError>;

impl SparseError {
    /// Create a shape mismatch between a matrix and a dense vector
    pub fn vector_mismatch(op: &'static str, shape: (usize, usize), len: usize) -> Self {
        SparseError::ShapeMismatch {
            op,
            lhs: shape,
            rhs: (len, 1),
        }
    }

    /// Create an invalid row pointer error with a message
    pub fn row_pointer(reason: impl Into<String>) -> Self {
        SparseError::InvalidRowPointer {
            reason: reason.into(),
        }
    }
}
