//! Element-wise sparse matrix operations
//!
//! Products and transposes live on [`CsrMatrix`] itself; this module holds the
//! operations that combine matrices entry-by-entry, plus the pattern
//! restriction every adjoint rule is built on.
//!
//! None of these operations drop a stored entry because its value is zero.
//!
//! # Examples
//!
//! ```
//! use alphamat_sparse::ops::sparse_add;
//! use alphamat_sparse::CsrMatrix;
//!
//! let a = CsrMatrix::from_coordinates(&[0, 1], &[0, 1], &[1.0, 2.0], (2, 2)).unwrap();
//! let b = CsrMatrix::from_coordinates(&[0, 1], &[1, 1], &[3.0, -2.0], (2, 2)).unwrap();
//!
//! let c = sparse_add(&a, &b).unwrap();
//! assert_eq!(c.nnz(), 3);
//! assert_eq!(c.get(1, 1), Some(0.0)); // cancelled, still stored
//! ```

use crate::csr::CsrMatrix;
use crate::error::{SparseError, SparseResult};
use scirs2_core::numeric::Float;

fn check_same_shape<T>(op: &'static str, a: &CsrMatrix<T>, b: &CsrMatrix<T>) -> SparseResult<()>
where
    T: Clone,
{
    if a.shape() != b.shape() {
        return Err(SparseError::ShapeMismatch {
            op,
            lhs: a.shape(),
            rhs: b.shape(),
        });
    }
    Ok(())
}

/// Sparse matrix addition: C = A + B
///
/// Shorthand for [`sparse_add_scaled`] with unit coefficients.
pub fn sparse_add<T: Float>(a: &CsrMatrix<T>, b: &CsrMatrix<T>) -> SparseResult<CsrMatrix<T>> {
    sparse_add_scaled(a, b, T::one(), T::one())
}

/// Sparse matrix linear combination: C = α*A + β*B
///
/// Merges the sorted column lists of each row. Columns present in both
/// operands are summed; the output pattern is the union of the two input
/// patterns.
///
/// # Errors
///
/// `ShapeMismatch` if the shapes differ.
///
/// # Examples
///
/// ```
/// use alphamat_sparse::ops::sparse_add_scaled;
/// use alphamat_sparse::CsrMatrix;
///
/// let d = CsrMatrix::from_diagonal(&[3.0, 1.0]);
/// let w = CsrMatrix::from_coordinates(&[0, 1], &[1, 0], &[3.0, 1.0], (2, 2)).unwrap();
///
/// // L = D - W
/// let l = sparse_add_scaled(&d, &w, 1.0, -1.0).unwrap();
/// assert_eq!(l.values(), &[3.0, -3.0, -1.0, 1.0]);
/// ```
pub fn sparse_add_scaled<T: Float>(
    a: &CsrMatrix<T>,
    b: &CsrMatrix<T>,
    alpha: T,
    beta: T,
) -> SparseResult<CsrMatrix<T>> {
    check_same_shape("sparse_add", a, b)?;

    let (m, n) = a.shape();

    let mut row_ptr = Vec::with_capacity(m + 1);
    let mut col_indices = Vec::with_capacity(a.nnz() + b.nnz());
    let mut values = Vec::with_capacity(a.nnz() + b.nnz());

    row_ptr.push(0);

    for i in 0..m {
        let a_start = a.row_ptr()[i];
        let a_end = a.row_ptr()[i + 1];
        let b_start = b.row_ptr()[i];
        let b_end = b.row_ptr()[i + 1];

        let a_cols = &a.col_indices()[a_start..a_end];
        let a_vals = &a.values()[a_start..a_end];
        let b_cols = &b.col_indices()[b_start..b_end];
        let b_vals = &b.values()[b_start..b_end];

        // Merge the two sorted arrays
        let mut ai = 0;
        let mut bi = 0;

        while ai < a_cols.len() || bi < b_cols.len() {
            let (col, val) =
                if ai < a_cols.len() && (bi >= b_cols.len() || a_cols[ai] < b_cols[bi]) {
                    // Only in A
                    let entry = (a_cols[ai], alpha * a_vals[ai]);
                    ai += 1;
                    entry
                } else if bi < b_cols.len() && (ai >= a_cols.len() || b_cols[bi] < a_cols[ai]) {
                    // Only in B
                    let entry = (b_cols[bi], beta * b_vals[bi]);
                    bi += 1;
                    entry
                } else {
                    // In both
                    let entry = (a_cols[ai], alpha * a_vals[ai] + beta * b_vals[bi]);
                    ai += 1;
                    bi += 1;
                    entry
                };

            col_indices.push(col);
            values.push(val);
        }

        row_ptr.push(col_indices.len());
    }

    Ok(CsrMatrix::from_canonical_parts(
        row_ptr,
        col_indices,
        values,
        (m, n),
    ))
}

/// Sparse matrix scalar multiplication: C = s * A
///
/// Allocating counterpart of [`CsrMatrix::scale_in_place`].
pub fn sparse_scale<T: Float>(a: &CsrMatrix<T>, scalar: T) -> CsrMatrix<T> {
    let mut out = a.clone();
    out.scale_in_place(scalar);
    out
}

/// Gather the values of `src` at the stored positions of `pattern`
///
/// The result has exactly `pattern`'s structure. Positions of `pattern` that
/// `src` does not store come out as zero; entries of `src` outside the
/// pattern are discarded. Repeated columns in a `src` row are summed.
///
/// # Errors
///
/// `ShapeMismatch` if the shapes differ.
///
/// # Examples
///
/// ```
/// use alphamat_sparse::ops::restrict_to_pattern;
/// use alphamat_sparse::CsrMatrix;
///
/// let dense_grad = CsrMatrix::from_coordinates(&[0, 0, 1], &[0, 1, 1], &[1.0, 2.0, 3.0], (2, 2)).unwrap();
/// let pattern = CsrMatrix::from_coordinates(&[0, 1], &[1, 0], &[9.0, 9.0], (2, 2)).unwrap();
///
/// let g = restrict_to_pattern(&dense_grad, &pattern).unwrap();
/// assert!(g.same_pattern(&pattern));
/// assert_eq!(g.values(), &[2.0, 0.0]);
/// ```
pub fn restrict_to_pattern<T: Float>(
    src: &CsrMatrix<T>,
    pattern: &CsrMatrix<T>,
) -> SparseResult<CsrMatrix<T>> {
    check_same_shape("restrict_to_pattern", src, pattern)?;

    let (m, n) = src.shape();
    let mut scratch = vec![T::zero(); n];
    let mut marker = vec![usize::MAX; n];
    let mut values = Vec::with_capacity(pattern.nnz());

    for i in 0..m {
        for idx in src.row_ptr()[i]..src.row_ptr()[i + 1] {
            let col = src.col_indices()[idx];
            if marker[col] != i {
                marker[col] = i;
                scratch[col] = T::zero();
            }
            scratch[col] = scratch[col] + src.values()[idx];
        }

        for &col in &pattern.col_indices()[pattern.row_ptr()[i]..pattern.row_ptr()[i + 1]] {
            values.push(if marker[col] == i {
                scratch[col]
            } else {
                T::zero()
            });
        }
    }

    pattern.with_values(values)
}

/// Frobenius inner product over stored entries, `Σ_k A[k] * B[k]`
///
/// Both matrices must share one sparsity pattern.
///
/// # Errors
///
/// `ShapeMismatch` if the shapes differ, `LengthMismatch` if the patterns do.
pub fn pattern_dot<T: Float>(a: &CsrMatrix<T>, b: &CsrMatrix<T>) -> SparseResult<T> {
    check_same_shape("pattern_dot", a, b)?;
    if !a.same_pattern(b) {
        return Err(SparseError::LengthMismatch {
            what: "pattern",
            expected: a.nnz(),
            got: b.nnz(),
        });
    }

    Ok(a
        .values()
        .iter()
        .zip(b.values())
        .fold(T::zero(), |acc, (&x, &y)| acc + x * y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag4(values: [f64; 4]) -> CsrMatrix<f64> {
        CsrMatrix::from_coordinates(&[0, 1, 2, 3], &[0, 1, 2, 3], &values, (4, 4)).unwrap()
    }

    #[test]
    fn test_add_same_sparsity() {
        let a = diag4([0.0, 1.0, 2.0, 3.0]);
        let b = diag4([3.0, 6.0, 1.0, 8.0]);
        let c = sparse_add(&a, &b).unwrap();

        assert!(c.same_pattern(&a));
        assert_eq!(c.values(), &[3.0, 7.0, 3.0, 11.0]);
    }

    #[test]
    fn test_add_different_sparsity() {
        let a = CsrMatrix::from_coordinates(&[0, 0, 1, 2, 3], &[0, 1, 1, 2, 3], &[1.0; 5], (4, 4))
            .unwrap();
        let b = CsrMatrix::from_coordinates(&[1, 2, 3], &[1, 2, 3], &[1.0; 3], (4, 4)).unwrap();

        let c = sparse_add(&a, &b).unwrap();
        assert_eq!(c.row_ptr(), &[0, 2, 3, 4, 5]);
        assert_eq!(c.col_indices(), &[0, 1, 1, 2, 3]);
        assert_eq!(c.values(), &[1.0, 1.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_add_scaled_keeps_zeros() {
        let a = diag4([1.0, 2.0, 3.0, 4.0]);
        let c = sparse_add_scaled(&a, &a, 1.0, -1.0).unwrap();

        assert_eq!(c.nnz(), 4);
        assert!(c.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_add_disjoint_rows() {
        let a = CsrMatrix::from_coordinates(&[0], &[2], &[1.0], (2, 3)).unwrap();
        let b = CsrMatrix::from_coordinates(&[0, 1], &[0, 1], &[2.0, 3.0], (2, 3)).unwrap();
        let c = sparse_add_scaled(&a, &b, 2.0, 0.5).unwrap();

        assert_eq!(c.row_ptr(), &[0, 2, 3]);
        assert_eq!(c.col_indices(), &[0, 2, 1]);
        assert_eq!(c.values(), &[1.0, 2.0, 1.5]);
        assert!(c.is_canonical());
    }

    #[test]
    fn test_add_shape_mismatch() {
        let a = CsrMatrix::<f64>::zeros((2, 3));
        let b = CsrMatrix::<f64>::zeros((3, 2));
        assert!(matches!(
            sparse_add(&a, &b),
            Err(SparseError::ShapeMismatch { op: "sparse_add", .. })
        ));
    }

    #[test]
    fn test_sparse_scale() {
        let a = diag4([1.0, 2.0, 3.0, 4.0]);
        let c = sparse_scale(&a, 2.0);
        assert_eq!(c.values(), &[2.0, 4.0, 6.0, 8.0]);
        assert_eq!(a.values(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_restrict_to_pattern() {
        let full = CsrMatrix::from_coordinates(
            &[0, 0, 1, 1],
            &[0, 1, 0, 1],
            &[1.0, 2.0, 3.0, 4.0],
            (2, 2),
        )
        .unwrap();
        let pattern = diag4([9.0; 4]);
        assert!(restrict_to_pattern(&full, &pattern).is_err());

        let pattern = CsrMatrix::from_coordinates(&[0, 1], &[0, 1], &[9.0, 9.0], (2, 2)).unwrap();
        let r = restrict_to_pattern(&full, &pattern).unwrap();
        assert_eq!(r.values(), &[1.0, 4.0]);
    }

    #[test]
    fn test_restrict_missing_entries_are_zero() {
        let src = CsrMatrix::<f64>::zeros((3, 3));
        let pattern = CsrMatrix::identity(3);
        let r = restrict_to_pattern(&src, &pattern).unwrap();

        assert!(r.same_pattern(&pattern));
        assert_eq!(r.values(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_pattern_dot() {
        let a = diag4([1.0, 2.0, 3.0, 4.0]);
        let b = diag4([1.0, 1.0, 1.0, 1.0]);
        assert_eq!(pattern_dot(&a, &b).unwrap(), 10.0);

        let c = CsrMatrix::<f64>::zeros((4, 4));
        assert!(pattern_dot(&a, &c).is_err());
    }
}
