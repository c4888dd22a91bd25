//! COO (Coordinate) triplet format for 2D sparse matrices
//!
//! The coordinate format stores a sparse matrix as parallel arrays of
//! `(row, col, value)` triplets. It is the construction format: triplets may
//! arrive in any order and may repeat a coordinate. Conversion to CSR sorts
//! the triplets by `(row, col)` and **sums** every group of repeated
//! coordinates into a single stored entry.
//!
//! # Examples
//!
//! ```
//! use alphamat_sparse::coo::CooMatrix;
//!
//! // (0,1) appears twice: the two values are summed
//! let coo = CooMatrix::new(
//!     vec![0, 1, 0],
//!     vec![1, 0, 1],
//!     vec![2.0, 3.0, 0.5],
//!     (2, 2),
//! )
//! .unwrap();
//! let csr = coo.to_csr();
//!
//! assert_eq!(csr.nnz(), 2);
//! assert_eq!(csr.get(0, 1), Some(2.5));
//! ```

use crate::csr::CsrMatrix;
use crate::error::{SparseError, SparseResult};
use scirs2_core::numeric::Float;

/// COO (Coordinate) sparse matrix
///
/// Validated triplet container. Duplicates are allowed here and are summed
/// when converting to [`CsrMatrix`].
#[derive(Debug, Clone)]
pub struct CooMatrix<T> {
    /// Row coordinate of each triplet
    row_indices: Vec<usize>,

    /// Column coordinate of each triplet
    col_indices: Vec<usize>,

    /// Value of each triplet
    values: Vec<T>,

    /// Shape: (nrows, ncols)
    shape: (usize, usize),
}

impl<T: Clone> CooMatrix<T> {
    /// Create a new COO matrix from parallel triplet arrays
    ///
    /// # Errors
    ///
    /// - `LengthMismatch` if the three arrays differ in length
    /// - `TooManyEntries` if there are more triplets than `rows * cols`
    /// - `IndexOutOfBounds` if any coordinate falls outside `shape`
    pub fn new(
        row_indices: Vec<usize>,
        col_indices: Vec<usize>,
        values: Vec<T>,
        shape: (usize, usize),
    ) -> SparseResult<Self> {
        let (nrows, ncols) = shape;

        if row_indices.len() != col_indices.len() {
            return Err(SparseError::LengthMismatch {
                what: "col_indices",
                expected: row_indices.len(),
                got: col_indices.len(),
            });
        }
        if row_indices.len() != values.len() {
            return Err(SparseError::LengthMismatch {
                what: "values",
                expected: row_indices.len(),
                got: values.len(),
            });
        }

        let capacity = nrows.saturating_mul(ncols);
        if row_indices.len() > capacity {
            return Err(SparseError::TooManyEntries {
                nnz: row_indices.len(),
                rows: nrows,
                cols: ncols,
            });
        }

        for (&row, &col) in row_indices.iter().zip(&col_indices) {
            if row >= nrows || col >= ncols {
                return Err(SparseError::IndexOutOfBounds {
                    row,
                    col,
                    rows: nrows,
                    cols: ncols,
                });
            }
        }

        Ok(Self {
            row_indices,
            col_indices,
            values,
            shape,
        })
    }

    /// Triplets taken from an already-validated matrix
    pub(crate) fn from_validated_parts(
        row_indices: Vec<usize>,
        col_indices: Vec<usize>,
        values: Vec<T>,
        shape: (usize, usize),
    ) -> Self {
        debug_assert_eq!(row_indices.len(), values.len());
        debug_assert_eq!(col_indices.len(), values.len());

        Self {
            row_indices,
            col_indices,
            values,
            shape,
        }
    }

    /// Create an empty COO matrix with given shape
    pub fn zeros(shape: (usize, usize)) -> Self {
        Self {
            row_indices: Vec::new(),
            col_indices: Vec::new(),
            values: Vec::new(),
            shape,
        }
    }

    /// Number of stored triplets (duplicates counted separately)
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Shape of the matrix (nrows, ncols)
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Row coordinates
    pub fn row_indices(&self) -> &[usize] {
        &self.row_indices
    }

    /// Column coordinates
    pub fn col_indices(&self) -> &[usize] {
        &self.col_indices
    }

    /// Triplet values
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Append a triplet
    ///
    /// Does not check for duplicates; they are summed on conversion.
    pub fn push(&mut self, row: usize, col: usize, value: T) -> SparseResult<()> {
        let (nrows, ncols) = self.shape;
        if row >= nrows || col >= ncols {
            return Err(SparseError::IndexOutOfBounds {
                row,
                col,
                rows: nrows,
                cols: ncols,
            });
        }
        if self.nnz() + 1 > nrows.saturating_mul(ncols) {
            return Err(SparseError::TooManyEntries {
                nnz: self.nnz() + 1,
                rows: nrows,
                cols: ncols,
            });
        }

        self.row_indices.push(row);
        self.col_indices.push(col);
        self.values.push(value);
        Ok(())
    }

    /// Permutation that orders the triplets by (row, col)
    ///
    /// Counting sort over rows followed by a stable sort of each row by
    /// column, so repeated coordinates keep their input order.
    fn sorted_permutation(&self) -> (Vec<usize>, Vec<usize>) {
        let nrows = self.shape.0;

        let mut row_start = vec![0usize; nrows + 1];
        for &row in &self.row_indices {
            row_start[row + 1] += 1;
        }
        for i in 0..nrows {
            row_start[i + 1] += row_start[i];
        }

        let mut next = row_start[..nrows].to_vec();
        let mut perm = vec![0usize; self.nnz()];
        for (k, &row) in self.row_indices.iter().enumerate() {
            perm[next[row]] = k;
            next[row] += 1;
        }

        for i in 0..nrows {
            perm[row_start[i]..row_start[i + 1]].sort_by_key(|&k| self.col_indices[k]);
        }

        (perm, row_start)
    }
}

impl<T: Float> CooMatrix<T> {
    /// Convert to canonical CSR, summing duplicate coordinates
    ///
    /// # Complexity
    ///
    /// O(nnz log(max row length) + nrows)
    pub fn to_csr(&self) -> CsrMatrix<T> {
        self.to_csr_with_map().0
    }

    /// Convert to canonical CSR and report where each triplet landed
    ///
    /// `map[k]` is the position in the output `values()` that triplet `k`
    /// was accumulated into. Repeated coordinates share a position.
    pub fn to_csr_with_map(&self) -> (CsrMatrix<T>, Vec<usize>) {
        let nrows = self.shape.0;
        let (perm, row_start) = self.sorted_permutation();

        let mut row_ptr = Vec::with_capacity(nrows + 1);
        let mut col_indices = Vec::with_capacity(self.nnz());
        let mut values: Vec<T> = Vec::with_capacity(self.nnz());
        let mut map = vec![0usize; self.nnz()];

        row_ptr.push(0);
        for i in 0..nrows {
            let row_begin = col_indices.len();
            for &k in &perm[row_start[i]..row_start[i + 1]] {
                let col = self.col_indices[k];
                let merges = col_indices.len() > row_begin && col_indices.last() == Some(&col);
                if merges {
                    let last = values.len() - 1;
                    values[last] = values[last] + self.values[k];
                } else {
                    col_indices.push(col);
                    values.push(self.values[k]);
                }
                map[k] = values.len() - 1;
            }
            row_ptr.push(col_indices.len());
        }

        let csr = CsrMatrix::from_canonical_parts(row_ptr, col_indices, values, self.shape);
        (csr, map)
    }

    /// Deduplicate in place by summing values at the same coordinate
    ///
    /// Leaves the triplets sorted by (row, col).
    pub fn deduplicate(&mut self) {
        let csr = self.to_csr();
        let mut rows = Vec::with_capacity(csr.nnz());
        for i in 0..csr.nrows() {
            let len = csr.row_ptr()[i + 1] - csr.row_ptr()[i];
            rows.extend(std::iter::repeat(i).take(len));
        }
        self.row_indices = rows;
        self.col_indices = csr.col_indices().to_vec();
        self.values = csr.values().to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coo_creation() {
        let coo =
            CooMatrix::new(vec![0, 1, 2], vec![1, 2, 0], vec![2.5, 3.0, 1.5], (3, 4)).unwrap();
        assert_eq!(coo.nnz(), 3);
        assert_eq!(coo.shape(), (3, 4));
    }

    #[test]
    fn test_coo_length_mismatch() {
        let err = CooMatrix::new(vec![0, 1], vec![0], vec![1.0, 2.0], (2, 2)).unwrap_err();
        assert!(matches!(err, SparseError::LengthMismatch { what: "col_indices", .. }));

        let err = CooMatrix::new(vec![0, 1], vec![0, 1], vec![1.0], (2, 2)).unwrap_err();
        assert!(matches!(err, SparseError::LengthMismatch { what: "values", .. }));
    }

    #[test]
    fn test_coo_too_many_entries() {
        let err = CooMatrix::new(
            vec![0, 0, 0, 0, 0],
            vec![0, 0, 0, 0, 0],
            vec![1.0; 5],
            (2, 2),
        )
        .unwrap_err();
        assert!(matches!(err, SparseError::TooManyEntries { nnz: 5, .. }));
    }

    #[test]
    fn test_coo_out_of_bounds() {
        let err = CooMatrix::new(vec![0, 3], vec![0, 0], vec![1.0, 2.0], (3, 3)).unwrap_err();
        assert!(matches!(err, SparseError::IndexOutOfBounds { row: 3, .. }));
    }

    #[test]
    fn test_coo_push() {
        let mut coo = CooMatrix::<f64>::zeros((3, 3));
        coo.push(0, 0, 1.0).unwrap();
        coo.push(1, 1, 2.0).unwrap();
        assert!(coo.push(3, 0, 1.0).is_err());

        assert_eq!(coo.nnz(), 2);
    }

    #[test]
    fn test_to_csr_sorted_rows() {
        // Matches the canonical layout:
        // row 0: cols 0, 3; rows 1..3: diagonal
        let coo = CooMatrix::new(
            vec![0, 0, 1, 2, 3],
            vec![0, 3, 1, 2, 3],
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            (4, 4),
        )
        .unwrap();
        let csr = coo.to_csr();

        assert_eq!(csr.row_ptr(), &[0, 2, 3, 4, 5]);
        assert_eq!(csr.col_indices(), &[0, 3, 1, 2, 3]);
        assert_eq!(csr.values(), &[0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_to_csr_sums_duplicates() {
        let coo = CooMatrix::new(
            vec![1, 0, 1, 0, 1],
            vec![1, 0, 1, 0, 0],
            vec![3.0, 1.0, 4.0, 2.0, 5.0],
            (2, 2),
        )
        .unwrap();
        let (csr, map) = coo.to_csr_with_map();

        assert_eq!(csr.nnz(), 3);
        assert_eq!(csr.row_ptr(), &[0, 1, 3]);
        assert_eq!(csr.col_indices(), &[0, 0, 1]);
        assert_eq!(csr.values(), &[3.0, 5.0, 7.0]);
        assert_eq!(map, vec![2, 0, 2, 0, 1]);
    }

    #[test]
    fn test_deduplicate() {
        let mut coo = CooMatrix::new(
            vec![2, 0, 0, 1, 1],
            vec![2, 0, 0, 1, 1],
            vec![5.0, 1.0, 2.0, 3.0, 4.0],
            (3, 3),
        )
        .unwrap();
        coo.deduplicate();

        assert_eq!(coo.nnz(), 3);
        assert_eq!(coo.row_indices(), &[0, 1, 2]);
        assert_eq!(coo.values(), &[3.0, 7.0, 5.0]);
    }
}
