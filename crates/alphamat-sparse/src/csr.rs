//! CSR (Compressed Sparse Row) format for 2D matrices
//!
//! CSR is the canonical storage of every matrix in alphamat: Laplacians, the
//! assembled system matrix and all matrix-valued gradients.
//!
//! # Format
//!
//! For an m×n sparse matrix with nnz stored entries:
//! - `row_ptr`: `Vec<usize>` of length m+1 - row_ptr\[i\] points to start of row i
//! - `col_indices`: `Vec<usize>` of length nnz - column index for each entry
//! - `values`: `Vec<T>` of length nnz - the stored values
//! - `shape`: (m, n) - dimensions of the matrix
//!
//! A matrix is *canonical* when the column indices of every row are strictly
//! increasing. Everything built by [`CsrMatrix::from_coordinates`] and every
//! operation output is canonical. [`CsrMatrix::from_row_pointers`] trusts the
//! caller on ordering.
//!
//! Stored entries are never dropped because their value happens to be zero:
//! the sparsity pattern is what gradients are indexed by.
//!
//! # Examples
//!
//! ```
//! use alphamat_sparse::csr::CsrMatrix;
//!
//! // Create a 3×4 sparse matrix:
//! // [1.0  0   2.0  0  ]
//! // [0    3.0 0    0  ]
//! // [4.0  0   0    5.0]
//!
//! let row_ptr = vec![0, 2, 3, 5];
//! let col_indices = vec![0, 2, 1, 0, 3];
//! let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
//!
//! let csr = CsrMatrix::from_row_pointers(row_ptr, col_indices, values, (3, 4)).unwrap();
//! assert_eq!(csr.nnz(), 5);
//! ```

use crate::coo::CooMatrix;
use crate::error::{SparseError, SparseResult};
use scirs2_core::ndarray_ext::{Array1, Array2, ArrayView1, ArrayView2};
use scirs2_core::numeric::Float;

/// CSR (Compressed Sparse Row) matrix
///
/// Owns its three buffers outright; operations always allocate fresh output.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix<T> {
    /// Row pointers: row_ptr[i] = start index of row i in col_indices/values
    /// Length: nrows + 1, with row_ptr[nrows] = nnz
    row_ptr: Vec<usize>,

    /// Column indices for each stored entry
    col_indices: Vec<usize>,

    /// Values of stored entries
    values: Vec<T>,

    /// Shape: (nrows, ncols)
    shape: (usize, usize),
}

impl<T: Clone> CsrMatrix<T> {
    /// Create a CSR matrix directly from row-pointer form
    ///
    /// This is the fast path: entries are not re-sorted and per-row column
    /// uniqueness is the caller's responsibility.
    ///
    /// # Errors
    ///
    /// - `InvalidRowPointer` if `row_ptr.len() != nrows + 1`, `row_ptr[0] != 0`,
    ///   the pointers decrease, or `row_ptr[nrows] != nnz`
    /// - `LengthMismatch` if `col_indices` and `values` differ in length
    /// - `TooManyEntries` if nnz exceeds `nrows * ncols`
    /// - `IndexOutOfBounds` if a column index is `>= ncols`
    pub fn from_row_pointers(
        row_ptr: Vec<usize>,
        col_indices: Vec<usize>,
        values: Vec<T>,
        shape: (usize, usize),
    ) -> SparseResult<Self> {
        let (nrows, ncols) = shape;

        if row_ptr.len() != nrows + 1 {
            return Err(SparseError::row_pointer(format!(
                "length {} for {} rows (expected {})",
                row_ptr.len(),
                nrows,
                nrows + 1
            )));
        }

        if col_indices.len() != values.len() {
            return Err(SparseError::LengthMismatch {
                what: "values",
                expected: col_indices.len(),
                got: values.len(),
            });
        }

        if row_ptr[0] != 0 {
            return Err(SparseError::row_pointer(format!(
                "row_ptr[0] = {} (expected 0)",
                row_ptr[0]
            )));
        }

        for i in 0..nrows {
            if row_ptr[i] > row_ptr[i + 1] {
                return Err(SparseError::row_pointer(format!(
                    "not sorted at index {}: {} > {}",
                    i,
                    row_ptr[i],
                    row_ptr[i + 1]
                )));
            }
        }

        let nnz = col_indices.len();
        if row_ptr[nrows] != nnz {
            return Err(SparseError::row_pointer(format!(
                "row_ptr[{}] = {} but {} entries are stored",
                nrows, row_ptr[nrows], nnz
            )));
        }

        if nnz > nrows.saturating_mul(ncols) {
            return Err(SparseError::TooManyEntries {
                nnz,
                rows: nrows,
                cols: ncols,
            });
        }

        for row in 0..nrows {
            for &col in &col_indices[row_ptr[row]..row_ptr[row + 1]] {
                if col >= ncols {
                    return Err(SparseError::IndexOutOfBounds {
                        row,
                        col,
                        rows: nrows,
                        cols: ncols,
                    });
                }
            }
        }

        Ok(Self {
            row_ptr,
            col_indices,
            values,
            shape,
        })
    }

    /// Assemble from buffers an operation has already produced in canonical form
    pub(crate) fn from_canonical_parts(
        row_ptr: Vec<usize>,
        col_indices: Vec<usize>,
        values: Vec<T>,
        shape: (usize, usize),
    ) -> Self {
        debug_assert_eq!(row_ptr.len(), shape.0 + 1);
        debug_assert_eq!(col_indices.len(), values.len());
        debug_assert_eq!(row_ptr.last().copied(), Some(values.len()));

        Self {
            row_ptr,
            col_indices,
            values,
            shape,
        }
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Shape of the matrix (nrows, ncols)
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Number of rows
    pub fn nrows(&self) -> usize {
        self.shape.0
    }

    /// Number of columns
    pub fn ncols(&self) -> usize {
        self.shape.1
    }

    /// Get row pointers
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    /// Get column indices
    pub fn col_indices(&self) -> &[usize] {
        &self.col_indices
    }

    /// Get values
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Decompose into `(row_ptr, col_indices, values, shape)`
    pub fn into_parts(self) -> (Vec<usize>, Vec<usize>, Vec<T>, (usize, usize)) {
        (self.row_ptr, self.col_indices, self.values, self.shape)
    }

    /// Get a row as (col_indices, values) slices
    pub fn row(&self, i: usize) -> Option<(&[usize], &[T])> {
        if i >= self.nrows() {
            return None;
        }

        let start = self.row_ptr[i];
        let end = self.row_ptr[i + 1];

        Some((&self.col_indices[start..end], &self.values[start..end]))
    }

    /// Iterate stored entries as `(row, col, value)` in storage order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> + '_ {
        (0..self.nrows()).flat_map(move |row| {
            let range = self.row_ptr[row]..self.row_ptr[row + 1];
            self.col_indices[range.clone()]
                .iter()
                .zip(&self.values[range])
                .map(move |(&col, value)| (row, col, value))
        })
    }

    /// True when both matrices store exactly the same positions in the same order
    pub fn same_pattern<U>(&self, other: &CsrMatrix<U>) -> bool {
        self.shape == other.shape
            && self.row_ptr == other.row_ptr
            && self.col_indices == other.col_indices
    }

    /// True when the column indices of every row are strictly increasing
    pub fn is_canonical(&self) -> bool {
        (0..self.nrows()).all(|row| {
            self.col_indices[self.row_ptr[row]..self.row_ptr[row + 1]]
                .windows(2)
                .all(|w| w[0] < w[1])
        })
    }

    /// New matrix with this sparsity pattern and the given values
    ///
    /// # Errors
    ///
    /// `LengthMismatch` if `values.len() != nnz`.
    pub fn with_values<U>(&self, values: Vec<U>) -> SparseResult<CsrMatrix<U>> {
        if values.len() != self.nnz() {
            return Err(SparseError::LengthMismatch {
                what: "values",
                expected: self.nnz(),
                got: values.len(),
            });
        }

        Ok(CsrMatrix {
            row_ptr: self.row_ptr.clone(),
            col_indices: self.col_indices.clone(),
            values,
            shape: self.shape,
        })
    }
}

impl<T: Float> CsrMatrix<T> {
    /// Create an empty matrix with given shape
    pub fn zeros(shape: (usize, usize)) -> Self {
        Self::from_canonical_parts(vec![0; shape.0 + 1], Vec::new(), Vec::new(), shape)
    }

    /// n×n identity matrix
    pub fn identity(n: usize) -> Self {
        Self::from_diagonal(&vec![T::one(); n])
    }

    /// Square diagonal matrix with every diagonal position stored
    ///
    /// Zeros on the diagonal are kept as explicit entries so the pattern
    /// does not depend on the values.
    pub fn from_diagonal(diagonal: &[T]) -> Self {
        let n = diagonal.len();
        Self::from_canonical_parts((0..=n).collect(), (0..n).collect(), diagonal.to_vec(), (n, n))
    }

    /// Build a canonical CSR matrix from coordinate triplets
    ///
    /// Entries are sorted by (row, col); values sharing a coordinate are
    /// summed.
    ///
    /// # Errors
    ///
    /// - `LengthMismatch` if the arrays differ in length
    /// - `TooManyEntries` if there are more triplets than `rows * cols`
    /// - `IndexOutOfBounds` if a coordinate falls outside `shape`
    ///
    /// # Examples
    ///
    /// ```
    /// use alphamat_sparse::csr::CsrMatrix;
    ///
    /// let m = CsrMatrix::from_coordinates(&[0, 0, 1], &[1, 1, 0], &[1.0, 2.0, 4.0], (2, 2)).unwrap();
    /// assert_eq!(m.nnz(), 2);
    /// assert_eq!(m.get(0, 1), Some(3.0));
    /// ```
    pub fn from_coordinates(
        row_indices: &[usize],
        col_indices: &[usize],
        values: &[T],
        shape: (usize, usize),
    ) -> SparseResult<Self> {
        let coo = CooMatrix::new(
            row_indices.to_vec(),
            col_indices.to_vec(),
            values.to_vec(),
            shape,
        )?;
        Ok(coo.to_csr())
    }

    /// Convert from COO format (duplicates summed)
    pub fn from_coo(coo: &CooMatrix<T>) -> Self {
        coo.to_csr()
    }

    /// Convert to COO format
    pub fn to_coo(&self) -> CooMatrix<T> {
        let mut rows = Vec::with_capacity(self.nnz());
        for row in 0..self.nrows() {
            let len = self.row_ptr[row + 1] - self.row_ptr[row];
            rows.extend(std::iter::repeat(row).take(len));
        }

        CooMatrix::from_validated_parts(
            rows,
            self.col_indices.clone(),
            self.values.clone(),
            self.shape,
        )
    }

    /// Value at (row, col), or `None` when the position is not stored
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        let (cols, vals) = self.row(row)?;
        cols.iter()
            .zip(vals)
            .filter(|&(&c, _)| c == col)
            .map(|(_, &v)| v)
            .reduce(|acc, v| acc + v)
    }

    /// Dense diagonal (zero where not stored)
    pub fn diagonal(&self) -> Array1<T> {
        let n = self.nrows().min(self.ncols());
        Array1::from_shape_fn(n, |i| self.get(i, i).unwrap_or_else(T::zero))
    }

    /// Multiply every stored value by `scalar` in place
    ///
    /// The only mutating operation on a matrix. Structure is untouched.
    pub fn scale_in_place(&mut self, scalar: T) {
        for v in self.values.iter_mut() {
            *v = *v * scalar;
        }
    }

    /// Row sums, `d[i] = Σ_j A[i,j]`
    pub fn row_sums(&self) -> Array1<T> {
        Array1::from_shape_fn(self.nrows(), |row| {
            self.values[self.row_ptr[row]..self.row_ptr[row + 1]]
                .iter()
                .fold(T::zero(), |acc, &v| acc + v)
        })
    }

    /// Convert to dense matrix (duplicate entries summed)
    pub fn to_dense(&self) -> Array2<T> {
        let mut dense = Array2::<T>::zeros(self.shape);
        for (row, col, &value) in self.iter() {
            dense[[row, col]] = dense[[row, col]] + value;
        }
        dense
    }

    /// Create CSR from dense matrix
    ///
    /// Only stores elements where |value| > threshold.
    pub fn from_dense(dense: &ArrayView2<T>, threshold: T) -> Self {
        let (nrows, ncols) = dense.dim();
        let mut row_ptr = Vec::with_capacity(nrows + 1);
        let mut col_indices = Vec::new();
        let mut values = Vec::new();

        row_ptr.push(0);
        for row in 0..nrows {
            for col in 0..ncols {
                let value = dense[[row, col]];
                if value.abs() > threshold {
                    col_indices.push(col);
                    values.push(value);
                }
            }
            row_ptr.push(col_indices.len());
        }

        Self::from_canonical_parts(row_ptr, col_indices, values, (nrows, ncols))
    }

    /// Sparse Matrix-Vector product: y = A * x
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if `x.len() != ncols`
    ///
    /// # Complexity
    ///
    /// O(nnz)
    ///
    /// # Examples
    ///
    /// ```
    /// use alphamat_sparse::csr::CsrMatrix;
    /// use scirs2_core::ndarray_ext::array;
    ///
    /// // Matrix: [1 0 2]
    /// //         [0 3 0]
    /// let csr = CsrMatrix::from_row_pointers(vec![0, 2, 3], vec![0, 2, 1], vec![1.0, 2.0, 3.0], (2, 3)).unwrap();
    ///
    /// let x = array![1.0, 2.0, 3.0];
    /// let y = csr.spmv(&x.view()).unwrap();
    /// assert_eq!(y[0], 7.0);  // 1*1 + 2*3
    /// assert_eq!(y[1], 6.0);  // 3*2
    /// ```
    pub fn spmv(&self, x: &ArrayView1<T>) -> SparseResult<Array1<T>> {
        if x.len() != self.ncols() {
            return Err(SparseError::vector_mismatch("spmv", self.shape, x.len()));
        }

        let mut y = Array1::<T>::zeros(self.nrows());

        for row in 0..self.nrows() {
            let start = self.row_ptr[row];
            let end = self.row_ptr[row + 1];

            let mut sum = T::zero();
            for idx in start..end {
                sum = sum + self.values[idx] * x[self.col_indices[idx]];
            }
            y[row] = sum;
        }

        Ok(y)
    }

    /// Sparse-sparse matrix product: C = A * B
    ///
    /// Row-by-row (Gustavson) accumulation into a dense scratch row, so the
    /// work is proportional to the number of `(i, k, j)` multiply triples and
    /// not to `rows * cols`. Output rows are sorted and every reachable
    /// position is stored, including products that cancel to zero.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if `A.ncols != B.nrows`
    ///
    /// # Examples
    ///
    /// ```
    /// use alphamat_sparse::csr::CsrMatrix;
    ///
    /// let a = CsrMatrix::from_coordinates(&[0, 0, 1], &[0, 2, 1], &[1.0, 2.0, 3.0], (2, 3)).unwrap();
    /// let b = CsrMatrix::from_coordinates(&[0, 2], &[0, 1], &[1.0, 4.0], (3, 2)).unwrap();
    ///
    /// let c = a.spspmm(&b).unwrap();
    /// assert_eq!(c.shape(), (2, 2));
    /// assert_eq!(c.get(0, 0), Some(1.0));
    /// assert_eq!(c.get(0, 1), Some(8.0));
    /// assert_eq!(c.get(1, 0), None);
    /// ```
    pub fn spspmm(&self, b: &CsrMatrix<T>) -> SparseResult<CsrMatrix<T>> {
        if self.ncols() != b.nrows() {
            return Err(SparseError::ShapeMismatch {
                op: "spspmm",
                lhs: self.shape,
                rhs: b.shape,
            });
        }

        let m = self.nrows();
        let n = b.ncols();

        let mut accumulator = vec![T::zero(); n];
        let mut marker = vec![usize::MAX; n];
        let mut touched: Vec<usize> = Vec::new();

        let mut row_ptr = Vec::with_capacity(m + 1);
        let mut col_indices = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);

        for i in 0..m {
            touched.clear();

            for a_idx in self.row_ptr[i]..self.row_ptr[i + 1] {
                let k = self.col_indices[a_idx];
                let a_val = self.values[a_idx];

                for b_idx in b.row_ptr[k]..b.row_ptr[k + 1] {
                    let j = b.col_indices[b_idx];
                    if marker[j] != i {
                        marker[j] = i;
                        accumulator[j] = T::zero();
                        touched.push(j);
                    }
                    accumulator[j] = accumulator[j] + a_val * b.values[b_idx];
                }
            }

            touched.sort_unstable();
            for &j in &touched {
                col_indices.push(j);
                values.push(accumulator[j]);
            }
            row_ptr.push(col_indices.len());
        }

        Ok(Self::from_canonical_parts(
            row_ptr,
            col_indices,
            values,
            (m, n),
        ))
    }

    /// Transpose: Aᵀ
    ///
    /// Counting sort over columns-as-new-rows. Canonical input gives
    /// canonical output.
    ///
    /// # Complexity
    ///
    /// O(nnz + nrows + ncols)
    pub fn transpose(&self) -> CsrMatrix<T> {
        self.transpose_with_permutation().0
    }

    /// Transpose and report the value permutation
    ///
    /// `perm[k]` is the index in `self.values()` that landed at position `k`
    /// of the transposed matrix's values.
    pub fn transpose_with_permutation(&self) -> (CsrMatrix<T>, Vec<usize>) {
        let (m, n) = self.shape;
        let nnz = self.nnz();

        let mut row_ptr = vec![0usize; n + 1];
        for &col in &self.col_indices {
            row_ptr[col + 1] += 1;
        }
        for j in 0..n {
            row_ptr[j + 1] += row_ptr[j];
        }

        let mut next = row_ptr[..n].to_vec();
        let mut col_indices = vec![0usize; nnz];
        let mut values = vec![T::zero(); nnz];
        let mut perm = vec![0usize; nnz];

        for row in 0..m {
            for idx in self.row_ptr[row]..self.row_ptr[row + 1] {
                let col = self.col_indices[idx];
                let pos = next[col];
                col_indices[pos] = row;
                values[pos] = self.values[idx];
                perm[pos] = idx;
                next[col] += 1;
            }
        }

        (
            Self::from_canonical_parts(row_ptr, col_indices, values, (n, m)),
            perm,
        )
    }
}
