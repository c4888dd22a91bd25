//! Vector-Jacobian Product (VJP) rules for sparse matrix operations
//!
//! Every differentiable sparse operation comes as an explicit forward/backward
//! pair: `XxxVjp::forward(..)` returns the output together with a context that
//! holds what the backward pass needs, and [`VjpOp::vjp`] maps the output
//! cotangent to input cotangents. No tape or graph is built implicitly.
//!
//! # Overview
//!
//! For a forward operation `y = f(x1, x2, ...)`, the VJP computes:
//! ```text
//! vjp(dy) = (∂L/∂x1, ∂L/∂x2, ...)
//! ```
//! where `dy = ∂L/∂y` is the incoming gradient (cotangent).
//!
//! # Sparse cotangents
//!
//! Gradients with respect to a sparse matrix live on that matrix's sparsity
//! pattern: the index arrays are not differentiable, so only the stored
//! values receive gradient. Incoming matrix cotangents may have any pattern;
//! they are restricted to the relevant pattern with
//! [`restrict_to_pattern`] before use.

use alphamat_sparse::{
    cg, pattern_dot, restrict_to_pattern, sparse_add_scaled, sparse_scale, CgConfig, CooMatrix,
    CsrMatrix, SolverInfo,
};
use anyhow::{anyhow, Result};
use scirs2_core::ndarray_ext::{Array1, ArrayView1};
use scirs2_core::numeric::Float;

/// Trait for operations that support VJP (backward differentiation)
pub trait VjpOp<T: Float> {
    /// Type of the gradient w.r.t. the output
    type Cotangent;

    /// Gradients w.r.t. the inputs
    type Grads;

    /// Compute the VJP (backward pass) given the output gradient
    ///
    /// # Arguments
    ///
    /// * `output_grad` - Gradient w.r.t. the output (∂L/∂output)
    ///
    /// # Returns
    ///
    /// Gradients w.r.t. each differentiable input
    fn vjp(&self, output_grad: &Self::Cotangent) -> Result<Self::Grads>;
}

/// VJP context for `C = α·A + β·B`
///
/// ```text
/// dA = α·dC|A        dα = Σ A ⊙ dC|A
/// dB = β·dC|B        dβ = Σ B ⊙ dC|B
/// ```
#[derive(Debug, Clone)]
pub struct AddVjp<T> {
    /// First operand (saved from forward pass)
    pub input_a: CsrMatrix<T>,
    /// Second operand (saved from forward pass)
    pub input_b: CsrMatrix<T>,
    /// Coefficient of A
    pub alpha: T,
    /// Coefficient of B
    pub beta: T,
}

/// Gradients produced by [`AddVjp`]
#[derive(Debug, Clone)]
pub struct AddGrads<T> {
    pub grad_a: CsrMatrix<T>,
    pub grad_b: CsrMatrix<T>,
    pub grad_alpha: T,
    pub grad_beta: T,
}

impl<T: Float> AddVjp<T> {
    /// Create a new addition VJP context
    pub fn new(input_a: CsrMatrix<T>, input_b: CsrMatrix<T>, alpha: T, beta: T) -> Self {
        Self {
            input_a,
            input_b,
            alpha,
            beta,
        }
    }

    /// Forward pass: compute `α·A + β·B` and keep the context
    pub fn forward(
        a: &CsrMatrix<T>,
        b: &CsrMatrix<T>,
        alpha: T,
        beta: T,
    ) -> Result<(CsrMatrix<T>, Self)> {
        let c = sparse_add_scaled(a, b, alpha, beta)?;
        Ok((c, Self::new(a.clone(), b.clone(), alpha, beta)))
    }
}

impl<T: Float> VjpOp<T> for AddVjp<T> {
    type Cotangent = CsrMatrix<T>;
    type Grads = AddGrads<T>;

    fn vjp(&self, output_grad: &CsrMatrix<T>) -> Result<AddGrads<T>> {
        let mut grad_a = restrict_to_pattern(output_grad, &self.input_a)?;
        let mut grad_b = restrict_to_pattern(output_grad, &self.input_b)?;

        let grad_alpha = pattern_dot(&self.input_a, &grad_a)?;
        let grad_beta = pattern_dot(&self.input_b, &grad_b)?;

        grad_a.scale_in_place(self.alpha);
        grad_b.scale_in_place(self.beta);

        Ok(AddGrads {
            grad_a,
            grad_b,
            grad_alpha,
            grad_beta,
        })
    }
}

/// VJP context for `y = A·x`
///
/// ```text
/// dx[j] += A[k]·dy[i]       for every stored entry k = (i, j)
/// dA[k]  = dy[i]·x[j]
/// ```
#[derive(Debug, Clone)]
pub struct SpMvVjp<T> {
    /// Matrix operand (saved from forward pass)
    pub matrix: CsrMatrix<T>,
    /// Vector operand (saved from forward pass)
    pub vector: Array1<T>,
}

/// Gradients produced by [`SpMvVjp`]
#[derive(Debug, Clone)]
pub struct SpMvGrads<T> {
    pub grad_matrix: CsrMatrix<T>,
    pub grad_vector: Array1<T>,
}

impl<T: Float> SpMvVjp<T> {
    /// Create a new SpMV VJP context
    pub fn new(matrix: CsrMatrix<T>, vector: Array1<T>) -> Self {
        Self { matrix, vector }
    }

    /// Forward pass: compute `A·x` and keep the context
    pub fn forward(matrix: &CsrMatrix<T>, vector: &ArrayView1<T>) -> Result<(Array1<T>, Self)> {
        let y = matrix.spmv(vector)?;
        Ok((y, Self::new(matrix.clone(), vector.to_owned())))
    }
}

impl<T: Float> VjpOp<T> for SpMvVjp<T> {
    type Cotangent = Array1<T>;
    type Grads = SpMvGrads<T>;

    fn vjp(&self, output_grad: &Array1<T>) -> Result<SpMvGrads<T>> {
        if output_grad.len() != self.matrix.nrows() {
            return Err(anyhow!(
                "SpMV cotangent has {} elements, expected {}",
                output_grad.len(),
                self.matrix.nrows()
            ));
        }

        let mut grad_vector = Array1::<T>::zeros(self.matrix.ncols());
        let mut grad_values = Vec::with_capacity(self.matrix.nnz());

        for (row, col, &value) in self.matrix.iter() {
            let dy = output_grad[row];
            grad_vector[col] = grad_vector[col] + value * dy;
            grad_values.push(dy * self.vector[col]);
        }

        Ok(SpMvGrads {
            grad_matrix: self.matrix.with_values(grad_values)?,
            grad_vector,
        })
    }
}

/// VJP context for the sparse-sparse product `C = A·B`
///
/// ```text
/// dA = (dC·Bᵀ)|A
/// dB = (Aᵀ·dC)|B
/// ```
///
/// Both products are themselves sparse-sparse products, so the backward pass
/// stays output-sensitive.
#[derive(Debug, Clone)]
pub struct SpSpMmVjp<T> {
    /// Left operand (saved from forward pass)
    pub input_a: CsrMatrix<T>,
    /// Right operand (saved from forward pass)
    pub input_b: CsrMatrix<T>,
}

/// Gradients produced by [`SpSpMmVjp`]
#[derive(Debug, Clone)]
pub struct SpSpMmGrads<T> {
    pub grad_a: CsrMatrix<T>,
    pub grad_b: CsrMatrix<T>,
}

impl<T: Float> SpSpMmVjp<T> {
    /// Create a new SpSpMM VJP context
    pub fn new(input_a: CsrMatrix<T>, input_b: CsrMatrix<T>) -> Self {
        Self { input_a, input_b }
    }

    /// Forward pass: compute `A·B` and keep the context
    pub fn forward(a: &CsrMatrix<T>, b: &CsrMatrix<T>) -> Result<(CsrMatrix<T>, Self)> {
        let c = a.spspmm(b)?;
        Ok((c, Self::new(a.clone(), b.clone())))
    }
}

impl<T: Float> VjpOp<T> for SpSpMmVjp<T> {
    type Cotangent = CsrMatrix<T>;
    type Grads = SpSpMmGrads<T>;

    fn vjp(&self, output_grad: &CsrMatrix<T>) -> Result<SpSpMmGrads<T>> {
        let expected = (self.input_a.nrows(), self.input_b.ncols());
        if output_grad.shape() != expected {
            return Err(anyhow!(
                "SpSpMM cotangent shape {:?} doesn't match output shape {:?}",
                output_grad.shape(),
                expected
            ));
        }

        let full_a = output_grad.spspmm(&self.input_b.transpose())?;
        let full_b = self.input_a.transpose().spspmm(output_grad)?;

        Ok(SpSpMmGrads {
            grad_a: restrict_to_pattern(&full_a, &self.input_a)?,
            grad_b: restrict_to_pattern(&full_b, &self.input_b)?,
        })
    }
}

/// VJP context for `Aᵀ`
///
/// The backward pass is the inverse value permutation.
#[derive(Debug, Clone)]
pub struct TransposeVjp<T> {
    /// Input pattern
    pub input: CsrMatrix<T>,
    /// Output pattern
    pub output: CsrMatrix<T>,
    /// `perm[k]` = input value index placed at output position `k`
    pub perm: Vec<usize>,
}

impl<T: Float> TransposeVjp<T> {
    /// Forward pass: compute `Aᵀ` and keep the context
    pub fn forward(a: &CsrMatrix<T>) -> (CsrMatrix<T>, Self) {
        let (at, perm) = a.transpose_with_permutation();
        let ctx = Self {
            input: a.clone(),
            output: at.clone(),
            perm,
        };
        (at, ctx)
    }
}

impl<T: Float> VjpOp<T> for TransposeVjp<T> {
    type Cotangent = CsrMatrix<T>;
    type Grads = CsrMatrix<T>;

    fn vjp(&self, output_grad: &CsrMatrix<T>) -> Result<CsrMatrix<T>> {
        let restricted = restrict_to_pattern(output_grad, &self.output)?;

        let mut values = vec![T::zero(); self.input.nnz()];
        for (k, &src) in self.perm.iter().enumerate() {
            values[src] = restricted.values()[k];
        }

        Ok(self.input.with_values(values)?)
    }
}

/// VJP context for `C = s·A`
#[derive(Debug, Clone)]
pub struct ScaleVjp<T> {
    /// Matrix operand (saved from forward pass)
    pub input: CsrMatrix<T>,
    /// Scalar operand
    pub scalar: T,
}

/// Gradients produced by [`ScaleVjp`]
#[derive(Debug, Clone)]
pub struct ScaleGrads<T> {
    pub grad_input: CsrMatrix<T>,
    pub grad_scalar: T,
}

impl<T: Float> ScaleVjp<T> {
    /// Forward pass: compute `s·A` and keep the context
    pub fn forward(a: &CsrMatrix<T>, scalar: T) -> (CsrMatrix<T>, Self) {
        let c = sparse_scale(a, scalar);
        let ctx = Self {
            input: a.clone(),
            scalar,
        };
        (c, ctx)
    }
}

impl<T: Float> VjpOp<T> for ScaleVjp<T> {
    type Cotangent = CsrMatrix<T>;
    type Grads = ScaleGrads<T>;

    fn vjp(&self, output_grad: &CsrMatrix<T>) -> Result<ScaleGrads<T>> {
        let mut grad_input = restrict_to_pattern(output_grad, &self.input)?;
        let grad_scalar = pattern_dot(&self.input, &grad_input)?;
        grad_input.scale_in_place(self.scalar);

        Ok(ScaleGrads {
            grad_input,
            grad_scalar,
        })
    }
}

/// VJP context for `D = diag(d)`
#[derive(Debug, Clone)]
pub struct DiagonalVjp<T> {
    /// Output pattern (every diagonal position stored)
    pub output: CsrMatrix<T>,
}

impl<T: Float> DiagonalVjp<T> {
    /// Forward pass: build `diag(d)` and keep the context
    pub fn forward(diagonal: &ArrayView1<T>) -> (CsrMatrix<T>, Self) {
        let d = CsrMatrix::from_diagonal(&diagonal.to_vec());
        let ctx = Self { output: d.clone() };
        (d, ctx)
    }
}

impl<T: Float> VjpOp<T> for DiagonalVjp<T> {
    type Cotangent = CsrMatrix<T>;
    type Grads = Array1<T>;

    fn vjp(&self, output_grad: &CsrMatrix<T>) -> Result<Array1<T>> {
        let restricted = restrict_to_pattern(output_grad, &self.output)?;
        Ok(Array1::from_vec(restricted.values().to_vec()))
    }
}

/// VJP context for building a matrix from coordinate triplets
///
/// Triplets that share a coordinate were summed in the forward pass, so each
/// of them receives the full cotangent of that entry:
///
/// ```text
/// dvalues[k] = dM[row_k, col_k]
/// ```
#[derive(Debug, Clone)]
pub struct FromCooVjp<T> {
    /// Output pattern
    pub output: CsrMatrix<T>,
    /// `map[k]` = output value index triplet `k` was accumulated into
    pub map: Vec<usize>,
}

impl<T: Float> FromCooVjp<T> {
    /// Forward pass: build canonical CSR from triplets and keep the context
    pub fn forward(
        row_indices: &[usize],
        col_indices: &[usize],
        values: &[T],
        shape: (usize, usize),
    ) -> Result<(CsrMatrix<T>, Self)> {
        let coo = CooMatrix::new(
            row_indices.to_vec(),
            col_indices.to_vec(),
            values.to_vec(),
            shape,
        )?;
        let (m, map) = coo.to_csr_with_map();
        let ctx = Self {
            output: m.clone(),
            map,
        };
        Ok((m, ctx))
    }
}

impl<T: Float> VjpOp<T> for FromCooVjp<T> {
    type Cotangent = CsrMatrix<T>;
    type Grads = Array1<T>;

    fn vjp(&self, output_grad: &CsrMatrix<T>) -> Result<Array1<T>> {
        let restricted = restrict_to_pattern(output_grad, &self.output)?;
        let values = restricted.values();
        Ok(self.map.iter().map(|&pos| values[pos]).collect())
    }
}

/// VJP context for the linear solve `x = A⁻¹·b`
///
/// Differentiates the solution implicitly instead of unrolling the solver
/// iterations:
///
/// ```text
/// Aᵀ·λ = dx      (solved with the forward CG settings)
/// db   = λ
/// dA   = −(λ·xᵀ)|A
/// ```
#[derive(Debug, Clone)]
pub struct CgVjp<T> {
    /// System matrix (saved from forward pass)
    pub matrix: CsrMatrix<T>,
    /// Returned solution
    pub solution: Array1<T>,
    /// Solver settings reused for the adjoint solve
    pub config: CgConfig,
}

/// Gradients produced by [`CgVjp`]
#[derive(Debug, Clone)]
pub struct SolveGrads<T> {
    pub grad_matrix: CsrMatrix<T>,
    pub grad_rhs: Array1<T>,
    /// Convergence of the adjoint solve
    pub adjoint_info: SolverInfo,
}

impl<T: Float> CgVjp<T> {
    /// Forward pass: run CG and keep the context
    pub fn forward(
        matrix: &CsrMatrix<T>,
        rhs: &ArrayView1<T>,
        x0: &ArrayView1<T>,
        config: &CgConfig,
    ) -> Result<(Array1<T>, SolverInfo, Self)> {
        let (x, info) = cg(matrix, rhs, x0, config)?;
        let ctx = Self {
            matrix: matrix.clone(),
            solution: x.clone(),
            config: *config,
        };
        Ok((x, info, ctx))
    }
}

impl<T: Float> VjpOp<T> for CgVjp<T> {
    type Cotangent = Array1<T>;
    type Grads = SolveGrads<T>;

    fn vjp(&self, output_grad: &Array1<T>) -> Result<SolveGrads<T>> {
        let n = self.matrix.nrows();
        if output_grad.len() != n {
            return Err(anyhow!(
                "Solve cotangent has {} elements, expected {}",
                output_grad.len(),
                n
            ));
        }

        let at = self.matrix.transpose();
        let zeros = Array1::<T>::zeros(n);
        let (lambda, adjoint_info) = cg(&at, &output_grad.view(), &zeros.view(), &self.config)?;

        let grad_values: Vec<T> = self
            .matrix
            .iter()
            .map(|(row, col, _)| -(lambda[row] * self.solution[col]))
            .collect();

        Ok(SolveGrads {
            grad_matrix: self.matrix.with_values(grad_values)?,
            grad_rhs: lambda,
            adjoint_info,
        })
    }
}
