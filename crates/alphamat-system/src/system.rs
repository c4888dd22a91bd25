//! Linear system assembly
//!
//! ```text
//! A = Lcs + (Lmat + ((Lcm + KU) + K))
//! b = (KU + K)·kToU
//! ```
//!
//! with `KU = diag(ku_weights ⊙ kToUconf)` and `K = diag(λ·known)`.

use alphamat_ad::{AddVjp, DiagonalVjp, SpMvVjp, VjpOp};
use alphamat_sparse::{sparse_add, CsrMatrix, SparseError};
use crate::error::SystemResult;
use scirs2_core::ndarray_ext::{Array1, ArrayView1};
use scirs2_core::numeric::Float;

/// Sparse system `A·x = b`
///
/// Also used as the cotangent of [`assemble_system`], with `a` on the
/// pattern of the assembled matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem<T> {
    pub a: CsrMatrix<T>,
    pub b: Array1<T>,
}

impl<T: Clone> LinearSystem<T> {
    /// Number of unknowns
    pub fn size(&self) -> usize {
        self.b.len()
    }
}

/// Borrowed inputs of [`assemble_system`]
#[derive(Debug, Clone)]
pub struct SystemInputs<'a, T> {
    /// Color-mixture Laplacian `Lcm`
    pub color_mixture: &'a CsrMatrix<T>,
    /// Matting Laplacian `Lmat`
    pub matting: &'a CsrMatrix<T>,
    /// Intra-unknown Laplacian `Lcs`
    pub intra_unknown: &'a CsrMatrix<T>,
    /// Per-pixel known-to-unknown weights; their length defines `N`
    pub ku_weights: ArrayView1<'a, T>,
    pub k_to_u_conf: ArrayView1<'a, T>,
    /// Known-pixel indicator
    pub known: ArrayView1<'a, T>,
    /// Right-hand side target
    pub k_to_u: ArrayView1<'a, T>,
    /// Weight of the known-pixel constraint
    pub lambda: T,
}

/// VJP context for [`assemble_system`]
#[derive(Debug, Clone)]
pub struct AssemblyVjp<T> {
    k_to_u_conf: Array1<T>,
    known: Array1<T>,
    ku_diag: DiagonalVjp<T>,
    known_diag: DiagonalVjp<T>,
    plus_ku: AddVjp<T>,
    plus_known: AddVjp<T>,
    plus_matting: AddVjp<T>,
    plus_intra_unknown: AddVjp<T>,
    constraints: AddVjp<T>,
    rhs: SpMvVjp<T>,
}

/// Gradients produced by [`AssemblyVjp`]
#[derive(Debug, Clone)]
pub struct AssemblyGrads<T> {
    pub color_mixture: CsrMatrix<T>,
    pub matting: CsrMatrix<T>,
    pub intra_unknown: CsrMatrix<T>,
    pub ku_weights: Array1<T>,
    pub lambda: T,
}

/// Assemble `A` and `b` from the three Laplacians and the diagonal terms
///
/// # Errors
///
/// - `ShapeMismatch` if a Laplacian is not `N×N`
/// - `LengthMismatch` if a per-pixel vector does not have `N` entries
pub fn assemble_system<T: Float>(
    inputs: &SystemInputs<'_, T>,
) -> SystemResult<(LinearSystem<T>, AssemblyVjp<T>)> {
    let n = inputs.ku_weights.len();

    for laplacian in [inputs.color_mixture, inputs.matting, inputs.intra_unknown] {
        if laplacian.shape() != (n, n) {
            return Err(SparseError::ShapeMismatch {
                op: "assemble_system",
                lhs: laplacian.shape(),
                rhs: (n, n),
            }
            .into());
        }
    }
    for (what, v) in [
        ("k_to_u_conf", &inputs.k_to_u_conf),
        ("known", &inputs.known),
        ("k_to_u", &inputs.k_to_u),
    ] {
        if v.len() != n {
            return Err(SparseError::LengthMismatch {
                what,
                expected: n,
                got: v.len(),
            }
            .into());
        }
    }

    let ku: Array1<T> = inputs
        .ku_weights
        .iter()
        .zip(inputs.k_to_u_conf.iter())
        .map(|(&w, &c)| w * c)
        .collect();
    let kn: Array1<T> = inputs.known.iter().map(|&k| inputs.lambda * k).collect();

    let (ku_mat, ku_diag) = DiagonalVjp::forward(&ku.view());
    let (kn_mat, known_diag) = DiagonalVjp::forward(&kn.view());

    let (s, plus_ku) = add(inputs.color_mixture, &ku_mat)?;
    let (s, plus_known) = add(&s, &kn_mat)?;
    let (s, plus_matting) = add(inputs.matting, &s)?;
    let (a, plus_intra_unknown) = add(inputs.intra_unknown, &s)?;

    let (constraint_mat, constraints) = add(&ku_mat, &kn_mat)?;
    let b = constraint_mat.spmv(&inputs.k_to_u)?;

    let ctx = AssemblyVjp {
        k_to_u_conf: inputs.k_to_u_conf.to_owned(),
        known: inputs.known.to_owned(),
        ku_diag,
        known_diag,
        plus_ku,
        plus_known,
        plus_matting,
        plus_intra_unknown,
        constraints,
        rhs: SpMvVjp::new(constraint_mat, inputs.k_to_u.to_owned()),
    };
    Ok((LinearSystem { a, b }, ctx))
}

fn add<T: Float>(a: &CsrMatrix<T>, b: &CsrMatrix<T>) -> SystemResult<(CsrMatrix<T>, AddVjp<T>)> {
    let c = sparse_add(a, b)?;
    Ok((c, AddVjp::new(a.clone(), b.clone(), T::one(), T::one())))
}

impl<T: Float> VjpOp<T> for AssemblyVjp<T> {
    type Cotangent = LinearSystem<T>;
    type Grads = AssemblyGrads<T>;

    fn vjp(&self, output_grad: &LinearSystem<T>) -> anyhow::Result<AssemblyGrads<T>> {
        let rhs = self.rhs.vjp(&output_grad.b)?;
        let constraints = self.constraints.vjp(&rhs.grad_matrix)?;

        let intra_unknown = self.plus_intra_unknown.vjp(&output_grad.a)?;
        let matting = self.plus_matting.vjp(&intra_unknown.grad_b)?;
        let known = self.plus_known.vjp(&matting.grad_b)?;
        let color_mixture = self.plus_ku.vjp(&known.grad_a)?;

        let dku = self
            .ku_diag
            .vjp(&sparse_add(&color_mixture.grad_b, &constraints.grad_a)?)?;
        let dkn = self
            .known_diag
            .vjp(&sparse_add(&known.grad_b, &constraints.grad_b)?)?;

        let ku_weights = dku
            .iter()
            .zip(self.k_to_u_conf.iter())
            .map(|(&g, &c)| g * c)
            .collect();
        let lambda = dkn
            .iter()
            .zip(self.known.iter())
            .fold(T::zero(), |acc, (&g, &k)| acc + g * k);

        Ok(AssemblyGrads {
            color_mixture: color_mixture.grad_a,
            matting: matting.grad_a,
            intra_unknown: intra_unknown.grad_a,
            ku_weights,
            lambda,
        })
    }
}
