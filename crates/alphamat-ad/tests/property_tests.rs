//! Property-based tests for VJP correctness
//!
//! Uses proptest to verify the adjoint identities that every linear
//! operation must satisfy, across random sparse inputs.

use alphamat_ad::vjp::{AddVjp, SpMvVjp, SpSpMmVjp, TransposeVjp, VjpOp};
use alphamat_sparse::CsrMatrix;
use proptest::prelude::*;
use scirs2_core::ndarray_ext::Array1;

type Triplets = (Vec<(usize, usize)>, Vec<f64>);

fn triplets(nrows: usize, ncols: usize, max_nnz: usize) -> impl Strategy<Value = Triplets> {
    prop::collection::vec((0..nrows, 0..ncols), 0..=max_nnz).prop_flat_map(|indices| {
        let len = indices.len();
        (Just(indices), prop::collection::vec(-5.0..5.0f64, len..=len))
    })
}

fn build((indices, values): &Triplets, shape: (usize, usize)) -> CsrMatrix<f64> {
    let rows: Vec<usize> = indices.iter().map(|&(i, _)| i).collect();
    let cols: Vec<usize> = indices.iter().map(|&(_, j)| j).collect();
    CsrMatrix::from_coordinates(&rows, &cols, values, shape).unwrap()
}

fn stored_dot(a: &CsrMatrix<f64>, b: &CsrMatrix<f64>) -> f64 {
    a.values().iter().zip(b.values()).map(|(x, y)| x * y).sum()
}

fn dense_dot(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

proptest! {
    /// ⟨dy, A·x⟩ = ⟨dx, x⟩ = ⟨dA, A⟩ because y is linear in each input
    #[test]
    fn prop_spmv_adjoint_identity(
        t in triplets(5, 4, 15),
        x in prop::collection::vec(-3.0..3.0f64, 4..=4),
        dy in prop::collection::vec(-3.0..3.0f64, 5..=5)
    ) {
        let a = build(&t, (5, 4));
        let x = Array1::from_vec(x);
        let dy = Array1::from_vec(dy);

        let (y, ctx) = SpMvVjp::forward(&a, &x.view()).unwrap();
        let grads = ctx.vjp(&dy).unwrap();

        let lhs = dense_dot(&dy, &y);
        prop_assert!((lhs - dense_dot(&grads.grad_vector, &x)).abs() < 1e-8);
        prop_assert!((lhs - stored_dot(&grads.grad_matrix, &a)).abs() < 1e-8);
    }

    /// ⟨dC, A·B⟩ = ⟨dA, A⟩ = ⟨dB, B⟩ on stored entries
    #[test]
    fn prop_spspmm_adjoint_identity(
        ta in triplets(4, 5, 10),
        tb in triplets(5, 3, 10),
        seed in 0u64..1000
    ) {
        let a = build(&ta, (4, 5));
        let b = build(&tb, (5, 3));
        let (c, ctx) = SpSpMmVjp::forward(&a, &b).unwrap();

        let mut state = seed;
        let dc_vals: Vec<f64> = (0..c.nnz())
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) % 1000) as f64 / 500.0 - 1.0
            })
            .collect();
        let dc = c.with_values(dc_vals).unwrap();

        let grads = ctx.vjp(&dc).unwrap();
        let lhs = stored_dot(&dc, &c);
        prop_assert!((lhs - stored_dot(&grads.grad_a, &a)).abs() < 1e-7);
        prop_assert!((lhs - stored_dot(&grads.grad_b, &b)).abs() < 1e-7);
    }

    /// VJPs are linear in the cotangent
    #[test]
    fn prop_add_vjp_linear_in_cotangent(
        ta in triplets(4, 4, 10),
        tb in triplets(4, 4, 10),
        s in -2.0..2.0f64,
        t in -2.0..2.0f64
    ) {
        let a = build(&ta, (4, 4));
        let b = build(&tb, (4, 4));
        let (c, ctx) = AddVjp::forward(&a, &b, 0.7, -1.3).unwrap();

        let v1 = c.with_values((0..c.nnz()).map(|k| k as f64).collect()).unwrap();
        let v2 = c.with_values((0..c.nnz()).map(|k| 1.0 - k as f64 * 0.5).collect()).unwrap();
        let combo = c
            .with_values(
                v1.values().iter().zip(v2.values()).map(|(x, y)| s * x + t * y).collect(),
            )
            .unwrap();

        let g1 = ctx.vjp(&v1).unwrap();
        let g2 = ctx.vjp(&v2).unwrap();
        let g = ctx.vjp(&combo).unwrap();

        for k in 0..a.nnz() {
            let expected = s * g1.grad_a.values()[k] + t * g2.grad_a.values()[k];
            prop_assert!((g.grad_a.values()[k] - expected).abs() < 1e-9);
        }
        let expected = s * g1.grad_beta + t * g2.grad_beta;
        prop_assert!((g.grad_beta - expected).abs() < 1e-7);
    }

    /// The transpose VJP is the inverse permutation: transposing twice round-trips gradients
    #[test]
    fn prop_transpose_vjp_roundtrip(t in triplets(5, 6, 20)) {
        let a = build(&t, (5, 6));
        let (at, ctx) = TransposeVjp::forward(&a);

        let dat = at.with_values(at.values().iter().map(|v| v * 2.0).collect()).unwrap();
        let da = ctx.vjp(&dat).unwrap();

        for (g, v) in da.values().iter().zip(a.values()) {
            prop_assert_eq!(*g, v * 2.0);
        }
    }
}
