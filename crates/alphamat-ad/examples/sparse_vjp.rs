//! Sparse VJP Example
//!
//! Builds a tiny graph Laplacian `L = diag(W·1) − W` by hand from VJP
//! contexts, solves `(L + I)·x = b`, and pulls a gradient back to the edge
//! weights. The result is checked against finite differences.

use alphamat_ad::gradcheck::{check_gradient, GradCheckConfig};
use alphamat_ad::vjp::{AddVjp, CgVjp, DiagonalVjp, SpMvVjp, VjpOp};
use alphamat_sparse::{CgConfig, CsrMatrix};
use anyhow::Result;
use scirs2_core::ndarray_ext::{array, Array1};

// Path graph 0 - 1 - 2, both directions stored
const ROWS: [usize; 4] = [0, 1, 1, 2];
const COLS: [usize; 4] = [1, 0, 2, 1];

fn solver_config() -> CgConfig {
    CgConfig::with_max_iter(50).threshold(1e-24)
}

/// Solve `(diag(W·1) − W + I)·x = b`
fn solve(weights: &Array1<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let w = CsrMatrix::from_coordinates(&ROWS, &COLS, &weights.to_vec(), (3, 3))?;
    let identity = CsrMatrix::from_diagonal(&[1.0; 3]);
    let ones = Array1::ones(3);

    let (row_sums, _) = SpMvVjp::forward(&w, &ones.view())?;
    let (degree, _) = DiagonalVjp::forward(&row_sums.view());
    let (laplacian, _) = AddVjp::forward(&degree, &w, 1.0, -1.0)?;
    let (system, _) = AddVjp::forward(&laplacian, &identity, 1.0, 1.0)?;

    let x0 = Array1::zeros(3);
    let (x, _, _) = CgVjp::forward(&system, &b.view(), &x0.view(), &solver_config())?;
    Ok(x)
}

/// Gradient of `⟨dx, x⟩` w.r.t. the stored edge weights
fn weight_gradient(
    weights: &Array1<f64>,
    b: &Array1<f64>,
    dx: &Array1<f64>,
) -> Result<Array1<f64>> {
    let w = CsrMatrix::from_coordinates(&ROWS, &COLS, &weights.to_vec(), (3, 3))?;
    let identity = CsrMatrix::from_diagonal(&[1.0; 3]);
    let ones = Array1::ones(3);

    let (row_sums, sums_ctx) = SpMvVjp::forward(&w, &ones.view())?;
    let (degree, diag_ctx) = DiagonalVjp::forward(&row_sums.view());
    let (laplacian, lap_ctx) = AddVjp::forward(&degree, &w, 1.0, -1.0)?;
    let (system, sys_ctx) = AddVjp::forward(&laplacian, &identity, 1.0, 1.0)?;

    let x0 = Array1::zeros(3);
    let (_, _, solve_ctx) = CgVjp::forward(&system, &b.view(), &x0.view(), &solver_config())?;

    // Backward, in reverse order
    let solve_grads = solve_ctx.vjp(dx)?;
    let sys_grads = sys_ctx.vjp(&solve_grads.grad_matrix)?;
    let lap_grads = lap_ctx.vjp(&sys_grads.grad_a)?;
    let d_row_sums = diag_ctx.vjp(&lap_grads.grad_a)?;
    let sums_grads = sums_ctx.vjp(&d_row_sums)?;

    // W feeds the Laplacian twice: directly and through its row sums
    let total: Vec<f64> = lap_grads
        .grad_b
        .values()
        .iter()
        .zip(sums_grads.grad_matrix.values())
        .map(|(direct, sums)| direct + sums)
        .collect();
    Ok(Array1::from_vec(total))
}

fn main() -> Result<()> {
    println!("=== Sparse VJP Example ===\n");

    let weights = array![0.5, 0.5, 2.0, 2.0];
    let b = array![1.0, 0.0, -1.0];
    let dx = array![1.0, 0.0, 0.0];

    println!("Forward pass");
    println!("------------");
    let x = solve(&weights, &b)?;
    println!("  x = {:?}\n", x.to_vec());

    println!("Backward pass");
    println!("-------------");
    let grad = weight_gradient(&weights, &b, &dx)?;
    println!("  dL/dW = {:?}\n", grad.to_vec());

    println!("Gradient check");
    println!("--------------");
    let result = check_gradient(
        |w: &Array1<f64>| solve(w, &b),
        |w: &Array1<f64>, dx: &Array1<f64>| weight_gradient(w, &b, dx),
        &weights,
        &dx,
        &GradCheckConfig::default(),
    )?;
    println!(
        "  passed: {} (max abs diff {:.2e}, {} elements)",
        result.passed, result.max_abs_diff, result.num_elements
    );

    println!("\n=== Sparse VJP Example Complete ===");
    Ok(())
}
