//! Conjugate Gradient solver examples
//!
//! This example demonstrates:
//! - A plain CG solve with a fixed step budget
//! - Early stopping on a squared-residual threshold
//! - Warm starting from a previous solution
//! - Best-iterate tracking

use alphamat_sparse::{cg, CgConfig, CooMatrix, CsrMatrix};
use scirs2_core::ndarray_ext::Array1;

fn main() -> anyhow::Result<()> {
    println!("=== Conjugate Gradient Examples ===\n");

    let a = poisson_1d(50)?;
    let b = Array1::from_elem(50, 1.0);
    let zeros = Array1::zeros(50);

    println!("1. Fixed budget of 10 steps");
    let (_, info) = cg(&a, &b.view(), &zeros.view(), &CgConfig::with_max_iter(10))?;
    println!("   {}\n", info);

    println!("2. Early stopping at r·r < 1e-12");
    let config = CgConfig::with_max_iter(500).threshold(1e-12);
    let (x, info) = cg(&a, &b.view(), &zeros.view(), &config)?;
    println!("   {}\n", info);

    println!("3. Warm start from the converged solution");
    let (_, info) = cg(&a, &b.view(), &x.view(), &config)?;
    println!("   {}\n", info);

    println!("4. Best-iterate tracking");
    let config = CgConfig::with_max_iter(15).track_best(true);
    let (_, info) = cg(&a, &b.view(), &zeros.view(), &config)?;
    println!("   {}", info);

    Ok(())
}

/// Tridiagonal [-1, 2, -1] system
fn poisson_1d(n: usize) -> anyhow::Result<CsrMatrix<f64>> {
    let mut coo = CooMatrix::zeros((n, n));
    for i in 0..n {
        coo.push(i, i, 2.0)?;
        if i > 0 {
            coo.push(i, i - 1, -1.0)?;
        }
        if i + 1 < n {
            coo.push(i, i + 1, -1.0)?;
        }
    }
    Ok(coo.to_csr())
}
