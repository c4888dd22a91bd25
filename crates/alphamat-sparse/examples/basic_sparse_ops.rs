//! Basic Sparse Matrix Operations Example
//!
//! This example demonstrates fundamental sparse matrix operations including:
//! - Building CSR matrices from coordinate triplets (duplicates summed)
//! - Sparse matrix-vector multiplication (SpMV)
//! - Sparse-sparse matrix multiplication (SpSpMM)
//! - Graph Laplacian assembly from an adjacency matrix
//!
//! Run with: cargo run --example basic_sparse_ops

use alphamat_sparse::{sparse_add_scaled, CooMatrix, CsrMatrix};
use scirs2_core::ndarray_ext::array;

fn main() -> anyhow::Result<()> {
    println!("=== alphamat-sparse: Basic Operations Example ===\n");

    // 1. Build an adjacency matrix from triplets; (0,1) is emitted twice
    println!("1. Creating a 4x4 adjacency matrix from triplets...");
    let mut coo = CooMatrix::zeros((4, 4));
    for &(i, j, w) in &[
        (0, 1, 0.5),
        (1, 0, 1.0),
        (0, 1, 0.5),
        (1, 2, 2.0),
        (2, 1, 2.0),
        (2, 3, 1.0),
        (3, 2, 1.0),
    ] {
        coo.push(i, j, w)?;
    }
    let w = coo.to_csr();
    println!(
        "   {} triplets -> {} stored entries, density: {:.1}%\n",
        coo.nnz(),
        w.nnz(),
        w.density() * 100.0
    );

    // 2. Sparse Matrix-Vector Multiplication
    println!("2. Performing SpMV (y = W * x)...");
    let x = array![1.0, 2.0, 3.0, 4.0];
    let y = w.spmv(&x.view())?;
    println!("   Input vector:  {:?}", x);
    println!("   Output vector: {:?}\n", y);

    // 3. Graph Laplacian L = diag(W·1) - W
    println!("3. Building the graph Laplacian...");
    let degree = w.row_sums();
    let d = CsrMatrix::from_diagonal(degree.as_slice().unwrap_or(&[]));
    let l = sparse_add_scaled(&d, &w, 1.0, -1.0)?;
    println!("   Laplacian:\n{:?}", l.to_dense());
    println!("   Row sums: {:?}\n", l.row_sums());

    // 4. Normal form LᵀL via SpSpMM
    println!("4. Performing SpSpMM (LᵀL)...");
    let ltl = l.transpose().spspmm(&l)?;
    println!(
        "   Result: {}x{}, {} stored entries",
        ltl.nrows(),
        ltl.ncols(),
        ltl.nnz()
    );

    Ok(())
}
