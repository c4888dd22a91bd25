//! Conjugate Gradient solver for sparse symmetric positive (semi-)definite systems
//!
//! Solves `A·x = b` starting from a caller-supplied initial guess. The solver
//! always returns an iterate: running out of iterations or hitting a
//! degenerate search direction is reported through [`SolverStatus`], not as
//! an error. Only malformed inputs (shape mismatches) produce `Err`.
//!
//! # Examples
//!
//! ```rust
//! use alphamat_sparse::{CsrMatrix, solvers::{cg, CgConfig, SolverStatus}};
//! use scirs2_core::ndarray_ext::{array, Array1};
//!
//! // A = [[2, -1], [-1, 2]]
//! let a = CsrMatrix::from_row_pointers(
//!     vec![0, 2, 4],
//!     vec![0, 1, 0, 1],
//!     vec![2.0_f64, -1.0, -1.0, 2.0],
//!     (2, 2),
//! )
//! .unwrap();
//! let b = array![1.0, 1.0];
//!
//! let (x, info) = cg(&a, &b.view(), &Array1::zeros(2).view(), &CgConfig::default()).unwrap();
//! assert_eq!(info.status, SolverStatus::Converged);
//! assert!((x[0] - 1.0).abs() < 1e-10);
//! ```

use crate::{CsrMatrix, SparseError, SparseResult};
use log::{debug, warn};
use scirs2_core::ndarray_ext::{Array1, ArrayView1};
use scirs2_core::numeric::Float;
use std::fmt;

/// Iteration limits for [`cg`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CgConfig {
    /// Maximum number of CG steps
    pub max_iter: usize,
    /// Stop once `r·r` drops below this value (squared residual norm)
    pub threshold: Option<f64>,
    /// Return the lowest-residual iterate instead of the last one
    pub track_best: bool,
}

impl Default for CgConfig {
    fn default() -> Self {
        Self {
            max_iter: 100,
            threshold: None,
            track_best: false,
        }
    }
}

impl CgConfig {
    /// Fixed number of steps, no early stopping
    pub fn with_max_iter(max_iter: usize) -> Self {
        Self {
            max_iter,
            ..Self::default()
        }
    }

    /// Set the early-stopping threshold on `r·r`
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Enable or disable best-iterate tracking
    pub fn track_best(mut self, track_best: bool) -> Self {
        self.track_best = track_best;
        self
    }
}

/// How a CG run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// Residual reached zero or fell below the threshold
    Converged,
    /// Iteration budget exhausted first
    MaxIterations,
    /// Search direction had zero or non-finite curvature `p·A·p`
    Degenerate,
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolverStatus::Converged => "converged",
            SolverStatus::MaxIterations => "did not converge",
            SolverStatus::Degenerate => "stopped on degenerate direction",
        };
        f.write_str(s)
    }
}

/// Solver convergence information
#[derive(Debug, Clone, PartialEq)]
pub struct SolverInfo {
    /// Number of iterations performed
    pub iterations: usize,
    /// Residual norm ‖b − A·x‖ of the returned iterate
    pub residual: f64,
    /// How the run ended
    pub status: SolverStatus,
    /// Iteration that produced the returned iterate (0 is the initial guess)
    ///
    /// Only set when best-iterate tracking is enabled.
    pub best_iteration: Option<usize>,
}

impl SolverInfo {
    /// Whether the solver converged
    pub fn converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }
}

impl fmt::Display for SolverInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Solver: {} in {} iterations, residual = {:.2e}",
            self.status, self.iterations, self.residual
        )?;
        if let Some(best) = self.best_iteration {
            write!(f, " (best at iteration {})", best)?;
        }
        Ok(())
    }
}

/// Conjugate Gradient solver for SPD systems
///
/// Starts from `x0` with `r = b − A·x0`, `p = r` and runs until `max_iter`
/// steps are done or `r·r < threshold`, whichever comes first. A zero
/// initial residual converges immediately with zero iterations.
///
/// # Complexity
///
/// O(nnz × iterations) time, O(n) additional space
///
/// # Errors
///
/// `ShapeMismatch` if `A` is not square or `b`/`x0` do not have `A.nrows()`
/// elements.
pub fn cg<T: Float>(
    a: &CsrMatrix<T>,
    b: &ArrayView1<T>,
    x0: &ArrayView1<T>,
    config: &CgConfig,
) -> SparseResult<(Array1<T>, SolverInfo)> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(SparseError::ShapeMismatch {
            op: "cg",
            lhs: a.shape(),
            rhs: (a.ncols(), a.nrows()),
        });
    }
    if b.len() != n {
        return Err(SparseError::vector_mismatch("cg", a.shape(), b.len()));
    }
    if x0.len() != n {
        return Err(SparseError::vector_mismatch("cg", a.shape(), x0.len()));
    }

    let below_threshold = |rr: T| match config.threshold {
        Some(t) => rr.to_f64().map_or(false, |v| v < t),
        None => false,
    };

    let mut x = x0.to_owned();

    // r = b - A*x0
    let ax = a.spmv(&x.view())?;
    let mut r = b.to_owned() - &ax;
    let mut p = r.clone();
    let mut rsold = dot(&r, &r);
    let mut rr = rsold;

    let mut best = if config.track_best {
        Some((x.clone(), rr, 0usize))
    } else {
        None
    };

    let mut iterations = 0;
    let mut status = SolverStatus::MaxIterations;

    if rsold == T::zero() || below_threshold(rsold) {
        status = SolverStatus::Converged;
    } else {
        for iter in 0..config.max_iter {
            let ap = a.spmv(&p.view())?;

            let pap = dot(&p, &ap);
            if pap == T::zero() || !pap.is_finite() {
                warn!(
                    "CG: degenerate search direction at iteration {} (p·Ap = {:?})",
                    iter,
                    pap.to_f64()
                );
                status = SolverStatus::Degenerate;
                break;
            }
            let alpha = rsold / pap;

            // x = x + alpha * p
            axpy(alpha, &p, &mut x);

            // r = r - alpha * Ap
            axpy(-alpha, &ap, &mut r);

            rr = dot(&r, &r);
            iterations = iter + 1;

            if let Some((best_x, best_rr, best_iter)) = best.as_mut() {
                if rr < *best_rr {
                    best_x.assign(&x);
                    *best_rr = rr;
                    *best_iter = iterations;
                }
            }

            if rr == T::zero() || below_threshold(rr) {
                status = SolverStatus::Converged;
                break;
            }

            // p = r + beta * p
            let beta = rr / rsold;
            for (pi, &ri) in p.iter_mut().zip(r.iter()) {
                *pi = ri + beta * *pi;
            }

            rsold = rr;
        }
    }

    let (x, rr, best_iteration) = match best {
        Some((best_x, best_rr, best_iter)) => (best_x, best_rr, Some(best_iter)),
        None => (x, rr, None),
    };

    let info = SolverInfo {
        iterations,
        residual: rr.to_f64().unwrap_or(f64::INFINITY).sqrt(),
        status,
        best_iteration,
    };
    debug!("{}", info);

    Ok((x, info))
}

/// Dot product of two vectors
#[inline]
fn dot<T: Float>(x: &Array1<T>, y: &Array1<T>) -> T {
    x.iter()
        .zip(y.iter())
        .fold(T::zero(), |acc, (&xi, &yi)| acc + xi * yi)
}

/// AXPY: y = alpha * x + y
#[inline]
fn axpy<T: Float>(alpha: T, x: &Array1<T>, y: &mut Array1<T>) {
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi = *yi + alpha * xi;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scirs2_core::ndarray_ext::array;

    fn laplacian_1d(n: usize) -> CsrMatrix<f64> {
        let mut rows = Vec::new();
        let mut cols = Vec::new();
        let mut vals = Vec::new();
        for i in 0..n {
            rows.push(i);
            cols.push(i);
            vals.push(2.0);
            if i > 0 {
                rows.push(i);
                cols.push(i - 1);
                vals.push(-1.0);
            }
            if i + 1 < n {
                rows.push(i);
                cols.push(i + 1);
                vals.push(-1.0);
            }
        }
        CsrMatrix::from_coordinates(&rows, &cols, &vals, (n, n)).unwrap()
    }

    fn residual_norm(a: &CsrMatrix<f64>, x: &Array1<f64>, b: &Array1<f64>) -> f64 {
        let r = b - &a.spmv(&x.view()).unwrap();
        r.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    #[test]
    fn test_cg_simple() {
        let a = laplacian_1d(2);
        let b = array![1.0, 1.0];
        let x0 = Array1::zeros(2);

        let (x, info) = cg(&a, &b.view(), &x0.view(), &CgConfig::default()).unwrap();
        assert!(info.converged());
        assert!((x[0] - 1.0).abs() < 1e-10);
        assert!((x[1] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_cg_larger_system() {
        let n = 20;
        let a = laplacian_1d(n);
        let b = Array1::from_elem(n, 1.0);
        let x0 = Array1::zeros(n);

        let config = CgConfig::with_max_iter(200).threshold(1e-16);
        let (x, info) = cg(&a, &b.view(), &x0.view(), &config).unwrap();

        assert!(info.converged());
        assert!(info.iterations <= 2 * n);
        assert!(residual_norm(&a, &x, &b) < 1e-6);
    }

    #[test]
    fn test_zero_rhs_converges_immediately() {
        let a = laplacian_1d(4);
        let b = Array1::zeros(4);
        let (x, info) = cg(&a, &b.view(), &b.view(), &CgConfig::default()).unwrap();

        assert_eq!(info.iterations, 0);
        assert_eq!(info.status, SolverStatus::Converged);
        assert_eq!(info.residual, 0.0);
        assert_eq!(x, Array1::<f64>::zeros(4));
    }

    #[test]
    fn test_warm_start_at_solution() {
        let a = CsrMatrix::from_diagonal(&[2.0, 4.0]);
        let b = array![2.0, 8.0];
        let x0 = array![1.0, 2.0];

        let (x, info) = cg(&a, &b.view(), &x0.view(), &CgConfig::default()).unwrap();
        assert_eq!(info.iterations, 0);
        assert_eq!(x, x0);
    }

    #[test]
    fn test_max_iterations_status() {
        let n = 10;
        let a = laplacian_1d(n);
        let b = Array1::from_elem(n, 1.0);
        let x0 = Array1::zeros(n);

        let (_, info) = cg(&a, &b.view(), &x0.view(), &CgConfig::with_max_iter(2)).unwrap();
        assert_eq!(info.iterations, 2);
        assert_eq!(info.status, SolverStatus::MaxIterations);
        assert!(info.residual > 0.0);
    }

    #[test]
    fn test_zero_iterations_returns_initial_guess() {
        let a = laplacian_1d(3);
        let b = array![1.0, 0.0, 1.0];
        let x0 = array![0.5, 0.5, 0.5];

        let (x, info) = cg(&a, &b.view(), &x0.view(), &CgConfig::with_max_iter(0)).unwrap();
        assert_eq!(x, x0);
        assert_eq!(info.iterations, 0);
        assert_eq!(info.status, SolverStatus::MaxIterations);
    }

    #[test]
    fn test_threshold_stops_early() {
        let n = 30;
        let a = laplacian_1d(n);
        let b = Array1::from_elem(n, 1.0);
        let x0 = Array1::zeros(n);

        let loose_config = CgConfig::with_max_iter(100).threshold(1e3);
        let tight_config = CgConfig::with_max_iter(100).threshold(1e-20);
        let (_, loose) = cg(&a, &b.view(), &x0.view(), &loose_config).unwrap();
        let (_, tight) = cg(&a, &b.view(), &x0.view(), &tight_config).unwrap();

        assert!(loose.converged());
        assert!(loose.iterations < tight.iterations);
    }

    #[test]
    fn test_degenerate_direction() {
        // A = 0 with non-zero b: the first direction has zero curvature
        let a = CsrMatrix::from_diagonal(&[0.0, 0.0]);
        let b = array![1.0, 1.0];
        let x0 = Array1::zeros(2);

        let (x, info) = cg(&a, &b.view(), &x0.view(), &CgConfig::default()).unwrap();
        assert_eq!(info.status, SolverStatus::Degenerate);
        assert_eq!(info.iterations, 0);
        assert!(x.iter().all(|v| v.is_finite()));
        assert_eq!(x, x0);
    }

    #[test]
    fn test_degenerate_empty_matrix() {
        // no stored entries at all
        let a = CsrMatrix::<f64>::zeros((3, 3));
        let b = array![1.0, -2.0, 0.5];
        let x0 = Array1::zeros(3);

        let (x, info) = cg(&a, &b.view(), &x0.view(), &CgConfig::default()).unwrap();
        assert_eq!(info.status, SolverStatus::Degenerate);
        assert_eq!(info.iterations, 0);
        assert_eq!(x, Array1::<f64>::zeros(3));
    }

    #[test]
    fn test_cg_diagonal_4x4() {
        // n distinct eigenvalues: at most n steps in exact arithmetic
        let a = CsrMatrix::from_diagonal(&[1.0, 2.0, 3.0, 4.0]);
        let b = array![1.0, 4.0, 9.0, 16.0];
        let x0 = Array1::zeros(4);

        let (x, info) = cg(&a, &b.view(), &x0.view(), &CgConfig::with_max_iter(4)).unwrap();
        assert!(info.iterations <= 4);
        for (xi, expected) in x.iter().zip([1.0, 2.0, 3.0, 4.0]) {
            assert!((xi - expected).abs() < 1e-4);
        }
        assert!(residual_norm(&a, &x, &b) < 1e-4);
    }

    #[test]
    fn test_track_best_never_worse() {
        let n = 12;
        let a = laplacian_1d(n);
        let b = Array1::from_shape_fn(n, |i| if i % 3 == 0 { 1.0 } else { -0.5 });
        let x0 = Array1::zeros(n);

        for steps in 1..6 {
            let plain = CgConfig::with_max_iter(steps);
            let (x_last, last) = cg(&a, &b.view(), &x0.view(), &plain).unwrap();
            let (x_best, best) = cg(&a, &b.view(), &x0.view(), &plain.track_best(true)).unwrap();

            assert!(best.residual <= last.residual + 1e-12);
            assert!(best.best_iteration.unwrap() <= steps);
            assert!((residual_norm(&a, &x_best, &b) - best.residual).abs() < 1e-9);
            assert!((residual_norm(&a, &x_last, &b) - last.residual).abs() < 1e-9);
        }
    }

    #[test]
    fn test_track_best_keeps_initial_guess() {
        // Degenerate on the first step: the only candidate is x0
        let a = CsrMatrix::from_diagonal(&[0.0]);
        let b = array![1.0];
        let x0 = array![3.0];

        let config = CgConfig::default().track_best(true);
        let (x, info) = cg(&a, &b.view(), &x0.view(), &config).unwrap();
        assert_eq!(x, x0);
        assert_eq!(info.best_iteration, Some(0));
        assert_eq!(info.residual, 1.0);
    }

    #[test]
    fn test_shape_errors() {
        let a = laplacian_1d(3);
        let good = Array1::zeros(3);
        let bad = Array1::zeros(2);

        assert!(cg(&a, &bad.view(), &good.view(), &CgConfig::default()).is_err());
        assert!(cg(&a, &good.view(), &bad.view(), &CgConfig::default()).is_err());

        let rect = CsrMatrix::<f64>::zeros((3, 2));
        assert!(matches!(
            cg(&rect, &good.view(), &good.view(), &CgConfig::default()),
            Err(SparseError::ShapeMismatch { op: "cg", .. })
        ));
    }

    #[test]
    fn test_solver_info_display() {
        let info = SolverInfo {
            iterations: 3,
            residual: 1.5e-3,
            status: SolverStatus::MaxIterations,
            best_iteration: Some(2),
        };
        assert_eq!(
            info.to_string(),
            "Solver: did not converge in 3 iterations, residual = 1.50e-3 (best at iteration 2)"
        );
    }
}
