//! Conjugate-gradient solve of the assembled system

use alphamat_ad::CgVjp;
use alphamat_sparse::{cg, CgConfig, SolverInfo};
use crate::config::SolverConfig;
use crate::error::SystemResult;
use crate::system::LinearSystem;
use log::debug;
use scirs2_core::ndarray_ext::{Array1, ArrayView1};
use scirs2_core::numeric::Float;
use std::time::Instant;

/// Solves `A·x = b` with a fixed CG budget
///
/// Non-convergence is not an error: the returned [`SolverInfo`] says how
/// the run ended and callers decide what to do with it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MattingSolver {
    pub config: CgConfig,
}

impl MattingSolver {
    pub fn new(config: CgConfig) -> Self {
        Self { config }
    }

    /// Solve from `x0`, or from zeros when no initial guess is given
    ///
    /// Returns the solution, the solver diagnostics and the context for the
    /// adjoint solve.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if `A` is not square or `b`/`x0` do not match it.
    pub fn solve<T: Float>(
        &self,
        system: &LinearSystem<T>,
        x0: Option<ArrayView1<'_, T>>,
    ) -> SystemResult<(Array1<T>, SolverInfo, CgVjp<T>)> {
        let start = Instant::now();

        let x0 = match x0 {
            Some(x0) => x0.to_owned(),
            None => Array1::zeros(system.size()),
        };
        let (x, info) = cg(&system.a, &system.b.view(), &x0.view(), &self.config)?;

        debug!(
            "solve system {:.2}s: {}",
            start.elapsed().as_secs_f64(),
            info
        );

        let ctx = CgVjp {
            matrix: system.a.clone(),
            solution: x.clone(),
            config: self.config,
        };
        Ok((x, info, ctx))
    }
}

impl From<&SolverConfig> for MattingSolver {
    fn from(config: &SolverConfig) -> Self {
        Self::new(config.cg_config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alphamat_ad::VjpOp;
    use alphamat_sparse::{CsrMatrix, SolverStatus};
    use scirs2_core::ndarray_ext::array;

    fn system() -> LinearSystem<f64> {
        // [[4, 1], [1, 3]]
        let a = CsrMatrix::from_coordinates(
            &[0, 0, 1, 1],
            &[0, 1, 0, 1],
            &[4.0, 1.0, 1.0, 3.0],
            (2, 2),
        )
        .unwrap();
        LinearSystem {
            a,
            b: array![1.0, 2.0],
        }
    }

    #[test]
    fn test_solve_from_zeros() {
        let solver = MattingSolver::new(CgConfig::default().threshold(1e-24));
        let (x, info, _) = solver.solve(&system(), None).unwrap();

        assert_eq!(info.status, SolverStatus::Converged);
        assert!((x[0] - 1.0 / 11.0).abs() < 1e-10);
        assert!((x[1] - 7.0 / 11.0).abs() < 1e-10);
    }

    #[test]
    fn test_solve_from_exact_guess() {
        let solver = MattingSolver::new(CgConfig::default().threshold(1e-24));
        let guess = array![1.0 / 11.0, 7.0 / 11.0];
        let (_, info, _) = solver.solve(&system(), Some(guess.view())).unwrap();
        assert!(info.iterations <= 1);
        assert!(info.residual < 1e-12);
    }

    #[test]
    fn test_solve_budget_is_a_status() {
        let solver = MattingSolver::from(&SolverConfig {
            cg_steps: 1,
            threshold: Some(1e-30),
            track_best: false,
        });
        let (_, info, _) = solver.solve(&system(), None).unwrap();
        assert_eq!(info.status, SolverStatus::MaxIterations);
        assert_eq!(info.iterations, 1);
    }

    #[test]
    fn test_solve_bad_guess() {
        let guess = array![0.0, 0.0, 0.0];
        let solver = MattingSolver::default();
        assert!(solver.solve(&system(), Some(guess.view())).is_err());
    }

    #[test]
    fn test_solve_context_is_differentiable() {
        let solver = MattingSolver::new(CgConfig::default().threshold(1e-24));
        let (_, _, ctx) = solver.solve(&system(), None).unwrap();

        // A is symmetric, so db = A⁻¹·dx
        let grads = ctx.vjp(&array![1.0, 0.0]).unwrap();
        assert!((grads.grad_rhs[0] - 3.0 / 11.0).abs() < 1e-10);
        assert!((grads.grad_rhs[1] + 1.0 / 11.0).abs() < 1e-10);
    }
}
