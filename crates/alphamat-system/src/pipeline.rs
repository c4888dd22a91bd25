//! End-to-end matting: weights → Laplacians → system → matte
//!
//! [`MattingPipeline::forward`] records every VJP context on a
//! [`MattingTape`]; [`MattingPipeline::backward`] replays it in reverse to
//! turn a matte cotangent into gradients for the four weight vectors and λ.
//!
//! # Example
//!
//! ```rust,ignore
//! use alphamat_system::{MattingConfig, MattingPipeline, PixelWeights};
//!
//! let mut pipeline = MattingPipeline::<f64>::new(MattingConfig::from_env()?)?;
//! let weights = PixelWeights::constant(sample.pixels(), 1.0, 1.0, 0.01, 0.05);
//! let estimate = pipeline.forward(&sample, &weights)?;
//! let matte = estimate.clamped();
//! ```

use alphamat_ad::{CgVjp, VjpOp};
use alphamat_sparse::{SolverInfo, SparseError};
use crate::config::MattingConfig;
use crate::error::{SystemError, SystemResult};
use crate::geometry::{MattingSample, PixelWeights};
use crate::laplacian::{
    color_mixture_laplacian, intra_unknown_laplacian, matting_laplacian, ColorMixtureVjp,
    IntraUnknownVjp, MattingLaplacianVjp,
};
use crate::solver::MattingSolver;
use crate::system::{assemble_system, AssemblyVjp, LinearSystem, SystemInputs};
use log::{debug, info};
use scirs2_core::ndarray_ext::{Array1, ArrayView1};
use scirs2_core::numeric::Float;
use std::time::Instant;

/// Every VJP context recorded by one forward pass
#[derive(Debug, Clone)]
pub struct MattingTape<T> {
    pub color_mixture: ColorMixtureVjp<T>,
    pub matting: MattingLaplacianVjp<T>,
    pub intra_unknown: IntraUnknownVjp<T>,
    pub assembly: AssemblyVjp<T>,
    pub solve: CgVjp<T>,
}

/// Result of a forward pass
#[derive(Debug, Clone)]
pub struct MatteEstimate<T> {
    /// Unclamped solution of the linear system
    pub matte: Array1<T>,
    pub info: SolverInfo,
    pub tape: MattingTape<T>,
}

impl<T: Float> MatteEstimate<T> {
    /// Residual norm of the returned matte
    pub fn residual(&self) -> f64 {
        self.info.residual
    }

    /// Matte clamped to `[0, 1]`
    pub fn clamped(&self) -> Array1<T> {
        self.matte.mapv(|v| v.max(T::zero()).min(T::one()))
    }
}

/// Gradients of a scalar loss with respect to the pipeline inputs
#[derive(Debug, Clone)]
pub struct WeightGradients<T> {
    pub color_mixture: Array1<T>,
    pub matting: Array1<T>,
    pub intra_unknown: Array1<T>,
    pub known_to_unknown: Array1<T>,
    pub lambda: T,
    /// Convergence of the adjoint solve
    pub adjoint_info: SolverInfo,
}

/// Differentiable matting pipeline
#[derive(Debug, Clone)]
pub struct MattingPipeline<T> {
    config: MattingConfig,
    solver: MattingSolver,
    /// Last matte, used as the initial guess when warm starting
    previous: Option<Array1<T>>,
}

impl<T: Float> MattingPipeline<T> {
    /// Create a pipeline with a validated configuration
    pub fn new(config: MattingConfig) -> SystemResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            solver: MattingSolver::from(&config.solver),
            previous: None,
        })
    }

    pub fn config(&self) -> &MattingConfig {
        &self.config
    }

    /// Forget the warm-start iterate
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Build and solve the system for one sample
    ///
    /// # Errors
    ///
    /// Any shape, length or geometry problem in `sample` or `weights`.
    /// Solver non-convergence is reported in [`MatteEstimate::info`].
    pub fn forward(
        &mut self,
        sample: &MattingSample<T>,
        weights: &PixelWeights<T>,
    ) -> SystemResult<MatteEstimate<T>> {
        let start = Instant::now();
        let n = sample.pixels();
        sample.validate()?;
        weights.validate(n)?;

        let lambda = T::from(self.config.lambda).ok_or_else(|| {
            SystemError::config(format!("lambda {} is not representable", self.config.lambda))
        })?;

        let (lcm, color_mixture) =
            color_mixture_laplacian(n, &sample.color_mixture, &weights.color_mixture.view())?;
        let (lmat, matting) = matting_laplacian(n, &sample.matting, &weights.matting.view())?;
        let (lcs, intra_unknown) =
            intra_unknown_laplacian(n, &sample.intra_unknown, &weights.intra_unknown.view())?;

        let (system, assembly) = assemble_system(&SystemInputs {
            color_mixture: &lcm,
            matting: &lmat,
            intra_unknown: &lcs,
            ku_weights: weights.known_to_unknown.view(),
            k_to_u_conf: sample.k_to_u_conf.view(),
            known: sample.known.view(),
            k_to_u: sample.k_to_u.view(),
            lambda,
        })?;
        debug!(
            "prepare system {:.2}s/im: {} pixels, nnz = {}",
            start.elapsed().as_secs_f64(),
            n,
            system.a.nnz()
        );

        let x0 = self
            .previous
            .as_ref()
            .filter(|prev| self.config.warm_start && prev.len() == n)
            .map(|prev| prev.view());
        let (matte, info, solve) = self.solver.solve(&system, x0)?;
        info!("CG residual: {:.1}", info.residual);

        if self.config.warm_start {
            self.previous = Some(matte.clone());
        }

        Ok(MatteEstimate {
            matte,
            info,
            tape: MattingTape {
                color_mixture,
                matting,
                intra_unknown,
                assembly,
                solve,
            },
        })
    }

    /// Gradients of the loss given `dmatte = ∂loss/∂matte`
    ///
    /// `dmatte` is taken with respect to the unclamped matte.
    pub fn backward(
        &self,
        tape: &MattingTape<T>,
        dmatte: &ArrayView1<T>,
    ) -> SystemResult<WeightGradients<T>> {
        tape.backward(dmatte)
    }
}

impl<T: Float> MattingTape<T> {
    /// Replay the recorded contexts in reverse
    pub fn backward(&self, dmatte: &ArrayView1<T>) -> SystemResult<WeightGradients<T>> {
        let n = self.solve.solution.len();
        if dmatte.len() != n {
            return Err(SparseError::LengthMismatch {
                what: "dmatte",
                expected: n,
                got: dmatte.len(),
            }
            .into());
        }

        let solve = self.solve.vjp(&dmatte.to_owned())?;
        debug!("adjoint {}", solve.adjoint_info);

        let system = self.assembly.vjp(&LinearSystem {
            a: solve.grad_matrix,
            b: solve.grad_rhs,
        })?;

        Ok(WeightGradients {
            color_mixture: self.color_mixture.vjp(&system.color_mixture)?,
            matting: self.matting.vjp(&system.matting)?,
            intra_unknown: self.intra_unknown.vjp(&system.intra_unknown)?,
            known_to_unknown: system.ku_weights,
            lambda: system.lambda,
            adjoint_info: solve.adjoint_info,
        })
    }
}
