//! # alphamat - Differentiable Sparse Matting
//!
//! Per-pixel opacity estimation by solving a sparse linear system assembled
//! from three weighted graph Laplacians and two diagonal constraints, with a
//! backward pass from the matte to every weight vector.
//!
//! This is the **meta crate** that re-exports all alphamat components.
//!
//! ## Quick Start
//!
//! ```
//! use alphamat::prelude::*;
//! use scirs2_core::ndarray_ext::array;
//!
//! // A = [[2, -1], [-1, 2]]
//! let a = CsrMatrix::from_coordinates(
//!     &[0, 0, 1, 1],
//!     &[0, 1, 0, 1],
//!     &[2.0_f64, -1.0, -1.0, 2.0],
//!     (2, 2),
//! )?;
//! let system = LinearSystem { a, b: array![1.0, 1.0] };
//!
//! let solver = MattingSolver::new(CgConfig::default());
//! let (x, info, _) = solver.solve(&system, None)?;
//! assert!(info.converged());
//! assert!((x[0] - 1.0).abs() < 1e-10);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Components
//!
//! ### Sparse Matrices ([`sparse`])
//!
//! COO triplets, canonical CSR, SpMV, SpSpMM, transpose, scaled addition and
//! a conjugate-gradient solver with best-iterate tracking.
//!
//! ### Adjoint Rules ([`ad`])
//!
//! Explicit forward/backward pairs for every sparse operation and for the
//! linear solve, plus finite-difference gradient checking.
//!
//! ### Matting System ([`system`])
//!
//! Sample geometry, the color-mixture, matting and intra-unknown Laplacians,
//! system assembly and the end-to-end [`MattingPipeline`](system::MattingPipeline).
//!
//! ## Features
//!
//! - `serde`: Serialize/deserialize the configuration types
//! - `full`: Enable all features
//!
//! ## Configuration
//!
//! [`MattingConfig::from_env`](system::MattingConfig::from_env) reads
//! `ALPHAMAT_CG_STEPS`, `ALPHAMAT_CG_THRESHOLD`, `ALPHAMAT_CG_TRACK_BEST` and
//! `ALPHAMAT_LAMBDA`.

#![warn(unused, rust_2018_idioms)]

// Re-export all components
pub use alphamat_ad as ad;
pub use alphamat_sparse as sparse;
pub use alphamat_system as system;

pub mod prelude {
    //! Prelude module for convenient imports

    // Sparse types and solver
    pub use crate::sparse::{
        cg, sparse_add, sparse_add_scaled, CgConfig, CooMatrix, CsrMatrix, SolverInfo,
        SolverStatus, SparseError,
    };

    // Adjoint rules
    pub use crate::ad::VjpOp;

    // Matting system
    pub use crate::system::{
        assemble_system, color_mixture_laplacian, intra_unknown_laplacian, matting_laplacian,
        LinearSystem, MatteEstimate, MattingConfig, MattingPipeline, MattingSample,
        MattingSolver, PixelWeights, SolverConfig, SystemError, SystemInputs, WeightGradients,
    };
}
