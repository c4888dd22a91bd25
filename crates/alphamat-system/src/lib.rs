//! # alphamat-system
//!
//! The matting linear system and its solve.
//!
//! This crate provides:
//! - Sample geometry and per-pixel weight containers
//! - Color-mixture, matting and intra-unknown graph Laplacians
//! - Assembly of `A·x = b` from the Laplacians and the diagonal constraints
//! - A CG-based solver wrapper with timing and residual logging
//! - An end-to-end pipeline with a backward pass to the weight vectors
//! - Configuration with environment overrides

#![warn(unused, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod geometry;
pub mod laplacian;
pub mod pipeline;
pub mod solver;
pub mod system;

// Re-exports
pub use config::{MattingConfig, SolverConfig};
pub use error::*;
pub use geometry::*;
pub use laplacian::{
    color_mixture_laplacian, graph_laplacian, intra_unknown_laplacian, matting_laplacian,
    ColorMixtureVjp, GraphLaplacianVjp, IntraUnknownVjp, MattingLaplacianVjp, WeightedTripletVjp,
};
pub use pipeline::{MatteEstimate, MattingPipeline, MattingTape, WeightGradients};
pub use solver::MattingSolver;
pub use system::{assemble_system, AssemblyGrads, AssemblyVjp, LinearSystem, SystemInputs};
