//! # alphamat-sparse
//!
//! Sparse matrix storage and kernels for alphamat.
//!
//! This crate provides:
//! - COO (Coordinate) triplets with duplicate-summing conversion
//! - CSR (Compressed Sparse Row) matrices
//! - SpMV / SpSpMM / transpose / scaled addition
//! - Pattern restriction for adjoint rules
//! - Conjugate Gradient with warm start and best-iterate tracking

#![warn(unused, rust_2018_idioms)]

pub mod coo;
pub mod csr;
pub mod error;
pub mod ops;
pub mod solvers;

// Re-exports
pub use coo::*;
pub use csr::*;
pub use error::*;
pub use ops::{pattern_dot, restrict_to_pattern, sparse_add, sparse_add_scaled, sparse_scale};
pub use solvers::{cg, CgConfig, SolverInfo, SolverStatus};
