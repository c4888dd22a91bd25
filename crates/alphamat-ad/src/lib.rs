//! # alphamat-ad
//!
//! Reverse-mode differentiation support for alphamat's sparse operations.
//!
//! This crate provides:
//! - Custom VJP (Vector-Jacobian Product) rules for sparse addition, scaling,
//!   matrix-vector and sparse-sparse products, transposition, diagonal and
//!   coordinate construction
//! - An implicit adjoint for the conjugate-gradient solve
//! - Finite-difference gradient checking

#![warn(unused, rust_2018_idioms)]

pub mod gradcheck;
pub mod vjp;

// Re-exports
pub use vjp::*;
