//! Error types for Laplacian construction, system assembly and the pipeline

use alphamat_sparse::SparseError;
use thiserror::Error;

/// Errors raised by the matting system
#[derive(Error, Debug)]
pub enum SystemError {
    /// Structural error from the sparse layer
    #[error(transparent)]
    Sparse(#[from] SparseError),

    /// Malformed neighbor or flow arrays in the sample geometry
    #[error("Invalid geometry: {reason}")]
    Geometry { reason: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// Failure inside an adjoint rule
    #[error("Differentiation failed: {0}")]
    Autodiff(#[from] anyhow::Error),
}

/// Result type alias for matting system operations
pub type SystemResult<T> = Result<T, SystemError>;

impl SystemError {
    /// Create a geometry error with a message
    pub fn geometry(reason: impl Into<String>) -> Self {
        SystemError::Geometry {
            reason: reason.into(),
        }
    }

    /// Create a configuration error with a message
    pub fn config(reason: impl Into<String>) -> Self {
        SystemError::Config {
            reason: reason.into(),
        }
    }
}
