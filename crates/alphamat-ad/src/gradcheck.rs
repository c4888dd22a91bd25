//! Finite-difference checks for VJP rules
//!
//! A VJP maps an output cotangent `dy` back to `dx`. Its correctness can be
//! tested without forming the Jacobian: for every input coordinate `i`,
//!
//! ```text
//! dx[i] ≈ ⟨dy, f(x + h·eᵢ) − f(x − h·eᵢ)⟩ / 2h      (central)
//! dx[i] ≈ ⟨dy, f(x + h·eᵢ) − f(x)⟩ / h             (forward)
//! ```
//!
//! Sparse matrices are checked through their value arrays: the sparsity
//! pattern is fixed, so `f` maps the stored values of the inputs to the stored
//! values of the output.
//!
//! # Example
//!
//! ```rust
//! use alphamat_ad::gradcheck::{check_gradient, GradCheckConfig};
//! use scirs2_core::ndarray_ext::{array, Array1};
//!
//! // f(x) = x², df/dx = 2x
//! let f = |x: &Array1<f64>| Ok(x.mapv(|v| v * v));
//! let df = |x: &Array1<f64>, grad_y: &Array1<f64>| Ok(x * grad_y * 2.0);
//!
//! let x = array![1.0, -2.0, 0.5];
//! let grad_y = array![1.0, 1.0, 1.0];
//! let result = check_gradient(f, df, &x, &grad_y, &GradCheckConfig::default()).unwrap();
//! assert!(result.passed);
//! ```

use anyhow::{anyhow, bail, Result};
use log::{debug, warn};
use scirs2_core::ndarray_ext::Array1;
use scirs2_core::numeric::Float;

/// Gradient checking configuration
#[derive(Debug, Clone)]
pub struct GradCheckConfig {
    /// Perturbation size `h` (default: 1e-5)
    pub epsilon: f64,

    /// Relative tolerance (default: 1e-3)
    pub rtol: f64,

    /// Absolute tolerance (default: 1e-5)
    pub atol: f64,

    /// Central instead of forward differences
    pub use_central_diff: bool,

    /// Log every mismatching coordinate
    pub verbose: bool,
}

impl Default for GradCheckConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-5,
            rtol: 1e-3,
            atol: 1e-5,
            use_central_diff: true,
            verbose: false,
        }
    }
}

/// Outcome of a gradient check
#[derive(Debug)]
pub struct GradCheckResult {
    /// Largest `|analytical − numerical|`
    pub max_abs_diff: f64,

    /// Largest difference relative to the numerical value
    pub max_rel_diff: f64,

    /// No coordinate exceeded both tolerances
    pub passed: bool,

    /// Number of input coordinates checked
    pub num_elements: usize,

    /// Coordinates that exceeded both tolerances
    pub num_failures: usize,

    /// Coordinate with the largest absolute difference
    pub worst_index: Option<usize>,
}

/// Compare the VJP `df(x, grad_y)` against finite differences of `f` at `x`
///
/// A coordinate fails only when it exceeds both `atol` and `rtol`.
pub fn check_gradient<T, F, G>(
    f: F,
    df: G,
    x: &Array1<T>,
    grad_y: &Array1<T>,
    config: &GradCheckConfig,
) -> Result<GradCheckResult>
where
    T: Float + std::fmt::Display,
    F: Fn(&Array1<T>) -> Result<Array1<T>>,
    G: Fn(&Array1<T>, &Array1<T>) -> Result<Array1<T>>,
{
    let analytical = df(x, grad_y)?;
    if analytical.len() != x.len() {
        bail!(
            "VJP returned {} elements for an input of {}",
            analytical.len(),
            x.len()
        );
    }

    let numerical = numerical_vjp(&f, x, grad_y, config)?;
    let result = compare(&analytical, &numerical, config)?;

    debug!(
        "gradcheck over {} elements: {} failures, max abs diff {:.2e}",
        result.num_elements, result.num_failures, result.max_abs_diff
    );
    Ok(result)
}

fn to_t<T: Float>(value: f64, name: &str) -> Result<T> {
    T::from(value).ok_or_else(|| anyhow!("{} = {} is not representable", name, value))
}

/// `⟨grad_y, J·eᵢ⟩` for every coordinate `i`, by finite differences
fn numerical_vjp<T, F>(
    f: &F,
    x: &Array1<T>,
    grad_y: &Array1<T>,
    config: &GradCheckConfig,
) -> Result<Array1<T>>
where
    T: Float,
    F: Fn(&Array1<T>) -> Result<Array1<T>>,
{
    let h: T = to_t(config.epsilon, "epsilon")?;
    let base = if config.use_central_diff {
        None
    } else {
        Some(f(x)?)
    };

    let mut probe = x.clone();
    let mut out = Array1::zeros(x.len());
    for i in 0..x.len() {
        let xi = x[i];

        probe[i] = xi + h;
        let hi = f(&probe)?;

        out[i] = match &base {
            Some(lo) => directional(grad_y, &hi, lo)? / h,
            None => {
                probe[i] = xi - h;
                let lo = f(&probe)?;
                directional(grad_y, &hi, &lo)? / (h + h)
            }
        };
        probe[i] = xi;
    }

    Ok(out)
}

/// `⟨grad_y, hi − lo⟩`
fn directional<T: Float>(grad_y: &Array1<T>, hi: &Array1<T>, lo: &Array1<T>) -> Result<T> {
    if hi.len() != grad_y.len() || lo.len() != grad_y.len() {
        bail!(
            "function returned {} elements, cotangent has {}",
            hi.len(),
            grad_y.len()
        );
    }

    Ok(grad_y
        .iter()
        .zip(hi.iter().zip(lo.iter()))
        .fold(T::zero(), |acc, (&g, (&a, &b))| acc + g * (a - b)))
}

fn compare<T>(
    analytical: &Array1<T>,
    numerical: &Array1<T>,
    config: &GradCheckConfig,
) -> Result<GradCheckResult>
where
    T: Float + std::fmt::Display,
{
    let rtol: T = to_t(config.rtol, "rtol")?;
    let atol: T = to_t(config.atol, "atol")?;

    let mut result = GradCheckResult {
        max_abs_diff: 0.0,
        max_rel_diff: 0.0,
        passed: true,
        num_elements: analytical.len(),
        num_failures: 0,
        worst_index: None,
    };

    for (i, (&a, &n)) in analytical.iter().zip(numerical.iter()).enumerate() {
        let abs = (a - n).abs();
        let rel = if n.abs() > T::epsilon() {
            abs / n.abs()
        } else {
            abs
        };

        let abs64 = abs.to_f64().unwrap_or(f64::INFINITY);
        if result.worst_index.is_none() || abs64 > result.max_abs_diff {
            result.worst_index = Some(i);
        }
        result.max_abs_diff = result.max_abs_diff.max(abs64);
        result.max_rel_diff = result
            .max_rel_diff
            .max(rel.to_f64().unwrap_or(f64::INFINITY));

        if abs > atol && rel > rtol {
            result.num_failures += 1;
            if config.verbose {
                warn!(
                    "gradient mismatch at {}: analytical {}, numerical {} (abs {}, rel {})",
                    i, a, n, abs, rel
                );
            }
        }
    }

    result.passed = result.num_failures == 0;
    Ok(result)
}
