//! Solver and pipeline configuration
//!
//! Defaults match the values the matting system was trained with: 100 CG
//! steps, no early stopping, and a known-pixel weight of 100. Each setting
//! can be overridden from the environment:
//!
//! | variable                 | field                        |
//! |--------------------------|------------------------------|
//! | `ALPHAMAT_CG_STEPS`      | `solver.cg_steps`            |
//! | `ALPHAMAT_CG_THRESHOLD`  | `solver.threshold`           |
//! | `ALPHAMAT_CG_TRACK_BEST` | `solver.track_best`          |
//! | `ALPHAMAT_LAMBDA`        | `lambda`                     |

use alphamat_sparse::CgConfig;
use crate::error::{SystemError, SystemResult};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Environment variable for the CG step budget
pub const ENV_CG_STEPS: &str = "ALPHAMAT_CG_STEPS";
/// Environment variable for the early-stopping threshold on `r·r`
pub const ENV_CG_THRESHOLD: &str = "ALPHAMAT_CG_THRESHOLD";
/// Environment variable enabling best-iterate tracking
pub const ENV_CG_TRACK_BEST: &str = "ALPHAMAT_CG_TRACK_BEST";
/// Environment variable for the known-pixel weight λ
pub const ENV_LAMBDA: &str = "ALPHAMAT_LAMBDA";

/// Conjugate-gradient settings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverConfig {
    /// Iteration budget
    pub cg_steps: usize,
    /// Early-stopping threshold on the squared residual norm
    pub threshold: Option<f64>,
    /// Report the lowest-residual iterate instead of the last one
    pub track_best: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            cg_steps: 100,
            threshold: None,
            track_best: false,
        }
    }
}

impl SolverConfig {
    /// CG settings for the sparse solver
    pub fn cg_config(&self) -> CgConfig {
        CgConfig {
            max_iter: self.cg_steps,
            threshold: self.threshold,
            track_best: self.track_best,
        }
    }
}

impl From<SolverConfig> for CgConfig {
    fn from(config: SolverConfig) -> Self {
        config.cg_config()
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MattingConfig {
    /// Linear solver settings
    pub solver: SolverConfig,
    /// Weight λ of the known-pixel constraint
    pub lambda: f64,
    /// Start each solve from the previous matte instead of zeros
    pub warm_start: bool,
}

impl Default for MattingConfig {
    fn default() -> Self {
        Self {
            solver: SolverConfig::default(),
            lambda: 100.0,
            warm_start: false,
        }
    }
}

impl MattingConfig {
    /// Defaults overridden by any `ALPHAMAT_*` environment variables that are set
    ///
    /// # Errors
    ///
    /// `Config` if a variable is set but cannot be parsed, or the resulting
    /// configuration fails [`validate`](Self::validate).
    pub fn from_env() -> SystemResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> SystemResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(steps) = parse_var(&lookup, ENV_CG_STEPS)? {
            config.solver.cg_steps = steps;
        }
        if let Some(threshold) = parse_var(&lookup, ENV_CG_THRESHOLD)? {
            config.solver.threshold = Some(threshold);
        }
        if let Some(raw) = lookup(ENV_CG_TRACK_BEST) {
            config.solver.track_best = parse_flag(ENV_CG_TRACK_BEST, &raw)?;
        }
        if let Some(lambda) = parse_var(&lookup, ENV_LAMBDA)? {
            config.lambda = lambda;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> SystemResult<()> {
        if self.solver.cg_steps == 0 {
            return Err(SystemError::config("cg_steps must be at least 1"));
        }
        if let Some(threshold) = self.solver.threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(SystemError::config(format!(
                    "threshold must be a non-negative finite number, got {}",
                    threshold
                )));
            }
        }
        if !self.lambda.is_finite() {
            return Err(SystemError::config(format!(
                "lambda must be finite, got {}",
                self.lambda
            )));
        }
        Ok(())
    }
}

fn parse_var<F, V>(lookup: &F, key: &str) -> SystemResult<Option<V>>
where
    F: Fn(&str) -> Option<String>,
    V: FromStr,
    V::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| SystemError::config(format!("{}={:?}: {}", key, raw, e))),
    }
}

fn parse_flag(key: &str, raw: &str) -> SystemResult<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SystemError::config(format!(
            "{}={:?}: expected a boolean",
            key, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MattingConfig::default();
        assert_eq!(config.solver.cg_steps, 100);
        assert_eq!(config.solver.threshold, None);
        assert!(!config.solver.track_best);
        assert_eq!(config.lambda, 100.0);
        assert!(!config.warm_start);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cg_config_conversion() {
        let solver = SolverConfig {
            cg_steps: 30,
            threshold: Some(1e-8),
            track_best: true,
        };
        let cg: CgConfig = solver.into();
        assert_eq!(cg.max_iter, 30);
        assert_eq!(cg.threshold, Some(1e-8));
        assert!(cg.track_best);
    }

    #[test]
    fn test_from_lookup_empty_is_default() {
        let config = MattingConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, MattingConfig::default());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = MattingConfig::from_lookup(lookup(&[
            (ENV_CG_STEPS, "250"),
            (ENV_CG_THRESHOLD, "1e-6"),
            (ENV_CG_TRACK_BEST, "true"),
            (ENV_LAMBDA, " 50.5 "),
        ]))
        .unwrap();

        assert_eq!(config.solver.cg_steps, 250);
        assert_eq!(config.solver.threshold, Some(1e-6));
        assert!(config.solver.track_best);
        assert_eq!(config.lambda, 50.5);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = MattingConfig::from_lookup(lookup(&[(ENV_CG_STEPS, "many")])).unwrap_err();
        assert!(matches!(err, SystemError::Config { .. }));
        assert!(err.to_string().contains(ENV_CG_STEPS));

        let err = MattingConfig::from_lookup(lookup(&[(ENV_CG_TRACK_BEST, "maybe")])).unwrap_err();
        assert!(matches!(err, SystemError::Config { .. }));
    }

    #[test]
    fn test_from_lookup_validates() {
        let err = MattingConfig::from_lookup(lookup(&[(ENV_CG_STEPS, "0")])).unwrap_err();
        assert!(matches!(err, SystemError::Config { .. }));
    }

    #[test]
    fn test_validate() {
        let mut config = MattingConfig::default();
        config.solver.threshold = Some(-1.0);
        assert!(config.validate().is_err());

        let mut config = MattingConfig::default();
        config.lambda = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    #[cfg(feature = "serde")]
    fn test_config_serialization() {
        let config = MattingConfig {
            warm_start: true,
            ..Default::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("cg_steps"));
        assert!(json.contains("warm_start"));

        let deserialized: MattingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, config);
    }
}
