//! Integrator configuration.

use serde::{Deserialize, Serialize};
use vadose_core::ConfigError;

/// Nonlinear Krylov acceleration settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NkaConfig {
    /// Whether corrections are accelerated.
    pub enabled: bool,
    /// Maximum number of stored correction pairs.
    pub max_vectors: usize,
    /// Pairs whose difference vector is nearly dependent on the others
    /// (relative residual below this) are dropped.
    pub vector_tolerance: f64,
}

impl Default for NkaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_vectors: 10,
            vector_tolerance: 0.05,
        }
    }
}

fn default_max_iterations() -> usize {
    10
}
fn default_nonlinear_tolerance() -> f64 {
    1.0
}
fn default_divergence_tolerance() -> f64 {
    1e10
}
fn default_reduction() -> f64 {
    0.5
}
fn default_increase() -> f64 {
    1.25
}
fn default_min_time_step() -> f64 {
    1e-12
}
fn default_max_time_step() -> f64 {
    1e10
}
fn default_initial_time_step() -> f64 {
    1.0
}
fn default_increase_below() -> usize {
    3
}
fn default_reduce_above() -> usize {
    7
}
fn default_max_retries() -> usize {
    50
}
fn default_lag() -> usize {
    0
}
fn default_true() -> bool {
    true
}

/// BDF1 integrator settings.
///
/// ```json
/// { "max_iterations": 10, "time_step_reduction_factor": 0.5 }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bdf1Config {
    /// Nonlinear iterations per attempt before the attempt fails.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// An iteration converges when the error norm drops below this.
    #[serde(default = "default_nonlinear_tolerance")]
    pub nonlinear_tolerance: f64,
    /// An error norm above this fails the attempt as divergent.
    #[serde(default = "default_divergence_tolerance")]
    pub divergence_tolerance: f64,
    /// Factor applied to the step after a failed attempt, in `(0, 1)`.
    #[serde(default = "default_reduction")]
    pub time_step_reduction_factor: f64,
    /// Factor applied to the next step after an easy solve, `>= 1`.
    #[serde(default = "default_increase")]
    pub time_step_increase_factor: f64,
    /// Floor below which a failed attempt becomes fatal.
    #[serde(default = "default_min_time_step")]
    pub min_time_step: f64,
    /// Ceiling on suggested steps.
    #[serde(default = "default_max_time_step")]
    pub max_time_step: f64,
    /// Step used before any step has been accepted.
    #[serde(default = "default_initial_time_step")]
    pub initial_time_step: f64,
    /// Accepted solves with fewer iterations grow the next step.
    #[serde(default = "default_increase_below")]
    pub increase_below_iterations: usize,
    /// Accepted solves with more iterations shrink the next step.
    #[serde(default = "default_reduce_above")]
    pub reduce_above_iterations: usize,
    /// Consecutive failed attempts allowed within one step.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Refresh the preconditioner every this many iterations (0: once
    /// per attempt).
    #[serde(default = "default_lag")]
    pub preconditioner_lag_iterations: usize,
    /// Start from `u + h u̇` of the previous step instead of `u`.
    #[serde(default = "default_true")]
    pub extrapolate_initial_guess: bool,
    /// Acceleration settings.
    #[serde(default)]
    pub nka: NkaConfig,
}

impl Default for Bdf1Config {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            nonlinear_tolerance: default_nonlinear_tolerance(),
            divergence_tolerance: default_divergence_tolerance(),
            time_step_reduction_factor: default_reduction(),
            time_step_increase_factor: default_increase(),
            min_time_step: default_min_time_step(),
            max_time_step: default_max_time_step(),
            initial_time_step: default_initial_time_step(),
            increase_below_iterations: default_increase_below(),
            reduce_above_iterations: default_reduce_above(),
            max_retries: default_max_retries(),
            preconditioner_lag_iterations: default_lag(),
            extrapolate_initial_guess: true,
            nka: NkaConfig::default(),
        }
    }
}

impl Bdf1Config {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |name: &str, reason: String| ConfigError::InvalidParameter {
            context: "time integrator".into(),
            name: name.into(),
            reason,
        };
        // 1. Iteration budget.
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations", "must be at least 1".into()));
        }
        // 2. Tolerances.
        for (name, v) in [
            ("nonlinear_tolerance", self.nonlinear_tolerance),
            ("divergence_tolerance", self.divergence_tolerance),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(invalid(name, format!("{v} is not a positive number")));
            }
        }
        // 3. Step-size factors.
        let r = self.time_step_reduction_factor;
        if !(r > 0.0 && r < 1.0) {
            return Err(invalid(
                "time_step_reduction_factor",
                format!("{r} is not in (0, 1)"),
            ));
        }
        let g = self.time_step_increase_factor;
        if !(g.is_finite() && g >= 1.0) {
            return Err(invalid("time_step_increase_factor", format!("{g} is below 1")));
        }
        // 4. min <= initial <= max.
        let (lo, h0, hi) = (self.min_time_step, self.initial_time_step, self.max_time_step);
        if !(lo > 0.0 && lo <= h0 && h0 <= hi) {
            return Err(invalid(
                "initial_time_step",
                format!("need 0 < min ({lo}) <= initial ({h0}) <= max ({hi})"),
            ));
        }
        // 5. Acceleration.
        if self.nka.enabled && self.nka.max_vectors == 0 {
            return Err(invalid("nka.max_vectors", "must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Bdf1Config::default().validate().is_ok());
    }

    #[test]
    fn missing_keys_take_defaults() {
        let cfg: Bdf1Config =
            serde_json::from_str(r#"{"max_iterations": 4, "nka": {"enabled": false}}"#).unwrap();
        assert_eq!(cfg.max_iterations, 4);
        assert!(!cfg.nka.enabled);
        assert_eq!(cfg.nka.max_vectors, 10);
        assert_eq!(cfg.time_step_reduction_factor, 0.5);
        assert!(cfg.extrapolate_initial_guess);
    }

    #[test]
    fn reduction_factor_must_shrink() {
        let cfg = Bdf1Config {
            time_step_reduction_factor: 1.0,
            ..Bdf1Config::default()
        };
        match cfg.validate() {
            Err(ConfigError::InvalidParameter { name, .. }) => {
                assert_eq!(name, "time_step_reduction_factor");
            }
            other => panic!("expected InvalidParameter, got {other:?}"),
        }
    }

    #[test]
    fn step_bounds_must_be_ordered() {
        let cfg = Bdf1Config {
            min_time_step: 2.0,
            initial_time_step: 1.0,
            ..Bdf1Config::default()
        };
        assert!(cfg.validate().is_err());
    }
}
