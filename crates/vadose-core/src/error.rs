//! Error types for the vadose flow solver.
//!
//! Organized by how the run reacts to them:
//!
//! - [`FieldError`] and [`ConfigError`] are fatal. They describe a
//!   malformed setup and abort the run with a descriptive message.
//! - [`NumericalFailure`] is retryable. The time integrator catches it,
//!   cuts the step and retries from the last accepted state.
//! - [`StepError`] is what crosses the time-integrator boundary and
//!   classifies the two via [`StepError::is_retryable`].

use crate::id::Key;
use std::error::Error;
use std::fmt;

// ── Field store / evaluator graph ──────────────────────────────────

/// Errors from the field store and the evaluator graph.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldError {
    /// No field with this key has been required.
    UnknownField {
        /// The requested key.
        key: Key,
    },
    /// The field exists but its storage has not been allocated yet
    /// (`State::setup` has not run).
    NotAllocated {
        /// The field key.
        key: Key,
    },
    /// A mutable view was requested by someone other than the owner.
    OwnerMismatch {
        /// The field key.
        key: Key,
        /// Recorded owner, if any.
        owner: Option<String>,
        /// Who asked.
        requested_by: String,
    },
    /// A dependency or required field has no evaluator.
    MissingEvaluator {
        /// The key without an evaluator.
        key: Key,
    },
    /// An evaluator for this key is already registered.
    DuplicateEvaluator {
        /// The key.
        key: Key,
    },
    /// The composite vector has no component with this name.
    UnknownComponent {
        /// The missing component name.
        component: String,
    },
    /// Two declarations or operands disagree on structure.
    ShapeMismatch {
        /// Description of the conflict.
        reason: String,
    },
    /// Ghost entries were read after owned data changed without a scatter.
    StaleGhosts {
        /// The component with stale ghosts.
        component: String,
    },
    /// The evaluator dependency graph contains a cycle.
    CyclicDependency {
        /// Keys along the cycle, first key repeated at the end.
        cycle: Vec<Key>,
    },
    /// A derivative was requested with respect to a key the field does
    /// not depend on.
    UnsupportedDerivative {
        /// The differentiated field.
        key: Key,
        /// The requested independent variable.
        wrt: Key,
    },
    /// A primary-variable operation was applied to a derived field.
    NotPrimary {
        /// The field key.
        key: Key,
    },
    /// An evaluator model could not compute its value.
    EvaluationFailed {
        /// The evaluated field.
        key: Key,
        /// Human-readable description.
        reason: String,
    },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownField { key } => write!(f, "unknown field '{key}'"),
            Self::NotAllocated { key } => {
                write!(f, "field '{key}' has no storage (state not set up)")
            }
            Self::OwnerMismatch {
                key,
                owner,
                requested_by,
            } => match owner {
                Some(owner) => write!(
                    f,
                    "field '{key}' is owned by '{owner}', not '{requested_by}'"
                ),
                None => write!(
                    f,
                    "field '{key}' has no owner and cannot be written by '{requested_by}'"
                ),
            },
            Self::MissingEvaluator { key } => write!(f, "no evaluator for field '{key}'"),
            Self::DuplicateEvaluator { key } => {
                write!(f, "evaluator for field '{key}' already registered")
            }
            Self::UnknownComponent { component } => {
                write!(f, "no component named '{component}'")
            }
            Self::ShapeMismatch { reason } => write!(f, "shape mismatch: {reason}"),
            Self::StaleGhosts { component } => {
                write!(f, "ghost entries of component '{component}' are stale")
            }
            Self::CyclicDependency { cycle } => {
                write!(f, "cyclic evaluator dependency: {}", cycle.join(" -> "))
            }
            Self::UnsupportedDerivative { key, wrt } => {
                write!(f, "field '{key}' does not depend on '{wrt}'")
            }
            Self::NotPrimary { key } => write!(f, "field '{key}' is not a primary variable"),
            Self::EvaluationFailed { key, reason } => {
                write!(f, "evaluating '{key}' failed: {reason}")
            }
        }
    }
}

impl Error for FieldError {}

// ── Configuration ──────────────────────────────────────────────────

/// Errors from configuration parsing and validation.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// A named strategy is not registered.
    UnknownStrategy {
        /// What kind of strategy was being selected.
        kind: &'static str,
        /// The unrecognized name.
        name: String,
        /// Names that would have been accepted.
        known: Vec<String>,
    },
    /// A required parameter is absent.
    MissingParameter {
        /// Where the parameter was expected.
        context: String,
        /// The parameter name.
        name: String,
    },
    /// A parameter is present but unusable.
    InvalidParameter {
        /// Where the parameter was read.
        context: String,
        /// The parameter name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A boundary-condition specification is malformed.
    MalformedBoundaryCondition {
        /// Description of the problem.
        reason: String,
    },
    /// The configuration text could not be parsed.
    Parse {
        /// Parser message.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownStrategy { kind, name, known } => {
                write!(f, "no {kind} named '{name}'")?;
                if !known.is_empty() {
                    write!(f, " (known: {})", known.join(", "))?;
                }
                Ok(())
            }
            Self::MissingParameter { context, name } => {
                write!(f, "{context}: missing parameter '{name}'")
            }
            Self::InvalidParameter {
                context,
                name,
                reason,
            } => write!(f, "{context}: invalid parameter '{name}': {reason}"),
            Self::MalformedBoundaryCondition { reason } => {
                write!(f, "malformed boundary condition: {reason}")
            }
            Self::Parse { reason } => write!(f, "config parse error: {reason}"),
        }
    }
}

impl Error for ConfigError {}

// ── Retryable numerical failures ───────────────────────────────────

/// A numerical condition that is recovered from by cutting the step.
#[derive(Clone, Debug, PartialEq)]
pub enum NumericalFailure {
    /// A non-finite value appeared in a field or vector.
    NonFinite {
        /// Field (or vector) holding the value.
        field: String,
        /// Component name.
        component: String,
        /// Entity index of the first offending entry.
        index: usize,
        /// The offending value.
        value: f64,
    },
    /// The nonlinear solve did not converge within its iteration budget.
    NonConvergence {
        /// Iterations performed.
        iterations: usize,
        /// Error norm after the last iteration.
        error: f64,
    },
    /// The nonlinear error norm grew past the divergence tolerance.
    Divergence {
        /// Iteration at which divergence was detected.
        iteration: usize,
        /// The error norm.
        error: f64,
    },
    /// The preconditioner could not be factored.
    SingularPreconditioner {
        /// Description from the linear solver.
        reason: String,
    },
    /// A trial state failed the admissibility check.
    Inadmissible {
        /// Description of the rejected state.
        reason: String,
    },
}

impl fmt::Display for NumericalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFinite {
                field,
                component,
                index,
                value,
            } => write!(f, "non-finite value {value} in {field}[{component}][{index}]"),
            Self::NonConvergence { iterations, error } => write!(
                f,
                "nonlinear solve did not converge in {iterations} iterations (error {error:e})"
            ),
            Self::Divergence { iteration, error } => {
                write!(f, "nonlinear solve diverged at iteration {iteration} (error {error:e})")
            }
            Self::SingularPreconditioner { reason } => {
                write!(f, "singular preconditioner: {reason}")
            }
            Self::Inadmissible { reason } => write!(f, "inadmissible state: {reason}"),
        }
    }
}

impl Error for NumericalFailure {}

// ── Step boundary ──────────────────────────────────────────────────

/// Errors crossing the time-integrator boundary.
#[derive(Clone, Debug, PartialEq)]
pub enum StepError {
    /// Recoverable by reducing the step size.
    Retryable(NumericalFailure),
    /// Fatal field-store or evaluator error.
    Field(FieldError),
    /// Fatal configuration error.
    Config(ConfigError),
    /// The step size dropped below the configured floor while retrying.
    StepSizeTooSmall {
        /// The step size that would have been tried next.
        dt: f64,
        /// The configured floor.
        min_dt: f64,
        /// The failure that triggered the last cut.
        last_failure: NumericalFailure,
    },
    /// Too many consecutive failed attempts.
    RetryBudgetExhausted {
        /// Attempts made.
        attempts: usize,
        /// The failure that triggered the last cut.
        last_failure: NumericalFailure,
    },
    /// A non-positive or non-finite step size was requested.
    InvalidTimeStep {
        /// The requested step size.
        dt: f64,
    },
}

impl StepError {
    /// Whether the time integrator may recover by cutting the step.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retryable(reason) => write!(f, "retryable failure: {reason}"),
            Self::Field(e) => write!(f, "field error: {e}"),
            Self::Config(e) => write!(f, "configuration error: {e}"),
            Self::StepSizeTooSmall {
                dt,
                min_dt,
                last_failure,
            } => write!(
                f,
                "step size {dt:e} below minimum {min_dt:e} after: {last_failure}"
            ),
            Self::RetryBudgetExhausted {
                attempts,
                last_failure,
            } => write!(
                f,
                "gave up after {attempts} failed attempts, last: {last_failure}"
            ),
            Self::InvalidTimeStep { dt } => write!(f, "invalid time step {dt}"),
        }
    }
}

impl Error for StepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Retryable(e) => Some(e),
            Self::Field(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::StepSizeTooSmall { last_failure, .. } => Some(last_failure),
            Self::RetryBudgetExhausted { last_failure, .. } => Some(last_failure),
            Self::InvalidTimeStep { .. } => None,
        }
    }
}

impl From<NumericalFailure> for StepError {
    fn from(e: NumericalFailure) -> Self {
        Self::Retryable(e)
    }
}

impl From<FieldError> for StepError {
    fn from(e: FieldError) -> Self {
        Self::Field(e)
    }
}

impl From<ConfigError> for StepError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_numerical_failures_are_retryable() {
        let retry: StepError = NumericalFailure::NonConvergence {
            iterations: 10,
            error: 3.0,
        }
        .into();
        assert!(retry.is_retryable());

        let fatal: StepError = ConfigError::UnknownStrategy {
            kind: "upwinding method",
            name: "sideways".into(),
            known: vec![],
        }
        .into();
        assert!(!fatal.is_retryable());

        let floor = StepError::StepSizeTooSmall {
            dt: 1e-14,
            min_dt: 1e-12,
            last_failure: NumericalFailure::Inadmissible {
                reason: "negative".into(),
            },
        };
        assert!(!floor.is_retryable());
        assert!(floor.source().is_some());
    }

    #[test]
    fn messages_name_the_offender() {
        let e = NumericalFailure::NonFinite {
            field: "numerical_rel_perm".into(),
            component: "face".into(),
            index: 7,
            value: f64::NAN,
        };
        assert_eq!(e.to_string(), "non-finite value NaN in numerical_rel_perm[face][7]");

        let e = FieldError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(e.to_string(), "cyclic evaluator dependency: a -> b -> a");

        let e = ConfigError::UnknownStrategy {
            kind: "upwinding method",
            name: "sideways".into(),
            known: vec!["cell centered".into(), "arithmetic mean".into()],
        };
        assert_eq!(
            e.to_string(),
            "no upwinding method named 'sideways' (known: cell centered, arithmetic mean)"
        );
    }
}
