//! Explicit results of step attempts and whole steps.

use vadose_core::NumericalFailure;

/// Result of one attempt at a fixed step size.
#[derive(Clone, Debug, PartialEq)]
pub enum StepAttempt {
    /// The nonlinear solve converged.
    Accepted {
        /// Nonlinear iterations used.
        iterations: usize,
    },
    /// The attempt failed in a way a smaller step may fix.
    Retry(NumericalFailure),
}

/// Summary of one accepted step.
#[derive(Clone, Debug, PartialEq)]
pub struct StepReport {
    /// Time at the start of the step.
    pub t_old: f64,
    /// Time at the end of the step.
    pub t_new: f64,
    /// Step size actually taken.
    pub h: f64,
    /// Nonlinear iterations of the accepted attempt.
    pub iterations: usize,
    /// Failed attempts before acceptance.
    pub failed_attempts: usize,
    /// Suggested size of the next step.
    pub h_next: f64,
}

/// Running counters over the life of an integrator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Steps accepted.
    pub accepted_steps: usize,
    /// Attempts that failed and were retried.
    pub failed_attempts: usize,
    /// Nonlinear iterations over all attempts.
    pub nonlinear_iterations: usize,
    /// Preconditioner refreshes.
    pub preconditioner_updates: usize,
}
