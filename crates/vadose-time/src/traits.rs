//! The callback contract between the integrator and a process kernel.

use vadose_core::{StepError, TreeVector};

/// An implicit problem `f(t, u, u̇) = 0` advanced by the integrator.
///
/// Callbacks return [`StepError::Retryable`] for conditions that a
/// smaller step can recover from; any other error aborts the run.
pub trait ImplicitFn {
    /// Nonlinear residual at `u` and time `t`, with `u_dot` the
    /// backward-difference estimate of `du/dt`.
    fn residual(
        &mut self,
        t: f64,
        u: &TreeVector,
        u_dot: &TreeVector,
        f: &mut TreeVector,
    ) -> Result<(), StepError>;

    /// Approximate inverse of the Jacobian applied to `r`.
    fn apply_preconditioner(&self, r: &TreeVector, pr: &mut TreeVector) -> Result<(), StepError>;

    /// Rebuild the preconditioner at `u`, time `t` and step size `h`.
    fn update_preconditioner(&mut self, t: f64, u: &TreeVector, h: f64) -> Result<(), StepError>;

    /// Size of the correction `du` relative to `u`, compared against the
    /// nonlinear tolerance.
    fn error_norm(&self, u: &TreeVector, du: &TreeVector) -> f64;

    /// Physical validity of a trial state.
    fn is_admissible(&self, _u: &TreeVector) -> bool {
        true
    }
}
