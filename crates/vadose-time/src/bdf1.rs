//! Backward Euler with retry-on-failure step control.

use tracing::{debug, info, trace, warn};
use vadose_core::{NumericalFailure, StepError, TreeVector};

use crate::config::Bdf1Config;
use crate::nka::Nka;
use crate::outcome::{StepAttempt, StepReport, StepStats};
use crate::traits::ImplicitFn;

/// BDF1 integrator.
///
/// Holds the step-size controller, counters and the previous step's time
/// derivative (for extrapolating initial guesses). The solution vector
/// itself belongs to the caller.
#[derive(Clone, Debug)]
pub struct Bdf1 {
    config: Bdf1Config,
    nka: Option<Nka>,
    stats: StepStats,
    h_next: f64,
    u_dot: Option<TreeVector>,
}

impl Bdf1 {
    /// An integrator with a validated configuration.
    pub fn new(config: Bdf1Config) -> Result<Self, StepError> {
        config.validate()?;
        let nka = config.nka.enabled.then(|| Nka::new(&config.nka));
        Ok(Self {
            h_next: config.initial_time_step,
            config,
            nka,
            stats: StepStats::default(),
            u_dot: None,
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &Bdf1Config {
        &self.config
    }

    /// Counters since construction.
    pub fn stats(&self) -> &StepStats {
        &self.stats
    }

    /// Suggested size of the next step.
    pub fn suggested_step(&self) -> f64 {
        self.h_next
    }

    /// Forget the previous step's time derivative, e.g. after the caller
    /// changed the solution discontinuously.
    pub fn reset_history(&mut self) {
        self.u_dot = None;
    }

    /// Advance `u` from `t` by up to `h`.
    ///
    /// On a retryable failure the step is multiplied by the reduction
    /// factor and retried from the `u` passed in. Returns the accepted
    /// step, or a fatal error: any non-retryable callback error,
    /// [`StepError::StepSizeTooSmall`] once the step falls below the
    /// floor, or [`StepError::RetryBudgetExhausted`].
    pub fn advance<F: ImplicitFn + ?Sized>(
        &mut self,
        fun: &mut F,
        t: f64,
        h: f64,
        u: &mut TreeVector,
    ) -> Result<StepReport, StepError> {
        if !h.is_finite() || h <= 0.0 {
            return Err(StepError::InvalidTimeStep { dt: h });
        }
        let u_old = u.clone();
        let mut h = h;
        let mut failed = 0;
        loop {
            match self.attempt(fun, t, h, &u_old, u)? {
                StepAttempt::Accepted { iterations } => {
                    let mut u_dot = u.clone();
                    u_dot.update(-1.0 / h, &u_old, 1.0 / h)?;
                    self.u_dot = Some(u_dot);
                    self.h_next = self.next_step_size(h, iterations);
                    self.stats.accepted_steps += 1;
                    info!(t = t + h, dt = h, iterations, "step accepted");
                    return Ok(StepReport {
                        t_old: t,
                        t_new: t + h,
                        h,
                        iterations,
                        failed_attempts: failed,
                        h_next: self.h_next,
                    });
                }
                StepAttempt::Retry(failure) => {
                    failed += 1;
                    self.stats.failed_attempts += 1;
                    u.copy_from(&u_old)?;
                    let h_new = h * self.config.time_step_reduction_factor;
                    warn!(reason = %failure, dt = h, next_dt = h_new, "step failed, cutting time step");
                    if h_new < self.config.min_time_step {
                        return Err(StepError::StepSizeTooSmall {
                            dt: h_new,
                            min_dt: self.config.min_time_step,
                            last_failure: failure,
                        });
                    }
                    if failed > self.config.max_retries {
                        return Err(StepError::RetryBudgetExhausted {
                            attempts: failed,
                            last_failure: failure,
                        });
                    }
                    h = h_new;
                }
            }
        }
    }

    /// One attempt at step size `h` from `u_old`, leaving the iterate in
    /// `u`.
    ///
    /// Retryable callback errors become [`StepAttempt::Retry`]; other
    /// errors propagate.
    pub fn attempt<F: ImplicitFn + ?Sized>(
        &mut self,
        fun: &mut F,
        t_old: f64,
        h: f64,
        u_old: &TreeVector,
        u: &mut TreeVector,
    ) -> Result<StepAttempt, StepError> {
        match self.solve(fun, t_old, h, u_old, u) {
            Ok(iterations) => Ok(StepAttempt::Accepted { iterations }),
            Err(StepError::Retryable(failure)) => Ok(StepAttempt::Retry(failure)),
            Err(fatal) => Err(fatal),
        }
    }

    fn solve<F: ImplicitFn + ?Sized>(
        &mut self,
        fun: &mut F,
        t_old: f64,
        h: f64,
        u_old: &TreeVector,
        u: &mut TreeVector,
    ) -> Result<usize, StepError> {
        let t_new = t_old + h;
        self.initial_guess(fun, h, u_old, u)?;
        self.refresh_preconditioner(fun, t_new, u, h)?;

        let mut f = u.clone();
        let mut du = u.clone();
        let mut u_dot = u.clone();
        let mut error = f64::INFINITY;
        for iteration in 1..=self.config.max_iterations {
            self.stats.nonlinear_iterations += 1;

            u_dot.copy_from(u)?;
            u_dot.update(-1.0 / h, u_old, 1.0 / h)?;
            fun.residual(t_new, u, &u_dot, &mut f)?;
            check_finite("residual", &f)?;

            fun.apply_preconditioner(&f, &mut du)?;
            if let Some(nka) = self.nka.as_mut() {
                nka.correction(&mut du)?;
            }
            check_finite("correction", &du)?;

            u.update(-1.0, &du, 1.0)?;
            if !fun.is_admissible(u) {
                return Err(NumericalFailure::Inadmissible {
                    reason: format!("trial state rejected at iteration {iteration}"),
                }
                .into());
            }

            error = fun.error_norm(u, &du);
            debug!(iteration, error, "nonlinear iteration");
            if error < self.config.nonlinear_tolerance {
                return Ok(iteration);
            }
            if !error.is_finite() || error > self.config.divergence_tolerance {
                return Err(NumericalFailure::Divergence { iteration, error }.into());
            }

            let lag = self.config.preconditioner_lag_iterations;
            if lag > 0 && iteration % lag == 0 && iteration < self.config.max_iterations {
                self.refresh_preconditioner(fun, t_new, u, h)?;
            }
        }
        Err(NumericalFailure::NonConvergence {
            iterations: self.config.max_iterations,
            error,
        }
        .into())
    }

    fn initial_guess<F: ImplicitFn + ?Sized>(
        &self,
        fun: &F,
        h: f64,
        u_old: &TreeVector,
        u: &mut TreeVector,
    ) -> Result<(), StepError> {
        u.copy_from(u_old)?;
        if !self.config.extrapolate_initial_guess {
            return Ok(());
        }
        if let Some(u_dot) = &self.u_dot {
            u.update(h, u_dot, 1.0)?;
            if u.first_non_finite().is_some() || !fun.is_admissible(u) {
                debug!("extrapolated guess rejected, starting from the previous state");
                u.copy_from(u_old)?;
            }
        }
        Ok(())
    }

    fn refresh_preconditioner<F: ImplicitFn + ?Sized>(
        &mut self,
        fun: &mut F,
        t: f64,
        u: &TreeVector,
        h: f64,
    ) -> Result<(), StepError> {
        trace!(t, h, "updating preconditioner");
        fun.update_preconditioner(t, u, h)?;
        self.stats.preconditioner_updates += 1;
        if let Some(nka) = self.nka.as_mut() {
            nka.restart();
        }
        Ok(())
    }

    fn next_step_size(&self, h: f64, iterations: usize) -> f64 {
        let c = &self.config;
        let h_next = if iterations < c.increase_below_iterations {
            h * c.time_step_increase_factor
        } else if iterations > c.reduce_above_iterations {
            h * c.time_step_reduction_factor
        } else {
            h
        };
        h_next.clamp(c.min_time_step, c.max_time_step)
    }
}

fn check_finite(what: &str, v: &TreeVector) -> Result<(), StepError> {
    match v.first_non_finite() {
        Some((component, index, value)) => Err(NumericalFailure::NonFinite {
            field: what.to_string(),
            component,
            index,
            value,
        }
        .into()),
        None => Ok(()),
    }
}
