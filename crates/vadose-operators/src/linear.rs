//! Linear solver seam for the assembled global system.

use std::fmt;

use nalgebra::{DMatrix, DVector, LU};
use vadose_core::{ConfigError, NumericalFailure};

/// Factor-once, solve-many linear solver.
pub trait LinearSolver: fmt::Debug + Send + Sync {
    /// Configuration name.
    fn name(&self) -> &'static str;

    /// Factor `a`, replacing any previous factorization.
    fn factorize(&mut self, a: DMatrix<f64>) -> Result<(), NumericalFailure>;

    /// Solve `a x = b` with the last factorization.
    fn solve(&self, b: &DVector<f64>) -> Result<DVector<f64>, NumericalFailure>;
}

/// Solver names accepted by [`create_linear_solver`].
pub const LINEAR_SOLVERS: [&str; 1] = ["dense lu"];

/// Build the solver registered under `name`.
pub fn create_linear_solver(name: &str) -> Result<Box<dyn LinearSolver>, ConfigError> {
    match name {
        "dense lu" => Ok(Box::new(DenseLu::default())),
        other => Err(ConfigError::UnknownStrategy {
            kind: "linear solver",
            name: other.to_string(),
            known: LINEAR_SOLVERS.iter().map(|s| s.to_string()).collect(),
        }),
    }
}

/// Dense LU with partial pivoting.
#[derive(Clone, Debug, Default)]
pub struct DenseLu {
    lu: Option<LU<f64, nalgebra::Dyn, nalgebra::Dyn>>,
}

impl LinearSolver for DenseLu {
    fn name(&self) -> &'static str {
        "dense lu"
    }

    fn factorize(&mut self, a: DMatrix<f64>) -> Result<(), NumericalFailure> {
        if let Some((i, j)) = first_non_finite(&a) {
            self.lu = None;
            return Err(NumericalFailure::SingularPreconditioner {
                reason: format!("non-finite matrix entry at ({i}, {j})"),
            });
        }
        let lu = a.lu();
        if !lu.is_invertible() {
            self.lu = None;
            return Err(NumericalFailure::SingularPreconditioner {
                reason: "LU factorization has a zero pivot".into(),
            });
        }
        self.lu = Some(lu);
        Ok(())
    }

    fn solve(&self, b: &DVector<f64>) -> Result<DVector<f64>, NumericalFailure> {
        let lu = self
            .lu
            .as_ref()
            .ok_or_else(|| NumericalFailure::SingularPreconditioner {
                reason: "solve called without a factorization".into(),
            })?;
        lu.solve(b)
            .ok_or_else(|| NumericalFailure::SingularPreconditioner {
                reason: "LU solve failed".into(),
            })
    }
}

fn first_non_finite(a: &DMatrix<f64>) -> Option<(usize, usize)> {
    (0..a.nrows())
        .flat_map(|i| (0..a.ncols()).map(move |j| (i, j)))
        .find(|&(i, j)| !a[(i, j)].is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_a_small_system() {
        let mut lu = create_linear_solver("dense lu").unwrap();
        lu.factorize(DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]))
            .unwrap();
        let x = lu.solve(&DVector::from_vec(vec![3.0, 5.0])).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn singular_matrix_is_retryable_failure() {
        let mut lu = DenseLu::default();
        let err = lu
            .factorize(DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]))
            .unwrap_err();
        assert!(matches!(err, NumericalFailure::SingularPreconditioner { .. }));
        assert!(lu.solve(&DVector::zeros(2)).is_err());
    }

    #[test]
    fn unknown_solver_name() {
        assert!(matches!(
            create_linear_solver("amg"),
            Err(ConfigError::UnknownStrategy { .. })
        ));
    }
}
