//! Per-cell second-order tensors (absolute permeability).

use nalgebra::{DMatrix, DVector};

use crate::error::FieldError;
use crate::id::Point;

/// A symmetric `dim x dim` tensor.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    values: DMatrix<f64>,
}

impl Tensor {
    /// `value * I`.
    pub fn isotropic(dim: usize, value: f64) -> Self {
        Self {
            values: DMatrix::from_diagonal_element(dim, dim, value),
        }
    }

    /// Diagonal tensor with the given principal values.
    pub fn diagonal(values: &[f64]) -> Self {
        Self {
            values: DMatrix::from_diagonal(&DVector::from_column_slice(values)),
        }
    }

    /// Full tensor from row-major values.
    pub fn full(dim: usize, row_major: &[f64]) -> Result<Self, FieldError> {
        if row_major.len() != dim * dim {
            return Err(FieldError::ShapeMismatch {
                reason: format!(
                    "{} values given for a {dim}x{dim} tensor",
                    row_major.len()
                ),
            });
        }
        Ok(Self {
            values: DMatrix::from_row_slice(dim, dim, row_major),
        })
    }

    /// Tensor stored as 1 (isotropic), `dim` (diagonal) or `dim²`
    /// (full, row-major) values.
    pub fn from_dofs(values: &[f64], dim: usize) -> Result<Self, FieldError> {
        match values.len() {
            1 => Ok(Self::isotropic(dim, values[0])),
            n if n == dim => Ok(Self::diagonal(values)),
            n if n == dim * dim => Self::full(dim, values),
            n => Err(FieldError::ShapeMismatch {
                reason: format!("{n} tensor values in {dim} dimensions"),
            }),
        }
    }

    /// Spatial dimension.
    pub fn dim(&self) -> usize {
        self.values.nrows()
    }

    /// Underlying matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.values
    }

    /// `K v`.
    pub fn apply(&self, v: &[f64]) -> Point {
        let dim = self.dim();
        (0..dim)
            .map(|i| (0..dim).map(|j| self.values[(i, j)] * v[j]).sum())
            .collect()
    }

    /// `aᵀ K b`.
    pub fn inner(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(self.apply(b)).map(|(x, y)| x * y).sum()
    }

    /// Sum of the diagonal.
    pub fn trace(&self) -> f64 {
        self.values.trace()
    }

    /// Multiply every entry by `a`.
    pub fn scale(&mut self, a: f64) {
        self.values *= a;
    }
}
