//! Nonlinear Krylov acceleration of fixed-point corrections.
//!
//! Each call receives the preconditioned residual `f` of the current
//! iterate and returns the correction to subtract. Differences between
//! successive residuals and the corrections that produced them span a
//! subspace in which the next correction is improved by a small least
//! squares solve.

use std::collections::VecDeque;

use nalgebra::{DMatrix, DVector};
use vadose_core::{FieldError, TreeVector};

use crate::config::NkaConfig;

/// Accelerator state for one nonlinear solve.
#[derive(Clone, Debug)]
pub struct Nka {
    max_vectors: usize,
    vector_tolerance: f64,
    /// Corrections `v_i`, newest first, scaled with their `w_i`.
    v: VecDeque<TreeVector>,
    /// Residual differences `w_i`, newest first, unit length.
    w: VecDeque<TreeVector>,
    /// Correction and residual of the previous call.
    pending: Option<(TreeVector, TreeVector)>,
}

impl Nka {
    /// An empty accelerator.
    pub fn new(config: &NkaConfig) -> Self {
        Self {
            max_vectors: config.max_vectors.max(1),
            vector_tolerance: config.vector_tolerance,
            v: VecDeque::new(),
            w: VecDeque::new(),
            pending: None,
        }
    }

    /// Forget all stored vectors, e.g. after a preconditioner refresh.
    pub fn restart(&mut self) {
        self.v.clear();
        self.w.clear();
        self.pending = None;
    }

    /// Stored vector pairs.
    pub fn len(&self) -> usize {
        self.w.len()
    }

    /// Whether no vector pairs are stored.
    pub fn is_empty(&self) -> bool {
        self.w.is_empty()
    }

    /// Replace `f` by the accelerated correction.
    pub fn correction(&mut self, f: &mut TreeVector) -> Result<(), FieldError> {
        if let Some((mut dp, mut df)) = self.pending.take() {
            // w = f_prev - f, v = dp_prev, both scaled so |w| = 1.
            df.update(-1.0, f, 1.0)?;
            let norm = df.norm2();
            if norm > 0.0 {
                df.scale(1.0 / norm);
                dp.scale(1.0 / norm);
                self.w.push_front(df);
                self.v.push_front(dp);
                self.drop_dependent()?;
                while self.w.len() > self.max_vectors {
                    self.w.pop_back();
                    self.v.pop_back();
                }
            }
        }

        let f_in = f.clone();
        if !self.w.is_empty() {
            if let Some(c) = self.coefficients(f)? {
                for (ci, (vi, wi)) in c.iter().zip(self.v.iter().zip(&self.w)) {
                    f.update(*ci, vi, 1.0)?;
                    f.update(-*ci, wi, 1.0)?;
                }
            }
        }
        self.pending = Some((f.clone(), f_in));
        Ok(())
    }

    /// Least-squares coefficients minimizing `|f - Σ c_i w_i|`.
    fn coefficients(&self, f: &TreeVector) -> Result<Option<DVector<f64>>, FieldError> {
        let n = self.w.len();
        let mut h = DMatrix::<f64>::zeros(n, n);
        let mut b = DVector::<f64>::zeros(n);
        for i in 0..n {
            b[i] = self.w[i].dot(f)?;
            for j in 0..=i {
                let hij = self.w[i].dot(&self.w[j])?;
                h[(i, j)] = hij;
                h[(j, i)] = hij;
            }
        }
        Ok(h.cholesky().map(|chol| chol.solve(&b)))
    }

    /// Drop older pairs whose `w` is nearly in the span of the newer ones.
    fn drop_dependent(&mut self) -> Result<(), FieldError> {
        let mut keep = 1;
        while keep < self.w.len() {
            let basis: Vec<&TreeVector> = self.w.iter().take(keep).collect();
            let candidate = &self.w[keep];
            let n = basis.len();
            let mut h = DMatrix::<f64>::zeros(n, n);
            let mut b = DVector::<f64>::zeros(n);
            for i in 0..n {
                b[i] = basis[i].dot(candidate)?;
                for j in 0..n {
                    h[(i, j)] = basis[i].dot(basis[j])?;
                }
            }
            let projected = match h.cholesky() {
                Some(chol) => b.dot(&chol.solve(&b)),
                None => 0.0,
            };
            let cnorm2 = candidate.dot(candidate)?;
            let residual2 = (cnorm2 - projected).max(0.0);
            if residual2.sqrt() < self.vector_tolerance * cnorm2.sqrt() {
                self.w.remove(keep);
                self.v.remove(keep);
            } else {
                keep += 1;
            }
        }
        Ok(())
    }
}
