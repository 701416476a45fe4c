//! Reusable secondary-model fixtures.
//!
//! - [`CountingModel`]: sum of its dependencies, counting evaluations.
//! - [`ProductModel`]: product of its dependencies, with analytic partials.
//! - [`CubicModel`]: `a·x³ + b·x` of a single dependency.
//! - [`FailingModel`]: fails deterministically after N evaluations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vadose_core::{CompositeVector, FieldError, Key, KeySet};
use vadose_state::{SecondaryModel, State};

fn component_names(out: &CompositeVector) -> Vec<String> {
    out.component_names().map(str::to_string).collect()
}

/// `key = Σ dependencies`; `evaluate` calls are counted in a shared counter.
#[derive(Debug)]
pub struct CountingModel {
    deps: Vec<Key>,
    count: Arc<AtomicUsize>,
}

impl CountingModel {
    pub fn new(deps: &[&str]) -> Self {
        Self {
            deps: deps.iter().map(|d| d.to_string()).collect(),
            count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle to the evaluation counter, valid after the model is boxed.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.count)
    }
}

impl SecondaryModel for CountingModel {
    fn dependencies(&self) -> KeySet {
        self.deps.iter().cloned().collect()
    }

    fn evaluate(&self, s: &State, out: &mut CompositeVector) -> Result<(), FieldError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        out.put_scalar(0.0);
        for dep in &self.deps {
            let x = s.get_field_value(dep)?;
            for name in component_names(out) {
                let src = x.view(&name)?.to_vec();
                for (o, v) in out.view_mut(&name)?.iter_mut().zip(src) {
                    *o += v;
                }
            }
        }
        Ok(())
    }

    fn evaluate_partial_derivative(
        &self,
        _s: &State,
        _wrt: &str,
        out: &mut CompositeVector,
    ) -> Result<(), FieldError> {
        out.put_scalar(1.0);
        Ok(())
    }
}

/// `key = Π dependencies`.
#[derive(Debug)]
pub struct ProductModel {
    deps: Vec<Key>,
}

impl ProductModel {
    pub fn new(deps: &[&str]) -> Self {
        Self {
            deps: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn product(
        &self,
        s: &State,
        skip: Option<&str>,
        out: &mut CompositeVector,
    ) -> Result<(), FieldError> {
        out.put_scalar(1.0);
        for dep in self.deps.iter().filter(|d| Some(d.as_str()) != skip) {
            let x = s.get_field_value(dep)?;
            for name in component_names(out) {
                let src = x.view(&name)?.to_vec();
                for (o, v) in out.view_mut(&name)?.iter_mut().zip(src) {
                    *o *= v;
                }
            }
        }
        Ok(())
    }
}

impl SecondaryModel for ProductModel {
    fn dependencies(&self) -> KeySet {
        self.deps.iter().cloned().collect()
    }

    fn evaluate(&self, s: &State, out: &mut CompositeVector) -> Result<(), FieldError> {
        self.product(s, None, out)
    }

    fn evaluate_partial_derivative(
        &self,
        s: &State,
        wrt: &str,
        out: &mut CompositeVector,
    ) -> Result<(), FieldError> {
        self.product(s, Some(wrt), out)
    }
}

/// `key = a·x³ + b·x` of one dependency `x`.
#[derive(Debug)]
pub struct CubicModel {
    x: Key,
    a: f64,
    b: f64,
}

impl CubicModel {
    pub fn new(x: &str, a: f64, b: f64) -> Self {
        Self {
            x: x.to_string(),
            a,
            b,
        }
    }

    fn apply(
        &self,
        s: &State,
        out: &mut CompositeVector,
        f: impl Fn(f64) -> f64,
    ) -> Result<(), FieldError> {
        let x = s.get_field_value(&self.x)?;
        for name in component_names(out) {
            let src = x.view(&name)?.to_vec();
            for (o, v) in out.view_mut(&name)?.iter_mut().zip(src) {
                *o = f(v);
            }
        }
        Ok(())
    }
}

impl SecondaryModel for CubicModel {
    fn dependencies(&self) -> KeySet {
        [self.x.clone()].into_iter().collect()
    }

    fn evaluate(&self, s: &State, out: &mut CompositeVector) -> Result<(), FieldError> {
        self.apply(s, out, |x| self.a * x * x * x + self.b * x)
    }

    fn evaluate_partial_derivative(
        &self,
        s: &State,
        _wrt: &str,
        out: &mut CompositeVector,
    ) -> Result<(), FieldError> {
        self.apply(s, out, |x| 3.0 * self.a * x * x + self.b)
    }
}

/// Copies its single dependency, failing on every evaluation after the
/// first `succeed_count`.
#[derive(Debug)]
pub struct FailingModel {
    x: Key,
    succeed_count: usize,
    calls: AtomicUsize,
}

impl FailingModel {
    pub fn new(x: &str, succeed_count: usize) -> Self {
        Self {
            x: x.to_string(),
            succeed_count,
            calls: AtomicUsize::new(0),
        }
    }
}

impl SecondaryModel for FailingModel {
    fn dependencies(&self) -> KeySet {
        [self.x.clone()].into_iter().collect()
    }

    fn evaluate(&self, s: &State, out: &mut CompositeVector) -> Result<(), FieldError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n >= self.succeed_count {
            return Err(FieldError::EvaluationFailed {
                key: self.x.clone(),
                reason: format!("failing model: call {n} exceeds succeed_count {}", self.succeed_count),
            });
        }
        let x = s.get_field_value(&self.x)?;
        for name in component_names(out) {
            let src = x.view(&name)?.to_vec();
            out.view_mut(&name)?.copy_from_slice(&src);
        }
        Ok(())
    }

    fn evaluate_partial_derivative(
        &self,
        _s: &State,
        _wrt: &str,
        out: &mut CompositeVector,
    ) -> Result<(), FieldError> {
        out.put_scalar(1.0);
        Ok(())
    }
}
