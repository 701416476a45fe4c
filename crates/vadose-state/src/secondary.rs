//! Secondary variables: fields computed from other fields by a model.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;
use vadose_core::{derivative_key, CompositeVector, FieldError, Key, KeySet};

use crate::evaluator::{ChangeTracker, FieldEvaluator};
use crate::state::State;

/// A pointwise constitutive relation `key = f(dependencies)`.
///
/// Models read their inputs from the store with
/// [`State::get_field_value`]; the evaluator guarantees every dependency
/// is fresh before `evaluate` runs.
pub trait SecondaryModel: fmt::Debug + Send + Sync {
    /// Keys read by `evaluate`.
    fn dependencies(&self) -> KeySet;

    /// Write the value into `out`.
    fn evaluate(&self, s: &State, out: &mut CompositeVector) -> Result<(), FieldError>;

    /// Write `∂key/∂wrt` (a direct partial, other dependencies held fixed)
    /// into `out`. `wrt` is always one of [`dependencies`](Self::dependencies).
    fn evaluate_partial_derivative(
        &self,
        s: &State,
        wrt: &str,
        out: &mut CompositeVector,
    ) -> Result<(), FieldError>;
}

#[derive(Clone, Debug, Default)]
struct DerivativeRecord {
    computed_at: Option<u64>,
    tracker: ChangeTracker,
}

/// Memoizing evaluator around a [`SecondaryModel`].
///
/// The value is recomputed only when some dependency reports a change.
/// Total derivatives are assembled by the chain rule over every dependency
/// that itself depends on the differentiation variable.
#[derive(Clone, Debug)]
pub struct SecondaryVariableEvaluator {
    key: Key,
    dependencies: KeySet,
    model: Arc<dyn SecondaryModel>,
    computed: bool,
    tracker: ChangeTracker,
    evaluations: usize,
    derivatives: HashMap<Key, DerivativeRecord>,
}

impl SecondaryVariableEvaluator {
    /// A secondary field for `key` computed by `model`.
    pub fn new(key: &str, model: Arc<dyn SecondaryModel>) -> Self {
        Self {
            key: key.to_string(),
            dependencies: model.dependencies(),
            model,
            computed: false,
            tracker: ChangeTracker::new(),
            evaluations: 0,
            derivatives: HashMap::new(),
        }
    }

    /// Number of times the value has been computed.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn refresh(&mut self, s: &mut State) -> Result<(), FieldError> {
        let mut update = !self.computed;
        // No short-circuit: every dependency must record this requester.
        for dep in &self.dependencies {
            update |= s.changed(dep, &self.key)?;
        }
        if update {
            debug!(field = %self.key, "evaluating secondary variable");
            let model = Arc::clone(&self.model);
            s.update_field_with(&self.key, |s, out| model.evaluate(s, out))?;
            self.computed = true;
            self.evaluations += 1;
            self.tracker.bump();
        }
        Ok(())
    }

    fn compute_derivative(&self, s: &mut State, wrt: &str) -> Result<(), FieldError> {
        let dkey = s.ensure_derivative_field(&self.key, wrt)?;

        let direct = self.dependencies.contains(wrt);
        let mut chain = Vec::new();
        for dep in &self.dependencies {
            if dep == wrt {
                continue;
            }
            let through = s
                .get_evaluator(dep)
                .map(|e| e.is_dependency(s, wrt))
                .unwrap_or(false);
            if through {
                s.derivative_changed(dep, &self.key, wrt)?;
                chain.push(dep.clone());
            }
        }

        let model = Arc::clone(&self.model);
        s.update_field_with(&dkey, |s, out| {
            if direct {
                model.evaluate_partial_derivative(s, wrt, out)?;
            } else {
                out.put_scalar(0.0);
            }
            let mut partial = out.clone();
            for dep in &chain {
                model.evaluate_partial_derivative(s, dep, &mut partial)?;
                let ddep = s.get_field_value(&derivative_key(dep, wrt))?;
                out.multiply(1.0, &partial, ddep, 1.0)?;
            }
            Ok(())
        })
    }
}

impl FieldEvaluator for SecondaryVariableEvaluator {
    fn key(&self) -> &str {
        &self.key
    }

    fn dependencies(&self) -> &KeySet {
        &self.dependencies
    }

    fn kind(&self) -> &'static str {
        "secondary variable"
    }

    fn has_field_changed(&mut self, s: &mut State, request: &str) -> Result<bool, FieldError> {
        self.refresh(s)?;
        Ok(self.tracker.check(request))
    }

    fn has_derivative_changed(
        &mut self,
        s: &mut State,
        request: &str,
        wrt: &str,
    ) -> Result<bool, FieldError> {
        if !self.is_dependency(s, wrt) {
            return Err(FieldError::UnsupportedDerivative {
                key: self.key.clone(),
                wrt: wrt.to_string(),
            });
        }
        self.refresh(s)?;
        let version = self.tracker.version();
        let stale = self
            .derivatives
            .get(wrt)
            .is_none_or(|r| r.computed_at != Some(version));
        if stale {
            self.compute_derivative(s, wrt)?;
            let record = self.derivatives.entry(wrt.to_string()).or_default();
            record.computed_at = Some(version);
            record.tracker.bump();
        }
        Ok(self
            .derivatives
            .get_mut(wrt)
            .is_some_and(|r| r.tracker.check(request)))
    }

    fn ensure_compatibility(&mut self, s: &mut State) -> Result<(), FieldError> {
        let own = s.field(&self.key)?.space().clone();
        if own.is_empty() {
            return Ok(());
        }
        for dep in &self.dependencies {
            s.require_field(dep, None)?.merge(&own)?;
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn FieldEvaluator> {
        Box::new(self.clone())
    }
}
