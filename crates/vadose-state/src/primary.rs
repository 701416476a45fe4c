//! Primary variables: fields assigned from outside the graph.

use vadose_core::{FieldError, Key, KeySet};

use crate::evaluator::{ChangeTracker, FieldEvaluator};
use crate::state::State;

/// Leaf evaluator for a field whose value is set by its owner (typically
/// the time integrator's solution).
///
/// It never computes anything. The owner calls
/// [`State::mark_primary_changed`] after writing, and every requester then
/// sees the change once. The only derivative it provides is with respect
/// to itself, which is one everywhere.
#[derive(Clone, Debug)]
pub struct PrimaryVariableEvaluator {
    key: Key,
    dependencies: KeySet,
    tracker: ChangeTracker,
    derivative_ready: bool,
}

impl PrimaryVariableEvaluator {
    /// A primary variable for `key`.
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            dependencies: KeySet::new(),
            tracker: ChangeTracker::new(),
            derivative_ready: false,
        }
    }

    /// Record that the value was assigned.
    pub fn mark_changed(&mut self) {
        self.tracker.bump();
    }
}

impl FieldEvaluator for PrimaryVariableEvaluator {
    fn key(&self) -> &str {
        &self.key
    }

    fn dependencies(&self) -> &KeySet {
        &self.dependencies
    }

    fn kind(&self) -> &'static str {
        "primary variable"
    }

    fn has_field_changed(&mut self, _s: &mut State, request: &str) -> Result<bool, FieldError> {
        Ok(self.tracker.check(request))
    }

    fn has_derivative_changed(
        &mut self,
        s: &mut State,
        _request: &str,
        wrt: &str,
    ) -> Result<bool, FieldError> {
        if wrt != self.key {
            return Err(FieldError::UnsupportedDerivative {
                key: self.key.clone(),
                wrt: wrt.to_string(),
            });
        }
        if self.derivative_ready {
            return Ok(false);
        }
        let dkey = s.ensure_derivative_field(&self.key, wrt)?;
        s.update_field_with(&dkey, |_, d| {
            d.put_scalar(1.0);
            Ok(())
        })?;
        self.derivative_ready = true;
        Ok(true)
    }

    fn is_primary(&self) -> bool {
        true
    }

    fn as_primary_mut(&mut self) -> Option<&mut PrimaryVariableEvaluator> {
        Some(self)
    }

    fn clone_box(&self) -> Box<dyn FieldEvaluator> {
        Box::new(self.clone())
    }
}
