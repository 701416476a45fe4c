//! The [`FieldEvaluator`] trait and change-tracking bookkeeping.

use std::collections::HashMap;

use vadose_core::{FieldError, KeySet};

use crate::primary::PrimaryVariableEvaluator;
use crate::state::State;

/// Computes one field of the store from other fields.
///
/// # Contract
///
/// - `has_field_changed` refreshes the value if any dependency changed and
///   returns `true` iff the value was recomputed since `request` last
///   asked. Two requesters asking after one recomputation both see `true`
///   once; a second ask from the same requester sees `false`.
/// - `has_derivative_changed` does the same for `∂key/∂wrt`, stored in the
///   field `derivative_key(key, wrt)`. Derivatives the evaluator cannot
///   provide fail with [`FieldError::UnsupportedDerivative`].
/// - Evaluators are moved out of the store while running, so they may
///   freely call back into `State` for their dependencies.
pub trait FieldEvaluator: Send + Sync {
    /// Key of the field this evaluator writes.
    fn key(&self) -> &str;

    /// Keys read directly by this evaluator.
    fn dependencies(&self) -> &KeySet;

    /// Short label for diagnostics (e.g. `"secondary"`).
    fn kind(&self) -> &'static str;

    /// Refresh if stale; report whether `request` has an unseen value.
    fn has_field_changed(&mut self, s: &mut State, request: &str) -> Result<bool, FieldError>;

    /// Refresh `∂key/∂wrt` if stale; report whether `request` has an
    /// unseen value.
    fn has_derivative_changed(
        &mut self,
        s: &mut State,
        request: &str,
        wrt: &str,
    ) -> Result<bool, FieldError>;

    /// Whether `key` is reachable through this evaluator's dependencies.
    fn is_dependency(&self, s: &State, key: &str) -> bool {
        self.dependencies().iter().any(|dep| {
            dep == key
                || s
                    .get_evaluator(dep)
                    .map(|e| e.is_dependency(s, key))
                    .unwrap_or(false)
        })
    }

    /// Declare shapes of dependency fields. Called once per `State::setup`.
    fn ensure_compatibility(&mut self, _s: &mut State) -> Result<(), FieldError> {
        Ok(())
    }

    /// Whether this is a primary-variable evaluator.
    fn is_primary(&self) -> bool {
        false
    }

    /// Downcast to a primary-variable evaluator.
    fn as_primary_mut(&mut self) -> Option<&mut PrimaryVariableEvaluator> {
        None
    }

    /// Clone into a box, so whole stores can be duplicated.
    fn clone_box(&self) -> Box<dyn FieldEvaluator>;
}

/// Per-requester bookkeeping of which version each requester has seen.
#[derive(Clone, Debug)]
pub struct ChangeTracker {
    version: u64,
    seen: HashMap<String, u64>,
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeTracker {
    /// A tracker whose first `check` from any requester returns `true`.
    pub fn new() -> Self {
        Self {
            version: 1,
            seen: HashMap::new(),
        }
    }

    /// Current version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Record a new value.
    pub fn bump(&mut self) {
        self.version += 1;
    }

    /// `true` iff `request` has not yet seen the current version; marks it
    /// seen.
    pub fn check(&mut self, request: &str) -> bool {
        match self.seen.get_mut(request) {
            Some(v) if *v == self.version => false,
            Some(v) => {
                *v = self.version;
                true
            }
            None => {
                self.seen.insert(request.to_string(), self.version);
                true
            }
        }
    }
}
