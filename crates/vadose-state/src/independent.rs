//! Independent variables: fields that depend on nothing but the mesh and
//! (optionally) time.

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use vadose_core::{CompositeVector, EntityKind, FieldError, Key, KeySet};

use crate::evaluator::{ChangeTracker, FieldEvaluator};
use crate::state::State;

/// How an independent field is filled.
pub trait IndependentModel: fmt::Debug + Send + Sync {
    /// Write the field value into `out`.
    fn evaluate(&self, s: &State, out: &mut CompositeVector) -> Result<(), FieldError>;

    /// Whether the value must be recomputed when the store's time changes.
    fn is_time_dependent(&self) -> bool {
        false
    }
}

/// Same value on every entity of every component.
#[derive(Clone, Debug)]
pub struct ConstantModel {
    value: f64,
}

impl ConstantModel {
    /// A constant field.
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl IndependentModel for ConstantModel {
    fn evaluate(&self, _s: &State, out: &mut CompositeVector) -> Result<(), FieldError> {
        out.put_scalar(self.value);
        Ok(())
    }
}

/// Cell volumes from the mesh. Only cell components are filled.
#[derive(Clone, Copy, Debug, Default)]
pub struct CellVolumeModel;

impl IndependentModel for CellVolumeModel {
    fn evaluate(&self, s: &State, out: &mut CompositeVector) -> Result<(), FieldError> {
        let names: Vec<String> = out.component_names().map(str::to_string).collect();
        for name in names {
            if out.location(&name)? != EntityKind::Cell {
                continue;
            }
            let dofs = out.num_dofs(&name)?;
            let values = out.view_mut(&name)?;
            for (c, chunk) in values.chunks_mut(dofs).enumerate() {
                chunk.fill(s.mesh().cell_volume(c));
            }
        }
        Ok(())
    }
}

/// Leaf evaluator computing its field once (or once per time level).
#[derive(Clone, Debug)]
pub struct IndependentVariableEvaluator {
    key: Key,
    dependencies: KeySet,
    model: Arc<dyn IndependentModel>,
    tracker: ChangeTracker,
    computed_at: Option<f64>,
}

impl IndependentVariableEvaluator {
    /// An independent field for `key` filled by `model`.
    pub fn new(key: &str, model: Arc<dyn IndependentModel>) -> Self {
        Self {
            key: key.to_string(),
            dependencies: KeySet::new(),
            model,
            tracker: ChangeTracker::new(),
            computed_at: None,
        }
    }

    fn is_stale(&self, s: &State) -> bool {
        match self.computed_at {
            None => true,
            Some(t) => self.model.is_time_dependent() && t != s.time(),
        }
    }
}

impl FieldEvaluator for IndependentVariableEvaluator {
    fn key(&self) -> &str {
        &self.key
    }

    fn dependencies(&self) -> &KeySet {
        &self.dependencies
    }

    fn kind(&self) -> &'static str {
        "independent variable"
    }

    fn has_field_changed(&mut self, s: &mut State, request: &str) -> Result<bool, FieldError> {
        if self.is_stale(s) {
            debug!(field = %self.key, "evaluating independent variable");
            let model = Arc::clone(&self.model);
            s.update_field_with(&self.key, |s, out| model.evaluate(s, out))?;
            self.computed_at = Some(s.time());
            self.tracker.bump();
        }
        Ok(self.tracker.check(request))
    }

    fn has_derivative_changed(
        &mut self,
        _s: &mut State,
        _request: &str,
        wrt: &str,
    ) -> Result<bool, FieldError> {
        Err(FieldError::UnsupportedDerivative {
            key: self.key.clone(),
            wrt: wrt.to_string(),
        })
    }

    fn clone_box(&self) -> Box<dyn FieldEvaluator> {
        Box::new(self.clone())
    }
}
