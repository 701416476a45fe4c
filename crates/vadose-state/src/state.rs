//! The field store.
//!
//! [`State`] is the single owner of every field value and every evaluator.
//! Evaluators never hold references into the store between calls: while
//! one is running it is temporarily moved out of its slot and handed
//! `&mut State`, so it can ask its dependencies for fresh values through
//! the same entry points as any other consumer.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::trace;
use vadose_core::{
    derivative_key, CompositeVector, CompositeVectorSpace, Communicator, FieldError, Key, Point,
    SerialComm,
};
use vadose_mesh::Mesh;

use crate::evaluator::FieldEvaluator;
use crate::field::Field;
use crate::graph::{validate_graph, EvaluationOrder};

/// Requester identity used by [`State::value`] and [`State::derivative`].
pub const VALUE_REQUEST: &str = "state";

/// Process-wide registry of named fields and their evaluators.
pub struct State {
    mesh: Arc<dyn Mesh>,
    comm: Arc<dyn Communicator>,
    fields: IndexMap<Key, Field>,
    /// `None` while the evaluator is executing.
    evaluators: IndexMap<Key, Option<Box<dyn FieldEvaluator>>>,
    time: f64,
    cycle: u64,
    scalars: IndexMap<String, f64>,
    gravity: Option<Point>,
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("evaluators", &self.evaluators.keys().collect::<Vec<_>>())
            .field("time", &self.time)
            .field("cycle", &self.cycle)
            .finish()
    }
}

impl Clone for State {
    fn clone(&self) -> Self {
        Self {
            mesh: Arc::clone(&self.mesh),
            comm: Arc::clone(&self.comm),
            fields: self.fields.clone(),
            evaluators: self
                .evaluators
                .iter()
                .map(|(k, e)| (k.clone(), e.as_ref().map(|e| e.clone_box())))
                .collect(),
            time: self.time,
            cycle: self.cycle,
            scalars: self.scalars.clone(),
            gravity: self.gravity.clone(),
        }
    }
}

impl State {
    /// An empty store over `mesh` for a single participant.
    pub fn new(mesh: Arc<dyn Mesh>) -> Self {
        Self::with_comm(mesh, Arc::new(SerialComm))
    }

    /// An empty store over `mesh` using `comm` for ghost exchange.
    pub fn with_comm(mesh: Arc<dyn Mesh>, comm: Arc<dyn Communicator>) -> Self {
        Self {
            mesh,
            comm,
            fields: IndexMap::new(),
            evaluators: IndexMap::new(),
            time: 0.0,
            cycle: 0,
            scalars: IndexMap::new(),
            gravity: None,
        }
    }

    // ── Environment ────────────────────────────────────────────────

    /// The mesh every field lives on.
    pub fn mesh(&self) -> &dyn Mesh {
        self.mesh.as_ref()
    }

    /// Shared handle to the mesh.
    pub fn mesh_arc(&self) -> Arc<dyn Mesh> {
        Arc::clone(&self.mesh)
    }

    /// The communicator used for ghost exchange and reductions.
    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    /// Time level of this store.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Set the time level. Time-dependent independent evaluators
    /// recompute on their next request.
    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    /// Number of accepted steps.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Set the cycle counter.
    pub fn set_cycle(&mut self, cycle: u64) {
        self.cycle = cycle;
    }

    /// Set a named global scalar (e.g. atmospheric pressure).
    pub fn set_scalar(&mut self, name: &str, value: f64) {
        self.scalars.insert(name.to_string(), value);
    }

    /// A named global scalar.
    pub fn scalar(&self, name: &str) -> Result<f64, FieldError> {
        self.scalars
            .get(name)
            .copied()
            .ok_or_else(|| FieldError::UnknownField {
                key: name.to_string(),
            })
    }

    /// Set the gravity vector.
    pub fn set_gravity(&mut self, gravity: Point) {
        self.gravity = Some(gravity);
    }

    /// The gravity vector, if set.
    pub fn gravity(&self) -> Option<&Point> {
        self.gravity.as_ref()
    }

    // ── Fields ─────────────────────────────────────────────────────

    /// Declare a field, creating it on first request.
    ///
    /// Returns the field's shape declaration for the caller to extend. An
    /// `owner` claims write access; claiming a field already owned by
    /// someone else fails with [`FieldError::OwnerMismatch`].
    pub fn require_field(
        &mut self,
        key: &str,
        owner: Option<&str>,
    ) -> Result<&mut CompositeVectorSpace, FieldError> {
        let field = self
            .fields
            .entry(key.to_string())
            .or_insert_with(|| Field::new(key, owner));
        if let Some(owner) = owner {
            match field.owner() {
                None => field.set_owner(owner),
                Some(existing) if existing == owner => {}
                Some(existing) => {
                    return Err(FieldError::OwnerMismatch {
                        key: key.to_string(),
                        owner: Some(existing.to_string()),
                        requested_by: owner.to_string(),
                    });
                }
            }
        }
        Ok(field.space_mut())
    }

    /// Whether a field has been required.
    pub fn has_field(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Field metadata.
    pub fn field(&self, key: &str) -> Result<&Field, FieldError> {
        self.fields.get(key).ok_or_else(|| FieldError::UnknownField {
            key: key.to_string(),
        })
    }

    /// Keys of every field in declaration order.
    pub fn field_keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Read-only view of a field's current value.
    ///
    /// Does not refresh the value; use [`State::value`] or
    /// [`State::changed`] for evaluated fields.
    pub fn get_field_value(&self, key: &str) -> Result<&CompositeVector, FieldError> {
        self.field(key)?
            .data()
            .ok_or_else(|| FieldError::NotAllocated {
                key: key.to_string(),
            })
    }

    /// Mutable view of a field's value, for its owner only.
    pub fn get_mutable_field_value(
        &mut self,
        key: &str,
        owner: &str,
    ) -> Result<&mut CompositeVector, FieldError> {
        let field = self
            .fields
            .get_mut(key)
            .ok_or_else(|| FieldError::UnknownField {
                key: key.to_string(),
            })?;
        if field.owner() != Some(owner) {
            return Err(FieldError::OwnerMismatch {
                key: key.to_string(),
                owner: field.owner().map(str::to_string),
                requested_by: owner.to_string(),
            });
        }
        field.data_mut().ok_or_else(|| FieldError::NotAllocated {
            key: key.to_string(),
        })
    }

    /// Mark a field as holding a meaningful value.
    pub fn set_initialized(&mut self, key: &str) -> Result<(), FieldError> {
        self.field_mut(key)?.set_initialized(true);
        Ok(())
    }

    fn field_mut(&mut self, key: &str) -> Result<&mut Field, FieldError> {
        self.fields
            .get_mut(key)
            .ok_or_else(|| FieldError::UnknownField {
                key: key.to_string(),
            })
    }

    /// Run `f` with the field's storage moved out, then put it back.
    ///
    /// This is how evaluators write their own field while reading others
    /// through `&State`. The field is marked initialized on success.
    pub fn update_field_with<F>(&mut self, key: &str, f: F) -> Result<(), FieldError>
    where
        F: FnOnce(&State, &mut CompositeVector) -> Result<(), FieldError>,
    {
        let mut data = self
            .field_mut(key)?
            .take_data()
            .ok_or_else(|| FieldError::NotAllocated {
                key: key.to_string(),
            })?;
        let result = f(self, &mut data);
        let field = self.field_mut(key)?;
        field.set_data(data);
        if result.is_ok() {
            field.set_initialized(true);
        }
        result
    }

    /// Create (if needed) and allocate the field holding `∂key/∂wrt`,
    /// shaped like `key` and owned by it.
    pub fn ensure_derivative_field(&mut self, key: &str, wrt: &str) -> Result<Key, FieldError> {
        let dkey = derivative_key(key, wrt);
        if self.fields.get(&dkey).is_some_and(|f| f.data().is_some()) {
            return Ok(dkey);
        }
        let space = self.field(key)?.space().clone();
        self.require_field(&dkey, Some(key))?.merge(&space)?;
        let data = space.create(self.mesh.as_ref());
        self.field_mut(&dkey)?.set_data(data);
        Ok(dkey)
    }

    // ── Evaluators ─────────────────────────────────────────────────

    /// Register the evaluator for its key, declaring the field if needed.
    pub fn set_evaluator(&mut self, evaluator: Box<dyn FieldEvaluator>) -> Result<(), FieldError> {
        let key = evaluator.key().to_string();
        if self.evaluators.contains_key(&key) {
            return Err(FieldError::DuplicateEvaluator { key });
        }
        self.require_field(&key, None)?;
        self.evaluators.insert(key, Some(evaluator));
        Ok(())
    }

    /// Whether an evaluator is registered for `key`.
    pub fn has_evaluator(&self, key: &str) -> bool {
        self.evaluators.contains_key(key)
    }

    /// Check that `key` has a field and an evaluator.
    pub fn require_evaluator(&mut self, key: &str) -> Result<(), FieldError> {
        if !self.has_evaluator(key) {
            return Err(FieldError::MissingEvaluator {
                key: key.to_string(),
            });
        }
        self.require_field(key, None)?;
        Ok(())
    }

    /// The evaluator registered for `key`.
    pub fn get_evaluator(&self, key: &str) -> Result<&dyn FieldEvaluator, FieldError> {
        match self.evaluators.get(key) {
            Some(Some(e)) => Ok(e.as_ref()),
            Some(None) => Err(FieldError::CyclicDependency {
                cycle: vec![key.to_string(), key.to_string()],
            }),
            None => Err(FieldError::MissingEvaluator {
                key: key.to_string(),
            }),
        }
    }

    /// Keys with a registered evaluator, in registration order.
    pub fn evaluator_keys(&self) -> impl Iterator<Item = &str> {
        self.evaluators.keys().map(String::as_str)
    }

    /// Move the evaluator for `key` out of its slot, run `f`, put it back.
    ///
    /// Re-entering an evaluator that is already running means the graph
    /// has a cycle, which is reported rather than deadlocking.
    fn with_evaluator<R>(
        &mut self,
        key: &str,
        f: impl FnOnce(&mut dyn FieldEvaluator, &mut State) -> Result<R, FieldError>,
    ) -> Result<R, FieldError> {
        let slot = self
            .evaluators
            .get_mut(key)
            .ok_or_else(|| FieldError::MissingEvaluator {
                key: key.to_string(),
            })?;
        let mut evaluator = slot.take().ok_or_else(|| FieldError::CyclicDependency {
            cycle: vec![key.to_string(), key.to_string()],
        })?;
        let result = f(evaluator.as_mut(), self);
        if let Some(slot) = self.evaluators.get_mut(key) {
            *slot = Some(evaluator);
        }
        result
    }

    /// Whether `key` has been recomputed since `requester` last asked.
    ///
    /// Refreshes stale dependencies recursively; each evaluator recomputes
    /// at most once per change of its inputs regardless of how many
    /// requesters ask.
    pub fn changed(&mut self, key: &str, requester: &str) -> Result<bool, FieldError> {
        self.with_evaluator(key, |e, s| e.has_field_changed(s, requester))
    }

    /// Whether `∂key/∂wrt` has been recomputed since `requester` last asked.
    pub fn derivative_changed(
        &mut self,
        key: &str,
        requester: &str,
        wrt: &str,
    ) -> Result<bool, FieldError> {
        self.with_evaluator(key, |e, s| e.has_derivative_changed(s, requester, wrt))
    }

    /// Fresh value of an evaluated field.
    pub fn value(&mut self, key: &str) -> Result<&CompositeVector, FieldError> {
        self.changed(key, VALUE_REQUEST)?;
        self.get_field_value(key)
    }

    /// Fresh `∂key/∂wrt`.
    ///
    /// Fails with [`FieldError::UnsupportedDerivative`] if `key` does not
    /// depend on `wrt`.
    pub fn derivative(&mut self, key: &str, wrt: &str) -> Result<&CompositeVector, FieldError> {
        self.derivative_changed(key, VALUE_REQUEST, wrt)?;
        self.get_field_value(&derivative_key(key, wrt))
    }

    /// Notify dependents that an externally assigned primary variable
    /// changed.
    pub fn mark_primary_changed(&mut self, key: &str) -> Result<(), FieldError> {
        match self.evaluators.get_mut(key) {
            Some(Some(e)) => match e.as_primary_mut() {
                Some(primary) => {
                    primary.mark_changed();
                    Ok(())
                }
                None => Err(FieldError::NotPrimary {
                    key: key.to_string(),
                }),
            },
            Some(None) => Err(FieldError::CyclicDependency {
                cycle: vec![key.to_string(), key.to_string()],
            }),
            None => Err(FieldError::MissingEvaluator {
                key: key.to_string(),
            }),
        }
    }

    /// Keys whose evaluator is a primary variable.
    pub fn primary_keys(&self) -> Vec<Key> {
        self.evaluators
            .iter()
            .filter(|(_, e)| e.as_ref().is_some_and(|e| e.is_primary()))
            .map(|(k, _)| k.clone())
            .collect()
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Finish construction: let evaluators declare their dependencies'
    /// shapes, validate the dependency graph, and allocate storage.
    ///
    /// Safe to call again after more fields are required; existing data is
    /// kept for fields whose shape did not change.
    pub fn setup(&mut self) -> Result<EvaluationOrder, FieldError> {
        // 1. Shape declarations flow from evaluators to their dependencies.
        let keys: Vec<Key> = self.evaluators.keys().cloned().collect();
        for key in &keys {
            self.with_evaluator(key, |e, s| e.ensure_compatibility(s))?;
        }

        // 2. Every dependency resolves and the graph is acyclic.
        let order = validate_graph(self)?;

        // 3. Allocate.
        let mesh = Arc::clone(&self.mesh);
        for field in self.fields.values_mut() {
            if field.space().is_empty() {
                return Err(FieldError::ShapeMismatch {
                    reason: format!("field '{}' declares no components", field.key()),
                });
            }
            let fresh = field.space().create(mesh.as_ref());
            let keep = field.data().is_some_and(|d| d.same_shape(&fresh));
            if !keep {
                trace!(field = field.key(), "allocating");
                field.set_data(fresh);
            }
        }
        Ok(order)
    }

    /// Copy every allocated field value (and time/cycle) from `other`,
    /// then mark primary variables changed so dependents recompute.
    pub fn copy_data_from(&mut self, other: &State) -> Result<(), FieldError> {
        for (key, field) in self.fields.iter_mut() {
            let Some(src) = other.fields.get(key) else {
                continue;
            };
            if let (Some(dst), Some(src_data)) = (field.data_mut(), src.data()) {
                dst.copy_from(src_data)?;
            }
            field.set_initialized(src.initialized());
        }
        self.time = other.time;
        self.cycle = other.cycle;
        for key in self.primary_keys() {
            self.mark_primary_changed(&key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primary::PrimaryVariableEvaluator;
    use vadose_core::{EntityKind, CELL};
    use vadose_mesh::StructuredMesh;

    fn state() -> State {
        State::new(Arc::new(StructuredMesh::line(4, 1.0).unwrap()))
    }

    #[test]
    fn owner_is_exclusive() {
        let mut s = state();
        s.require_field("pressure", Some("flow")).unwrap();
        s.require_field("pressure", None).unwrap();
        let err = s.require_field("pressure", Some("energy")).unwrap_err();
        assert!(matches!(err, FieldError::OwnerMismatch { .. }));
    }

    #[test]
    fn mutable_access_checks_owner() {
        let mut s = state();
        s.require_field("pressure", Some("flow"))
            .unwrap()
            .add_component(CELL, EntityKind::Cell, 1)
            .unwrap();
        s.setup().unwrap();
        assert!(s.get_mutable_field_value("pressure", "flow").is_ok());
        assert!(matches!(
            s.get_mutable_field_value("pressure", "energy"),
            Err(FieldError::OwnerMismatch { .. })
        ));
    }

    #[test]
    fn unallocated_and_unknown_fields() {
        let mut s = state();
        assert!(matches!(
            s.get_field_value("nothing"),
            Err(FieldError::UnknownField { .. })
        ));
        s.require_field("pressure", Some("flow"))
            .unwrap()
            .add_component(CELL, EntityKind::Cell, 1)
            .unwrap();
        assert!(matches!(
            s.get_field_value("pressure"),
            Err(FieldError::NotAllocated { .. })
        ));
    }

    #[test]
    fn field_without_components_fails_setup() {
        let mut s = state();
        s.require_field("empty", None).unwrap();
        assert!(matches!(s.setup(), Err(FieldError::ShapeMismatch { .. })));
    }

    #[test]
    fn duplicate_evaluator_rejected() {
        let mut s = state();
        s.set_evaluator(Box::new(PrimaryVariableEvaluator::new("pressure")))
            .unwrap();
        let err = s
            .set_evaluator(Box::new(PrimaryVariableEvaluator::new("pressure")))
            .unwrap_err();
        assert_eq!(
            err,
            FieldError::DuplicateEvaluator {
                key: "pressure".into()
            }
        );
    }

    #[test]
    fn require_evaluator_reports_missing() {
        let mut s = state();
        assert_eq!(
            s.require_evaluator("porosity").unwrap_err(),
            FieldError::MissingEvaluator {
                key: "porosity".into()
            }
        );
    }

    #[test]
    fn scalars_and_gravity() {
        let mut s = state();
        assert!(s.scalar("atmospheric_pressure").is_err());
        s.set_scalar("atmospheric_pressure", 101325.0);
        assert_eq!(s.scalar("atmospheric_pressure").unwrap(), 101325.0);
        s.set_gravity([-9.8].into_iter().collect());
        assert_eq!(s.gravity().unwrap().as_slice(), &[-9.8]);
    }
}
