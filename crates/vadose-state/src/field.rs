//! A named field in the store.

use vadose_core::{CompositeVector, CompositeVectorSpace, Key};

/// A named, spatially distributed quantity.
///
/// Created on the first `require_field` and never removed. Storage is
/// allocated by `State::setup` from the declared [`CompositeVectorSpace`].
#[derive(Clone, Debug)]
pub struct Field {
    key: Key,
    owner: Option<String>,
    space: CompositeVectorSpace,
    data: Option<CompositeVector>,
    initialized: bool,
}

impl Field {
    pub(crate) fn new(key: &str, owner: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            owner: owner.map(str::to_string),
            space: CompositeVectorSpace::new(),
            data: None,
            initialized: false,
        }
    }

    /// Field key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Name of whoever may write the field directly, if anyone.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Declared shape.
    pub fn space(&self) -> &CompositeVectorSpace {
        &self.space
    }

    /// Allocated data, if any.
    pub fn data(&self) -> Option<&CompositeVector> {
        self.data.as_ref()
    }

    /// Whether the value has been set, by an initial condition or an
    /// evaluator.
    pub fn initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn set_owner(&mut self, owner: &str) {
        self.owner = Some(owner.to_string());
    }

    pub(crate) fn space_mut(&mut self) -> &mut CompositeVectorSpace {
        &mut self.space
    }

    pub(crate) fn data_mut(&mut self) -> Option<&mut CompositeVector> {
        self.data.as_mut()
    }

    pub(crate) fn take_data(&mut self) -> Option<CompositeVector> {
        self.data.take()
    }

    pub(crate) fn set_data(&mut self, data: CompositeVector) {
        self.data = Some(data);
    }

    pub(crate) fn set_initialized(&mut self, initialized: bool) {
        self.initialized = initialized;
    }
}
