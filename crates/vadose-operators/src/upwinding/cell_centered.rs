use vadose_core::FieldError;
use vadose_state::State;

use super::{upwind_faces, UpwindFields, Upwinding};

/// Face value is the value of the face's first cell, regardless of flow
/// direction. Operators built on it use cell coefficients and stay
/// symmetric.
#[derive(Clone, Debug)]
pub struct CellCentered {
    fields: UpwindFields,
}

impl CellCentered {
    /// Strategy writing `fields.face_coef`.
    pub fn new(fields: UpwindFields) -> Self {
        Self { fields }
    }
}

impl Upwinding for CellCentered {
    fn name(&self) -> &'static str {
        "cell centered"
    }

    fn is_symmetric(&self) -> bool {
        true
    }

    fn update(&self, s: &mut State) -> Result<(), FieldError> {
        upwind_faces(s, &self.fields, |_, _, _, k0, _| k0)
    }
}
