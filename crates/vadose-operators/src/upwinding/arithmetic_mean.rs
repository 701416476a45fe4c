use vadose_core::FieldError;
use vadose_state::State;

use super::{upwind_faces, UpwindFields, Upwinding};

/// Face value is the average of its two cells.
#[derive(Clone, Debug)]
pub struct ArithmeticMean {
    fields: UpwindFields,
}

impl ArithmeticMean {
    /// Strategy writing `fields.face_coef`.
    pub fn new(fields: UpwindFields) -> Self {
        Self { fields }
    }
}

impl Upwinding for ArithmeticMean {
    fn name(&self) -> &'static str {
        "arithmetic mean"
    }

    fn update(&self, s: &mut State) -> Result<(), FieldError> {
        upwind_faces(s, &self.fields, |_, _, _, k0, k1| 0.5 * (k0 + k1))
    }
}
