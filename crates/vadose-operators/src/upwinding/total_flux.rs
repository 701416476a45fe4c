use vadose_core::{FieldError, Key, FACE};
use vadose_state::State;

use super::{upwind_faces, UpwindFields, Upwinding};

/// Face value is the upstream cell's value, upstream being decided by the
/// sign of a face flux field (positive along the face normal).
///
/// The flux is read as stored, i.e. from the last time it was derived;
/// it is not recomputed inside a nonlinear iteration.
#[derive(Clone, Debug)]
pub struct UpwindTotalFlux {
    fields: UpwindFields,
    flux: Key,
    tolerance: f64,
}

impl UpwindTotalFlux {
    /// Strategy reading face fluxes from `flux`. Fluxes with magnitude
    /// below `tolerance` use the arithmetic mean.
    pub fn new(fields: UpwindFields, flux: Key, tolerance: f64) -> Self {
        Self {
            fields,
            flux,
            tolerance,
        }
    }
}

impl Upwinding for UpwindTotalFlux {
    fn name(&self) -> &'static str {
        "upwind with Darcy flux"
    }

    fn update(&self, s: &mut State) -> Result<(), FieldError> {
        let flux = s.get_field_value(&self.flux)?.view(FACE)?.to_vec();
        let tol = self.tolerance;
        upwind_faces(s, &self.fields, |f, _, _, k0, k1| {
            let q = flux[f];
            if q.abs() <= tol {
                0.5 * (k0 + k1)
            } else if q > 0.0 {
                k0
            } else {
                k1
            }
        })
    }
}
