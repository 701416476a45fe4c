use vadose_core::{FieldError, Key, Point, Tensor, CELL};
use vadose_state::State;

use super::{upwind_faces, UpwindFields, Upwinding};

/// Face value is the upstream cell's value, upstream being the side the
/// gravity-driven flux `K g · n` comes from.
///
/// Faces with no gravity component along their normal (vertical walls)
/// use the arithmetic mean.
#[derive(Clone, Debug)]
pub struct UpwindGravityFlux {
    fields: UpwindFields,
    permeability: Key,
    gravity: Point,
    tolerance: f64,
}

impl UpwindGravityFlux {
    /// Strategy reading cell permeabilities from `permeability`.
    pub fn new(fields: UpwindFields, permeability: Key, gravity: Point, tolerance: f64) -> Self {
        Self {
            fields,
            permeability,
            gravity,
            tolerance,
        }
    }
}

impl Upwinding for UpwindGravityFlux {
    fn name(&self) -> &'static str {
        "upwind with gravity"
    }

    fn update(&self, s: &mut State) -> Result<(), FieldError> {
        let mesh = s.mesh_arc();
        let dim = mesh.space_dimension();
        if self.gravity.len() != dim {
            return Err(FieldError::ShapeMismatch {
                reason: format!("gravity has {} components in {dim} dimensions", self.gravity.len()),
            });
        }
        let perm = s.value(&self.permeability)?;
        let dofs = perm.num_dofs(CELL)?;
        let values = perm.view(CELL)?;
        let tensors = values
            .chunks(dofs)
            .map(|k| Tensor::from_dofs(k, dim))
            .collect::<Result<Vec<_>, _>>()?;

        let gravity = &self.gravity;
        let gnorm = gravity.iter().map(|g| g * g).sum::<f64>().sqrt();
        let tol = self.tolerance;
        upwind_faces(s, &self.fields, |f, c0, c1, k0, k1| {
            let n = mesh.face_normal(f);
            let kg0 = tensors[c0].apply(gravity);
            let kg1 = tensors[c1].apply(gravity);
            let drive: f64 = n
                .iter()
                .zip(kg0.iter().zip(kg1.iter()))
                .map(|(n, (a, b))| n * 0.5 * (a + b))
                .sum();
            let scale = (tensors[c0].trace().abs() * gnorm).max(f64::MIN_POSITIVE);
            if drive.abs() <= tol * scale {
                0.5 * (k0 + k1)
            } else if drive > 0.0 {
                k0
            } else {
                k1
            }
        })
    }
}
