//! Upwinding: face values of a cell-centered nonlinear coefficient.
//!
//! Every strategy reads the cell component of a coefficient field,
//! copies it into the cell component of the output field and fills the
//! output's face component. Boundary faces always take the value of
//! their single adjacent cell.

mod arithmetic_mean;
mod cell_centered;
mod gravity_flux;
mod total_flux;

pub use arithmetic_mean::ArithmeticMean;
pub use cell_centered::CellCentered;
pub use gravity_flux::UpwindGravityFlux;
pub use total_flux::UpwindTotalFlux;

use std::fmt;

use vadose_core::{ConfigError, FieldError, Key, Ownership, Point, CELL, FACE};
use vadose_mesh::Mesh;
use vadose_state::State;

/// Fields an upwinding strategy reads and writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpwindFields {
    /// Evaluated cell coefficient (e.g. relative permeability).
    pub cell_coef: Key,
    /// Output field with cell and face components.
    pub face_coef: Key,
    /// Owner of the output field.
    pub owner: String,
}

/// Produces face values from cell values and the local flow direction.
pub trait Upwinding: fmt::Debug + Send + Sync {
    /// Configuration name of the strategy.
    fn name(&self) -> &'static str;

    /// Whether the operator built from the result must use cell
    /// coefficients to stay symmetric.
    fn is_symmetric(&self) -> bool {
        false
    }

    /// Refresh the cell coefficient and write the output field.
    fn update(&self, s: &mut State) -> Result<(), FieldError>;
}

/// Strategy names accepted by [`create_upwinding`].
pub const UPWIND_METHODS: [&str; 4] = [
    "cell centered",
    "arithmetic mean",
    "upwind with Darcy flux",
    "upwind with gravity",
];

/// Parameters needed by the direction-aware strategies.
#[derive(Clone, Debug)]
pub struct UpwindParams {
    /// Face flux field for `"upwind with Darcy flux"`.
    pub flux: Key,
    /// Permeability field (1 or `dim` dofs per cell) for
    /// `"upwind with gravity"`.
    pub permeability: Key,
    /// Gravity vector for `"upwind with gravity"`.
    pub gravity: Point,
    /// Directional quantities smaller than this fall back to the mean.
    pub tolerance: f64,
}

/// Build the strategy registered under `name`.
pub fn create_upwinding(
    name: &str,
    fields: UpwindFields,
    params: UpwindParams,
) -> Result<Box<dyn Upwinding>, ConfigError> {
    match name {
        "cell centered" => Ok(Box::new(CellCentered::new(fields))),
        "arithmetic mean" => Ok(Box::new(ArithmeticMean::new(fields))),
        "upwind with Darcy flux" => Ok(Box::new(UpwindTotalFlux::new(
            fields,
            params.flux,
            params.tolerance,
        ))),
        "upwind with gravity" => Ok(Box::new(UpwindGravityFlux::new(
            fields,
            params.permeability,
            params.gravity,
            params.tolerance,
        ))),
        other => Err(ConfigError::UnknownStrategy {
            kind: "upwinding method",
            name: other.to_string(),
            known: UPWIND_METHODS.iter().map(|s| s.to_string()).collect(),
        }),
    }
}

/// Shared driver: refresh the cell coefficient, copy it, then fill every
/// face. `interior(face, c0, c1, k0, k1)` decides interior faces, where
/// the face normal points from `c0` into `c1`.
pub(crate) fn upwind_faces<F>(
    s: &mut State,
    fields: &UpwindFields,
    mut interior: F,
) -> Result<(), FieldError>
where
    F: FnMut(usize, usize, usize, f64, f64) -> f64,
{
    let cells = s.value(&fields.cell_coef)?.view(CELL)?.to_vec();
    let mesh = s.mesh_arc();
    let faces = (0..mesh.num_faces())
        .map(|f| face_value(mesh.as_ref(), &cells, f, &mut interior))
        .collect::<Result<Vec<_>, _>>()?;

    let out = s.get_mutable_field_value(&fields.face_coef, &fields.owner)?;
    out.view_mut(CELL)?.copy_from_slice(&cells);
    out.view_mut(FACE)?.copy_from_slice(&faces);
    s.set_initialized(&fields.face_coef)
}

fn face_value<F>(mesh: &dyn Mesh, cells: &[f64], f: usize, interior: &mut F) -> Result<f64, FieldError>
where
    F: FnMut(usize, usize, usize, f64, f64) -> f64,
{
    let adj = mesh.face_get_cells(f, Ownership::Used);
    match adj.as_slice() {
        [c] => Ok(cells[*c]),
        [c0, c1] => Ok(interior(f, *c0, *c1, cells[*c0], cells[*c1])),
        _ => Err(FieldError::ShapeMismatch {
            reason: format!("face {f} has {} adjacent cells", adj.len()),
        }),
    }
}
