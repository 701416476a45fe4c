//! Initial pressure fields.

use serde::{Deserialize, Serialize};
use vadose_core::{ConfigError, FieldError, Ownership};
use vadose_mesh::Mesh;

/// How the initial cell pressures are set.
///
/// ```json
/// { "type": "hydrostatic", "reference_pressure": 101325.0, "reference_elevation": 2.0 }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InitialCondition {
    /// The same pressure in every cell.
    Uniform {
        /// Pressure, Pa.
        pressure: f64,
    },
    /// One pressure per owned cell.
    CellValues {
        /// Pressures in cell order.
        values: Vec<f64>,
    },
    /// Hydrostatic equilibrium through a reference point on the last axis:
    /// `p = p_ref + ρ g_z (z - z_ref)`.
    Hydrostatic {
        /// Pressure at the reference elevation.
        reference_pressure: f64,
        /// Elevation (last coordinate) of the reference pressure.
        reference_elevation: f64,
    },
}

impl InitialCondition {
    /// Check values that do not need the mesh.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = match self {
            Self::Uniform { pressure } => pressure.is_finite(),
            Self::CellValues { values } => values.iter().all(|v| v.is_finite()),
            Self::Hydrostatic {
                reference_pressure,
                reference_elevation,
            } => reference_pressure.is_finite() && reference_elevation.is_finite(),
        };
        if finite {
            Ok(())
        } else {
            Err(ConfigError::InvalidParameter {
                context: "initial condition".into(),
                name: "pressure".into(),
                reason: "values must be finite".into(),
            })
        }
    }

    /// Check the cell count of explicit values.
    pub fn validate_for_mesh(&self, mesh: &dyn Mesh) -> Result<(), ConfigError> {
        match self {
            Self::CellValues { values } if values.len() != mesh.num_cells() => {
                Err(ConfigError::InvalidParameter {
                    context: "initial condition".into(),
                    name: "values".into(),
                    reason: format!("{} values for {} cells", values.len(), mesh.num_cells()),
                })
            }
            _ => Ok(()),
        }
    }

    /// Cell pressures on `mesh` with liquid density `rho` and gravity `g`.
    pub fn cell_pressures(
        &self,
        mesh: &dyn Mesh,
        rho: f64,
        gravity: &[f64],
    ) -> Result<Vec<f64>, ConfigError> {
        self.validate_for_mesh(mesh)?;
        let n = mesh.num_cells();
        Ok(match self {
            Self::Uniform { pressure } => vec![*pressure; n],
            Self::CellValues { values } => values.clone(),
            Self::Hydrostatic {
                reference_pressure,
                reference_elevation,
            } => {
                let gz = gravity.last().copied().unwrap_or(0.0);
                (0..n)
                    .map(|c| {
                        let z = mesh.cell_centroid(c).last().copied().unwrap_or(0.0);
                        reference_pressure + rho * gz * (z - reference_elevation)
                    })
                    .collect()
            }
        })
    }
}

/// Face values consistent with cell values: the mean of the two adjacent
/// cells on interior faces, the single adjacent cell on boundary faces.
pub fn face_values_from_cells(mesh: &dyn Mesh, cells: &[f64]) -> Result<Vec<f64>, FieldError> {
    if cells.len() != mesh.num_cells() {
        return Err(FieldError::ShapeMismatch {
            reason: format!("{} cell values for {} cells", cells.len(), mesh.num_cells()),
        });
    }
    (0..mesh.num_faces())
        .map(|f| {
            let adj = mesh.face_get_cells(f, Ownership::Used);
            match adj.as_slice() {
                [c] => Ok(cells[*c]),
                [c0, c1] => Ok(0.5 * (cells[*c0] + cells[*c1])),
                _ => Err(FieldError::ShapeMismatch {
                    reason: format!("face {f} has {} adjacent cells", adj.len()),
                }),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vadose_mesh::StructuredMesh;

    #[test]
    fn three_cell_faces_take_means_and_boundary_cells() {
        let mesh = StructuredMesh::line(3, 3.0).unwrap();
        let faces = face_values_from_cells(&mesh, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(faces, vec![1.0, 1.5, 2.5, 3.0]);
    }

    #[test]
    fn hydrostatic_increases_with_depth() {
        let mesh = StructuredMesh::rectangle(1, 4, 1.0, 4.0).unwrap();
        let ic = InitialCondition::Hydrostatic {
            reference_pressure: 100.0,
            reference_elevation: 4.0,
        };
        let p = ic.cell_pressures(&mesh, 1000.0, &[0.0, -10.0]).unwrap();
        // Cell centers at z = 0.5, 1.5, 2.5, 3.5.
        let expected = [35100.0, 25100.0, 15100.0, 5100.0];
        for (p, e) in p.iter().zip(expected) {
            assert!((p - e).abs() < 1e-9, "{p} vs {e}");
        }
    }

    #[test]
    fn cell_values_must_match_the_mesh() {
        let mesh = StructuredMesh::line(3, 3.0).unwrap();
        let ic = InitialCondition::CellValues {
            values: vec![1.0, 2.0],
        };
        assert!(ic.cell_pressures(&mesh, 1.0, &[0.0]).is_err());
        let ic: InitialCondition =
            serde_json::from_str(r#"{"type": "cell_values", "values": [1, 2, 3]}"#).unwrap();
        assert_eq!(ic.cell_pressures(&mesh, 1.0, &[0.0]).unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let ic = InitialCondition::Uniform {
            pressure: f64::NAN,
        };
        assert!(ic.validate().is_err());
    }
}
