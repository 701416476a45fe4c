//! Pressure and mass-flux boundary conditions.
//!
//! Conditions are declared on named mesh regions or explicit face lists
//! and resolved to face ids once, at setup. Each evaluation fills a
//! [`BoundaryData`] for the operator at the requested time.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use vadose_core::ConfigError;
use vadose_mesh::Mesh;
use vadose_operators::BoundaryData;

use crate::functions::TimeFunction;

/// One boundary set: where, and what value over time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundarySpec {
    /// Named mesh regions.
    #[serde(default)]
    pub regions: Vec<String>,
    /// Explicit face ids.
    #[serde(default)]
    pub faces: Vec<usize>,
    /// Value on every face of the set.
    pub function: TimeFunction,
}

/// Boundary-condition section of the flow configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConditionsConfig {
    /// Prescribed face pressures.
    pub pressure: Vec<BoundarySpec>,
    /// Prescribed outward molar flux densities.
    pub mass_flux: Vec<BoundarySpec>,
}

#[derive(Clone, Debug)]
struct ResolvedSet {
    faces: Vec<usize>,
    function: TimeFunction,
}

/// Boundary conditions resolved against a mesh.
#[derive(Clone, Debug)]
pub struct BoundaryFunctions {
    pressure: Vec<ResolvedSet>,
    flux: Vec<ResolvedSet>,
    num_faces: usize,
}

impl BoundaryFunctions {
    /// Resolve `config` on `mesh`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MalformedBoundaryCondition`] for an unknown region, a
    /// face id that is out of range or not on the boundary, a set with no
    /// faces, or a face carrying both a pressure and a flux condition.
    pub fn new(mesh: &dyn Mesh, config: &BoundaryConditionsConfig) -> Result<Self, ConfigError> {
        let pressure = resolve(mesh, "pressure", &config.pressure)?;
        let flux = resolve(mesh, "mass_flux", &config.mass_flux)?;

        let dirichlet: BTreeSet<usize> = pressure.iter().flat_map(|s| s.faces.clone()).collect();
        if let Some(f) = flux.iter().flat_map(|s| s.faces.iter()).find(|f| dirichlet.contains(f)) {
            return Err(ConfigError::MalformedBoundaryCondition {
                reason: format!("face {f} has both a pressure and a mass_flux condition"),
            });
        }

        Ok(Self {
            pressure,
            flux,
            num_faces: mesh.num_faces(),
        })
    }

    /// No conditions: every boundary face is no-flow.
    pub fn none(mesh: &dyn Mesh) -> Self {
        Self {
            pressure: Vec::new(),
            flux: Vec::new(),
            num_faces: mesh.num_faces(),
        }
    }

    /// Write markers and values at time `t` into `bc`, replacing its
    /// previous contents.
    pub fn compute(&self, t: f64, bc: &mut BoundaryData) {
        bc.clear();
        for set in &self.pressure {
            let v = set.function.value(t);
            for &f in &set.faces {
                bc.set_dirichlet(f, v);
            }
        }
        for set in &self.flux {
            let v = set.function.value(t);
            for &f in &set.faces {
                bc.set_flux(f, v);
            }
        }
    }

    /// Fresh boundary data evaluated at `t`.
    pub fn evaluate(&self, t: f64) -> BoundaryData {
        let mut bc = BoundaryData::new(self.num_faces);
        self.compute(t, &mut bc);
        bc
    }

    /// Whether no condition is declared.
    pub fn is_empty(&self) -> bool {
        self.pressure.is_empty() && self.flux.is_empty()
    }
}

fn resolve(
    mesh: &dyn Mesh,
    kind: &str,
    specs: &[BoundarySpec],
) -> Result<Vec<ResolvedSet>, ConfigError> {
    let malformed = |reason: String| ConfigError::MalformedBoundaryCondition { reason };
    let mut out = Vec::with_capacity(specs.len());
    for (i, spec) in specs.iter().enumerate() {
        spec.function.validate()?;

        let mut faces = BTreeSet::new();
        for region in &spec.regions {
            let in_region = mesh.region_faces(region).ok_or_else(|| {
                malformed(format!(
                    "{kind}[{i}]: unknown region '{region}' (known: {})",
                    mesh.region_names().join(", ")
                ))
            })?;
            faces.extend(in_region);
        }
        for &f in &spec.faces {
            if f >= mesh.num_faces() {
                return Err(malformed(format!(
                    "{kind}[{i}]: face {f} out of range (mesh has {} faces)",
                    mesh.num_faces()
                )));
            }
            faces.insert(f);
        }
        if faces.is_empty() {
            return Err(malformed(format!("{kind}[{i}]: no faces selected")));
        }
        if let Some(f) = faces.iter().find(|&&f| !mesh.is_boundary_face(f)) {
            return Err(malformed(format!("{kind}[{i}]: face {f} is not a boundary face")));
        }

        out.push(ResolvedSet {
            faces: faces.into_iter().collect(),
            function: spec.function.clone(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vadose_mesh::StructuredMesh;
    use vadose_operators::BcMarker;

    fn constant(value: f64) -> TimeFunction {
        TimeFunction::Constant { value }
    }

    fn on_region(region: &str, value: f64) -> BoundarySpec {
        BoundarySpec {
            regions: vec![region.into()],
            faces: vec![],
            function: constant(value),
        }
    }

    #[test]
    fn regions_resolve_to_boundary_faces() {
        let mesh = StructuredMesh::line(3, 3.0).unwrap();
        let config = BoundaryConditionsConfig {
            pressure: vec![on_region("xmin", 2.0)],
            mass_flux: vec![on_region("xmax", -0.5)],
        };
        let bcs = BoundaryFunctions::new(&mesh, &config).unwrap();
        let bc = bcs.evaluate(0.0);
        assert_eq!(
            bc.markers(),
            &[BcMarker::Dirichlet, BcMarker::Unset, BcMarker::Unset, BcMarker::Flux]
        );
        assert_eq!(bc.values(), &[2.0, 0.0, 0.0, -0.5]);
    }

    #[test]
    fn values_follow_the_time_function() {
        let mesh = StructuredMesh::line(2, 2.0).unwrap();
        let config = BoundaryConditionsConfig {
            pressure: vec![BoundarySpec {
                regions: vec![],
                faces: vec![0],
                function: TimeFunction::Linear {
                    value: 1.0,
                    slope: 2.0,
                    t0: 0.0,
                },
            }],
            mass_flux: vec![],
        };
        let bcs = BoundaryFunctions::new(&mesh, &config).unwrap();
        assert_eq!(bcs.evaluate(0.0).values()[0], 1.0);
        assert_eq!(bcs.evaluate(3.0).values()[0], 7.0);
    }

    #[test]
    fn interior_face_is_malformed() {
        let mesh = StructuredMesh::line(3, 3.0).unwrap();
        let config = BoundaryConditionsConfig {
            pressure: vec![BoundarySpec {
                regions: vec![],
                faces: vec![1],
                function: constant(0.0),
            }],
            mass_flux: vec![],
        };
        let err = BoundaryFunctions::new(&mesh, &config).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedBoundaryCondition { .. }));
    }

    #[test]
    fn unknown_region_and_empty_sets_are_malformed() {
        let mesh = StructuredMesh::line(3, 3.0).unwrap();
        for spec in [
            on_region("top", 0.0),
            BoundarySpec {
                regions: vec![],
                faces: vec![],
                function: constant(0.0),
            },
            BoundarySpec {
                regions: vec![],
                faces: vec![17],
                function: constant(0.0),
            },
        ] {
            let config = BoundaryConditionsConfig {
                pressure: vec![spec],
                mass_flux: vec![],
            };
            let err = BoundaryFunctions::new(&mesh, &config).unwrap_err();
            assert!(matches!(err, ConfigError::MalformedBoundaryCondition { .. }), "{err}");
        }
    }

    #[test]
    fn face_in_both_sets_is_malformed() {
        let mesh = StructuredMesh::line(3, 3.0).unwrap();
        let config = BoundaryConditionsConfig {
            pressure: vec![on_region("xmax", 1.0)],
            mass_flux: vec![BoundarySpec {
                regions: vec![],
                faces: vec![3],
                function: constant(0.0),
            }],
        };
        let err = BoundaryFunctions::new(&mesh, &config).unwrap_err();
        match err {
            ConfigError::MalformedBoundaryCondition { reason } => assert!(reason.contains("face 3")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
