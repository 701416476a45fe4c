//! Benchmark profiles for the vadose flow solver.
//!
//! - [`column_profile`]: a 1D column draining under gravity
//! - [`slab_profile`]: a 2D slab wetted through part of its top face

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use serde_json::json;
use vadose_core::ConfigError;
use vadose_flow::{BoundarySpec, InitialCondition, RichardsConfig, TimeFunction};
use vadose_mesh::{Mesh, MeshError, StructuredMesh};
use vadose_state::EvaluatorSpec;

/// Sandy loam van Genuchten parameters.
fn sandy_loam(cfg: &mut RichardsConfig) {
    cfg.water_retention_model = EvaluatorSpec::new("van Genuchten")
        .with("alpha", json!(7.5e-4))
        .with("n", json!(1.89))
        .with("residual_saturation", json!(0.065));
    cfg.porosity = 0.41;
    cfg.permeability = 1.2e-12;
}

/// A 10 m column of `cells` cells in hydrostatic equilibrium with a water
/// table at 2 m, gravity along the column.
pub fn column_profile(cells: usize) -> Result<(Arc<dyn Mesh>, RichardsConfig), MeshError> {
    let mesh: Arc<dyn Mesh> = Arc::new(StructuredMesh::line(cells, 10.0)?);
    let mut cfg = RichardsConfig::new(InitialCondition::Hydrostatic {
        reference_pressure: 101325.0,
        reference_elevation: 2.0,
    });
    sandy_loam(&mut cfg);
    cfg.initial_time_step = Some(60.0);
    Ok((mesh, cfg))
}

/// An `nx × ny` slab of 4 m × 2 m, initially dry, with a constant inflow
/// through the top boundary.
pub fn slab_profile(nx: usize, ny: usize) -> Result<(Arc<dyn Mesh>, RichardsConfig), MeshError> {
    let mesh: Arc<dyn Mesh> = Arc::new(StructuredMesh::rectangle(nx, ny, 4.0, 2.0)?);
    let mut cfg = RichardsConfig::new(InitialCondition::Uniform { pressure: 8.0e4 });
    sandy_loam(&mut cfg);
    cfg.boundary_conditions.mass_flux = vec![BoundarySpec {
        regions: vec!["ymax".into()],
        faces: vec![],
        function: TimeFunction::Constant { value: -0.005 },
    }];
    cfg.initial_time_step = Some(10.0);
    Ok((mesh, cfg))
}

/// Check a profile the way the kernel would at setup.
pub fn validate_profile(mesh: &dyn Mesh, cfg: &RichardsConfig) -> Result<(), ConfigError> {
    cfg.validate()?;
    cfg.validate_for_mesh(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_profile_validates() {
        let (mesh, cfg) = column_profile(100).unwrap();
        validate_profile(mesh.as_ref(), &cfg).unwrap();
        assert_eq!(mesh.num_cells(), 100);
    }

    #[test]
    fn slab_profile_validates() {
        let (mesh, cfg) = slab_profile(20, 10).unwrap();
        validate_profile(mesh.as_ref(), &cfg).unwrap();
        assert_eq!(mesh.num_cells(), 200);
    }
}
