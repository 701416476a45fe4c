//! Rain on a dry column: water enters through the top face at a fixed
//! rate and the wetting front moves down.
//!
//! Run with `cargo run -p vadose --example infiltration`.

use std::sync::Arc;

use vadose::prelude::*;

const CONFIG: &str = r#"{
    "relative_permeability_method": "upwind with gravity",
    "water_retention_model": { "type": "van Genuchten", "alpha": 5e-4, "n": 1.8, "residual_saturation": 0.05 },
    "porosity": 0.35,
    "permeability": 5e-12,
    "initial_condition": { "type": "uniform", "pressure": 7.0e4 },
    "boundary_conditions": {
        "mass_flux": [
            { "regions": ["xmax"], "function": { "type": "tabular", "times": [0.0, 3600.0, 3601.0], "values": [-0.01, -0.01, 0.0] } }
        ]
    },
    "initial_time_step": 10.0,
    "time_integrator": { "max_time_step": 600.0 }
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Column of 2 m, top at x = 2 m, gravity pointing to -x.
    let mesh: Arc<dyn Mesh> = Arc::new(StructuredMesh::line(40, 2.0)?);
    let config = RichardsConfig::from_json_str(CONFIG)?;
    let mut richards = Richards::new(Arc::clone(&mesh), &config, &flow_registry())?;
    richards.initialize(0.0)?;

    for t_end in [1800.0, 3600.0, 7200.0] {
        let reports = richards.run_until(t_end)?;
        let s = richards.state();
        let p = s.get_field_value("pressure")?.view(CELL)?;
        let top = p[p.len() - 1];
        let bottom = p[0];
        println!(
            "t = {:>6.0} s  steps = {:>3}  top p = {:>9.1} Pa  bottom p = {:>9.1} Pa",
            richards.time(),
            reports.len(),
            top,
            bottom
        );
    }

    let stats = richards.stats();
    println!(
        "accepted {} steps, {} failed attempts, {} nonlinear iterations",
        stats.accepted_steps, stats.failed_attempts, stats.nonlinear_iterations
    );
    Ok(())
}
