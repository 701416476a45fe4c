//! Richards kernel configuration.
//!
//! Parsed from JSON with [`RichardsConfig::from_json_str`]. Absent keys
//! take the documented defaults; named strategies are plain strings
//! resolved at setup, so an unknown name surfaces as
//! [`ConfigError::UnknownStrategy`] rather than a parse error.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use vadose_core::ConfigError;
use vadose_mesh::Mesh;
use vadose_operators::{LINEAR_SOLVERS, UPWIND_METHODS};
use vadose_state::EvaluatorSpec;
use vadose_time::Bdf1Config;

use crate::bc::BoundaryConditionsConfig;
use crate::initial::InitialCondition;

/// Standard gravitational acceleration, m/s².
pub const STANDARD_GRAVITY: f64 = 9.80665;

fn default_rel_perm_method() -> String {
    "upwind with gravity".into()
}
fn default_one() -> f64 {
    1.0
}
fn default_atmospheric_pressure() -> f64 {
    101325.0
}
fn default_porosity() -> f64 {
    0.25
}
fn default_molar_density() -> f64 {
    55000.0
}
fn default_mass_density() -> f64 {
    1000.0
}
fn default_viscosity() -> f64 {
    8.9e-4
}
fn default_permeability() -> f64 {
    1e-12
}
fn default_upwind_tolerance() -> f64 {
    1e-12
}
fn default_wrm() -> EvaluatorSpec {
    EvaluatorSpec::new("van Genuchten")
        .with("alpha", json!(1e-4))
        .with("n", json!(2.0))
        .with("residual_saturation", json!(0.0))
}

/// Settings of one MFD operator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    /// Linear solver used when the operator is inverted.
    pub linear_solver: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            linear_solver: "dense lu".into(),
        }
    }
}

/// Configuration of the Richards process kernel.
///
/// ```json
/// {
///   "relative_permeability_method": "upwind with gravity",
///   "water_retention_model": { "type": "van Genuchten", "alpha": 1e-4, "n": 2.0 },
///   "initial_condition": { "type": "uniform", "pressure": 101325.0 },
///   "boundary_conditions": {
///     "pressure": [{ "regions": ["xmin"], "function": { "type": "constant", "value": 9e4 } }]
///   }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RichardsConfig {
    /// Upwinding strategy for the relative permeability.
    #[serde(default = "default_rel_perm_method")]
    pub relative_permeability_method: String,
    /// Absolute part of the error norm denominator.
    #[serde(default = "default_one")]
    pub absolute_error_tolerance: f64,
    /// Relative part of the error norm denominator.
    #[serde(default = "default_one")]
    pub relative_error_tolerance: f64,
    /// First step size; overrides `time_integrator.initial_time_step`.
    #[serde(default)]
    pub initial_time_step: Option<f64>,
    /// Reference pressure for capillary pressure, Pa.
    #[serde(default = "default_atmospheric_pressure")]
    pub atmospheric_pressure: f64,
    /// Gravity vector; defaults to `-9.80665` along the last mesh axis.
    #[serde(default)]
    pub gravity: Option<Vec<f64>>,
    /// Porosity, uniform.
    #[serde(default = "default_porosity")]
    pub porosity: f64,
    /// Liquid molar density, mol/m³.
    #[serde(default = "default_molar_density")]
    pub molar_density_liquid: f64,
    /// Liquid mass density, kg/m³.
    #[serde(default = "default_mass_density")]
    pub mass_density_liquid: f64,
    /// Liquid viscosity, Pa·s.
    #[serde(default = "default_viscosity")]
    pub viscosity_liquid: f64,
    /// Isotropic absolute permeability, m².
    #[serde(default = "default_permeability")]
    pub permeability: f64,
    /// Molar source per unit volume.
    #[serde(default)]
    pub source: f64,
    /// Directional quantities below this (relative) use the face mean in
    /// the direction-aware upwinding strategies.
    #[serde(default = "default_upwind_tolerance")]
    pub upwind_tolerance: f64,
    /// Retention model used by the saturation and relative permeability
    /// evaluators.
    #[serde(default = "default_wrm")]
    pub water_retention_model: EvaluatorSpec,
    /// Initial pressure.
    pub initial_condition: InitialCondition,
    /// Boundary conditions; boundary faces without one are no-flow.
    #[serde(default)]
    pub boundary_conditions: BoundaryConditionsConfig,
    /// Per-field evaluator overrides and additions.
    #[serde(default)]
    pub field_evaluators: IndexMap<String, EvaluatorSpec>,
    /// Integrator settings.
    #[serde(default)]
    pub time_integrator: Bdf1Config,
    /// Residual operator.
    #[serde(default)]
    pub diffusion: OperatorConfig,
    /// Preconditioner operator.
    #[serde(default)]
    pub diffusion_preconditioner: OperatorConfig,
}

impl RichardsConfig {
    /// Defaults everywhere, starting from `initial_condition`.
    pub fn new(initial_condition: InitialCondition) -> Self {
        Self {
            relative_permeability_method: default_rel_perm_method(),
            absolute_error_tolerance: default_one(),
            relative_error_tolerance: default_one(),
            initial_time_step: None,
            atmospheric_pressure: default_atmospheric_pressure(),
            gravity: None,
            porosity: default_porosity(),
            molar_density_liquid: default_molar_density(),
            mass_density_liquid: default_mass_density(),
            viscosity_liquid: default_viscosity(),
            permeability: default_permeability(),
            source: 0.0,
            upwind_tolerance: default_upwind_tolerance(),
            water_retention_model: default_wrm(),
            initial_condition,
            boundary_conditions: BoundaryConditionsConfig::default(),
            field_evaluators: IndexMap::new(),
            time_integrator: Bdf1Config::default(),
            diffusion: OperatorConfig::default(),
            diffusion_preconditioner: OperatorConfig::default(),
        }
    }

    /// Parse and validate JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Integrator settings with the top-level step override applied.
    pub fn integrator(&self) -> Bdf1Config {
        let mut config = self.time_integrator.clone();
        if let Some(h) = self.initial_time_step {
            config.initial_time_step = h;
        }
        config
    }

    /// Gravity on a `dim`-dimensional mesh.
    pub fn gravity_vector(&self, dim: usize) -> Result<Vec<f64>, ConfigError> {
        match &self.gravity {
            Some(g) if g.len() == dim => Ok(g.clone()),
            Some(g) => Err(self.invalid(
                "gravity",
                format!("{} components on a {dim}D mesh", g.len()),
            )),
            None => {
                let mut g = vec![0.0; dim];
                if let Some(last) = g.last_mut() {
                    *last = -STANDARD_GRAVITY;
                }
                Ok(g)
            }
        }
    }

    /// Check the configuration on its own.
    ///
    /// Strategy names are checked here for the upwinding method and
    /// linear solvers; evaluator and retention-model names are resolved by
    /// the registry at setup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. Strategies.
        if !UPWIND_METHODS.contains(&self.relative_permeability_method.as_str()) {
            return Err(ConfigError::UnknownStrategy {
                kind: "upwinding method",
                name: self.relative_permeability_method.clone(),
                known: UPWIND_METHODS.iter().map(|s| s.to_string()).collect(),
            });
        }
        for op in [&self.diffusion, &self.diffusion_preconditioner] {
            if !LINEAR_SOLVERS.contains(&op.linear_solver.as_str()) {
                return Err(ConfigError::UnknownStrategy {
                    kind: "linear solver",
                    name: op.linear_solver.clone(),
                    known: LINEAR_SOLVERS.iter().map(|s| s.to_string()).collect(),
                });
            }
        }

        // 2. Error norm.
        let (atol, rtol) = (self.absolute_error_tolerance, self.relative_error_tolerance);
        if !(atol >= 0.0 && rtol >= 0.0 && atol + rtol > 0.0) || !(atol + rtol).is_finite() {
            return Err(self.invalid(
                "absolute_error_tolerance",
                format!("need non-negative tolerances, not both zero (atol {atol}, rtol {rtol})"),
            ));
        }

        // 3. Material constants.
        for (name, v) in [
            ("porosity", self.porosity),
            ("molar_density_liquid", self.molar_density_liquid),
            ("mass_density_liquid", self.mass_density_liquid),
            ("viscosity_liquid", self.viscosity_liquid),
            ("permeability", self.permeability),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(self.invalid(name, format!("{v} is not a positive number")));
            }
        }
        if self.porosity > 1.0 {
            return Err(self.invalid("porosity", format!("{} exceeds 1", self.porosity)));
        }
        for (name, v) in [
            ("atmospheric_pressure", self.atmospheric_pressure),
            ("source", self.source),
            ("upwind_tolerance", self.upwind_tolerance),
        ] {
            if !v.is_finite() {
                return Err(self.invalid(name, format!("{v} is not finite")));
            }
        }
        if let Some(g) = &self.gravity {
            if g.iter().any(|x| !x.is_finite()) {
                return Err(self.invalid("gravity", "components must be finite".into()));
            }
        }

        // 4. Nested sections.
        self.initial_condition.validate()?;
        self.integrator().validate()?;
        Ok(())
    }

    /// Checks that need the mesh: gravity dimension and cell counts.
    pub fn validate_for_mesh(&self, mesh: &dyn Mesh) -> Result<(), ConfigError> {
        self.gravity_vector(mesh.space_dimension())?;
        self.initial_condition.validate_for_mesh(mesh)
    }

    fn invalid(&self, name: &str, reason: String) -> ConfigError {
        ConfigError::InvalidParameter {
            context: "richards".into(),
            name: name.into(),
            reason,
        }
    }
}
