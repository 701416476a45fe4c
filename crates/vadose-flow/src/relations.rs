//! Constitutive relations of unsaturated flow as secondary models, and
//! their registration under configuration names.

use std::sync::Arc;

use vadose_core::{CompositeVector, ConfigError, FieldError, Key, KeySet};
use vadose_state::{
    EvaluatorRegistry, EvaluatorSpec, SecondaryModel, SecondaryVariableEvaluator, State,
};

use crate::keys::{
    ATMOSPHERIC_PRESSURE, MOLAR_DENSITY_LIQUID, POROSITY, PRESSURE, SATURATION_LIQUID,
};
use crate::wrm::{create_wrm, WaterRetentionModel};

/// Apply `f(p_atm - p)` entry by entry over the components of `out`.
fn map_capillary<F>(
    s: &State,
    pressure: &str,
    out: &mut CompositeVector,
    f: F,
) -> Result<(), FieldError>
where
    F: Fn(f64) -> f64,
{
    let p_atm = s.scalar(ATMOSPHERIC_PRESSURE)?;
    let p = s.get_field_value(pressure)?;
    let names: Vec<String> = out.component_names().map(str::to_string).collect();
    for name in &names {
        let src = p.view(name)?;
        let dst = out.view_mut(name)?;
        if src.len() != dst.len() {
            return Err(FieldError::ShapeMismatch {
                reason: format!("'{pressure}' component '{name}' has {} entries", src.len()),
            });
        }
        for (o, p) in dst.iter_mut().zip(src) {
            *o = f(p_atm - p);
        }
    }
    Ok(())
}

/// Liquid saturation from a water retention model.
#[derive(Debug)]
pub struct SaturationModel {
    wrm: Arc<dyn WaterRetentionModel>,
    pressure: Key,
}

impl SaturationModel {
    /// Saturation of the liquid at pressure `pressure`.
    pub fn new(wrm: Arc<dyn WaterRetentionModel>, pressure: &str) -> Self {
        Self {
            wrm,
            pressure: pressure.to_string(),
        }
    }
}

impl SecondaryModel for SaturationModel {
    fn dependencies(&self) -> KeySet {
        KeySet::from_iter([self.pressure.clone()])
    }

    fn evaluate(&self, s: &State, out: &mut CompositeVector) -> Result<(), FieldError> {
        map_capillary(s, &self.pressure, out, |pc| self.wrm.saturation(pc))
    }

    fn evaluate_partial_derivative(
        &self,
        s: &State,
        _wrt: &str,
        out: &mut CompositeVector,
    ) -> Result<(), FieldError> {
        // dpc/dp = -1
        map_capillary(s, &self.pressure, out, |pc| -self.wrm.d_saturation(pc))
    }
}

/// Relative permeability at cells from a water retention model.
#[derive(Debug)]
pub struct RelativePermeabilityModel {
    wrm: Arc<dyn WaterRetentionModel>,
    pressure: Key,
}

impl RelativePermeabilityModel {
    /// Relative permeability of the liquid at pressure `pressure`.
    pub fn new(wrm: Arc<dyn WaterRetentionModel>, pressure: &str) -> Self {
        Self {
            wrm,
            pressure: pressure.to_string(),
        }
    }
}

impl SecondaryModel for RelativePermeabilityModel {
    fn dependencies(&self) -> KeySet {
        KeySet::from_iter([self.pressure.clone()])
    }

    fn evaluate(&self, s: &State, out: &mut CompositeVector) -> Result<(), FieldError> {
        map_capillary(s, &self.pressure, out, |pc| self.wrm.k_relative(pc))
    }

    fn evaluate_partial_derivative(
        &self,
        s: &State,
        _wrt: &str,
        out: &mut CompositeVector,
    ) -> Result<(), FieldError> {
        map_capillary(s, &self.pressure, out, |pc| -self.wrm.d_k_relative(pc))
    }
}

/// Water content `θ = φ n s`: moles of water per unit volume.
#[derive(Clone, Debug)]
pub struct WaterContentModel {
    factors: [Key; 3],
}

impl WaterContentModel {
    /// Product of porosity, molar density and saturation fields.
    pub fn new(porosity: &str, molar_density: &str, saturation: &str) -> Self {
        Self {
            factors: [
                porosity.to_string(),
                molar_density.to_string(),
                saturation.to_string(),
            ],
        }
    }

    /// Product of every factor except `skip` (if any).
    fn product(
        &self,
        s: &State,
        skip: Option<&str>,
        out: &mut CompositeVector,
    ) -> Result<(), FieldError> {
        out.put_scalar(1.0);
        let names: Vec<String> = out.component_names().map(str::to_string).collect();
        for key in self.factors.iter().filter(|k| Some(k.as_str()) != skip) {
            let x = s.get_field_value(key)?;
            for name in &names {
                let src = x.view(name)?;
                let dst = out.view_mut(name)?;
                if src.len() != dst.len() {
                    return Err(FieldError::ShapeMismatch {
                        reason: format!("'{key}' component '{name}' has {} entries", src.len()),
                    });
                }
                for (o, v) in dst.iter_mut().zip(src) {
                    *o *= v;
                }
            }
        }
        Ok(())
    }
}

impl SecondaryModel for WaterContentModel {
    fn dependencies(&self) -> KeySet {
        self.factors.iter().cloned().collect()
    }

    fn evaluate(&self, s: &State, out: &mut CompositeVector) -> Result<(), FieldError> {
        self.product(s, None, out)
    }

    fn evaluate_partial_derivative(
        &self,
        s: &State,
        wrt: &str,
        out: &mut CompositeVector,
    ) -> Result<(), FieldError> {
        self.product(s, Some(wrt), out)
    }
}

// ── Registration ───────────────────────────────────────────────────

fn nested_wrm(key: &str, spec: &EvaluatorSpec) -> Result<Arc<dyn WaterRetentionModel>, ConfigError> {
    let value = spec
        .params
        .get("water_retention_model")
        .ok_or_else(|| ConfigError::MissingParameter {
            context: format!("evaluator '{key}'"),
            name: "water_retention_model".into(),
        })?;
    let wrm: EvaluatorSpec =
        serde_json::from_value(value.clone()).map_err(|e| ConfigError::Parse {
            reason: format!("evaluator '{key}': water_retention_model: {e}"),
        })?;
    create_wrm(&wrm)
}

/// Add the flow evaluators to `registry`:
///
/// - `"saturation liquid"`: `water_retention_model`, `pressure_key`;
/// - `"relative permeability"`: `water_retention_model`, `pressure_key`;
/// - `"water content"`: `porosity_key`, `molar_density_key`,
///   `saturation_key`.
pub fn register_flow_evaluators(registry: &mut EvaluatorRegistry) {
    registry.register("saturation liquid", |key, spec| {
        let wrm = nested_wrm(key, spec)?;
        let pressure = spec.key_param_or("pressure_key", PRESSURE)?;
        let model = SaturationModel::new(wrm, &pressure);
        Ok(Box::new(SecondaryVariableEvaluator::new(key, Arc::new(model))))
    });
    registry.register("relative permeability", |key, spec| {
        let wrm = nested_wrm(key, spec)?;
        let pressure = spec.key_param_or("pressure_key", PRESSURE)?;
        let model = RelativePermeabilityModel::new(wrm, &pressure);
        Ok(Box::new(SecondaryVariableEvaluator::new(key, Arc::new(model))))
    });
    registry.register("water content", |key, spec| {
        let model = WaterContentModel::new(
            &spec.key_param_or("porosity_key", POROSITY)?,
            &spec.key_param_or("molar_density_key", MOLAR_DENSITY_LIQUID)?,
            &spec.key_param_or("saturation_key", SATURATION_LIQUID)?,
        );
        Ok(Box::new(SecondaryVariableEvaluator::new(key, Arc::new(model))))
    });
}

/// The general-purpose evaluators plus the flow evaluators.
pub fn flow_registry() -> EvaluatorRegistry {
    let mut registry = EvaluatorRegistry::with_builtins();
    register_flow_evaluators(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flow_registry_extends_builtins() {
        let r = flow_registry();
        for name in [
            "primary variable",
            "constant",
            "saturation liquid",
            "relative permeability",
            "water content",
        ] {
            assert!(r.contains(name), "{name}");
        }
    }

    #[test]
    fn saturation_requires_a_retention_model() {
        let r = flow_registry();
        let err = r
            .create("saturation_liquid", &EvaluatorSpec::new("saturation liquid"))
            .err().unwrap();
        assert!(matches!(err, ConfigError::MissingParameter { .. }));
    }

    #[test]
    fn unknown_retention_model_is_reported() {
        let r = flow_registry();
        let spec = EvaluatorSpec::new("relative permeability")
            .with("water_retention_model", json!({"type": "Gardner"}));
        let err = r.create("relative_permeability", &spec).err().unwrap();
        assert!(matches!(
            err,
            ConfigError::UnknownStrategy {
                kind: "water retention model",
                ..
            }
        ));
    }

    #[test]
    fn malformed_retention_model_is_a_parse_error() {
        let r = flow_registry();
        let spec = EvaluatorSpec::new("saturation liquid").with("water_retention_model", json!(3));
        let err = r.create("saturation_liquid", &spec).err().unwrap();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
