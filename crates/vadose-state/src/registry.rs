//! Name → constructor registry for field evaluators.
//!
//! The registry is an ordinary value built at start-up and passed to
//! whoever wires the store, so tests can hold several independent
//! registries side by side.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use vadose_core::{ConfigError, Key, StepError};

use crate::evaluator::FieldEvaluator;
use crate::independent::{CellVolumeModel, ConstantModel, IndependentVariableEvaluator};
use crate::models::LinearCombinationModel;
use crate::primary::PrimaryVariableEvaluator;
use crate::secondary::SecondaryVariableEvaluator;
use crate::state::State;

/// Configuration of one evaluator: a registered type name plus free-form
/// parameters.
///
/// ```json
/// { "type": "constant", "value": 0.3 }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorSpec {
    /// Registered evaluator type name.
    #[serde(rename = "type")]
    pub kind: String,
    /// Remaining parameters.
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl EvaluatorSpec {
    /// A spec with no parameters.
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            params: serde_json::Map::new(),
        }
    }

    /// Add a parameter.
    pub fn with(mut self, name: &str, value: serde_json::Value) -> Self {
        self.params.insert(name.to_string(), value);
        self
    }

    fn context(&self) -> String {
        format!("evaluator '{}'", self.kind)
    }

    fn invalid(&self, name: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidParameter {
            context: self.context(),
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// A required numeric parameter.
    pub fn f64_param(&self, name: &str) -> Result<f64, ConfigError> {
        match self.params.get(name) {
            Some(v) => v.as_f64().ok_or_else(|| self.invalid(name, "expected a number")),
            None => Err(ConfigError::MissingParameter {
                context: self.context(),
                name: name.to_string(),
            }),
        }
    }

    /// An optional numeric parameter.
    pub fn f64_param_or(&self, name: &str, default: f64) -> Result<f64, ConfigError> {
        if self.params.contains_key(name) {
            self.f64_param(name)
        } else {
            Ok(default)
        }
    }

    /// An optional string parameter.
    pub fn str_param_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str, ConfigError> {
        match self.params.get(name) {
            Some(v) => v.as_str().ok_or_else(|| self.invalid(name, "expected a string")),
            None => Ok(default),
        }
    }

    /// An optional field-key parameter, defaulting to `default`.
    pub fn key_param_or(&self, name: &str, default: &str) -> Result<Key, ConfigError> {
        self.str_param_or(name, default).map(str::to_string)
    }

    /// A required list of numbers.
    pub fn f64_list(&self, name: &str) -> Result<Vec<f64>, ConfigError> {
        let list = self.list(name)?;
        list.iter()
            .map(|v| v.as_f64().ok_or_else(|| self.invalid(name, "expected numbers")))
            .collect()
    }

    /// A required list of strings.
    pub fn str_list(&self, name: &str) -> Result<Vec<String>, ConfigError> {
        let list = self.list(name)?;
        list.iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.invalid(name, "expected strings"))
            })
            .collect()
    }

    fn list(&self, name: &str) -> Result<&Vec<serde_json::Value>, ConfigError> {
        match self.params.get(name) {
            Some(v) => v.as_array().ok_or_else(|| self.invalid(name, "expected a list")),
            None => Err(ConfigError::MissingParameter {
                context: self.context(),
                name: name.to_string(),
            }),
        }
    }
}

/// Boxed evaluator constructor: `(key, spec) -> evaluator`.
pub type EvaluatorConstructor =
    Box<dyn Fn(&str, &EvaluatorSpec) -> Result<Box<dyn FieldEvaluator>, ConfigError> + Send + Sync>;

/// Registry of evaluator constructors keyed by type name.
#[derive(Default)]
pub struct EvaluatorRegistry {
    constructors: IndexMap<String, EvaluatorConstructor>,
}

impl std::fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluatorRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl EvaluatorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the general-purpose evaluators:
    /// `"primary variable"`, `"constant"`, `"cell volume"` and
    /// `"linear combination"`.
    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        r.register("primary variable", |key, _| {
            Ok(Box::new(PrimaryVariableEvaluator::new(key)))
        });
        r.register("constant", |key, spec| {
            let value = spec.f64_param("value")?;
            Ok(Box::new(IndependentVariableEvaluator::new(
                key,
                Arc::new(ConstantModel::new(value)),
            )))
        });
        r.register("cell volume", |key, _| {
            Ok(Box::new(IndependentVariableEvaluator::new(
                key,
                Arc::new(CellVolumeModel),
            )))
        });
        r.register("linear combination", |key, spec| {
            let deps = spec.str_list("dependencies")?;
            let coefs = spec.f64_list("coefficients")?;
            if deps.len() != coefs.len() {
                return Err(ConfigError::InvalidParameter {
                    context: format!("evaluator '{key}'"),
                    name: "coefficients".into(),
                    reason: format!("{} coefficients for {} dependencies", coefs.len(), deps.len()),
                });
            }
            let constant = spec.f64_param_or("constant", 0.0)?;
            let model = LinearCombinationModel::new(constant, deps.into_iter().zip(coefs).collect());
            Ok(Box::new(SecondaryVariableEvaluator::new(key, Arc::new(model))))
        });
        r
    }

    /// Register (or replace) a constructor.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&str, &EvaluatorSpec) -> Result<Box<dyn FieldEvaluator>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(name.to_string(), Box::new(constructor));
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Build the evaluator for `key` described by `spec`.
    pub fn create(
        &self,
        key: &str,
        spec: &EvaluatorSpec,
    ) -> Result<Box<dyn FieldEvaluator>, ConfigError> {
        let constructor =
            self.constructors
                .get(&spec.kind)
                .ok_or_else(|| ConfigError::UnknownStrategy {
                    kind: "field evaluator",
                    name: spec.kind.clone(),
                    known: self.names(),
                })?;
        constructor(key, spec)
    }

    /// Build the evaluator for `key` and install it in `s`.
    pub fn require_evaluator(
        &self,
        s: &mut State,
        key: &str,
        spec: &EvaluatorSpec,
    ) -> Result<(), StepError> {
        let evaluator = self.create(key, spec)?;
        s.set_evaluator(evaluator)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_type_lists_known_names() {
        let r = EvaluatorRegistry::with_builtins();
        let err = r
            .create("porosity", &EvaluatorSpec::new("magic"))
            .err().unwrap();
        match err {
            ConfigError::UnknownStrategy { name, known, .. } => {
                assert_eq!(name, "magic");
                assert!(known.contains(&"constant".to_string()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn spec_parses_type_and_params() {
        let spec: EvaluatorSpec =
            serde_json::from_value(json!({"type": "constant", "value": 0.3})).unwrap();
        assert_eq!(spec.kind, "constant");
        assert_eq!(spec.f64_param("value").unwrap(), 0.3);
        assert_eq!(spec.f64_param_or("other", 2.0).unwrap(), 2.0);
        assert!(matches!(
            spec.f64_param("missing"),
            Err(ConfigError::MissingParameter { .. })
        ));
    }

    #[test]
    fn constant_requires_value() {
        let r = EvaluatorRegistry::with_builtins();
        assert!(r.create("porosity", &EvaluatorSpec::new("constant")).is_err());
    }

    #[test]
    fn linear_combination_checks_lengths() {
        let r = EvaluatorRegistry::with_builtins();
        let spec = EvaluatorSpec::new("linear combination")
            .with("dependencies", json!(["a", "b"]))
            .with("coefficients", json!([1.0]));
        assert!(matches!(
            r.create("c", &spec),
            Err(ConfigError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn registries_are_independent() {
        let mut a = EvaluatorRegistry::new();
        let b = EvaluatorRegistry::with_builtins();
        a.register("constant", |key, _| {
            Ok(Box::new(PrimaryVariableEvaluator::new(key)))
        });
        let ea = a.create("x", &EvaluatorSpec::new("constant")).unwrap();
        assert_eq!(ea.kind(), "primary variable");
        assert!(b.create("x", &EvaluatorSpec::new("constant")).is_err());
    }
}
