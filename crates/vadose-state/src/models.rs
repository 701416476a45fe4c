//! General-purpose secondary models.

use vadose_core::{CompositeVector, FieldError, Key, KeySet};

use crate::secondary::SecondaryModel;
use crate::state::State;

/// `key = constant + Σ coefficient_i · dependency_i`, component by
/// component.
#[derive(Clone, Debug)]
pub struct LinearCombinationModel {
    constant: f64,
    terms: Vec<(Key, f64)>,
}

impl LinearCombinationModel {
    /// A linear combination of `terms` plus `constant`.
    pub fn new(constant: f64, terms: Vec<(Key, f64)>) -> Self {
        Self { constant, terms }
    }
}

impl SecondaryModel for LinearCombinationModel {
    fn dependencies(&self) -> KeySet {
        self.terms.iter().map(|(k, _)| k.clone()).collect()
    }

    fn evaluate(&self, s: &State, out: &mut CompositeVector) -> Result<(), FieldError> {
        out.put_scalar(self.constant);
        let names: Vec<String> = out.component_names().map(str::to_string).collect();
        for (dep, coef) in &self.terms {
            let x = s.get_field_value(dep)?;
            for name in &names {
                let src = x.view(name)?;
                let dst = out.view_mut(name)?;
                if src.len() != dst.len() {
                    return Err(FieldError::ShapeMismatch {
                        reason: format!("'{dep}' component '{name}' has {} entries", src.len()),
                    });
                }
                for (o, v) in dst.iter_mut().zip(src) {
                    *o += coef * v;
                }
            }
        }
        Ok(())
    }

    fn evaluate_partial_derivative(
        &self,
        _s: &State,
        wrt: &str,
        out: &mut CompositeVector,
    ) -> Result<(), FieldError> {
        let coef: f64 = self
            .terms
            .iter()
            .filter(|(k, _)| k == wrt)
            .map(|(_, c)| c)
            .sum();
        out.put_scalar(coef);
        Ok(())
    }
}
