//! Finite-difference checks of evaluator derivatives.

use vadose_core::{CompositeVector, FieldError};
use vadose_state::State;

/// Central-difference estimate of `∂key/∂wrt` for pointwise relations.
///
/// Every entry of the primary field `wrt` is perturbed at once by
/// `±eps · max(1, |x|)`, which is exact for relations where entity `j` of
/// `key` depends only on entity `j` of `wrt`. The primary is restored and
/// re-marked before returning.
pub fn central_difference(
    s: &mut State,
    key: &str,
    wrt: &str,
    owner: &str,
    eps: f64,
) -> Result<CompositeVector, FieldError> {
    let base = s.get_field_value(wrt)?.clone();
    let mut steps = base.clone();
    let names: Vec<String> = steps.component_names().map(str::to_string).collect();
    for name in &names {
        for v in steps.view_mut(name)? {
            *v = eps * v.abs().max(1.0);
        }
    }

    let plus = evaluate_shifted(s, key, wrt, owner, &base, &steps, 1.0)?;
    let minus = evaluate_shifted(s, key, wrt, owner, &base, &steps, -1.0)?;

    s.get_mutable_field_value(wrt, owner)?.copy_from(&base)?;
    s.mark_primary_changed(wrt)?;

    let mut out = plus.clone();
    out.update(-1.0, &minus, 1.0)?;
    let out_names: Vec<String> = out.component_names().map(str::to_string).collect();
    for name in &out_names {
        let h = steps.view(name)?.to_vec();
        for (v, h) in out.view_mut(name)?.iter_mut().zip(h) {
            *v /= 2.0 * h;
        }
    }
    Ok(out)
}

fn evaluate_shifted(
    s: &mut State,
    key: &str,
    wrt: &str,
    owner: &str,
    base: &CompositeVector,
    steps: &CompositeVector,
    sign: f64,
) -> Result<CompositeVector, FieldError> {
    let x = s.get_mutable_field_value(wrt, owner)?;
    x.copy_from(base)?;
    x.update(sign, steps, 1.0)?;
    s.mark_primary_changed(wrt)?;
    Ok(s.value(key)?.clone())
}

/// Largest relative difference `|a - b| / max(1, |b|)` over owned entries
/// of the components of `a`.
pub fn max_relative_difference(a: &CompositeVector, b: &CompositeVector) -> Result<f64, FieldError> {
    let mut worst = 0.0_f64;
    for name in a.component_names() {
        for (x, y) in a.view(name)?.iter().zip(b.view(name)?) {
            worst = worst.max((x - y).abs() / y.abs().max(1.0));
        }
    }
    Ok(worst)
}
