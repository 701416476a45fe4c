//! Integration tests for the field store and evaluator graph: memoization,
//! chain-rule derivatives, graph validation and time levels.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;
use vadose_core::{EntityKind, FieldError, CELL, FACE};
use vadose_state::{
    EvaluatorRegistry, EvaluatorSpec, PrimaryVariableEvaluator, SecondaryModel,
    SecondaryVariableEvaluator, State, TimeLevels,
};
use vadose_test_utils::fd::{central_difference, max_relative_difference};
use vadose_test_utils::fixtures::{CountingModel, CubicModel, FailingModel, ProductModel};
use vadose_test_utils::line_state;

const OWNER: &str = "flow";

fn with_pressure(n: usize) -> State {
    let mut s = line_state(n);
    s.require_field("pressure", Some(OWNER))
        .unwrap()
        .add_component(CELL, EntityKind::Cell, 1)
        .unwrap()
        .add_component(FACE, EntityKind::Face, 1)
        .unwrap();
    s.set_evaluator(Box::new(PrimaryVariableEvaluator::new("pressure")))
        .unwrap();
    s
}

fn add_secondary(s: &mut State, key: &str, model: Arc<dyn SecondaryModel>) {
    s.require_field(key, None)
        .unwrap()
        .add_component(CELL, EntityKind::Cell, 1)
        .unwrap();
    s.set_evaluator(Box::new(SecondaryVariableEvaluator::new(key, model)))
        .unwrap();
}

fn set_pressure(s: &mut State, cells: &[f64]) {
    let p = s.get_mutable_field_value("pressure", OWNER).unwrap();
    p.view_mut(CELL).unwrap().copy_from_slice(cells);
    s.set_initialized("pressure").unwrap();
    s.mark_primary_changed("pressure").unwrap();
}

// ── Memoization ────────────────────────────────────────────────────

#[test]
fn each_evaluator_runs_once_per_input_change() {
    let mut s = with_pressure(3);
    let a = CountingModel::new(&["pressure"]);
    let b = CountingModel::new(&["a"]);
    let c = CountingModel::new(&["a", "b"]);
    let (ca, cb, cc) = (a.counter(), b.counter(), c.counter());
    add_secondary(&mut s, "a", Arc::new(a));
    add_secondary(&mut s, "b", Arc::new(b));
    add_secondary(&mut s, "c", Arc::new(c));
    s.setup().unwrap();
    set_pressure(&mut s, &[1.0, 2.0, 3.0]);

    assert_eq!(s.value("c").unwrap().view(CELL).unwrap(), &[2.0, 4.0, 6.0]);
    s.value("c").unwrap();
    s.value("b").unwrap();
    assert_eq!(ca.load(Ordering::SeqCst), 1);
    assert_eq!(cb.load(Ordering::SeqCst), 1);
    assert_eq!(cc.load(Ordering::SeqCst), 1);

    set_pressure(&mut s, &[0.0, 0.0, 1.0]);
    assert_eq!(s.value("c").unwrap().view(CELL).unwrap(), &[0.0, 0.0, 2.0]);
    assert_eq!(ca.load(Ordering::SeqCst), 2);
    assert_eq!(cb.load(Ordering::SeqCst), 2);
    assert_eq!(cc.load(Ordering::SeqCst), 2);
}

#[test]
fn changed_is_reported_once_per_requester() {
    let mut s = with_pressure(2);
    add_secondary(&mut s, "a", Arc::new(CountingModel::new(&["pressure"])));
    s.setup().unwrap();
    set_pressure(&mut s, &[1.0, 1.0]);

    assert!(s.changed("a", "x").unwrap());
    assert!(s.changed("a", "y").unwrap());
    assert!(!s.changed("a", "x").unwrap());
    assert!(!s.changed("a", "y").unwrap());

    set_pressure(&mut s, &[2.0, 1.0]);
    assert!(s.changed("a", "y").unwrap());
    assert!(s.changed("a", "x").unwrap());
}

#[test]
fn failed_evaluation_propagates() {
    let mut s = with_pressure(2);
    add_secondary(&mut s, "a", Arc::new(FailingModel::new("pressure", 1)));
    s.setup().unwrap();
    set_pressure(&mut s, &[1.0, 1.0]);
    assert!(s.value("a").is_ok());
    set_pressure(&mut s, &[2.0, 1.0]);
    assert!(matches!(
        s.value("a"),
        Err(FieldError::EvaluationFailed { .. })
    ));
}

// ── Derivatives ────────────────────────────────────────────────────

fn chain_state(cells: &[f64]) -> State {
    let mut s = with_pressure(cells.len());
    add_secondary(&mut s, "x", Arc::new(CubicModel::new("pressure", 0.5, -2.0)));
    add_secondary(&mut s, "y", Arc::new(ProductModel::new(&["x", "pressure"])));
    s.setup().unwrap();
    set_pressure(&mut s, cells);
    s
}

proptest! {
    #[test]
    fn chain_rule_matches_finite_differences(
        cells in prop::collection::vec(-3.0f64..3.0, 1..6),
    ) {
        let mut s = chain_state(&cells);
        let analytic = s.derivative("y", "pressure").unwrap().clone();
        let numeric = central_difference(&mut s, "y", "pressure", OWNER, 1e-6).unwrap();
        let err = max_relative_difference(&analytic, &numeric).unwrap();
        prop_assert!(err < 1e-6, "relative error {err}");
    }
}

#[test]
fn derivative_recomputes_only_after_value_change() {
    let mut s = chain_state(&[1.0, 2.0]);
    assert!(s.derivative_changed("y", "pc", "pressure").unwrap());
    assert!(!s.derivative_changed("y", "pc", "pressure").unwrap());
    set_pressure(&mut s, &[2.0, 2.0]);
    assert!(s.derivative_changed("y", "pc", "pressure").unwrap());
    // d/dp (0.5 p^3 - 2p) p = 2 p^3 - 4 p at p = 2
    let d = s.derivative("y", "pressure").unwrap().view(CELL).unwrap()[0];
    assert!((d - 8.0).abs() < 1e-12);
}

#[test]
fn derivative_of_primary_with_respect_to_itself_is_one() {
    let mut s = chain_state(&[1.0]);
    let d = s.derivative("pressure", "pressure").unwrap();
    assert!(d.view(CELL).unwrap().iter().all(|&v| v == 1.0));
}

#[test]
fn unsupported_derivatives_fail_loudly() {
    let mut s = chain_state(&[1.0]);
    assert_eq!(
        s.derivative("x", "y").unwrap_err(),
        FieldError::UnsupportedDerivative {
            key: "x".into(),
            wrt: "y".into()
        }
    );
    assert!(matches!(
        s.derivative("pressure", "x"),
        Err(FieldError::UnsupportedDerivative { .. })
    ));
}

// ── Graph validation ───────────────────────────────────────────────

#[test]
fn cycles_are_detected_at_setup() {
    let mut s = with_pressure(2);
    add_secondary(&mut s, "a", Arc::new(CountingModel::new(&["b"])));
    add_secondary(&mut s, "b", Arc::new(CountingModel::new(&["a"])));
    match s.setup() {
        Err(FieldError::CyclicDependency { cycle }) => {
            assert_eq!(cycle, vec!["a", "b", "a"]);
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn missing_dependency_evaluator_is_reported() {
    let mut s = with_pressure(2);
    add_secondary(&mut s, "a", Arc::new(CountingModel::new(&["porosity"])));
    assert_eq!(
        s.setup().unwrap_err(),
        FieldError::MissingEvaluator {
            key: "porosity".into()
        }
    );
}

#[test]
fn setup_orders_dependencies_first() {
    let mut s = with_pressure(2);
    add_secondary(&mut s, "c", Arc::new(CountingModel::new(&["a", "b"])));
    add_secondary(&mut s, "b", Arc::new(CountingModel::new(&["a"])));
    add_secondary(&mut s, "a", Arc::new(CountingModel::new(&["pressure"])));
    let order = s.setup().unwrap();
    let pos = |k: &str| order.position(k).unwrap();
    assert!(pos("pressure") < pos("a"));
    assert!(pos("a") < pos("b"));
    assert!(pos("b") < pos("c"));
}

// ── Registry and time levels ───────────────────────────────────────

#[test]
fn registry_builds_a_working_graph() {
    let registry = EvaluatorRegistry::with_builtins();
    let mut s = with_pressure(3);
    s.require_field("porosity", None)
        .unwrap()
        .add_component(CELL, EntityKind::Cell, 1)
        .unwrap();
    registry
        .require_evaluator(
            &mut s,
            "porosity",
            &EvaluatorSpec::new("constant").with("value", json!(0.25)),
        )
        .unwrap();
    s.require_field("cell_volume", None)
        .unwrap()
        .add_component(CELL, EntityKind::Cell, 1)
        .unwrap();
    registry
        .require_evaluator(&mut s, "cell_volume", &EvaluatorSpec::new("cell volume"))
        .unwrap();
    s.require_field("theta", None)
        .unwrap()
        .add_component(CELL, EntityKind::Cell, 1)
        .unwrap();
    let spec: EvaluatorSpec = serde_json::from_value(json!({
        "type": "linear combination",
        "constant": 1.0,
        "dependencies": ["porosity", "pressure"],
        "coefficients": [2.0, 0.5]
    }))
    .unwrap();
    registry.require_evaluator(&mut s, "theta", &spec).unwrap();
    s.setup().unwrap();
    set_pressure(&mut s, &[2.0, 4.0, 6.0]);

    assert_eq!(s.value("theta").unwrap().view(CELL).unwrap(), &[2.5, 3.5, 4.5]);
    assert_eq!(
        s.derivative("theta", "pressure").unwrap().view(CELL).unwrap(),
        &[0.5, 0.5, 0.5]
    );
    assert_eq!(
        s.value("cell_volume").unwrap().view(CELL).unwrap(),
        &[1.0, 1.0, 1.0]
    );
}

#[test]
fn time_levels_commit_and_rollback() {
    let mut s = with_pressure(2);
    add_secondary(&mut s, "a", Arc::new(CountingModel::new(&["pressure"])));
    s.setup().unwrap();
    set_pressure(&mut s, &[1.0, 1.0]);
    let mut levels = TimeLevels::new(s);

    set_pressure(levels.next_mut(), &[5.0, 5.0]);
    assert_eq!(levels.next_mut().value("a").unwrap().view(CELL).unwrap(), &[5.0, 5.0]);
    levels.rollback().unwrap();
    assert_eq!(levels.next_mut().value("a").unwrap().view(CELL).unwrap(), &[1.0, 1.0]);

    set_pressure(levels.next_mut(), &[3.0, 4.0]);
    levels.commit().unwrap();
    assert_eq!(
        levels.current_mut().value("a").unwrap().view(CELL).unwrap(),
        &[3.0, 4.0]
    );
}
