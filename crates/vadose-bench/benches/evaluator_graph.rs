//! Criterion micro-benchmarks for the evaluator graph: a full refresh
//! after the primary variable changes, a memoized lookup, and a chain-rule
//! derivative through saturation.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;
use vadose_core::{EntityKind, CELL, FACE};
use vadose_flow::flow_registry;
use vadose_flow::keys::{
    ATMOSPHERIC_PRESSURE, FLOW_OWNER, MOLAR_DENSITY_LIQUID, POROSITY, PRESSURE, SATURATION_LIQUID,
    WATER_CONTENT,
};
use vadose_state::{EvaluatorSpec, PrimaryVariableEvaluator, State};
use vadose_test_utils::line_mesh;

/// Water content over pressure on 10K cells.
fn make_store_10k() -> State {
    let n = 10_000;
    let mut s = State::new(line_mesh(n, 100.0));
    s.set_scalar(ATMOSPHERIC_PRESSURE, 101325.0);
    s.require_field(PRESSURE, Some(FLOW_OWNER))
        .unwrap()
        .add_component(CELL, EntityKind::Cell, 1)
        .unwrap()
        .add_component(FACE, EntityKind::Face, 1)
        .unwrap();
    s.set_evaluator(Box::new(PrimaryVariableEvaluator::new(PRESSURE)))
        .unwrap();

    let wrm = json!({ "type": "van Genuchten", "alpha": 1e-4, "n": 2.0 });
    let registry = flow_registry();
    for (key, spec) in [
        (POROSITY, EvaluatorSpec::new("constant").with("value", json!(0.3))),
        (
            MOLAR_DENSITY_LIQUID,
            EvaluatorSpec::new("constant").with("value", json!(55000.0)),
        ),
        (
            SATURATION_LIQUID,
            EvaluatorSpec::new("saturation liquid").with("water_retention_model", wrm),
        ),
        (WATER_CONTENT, EvaluatorSpec::new("water content")),
    ] {
        registry.require_evaluator(&mut s, key, &spec).unwrap();
        s.require_field(key, None)
            .unwrap()
            .add_component(CELL, EntityKind::Cell, 1)
            .unwrap();
    }
    s.setup().unwrap();

    let p = s.get_mutable_field_value(PRESSURE, FLOW_OWNER).unwrap();
    for (c, v) in p.view_mut(CELL).unwrap().iter_mut().enumerate() {
        *v = 9.0e4 + (c % 100) as f64 * 10.0;
    }
    s.set_initialized(PRESSURE).unwrap();
    s
}

/// Benchmark: pressure changed, water content recomputed through the graph.
fn bench_refresh_10k(c: &mut Criterion) {
    let mut s = make_store_10k();
    c.bench_function("graph_refresh_10k", |b| {
        b.iter(|| {
            s.mark_primary_changed(PRESSURE).unwrap();
            black_box(s.value(WATER_CONTENT).unwrap());
        });
    });
}

/// Benchmark: nothing changed, the value is served from memory.
fn bench_memoized_10k(c: &mut Criterion) {
    let mut s = make_store_10k();
    s.value(WATER_CONTENT).unwrap();
    c.bench_function("graph_memoized_10k", |b| {
        b.iter(|| {
            black_box(s.changed(WATER_CONTENT, "bench").unwrap());
        });
    });
}

/// Benchmark: `∂θ/∂p` by the chain rule after a pressure change.
fn bench_derivative_10k(c: &mut Criterion) {
    let mut s = make_store_10k();
    c.bench_function("graph_derivative_10k", |b| {
        b.iter(|| {
            s.mark_primary_changed(PRESSURE).unwrap();
            black_box(s.derivative(WATER_CONTENT, PRESSURE).unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_refresh_10k,
    bench_memoized_10k,
    bench_derivative_10k
);
criterion_main!(benches);
