//! Upwinding strategies on small meshes: two-cell direction rules and
//! boundary faces taking their sole cell's value.

use proptest::prelude::*;
use vadose_core::{EntityKind, Point, CELL, FACE};
use vadose_operators::{create_upwinding, UpwindFields, UpwindParams, UPWIND_METHODS};
use vadose_state::{ConstantModel, IndependentVariableEvaluator, PrimaryVariableEvaluator, State};
use std::sync::Arc;
use vadose_test_utils::line_state;

const OWNER: &str = "flow";

fn fields() -> UpwindFields {
    UpwindFields {
        cell_coef: "relative_permeability".into(),
        face_coef: "numerical_rel_perm".into(),
        owner: OWNER.into(),
    }
}

fn params(gravity: f64) -> UpwindParams {
    UpwindParams {
        flux: "darcy_flux".into(),
        permeability: "permeability".into(),
        gravity: Point::from_slice(&[gravity]),
        tolerance: 1e-12,
    }
}

/// A line of `cells.len()` cells with the given coefficient values and a
/// face flux of `flux` on every face.
fn state(cells: &[f64], flux: f64) -> State {
    let mut s = line_state(cells.len());
    s.require_field("relative_permeability", Some("test"))
        .unwrap()
        .add_component(CELL, EntityKind::Cell, 1)
        .unwrap();
    s.set_evaluator(Box::new(PrimaryVariableEvaluator::new(
        "relative_permeability",
    )))
    .unwrap();
    s.require_field("permeability", None)
        .unwrap()
        .add_component(CELL, EntityKind::Cell, 1)
        .unwrap();
    s.set_evaluator(Box::new(IndependentVariableEvaluator::new(
        "permeability",
        Arc::new(ConstantModel::new(1.0)),
    )))
    .unwrap();
    s.require_field("numerical_rel_perm", Some(OWNER))
        .unwrap()
        .add_component(CELL, EntityKind::Cell, 1)
        .unwrap()
        .add_component(FACE, EntityKind::Face, 1)
        .unwrap();
    s.require_field("darcy_flux", Some(OWNER))
        .unwrap()
        .add_component(FACE, EntityKind::Face, 1)
        .unwrap();
    s.setup().unwrap();

    s.get_mutable_field_value("relative_permeability", "test")
        .unwrap()
        .view_mut(CELL)
        .unwrap()
        .copy_from_slice(cells);
    s.mark_primary_changed("relative_permeability").unwrap();
    s.get_mutable_field_value("darcy_flux", OWNER)
        .unwrap()
        .put_scalar(flux);
    s
}

fn faces_after(method: &str, s: &mut State, gravity: f64) -> Vec<f64> {
    let upwind = create_upwinding(method, fields(), params(gravity)).unwrap();
    upwind.update(s).unwrap();
    s.get_field_value("numerical_rel_perm")
        .unwrap()
        .view(FACE)
        .unwrap()
        .to_vec()
}

// Two cells on a line: face 0 | cell 0 | face 1 | cell 1 | face 2, with
// the normal of face 1 pointing from cell 0 into cell 1.

#[test]
fn arithmetic_mean_averages_the_interior_face() {
    let mut s = state(&[1.0, 3.0], 0.0);
    assert_eq!(faces_after("arithmetic mean", &mut s, -9.8), vec![1.0, 2.0, 3.0]);
    let cells = s.get_field_value("numerical_rel_perm").unwrap();
    assert_eq!(cells.view(CELL).unwrap(), &[1.0, 3.0]);
}

#[test]
fn total_flux_takes_the_upstream_cell() {
    let mut s = state(&[1.0, 3.0], 2.5);
    assert_eq!(faces_after("upwind with Darcy flux", &mut s, -9.8), vec![1.0, 1.0, 3.0]);
    let mut s = state(&[1.0, 3.0], -2.5);
    assert_eq!(faces_after("upwind with Darcy flux", &mut s, -9.8), vec![1.0, 3.0, 3.0]);
}

#[test]
fn total_flux_without_flow_uses_the_mean() {
    let mut s = state(&[1.0, 3.0], 0.0);
    assert_eq!(faces_after("upwind with Darcy flux", &mut s, -9.8), vec![1.0, 2.0, 3.0]);
}

#[test]
fn gravity_takes_the_cell_above() {
    // Gravity along -x: water moves from cell 1 down into cell 0.
    let mut s = state(&[1.0, 3.0], 0.0);
    assert_eq!(faces_after("upwind with gravity", &mut s, -9.8), vec![1.0, 3.0, 3.0]);
    let mut s = state(&[1.0, 3.0], 0.0);
    assert_eq!(faces_after("upwind with gravity", &mut s, 9.8), vec![1.0, 1.0, 3.0]);
}

#[test]
fn cell_centered_uses_the_first_cell() {
    let mut s = state(&[1.0, 3.0], -1.0);
    assert_eq!(faces_after("cell centered", &mut s, -9.8), vec![1.0, 1.0, 3.0]);
}

#[test]
fn update_sees_new_cell_values() {
    let mut s = state(&[1.0, 3.0], 0.0);
    faces_after("arithmetic mean", &mut s, -9.8);
    s.get_mutable_field_value("relative_permeability", "test")
        .unwrap()
        .view_mut(CELL)
        .unwrap()
        .copy_from_slice(&[5.0, 7.0]);
    s.mark_primary_changed("relative_permeability").unwrap();
    assert_eq!(faces_after("arithmetic mean", &mut s, -9.8), vec![5.0, 6.0, 7.0]);
}

proptest! {
    #[test]
    fn boundary_faces_take_their_cell(
        cells in prop::collection::vec(0.0f64..1.0, 1..8),
        flux in -1.0f64..1.0,
        gravity in -10.0f64..10.0,
    ) {
        for method in UPWIND_METHODS {
            let mut s = state(&cells, flux);
            let faces = faces_after(method, &mut s, gravity);
            prop_assert_eq!(faces[0], cells[0]);
            prop_assert_eq!(faces[cells.len()], cells[cells.len() - 1]);
            for (f, v) in faces.iter().enumerate().skip(1).take(cells.len() - 1) {
                let (lo, hi) = (cells[f - 1].min(cells[f]), cells[f - 1].max(cells[f]));
                prop_assert!(*v >= lo && *v <= hi, "{method}: face {f} = {v} outside [{lo}, {hi}]");
            }
        }
    }
}
