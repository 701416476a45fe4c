//! Mesh trait compliance test helpers.
//!
//! Geometric and topological invariants every [`Mesh`] must satisfy for
//! the mimetic discretization to be consistent.

use crate::mesh::Mesh;
use vadose_core::Ownership;

const TOL: f64 = 1e-10;

/// Every cell face lists the cell back, with matching orientation.
pub fn assert_face_cell_consistency(mesh: &dyn Mesh) {
    for c in 0..mesh.num_cells() {
        for (f, dir) in mesh.cell_get_faces_and_dirs(c) {
            let cells = mesh.face_get_cells(f, Ownership::Used);
            assert!(cells.contains(&c), "face {f} does not list cell {c}");
            if cells.len() == 2 {
                let expected = if cells[0] == c { 1 } else { -1 };
                assert_eq!(dir, expected, "cell {c} face {f} orientation");
            }
        }
    }
}

/// Each interior face is shared by exactly two cells, each boundary face by one.
pub fn assert_face_multiplicity(mesh: &dyn Mesh) {
    let mut seen = vec![0usize; mesh.num_faces()];
    for c in 0..mesh.num_cells() {
        for (f, _) in mesh.cell_get_faces_and_dirs(c) {
            seen[f] += 1;
        }
    }
    for (f, &n) in seen.iter().enumerate() {
        assert_eq!(n, mesh.face_get_cells(f, Ownership::Used).len(), "face {f}");
    }
}

/// `Σ_f dir |f| n_f = 0` for every cell.
pub fn assert_cells_closed(mesh: &dyn Mesh) {
    let dim = mesh.space_dimension();
    for c in 0..mesh.num_cells() {
        let mut sum = vec![0.0; dim];
        for (f, dir) in mesh.cell_get_faces_and_dirs(c) {
            let n = mesh.face_normal(f);
            for a in 0..dim {
                sum[a] += f64::from(dir) * mesh.face_area(f) * n[a];
            }
        }
        assert!(sum.iter().all(|v| v.abs() < TOL), "cell {c} not closed: {sum:?}");
    }
}

/// `Σ_f dir |f| n_f (x_f - x_c)ᵀ = |c| I` for every cell.
pub fn assert_divergence_identity(mesh: &dyn Mesh) {
    let dim = mesh.space_dimension();
    for c in 0..mesh.num_cells() {
        let xc = mesh.cell_centroid(c);
        let vol = mesh.cell_volume(c);
        let mut m = vec![vec![0.0; dim]; dim];
        for (f, dir) in mesh.cell_get_faces_and_dirs(c) {
            let n = mesh.face_normal(f);
            let xf = mesh.face_centroid(f);
            for i in 0..dim {
                for j in 0..dim {
                    m[i][j] += f64::from(dir) * mesh.face_area(f) * n[i] * (xf[j] - xc[j]);
                }
            }
        }
        for i in 0..dim {
            for j in 0..dim {
                let expected = if i == j { vol } else { 0.0 };
                assert!(
                    (m[i][j] - expected).abs() < TOL * (1.0 + vol),
                    "cell {c}: entry ({i},{j}) = {}, expected {expected}",
                    m[i][j]
                );
            }
        }
    }
}

/// Regions only contain boundary faces.
pub fn assert_regions_on_boundary(mesh: &dyn Mesh) {
    for name in mesh.region_names() {
        let faces = mesh.region_faces(&name).expect("listed region must resolve");
        for f in faces {
            assert!(mesh.is_boundary_face(f), "region {name} face {f} is interior");
        }
    }
}

/// Run every compliance check.
pub fn run_full_compliance(mesh: &dyn Mesh) {
    assert_face_cell_consistency(mesh);
    assert_face_multiplicity(mesh);
    assert_cells_closed(mesh);
    assert_divergence_identity(mesh);
    assert_regions_on_boundary(mesh);
}
