//! Criterion micro-benchmarks for MFD assembly, factorization and flux
//! recovery on a 20x20 rectangle.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use vadose_core::{CompositeVector, CompositeVectorSpace, EntityKind, Tensor, CELL, FACE};
use vadose_mesh::Mesh;
use vadose_operators::{create_linear_solver, BoundaryData, MfdOperator};
use vadose_test_utils::rectangle_mesh;

fn pressure_like(mesh: &dyn Mesh, value: f64) -> CompositeVector {
    let mut space = CompositeVectorSpace::new();
    space
        .add_component(CELL, EntityKind::Cell, 1)
        .unwrap()
        .add_component(FACE, EntityKind::Face, 1)
        .unwrap();
    let mut x = space.create(mesh);
    x.put_scalar(value);
    x
}

fn setup() -> (Arc<dyn Mesh>, MfdOperator, BoundaryData) {
    let mesh = rectangle_mesh(20, 20, 4.0, 4.0);
    let mut op = MfdOperator::new(
        Arc::clone(&mesh),
        false,
        create_linear_solver("dense lu").unwrap(),
    );
    let tensors = vec![Tensor::diagonal(&[1.0, 0.5]); mesh.num_cells()];
    op.assemble_mass_matrices(&tensors).unwrap();
    op.set_gravity(&vec![1000.0; mesh.num_cells()], &[0.0, -9.8])
        .unwrap();
    let mut bc = BoundaryData::new(mesh.num_faces());
    for f in mesh.region_faces("ymax").unwrap() {
        bc.set_dirichlet(f, 101325.0);
    }
    (mesh, op, bc)
}

/// Benchmark: rebuild all 400 local mass matrices.
fn bench_mass_matrices_400(c: &mut Criterion) {
    let (mesh, mut op, _) = setup();
    let tensors = vec![Tensor::isotropic(2, 1.0); mesh.num_cells()];
    c.bench_function("mfd_mass_matrices_400", |b| {
        b.iter(|| {
            op.assemble_mass_matrices(black_box(&tensors)).unwrap();
        });
    });
}

/// Benchmark: scale by upwinded coefficients and apply boundary conditions.
fn bench_stiffness_400(c: &mut Criterion) {
    let (mesh, mut op, bc) = setup();
    let coef = pressure_like(mesh.as_ref(), 0.7);
    c.bench_function("mfd_stiffness_400", |b| {
        b.iter(|| {
            op.assemble_stiffness(black_box(&coef)).unwrap();
            op.apply_boundary_conditions(&bc).unwrap();
        });
    });
}

/// Benchmark: residual evaluation `A x - b`.
fn bench_residual_400(c: &mut Criterion) {
    let (mesh, mut op, bc) = setup();
    let coef = pressure_like(mesh.as_ref(), 1.0);
    op.assemble_stiffness(&coef).unwrap();
    op.apply_boundary_conditions(&bc).unwrap();
    let x = pressure_like(mesh.as_ref(), 9.0e4);
    let mut r = x.clone();
    c.bench_function("mfd_residual_400", |b| {
        b.iter(|| {
            op.compute_residual(black_box(&x), &mut r).unwrap();
            black_box(&r);
        });
    });
}

/// Benchmark: dense LU of the 1240-unknown cell/face system.
fn bench_factorize_400(c: &mut Criterion) {
    let (mesh, mut op, bc) = setup();
    let coef = pressure_like(mesh.as_ref(), 1.0);
    op.assemble_stiffness(&coef).unwrap();
    op.apply_boundary_conditions(&bc).unwrap();
    op.add_cell_diagonal(&vec![1e-3; mesh.num_cells()]).unwrap();
    let mut group = c.benchmark_group("mfd_factorize");
    group.sample_size(10);
    group.bench_function("400_cells", |b| {
        b.iter(|| {
            op.factorize().unwrap();
        });
    });
    group.finish();
}

/// Benchmark: face fluxes and cell velocities from a pressure field.
fn bench_flux_recovery_400(c: &mut Criterion) {
    let (mesh, mut op, bc) = setup();
    let coef = pressure_like(mesh.as_ref(), 1.0);
    op.assemble_stiffness(&coef).unwrap();
    op.apply_boundary_conditions(&bc).unwrap();
    let x = pressure_like(mesh.as_ref(), 9.0e4);
    let mut flux = {
        let mut space = CompositeVectorSpace::new();
        space.add_component(FACE, EntityKind::Face, 1).unwrap();
        space.create(mesh.as_ref())
    };
    let mut velocity = {
        let mut space = CompositeVectorSpace::new();
        space.add_component(CELL, EntityKind::Cell, 2).unwrap();
        space.create(mesh.as_ref())
    };
    c.bench_function("mfd_flux_recovery_400", |b| {
        b.iter(|| {
            op.derive_flux(black_box(&x), &mut flux).unwrap();
            op.derive_cell_velocity(&flux, &mut velocity).unwrap();
            black_box(&velocity);
        });
    });
}

criterion_group!(
    benches,
    bench_mass_matrices_400,
    bench_stiffness_400,
    bench_residual_400,
    bench_factorize_400,
    bench_flux_recovery_400
);
criterion_main!(benches);
