//! Test fixtures and mock types for vadose development.
//!
//! Provides small meshes, a [`LoopbackComm`] that counts reductions,
//! secondary-model fixtures in [`fixtures`] and a finite-difference
//! derivative checker in [`fd`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fd;
pub mod fixtures;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vadose_core::{Communicator, EntityKind};
use vadose_mesh::{Mesh, StructuredMesh};
use vadose_state::State;

/// `n` unit-free cells on `[0, length]`.
pub fn line_mesh(n: usize, length: f64) -> Arc<dyn Mesh> {
    Arc::new(StructuredMesh::line(n, length).expect("valid line mesh"))
}

/// `nx × ny` cells on `[0, lx] × [0, ly]`.
pub fn rectangle_mesh(nx: usize, ny: usize, lx: f64, ly: f64) -> Arc<dyn Mesh> {
    Arc::new(StructuredMesh::rectangle(nx, ny, lx, ly).expect("valid rectangle mesh"))
}

/// An empty store over a line of `n` cells.
pub fn line_state(n: usize) -> State {
    State::new(line_mesh(n, n as f64))
}

/// Single-participant communicator that counts every call.
///
/// Ghost exchange copies nothing (there are no ghosts on one rank) but is
/// recorded, so tests can assert that exchanges and reductions happen.
#[derive(Debug, Default)]
pub struct LoopbackComm {
    scatters: AtomicUsize,
    reductions: AtomicUsize,
}

impl LoopbackComm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scatters(&self) -> usize {
        self.scatters.load(Ordering::Relaxed)
    }

    pub fn reductions(&self) -> usize {
        self.reductions.load(Ordering::Relaxed)
    }
}

impl Communicator for LoopbackComm {
    fn size(&self) -> usize {
        1
    }

    fn rank(&self) -> usize {
        0
    }

    fn scatter_master_to_ghosted(
        &self,
        _kind: EntityKind,
        _num_dofs: usize,
        _owned: usize,
        _data: &mut [f64],
    ) {
        self.scatters.fetch_add(1, Ordering::Relaxed);
    }

    fn sum_all(&self, value: f64) -> f64 {
        self.reductions.fetch_add(1, Ordering::Relaxed);
        value
    }

    fn max_all(&self, value: f64) -> f64 {
        self.reductions.fetch_add(1, Ordering::Relaxed);
        value
    }
}
