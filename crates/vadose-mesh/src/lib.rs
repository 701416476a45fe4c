//! Mesh geometry and topology for the vadose flow solver.
//!
//! This crate defines the [`Mesh`] trait, the interface through which the
//! discretization and the process kernel see the spatial domain, and
//! [`StructuredMesh`], an orthogonal box mesh backend.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod mesh;
pub mod structured;

#[cfg(test)]
pub(crate) mod compliance;

pub use error::MeshError;
pub use mesh::{CellFaces, FaceCells, Mesh};
pub use structured::StructuredMesh;
