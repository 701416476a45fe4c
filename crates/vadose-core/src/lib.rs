//! Core types for the vadose flow solver.
//!
//! This is the leaf crate of the workspace. It defines field keys and mesh
//! entity kinds, the error taxonomy shared by every subsystem, the
//! composite field value stored in the field store, the nested solution
//! vector consumed by the time integrator, per-cell tensors and the
//! communicator seam for ghost exchange and reductions.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod comm;
pub mod composite;
pub mod error;
pub mod id;
pub mod tensor;
pub mod tree_vector;

pub use comm::{Communicator, SerialComm};
pub use composite::{ComponentSpec, CompositeVector, CompositeVectorSpace};
pub use error::{ConfigError, FieldError, NumericalFailure, StepError};
pub use id::{
    derivative_key, EntityCounts, EntityKind, Key, KeySet, Ownership, Point, CELL, FACE,
};
pub use tensor::Tensor;
pub use tree_vector::TreeVector;
