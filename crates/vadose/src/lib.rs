//! Vadose: variably saturated subsurface flow.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! vadose sub-crates. For most users, adding `vadose` as a single dependency
//! is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use vadose::prelude::*;
//!
//! // A 1 m column in ten cells, gravity along x.
//! let mesh: Arc<dyn Mesh> = Arc::new(StructuredMesh::line(10, 1.0).unwrap());
//! let config = RichardsConfig::from_json_str(
//!     r#"{
//!         "relative_permeability_method": "upwind with gravity",
//!         "water_retention_model": { "type": "van Genuchten", "alpha": 1e-4, "n": 2.0 },
//!         "initial_condition": { "type": "uniform", "pressure": 9.0e4 }
//!     }"#,
//! )
//! .unwrap();
//!
//! let mut richards = Richards::new(mesh, &config, &flow_registry()).unwrap();
//! richards.initialize(0.0).unwrap();
//! let report = richards.advance(1.0).unwrap();
//! assert_eq!(report.t_new, 1.0);
//!
//! let p = richards.state().get_field_value("pressure").unwrap();
//! assert!(p.first_non_finite().is_none());
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `vadose-core` | Keys, errors, composite vectors, tensors, communicators |
//! | [`mesh`] | `vadose-mesh` | Mesh trait and structured meshes |
//! | [`state`] | `vadose-state` | Field store, evaluator graph and registry |
//! | [`operators`] | `vadose-operators` | Upwinding, MFD operator, linear solvers |
//! | [`time`] | `vadose-time` | BDF1 integrator and step control |
//! | [`flow`] | `vadose-flow` | Richards kernel, water retention models, boundary conditions |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types (`vadose-core`).
///
/// The error taxonomy ([`types::StepError`], [`types::FieldError`],
/// [`types::ConfigError`]), [`types::CompositeVector`] and the
/// [`types::Communicator`] seam.
pub use vadose_core as types;

/// Meshes (`vadose-mesh`).
pub use vadose_mesh as mesh;

/// Field store and evaluators (`vadose-state`).
///
/// [`state::State`] owns every field; [`state::EvaluatorRegistry`] maps
/// configuration names to evaluator constructors.
pub use vadose_state as state;

/// Discretization operators (`vadose-operators`).
pub use vadose_operators as operators;

/// Time integration (`vadose-time`).
///
/// [`time::Bdf1`] advances any [`time::ImplicitFn`].
pub use vadose_time as time;

/// The Richards process kernel (`vadose-flow`).
pub use vadose_flow as flow;

/// Common imports for typical vadose usage.
///
/// ```rust
/// use vadose::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use vadose_core::{
        Communicator, CompositeVector, EntityKind, SerialComm, Tensor, TreeVector, CELL, FACE,
    };

    // Errors
    pub use vadose_core::{ConfigError, FieldError, NumericalFailure, StepError};

    // Mesh
    pub use vadose_mesh::{Mesh, StructuredMesh};

    // Field store
    pub use vadose_state::{
        EvaluatorRegistry, EvaluatorSpec, FieldEvaluator, SecondaryModel,
        SecondaryVariableEvaluator, State,
    };

    // Time integration
    pub use vadose_time::{Bdf1, Bdf1Config, ImplicitFn, StepReport};

    // Flow
    pub use vadose_flow::{
        flow_registry, BoundaryConditionsConfig, BoundarySpec, InitialCondition, Richards,
        RichardsConfig, TimeFunction,
    };
}
