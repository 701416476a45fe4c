//! Richards equation process kernel for the vadose flow solver.
//!
//! [`Richards`] advances liquid pressure in a variably saturated porous
//! medium. The discretization lives in [`RichardsPhysics`]: an MFD
//! diffusion operator over cell and face pressures, upwinded relative
//! permeability and a water-content accumulation term, all fed by
//! evaluators in the field store. Constitutive relations ([`wrm`],
//! [`relations`]) are registered by name so configurations can swap them.
//!
//! Sign conventions: face fluxes are positive along the face normal, flux
//! boundary conditions are positive out of the domain, and the cell
//! residual is net outflow plus accumulation minus source.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod bc;
pub mod config;
pub mod functions;
pub mod initial;
pub mod keys;
pub mod physics;
pub mod relations;
pub mod richards;
pub mod wrm;

pub use bc::{BoundaryConditionsConfig, BoundaryFunctions, BoundarySpec};
pub use config::{OperatorConfig, RichardsConfig, STANDARD_GRAVITY};
pub use functions::TimeFunction;
pub use initial::{face_values_from_cells, InitialCondition};
pub use physics::RichardsPhysics;
pub use relations::{
    flow_registry, register_flow_evaluators, RelativePermeabilityModel, SaturationModel,
    WaterContentModel,
};
pub use richards::Richards;
pub use wrm::{create_wrm, BrooksCorey, VanGenuchten, WaterRetentionModel, WRM_MODELS};
