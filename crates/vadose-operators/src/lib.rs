//! Discretization operators for the vadose flow solver.
//!
//! - [`upwinding`]: face values of a cell-centered coefficient, selected
//!   by name through [`create_upwinding`].
//! - [`mfd`]: the mimetic finite difference diffusion operator over cell
//!   and face pressures.
//! - [`boundary`]: per-face boundary-condition markers.
//! - [`linear`]: the linear solver seam and its dense LU implementation.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod boundary;
pub mod linear;
pub mod mfd;
pub mod upwinding;

pub use boundary::{BcMarker, BoundaryData};
pub use linear::{create_linear_solver, DenseLu, LinearSolver, LINEAR_SOLVERS};
pub use mfd::MfdOperator;
pub use upwinding::{
    create_upwinding, ArithmeticMean, CellCentered, UpwindFields, UpwindGravityFlux, UpwindParams,
    UpwindTotalFlux, Upwinding, UPWIND_METHODS,
};
