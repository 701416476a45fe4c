//! Implicit time integration for the vadose flow solver.
//!
//! [`Bdf1`] advances any problem implementing [`ImplicitFn`] with backward
//! Euler and a preconditioned (optionally [`Nka`]-accelerated) nonlinear
//! iteration. Each attempt yields an explicit [`StepAttempt`]; retryable
//! failures cut the step and retry from the last accepted state, fatal
//! ones end the run with a [`StepError`](vadose_core::StepError).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod bdf1;
pub mod config;
pub mod nka;
pub mod outcome;
pub mod traits;

pub use bdf1::Bdf1;
pub use config::{Bdf1Config, NkaConfig};
pub use nka::Nka;
pub use outcome::{StepAttempt, StepReport, StepStats};
pub use traits::ImplicitFn;
