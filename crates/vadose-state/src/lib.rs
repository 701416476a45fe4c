//! Field store and evaluator graph for the vadose flow solver.
//!
//! A [`State`] owns every named field on a mesh together with the
//! evaluator that computes it. Consumers ask for values through
//! [`State::value`] and [`State::changed`]; evaluators recompute lazily
//! and at most once per change of their inputs. Partial derivatives are
//! available through [`State::derivative`] and are assembled by the chain
//! rule across the graph.
//!
//! Evaluators come in three kinds: primary variables set from outside,
//! independent variables computed once from the mesh, and secondary
//! variables computed by a [`SecondaryModel`]. The [`EvaluatorRegistry`]
//! maps configuration type names to evaluator constructors.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod evaluator;
pub mod field;
pub mod graph;
pub mod independent;
pub mod models;
pub mod primary;
pub mod registry;
pub mod secondary;
pub mod state;
pub mod time_levels;

pub use evaluator::{ChangeTracker, FieldEvaluator};
pub use field::Field;
pub use graph::{validate_graph, EvaluationOrder};
pub use independent::{
    CellVolumeModel, ConstantModel, IndependentModel, IndependentVariableEvaluator,
};
pub use models::LinearCombinationModel;
pub use primary::PrimaryVariableEvaluator;
pub use registry::{EvaluatorConstructor, EvaluatorRegistry, EvaluatorSpec};
pub use secondary::{SecondaryModel, SecondaryVariableEvaluator};
pub use state::{State, VALUE_REQUEST};
pub use time_levels::TimeLevels;
