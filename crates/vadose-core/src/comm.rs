//! Communicator seam for ghost exchange and global reductions.
//!
//! The solver core runs identical local work on each participant's
//! partition and synchronizes only through this trait. [`SerialComm`] is
//! the single-participant implementation.

use crate::id::EntityKind;
use std::fmt;

/// Collective operations between participants of a decomposed run.
pub trait Communicator: fmt::Debug + Send + Sync {
    /// Number of participants.
    fn size(&self) -> usize;

    /// This participant's rank in `0..size()`.
    fn rank(&self) -> usize;

    /// Overwrite the ghost entries of `data` with their owners' values.
    ///
    /// `data` holds `owned` entities followed by ghost entities, each with
    /// `num_dofs` scalars, for entities of `kind`.
    fn scatter_master_to_ghosted(
        &self,
        kind: EntityKind,
        num_dofs: usize,
        owned: usize,
        data: &mut [f64],
    );

    /// Sum of `local` over all participants.
    fn sum_all(&self, local: f64) -> f64;

    /// Maximum of `local` over all participants.
    fn max_all(&self, local: f64) -> f64;
}

/// Communicator for a single participant: no ghosts, identity reductions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn size(&self) -> usize {
        1
    }

    fn rank(&self) -> usize {
        0
    }

    fn scatter_master_to_ghosted(&self, _: EntityKind, _: usize, _: usize, _: &mut [f64]) {}

    fn sum_all(&self, local: f64) -> f64 {
        local
    }

    fn max_all(&self, local: f64) -> f64 {
        local
    }
}
