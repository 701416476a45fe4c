//! Accepted and trial copies of the store.

use vadose_core::FieldError;

use crate::state::State;

/// The `current` (last accepted) and `next` (trial) time levels.
///
/// Both are full stores with their own evaluators, so memoized values in
/// one never leak into the other.
#[derive(Clone, Debug)]
pub struct TimeLevels {
    current: State,
    next: State,
}

impl TimeLevels {
    /// Start both levels from a set-up store.
    pub fn new(state: State) -> Self {
        let next = state.clone();
        Self {
            current: state,
            next,
        }
    }

    /// Last accepted state.
    pub fn current(&self) -> &State {
        &self.current
    }

    /// Mutable access to the accepted state.
    pub fn current_mut(&mut self) -> &mut State {
        &mut self.current
    }

    /// Trial state.
    pub fn next(&self) -> &State {
        &self.next
    }

    /// Mutable access to the trial state.
    pub fn next_mut(&mut self) -> &mut State {
        &mut self.next
    }

    /// Both levels at once.
    pub fn split_mut(&mut self) -> (&mut State, &mut State) {
        (&mut self.current, &mut self.next)
    }

    /// Accept the trial state.
    pub fn commit(&mut self) -> Result<(), FieldError> {
        self.current.copy_data_from(&self.next)
    }

    /// Discard the trial state.
    pub fn rollback(&mut self) -> Result<(), FieldError> {
        self.next.copy_data_from(&self.current)
    }
}
