//! Dependency graph validation.

use indexmap::IndexMap;
use vadose_core::{FieldError, Key};

use crate::state::State;

/// Evaluator keys ordered so that every key follows its dependencies.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvaluationOrder {
    keys: Vec<Key>,
}

impl EvaluationOrder {
    /// Keys in dependency order.
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Position of `key`, if it has an evaluator.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Validate the evaluator graph held by `s`.
///
/// # Checks
///
/// 1. Every dependency names a field with a registered evaluator.
/// 2. The graph is acyclic. A cycle is reported as the path that closes
///    it, starting and ending with the same key.
///
/// Returns a topological order on success.
pub fn validate_graph(s: &State) -> Result<EvaluationOrder, FieldError> {
    let mut marks: IndexMap<Key, Mark> = IndexMap::new();
    let mut order = Vec::new();
    let mut path = Vec::new();
    for key in s.evaluator_keys() {
        visit(s, key, &mut marks, &mut path, &mut order)?;
    }
    Ok(EvaluationOrder { keys: order })
}

fn visit(
    s: &State,
    key: &str,
    marks: &mut IndexMap<Key, Mark>,
    path: &mut Vec<Key>,
    order: &mut Vec<Key>,
) -> Result<(), FieldError> {
    match marks.get(key) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::InProgress) => {
            let start = path.iter().position(|k| k == key).unwrap_or(0);
            let mut cycle: Vec<Key> = path[start..].to_vec();
            cycle.push(key.to_string());
            return Err(FieldError::CyclicDependency { cycle });
        }
        None => {}
    }

    // 1. Dependency existence
    let evaluator = s.get_evaluator(key)?;
    if !s.has_field(key) {
        return Err(FieldError::UnknownField {
            key: key.to_string(),
        });
    }

    marks.insert(key.to_string(), Mark::InProgress);
    path.push(key.to_string());

    // 2. Depth-first over dependencies
    for dep in evaluator.dependencies() {
        if !s.has_evaluator(dep) {
            return Err(FieldError::MissingEvaluator { key: dep.clone() });
        }
        visit(s, dep, marks, path, order)?;
    }

    path.pop();
    marks.insert(key.to_string(), Mark::Done);
    order.push(key.to_string());
    Ok(())
}
