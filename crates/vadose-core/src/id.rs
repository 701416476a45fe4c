//! Field keys, mesh entity kinds and the [`Point`] type alias.

use indexmap::IndexSet;
use smallvec::SmallVec;
use std::fmt;

/// Name of a field in the field store (e.g. `"pressure"`).
pub type Key = String;

/// Ordered set of field keys, used for evaluator dependency lists.
///
/// Iteration order is insertion order, which keeps evaluation and error
/// reporting deterministic.
pub type KeySet = IndexSet<Key>;

/// A point or direction in up to three spatial dimensions.
///
/// Length equals the mesh's space dimension.
pub type Point = SmallVec<[f64; 3]>;

/// Conventional component name for cell-centered data.
pub const CELL: &str = "cell";

/// Conventional component name for face-centered data.
pub const FACE: &str = "face";

/// Kind of mesh entity a component lives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// Mesh cells (control volumes).
    Cell,
    /// Mesh faces (cell interfaces and boundary faces).
    Face,
}

impl EntityKind {
    /// The conventional component name for this entity kind.
    pub fn component_name(self) -> &'static str {
        match self {
            Self::Cell => CELL,
            Self::Face => FACE,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.component_name())
    }
}

/// Ownership class used when counting or listing mesh entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// Entities owned by this participant.
    Owned,
    /// Ghost entities mirrored from neighbouring participants.
    Ghost,
    /// Owned followed by ghost entities.
    Used,
}

/// Entity counts by kind and ownership class.
///
/// Implemented by meshes; consumed when allocating composite vectors.
pub trait EntityCounts {
    /// Number of entities of `kind` in the given ownership class.
    fn entity_count(&self, kind: EntityKind, ownership: Ownership) -> usize;
}

/// Key of the field holding `∂key/∂wrt`.
pub fn derivative_key(key: &str, wrt: &str) -> Key {
    format!("d{key}_d{wrt}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_names_match_components() {
        assert_eq!(EntityKind::Cell.component_name(), CELL);
        assert_eq!(EntityKind::Face.to_string(), "face");
    }

    #[test]
    fn derivative_key_format() {
        assert_eq!(
            derivative_key("water_content", "pressure"),
            "dwater_content_dpressure"
        );
    }
}
