//! Error types for mesh construction.

use std::fmt;

/// Errors arising from mesh construction.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshError {
    /// Only one, two and three dimensional meshes are supported.
    UnsupportedDimension {
        /// The requested dimension.
        dim: usize,
    },
    /// Cell counts and extents disagree on the dimension.
    DimensionMismatch {
        /// Length of the cell-count list.
        counts: usize,
        /// Length of the lower-corner list.
        lower: usize,
        /// Length of the upper-corner list.
        upper: usize,
    },
    /// An axis has zero cells.
    EmptyMesh,
    /// An axis has a non-positive or non-finite extent.
    InvalidExtent {
        /// Axis index.
        axis: usize,
        /// Lower coordinate.
        lower: f64,
        /// Upper coordinate.
        upper: f64,
    },
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedDimension { dim } => {
                write!(f, "unsupported mesh dimension {dim} (expected 1, 2 or 3)")
            }
            Self::DimensionMismatch {
                counts,
                lower,
                upper,
            } => write!(
                f,
                "dimension mismatch: {counts} cell counts, {lower} lower and {upper} upper coordinates"
            ),
            Self::EmptyMesh => write!(f, "mesh must have at least one cell per axis"),
            Self::InvalidExtent { axis, lower, upper } => {
                write!(f, "axis {axis} has invalid extent [{lower}, {upper}]")
            }
        }
    }
}

impl std::error::Error for MeshError {}
