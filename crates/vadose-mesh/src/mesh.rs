//! The [`Mesh`] trait: geometry and topology consumed by the solver core.

use smallvec::SmallVec;
use std::fmt;
use vadose_core::{EntityCounts, EntityKind, Ownership, Point};

/// Cells adjacent to a face: one for boundary faces, two otherwise.
pub type FaceCells = SmallVec<[usize; 2]>;

/// Faces of a cell with their orientation relative to the cell.
///
/// The orientation is `+1` when the face normal points out of the cell and
/// `-1` when it points in.
pub type CellFaces = SmallVec<[(usize, i8); 6]>;

/// Geometry and adjacency of an unstructured cell/face mesh.
///
/// Entity ids are dense indices: cells in `0..entity_count(Cell, Used)`,
/// faces in `0..entity_count(Face, Used)`, owned entities first.
///
/// Every face has a fixed unit normal. For an interior face the normal
/// points from `face_get_cells(f)[0]` into `face_get_cells(f)[1]`; for a
/// boundary face the orientation relative to its single cell is given by
/// [`cell_get_faces_and_dirs`](Mesh::cell_get_faces_and_dirs).
pub trait Mesh: EntityCounts + fmt::Debug + Send + Sync {
    /// Number of spatial dimensions.
    fn space_dimension(&self) -> usize;

    /// Centroid of a cell.
    fn cell_centroid(&self, cell: usize) -> Point;

    /// Volume of a cell (length in 1D, area in 2D).
    fn cell_volume(&self, cell: usize) -> f64;

    /// Centroid of a face.
    fn face_centroid(&self, face: usize) -> Point;

    /// Area of a face (1 in 1D, length in 2D).
    fn face_area(&self, face: usize) -> f64;

    /// Unit normal of a face.
    fn face_normal(&self, face: usize) -> Point;

    /// Cells sharing a face, restricted to an ownership class.
    fn face_get_cells(&self, face: usize, ownership: Ownership) -> FaceCells;

    /// Faces bounding a cell with their orientation.
    fn cell_get_faces_and_dirs(&self, cell: usize) -> CellFaces;

    /// Names of the face regions this mesh defines.
    fn region_names(&self) -> Vec<String>;

    /// Faces in a named region, or `None` for an unknown region.
    fn region_faces(&self, region: &str) -> Option<Vec<usize>>;

    /// Owned cell count.
    fn num_cells(&self) -> usize {
        self.entity_count(EntityKind::Cell, Ownership::Owned)
    }

    /// Owned face count.
    fn num_faces(&self) -> usize {
        self.entity_count(EntityKind::Face, Ownership::Owned)
    }

    /// Whether a face lies on the domain boundary.
    fn is_boundary_face(&self, face: usize) -> bool {
        self.face_get_cells(face, Ownership::Used).len() == 1
    }

    /// All owned boundary faces in ascending order.
    fn boundary_faces(&self) -> Vec<usize> {
        (0..self.num_faces())
            .filter(|&f| self.is_boundary_face(f))
            .collect()
    }
}
