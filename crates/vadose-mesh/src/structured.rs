//! Orthogonal box mesh in one, two or three dimensions.

use crate::error::MeshError;
use crate::mesh::{CellFaces, FaceCells, Mesh};
use smallvec::{smallvec, SmallVec};
use vadose_core::{EntityCounts, EntityKind, Ownership, Point};

const AXIS_NAMES: [&str; 3] = ["x", "y", "z"];

/// A rectilinear mesh of uniform boxes.
///
/// Cells are numbered lexicographically with the first axis fastest. Faces
/// are grouped by the axis their normal points along (all x-normal faces,
/// then y, then z), each group numbered lexicographically with one extra
/// layer along its own axis. Face normals point in the positive axis
/// direction.
///
/// Boundary faces are exposed as regions `"xmin"`, `"xmax"`, `"ymin"`, …
/// plus `"boundary"` for all of them.
///
/// # Examples
///
/// ```
/// use vadose_mesh::{Mesh, StructuredMesh};
///
/// let mesh = StructuredMesh::line(3, 3.0).unwrap();
/// assert_eq!(mesh.num_cells(), 3);
/// assert_eq!(mesh.num_faces(), 4);
/// assert_eq!(mesh.face_get_cells(1, vadose_core::Ownership::Used).as_slice(), &[0, 1]);
/// assert!(mesh.is_boundary_face(0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredMesh {
    counts: SmallVec<[usize; 3]>,
    lower: Point,
    spacing: Point,
    /// First face id of each axis group, plus the total face count.
    face_offsets: SmallVec<[usize; 4]>,
}

impl StructuredMesh {
    /// Build a mesh with `counts[a]` cells spanning `[lower[a], upper[a]]`
    /// along each axis `a`.
    pub fn new(counts: &[usize], lower: &[f64], upper: &[f64]) -> Result<Self, MeshError> {
        let dim = counts.len();
        if dim != lower.len() || dim != upper.len() {
            return Err(MeshError::DimensionMismatch {
                counts: dim,
                lower: lower.len(),
                upper: upper.len(),
            });
        }
        if !(1..=3).contains(&dim) {
            return Err(MeshError::UnsupportedDimension { dim });
        }
        if counts.contains(&0) {
            return Err(MeshError::EmptyMesh);
        }
        for axis in 0..dim {
            let (lo, hi) = (lower[axis], upper[axis]);
            if !(lo.is_finite() && hi.is_finite() && hi > lo) {
                return Err(MeshError::InvalidExtent {
                    axis,
                    lower: lo,
                    upper: hi,
                });
            }
        }

        let spacing = (0..dim)
            .map(|a| (upper[a] - lower[a]) / counts[a] as f64)
            .collect();
        let mut face_offsets = smallvec![0];
        for axis in 0..dim {
            let layer: usize = (0..dim)
                .map(|a| if a == axis { counts[a] + 1 } else { counts[a] })
                .product();
            let last = face_offsets[axis];
            face_offsets.push(last + layer);
        }

        Ok(Self {
            counts: counts.iter().copied().collect(),
            lower: lower.iter().copied().collect(),
            spacing,
            face_offsets,
        })
    }

    /// `n` cells on `[0, length]`.
    pub fn line(n: usize, length: f64) -> Result<Self, MeshError> {
        Self::new(&[n], &[0.0], &[length])
    }

    /// `nx x ny` cells on `[0, lx] x [0, ly]`.
    pub fn rectangle(nx: usize, ny: usize, lx: f64, ly: f64) -> Result<Self, MeshError> {
        Self::new(&[nx, ny], &[0.0, 0.0], &[lx, ly])
    }

    /// `nx x ny x nz` cells on `[0, lx] x [0, ly] x [0, lz]`.
    pub fn brick(
        counts: [usize; 3],
        lengths: [f64; 3],
    ) -> Result<Self, MeshError> {
        Self::new(&counts, &[0.0; 3], &lengths)
    }

    /// Cells per axis.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Cell size per axis.
    pub fn spacing(&self) -> &[f64] {
        &self.spacing
    }

    fn dim(&self) -> usize {
        self.counts.len()
    }

    fn cell_count(&self) -> usize {
        self.counts.iter().product()
    }

    fn face_count(&self) -> usize {
        self.face_offsets[self.dim()]
    }

    /// Lexicographic index of `ijk` in a block with the given extents.
    fn flatten(ijk: &[usize], extents: &[usize]) -> usize {
        ijk.iter()
            .zip(extents)
            .rev()
            .fold(0, |acc, (&i, &n)| acc * n + i)
    }

    fn unflatten(mut index: usize, extents: &[usize]) -> SmallVec<[usize; 3]> {
        extents
            .iter()
            .map(|&n| {
                let i = index % n;
                index /= n;
                i
            })
            .collect()
    }

    fn face_extents(&self, axis: usize) -> SmallVec<[usize; 3]> {
        self.counts
            .iter()
            .enumerate()
            .map(|(a, &n)| if a == axis { n + 1 } else { n })
            .collect()
    }

    /// Index of a cell from its per-axis indices.
    pub fn cell_index(&self, ijk: &[usize]) -> usize {
        Self::flatten(ijk, &self.counts)
    }

    /// Per-axis indices of a cell.
    pub fn cell_ijk(&self, cell: usize) -> SmallVec<[usize; 3]> {
        Self::unflatten(cell, &self.counts)
    }

    /// Normal axis and per-axis indices of a face.
    fn face_ijk(&self, face: usize) -> (usize, SmallVec<[usize; 3]>) {
        let axis = (0..self.dim())
            .find(|&a| face < self.face_offsets[a + 1])
            .unwrap_or(self.dim() - 1);
        let local = face - self.face_offsets[axis];
        (axis, Self::unflatten(local, &self.face_extents(axis)))
    }

    fn face_index(&self, axis: usize, ijk: &[usize]) -> usize {
        self.face_offsets[axis] + Self::flatten(ijk, &self.face_extents(axis))
    }

    fn boundary_layer(&self, axis: usize, upper: bool) -> Vec<usize> {
        let extents = self.face_extents(axis);
        let layer = if upper { self.counts[axis] } else { 0 };
        let total: usize = extents.iter().product();
        (0..total)
            .filter_map(|local| {
                let ijk = Self::unflatten(local, &extents);
                (ijk[axis] == layer).then_some(self.face_offsets[axis] + local)
            })
            .collect()
    }
}

impl EntityCounts for StructuredMesh {
    fn entity_count(&self, kind: EntityKind, ownership: Ownership) -> usize {
        if ownership == Ownership::Ghost {
            return 0;
        }
        match kind {
            EntityKind::Cell => self.cell_count(),
            EntityKind::Face => self.face_count(),
        }
    }
}

impl Mesh for StructuredMesh {
    fn space_dimension(&self) -> usize {
        self.dim()
    }

    fn cell_centroid(&self, cell: usize) -> Point {
        let ijk = self.cell_ijk(cell);
        (0..self.dim())
            .map(|a| self.lower[a] + (ijk[a] as f64 + 0.5) * self.spacing[a])
            .collect()
    }

    fn cell_volume(&self, _cell: usize) -> f64 {
        self.spacing.iter().product()
    }

    fn face_centroid(&self, face: usize) -> Point {
        let (axis, ijk) = self.face_ijk(face);
        (0..self.dim())
            .map(|a| {
                let offset = if a == axis { 0.0 } else { 0.5 };
                self.lower[a] + (ijk[a] as f64 + offset) * self.spacing[a]
            })
            .collect()
    }

    fn face_area(&self, face: usize) -> f64 {
        let (axis, _) = self.face_ijk(face);
        (0..self.dim())
            .filter(|&a| a != axis)
            .map(|a| self.spacing[a])
            .product()
    }

    fn face_normal(&self, face: usize) -> Point {
        let (axis, _) = self.face_ijk(face);
        (0..self.dim())
            .map(|a| if a == axis { 1.0 } else { 0.0 })
            .collect()
    }

    fn face_get_cells(&self, face: usize, _ownership: Ownership) -> FaceCells {
        let (axis, ijk) = self.face_ijk(face);
        let mut cells = FaceCells::new();
        let mut cell_ijk = ijk.clone();
        if ijk[axis] > 0 {
            cell_ijk[axis] = ijk[axis] - 1;
            cells.push(self.cell_index(&cell_ijk));
        }
        if ijk[axis] < self.counts[axis] {
            cell_ijk[axis] = ijk[axis];
            cells.push(self.cell_index(&cell_ijk));
        }
        cells
    }

    fn cell_get_faces_and_dirs(&self, cell: usize) -> CellFaces {
        let ijk = self.cell_ijk(cell);
        let mut faces = CellFaces::new();
        for axis in 0..self.dim() {
            let mut face_ijk = ijk.clone();
            faces.push((self.face_index(axis, &face_ijk), -1));
            face_ijk[axis] += 1;
            faces.push((self.face_index(axis, &face_ijk), 1));
        }
        faces
    }

    fn region_names(&self) -> Vec<String> {
        let mut names: Vec<String> = AXIS_NAMES[..self.dim()]
            .iter()
            .flat_map(|a| [format!("{a}min"), format!("{a}max")])
            .collect();
        names.push("boundary".to_string());
        names
    }

    fn region_faces(&self, region: &str) -> Option<Vec<usize>> {
        if region == "boundary" {
            return Some(self.boundary_faces());
        }
        let axis = AXIS_NAMES[..self.dim()]
            .iter()
            .position(|a| region.starts_with(a))?;
        match &region[1..] {
            "min" => Some(self.boundary_layer(axis, false)),
            "max" => Some(self.boundary_layer(axis, true)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance;
    use proptest::prelude::*;

    #[test]
    fn line_topology() {
        let mesh = StructuredMesh::line(3, 3.0).unwrap();
        assert_eq!(mesh.space_dimension(), 1);
        assert_eq!(mesh.face_get_cells(0, Ownership::Used).as_slice(), &[0]);
        assert_eq!(mesh.face_get_cells(2, Ownership::Used).as_slice(), &[1, 2]);
        assert_eq!(mesh.face_get_cells(3, Ownership::Used).as_slice(), &[2]);
        assert_eq!(mesh.cell_get_faces_and_dirs(1).as_slice(), &[(1, -1), (2, 1)]);
        assert_eq!(mesh.boundary_faces(), vec![0, 3]);
        assert_eq!(mesh.face_area(1), 1.0);
        assert_eq!(mesh.cell_centroid(2).as_slice(), &[2.5]);
    }

    #[test]
    fn rectangle_counts_and_regions() {
        let mesh = StructuredMesh::rectangle(3, 2, 3.0, 1.0).unwrap();
        assert_eq!(mesh.num_cells(), 6);
        // 4x2 x-normal faces + 3x3 y-normal faces.
        assert_eq!(mesh.num_faces(), 17);
        assert_eq!(mesh.region_faces("xmin").unwrap().len(), 2);
        assert_eq!(mesh.region_faces("ymax").unwrap().len(), 3);
        assert_eq!(mesh.region_faces("boundary").unwrap().len(), 10);
        assert!(mesh.region_faces("zmin").is_none());
        assert!(mesh.region_faces("left").is_none());
        assert_eq!(mesh.face_area(0), 0.5);
        assert_eq!(mesh.cell_volume(0), 0.5);
    }

    #[test]
    fn construction_errors() {
        assert_eq!(StructuredMesh::line(0, 1.0).unwrap_err(), MeshError::EmptyMesh);
        assert!(matches!(
            StructuredMesh::line(2, -1.0),
            Err(MeshError::InvalidExtent { axis: 0, .. })
        ));
        assert!(matches!(
            StructuredMesh::new(&[1, 1], &[0.0], &[1.0, 1.0]),
            Err(MeshError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            StructuredMesh::new(&[1; 4], &[0.0; 4], &[1.0; 4]),
            Err(MeshError::UnsupportedDimension { dim: 4 })
        ));
    }

    #[test]
    fn compliance_line() {
        compliance::run_full_compliance(&StructuredMesh::line(5, 2.0).unwrap());
    }

    #[test]
    fn compliance_rectangle() {
        compliance::run_full_compliance(&StructuredMesh::rectangle(4, 3, 2.0, 1.5).unwrap());
    }

    #[test]
    fn compliance_brick() {
        compliance::run_full_compliance(&StructuredMesh::brick([2, 3, 2], [1.0, 2.0, 0.5]).unwrap());
    }

    proptest! {
        #[test]
        fn compliance_random_rectangles(
            nx in 1usize..6,
            ny in 1usize..6,
            lx in 0.1f64..10.0,
            ly in 0.1f64..10.0,
        ) {
            compliance::run_full_compliance(&StructuredMesh::rectangle(nx, ny, lx, ly).unwrap());
        }
    }
}
