//! Boundary-condition markers consumed by the MFD operator.

/// Kind of condition imposed on a face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BcMarker {
    /// No condition. Boundary faces without one are no-flow.
    #[default]
    Unset,
    /// Prescribed face pressure.
    Dirichlet,
    /// Prescribed outward flux density.
    Flux,
}

/// Per-face markers and values.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryData {
    markers: Vec<BcMarker>,
    values: Vec<f64>,
}

impl BoundaryData {
    /// No conditions on `num_faces` faces.
    pub fn new(num_faces: usize) -> Self {
        Self {
            markers: vec![BcMarker::Unset; num_faces],
            values: vec![0.0; num_faces],
        }
    }

    /// Remove every condition.
    pub fn clear(&mut self) {
        self.markers.fill(BcMarker::Unset);
        self.values.fill(0.0);
    }

    /// Prescribe the pressure on `face`.
    pub fn set_dirichlet(&mut self, face: usize, value: f64) {
        self.markers[face] = BcMarker::Dirichlet;
        self.values[face] = value;
    }

    /// Prescribe the outward flux density through `face`.
    pub fn set_flux(&mut self, face: usize, value: f64) {
        self.markers[face] = BcMarker::Flux;
        self.values[face] = value;
    }

    /// Markers by face.
    pub fn markers(&self) -> &[BcMarker] {
        &self.markers
    }

    /// Values by face.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Faces carrying a Dirichlet condition with their values.
    pub fn dirichlet_faces(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.markers
            .iter()
            .zip(&self.values)
            .enumerate()
            .filter(|(_, (m, _))| **m == BcMarker::Dirichlet)
            .map(|(f, (_, v))| (f, *v))
    }
}
