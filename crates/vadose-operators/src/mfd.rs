//! Mimetic finite difference (MFD) diffusion operator over cell and face
//! pressures.
//!
//! For each cell `c` with faces `i`, the outward flux through face `i` is
//!
//! ```text
//! Q_i = k_i Σ_j W_ij (p_c - λ_j) + k_i G_i
//! ```
//!
//! where `W` is the local inverse mass matrix, `k` the face (or cell)
//! coefficient and `G = N K ρ g` the gravity flux. The global system has
//! one mass-balance row per cell (`Σ_i Q_i`) and one continuity row per
//! face (`-Σ Q` over its cells), ordered cells first, then faces. It is
//! symmetric whenever `W` is scaled by a single coefficient per cell.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use tracing::trace;
use vadose_core::{
    CompositeVector, FieldError, NumericalFailure, Ownership, Point, StepError, Tensor, CELL, FACE,
};
use vadose_mesh::{CellFaces, Mesh};

use crate::boundary::{BcMarker, BoundaryData};
use crate::linear::LinearSolver;

/// Geometry-and-permeability part of one cell's operator.
#[derive(Clone, Debug)]
struct LocalMass {
    faces: CellFaces,
    /// Inverse mass matrix `W`.
    w: DMatrix<f64>,
    /// Unscaled gravity flux `N K ρ g`, zero without gravity.
    gravity: DVector<f64>,
}

/// One cell's scaled block, with boundary conditions folded in.
#[derive(Clone, Debug)]
struct LocalBlock {
    acc: f64,
    acf: DVector<f64>,
    afc: DVector<f64>,
    aff: DMatrix<f64>,
}

/// MFD operator with its right-hand side and factorization.
#[derive(Debug)]
pub struct MfdOperator {
    mesh: Arc<dyn Mesh>,
    symmetric: bool,
    tensors: Vec<Tensor>,
    mass: Vec<LocalMass>,
    /// `diag(k) W` per cell, before boundary conditions.
    stiffness: Vec<DMatrix<f64>>,
    /// `k ⊙ G` per cell.
    gravity_flux: Vec<DVector<f64>>,
    blocks: Vec<LocalBlock>,
    rhs_cells: Vec<f64>,
    rhs_faces: Vec<f64>,
    dirichlet: Vec<Option<f64>>,
    cell_diagonal: Vec<f64>,
    solver: Box<dyn LinearSolver>,
    factored: bool,
}

impl MfdOperator {
    /// An operator on `mesh`. A `symmetric` operator scales each cell block
    /// by the cell coefficient instead of face coefficients.
    pub fn new(mesh: Arc<dyn Mesh>, symmetric: bool, solver: Box<dyn LinearSolver>) -> Self {
        let nc = mesh.num_cells();
        let nf = mesh.num_faces();
        Self {
            mesh,
            symmetric,
            tensors: Vec::new(),
            mass: Vec::new(),
            stiffness: Vec::new(),
            gravity_flux: Vec::new(),
            blocks: Vec::new(),
            rhs_cells: vec![0.0; nc],
            rhs_faces: vec![0.0; nf],
            dirichlet: vec![None; nf],
            cell_diagonal: vec![0.0; nc],
            solver,
            factored: false,
        }
    }

    /// Whether blocks are scaled by cell coefficients.
    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    /// Switch between cell and face coefficient scaling.
    pub fn set_symmetric(&mut self, symmetric: bool) {
        self.symmetric = symmetric;
    }

    /// Number of global unknowns (cells, then faces).
    pub fn num_unknowns(&self) -> usize {
        self.mesh.num_cells() + self.mesh.num_faces()
    }

    /// Build `W = (1/|c|) N K Nᵀ + P Λ P` for every cell.
    ///
    /// `N_i = |f_i| n_iᵀ` with outward normals, `P` projects onto the
    /// complement of the face-centroid offsets `x_f - x_c` and `Λ` holds
    /// the two-point half transmissibilities.
    pub fn assemble_mass_matrices(&mut self, tensors: &[Tensor]) -> Result<(), FieldError> {
        let mesh = Arc::clone(&self.mesh);
        let nc = mesh.num_cells();
        if tensors.len() != nc {
            return Err(FieldError::ShapeMismatch {
                reason: format!("{} tensors for {nc} cells", tensors.len()),
            });
        }
        let dim = mesh.space_dimension();
        let mut mass = Vec::with_capacity(nc);
        for (c, k) in tensors.iter().enumerate() {
            let faces = mesh.cell_get_faces_and_dirs(c);
            let nf = faces.len();
            let xc = mesh.cell_centroid(c);
            let volume = mesh.cell_volume(c);

            let mut n = DMatrix::<f64>::zeros(nf, dim);
            let mut r = DMatrix::<f64>::zeros(nf, dim);
            let mut lambda = DVector::<f64>::zeros(nf);
            for (i, &(f, dir)) in faces.iter().enumerate() {
                let area = mesh.face_area(f);
                let normal = mesh.face_normal(f);
                let xf = mesh.face_centroid(f);
                let mut offset_n = 0.0;
                for d in 0..dim {
                    n[(i, d)] = area * f64::from(dir) * normal[d];
                    r[(i, d)] = xf[d] - xc[d];
                    offset_n += r[(i, d)] * normal[d];
                }
                if offset_n == 0.0 {
                    return Err(FieldError::ShapeMismatch {
                        reason: format!("face {f} centroid lies in the plane of cell {c}"),
                    });
                }
                lambda[i] = k.inner(&normal, &normal) * area / offset_n.abs();
            }

            let consistency = &n * k.matrix() * n.transpose() / volume;
            let rtr = r.transpose() * &r;
            let rtr_inv = rtr.try_inverse().ok_or_else(|| FieldError::ShapeMismatch {
                reason: format!("cell {c} face offsets do not span the space"),
            })?;
            let p = DMatrix::identity(nf, nf) - &r * rtr_inv * r.transpose();
            let stability = &p * DMatrix::from_diagonal(&lambda) * &p;

            mass.push(LocalMass {
                faces,
                w: consistency + stability,
                gravity: DVector::zeros(nf),
            });
        }
        self.tensors = tensors.to_vec();
        self.mass = mass;
        Ok(())
    }

    /// Set the gravity flux `G = N K ρ g` from per-cell densities.
    pub fn set_gravity(&mut self, density: &[f64], gravity: &[f64]) -> Result<(), FieldError> {
        self.check_mass()?;
        let dim = self.mesh.space_dimension();
        if gravity.len() != dim || density.len() != self.mass.len() {
            return Err(FieldError::ShapeMismatch {
                reason: format!(
                    "gravity with {} components and {} densities on a {dim}D mesh with {} cells",
                    gravity.len(),
                    density.len(),
                    self.mass.len()
                ),
            });
        }
        for (c, local) in self.mass.iter_mut().enumerate() {
            let kg: Point = self.tensors[c].apply(gravity);
            for (i, &(f, dir)) in local.faces.iter().enumerate() {
                let normal = self.mesh.face_normal(f);
                let kg_n: f64 = normal.iter().zip(&kg).map(|(a, b)| a * b).sum();
                local.gravity[i] = self.mesh.face_area(f) * f64::from(dir) * density[c] * kg_n;
            }
        }
        Ok(())
    }

    fn check_mass(&self) -> Result<(), FieldError> {
        if self.mass.len() == self.mesh.num_cells() {
            Ok(())
        } else {
            Err(FieldError::NotAllocated {
                key: "mass matrices".into(),
            })
        }
    }

    /// Scale the mass matrices by the coefficient field and fold gravity
    /// into the right-hand side. Clears boundary conditions and diagonal
    /// additions from the previous assembly.
    ///
    /// `coef` must carry a `cell` component and, for a non-symmetric
    /// operator, a `face` component.
    pub fn assemble_stiffness(&mut self, coef: &CompositeVector) -> Result<(), FieldError> {
        self.check_mass()?;
        let kc = coef.view(CELL)?;
        let kf = if self.symmetric {
            None
        } else {
            Some(coef.view(FACE)?)
        };

        self.rhs_cells.fill(0.0);
        self.rhs_faces.fill(0.0);
        self.dirichlet.fill(None);
        self.cell_diagonal.fill(0.0);
        self.factored = false;
        self.stiffness.clear();
        self.gravity_flux.clear();
        self.blocks.clear();

        for (c, local) in self.mass.iter().enumerate() {
            let nf = local.faces.len();
            let k = DVector::from_iterator(
                nf,
                local.faces.iter().map(|&(f, _)| match kf {
                    Some(kf) => kf[f],
                    None => kc[c],
                }),
            );
            let b = DMatrix::from_diagonal(&k) * &local.w;
            let g = local.gravity.component_mul(&k);

            self.rhs_cells[c] -= g.sum();
            for (i, &(f, _)) in local.faces.iter().enumerate() {
                self.rhs_faces[f] += g[i];
            }

            let row_sums = DVector::from_iterator(nf, b.row_iter().map(|row| row.sum()));
            let col_sums = DVector::from_iterator(nf, b.column_iter().map(|col| col.sum()));
            self.blocks.push(LocalBlock {
                acc: b.sum(),
                acf: -col_sums,
                afc: -row_sums,
                aff: b.clone(),
            });
            self.stiffness.push(b);
            self.gravity_flux.push(g);
        }
        Ok(())
    }

    /// Fold boundary conditions into the blocks and right-hand side.
    ///
    /// Flux values are outward flux densities. Dirichlet faces are
    /// eliminated symmetrically: their row becomes `λ_f = v` and their
    /// column moves to the right-hand side. Call once per assembly.
    pub fn apply_boundary_conditions(&mut self, bc: &BoundaryData) -> Result<(), FieldError> {
        let nf = self.mesh.num_faces();
        if bc.markers().len() != nf {
            return Err(FieldError::ShapeMismatch {
                reason: format!("{} boundary markers for {nf} faces", bc.markers().len()),
            });
        }
        if self.blocks.len() != self.mesh.num_cells() {
            return Err(FieldError::NotAllocated {
                key: "stiffness".into(),
            });
        }

        for (f, (&marker, &value)) in bc.markers().iter().zip(bc.values()).enumerate() {
            match marker {
                BcMarker::Unset => {}
                BcMarker::Flux => self.rhs_faces[f] -= value * self.mesh.face_area(f),
                BcMarker::Dirichlet => self.eliminate_face(f, value),
            }
        }
        Ok(())
    }

    fn eliminate_face(&mut self, f: usize, value: f64) {
        for c in self.mesh.face_get_cells(f, Ownership::Used) {
            let local = &self.mass[c];
            let Some(j) = local.faces.iter().position(|&(g, _)| g == f) else {
                continue;
            };
            let block = &mut self.blocks[c];
            self.rhs_cells[c] -= block.acf[j] * value;
            block.acf[j] = 0.0;
            block.afc[j] = 0.0;
            for (i, &(g, _)) in local.faces.iter().enumerate() {
                if i != j {
                    self.rhs_faces[g] -= block.aff[(i, j)] * value;
                }
                block.aff[(i, j)] = 0.0;
                block.aff[(j, i)] = 0.0;
            }
        }
        self.dirichlet[f] = Some(value);
        self.rhs_faces[f] = value;
    }

    /// Add `values[c]` to each cell's diagonal entry.
    pub fn add_cell_diagonal(&mut self, values: &[f64]) -> Result<(), FieldError> {
        if values.len() != self.cell_diagonal.len() {
            return Err(FieldError::ShapeMismatch {
                reason: format!(
                    "{} diagonal values for {} cells",
                    values.len(),
                    self.cell_diagonal.len()
                ),
            });
        }
        for (d, v) in self.cell_diagonal.iter_mut().zip(values) {
            *d += v;
        }
        self.factored = false;
        Ok(())
    }

    /// `y = A x` over `cell` and `face` components.
    pub fn apply(&self, x: &CompositeVector, y: &mut CompositeVector) -> Result<(), FieldError> {
        let (p, lambda) = (x.view(CELL)?, x.view(FACE)?);
        let mut yc = vec![0.0; p.len()];
        let mut yf = vec![0.0; lambda.len()];
        for (c, (local, block)) in self.mass.iter().zip(&self.blocks).enumerate() {
            let mut cell = (block.acc + self.cell_diagonal[c]) * p[c];
            for (i, &(fi, _)) in local.faces.iter().enumerate() {
                cell += block.acf[i] * lambda[fi];
                let mut face = block.afc[i] * p[c];
                for (j, &(fj, _)) in local.faces.iter().enumerate() {
                    face += block.aff[(i, j)] * lambda[fj];
                }
                yf[fi] += face;
            }
            yc[c] = cell;
        }
        for (f, v) in self.dirichlet.iter().enumerate() {
            if v.is_some() {
                yf[f] = lambda[f];
            }
        }
        y.view_mut(CELL)?.copy_from_slice(&yc);
        y.view_mut(FACE)?.copy_from_slice(&yf);
        Ok(())
    }

    /// `r = A x - b`.
    pub fn compute_residual(
        &self,
        x: &CompositeVector,
        r: &mut CompositeVector,
    ) -> Result<(), FieldError> {
        self.apply(x, r)?;
        for (v, b) in r.view_mut(CELL)?.iter_mut().zip(&self.rhs_cells) {
            *v -= b;
        }
        for (v, b) in r.view_mut(FACE)?.iter_mut().zip(&self.rhs_faces) {
            *v -= b;
        }
        Ok(())
    }

    /// Right-hand side as `(cells, faces)`.
    pub fn rhs(&self) -> (&[f64], &[f64]) {
        (&self.rhs_cells, &self.rhs_faces)
    }

    /// Dense global matrix, cells first, then faces.
    pub fn assemble_global(&self) -> DMatrix<f64> {
        let nc = self.mesh.num_cells();
        let n = self.num_unknowns();
        let mut a = DMatrix::<f64>::zeros(n, n);
        for (c, (local, block)) in self.mass.iter().zip(&self.blocks).enumerate() {
            a[(c, c)] += block.acc + self.cell_diagonal[c];
            for (i, &(fi, _)) in local.faces.iter().enumerate() {
                a[(c, nc + fi)] += block.acf[i];
                a[(nc + fi, c)] += block.afc[i];
                for (j, &(fj, _)) in local.faces.iter().enumerate() {
                    a[(nc + fi, nc + fj)] += block.aff[(i, j)];
                }
            }
        }
        for (f, v) in self.dirichlet.iter().enumerate() {
            if v.is_some() {
                a[(nc + f, nc + f)] = 1.0;
            }
        }
        a
    }

    /// Assemble and factor the global matrix.
    pub fn factorize(&mut self) -> Result<(), NumericalFailure> {
        trace!(unknowns = self.num_unknowns(), solver = self.solver.name(), "factoring MFD operator");
        self.solver.factorize(self.assemble_global())?;
        self.factored = true;
        Ok(())
    }

    /// `y = A⁻¹ x` with the last factorization.
    pub fn apply_inverse(
        &self,
        x: &CompositeVector,
        y: &mut CompositeVector,
    ) -> Result<(), StepError> {
        if !self.factored {
            return Err(NumericalFailure::SingularPreconditioner {
                reason: "operator not factored since last assembly".into(),
            }
            .into());
        }
        let (xc, xf) = (x.view(CELL)?, x.view(FACE)?);
        let b = DVector::from_iterator(xc.len() + xf.len(), xc.iter().chain(xf).copied());
        let sol = self.solver.solve(&b)?;
        let nc = xc.len();
        y.view_mut(CELL)?.copy_from_slice(&sol.as_slice()[..nc]);
        y.view_mut(FACE)?.copy_from_slice(&sol.as_slice()[nc..]);
        Ok(())
    }

    /// Face fluxes along each face's normal, recovered from cell and face
    /// pressures with the unmodified stiffness and gravity flux.
    pub fn derive_flux(
        &self,
        x: &CompositeVector,
        flux: &mut CompositeVector,
    ) -> Result<(), FieldError> {
        if self.stiffness.len() != self.mesh.num_cells() {
            return Err(FieldError::NotAllocated {
                key: "stiffness".into(),
            });
        }
        let (p, lambda) = (x.view(CELL)?, x.view(FACE)?);
        let out = flux.view_mut(FACE)?;
        for (f, q) in out.iter_mut().enumerate() {
            let cells = self.mesh.face_get_cells(f, Ownership::Used);
            let Some(&c) = cells.first() else {
                continue;
            };
            let local = &self.mass[c];
            let Some(i) = local.faces.iter().position(|&(g, _)| g == f) else {
                continue;
            };
            let b = &self.stiffness[c];
            let outward: f64 = local
                .faces
                .iter()
                .enumerate()
                .map(|(j, &(fj, _))| b[(i, j)] * (p[c] - lambda[fj]))
                .sum::<f64>()
                + self.gravity_flux[c][i];
            *q = f64::from(local.faces[i].1) * outward;
        }
        Ok(())
    }

    /// Cell velocities by least squares: `(Σ a² n nᵀ) v = Σ a n q` over
    /// each cell's faces, `q` the face flux along `n`.
    pub fn derive_cell_velocity(
        &self,
        flux: &CompositeVector,
        velocity: &mut CompositeVector,
    ) -> Result<(), FieldError> {
        let dim = self.mesh.space_dimension();
        if velocity.num_dofs(CELL)? != dim {
            return Err(FieldError::ShapeMismatch {
                reason: format!("velocity needs {dim} dofs per cell"),
            });
        }
        let q = flux.view(FACE)?;
        let out = velocity.view_mut(CELL)?;
        for (c, v) in out.chunks_mut(dim).enumerate() {
            let mut m = DMatrix::<f64>::zeros(dim, dim);
            let mut rhs = DVector::<f64>::zeros(dim);
            for (f, _) in self.mesh.cell_get_faces_and_dirs(c) {
                let a = self.mesh.face_area(f);
                let n = DVector::from_column_slice(&self.mesh.face_normal(f));
                m += a * a * &n * n.transpose();
                rhs += a * q[f] * &n;
            }
            let sol = m.lu().solve(&rhs).ok_or_else(|| FieldError::ShapeMismatch {
                reason: format!("cell {c} faces do not determine a velocity"),
            })?;
            v.copy_from_slice(sol.as_slice());
        }
        Ok(())
    }
}
