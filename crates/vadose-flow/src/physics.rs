//! Richards equation residual, preconditioner and state bookkeeping.
//!
//! For each cell the discrete mass balance is
//!
//! ```text
//! F_c = (A p - b)_c + (V₁ θ(p₁) - V₀ θ(p₀)) / h - Q V₁
//! ```
//!
//! where `A p - b` is the net outward flux assembled by the MFD operator
//! (Darcy flux with relative permeability scaled by `n/μ`, gravity and
//! boundary conditions folded in), `θ` the water content, `V` the cell
//! volume and `Q` the volumetric source. Face rows enforce flux continuity
//! and boundary conditions.

use std::sync::Arc;

use tracing::{debug, info, warn};
use vadose_core::{
    CompositeVector, Communicator, ConfigError, EntityKind, FieldError, NumericalFailure, Ownership,
    StepError, Tensor, TreeVector, CELL, FACE,
};
use vadose_mesh::Mesh;
use vadose_operators::{
    create_linear_solver, create_upwinding, BoundaryData, MfdOperator, UpwindFields,
    UpwindParams, Upwinding,
};
use vadose_state::{
    EvaluatorRegistry, EvaluatorSpec, PrimaryVariableEvaluator, State, TimeLevels,
};
use vadose_time::ImplicitFn;

use crate::bc::BoundaryFunctions;
use crate::config::RichardsConfig;
use crate::initial::{face_values_from_cells, InitialCondition};
use crate::keys::*;

/// The Richards equation on the accepted and trial stores.
///
/// Implements [`ImplicitFn`]: the integrator hands it trial pressures, it
/// loads them into the trial store, refreshes the evaluator graph and
/// assembles the residual or the preconditioner. The accepted store only
/// changes on [`commit`](Self::commit).
#[derive(Debug)]
pub struct RichardsPhysics {
    levels: TimeLevels,
    operator: MfdOperator,
    preconditioner: MfdOperator,
    upwinding: Box<dyn Upwinding>,
    boundary: BoundaryFunctions,
    bc: BoundaryData,
    initial_condition: InitialCondition,
    gravity: Vec<f64>,
    reference_density: f64,
    source: f64,
    atol: f64,
    rtol: f64,
}

impl RichardsPhysics {
    /// Declare fields, install evaluators and build the operators.
    ///
    /// # Errors
    ///
    /// Configuration errors (unknown strategy names, malformed boundary
    /// conditions, invalid parameters) and field-store errors (shape
    /// conflicts, missing or cyclic evaluator dependencies). All are fatal.
    pub fn new(
        mesh: Arc<dyn Mesh>,
        comm: Arc<dyn Communicator>,
        config: &RichardsConfig,
        registry: &EvaluatorRegistry,
    ) -> Result<Self, StepError> {
        config.validate()?;
        config.validate_for_mesh(mesh.as_ref())?;
        if config.field_evaluators.contains_key(PRESSURE) {
            return Err(ConfigError::InvalidParameter {
                context: "field_evaluators".into(),
                name: PRESSURE.into(),
                reason: "the primary variable cannot be overridden".into(),
            }
            .into());
        }
        let dim = mesh.space_dimension();
        let gravity = config.gravity_vector(dim)?;
        let boundary = BoundaryFunctions::new(mesh.as_ref(), &config.boundary_conditions)?;

        let mut s = State::with_comm(Arc::clone(&mesh), comm);
        s.set_scalar(ATMOSPHERIC_PRESSURE, config.atmospheric_pressure);
        s.set_gravity(gravity.iter().copied().collect());

        // 1. Fields the kernel writes.
        s.require_field(PRESSURE, Some(FLOW_OWNER))?
            .add_component(CELL, EntityKind::Cell, 1)?
            .add_component(FACE, EntityKind::Face, 1)?;
        s.require_field(DARCY_FLUX, Some(FLOW_OWNER))?
            .add_component(FACE, EntityKind::Face, 1)?;
        s.require_field(DARCY_VELOCITY, Some(FLOW_OWNER))?
            .add_component(CELL, EntityKind::Cell, dim)?;
        s.require_field(NUMERICAL_REL_PERM, Some(FLOW_OWNER))?
            .add_component(CELL, EntityKind::Cell, 1)?
            .add_component(FACE, EntityKind::Face, 1)?;
        s.set_evaluator(Box::new(PrimaryVariableEvaluator::new(PRESSURE)))?;

        // 2. Evaluated fields: defaults, then overrides and additions.
        for (key, default) in default_evaluators(config)? {
            let spec = config.field_evaluators.get(key).unwrap_or(&default);
            install(&mut s, registry, key, spec)?;
        }
        for (key, spec) in &config.field_evaluators {
            if !s.has_evaluator(key) {
                install(&mut s, registry, key, spec)?;
            }
        }

        // 3. Validate the graph and allocate.
        let order = s.setup()?;
        s.get_mutable_field_value(NUMERICAL_REL_PERM, FLOW_OWNER)?
            .put_scalar(1.0);
        s.set_initialized(NUMERICAL_REL_PERM)?;

        // 4. Upwinding and operators.
        let upwinding = create_upwinding(
            &config.relative_permeability_method,
            UpwindFields {
                cell_coef: RELATIVE_PERMEABILITY.into(),
                face_coef: NUMERICAL_REL_PERM.into(),
                owner: FLOW_OWNER.into(),
            },
            UpwindParams {
                flux: DARCY_FLUX.into(),
                permeability: PERMEABILITY.into(),
                gravity: gravity.iter().copied().collect(),
                tolerance: config.upwind_tolerance,
            },
        )?;
        if upwinding.name() == "upwind with Darcy flux" {
            warn!(
                method = upwinding.name(),
                "face relative permeability follows the Darcy flux of the last accepted step, \
                 which lags the nonlinear iterate"
            );
        }
        let symmetric = upwinding.is_symmetric();
        let operator = MfdOperator::new(
            Arc::clone(&mesh),
            symmetric,
            create_linear_solver(&config.diffusion.linear_solver)?,
        );
        let preconditioner = MfdOperator::new(
            Arc::clone(&mesh),
            symmetric,
            create_linear_solver(&config.diffusion_preconditioner.linear_solver)?,
        );

        info!(
            method = upwinding.name(),
            fields = s.field_keys().count(),
            evaluators = order.keys().len(),
            boundary_conditions = !boundary.is_empty(),
            "richards kernel set up"
        );

        Ok(Self {
            levels: TimeLevels::new(s),
            operator,
            preconditioner,
            upwinding,
            bc: BoundaryData::new(mesh.num_faces()),
            boundary,
            initial_condition: config.initial_condition.clone(),
            gravity,
            reference_density: config.mass_density_liquid,
            source: config.source,
            atol: config.absolute_error_tolerance,
            rtol: config.relative_error_tolerance,
        })
    }

    /// Last accepted state.
    pub fn state(&self) -> &State {
        self.levels.current()
    }

    /// Trial state of the step in progress.
    pub fn trial_state(&self) -> &State {
        self.levels.next()
    }

    /// Time of the last accepted state.
    pub fn time(&self) -> f64 {
        self.levels.current().time()
    }

    /// Name of the upwinding strategy in use.
    pub fn upwinding_method(&self) -> &'static str {
        self.upwinding.name()
    }

    /// The accepted pressure as a solution vector.
    pub fn solution(&self) -> Result<TreeVector, FieldError> {
        let p = self.levels.current().get_field_value(PRESSURE)?;
        Ok(TreeVector::leaf(PRESSURE, p.clone()))
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Set the initial pressure at time `t0` and accept it.
    ///
    /// Cell pressures come from the initial condition. Face pressures are
    /// the mean of the adjacent cells, the single adjacent cell on
    /// boundary faces, or the prescribed value on Dirichlet faces.
    pub fn initialize(&mut self, t0: f64) -> Result<(), StepError> {
        let mesh = self.levels.next().mesh_arc();
        let cells = self.initial_condition.cell_pressures(
            mesh.as_ref(),
            self.reference_density,
            &self.gravity,
        )?;
        let mut faces = face_values_from_cells(mesh.as_ref(), &cells)?;
        self.boundary.compute(t0, &mut self.bc);
        for (f, v) in self.bc.dirichlet_faces() {
            faces[f] = v;
        }

        let next = self.levels.next_mut();
        next.set_time(t0);
        let p = next.get_mutable_field_value(PRESSURE, FLOW_OWNER)?;
        p.view_mut(CELL)?.copy_from_slice(&cells);
        p.view_mut(FACE)?.copy_from_slice(&faces);
        next.set_initialized(PRESSURE)?;
        next.mark_primary_changed(PRESSURE)?;

        self.derive_fluxes(t0)?;
        self.levels.commit()?;
        info!(t = t0, cells = cells.len(), "pressure initialized");
        Ok(())
    }

    /// Load a trial solution into the trial store at time `t`.
    pub fn solution_to_state(&mut self, t: f64, u: &TreeVector) -> Result<(), StepError> {
        let next = self.levels.next_mut();
        next.set_time(t);
        next.get_mutable_field_value(PRESSURE, FLOW_OWNER)?
            .copy_from(leaf(u)?)?;
        next.mark_primary_changed(PRESSURE)?;
        Ok(())
    }

    /// Accept `u` as the state at time `t`: derive fluxes and velocities
    /// and copy the trial store into the accepted one.
    pub fn commit(&mut self, t: f64, u: &TreeVector) -> Result<(), StepError> {
        self.solution_to_state(t, u)?;
        self.derive_fluxes(t)?;
        let next = self.levels.next_mut();
        next.set_cycle(next.cycle() + 1);
        self.levels.commit()?;
        Ok(())
    }

    /// Discard the trial store.
    pub fn rollback(&mut self) -> Result<(), StepError> {
        self.levels.rollback()?;
        Ok(())
    }

    // ── Discretization ─────────────────────────────────────────────

    /// Accumulation term `(V₁ θ₁ - V₀ θ₀) / h` per cell, between the
    /// accepted store and the trial store.
    pub fn accumulation(&mut self, h: f64) -> Result<Vec<f64>, StepError> {
        if !h.is_finite() || h <= 0.0 {
            return Err(StepError::InvalidTimeStep { dt: h });
        }
        let (current, next) = self.levels.split_mut();
        let theta0 = current.value(WATER_CONTENT)?.view(CELL)?.to_vec();
        let v0 = current.value(CELL_VOLUME)?.view(CELL)?.to_vec();
        let theta1 = next.value(WATER_CONTENT)?.view(CELL)?.to_vec();
        let v1 = next.value(CELL_VOLUME)?.view(CELL)?.to_vec();
        Ok(theta1
            .iter()
            .zip(&v1)
            .zip(theta0.iter().zip(&v0))
            .map(|((t1, v1), (t0, v0))| (v1 * t1 - v0 * t0) / h)
            .collect())
    }

    /// Net flux out of the domain through boundary faces, from the
    /// accepted Darcy flux.
    pub fn net_boundary_outflow(&self) -> Result<f64, FieldError> {
        let s = self.levels.current();
        let mesh = s.mesh();
        let flux = s.get_field_value(DARCY_FLUX)?.view(FACE)?;
        let mut total = 0.0;
        for f in mesh.boundary_faces() {
            let Some(&c) = mesh.face_get_cells(f, Ownership::Owned).first() else {
                continue;
            };
            let dir = mesh
                .cell_get_faces_and_dirs(c)
                .iter()
                .find(|(g, _)| *g == f)
                .map_or(1.0, |&(_, d)| f64::from(d));
            total += dir * flux[f];
        }
        Ok(s.comm().sum_all(total))
    }

    /// Refresh the mass matrices when permeability or density changed,
    /// then upwind the relative permeability and scale it by `n/μ`.
    ///
    /// Cells are scaled by their own `n/μ`; faces by the mean `n/μ` of
    /// their adjacent cells.
    fn update_permeability_data(&mut self) -> Result<(), StepError> {
        let s = self.levels.next_mut();

        // 1. Geometry and absolute permeability.
        let perm_changed = s.changed(PERMEABILITY, FLOW_OWNER)?;
        let rho_changed = s.changed(MASS_DENSITY_LIQUID, FLOW_OWNER)?;
        if perm_changed || rho_changed {
            let dim = s.mesh().space_dimension();
            let perm = s.get_field_value(PERMEABILITY)?;
            let dofs = perm.num_dofs(CELL)?;
            let tensors = perm
                .view(CELL)?
                .chunks(dofs)
                .map(|k| Tensor::from_dofs(k, dim))
                .collect::<Result<Vec<_>, _>>()?;
            let rho = s.get_field_value(MASS_DENSITY_LIQUID)?.view(CELL)?.to_vec();
            for op in [&mut self.operator, &mut self.preconditioner] {
                op.assemble_mass_matrices(&tensors)?;
                op.set_gravity(&rho, &self.gravity)?;
            }
            debug!(cells = tensors.len(), "mass matrices rebuilt");
        }

        // 2. Upwinded relative permeability.
        self.upwinding.update(s)?;

        // 3. Reject non-finite coefficients before they reach the operator.
        let n = s.value(MOLAR_DENSITY_LIQUID)?.view(CELL)?.to_vec();
        let mu = s.value(VISCOSITY_LIQUID)?.view(CELL)?.to_vec();
        let kr = s.get_field_value(NUMERICAL_REL_PERM)?;
        if let Some((component, index, value)) = kr.first_non_finite() {
            warn!(
                field = NUMERICAL_REL_PERM,
                component = %component,
                index,
                value,
                "non-finite relative permeability"
            );
            return Err(NumericalFailure::NonFinite {
                field: NUMERICAL_REL_PERM.into(),
                component,
                index,
                value,
            }
            .into());
        }

        // 4. Scale by n/μ; faces take the mean of their cells.
        let cell_scale: Vec<f64> = n.iter().zip(&mu).map(|(n, mu)| n / mu).collect();
        let mesh = s.mesh_arc();
        let face_scale: Vec<f64> = (0..mesh.num_faces())
            .map(|f| {
                let adj = mesh.face_get_cells(f, Ownership::Used);
                adj.iter().map(|&c| cell_scale[c]).sum::<f64>() / adj.len().max(1) as f64
            })
            .collect();
        let kr = s.get_mutable_field_value(NUMERICAL_REL_PERM, FLOW_OWNER)?;
        for (k, a) in kr.view_mut(CELL)?.iter_mut().zip(&cell_scale) {
            *k *= a;
        }
        for (k, a) in kr.view_mut(FACE)?.iter_mut().zip(&face_scale) {
            *k *= a;
        }
        Ok(())
    }

    /// `∂θ/∂p · V / h` per cell, zero when the water content does not
    /// depend on pressure.
    fn storage_diagonal(&mut self, h: f64) -> Result<Vec<f64>, StepError> {
        let s = self.levels.next_mut();
        let volume = s.value(CELL_VOLUME)?.view(CELL)?.to_vec();
        let depends = s.get_evaluator(WATER_CONTENT)?.is_dependency(s, PRESSURE);
        if !depends {
            return Ok(vec![0.0; volume.len()]);
        }
        let dtheta = s.derivative(WATER_CONTENT, PRESSURE)?.view(CELL)?;
        Ok(dtheta.iter().zip(&volume).map(|(d, v)| d * v / h).collect())
    }

    /// Rebuild the residual operator at time `t` and recover face fluxes
    /// and cell velocities into the trial store.
    fn derive_fluxes(&mut self, t: f64) -> Result<(), StepError> {
        self.update_permeability_data()?;
        self.boundary.compute(t, &mut self.bc);
        assemble(&mut self.operator, self.levels.next(), &self.bc)?;

        let next = self.levels.next_mut();
        let pressure = next.get_field_value(PRESSURE)?.clone();
        let flux = next.get_mutable_field_value(DARCY_FLUX, FLOW_OWNER)?;
        self.operator.derive_flux(&pressure, flux)?;
        let flux = flux.clone();
        let velocity = next.get_mutable_field_value(DARCY_VELOCITY, FLOW_OWNER)?;
        self.operator.derive_cell_velocity(&flux, velocity)?;
        next.set_initialized(DARCY_FLUX)?;
        next.set_initialized(DARCY_VELOCITY)?;
        Ok(())
    }
}

impl ImplicitFn for RichardsPhysics {
    fn residual(
        &mut self,
        t: f64,
        u: &TreeVector,
        _u_dot: &TreeVector,
        f: &mut TreeVector,
    ) -> Result<(), StepError> {
        let h = t - self.time();
        self.solution_to_state(t, u)?;
        self.update_permeability_data()?;
        self.boundary.compute(t, &mut self.bc);
        assemble(&mut self.operator, self.levels.next(), &self.bc)?;

        let r = leaf_mut(f)?;
        self.operator.compute_residual(leaf(u)?, r)?;

        let accumulation = self.accumulation(h)?;
        let volume = self
            .levels
            .next_mut()
            .value(CELL_VOLUME)?
            .view(CELL)?
            .to_vec();
        let cells = r.view_mut(CELL)?;
        for ((rc, acc), v) in cells.iter_mut().zip(&accumulation).zip(&volume) {
            *rc += acc - self.source * v;
        }
        Ok(())
    }

    fn apply_preconditioner(&self, r: &TreeVector, pr: &mut TreeVector) -> Result<(), StepError> {
        self.preconditioner.apply_inverse(leaf(r)?, leaf_mut(pr)?)
    }

    fn update_preconditioner(&mut self, t: f64, u: &TreeVector, h: f64) -> Result<(), StepError> {
        self.solution_to_state(t, u)?;
        self.update_permeability_data()?;
        self.boundary.compute(t, &mut self.bc);
        assemble(&mut self.preconditioner, self.levels.next(), &self.bc)?;
        let diagonal = self.storage_diagonal(h)?;
        self.preconditioner.add_cell_diagonal(&diagonal)?;
        self.preconditioner.factorize()?;
        Ok(())
    }

    fn error_norm(&self, u: &TreeVector, du: &TreeVector) -> f64 {
        let (Ok(u), Ok(du)) = (leaf(u), leaf(du)) else {
            return f64::INFINITY;
        };
        let mut error = 0.0_f64;
        for name in u.component_names() {
            let (Ok(x), Ok(dx)) = (u.view(name), du.view(name)) else {
                return f64::INFINITY;
            };
            for (x, dx) in x.iter().zip(dx) {
                error = error.max(dx.abs() / (self.atol + self.rtol * x.abs()));
            }
        }
        self.levels.next().comm().max_all(error)
    }

    fn is_admissible(&self, u: &TreeVector) -> bool {
        match leaf(u).map(CompositeVector::first_non_finite) {
            Ok(None) => true,
            Ok(Some((component, index, value))) => {
                debug!(component = %component, index, value, "non-finite trial pressure");
                false
            }
            Err(_) => false,
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn assemble(op: &mut MfdOperator, s: &State, bc: &BoundaryData) -> Result<(), FieldError> {
    op.assemble_stiffness(s.get_field_value(NUMERICAL_REL_PERM)?)?;
    op.apply_boundary_conditions(bc)
}

fn leaf(u: &TreeVector) -> Result<&CompositeVector, FieldError> {
    u.data().ok_or_else(|| FieldError::ShapeMismatch {
        reason: format!("solution node '{}' holds no data", u.name()),
    })
}

fn leaf_mut(u: &mut TreeVector) -> Result<&mut CompositeVector, FieldError> {
    let name = u.name().to_string();
    u.data_mut().ok_or_else(|| FieldError::ShapeMismatch {
        reason: format!("solution node '{name}' holds no data"),
    })
}

fn constant(value: f64) -> EvaluatorSpec {
    EvaluatorSpec::new("constant").with("value", serde_json::json!(value))
}

/// Evaluators installed unless `field_evaluators` overrides them.
fn default_evaluators(
    config: &RichardsConfig,
) -> Result<Vec<(&'static str, EvaluatorSpec)>, StepError> {
    let wrm = serde_json::to_value(&config.water_retention_model).map_err(|e| {
        ConfigError::Parse {
            reason: format!("water_retention_model: {e}"),
        }
    })?;
    Ok(vec![
        (CELL_VOLUME, EvaluatorSpec::new("cell volume")),
        (POROSITY, constant(config.porosity)),
        (PERMEABILITY, constant(config.permeability)),
        (MOLAR_DENSITY_LIQUID, constant(config.molar_density_liquid)),
        (MASS_DENSITY_LIQUID, constant(config.mass_density_liquid)),
        (VISCOSITY_LIQUID, constant(config.viscosity_liquid)),
        (
            SATURATION_LIQUID,
            EvaluatorSpec::new("saturation liquid").with("water_retention_model", wrm.clone()),
        ),
        (
            SATURATION_GAS,
            EvaluatorSpec::new("linear combination")
                .with("constant", serde_json::json!(1.0))
                .with("dependencies", serde_json::json!([SATURATION_LIQUID]))
                .with("coefficients", serde_json::json!([-1.0])),
        ),
        (
            RELATIVE_PERMEABILITY,
            EvaluatorSpec::new("relative permeability").with("water_retention_model", wrm),
        ),
        (WATER_CONTENT, EvaluatorSpec::new("water content")),
    ])
}

/// Install the evaluator for `key` and declare it a one-dof cell field.
fn install(
    s: &mut State,
    registry: &EvaluatorRegistry,
    key: &str,
    spec: &EvaluatorSpec,
) -> Result<(), StepError> {
    registry.require_evaluator(s, key, spec)?;
    s.require_field(key, None)?
        .add_component(CELL, EntityKind::Cell, 1)?;
    Ok(())
}
