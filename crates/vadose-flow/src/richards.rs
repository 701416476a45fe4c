//! The Richards process kernel: physics plus its time integrator.

use std::sync::Arc;

use tracing::{info, warn};
use vadose_core::{Communicator, FieldError, SerialComm, StepError, TreeVector};
use vadose_mesh::Mesh;
use vadose_state::{EvaluatorRegistry, State};
use vadose_time::{Bdf1, StepReport, StepStats};

use crate::config::RichardsConfig;
use crate::keys::PRESSURE;
use crate::physics::RichardsPhysics;
use crate::relations::flow_registry;

/// Single-phase unsaturated flow advanced by backward Euler.
///
/// The kernel owns the field store (through [`RichardsPhysics`]), the
/// integrator and the solution vector. Each [`advance`](Self::advance)
/// either commits a new accepted state or leaves the accepted state as
/// it was.
#[derive(Debug)]
pub struct Richards {
    physics: RichardsPhysics,
    time_stepper: Bdf1,
    solution: TreeVector,
    initialized: bool,
}

impl Richards {
    /// Build a serial kernel.
    pub fn new(
        mesh: Arc<dyn Mesh>,
        config: &RichardsConfig,
        registry: &EvaluatorRegistry,
    ) -> Result<Self, StepError> {
        Self::with_comm(mesh, Arc::new(SerialComm), config, registry)
    }

    /// Build a kernel on one participant of a decomposed run.
    pub fn with_comm(
        mesh: Arc<dyn Mesh>,
        comm: Arc<dyn Communicator>,
        config: &RichardsConfig,
        registry: &EvaluatorRegistry,
    ) -> Result<Self, StepError> {
        let physics = RichardsPhysics::new(mesh, comm, config, registry)?;
        let time_stepper = Bdf1::new(config.integrator())?;
        let solution = physics.solution()?;
        Ok(Self {
            physics,
            time_stepper,
            solution,
            initialized: false,
        })
    }

    /// Parse a JSON configuration and build a serial kernel with the
    /// standard flow evaluators.
    pub fn from_json_str(mesh: Arc<dyn Mesh>, text: &str) -> Result<Self, StepError> {
        let config = RichardsConfig::from_json_str(text)?;
        Self::new(mesh, &config, &flow_registry())
    }

    /// Set the initial condition at `t0`.
    pub fn initialize(&mut self, t0: f64) -> Result<(), StepError> {
        self.physics.initialize(t0)?;
        self.solution = self.physics.solution()?;
        self.time_stepper.reset_history();
        self.initialized = true;
        Ok(())
    }

    /// Take one step of up to `dt`.
    ///
    /// The integrator may cut the step on retryable failures; the report
    /// gives the step actually taken. On error the accepted state is
    /// unchanged.
    pub fn advance(&mut self, dt: f64) -> Result<StepReport, StepError> {
        if !self.initialized {
            return Err(FieldError::EvaluationFailed {
                key: PRESSURE.into(),
                reason: "advance called before initialize".into(),
            }
            .into());
        }
        let t = self.physics.time();
        match self
            .time_stepper
            .advance(&mut self.physics, t, dt, &mut self.solution)
        {
            Ok(report) => {
                self.physics.commit(report.t_new, &self.solution)?;
                Ok(report)
            }
            Err(e) => {
                warn!(t, dt, error = %e, "step abandoned");
                self.physics.rollback()?;
                self.solution = self.physics.solution()?;
                Err(e)
            }
        }
    }

    /// Step until `t_end` with the integrator's suggested step sizes,
    /// shortening the last step to land on `t_end`.
    pub fn run_until(&mut self, t_end: f64) -> Result<Vec<StepReport>, StepError> {
        let mut reports = Vec::new();
        let slack = 1e-12 * t_end.abs().max(1.0);
        loop {
            let remaining = t_end - self.time();
            if remaining <= slack {
                break;
            }
            let dt = self.time_stepper.suggested_step().min(remaining);
            reports.push(self.advance(dt)?);
        }
        info!(
            t = self.time(),
            steps = reports.len(),
            "reached end time"
        );
        Ok(reports)
    }

    /// Size the integrator would try next.
    pub fn suggested_step(&self) -> f64 {
        self.time_stepper.suggested_step()
    }

    /// Time of the last accepted state.
    pub fn time(&self) -> f64 {
        self.physics.time()
    }

    /// Last accepted state.
    pub fn state(&self) -> &State {
        self.physics.state()
    }

    /// The discretized equations.
    pub fn physics(&self) -> &RichardsPhysics {
        &self.physics
    }

    /// Mutable access to the discretized equations.
    pub fn physics_mut(&mut self) -> &mut RichardsPhysics {
        &mut self.physics
    }

    /// Current solution vector (pressure, cell and face components).
    pub fn solution(&self) -> &TreeVector {
        &self.solution
    }

    /// Integrator counters.
    pub fn stats(&self) -> &StepStats {
        self.time_stepper.stats()
    }
}
