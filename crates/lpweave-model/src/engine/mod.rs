//! The generation engine: compiles a model into a backend and keeps the two in step.
//!
//! `Solver` owns its backend and the offset tables mapping entities to columns and
//! rows. Entities reach it back through weak links, so a dropped or disposed engine is
//! simply skipped by their change notifications.

mod csc;
mod generate;
mod solve;
mod sync;

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use lpweave_solver::{Backend, ObjectiveSense, SolutionStatus};
use tracing::{debug, warn};

use crate::config::SolverConfig;
use crate::constraint::Constraint;
use crate::entity::EngineLink;
use crate::error::{Error, Result};
use crate::ids::{ConstraintId, EngineId, VariableId};
use crate::model::Model;
use crate::objective::Objective;
use crate::variable::Variable;
use crate::warm_start::WarmStart;

/// Column bounds and dual limit captured before branch and bound.
#[derive(Debug, Clone)]
struct MipSnapshot {
    col_lower: Vec<f64>,
    col_upper: Vec<f64>,
    dual_objective_limit: f64,
}

/// Outcome flags of the last solve.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SolveStatus {
    pub status: SolutionStatus,
    pub iterations: usize,
    pub nodes: usize,
}

impl SolveStatus {
    pub fn is_proven_optimal(&self) -> bool {
        self.status.is_proven_optimal()
    }

    pub fn is_proven_primal_infeasible(&self) -> bool {
        self.status.is_proven_primal_infeasible()
    }

    pub fn is_proven_dual_infeasible(&self) -> bool {
        self.status.is_proven_dual_infeasible()
    }

    pub fn is_iteration_limit_reached(&self) -> bool {
        self.status.is_iteration_limit_reached()
    }

    pub fn is_abandoned(&self) -> bool {
        self.status.is_abandoned()
    }
}

/// Sizes of the compiled problem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub columns: usize,
    pub rows: usize,
    pub nonzeros: usize,
    pub integers: usize,
    /// Constraints added to the model but not yet compiled
    pub queued: usize,
    pub generated: bool,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " Number of variables  : {}", self.columns)?;
        writeln!(f, " Number of constraints: {}", self.rows)?;
        writeln!(f, " Number of elements   : {}", self.nonzeros)?;
        write!(f, " Number of integers   : {}", self.integers)
    }
}

pub(crate) struct EngineState {
    id: EngineId,
    name: String,
    link: EngineLink,
    model: Model,
    /// `None` once disposed
    backend: Option<Box<dyn Backend>>,
    config: SolverConfig,
    objective: Objective,
    variables: Vec<Variable>,
    columns: HashMap<VariableId, usize>,
    constraints: Vec<Constraint>,
    rows: HashMap<ConstraintId, usize>,
    queued: VecDeque<Constraint>,
    generated: bool,
    /// Set when a generate failed after touching entities or the backend
    incomplete: bool,
    mip_snapshot: Option<MipSnapshot>,
    status: SolveStatus,
}

fn live(backend: &Option<Box<dyn Backend>>) -> Result<&dyn Backend> {
    match backend {
        Some(backend) => Ok(backend.as_ref()),
        None => Err(Error::precondition("engine has been disposed")),
    }
}

fn live_mut(backend: &mut Option<Box<dyn Backend>>) -> Result<&mut Box<dyn Backend>> {
    backend
        .as_mut()
        .ok_or_else(|| Error::precondition("engine has been disposed"))
}

impl EngineState {
    fn column(&self, variable: &Variable) -> Result<usize> {
        self.columns.get(&variable.id()).copied().ok_or_else(|| {
            Error::precondition(format!("{variable} has no column in engine {}", self.name))
        })
    }

    fn row(&self, constraint: &Constraint) -> Result<usize> {
        self.rows.get(&constraint.id()).copied().ok_or_else(|| {
            Error::precondition(format!(
                "constraint {} has no row in engine {}",
                constraint.name(),
                self.name
            ))
        })
    }

    fn statistics(&self) -> Statistics {
        let (nonzeros, integers) = match &self.backend {
            Some(backend) if self.generated => (backend.num_elements(), backend.num_integers()),
            _ => (0, 0),
        };
        Statistics {
            columns: self.variables.len(),
            rows: self.constraints.len(),
            nonzeros,
            integers,
            queued: self.queued.len(),
            generated: self.generated,
        }
    }

    fn dispose(&mut self) -> Result<()> {
        if self.backend.is_none() {
            return Ok(());
        }
        self.model.detach_engine(self.id);
        let released = self.ungenerate();
        self.queued.clear();
        self.backend = None;
        debug!(component = "engine", operation = "dispose", engine = %self.id);
        released
    }
}

/// A model compiled into one backend.
///
/// Creating a `Solver` attaches it to the model: constraints added afterwards are
/// queued and compiled by the next `generate`, `solve` or `resolve`. Dropping it
/// releases every entity registration.
pub struct Solver {
    state: Rc<RefCell<EngineState>>,
}

impl Solver {
    pub fn new(model: &Model, backend: impl Backend + 'static) -> Self {
        Self::with_config(model, backend, SolverConfig::default())
    }

    pub fn with_config(model: &Model, backend: impl Backend + 'static, config: SolverConfig) -> Self {
        Self::from_boxed(model, Box::new(backend), config)
    }

    pub fn from_boxed(model: &Model, mut backend: Box<dyn Backend>, config: SolverConfig) -> Self {
        let id = model.ids().next_engine();
        backend.set_objective_sense(model.sense());
        let queued: VecDeque<Constraint> = model.constraints().into();
        let queued_count = queued.len();
        let state = Rc::new_cyclic(|weak| {
            RefCell::new(EngineState {
                id,
                name: format!("solver{id}"),
                link: EngineLink {
                    id,
                    state: weak.clone(),
                },
                model: model.clone(),
                backend: Some(backend),
                config,
                objective: model.objective(),
                variables: Vec::new(),
                columns: HashMap::new(),
                constraints: Vec::new(),
                rows: HashMap::new(),
                queued,
                generated: false,
                incomplete: false,
                mip_snapshot: None,
                status: SolveStatus::default(),
            })
        });
        model.attach_engine(EngineLink {
            id,
            state: Rc::downgrade(&state),
        });
        debug!(
            component = "engine",
            operation = "create",
            engine = %id,
            model = %model.name(),
            queued = queued_count,
        );
        Self { state }
    }

    // ── Identity ──────────────────────────────────────────────────────────

    pub fn id(&self) -> EngineId {
        self.state.borrow().id
    }

    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.state.borrow_mut().name = name.into();
    }

    pub fn model(&self) -> Model {
        self.state.borrow().model.clone()
    }

    pub fn config(&self) -> SolverConfig {
        self.state.borrow().config.clone()
    }

    pub fn objective(&self) -> Objective {
        self.state.borrow().objective.clone()
    }

    // ── Compilation ───────────────────────────────────────────────────────

    /// Compile the model. The first call bulk-loads; later calls compile only the
    /// constraints queued since.
    pub fn generate(&self) -> Result<()> {
        self.state.borrow_mut().generate()
    }

    pub fn is_generated(&self) -> bool {
        self.state.borrow().generated
    }

    /// True after a generate failed partway; only `ungenerate` clears it.
    pub fn is_incomplete(&self) -> bool {
        self.state.borrow().incomplete
    }

    /// Release all compiled entities. Queued and compiled constraints are kept, in
    /// order, for the next `generate`.
    pub fn ungenerate(&self) -> Result<()> {
        self.state.borrow_mut().ungenerate()
    }

    /// Detach from the model and release the backend. Calling it again does nothing.
    pub fn dispose(&self) -> Result<()> {
        self.state.borrow_mut().dispose()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.borrow().backend.is_none()
    }

    pub fn statistics(&self) -> Statistics {
        self.state.borrow().statistics()
    }

    /// Compiled variables in column order.
    pub fn variables(&self) -> Vec<Variable> {
        self.state.borrow().variables.clone()
    }

    /// Compiled constraints in row order.
    pub fn constraints(&self) -> Vec<Constraint> {
        self.state.borrow().constraints.clone()
    }

    pub fn column_of(&self, variable: &Variable) -> Option<usize> {
        self.state.borrow().columns.get(&variable.id()).copied()
    }

    pub fn row_of(&self, constraint: &Constraint) -> Option<usize> {
        self.state.borrow().rows.get(&constraint.id()).copied()
    }

    // ── Solving ───────────────────────────────────────────────────────────

    /// Generate, then solve. Runs branch and bound when integer columns exist unless
    /// `force_relaxation` is set.
    pub fn solve(&self, force_relaxation: bool) -> Result<()> {
        self.state.borrow_mut().solve(force_relaxation)
    }

    /// Solve again from the current basis. Requires a prior generate.
    pub fn resolve(&self, force_relaxation: bool) -> Result<()> {
        self.state.borrow_mut().resolve(force_relaxation)
    }

    /// Set the model's sense to maximise, then solve, or resolve once generated.
    pub fn maximise(&self, force_relaxation: bool) -> Result<()> {
        self.optimise(ObjectiveSense::Maximize, force_relaxation)
    }

    pub fn minimise(&self, force_relaxation: bool) -> Result<()> {
        self.optimise(ObjectiveSense::Minimize, force_relaxation)
    }

    fn optimise(&self, sense: ObjectiveSense, force_relaxation: bool) -> Result<()> {
        self.model().set_sense(sense)?;
        if self.is_generated() {
            self.resolve(force_relaxation)
        } else {
            self.solve(force_relaxation)
        }
    }

    pub fn status(&self) -> SolveStatus {
        self.state.borrow().status
    }

    pub fn is_proven_optimal(&self) -> bool {
        self.status().is_proven_optimal()
    }

    /// Objective value of the last solve, constant included.
    pub fn objective_value(&self) -> f64 {
        self.state.borrow().objective.value()
    }

    // ── Readings ──────────────────────────────────────────────────────────
    //
    // These read this engine's backend at its own offsets, so they stay correct for
    // entities shared with engines that solved later.

    pub fn value(&self, variable: &Variable) -> Result<f64> {
        self.state.borrow().column_value(variable)
    }

    pub fn reduced_cost(&self, variable: &Variable) -> Result<f64> {
        self.state.borrow().column_reduced_cost(variable)
    }

    pub fn price(&self, constraint: &Constraint) -> Result<f64> {
        self.state.borrow().row_price(constraint)
    }

    pub fn activity(&self, constraint: &Constraint) -> Result<f64> {
        self.state.borrow().row_activity(constraint)
    }

    /// Check bounds, integrality and enabled rows against this engine's solution.
    pub fn is_feasible(&self, tolerance: f64) -> Result<bool> {
        self.state.borrow().is_feasible(tolerance)
    }

    pub fn solution_report(&self) -> Result<String> {
        self.state.borrow().solution_report()
    }

    pub fn statistics_report(&self) -> String {
        let state = self.state.borrow();
        format!("Statistics for model {}\n{}", state.model.name(), state.statistics())
    }

    /// Snapshot column bounds for a manual branch and bound. Only with
    /// `auto_reset_mip` off.
    pub fn save_before_mip_solve(&self) -> Result<()> {
        self.state.borrow_mut().save_before_mip_solve()
    }

    pub fn reset_after_mip_solve(&self) -> Result<()> {
        self.state.borrow_mut().reset_after_mip_solve()
    }

    pub fn has_mip_snapshot(&self) -> bool {
        self.state.borrow().mip_snapshot.is_some()
    }

    // ── Warm start ────────────────────────────────────────────────────────

    pub fn warm_start(&self) -> Result<WarmStart> {
        self.state.borrow().warm_start()
    }

    pub fn empty_warm_start(&self) -> Result<WarmStart> {
        self.state.borrow().empty_warm_start()
    }

    pub fn set_warm_start(&self, warm_start: &WarmStart) -> Result<()> {
        self.state.borrow_mut().set_warm_start(warm_start)
    }

    // ── Backend access ────────────────────────────────────────────────────

    /// Inspect the backend.
    pub fn with_backend<R>(&self, f: impl FnOnce(&dyn Backend) -> R) -> Result<R> {
        let state = self.state.borrow();
        live(&state.backend).map(f)
    }

    /// Change the backend directly. Edits made here are invisible to the model.
    pub fn with_backend_mut<R>(&self, f: impl FnOnce(&mut dyn Backend) -> R) -> Result<R> {
        let mut state = self.state.borrow_mut();
        live_mut(&mut state.backend).map(|backend| f(&mut **backend))
    }
}

impl Drop for Solver {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            warn!(component = "engine", operation = "dispose", error = %err, "release failed");
        }
    }
}

impl fmt::Debug for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Solver")
            .field("id", &state.id)
            .field("name", &state.name)
            .field("generated", &state.generated)
            .field("disposed", &state.backend.is_none())
            .finish()
    }
}
