use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use lpweave_solver::ObjectiveSense;
use tracing::debug;

use crate::constraint::Constraint;
use crate::engine::EngineState;
use crate::entity::EngineLink;
use crate::error::{Error, Result};
use crate::expr::Expression;
use crate::ids::{EngineId, IdAllocator, ModelId};
use crate::objective::Objective;
use crate::variable::Variable;

#[derive(Debug)]
struct ModelState {
    name: String,
    objective: Objective,
    sense: ObjectiveSense,
    constraints: Vec<Constraint>,
    engines: Vec<EngineLink>,
}

struct ModelInner {
    id: ModelId,
    ids: IdAllocator,
    state: RefCell<ModelState>,
}

/// Objective, sense and an ordered constraint list.
///
/// Engines built on a model are notified of new constraints, objective swaps and sense
/// changes. Variables are not owned by the model; they are discovered from the terms.
#[derive(Clone)]
pub struct Model(Rc<ModelInner>);

impl Model {
    pub fn new(ids: &IdAllocator) -> Self {
        let id = ids.next_model();
        let objective = Objective::named(ids, "obj", Expression::new());
        Self(Rc::new(ModelInner {
            id,
            ids: ids.clone(),
            state: RefCell::new(ModelState {
                name: format!("model{id}"),
                objective,
                sense: ObjectiveSense::Minimize,
                constraints: Vec::new(),
                engines: Vec::new(),
            }),
        }))
    }

    pub fn named(ids: &IdAllocator, name: impl Into<String>) -> Self {
        let model = Self::new(ids);
        model.0.state.borrow_mut().name = name.into();
        model
    }

    pub fn id(&self) -> ModelId {
        self.0.id
    }

    /// The allocator this model's engines draw their ids from.
    pub fn ids(&self) -> &IdAllocator {
        &self.0.ids
    }

    pub fn name(&self) -> String {
        self.0.state.borrow().name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.0.state.borrow_mut().name = name.into();
    }

    pub fn objective(&self) -> Objective {
        self.0.state.borrow().objective.clone()
    }

    pub fn sense(&self) -> ObjectiveSense {
        self.0.state.borrow().sense
    }

    pub fn constraints(&self) -> Vec<Constraint> {
        self.0.state.borrow().constraints.clone()
    }

    pub fn num_constraints(&self) -> usize {
        self.0.state.borrow().constraints.len()
    }

    pub fn contains(&self, constraint: &Constraint) -> bool {
        self.0
            .state
            .borrow()
            .constraints
            .iter()
            .any(|c| c.ptr_eq(constraint))
    }

    /// First constraint carrying `name`.
    pub fn constraint(&self, name: &str) -> Option<Constraint> {
        self.0
            .state
            .borrow()
            .constraints
            .iter()
            .find(|c| c.name() == name)
            .cloned()
    }

    /// Every variable referenced by the objective or a constraint, ordered by id.
    pub fn variables(&self) -> Vec<Variable> {
        let state = self.0.state.borrow();
        let mut found: BTreeMap<_, Variable> = BTreeMap::new();
        for var in state.objective.expression().variables() {
            found.entry(var.id()).or_insert(var);
        }
        for constraint in &state.constraints {
            for var in constraint.variables() {
                found.entry(var.id()).or_insert(var);
            }
        }
        found.into_values().collect()
    }

    pub fn variable(&self, name: &str) -> Option<Variable> {
        self.variables().into_iter().find(|v| v.name() == name)
    }

    fn live_engines(&self) -> Vec<Rc<RefCell<EngineState>>> {
        self.0
            .state
            .borrow()
            .engines
            .iter()
            .filter_map(|l| l.state.upgrade())
            .collect()
    }

    /// Append a constraint. Engines built on this model queue it for their next
    /// generate.
    pub fn add(&self, constraint: &Constraint) -> Result<()> {
        if self.contains(constraint) {
            return Err(Error::registration(format!(
                "constraint {} is already part of model {}",
                constraint.name(),
                self.name()
            )));
        }
        self.0.state.borrow_mut().constraints.push(constraint.clone());
        let engines = self.live_engines();
        debug!(
            component = "model",
            operation = "add",
            constraint = %constraint.name(),
            engines = engines.len(),
        );
        for engine in engines {
            engine.borrow_mut().queue_constraint(constraint.clone());
        }
        Ok(())
    }

    /// Rename `constraint`, then add it.
    pub fn add_named(&self, constraint: &Constraint, name: impl Into<String>) -> Result<()> {
        constraint.set_name(name)?;
        self.add(constraint)
    }

    /// Swap the objective. Every engine is checked before anything changes; compiled
    /// engines then recompile the objective in place.
    pub fn set_objective(&self, objective: &Objective) -> Result<()> {
        let engines = self.live_engines();
        for engine in &engines {
            engine.borrow().check_objective_swap(objective)?;
        }
        self.0.state.borrow_mut().objective = objective.clone();
        for engine in &engines {
            engine.borrow_mut().replace_objective(objective.clone())?;
        }
        Ok(())
    }

    pub fn set_sense(&self, sense: ObjectiveSense) -> Result<()> {
        self.0.state.borrow_mut().sense = sense;
        for engine in self.live_engines() {
            engine.borrow_mut().set_sense(sense)?;
        }
        Ok(())
    }

    /// Drop every constraint and reset the objective. Refused while engines are bound.
    pub fn clear(&self) -> Result<()> {
        if !self.live_engines().is_empty() {
            return Err(Error::precondition(format!(
                "model {} cannot be cleared while engines are built on it",
                self.name()
            )));
        }
        let objective = Objective::named(&self.0.ids, "obj", Expression::new());
        let mut state = self.0.state.borrow_mut();
        state.constraints.clear();
        state.objective = objective;
        state.sense = ObjectiveSense::Minimize;
        Ok(())
    }

    pub(crate) fn attach_engine(&self, link: EngineLink) {
        self.0.state.borrow_mut().engines.push(link);
    }

    pub(crate) fn detach_engine(&self, engine: EngineId) {
        self.0.state.borrow_mut().engines.retain(|l| l.id != engine);
    }

    pub fn engine_count(&self) -> usize {
        self.live_engines().len()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.borrow();
        f.debug_struct("Model")
            .field("id", &self.0.id)
            .field("name", &state.name)
            .field("constraints", &state.constraints.len())
            .finish()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.borrow();
        let sense = match state.sense {
            ObjectiveSense::Minimize => "Minimise",
            ObjectiveSense::Maximize => "Maximise",
        };
        writeln!(f, "Model: {}", state.name)?;
        writeln!(f, "{sense} {}", state.objective)?;
        writeln!(f, "Subject to:")?;
        for constraint in &state.constraints {
            writeln!(f, "  {constraint}")?;
        }
        Ok(())
    }
}
