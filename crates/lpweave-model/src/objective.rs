use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::entity::{Registered, Registration};
use crate::error::{Error, Result};
use crate::expr::Expression;
use crate::ids::{EngineId, IdAllocator, ObjectiveId};
use crate::variable::Variable;

#[derive(Debug)]
struct ObjectiveState {
    name: String,
    expression: Expression,
    value: f64,
    registration: Registration,
}

struct ObjectiveInner {
    id: ObjectiveId,
    state: RefCell<ObjectiveState>,
}

/// The expression an engine optimises. Linear or quadratic.
#[derive(Clone)]
pub struct Objective(Rc<ObjectiveInner>);

impl Objective {
    pub fn new(ids: &IdAllocator, expression: impl Into<Expression>) -> Self {
        let id = ids.next_objective();
        Self(Rc::new(ObjectiveInner {
            id,
            state: RefCell::new(ObjectiveState {
                name: format!("obj{id}"),
                expression: expression.into(),
                value: 0.0,
                registration: Registration::default(),
            }),
        }))
    }

    pub fn named(ids: &IdAllocator, name: impl Into<String>, expression: impl Into<Expression>) -> Self {
        let objective = Self::new(ids, expression);
        objective.0.state.borrow_mut().name = name.into();
        objective
    }

    pub fn id(&self) -> ObjectiveId {
        self.0.id
    }

    pub fn name(&self) -> String {
        self.0.state.borrow().name.clone()
    }

    /// Objective names are kept on the model side only.
    pub fn set_name(&self, name: impl Into<String>) {
        self.0.state.borrow_mut().name = name.into();
    }

    pub fn expression(&self) -> Expression {
        self.0.state.borrow().expression.clone()
    }

    pub fn constant(&self) -> f64 {
        self.0.state.borrow().expression.constant()
    }

    pub fn is_quadratic(&self) -> bool {
        self.0.state.borrow().expression.is_quadratic()
    }

    pub fn coefficient(&self, variable: &Variable) -> f64 {
        self.0.state.borrow().expression.coefficient(variable)
    }

    pub fn quadratic_coefficient(&self, a: &Variable, b: &Variable) -> f64 {
        self.0.state.borrow().expression.quadratic_coefficient(a, b)
    }

    /// Objective value reported by the last solve, constant included.
    pub fn value(&self) -> f64 {
        self.0.state.borrow().value
    }

    /// Value at the variables' current values.
    pub fn level(&self) -> f64 {
        self.0.state.borrow().expression.level()
    }

    pub fn is_registered(&self) -> bool {
        self.0.state.borrow().registration.engine_count() > 0
    }

    pub fn ptr_eq(&self, other: &Objective) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Change a linear coefficient. Compiled engines must already hold a column for
    /// `variable`.
    pub fn set_coefficient(&self, variable: &Variable, value: f64) -> Result<f64> {
        if !value.is_finite() {
            return Err(Error::term(format!("coefficient must be finite, got {value}")));
        }
        let engines = Registered::engines(self);
        for engine in &engines {
            engine.borrow().check_objective_coefficient(variable)?;
        }
        let previous = self
            .0
            .state
            .borrow_mut()
            .expression
            .set_coefficient(variable, value)?;
        for engine in &engines {
            engine.borrow_mut().set_objective_coefficient(variable, value)?;
        }
        Ok(previous)
    }

    /// Change a quadratic coefficient. Only possible before compilation.
    pub fn set_quadratic_coefficient(&self, a: &Variable, b: &Variable, value: f64) -> Result<f64> {
        let mut state = self.0.state.borrow_mut();
        if state.registration.engine_count() > 0 {
            return Err(Error::structural(format!(
                "quadratic terms of objective {} cannot change after compilation",
                state.name
            )));
        }
        state.expression.set_quadratic_coefficient(a, b, value)
    }

    /// Change the constant. It is added to backend objective values, so no engine call.
    pub fn set_constant(&self, constant: f64) -> Result<()> {
        self.0.state.borrow_mut().expression.set_constant(constant)
    }

    pub(crate) fn assemble(&self) -> Result<()> {
        self.0.state.borrow_mut().expression.assemble()
    }

    pub(crate) fn set_solution(&self, engine: EngineId, backend_value: f64) {
        let mut state = self.0.state.borrow_mut();
        state.value = backend_value + state.expression.constant();
        state.registration.transfer(engine, 0);
    }
}

impl Registered for Objective {
    fn with_registration<R>(&self, f: impl FnOnce(&mut Registration) -> R) -> R {
        f(&mut self.0.state.borrow_mut().registration)
    }

    fn label(&self) -> String {
        format!("objective {}", self.0.state.borrow().name)
    }
}

impl fmt::Debug for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Objective")
            .field("id", &self.0.id)
            .field("name", &self.name())
            .finish()
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.borrow();
        write!(f, "{} : {}", state.name, state.expression)
    }
}
