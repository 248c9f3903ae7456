use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use lpweave_solver::RowSense;

use crate::entity::{Registered, Registration};
use crate::error::{Error, Result};
use crate::expr::Expression;
use crate::ids::{ConstraintId, EngineId, IdAllocator};
use crate::variable::{Variable, check_bound};

/// Relational operator of a constraint.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintType {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            ConstraintType::Le => "<=",
            ConstraintType::Ge => ">=",
            ConstraintType::Eq => "=",
        };
        write!(f, "{op}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ConstraintKind {
    Plain,
    /// `lower <= lhs <= rhs`, stored with type `Le`
    Range { lower: f64 },
}

#[derive(Debug)]
struct ConstraintState {
    name: String,
    lhs: Expression,
    ctype: ConstraintType,
    rhs: Expression,
    kind: ConstraintKind,
    enabled: bool,
    price: f64,
    value: f64,
    registration: Registration,
}

impl ConstraintState {
    /// Bounds on the variable part of `lhs - rhs`.
    fn bounds(&self) -> (f64, f64) {
        let shift = self.rhs.constant() - self.lhs.constant();
        match (self.kind, self.ctype) {
            (ConstraintKind::Range { lower }, _) => {
                let lower = if lower.is_finite() { lower - self.lhs.constant() } else { lower };
                (lower, shift)
            }
            (ConstraintKind::Plain, ConstraintType::Le) => (f64::NEG_INFINITY, shift),
            (ConstraintKind::Plain, ConstraintType::Ge) => (shift, f64::INFINITY),
            (ConstraintKind::Plain, ConstraintType::Eq) => (shift, shift),
        }
    }

    fn activity(&self) -> f64 {
        (self.lhs.level() - self.lhs.constant()) - (self.rhs.level() - self.rhs.constant())
    }
}

struct ConstraintInner {
    id: ConstraintId,
    state: RefCell<ConstraintState>,
}

/// A linear row `lhs (<=|>=|=) rhs`, or a range row `lower <= expr <= upper`.
///
/// A shared handle like [`Variable`]. Compiled into an engine it occupies one row;
/// only bound, enable, name and existing-coefficient edits can follow it there.
#[derive(Clone)]
pub struct Constraint(Rc<ConstraintInner>);

fn reject_quadratic(expr: &Expression, side: &str) -> Result<()> {
    if expr.is_quadratic() {
        return Err(Error::term(format!(
            "constraint {side} must be linear, found quadratic terms"
        )));
    }
    Ok(())
}

impl Constraint {
    // ── Constructors ──────────────────────────────────────────────────────

    pub fn new(
        ids: &IdAllocator,
        lhs: impl Into<Expression>,
        ctype: ConstraintType,
        rhs: impl Into<Expression>,
    ) -> Result<Self> {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        reject_quadratic(&lhs, "left-hand side")?;
        reject_quadratic(&rhs, "right-hand side")?;
        lhs.check_finite()?;
        rhs.check_finite()?;
        let id = ids.next_constraint();
        Ok(Self::from_parts(id, format!("c{id}"), lhs, ctype, rhs, ConstraintKind::Plain))
    }

    pub fn le(ids: &IdAllocator, lhs: impl Into<Expression>, rhs: impl Into<Expression>) -> Result<Self> {
        Self::new(ids, lhs, ConstraintType::Le, rhs)
    }

    pub fn ge(ids: &IdAllocator, lhs: impl Into<Expression>, rhs: impl Into<Expression>) -> Result<Self> {
        Self::new(ids, lhs, ConstraintType::Ge, rhs)
    }

    pub fn equals(ids: &IdAllocator, lhs: impl Into<Expression>, rhs: impl Into<Expression>) -> Result<Self> {
        Self::new(ids, lhs, ConstraintType::Eq, rhs)
    }

    /// `lower <= expr <= upper`. Either bound may be infinite.
    pub fn range(ids: &IdAllocator, lower: f64, expr: impl Into<Expression>, upper: f64) -> Result<Self> {
        let expr = expr.into();
        reject_quadratic(&expr, "expression")?;
        expr.check_finite()?;
        check_bound(lower, "lower")?;
        check_bound(upper, "upper")?;
        let id = ids.next_constraint();
        Ok(Self::from_parts(
            id,
            format!("r{id}"),
            expr,
            ConstraintType::Le,
            Expression::from_constant(upper),
            ConstraintKind::Range { lower },
        ))
    }

    fn from_parts(
        id: ConstraintId,
        name: String,
        lhs: Expression,
        ctype: ConstraintType,
        rhs: Expression,
        kind: ConstraintKind,
    ) -> Self {
        Self(Rc::new(ConstraintInner {
            id,
            state: RefCell::new(ConstraintState {
                name,
                lhs,
                ctype,
                rhs,
                kind,
                enabled: true,
                price: 0.0,
                value: 0.0,
                registration: Registration::default(),
            }),
        }))
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn id(&self) -> ConstraintId {
        self.0.id
    }

    pub fn name(&self) -> String {
        self.0.state.borrow().name.clone()
    }

    pub fn constraint_type(&self) -> ConstraintType {
        self.0.state.borrow().ctype
    }

    pub fn is_range(&self) -> bool {
        matches!(self.0.state.borrow().kind, ConstraintKind::Range { .. })
    }

    pub fn lhs(&self) -> Expression {
        self.0.state.borrow().lhs.clone()
    }

    pub fn rhs(&self) -> Expression {
        self.0.state.borrow().rhs.clone()
    }

    /// Lower bound on the row's variable terms. `-inf` for `<=` rows.
    pub fn lower(&self) -> f64 {
        self.0.state.borrow().bounds().0
    }

    /// Upper bound on the row's variable terms. `+inf` for `>=` rows.
    pub fn upper(&self) -> f64 {
        self.0.state.borrow().bounds().1
    }

    pub fn is_enabled(&self) -> bool {
        self.0.state.borrow().enabled
    }

    /// Dual value from the last solve.
    pub fn price(&self) -> f64 {
        self.0.state.borrow().price
    }

    /// Row activity from the last solve.
    pub fn value(&self) -> f64 {
        self.0.state.borrow().value
    }

    /// Coefficient of `variable` in `lhs - rhs`.
    pub fn coefficient(&self, variable: &Variable) -> f64 {
        let state = self.0.state.borrow();
        state.lhs.coefficient(variable) - state.rhs.coefficient(variable)
    }

    /// Every distinct variable on either side.
    pub fn variables(&self) -> Vec<Variable> {
        let state = self.0.state.borrow();
        let mut vars = state.lhs.variables();
        for var in state.rhs.variables() {
            if !vars.contains(&var) {
                vars.push(var);
            }
        }
        vars
    }

    /// Activity of the variable terms at the current variable values.
    pub fn level(&self) -> f64 {
        self.0.state.borrow().activity()
    }

    /// Distance from the binding side; negative when violated.
    pub fn slack(&self) -> f64 {
        let state = self.0.state.borrow();
        let (lower, upper) = state.bounds();
        let level = state.activity();
        match (state.kind, state.ctype) {
            (ConstraintKind::Plain, ConstraintType::Ge) => level - lower,
            _ => upper - level,
        }
    }

    /// Disabled constraints are always feasible.
    pub fn is_feasible(&self, tolerance: f64) -> bool {
        self.is_feasible_at(self.level(), tolerance)
    }

    pub(crate) fn is_feasible_at(&self, activity: f64, tolerance: f64) -> bool {
        let state = self.0.state.borrow();
        if !state.enabled {
            return true;
        }
        let (lower, upper) = state.bounds();
        activity >= lower - tolerance && activity <= upper + tolerance
    }

    /// `name : lower <= value <= upper (price)`
    pub fn level_string(&self) -> String {
        let (value, price) = {
            let state = self.0.state.borrow();
            (state.value, state.price)
        };
        self.level_string_at(value, price)
    }

    pub(crate) fn level_string_at(&self, activity: f64, price: f64) -> String {
        let state = self.0.state.borrow();
        let (lower, upper) = state.bounds();
        format!("{} : {lower} <= {activity} <= {upper} ({price})", state.name)
    }

    pub fn is_registered(&self) -> bool {
        self.0.state.borrow().registration.engine_count() > 0
    }

    pub fn assigned_offset(&self) -> Option<usize> {
        self.0.state.borrow().registration.assigned().map(|(_, offset)| offset)
    }

    pub fn ptr_eq(&self, other: &Constraint) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ── Mutations fanned out to engines ───────────────────────────────────

    pub fn set_name(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.0.state.borrow_mut().name = name.clone();
        for engine in Registered::engines(self) {
            engine.borrow_mut().rename_row(self, &name)?;
        }
        Ok(())
    }

    /// Toggle the row. A disabled row stays compiled but is made free.
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        {
            let mut state = self.0.state.borrow_mut();
            if state.enabled == enabled {
                return Ok(());
            }
            state.enabled = enabled;
        }
        for engine in Registered::engines(self) {
            engine.borrow_mut().refresh_row_type(self)?;
        }
        Ok(())
    }

    fn range_edit(&self, edit: impl FnOnce(&mut ConstraintState)) -> Result<bool> {
        let mut state = self.0.state.borrow_mut();
        if state.kind == ConstraintKind::Plain {
            return Err(Error::structural(format!(
                "bounds of {} follow its relational type; only range constraints take explicit bounds",
                state.name
            )));
        }
        edit(&mut state);
        Ok(state.enabled)
    }

    /// Move the lower bound of a range row.
    pub fn set_lower(&self, lower: f64) -> Result<()> {
        check_bound(lower, "lower")?;
        let enabled = self.range_edit(|state| {
            let shift = if lower.is_finite() { state.lhs.constant() } else { 0.0 };
            state.kind = ConstraintKind::Range { lower: lower + shift };
        })?;
        if enabled {
            for engine in Registered::engines(self) {
                engine.borrow_mut().set_row_lower(self, lower)?;
            }
        }
        Ok(())
    }

    /// Move the upper bound of a range row.
    pub fn set_upper(&self, upper: f64) -> Result<()> {
        check_bound(upper, "upper")?;
        let enabled = self.range_edit(|state| {
            let shift = state.lhs.constant();
            state.rhs = Expression::from_constant(upper + shift);
        })?;
        if enabled {
            for engine in Registered::engines(self) {
                engine.borrow_mut().set_row_upper(self, upper)?;
            }
        }
        Ok(())
    }

    pub fn set_bounds(&self, lower: f64, upper: f64) -> Result<()> {
        check_bound(lower, "lower")?;
        check_bound(upper, "upper")?;
        let enabled = self.range_edit(|state| {
            let shift = state.lhs.constant();
            let lower_shift = if lower.is_finite() { shift } else { 0.0 };
            state.kind = ConstraintKind::Range { lower: lower + lower_shift };
            state.rhs = Expression::from_constant(upper + shift);
        })?;
        if enabled {
            for engine in Registered::engines(self) {
                engine.borrow_mut().set_row_bounds(self, lower, upper)?;
            }
        }
        Ok(())
    }

    /// Change the coefficient of `variable` in `lhs - rhs`.
    ///
    /// Once compiled, only nonzeros that already exist in the row may change, and
    /// they may not be set to zero. Every engine is checked before anything changes.
    pub fn set_coefficient(&self, variable: &Variable, value: f64) -> Result<f64> {
        if !value.is_finite() {
            return Err(Error::term(format!("coefficient must be finite, got {value}")));
        }
        let engines = Registered::engines(self);
        for engine in &engines {
            engine.borrow().check_row_coefficient(self, variable, value)?;
        }
        let previous = {
            let mut state = self.0.state.borrow_mut();
            let previous = state.lhs.coefficient(variable) - state.rhs.coefficient(variable);
            state.rhs.set_coefficient(variable, 0.0)?;
            state.lhs.set_coefficient(variable, value)?;
            previous
        };
        for engine in &engines {
            engine.borrow_mut().set_row_coefficient(self, variable, value)?;
        }
        Ok(previous)
    }

    // ── Compilation support ───────────────────────────────────────────────

    /// Move everything to the left, constants to the right, and merge terms.
    ///
    /// The row is rebuilt aside and written back only once every step succeeded, so a
    /// failure leaves the constraint as it was.
    pub(crate) fn assemble(&self) -> Result<()> {
        let mut state = self.0.state.borrow_mut();
        let state = &mut *state;
        let mut lhs = state.lhs.clone();
        match state.kind {
            ConstraintKind::Plain => {
                lhs.subtract_expression(&state.rhs)?;
                let constant = lhs.constant();
                lhs.set_constant(0.0)?;
                lhs.assemble()?;
                let mut rhs = Expression::new();
                rhs.set_constant(-constant)?;
                state.lhs = lhs;
                state.rhs = rhs;
            }
            ConstraintKind::Range { lower } => {
                let constant = lhs.constant();
                lhs.set_constant(0.0)?;
                lhs.assemble()?;
                let upper = state.rhs.constant();
                let rhs = if constant != 0.0 && upper.is_finite() {
                    let mut rhs = Expression::new();
                    rhs.set_constant(upper - constant)?;
                    Some(rhs)
                } else {
                    None
                };
                state.lhs = lhs;
                if let Some(rhs) = rhs {
                    state.rhs = rhs;
                }
                if constant != 0.0 && lower.is_finite() {
                    state.kind = ConstraintKind::Range { lower: lower - constant };
                }
            }
        }
        Ok(())
    }

    /// Row bounds in the assembled form.
    pub(crate) fn row_bounds(&self) -> (f64, f64) {
        self.0.state.borrow().bounds()
    }

    /// Row type for `set_row_type`, honouring the enabled flag.
    pub(crate) fn row_type(&self) -> (RowSense, f64, f64) {
        let state = self.0.state.borrow();
        if !state.enabled {
            return (RowSense::Free, 0.0, 0.0);
        }
        let (lower, upper) = state.bounds();
        match (state.kind, state.ctype) {
            (ConstraintKind::Plain, ConstraintType::Le) => (RowSense::Le, upper, 0.0),
            (ConstraintKind::Plain, ConstraintType::Ge) => (RowSense::Ge, lower, 0.0),
            (ConstraintKind::Plain, ConstraintType::Eq) => (RowSense::Eq, upper, 0.0),
            (ConstraintKind::Range { .. }, _) => match (lower.is_finite(), upper.is_finite()) {
                (true, true) => (RowSense::Range, upper, upper - lower),
                (false, true) => (RowSense::Le, upper, 0.0),
                (true, false) => (RowSense::Ge, lower, 0.0),
                (false, false) => (RowSense::Free, 0.0, 0.0),
            },
        }
    }

    /// Linear terms of the assembled left-hand side.
    pub(crate) fn row_terms(&self) -> Vec<(Variable, f64)> {
        self.0
            .state
            .borrow()
            .lhs
            .linear_terms()
            .iter()
            .map(|t| (t.variable.clone(), t.coefficient))
            .collect()
    }

    pub(crate) fn set_solution(&self, engine: EngineId, offset: usize, price: f64, value: f64) {
        let mut state = self.0.state.borrow_mut();
        state.price = price;
        state.value = value;
        state.registration.transfer(engine, offset);
    }
}

impl Registered for Constraint {
    fn with_registration<R>(&self, f: impl FnOnce(&mut Registration) -> R) -> R {
        f(&mut self.0.state.borrow_mut().registration)
    }

    fn label(&self) -> String {
        format!("constraint {}", self.0.state.borrow().name)
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.borrow();
        f.debug_struct("Constraint")
            .field("id", &self.0.id)
            .field("name", &state.name)
            .field("type", &state.ctype)
            .field("enabled", &state.enabled)
            .finish()
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.borrow();
        match state.kind {
            ConstraintKind::Plain => {
                write!(f, "{} : {} {} {}", state.name, state.lhs, state.ctype, state.rhs)
            }
            ConstraintKind::Range { lower } => {
                write!(f, "{} : {} <= {} <= {}", state.name, lower, state.lhs, state.rhs)
            }
        }
    }
}
