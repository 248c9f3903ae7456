use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use tracing::debug;

use crate::entity::{Registered, Registration};
use crate::error::{Error, Result};
use crate::ids::{EngineId, IdAllocator, VariableId};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariableKind {
    #[default]
    Continuous,
    Integer,
}

pub(crate) fn check_bound(value: f64, which: &str) -> Result<()> {
    if value.is_nan() {
        return Err(Error::term(format!("{which} bound must not be NaN")));
    }
    Ok(())
}

#[derive(Debug)]
struct VariableState {
    name: String,
    lower: f64,
    upper: f64,
    kind: VariableKind,
    value: f64,
    reduced_cost: f64,
    /// Nesting depth of `freeze` calls
    frozen: u32,
    registration: Registration,
}

struct VariableInner {
    id: VariableId,
    state: RefCell<VariableState>,
}

/// A decision variable.
///
/// `Variable` is a shared handle: clones refer to the same variable, and equality,
/// ordering and hashing go by id. Bound, kind and name changes reach every engine the
/// variable is compiled into.
#[derive(Clone)]
pub struct Variable(Rc<VariableInner>);

impl Variable {
    /// Continuous variable on `[0, +inf)` named `x{id}`.
    pub fn new(ids: &IdAllocator) -> Self {
        let id = ids.next_variable();
        Self(Rc::new(VariableInner {
            id,
            state: RefCell::new(VariableState {
                name: format!("x{id}"),
                lower: 0.0,
                upper: f64::INFINITY,
                kind: VariableKind::Continuous,
                value: 0.0,
                reduced_cost: 0.0,
                frozen: 0,
                registration: Registration::default(),
            }),
        }))
    }

    pub fn named(ids: &IdAllocator, name: impl Into<String>) -> Self {
        let var = Self::new(ids);
        var.0.state.borrow_mut().name = name.into();
        var
    }

    /// Either bound may be infinite; NaN is refused before an id is taken.
    pub fn bounded(ids: &IdAllocator, name: impl Into<String>, lower: f64, upper: f64) -> Result<Self> {
        check_bound(lower, "lower")?;
        check_bound(upper, "upper")?;
        let var = Self::named(ids, name);
        {
            let mut state = var.0.state.borrow_mut();
            state.lower = lower;
            state.upper = upper;
        }
        Ok(var)
    }

    pub fn integer(ids: &IdAllocator, name: impl Into<String>, lower: f64, upper: f64) -> Result<Self> {
        let var = Self::bounded(ids, name, lower, upper)?;
        var.0.state.borrow_mut().kind = VariableKind::Integer;
        Ok(var)
    }

    pub fn id(&self) -> VariableId {
        self.0.id
    }

    pub fn name(&self) -> String {
        self.0.state.borrow().name.clone()
    }

    pub fn lower(&self) -> f64 {
        self.0.state.borrow().lower
    }

    pub fn upper(&self) -> f64 {
        self.0.state.borrow().upper
    }

    pub fn kind(&self) -> VariableKind {
        self.0.state.borrow().kind
    }

    pub fn is_integer(&self) -> bool {
        self.kind() == VariableKind::Integer
    }

    pub fn value(&self) -> f64 {
        self.0.state.borrow().value
    }

    pub fn reduced_cost(&self) -> f64 {
        self.0.state.borrow().reduced_cost
    }

    pub fn is_frozen(&self) -> bool {
        self.0.state.borrow().frozen > 0
    }

    /// Bounds as compiled: pinned at the current value while frozen.
    pub fn effective_bounds(&self) -> (f64, f64) {
        let state = self.0.state.borrow();
        if state.frozen > 0 {
            (state.value, state.value)
        } else {
            (state.lower, state.upper)
        }
    }

    pub fn is_registered(&self) -> bool {
        self.0.state.borrow().registration.engine_count() > 0
    }

    /// Column offset inside the engine whose solution this variable reflects.
    pub fn assigned_offset(&self) -> Option<usize> {
        self.0.state.borrow().registration.assigned().map(|(_, offset)| offset)
    }

    /// The engine whose solution this variable reflects.
    pub fn assigned_engine(&self) -> Option<EngineId> {
        self.0.state.borrow().registration.assigned().map(|(id, _)| id)
    }

    /// Overwrite the solution value. Engines overwrite it again on their next solve.
    pub fn set_value(&self, value: f64) {
        self.0.state.borrow_mut().value = value;
    }

    pub(crate) fn set_solution(&self, engine: EngineId, offset: usize, value: f64, reduced_cost: f64) {
        let mut state = self.0.state.borrow_mut();
        state.value = value;
        state.reduced_cost = reduced_cost;
        state.registration.transfer(engine, offset);
    }

    // ── Mutations fanned out to engines ───────────────────────────────────

    pub fn set_name(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.0.state.borrow_mut().name = name.clone();
        for engine in Registered::engines(self) {
            engine.borrow_mut().rename_column(self, &name)?;
        }
        Ok(())
    }

    /// While frozen the new bound is stored and reaches engines on the last unfreeze.
    pub fn set_lower(&self, lower: f64) -> Result<()> {
        check_bound(lower, "lower")?;
        let frozen = {
            let mut state = self.0.state.borrow_mut();
            state.lower = lower;
            state.frozen > 0
        };
        if frozen {
            return Ok(());
        }
        for engine in Registered::engines(self) {
            engine.borrow_mut().set_column_lower(self, lower)?;
        }
        Ok(())
    }

    pub fn set_upper(&self, upper: f64) -> Result<()> {
        check_bound(upper, "upper")?;
        let frozen = {
            let mut state = self.0.state.borrow_mut();
            state.upper = upper;
            state.frozen > 0
        };
        if frozen {
            return Ok(());
        }
        for engine in Registered::engines(self) {
            engine.borrow_mut().set_column_upper(self, upper)?;
        }
        Ok(())
    }

    pub fn set_bounds(&self, lower: f64, upper: f64) -> Result<()> {
        check_bound(lower, "lower")?;
        check_bound(upper, "upper")?;
        let frozen = {
            let mut state = self.0.state.borrow_mut();
            state.lower = lower;
            state.upper = upper;
            state.frozen > 0
        };
        if frozen {
            return Ok(());
        }
        self.push_bounds(lower, upper)
    }

    pub fn set_kind(&self, kind: VariableKind) -> Result<()> {
        self.0.state.borrow_mut().kind = kind;
        for engine in Registered::engines(self) {
            engine.borrow_mut().set_column_kind(self, kind)?;
        }
        Ok(())
    }

    /// Pin the variable at its current value. Nested calls stack.
    pub fn freeze(&self) -> Result<()> {
        let pinned = {
            let mut state = self.0.state.borrow_mut();
            state.frozen += 1;
            (state.frozen == 1).then_some(state.value)
        };
        match pinned {
            Some(value) => {
                debug!(component = "variable", operation = "freeze", id = %self.id(), value);
                self.push_bounds(value, value)
            }
            None => Ok(()),
        }
    }

    /// Undo one `freeze`. The stored bounds return when the last one is undone.
    pub fn unfreeze(&self) -> Result<()> {
        let restored = {
            let mut state = self.0.state.borrow_mut();
            if state.frozen == 0 {
                return Ok(());
            }
            state.frozen -= 1;
            (state.frozen == 0).then_some((state.lower, state.upper))
        };
        match restored {
            Some((lower, upper)) => {
                debug!(component = "variable", operation = "unfreeze", id = %self.id(), lower, upper);
                self.push_bounds(lower, upper)
            }
            None => Ok(()),
        }
    }

    fn push_bounds(&self, lower: f64, upper: f64) -> Result<()> {
        for engine in Registered::engines(self) {
            engine.borrow_mut().set_column_bounds(self, lower, upper)?;
        }
        Ok(())
    }

    // ── Reporting ─────────────────────────────────────────────────────────

    /// Within bounds up to `tolerance`, and integral if integer.
    pub fn is_feasible(&self, tolerance: f64) -> bool {
        self.is_feasible_at(self.value(), tolerance)
    }

    pub(crate) fn is_feasible_at(&self, value: f64, tolerance: f64) -> bool {
        let state = self.0.state.borrow();
        let within = value >= state.lower - tolerance && value <= state.upper + tolerance;
        let integral =
            state.kind == VariableKind::Continuous || (value - value.round()).abs() <= tolerance;
        within && integral
    }

    /// `name : lower <= value <= upper (reduced cost)`
    pub fn level_string(&self) -> String {
        let (value, reduced_cost) = {
            let state = self.0.state.borrow();
            (state.value, state.reduced_cost)
        };
        self.level_string_at(value, reduced_cost)
    }

    pub(crate) fn level_string_at(&self, value: f64, reduced_cost: f64) -> String {
        let state = self.0.state.borrow();
        format!(
            "{} : {} <= {} <= {} ({})",
            state.name, state.lower, value, state.upper, reduced_cost
        )
    }
}

impl Registered for Variable {
    fn with_registration<R>(&self, f: impl FnOnce(&mut Registration) -> R) -> R {
        f(&mut self.0.state.borrow_mut().registration)
    }

    fn label(&self) -> String {
        format!("variable {}", self.0.state.borrow().name)
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl PartialOrd for Variable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Variable {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id().cmp(&other.id())
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.state.borrow().name)
    }
}
