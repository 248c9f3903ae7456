//! Entity changes propagated to a compiled backend.
//!
//! Entities call in here after releasing their own borrow. Every push is a single
//! offset-indexed backend call.

use lpweave_solver::ObjectiveSense;
use tracing::{debug, trace};

use super::{live, live_mut, EngineState};
use crate::constraint::Constraint;
use crate::entity::Registered;
use crate::error::{Error, Result};
use crate::objective::Objective;
use crate::variable::{Variable, VariableKind};

impl EngineState {
    pub(crate) fn queue_constraint(&mut self, constraint: Constraint) {
        self.queued.push_back(constraint);
    }

    // ── Columns ───────────────────────────────────────────────────────────

    pub(crate) fn set_column_lower(&mut self, variable: &Variable, lower: f64) -> Result<()> {
        let col = self.column(variable)?;
        live_mut(&mut self.backend)?
            .set_col_lower(col, lower)
            .map_err(Error::backend("set_col_lower"))?;
        trace!(component = "engine", operation = "set_col_lower", engine = %self.id, col, lower);
        Ok(())
    }

    pub(crate) fn set_column_upper(&mut self, variable: &Variable, upper: f64) -> Result<()> {
        let col = self.column(variable)?;
        live_mut(&mut self.backend)?
            .set_col_upper(col, upper)
            .map_err(Error::backend("set_col_upper"))?;
        trace!(component = "engine", operation = "set_col_upper", engine = %self.id, col, upper);
        Ok(())
    }

    pub(crate) fn set_column_bounds(&mut self, variable: &Variable, lower: f64, upper: f64) -> Result<()> {
        let col = self.column(variable)?;
        live_mut(&mut self.backend)?
            .set_col_bounds(col, lower, upper)
            .map_err(Error::backend("set_col_bounds"))?;
        trace!(component = "engine", operation = "set_col_bounds", engine = %self.id, col, lower, upper);
        Ok(())
    }

    pub(crate) fn set_column_kind(&mut self, variable: &Variable, kind: VariableKind) -> Result<()> {
        let col = self.column(variable)?;
        live_mut(&mut self.backend)?
            .set_integer(col, kind == VariableKind::Integer)
            .map_err(Error::backend("set_integer"))
    }

    pub(crate) fn rename_column(&mut self, variable: &Variable, name: &str) -> Result<()> {
        if !self.config.name_discipline.pushes_names() {
            return Ok(());
        }
        let col = self.column(variable)?;
        live_mut(&mut self.backend)?
            .set_col_name(col, name)
            .map_err(Error::backend("set_col_name"))
    }

    // ── Rows ──────────────────────────────────────────────────────────────

    pub(crate) fn rename_row(&mut self, constraint: &Constraint, name: &str) -> Result<()> {
        if !self.config.name_discipline.pushes_names() {
            return Ok(());
        }
        let row = self.row(constraint)?;
        live_mut(&mut self.backend)?
            .set_row_name(row, name)
            .map_err(Error::backend("set_row_name"))
    }

    /// Re-derive the row type from the constraint, free when disabled.
    pub(crate) fn refresh_row_type(&mut self, constraint: &Constraint) -> Result<()> {
        let row = self.row(constraint)?;
        let (sense, rhs, range) = constraint.row_type();
        live_mut(&mut self.backend)?
            .set_row_type(row, sense, rhs, range)
            .map_err(Error::backend("set_row_type"))?;
        trace!(component = "engine", operation = "set_row_type", engine = %self.id, row, sense = ?sense);
        Ok(())
    }

    pub(crate) fn set_row_lower(&mut self, constraint: &Constraint, lower: f64) -> Result<()> {
        let row = self.row(constraint)?;
        live_mut(&mut self.backend)?
            .set_row_lower(row, lower)
            .map_err(Error::backend("set_row_lower"))?;
        trace!(component = "engine", operation = "set_row_lower", engine = %self.id, row, lower);
        Ok(())
    }

    pub(crate) fn set_row_upper(&mut self, constraint: &Constraint, upper: f64) -> Result<()> {
        let row = self.row(constraint)?;
        live_mut(&mut self.backend)?
            .set_row_upper(row, upper)
            .map_err(Error::backend("set_row_upper"))?;
        trace!(component = "engine", operation = "set_row_upper", engine = %self.id, row, upper);
        Ok(())
    }

    pub(crate) fn set_row_bounds(&mut self, constraint: &Constraint, lower: f64, upper: f64) -> Result<()> {
        let row = self.row(constraint)?;
        live_mut(&mut self.backend)?
            .set_row_bounds(row, lower, upper)
            .map_err(Error::backend("set_row_bounds"))
    }

    /// A compiled row may only change nonzeros it already has, and may not drop them.
    pub(crate) fn check_row_coefficient(&self, constraint: &Constraint, variable: &Variable, value: f64) -> Result<()> {
        let row = self.row(constraint)?;
        let Some(&col) = self.columns.get(&variable.id()) else {
            return Err(Error::structural(format!(
                "{variable} has no column in engine {}; compiled row {} cannot gain it",
                self.name,
                constraint.name()
            )));
        };
        match live(&self.backend)?.coefficient(row, col) {
            None => Err(Error::structural(format!(
                "compiled row {} has no entry for {variable}; new nonzeros are not supported",
                constraint.name()
            ))),
            Some(existing) if value == 0.0 && existing != 0.0 => Err(Error::structural(format!(
                "removing {variable} from compiled row {} is not supported",
                constraint.name()
            ))),
            Some(_) => Ok(()),
        }
    }

    pub(crate) fn set_row_coefficient(&mut self, constraint: &Constraint, variable: &Variable, value: f64) -> Result<()> {
        let row = self.row(constraint)?;
        let col = self.column(variable)?;
        live_mut(&mut self.backend)?
            .set_coefficient(row, col, value)
            .map_err(Error::backend("set_coefficient"))?;
        trace!(component = "engine", operation = "set_coefficient", engine = %self.id, row, col, value);
        Ok(())
    }

    // ── Objective ─────────────────────────────────────────────────────────

    pub(crate) fn check_objective_coefficient(&self, variable: &Variable) -> Result<()> {
        if self.columns.contains_key(&variable.id()) {
            Ok(())
        } else {
            Err(Error::structural(format!(
                "{variable} has no column in engine {}; the compiled objective cannot gain it",
                self.name
            )))
        }
    }

    pub(crate) fn set_objective_coefficient(&mut self, variable: &Variable, value: f64) -> Result<()> {
        let col = self.column(variable)?;
        live_mut(&mut self.backend)?
            .set_objective_coefficient(col, value)
            .map_err(Error::backend("set_objective_coefficient"))
    }

    pub(crate) fn check_objective_swap(&self, objective: &Objective) -> Result<()> {
        if !self.generated || self.objective.ptr_eq(objective) {
            return Ok(());
        }
        if self.objective.is_quadratic() || objective.is_quadratic() {
            return Err(Error::structural(format!(
                "engine {} cannot swap a quadratic objective after generate",
                self.name
            )));
        }
        objective.expression().assemble()
    }

    /// Install `objective`. A compiled engine recompiles it and overwrites the dense
    /// objective vector.
    pub(crate) fn replace_objective(&mut self, objective: Objective) -> Result<()> {
        if self.objective.ptr_eq(&objective) {
            return Ok(());
        }
        let previous = std::mem::replace(&mut self.objective, objective.clone());
        if !self.generated {
            return Ok(());
        }
        previous.unregister(self.id)?;
        objective.assemble()?;
        objective.attach(&self.link, 0)?;
        let expression = objective.expression();
        for variable in expression.variables() {
            self.append_column(&variable)?;
        }
        let mut dense = vec![0.0; self.variables.len()];
        for term in expression.linear_terms() {
            dense[self.column(&term.variable)?] += term.coefficient;
        }
        live_mut(&mut self.backend)?
            .set_objective(&dense)
            .map_err(Error::backend("set_objective"))?;
        debug!(component = "engine", operation = "set_objective", engine = %self.id, columns = dense.len());
        Ok(())
    }

    pub(crate) fn set_sense(&mut self, sense: ObjectiveSense) -> Result<()> {
        live_mut(&mut self.backend)?.set_objective_sense(sense);
        Ok(())
    }
}
