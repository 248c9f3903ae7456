use lpweave_solver::{ProblemData, SparseVector};
use tracing::{debug, warn};

use super::{csc, live_mut, EngineState};
use crate::constraint::Constraint;
use crate::entity::Registered;
use crate::error::{Error, Result};
use crate::variable::{Variable, VariableKind};

impl EngineState {
    /// A failure before any entity is attached leaves the engine as it was. A later one
    /// marks it incomplete, and every generate is refused until `ungenerate`.
    pub(crate) fn generate(&mut self) -> Result<()> {
        live_mut(&mut self.backend)?;
        if self.incomplete {
            return Err(Error::precondition(format!(
                "engine {} holds a partial compilation from a failed generate; ungenerate first",
                self.name
            )));
        }
        let before = self.footprint();
        let outcome = if self.generated {
            self.generate_queued()
        } else {
            self.generate_bulk()
        };
        if let Err(err) = &outcome {
            if self.footprint() != before {
                self.incomplete = true;
                warn!(component = "engine", operation = "generate", engine = %self.id, error = %err, "left incomplete");
            }
        }
        outcome
    }

    /// What a generate attaches, compared across a failure.
    fn footprint(&self) -> (usize, usize, bool) {
        (
            self.variables.len(),
            self.constraints.len(),
            self.objective.is_registered_with(self.id),
        )
    }

    /// Give `variable` a column offset, registering it on first sight.
    fn discover(&mut self, variable: &Variable) -> Result<usize> {
        if let Some(&col) = self.columns.get(&variable.id()) {
            return Ok(col);
        }
        let col = self.variables.len();
        variable.attach(&self.link, col)?;
        self.columns.insert(variable.id(), col);
        self.variables.push(variable.clone());
        Ok(col)
    }

    /// Register `constraint` at the next row offset and return its entries as
    /// `(column, coefficient)` pairs.
    fn attach_row(&mut self, constraint: &Constraint, append_columns: bool) -> Result<Vec<(usize, f64)>> {
        constraint.assemble()?;
        let row = self.constraints.len();
        constraint.attach(&self.link, row)?;
        self.rows.insert(constraint.id(), row);
        self.constraints.push(constraint.clone());

        let mut entries = Vec::new();
        for (variable, coefficient) in constraint.row_terms() {
            let col = if append_columns {
                self.append_column(&variable)?
            } else {
                self.discover(&variable)?
            };
            entries.push((col, coefficient));
        }
        Ok(entries)
    }

    fn generate_bulk(&mut self) -> Result<()> {
        let objective = self.objective.clone();
        objective.assemble()?;
        for constraint in &self.queued {
            constraint.assemble()?;
        }
        objective.attach(&self.link, 0)?;
        let expression = objective.expression();
        for variable in expression.variables() {
            self.discover(&variable)?;
        }

        let mut rows = Vec::with_capacity(self.queued.len());
        while let Some(constraint) = self.queued.pop_front() {
            rows.push(self.attach_row(&constraint, false)?);
        }

        let num_cols = self.variables.len();
        let num_rows = self.constraints.len();
        let mut data = ProblemData {
            matrix: csc::from_triplets(num_rows, num_cols, &csc::row_triplets(&rows)),
            col_lower: Vec::with_capacity(num_cols),
            col_upper: Vec::with_capacity(num_cols),
            objective: vec![0.0; num_cols],
            row_lower: Vec::with_capacity(num_rows),
            row_upper: Vec::with_capacity(num_rows),
        };
        for variable in &self.variables {
            let (lower, upper) = variable.effective_bounds();
            data.col_lower.push(lower);
            data.col_upper.push(upper);
        }
        for term in expression.linear_terms() {
            let col = self.column(&term.variable)?;
            data.objective[col] += term.coefficient;
        }
        for constraint in &self.constraints {
            let (lower, upper) = constraint.row_bounds();
            data.row_lower.push(lower);
            data.row_upper.push(upper);
        }

        let hessian = if expression.is_quadratic() {
            let mut terms = Vec::with_capacity(expression.quadratic_terms().len());
            for term in expression.quadratic_terms() {
                terms.push((self.column(&term.first)?, self.column(&term.second)?, term.coefficient));
            }
            Some(csc::upper_hessian(num_cols, &terms))
        } else {
            None
        };
        let nonzeros = data.matrix.nnz();

        let backend = live_mut(&mut self.backend)?;
        backend.load_problem(data).map_err(Error::backend("load_problem"))?;
        if let Some(hessian) = hessian {
            backend
                .load_quadratic_objective(hessian)
                .map_err(Error::backend("load_quadratic_objective"))?;
        }
        for (col, variable) in self.variables.iter().enumerate() {
            if variable.is_integer() {
                backend.set_integer(col, true).map_err(Error::backend("set_integer"))?;
            }
        }
        for (row, constraint) in self.constraints.iter().enumerate() {
            if !constraint.is_enabled() {
                let (sense, rhs, range) = constraint.row_type();
                backend
                    .set_row_type(row, sense, rhs, range)
                    .map_err(Error::backend("set_row_type"))?;
            }
        }
        if self.config.name_discipline.pushes_names() {
            for (col, variable) in self.variables.iter().enumerate() {
                backend
                    .set_col_name(col, &variable.name())
                    .map_err(Error::backend("set_col_name"))?;
            }
            for (row, constraint) in self.constraints.iter().enumerate() {
                backend
                    .set_row_name(row, &constraint.name())
                    .map_err(Error::backend("set_row_name"))?;
            }
        }

        self.generated = true;
        debug!(
            component = "engine",
            operation = "generate",
            engine = %self.id,
            columns = num_cols,
            rows = num_rows,
            nonzeros,
        );
        Ok(())
    }

    /// Compile constraints queued after the bulk load, one row at a time.
    fn generate_queued(&mut self) -> Result<()> {
        for constraint in &self.queued {
            constraint.assemble()?;
        }
        while let Some(constraint) = self.queued.pop_front() {
            let entries = self.attach_row(&constraint, true)?;
            let row = self.constraints.len() - 1;
            let (indices, values): (Vec<usize>, Vec<f64>) = entries.into_iter().unzip();
            let (lower, upper) = constraint.row_bounds();
            let backend = live_mut(&mut self.backend)?;
            backend
                .add_row(&SparseVector::new(indices, values), lower, upper)
                .map_err(Error::backend("add_row"))?;
            if !constraint.is_enabled() {
                let (sense, rhs, range) = constraint.row_type();
                backend
                    .set_row_type(row, sense, rhs, range)
                    .map_err(Error::backend("set_row_type"))?;
            }
            if self.config.name_discipline.pushes_names() {
                backend
                    .set_row_name(row, &constraint.name())
                    .map_err(Error::backend("set_row_name"))?;
            }
            debug!(component = "engine", operation = "add_row", engine = %self.id, row);
        }
        Ok(())
    }

    /// Like `discover`, but a new variable also gets a backend column right away.
    pub(super) fn append_column(&mut self, variable: &Variable) -> Result<usize> {
        if let Some(&col) = self.columns.get(&variable.id()) {
            return Ok(col);
        }
        let col = self.discover(variable)?;
        let (lower, upper) = variable.effective_bounds();
        let objective = self.objective.coefficient(variable);
        let pushes_names = self.config.name_discipline.pushes_names();

        let backend = live_mut(&mut self.backend)?;
        backend
            .add_column(&SparseVector::default(), lower, upper, objective)
            .map_err(Error::backend("add_column"))?;
        if variable.kind() == VariableKind::Integer {
            backend.set_integer(col, true).map_err(Error::backend("set_integer"))?;
        }
        if pushes_names {
            backend
                .set_col_name(col, &variable.name())
                .map_err(Error::backend("set_col_name"))?;
        }
        debug!(component = "engine", operation = "add_column", engine = %self.id, col);
        Ok(col)
    }

    /// Unregister every compiled entity. Compiled constraints go back to the front of
    /// the queue in row order.
    pub(crate) fn ungenerate(&mut self) -> Result<()> {
        if self.objective.is_registered_with(self.id) {
            self.objective.unregister(self.id)?;
        }
        let compiled = std::mem::take(&mut self.constraints);
        for constraint in &compiled {
            constraint.unregister(self.id)?;
        }
        let mut queue: std::collections::VecDeque<Constraint> = compiled.into();
        queue.append(&mut self.queued);
        self.queued = queue;

        for variable in std::mem::take(&mut self.variables) {
            variable.unregister(self.id)?;
        }
        self.columns.clear();
        self.rows.clear();
        self.generated = false;
        self.incomplete = false;
        self.mip_snapshot = None;
        debug!(
            component = "engine",
            operation = "ungenerate",
            engine = %self.id,
            queued = self.queued.len(),
        );
        Ok(())
    }
}
