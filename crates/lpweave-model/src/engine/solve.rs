use tracing::{debug, info, warn};

use super::{live, live_mut, EngineState, MipSnapshot, SolveStatus};
use crate::constraint::Constraint;
use crate::error::{Error, Result};
use crate::variable::Variable;
use crate::warm_start::{fit_to, WarmStart};

fn value_at(values: &[f64], index: usize) -> f64 {
    values.get(index).copied().unwrap_or(0.0)
}

impl EngineState {
    pub(crate) fn solve(&mut self, force_relaxation: bool) -> Result<()> {
        self.generate()?;
        let integers = live(&self.backend)?.num_integers();
        debug!(
            component = "engine",
            operation = "solve",
            engine = %self.id,
            integers,
            force_relaxation,
        );
        if integers > 0 && !force_relaxation {
            return self.branch_and_bound();
        }
        live_mut(&mut self.backend)?
            .initial_solve()
            .map_err(Error::backend("initial_solve"))?;
        self.assign_solution()
    }

    pub(crate) fn resolve(&mut self, force_relaxation: bool) -> Result<()> {
        if !self.generated {
            return Err(Error::precondition(format!(
                "engine {} must be generated before resolve",
                self.name
            )));
        }
        self.generate()?;
        if live(&self.backend)?.num_integers() > 0 && !force_relaxation {
            return self.branch_and_bound();
        }
        live_mut(&mut self.backend)?
            .resolve()
            .map_err(Error::backend("resolve"))?;
        self.assign_solution()
    }

    fn branch_and_bound(&mut self) -> Result<()> {
        let auto_reset = self.config.auto_reset_mip;
        if auto_reset {
            self.save_mip_state()?;
        }
        let searched = live_mut(&mut self.backend)
            .and_then(|backend| backend.branch_and_bound().map_err(Error::backend("branch_and_bound")));
        let outcome = searched.and_then(|()| self.assign_solution());
        if !auto_reset {
            return outcome;
        }
        let restored = self.restore_mip_state();
        if let (Err(_), Err(err)) = (&outcome, &restored) {
            warn!(component = "engine", operation = "restore_mip_state", engine = %self.id, error = %err);
        }
        outcome.and(restored)
    }

    /// Copy the backend's solution into the compiled entities and make this engine
    /// their assigned one.
    fn assign_solution(&mut self) -> Result<()> {
        let backend = live(&self.backend)?;
        if backend.num_cols() != self.variables.len() || backend.num_rows() != self.constraints.len() {
            return Err(Error::precondition(format!(
                "backend holds {} columns and {} rows but engine {} tracks {} and {}",
                backend.num_cols(),
                backend.num_rows(),
                self.name,
                self.variables.len(),
                self.constraints.len()
            )));
        }

        self.status = SolveStatus {
            status: backend.status(),
            iterations: backend.iteration_count(),
            nodes: backend.node_count(),
        };
        let (values, reduced_costs) = (backend.col_solution(), backend.reduced_cost());
        for (col, variable) in self.variables.iter().enumerate() {
            variable.set_solution(self.id, col, value_at(values, col), value_at(reduced_costs, col));
        }
        let (prices, activities) = (backend.row_price(), backend.row_activity());
        for (row, constraint) in self.constraints.iter().enumerate() {
            constraint.set_solution(self.id, row, value_at(prices, row), value_at(activities, row));
        }
        self.objective.set_solution(self.id, backend.objective_value());

        info!(
            component = "engine",
            operation = "solve",
            engine = %self.id,
            status = ?self.status.status,
            objective = self.objective.value(),
            iterations = self.status.iterations,
            nodes = self.status.nodes,
        );
        Ok(())
    }

    // ── Readings at this engine's offsets ─────────────────────────────────

    pub(crate) fn column_value(&self, variable: &Variable) -> Result<f64> {
        let col = self.column(variable)?;
        Ok(value_at(live(&self.backend)?.col_solution(), col))
    }

    pub(crate) fn column_reduced_cost(&self, variable: &Variable) -> Result<f64> {
        let col = self.column(variable)?;
        Ok(value_at(live(&self.backend)?.reduced_cost(), col))
    }

    pub(crate) fn row_price(&self, constraint: &Constraint) -> Result<f64> {
        let row = self.row(constraint)?;
        Ok(value_at(live(&self.backend)?.row_price(), row))
    }

    pub(crate) fn row_activity(&self, constraint: &Constraint) -> Result<f64> {
        let row = self.row(constraint)?;
        Ok(value_at(live(&self.backend)?.row_activity(), row))
    }

    /// Every compiled column and enabled row holds at this engine's solution.
    pub(crate) fn is_feasible(&self, tolerance: f64) -> Result<bool> {
        let backend = live(&self.backend)?;
        let values = backend.col_solution();
        let columns = self
            .variables
            .iter()
            .enumerate()
            .all(|(col, v)| v.is_feasible_at(value_at(values, col), tolerance));
        let activities = backend.row_activity();
        let rows = self
            .constraints
            .iter()
            .enumerate()
            .all(|(row, c)| c.is_feasible_at(value_at(activities, row), tolerance));
        Ok(columns && rows)
    }

    /// Status, objective, then one level line per column and per row.
    pub(crate) fn solution_report(&self) -> Result<String> {
        let backend = live(&self.backend)?;
        let status = if self.status.is_proven_optimal() { "Optimal" } else { "not Optimal" };
        let objective = backend.objective_value() + self.objective.constant();
        let mut lines = vec![
            format!("Model status: {status}"),
            format!("Objective: {objective}"),
            "Variables:".to_string(),
        ];
        let (values, reduced_costs) = (backend.col_solution(), backend.reduced_cost());
        for (col, variable) in self.variables.iter().enumerate() {
            lines.push(variable.level_string_at(value_at(values, col), value_at(reduced_costs, col)));
        }
        lines.push("Constraints:".to_string());
        let (activities, prices) = (backend.row_activity(), backend.row_price());
        for (row, constraint) in self.constraints.iter().enumerate() {
            lines.push(constraint.level_string_at(value_at(activities, row), value_at(prices, row)));
        }
        lines.push("End".to_string());
        Ok(lines.join("\n"))
    }

    // ── MIP state ─────────────────────────────────────────────────────────

    fn save_mip_state(&mut self) -> Result<()> {
        let backend = live(&self.backend)?;
        self.mip_snapshot = Some(MipSnapshot {
            col_lower: backend.col_lower().to_vec(),
            col_upper: backend.col_upper().to_vec(),
            dual_objective_limit: backend.dual_objective_limit(),
        });
        debug!(component = "engine", operation = "save_mip_state", engine = %self.id);
        Ok(())
    }

    fn restore_mip_state(&mut self) -> Result<()> {
        let snapshot = self.mip_snapshot.take().ok_or_else(|| {
            Error::precondition(format!("engine {} has no saved MIP state", self.name))
        })?;
        let backend = live_mut(&mut self.backend)?;
        if snapshot.col_lower.len() == backend.num_cols() {
            backend
                .set_col_lower_all(&snapshot.col_lower)
                .map_err(Error::backend("set_col_lower_all"))?;
            backend
                .set_col_upper_all(&snapshot.col_upper)
                .map_err(Error::backend("set_col_upper_all"))?;
        } else {
            // Columns added since the save keep their own bounds.
            let bounds = snapshot.col_lower.iter().zip(&snapshot.col_upper);
            for (col, (&lower, &upper)) in bounds.enumerate().take(backend.num_cols()) {
                backend
                    .set_col_bounds(col, lower, upper)
                    .map_err(Error::backend("set_col_bounds"))?;
            }
        }
        backend.set_dual_objective_limit(snapshot.dual_objective_limit);
        debug!(component = "engine", operation = "restore_mip_state", engine = %self.id);
        Ok(())
    }

    pub(crate) fn save_before_mip_solve(&mut self) -> Result<()> {
        if self.config.auto_reset_mip {
            return Err(Error::precondition(
                "MIP state is saved automatically while auto_reset_mip is on",
            ));
        }
        self.generate()?;
        self.save_mip_state()
    }

    pub(crate) fn reset_after_mip_solve(&mut self) -> Result<()> {
        if self.config.auto_reset_mip {
            return Err(Error::precondition(
                "MIP state is restored automatically while auto_reset_mip is on",
            ));
        }
        self.restore_mip_state()
    }

    // ── Warm start ────────────────────────────────────────────────────────

    pub(crate) fn warm_start(&self) -> Result<WarmStart> {
        if !self.generated {
            return Err(Error::precondition(format!(
                "engine {} has no basis before generate",
                self.name
            )));
        }
        let backend = live(&self.backend)?;
        let row_price = self
            .config
            .warm_start_row_prices
            .then(|| backend.row_price().to_vec());
        Ok(WarmStart::new(backend.warm_start(), backend.col_solution().to_vec(), row_price))
    }

    pub(crate) fn empty_warm_start(&self) -> Result<WarmStart> {
        let backend = live(&self.backend)?;
        Ok(WarmStart::new(backend.empty_warm_start(), Vec::new(), None))
    }

    /// Apply a snapshot, padding or truncating its vectors to the current sizes.
    pub(crate) fn set_warm_start(&mut self, warm_start: &WarmStart) -> Result<()> {
        self.generate()?;
        let with_prices = self.config.warm_start_row_prices;
        let backend = live_mut(&mut self.backend)?;
        backend
            .set_warm_start(warm_start.basis())
            .map_err(Error::backend("set_warm_start"))?;
        if !warm_start.col_solution().is_empty() {
            let values = fit_to(warm_start.col_solution(), backend.num_cols());
            backend
                .set_col_solution(&values)
                .map_err(Error::backend("set_col_solution"))?;
        }
        if let Some(prices) = warm_start.row_price().filter(|_| with_prices) {
            let prices = fit_to(prices, backend.num_rows());
            backend
                .set_row_price(&prices)
                .map_err(Error::backend("set_row_price"))?;
        }
        debug!(component = "engine", operation = "set_warm_start", engine = %self.id);
        Ok(())
    }
}
