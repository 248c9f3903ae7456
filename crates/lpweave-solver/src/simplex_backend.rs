use tracing::{debug, warn};

use crate::backend::Backend;
use crate::error::BackendError;
use crate::problem::{CscMatrix, ObjectiveSense, ProblemData, RowSense, SparseVector};
use crate::simplex::{Simplex, SimplexResult};
use crate::solution::{Solution, SolutionStatus, WarmStartBasis};
use crate::standard::{LpRef, StandardForm};

/// Distance from an integer beyond which a value counts as fractional
const INTEGRALITY_TOLERANCE: f64 = 1e-6;

/// In-process backend: column-stored problem, dense tableau simplex, depth-first
/// branch and bound.
#[derive(Debug, Clone)]
pub struct SimplexBackend {
    /// Nonzeros per column as `(row, value)`, sorted by row
    columns: Vec<Vec<(usize, f64)>>,
    col_lower: Vec<f64>,
    col_upper: Vec<f64>,
    objective: Vec<f64>,
    integer: Vec<bool>,
    col_names: Vec<String>,
    row_lower: Vec<f64>,
    row_upper: Vec<f64>,
    row_names: Vec<String>,
    sense: ObjectiveSense,
    quadratic: Option<CscMatrix>,
    solution: Solution,
    nodes: usize,
    pending_warm_start: Option<WarmStartBasis>,
    dual_objective_limit: f64,
    /// Maximum simplex iterations per relaxation
    max_iterations: usize,
    /// Maximum branch-and-bound nodes
    max_nodes: usize,
    /// Tolerance for floating point comparisons
    tolerance: f64,
}

impl Default for SimplexBackend {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            col_lower: Vec::new(),
            col_upper: Vec::new(),
            objective: Vec::new(),
            integer: Vec::new(),
            col_names: Vec::new(),
            row_lower: Vec::new(),
            row_upper: Vec::new(),
            row_names: Vec::new(),
            sense: ObjectiveSense::Minimize,
            quadratic: None,
            solution: Solution::default(),
            nodes: 0,
            pending_warm_start: None,
            dual_objective_limit: f64::INFINITY,
            max_iterations: 10000,
            max_nodes: 100_000,
            tolerance: 1e-9,
        }
    }
}

impl SimplexBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.max_nodes = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    fn simplex(&self) -> Simplex {
        Simplex {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
        }
    }

    fn check_col(&self, col: usize) -> Result<(), BackendError> {
        if col < self.columns.len() {
            Ok(())
        } else {
            Err(BackendError::column(col, self.columns.len()))
        }
    }

    fn check_row(&self, row: usize) -> Result<(), BackendError> {
        if row < self.row_lower.len() {
            Ok(())
        } else {
            Err(BackendError::row(row, self.row_lower.len()))
        }
    }

    fn ensure_linear(&self) -> Result<(), BackendError> {
        match &self.quadratic {
            Some(q) if q.values.iter().any(|v| *v != 0.0) => Err(BackendError::Unsupported(
                "the simplex backend cannot solve a quadratic objective".into(),
            )),
            _ => Ok(()),
        }
    }

    fn activity(&self, values: &[f64]) -> Vec<f64> {
        let mut activity = vec![0.0; self.row_lower.len()];
        for (column, &x) in self.columns.iter().zip(values) {
            for &(row, a) in column {
                activity[row] += a * x;
            }
        }
        activity
    }

    /// Solve the continuous relaxation at the current bounds.
    fn solve_relaxation(&self, warm: Option<&WarmStartBasis>) -> Solution {
        let n = self.columns.len();
        let m = self.row_lower.len();
        let lp = LpRef {
            columns: &self.columns,
            col_lower: &self.col_lower,
            col_upper: &self.col_upper,
            objective: &self.objective,
            row_lower: &self.row_lower,
            row_upper: &self.row_upper,
            sense: self.sense,
        };
        let Ok(form) = StandardForm::build(&lp, self.tolerance) else {
            return Solution::unsolved(n, m, SolutionStatus::PrimalInfeasible);
        };

        let crash = warm.filter(|b| !b.is_empty()).map(|b| form.crash_columns(b));
        let outcome = self.simplex().solve(&form, crash.as_deref());
        if crash.is_some() && !outcome.warm {
            warn!(
                component = "simplex",
                operation = "warm_start",
                status = "rejected",
                "Warm start basis is not primal feasible, solving from a cold start"
            );
        }

        let status = match outcome.result {
            SimplexResult::Optimal => SolutionStatus::Optimal,
            SimplexResult::Unbounded => SolutionStatus::DualInfeasible,
            SimplexResult::Infeasible => SolutionStatus::PrimalInfeasible,
            SimplexResult::IterationLimit => SolutionStatus::IterationLimit,
        };
        if status != SolutionStatus::Optimal {
            let mut solution = Solution::unsolved(n, m, status);
            solution.iterations = outcome.iterations;
            return solution;
        }

        let col_solution = form.recover(&outcome.values);
        let row_price = form.row_prices(&outcome.duals, m);
        let row_activity = self.activity(&col_solution);
        let reduced_cost = self
            .columns
            .iter()
            .zip(&self.objective)
            .map(|(column, &c)| c - column.iter().map(|&(row, a)| a * row_price[row]).sum::<f64>())
            .collect();
        let objective_value = col_solution.iter().zip(&self.objective).map(|(x, c)| x * c).sum();

        Solution {
            status,
            col_solution,
            row_activity,
            reduced_cost,
            row_price,
            objective_value,
            iterations: outcome.iterations,
            basis: Some(form.basis_status(&outcome.basic, m)),
        }
    }

    fn run(&mut self, warm: Option<WarmStartBasis>, operation: &'static str) -> Result<(), BackendError> {
        self.ensure_linear()?;
        self.solution = self.solve_relaxation(warm.as_ref());
        self.nodes = 0;
        debug!(
            component = "simplex",
            operation,
            status = ?self.solution.status,
            iterations = self.solution.iterations as u64,
            objective = self.solution.objective_value,
            "Relaxation solved"
        );
        Ok(())
    }

    /// Integer column furthest from integrality.
    fn most_fractional(&self, values: &[f64]) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        let mut best_distance = INTEGRALITY_TOLERANCE;
        for (col, &value) in values.iter().enumerate() {
            if !self.integer[col] {
                continue;
            }
            let fraction = value - value.floor();
            let distance = fraction.min(1.0 - fraction);
            if distance > best_distance {
                best_distance = distance;
                best = Some((col, value));
            }
        }
        best
    }
}

impl Backend for SimplexBackend {
    fn load_problem(&mut self, problem: ProblemData) -> Result<(), BackendError> {
        problem.validate()?;
        let n = problem.num_cols();
        let m = problem.num_rows();
        self.columns = (0..n)
            .map(|col| {
                let (rows, values) = problem.matrix.column(col);
                let mut entries: Vec<(usize, f64)> = rows.iter().copied().zip(values.iter().copied()).collect();
                entries.sort_by_key(|&(row, _)| row);
                entries
            })
            .collect();
        self.col_lower = problem.col_lower;
        self.col_upper = problem.col_upper;
        self.objective = problem.objective;
        self.integer = vec![false; n];
        self.col_names = (0..n).map(|j| format!("C{j}")).collect();
        self.row_lower = problem.row_lower;
        self.row_upper = problem.row_upper;
        self.row_names = (0..m).map(|i| format!("R{i}")).collect();
        self.quadratic = None;
        self.solution = Solution::default();
        self.nodes = 0;
        self.pending_warm_start = None;
        debug!(
            component = "simplex",
            operation = "load_problem",
            columns = n as u64,
            rows = m as u64,
            nnz = self.num_elements() as u64,
            "Problem loaded"
        );
        Ok(())
    }

    fn load_quadratic_objective(&mut self, hessian: CscMatrix) -> Result<(), BackendError> {
        hessian.validate()?;
        let n = self.columns.len();
        if hessian.num_cols() != n || hessian.num_rows != n {
            return Err(BackendError::InvalidProblem(format!(
                "Hessian is {}x{} but the problem has {n} columns",
                hessian.num_rows,
                hessian.num_cols()
            )));
        }
        self.quadratic = Some(hessian);
        Ok(())
    }

    fn add_column(&mut self, column: &SparseVector, lower: f64, upper: f64, objective: f64) -> Result<(), BackendError> {
        let mut entries = Vec::with_capacity(column.len());
        for (row, value) in column.iter() {
            self.check_row(row)?;
            entries.push((row, value));
        }
        entries.sort_by_key(|&(row, _)| row);
        let col = self.columns.len();
        self.columns.push(entries);
        self.col_lower.push(lower);
        self.col_upper.push(upper);
        self.objective.push(objective);
        self.integer.push(false);
        self.col_names.push(format!("C{col}"));
        if let Some(q) = self.quadratic.as_mut() {
            q.num_rows += 1;
            q.col_starts.push(q.values.len());
        }
        Ok(())
    }

    fn add_row(&mut self, row: &SparseVector, lower: f64, upper: f64) -> Result<(), BackendError> {
        for (col, _) in row.iter() {
            self.check_col(col)?;
        }
        let index = self.row_lower.len();
        for (col, value) in row.iter() {
            self.columns[col].push((index, value));
        }
        self.row_lower.push(lower);
        self.row_upper.push(upper);
        self.row_names.push(format!("R{index}"));
        Ok(())
    }

    fn num_cols(&self) -> usize {
        self.columns.len()
    }

    fn num_rows(&self) -> usize {
        self.row_lower.len()
    }

    fn num_elements(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    fn num_integers(&self) -> usize {
        self.integer.iter().filter(|&&i| i).count()
    }

    fn set_col_bounds(&mut self, col: usize, lower: f64, upper: f64) -> Result<(), BackendError> {
        self.check_col(col)?;
        self.col_lower[col] = lower;
        self.col_upper[col] = upper;
        Ok(())
    }

    fn set_col_lower(&mut self, col: usize, lower: f64) -> Result<(), BackendError> {
        self.check_col(col)?;
        self.col_lower[col] = lower;
        Ok(())
    }

    fn set_col_upper(&mut self, col: usize, upper: f64) -> Result<(), BackendError> {
        self.check_col(col)?;
        self.col_upper[col] = upper;
        Ok(())
    }

    fn set_col_lower_all(&mut self, lower: &[f64]) -> Result<(), BackendError> {
        if lower.len() != self.columns.len() {
            return Err(BackendError::InvalidProblem(format!(
                "expected {} column lower bounds, got {}",
                self.columns.len(),
                lower.len()
            )));
        }
        self.col_lower.copy_from_slice(lower);
        Ok(())
    }

    fn set_col_upper_all(&mut self, upper: &[f64]) -> Result<(), BackendError> {
        if upper.len() != self.columns.len() {
            return Err(BackendError::InvalidProblem(format!(
                "expected {} column upper bounds, got {}",
                self.columns.len(),
                upper.len()
            )));
        }
        self.col_upper.copy_from_slice(upper);
        Ok(())
    }

    fn set_integer(&mut self, col: usize, integer: bool) -> Result<(), BackendError> {
        self.check_col(col)?;
        self.integer[col] = integer;
        Ok(())
    }

    fn set_col_name(&mut self, col: usize, name: &str) -> Result<(), BackendError> {
        self.check_col(col)?;
        self.col_names[col] = name.to_string();
        Ok(())
    }

    fn set_row_bounds(&mut self, row: usize, lower: f64, upper: f64) -> Result<(), BackendError> {
        self.check_row(row)?;
        self.row_lower[row] = lower;
        self.row_upper[row] = upper;
        Ok(())
    }

    fn set_row_lower(&mut self, row: usize, lower: f64) -> Result<(), BackendError> {
        self.check_row(row)?;
        self.row_lower[row] = lower;
        Ok(())
    }

    fn set_row_upper(&mut self, row: usize, upper: f64) -> Result<(), BackendError> {
        self.check_row(row)?;
        self.row_upper[row] = upper;
        Ok(())
    }

    fn set_row_type(&mut self, row: usize, sense: RowSense, rhs: f64, range: f64) -> Result<(), BackendError> {
        let (lower, upper) = sense.bounds(rhs, range);
        self.set_row_bounds(row, lower, upper)
    }

    fn set_row_name(&mut self, row: usize, name: &str) -> Result<(), BackendError> {
        self.check_row(row)?;
        self.row_names[row] = name.to_string();
        Ok(())
    }

    fn set_coefficient(&mut self, row: usize, col: usize, value: f64) -> Result<(), BackendError> {
        self.check_col(col)?;
        self.check_row(row)?;
        match self.columns[col].iter_mut().find(|(r, _)| *r == row) {
            Some(entry) => {
                entry.1 = value;
                Ok(())
            }
            None => Err(BackendError::MissingCoefficient { row, col }),
        }
    }

    fn coefficient(&self, row: usize, col: usize) -> Option<f64> {
        self.columns
            .get(col)?
            .iter()
            .find(|(r, _)| *r == row)
            .map(|&(_, value)| value)
    }

    fn set_objective_coefficient(&mut self, col: usize, value: f64) -> Result<(), BackendError> {
        self.check_col(col)?;
        self.objective[col] = value;
        Ok(())
    }

    fn set_objective(&mut self, coefficients: &[f64]) -> Result<(), BackendError> {
        if coefficients.len() != self.columns.len() {
            return Err(BackendError::InvalidProblem(format!(
                "expected {} objective coefficients, got {}",
                self.columns.len(),
                coefficients.len()
            )));
        }
        self.objective.copy_from_slice(coefficients);
        Ok(())
    }

    fn set_objective_sense(&mut self, sense: ObjectiveSense) {
        self.sense = sense;
    }

    fn objective_sense(&self) -> ObjectiveSense {
        self.sense
    }

    fn col_lower(&self) -> &[f64] {
        &self.col_lower
    }

    fn col_upper(&self) -> &[f64] {
        &self.col_upper
    }

    fn row_lower(&self) -> &[f64] {
        &self.row_lower
    }

    fn row_upper(&self) -> &[f64] {
        &self.row_upper
    }

    fn objective_coefficients(&self) -> &[f64] {
        &self.objective
    }

    fn is_integer(&self, col: usize) -> bool {
        self.integer.get(col).copied().unwrap_or(false)
    }

    fn col_name(&self, col: usize) -> Option<&str> {
        self.col_names.get(col).map(String::as_str)
    }

    fn row_name(&self, row: usize) -> Option<&str> {
        self.row_names.get(row).map(String::as_str)
    }

    fn matrix_by_col(&self) -> CscMatrix {
        let mut matrix = CscMatrix::empty(self.row_lower.len(), 0);
        for column in &self.columns {
            for &(row, value) in column {
                matrix.row_indices.push(row);
                matrix.values.push(value);
            }
            matrix.col_starts.push(matrix.values.len());
        }
        matrix
    }

    fn quadratic_objective(&self) -> Option<&CscMatrix> {
        self.quadratic.as_ref()
    }

    fn initial_solve(&mut self) -> Result<(), BackendError> {
        let warm = self.pending_warm_start.take();
        self.run(warm, "initial_solve")
    }

    fn resolve(&mut self) -> Result<(), BackendError> {
        let warm = self
            .pending_warm_start
            .take()
            .or_else(|| self.solution.basis.clone());
        self.run(warm, "resolve")
    }

    fn branch_and_bound(&mut self) -> Result<(), BackendError> {
        self.ensure_linear()?;
        self.pending_warm_start = None;
        let n = self.columns.len();
        let m = self.row_lower.len();
        let sign = self.sense.sign();

        let mut stack = vec![(self.col_lower.clone(), self.col_upper.clone())];
        let mut incumbent: Option<Solution> = None;
        let mut cutoff = f64::INFINITY;
        let mut nodes = 0;
        let mut iterations = 0;
        let mut stopped: Option<SolutionStatus> = None;

        while let Some((lower, upper)) = stack.pop() {
            if nodes >= self.max_nodes {
                stopped = Some(SolutionStatus::NodeLimit);
                break;
            }
            nodes += 1;
            // Node bounds are written in place; the search ends at a leaf state.
            self.col_lower = lower;
            self.col_upper = upper;

            let relaxed = self.solve_relaxation(None);
            iterations += relaxed.iterations;
            match relaxed.status {
                SolutionStatus::Optimal => {}
                SolutionStatus::DualInfeasible if incumbent.is_none() => {
                    stopped = Some(SolutionStatus::DualInfeasible);
                    break;
                }
                SolutionStatus::IterationLimit => {
                    stopped = Some(SolutionStatus::IterationLimit);
                    break;
                }
                _ => continue,
            }

            let bound = sign * relaxed.objective_value;
            if bound >= cutoff - self.tolerance {
                continue;
            }
            match self.most_fractional(&relaxed.col_solution) {
                None => {
                    cutoff = bound;
                    self.dual_objective_limit = relaxed.objective_value;
                    incumbent = Some(relaxed);
                }
                Some((col, value)) => {
                    let mut up_lower = self.col_lower.clone();
                    up_lower[col] = value.ceil();
                    let mut down_upper = self.col_upper.clone();
                    down_upper[col] = value.floor();
                    stack.push((up_lower, self.col_upper.clone()));
                    stack.push((self.col_lower.clone(), down_upper));
                }
            }
        }

        self.nodes = nodes;
        self.solution = match incumbent {
            Some(mut best) => {
                best.status = stopped.unwrap_or(SolutionStatus::Optimal);
                best.iterations = iterations;
                best
            }
            None => {
                let mut none = Solution::unsolved(n, m, stopped.unwrap_or(SolutionStatus::PrimalInfeasible));
                none.iterations = iterations;
                none
            }
        };
        debug!(
            component = "simplex",
            operation = "branch_and_bound",
            status = ?self.solution.status,
            nodes = nodes as u64,
            iterations = iterations as u64,
            objective = self.solution.objective_value,
            "Tree search finished"
        );
        Ok(())
    }

    fn status(&self) -> SolutionStatus {
        self.solution.status
    }

    fn iteration_count(&self) -> usize {
        self.solution.iterations
    }

    fn node_count(&self) -> usize {
        self.nodes
    }

    fn objective_value(&self) -> f64 {
        self.solution.objective_value
    }

    fn col_solution(&self) -> &[f64] {
        &self.solution.col_solution
    }

    fn row_activity(&self) -> &[f64] {
        &self.solution.row_activity
    }

    fn reduced_cost(&self) -> &[f64] {
        &self.solution.reduced_cost
    }

    fn row_price(&self) -> &[f64] {
        &self.solution.row_price
    }

    fn set_col_solution(&mut self, values: &[f64]) -> Result<(), BackendError> {
        if values.len() != self.columns.len() {
            return Err(BackendError::InvalidProblem(format!(
                "expected {} column values, got {}",
                self.columns.len(),
                values.len()
            )));
        }
        self.solution.col_solution = values.to_vec();
        Ok(())
    }

    fn set_row_price(&mut self, prices: &[f64]) -> Result<(), BackendError> {
        if prices.len() != self.row_lower.len() {
            return Err(BackendError::InvalidProblem(format!(
                "expected {} row prices, got {}",
                self.row_lower.len(),
                prices.len()
            )));
        }
        self.solution.row_price = prices.to_vec();
        Ok(())
    }

    fn warm_start(&self) -> WarmStartBasis {
        self.solution.basis.clone().unwrap_or_default()
    }

    fn set_warm_start(&mut self, basis: &WarmStartBasis) -> Result<(), BackendError> {
        self.pending_warm_start = Some(basis.clone());
        Ok(())
    }

    fn dual_objective_limit(&self) -> f64 {
        self.dual_objective_limit
    }

    fn set_dual_objective_limit(&mut self, limit: f64) {
        self.dual_objective_limit = limit;
    }
}
