#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use lpweave_model::{Constraint, IdAllocator, Model, Objective, Variable};
use lpweave_solver::{
    Backend, BackendError, CscMatrix, ObjectiveSense, ProblemData, RowSense, SimplexBackend,
    SolutionStatus, SparseVector, WarmStartBasis,
};

/// Shared log of mutating backend calls, readable after the backend moved into a solver.
pub type CallLog = Rc<RefCell<Vec<String>>>;

/// Backend operations that should fail, shared with the test body.
pub type Rejection = Rc<RefCell<Vec<&'static str>>>;

/// A `SimplexBackend` that records every mutating call it receives.
pub struct RecordingBackend {
    inner: SimplexBackend,
    log: CallLog,
    reject: Rejection,
}

impl RecordingBackend {
    pub fn new() -> (Self, CallLog) {
        let log = CallLog::default();
        let backend = Self {
            inner: SimplexBackend::new(),
            log: Rc::clone(&log),
            reject: Rejection::default(),
        };
        (backend, log)
    }

    /// Handle for making `load_problem`, `add_column`, `add_row`, `branch_and_bound` or
    /// `set_col_lower_all` fail on demand.
    pub fn rejection(&self) -> Rejection {
        Rc::clone(&self.reject)
    }

    fn record(&self, call: String) {
        self.log.borrow_mut().push(call);
    }

    fn gate(&self, operation: &'static str) -> Result<(), BackendError> {
        if self.reject.borrow().contains(&operation) {
            return Err(BackendError::InvalidProblem(format!("{operation} refused")));
        }
        Ok(())
    }
}

pub fn take_calls(log: &CallLog) -> Vec<String> {
    std::mem::take(&mut *log.borrow_mut())
}

impl Backend for RecordingBackend {
    fn load_problem(&mut self, problem: ProblemData) -> Result<(), BackendError> {
        self.record(format!("load_problem({}x{})", problem.num_rows(), problem.num_cols()));
        self.gate("load_problem")?;
        self.inner.load_problem(problem)
    }

    fn load_quadratic_objective(&mut self, hessian: CscMatrix) -> Result<(), BackendError> {
        self.record(format!("load_quadratic_objective({})", hessian.nnz()));
        self.inner.load_quadratic_objective(hessian)
    }

    fn add_column(&mut self, column: &SparseVector, lower: f64, upper: f64, objective: f64) -> Result<(), BackendError> {
        self.record(format!("add_column({}, {lower}, {upper}, {objective})", column.len()));
        self.gate("add_column")?;
        self.inner.add_column(column, lower, upper, objective)
    }

    fn add_row(&mut self, row: &SparseVector, lower: f64, upper: f64) -> Result<(), BackendError> {
        self.record(format!("add_row({}, {lower}, {upper})", row.len()));
        self.gate("add_row")?;
        self.inner.add_row(row, lower, upper)
    }

    fn num_cols(&self) -> usize {
        self.inner.num_cols()
    }

    fn num_rows(&self) -> usize {
        self.inner.num_rows()
    }

    fn num_elements(&self) -> usize {
        self.inner.num_elements()
    }

    fn num_integers(&self) -> usize {
        self.inner.num_integers()
    }

    fn set_col_bounds(&mut self, col: usize, lower: f64, upper: f64) -> Result<(), BackendError> {
        self.record(format!("set_col_bounds({col}, {lower}, {upper})"));
        self.inner.set_col_bounds(col, lower, upper)
    }

    fn set_col_lower(&mut self, col: usize, lower: f64) -> Result<(), BackendError> {
        self.record(format!("set_col_lower({col}, {lower})"));
        self.inner.set_col_lower(col, lower)
    }

    fn set_col_upper(&mut self, col: usize, upper: f64) -> Result<(), BackendError> {
        self.record(format!("set_col_upper({col}, {upper})"));
        self.inner.set_col_upper(col, upper)
    }

    fn set_col_lower_all(&mut self, lower: &[f64]) -> Result<(), BackendError> {
        self.record(format!("set_col_lower_all({})", lower.len()));
        self.gate("set_col_lower_all")?;
        self.inner.set_col_lower_all(lower)
    }

    fn set_col_upper_all(&mut self, upper: &[f64]) -> Result<(), BackendError> {
        self.record(format!("set_col_upper_all({})", upper.len()));
        self.inner.set_col_upper_all(upper)
    }

    fn set_integer(&mut self, col: usize, integer: bool) -> Result<(), BackendError> {
        self.record(format!("set_integer({col}, {integer})"));
        self.inner.set_integer(col, integer)
    }

    fn set_col_name(&mut self, col: usize, name: &str) -> Result<(), BackendError> {
        self.record(format!("set_col_name({col}, {name})"));
        self.inner.set_col_name(col, name)
    }

    fn set_row_bounds(&mut self, row: usize, lower: f64, upper: f64) -> Result<(), BackendError> {
        self.record(format!("set_row_bounds({row}, {lower}, {upper})"));
        self.inner.set_row_bounds(row, lower, upper)
    }

    fn set_row_lower(&mut self, row: usize, lower: f64) -> Result<(), BackendError> {
        self.record(format!("set_row_lower({row}, {lower})"));
        self.inner.set_row_lower(row, lower)
    }

    fn set_row_upper(&mut self, row: usize, upper: f64) -> Result<(), BackendError> {
        self.record(format!("set_row_upper({row}, {upper})"));
        self.inner.set_row_upper(row, upper)
    }

    fn set_row_type(&mut self, row: usize, sense: RowSense, rhs: f64, range: f64) -> Result<(), BackendError> {
        self.record(format!("set_row_type({row}, {sense:?}, {rhs}, {range})"));
        self.inner.set_row_type(row, sense, rhs, range)
    }

    fn set_row_name(&mut self, row: usize, name: &str) -> Result<(), BackendError> {
        self.record(format!("set_row_name({row}, {name})"));
        self.inner.set_row_name(row, name)
    }

    fn set_coefficient(&mut self, row: usize, col: usize, value: f64) -> Result<(), BackendError> {
        self.record(format!("set_coefficient({row}, {col}, {value})"));
        self.inner.set_coefficient(row, col, value)
    }

    fn coefficient(&self, row: usize, col: usize) -> Option<f64> {
        self.inner.coefficient(row, col)
    }

    fn set_objective_coefficient(&mut self, col: usize, value: f64) -> Result<(), BackendError> {
        self.record(format!("set_objective_coefficient({col}, {value})"));
        self.inner.set_objective_coefficient(col, value)
    }

    fn set_objective(&mut self, coefficients: &[f64]) -> Result<(), BackendError> {
        self.record(format!("set_objective({coefficients:?})"));
        self.inner.set_objective(coefficients)
    }

    fn set_objective_sense(&mut self, sense: ObjectiveSense) {
        self.record(format!("set_objective_sense({sense:?})"));
        self.inner.set_objective_sense(sense)
    }

    fn objective_sense(&self) -> ObjectiveSense {
        self.inner.objective_sense()
    }

    fn col_lower(&self) -> &[f64] {
        self.inner.col_lower()
    }

    fn col_upper(&self) -> &[f64] {
        self.inner.col_upper()
    }

    fn row_lower(&self) -> &[f64] {
        self.inner.row_lower()
    }

    fn row_upper(&self) -> &[f64] {
        self.inner.row_upper()
    }

    fn objective_coefficients(&self) -> &[f64] {
        self.inner.objective_coefficients()
    }

    fn is_integer(&self, col: usize) -> bool {
        self.inner.is_integer(col)
    }

    fn col_name(&self, col: usize) -> Option<&str> {
        self.inner.col_name(col)
    }

    fn row_name(&self, row: usize) -> Option<&str> {
        self.inner.row_name(row)
    }

    fn matrix_by_col(&self) -> CscMatrix {
        self.inner.matrix_by_col()
    }

    fn quadratic_objective(&self) -> Option<&CscMatrix> {
        self.inner.quadratic_objective()
    }

    fn initial_solve(&mut self) -> Result<(), BackendError> {
        self.record("initial_solve".into());
        self.inner.initial_solve()
    }

    fn resolve(&mut self) -> Result<(), BackendError> {
        self.record("resolve".into());
        self.inner.resolve()
    }

    fn branch_and_bound(&mut self) -> Result<(), BackendError> {
        self.record("branch_and_bound".into());
        self.gate("branch_and_bound")?;
        self.inner.branch_and_bound()
    }

    fn status(&self) -> SolutionStatus {
        self.inner.status()
    }

    fn iteration_count(&self) -> usize {
        self.inner.iteration_count()
    }

    fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    fn objective_value(&self) -> f64 {
        self.inner.objective_value()
    }

    fn col_solution(&self) -> &[f64] {
        self.inner.col_solution()
    }

    fn row_activity(&self) -> &[f64] {
        self.inner.row_activity()
    }

    fn reduced_cost(&self) -> &[f64] {
        self.inner.reduced_cost()
    }

    fn row_price(&self) -> &[f64] {
        self.inner.row_price()
    }

    fn set_col_solution(&mut self, values: &[f64]) -> Result<(), BackendError> {
        self.record(format!("set_col_solution({})", values.len()));
        self.inner.set_col_solution(values)
    }

    fn set_row_price(&mut self, prices: &[f64]) -> Result<(), BackendError> {
        self.record(format!("set_row_price({})", prices.len()));
        self.inner.set_row_price(prices)
    }

    fn warm_start(&self) -> WarmStartBasis {
        self.inner.warm_start()
    }

    fn empty_warm_start(&self) -> WarmStartBasis {
        self.inner.empty_warm_start()
    }

    fn set_warm_start(&mut self, basis: &WarmStartBasis) -> Result<(), BackendError> {
        self.record("set_warm_start".into());
        self.inner.set_warm_start(basis)
    }

    fn dual_objective_limit(&self) -> f64 {
        self.inner.dual_objective_limit()
    }

    fn set_dual_objective_limit(&mut self, limit: f64) {
        self.record(format!("set_dual_objective_limit({limit})"));
        self.inner.set_dual_objective_limit(limit)
    }
}

/// The investment model used across the scenario tests:
///
/// maximise `3x + 2y` subject to `x + y <= 4`, `x + 3y <= 9`, `x <= 3`.
pub struct Investment {
    pub ids: IdAllocator,
    pub model: Model,
    pub x: Variable,
    pub y: Variable,
    pub budget: Constraint,
    pub labour: Constraint,
}

pub fn investment() -> Investment {
    let ids = IdAllocator::new();
    let model = Model::named(&ids, "investment");
    let x = Variable::bounded(&ids, "x", 0.0, 3.0).unwrap();
    let y = Variable::named(&ids, "y");

    let objective = Objective::named(&ids, "profit", 3.0 * &x + 2.0 * &y);
    model.set_objective(&objective).unwrap();
    model.set_sense(ObjectiveSense::Maximize).unwrap();

    let budget = Constraint::le(&ids, &x + &y, 4.0).unwrap();
    let labour = Constraint::le(&ids, &x + 3.0 * &y, 9.0).unwrap();
    model.add_named(&budget, "budget").unwrap();
    model.add_named(&labour, "labour").unwrap();

    Investment {
        ids,
        model,
        x,
        y,
        budget,
        labour,
    }
}
