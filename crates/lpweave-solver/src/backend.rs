use crate::error::BackendError;
use crate::problem::{CscMatrix, ObjectiveSense, ProblemData, RowSense, SparseVector};
use crate::solution::{SolutionStatus, WarmStartBasis};

/// The numeric solver capability a model is compiled into.
///
/// Every setter is offset-indexed: columns and rows are addressed by their zero-based
/// position in the loaded problem.
pub trait Backend {
    /// Replace the whole problem in one bulk load.
    fn load_problem(&mut self, problem: ProblemData) -> Result<(), BackendError>;

    /// Load an upper-triangular Hessian `Q` for the objective `c'x + 1/2 x'Qx`.
    fn load_quadratic_objective(&mut self, hessian: CscMatrix) -> Result<(), BackendError>;

    fn add_column(&mut self, column: &SparseVector, lower: f64, upper: f64, objective: f64) -> Result<(), BackendError>;

    fn add_row(&mut self, row: &SparseVector, lower: f64, upper: f64) -> Result<(), BackendError>;

    fn num_cols(&self) -> usize;
    fn num_rows(&self) -> usize;
    fn num_elements(&self) -> usize;
    fn num_integers(&self) -> usize;

    fn set_col_bounds(&mut self, col: usize, lower: f64, upper: f64) -> Result<(), BackendError>;
    fn set_col_lower(&mut self, col: usize, lower: f64) -> Result<(), BackendError>;
    fn set_col_upper(&mut self, col: usize, upper: f64) -> Result<(), BackendError>;
    /// Overwrite every column lower bound at once.
    fn set_col_lower_all(&mut self, lower: &[f64]) -> Result<(), BackendError>;
    /// Overwrite every column upper bound at once.
    fn set_col_upper_all(&mut self, upper: &[f64]) -> Result<(), BackendError>;
    fn set_integer(&mut self, col: usize, integer: bool) -> Result<(), BackendError>;
    fn set_col_name(&mut self, col: usize, name: &str) -> Result<(), BackendError>;

    fn set_row_bounds(&mut self, row: usize, lower: f64, upper: f64) -> Result<(), BackendError>;
    fn set_row_lower(&mut self, row: usize, lower: f64) -> Result<(), BackendError>;
    fn set_row_upper(&mut self, row: usize, upper: f64) -> Result<(), BackendError>;
    fn set_row_type(&mut self, row: usize, sense: RowSense, rhs: f64, range: f64) -> Result<(), BackendError>;
    fn set_row_name(&mut self, row: usize, name: &str) -> Result<(), BackendError>;

    /// Change an existing nonzero. Creating a new nonzero is an error.
    fn set_coefficient(&mut self, row: usize, col: usize, value: f64) -> Result<(), BackendError>;
    /// The stored nonzero at `(row, col)`, if any.
    fn coefficient(&self, row: usize, col: usize) -> Option<f64>;

    fn set_objective_coefficient(&mut self, col: usize, value: f64) -> Result<(), BackendError>;
    /// Overwrite the dense objective vector.
    fn set_objective(&mut self, coefficients: &[f64]) -> Result<(), BackendError>;
    fn set_objective_sense(&mut self, sense: ObjectiveSense);
    fn objective_sense(&self) -> ObjectiveSense;

    fn col_lower(&self) -> &[f64];
    fn col_upper(&self) -> &[f64];
    fn row_lower(&self) -> &[f64];
    fn row_upper(&self) -> &[f64];
    fn objective_coefficients(&self) -> &[f64];
    fn is_integer(&self, col: usize) -> bool;
    fn col_name(&self, col: usize) -> Option<&str>;
    fn row_name(&self, row: usize) -> Option<&str>;
    fn matrix_by_col(&self) -> CscMatrix;
    fn quadratic_objective(&self) -> Option<&CscMatrix>;

    /// Solve the continuous relaxation from scratch (or from a supplied warm start).
    fn initial_solve(&mut self) -> Result<(), BackendError>;
    /// Solve again, reusing the last basis when no warm start was supplied.
    fn resolve(&mut self) -> Result<(), BackendError>;
    /// Tree search over integer columns. May leave column bounds at a leaf state.
    fn branch_and_bound(&mut self) -> Result<(), BackendError>;

    fn status(&self) -> SolutionStatus;
    fn iteration_count(&self) -> usize;
    fn node_count(&self) -> usize;
    fn objective_value(&self) -> f64;
    fn col_solution(&self) -> &[f64];
    fn row_activity(&self) -> &[f64];
    fn reduced_cost(&self) -> &[f64];
    fn row_price(&self) -> &[f64];
    fn set_col_solution(&mut self, values: &[f64]) -> Result<(), BackendError>;
    fn set_row_price(&mut self, prices: &[f64]) -> Result<(), BackendError>;

    fn warm_start(&self) -> WarmStartBasis;
    fn empty_warm_start(&self) -> WarmStartBasis {
        WarmStartBasis::default()
    }
    fn set_warm_start(&mut self, basis: &WarmStartBasis) -> Result<(), BackendError>;

    fn dual_objective_limit(&self) -> f64;
    fn set_dual_objective_limit(&mut self, limit: f64);
}
