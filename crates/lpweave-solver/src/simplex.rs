use tracing::trace;

use crate::standard::{RowOp, StandardForm};

/// Two-phase tableau simplex over a [`StandardForm`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct Simplex {
    /// Maximum iterations before giving up
    pub max_iterations: usize,
    /// Tolerance for floating point comparisons
    pub tolerance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SimplexResult {
    Optimal,
    Unbounded,
    Infeasible,
    IterationLimit,
}

/// Raw result of a tableau solve, still in standard-form coordinates.
#[derive(Debug, Clone)]
pub(crate) struct Outcome {
    pub result: SimplexResult,
    pub iterations: usize,
    /// Values of the standard-form structural variables
    pub values: Vec<f64>,
    /// One dual per standard row, for the maximisation the tableau runs
    pub duals: Vec<f64>,
    /// Basic flag per tableau column
    pub basic: Vec<bool>,
    /// Whether a supplied crash basis was accepted
    pub warm: bool,
}

#[derive(Clone)]
struct Tableau {
    data: Vec<Vec<f64>>,
    basic_vars: Vec<usize>,
    n_vars: usize,
    n_slack: usize,
    n_artificial: usize,
    identity_cols: Vec<usize>,
}

impl Tableau {
    fn obj_row(&self) -> usize {
        self.data.len() - 1
    }

    fn rhs_col(&self) -> usize {
        self.data[0].len() - 1
    }

    fn art_start(&self) -> usize {
        self.n_vars + self.n_slack
    }
}

impl Simplex {
    /// Solve the standard form, optionally crashing `crash` columns into the starting basis.
    ///
    /// A crashed basis that is primal feasible skips phase 1. One that is not is dropped
    /// and the solve starts cold.
    pub fn solve(&self, form: &StandardForm, crash: Option<&[usize]>) -> Outcome {
        let mut tableau = self.build_tableau(form);
        let mut iterations = 0;
        let mut warm = false;

        if let Some(columns) = crash.filter(|c| !c.is_empty()) {
            let mut candidate = tableau.clone();
            if self.crash(&mut candidate, columns) {
                tableau = candidate;
                warm = true;
            }
        }

        if !warm && tableau.n_artificial > 0 {
            let result = self.phase1(&mut tableau, &mut iterations);
            if result != SimplexResult::Optimal {
                return self.finish(tableau, result, iterations, warm);
            }
        }

        self.drive_out_artificials(&mut tableau);
        let result = self.phase2(&mut tableau, &mut iterations);
        self.finish(tableau, result, iterations, warm)
    }

    fn build_tableau(&self, form: &StandardForm) -> Tableau {
        let n_vars = form.n_vars;
        let n_constraints = form.rows.len();
        let total_cols = n_vars + form.n_slack + form.n_artificial + 1; // +1 for RHS
        let total_rows = n_constraints + 1; // +1 for objective

        let mut tableau = Tableau {
            data: vec![vec![0.0; total_cols]; total_rows],
            basic_vars: vec![0; n_constraints],
            n_vars,
            n_slack: form.n_slack,
            n_artificial: form.n_artificial,
            identity_cols: (0..n_constraints).map(|i| form.identity_col(i)).collect(),
        };

        for (i, row) in form.rows.iter().enumerate() {
            tableau.data[i][..n_vars].copy_from_slice(&row.coefficients);
            tableau.data[i][total_cols - 1] = row.rhs;

            match row.op {
                RowOp::Le => {
                    if let Some(slack) = form.slack_cols[i] {
                        tableau.data[i][slack] = 1.0;
                    }
                }
                RowOp::Ge => {
                    if let Some(surplus) = form.slack_cols[i] {
                        tableau.data[i][surplus] = -1.0;
                    }
                    if let Some(art) = form.art_cols[i] {
                        tableau.data[i][art] = 1.0;
                    }
                }
                RowOp::Eq => {
                    if let Some(art) = form.art_cols[i] {
                        tableau.data[i][art] = 1.0;
                    }
                }
            }
            tableau.basic_vars[i] = tableau.identity_cols[i];
        }

        // Objective row (last row). The tableau maximises, so minimisation negates.
        let obj_row = n_constraints;
        for (j, &coef) in form.objective.iter().enumerate() {
            tableau.data[obj_row][j] = if form.minimize { -coef } else { coef };
        }

        tableau
    }

    /// Pivot the wanted columns into the basis, then check the basis is primal feasible.
    fn crash(&self, tableau: &mut Tableau, columns: &[usize]) -> bool {
        let n_rows = tableau.basic_vars.len();
        let n_cols = tableau.rhs_col();
        let mut wanted = vec![false; n_cols];
        for &col in columns {
            if col < n_cols {
                wanted[col] = true;
            }
        }
        let mut locked: Vec<bool> = tableau.basic_vars.iter().map(|&b| wanted[b]).collect();

        for &col in columns {
            if col >= n_cols || tableau.basic_vars.contains(&col) {
                continue;
            }
            let mut best = None;
            let mut best_abs = self.tolerance;
            for i in 0..n_rows {
                if locked[i] {
                    continue;
                }
                let a = tableau.data[i][col].abs();
                if a > best_abs {
                    best_abs = a;
                    best = Some(i);
                }
            }
            // Dependent on the columns already crashed
            let Some(row) = best else { continue };
            self.pivot(tableau, row, col);
            locked[row] = true;
        }

        let rhs_col = tableau.rhs_col();
        let art_start = tableau.art_start();
        for i in 0..n_rows {
            let rhs = tableau.data[i][rhs_col];
            if rhs < -self.tolerance {
                return false;
            }
            if tableau.basic_vars[i] >= art_start && rhs > self.tolerance {
                return false;
            }
            if rhs < 0.0 {
                tableau.data[i][rhs_col] = 0.0;
            }
        }
        true
    }

    fn phase1(&self, tableau: &mut Tableau, iterations: &mut usize) -> SimplexResult {
        // Auxiliary objective: maximise -sum(artificials)
        let n_constraints = tableau.obj_row();
        let n_cols = tableau.data[0].len();
        let art_start = tableau.art_start();

        let orig_obj = tableau.data[n_constraints].clone();

        for j in 0..n_cols {
            tableau.data[n_constraints][j] = 0.0;
        }
        for j in art_start..(art_start + tableau.n_artificial) {
            tableau.data[n_constraints][j] = -1.0;
        }

        // Cancel the -1 of every basic artificial
        for i in 0..n_constraints {
            if tableau.basic_vars[i] >= art_start {
                for j in 0..n_cols {
                    tableau.data[n_constraints][j] += tableau.data[i][j];
                }
            }
        }

        let result = self.iterate(tableau, n_cols - 1, iterations);
        match result {
            // Unbounded in phase 1 means infeasible original
            SimplexResult::Unbounded | SimplexResult::Infeasible => return SimplexResult::Infeasible,
            SimplexResult::IterationLimit => return SimplexResult::IterationLimit,
            SimplexResult::Optimal => {}
        }

        let rhs_col = n_cols - 1;
        for i in 0..n_constraints {
            if tableau.basic_vars[i] >= art_start && tableau.data[i][rhs_col].abs() > self.tolerance {
                return SimplexResult::Infeasible;
            }
        }

        // Restore the original objective and price out the basis
        tableau.data[n_constraints] = orig_obj;
        for i in 0..n_constraints {
            let basic = tableau.basic_vars[i];
            if tableau.data[n_constraints][basic].abs() > self.tolerance {
                let ratio = tableau.data[n_constraints][basic];
                for j in 0..n_cols {
                    tableau.data[n_constraints][j] -= ratio * tableau.data[i][j];
                }
            }
        }

        SimplexResult::Optimal
    }

    fn phase2(&self, tableau: &mut Tableau, iterations: &mut usize) -> SimplexResult {
        // Artificial columns never re-enter
        let exclude_from = tableau.art_start();
        self.iterate(tableau, exclude_from, iterations)
    }

    fn iterate(&self, tableau: &mut Tableau, exclude_from: usize, iterations: &mut usize) -> SimplexResult {
        let mut degenerate_run = 0;
        loop {
            if *iterations >= self.max_iterations {
                return SimplexResult::IterationLimit;
            }
            // Switch to Bland's rule after a long degenerate run to avoid cycling
            let bland = degenerate_run > 50;
            let Some(pivot_col) = self.find_pivot_column(tableau, exclude_from, bland) else {
                return SimplexResult::Optimal;
            };
            let Some(pivot_row) = self.find_pivot_row(tableau, pivot_col, bland) else {
                return SimplexResult::Unbounded;
            };
            let rhs = tableau.data[pivot_row][tableau.rhs_col()];
            if rhs.abs() <= self.tolerance {
                degenerate_run += 1;
            } else {
                degenerate_run = 0;
            }
            self.pivot(tableau, pivot_row, pivot_col);
            *iterations += 1;
            trace!(component = "simplex", row = pivot_row, col = pivot_col, "pivot");
        }
    }

    fn find_pivot_column(&self, tableau: &Tableau, exclude_from: usize, bland: bool) -> Option<usize> {
        let obj_row = tableau.obj_row();
        let mut max_val = self.tolerance;
        let mut max_col = None;

        for j in 0..exclude_from {
            let value = tableau.data[obj_row][j];
            if value > max_val {
                if bland {
                    return Some(j);
                }
                max_val = value;
                max_col = Some(j);
            }
        }

        max_col
    }

    fn find_pivot_row(&self, tableau: &Tableau, col: usize, bland: bool) -> Option<usize> {
        let n_constraints = tableau.obj_row();
        let rhs_col = tableau.rhs_col();

        let mut min_ratio = f64::INFINITY;
        let mut min_row: Option<usize> = None;

        for i in 0..n_constraints {
            let val = tableau.data[i][col];
            if val > self.tolerance {
                let ratio = tableau.data[i][rhs_col].max(0.0) / val;
                let better = match min_row {
                    None => true,
                    Some(current) if bland && (ratio - min_ratio).abs() <= self.tolerance => {
                        tableau.basic_vars[i] < tableau.basic_vars[current]
                    }
                    Some(_) => ratio < min_ratio,
                };
                if better {
                    min_ratio = ratio;
                    min_row = Some(i);
                }
            }
        }

        min_row
    }

    fn pivot(&self, tableau: &mut Tableau, row: usize, col: usize) {
        let n_rows = tableau.data.len();
        let n_cols = tableau.data[0].len();

        tableau.basic_vars[row] = col;

        let pivot_val = tableau.data[row][col];
        for j in 0..n_cols {
            tableau.data[row][j] /= pivot_val;
        }

        for i in 0..n_rows {
            if i != row {
                let factor = tableau.data[i][col];
                if factor == 0.0 {
                    continue;
                }
                for j in 0..n_cols {
                    tableau.data[i][j] -= factor * tableau.data[row][j];
                }
            }
        }
    }

    /// Swap zero-level artificials out of the basis so phase 2 cannot make them positive.
    fn drive_out_artificials(&self, tableau: &mut Tableau) {
        let art_start = tableau.art_start();
        for i in 0..tableau.basic_vars.len() {
            if tableau.basic_vars[i] < art_start {
                continue;
            }
            let replacement = (0..art_start).find(|&j| tableau.data[i][j].abs() > self.tolerance);
            // A row without one is redundant
            if let Some(col) = replacement {
                self.pivot(tableau, i, col);
            }
        }
    }

    fn finish(&self, tableau: Tableau, result: SimplexResult, iterations: usize, warm: bool) -> Outcome {
        let rhs_col = tableau.rhs_col();
        let obj_row = tableau.obj_row();

        let mut values = vec![0.0; tableau.n_vars];
        let mut basic = vec![false; rhs_col];
        for (i, &var) in tableau.basic_vars.iter().enumerate() {
            basic[var] = true;
            if var < tableau.n_vars {
                values[var] = tableau.data[i][rhs_col];
            }
        }

        // Dual of row i is minus the reduced cost of the column that started as e_i
        let duals = tableau
            .identity_cols
            .iter()
            .map(|&col| -tableau.data[obj_row][col])
            .collect();

        Outcome { result, iterations, values, duals, basic, warm }
    }
}
