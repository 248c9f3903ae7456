//! Mapping between a bounded LP and the non-negative standard form the tableau solves.
//!
//! Columns with a finite lower bound are shifted (`x = l + x'`), columns with only an
//! upper bound are mirrored (`x = u - x'`) and free columns are split (`x = x+ - x-`).
//! A finite upper bound on a shifted column becomes an extra `x' <= u - l` row. Ranged
//! rows become two rows and free rows are dropped.

use crate::problem::ObjectiveSense;
use crate::solution::{BasisStatus, WarmStartBasis};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowOp {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

/// Which bound of which original row (or column) a standard row enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowOrigin {
    Upper(usize),
    Lower(usize),
    Equal(usize),
    ColumnUpper(usize),
}

#[derive(Debug, Clone)]
pub(crate) struct StandardRow {
    pub coefficients: Vec<f64>,
    pub op: RowOp,
    pub rhs: f64,
    pub origin: RowOrigin,
    /// -1 when the row was negated to make its right-hand side non-negative
    pub sign: f64,
}

#[derive(Debug, Clone, Copy)]
enum ColumnMap {
    Shifted { var: usize, lower: f64, bound_row: Option<usize> },
    Mirrored { var: usize, upper: f64 },
    Split { pos: usize, neg: usize },
}

/// Borrowed view of a column-stored LP.
pub(crate) struct LpRef<'a> {
    pub columns: &'a [Vec<(usize, f64)>],
    pub col_lower: &'a [f64],
    pub col_upper: &'a [f64],
    pub objective: &'a [f64],
    pub row_lower: &'a [f64],
    pub row_upper: &'a [f64],
    pub sense: ObjectiveSense,
}

/// Returned when a column has `lower > upper`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CrossedBounds;

#[derive(Debug, Clone)]
pub(crate) struct StandardForm {
    pub n_vars: usize,
    pub rows: Vec<StandardRow>,
    pub objective: Vec<f64>,
    pub minimize: bool,
    pub slack_cols: Vec<Option<usize>>,
    pub art_cols: Vec<Option<usize>>,
    pub n_slack: usize,
    pub n_artificial: usize,
    columns: Vec<ColumnMap>,
}

impl StandardForm {
    pub fn build(lp: &LpRef<'_>, tolerance: f64) -> Result<Self, CrossedBounds> {
        let n_rows = lp.row_lower.len();
        let mut n_vars = 0;
        let mut columns = Vec::with_capacity(lp.columns.len());
        for (&lower, &upper) in lp.col_lower.iter().zip(lp.col_upper) {
            if lower > upper + tolerance {
                return Err(CrossedBounds);
            }
            let map = if lower.is_finite() {
                ColumnMap::Shifted { var: next(&mut n_vars), lower, bound_row: None }
            } else if upper.is_finite() {
                ColumnMap::Mirrored { var: next(&mut n_vars), upper }
            } else {
                ColumnMap::Split { pos: next(&mut n_vars), neg: next(&mut n_vars) }
            };
            columns.push(map);
        }

        let mut objective = vec![0.0; n_vars];
        let mut dense = vec![vec![0.0; n_vars]; n_rows];
        let mut shift = vec![0.0; n_rows];
        for (j, map) in columns.iter().enumerate() {
            let c = lp.objective[j];
            match *map {
                ColumnMap::Shifted { var, lower, .. } => {
                    objective[var] = c;
                    for &(r, a) in &lp.columns[j] {
                        dense[r][var] += a;
                        shift[r] += a * lower;
                    }
                }
                ColumnMap::Mirrored { var, upper } => {
                    objective[var] = -c;
                    for &(r, a) in &lp.columns[j] {
                        dense[r][var] -= a;
                        shift[r] += a * upper;
                    }
                }
                ColumnMap::Split { pos, neg } => {
                    objective[pos] = c;
                    objective[neg] = -c;
                    for &(r, a) in &lp.columns[j] {
                        dense[r][pos] += a;
                        dense[r][neg] -= a;
                    }
                }
            }
        }

        let mut rows = Vec::new();
        for (r, coefficients) in dense.into_iter().enumerate() {
            let lower = lp.row_lower[r] - shift[r];
            let upper = lp.row_upper[r] - shift[r];
            match (lower.is_finite(), upper.is_finite()) {
                (false, false) => {}
                (true, true) if lower == upper => {
                    rows.push(StandardRow::new(coefficients, RowOp::Eq, upper, RowOrigin::Equal(r)));
                }
                (true, true) => {
                    rows.push(StandardRow::new(coefficients.clone(), RowOp::Le, upper, RowOrigin::Upper(r)));
                    rows.push(StandardRow::new(coefficients, RowOp::Ge, lower, RowOrigin::Lower(r)));
                }
                (false, true) => {
                    rows.push(StandardRow::new(coefficients, RowOp::Le, upper, RowOrigin::Upper(r)));
                }
                (true, false) => {
                    rows.push(StandardRow::new(coefficients, RowOp::Ge, lower, RowOrigin::Lower(r)));
                }
            }
        }

        for (j, map) in columns.iter_mut().enumerate() {
            if let ColumnMap::Shifted { var, lower, bound_row } = map {
                let upper = lp.col_upper[j];
                if upper.is_finite() {
                    let mut coefficients = vec![0.0; n_vars];
                    coefficients[*var] = 1.0;
                    *bound_row = Some(rows.len());
                    rows.push(StandardRow::new(
                        coefficients,
                        RowOp::Le,
                        (upper - *lower).max(0.0),
                        RowOrigin::ColumnUpper(j),
                    ));
                }
            }
        }

        let mut slack_cols = Vec::with_capacity(rows.len());
        let mut n_slack = 0;
        for row in &rows {
            slack_cols.push(match row.op {
                RowOp::Le | RowOp::Ge => Some(n_vars + next(&mut n_slack)),
                RowOp::Eq => None,
            });
        }
        let mut art_cols = Vec::with_capacity(rows.len());
        let mut n_artificial = 0;
        for row in &rows {
            art_cols.push(match row.op {
                RowOp::Ge | RowOp::Eq => Some(n_vars + n_slack + next(&mut n_artificial)),
                RowOp::Le => None,
            });
        }

        Ok(Self {
            n_vars,
            rows,
            objective,
            minimize: lp.sense == ObjectiveSense::Minimize,
            slack_cols,
            art_cols,
            n_slack,
            n_artificial,
            columns,
        })
    }

    /// Column the initial basis holds for a row: the slack of a `<=` row, else its artificial.
    pub fn identity_col(&self, row: usize) -> usize {
        match self.rows[row].op {
            RowOp::Le => self.slack_cols[row].unwrap_or(0),
            RowOp::Ge | RowOp::Eq => self.art_cols[row].unwrap_or(0),
        }
    }

    /// Original column values from standard-form values.
    pub fn recover(&self, values: &[f64]) -> Vec<f64> {
        self.columns
            .iter()
            .map(|map| match *map {
                ColumnMap::Shifted { var, lower, .. } => lower + values[var],
                ColumnMap::Mirrored { var, upper } => upper - values[var],
                ColumnMap::Split { pos, neg } => values[pos] - values[neg],
            })
            .collect()
    }

    /// Row prices of the original rows in the original objective direction.
    ///
    /// `duals` are the tableau duals, one per standard row, for the maximisation the
    /// tableau runs.
    pub fn row_prices(&self, duals: &[f64], n_rows: usize) -> Vec<f64> {
        let direction = if self.minimize { -1.0 } else { 1.0 };
        let mut prices = vec![0.0; n_rows];
        for (row, &dual) in self.rows.iter().zip(duals) {
            match row.origin {
                RowOrigin::Upper(r) | RowOrigin::Lower(r) | RowOrigin::Equal(r) => {
                    prices[r] += direction * row.sign * dual;
                }
                RowOrigin::ColumnUpper(_) => {}
            }
        }
        prices
    }

    fn row_slack_basic(&self, row: usize, basic: &[bool]) -> bool {
        self.slack_cols[row].is_some_and(|s| basic[s]) || self.art_cols[row].is_some_and(|a| basic[a])
    }

    /// Warm-start token describing a final tableau basis.
    pub fn basis_status(&self, basic: &[bool], n_rows: usize) -> WarmStartBasis {
        let columns = self
            .columns
            .iter()
            .map(|map| match *map {
                ColumnMap::Shifted { var, bound_row, .. } => {
                    if !basic[var] {
                        BasisStatus::AtLower
                    } else if bound_row.is_some_and(|br| !self.row_slack_basic(br, basic)) {
                        BasisStatus::AtUpper
                    } else {
                        BasisStatus::Basic
                    }
                }
                ColumnMap::Mirrored { var, .. } => {
                    if basic[var] {
                        BasisStatus::Basic
                    } else {
                        BasisStatus::AtUpper
                    }
                }
                ColumnMap::Split { pos, neg } => {
                    if basic[pos] {
                        BasisStatus::Basic
                    } else if basic[neg] {
                        BasisStatus::BasicNegative
                    } else {
                        BasisStatus::AtLower
                    }
                }
            })
            .collect();

        let mut rows = vec![BasisStatus::Basic; n_rows];
        for (i, row) in self.rows.iter().enumerate() {
            if self.row_slack_basic(i, basic) {
                continue;
            }
            match row.origin {
                RowOrigin::Upper(r) => rows[r] = BasisStatus::AtUpper,
                RowOrigin::Lower(r) | RowOrigin::Equal(r) => rows[r] = BasisStatus::AtLower,
                RowOrigin::ColumnUpper(_) => {}
            }
        }
        WarmStartBasis { columns, rows }
    }

    /// Tableau columns a warm-start token wants in the basis.
    pub fn crash_columns(&self, basis: &WarmStartBasis) -> Vec<usize> {
        let mut wanted = Vec::new();
        for (j, map) in self.columns.iter().enumerate() {
            let status = basis.column(j);
            match *map {
                ColumnMap::Shifted { var, bound_row, .. } => {
                    if status != BasisStatus::AtLower {
                        wanted.push(var);
                    }
                    if let Some(slack) = bound_row.and_then(|br| self.slack_cols[br]) {
                        if status != BasisStatus::AtUpper {
                            wanted.push(slack);
                        }
                    }
                }
                ColumnMap::Mirrored { var, .. } => {
                    if matches!(status, BasisStatus::Basic | BasisStatus::BasicNegative) {
                        wanted.push(var);
                    }
                }
                ColumnMap::Split { pos, neg } => match status {
                    BasisStatus::Basic => wanted.push(pos),
                    BasisStatus::BasicNegative => wanted.push(neg),
                    _ => {}
                },
            }
        }
        for (i, row) in self.rows.iter().enumerate() {
            let keep_slack = match row.origin {
                RowOrigin::Upper(r) => basis.row(r) != BasisStatus::AtUpper,
                RowOrigin::Lower(r) => basis.row(r) != BasisStatus::AtLower,
                RowOrigin::Equal(_) | RowOrigin::ColumnUpper(_) => false,
            };
            if keep_slack {
                if let Some(slack) = self.slack_cols[i] {
                    wanted.push(slack);
                }
            }
        }
        wanted
    }
}

impl StandardRow {
    fn new(mut coefficients: Vec<f64>, op: RowOp, rhs: f64, origin: RowOrigin) -> Self {
        if rhs < 0.0 {
            for c in coefficients.iter_mut() {
                *c = -*c;
            }
            let op = match op {
                RowOp::Le => RowOp::Ge,
                RowOp::Ge => RowOp::Le,
                RowOp::Eq => RowOp::Eq,
            };
            return Self { coefficients, op, rhs: -rhs, origin, sign: -1.0 };
        }
        Self { coefficients, op, rhs, origin, sign: 1.0 }
    }
}

fn next(counter: &mut usize) -> usize {
    let value = *counter;
    *counter += 1;
    value
}
