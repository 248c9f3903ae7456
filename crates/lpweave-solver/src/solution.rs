/// Outcome of the last solve.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolutionStatus {
    /// Nothing has been solved since the last load
    #[default]
    NotSolved,
    /// An optimal solution was found
    Optimal,
    /// No point satisfies all constraints and bounds
    PrimalInfeasible,
    /// The objective is unbounded in the optimisation direction
    DualInfeasible,
    /// The simplex iteration limit was hit
    IterationLimit,
    /// Branch and bound stopped at its node limit
    NodeLimit,
    /// The solve gave up for numerical reasons
    Abandoned,
}

impl SolutionStatus {
    pub fn is_proven_optimal(self) -> bool {
        self == SolutionStatus::Optimal
    }

    pub fn is_proven_primal_infeasible(self) -> bool {
        self == SolutionStatus::PrimalInfeasible
    }

    pub fn is_proven_dual_infeasible(self) -> bool {
        self == SolutionStatus::DualInfeasible
    }

    pub fn is_iteration_limit_reached(self) -> bool {
        matches!(self, SolutionStatus::IterationLimit | SolutionStatus::NodeLimit)
    }

    pub fn is_abandoned(self) -> bool {
        self == SolutionStatus::Abandoned
    }
}

/// Primal and dual values produced by a solve.
#[derive(Debug, Clone, Default)]
pub struct Solution {
    pub status: SolutionStatus,
    pub col_solution: Vec<f64>,
    pub row_activity: Vec<f64>,
    pub reduced_cost: Vec<f64>,
    pub row_price: Vec<f64>,
    pub objective_value: f64,
    pub iterations: usize,
    /// Basis the solve finished in, when it reached one
    pub basis: Option<WarmStartBasis>,
}

impl Solution {
    pub(crate) fn unsolved(n_cols: usize, n_rows: usize, status: SolutionStatus) -> Self {
        Self {
            status,
            col_solution: vec![0.0; n_cols],
            row_activity: vec![0.0; n_rows],
            reduced_cost: vec![0.0; n_cols],
            row_price: vec![0.0; n_rows],
            objective_value: 0.0,
            iterations: 0,
            basis: None,
        }
    }
}

/// Status of a column or row inside a simplex basis.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasisStatus {
    Basic,
    /// Basic through the negative part of a free column
    BasicNegative,
    AtLower,
    AtUpper,
}

/// Opaque warm-start token: one status per column and per row.
///
/// Tokens stay usable when the problem grows or shrinks; missing columns count as
/// nonbasic at their lower bound and missing rows as basic.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmStartBasis {
    pub columns: Vec<BasisStatus>,
    pub rows: Vec<BasisStatus>,
}

impl WarmStartBasis {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }

    pub fn column(&self, col: usize) -> BasisStatus {
        self.columns.get(col).copied().unwrap_or(BasisStatus::AtLower)
    }

    pub fn row(&self, row: usize) -> BasisStatus {
        self.rows.get(row).copied().unwrap_or(BasisStatus::Basic)
    }
}
