use lpweave_solver::WarmStartBasis;

/// A solver-state snapshot that can seed a later solve.
///
/// Snapshots stay applicable after the problem grows or shrinks: value vectors are
/// padded with zeros or truncated to the current sizes when applied.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WarmStart {
    basis: WarmStartBasis,
    col_solution: Vec<f64>,
    row_price: Option<Vec<f64>>,
}

impl WarmStart {
    pub fn new(basis: WarmStartBasis, col_solution: Vec<f64>, row_price: Option<Vec<f64>>) -> Self {
        Self {
            basis,
            col_solution,
            row_price,
        }
    }

    pub fn basis(&self) -> &WarmStartBasis {
        &self.basis
    }

    pub fn col_solution(&self) -> &[f64] {
        &self.col_solution
    }

    pub fn row_price(&self) -> Option<&[f64]> {
        self.row_price.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.basis.is_empty() && self.col_solution.is_empty()
    }
}

/// `values` resized to `len`, zero-padded.
pub(crate) fn fit_to(values: &[f64], len: usize) -> Vec<f64> {
    let mut fitted = values[..values.len().min(len)].to_vec();
    fitted.resize(len, 0.0);
    fitted
}
