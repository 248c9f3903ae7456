use crate::error::BackendError;

/// Column-major sparse matrix, the layout backends take in one bulk load.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CscMatrix {
    pub num_rows: usize,
    /// Start of every column in `row_indices`/`values`, plus a trailing entry equal to nnz
    pub col_starts: Vec<usize>,
    pub row_indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl CscMatrix {
    pub fn empty(num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_rows,
            col_starts: vec![0; num_cols + 1],
            row_indices: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn num_cols(&self) -> usize {
        self.col_starts.len().saturating_sub(1)
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Row indices and values of one column.
    pub fn column(&self, col: usize) -> (&[usize], &[f64]) {
        let start = self.col_starts[col];
        let end = self.col_starts[col + 1];
        (&self.row_indices[start..end], &self.values[start..end])
    }

    /// All entries as `(row, col, value)`, sorted by row then column.
    pub fn triplets(&self) -> Vec<(usize, usize, f64)> {
        let mut out = Vec::with_capacity(self.nnz());
        for col in 0..self.num_cols() {
            let (rows, values) = self.column(col);
            for (&row, &value) in rows.iter().zip(values) {
                out.push((row, col, value));
            }
        }
        out.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        out
    }

    pub fn validate(&self) -> Result<(), BackendError> {
        if self.col_starts.is_empty() {
            return Err(BackendError::InvalidProblem("column starts must hold at least one entry".into()));
        }
        if self.row_indices.len() != self.values.len() {
            return Err(BackendError::InvalidProblem(format!(
                "{} row indices but {} values",
                self.row_indices.len(),
                self.values.len()
            )));
        }
        if self.col_starts.windows(2).any(|w| w[0] > w[1]) {
            return Err(BackendError::InvalidProblem("column starts are not monotone".into()));
        }
        if self.col_starts.last().copied() != Some(self.values.len()) {
            return Err(BackendError::InvalidProblem("last column start must equal nnz".into()));
        }
        if let Some(&row) = self.row_indices.iter().find(|&&r| r >= self.num_rows) {
            return Err(BackendError::row(row, self.num_rows));
        }
        if self.values.iter().any(|v| !v.is_finite()) {
            return Err(BackendError::InvalidProblem("matrix holds a non-finite value".into()));
        }
        Ok(())
    }
}

/// Sparse row or column handed to an incremental add.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    pub indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl SparseVector {
    pub fn new(indices: Vec<usize>, values: Vec<f64>) -> Self {
        Self { indices, values }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }
}

/// Everything a bulk load hands over: matrix, bounds and the dense objective.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProblemData {
    pub matrix: CscMatrix,
    pub col_lower: Vec<f64>,
    pub col_upper: Vec<f64>,
    pub objective: Vec<f64>,
    pub row_lower: Vec<f64>,
    pub row_upper: Vec<f64>,
}

impl ProblemData {
    pub fn num_cols(&self) -> usize {
        self.matrix.num_cols()
    }

    pub fn num_rows(&self) -> usize {
        self.matrix.num_rows
    }

    pub fn validate(&self) -> Result<(), BackendError> {
        self.matrix.validate()?;
        let n = self.num_cols();
        let m = self.num_rows();
        for (what, len, expected) in [
            ("column lower bounds", self.col_lower.len(), n),
            ("column upper bounds", self.col_upper.len(), n),
            ("objective coefficients", self.objective.len(), n),
            ("row lower bounds", self.row_lower.len(), m),
            ("row upper bounds", self.row_upper.len(), m),
        ] {
            if len != expected {
                return Err(BackendError::InvalidProblem(format!(
                    "{what}: expected {expected} entries, got {len}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectiveSense {
    #[default]
    Minimize,
    Maximize,
}

impl ObjectiveSense {
    /// +1 for minimisation, -1 for maximisation.
    pub fn sign(self) -> f64 {
        match self {
            ObjectiveSense::Minimize => 1.0,
            ObjectiveSense::Maximize => -1.0,
        }
    }
}

/// Row classification in the classic `L`/`G`/`E`/`R`/`N` scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSense {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
    /// `rhs - range <= row <= rhs`
    Range,
    /// Unconstrained row
    Free,
}

impl RowSense {
    /// Row bounds implied by this sense.
    pub fn bounds(self, rhs: f64, range: f64) -> (f64, f64) {
        match self {
            RowSense::Le => (f64::NEG_INFINITY, rhs),
            RowSense::Ge => (rhs, f64::INFINITY),
            RowSense::Eq => (rhs, rhs),
            RowSense::Range => (rhs - range, rhs),
            RowSense::Free => (f64::NEG_INFINITY, f64::INFINITY),
        }
    }
}
