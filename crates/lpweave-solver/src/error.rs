use thiserror::Error;

/// Failure reported by a solver backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Invalid problem data: {0}")]
    InvalidProblem(String),

    #[error("{kind} index {index} out of range (size {len})")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },

    #[error("No coefficient stored at row {row}, column {col}")]
    MissingCoefficient { row: usize, col: usize },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Numerical failure: {0}")]
    Numerical(String),
}

impl BackendError {
    pub(crate) fn column(index: usize, len: usize) -> Self {
        BackendError::IndexOutOfRange { kind: "Column", index, len }
    }

    pub(crate) fn row(index: usize, len: usize) -> Self {
        BackendError::IndexOutOfRange { kind: "Row", index, len }
    }
}
