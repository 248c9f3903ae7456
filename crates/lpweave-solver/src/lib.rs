//! Solver backend capability and an in-process simplex implementation of it.

mod backend;
mod error;
mod problem;
mod simplex;
mod simplex_backend;
mod solution;
mod standard;

pub use backend::Backend;
pub use error::BackendError;
pub use problem::{CscMatrix, ObjectiveSense, ProblemData, RowSense, SparseVector};
pub use simplex_backend::SimplexBackend;
pub use solution::{BasisStatus, Solution, SolutionStatus, WarmStartBasis};
