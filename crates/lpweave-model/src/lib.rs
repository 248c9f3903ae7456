//! Symbolic LP/QP modelling compiled into numeric solver backends.
//!
//! Build [`Variable`]s and [`Expression`]s, collect [`Constraint`]s and an [`Objective`]
//! in a [`Model`], then hand the model to a [`Solver`] wrapping any
//! [`lpweave_solver::Backend`]. The solver compiles the model once and keeps the
//! backend in step with later edits.

mod config;
mod constraint;
mod engine;
mod entity;
mod error;
mod exchange;
mod expr;
mod ids;
mod model;
mod objective;
mod variable;
mod warm_start;

pub use config::{NameDiscipline, SolverConfig};
pub use constraint::{Constraint, ConstraintType};
pub use engine::{SolveStatus, Solver, Statistics};
pub use error::{Error, Result};
pub use exchange::{ConstraintSpec, ModelSpec, ObjectiveSpec, TermSpec, VariableSpec};
pub use expr::{Expression, LinearTerm, QuadraticTerm};
pub use ids::{ConstraintId, EngineId, IdAllocator, ModelId, ObjectiveId, VariableId};
pub use lpweave_solver::{ObjectiveSense, SolutionStatus};
pub use model::Model;
pub use objective::Objective;
pub use variable::{Variable, VariableKind};
pub use warm_start::WarmStart;
