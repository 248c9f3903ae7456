use lpweave_solver::BackendError;
use thiserror::Error;

/// Every failure the modelling layer reports. All of them are raised at the point of
/// violation and none is retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid term operation: {0}")]
    InvalidTermOperation(String),

    #[error("Registration conflict: {0}")]
    RegistrationConflict(String),

    #[error("Unsupported structural edit: {0}")]
    UnsupportedStructuralEdit(String),

    #[error("Solver precondition violated: {0}")]
    SolverPreconditionViolation(String),

    #[error("Backend rejected {operation}: {source}")]
    BackendRejection {
        operation: &'static str,
        #[source]
        source: BackendError,
    },
}

impl Error {
    /// Returns a semantic error code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidTermOperation(_) => "TERM_INVALID",
            Error::RegistrationConflict(_) => "ENTITY_REGISTRATION",
            Error::UnsupportedStructuralEdit(_) => "STRUCTURE_UNSUPPORTED",
            Error::SolverPreconditionViolation(_) => "SOLVER_PRECONDITION",
            Error::BackendRejection { .. } => "BACKEND_REJECTED",
        }
    }

    pub(crate) fn backend(operation: &'static str) -> impl FnOnce(BackendError) -> Error {
        move |source| Error::BackendRejection { operation, source }
    }

    pub(crate) fn term(message: impl Into<String>) -> Self {
        Error::InvalidTermOperation(message.into())
    }

    pub(crate) fn registration(message: impl Into<String>) -> Self {
        Error::RegistrationConflict(message.into())
    }

    pub(crate) fn structural(message: impl Into<String>) -> Self {
        Error::UnsupportedStructuralEdit(message.into())
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Error::SolverPreconditionViolation(message.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(Error::term("x").code(), "TERM_INVALID");
        assert_eq!(Error::registration("x").code(), "ENTITY_REGISTRATION");
        assert_eq!(Error::structural("x").code(), "STRUCTURE_UNSUPPORTED");
        assert_eq!(Error::precondition("x").code(), "SOLVER_PRECONDITION");
    }

    #[test]
    fn test_backend_rejection_keeps_cause() {
        let err = Error::backend("add_row")(BackendError::MissingCoefficient { row: 1, col: 2 });
        assert_eq!(err.code(), "BACKEND_REJECTED");
        assert_eq!(
            err.to_string(),
            "Backend rejected add_row: No coefficient stored at row 1, column 2"
        );
        assert!(err.source().is_some());
    }
}
