//! Errors raised while building or solving a model.

use thiserror::Error;

use crate::solution::{Solution, TerminationStatus};

/// An error detected while building a model.
///
/// Build errors never modify the model: after catching one the model can
/// still be used.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    /// Operand shapes are incompatible, or an expression does not have a
    /// shape accepted by a domain.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    /// Bounds are inconsistent (lower bound above upper bound, NaN), or a
    /// domain is used where it is not allowed.
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),
    /// A variable or constraint with the same name already exists.
    #[error("Duplicate name: {0:?} is already used in this model")]
    DuplicateName(String),
}

impl BuildError {
    pub(crate) fn shape_mismatch(
        operation: &str,
        expected: impl std::fmt::Display,
        got: impl std::fmt::Display,
    ) -> Self {
        BuildError::ShapeMismatch(format!("{}: expected {}, got {}", operation, expected, got))
    }
}

/// Represents an error that occurred when solving a problem
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolutionError {
    /// The problem is [unbounded](https://www.matem.unam.mx/~omar/math340/unbounded.html).
    /// The objective can be made infinitely good without violating any constraints.
    #[error("Unbounded")]
    Unbounded,
    /// There exists no solution that satisfies all of the constraints
    #[error("Infeasible")]
    Infeasible,
    /// A time, iteration or node limit was reached before optimality could be proven.
    /// The best solution found so far is attached when there is one.
    #[error("Time limit exceeded")]
    TimeLimitExceeded {
        /// Best known solution at the time the limit was hit
        best: Option<Box<Solution>>,
    },
    /// The backend broke down numerically
    #[error("Numerical failure: {0}")]
    NumericalFailure(String),
    /// The model breaks a rule that can only be checked when it is submitted
    #[error("Invalid model: {0}")]
    InvalidModel(String),
}

impl ResolutionError {
    /// The termination status corresponding to this error
    pub fn status(&self) -> TerminationStatus {
        match self {
            ResolutionError::Unbounded => TerminationStatus::Unbounded,
            ResolutionError::Infeasible => TerminationStatus::Infeasible,
            ResolutionError::TimeLimitExceeded { .. } => TerminationStatus::TimeLimit,
            ResolutionError::NumericalFailure(_) | ResolutionError::InvalidModel(_) => {
                TerminationStatus::NumericalError
            }
        }
    }

    /// The best known solution, if the backend stopped on a limit after finding one
    pub fn best_solution(&self) -> Option<&Solution> {
        match self {
            ResolutionError::TimeLimitExceeded { best } => best.as_deref(),
            _ => None,
        }
    }
}

/// An error that can occur when setting a gap tolerance
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MipGapError {
    /// The gap is negative
    #[error("The MIP gap must not be negative")]
    Negative,
    /// The gap is infinite
    #[error("The MIP gap must be finite")]
    Infinite,
}
