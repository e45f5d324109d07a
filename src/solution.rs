//! The result of a successful solve.
use std::time::Duration;

use crate::constraint::ConstraintReference;
use crate::expression::Expression;
use crate::variable::Variable;

/// Whether the backend ran to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// Optimal within the configured tolerances
    Optimal,
    /// Integer feasible, found before a limit stopped the search
    Feasible,
    /// The last iterate of a continuous solve stopped by a limit.
    /// It may violate the constraints by more than the tolerances.
    Interrupted,
    /// The progress callback asked the backend to stop.
    /// Levels, when present, are the best solution found so far.
    Cancelled,
}

/// Termination codes reported by a solve, successful or not
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStatus {
    Optimal,
    Infeasible,
    Unbounded,
    TimeLimit,
    NumericalError,
    Cancelled,
}

/// Diagnostics reported by the backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveInfo {
    /// Name of the backend that produced the solution
    pub backend: &'static str,
    /// Interior point or simplex iterations, summed over all relaxations
    pub iterations: u64,
    /// Branch and bound nodes explored (0 for continuous problems)
    pub nodes: u64,
    /// Wall clock time spent in the backend
    pub solve_time: Duration,
    /// Best bound on the objective, in the direction of the objective
    pub best_bound: Option<f64>,
    /// `|objective - best_bound|`
    pub absolute_gap: Option<f64>,
    /// `absolute_gap / |objective|`
    pub relative_gap: Option<f64>,
}

/// Primal levels, optional dual values and diagnostics of a solved model.
///
/// A solution belongs to the mutation epoch of the model it was computed
/// for. Mutating the model discards it.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub(crate) status: SolutionStatus,
    pub(crate) objective: Option<f64>,
    pub(crate) primal: Option<Vec<f64>>,
    pub(crate) duals: Option<Vec<Vec<f64>>>,
    pub(crate) info: SolveInfo,
    pub(crate) epoch: u64,
}

impl Solution {
    pub fn status(&self) -> SolutionStatus {
        self.status
    }

    pub fn termination_status(&self) -> TerminationStatus {
        match self.status {
            SolutionStatus::Optimal => TerminationStatus::Optimal,
            SolutionStatus::Feasible | SolutionStatus::Interrupted => TerminationStatus::TimeLimit,
            SolutionStatus::Cancelled => TerminationStatus::Cancelled,
        }
    }

    /// The objective value of the primal levels
    pub fn objective_value(&self) -> Option<f64> {
        self.objective
    }

    /// True when primal levels are available
    pub fn has_primal(&self) -> bool {
        self.primal.is_some()
    }

    /// The values of all the scalar columns of the model
    pub fn primal(&self) -> Option<&[f64]> {
        self.primal.as_deref()
    }

    /// The levels of a variable, one per element in row-major order
    pub fn levels(&self, variable: &Variable) -> Option<Vec<f64>> {
        let primal = self.primal.as_ref()?;
        variable.columns().map(|c| primal.get(c).copied()).collect()
    }

    /// The level of a scalar variable (or of the only element of a variable)
    pub fn value(&self, variable: &Variable) -> Option<f64> {
        match self.levels(variable)?.as_slice() {
            [v] => Some(*v),
            _ => None,
        }
    }

    /// Evaluates an expression with the primal levels
    pub fn eval(&self, expression: &Expression) -> Option<Vec<f64>> {
        self.primal.as_ref().map(|p| expression.eval_with(p))
    }

    /// Dual values of a constraint, one per element of its expression.
    /// Only available when duals were requested and the model has no integer variables.
    pub fn dual(&self, constraint: ConstraintReference) -> Option<&[f64]> {
        self.duals
            .as_ref()?
            .get(constraint.index)
            .map(|d| d.as_slice())
    }

    pub fn info(&self) -> &SolveInfo {
        &self.info
    }

    /// The mutation epoch of the model this solution was computed for
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}
