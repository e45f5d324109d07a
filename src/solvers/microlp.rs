//! A solver that uses [microlp](https://docs.rs/microlp), a pure rust simplex solver.
//! It only handles linear objectives and linear constraints.

use log::debug;
use microlp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem};

use crate::error::ResolutionError;
use crate::solvers::{Backend, Cone, FlatProblem, Relaxation, RelaxationContext};

/// The [microlp](https://docs.rs/microlp) backend.
/// It does not compute dual values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MicroLp;

impl Backend for MicroLp {
    fn name(&self) -> &'static str {
        "Microlp"
    }

    fn check(&self, problem: &FlatProblem) -> Result<(), ResolutionError> {
        if !problem.quadratic_objective().is_empty() {
            return Err(ResolutionError::InvalidModel(
                "microlp does not support quadratic objectives".to_string(),
            ));
        }
        if let Some(cone) = problem.cones().iter().find(|c| c.is_conic()) {
            return Err(ResolutionError::InvalidModel(format!(
                "microlp does not support {:?} cones",
                cone
            )));
        }
        Ok(())
    }

    fn solve_relaxation(
        &self,
        problem: &FlatProblem,
        lower: &[f64],
        upper: &[f64],
        context: &RelaxationContext,
    ) -> Relaxation {
        if matches!(context.time_limit, Some(t) if t.is_zero()) {
            return Relaxation::LimitReached(None);
        }
        if context.duals {
            debug!("microlp does not compute dual values");
        }
        let mut lp = Problem::new(OptimizationDirection::Minimize);
        let variables: Vec<microlp::Variable> = problem
            .objective_vector()
            .iter()
            .zip(lower.iter().zip(upper))
            .map(|(&coefficient, (&min, &max))| lp.add_var(coefficient, (min, max)))
            .collect();
        let mut rows = problem.rows().iter();
        for cone in problem.cones() {
            // G x + h = 0 or G x + h >= 0
            let op = match cone {
                Cone::Zero(_) => ComparisonOp::Eq,
                Cone::NonNegative(_) => ComparisonOp::Ge,
                other => return Relaxation::Failed(format!("unsupported cone {:?}", other)),
            };
            for row in rows.by_ref().take(cone.rows()) {
                let mut expr = LinearExpr::empty();
                for &(c, v) in &row.terms {
                    expr.add(variables[c], v);
                }
                lp.add_constraint(expr, op, -row.constant);
            }
        }
        match lp.solve() {
            Ok(solution) => {
                let primal: Vec<f64> = variables.iter().map(|&v| solution[v]).collect();
                Relaxation::Optimal {
                    objective: problem.min_objective(&primal),
                    primal,
                    duals: None,
                    iterations: 0,
                }
            }
            Err(microlp::Error::Infeasible) => Relaxation::Infeasible,
            Err(microlp::Error::Unbounded) => Relaxation::Unbounded,
            Err(microlp::Error::InternalError(s)) => Relaxation::Failed(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use float_eq::assert_float_eq;

    use crate::{in_quadratic_cone, variable, Expression, Model, ResolutionError};

    use super::MicroLp;

    #[test]
    fn can_solve_easy() {
        let mut model = Model::new("easy");
        let x = model.add(variable().clamp(0, 2)).unwrap();
        let y = model.add(variable().clamp(1, 3)).unwrap();
        let both = Expression::vstack(&[x.expr(), y.expr()]).unwrap();
        model
            .constraint("c", both.dot(&[2., 1.]).unwrap(), crate::less_than(4.))
            .unwrap();
        model.maximise(both.sum()).unwrap();
        let solution = model.solve_using(&MicroLp).unwrap();
        assert_float_eq!(solution.value(&x).unwrap(), 0.5, abs <= 1e-8);
        assert_float_eq!(solution.value(&y).unwrap(), 3., abs <= 1e-8);
        assert_eq!(solution.info().backend, "Microlp");
    }

    #[test]
    fn cones_are_rejected() {
        let mut model = Model::new("cone");
        let x = model.add(variable().shape(3)).unwrap();
        model
            .add_constraint(x.expr().in_domain(in_quadratic_cone()))
            .unwrap();
        model.minimise(x.get(0).unwrap()).unwrap();
        assert!(matches!(
            model.solve_using(&MicroLp),
            Err(ResolutionError::InvalidModel(_))
        ));
    }

    #[test]
    fn quadratic_objectives_are_rejected() {
        let mut model = Model::new("quadratic");
        let x = model.add(variable()).unwrap();
        model.minimise(x.expr().sum_squares()).unwrap();
        assert!(matches!(
            model.solve_using(&MicroLp),
            Err(ResolutionError::InvalidModel(_))
        ));
    }
}
