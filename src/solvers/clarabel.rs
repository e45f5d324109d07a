//! A solver that uses [clarabel](https://oxfordcontrol.github.io/ClarabelDocs/stable/), a pure rust
//! interior point solver for quadratic objectives over linear, second order and
//! (with the `sdp` feature) semidefinite cones.

use log::{debug, warn};

use clarabel::algebra::CscMatrix;
use clarabel::solver::implementations::default::DefaultSettingsBuilder;
use clarabel::solver::SupportedConeT::{self, *};
use clarabel::solver::{DefaultInfo, DefaultSolver, IPSolver, SolverStatus};

use crate::error::ResolutionError;
use crate::parameters::{
    ParameterValue, Parameters, FEASIBILITY_TOLERANCE, MAX_ITERATIONS, VERBOSE,
};
use crate::solvers::{Backend, Cone, Control, FlatProblem, Relaxation, RelaxationContext};

const FLOAT_SETTINGS: [&str; 7] = [
    "tol_gap_abs",
    "tol_gap_rel",
    "tol_feas",
    "tol_infeas_abs",
    "tol_infeas_rel",
    "tol_ktratio",
    "max_step_fraction",
];

const BOOL_SETTINGS: [&str; 3] = [
    "equilibrate_enable",
    "presolve_enable",
    "static_regularization_enable",
];

/// The [clarabel](https://oxfordcontrol.github.io/ClarabelDocs/stable/) backend.
///
/// Parameters named after Clarabel settings (`tol_gap_rel`, `max_iter`,
/// `direct_solve_method`, ...) are applied to every relaxation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clarabel;

impl Backend for Clarabel {
    fn name(&self) -> &'static str {
        "Clarabel"
    }

    fn check(&self, problem: &FlatProblem) -> Result<(), ResolutionError> {
        let semidefinite = problem
            .cones()
            .iter()
            .any(|c| matches!(c, Cone::PsdTriangle(_)));
        if cfg!(not(feature = "sdp")) && semidefinite {
            return Err(ResolutionError::InvalidModel(
                "semidefinite cones need the sdp feature".to_string(),
            ));
        }
        Ok(())
    }

    fn accepts_parameter(&self, key: &str) -> bool {
        FLOAT_SETTINGS.contains(&key)
            || BOOL_SETTINGS.contains(&key)
            || key == "max_iter"
            || key == "direct_solve_method"
    }

    fn solve_relaxation(
        &self,
        problem: &FlatProblem,
        lower: &[f64],
        upper: &[f64],
        context: &RelaxationContext,
    ) -> Relaxation {
        let mut settings = match settings(context) {
            Some(settings) => settings,
            None => return Relaxation::LimitReached(None),
        };
        let settings = match settings.build() {
            Ok(settings) => settings,
            Err(e) => return Relaxation::Failed(format!("invalid clarabel settings: {}", e)),
        };
        let n = problem.num_columns();
        let mut constraints = CscMatrixBuilder::new(n);
        let mut constraint_values = Vec::with_capacity(problem.rows().len());
        // A x + s = b with s = G x + h
        for row in problem.rows() {
            constraints.add_row(row.terms.iter().map(|&(c, v)| (c, -v)));
            constraint_values.push(row.constant);
        }
        let mut cones: Vec<SupportedConeT<f64>> = Vec::with_capacity(problem.cones().len() + 2);
        for cone in problem.cones() {
            cones.push(match *cone {
                Cone::Zero(d) => ZeroConeT(d),
                Cone::NonNegative(d) => NonnegativeConeT(d),
                Cone::SecondOrder(d) => SecondOrderConeT(d),
                #[cfg(feature = "sdp")]
                Cone::PsdTriangle(n) => PSDTriangleConeT(n),
                #[cfg(not(feature = "sdp"))]
                Cone::PsdTriangle(_) => {
                    return Relaxation::Failed("semidefinite cones need the sdp feature".into())
                }
            });
        }
        add_bound_rows(
            lower,
            upper,
            &mut constraints,
            &mut constraint_values,
            &mut cones,
        );
        let quadratic_objective = upper_triangle(n, problem.quadratic_objective());
        let constraints = constraints.build();
        let mut solver = match DefaultSolver::new(
            &quadratic_objective,
            problem.objective_vector(),
            &constraints,
            &constraint_values,
            &cones,
            settings,
        ) {
            Ok(solver) => solver,
            Err(e) => return Relaxation::Failed(format!("invalid clarabel problem: {}", e)),
        };
        if context.monitor.is_observed() {
            let monitor = context.monitor.clone();
            let base = context.progress.clone();
            solver.set_termination_callback(move |info: &DefaultInfo<f64>| {
                let mut progress = base.clone();
                progress.iterations += u64::from(info.iterations);
                progress.elapsed = monitor.elapsed();
                monitor.poll(&progress) == Control::Abort
            });
        }
        solver.solve();
        let solution = &solver.solution;
        debug!(
            "clarabel: {:?} after {} iterations",
            solution.status, solution.iterations
        );
        match solution.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => {
                let primal = solution.x.clone();
                Relaxation::Optimal {
                    objective: problem.min_objective(&primal),
                    duals: context
                        .duals
                        .then(|| solution.z[..problem.rows().len()].to_vec()),
                    primal,
                    iterations: u64::from(solution.iterations),
                }
            }
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                Relaxation::Infeasible
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                Relaxation::Unbounded
            }
            SolverStatus::MaxIterations | SolverStatus::MaxTime => {
                let last = &solution.x;
                let usable = !last.is_empty() && last.iter().all(|v| v.is_finite());
                Relaxation::LimitReached(usable.then(|| last.clone()))
            }
            SolverStatus::CallbackTerminated => Relaxation::Cancelled,
            e @ (SolverStatus::NumericalError
            | SolverStatus::InsufficientProgress
            | SolverStatus::Unsolved) => Relaxation::Failed(format!("clarabel: {:?}", e)),
        }
    }
}

/// Translate the parameters to clarabel settings.
/// Returns None when there is no time left.
fn settings(context: &RelaxationContext) -> Option<DefaultSettingsBuilder<f64>> {
    let mut settings = DefaultSettingsBuilder::default();
    settings.verbose(false).tol_feas(1e-9);
    if let Some(remaining) = context.time_limit {
        if remaining.is_zero() {
            return None;
        }
        settings.time_limit(remaining.as_secs_f64());
    }
    apply_parameters(&mut settings, context.parameters);
    Some(settings)
}

fn apply_parameters(settings: &mut DefaultSettingsBuilder<f64>, parameters: &Parameters) {
    for (key, value) in parameters.iter() {
        match (key, value) {
            (VERBOSE, v) => {
                settings.verbose(v.as_bool().unwrap_or(false));
            }
            (FEASIBILITY_TOLERANCE, v) | ("tol_feas", v) => match v.as_float() {
                Some(v) => {
                    settings.tol_feas(v);
                }
                None => invalid(key, value),
            },
            (MAX_ITERATIONS, v) | ("max_iter", v) => {
                match v.as_int().and_then(|v| u32::try_from(v).ok()) {
                    Some(v) => {
                        settings.max_iter(v);
                    }
                    None => invalid(key, value),
                }
            }
            ("direct_solve_method", ParameterValue::String(method)) => {
                settings.direct_solve_method(method.clone());
            }
            (key, v) if FLOAT_SETTINGS.contains(&key) => {
                let v = match v.as_float() {
                    Some(v) => v,
                    None => {
                        invalid(key, value);
                        continue;
                    }
                };
                match key {
                    "tol_gap_abs" => settings.tol_gap_abs(v),
                    "tol_gap_rel" => settings.tol_gap_rel(v),
                    "tol_infeas_abs" => settings.tol_infeas_abs(v),
                    "tol_infeas_rel" => settings.tol_infeas_rel(v),
                    "tol_ktratio" => settings.tol_ktratio(v),
                    _ => settings.max_step_fraction(v),
                };
            }
            (key, v) if BOOL_SETTINGS.contains(&key) => {
                let v = match v.as_bool() {
                    Some(v) => v,
                    None => {
                        invalid(key, value);
                        continue;
                    }
                };
                match key {
                    "equilibrate_enable" => settings.equilibrate_enable(v),
                    "presolve_enable" => settings.presolve_enable(v),
                    _ => settings.static_regularization_enable(v),
                };
            }
            // handled by the solve driver, or unknown (reported once per solve)
            _ => {}
        }
    }
}

fn invalid(key: &str, value: &ParameterValue) {
    warn!("ignoring clarabel parameter {} = {:?}: wrong type", key, value);
}

/// Column bounds are rows `x - l = 0` for fixed columns,
/// and `x - l >= 0`, `u - x >= 0` for the others
fn add_bound_rows(
    lower: &[f64],
    upper: &[f64],
    constraints: &mut CscMatrixBuilder,
    constraint_values: &mut Vec<f64>,
    cones: &mut Vec<SupportedConeT<f64>>,
) {
    let mut fixed = 0;
    for (c, (&l, &u)) in lower.iter().zip(upper).enumerate() {
        if l == u {
            constraints.add_row([(c, -1.)]);
            constraint_values.push(-l);
            fixed += 1;
        }
    }
    let mut bounded = 0;
    for (c, (&l, &u)) in lower.iter().zip(upper).enumerate() {
        if l == u {
            continue;
        }
        if l.is_finite() {
            constraints.add_row([(c, -1.)]);
            constraint_values.push(-l);
            bounded += 1;
        }
        if u.is_finite() {
            constraints.add_row([(c, 1.)]);
            constraint_values.push(u);
            bounded += 1;
        }
    }
    if fixed > 0 {
        cones.push(ZeroConeT(fixed));
    }
    if bounded > 0 {
        cones.push(NonnegativeConeT(bounded));
    }
}

/// The upper triangular CSC matrix of the quadratic objective.
/// `entries` are sorted by row, with `row <= column`.
fn upper_triangle(n: usize, entries: &[(usize, usize, f64)]) -> CscMatrix<f64> {
    let mut builder = CscMatrixBuilder::new(n);
    for &(row, col, value) in entries {
        builder.rowval[col].push(row);
        builder.nzval[col].push(value);
    }
    builder.n_rows = n;
    builder.build()
}

struct CscMatrixBuilder {
    /// Indicates the row index of the corresponding element in `nzval`
    rowval: Vec<Vec<usize>>,
    /// All non-zero values in the matrix, in column-major order
    nzval: Vec<Vec<f64>>,
    n_rows: usize,
    n_cols: usize,
}

impl CscMatrixBuilder {
    fn new(n_cols: usize) -> Self {
        Self {
            rowval: vec![Vec::new(); n_cols],
            nzval: vec![Vec::new(); n_cols],
            n_rows: 0,
            n_cols,
        }
    }

    fn add_row<I: IntoIterator<Item = (usize, f64)>>(&mut self, row: I) {
        for (col, value) in row {
            self.rowval[col].push(self.n_rows);
            self.nzval[col].push(value);
        }
        self.n_rows += 1;
    }

    fn build(self) -> CscMatrix<f64> {
        let mut colptr = Vec::with_capacity(self.n_cols + 1);
        let mut nnz = 0;
        colptr.push(nnz);
        for col in &self.rowval {
            nnz += col.len();
            colptr.push(nnz);
        }
        CscMatrix::new(
            self.n_rows,
            self.n_cols,
            colptr,
            fast_flatten_vecs(self.rowval),
            fast_flatten_vecs(self.nzval),
        )
    }
}

fn fast_flatten_vecs<T: Copy>(vecs: Vec<Vec<T>>) -> Vec<T> {
    // Reuses the allocation of the first Vec
    let size: usize = vecs.iter().map(|v| v.len()).sum();
    let mut iter = vecs.into_iter();
    let mut result = if let Some(v) = iter.next() {
        v
    } else {
        return Vec::new();
    };
    result.reserve_exact(size - result.len());
    for v in iter {
        result.extend_from_slice(&v);
    }
    result
}
