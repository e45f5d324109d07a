//! Depth-first branch and bound over continuous relaxations.
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::ResolutionError;
use crate::parameters::{
    ABSOLUTE_GAP_TOLERANCE, INTEGRALITY_TOLERANCE, MAX_NODES, RELATIVE_GAP_TOLERANCE,
};
use crate::solution::{Solution, SolutionStatus, SolveInfo};
use crate::solvers::{
    Backend, Control, FlatProblem, Progress, Relaxation, RelaxationContext, Session, SolveOptions,
};

/// Search limits and tolerances
#[derive(Debug, Clone, PartialEq)]
struct BranchSettings {
    /// Stop when (incumbent - bound) / |incumbent| <= relative_gap
    relative_gap: f64,
    absolute_gap: f64,
    /// A value is integral if |x - round(x)| <= integrality
    integrality: f64,
    max_nodes: u64,
    time_limit: Option<Duration>,
}

impl BranchSettings {
    fn new(options: &SolveOptions) -> Self {
        let parameters = &options.parameters;
        BranchSettings {
            relative_gap: parameters.float(RELATIVE_GAP_TOLERANCE).unwrap_or(1e-4),
            absolute_gap: parameters.float(ABSOLUTE_GAP_TOLERANCE).unwrap_or(1e-6),
            integrality: parameters.float(INTEGRALITY_TOLERANCE).unwrap_or(1e-5),
            max_nodes: parameters
                .int(MAX_NODES)
                .and_then(|n| u64::try_from(n).ok())
                .unwrap_or(100_000),
            time_limit: options.time_limit(),
        }
    }

    fn converged(&self, incumbent: f64, bound: f64) -> bool {
        let gap = (incumbent - bound).max(0.);
        gap <= self.absolute_gap || gap / incumbent.abs().max(1e-10) <= self.relative_gap
    }

    /// Nodes whose bound is within the gap tolerances of the incumbent cannot improve it enough
    fn prunes(&self, incumbent: f64, bound: f64) -> bool {
        let tolerance = self.absolute_gap.max(self.relative_gap * incumbent.abs());
        bound >= incumbent - tolerance
    }
}

/// A subproblem: column bounds, and the objective of its parent relaxation
struct Node {
    lower: Vec<f64>,
    upper: Vec<f64>,
    bound: f64,
}

struct Incumbent {
    primal: Vec<f64>,
    /// In minimisation form
    objective: f64,
}

/// How the search ended
enum Exit {
    /// Every node was explored or pruned
    Complete,
    /// The incumbent is within the gap tolerances of the bound
    Converged,
    Limit,
    Cancelled,
}

struct Search<'a, B: ?Sized> {
    backend: &'a B,
    problem: &'a FlatProblem,
    options: &'a SolveOptions,
    session: &'a Session,
    settings: BranchSettings,
    incumbent: Option<Incumbent>,
    iterations: u64,
    nodes: u64,
}

pub(crate) fn solve<B: Backend + ?Sized>(
    backend: &B,
    problem: &FlatProblem,
    options: &SolveOptions,
    session: &Session,
    epoch: u64,
) -> Result<Solution, ResolutionError> {
    let mut search = Search {
        backend,
        problem,
        options,
        session,
        settings: BranchSettings::new(options),
        incumbent: None,
        iterations: 0,
        nodes: 0,
    };
    let (lower, upper) = search.integer_bounds(&session.lower, &session.upper)?;
    if !options.initial_solution.is_empty() {
        search.warm_start(&lower, &upper)?;
    }
    let (exit, bound) = search.explore(Node {
        lower,
        upper,
        bound: f64::NEG_INFINITY,
    })?;
    search.finish(exit, bound, epoch)
}

impl<'a, B: Backend + ?Sized> Search<'a, B> {
    /// Integer columns take integer bounds, rounded inwards
    fn integer_bounds(
        &self,
        lower: &[f64],
        upper: &[f64],
    ) -> Result<(Vec<f64>, Vec<f64>), ResolutionError> {
        let mut lower = lower.to_vec();
        let mut upper = upper.to_vec();
        let tolerance = self.settings.integrality;
        for (c, column) in self.problem.columns().iter().enumerate() {
            if column.integer {
                lower[c] = (lower[c] - tolerance).ceil();
                upper[c] = (upper[c] + tolerance).floor();
            }
            if lower[c] > upper[c] {
                debug!("column {} has no integer value in its bounds", c);
                return Err(ResolutionError::Infeasible);
            }
        }
        Ok((lower, upper))
    }

    fn progress(&self, bound: Option<f64>) -> Progress {
        Progress {
            iterations: self.iterations,
            nodes: self.nodes,
            elapsed: self.session.monitor().elapsed(),
            best_objective: self
                .incumbent
                .as_ref()
                .map(|i| self.problem.user_objective(i.objective)),
            best_bound: bound.map(|b| self.problem.user_objective(b)),
        }
    }

    fn relax(&mut self, lower: &[f64], upper: &[f64], bound: Option<f64>) -> Relaxation {
        let monitor = self.session.monitor();
        let context = RelaxationContext {
            parameters: &self.options.parameters,
            time_limit: self.options.remaining_time(monitor),
            duals: false,
            monitor,
            progress: self.progress(bound),
        };
        let relaxation = self
            .backend
            .solve_relaxation(self.problem, lower, upper, &context);
        if let Relaxation::Optimal { iterations, .. } = &relaxation {
            self.iterations += iterations;
        }
        relaxation
    }

    /// The integer column whose value is the farthest from an integer
    fn most_fractional(&self, primal: &[f64]) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64, f64)> = None;
        for (c, column) in self.problem.columns().iter().enumerate() {
            if !column.integer {
                continue;
            }
            let distance = (primal[c] - primal[c].round()).abs();
            if distance > self.settings.integrality
                && best.map_or(true, |(_, _, d)| distance > d)
            {
                best = Some((c, primal[c], distance));
            }
        }
        best.map(|(c, value, _)| (c, value))
    }

    /// Fix the hinted columns and solve what remains. An integral result
    /// becomes the first incumbent.
    fn warm_start(&mut self, lower: &[f64], upper: &[f64]) -> Result<(), ResolutionError> {
        let mut lower = lower.to_vec();
        let mut upper = upper.to_vec();
        for &(c, value) in &self.options.initial_solution {
            let column = self.problem.columns()[c];
            let value = if column.integer { value.round() } else { value };
            if value < lower[c] || value > upper[c] {
                warn!(
                    "initial value {} of column {} is out of its bounds, ignoring the initial solution",
                    value, c
                );
                return Ok(());
            }
            lower[c] = value;
            upper[c] = value;
        }
        match self.relax(&lower, &upper, None) {
            Relaxation::Optimal {
                primal, objective, ..
            } if self.most_fractional(&primal).is_none() => {
                info!(
                    "initial solution accepted with objective {}",
                    self.problem.user_objective(objective)
                );
                self.incumbent = Some(Incumbent { primal, objective });
            }
            Relaxation::Failed(message) => return Err(ResolutionError::NumericalFailure(message)),
            other => warn!(
                "the initial solution does not extend to an integer solution ({}), ignoring it",
                describe(&other)
            ),
        }
        Ok(())
    }

    fn explore(&mut self, root: Node) -> Result<(Exit, f64), ResolutionError> {
        let mut stack = vec![root];
        loop {
            let open_bound = stack
                .iter()
                .map(|n| n.bound)
                .fold(f64::INFINITY, f64::min);
            let bound = match &self.incumbent {
                Some(incumbent) => open_bound.min(incumbent.objective),
                None => open_bound,
            };
            if let Some(incumbent) = &self.incumbent {
                if !stack.is_empty() && self.settings.converged(incumbent.objective, bound) {
                    return Ok((Exit::Converged, bound));
                }
            }
            let node = match stack.pop() {
                Some(node) => node,
                None => return Ok((Exit::Complete, bound)),
            };
            if let Some(incumbent) = &self.incumbent {
                if self.settings.prunes(incumbent.objective, node.bound) {
                    continue;
                }
            }
            let elapsed = self.session.monitor().elapsed();
            if self.nodes >= self.settings.max_nodes
                || matches!(self.settings.time_limit, Some(limit) if elapsed >= limit)
            {
                info!("branch and bound stopped on a limit after {} nodes", self.nodes);
                return Ok((Exit::Limit, bound.min(node.bound)));
            }
            self.nodes += 1;
            let progress = self.progress(Some(bound.min(node.bound)));
            if self.session.monitor().poll(&progress) == Control::Abort {
                return Ok((Exit::Cancelled, bound.min(node.bound)));
            }
            let (primal, objective) =
                match self.relax(&node.lower, &node.upper, Some(bound.min(node.bound))) {
                    Relaxation::Optimal {
                        primal, objective, ..
                    } => (primal, objective),
                    Relaxation::Infeasible => {
                        debug!("node {} is infeasible", self.nodes);
                        continue;
                    }
                    Relaxation::Unbounded => return Err(ResolutionError::Unbounded),
                    Relaxation::LimitReached(_) => return Ok((Exit::Limit, bound.min(node.bound))),
                    Relaxation::Cancelled => return Ok((Exit::Cancelled, bound.min(node.bound))),
                    Relaxation::Failed(message) => {
                        return Err(ResolutionError::NumericalFailure(message))
                    }
                };
            if let Some(incumbent) = &self.incumbent {
                if self.settings.prunes(incumbent.objective, objective) {
                    continue;
                }
            }
            match self.most_fractional(&primal) {
                None => {
                    debug!(
                        "node {}: new incumbent with objective {}",
                        self.nodes,
                        self.problem.user_objective(objective)
                    );
                    self.incumbent = Some(Incumbent { primal, objective });
                }
                Some((column, value)) => {
                    let mut down = Node {
                        lower: node.lower.clone(),
                        upper: node.upper.clone(),
                        bound: objective,
                    };
                    down.upper[column] = value.floor();
                    let mut up = Node {
                        lower: node.lower,
                        upper: node.upper,
                        bound: objective,
                    };
                    up.lower[column] = value.ceil();
                    debug!(
                        "node {}: branching on column {} = {}",
                        self.nodes, column, value
                    );
                    // the branch closest to the relaxation is explored first
                    if value - value.floor() >= 0.5 {
                        stack.push(down);
                        stack.push(up);
                    } else {
                        stack.push(up);
                        stack.push(down);
                    }
                }
            }
        }
    }

    fn finish(self, exit: Exit, bound: f64, epoch: u64) -> Result<Solution, ResolutionError> {
        let problem = self.problem;
        let mut info = SolveInfo {
            backend: self.backend.name(),
            iterations: self.iterations,
            nodes: self.nodes,
            solve_time: self.session.monitor().elapsed(),
            ..SolveInfo::default()
        };
        let solution = self.incumbent.map(|incumbent| {
            let primal: Vec<f64> = incumbent
                .primal
                .iter()
                .zip(problem.columns())
                .map(|(&v, c)| if c.integer { v.round() } else { v })
                .collect();
            let objective = problem.min_objective(&primal);
            if bound.is_finite() {
                let gap = (objective - bound).max(0.);
                info.best_bound = Some(problem.user_objective(bound));
                info.absolute_gap = Some(gap);
                info.relative_gap = Some(gap / objective.abs().max(1e-10));
            }
            Solution {
                status: SolutionStatus::Optimal,
                objective: Some(problem.user_objective(objective)),
                primal: Some(primal),
                duals: None,
                info: info.clone(),
                epoch,
            }
        });
        match (exit, solution) {
            (Exit::Complete | Exit::Converged, Some(solution)) => Ok(solution),
            (Exit::Complete | Exit::Converged, None) => Err(ResolutionError::Infeasible),
            (Exit::Limit, best) => Err(ResolutionError::TimeLimitExceeded {
                best: best.map(|s| {
                    Box::new(Solution {
                        status: SolutionStatus::Feasible,
                        ..s
                    })
                }),
            }),
            (Exit::Cancelled, best) => Ok(best
                .map(|s| Solution {
                    status: SolutionStatus::Cancelled,
                    ..s
                })
                .unwrap_or(Solution {
                    status: SolutionStatus::Cancelled,
                    objective: None,
                    primal: None,
                    duals: None,
                    info,
                    epoch,
                })),
        }
    }
}

fn describe(relaxation: &Relaxation) -> &'static str {
    match relaxation {
        Relaxation::Optimal { .. } => "fractional",
        Relaxation::Infeasible => "infeasible",
        Relaxation::Unbounded => "unbounded",
        Relaxation::LimitReached(_) => "limit reached",
        Relaxation::Cancelled => "cancelled",
        Relaxation::Failed(_) => "failed",
    }
}
