//! Solve backends, and the driver that runs them on a flattened model.
//!
//! A backend only needs to solve continuous relaxations of a [FlatProblem]
//! within column bounds. Integer columns are handled by a depth-first
//! branch and bound over those relaxations.
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::error::ResolutionError;
use crate::parameters::{self, Parameters, MAX_TIME_SECONDS};
use crate::solution::{Solution, SolutionStatus, SolveInfo};

pub use flat::{ColumnDefinition, Cone, FlatProblem, Row};

pub mod flat;

mod branch;

#[cfg(feature = "clarabel")]
pub mod clarabel;
#[cfg(feature = "clarabel")]
pub use self::clarabel::Clarabel;

#[cfg(feature = "microlp")]
pub mod microlp;
#[cfg(feature = "microlp")]
pub use self::microlp::MicroLp;

/// The backend used by [crate::Model::solve]
#[cfg(feature = "clarabel")]
pub type DefaultBackend = self::clarabel::Clarabel;

/// The backend used by [crate::Model::solve]
#[cfg(all(not(feature = "clarabel"), feature = "microlp"))]
pub type DefaultBackend = self::microlp::MicroLp;

/// Whether to search for the variable values that give the highest
/// or the lowest value of the objective function.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum ObjectiveDirection {
    Maximisation,
    Minimisation,
}

/// A snapshot of a running solve, passed to the progress callback
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Progress {
    /// Interior point or simplex iterations so far
    pub iterations: u64,
    /// Branch and bound nodes explored so far
    pub nodes: u64,
    /// Time since the solve started
    pub elapsed: Duration,
    /// Objective of the best integer solution found so far
    pub best_objective: Option<f64>,
    /// Best proven bound on the objective
    pub best_bound: Option<f64>,
}

/// The decision returned by a progress callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Abort,
}

/// Observes a running solve and decides whether it should go on
pub type ProgressCallback = Box<dyn FnMut(&Progress) -> Control + Send>;

pub(crate) type SharedCallback = Arc<Mutex<ProgressCallback>>;

/// Forwards progress to the user callback, if there is one
#[derive(Clone)]
pub struct Monitor {
    callback: Option<SharedCallback>,
    start: Instant,
}

impl Monitor {
    pub(crate) fn new(callback: Option<SharedCallback>) -> Self {
        Monitor {
            callback,
            start: Instant::now(),
        }
    }

    /// Report progress. Always continues when no callback is registered.
    pub fn poll(&self, progress: &Progress) -> Control {
        match &self.callback {
            None => Control::Continue,
            Some(callback) => {
                let mut callback = callback.lock().unwrap_or_else(PoisonError::into_inner);
                (*callback)(progress)
            }
        }
    }

    /// True if polling has any effect
    pub fn is_observed(&self) -> bool {
        self.callback.is_some()
    }

    /// Time since the solve started
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Everything a backend needs besides the problem and the column bounds
pub struct RelaxationContext<'a> {
    /// Parameters set on the model, passed through unmodified
    pub parameters: &'a Parameters,
    /// Remaining wall clock time
    pub time_limit: Option<Duration>,
    /// Whether the row multipliers should be returned
    pub duals: bool,
    pub monitor: &'a Monitor,
    /// Progress of the enclosing search, completed by the backend with its own iterations
    pub progress: Progress,
}

/// The outcome of a continuous solve
#[derive(Debug, Clone, PartialEq)]
pub enum Relaxation {
    Optimal {
        /// Values of all the columns
        primal: Vec<f64>,
        /// Objective in minimisation form
        objective: f64,
        /// Multipliers of [FlatProblem::rows], when requested
        duals: Option<Vec<f64>>,
        iterations: u64,
    },
    Infeasible,
    Unbounded,
    /// A time or iteration limit was reached, with the last iterate when there is one
    LimitReached(Option<Vec<f64>>),
    /// The progress callback asked to stop
    Cancelled,
    Failed(String),
}

/// A numerical solver for the continuous relaxations of a model
pub trait Backend {
    /// A human readable name, reported in [SolveInfo]
    fn name(&self) -> &'static str;

    /// Fails with [ResolutionError::InvalidModel] if the problem uses a feature
    /// the backend does not support
    fn check(&self, problem: &FlatProblem) -> Result<(), ResolutionError>;

    /// Whether a parameter outside of the common set is applied by this backend
    fn accepts_parameter(&self, _key: &str) -> bool {
        false
    }

    /// Solve the problem with integrality relaxed and column bounds replaced
    /// by `lower` and `upper`
    fn solve_relaxation(
        &self,
        problem: &FlatProblem,
        lower: &[f64],
        upper: &[f64],
        context: &RelaxationContext,
    ) -> Relaxation;
}

impl<B: Backend + ?Sized> Backend for &B {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn check(&self, problem: &FlatProblem) -> Result<(), ResolutionError> {
        (**self).check(problem)
    }

    fn accepts_parameter(&self, key: &str) -> bool {
        (**self).accepts_parameter(key)
    }

    fn solve_relaxation(
        &self,
        problem: &FlatProblem,
        lower: &[f64],
        upper: &[f64],
        context: &RelaxationContext,
    ) -> Relaxation {
        (**self).solve_relaxation(problem, lower, upper, context)
    }
}

/// Options of a single solve
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveOptions {
    pub parameters: Parameters,
    /// Compute dual values for continuous problems
    pub duals: bool,
    /// (column, value) hints for the first integer solution
    pub initial_solution: Vec<(usize, f64)>,
}

impl SolveOptions {
    /// The `max_time_seconds` parameter, when it is a valid duration
    pub(crate) fn time_limit(&self) -> Option<Duration> {
        let seconds = self.parameters.float(MAX_TIME_SECONDS)?;
        match Duration::try_from_secs_f64(seconds) {
            Ok(d) => Some(d),
            Err(_) => {
                warn!("ignoring invalid time limit {}", seconds);
                None
            }
        }
    }

    /// The time left out of the time limit
    pub(crate) fn remaining_time(&self, monitor: &Monitor) -> Option<Duration> {
        self.time_limit()
            .map(|limit| limit.saturating_sub(monitor.elapsed()))
    }
}

/// The resources held by a running solve. Dropping it releases them,
/// whatever the outcome of the solve.
pub(crate) struct Session {
    backend: &'static str,
    monitor: Monitor,
    pub(crate) lower: Vec<f64>,
    pub(crate) upper: Vec<f64>,
}

impl Session {
    pub(crate) fn open(
        backend: &'static str,
        problem: &FlatProblem,
        callback: Option<SharedCallback>,
    ) -> Self {
        debug!("opening a {} session", backend);
        Session {
            backend,
            monitor: Monitor::new(callback),
            lower: problem.columns().iter().map(|c| c.lower).collect(),
            upper: problem.columns().iter().map(|c| c.upper).collect(),
        }
    }

    pub(crate) fn monitor(&self) -> &Monitor {
        &self.monitor
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!(
            "{} session released after {:?}",
            self.backend,
            self.monitor.elapsed()
        );
    }
}

fn cancelled(info: SolveInfo, epoch: u64) -> Solution {
    Solution {
        status: SolutionStatus::Cancelled,
        objective: None,
        primal: None,
        duals: None,
        info,
        epoch,
    }
}

/// Solve a flattened model with a backend
pub(crate) fn run<B: Backend + ?Sized>(
    backend: &B,
    problem: &FlatProblem,
    options: &SolveOptions,
    callback: Option<SharedCallback>,
    epoch: u64,
) -> Result<Solution, ResolutionError> {
    backend.check(problem)?;
    for (key, _) in options.parameters.iter() {
        if !parameters::is_common(key) && !backend.accepts_parameter(key) {
            warn!("parameter {:?} is not used by {}", key, backend.name());
        }
    }
    let session = Session::open(backend.name(), problem, callback);
    let monitor = session.monitor();
    info!(
        "solving a model with {} columns and {} rows using {}",
        problem.num_columns(),
        problem.rows().len(),
        backend.name()
    );
    let info = SolveInfo {
        backend: backend.name(),
        ..SolveInfo::default()
    };
    if monitor.poll(&Progress::default()) == Control::Abort {
        info!("solve cancelled before it started");
        return Ok(cancelled(info, epoch));
    }
    let result = if problem.has_integers() {
        branch::solve(backend, problem, options, &session, epoch)
    } else {
        if !options.initial_solution.is_empty() {
            debug!("ignoring the initial solution of a continuous problem");
        }
        solve_continuous(backend, problem, options, &session, epoch)
    };
    match &result {
        Ok(solution) => info!(
            "{} finished with status {:?}, objective {:?}",
            backend.name(),
            solution.status(),
            solution.objective_value()
        ),
        Err(e) => info!("{} failed: {}", backend.name(), e),
    }
    result
}

fn solve_continuous<B: Backend + ?Sized>(
    backend: &B,
    problem: &FlatProblem,
    options: &SolveOptions,
    session: &Session,
    epoch: u64,
) -> Result<Solution, ResolutionError> {
    let monitor = session.monitor();
    let context = RelaxationContext {
        parameters: &options.parameters,
        time_limit: options.remaining_time(monitor),
        duals: options.duals,
        monitor,
        progress: Progress::default(),
    };
    let mut info = SolveInfo {
        backend: backend.name(),
        ..SolveInfo::default()
    };
    let relaxation = backend.solve_relaxation(problem, &session.lower, &session.upper, &context);
    info.solve_time = monitor.elapsed();
    match relaxation {
        Relaxation::Optimal {
            primal,
            objective,
            duals,
            iterations,
        } => {
            let objective = problem.user_objective(objective);
            info.iterations = iterations;
            info.best_bound = Some(objective);
            Ok(Solution {
                status: SolutionStatus::Optimal,
                objective: Some(objective),
                duals: duals.map(|z| problem.constraint_duals(&z)),
                primal: Some(primal),
                info,
                epoch,
            })
        }
        Relaxation::Infeasible => Err(ResolutionError::Infeasible),
        Relaxation::Unbounded => Err(ResolutionError::Unbounded),
        Relaxation::LimitReached(last) => {
            let best = last.map(|primal| {
                Box::new(Solution {
                    status: SolutionStatus::Interrupted,
                    objective: Some(problem.user_objective(problem.min_objective(&primal))),
                    primal: Some(primal),
                    duals: None,
                    info,
                    epoch,
                })
            });
            Err(ResolutionError::TimeLimitExceeded { best })
        }
        Relaxation::Cancelled => Ok(cancelled(info, epoch)),
        Relaxation::Failed(message) => Err(ResolutionError::NumericalFailure(message)),
    }
}
