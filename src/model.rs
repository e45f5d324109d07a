//! The [Model] owns variables, constraints, the objective and the solve options.
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use fnv::FnvHashMap as HashMap;
use log::debug;

use crate::constraint::{Constraint, ConstraintReference};
use crate::domain::{Domain, Usage};
use crate::error::{BuildError, MipGapError, ResolutionError};
use crate::expression::Expression;
use crate::parameters::{
    check_gap, ParameterValue, Parameters, ABSOLUTE_GAP_TOLERANCE, MAX_TIME_SECONDS,
    RELATIVE_GAP_TOLERANCE,
};
use crate::quadratic_expression::{IntoObjective, QuadraticExpression};
use crate::shape::Shape;
use crate::solution::{Solution, SolutionStatus};
use crate::solvers::{
    self, Backend, ColumnDefinition, Control, FlatProblem, ObjectiveDirection, Progress,
    ProgressCallback, SharedCallback, SolveOptions,
};
use crate::variable::{variable, ColumnLayout, Variable, VariableDefinition};

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(0);

struct VariableEntry {
    name: Option<String>,
    variable: Variable,
}

/// An optimization model: variables, constraints over cones, and an objective.
///
/// Every change to the model starts a new mutation epoch and discards the
/// last solution. Solving twice in the same epoch with the same backend
/// returns the stored solution.
///
/// ```
/// # #[cfg(feature = "clarabel")] {
/// use good_conic::{in_range, variable, Model};
///
/// let mut model = Model::new("example");
/// let x = model.add(variable().name("x").shape(2).min(0)).unwrap();
/// model.constraint("capacity", x.expr().sum(), in_range(0., 4.)).unwrap();
/// model.maximise(x.expr().dot(&[1., 2.]).unwrap()).unwrap();
/// let solution = model.solve().unwrap();
/// assert!((solution.objective_value().unwrap() - 8.).abs() < 1e-6);
/// # }
/// ```
pub struct Model {
    id: u64,
    name: String,
    variables: Vec<VariableEntry>,
    variable_names: HashMap<String, usize>,
    columns: Vec<ColumnDefinition>,
    constraints: Vec<Constraint>,
    constraint_names: HashMap<String, usize>,
    objective: Option<(ObjectiveDirection, QuadraticExpression)>,
    options: SolveOptions,
    callback: Option<SharedCallback>,
    epoch: u64,
    cached: Option<(&'static str, Solution)>,
}

impl Model {
    /// Create an empty model
    pub fn new<S: Into<String>>(name: S) -> Self {
        Model {
            id: NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            variables: Vec::new(),
            variable_names: HashMap::default(),
            columns: Vec::new(),
            constraints: Vec::new(),
            constraint_names: HashMap::default(),
            objective: None,
            options: SolveOptions::default(),
            callback: None,
            epoch: 0,
            cached: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start a new mutation epoch
    fn touch(&mut self) {
        self.epoch += 1;
        self.cached = None;
    }

    /// Add a new variable
    ///
    /// ```
    /// # use good_conic::{variable, BuildError, Model};
    /// let mut model = Model::new("bounds");
    /// let result = model.add(variable().min(5).max(2));
    /// assert!(matches!(result, Err(BuildError::InvalidDomain(_))));
    /// ```
    pub fn add(&mut self, definition: VariableDefinition) -> Result<Variable, BuildError> {
        definition
            .domain
            .validate(&definition.shape, Usage::Variable)?;
        if let Some(name) = &definition.name {
            if self.variable_names.contains_key(name) {
                return Err(BuildError::DuplicateName(name.clone()));
            }
        }
        let bounds = definition.element_bounds()?;
        let integer = definition.is_integral();
        let first = self.columns.len();
        let layout = match definition.domain {
            Domain::PsdCone => ColumnLayout::Symmetric {
                first,
                n: definition.shape.rows(),
            },
            _ => ColumnLayout::Dense { first },
        };
        let index = self.variables.len();
        let variable = Variable::new(self.id, index, definition.shape.clone(), layout);
        match bounds {
            Some(bounds) => self
                .columns
                .extend(bounds.into_iter().map(|(lower, upper)| ColumnDefinition {
                    lower,
                    upper,
                    integer,
                })),
            None => {
                let free = ColumnDefinition {
                    lower: f64::NEG_INFINITY,
                    upper: f64::INFINITY,
                    integer: false,
                };
                self.columns
                    .extend(std::iter::repeat(free).take(variable.column_count()));
                // conic domains are enforced by a constraint on the whole variable
                self.constraints
                    .push(Constraint::new(variable.expr(), definition.domain.clone()));
            }
        }
        if let Some(name) = &definition.name {
            self.variable_names.insert(name.clone(), index);
        }
        debug!(
            "{}: variable {} {} with {} columns",
            self.name,
            definition.name.as_deref().unwrap_or("(anonymous)"),
            definition.shape,
            variable.column_count()
        );
        self.variables.push(VariableEntry {
            name: definition.name,
            variable: variable.clone(),
        });
        self.touch();
        Ok(variable)
    }

    /// Add an anonymous variable with a shape and a domain
    pub fn declare_variable<S: Into<Shape>>(
        &mut self,
        shape: S,
        domain: Domain,
    ) -> Result<Variable, BuildError> {
        self.add(variable().shape(shape).domain(domain))
    }

    /// Find a variable by name
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variable_names
            .get(name)
            .map(|&i| &self.variables[i].variable)
    }

    /// The name of a variable of this model
    pub fn variable_name(&self, variable: &Variable) -> Option<&str> {
        self.variables.get(variable.index())?.name.as_deref()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// The number of scalar columns given to the solver
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Add a constraint. Constraints in the PSD cone apply to the symmetric
    /// part of their expression.
    ///
    /// ```
    /// # use good_conic::{in_rotated_quadratic_cone, variable, BuildError, Model};
    /// let mut model = Model::new("cones");
    /// let x = model.add(variable().shape(2)).unwrap();
    /// let result = model.add_constraint(x.expr().in_domain(in_rotated_quadratic_cone()));
    /// assert!(matches!(result, Err(BuildError::ShapeMismatch(_))));
    /// ```
    pub fn add_constraint(
        &mut self,
        mut constraint: Constraint,
    ) -> Result<ConstraintReference, BuildError> {
        constraint
            .domain
            .validate(constraint.expression.shape(), Usage::Constraint)?;
        if let Some(name) = &constraint.name {
            if self.constraint_names.contains_key(name) {
                return Err(BuildError::DuplicateName(name.clone()));
            }
        }
        if constraint.domain == Domain::PsdCone {
            constraint.expression = constraint.expression.symmetric_part();
        }
        let index = self.constraints.len();
        if let Some(name) = &constraint.name {
            self.constraint_names.insert(name.clone(), index);
        }
        debug!("{}: constraint {:?}", self.name, constraint);
        self.constraints.push(constraint);
        self.touch();
        Ok(ConstraintReference { index })
    }

    /// Add a named constraint
    pub fn constraint<S: Into<String>, E: Into<Expression>>(
        &mut self,
        name: S,
        expression: E,
        domain: Domain,
    ) -> Result<ConstraintReference, BuildError> {
        self.add_constraint(Constraint::new(expression.into(), domain).named(name))
    }

    /// Find a constraint by name
    pub fn constraint_reference(&self, name: &str) -> Option<ConstraintReference> {
        self.constraint_names
            .get(name)
            .map(|&index| ConstraintReference { index })
    }

    pub fn get_constraint(&self, reference: ConstraintReference) -> Option<&Constraint> {
        self.constraints.get(reference.index)
    }

    /// Set or replace the objective
    pub fn set_objective<E: IntoObjective>(
        &mut self,
        direction: ObjectiveDirection,
        objective: E,
    ) -> Result<(), BuildError> {
        let objective = objective.into_objective()?;
        self.objective = Some((direction, objective));
        self.touch();
        Ok(())
    }

    pub fn maximise<E: IntoObjective>(&mut self, objective: E) -> Result<(), BuildError> {
        self.set_objective(ObjectiveDirection::Maximisation, objective)
    }

    pub fn minimise<E: IntoObjective>(&mut self, objective: E) -> Result<(), BuildError> {
        self.set_objective(ObjectiveDirection::Minimisation, objective)
    }

    pub fn objective(&self) -> Option<(ObjectiveDirection, &QuadraticExpression)> {
        self.objective.as_ref().map(|(d, o)| (*d, o))
    }

    /// Set a solver parameter. See [crate::parameters] for the keys every
    /// backend understands.
    pub fn set_parameter<K: Into<String>, V: Into<ParameterValue>>(&mut self, key: K, value: V) {
        self.options.parameters.set(key, value);
        self.touch();
    }

    pub fn parameters(&self) -> &Parameters {
        &self.options.parameters
    }

    /// Limit the wall clock time of a solve
    pub fn set_time_limit(&mut self, seconds: f64) {
        self.set_parameter(MAX_TIME_SECONDS, seconds);
    }

    /// Set the relative gap at which branch and bound stops
    ///
    /// ```
    /// # use good_conic::{MipGapError, Model};
    /// let mut model = Model::new("gap");
    /// assert_eq!(model.set_mip_gap(0.5), Ok(()));
    /// assert_eq!(model.set_mip_gap(-0.5), Err(MipGapError::Negative));
    /// assert_eq!(model.set_mip_gap(f64::INFINITY), Err(MipGapError::Infinite));
    /// ```
    pub fn set_mip_gap(&mut self, gap: f64) -> Result<(), MipGapError> {
        let gap = check_gap(gap)?;
        self.set_parameter(RELATIVE_GAP_TOLERANCE, gap);
        Ok(())
    }

    /// Set the absolute gap at which branch and bound stops
    pub fn set_absolute_gap(&mut self, gap: f64) -> Result<(), MipGapError> {
        let gap = check_gap(gap)?;
        self.set_parameter(ABSOLUTE_GAP_TOLERANCE, gap);
        Ok(())
    }

    /// Compute dual values (off by default)
    pub fn set_compute_duals(&mut self, duals: bool) {
        self.options.duals = duals;
        self.touch();
    }

    /// Builder-style [Model::set_compute_duals]
    pub fn with_duals(mut self, duals: bool) -> Self {
        self.set_compute_duals(duals);
        self
    }

    /// Give initial values to the elements of a variable, used as a warm
    /// start for integer problems. Variables without initial values are
    /// completed by the solver.
    pub fn set_initial_solution(
        &mut self,
        variable: &Variable,
        values: &[f64],
    ) -> Result<(), BuildError> {
        if !self.owns(variable) {
            return Err(BuildError::ShapeMismatch(
                "the variable does not belong to this model".to_string(),
            ));
        }
        if values.len() != variable.size() {
            return Err(BuildError::shape_mismatch(
                "initial solution",
                format!("{} values", variable.size()),
                values.len(),
            ));
        }
        if let Some(v) = values.iter().find(|v| !v.is_finite()) {
            return Err(BuildError::InvalidDomain(format!(
                "{} is not a valid initial value",
                v
            )));
        }
        let columns: Vec<usize> = variable.columns().collect();
        let hints = &mut self.options.initial_solution;
        hints.retain(|(c, _)| !columns.contains(c));
        hints.extend(columns.into_iter().zip(values.iter().copied()));
        self.touch();
        Ok(())
    }

    pub fn clear_initial_solution(&mut self) {
        self.options.initial_solution.clear();
        self.touch();
    }

    /// Observe the solve, and stop it by returning [Control::Abort].
    /// The callback is called once when the model is submitted, then
    /// regularly while the backend runs.
    pub fn set_progress_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&Progress) -> Control + Send + 'static,
    {
        let callback: ProgressCallback = Box::new(callback);
        self.callback = Some(Arc::new(Mutex::new(callback)));
        self.touch();
    }

    pub fn clear_progress_callback(&mut self) {
        self.callback = None;
        self.touch();
    }

    /// The current mutation epoch
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The solution of the last solve, if the model did not change since
    pub fn solution(&self) -> Option<&Solution> {
        self.cached
            .as_ref()
            .map(|(_, s)| s)
            .filter(|s| s.epoch == self.epoch)
    }

    fn owns(&self, variable: &Variable) -> bool {
        variable.model_id() == self.id
            && self
                .variables
                .get(variable.index())
                .map_or(false, |entry| entry.variable == *variable)
    }

    /// The flat representation of this model given to backends
    pub fn to_flat(&self) -> Result<FlatProblem, ResolutionError> {
        let (direction, objective) = self
            .objective
            .as_ref()
            .ok_or_else(|| ResolutionError::InvalidModel("the model has no objective".into()))?;
        if self.columns.is_empty() {
            return Err(ResolutionError::InvalidModel(
                "the model has no variables".into(),
            ));
        }
        FlatProblem::new(
            self.columns.clone(),
            &self.constraints,
            *direction,
            objective,
        )
    }

    /// Solve the model with the default backend
    #[cfg(any(feature = "clarabel", feature = "microlp"))]
    pub fn solve(&mut self) -> Result<Solution, ResolutionError> {
        self.solve_using(&solvers::DefaultBackend::default())
    }

    /// Solve the model with the given backend
    pub fn solve_using<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
    ) -> Result<Solution, ResolutionError> {
        if let Some((name, solution)) = &self.cached {
            if *name == backend.name() && solution.epoch == self.epoch {
                debug!("{}: reusing the solution of epoch {}", self.name, self.epoch);
                return Ok(solution.clone());
            }
        }
        let problem = self.to_flat()?;
        let solution = solvers::run(
            backend,
            &problem,
            &self.options,
            self.callback.clone(),
            self.epoch,
        )?;
        if solution.status() == SolutionStatus::Optimal {
            self.cached = Some((backend.name(), solution.clone()));
        }
        Ok(solution)
    }
}

impl Debug for Model {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("variables", &self.variables.len())
            .field("columns", &self.columns.len())
            .field("constraints", &self.constraints)
            .field("objective", &self.objective)
            .field("epoch", &self.epoch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{in_psd_cone, in_quadratic_cone, integral, nonnegative};

    #[test]
    fn names_are_unique_per_kind() {
        let mut model = Model::new("names");
        let x = model.add(variable().name("x")).unwrap();
        assert!(matches!(
            model.add(variable().name("x")),
            Err(BuildError::DuplicateName(_))
        ));
        model.constraint("x", x.expr(), nonnegative()).unwrap();
        assert!(matches!(
            model.constraint("x", x.expr(), nonnegative()),
            Err(BuildError::DuplicateName(_))
        ));
        assert_eq!(model.variable("x"), Some(&x));
        assert_eq!(model.variable_name(&x), Some("x"));
        assert_eq!(model.constraint_reference("x").map(|r| r.index()), Some(0));
    }

    #[test]
    fn build_errors_leave_the_model_untouched() {
        let mut model = Model::new("errors");
        let x = model.add(variable().shape(3)).unwrap();
        let epoch = model.epoch();
        assert!(model.add(variable().min(5).max(2)).is_err());
        assert!(model
            .add_constraint(x.expr().in_domain(in_psd_cone()))
            .is_err());
        assert!(model
            .add_constraint(x.expr().in_domain(integral(nonnegative())))
            .is_err());
        assert_eq!(model.epoch(), epoch);
        assert_eq!(model.num_variables(), 1);
        assert_eq!(model.num_columns(), 3);
    }

    #[test]
    fn conic_variables() {
        let mut model = Model::new("cones");
        let t = model
            .declare_variable(3, in_quadratic_cone())
            .unwrap();
        let s = model.declare_variable((3, 3), in_psd_cone()).unwrap();
        assert_eq!(model.num_columns(), 3 + 6);
        assert_eq!(s.expr().size(), 9);
        assert_eq!(model.constraints.len(), 2);
        assert!(model.add(variable().shape(3).domain(in_quadratic_cone()).min(0)).is_err());
        assert_eq!(t.size(), 3);
    }

    #[test]
    fn every_mutation_starts_an_epoch() {
        let mut model = Model::new("epochs");
        let x = model.add(variable().min(0)).unwrap();
        let mut epoch = model.epoch();
        let mut changed = |model: &Model| {
            let changed = model.epoch() > epoch;
            epoch = model.epoch();
            changed
        };
        model.minimise(&x).unwrap();
        assert!(changed(&model));
        model.set_time_limit(10.);
        assert!(changed(&model));
        model.set_compute_duals(true);
        assert!(changed(&model));
        model.set_initial_solution(&x, &[1.]).unwrap();
        assert!(changed(&model));
        model.set_progress_callback(|_| Control::Continue);
        assert!(changed(&model));
        model.constraint("c", x.expr(), nonnegative()).unwrap();
        assert!(changed(&model));
    }

    #[test]
    fn initial_solution_checks() {
        let mut model = Model::new("warm");
        let x = model.add(variable().shape(2).integer()).unwrap();
        assert!(matches!(
            model.set_initial_solution(&x, &[1.]),
            Err(BuildError::ShapeMismatch(_))
        ));
        model.set_initial_solution(&x, &[1., 2.]).unwrap();
        model.set_initial_solution(&x, &[3., 4.]).unwrap();
        assert_eq!(model.options.initial_solution, vec![(0, 3.), (1, 4.)]);
        let mut other = Model::new("other");
        let y = other.add(variable().shape(5)).unwrap();
        assert!(model.set_initial_solution(&y, &[0.; 5]).is_err());
        // same index, shape and columns in another model
        let twin = other_model_twin();
        assert!(model.set_initial_solution(&twin, &[0., 0.]).is_err());
        assert_ne!(twin, x);
    }

    fn other_model_twin() -> Variable {
        let mut other = Model::new("twin");
        other.add(variable().shape(2).integer()).unwrap()
    }

    #[test]
    fn submission_errors() {
        let mut model = Model::new("invalid");
        assert!(matches!(model.to_flat(), Err(ResolutionError::InvalidModel(_))));
        let x = model.add(variable()).unwrap();
        assert!(matches!(model.to_flat(), Err(ResolutionError::InvalidModel(_))));
        model.minimise(&x).unwrap();
        assert!(model.to_flat().is_ok());
        let mut other = Model::new("other");
        let y = other.add(variable().shape(4)).unwrap();
        model.minimise(y.expr().sum()).unwrap();
        assert!(matches!(model.to_flat(), Err(ResolutionError::InvalidModel(_))));
    }
}
