//! The flat representation of a model handed to backends.
//!
//! Every constraint `E ∈ K` is rewritten as rows `s = G x + h` grouped in
//! blocks of standard cones (zero, non-negative, second order and scaled
//! semidefinite triangle). Each row remembers which constraint elements it
//! was computed from, so that the multipliers of the rows can be mapped back
//! to the constraints.
use std::f64::consts::SQRT_2;

use log::debug;

use crate::affine::AffineExpression;
use crate::constraint::Constraint;
use crate::domain::Domain;
use crate::error::ResolutionError;
use crate::quadratic_expression::QuadraticExpression;
use crate::solvers::ObjectiveDirection;

/// A standard cone covering a block of consecutive rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cone {
    /// `s = 0`
    Zero(usize),
    /// `s >= 0`
    NonNegative(usize),
    /// `s₀ >= ‖s₁..‖₂`
    SecondOrder(usize),
    /// The upper triangle of an `n x n` positive semidefinite matrix,
    /// column by column, off-diagonal elements scaled by √2
    PsdTriangle(usize),
}

impl Cone {
    /// Number of rows covered by the cone
    pub fn rows(&self) -> usize {
        match *self {
            Cone::Zero(d) | Cone::NonNegative(d) | Cone::SecondOrder(d) => d,
            Cone::PsdTriangle(n) => n * (n + 1) / 2,
        }
    }

    /// True for cones that are not polyhedral
    pub fn is_conic(&self) -> bool {
        matches!(self, Cone::SecondOrder(_) | Cone::PsdTriangle(_))
    }
}

/// The affine row `s = G x + h`
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Non-zero coefficients of G, sorted by column
    pub terms: Vec<(usize, f64)>,
    /// h
    pub constant: f64,
    /// (constraint, element, coefficient) triplets this row was computed from
    origins: Vec<(usize, usize, f64)>,
}

impl Row {
    fn new(
        elements: &[AffineExpression],
        constraint: usize,
        parts: &[(usize, f64)],
        offset: f64,
    ) -> Self {
        let mut combined = AffineExpression::with_capacity(parts.len());
        for &(element, coefficient) in parts {
            combined.add_mul(coefficient, &elements[element]);
        }
        Row {
            terms: combined.linear().sorted_terms(),
            constant: combined.constant() + offset,
            origins: parts
                .iter()
                .map(|&(element, coefficient)| (constraint, element, coefficient))
                .collect(),
        }
    }

    /// The value of the row for the given column values
    pub fn eval_with(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(c, v)| v * values.get(c).copied().unwrap_or(0.))
            .sum::<f64>()
            + self.constant
    }
}

/// Bounds and integrality of a scalar column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnDefinition {
    pub lower: f64,
    pub upper: f64,
    pub integer: bool,
}

/// A model flattened into the standard conic form
///
/// minimise `½ xᵀPx + qᵀx + c` subject to `G x + h ∈ K` and column bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatProblem {
    columns: Vec<ColumnDefinition>,
    direction: ObjectiveDirection,
    q: Vec<f64>,
    p: Vec<(usize, usize, f64)>,
    objective_constant: f64,
    rows: Vec<Row>,
    cones: Vec<Cone>,
    constraint_sizes: Vec<usize>,
}

#[derive(Default)]
struct RowBlocks {
    zero: Vec<Row>,
    nonnegative: Vec<Row>,
    conic: Vec<(Cone, Vec<Row>)>,
}

impl FlatProblem {
    pub(crate) fn new(
        columns: Vec<ColumnDefinition>,
        constraints: &[Constraint],
        direction: ObjectiveDirection,
        objective: &QuadraticExpression,
    ) -> Result<Self, ResolutionError> {
        let n = columns.len();
        let out_of_range = |max: Option<usize>| matches!(max, Some(c) if c >= n);
        if out_of_range(objective.max_column()) {
            return Err(ResolutionError::InvalidModel(
                "the objective uses a variable that does not belong to this model".to_string(),
            ));
        }
        let sign = match direction {
            ObjectiveDirection::Minimisation => 1.,
            ObjectiveDirection::Maximisation => -1.,
        };
        let mut q = vec![0.; n];
        for (c, v) in objective.affine().linear().iter() {
            q[c] += sign * v;
        }
        let mut p = Vec::new();
        for (pair, v) in objective.quadratic_terms() {
            // ½ xᵀPx: diagonal terms are doubled, off-diagonal terms appear twice in P
            let v = sign * v;
            if pair.first == pair.second {
                if v < 0. {
                    return Err(ResolutionError::InvalidModel(format!(
                        "the objective is not convex in column {}",
                        pair.first
                    )));
                }
                p.push((pair.first, pair.second, 2. * v));
            } else {
                p.push((pair.first, pair.second, v));
            }
        }
        if !is_positive_semidefinite(&p) {
            return Err(ResolutionError::InvalidModel(
                "the quadratic part of the objective is not convex".to_string(),
            ));
        }

        let mut blocks = RowBlocks::default();
        for (index, constraint) in constraints.iter().enumerate() {
            if out_of_range(constraint.expression.max_column()) {
                return Err(ResolutionError::InvalidModel(format!(
                    "constraint {} uses a variable that does not belong to this model",
                    constraint.name().unwrap_or("(anonymous)")
                )));
            }
            blocks.push_constraint(index, constraint)?;
        }

        let mut rows = Vec::new();
        let mut cones = Vec::new();
        if !blocks.zero.is_empty() {
            cones.push(Cone::Zero(blocks.zero.len()));
            rows.append(&mut blocks.zero);
        }
        if !blocks.nonnegative.is_empty() {
            cones.push(Cone::NonNegative(blocks.nonnegative.len()));
            rows.append(&mut blocks.nonnegative);
        }
        for (cone, mut block) in blocks.conic {
            cones.push(cone);
            rows.append(&mut block);
        }
        debug!(
            "flattened model: {} columns, {} rows in {} cones, {} quadratic terms",
            n,
            rows.len(),
            cones.len(),
            p.len()
        );
        Ok(FlatProblem {
            columns,
            direction,
            q,
            p,
            objective_constant: sign * objective.affine().constant(),
            rows,
            cones,
            constraint_sizes: constraints.iter().map(|c| c.expression.size()).collect(),
        })
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn direction(&self) -> ObjectiveDirection {
        self.direction
    }

    /// The linear objective `q`, in minimisation form
    pub fn objective_vector(&self) -> &[f64] {
        &self.q
    }

    /// The upper triangle of `P` as (row, column, value) triplets, in minimisation form
    pub fn quadratic_objective(&self) -> &[(usize, usize, f64)] {
        &self.p
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn cones(&self) -> &[Cone] {
        &self.cones
    }

    pub fn has_integers(&self) -> bool {
        self.columns.iter().any(|c| c.integer)
    }

    pub fn is_linear(&self) -> bool {
        self.p.is_empty() && !self.cones.iter().any(Cone::is_conic)
    }

    /// The objective in minimisation form: `½ xᵀPx + qᵀx + c`
    pub fn min_objective(&self, x: &[f64]) -> f64 {
        let linear: f64 = self.q.iter().zip(x).map(|(q, x)| q * x).sum();
        let quadratic: f64 = self
            .p
            .iter()
            .map(|&(i, j, v)| {
                let factor = if i == j { 0.5 } else { 1. };
                factor * v * x[i] * x[j]
            })
            .sum();
        quadratic + linear + self.objective_constant
    }

    /// Converts an objective in minimisation form to the direction of the model
    pub fn user_objective(&self, min_objective: f64) -> f64 {
        match self.direction {
            ObjectiveDirection::Minimisation => min_objective,
            ObjectiveDirection::Maximisation => -min_objective,
        }
    }

    /// Maps the multipliers of the rows back to the elements of each constraint,
    /// with the sign of the model's objective direction
    pub(crate) fn constraint_duals(&self, z: &[f64]) -> Vec<Vec<f64>> {
        let sign = match self.direction {
            ObjectiveDirection::Minimisation => 1.,
            ObjectiveDirection::Maximisation => -1.,
        };
        let mut duals: Vec<Vec<f64>> = self
            .constraint_sizes
            .iter()
            .map(|&size| vec![0.; size])
            .collect();
        for (row, &z) in self.rows.iter().zip(z) {
            for &(constraint, element, coefficient) in &row.origins {
                duals[constraint][element] += sign * coefficient * z;
            }
        }
        duals
    }
}

/// Checks that the symmetric matrix whose upper triangle is given as triplets
/// is positive semidefinite, with an LDLᵀ elimination restricted to the
/// columns it uses.
fn is_positive_semidefinite(upper: &[(usize, usize, f64)]) -> bool {
    if upper.iter().all(|&(i, j, _)| i == j) {
        return upper.iter().all(|&(_, _, v)| v >= 0.);
    }
    let mut used: Vec<usize> = upper.iter().flat_map(|&(i, j, _)| [i, j]).collect();
    used.sort_unstable();
    used.dedup();
    let position = |c: usize| used.binary_search(&c).unwrap_or_default();
    let m = used.len();
    let mut a = vec![vec![0.; m]; m];
    for &(i, j, v) in upper {
        let (i, j) = (position(i), position(j));
        a[i][j] += v;
        if i != j {
            a[j][i] += v;
        }
    }
    let scale = a
        .iter()
        .enumerate()
        .map(|(k, row)| row[k].abs())
        .fold(1., f64::max);
    let tolerance = 1e-10 * scale;
    let coupling = 1e-5 * scale;
    for k in 0..m {
        let pivot = a[k][k];
        if pivot < -tolerance {
            return false;
        }
        if pivot <= tolerance {
            // a zero pivot needs a zero column
            if (k + 1..m).any(|i| a[i][k].abs() > coupling) {
                return false;
            }
            continue;
        }
        for i in k + 1..m {
            let factor = a[i][k] / pivot;
            if factor == 0. {
                continue;
            }
            for j in k + 1..m {
                a[i][j] -= factor * a[k][j];
            }
        }
    }
    true
}

impl RowBlocks {
    fn push_constraint(
        &mut self,
        index: usize,
        constraint: &Constraint,
    ) -> Result<(), ResolutionError> {
        let expression = &constraint.expression;
        let elements = expression.elements();
        let size = elements.len();
        match &constraint.domain {
            Domain::QuadraticCone | Domain::RotatedQuadraticCone => {
                let dim = expression.shape().last_dim();
                if dim == 0 {
                    return Ok(());
                }
                let rotated = constraint.domain == Domain::RotatedQuadraticCone;
                for first in (0..size).step_by(dim) {
                    let rows: Vec<Row> = if rotated {
                        // (x1 + x2, x1 - x2, √2 x3, ...) is in the second order cone
                        let (a, b) = (first, first + 1);
                        let mut rows = vec![
                            Row::new(elements, index, &[(a, 1.), (b, 1.)], 0.),
                            Row::new(elements, index, &[(a, 1.), (b, -1.)], 0.),
                        ];
                        rows.extend(
                            (first + 2..first + dim)
                                .map(|e| Row::new(elements, index, &[(e, SQRT_2)], 0.)),
                        );
                        rows
                    } else {
                        (first..first + dim)
                            .map(|e| Row::new(elements, index, &[(e, 1.)], 0.))
                            .collect()
                    };
                    if dim == 1 {
                        self.nonnegative.extend(rows);
                    } else {
                        self.conic.push((Cone::SecondOrder(dim), rows));
                    }
                }
            }
            Domain::PsdCone => {
                let n = expression.shape().rows();
                let mut rows = Vec::with_capacity(n * (n + 1) / 2);
                for j in 0..n {
                    for i in 0..=j {
                        let parts: Vec<(usize, f64)> = if i == j {
                            vec![(i * n + i, 1.)]
                        } else {
                            // √2 times the symmetric part
                            vec![(i * n + j, SQRT_2 / 2.), (j * n + i, SQRT_2 / 2.)]
                        };
                        rows.push(Row::new(elements, index, &parts, 0.));
                    }
                }
                self.conic.push((Cone::PsdTriangle(n), rows));
            }
            Domain::Integral(_) => {
                return Err(ResolutionError::InvalidModel(
                    "integrality cannot be used in a constraint".to_string(),
                ))
            }
            linear => {
                let bounds = linear.element_bounds(size).ok_or_else(|| {
                    ResolutionError::InvalidModel(format!("unsupported domain {:?}", linear))
                })?;
                for (element, (lower, upper)) in bounds.into_iter().enumerate() {
                    if lower == upper {
                        self.zero
                            .push(Row::new(elements, index, &[(element, 1.)], -lower));
                        continue;
                    }
                    if lower.is_finite() {
                        self.nonnegative
                            .push(Row::new(elements, index, &[(element, 1.)], -lower));
                    }
                    if upper.is_finite() {
                        self.nonnegative
                            .push(Row::new(elements, index, &[(element, -1.)], upper));
                    }
                }
            }
        }
        Ok(())
    }
}
