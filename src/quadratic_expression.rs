//! Scalar quadratic expressions, used as objectives.
use std::fmt::{Debug, Formatter};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use fnv::FnvHashMap as HashMap;

use crate::affine::AffineExpression;
use crate::error::BuildError;
use crate::expression::Expression;
use crate::variable::Variable;

/// Represents a pair of columns in a quadratic term
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct ColumnPair {
    /// The smaller column of the pair
    pub first: usize,
    /// The larger column of the pair
    pub second: usize,
}

impl ColumnPair {
    /// Create a new pair, ensuring consistent ordering for commutativity (x*y = y*x)
    pub fn new(a: usize, b: usize) -> Self {
        if a <= b {
            ColumnPair {
                first: a,
                second: b,
            }
        } else {
            ColumnPair {
                first: b,
                second: a,
            }
        }
    }
}

/// A complete quadratic expression containing quadratic, linear, and constant terms,
/// such as `x² + 2xy - 3y + 1`
#[derive(Clone, Default, PartialEq)]
pub struct QuadraticExpression {
    pub(crate) quadratic: HashMap<ColumnPair, f64>,
    pub(crate) affine: AffineExpression,
}

impl QuadraticExpression {
    /// Create a new empty quadratic expression
    pub fn new() -> Self {
        Self::default()
    }

    /// The product of two scalar affine expressions
    pub fn product(a: &AffineExpression, b: &AffineExpression) -> Self {
        let mut result = QuadraticExpression::new();
        for (&i, &ci) in &a.linear.coefficients {
            for (&j, &cj) in &b.linear.coefficients {
                result.add_quadratic_term(i, j, ci * cj);
            }
        }
        result.affine.add_mul(b.constant, a);
        result.affine.add_mul(a.constant, b);
        // both add_mul calls added the product of the constants
        result.affine.constant -= a.constant * b.constant;
        result
    }

    /// Add `coefficient * column_a * column_b`
    pub fn add_quadratic_term(&mut self, column_a: usize, column_b: usize, coefficient: f64) {
        *self
            .quadratic
            .entry(ColumnPair::new(column_a, column_b))
            .or_default() += coefficient;
    }

    /// The affine part of this expression
    pub fn affine(&self) -> &AffineExpression {
        &self.affine
    }

    /// The non-zero quadratic terms, sorted by column pair
    pub fn quadratic_terms(&self) -> Vec<(ColumnPair, f64)> {
        let mut terms: Vec<_> = self
            .quadratic
            .iter()
            .filter(|(_, c)| **c != 0.)
            .map(|(&p, &c)| (p, c))
            .collect();
        terms.sort_unstable_by_key(|&(p, _)| p);
        terms
    }

    /// Returns true if this expression contains no quadratic terms
    pub fn is_affine(&self) -> bool {
        self.quadratic.values().all(|&c| c == 0.)
    }

    pub(crate) fn max_column(&self) -> Option<usize> {
        let quadratic = self.quadratic.keys().map(|p| p.second).max();
        quadratic.max(self.affine.linear.max_column())
    }

    /// Evaluate the expression with the given column values
    pub fn eval_with(&self, values: &[f64]) -> f64 {
        let value = |c: usize| values.get(c).copied().unwrap_or(0.);
        self.quadratic
            .iter()
            .map(|(p, &c)| c * value(p.first) * value(p.second))
            .sum::<f64>()
            + self.affine.eval_with(values)
    }
}

impl Debug for QuadraticExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (pair, coeff) in self.quadratic_terms() {
            if (coeff - 1.).abs() > f64::EPSILON {
                write!(f, "{} ", coeff)?;
            }
            write!(f, "c{}*c{} + ", pair.first, pair.second)?;
        }
        write!(f, "{:?}", self.affine)
    }
}

impl From<AffineExpression> for QuadraticExpression {
    fn from(affine: AffineExpression) -> Self {
        QuadraticExpression {
            quadratic: HashMap::default(),
            affine,
        }
    }
}

impl From<f64> for QuadraticExpression {
    fn from(constant: f64) -> Self {
        AffineExpression::from(constant).into()
    }
}

impl AddAssign<QuadraticExpression> for QuadraticExpression {
    fn add_assign(&mut self, rhs: QuadraticExpression) {
        for (pair, c) in rhs.quadratic {
            *self.quadratic.entry(pair).or_default() += c;
        }
        self.affine += rhs.affine;
    }
}

impl Add<QuadraticExpression> for QuadraticExpression {
    type Output = QuadraticExpression;
    fn add(mut self, rhs: QuadraticExpression) -> Self::Output {
        self += rhs;
        self
    }
}

impl Sub<QuadraticExpression> for QuadraticExpression {
    type Output = QuadraticExpression;
    fn sub(self, rhs: QuadraticExpression) -> Self::Output {
        self + (-rhs)
    }
}

impl Mul<f64> for QuadraticExpression {
    type Output = QuadraticExpression;
    fn mul(mut self, rhs: f64) -> Self::Output {
        for c in self.quadratic.values_mut() {
            *c *= rhs;
        }
        self.affine *= rhs;
        self
    }
}

impl Mul<QuadraticExpression> for f64 {
    type Output = QuadraticExpression;
    fn mul(self, rhs: QuadraticExpression) -> Self::Output {
        rhs * self
    }
}

impl Neg for QuadraticExpression {
    type Output = QuadraticExpression;
    fn neg(self) -> Self::Output {
        self * -1.
    }
}

/// Anything that can be used as the objective of a model: a scalar affine or
/// quadratic expression
pub trait IntoObjective {
    /// Convert to a quadratic expression, checking that it is a scalar
    fn into_objective(self) -> Result<QuadraticExpression, BuildError>;
}

impl IntoObjective for QuadraticExpression {
    fn into_objective(self) -> Result<QuadraticExpression, BuildError> {
        Ok(self)
    }
}

impl IntoObjective for AffineExpression {
    fn into_objective(self) -> Result<QuadraticExpression, BuildError> {
        Ok(self.into())
    }
}

impl IntoObjective for f64 {
    fn into_objective(self) -> Result<QuadraticExpression, BuildError> {
        Ok(self.into())
    }
}

impl IntoObjective for Expression {
    fn into_objective(self) -> Result<QuadraticExpression, BuildError> {
        if self.size() != 1 {
            return Err(BuildError::shape_mismatch(
                "objective",
                "a scalar expression",
                self.shape(),
            ));
        }
        let mut elements = self.into_elements();
        Ok(elements.remove(0).into())
    }
}

impl IntoObjective for &Expression {
    fn into_objective(self) -> Result<QuadraticExpression, BuildError> {
        self.clone().into_objective()
    }
}

impl IntoObjective for &Variable {
    fn into_objective(self) -> Result<QuadraticExpression, BuildError> {
        self.expr().into_objective()
    }
}
