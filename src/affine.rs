//! Scalar affine expressions over solver columns.
//!
//! Each element of a shaped [Expression](crate::Expression) is an
//! [AffineExpression]: a sparse linear combination of the model's scalar
//! columns plus a constant.
use std::fmt::{Debug, Formatter};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

use fnv::FnvHashMap as HashMap;

/// A linear expression without a constant component
#[derive(Clone, Default, PartialEq)]
pub struct LinearExpression {
    pub(crate) coefficients: HashMap<usize, f64>,
}

impl LinearExpression {
    /// Create an empty linear expression
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty linear expression with room for `capacity` terms
    pub fn with_capacity(capacity: usize) -> Self {
        LinearExpression {
            coefficients: HashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// The coefficient of a column (0 if the column does not appear)
    pub fn coefficient(&self, column: usize) -> f64 {
        self.coefficients.get(&column).copied().unwrap_or(0.)
    }

    /// Number of stored terms
    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// Iterates over (column, coefficient) pairs, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.coefficients.iter().map(|(&c, &v)| (c, v))
    }

    /// The non-zero terms sorted by column
    pub fn sorted_terms(&self) -> Vec<(usize, f64)> {
        let mut terms: Vec<(usize, f64)> = self.iter().filter(|&(_, v)| v != 0.).collect();
        terms.sort_unstable_by_key(|&(c, _)| c);
        terms
    }

    /// The largest column referenced by this expression
    pub fn max_column(&self) -> Option<usize> {
        self.coefficients.keys().copied().max()
    }

    #[inline]
    pub(crate) fn add_term(&mut self, column: usize, coefficient: f64) {
        *self.coefficients.entry(column).or_default() += coefficient;
    }

    /// Evaluate the expression with the given column values
    pub fn eval_with(&self, values: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .map(|(&c, &v)| v * values.get(c).copied().unwrap_or(0.))
            .sum()
    }
}

impl Debug for LinearExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        format_terms(f, &self.sorted_terms())
    }
}

fn format_terms(f: &mut Formatter<'_>, terms: &[(usize, f64)]) -> std::fmt::Result {
    let mut first = true;
    for &(column, coeff) in terms {
        if first {
            first = false;
        } else {
            write!(f, " + ")?;
        }
        if (coeff - 1.).abs() > f64::EPSILON {
            write!(f, "{} ", coeff)?;
        }
        write!(f, "c{}", column)?;
    }
    if first {
        write!(f, "0")?;
    }
    Ok(())
}

/// Represents an affine expression, such as `2x + 3` or `x + y + z`,
/// where x, y and z are scalar columns of the model
#[derive(Clone, Default, PartialEq)]
pub struct AffineExpression {
    pub(crate) linear: LinearExpression,
    pub(crate) constant: f64,
}

impl AffineExpression {
    /// Create an expression that has the value 0, but has memory allocated
    /// for `capacity` coefficients.
    pub fn with_capacity(capacity: usize) -> Self {
        AffineExpression {
            linear: LinearExpression::with_capacity(capacity),
            constant: 0.,
        }
    }

    /// The expression `1 * column`
    pub fn column(column: usize) -> Self {
        let mut expr = Self::with_capacity(1);
        expr.linear.add_term(column, 1.);
        expr
    }

    /// The linear part of the expression
    pub fn linear(&self) -> &LinearExpression {
        &self.linear
    }

    /// The constant part of the expression
    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// True if no column has a non-zero coefficient
    pub fn is_constant(&self) -> bool {
        self.linear.coefficients.values().all(|&v| v == 0.)
    }

    /// Performs self = self + (factor * other)
    #[inline]
    pub fn add_mul(&mut self, factor: f64, other: &AffineExpression) {
        if factor == 0. {
            return;
        }
        for (&column, &value) in &other.linear.coefficients {
            self.linear.add_term(column, factor * value);
        }
        self.constant += factor * other.constant;
    }

    /// Add a linear term to this expression
    pub fn add_term(&mut self, column: usize, coefficient: f64) {
        self.linear.add_term(column, coefficient);
    }

    /// Add a constant term to this expression
    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// Evaluate the expression with the given column values
    pub fn eval_with(&self, values: &[f64]) -> f64 {
        self.linear.eval_with(values) + self.constant
    }
}

impl Debug for AffineExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let terms = self.linear.sorted_terms();
        if terms.is_empty() {
            return write!(f, "{}", self.constant);
        }
        format_terms(f, &terms)?;
        if self.constant != 0. {
            write!(f, " + {}", self.constant)?;
        }
        Ok(())
    }
}

impl From<f64> for AffineExpression {
    fn from(constant: f64) -> Self {
        AffineExpression {
            linear: LinearExpression::default(),
            constant,
        }
    }
}

impl<'a> AddAssign<&'a AffineExpression> for AffineExpression {
    fn add_assign(&mut self, rhs: &'a AffineExpression) {
        self.add_mul(1., rhs)
    }
}

impl AddAssign<AffineExpression> for AffineExpression {
    fn add_assign(&mut self, rhs: AffineExpression) {
        *self += &rhs
    }
}

impl AddAssign<f64> for AffineExpression {
    fn add_assign(&mut self, rhs: f64) {
        self.constant += rhs
    }
}

impl SubAssign<AffineExpression> for AffineExpression {
    fn sub_assign(&mut self, rhs: AffineExpression) {
        self.add_mul(-1., &rhs)
    }
}

impl SubAssign<f64> for AffineExpression {
    fn sub_assign(&mut self, rhs: f64) {
        self.constant -= rhs
    }
}

impl MulAssign<f64> for AffineExpression {
    fn mul_assign(&mut self, rhs: f64) {
        self.constant *= rhs;
        for value in self.linear.coefficients.values_mut() {
            *value *= rhs;
        }
    }
}

impl Add<AffineExpression> for AffineExpression {
    type Output = AffineExpression;
    fn add(mut self, rhs: AffineExpression) -> Self::Output {
        self += rhs;
        self
    }
}

impl Add<f64> for AffineExpression {
    type Output = AffineExpression;
    fn add(mut self, rhs: f64) -> Self::Output {
        self += rhs;
        self
    }
}

impl Sub<AffineExpression> for AffineExpression {
    type Output = AffineExpression;
    fn sub(mut self, rhs: AffineExpression) -> Self::Output {
        self -= rhs;
        self
    }
}

impl Sub<f64> for AffineExpression {
    type Output = AffineExpression;
    fn sub(mut self, rhs: f64) -> Self::Output {
        self -= rhs;
        self
    }
}

impl Mul<f64> for AffineExpression {
    type Output = AffineExpression;
    fn mul(mut self, rhs: f64) -> Self::Output {
        self *= rhs;
        self
    }
}

impl Mul<AffineExpression> for f64 {
    type Output = AffineExpression;
    fn mul(self, mut rhs: AffineExpression) -> Self::Output {
        rhs *= self;
        rhs
    }
}

impl Div<f64> for AffineExpression {
    type Output = AffineExpression;
    fn div(mut self, rhs: f64) -> Self::Output {
        self *= 1. / rhs;
        self
    }
}

impl Neg for AffineExpression {
    type Output = AffineExpression;
    fn neg(mut self) -> Self::Output {
        self *= -1.;
        self
    }
}

impl Sum for AffineExpression {
    fn sum<I: Iterator<Item = AffineExpression>>(iter: I) -> Self {
        let mut total = AffineExpression::default();
        for expr in iter {
            total += expr;
        }
        total
    }
}

impl<'a> Sum<&'a AffineExpression> for AffineExpression {
    fn sum<I: Iterator<Item = &'a AffineExpression>>(iter: I) -> Self {
        let mut total = AffineExpression::default();
        for expr in iter {
            total += expr;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators() {
        let x = AffineExpression::column(0);
        let y = AffineExpression::column(1);
        let e = 2. * x.clone() + y * 3. - 4.;
        assert_eq!(e.linear().coefficient(0), 2.);
        assert_eq!(e.linear().coefficient(1), 3.);
        assert_eq!(e.constant(), -4.);
        assert_eq!(e.eval_with(&[1., 2.]), 4.);
        assert_eq!(-(x / 2.), AffineExpression::column(0) * -0.5);
    }

    #[test]
    fn debug_format_is_sorted() {
        let mut e = AffineExpression::from(1.5);
        e.add_term(3, 2.);
        e.add_term(0, 1.);
        assert_eq!(format!("{:?}", e), "c0 + 2 c3 + 1.5");
        assert_eq!(format!("{:?}", AffineExpression::default()), "0");
    }

    #[test]
    fn sum() {
        let total: AffineExpression = (0..4).map(AffineExpression::column).sum();
        assert_eq!(total.linear().len(), 4);
        assert_eq!(total.eval_with(&[1., 1., 1., 1.]), 4.);
    }
}
