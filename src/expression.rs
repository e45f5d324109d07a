//! Shaped affine expressions.
//!
//! An [Expression] is an array of scalar [AffineExpression]s with a [Shape].
//! Expressions are immutable: every operation returns a new expression, and
//! operations on incompatible shapes fail with [BuildError::ShapeMismatch]
//! instead of truncating or padding.
use std::fmt::{Debug, Formatter};
use std::ops::{Mul, Neg};

use crate::affine::AffineExpression;
use crate::constraint::Constraint;
use crate::domain::{Domain, Rhs};
use crate::error::BuildError;
use crate::matrix::Matrix;
use crate::quadratic_expression::QuadraticExpression;
use crate::shape::Shape;
use crate::variable::Variable;

/// An array of affine expressions, such as `A x + b`
///
/// ```
/// # use good_conic::{variable, Expression, Matrix, Model};
/// let mut model = Model::new("example");
/// let x = model.add(variable().shape(3)).unwrap();
/// let a = Matrix::from_rows(&[[1., 2., 0.], [0., 1., 1.]]).unwrap();
/// let ax_plus_b = a.mul(&x.expr()).unwrap().add(vec![1., 2.]).unwrap();
/// assert_eq!(ax_plus_b.shape().dims(), &[2]);
/// assert_eq!(ax_plus_b.eval_with(&[1., 1., 1.]), vec![4., 4.]);
/// ```
#[derive(Clone, PartialEq)]
pub struct Expression {
    shape: Shape,
    elements: Vec<AffineExpression>,
}

impl Expression {
    /// Build an expression from its elements, in row-major order
    pub fn from_elements<S: Into<Shape>>(
        shape: S,
        elements: Vec<AffineExpression>,
    ) -> Result<Self, BuildError> {
        let shape = shape.into();
        if shape.size() != elements.len() {
            return Err(BuildError::shape_mismatch(
                "expression elements",
                shape.size(),
                elements.len(),
            ));
        }
        Ok(Expression { shape, elements })
    }

    /// A constant expression with the given row-major values
    pub fn constant<S: Into<Shape>>(shape: S, values: &[f64]) -> Result<Self, BuildError> {
        Self::from_elements(shape, values.iter().map(|&v| v.into()).collect())
    }

    /// A constant expression where every element has the same value
    pub fn filled<S: Into<Shape>>(shape: S, value: f64) -> Self {
        let shape = shape.into();
        let elements = vec![AffineExpression::from(value); shape.size()];
        Expression { shape, elements }
    }

    pub fn zeros<S: Into<Shape>>(shape: S) -> Self {
        Self::filled(shape, 0.)
    }

    pub fn ones<S: Into<Shape>>(shape: S) -> Self {
        Self::filled(shape, 1.)
    }

    /// A scalar constant
    pub fn scalar(value: f64) -> Self {
        Self::filled(Shape::scalar(), value)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Number of elements
    pub fn size(&self) -> usize {
        self.elements.len()
    }

    pub fn elements(&self) -> &[AffineExpression] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<AffineExpression> {
        self.elements
    }

    /// Evaluate every element with the given column values
    pub fn eval_with(&self, values: &[f64]) -> Vec<f64> {
        self.elements.iter().map(|e| e.eval_with(values)).collect()
    }

    pub(crate) fn max_column(&self) -> Option<usize> {
        self.elements
            .iter()
            .filter_map(|e| e.linear.max_column())
            .max()
    }

    fn zip_with<F>(&self, rhs: &Expression, operation: &str, f: F) -> Result<Self, BuildError>
    where
        F: Fn(&AffineExpression, &AffineExpression) -> AffineExpression,
    {
        let elements = if self.shape == rhs.shape {
            self.elements
                .iter()
                .zip(&rhs.elements)
                .map(|(a, b)| f(a, b))
                .collect()
        } else if rhs.shape.is_scalar() {
            self.elements.iter().map(|a| f(a, &rhs.elements[0])).collect()
        } else if self.shape.is_scalar() {
            rhs.elements.iter().map(|b| f(&self.elements[0], b)).collect()
        } else {
            return Err(BuildError::shape_mismatch(operation, &self.shape, &rhs.shape));
        };
        let shape = if self.shape.is_scalar() {
            rhs.shape.clone()
        } else {
            self.shape.clone()
        };
        Ok(Expression { shape, elements })
    }

    /// Element-wise sum. A scalar operand is added to every element.
    pub fn add<E: Into<Expression>>(&self, rhs: E) -> Result<Self, BuildError> {
        self.zip_with(&rhs.into(), "add", |a, b| {
            let mut sum = a.clone();
            sum.add_mul(1., b);
            sum
        })
    }

    /// Element-wise difference. A scalar operand is subtracted from every element.
    pub fn sub<E: Into<Expression>>(&self, rhs: E) -> Result<Self, BuildError> {
        self.zip_with(&rhs.into(), "sub", |a, b| {
            let mut difference = a.clone();
            difference.add_mul(-1., b);
            difference
        })
    }

    /// Multiply every element by a constant
    pub fn scale(&self, factor: f64) -> Self {
        Expression {
            shape: self.shape.clone(),
            elements: self.elements.iter().map(|e| e.clone() * factor).collect(),
        }
    }

    /// Element-wise product with constants of the same size, in row-major order
    pub fn mul_elm(&self, coefficients: &[f64]) -> Result<Self, BuildError> {
        if coefficients.len() != self.size() {
            return Err(BuildError::shape_mismatch(
                "mul_elm",
                self.size(),
                coefficients.len(),
            ));
        }
        Ok(Expression {
            shape: self.shape.clone(),
            elements: self
                .elements
                .iter()
                .zip(coefficients)
                .map(|(e, &c)| e.clone() * c)
                .collect(),
        })
    }

    /// The scalar `Σ cᵢ eᵢ`
    pub fn dot(&self, coefficients: &[f64]) -> Result<Self, BuildError> {
        if coefficients.len() != self.size() {
            return Err(BuildError::shape_mismatch("dot", self.size(), coefficients.len()));
        }
        let mut total = AffineExpression::with_capacity(self.size());
        for (e, &c) in self.elements.iter().zip(coefficients) {
            total.add_mul(c, e);
        }
        Ok(total.into())
    }

    /// The scalar sum of all elements
    pub fn sum(&self) -> Self {
        self.elements.iter().sum::<AffineExpression>().into()
    }

    /// The product `self · m`. A vector is treated as a single row.
    pub fn mul_matrix(&self, m: &Matrix) -> Result<Self, BuildError> {
        let (rows, inner) = match self.shape.dims() {
            [k] => (1, *k),
            [p, k] => (*p, *k),
            _ => return Err(BuildError::shape_mismatch("mul_matrix", m.shape(), &self.shape)),
        };
        if inner != m.rows() {
            return Err(BuildError::shape_mismatch(
                "mul_matrix",
                format!("{} rows in the matrix", inner),
                m.rows(),
            ));
        }
        let n = m.cols();
        let mut elements = vec![AffineExpression::default(); rows * n];
        for (l, j, v) in m.entries() {
            for i in 0..rows {
                elements[i * n + j].add_mul(v, &self.elements[i * inner + l]);
            }
        }
        let shape = if self.shape.is_vector() {
            Shape::vector(n)
        } else {
            Shape::matrix(rows, n)
        };
        Ok(Expression { shape, elements })
    }

    /// The diagonal of `self · m`, without computing the other elements.
    /// `self` is `p x k` and `m` is `k x p`.
    pub fn mul_diag(&self, m: &Matrix) -> Result<Self, BuildError> {
        let expected = Shape::matrix(m.cols(), m.rows());
        if self.shape != expected {
            return Err(BuildError::shape_mismatch("mul_diag", &expected, &self.shape));
        }
        let inner = m.rows();
        let mut elements = vec![AffineExpression::default(); m.cols()];
        for (l, j, v) in m.entries() {
            elements[j].add_mul(v, &self.elements[j * inner + l]);
        }
        Ok(Expression {
            shape: Shape::vector(m.cols()),
            elements,
        })
    }

    /// Concatenates expressions along the first dimension.
    /// Scalars count as vectors of length 1.
    ///
    /// ```
    /// # use good_conic::Expression;
    /// let stacked = Expression::vstack(&[Expression::scalar(1.), vec![2., 3.].into()]).unwrap();
    /// assert_eq!(stacked.eval_with(&[]), vec![1., 2., 3.]);
    /// ```
    pub fn vstack(parts: &[Expression]) -> Result<Self, BuildError> {
        let first = parts
            .first()
            .ok_or_else(|| BuildError::ShapeMismatch("nothing to stack".to_string()))?;
        let trailing = |e: &Expression| -> Vec<usize> {
            e.shape.dims().iter().skip(1).copied().collect()
        };
        let ndim = first.shape.ndim().max(1);
        let tail = trailing(first);
        let mut leading = 0;
        let mut elements = Vec::with_capacity(parts.iter().map(|p| p.size()).sum());
        for part in parts {
            if part.shape.ndim().max(1) != ndim || trailing(part) != tail {
                return Err(BuildError::shape_mismatch("vstack", &first.shape, &part.shape));
            }
            leading += part.shape.rows();
            elements.extend(part.elements.iter().cloned());
        }
        let mut dims = vec![leading];
        dims.extend(tail);
        Ok(Expression {
            shape: dims.into(),
            elements,
        })
    }

    /// Concatenates expressions along the second dimension.
    /// Vectors count as single columns and scalars as 1x1 matrices.
    ///
    /// ```
    /// # use good_conic::Expression;
    /// let stacked = Expression::hstack(&[vec![1., 2.].into(), vec![3., 4.].into()]).unwrap();
    /// assert_eq!(stacked.shape().dims(), &[2, 2]);
    /// assert_eq!(stacked.eval_with(&[]), vec![1., 3., 2., 4.]);
    /// ```
    pub fn hstack(parts: &[Expression]) -> Result<Self, BuildError> {
        let first = parts
            .first()
            .ok_or_else(|| BuildError::ShapeMismatch("nothing to stack".to_string()))?;
        let rows = first.shape.rows();
        let mut widths = Vec::with_capacity(parts.len());
        for part in parts {
            if part.shape.ndim() > 2 || part.shape.rows() != rows {
                return Err(BuildError::shape_mismatch("hstack", &first.shape, &part.shape));
            }
            widths.push(part.shape.cols());
        }
        let cols: usize = widths.iter().sum();
        let mut elements = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for (part, &width) in parts.iter().zip(&widths) {
                elements.extend(part.elements[i * width..(i + 1) * width].iter().cloned());
            }
        }
        Ok(Expression {
            shape: Shape::matrix(rows, cols),
            elements,
        })
    }

    /// Stacks expressions of the same shape along a new leading dimension
    pub fn stack(parts: &[Expression]) -> Result<Self, BuildError> {
        let first = parts
            .first()
            .ok_or_else(|| BuildError::ShapeMismatch("nothing to stack".to_string()))?;
        let mut elements = Vec::with_capacity(parts.len() * first.size());
        for part in parts {
            if part.shape != first.shape {
                return Err(BuildError::shape_mismatch("stack", &first.shape, &part.shape));
            }
            elements.extend(part.elements.iter().cloned());
        }
        let mut dims = vec![parts.len()];
        dims.extend_from_slice(first.shape.dims());
        Ok(Expression {
            shape: dims.into(),
            elements,
        })
    }

    /// Reverses the dimensions. A vector becomes a single row matrix.
    pub fn transpose(&self) -> Self {
        let shape = self.shape.transpose();
        if self.shape.ndim() < 2 {
            return Expression {
                shape,
                elements: self.elements.clone(),
            };
        }
        let mut elements = vec![AffineExpression::default(); self.size()];
        for (offset, element) in self.elements.iter().enumerate() {
            let mut index = self.shape.unravel(offset);
            index.reverse();
            if let Some(target) = shape.offset(&index) {
                elements[target] = element.clone();
            }
        }
        Expression { shape, elements }
    }

    /// The diagonal of a square matrix, as a vector
    pub fn diag(&self) -> Result<Self, BuildError> {
        if !self.shape.is_matrix() || self.shape.rows() != self.shape.cols() {
            return Err(BuildError::shape_mismatch("diag", "a square matrix", &self.shape));
        }
        let n = self.shape.rows();
        Ok(Expression {
            shape: Shape::vector(n),
            elements: (0..n).map(|i| self.elements[i * n + i].clone()).collect(),
        })
    }

    /// The sub-array between `start` (inclusive) and `end` (exclusive) indices
    ///
    /// ```
    /// # use good_conic::Expression;
    /// let e = Expression::constant((2, 3), &[1., 2., 3., 4., 5., 6.]).unwrap();
    /// let s = e.slice(&[0, 1], &[2, 3]).unwrap();
    /// assert_eq!(s.eval_with(&[]), vec![2., 3., 5., 6.]);
    /// ```
    pub fn slice(&self, start: &[usize], end: &[usize]) -> Result<Self, BuildError> {
        let (shape, offsets) = slice_offsets(&self.shape, start, end)?;
        let elements = offsets
            .into_iter()
            .map(|offset| self.elements[offset].clone())
            .collect();
        Ok(Expression { shape, elements })
    }

    /// The scalar element at a multi-dimensional index
    pub fn index(&self, index: &[usize]) -> Result<Self, BuildError> {
        let offset = element_offset(&self.shape, index)?;
        Ok(self.elements[offset].clone().into())
    }

    /// The same elements with another shape of the same size
    pub fn reshape<S: Into<Shape>>(&self, shape: S) -> Result<Self, BuildError> {
        let shape = shape.into();
        if shape.size() != self.size() {
            return Err(BuildError::shape_mismatch("reshape", &self.shape, &shape));
        }
        Ok(Expression {
            shape,
            elements: self.elements.clone(),
        })
    }

    /// The elements as a vector, in row-major order
    pub fn flatten(&self) -> Self {
        Expression {
            shape: Shape::vector(self.size()),
            elements: self.elements.clone(),
        }
    }

    /// `times` copies stacked along the first dimension.
    /// A scalar becomes a vector of length `times`.
    pub fn repeat(&self, times: usize) -> Self {
        let mut dims = self.shape.dims().to_vec();
        match dims.first_mut() {
            Some(leading) => *leading *= times,
            None => dims.push(times),
        }
        let mut elements = Vec::with_capacity(self.size() * times);
        for _ in 0..times {
            elements.extend(self.elements.iter().cloned());
        }
        Expression {
            shape: dims.into(),
            elements,
        }
    }

    /// Repeats this expression to fill a larger shape whose trailing dimensions
    /// are the dimensions of this expression
    pub fn broadcast_to<S: Into<Shape>>(&self, shape: S) -> Result<Self, BuildError> {
        let shape = shape.into();
        if !shape.dims().ends_with(self.shape.dims()) {
            return Err(BuildError::shape_mismatch("broadcast", &shape, &self.shape));
        }
        let size = self.size();
        let elements = (0..shape.size())
            .map(|offset| self.elements[offset % size].clone())
            .collect();
        Ok(Expression { shape, elements })
    }

    /// `(E + Eᵀ) / 2` for a square matrix
    pub(crate) fn symmetric_part(&self) -> Self {
        let n = self.shape.rows();
        let mut elements = Vec::with_capacity(self.size());
        for i in 0..n {
            for j in 0..n {
                let mut e = self.elements[i * n + j].clone() * 0.5;
                e.add_mul(0.5, &self.elements[j * n + i]);
                elements.push(e);
            }
        }
        Expression {
            shape: self.shape.clone(),
            elements,
        }
    }

    /// The product of two scalar expressions
    pub fn product(&self, other: &Expression) -> Result<QuadraticExpression, BuildError> {
        match (self.elements.as_slice(), other.elements.as_slice()) {
            ([a], [b]) => Ok(QuadraticExpression::product(a, b)),
            _ => Err(BuildError::shape_mismatch(
                "product",
                "two scalars",
                format!("{} and {}", self.shape, other.shape),
            )),
        }
    }

    /// `Σ eᵢ²`
    pub fn sum_squares(&self) -> QuadraticExpression {
        let mut total = QuadraticExpression::new();
        for e in &self.elements {
            total += QuadraticExpression::product(e, e);
        }
        total
    }

    /// Creates a constraint indicating that every element
    /// is lesser than or equal to the right hand side
    pub fn leq<R: Into<Rhs>>(self, rhs: R) -> Constraint {
        Constraint::new(self, Domain::LessThan(rhs.into()))
    }

    /// Creates a constraint indicating that every element
    /// is greater than or equal to the right hand side
    pub fn geq<R: Into<Rhs>>(self, rhs: R) -> Constraint {
        Constraint::new(self, Domain::GreaterThan(rhs.into()))
    }

    /// Creates a constraint indicating that every element
    /// is equal to the right hand side
    pub fn eq<R: Into<Rhs>>(self, rhs: R) -> Constraint {
        Constraint::new(self, Domain::EqualTo(rhs.into()))
    }

    /// Creates a constraint restricting this expression to a domain
    pub fn in_domain(self, domain: Domain) -> Constraint {
        Constraint::new(self, domain)
    }
}

/// The row-major offset of an index, or an error when it is out of bounds
pub(crate) fn element_offset(shape: &Shape, index: &[usize]) -> Result<usize, BuildError> {
    shape.offset(index).ok_or_else(|| {
        BuildError::ShapeMismatch(format!(
            "index {:?} is out of the bounds of shape {}",
            index, shape
        ))
    })
}

/// The shape of the sub-array between `start` and `end`, and the offsets of its elements
pub(crate) fn slice_offsets(
    shape: &Shape,
    start: &[usize],
    end: &[usize],
) -> Result<(Shape, Vec<usize>), BuildError> {
    let dims = shape.dims();
    if start.len() != dims.len() || end.len() != dims.len() {
        return Err(BuildError::shape_mismatch(
            "slice",
            format!("{} indices", dims.len()),
            format!("{} and {}", start.len(), end.len()),
        ));
    }
    for ((&s, &e), &d) in start.iter().zip(end).zip(dims) {
        if s > e || e > d {
            return Err(BuildError::ShapeMismatch(format!(
                "slice {:?}..{:?} is out of the bounds of shape {}",
                start, end, shape
            )));
        }
    }
    let sliced: Shape = start
        .iter()
        .zip(end)
        .map(|(&s, &e)| e - s)
        .collect::<Vec<_>>()
        .into();
    let mut offsets = Vec::with_capacity(sliced.size());
    for offset in 0..sliced.size() {
        let mut index = sliced.unravel(offset);
        for (i, &s) in index.iter_mut().zip(start) {
            *i += s;
        }
        offsets.push(element_offset(shape, &index)?);
    }
    Ok((sliced, offsets))
}

impl Matrix {
    /// The product `self · e`. A vector is treated as a single column.
    pub fn mul(&self, e: &Expression) -> Result<Expression, BuildError> {
        let (inner, n) = match e.shape.dims() {
            [k] => (*k, 1),
            [k, n] => (*k, *n),
            _ => return Err(BuildError::shape_mismatch("matrix product", self.shape(), &e.shape)),
        };
        if inner != self.cols() {
            return Err(BuildError::shape_mismatch(
                "matrix product",
                format!("{} rows in the expression", self.cols()),
                inner,
            ));
        }
        let m = self.rows();
        let mut elements = vec![AffineExpression::default(); m * n];
        for (i, l, v) in self.entries() {
            for j in 0..n {
                elements[i * n + j].add_mul(v, &e.elements[l * n + j]);
            }
        }
        let shape = if e.shape.is_vector() {
            Shape::vector(m)
        } else {
            Shape::matrix(m, n)
        };
        Ok(Expression { shape, elements })
    }

    /// The diagonal of `self · e`, without computing the other elements
    pub fn mul_diag(&self, e: &Expression) -> Result<Expression, BuildError> {
        let expected = Shape::matrix(self.cols(), self.rows());
        if e.shape != expected {
            return Err(BuildError::shape_mismatch("mul_diag", &expected, &e.shape));
        }
        let m = self.rows();
        let mut elements = vec![AffineExpression::default(); m];
        for (i, l, v) in self.entries() {
            elements[i].add_mul(v, &e.elements[l * m + i]);
        }
        Ok(Expression {
            shape: Shape::vector(m),
            elements,
        })
    }
}

impl Default for Expression {
    fn default() -> Self {
        Expression::scalar(0.)
    }
}

impl Debug for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Expression{} ", self.shape)?;
        f.debug_list().entries(&self.elements).finish()
    }
}

impl From<AffineExpression> for Expression {
    fn from(e: AffineExpression) -> Self {
        Expression {
            shape: Shape::scalar(),
            elements: vec![e],
        }
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Expression::scalar(value)
    }
}

impl From<Vec<f64>> for Expression {
    fn from(values: Vec<f64>) -> Self {
        Expression {
            shape: Shape::vector(values.len()),
            elements: values.into_iter().map(AffineExpression::from).collect(),
        }
    }
}

impl From<&[f64]> for Expression {
    fn from(values: &[f64]) -> Self {
        values.to_vec().into()
    }
}

impl From<&Variable> for Expression {
    fn from(var: &Variable) -> Self {
        Expression {
            shape: var.shape().clone(),
            elements: var.columns().map(AffineExpression::column).collect(),
        }
    }
}

impl From<Variable> for Expression {
    fn from(var: Variable) -> Self {
        Expression::from(&var)
    }
}

impl From<&Expression> for Expression {
    fn from(e: &Expression) -> Self {
        e.clone()
    }
}

impl Mul<f64> for Expression {
    type Output = Expression;
    fn mul(self, rhs: f64) -> Self::Output {
        self.scale(rhs)
    }
}

impl Mul<Expression> for f64 {
    type Output = Expression;
    fn mul(self, rhs: Expression) -> Self::Output {
        rhs.scale(self)
    }
}

impl Mul<f64> for &Variable {
    type Output = Expression;
    fn mul(self, rhs: f64) -> Self::Output {
        self.expr().scale(rhs)
    }
}

impl Mul<&Variable> for f64 {
    type Output = Expression;
    fn mul(self, rhs: &Variable) -> Self::Output {
        rhs.expr().scale(self)
    }
}

impl Neg for Expression {
    type Output = Expression;
    fn neg(self) -> Self::Output {
        self.scale(-1.)
    }
}

impl Neg for &Variable {
    type Output = Expression;
    fn neg(self) -> Self::Output {
        self.expr().scale(-1.)
    }
}
