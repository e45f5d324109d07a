//! A [Variable] is the base element used to create an [Expression].
//! The goal of the solver is to find optimal values for all variables in a model.
//!
//! Each variable is declared with a [VariableDefinition] that sets its shape,
//! its domain and its bounds.
use std::collections::Bound;
use std::ops::RangeBounds;

use crate::affine::AffineExpression;
use crate::domain::Domain;
use crate::error::BuildError;
use crate::expression::{element_offset, slice_offsets, Expression};
use crate::shape::Shape;

/// How the elements of a variable map to the scalar columns given to the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ColumnLayout {
    /// One column per element, in row-major order
    Dense { first: usize },
    /// A symmetric `n x n` matrix storing only its upper triangle, column by column.
    /// Elements (i, j) and (j, i) share a column.
    Symmetric { first: usize, n: usize },
}

impl ColumnLayout {
    pub(crate) fn column_count(&self, size: usize) -> usize {
        match *self {
            ColumnLayout::Dense { .. } => size,
            ColumnLayout::Symmetric { n, .. } => n * (n + 1) / 2,
        }
    }
}

/// A variable in a model. Use variables to create [expressions](Expression),
/// to express the [objective](crate::Model::maximise)
/// and the [constraints](crate::Constraint) of your model.
///
/// Variables are created using [Model::add](crate::Model::add) or
/// [Model::declare_variable](crate::Model::declare_variable).
///
/// ## Warning
/// `Eq` is implemented on this type, but
/// `v1 == v2` is true only if the two variables represent the same object,
/// not if they have the same definition.
///
/// ```
/// # use good_conic::{variable, Model};
/// let mut model = Model::new("m");
/// let v1 = model.add(variable().min(1).max(8)).unwrap();
/// let v2 = model.add(variable().min(1).max(8)).unwrap();
/// assert_ne!(v1, v2);
///
/// let v1_copy = v1.clone();
/// assert_eq!(v1, v1_copy);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    model: u64,
    index: usize,
    shape: Shape,
    layout: ColumnLayout,
}

impl Variable {
    pub(crate) fn new(model: u64, index: usize, shape: Shape, layout: ColumnLayout) -> Self {
        Variable {
            model,
            index,
            shape,
            layout,
        }
    }

    /// The position of this variable in its model
    pub fn index(&self) -> usize {
        self.index
    }

    /// Identifies the model that declared this variable
    pub(crate) fn model_id(&self) -> u64 {
        self.model
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Number of elements
    pub fn size(&self) -> usize {
        self.shape.size()
    }

    pub(crate) fn layout(&self) -> ColumnLayout {
        self.layout
    }

    /// Number of scalar columns used by this variable
    pub(crate) fn column_count(&self) -> usize {
        self.layout.column_count(self.size())
    }

    /// The column of the element at the given row-major offset
    pub(crate) fn column(&self, offset: usize) -> usize {
        match self.layout {
            ColumnLayout::Dense { first } => first + offset,
            ColumnLayout::Symmetric { first, n } => {
                let (i, j) = (offset / n, offset % n);
                let (lo, hi) = if i <= j { (i, j) } else { (j, i) };
                first + hi * (hi + 1) / 2 + lo
            }
        }
    }

    /// The columns of all elements, in row-major order
    pub(crate) fn columns(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.size()).map(move |offset| self.column(offset))
    }

    /// This variable as an expression
    pub fn expr(&self) -> Expression {
        Expression::from(self)
    }

    /// The element at a multi-dimensional index
    pub fn index_at(&self, index: &[usize]) -> Result<Expression, BuildError> {
        let offset = element_offset(&self.shape, index)?;
        Ok(AffineExpression::column(self.column(offset)).into())
    }

    /// The element at position i of a vector variable
    pub fn get(&self, i: usize) -> Result<Expression, BuildError> {
        self.index_at(&[i])
    }

    /// The sub-array between `start` (inclusive) and `end` (exclusive) indices
    pub fn slice(&self, start: &[usize], end: &[usize]) -> Result<Expression, BuildError> {
        let (shape, offsets) = slice_offsets(&self.shape, start, end)?;
        let elements = offsets
            .into_iter()
            .map(|offset| AffineExpression::column(self.column(offset)))
            .collect();
        Expression::from_elements(shape, elements)
    }
}

/// Defines the properties of a variable: name, shape, domain and bounds.
#[derive(Clone, PartialEq, Debug)]
pub struct VariableDefinition {
    pub(crate) name: Option<String>,
    pub(crate) shape: Shape,
    pub(crate) domain: Domain,
    pub(crate) min: f64,
    pub(crate) max: f64,
    pub(crate) is_integer: bool,
}

impl VariableDefinition {
    /// Creates an unbounded continuous scalar variable
    pub fn new() -> Self {
        VariableDefinition {
            name: None,
            shape: Shape::scalar(),
            domain: Domain::Free,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            is_integer: false,
        }
    }

    /// Set the name of the variable. Names must be unique in a model.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the shape of the variable
    ///
    /// ```
    /// # use good_conic::{variable, Model, Shape};
    /// let mut model = Model::new("shapes");
    /// let x = model.add(variable().shape((2, 3))).unwrap();
    /// assert_eq!(x.shape(), &Shape::matrix(2, 3));
    /// ```
    pub fn shape<S: Into<Shape>>(mut self, shape: S) -> Self {
        self.shape = shape.into();
        self
    }

    /// Restrict the variable to a domain
    pub fn domain(mut self, domain: Domain) -> Self {
        self.domain = domain;
        self
    }

    /// Set the lower and/or higher bounds of the variable
    ///
    /// ## Examples
    /// ```
    /// # use good_conic::variable;
    /// assert_eq!(
    ///     variable().bounds(1..2),
    ///     variable().min(1).max(2)
    /// );
    ///
    /// assert_eq!(
    ///     variable().bounds(1..),
    ///     variable().min(1)
    /// );
    ///
    /// assert_eq!(
    ///     variable().bounds(..=2),
    ///     variable().max(2)
    /// );
    ///
    /// # assert_eq!(variable().bounds::<f64, _>(..), variable());
    /// ```
    pub fn bounds<N: Into<f64> + Copy, B: RangeBounds<N>>(self, bounds: B) -> Self {
        self.min(match bounds.start_bound() {
            Bound::Included(&x) => x.into(),
            Bound::Excluded(&x) => x.into(),
            Bound::Unbounded => f64::NEG_INFINITY,
        })
        .max(match bounds.end_bound() {
            Bound::Included(&x) => x.into(),
            Bound::Excluded(&x) => x.into(),
            Bound::Unbounded => f64::INFINITY,
        })
    }

    /// Set the lower bound of every element
    pub fn min<N: Into<f64>>(mut self, min: N) -> Self {
        self.min = min.into();
        self
    }

    /// Set the higher bound of every element
    pub fn max<N: Into<f64>>(mut self, max: N) -> Self {
        self.max = max.into();
        self
    }

    /// Set both the lower and higher bounds of the variable
    pub fn clamp<N1: Into<f64>, N2: Into<f64>>(self, min: N1, max: N2) -> Self {
        self.min(min).max(max)
    }

    /// Restrict the variable to integer values
    pub fn integer(mut self) -> Self {
        self.is_integer = true;
        self
    }

    /// A variable that is either 0 or 1
    pub fn binary(self) -> Self {
        self.integer().clamp(0, 1)
    }

    /// Resolves the domain and the bounds into per-element column bounds.
    /// Returns None for conic domains, which are enforced with a constraint instead.
    pub(crate) fn element_bounds(&self) -> Result<Option<Vec<(f64, f64)>>, BuildError> {
        let has_bounds = self.min != f64::NEG_INFINITY || self.max != f64::INFINITY;
        if self.min.is_nan() || self.max.is_nan() {
            return Err(BuildError::InvalidDomain(
                "variable bounds must not be NaN".to_string(),
            ));
        }
        let bounds = match self.domain.element_bounds(self.shape.size()) {
            Some(bounds) => bounds,
            None if has_bounds || self.is_integer => {
                return Err(BuildError::InvalidDomain(format!(
                    "bounds and integrality cannot be combined with {:?}",
                    self.domain
                )))
            }
            None => return Ok(None),
        };
        let mut tightened = Vec::with_capacity(bounds.len());
        for (offset, (lo, hi)) in bounds.into_iter().enumerate() {
            let (lo, hi) = (lo.max(self.min), hi.min(self.max));
            if lo > hi || lo == f64::INFINITY || hi == f64::NEG_INFINITY {
                return Err(BuildError::InvalidDomain(format!(
                    "lower bound {} is above upper bound {} for element {}",
                    lo, hi, offset
                )));
            }
            tightened.push((lo, hi));
        }
        Ok(Some(tightened))
    }

    pub(crate) fn is_integral(&self) -> bool {
        self.is_integer || self.domain.is_integral()
    }
}

/// Creates an unbounded continuous scalar variable
impl Default for VariableDefinition {
    fn default() -> Self {
        VariableDefinition::new()
    }
}

/// Returns an anonymous unbounded continuous variable definition
pub fn variable() -> VariableDefinition {
    VariableDefinition::default()
}
