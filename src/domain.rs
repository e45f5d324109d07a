//! The catalog of domains a variable or a constraint expression can be restricted to.
//!
//! Linear domains ([Domain::GreaterThan], [Domain::InRange], ...) act element by element.
//! Cones act along the last dimension: a vector is a single cone, and an `m x n`
//! matrix is `m` cones of dimension `n`, one per row.
use crate::error::BuildError;
use crate::shape::Shape;

/// A bound that applies either to every element or to each element separately
#[derive(Clone, Debug, PartialEq)]
pub enum Rhs {
    /// The same value for all elements
    Scalar(f64),
    /// One value per element, in row-major order
    Elements(Vec<f64>),
}

impl Rhs {
    /// The value for the element at `offset`
    pub fn value(&self, offset: usize) -> f64 {
        match self {
            Rhs::Scalar(v) => *v,
            Rhs::Elements(values) => values[offset],
        }
    }

    fn values(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        match self {
            Rhs::Scalar(v) => Box::new(std::iter::once(*v)),
            Rhs::Elements(values) => Box::new(values.iter().copied()),
        }
    }

    fn check_len(&self, shape: &Shape) -> Result<(), BuildError> {
        match self {
            Rhs::Elements(values) if values.len() != shape.size() => Err(
                BuildError::shape_mismatch("bound values", shape.size(), values.len()),
            ),
            _ => Ok(()),
        }
    }
}

impl From<f64> for Rhs {
    fn from(v: f64) -> Self {
        Rhs::Scalar(v)
    }
}

impl From<i32> for Rhs {
    fn from(v: i32) -> Self {
        Rhs::Scalar(v.into())
    }
}

impl From<Vec<f64>> for Rhs {
    fn from(values: Vec<f64>) -> Self {
        Rhs::Elements(values)
    }
}

impl From<&[f64]> for Rhs {
    fn from(values: &[f64]) -> Self {
        Rhs::Elements(values.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for Rhs {
    fn from(values: [f64; N]) -> Self {
        Rhs::Elements(values.to_vec())
    }
}

/// A set that an expression or a variable is restricted to.
#[derive(Clone, Debug, PartialEq)]
pub enum Domain {
    /// No restriction
    Free,
    /// Every element is >= 0
    NonNegative,
    /// Every element is <= 0
    NonPositive,
    /// Every element is >= the bound
    GreaterThan(Rhs),
    /// Every element is <= the bound
    LessThan(Rhs),
    /// Every element lies in the box `[lower, upper]`
    InRange(Rhs, Rhs),
    /// Every element is equal to the bound
    EqualTo(Rhs),
    /// `x1 >= ‖(x2, ..., xn)‖₂`
    QuadraticCone,
    /// `2 x1 x2 >= ‖(x3, ..., xn)‖₂²` with `x1, x2 >= 0`
    RotatedQuadraticCone,
    /// A symmetric positive semidefinite `n x n` matrix
    PsdCone,
    /// Integer points of a linear domain. Only valid on variables.
    Integral(Box<Domain>),
}

/// Where a domain is being used
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Usage {
    Variable,
    Constraint,
}

impl Domain {
    /// True for the quadratic, rotated quadratic and semidefinite cones
    pub fn is_conic(&self) -> bool {
        matches!(
            self,
            Domain::QuadraticCone | Domain::RotatedQuadraticCone | Domain::PsdCone
        )
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, Domain::Integral(_))
    }

    /// Checks that this domain accepts an expression or variable of the given shape
    pub(crate) fn validate(&self, shape: &Shape, usage: Usage) -> Result<(), BuildError> {
        match self {
            Domain::Free | Domain::NonNegative | Domain::NonPositive => Ok(()),
            Domain::GreaterThan(lower) => {
                lower.check_len(shape)?;
                check_finite_side(lower, f64::INFINITY, "lower")
            }
            Domain::LessThan(upper) => {
                upper.check_len(shape)?;
                check_finite_side(upper, f64::NEG_INFINITY, "upper")
            }
            Domain::InRange(lower, upper) => {
                lower.check_len(shape)?;
                upper.check_len(shape)?;
                check_finite_side(lower, f64::INFINITY, "lower")?;
                check_finite_side(upper, f64::NEG_INFINITY, "upper")?;
                for offset in 0..shape.size() {
                    let (lo, hi) = (lower.value(offset), upper.value(offset));
                    if lo > hi {
                        return Err(BuildError::InvalidDomain(format!(
                            "lower bound {} is above upper bound {} for element {}",
                            lo, hi, offset
                        )));
                    }
                }
                Ok(())
            }
            Domain::EqualTo(value) => {
                value.check_len(shape)?;
                if value.values().any(|v| !v.is_finite()) {
                    return Err(BuildError::InvalidDomain(
                        "equality values must be finite".to_string(),
                    ));
                }
                Ok(())
            }
            Domain::QuadraticCone => check_cone_dim(shape, 1, "quadratic cone"),
            Domain::RotatedQuadraticCone => check_cone_dim(shape, 3, "rotated quadratic cone"),
            Domain::PsdCone => {
                if shape.is_matrix() && shape.rows() == shape.cols() && shape.rows() > 0 {
                    Ok(())
                } else {
                    Err(BuildError::shape_mismatch(
                        "semidefinite cone",
                        "a non-empty square matrix",
                        shape,
                    ))
                }
            }
            Domain::Integral(inner) => {
                if usage == Usage::Constraint {
                    return Err(BuildError::InvalidDomain(
                        "integrality can only restrict variables, not constraints".to_string(),
                    ));
                }
                if inner.is_conic() || inner.is_integral() {
                    return Err(BuildError::InvalidDomain(format!(
                        "integrality can only wrap a linear domain, not {:?}",
                        inner
                    )));
                }
                inner.validate(shape, usage)
            }
        }
    }

    /// Per-element (lower, upper) bounds of a linear domain.
    /// Returns None for cones. Must be called after [Domain::validate].
    pub(crate) fn element_bounds(&self, size: usize) -> Option<Vec<(f64, f64)>> {
        let inf = f64::INFINITY;
        let bounds = 0..size;
        Some(match self {
            Domain::Free => vec![(-inf, inf); size],
            Domain::NonNegative => vec![(0., inf); size],
            Domain::NonPositive => vec![(-inf, 0.); size],
            Domain::GreaterThan(lower) => bounds.map(|i| (lower.value(i), inf)).collect(),
            Domain::LessThan(upper) => bounds.map(|i| (-inf, upper.value(i))).collect(),
            Domain::InRange(lower, upper) => bounds
                .map(|i| (lower.value(i), upper.value(i)))
                .collect(),
            Domain::EqualTo(value) => bounds.map(|i| (value.value(i), value.value(i))).collect(),
            Domain::Integral(inner) => return inner.element_bounds(size),
            Domain::QuadraticCone | Domain::RotatedQuadraticCone | Domain::PsdCone => {
                return None
            }
        })
    }
}

fn check_finite_side(rhs: &Rhs, forbidden: f64, side: &str) -> Result<(), BuildError> {
    if let Some(v) = rhs.values().find(|v| v.is_nan() || *v == forbidden) {
        return Err(BuildError::InvalidDomain(format!(
            "{} is not a valid {} bound",
            v, side
        )));
    }
    Ok(())
}

fn check_cone_dim(shape: &Shape, min_dim: usize, cone: &str) -> Result<(), BuildError> {
    if shape.is_scalar() {
        return Err(BuildError::shape_mismatch(cone, "a vector or an array", shape));
    }
    if shape.last_dim() < min_dim {
        return Err(BuildError::ShapeMismatch(format!(
            "a {} needs a dimension of at least {}, got shape {}",
            cone, min_dim, shape
        )));
    }
    Ok(())
}

/// Unrestricted
pub fn free() -> Domain {
    Domain::Free
}

/// Every element >= 0
pub fn nonnegative() -> Domain {
    Domain::NonNegative
}

/// Every element <= 0
pub fn nonpositive() -> Domain {
    Domain::NonPositive
}

/// Every element >= `lower`
pub fn greater_than(lower: impl Into<Rhs>) -> Domain {
    Domain::GreaterThan(lower.into())
}

/// Every element <= `upper`
pub fn less_than(upper: impl Into<Rhs>) -> Domain {
    Domain::LessThan(upper.into())
}

/// Every element in `[lower, upper]`
pub fn in_range(lower: impl Into<Rhs>, upper: impl Into<Rhs>) -> Domain {
    Domain::InRange(lower.into(), upper.into())
}

/// Every element equal to `value`
pub fn equal_to(value: impl Into<Rhs>) -> Domain {
    Domain::EqualTo(value.into())
}

/// Each row in the quadratic cone
pub fn in_quadratic_cone() -> Domain {
    Domain::QuadraticCone
}

/// Each row in the rotated quadratic cone
pub fn in_rotated_quadratic_cone() -> Domain {
    Domain::RotatedQuadraticCone
}

/// The matrix is positive semidefinite
pub fn in_psd_cone() -> Domain {
    Domain::PsdCone
}

/// Integer points of `inner`
///
/// ```
/// # use good_conic::{domain::{integral, nonnegative}, Domain};
/// assert_eq!(integral(nonnegative()), Domain::Integral(Box::new(Domain::NonNegative)));
/// ```
pub fn integral(inner: Domain) -> Domain {
    Domain::Integral(Box::new(inner))
}
