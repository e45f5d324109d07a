//! Constraints restrict an expression to a domain in the solution.
use core::fmt::{Debug, Formatter};

use crate::domain::Domain;
use crate::error::BuildError;
use crate::expression::Expression;

/// A constraint binds an expression to a [Domain]: every element of a linear
/// domain, or every row of a cone.
#[derive(Clone, PartialEq)]
pub struct Constraint {
    /// The expression that is constrained
    pub(crate) expression: Expression,
    /// The set the expression must belong to
    pub(crate) domain: Domain,
    /// Optional constraint name, unique in a model
    pub(crate) name: Option<String>,
}

impl Constraint {
    /// Create an anonymous constraint
    pub fn new(expression: Expression, domain: Domain) -> Constraint {
        Constraint {
            expression,
            domain,
            name: None,
        }
    }

    /// set the constraint name
    pub fn set_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    /// set the constraint name
    pub fn named<S: Into<String>>(self, name: S) -> Self {
        self.set_name(name.into())
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Debug for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{}: ", name)?;
        }
        write!(f, "{:?} in {:?}", self.expression, self.domain)
    }
}

fn difference<A: Into<Expression>, B: Into<Expression>>(a: A, b: B) -> Result<Expression, BuildError> {
    let a: Expression = a.into();
    a.sub(b)
}

/// equals: `a - b == 0`
pub fn eq<A: Into<Expression>, B: Into<Expression>>(a: A, b: B) -> Result<Constraint, BuildError> {
    Ok(Constraint::new(difference(a, b)?, Domain::EqualTo(0.into())))
}

/// less than or equal: `a - b <= 0`
pub fn leq<A: Into<Expression>, B: Into<Expression>>(a: A, b: B) -> Result<Constraint, BuildError> {
    Ok(Constraint::new(difference(a, b)?, Domain::NonPositive))
}

/// greater than or equal: `a - b >= 0`
pub fn geq<A: Into<Expression>, B: Into<Expression>>(a: A, b: B) -> Result<Constraint, BuildError> {
    Ok(Constraint::new(difference(a, b)?, Domain::NonNegative))
}

/// A reference to a constraint in a model. Used to retrieve dual values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintReference {
    pub(crate) index: usize,
}

impl ConstraintReference {
    /// The position of the constraint in its model
    pub fn index(&self) -> usize {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::nonnegative;

    #[test]
    fn free_functions_subtract_operands() {
        let c = leq(vec![1., 2.], 3.).unwrap();
        assert_eq!(c.expression().eval_with(&[]), vec![-2., -1.]);
        assert_eq!(c.domain(), &Domain::NonPositive);
        assert!(eq(vec![1., 2.], vec![1., 2., 3.]).is_err());
    }

    #[test]
    fn naming() {
        let c = Expression::zeros(2).in_domain(nonnegative()).named("budget");
        assert_eq!(c.name(), Some("budget"));
        assert_eq!(format!("{:?}", c), "budget: Expression(2,) [0, 0] in NonNegative");
    }
}
