//! A conic optimization modeler that is easy to use and well-typed.
//!
//! Declare shaped variables in a [Model], combine them into affine
//! [expressions](Expression), restrict expressions to [domains](Domain)
//! (boxes, equalities, quadratic, rotated quadratic and semidefinite cones,
//! integrality), then solve with a pure rust backend.
//!
//! ```rust
//! # #[cfg(feature = "clarabel")] {
//! use good_conic::{in_quadratic_cone, variable, Expression, Model};
//!
//! // minimise t such that ‖(x - 1, y - 2)‖ <= t and x + y = 1
//! let mut model = Model::new("distance");
//! let x = model.add(variable().name("x")).unwrap();
//! let y = model.add(variable().name("y")).unwrap();
//! let t = model.add(variable().name("t")).unwrap();
//! let cone = Expression::vstack(&[
//!     t.expr(),
//!     x.expr().sub(1.).unwrap(),
//!     y.expr().sub(2.).unwrap(),
//! ]).unwrap();
//! model.constraint("distance", cone, in_quadratic_cone()).unwrap();
//! model.constraint("line", x.expr().add(&y).unwrap(), good_conic::equal_to(1.)).unwrap();
//! model.minimise(&t).unwrap();
//!
//! let solution = model.solve()?;
//! let distance = solution.objective_value().unwrap();
//! assert!((distance - 2f64.sqrt()).abs() < 1e-6);
//! # }
//! # Ok::<_, good_conic::ResolutionError>(())
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use affine::{AffineExpression, LinearExpression};
pub use constraint::{Constraint, ConstraintReference};
pub use domain::{
    equal_to, free, greater_than, in_psd_cone, in_quadratic_cone, in_range,
    in_rotated_quadratic_cone, integral, less_than, nonnegative, nonpositive, Domain, Rhs,
};
pub use error::{BuildError, MipGapError, ResolutionError};
pub use expression::Expression;
pub use matrix::Matrix;
pub use model::Model;
pub use parameters::{ParameterValue, Parameters};
pub use quadratic_expression::{IntoObjective, QuadraticExpression};
pub use shape::Shape;
pub use solution::{Solution, SolutionStatus, SolveInfo, TerminationStatus};
#[cfg(feature = "clarabel")]
#[cfg_attr(docsrs, doc(cfg(feature = "clarabel")))]
pub use solvers::Clarabel;
#[cfg(any(feature = "clarabel", feature = "microlp"))]
pub use solvers::DefaultBackend;
#[cfg(feature = "microlp")]
#[cfg_attr(docsrs, doc(cfg(feature = "microlp")))]
pub use solvers::MicroLp;
pub use solvers::{
    Backend, Control, FlatProblem, ObjectiveDirection, Progress, ProgressCallback,
};
pub use variable::{variable, Variable, VariableDefinition};

mod affine;
pub mod constraint;
pub mod domain;
mod error;
mod expression;
mod matrix;
mod model;
pub mod parameters;
mod quadratic_expression;
mod shape;
mod solution;
pub mod solvers;
pub mod variable;

#[cfg(not(any(feature = "clarabel", feature = "microlp")))]
compile_error!(
    "No solver available. \
You need to activate at least one solver feature flag in good_conic. \
You can do by adding the following to your Cargo.toml :
[dependencies]
good_conic = { version = \"*\", features = [\"clarabel\"] }"
);
