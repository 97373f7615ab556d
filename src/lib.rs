//! Objective functions for iterative minimization: counted evaluation,
//! finite-difference derivatives, least-squares residuals, constraints and
//! log-barriers. The solvers live in `descent-optim`.

pub mod constraint;
pub mod derivative;
pub mod error;
pub mod function;
pub mod least_squares;
pub mod linalg;
pub mod log_barrier;
pub mod quadratic;

pub use constraint::{
    inequality, Constraint, EqualityConstraint, InequalityConstraint, LinearEquality,
};
pub use derivative::Approximation;
pub use error::{Error, Result};
pub use function::{FnFunction, Function, Objective};
pub use least_squares::{LeastSquares, LinearLeastSquares, LinearResidual, Residual};
pub use linalg::LeastSquaresMethod;
pub use log_barrier::{LogBarrier, Penalized};
pub use quadratic::Quadratic;
