//! Equality constraints `c(x) = 0` and the feasibility projection built on
//! their Jacobian.
//!
//! Inequality constraints `g(x) <= 0` are scalar functions and are modelled as
//! [`InequalityConstraint`] objectives, see [`LogBarrier`](crate::LogBarrier).

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};
use crate::function::{Function, Objective};
use crate::linalg;

/// Scalar inequality constraint `g(x) <= 0`, counted like any objective.
pub type InequalityConstraint = Objective<Box<dyn Function>>;

/// Wrap a function as an [`InequalityConstraint`].
pub fn inequality<G: Function + 'static>(g: G) -> InequalityConstraint {
    Objective::new(Box::new(g))
}

/// Vector-valued equality constraint `c(x) = 0`.
pub trait EqualityConstraint {
    /// Evaluate `c(x)`.
    fn values(&mut self, x: &DVector<f64>) -> Result<DVector<f64>>;

    /// Evaluate the Jacobian of `c` at `x`.
    fn jacobian(&mut self, x: &DVector<f64>) -> Result<DMatrix<f64>>;

    /// Project `x` onto `{c(x) = 0}` with minimum-norm Newton corrections
    /// `x ← x - Jᵀ(JJᵀ)⁻¹c(x)`.
    ///
    /// Exact in one step for affine constraints. Fails with
    /// [`Error::Singular`] when `JJᵀ` is not invertible and with
    /// [`Error::NotConverged`] when the residual is still above tolerance
    /// after the iteration cap.
    fn project(&mut self, x: &DVector<f64>) -> Result<DVector<f64>> {
        newton_projection(self, x)
    }
}

const PROJECTION_TOL: f64 = 1e-12;
const PROJECTION_MAX_ITER: usize = 50;

fn newton_projection<C>(constraint: &mut C, x: &DVector<f64>) -> Result<DVector<f64>>
where
    C: EqualityConstraint + ?Sized,
{
    let mut point = x.clone();
    let mut iteration = 0;
    loop {
        let c = constraint.values(&point)?;
        if c.norm() <= PROJECTION_TOL * point.norm().max(1.0) {
            return Ok(point);
        }
        if iteration == PROJECTION_MAX_ITER {
            return Err(Error::NotConverged {
                context: "feasibility projection",
                iterations: iteration,
                residual: c.norm(),
            });
        }
        let j = constraint.jacobian(&point)?;
        let jjt = &j * j.transpose();
        let multipliers = linalg::cholesky_solve(&jjt, &c).map_err(|e| match e {
            Error::NonPositiveDefinite => Error::singular("constraint Jacobian is rank deficient"),
            other => other,
        })?;
        point = point - j.tr_mul(&multipliers);
        iteration += 1;
    }
}

/// Evaluation-counting wrapper around an [`EqualityConstraint`].
pub struct Constraint<C> {
    inner: C,
    value_evals: usize,
    jacobian_evals: usize,
}

impl<C: EqualityConstraint> Constraint<C> {
    pub fn new(inner: C) -> Self {
        Constraint {
            inner,
            value_evals: 0,
            jacobian_evals: 0,
        }
    }

    pub fn value(&mut self, x: &DVector<f64>) -> Result<DVector<f64>> {
        self.value_evals += 1;
        self.inner.values(x)
    }

    pub fn jacobian(&mut self, x: &DVector<f64>) -> Result<DMatrix<f64>> {
        self.jacobian_evals += 1;
        self.inner.jacobian(x)
    }

    /// Project onto the feasible manifold with Newton corrections. The
    /// evaluations the projection makes are counted.
    pub fn project(&mut self, x: &DVector<f64>) -> Result<DVector<f64>> {
        newton_projection(self, x)
    }

    pub fn value_evals(&self) -> usize {
        self.value_evals
    }

    pub fn jacobian_evals(&self) -> usize {
        self.jacobian_evals
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Uncounted access, e.g. for a closed-form projection the inner type provides.
    pub fn inner_mut(&mut self) -> &mut C {
        &mut self.inner
    }
}

impl<C: EqualityConstraint> EqualityConstraint for Constraint<C> {
    fn values(&mut self, x: &DVector<f64>) -> Result<DVector<f64>> {
        Constraint::value(self, x)
    }

    fn jacobian(&mut self, x: &DVector<f64>) -> Result<DMatrix<f64>> {
        Constraint::jacobian(self, x)
    }
}

/// Affine equality constraint `A x = b`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearEquality {
    a: DMatrix<f64>,
    b: DVector<f64>,
}

impl LinearEquality {
    pub fn new(a: DMatrix<f64>, b: DVector<f64>) -> Result<Self> {
        if a.nrows() != b.len() {
            return Err(Error::DimensionMismatch {
                expected: a.nrows(),
                found: b.len(),
            });
        }
        Ok(LinearEquality { a, b })
    }
}

impl EqualityConstraint for LinearEquality {
    fn values(&mut self, x: &DVector<f64>) -> Result<DVector<f64>> {
        if x.len() != self.a.ncols() {
            return Err(Error::DimensionMismatch {
                expected: self.a.ncols(),
                found: x.len(),
            });
        }
        Ok(&self.a * x - &self.b)
    }

    fn jacobian(&mut self, _x: &DVector<f64>) -> Result<DMatrix<f64>> {
        Ok(self.a.clone())
    }
}
