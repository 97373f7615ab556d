use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};
use crate::function::Function;
use crate::linalg;

/// Quadratic form `f(x) = ½ xᵀAx + bᵀx + c`.
///
/// Gradient `Ax + b` and Hessian `A` are closed form. With `A` symmetric
/// positive definite the unique minimizer is `x* = -A⁻¹b`.
#[derive(Debug, Clone, PartialEq)]
pub struct Quadratic {
    a: DMatrix<f64>,
    b: DVector<f64>,
    c: f64,
}

impl Quadratic {
    /// Build `½ xᵀAx + bᵀx`. `A` must be square and match `b`.
    pub fn new(a: DMatrix<f64>, b: DVector<f64>) -> Result<Self> {
        if !a.is_square() {
            return Err(Error::DimensionMismatch {
                expected: a.nrows(),
                found: a.ncols(),
            });
        }
        if a.nrows() != b.len() {
            return Err(Error::DimensionMismatch {
                expected: a.nrows(),
                found: b.len(),
            });
        }
        Ok(Quadratic { a, b, c: 0.0 })
    }

    /// Quadratic whose minimizer solves `A x = rhs`, i.e. `½ xᵀAx - rhsᵀx`.
    pub fn linear_system(a: DMatrix<f64>, rhs: DVector<f64>) -> Result<Self> {
        Quadratic::new(a, -rhs)
    }

    /// Set the constant term `c`.
    pub fn with_constant(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    pub fn dim(&self) -> usize {
        self.b.len()
    }

    /// Cholesky-based check used before choosing an exact line search.
    pub fn is_symmetric_positive_definite(&self) -> bool {
        linalg::is_symmetric_positive_definite(&self.a)
    }

    fn check_dim(&self, x: &DVector<f64>) -> Result<()> {
        if x.len() == self.dim() {
            Ok(())
        } else {
            Err(Error::DimensionMismatch {
                expected: self.dim(),
                found: x.len(),
            })
        }
    }
}

impl Function for Quadratic {
    fn value(&mut self, x: &DVector<f64>) -> Result<f64> {
        self.check_dim(x)?;
        Ok(0.5 * x.dot(&(&self.a * x)) + self.b.dot(x) + self.c)
    }

    fn gradient(&mut self, x: &DVector<f64>) -> Option<Result<DVector<f64>>> {
        Some(self.check_dim(x).map(|()| &self.a * x + &self.b))
    }

    fn hessian(&mut self, x: &DVector<f64>) -> Option<Result<DMatrix<f64>>> {
        Some(self.check_dim(x).map(|()| self.a.clone()))
    }

    fn as_quadratic(&self) -> Option<&Quadratic> {
        Some(self)
    }
}
