use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};
use crate::function::Function;

/// Residual vector `r: R^n -> R^m` with its Jacobian.
pub trait Residual {
    /// Evaluate `r(x)`.
    fn residuals(&mut self, x: &DVector<f64>) -> Result<DVector<f64>>;

    /// Evaluate `J(x)`, the `m x n` Jacobian of `r`.
    fn jacobian(&mut self, x: &DVector<f64>) -> Result<DMatrix<f64>>;
}

/// Least-squares objective `f(x) = ½‖r(x)‖²`.
///
/// The gradient is `Jᵀr` and the Hessian is the Gauss-Newton approximation
/// `JᵀJ`, which drops the second-order residual terms.
#[derive(Debug, Clone)]
pub struct LeastSquares<R> {
    residual: R,
}

impl<R: Residual> LeastSquares<R> {
    pub fn new(residual: R) -> Self {
        LeastSquares { residual }
    }

    pub fn residuals(&mut self, x: &DVector<f64>) -> Result<DVector<f64>> {
        self.residual.residuals(x)
    }

    pub fn jacobian(&mut self, x: &DVector<f64>) -> Result<DMatrix<f64>> {
        self.residual.jacobian(x)
    }

    pub fn residual(&self) -> &R {
        &self.residual
    }

    fn gauss_newton_gradient(&mut self, x: &DVector<f64>) -> Result<DVector<f64>> {
        let r = self.residual.residuals(x)?;
        let j = self.residual.jacobian(x)?;
        checked_shapes(&j, &r, x)?;
        Ok(j.tr_mul(&r))
    }
}

impl<R: Residual> Function for LeastSquares<R> {
    fn value(&mut self, x: &DVector<f64>) -> Result<f64> {
        let r = self.residual.residuals(x)?;
        Ok(0.5 * r.norm_squared())
    }

    fn gradient(&mut self, x: &DVector<f64>) -> Option<Result<DVector<f64>>> {
        Some(self.gauss_newton_gradient(x))
    }

    fn hessian(&mut self, x: &DVector<f64>) -> Option<Result<DMatrix<f64>>> {
        Some(self.residual.jacobian(x).map(|j| j.tr_mul(&j)))
    }
}

fn checked_shapes(j: &DMatrix<f64>, r: &DVector<f64>, x: &DVector<f64>) -> Result<()> {
    if j.nrows() != r.len() {
        return Err(Error::DimensionMismatch {
            expected: r.len(),
            found: j.nrows(),
        });
    }
    if j.ncols() != x.len() {
        return Err(Error::DimensionMismatch {
            expected: x.len(),
            found: j.ncols(),
        });
    }
    Ok(())
}

/// Affine residual `r(x) = M x - v` with constant Jacobian `M`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearResidual {
    m: DMatrix<f64>,
    v: DVector<f64>,
}

impl LinearResidual {
    pub fn new(m: DMatrix<f64>, v: DVector<f64>) -> Result<Self> {
        if m.nrows() != v.len() {
            return Err(Error::DimensionMismatch {
                expected: m.nrows(),
                found: v.len(),
            });
        }
        Ok(LinearResidual { m, v })
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.m
    }

    pub fn target(&self) -> &DVector<f64> {
        &self.v
    }
}

impl Residual for LinearResidual {
    fn residuals(&mut self, x: &DVector<f64>) -> Result<DVector<f64>> {
        if x.len() != self.m.ncols() {
            return Err(Error::DimensionMismatch {
                expected: self.m.ncols(),
                found: x.len(),
            });
        }
        Ok(&self.m * x - &self.v)
    }

    fn jacobian(&mut self, _x: &DVector<f64>) -> Result<DMatrix<f64>> {
        Ok(self.m.clone())
    }
}

/// Linear least-squares objective `½‖M x - v‖²`.
pub type LinearLeastSquares = LeastSquares<LinearResidual>;

impl LinearLeastSquares {
    pub fn linear(m: DMatrix<f64>, v: DVector<f64>) -> Result<Self> {
        Ok(LeastSquares::new(LinearResidual::new(m, v)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Objective;
    use approx::assert_relative_eq;

    /// r(x) = [x0 - 1, 10 (x1 - x0^2)]
    struct Rosenbrock;

    impl Residual for Rosenbrock {
        fn residuals(&mut self, x: &DVector<f64>) -> Result<DVector<f64>> {
            Ok(DVector::from_vec(vec![x[0] - 1.0, 10.0 * (x[1] - x[0] * x[0])]))
        }

        fn jacobian(&mut self, x: &DVector<f64>) -> Result<DMatrix<f64>> {
            Ok(DMatrix::from_row_slice(2, 2, &[1.0, 0.0, -20.0 * x[0], 10.0]))
        }
    }

    #[test]
    fn value_and_gradient() {
        let mut f = LeastSquares::new(Rosenbrock);
        let x = DVector::from_vec(vec![0.5, 0.5]);
        // r = [-0.5, 2.5]
        assert_relative_eq!(f.value(&x).unwrap(), 0.5 * (0.25 + 6.25));
        let g = f.gradient(&x).unwrap().unwrap();
        // Jᵀr = [-0.5 + (-10)(2.5), 10 * 2.5]
        assert_relative_eq!(g[0], -25.5);
        assert_relative_eq!(g[1], 25.0);
    }

    #[test]
    fn hessian_is_gauss_newton_approximation() {
        let mut obj = Objective::new(LeastSquares::new(Rosenbrock));
        let x = DVector::from_vec(vec![2.0, 0.0]);
        let h = obj.hessian(&x).unwrap();
        let j = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, -40.0, 10.0]);
        assert_eq!(h, j.transpose() * &j);
        assert_eq!(obj.value_evals(), 0);
    }

    #[test]
    fn linear_residual() {
        let m = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        let v = DVector::from_vec(vec![1.0, 2.0, 4.0]);
        let mut f = LinearLeastSquares::linear(m.clone(), v).unwrap();
        let x = DVector::from_vec(vec![1.0, 2.0]);
        let r = f.residuals(&x).unwrap();
        assert_eq!(r, DVector::from_vec(vec![0.0, 0.0, -1.0]));
        assert_eq!(f.jacobian(&x).unwrap(), m);
        assert_relative_eq!(f.value(&x).unwrap(), 0.5);

        assert!(LinearLeastSquares::linear(DMatrix::zeros(2, 2), DVector::zeros(3)).is_err());
        assert!(f.value(&DVector::zeros(3)).is_err());
    }
}
