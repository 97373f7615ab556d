#![allow(dead_code)]

use descent::{Quadratic, Residual, Result};
use nalgebra::{DMatrix, DVector};

/// Deterministic symmetric positive-definite matrix:
/// `BᵀB + I` with `b_ji = sin(j*n + i + 1)`.
pub fn make_spd(n: usize) -> DMatrix<f64> {
    let b = DMatrix::from_fn(n, n, |j, i| ((j * n + i + 1) as f64).sin());
    b.tr_mul(&b) + DMatrix::identity(n, n)
}

pub fn make_quadratic(n: usize) -> Quadratic {
    let rhs = DVector::from_fn(n, |j, _| 0.1 * (j + 1) as f64);
    // Shapes match by construction.
    match Quadratic::linear_system(make_spd(n), rhs) {
        Ok(q) => q,
        Err(e) => panic!("bench quadratic: {e}"),
    }
}

/// Exponential decay fit `y = p0 exp(-p1 t)` to noiseless samples of
/// `p = (2, 0.5)`.
pub struct ExpDecay {
    pub t: Vec<f64>,
    pub y: Vec<f64>,
}

impl ExpDecay {
    pub fn new(samples: usize) -> Self {
        let t: Vec<f64> = (0..samples).map(|i| 0.1 * i as f64).collect();
        let y = t.iter().map(|&t| 2.0 * (-0.5 * t).exp()).collect();
        ExpDecay { t, y }
    }
}

impl Residual for ExpDecay {
    fn residuals(&mut self, p: &DVector<f64>) -> Result<DVector<f64>> {
        Ok(DVector::from_iterator(
            self.t.len(),
            self.t
                .iter()
                .zip(&self.y)
                .map(|(&t, &y)| p[0] * (-p[1] * t).exp() - y),
        ))
    }

    fn jacobian(&mut self, p: &DVector<f64>) -> Result<DMatrix<f64>> {
        Ok(DMatrix::from_fn(self.t.len(), 2, |i, j| {
            let e = (-p[1] * self.t[i]).exp();
            if j == 0 {
                e
            } else {
                -p[0] * self.t[i] * e
            }
        }))
    }
}
