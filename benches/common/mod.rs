#![allow(dead_code)]

use descent::{Function, Result};
use nalgebra::{DMatrix, DVector};

// ─── Rosenbrock ────────────────────────────────────────────────────────────

pub fn rosenbrock_f64(x: &DVector<f64>) -> f64 {
    let mut sum = 0.0;
    for i in 0..x.len() - 1 {
        let t1 = 1.0 - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        sum += t1 * t1 + 100.0 * t2 * t2;
    }
    sum
}

/// Value-only Rosenbrock, so every derivative goes through finite differences.
pub struct Rosenbrock;

impl Function for Rosenbrock {
    fn value(&mut self, x: &DVector<f64>) -> Result<f64> {
        Ok(rosenbrock_f64(x))
    }
}

/// Rosenbrock with a closed-form gradient and no Hessian.
pub struct RosenbrockWithGradient;

impl Function for RosenbrockWithGradient {
    fn value(&mut self, x: &DVector<f64>) -> Result<f64> {
        Ok(rosenbrock_f64(x))
    }

    fn gradient(&mut self, x: &DVector<f64>) -> Option<Result<DVector<f64>>> {
        let n = x.len();
        let mut g = DVector::zeros(n);
        for i in 0..n - 1 {
            let t2 = x[i + 1] - x[i] * x[i];
            g[i] += -2.0 * (1.0 - x[i]) - 400.0 * x[i] * t2;
            g[i + 1] += 200.0 * t2;
        }
        Some(Ok(g))
    }
}

// ─── Helpers ───────────────────────────────────────────────────────────────

pub fn make_input(n: usize) -> DVector<f64> {
    DVector::from_fn(n, |i, _| 0.5 + 0.01 * i as f64)
}

/// Deterministic symmetric positive-definite matrix:
/// `BᵀB + n I` with `b_ji = sin(j*n + i + 1) / (n + 1)`.
pub fn make_spd(n: usize) -> DMatrix<f64> {
    let scale = 1.0 / (n as f64 + 1.0);
    let b = DMatrix::from_fn(n, n, |j, i| ((j * n + i + 1) as f64).sin() * scale);
    b.tr_mul(&b) + DMatrix::identity(n, n) * n as f64
}

pub fn make_rhs(n: usize) -> DVector<f64> {
    DVector::from_fn(n, |j, _| 0.1 * (j + 1) as f64)
}
