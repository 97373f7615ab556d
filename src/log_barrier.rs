use nalgebra::{DMatrix, DVector};

use crate::constraint::{inequality, InequalityConstraint};
use crate::error::{Error, Result};
use crate::function::Function;

/// Log-barrier `φ(x) = -Σ log(-gᵢ(x))` over inequality constraints `gᵢ(x) <= 0`.
///
/// Defined only on the strict interior: any `gᵢ(x) >= 0` fails with
/// [`Error::Domain`] instead of producing NaN. The barrier parameter schedule
/// is left to the caller, see [`Penalized`].
pub struct LogBarrier {
    constraints: Vec<InequalityConstraint>,
}

impl LogBarrier {
    pub fn new(constraints: Vec<InequalityConstraint>) -> Self {
        LogBarrier { constraints }
    }

    /// Add the constraint `g(x) <= 0`.
    pub fn push<G: Function + 'static>(&mut self, g: G) {
        self.constraints.push(inequality(g));
    }

    /// Builder-style [`push`](Self::push).
    pub fn with<G: Function + 'static>(mut self, g: G) -> Self {
        self.push(g);
        self
    }

    /// Constraint objectives, with their evaluation counters.
    pub fn constraints(&self) -> &[InequalityConstraint] {
        &self.constraints
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    fn interior_value(index: usize, g: &mut InequalityConstraint, x: &DVector<f64>) -> Result<f64> {
        let value = g.value(x)?;
        // Written to also reject NaN.
        if value < 0.0 {
            Ok(value)
        } else {
            Err(Error::Domain {
                constraint: index,
                value,
            })
        }
    }

    fn barrier_gradient(&mut self, x: &DVector<f64>) -> Result<DVector<f64>> {
        let mut grad = DVector::zeros(x.len());
        for (i, g) in self.constraints.iter_mut().enumerate() {
            let value = Self::interior_value(i, g, x)?;
            grad -= g.gradient(x)? / value;
        }
        Ok(grad)
    }

    fn barrier_hessian(&mut self, x: &DVector<f64>) -> Result<DMatrix<f64>> {
        let n = x.len();
        let mut hess = DMatrix::zeros(n, n);
        for (i, g) in self.constraints.iter_mut().enumerate() {
            let value = Self::interior_value(i, g, x)?;
            let grad = g.gradient(x)?;
            hess += &grad * grad.transpose() / (value * value);
            hess -= g.hessian(x)? / value;
        }
        Ok(hess)
    }
}

impl Default for LogBarrier {
    fn default() -> Self {
        LogBarrier::new(Vec::new())
    }
}

impl Function for LogBarrier {
    fn value(&mut self, x: &DVector<f64>) -> Result<f64> {
        let mut total = 0.0;
        for (i, g) in self.constraints.iter_mut().enumerate() {
            let value = Self::interior_value(i, g, x)?;
            total -= (-value).ln();
        }
        Ok(total)
    }

    fn gradient(&mut self, x: &DVector<f64>) -> Option<Result<DVector<f64>>> {
        Some(self.barrier_gradient(x))
    }

    fn hessian(&mut self, x: &DVector<f64>) -> Option<Result<DMatrix<f64>>> {
        Some(self.barrier_hessian(x))
    }
}

/// `f(x) + μ·φ(x)`: an objective plus a weighted log-barrier.
///
/// Driving `μ → 0` over successive solves is the caller's job.
pub struct Penalized<F> {
    objective: F,
    barrier: LogBarrier,
    weight: f64,
}

impl<F: Function> Penalized<F> {
    pub fn new(objective: F, barrier: LogBarrier, weight: f64) -> Self {
        Penalized {
            objective,
            barrier,
            weight,
        }
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    pub fn objective(&self) -> &F {
        &self.objective
    }

    pub fn barrier(&self) -> &LogBarrier {
        &self.barrier
    }
}

impl<F: Function> Function for Penalized<F> {
    fn value(&mut self, x: &DVector<f64>) -> Result<f64> {
        let barrier = self.barrier.value(x)?;
        Ok(self.objective.value(x)? + self.weight * barrier)
    }

    fn gradient(&mut self, x: &DVector<f64>) -> Option<Result<DVector<f64>>> {
        let objective = self.objective.gradient(x)?;
        Some(objective.and_then(|g| Ok(g + self.barrier.barrier_gradient(x)? * self.weight)))
    }

    fn hessian(&mut self, x: &DVector<f64>) -> Option<Result<DMatrix<f64>>> {
        let objective = self.objective.hessian(x)?;
        Some(objective.and_then(|h| Ok(h + self.barrier.barrier_hessian(x)? * self.weight)))
    }
}
