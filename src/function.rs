use nalgebra::{DMatrix, DVector};

use crate::derivative::Approximation;
use crate::error::Result;
use crate::quadratic::Quadratic;

/// A scalar function `f: R^n -> R` to be minimized.
///
/// Only [`value`](Function::value) is required. The derivative methods return
/// `None` when no closed form is available, in which case [`Objective`] falls
/// back to finite differences. Methods take `&mut self` so implementations can
/// cache, count or hold buffers.
pub trait Function {
    /// Evaluate `f(x)`.
    fn value(&mut self, x: &DVector<f64>) -> Result<f64>;

    /// Closed-form gradient `∇f(x)`, if the function has one.
    fn gradient(&mut self, x: &DVector<f64>) -> Option<Result<DVector<f64>>> {
        let _ = x;
        None
    }

    /// Closed-form Hessian `∇²f(x)`, if the function has one.
    fn hessian(&mut self, x: &DVector<f64>) -> Option<Result<DMatrix<f64>>> {
        let _ = x;
        None
    }

    /// The quadratic form behind this function, if it is one.
    ///
    /// Lets solvers pick closed-form line searches and preconditioners.
    fn as_quadratic(&self) -> Option<&Quadratic> {
        None
    }
}

impl<T: Function + ?Sized> Function for Box<T> {
    fn value(&mut self, x: &DVector<f64>) -> Result<f64> {
        (**self).value(x)
    }

    fn gradient(&mut self, x: &DVector<f64>) -> Option<Result<DVector<f64>>> {
        (**self).gradient(x)
    }

    fn hessian(&mut self, x: &DVector<f64>) -> Option<Result<DMatrix<f64>>> {
        (**self).hessian(x)
    }

    fn as_quadratic(&self) -> Option<&Quadratic> {
        (**self).as_quadratic()
    }
}

/// Adapter turning a plain closure into a value-only [`Function`].
pub struct FnFunction<V> {
    value: V,
}

impl<V> FnFunction<V>
where
    V: FnMut(&DVector<f64>) -> f64,
{
    pub fn new(value: V) -> Self {
        FnFunction { value }
    }
}

impl<V> Function for FnFunction<V>
where
    V: FnMut(&DVector<f64>) -> f64,
{
    fn value(&mut self, x: &DVector<f64>) -> Result<f64> {
        Ok((self.value)(x))
    }
}

/// Evaluation-counting wrapper around a [`Function`].
///
/// Every public evaluation increments its own counter exactly once. Gradients
/// and Hessians without a closed form are estimated with finite differences;
/// the stencil goes through [`value`](Objective::value), so those samples are
/// counted as value evaluations only.
///
/// Counters live on the instance. Sharing one objective between concurrent
/// solves is not supported.
pub struct Objective<F> {
    function: F,
    value_evals: usize,
    gradient_evals: usize,
    hessian_evals: usize,
    approximation: Option<Approximation>,
}

impl<F: Function> Objective<F> {
    pub fn new(function: F) -> Self {
        Objective {
            function,
            value_evals: 0,
            gradient_evals: 0,
            hessian_evals: 0,
            approximation: None,
        }
    }

    /// Evaluate `f(x)`.
    pub fn value(&mut self, x: &DVector<f64>) -> Result<f64> {
        self.value_evals += 1;
        self.function.value(x)
    }

    /// Evaluate `∇f(x)`, estimating it when no closed form exists.
    ///
    /// Fails with [`Error::NonSmooth`](crate::Error::NonSmooth) when the
    /// estimate is not defined at `x`.
    pub fn gradient(&mut self, x: &DVector<f64>) -> Result<DVector<f64>> {
        self.gradient_evals += 1;
        if let Some(grad) = self.function.gradient(x) {
            return grad;
        }
        let method = self.approximation_or_default();
        method.gradient(|p| self.value(p), x)
    }

    /// Evaluate `∇²f(x)`.
    ///
    /// Without a closed-form Hessian this differences the closed-form gradient
    /// when there is one, otherwise function values.
    pub fn hessian(&mut self, x: &DVector<f64>) -> Result<DMatrix<f64>> {
        self.hessian_evals += 1;
        if let Some(hess) = self.function.hessian(x) {
            return hess;
        }
        let method = self.approximation_or_default();

        // Probe once to learn whether a closed-form gradient exists.
        match self.function.gradient(x) {
            Some(Ok(_)) => {
                let function = &mut self.function;
                method.hessian_from_gradient(
                    |p| match function.gradient(p) {
                        Some(g) => g,
                        None => Err(crate::Error::non_smooth("gradient disappeared")),
                    },
                    x,
                )
            }
            Some(Err(e)) => Err(e),
            None => method.hessian(|p| self.value(p), x),
        }
    }

    fn approximation_or_default(&mut self) -> Approximation {
        *self.approximation.get_or_insert_with(|| {
            let method = Approximation::default();
            tracing::trace!(?method, "attaching finite-difference approximation");
            method
        })
    }

    /// Stencil used for derivative estimates, once one has been attached.
    pub fn approximation(&self) -> Option<Approximation> {
        self.approximation
    }

    /// Select the finite-difference stencil for subsequent estimates.
    pub fn set_approximation(&mut self, method: Approximation) {
        self.approximation = Some(method);
    }

    /// Builder-style variant of [`set_approximation`](Self::set_approximation).
    pub fn with_approximation(mut self, method: Approximation) -> Self {
        self.approximation = Some(method);
        self
    }

    pub fn value_evals(&self) -> usize {
        self.value_evals
    }

    pub fn gradient_evals(&self) -> usize {
        self.gradient_evals
    }

    pub fn hessian_evals(&self) -> usize {
        self.hessian_evals
    }

    /// Borrow the wrapped function.
    pub fn function(&self) -> &F {
        &self.function
    }

    /// Mutably borrow the wrapped function. Calls made through it are not counted.
    pub fn function_mut(&mut self) -> &mut F {
        &mut self.function
    }

    pub fn into_inner(self) -> F {
        self.function
    }
}

impl<F: Function> From<F> for Objective<F> {
    fn from(function: F) -> Self {
        Objective::new(function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// f(x) = sum(x_i^4), value only.
    struct Quartic;

    impl Function for Quartic {
        fn value(&mut self, x: &DVector<f64>) -> Result<f64> {
            Ok(x.iter().map(|v| v.powi(4)).sum())
        }
    }

    /// Same function with a closed-form gradient but no Hessian.
    struct QuarticWithGradient;

    impl Function for QuarticWithGradient {
        fn value(&mut self, x: &DVector<f64>) -> Result<f64> {
            Ok(x.iter().map(|v| v.powi(4)).sum())
        }

        fn gradient(&mut self, x: &DVector<f64>) -> Option<Result<DVector<f64>>> {
            Some(Ok(x.map(|v| 4.0 * v.powi(3))))
        }
    }

    #[test]
    fn counters_track_public_calls_only() {
        let mut obj = Objective::new(QuarticWithGradient);
        let x = DVector::from_vec(vec![1.0, 2.0]);
        for _ in 0..3 {
            obj.value(&x).unwrap();
            obj.gradient(&x).unwrap();
        }
        obj.hessian(&x).unwrap();
        obj.hessian(&x).unwrap();

        assert_eq!(obj.value_evals(), 3);
        assert_eq!(obj.gradient_evals(), 3);
        assert_eq!(obj.hessian_evals(), 2);
    }

    #[test]
    fn approximated_gradient_charges_value_counter() {
        let mut obj = Objective::new(Quartic);
        let x = DVector::from_vec(vec![1.0, -1.0, 0.5]);
        assert_eq!(obj.approximation(), None);

        let g = obj.gradient(&x).unwrap();
        assert_eq!(obj.approximation(), Some(Approximation::Central));
        assert_eq!(obj.gradient_evals(), 1);
        assert_eq!(obj.value_evals(), 6);
        assert_relative_eq!(g[0], 4.0, epsilon = 1e-6);
        assert_relative_eq!(g[1], -4.0, epsilon = 1e-6);
        assert_relative_eq!(g[2], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn hessian_reuses_closed_form_gradient() {
        let mut obj = Objective::new(QuarticWithGradient);
        let x = DVector::from_vec(vec![1.0, 2.0]);
        let h = obj.hessian(&x).unwrap();
        assert_eq!(obj.value_evals(), 0);
        assert_eq!(obj.gradient_evals(), 0);
        assert_eq!(obj.hessian_evals(), 1);
        assert_relative_eq!(h[(0, 0)], 12.0, epsilon = 1e-5);
        assert_relative_eq!(h[(1, 1)], 48.0, epsilon = 1e-4);
        assert_relative_eq!(h[(0, 1)], 0.0, epsilon = 1e-5);
    }

    #[test]
    fn hessian_from_values_without_any_closed_form() {
        let mut obj = Objective::new(Quartic).with_approximation(Approximation::Forward);
        let x = DVector::from_vec(vec![1.0]);
        let h = obj.hessian(&x).unwrap();
        assert!(obj.value_evals() > 0);
        assert_eq!(obj.hessian_evals(), 1);
        assert_relative_eq!(h[(0, 0)], 12.0, epsilon = 1e-3);
    }

    #[test]
    fn stencil_is_switchable() {
        let mut obj = Objective::new(FnFunction::new(|x: &DVector<f64>| x[0] * x[0]));
        obj.set_approximation(Approximation::Forward);
        let x = DVector::from_vec(vec![3.0]);
        let g = obj.gradient(&x).unwrap();
        assert_eq!(obj.value_evals(), 2);
        assert_relative_eq!(g[0], 6.0, epsilon = 1e-6);
    }
}
