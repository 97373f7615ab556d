use crate::error::{Result, SolverError};

/// Parameters controlling convergence checks.
///
/// A tolerance of `0.0` disables that test. At least one stopping condition
/// must be enabled. With `max_iter: None` the solve only ends through a
/// tolerance, so a problem that never meets one runs forever.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConvergenceParams {
    /// Maximum number of iterations (default: 100).
    pub max_iter: Option<usize>,
    /// Gradient norm tolerance: stop when `||g|| < grad_tol` (default: 1e-8).
    pub grad_tol: f64,
    /// Function change tolerance: stop when `|f_{k+1} - f_k| < func_tol` (default: 0, disabled).
    pub func_tol: f64,
}

impl Default for ConvergenceParams {
    fn default() -> Self {
        ConvergenceParams {
            max_iter: Some(100),
            grad_tol: 1e-8,
            func_tol: 0.0,
        }
    }
}

impl ConvergenceParams {
    pub fn validate(&self) -> Result<()> {
        for (name, tol) in [("grad_tol", self.grad_tol), ("func_tol", self.func_tol)] {
            if !tol.is_finite() || tol < 0.0 {
                return Err(SolverError::invalid(format!(
                    "{name} must be finite and non-negative, got {tol}"
                )));
            }
        }
        if self.max_iter.is_none() && self.grad_tol == 0.0 && self.func_tol == 0.0 {
            return Err(SolverError::invalid("no stopping condition is enabled"));
        }
        Ok(())
    }

    pub(crate) fn gradient_converged(&self, gradient_norm: f64) -> bool {
        self.grad_tol > 0.0 && gradient_norm < self.grad_tol
    }

    pub(crate) fn function_converged(&self, previous: Option<f64>, current: Option<f64>) -> bool {
        match (previous, current) {
            (Some(p), Some(c)) if self.tracks_value() => (p - c).abs() < self.func_tol,
            _ => false,
        }
    }

    pub(crate) fn budget_exhausted(&self, iteration: usize) -> bool {
        self.max_iter.is_some_and(|max| iteration >= max)
    }

    /// Whether the objective value has to be refreshed after every step.
    pub(crate) fn tracks_value(&self) -> bool {
        self.func_tol > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ConvergenceParams::default().validate().is_ok());
    }

    #[test]
    fn rejects_config_without_stopping_condition() {
        let params = ConvergenceParams {
            max_iter: None,
            grad_tol: 0.0,
            func_tol: 0.0,
        };
        assert!(matches!(params.validate(), Err(SolverError::InvalidConfig(_))));

        let unbounded = ConvergenceParams {
            max_iter: None,
            ..Default::default()
        };
        assert!(unbounded.validate().is_ok());
    }

    #[test]
    fn rejects_bad_tolerances() {
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let params = ConvergenceParams {
                grad_tol: bad,
                ..Default::default()
            };
            assert!(params.validate().is_err());
            let params = ConvergenceParams {
                func_tol: bad,
                ..Default::default()
            };
            assert!(params.validate().is_err());
        }
    }

    #[test]
    fn disabled_tests_never_fire() {
        let params = ConvergenceParams {
            max_iter: None,
            grad_tol: 0.0,
            func_tol: 1e-3,
        };
        assert!(!params.gradient_converged(0.0));
        assert!(!params.budget_exhausted(usize::MAX));
        assert!(params.function_converged(Some(1.0), Some(1.0005)));
        assert!(!params.function_converged(None, Some(1.0)));

        let params = ConvergenceParams::default();
        assert!(!params.function_converged(Some(1.0), Some(1.0)));
        assert!(params.budget_exhausted(100));
    }
}
