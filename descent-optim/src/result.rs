use std::fmt;

use nalgebra::DVector;

/// Result of an optimization run.
#[derive(Debug, Clone)]
pub struct OptimResult {
    /// Solution point.
    pub x: DVector<f64>,
    /// Objective value at the solution.
    pub value: f64,
    /// Gradient at the solution.
    pub gradient: DVector<f64>,
    /// Norm of the gradient at the solution.
    pub gradient_norm: f64,
    /// Number of outer iterations performed.
    pub iterations: usize,
    /// Value evaluations recorded by the objective, including earlier solves
    /// that shared it.
    pub value_evals: usize,
    /// Gradient evaluations recorded by the objective.
    pub gradient_evals: usize,
    /// Hessian evaluations recorded by the objective.
    pub hessian_evals: usize,
    /// Reason for termination.
    pub termination: TerminationReason,
}

/// Why the optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TerminationReason {
    /// Gradient norm fell below tolerance.
    GradientNorm,
    /// Change in objective value fell below tolerance.
    FunctionChange,
    /// Reached the maximum number of iterations.
    MaxIterations,
    /// Line search returned a zero step.
    LineSearchFailed,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::GradientNorm => write!(f, "gradient norm below tolerance"),
            TerminationReason::FunctionChange => write!(f, "function change below tolerance"),
            TerminationReason::MaxIterations => write!(f, "maximum iterations reached"),
            TerminationReason::LineSearchFailed => write!(f, "line search failed"),
        }
    }
}
