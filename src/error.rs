use thiserror::Error;

/// Result type for function, constraint and linear-algebra operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while evaluating functions, constraints or the linear systems
/// built from them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The gradient or Hessian is not defined at the evaluated point.
    #[error("function is not smooth at the evaluated point: {reason}")]
    NonSmooth { reason: String },

    /// A constraint is violated where the function requires strict feasibility
    /// (e.g. a log-barrier term evaluated on or outside the boundary).
    #[error("constraint {constraint} is not strictly satisfied (g(x) = {value})")]
    Domain { constraint: usize, value: f64 },

    /// A decomposition or linear solve hit a singular system.
    #[error("singular linear system: {context}")]
    Singular { context: String },

    /// A symmetric matrix was required.
    #[error("matrix is not symmetric")]
    NonSymmetric,

    /// A symmetric positive-definite matrix was required.
    #[error("matrix is not positive definite")]
    NonPositiveDefinite,

    /// An inner iteration hit its cap before reaching its tolerance.
    #[error("{context} did not converge in {iterations} iterations (residual {residual})")]
    NotConverged {
        context: &'static str,
        iterations: usize,
        residual: f64,
    },

    /// Operands have incompatible shapes.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

impl Error {
    pub(crate) fn non_smooth(reason: impl Into<String>) -> Self {
        Error::NonSmooth {
            reason: reason.into(),
        }
    }

    pub(crate) fn singular(context: impl Into<String>) -> Self {
        Error::Singular {
            context: context.into(),
        }
    }

    /// True for failures caused by a missing derivative.
    pub fn is_non_smooth(&self) -> bool {
        matches!(self, Error::NonSmooth { .. })
    }
}
