use thiserror::Error;

/// Result type for solver construction and solves.
pub type Result<T> = std::result::Result<T, SolverError>;

/// Why a solver could not be built or could not finish.
///
/// Running out of iterations is not an error; see
/// [`TerminationReason::MaxIterations`](crate::TerminationReason::MaxIterations).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    /// An objective, constraint or linear solve failed.
    #[error(transparent)]
    Evaluation(#[from] descent::Error),

    /// The configuration was rejected at construction.
    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),

    /// The gradient is undefined at an iterate. Line-search methods assume
    /// differentiability along the whole path, so this is unsupported.
    #[error(
        "objective is not smooth at iterate {iteration}; line-search methods need a smooth path"
    )]
    NonSmoothPath { iteration: usize },
}

impl SolverError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        SolverError::InvalidConfig(message.into())
    }
}
