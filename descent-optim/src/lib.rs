pub mod convergence;
pub mod error;
pub mod line_search;
pub mod result;
pub mod solver;
pub mod solvers;

pub use convergence::ConvergenceParams;
pub use error::{Result, SolverError};
pub use line_search::{
    ExactLineSearch, LineSearch, LineSearchConfig, LineSearchContext, LineSearchStrategy,
    StepSizeInitialization, StrongWolfe, StrongWolfeConfig,
};
pub use result::{OptimResult, TerminationReason};
pub use solver::{DirectionRule, IterationState, LineSearchSolver};
pub use solvers::conjugate_gradient::{
    conjugate_gradient, BetaFormula, ConjugateGradient, ConjugateGradientConfig, Preconditioning,
};
pub use solvers::gauss_newton::{gauss_newton, GaussNewton, GaussNewtonConfig};
