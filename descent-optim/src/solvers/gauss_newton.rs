use descent::{linalg, LeastSquares, LeastSquaresMethod, Objective, Residual};
use nalgebra::DVector;

use crate::convergence::ConvergenceParams;
use crate::error::Result;
use crate::line_search::LineSearchConfig;
use crate::result::OptimResult;
use crate::solver::{DirectionRule, IterationState, LineSearchSolver};

/// Configuration for the Gauss-Newton solver.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GaussNewtonConfig {
    /// Method for the linearized subproblem `min ‖J d + r‖` (default: SVD).
    pub subproblem: LeastSquaresMethod,
    /// Line search override. `None` selects strong Wolfe.
    pub line_search: Option<LineSearchConfig>,
    /// Convergence parameters.
    pub convergence: ConvergenceParams,
}

struct GaussNewtonDirection {
    method: LeastSquaresMethod,
}

impl<R: Residual> DirectionRule<LeastSquares<R>> for GaussNewtonDirection {
    fn direction(
        &mut self,
        objective: &mut Objective<LeastSquares<R>>,
        state: &IterationState,
    ) -> Result<DVector<f64>> {
        let x = &state.current_point;
        // Residual and Jacobian are read directly and are not counted.
        let least_squares = objective.function_mut();
        let r = least_squares.residuals(x)?;
        let j = least_squares.jacobian(x)?;
        Ok(linalg::solve_least_squares(&j, &(-r), self.method)?)
    }
}

/// Gauss-Newton for `min ½‖r(x)‖²`.
///
/// Each direction solves the linearized least-squares problem at the current
/// point. For an affine residual one unit step lands on the minimizer.
pub struct GaussNewton<'a, R> {
    solver: LineSearchSolver<'a, LeastSquares<R>, GaussNewtonDirection>,
}

impl<'a, R: Residual> GaussNewton<'a, R> {
    pub fn new(
        objective: &'a mut Objective<LeastSquares<R>>,
        x0: DVector<f64>,
        config: &GaussNewtonConfig,
    ) -> Result<Self> {
        let rule = GaussNewtonDirection {
            method: config.subproblem,
        };
        let solver = LineSearchSolver::new(
            objective,
            x0,
            rule,
            config.line_search.as_ref(),
            config.convergence.clone(),
        )?;
        Ok(GaussNewton { solver })
    }

    pub fn state(&self) -> &IterationState {
        self.solver.state()
    }

    pub fn solve(self) -> Result<OptimResult> {
        self.solver.solve()
    }
}

/// Gauss-Newton minimization of `objective` from `x0`.
pub fn gauss_newton<R: Residual>(
    objective: &mut Objective<LeastSquares<R>>,
    x0: DVector<f64>,
    config: &GaussNewtonConfig,
) -> Result<OptimResult> {
    GaussNewton::new(objective, x0, config)?.solve()
}
