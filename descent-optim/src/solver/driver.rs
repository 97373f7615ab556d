use std::mem;

use descent::{Function, Objective};
use nalgebra::DVector;
use tracing::{debug, info};

use super::IterationState;
use crate::convergence::ConvergenceParams;
use crate::error::{Result, SolverError};
use crate::line_search::{LineSearch, LineSearchConfig, LineSearchContext, LineSearchStrategy};
use crate::result::{OptimResult, TerminationReason};

/// Direction hook of a line-search method.
///
/// Called once per iteration, after the previous direction has been moved to
/// `state.previous_direction`.
pub trait DirectionRule<F: Function> {
    fn direction(
        &mut self,
        objective: &mut Objective<F>,
        state: &IterationState,
    ) -> Result<DVector<f64>>;
}

/// Generic line-search iteration: direction from `D`, step from a
/// [`LineSearchStrategy`], convergence checks after every step.
///
/// Built once per problem and consumed by [`solve`](Self::solve).
pub struct LineSearchSolver<'a, F, D> {
    objective: &'a mut Objective<F>,
    rule: D,
    line_search: LineSearchStrategy,
    convergence: ConvergenceParams,
    state: IterationState,
}

impl<'a, F: Function, D: DirectionRule<F>> LineSearchSolver<'a, F, D> {
    /// Validate the configuration and evaluate the objective at `x0`.
    ///
    /// `line_search: None` selects the default for `objective`, see
    /// [`LineSearchConfig::default_for`].
    pub fn new(
        objective: &'a mut Objective<F>,
        x0: DVector<f64>,
        rule: D,
        line_search: Option<&LineSearchConfig>,
        convergence: ConvergenceParams,
    ) -> Result<Self> {
        convergence.validate()?;
        let line_search = LineSearchConfig::resolve(line_search, objective)?;
        let value = objective.value(&x0)?;
        let gradient = smooth_gradient(objective, &x0, 0)?;
        Ok(LineSearchSolver {
            objective,
            rule,
            line_search,
            convergence,
            state: IterationState::new(x0, gradient, value),
        })
    }

    pub fn state(&self) -> &IterationState {
        &self.state
    }

    pub fn objective(&self) -> &Objective<F> {
        &*self.objective
    }

    pub fn line_search(&self) -> &LineSearchStrategy {
        &self.line_search
    }

    /// Advance one iteration.
    pub fn perform_iteration_updates(&mut self) -> Result<()> {
        let iteration = self.state.iteration;

        self.state.previous_direction = self.state.current_direction.take();
        let direction = self.rule.direction(self.objective, &self.state)?;
        let direction = &*self.state.current_direction.insert(direction);

        self.state.previous_step_size = self.state.current_step_size;
        let context = LineSearchContext {
            iteration,
            point: &self.state.current_point,
            direction,
            previous_point: self.state.previous_point.as_ref(),
            previous_direction: self.state.previous_direction.as_ref(),
            previous_step_size: self.state.previous_step_size,
        };
        let step = self.line_search.step_size(self.objective, &context)?;
        self.state.current_step_size = step;

        let next = &self.state.current_point + direction * step;
        self.state.previous_point = Some(mem::replace(&mut self.state.current_point, next));

        let gradient = smooth_gradient(self.objective, &self.state.current_point, iteration)?;
        self.state.previous_gradient =
            Some(mem::replace(&mut self.state.current_gradient, gradient));

        self.state.previous_value = self.state.current_value.take();
        if self.convergence.tracks_value() || tracing::enabled!(tracing::Level::DEBUG) {
            self.state.current_value = Some(self.objective.value(&self.state.current_point)?);
        }

        self.state.iteration += 1;
        Ok(())
    }

    /// Iterate until a stopping condition holds.
    pub fn solve(mut self) -> Result<OptimResult> {
        let termination = loop {
            if self.convergence.gradient_converged(self.state.gradient_norm()) {
                break TerminationReason::GradientNorm;
            }
            if self
                .convergence
                .function_converged(self.state.previous_value, self.state.current_value)
            {
                break TerminationReason::FunctionChange;
            }
            if self.convergence.budget_exhausted(self.state.iteration) {
                break TerminationReason::MaxIterations;
            }

            self.perform_iteration_updates()?;
            debug!(
                iteration = self.state.iteration,
                value = ?self.state.current_value,
                gradient_norm = self.state.gradient_norm(),
                step_size = self.state.current_step_size,
                "iteration"
            );
            // A zero step leaves the point and direction unchanged.
            if self.state.current_step_size == 0.0 {
                debug!(iteration = self.state.iteration, "line search made no progress");
                break TerminationReason::LineSearchFailed;
            }
        };
        self.finish(termination)
    }

    fn finish(self, termination: TerminationReason) -> Result<OptimResult> {
        let LineSearchSolver {
            objective, state, ..
        } = self;
        let value = match state.current_value {
            Some(value) => value,
            None => objective.value(&state.current_point)?,
        };
        let gradient_norm = state.gradient_norm();
        info!(
            iterations = state.iteration,
            %termination,
            value,
            gradient_norm,
            "solve finished"
        );
        Ok(OptimResult {
            x: state.current_point,
            value,
            gradient: state.current_gradient,
            gradient_norm,
            iterations: state.iteration,
            value_evals: objective.value_evals(),
            gradient_evals: objective.gradient_evals(),
            hessian_evals: objective.hessian_evals(),
            termination,
        })
    }
}

/// The gradient at an iterate. Non-smoothness there is fatal.
fn smooth_gradient<F: Function>(
    objective: &mut Objective<F>,
    x: &DVector<f64>,
    iteration: usize,
) -> Result<DVector<f64>> {
    objective.gradient(x).map_err(|e| {
        if e.is_non_smooth() {
            SolverError::NonSmoothPath { iteration }
        } else {
            SolverError::Evaluation(e)
        }
    })
}
