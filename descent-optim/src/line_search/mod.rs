//! Step-size selection along a search direction.

mod exact;
mod strong_wolfe;

pub use exact::ExactLineSearch;
pub use strong_wolfe::{StepSizeInitialization, StrongWolfe, StrongWolfeConfig};

use descent::{Function, Objective};
use nalgebra::DVector;

use crate::error::Result;

/// What a line search may look at when picking a step.
///
/// The `previous_*` fields are `None` on the first iteration and feed the
/// step-size initialization policies of iterative searches.
#[derive(Debug, Clone, Copy)]
pub struct LineSearchContext<'a> {
    pub iteration: usize,
    pub point: &'a DVector<f64>,
    pub direction: &'a DVector<f64>,
    pub previous_point: Option<&'a DVector<f64>>,
    pub previous_direction: Option<&'a DVector<f64>>,
    pub previous_step_size: f64,
}

/// A strategy choosing a non-negative step size along `context.direction`.
pub trait LineSearch {
    /// Fails with the evaluation error when the objective or its derivatives
    /// cannot be evaluated along the search. A direction that is not a
    /// descent direction gives a zero step, which the driver reports as
    /// [`TerminationReason::LineSearchFailed`](crate::TerminationReason).
    fn step_size<F: Function>(
        &mut self,
        objective: &mut Objective<F>,
        context: &LineSearchContext<'_>,
    ) -> descent::Result<f64>;
}

/// Caller-facing line search selection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LineSearchConfig {
    /// Closed-form minimizer along the line. Quadratic objectives with a
    /// symmetric positive-definite matrix only.
    Exact,
    /// Bracketing and cubic interpolation enforcing the strong Wolfe conditions.
    StrongWolfe(StrongWolfeConfig),
}

impl Default for LineSearchConfig {
    fn default() -> Self {
        LineSearchConfig::StrongWolfe(StrongWolfeConfig::default())
    }
}

impl LineSearchConfig {
    /// Exact search for a symmetric positive-definite quadratic, strong Wolfe
    /// with default parameters otherwise.
    pub fn default_for<F: Function>(objective: &Objective<F>) -> Self {
        match objective.function().as_quadratic() {
            Some(q) if q.is_symmetric_positive_definite() => LineSearchConfig::Exact,
            _ => LineSearchConfig::default(),
        }
    }

    /// Validate the selection against `objective` and build the search.
    pub fn build<F: Function>(&self, objective: &Objective<F>) -> Result<LineSearchStrategy> {
        Ok(match self {
            LineSearchConfig::Exact => {
                LineSearchStrategy::Exact(ExactLineSearch::for_objective(objective)?)
            }
            LineSearchConfig::StrongWolfe(config) => {
                LineSearchStrategy::StrongWolfe(StrongWolfe::new(config.clone())?)
            }
        })
    }

    /// Build `config`, or the default selection for `objective` when `None`.
    pub(crate) fn resolve<F: Function>(
        config: Option<&LineSearchConfig>,
        objective: &Objective<F>,
    ) -> Result<LineSearchStrategy> {
        match config {
            Some(config) => config.build(objective),
            None => {
                let selected = LineSearchConfig::default_for(objective);
                tracing::debug!(line_search = ?selected, "selected default line search");
                selected.build(objective)
            }
        }
    }
}

/// A built line search, one variant per [`LineSearchConfig`].
#[derive(Debug, Clone)]
pub enum LineSearchStrategy {
    Exact(ExactLineSearch),
    StrongWolfe(StrongWolfe),
}

impl LineSearch for LineSearchStrategy {
    fn step_size<F: Function>(
        &mut self,
        objective: &mut Objective<F>,
        context: &LineSearchContext<'_>,
    ) -> descent::Result<f64> {
        match self {
            LineSearchStrategy::Exact(search) => search.step_size(objective, context),
            LineSearchStrategy::StrongWolfe(search) => search.step_size(objective, context),
        }
    }
}
