use descent::{linalg, Error, Function, Objective};
use nalgebra::DMatrix;
use tracing::debug;

use super::{LineSearch, LineSearchContext};
use crate::error::{Result, SolverError};

/// Closed-form line search for quadratics: `α = -(g·d) / (dᵀAd)`.
///
/// This is the minimizer of the quadratic restricted to the line through the
/// point along the direction. An ascent direction has no minimizer at a
/// positive step and yields `0`.
#[derive(Debug, Clone)]
pub struct ExactLineSearch {
    a: DMatrix<f64>,
}

impl ExactLineSearch {
    /// Build from the quadratic behind `objective`, which must have a
    /// symmetric positive-definite matrix.
    pub fn for_objective<F: Function>(objective: &Objective<F>) -> Result<Self> {
        let quadratic = objective.function().as_quadratic().ok_or_else(|| {
            SolverError::invalid("exact line search needs a quadratic objective")
        })?;
        let a = quadratic.a();
        linalg::check_symmetric(a)?;
        if !linalg::is_symmetric_positive_definite(a) {
            return Err(Error::NonPositiveDefinite.into());
        }
        Ok(ExactLineSearch { a: a.clone() })
    }
}

impl LineSearch for ExactLineSearch {
    fn step_size<F: Function>(
        &mut self,
        objective: &mut Objective<F>,
        context: &LineSearchContext<'_>,
    ) -> descent::Result<f64> {
        let d = context.direction;
        if d.iter().all(|&v| v == 0.0) {
            return Ok(0.0);
        }
        let g = objective.gradient(context.point)?;
        let curvature = d.dot(&(&self.a * d));
        if curvature <= 0.0 {
            return Err(Error::NonPositiveDefinite);
        }
        let slope = g.dot(d);
        if slope >= 0.0 {
            debug!(slope, "not a descent direction, taking a zero step");
            return Ok(0.0);
        }
        Ok(-slope / curvature)
    }
}
