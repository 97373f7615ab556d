use descent::{Error, Function, Objective};
use nalgebra::DVector;
use tracing::{debug, trace};

use super::{LineSearch, LineSearchContext};
use crate::error::{Result, SolverError};

/// Initial trial step of an iterative line search.
///
/// Every policy starts from `α = 1` on the first iteration. A guess that is
/// not finite and positive is replaced by `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StepSizeInitialization {
    /// Always try `α = 1`. Natural for Newton-like directions.
    Unit,
    /// `α₀ = α_{k-1} (g_{k-1}·d_{k-1}) / (g_k·d_k)`: predict the same
    /// first-order change in the objective as the previous step.
    #[default]
    ConserveFirstOrderChange,
    /// `α₀ = 2 (f_k - f_{k-1}) / (g_k·d_k)`: minimizer of the quadratic
    /// through `f_{k-1}`, `f_k` and the current slope.
    QuadraticInterpolation,
    /// `min(1, 1.01 α₀)` of [`QuadraticInterpolation`](Self::QuadraticInterpolation).
    ModifiedQuadraticInterpolation,
}

impl StepSizeInitialization {
    fn guess(self, previous: LineStart, start: LineStart, previous_step_size: f64) -> f64 {
        let interpolated = 2.0 * (start.value - previous.value) / start.slope;
        match self {
            StepSizeInitialization::Unit => 1.0,
            StepSizeInitialization::ConserveFirstOrderChange => {
                previous_step_size * previous.slope / start.slope
            }
            StepSizeInitialization::QuadraticInterpolation => interpolated,
            StepSizeInitialization::ModifiedQuadraticInterpolation => {
                (1.01 * interpolated).min(1.0)
            }
        }
    }
}

/// Parameters for the strong Wolfe line search.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StrongWolfeConfig {
    /// Sufficient decrease parameter (default: 1e-4).
    pub c1: f64,
    /// Curvature parameter (default: 0.9).
    pub c2: f64,
    /// Trial evaluations shared by bracketing and zoom (default: 10).
    pub max_iterations: usize,
    /// Upper bound on any trial step (default: 1e10).
    pub max_step: f64,
    /// Initial trial step policy (default: conserve first-order change).
    pub initialization: StepSizeInitialization,
}

impl Default for StrongWolfeConfig {
    fn default() -> Self {
        StrongWolfeConfig {
            c1: 1e-4,
            c2: 0.9,
            max_iterations: 10,
            max_step: 1e10,
            initialization: StepSizeInitialization::default(),
        }
    }
}

impl StrongWolfeConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0 < self.c1 && self.c1 < self.c2 && self.c2 < 1.0) {
            return Err(SolverError::invalid(format!(
                "strong Wolfe constants need 0 < c1 < c2 < 1, got c1 = {}, c2 = {}",
                self.c1, self.c2
            )));
        }
        if self.max_iterations == 0 {
            return Err(SolverError::invalid("line search needs at least one iteration"));
        }
        if !(self.max_step.is_finite() && self.max_step > 0.0) {
            return Err(SolverError::invalid(format!(
                "max_step must be finite and positive, got {}",
                self.max_step
            )));
        }
        Ok(())
    }
}

/// Value and slope of `φ(α) = f(x + α d)` at `α = 0`.
#[derive(Debug, Clone, Copy)]
struct LineStart {
    value: f64,
    slope: f64,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    step: f64,
    value: f64,
    slope: f64,
}

/// Line search enforcing the strong Wolfe conditions
/// `φ(α) <= φ(0) + c1 α φ'(0)` and `|φ'(α)| <= c2 |φ'(0)|`.
///
/// Expands the trial step until a bracket is found, then shrinks it with
/// safeguarded cubic interpolation (Nocedal & Wright, Algorithms 3.5 and
/// 3.6). Bracketing and zoom share one evaluation budget. When it runs out the
/// lowest sufficient-decrease step seen so far is returned, or `0` if there
/// was none. A non-descent direction also yields `0`.
///
/// Trial points where the objective reports [`Error::Domain`] are treated as
/// overshooting steps, so the search stays inside a log-barrier's domain. Such
/// a trial, or any non-finite one, shrinks the bracket tenfold toward its
/// feasible end.
///
/// After a search that returned `0` the next one starts from the last
/// non-zero step instead of the initialization policy.
#[derive(Debug, Clone)]
pub struct StrongWolfe {
    config: StrongWolfeConfig,
    previous_start: Option<LineStart>,
    last_step: Option<f64>,
}

impl StrongWolfe {
    pub fn new(config: StrongWolfeConfig) -> Result<Self> {
        config.validate()?;
        Ok(StrongWolfe {
            config,
            previous_start: None,
            last_step: None,
        })
    }

    pub fn config(&self) -> &StrongWolfeConfig {
        &self.config
    }

    fn initial_step<F: Function>(
        &self,
        objective: &mut Objective<F>,
        context: &LineSearchContext<'_>,
        start: LineStart,
    ) -> descent::Result<f64> {
        if context.iteration == 0 {
            return Ok(self.config.max_step.min(1.0));
        }
        let guess = match self.config.initialization {
            StepSizeInitialization::Unit => 1.0,
            _ if context.previous_step_size == 0.0 => self.last_step.unwrap_or(1.0),
            policy => match self.previous_start(objective, context)? {
                Some(previous) => policy.guess(previous, start, context.previous_step_size),
                None => 1.0,
            },
        };
        let guess = if guess.is_finite() && guess > 0.0 { guess } else { 1.0 };
        Ok(guess.min(self.config.max_step))
    }

    /// `φ_{k-1}(0)` from the previous call, or re-evaluated from the context
    /// when this search did not see the previous iteration.
    fn previous_start<F: Function>(
        &self,
        objective: &mut Objective<F>,
        context: &LineSearchContext<'_>,
    ) -> descent::Result<Option<LineStart>> {
        if self.previous_start.is_some() {
            return Ok(self.previous_start);
        }
        match (context.previous_point, context.previous_direction) {
            (Some(point), Some(direction)) => Ok(Some(LineStart {
                value: objective.value(point)?,
                slope: objective.gradient(point)?.dot(direction),
            })),
            _ => Ok(None),
        }
    }

    fn bracket<F: Function>(&self, line: &mut Line<'_, F>, initial: f64) -> descent::Result<f64> {
        let mut previous = line.origin();
        let mut step = initial;
        loop {
            if line.remaining == 0 {
                return Ok(line.fallback());
            }
            let current = line.sample(step)?;
            if !line.sufficient_decrease(&current)
                || (previous.step > 0.0 && current.value >= previous.value)
            {
                return self.zoom(line, previous, current);
            }
            if line.curvature_satisfied(&current, self.config.c2) {
                return Ok(current.step);
            }
            if current.slope >= 0.0 {
                return self.zoom(line, current, previous);
            }
            if step >= self.config.max_step {
                return Ok(line.fallback());
            }
            previous = current;
            step = (2.0 * step).min(self.config.max_step);
        }
    }

    /// Shrink a bracket whose `lo` end satisfies sufficient decrease.
    fn zoom<F: Function>(
        &self,
        line: &mut Line<'_, F>,
        mut lo: Sample,
        mut hi: Sample,
    ) -> descent::Result<f64> {
        while line.remaining > 0 {
            if (hi.step - lo.step).abs() <= f64::EPSILON * lo.step.abs().max(1.0) {
                break;
            }
            let trial = line.sample(interpolate(&lo, &hi))?;
            if !line.sufficient_decrease(&trial) || trial.value >= lo.value {
                hi = trial;
                continue;
            }
            if line.curvature_satisfied(&trial, self.config.c2) {
                return Ok(trial.step);
            }
            if trial.slope * (hi.step - lo.step) >= 0.0 {
                hi = lo;
            }
            lo = trial;
        }
        Ok(line.fallback())
    }
}

impl LineSearch for StrongWolfe {
    fn step_size<F: Function>(
        &mut self,
        objective: &mut Objective<F>,
        context: &LineSearchContext<'_>,
    ) -> descent::Result<f64> {
        let start = LineStart {
            value: objective.value(context.point)?,
            slope: objective.gradient(context.point)?.dot(context.direction),
        };
        let initial = self.initial_step(objective, context, start)?;
        self.previous_start = Some(start);

        if !(start.slope < 0.0) {
            debug!(slope = start.slope, "not a descent direction, taking a zero step");
            return Ok(0.0);
        }

        let mut line = Line {
            objective,
            point: context.point,
            direction: context.direction,
            start,
            c1: self.config.c1,
            remaining: self.config.max_iterations,
            best: None,
        };
        let step = self.bracket(&mut line, initial)?;
        if step > 0.0 {
            self.last_step = Some(step);
        }
        trace!(
            initial,
            step,
            evaluations = self.config.max_iterations - line.remaining,
            "strong Wolfe search finished"
        );
        Ok(step)
    }
}

/// `φ(α) = f(x + α d)` sampled through the counted objective.
struct Line<'a, F> {
    objective: &'a mut Objective<F>,
    point: &'a DVector<f64>,
    direction: &'a DVector<f64>,
    start: LineStart,
    c1: f64,
    remaining: usize,
    best: Option<Sample>,
}

impl<F: Function> Line<'_, F> {
    fn origin(&self) -> Sample {
        Sample {
            step: 0.0,
            value: self.start.value,
            slope: self.start.slope,
        }
    }

    fn sample(&mut self, step: f64) -> descent::Result<Sample> {
        self.remaining = self.remaining.saturating_sub(1);
        let x = self.point + self.direction * step;
        let value = match self.objective.value(&x) {
            Ok(value) => value,
            Err(Error::Domain { constraint, value }) => {
                trace!(step, constraint, value, "trial step left the domain");
                f64::INFINITY
            }
            Err(e) => return Err(e),
        };
        let slope = if value.is_finite() {
            self.objective.gradient(&x)?.dot(self.direction)
        } else {
            f64::NAN
        };
        let sample = Sample { step, value, slope };
        if self.sufficient_decrease(&sample) && self.best.map_or(true, |b| value < b.value) {
            self.best = Some(sample);
        }
        Ok(sample)
    }

    fn sufficient_decrease(&self, s: &Sample) -> bool {
        s.value <= self.start.value + self.c1 * s.step * self.start.slope
    }

    fn curvature_satisfied(&self, s: &Sample, c2: f64) -> bool {
        s.slope.abs() <= c2 * self.start.slope.abs()
    }

    fn fallback(&self) -> f64 {
        self.best.map_or(0.0, |b| b.step)
    }
}

/// Minimizer of the cubic matching value and slope at both ends, kept at least
/// a tenth of the bracket away from either end. Bisects when the cubic is
/// unusable, and moves a tenth of the way from `lo` when `hi` is not finite.
fn interpolate(lo: &Sample, hi: &Sample) -> f64 {
    let (a, b) = (lo.step, hi.step);
    if !(hi.value.is_finite() && hi.slope.is_finite()) {
        return a + 0.1 * (b - a);
    }
    let (left, right) = (a.min(b), a.max(b));
    let midpoint = 0.5 * (left + right);

    let d1 = lo.slope + hi.slope - 3.0 * (lo.value - hi.value) / (a - b);
    let radicand = d1 * d1 - lo.slope * hi.slope;
    if !(radicand >= 0.0) {
        return midpoint;
    }
    let d2 = (b - a).signum() * radicand.sqrt();
    let step = b - (b - a) * (hi.slope + d2 - d1) / (hi.slope - lo.slope + 2.0 * d2);

    let margin = 0.1 * (right - left);
    if step.is_finite() && step >= left + margin && step <= right - margin {
        step
    } else {
        midpoint
    }
}
