use descent::{linalg, Error, Function, Objective};
use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::convergence::ConvergenceParams;
use crate::error::{Result, SolverError};
use crate::line_search::LineSearchConfig;
use crate::result::OptimResult;
use crate::solver::{DirectionRule, IterationState, LineSearchSolver};

/// Preconditioner `M` applied to the gradient, `z = M⁻¹g`.
///
/// `M` is built from the quadratic's matrix when the objective is a
/// quadratic, otherwise from the Hessian at the current point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Preconditioning {
    /// `M = I`: plain nonlinear conjugate gradient.
    #[default]
    Identity,
    /// `M = diag(A)`.
    Jacobi,
    /// `M = ω/(2-ω) (D/ω + L) (D/ω)⁻¹ (D/ω + U)` for `A = L + D + U`,
    /// applied with two triangular solves. Needs a symmetric matrix and
    /// `0 < ω < 2`.
    SymmetricSuccessiveOverRelaxation { omega: f64 },
}

impl Preconditioning {
    fn validate(&self) -> Result<()> {
        if let Preconditioning::SymmetricSuccessiveOverRelaxation { omega } = *self {
            if !(omega > 0.0 && omega < 2.0) {
                return Err(SolverError::invalid(format!(
                    "SSOR relaxation factor must lie in (0, 2), got {omega}"
                )));
            }
        }
        Ok(())
    }

    /// Whether `m` can back this preconditioner.
    fn check_matrix(&self, m: &DMatrix<f64>) -> descent::Result<()> {
        match self {
            Preconditioning::Identity => Ok(()),
            Preconditioning::Jacobi => positive_diagonal(m),
            Preconditioning::SymmetricSuccessiveOverRelaxation { .. } => {
                linalg::check_symmetric(m)?;
                positive_diagonal(m)
            }
        }
    }

    /// Solve `M z = g`.
    fn apply(&self, m: &DMatrix<f64>, g: &DVector<f64>) -> descent::Result<DVector<f64>> {
        if *self == Preconditioning::Identity {
            return Ok(g.clone());
        }
        if m.nrows() != g.len() {
            return Err(Error::DimensionMismatch {
                expected: g.len(),
                found: m.nrows(),
            });
        }
        self.check_matrix(m)?;
        match *self {
            Preconditioning::Identity => Ok(g.clone()),
            Preconditioning::Jacobi => Ok(g.component_div(&m.diagonal())),
            Preconditioning::SymmetricSuccessiveOverRelaxation { omega } => {
                let scaled = m.diagonal() / omega;
                let mut lower = m.lower_triangle();
                lower.set_diagonal(&scaled);
                let mut upper = m.upper_triangle();
                upper.set_diagonal(&scaled);

                let y = lower
                    .solve_lower_triangular(&(g * ((2.0 - omega) / omega)))
                    .ok_or_else(|| singular("SSOR forward sweep"))?;
                upper
                    .solve_upper_triangular(&y.component_mul(&scaled))
                    .ok_or_else(|| singular("SSOR backward sweep"))
            }
        }
    }
}

fn singular(context: &str) -> Error {
    Error::Singular {
        context: context.to_string(),
    }
}

fn positive_diagonal(m: &DMatrix<f64>) -> descent::Result<()> {
    if !m.is_square() {
        return Err(Error::DimensionMismatch {
            expected: m.nrows(),
            found: m.ncols(),
        });
    }
    match m.diagonal().iter().position(|&d| !(d > 0.0)) {
        Some(i) => Err(Error::Singular {
            context: format!(
                "preconditioner needs a positive diagonal, entry {i} is {}",
                m[(i, i)]
            ),
        }),
        None => Ok(()),
    }
}

/// Conjugate-direction update coefficient `β_k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BetaFormula {
    /// `β = gᵀz / g₋ᵀz₋`.
    FletcherReeves,
    /// `β = max(0, gᵀ(z - z₋) / g₋ᵀz₋)`. Clipping at zero restarts along `-z`.
    #[default]
    PolakRibiere,
}

impl BetaFormula {
    fn coefficient(
        self,
        g: &DVector<f64>,
        z: &DVector<f64>,
        previous_z: &DVector<f64>,
        previous_gz: f64,
    ) -> f64 {
        if !(previous_gz > 0.0) {
            return 0.0;
        }
        match self {
            BetaFormula::FletcherReeves => g.dot(z) / previous_gz,
            BetaFormula::PolakRibiere => ((g.dot(z) - g.dot(previous_z)) / previous_gz).max(0.0),
        }
    }
}

/// Configuration for the conjugate gradient solver.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConjugateGradientConfig {
    /// Gradient preconditioner (default: identity).
    pub preconditioning: Preconditioning,
    /// Direction update formula (default: Polak-Ribière, clipped at zero).
    pub beta: BetaFormula,
    /// Line search override. `None` picks exact search for symmetric
    /// positive-definite quadratics and strong Wolfe otherwise.
    pub line_search: Option<LineSearchConfig>,
    /// Convergence parameters.
    pub convergence: ConvergenceParams,
}

struct ConjugateDirection {
    preconditioning: Preconditioning,
    beta: BetaFormula,
    /// Constant preconditioner source for quadratic objectives.
    matrix: Option<DMatrix<f64>>,
    /// `z` and `gᵀz` from the previous iteration.
    previous: Option<(DVector<f64>, f64)>,
}

impl ConjugateDirection {
    fn preconditioned<F: Function>(
        &self,
        objective: &mut Objective<F>,
        state: &IterationState,
    ) -> descent::Result<DVector<f64>> {
        let g = &state.current_gradient;
        match (&self.matrix, self.preconditioning) {
            (_, Preconditioning::Identity) => Ok(g.clone()),
            (Some(m), p) => p.apply(m, g),
            (None, p) => p.apply(&objective.hessian(&state.current_point)?, g),
        }
    }
}

impl<F: Function> DirectionRule<F> for ConjugateDirection {
    fn direction(
        &mut self,
        objective: &mut Objective<F>,
        state: &IterationState,
    ) -> Result<DVector<f64>> {
        let g = &state.current_gradient;
        let z = self.preconditioned(objective, state)?;

        let mut direction = -&z;
        if let (Some(previous_direction), Some((previous_z, previous_gz))) =
            (&state.previous_direction, &self.previous)
        {
            let beta = self.beta.coefficient(g, &z, previous_z, *previous_gz);
            direction += previous_direction * beta;
            if !(direction.dot(g) < 0.0) {
                debug!(
                    iteration = state.iteration,
                    beta, "conjugate direction is not a descent direction, restarting"
                );
                direction = -&z;
            }
        }

        let gz = g.dot(&z);
        self.previous = Some((z, gz));
        Ok(direction)
    }
}

/// Nonlinear conjugate gradient with optional preconditioning.
///
/// With an exact line search on a symmetric positive-definite quadratic the
/// iteration terminates in at most `n` steps in exact arithmetic.
pub struct ConjugateGradient<'a, F> {
    solver: LineSearchSolver<'a, F, ConjugateDirection>,
}

impl<'a, F: Function> ConjugateGradient<'a, F> {
    /// Validate `config` against `objective` and evaluate the start point.
    pub fn new(
        objective: &'a mut Objective<F>,
        x0: DVector<f64>,
        config: &ConjugateGradientConfig,
    ) -> Result<Self> {
        config.preconditioning.validate()?;
        let matrix = match (config.preconditioning, objective.function().as_quadratic()) {
            (Preconditioning::Identity, _) | (_, None) => None,
            (p, Some(q)) => {
                p.check_matrix(q.a())?;
                Some(q.a().clone())
            }
        };
        let rule = ConjugateDirection {
            preconditioning: config.preconditioning,
            beta: config.beta,
            matrix,
            previous: None,
        };
        let solver = LineSearchSolver::new(
            objective,
            x0,
            rule,
            config.line_search.as_ref(),
            config.convergence.clone(),
        )?;
        Ok(ConjugateGradient { solver })
    }

    pub fn state(&self) -> &IterationState {
        self.solver.state()
    }

    pub fn solve(self) -> Result<OptimResult> {
        self.solver.solve()
    }
}

/// Conjugate gradient minimization of `objective` from `x0`.
pub fn conjugate_gradient<F: Function>(
    objective: &mut Objective<F>,
    x0: DVector<f64>,
    config: &ConjugateGradientConfig,
) -> Result<OptimResult> {
    ConjugateGradient::new(objective, x0, config)?.solve()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use descent::Quadratic;

    fn spd3() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.5, 1.0, 3.0, 0.2, 0.5, 0.2, 2.0])
    }

    #[test]
    fn jacobi_divides_by_diagonal() {
        let g = DVector::from_vec(vec![4.0, 3.0, 1.0]);
        let z = Preconditioning::Jacobi.apply(&spd3(), &g).unwrap();
        assert_relative_eq!(z[0], 1.0);
        assert_relative_eq!(z[1], 1.0);
        assert_relative_eq!(z[2], 0.5);
    }

    #[test]
    fn ssor_solves_its_own_system() {
        let a = spd3();
        let omega = 1.3;
        let g = DVector::from_vec(vec![1.0, -2.0, 0.5]);
        let z = Preconditioning::SymmetricSuccessiveOverRelaxation { omega }
            .apply(&a, &g)
            .unwrap();

        let d = DMatrix::from_diagonal(&(a.diagonal() / omega));
        let lower = a.lower_triangle() - DMatrix::from_diagonal(&a.diagonal()) + &d;
        let upper = a.upper_triangle() - DMatrix::from_diagonal(&a.diagonal()) + &d;
        let d_inv = DMatrix::from_diagonal(&(a.diagonal().map(|v| omega / v)));
        let m = (lower * d_inv * upper) * (omega / (2.0 - omega));
        let back = m * z;
        for i in 0..3 {
            assert_relative_eq!(back[i], g[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn preconditioner_validation() {
        let bad_omega = Preconditioning::SymmetricSuccessiveOverRelaxation { omega: 2.0 };
        assert!(matches!(bad_omega.validate(), Err(SolverError::InvalidConfig(_))));

        let zero_diag = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 2.0]);
        assert!(matches!(
            Preconditioning::Jacobi.check_matrix(&zero_diag),
            Err(Error::Singular { .. })
        ));

        let skew = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 0.0, 2.0]);
        let ssor = Preconditioning::SymmetricSuccessiveOverRelaxation { omega: 1.0 };
        assert_eq!(ssor.check_matrix(&skew), Err(Error::NonSymmetric));
        assert!(Preconditioning::Jacobi.check_matrix(&skew).is_ok());
    }

    #[test]
    fn construction_checks_quadratic_matrix() {
        let skew = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 0.0, 2.0]);
        let mut obj = Objective::new(Quadratic::new(skew, DVector::zeros(2)).unwrap());
        let config = ConjugateGradientConfig {
            preconditioning: Preconditioning::SymmetricSuccessiveOverRelaxation { omega: 1.0 },
            ..Default::default()
        };
        let err = ConjugateGradient::new(&mut obj, DVector::zeros(2), &config).err().unwrap();
        assert_eq!(err, SolverError::Evaluation(Error::NonSymmetric));
    }

    #[test]
    fn beta_formulas() {
        let g = DVector::from_vec(vec![1.0, 0.0]);
        let z = g.clone();
        let previous_z = DVector::from_vec(vec![2.0, 0.0]);
        let fletcher_reeves = BetaFormula::FletcherReeves.coefficient(&g, &z, &previous_z, 4.0);
        assert_relative_eq!(fletcher_reeves, 0.25);
        // gᵀ(z - z₋) = -1, clipped
        assert_eq!(BetaFormula::PolakRibiere.coefficient(&g, &z, &previous_z, 4.0), 0.0);
        assert_eq!(BetaFormula::FletcherReeves.coefficient(&g, &z, &previous_z, 0.0), 0.0);
    }

    /// ½xᵀAx + ¼Σx⁴ - Σx, strictly convex with closed-form derivatives.
    struct QuarticBowl;

    impl Function for QuarticBowl {
        fn value(&mut self, x: &DVector<f64>) -> descent::Result<f64> {
            Ok(0.5 * x.dot(&(spd3() * x)) + 0.25 * x.map(|v| v.powi(4)).sum() - x.sum())
        }

        fn gradient(&mut self, x: &DVector<f64>) -> Option<descent::Result<DVector<f64>>> {
            Some(Ok(spd3() * x + x.map(|v| v.powi(3)) - DVector::from_element(x.len(), 1.0)))
        }

        fn hessian(&mut self, x: &DVector<f64>) -> Option<descent::Result<DMatrix<f64>>> {
            Some(Ok(spd3() + DMatrix::from_diagonal(&x.map(|v| 3.0 * v * v))))
        }
    }

    #[test]
    fn nonlinear_objective_with_each_preconditioner() {
        for preconditioning in [
            Preconditioning::Identity,
            Preconditioning::Jacobi,
            Preconditioning::SymmetricSuccessiveOverRelaxation { omega: 1.0 },
        ] {
            let mut obj = Objective::new(QuarticBowl);
            let config = ConjugateGradientConfig {
                preconditioning,
                convergence: ConvergenceParams {
                    max_iter: Some(500),
                    grad_tol: 1e-7,
                    func_tol: 0.0,
                },
                ..Default::default()
            };
            let x0 = DVector::from_vec(vec![2.0, -1.0, 3.0]);
            let result = conjugate_gradient(&mut obj, x0, &config).unwrap();
            assert!(result.gradient_norm < 1e-7, "{preconditioning:?}: {result:?}");
            if preconditioning == Preconditioning::Identity {
                assert_eq!(result.hessian_evals, 0);
            } else {
                assert_eq!(result.hessian_evals, result.iterations);
            }
        }
    }
}
