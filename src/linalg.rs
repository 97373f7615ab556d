//! Thin contract over `nalgebra` for the decompositions the solvers need.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};

use crate::error::{Error, Result};

/// Method for the linear least-squares solve `min ‖A x - b‖`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LeastSquaresMethod {
    /// Singular value decomposition; tolerates rank-deficient `A` and returns
    /// the minimum-norm solution.
    #[default]
    Svd,
    /// Cholesky factorisation of `AᵀA`.
    NormalEquations,
    /// Thin QR of `A` followed by back substitution. Needs full column rank.
    Qr,
}

const SYMMETRY_TOL: f64 = 1e-10;
/// Singular values (or R pivots) below this fraction of the largest are zero.
const RANK_TOL: f64 = 1e-12;

/// Fail with [`Error::NonSymmetric`] unless `a` is square and symmetric up to
/// a relative tolerance.
pub fn check_symmetric(a: &DMatrix<f64>) -> Result<()> {
    if !a.is_square() {
        return Err(Error::DimensionMismatch {
            expected: a.nrows(),
            found: a.ncols(),
        });
    }
    let n = a.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let (aij, aji) = (a[(i, j)], a[(j, i)]);
            let scale = aij.abs().max(aji.abs()).max(1.0);
            if (aij - aji).abs() > SYMMETRY_TOL * scale {
                return Err(Error::NonSymmetric);
            }
        }
    }
    Ok(())
}

/// Cholesky factor of `a`, or `None` when the factorisation fails or its
/// pivots show `a` is numerically singular: `min(L_ii)² <= RANK_TOL max(L_ii)²`.
///
/// Rounding lets a rank-deficient matrix factor with a tiny last pivot, so
/// success of the factorisation alone is not enough.
fn definite_cholesky(a: &DMatrix<f64>) -> Option<Cholesky<f64, Dyn>> {
    let chol = a.clone().cholesky()?;
    let pivots = chol.l_dirty().diagonal();
    if pivots.is_empty() {
        return Some(chol);
    }
    let (min, max) = (pivots.min(), pivots.max());
    (min * min > RANK_TOL * max * max).then_some(chol)
}

/// Symmetric and Cholesky-factorisable with pivots above the rank tolerance.
pub fn is_symmetric_positive_definite(a: &DMatrix<f64>) -> bool {
    check_symmetric(a).is_ok() && definite_cholesky(a).is_some()
}

/// Solve `A x = b` for symmetric positive-definite `A`.
pub fn cholesky_solve(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    check_symmetric(a)?;
    let chol = definite_cholesky(a).ok_or(Error::NonPositiveDefinite)?;
    Ok(chol.solve(b))
}

/// Solve the linear least-squares problem `min ‖A x - b‖` with `method`.
pub fn solve_least_squares(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    method: LeastSquaresMethod,
) -> Result<DVector<f64>> {
    if a.nrows() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: a.nrows(),
            found: b.len(),
        });
    }

    match method {
        LeastSquaresMethod::Svd => {
            let svd = a.clone().svd(true, true);
            let cutoff = RANK_TOL * svd.singular_values.max();
            svd.solve(b, cutoff).map_err(Error::singular)
        }
        LeastSquaresMethod::NormalEquations => {
            let ata = a.tr_mul(a);
            let atb = a.tr_mul(b);
            let chol = definite_cholesky(&ata)
                .ok_or_else(|| Error::singular("normal equations are not positive definite"))?;
            Ok(chol.solve(&atb))
        }
        LeastSquaresMethod::Qr => {
            if a.nrows() < a.ncols() {
                return Err(Error::singular(
                    "QR least squares needs at least as many rows as columns",
                ));
            }
            let qr = a.clone().qr();
            let qtb = qr.q().tr_mul(b);
            let r = qr.r();
            let tol = RANK_TOL * r.diagonal().amax();
            if r.diagonal().iter().any(|d| d.abs() <= tol) {
                return Err(Error::singular("QR factor is rank deficient"));
            }
            r.solve_upper_triangular(&qtb)
                .ok_or_else(|| Error::singular("upper-triangular solve failed"))
        }
    }
}
