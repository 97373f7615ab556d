//! Finite-difference estimates of gradients and Hessians.
//!
//! Used by [`Objective`](crate::Objective) whenever the wrapped function has
//! no closed-form derivative. Step sizes scale with `max(1, |x_i|)` and with a
//! power of machine epsilon chosen to balance truncation against rounding for
//! each stencil.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

/// Finite-difference stencil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Approximation {
    /// `(f(x + h) - f(x)) / h`
    Forward,
    /// `(f(x) - f(x - h)) / h`
    Backward,
    /// `(f(x + h) - f(x - h)) / 2h`
    #[default]
    Central,
}

impl Approximation {
    /// Relative step used by first-order stencils.
    fn first_order_step(self, xi: f64) -> f64 {
        let base = match self {
            Approximation::Central => f64::EPSILON.cbrt(),
            _ => f64::EPSILON.sqrt(),
        };
        representable_step(xi, base * xi.abs().max(1.0))
    }

    /// Relative step used by second-order stencils over function values. The
    /// one-sided stencils are only first-order accurate, so they take the
    /// smaller step.
    fn second_order_step(self, xi: f64) -> f64 {
        let base = match self {
            Approximation::Central => f64::EPSILON.powf(0.25),
            _ => f64::EPSILON.cbrt(),
        };
        representable_step(xi, base * xi.abs().max(1.0))
    }

    fn sign(self) -> f64 {
        match self {
            Approximation::Backward => -1.0,
            _ => 1.0,
        }
    }

    /// Estimate the gradient of `value` at `x`.
    ///
    /// Costs `n + 1` value calls for one-sided stencils and `2n` for the
    /// central stencil.
    pub fn gradient<V>(self, mut value: V, x: &DVector<f64>) -> Result<DVector<f64>>
    where
        V: FnMut(&DVector<f64>) -> Result<f64>,
    {
        let n = x.len();
        let mut grad = DVector::zeros(n);
        let center = match self {
            Approximation::Central => 0.0,
            _ => sample(&mut value, x)?,
        };

        let mut shifted = x.clone();
        for i in 0..n {
            let xi = x[i];
            let h = self.first_order_step(xi);
            grad[i] = match self {
                Approximation::Forward => {
                    shifted[i] = xi + h;
                    (sample(&mut value, &shifted)? - center) / h
                }
                Approximation::Backward => {
                    shifted[i] = xi - h;
                    (center - sample(&mut value, &shifted)?) / h
                }
                Approximation::Central => {
                    shifted[i] = xi + h;
                    let plus = sample(&mut value, &shifted)?;
                    shifted[i] = xi - h;
                    let minus = sample(&mut value, &shifted)?;
                    (plus - minus) / (2.0 * h)
                }
            };
            shifted[i] = xi;
        }

        ensure_finite_vector(&grad, "gradient estimate")?;
        Ok(grad)
    }

    /// Estimate the Hessian of `value` at `x` from function values only.
    pub fn hessian<V>(self, mut value: V, x: &DVector<f64>) -> Result<DMatrix<f64>>
    where
        V: FnMut(&DVector<f64>) -> Result<f64>,
    {
        let n = x.len();
        let steps: Vec<f64> = x.iter().map(|&xi| self.second_order_step(xi)).collect();
        let center = sample(&mut value, x)?;
        let mut hess = DMatrix::zeros(n, n);
        let mut shifted = x.clone();

        match self {
            Approximation::Central => {
                for i in 0..n {
                    let hi = steps[i];
                    shifted[i] = x[i] + hi;
                    let plus = sample(&mut value, &shifted)?;
                    shifted[i] = x[i] - hi;
                    let minus = sample(&mut value, &shifted)?;
                    shifted[i] = x[i];
                    hess[(i, i)] = (plus - 2.0 * center + minus) / (hi * hi);

                    for j in (i + 1)..n {
                        let hj = steps[j];
                        let mut corner = |si: f64, sj: f64| {
                            shifted[i] = x[i] + si * hi;
                            shifted[j] = x[j] + sj * hj;
                            let f = sample(&mut value, &shifted);
                            shifted[i] = x[i];
                            shifted[j] = x[j];
                            f
                        };
                        let pp = corner(1.0, 1.0)?;
                        let pm = corner(1.0, -1.0)?;
                        let mp = corner(-1.0, 1.0)?;
                        let mm = corner(-1.0, -1.0)?;
                        let hij = (pp - pm - mp + mm) / (4.0 * hi * hj);
                        hess[(i, j)] = hij;
                        hess[(j, i)] = hij;
                    }
                }
            }
            Approximation::Forward | Approximation::Backward => {
                let s = self.sign();
                let mut single = Vec::with_capacity(n);
                for i in 0..n {
                    shifted[i] = x[i] + s * steps[i];
                    single.push(sample(&mut value, &shifted)?);
                    shifted[i] = x[i];
                }
                for i in 0..n {
                    for j in i..n {
                        shifted[i] += s * steps[i];
                        shifted[j] += s * steps[j];
                        let both = sample(&mut value, &shifted)?;
                        shifted[i] = x[i];
                        shifted[j] = x[j];
                        let hij = (both - single[i] - single[j] + center) / (steps[i] * steps[j]);
                        hess[(i, j)] = hij;
                        hess[(j, i)] = hij;
                    }
                }
            }
        }

        ensure_finite_matrix(&hess, "Hessian estimate")?;
        Ok(hess)
    }

    /// Estimate the Hessian by differencing a supplied gradient.
    ///
    /// Cheaper than [`hessian`](Self::hessian): `n` (one-sided) or `2n`
    /// (central) gradient calls. The estimate is symmetrised.
    pub fn hessian_from_gradient<G>(self, mut gradient: G, x: &DVector<f64>) -> Result<DMatrix<f64>>
    where
        G: FnMut(&DVector<f64>) -> Result<DVector<f64>>,
    {
        let n = x.len();
        let mut gradient = |p: &DVector<f64>| -> Result<DVector<f64>> {
            let g = gradient(p)?;
            if g.len() == n {
                Ok(g)
            } else {
                Err(Error::DimensionMismatch {
                    expected: n,
                    found: g.len(),
                })
            }
        };
        let mut jac = DMatrix::zeros(n, n);
        let center = match self {
            Approximation::Central => None,
            _ => Some(gradient(x)?),
        };

        let mut shifted = x.clone();
        for j in 0..n {
            let xj = x[j];
            let h = self.first_order_step(xj);
            let column = match (self, &center) {
                (Approximation::Forward, Some(g0)) => {
                    shifted[j] = xj + h;
                    (gradient(&shifted)? - g0) / h
                }
                (Approximation::Backward, Some(g0)) => {
                    shifted[j] = xj - h;
                    (g0 - gradient(&shifted)?) / h
                }
                _ => {
                    shifted[j] = xj + h;
                    let plus = gradient(&shifted)?;
                    shifted[j] = xj - h;
                    let minus = gradient(&shifted)?;
                    (plus - minus) / (2.0 * h)
                }
            };
            shifted[j] = xj;
            jac.set_column(j, &column);
        }

        let hess = (&jac + jac.transpose()) * 0.5;
        ensure_finite_matrix(&hess, "Hessian estimate")?;
        Ok(hess)
    }
}

/// Round the step so that `xi + h` is exactly representable.
fn representable_step(xi: f64, h: f64) -> f64 {
    let stepped = (xi + h) - xi;
    if stepped > 0.0 {
        stepped
    } else {
        h
    }
}

fn sample<V>(value: &mut V, x: &DVector<f64>) -> Result<f64>
where
    V: FnMut(&DVector<f64>) -> Result<f64>,
{
    let f = value(x)?;
    if f.is_finite() {
        Ok(f)
    } else {
        Err(Error::non_smooth(format!(
            "function value {f} at a finite-difference stencil point"
        )))
    }
}

fn ensure_finite_vector(v: &DVector<f64>, what: &str) -> Result<()> {
    if v.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(Error::non_smooth(format!("{what} is not finite")))
    }
}

fn ensure_finite_matrix(m: &DMatrix<f64>, what: &str) -> Result<()> {
    if m.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(Error::non_smooth(format!("{what} is not finite")))
    }
}
