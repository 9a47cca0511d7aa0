//! Adaptive ODE integrators driving the kinetic equations to equilibrium
//!
//! Two integrators are provided:
//!
//! - [`dormand_prince`] — explicit Dormand-Prince 4(5) pair with adaptive
//!   step control, for non-stiff to mildly stiff networks.
//! - [`sdirk`] — an L-stable SDIRK pair whose Newton iterations use the
//!   system's Jacobian, for networks with widely separated rate constants.
//!
//! Both integrate a [`OdeSystem`] from `t0` to `t1` and return the accepted
//! steps; [`OdeSolution::resample`] maps the dense output onto a fixed
//! sample grid.

use log::debug;
use nalgebra::{DMatrix, DVector, Dyn, LU};
use thiserror::Error;

/// Right-hand side of an ODE system `dy/dt = f(t, y)`
pub trait OdeSystem {
    /// Number of state variables
    fn dim(&self) -> usize;

    /// Evaluate `f(t, y)` into `dydt`
    fn rhs(&self, t: f64, y: &DVector<f64>, dydt: &mut DVector<f64>);

    /// Evaluate the Jacobian `df/dy` at `(t, y)` into `jac`
    ///
    /// The default implementation uses central finite differences; systems
    /// with an analytic Jacobian override this.
    fn jacobian(&self, t: f64, y: &DVector<f64>, jac: &mut DMatrix<f64>) {
        let n = self.dim();
        let eps = 1e-8;
        let mut yp = y.clone();
        let mut fp = DVector::zeros(n);
        let mut fm = DVector::zeros(n);
        for j in 0..n {
            let orig = yp[j];
            let h = eps * (1.0 + orig.abs());
            yp[j] = orig + h;
            self.rhs(t, &yp, &mut fp);
            yp[j] = orig - h;
            self.rhs(t, &yp, &mut fm);
            yp[j] = orig;
            for i in 0..n {
                jac[(i, j)] = (fp[i] - fm[i]) / (2.0 * h);
            }
        }
    }
}

/// Configuration for the adaptive integrators
#[derive(Debug, Clone)]
pub struct OdeOptions {
    /// Relative tolerance
    pub rtol: f64,
    /// Absolute tolerance
    pub atol: f64,
    /// Initial step size; 0.0 selects one automatically
    pub h0: f64,
    /// Minimum step size
    pub h_min: f64,
    /// Maximum step size
    pub h_max: f64,
    /// Maximum number of steps before giving up
    pub max_steps: usize,
}

impl Default for OdeOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            h0: 0.0,
            h_min: 1e-14,
            h_max: f64::INFINITY,
            max_steps: 1_000_000,
        }
    }
}

impl OdeOptions {
    fn validate(&self) -> Result<(), OdeError> {
        if !self.rtol.is_finite() || self.rtol <= 0.0 {
            return Err(OdeError::InvalidOptions("rtol must be finite and > 0"));
        }
        if !self.atol.is_finite() || self.atol <= 0.0 {
            return Err(OdeError::InvalidOptions("atol must be finite and > 0"));
        }
        if self.max_steps == 0 {
            return Err(OdeError::InvalidOptions("max_steps must be > 0"));
        }
        Ok(())
    }

    fn initial_step(&self, span: f64) -> f64 {
        if self.h0 > 0.0 {
            self.h0.min(span)
        } else {
            (span * 1e-3).max(self.h_min).min(self.h_max).min(span)
        }
    }
}

/// Accepted integration steps: times and the matching state vectors
#[derive(Debug, Clone)]
pub struct OdeSolution {
    pub t: Vec<f64>,
    pub y: Vec<DVector<f64>>,
}

impl OdeSolution {
    /// Linearly interpolate the dense output onto `times`, producing a
    /// `times.len() x dim` trajectory matrix
    ///
    /// `times` must be ascending and within the integrated span; queries past
    /// the final accepted step return the final state.
    pub fn resample(&self, times: &DVector<f64>) -> DMatrix<f64> {
        let n = self.y[0].len();
        let mut trajectory = DMatrix::zeros(times.len(), n);
        let mut idx = 0;
        for (row, &tq) in times.iter().enumerate() {
            while idx + 1 < self.t.len() && self.t[idx + 1] < tq {
                idx += 1;
            }
            if idx + 1 >= self.t.len() {
                for col in 0..n {
                    trajectory[(row, col)] = self.y[self.t.len() - 1][col];
                }
                continue;
            }
            let ta = self.t[idx];
            let tb = self.t[idx + 1];
            let frac = if (tb - ta).abs() < 1e-300 {
                0.0
            } else {
                (tq - ta) / (tb - ta)
            };
            for col in 0..n {
                let ya = self.y[idx][col];
                let yb = self.y[idx + 1][col];
                trajectory[(row, col)] = ya + frac * (yb - ya);
            }
        }
        trajectory
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum OdeError {
    #[error("invalid integrator options: {0}")]
    InvalidOptions(&'static str),
    #[error("initial state has length {actual}, system expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("integration span [{t0}, {t1}] is not a finite forward interval")]
    InvalidSpan { t0: f64, t1: f64 },
    #[error("step limit of {max_steps} reached at t = {t:.6e} before t_end = {t_end:.6e}")]
    StepLimitExceeded { max_steps: usize, t: f64, t_end: f64 },
    #[error("singular Newton iteration matrix (degenerate Jacobian)")]
    SingularIterationMatrix,
}

fn check_span_and_state<S: OdeSystem>(
    sys: &S,
    y0: &DVector<f64>,
    t0: f64,
    t1: f64,
    opts: &OdeOptions,
) -> Result<(), OdeError> {
    opts.validate()?;
    if y0.len() != sys.dim() {
        return Err(OdeError::DimensionMismatch {
            expected: sys.dim(),
            actual: y0.len(),
        });
    }
    if !t0.is_finite() || !t1.is_finite() || t1 < t0 {
        return Err(OdeError::InvalidSpan { t0, t1 });
    }
    Ok(())
}

/// Scaled RMS error norm used by both step controllers
fn error_norm(err: &DVector<f64>, y: &DVector<f64>, y_new: &DVector<f64>, opts: &OdeOptions) -> f64 {
    let n = err.len();
    let mut acc = 0.0;
    for i in 0..n {
        let sc = opts.atol + opts.rtol * y[i].abs().max(y_new[i].abs());
        acc += (err[i] / sc) * (err[i] / sc);
    }
    (acc / n as f64).sqrt()
}

/// Integrate with the explicit Dormand-Prince 4(5) pair
///
/// # Errors
///
/// Returns an error for inconsistent dimensions, invalid tolerances, or when
/// `max_steps` is exhausted before reaching `t1`.
pub fn dormand_prince<S: OdeSystem>(
    sys: &S,
    y0: &DVector<f64>,
    t0: f64,
    t1: f64,
    opts: &OdeOptions,
) -> Result<OdeSolution, OdeError> {
    check_span_and_state(sys, y0, t0, t1, opts)?;
    let n = sys.dim();
    let span = t1 - t0;
    if span == 0.0 {
        return Ok(OdeSolution {
            t: vec![t0],
            y: vec![y0.clone()],
        });
    }

    // Dormand-Prince coefficients
    const A21: f64 = 1.0 / 5.0;
    const A31: f64 = 3.0 / 40.0;
    const A32: f64 = 9.0 / 40.0;
    const A41: f64 = 44.0 / 45.0;
    const A42: f64 = -56.0 / 15.0;
    const A43: f64 = 32.0 / 9.0;
    const A51: f64 = 19372.0 / 6561.0;
    const A52: f64 = -25360.0 / 2187.0;
    const A53: f64 = 64448.0 / 6561.0;
    const A54: f64 = -212.0 / 729.0;
    const A61: f64 = 9017.0 / 3168.0;
    const A62: f64 = -355.0 / 33.0;
    const A63: f64 = 46732.0 / 5247.0;
    const A64: f64 = 49.0 / 176.0;
    const A65: f64 = -5103.0 / 18656.0;

    // 4th-order weights
    const B1: f64 = 5179.0 / 57600.0;
    const B3: f64 = 7571.0 / 16695.0;
    const B4: f64 = 393.0 / 640.0;
    const B5: f64 = -92097.0 / 339200.0;
    const B6: f64 = 187.0 / 2100.0;
    const B7: f64 = 1.0 / 40.0;

    // 5th-order weights (the advancing solution, local extrapolation)
    const BH1: f64 = 35.0 / 384.0;
    const BH3: f64 = 500.0 / 1113.0;
    const BH4: f64 = 125.0 / 192.0;
    const BH5: f64 = -2187.0 / 6784.0;
    const BH6: f64 = 11.0 / 84.0;

    // Error weights: y5 - y4
    const E1: f64 = BH1 - B1;
    const E3: f64 = BH3 - B3;
    const E4: f64 = BH4 - B4;
    const E5: f64 = BH5 - B5;
    const E6: f64 = BH6 - B6;
    const E7: f64 = -B7;

    let mut sol = OdeSolution {
        t: vec![t0],
        y: vec![y0.clone()],
    };

    let mut t = t0;
    let mut y = y0.clone();
    let mut h = opts.initial_step(span);

    let mut k1 = DVector::zeros(n);
    let mut k2 = DVector::zeros(n);
    let mut k3 = DVector::zeros(n);
    let mut k4 = DVector::zeros(n);
    let mut k5 = DVector::zeros(n);
    let mut k6 = DVector::zeros(n);
    let mut k7 = DVector::zeros(n);
    let mut y_tmp: DVector<f64> = DVector::zeros(n);
    let mut y_new: DVector<f64> = DVector::zeros(n);
    let mut err: DVector<f64> = DVector::zeros(n);

    sys.rhs(t, &y, &mut k1);

    let mut accepted = 0usize;
    for _step in 0..opts.max_steps {
        if t >= t1 {
            break;
        }
        h = h.min(t1 - t).max(opts.h_min).min(opts.h_max);

        y_tmp.copy_from(&y);
        y_tmp.axpy(h * A21, &k1, 1.0);
        sys.rhs(t + h / 5.0, &y_tmp, &mut k2);

        y_tmp.copy_from(&y);
        y_tmp.axpy(h * A31, &k1, 1.0);
        y_tmp.axpy(h * A32, &k2, 1.0);
        sys.rhs(t + 3.0 * h / 10.0, &y_tmp, &mut k3);

        y_tmp.copy_from(&y);
        y_tmp.axpy(h * A41, &k1, 1.0);
        y_tmp.axpy(h * A42, &k2, 1.0);
        y_tmp.axpy(h * A43, &k3, 1.0);
        sys.rhs(t + 4.0 * h / 5.0, &y_tmp, &mut k4);

        y_tmp.copy_from(&y);
        y_tmp.axpy(h * A51, &k1, 1.0);
        y_tmp.axpy(h * A52, &k2, 1.0);
        y_tmp.axpy(h * A53, &k3, 1.0);
        y_tmp.axpy(h * A54, &k4, 1.0);
        sys.rhs(t + 8.0 * h / 9.0, &y_tmp, &mut k5);

        y_tmp.copy_from(&y);
        y_tmp.axpy(h * A61, &k1, 1.0);
        y_tmp.axpy(h * A62, &k2, 1.0);
        y_tmp.axpy(h * A63, &k3, 1.0);
        y_tmp.axpy(h * A64, &k4, 1.0);
        y_tmp.axpy(h * A65, &k5, 1.0);
        sys.rhs(t + h, &y_tmp, &mut k6);

        y_new.copy_from(&y);
        y_new.axpy(h * BH1, &k1, 1.0);
        y_new.axpy(h * BH3, &k3, 1.0);
        y_new.axpy(h * BH4, &k4, 1.0);
        y_new.axpy(h * BH5, &k5, 1.0);
        y_new.axpy(h * BH6, &k6, 1.0);

        // FSAL stage
        sys.rhs(t + h, &y_new, &mut k7);

        err.fill(0.0);
        err.axpy(h * E1, &k1, 1.0);
        err.axpy(h * E3, &k3, 1.0);
        err.axpy(h * E4, &k4, 1.0);
        err.axpy(h * E5, &k5, 1.0);
        err.axpy(h * E6, &k6, 1.0);
        err.axpy(h * E7, &k7, 1.0);
        let err_norm = error_norm(&err, &y, &y_new, opts);

        if err_norm <= 1.0 {
            t += h;
            y.copy_from(&y_new);
            k1.copy_from(&k7);
            accepted += 1;
            sol.t.push(t);
            sol.y.push(y.clone());
            if t >= t1 {
                break;
            }
        }

        let factor = if err_norm == 0.0 {
            5.0
        } else {
            (0.9 * err_norm.powf(-0.2)).clamp(0.2, 5.0)
        };
        h = (h * factor).max(opts.h_min).min(opts.h_max);
    }

    if t < t1 - opts.h_min {
        return Err(OdeError::StepLimitExceeded {
            max_steps: opts.max_steps,
            t,
            t_end: t1,
        });
    }
    debug!("dormand_prince: {accepted} accepted steps over [{t0}, {t1}]");
    Ok(sol)
}

/// Integrate with an L-stable SDIRK pair, using the system Jacobian in a
/// simplified Newton iteration
///
/// The iteration matrix `I - h*gamma*J` is LU-factored and reused until the
/// step size drifts by more than 20% or a Newton iteration fails to converge.
pub fn sdirk<S: OdeSystem>(
    sys: &S,
    y0: &DVector<f64>,
    t0: f64,
    t1: f64,
    opts: &OdeOptions,
) -> Result<OdeSolution, OdeError> {
    check_span_and_state(sys, y0, t0, t1, opts)?;
    let n = sys.dim();
    let span = t1 - t0;
    if span == 0.0 {
        return Ok(OdeSolution {
            t: vec![t0],
            y: vec![y0.clone()],
        });
    }

    // Two-stage L-stable SDIRK with gamma = 1 - 1/sqrt(2) and an embedded
    // first-order error estimate:
    //   gamma |  gamma      0
    //   1     |  1-gamma    gamma
    //  -------+------------------
    //   b     |  1-gamma    gamma
    //   b*    |  1          0
    let gamma: f64 = 1.0 - std::f64::consts::FRAC_1_SQRT_2;

    let mut sol = OdeSolution {
        t: vec![t0],
        y: vec![y0.clone()],
    };

    let mut t = t0;
    let mut y = y0.clone();
    let mut h = opts.initial_step(span);

    let mut k1: DVector<f64> = DVector::zeros(n);
    let mut k2: DVector<f64> = DVector::zeros(n);
    let mut y_new: DVector<f64> = DVector::zeros(n);
    let mut stage_y: DVector<f64> = DVector::zeros(n);
    let mut residual: DVector<f64> = DVector::zeros(n);
    let mut jac: DMatrix<f64> = DMatrix::zeros(n, n);
    let mut newton_lu: Option<(f64, LU<f64, Dyn, Dyn>)> = None;

    let max_newton = 10;
    let newton_tol = 0.01;

    let mut accepted = 0usize;
    for _step in 0..opts.max_steps {
        if t >= t1 {
            break;
        }
        h = h.min(t1 - t).max(opts.h_min).min(opts.h_max);
        let hg = h * gamma;

        // Refresh the factored iteration matrix when h*gamma drifts
        let stale = match &newton_lu {
            Some((cached, _)) => (hg - cached).abs() > 0.2 * cached,
            None => true,
        };
        if stale {
            sys.jacobian(t, &y, &mut jac);
            let m = DMatrix::identity(n, n) - &jac * hg;
            newton_lu = Some((hg, m.lu()));
        }

        // Stage 1: k1 = f(t + gamma*h, y + h*gamma*k1)
        sys.rhs(t, &y, &mut k1);
        let mut newton_ok = true;
        for nit in 0..max_newton {
            stage_y.copy_from(&y);
            stage_y.axpy(hg, &k1, 1.0);
            sys.rhs(t + gamma * h, &stage_y, &mut residual);
            residual -= &k1;
            // newton_lu is always factored above before the stages run
            let delta = match newton_lu.as_ref().and_then(|(_, lu)| lu.solve(&residual)) {
                Some(delta) => delta,
                None => return Err(OdeError::SingularIterationMatrix),
            };
            k1 += &delta;
            if error_norm(&delta, &y, &y, opts) < newton_tol {
                break;
            }
            if nit == max_newton - 1 {
                newton_ok = false;
            }
        }
        if !newton_ok {
            h *= 0.5;
            newton_lu = None;
            continue;
        }

        // Stage 2: k2 = f(t + h, y + h*(1-gamma)*k1 + h*gamma*k2)
        k2.copy_from(&k1);
        newton_ok = true;
        for nit in 0..max_newton {
            stage_y.copy_from(&y);
            stage_y.axpy(h * (1.0 - gamma), &k1, 1.0);
            stage_y.axpy(hg, &k2, 1.0);
            sys.rhs(t + h, &stage_y, &mut residual);
            residual -= &k2;
            // newton_lu is always factored above before the stages run
            let delta = match newton_lu.as_ref().and_then(|(_, lu)| lu.solve(&residual)) {
                Some(delta) => delta,
                None => return Err(OdeError::SingularIterationMatrix),
            };
            k2 += &delta;
            if error_norm(&delta, &y, &y, opts) < newton_tol {
                break;
            }
            if nit == max_newton - 1 {
                newton_ok = false;
            }
        }
        if !newton_ok {
            h *= 0.5;
            newton_lu = None;
            continue;
        }

        y_new.copy_from(&y);
        y_new.axpy(h * (1.0 - gamma), &k1, 1.0);
        y_new.axpy(h * gamma, &k2, 1.0);

        // Embedded error: h * gamma * (k2 - k1)
        residual.copy_from(&k2);
        residual -= &k1;
        residual *= h * gamma;
        let err_norm = error_norm(&residual, &y, &y_new, opts);

        if err_norm <= 1.0 {
            t += h;
            y.copy_from(&y_new);
            accepted += 1;
            sol.t.push(t);
            sol.y.push(y.clone());
            if t >= t1 {
                break;
            }
        } else {
            newton_lu = None;
        }

        let factor = if err_norm == 0.0 {
            4.0
        } else {
            (0.9 * err_norm.powf(-1.0 / 3.0)).clamp(0.25, 4.0)
        };
        h = (h * factor).max(opts.h_min).min(opts.h_max);
    }

    if t < t1 - opts.h_min {
        return Err(OdeError::StepLimitExceeded {
            max_steps: opts.max_steps,
            t,
            t_end: t1,
        });
    }
    debug!("sdirk: {accepted} accepted steps over [{t0}, {t1}]");
    Ok(sol)
}
