//! # Damped Least-Squares Curve Fitting
//!
//! Generic Levenberg-Marquardt engine shared by the template alignment and
//! blackbody stages.
//!
//! ## Overview
//! -----------------
//! This module provides:
//! - The model trait [`CurveFitModel`], parameterized by the number of free
//!   parameters `N`, with a finite-difference jacobian fallback and an optional
//!   parameter constraint hook applied after every accepted step.
//! - The solver [`curve_fit`], a damped normal-equations iteration
//!   `(JᵀJ + λ·diag(JᵀJ))·δ = Jᵀr` with multiplicative damping control.
//! - The result type [`FitReport`] carrying best-fit parameters, the scaled
//!   parameter covariance and the final chi-square.
//!
//! ## Weighting & Covariance
//! -----------------
//! When per-point uncertainties are supplied, residuals and jacobian rows are
//! scaled by `1/σᵢ` so the minimized quantity is the standard chi-square. The
//! reported covariance is `(JᵀJ)⁻¹ · χ²/(n − N)`, i.e. the uncertainties are
//! rescaled by the reduced chi-square of the fit. With the degrees of freedom
//! exhausted (`n <= N`) the covariance is reported as infinite.
//!
//! ## Convergence
//! -----------------
//! The fit is declared converged when an accepted step's infinity norm falls
//! below `step_tolerance` or the chi-square change drops below
//! `chi2_tolerance` relative to the current chi-square. The iteration stops
//! without convergence when the damping factor overflows (the normal
//! equations stopped producing useful directions) or after `max_iterations`;
//! callers decide whether a non-converged fit is fatal for their stage.
//!
//! ## See also
//! ------------
//! * [`crate::templates`] – Template alignment fits (3 parameters, unweighted).
//! * [`crate::blackbody`] – Per-epoch blackbody fits (2 parameters, weighted).
use nalgebra::{Const, DimMin, SMatrix, SVector};

use crate::bolfit_errors::BolfitError;

/// Relative scale of the central finite-difference step used by the default
/// jacobian implementation.
const FINITE_DIFF_STEP: f64 = 1e-6;

/// A scalar model `y = f(x; p)` that can be fit with [`curve_fit`].
///
/// Implementors provide the model value; the jacobian defaults to central
/// finite differences and can be overridden with analytic derivatives where
/// they are cheap to write down.
pub trait CurveFitModel<const N: usize> {
    /// Evaluate the model at `x` for the given parameter vector.
    fn value(&self, x: f64, params: &SVector<f64, N>) -> f64;

    /// Partial derivatives `∂f/∂pⱼ` at `x`.
    ///
    /// The default implementation uses central differences with a per-parameter
    /// step `h = 1e-6 · (1 + |pⱼ|)`.
    fn jacobian_row(&self, x: f64, params: &SVector<f64, N>) -> SVector<f64, N> {
        let mut row = SVector::<f64, N>::zeros();
        for j in 0..N {
            let h = FINITE_DIFF_STEP * (1.0 + params[j].abs());
            let mut forward = *params;
            let mut backward = *params;
            forward[j] += h;
            backward[j] -= h;
            row[j] = (self.value(x, &forward) - self.value(x, &backward)) / (2.0 * h);
        }
        row
    }

    /// Project a trial parameter vector back into the feasible region.
    ///
    /// Called on every trial step before its chi-square is evaluated, so the
    /// solver never accepts parameters outside the constraint set. The default
    /// is unconstrained.
    fn constrain(&self, _params: &mut SVector<f64, N>) {}
}

/// Tuning knobs for [`curve_fit`].
///
/// The defaults suit the small (2-3 parameter) fits in this crate; the
/// template alignment raises `max_iterations` because its chi-square surface
/// is shallow along the time-stretch axis.
#[derive(Debug, Clone)]
pub struct CurveFitSettings {
    /// Hard cap on solver iterations.
    pub max_iterations: usize,
    /// Accepted-step infinity-norm below which the fit is declared converged.
    pub step_tolerance: f64,
    /// Relative chi-square change below which the fit is declared converged,
    /// whether the trial step was accepted or not.
    pub chi2_tolerance: f64,
    /// Initial damping factor `λ`.
    pub initial_damping: f64,
    /// Multiplier applied to `λ` after a rejected step.
    pub damping_up: f64,
    /// Multiplier applied to `λ` after an accepted step.
    pub damping_down: f64,
}

impl Default for CurveFitSettings {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            step_tolerance: 1e-10,
            chi2_tolerance: 1.49e-8,
            initial_damping: 1e-3,
            damping_up: 10.0,
            damping_down: 0.1,
        }
    }
}

/// Outcome of a [`curve_fit`] run.
#[derive(Debug, Clone)]
pub struct FitReport<const N: usize> {
    /// Best-fit parameter vector.
    pub params: SVector<f64, N>,
    /// Parameter covariance, scaled by the reduced chi-square.
    pub covariance: SMatrix<f64, N, N>,
    /// Chi-square at `params` (sum of squared weighted residuals).
    pub chi2: f64,
    /// Whether the step-tolerance criterion was met.
    pub converged: bool,
    /// Number of iterations actually performed.
    pub iterations: usize,
}

impl<const N: usize> FitReport<N> {
    /// 1-sigma parameter uncertainties, `sqrt(diag(covariance))`.
    pub fn parameter_errors(&self) -> SVector<f64, N> {
        SVector::<f64, N>::from_fn(|i, _| self.covariance[(i, i)].sqrt())
    }
}

/// Fit `model` to the points `(x, y)` by damped least squares.
///
/// Residuals are `(yᵢ - f(xᵢ))/σᵢ` when `sigma` is given, plain differences
/// otherwise. The trial step solves `(JᵀJ + λ·diag(JᵀJ))·δ = Jᵀr` and is
/// accepted only when it lowers the chi-square, with `λ` shrunk on success and
/// inflated on rejection.
///
/// Arguments
/// -----------------
/// * `model` – Model implementation providing values and derivatives.
/// * `x` – Abscissae of the data points.
/// * `y` – Observed values, same length as `x`.
/// * `sigma` – Optional 1-sigma uncertainties for chi-square weighting.
/// * `initial` – Starting parameter vector.
/// * `settings` – Damping and convergence configuration.
///
/// Return
/// ----------
/// * A [`FitReport`] with best-fit parameters, covariance and chi-square, or
///   a [`BolfitError::CurveFitFailed`] when the inputs cannot support a fit
///   (mismatched lengths, or fewer points than parameters).
///
/// See also
/// ------------
/// * [`CurveFitModel::constrain`] – Feasible-region projection applied to every trial step.
/// * [`FitReport::parameter_errors`] – Square-rooted covariance diagonal.
pub fn curve_fit<const N: usize, M: CurveFitModel<N>>(
    model: &M,
    x: &[f64],
    y: &[f64],
    sigma: Option<&[f64]>,
    initial: SVector<f64, N>,
    settings: &CurveFitSettings,
) -> Result<FitReport<N>, BolfitError>
where
    Const<N>: DimMin<Const<N>, Output = Const<N>>,
{
    if x.len() != y.len() {
        return Err(BolfitError::CurveFitFailed {
            stage: "setup".to_string(),
            detail: format!("{} abscissae for {} observed values", x.len(), y.len()),
        });
    }
    if let Some(s) = sigma {
        if s.len() != x.len() {
            return Err(BolfitError::CurveFitFailed {
                stage: "setup".to_string(),
                detail: format!("{} uncertainties for {} data points", s.len(), x.len()),
            });
        }
    }
    if x.len() < N {
        return Err(BolfitError::CurveFitFailed {
            stage: "setup".to_string(),
            detail: format!("{} data points cannot constrain {N} parameters", x.len()),
        });
    }

    let weight = |i: usize| sigma.map_or(1.0, |s| 1.0 / s[i]);

    let chi2_at = |params: &SVector<f64, N>| -> f64 {
        x.iter()
            .zip(y)
            .enumerate()
            .map(|(i, (&xi, &yi))| {
                let r = (yi - model.value(xi, params)) * weight(i);
                r * r
            })
            .sum()
    };

    let mut params = initial;
    model.constrain(&mut params);
    let mut lambda = settings.initial_damping;
    let mut prev_chi2 = chi2_at(&params);
    let mut converged = false;
    let mut iterations = 0;

    for iter in 0..settings.max_iterations {
        iterations = iter + 1;

        let mut hessian = SMatrix::<f64, N, N>::zeros();
        let mut gradient = SVector::<f64, N>::zeros();
        for (i, (&xi, &yi)) in x.iter().zip(y).enumerate() {
            let w = weight(i);
            let row = model.jacobian_row(xi, &params) * w;
            let r = (yi - model.value(xi, &params)) * w;
            hessian += row * row.transpose();
            gradient += row * r;
        }

        let mut damped = hessian;
        for i in 0..N {
            damped[(i, i)] *= 1.0 + lambda;
        }

        let Some(delta) = damped.lu().solve(&gradient) else {
            break;
        };

        let mut new_params = params + delta;
        model.constrain(&mut new_params);
        let new_chi2 = chi2_at(&new_params);

        if new_chi2.is_finite() && new_chi2 < prev_chi2 {
            let reduction = prev_chi2 - new_chi2;
            params = new_params;
            prev_chi2 = new_chi2;
            lambda *= settings.damping_down;

            if delta.amax() < settings.step_tolerance
                || reduction <= settings.chi2_tolerance * prev_chi2
            {
                converged = true;
                break;
            }
        } else {
            // A trial that cannot measurably change the chi-square anymore
            // means the fit sits at a flat minimum.
            if new_chi2.is_finite()
                && (new_chi2 - prev_chi2).abs() <= settings.chi2_tolerance * prev_chi2
            {
                converged = true;
                break;
            }
            lambda *= settings.damping_up;
            if lambda > 1e10 {
                break;
            }
        }
    }

    // Covariance from the unscaled normal matrix at the accepted parameters.
    let mut hessian = SMatrix::<f64, N, N>::zeros();
    for (i, &xi) in x.iter().enumerate() {
        let row = model.jacobian_row(xi, &params) * weight(i);
        hessian += row * row.transpose();
    }

    let dof = x.len() as f64 - N as f64;
    let covariance = match hessian.try_inverse() {
        Some(inv) if dof > 0.0 => inv * (prev_chi2 / dof),
        _ => SMatrix::<f64, N, N>::repeat(f64::INFINITY),
    };

    Ok(FitReport {
        params,
        covariance,
        chi2: prev_chi2,
        converged,
        iterations,
    })
}

#[cfg(test)]
mod test_curve_fit {
    use super::*;

    struct Line;

    impl CurveFitModel<2> for Line {
        fn value(&self, x: f64, params: &SVector<f64, 2>) -> f64 {
            params[0] + params[1] * x
        }

        fn jacobian_row(&self, x: f64, _params: &SVector<f64, 2>) -> SVector<f64, 2> {
            SVector::<f64, 2>::new(1.0, x)
        }
    }

    struct ExpDecay;

    impl CurveFitModel<2> for ExpDecay {
        fn value(&self, x: f64, params: &SVector<f64, 2>) -> f64 {
            params[0] * (-x / params[1]).exp()
        }
    }

    struct NonNegativeLine;

    impl CurveFitModel<2> for NonNegativeLine {
        fn value(&self, x: f64, params: &SVector<f64, 2>) -> f64 {
            params[0] + params[1] * x
        }

        fn constrain(&self, params: &mut SVector<f64, 2>) {
            params[1] = params[1].max(0.0);
        }
    }

    #[test]
    fn test_linear_fit_recovers_exact_parameters() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&xi| 3.5 - 0.75 * xi).collect();

        let report = curve_fit(
            &Line,
            &x,
            &y,
            None,
            SVector::<f64, 2>::new(0.0, 0.0),
            &CurveFitSettings::default(),
        )
        .unwrap();

        assert!(report.converged);
        assert!((report.params[0] - 3.5).abs() < 1e-8);
        assert!((report.params[1] + 0.75).abs() < 1e-8);
        assert!(report.chi2 < 1e-12);
    }

    #[test]
    fn test_finite_difference_jacobian_fits_nonlinear_model() {
        let x: Vec<f64> = (0..30).map(|i| 0.25 * i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&xi| 3.0 * (-xi / 2.0).exp()).collect();

        let report = curve_fit(
            &ExpDecay,
            &x,
            &y,
            None,
            SVector::<f64, 2>::new(1.0, 1.0),
            &CurveFitSettings::default(),
        )
        .unwrap();

        assert!(report.converged);
        assert!((report.params[0] - 3.0).abs() < 1e-6);
        assert!((report.params[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_weights_downweight_uncertain_points() {
        // One wildly discrepant point with a huge uncertainty must not move
        // the fit away from the consensus of the precise points.
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 1.0, 1.0, 50.0];
        let sigma = [0.01, 0.01, 0.01, 1e6];

        let report = curve_fit(
            &Line,
            &x,
            &y,
            Some(&sigma),
            SVector::<f64, 2>::new(0.0, 0.0),
            &CurveFitSettings::default(),
        )
        .unwrap();

        assert!((report.params[0] - 1.0).abs() < 1e-4);
        assert!(report.params[1].abs() < 1e-4);
    }

    #[test]
    fn test_constraint_keeps_slope_non_negative() {
        // Data with a clearly negative trend; the constrained model must pin
        // the slope at zero instead of going negative.
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&xi| 10.0 - 2.0 * xi).collect();

        let report = curve_fit(
            &NonNegativeLine,
            &x,
            &y,
            None,
            SVector::<f64, 2>::new(0.0, 1.0),
            &CurveFitSettings::default(),
        )
        .unwrap();

        assert!(report.params[1] >= 0.0);
    }

    #[test]
    fn test_iteration_cap_reports_non_convergence() {
        let x: Vec<f64> = (0..30).map(|i| 0.25 * i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&xi| 3.0 * (-xi / 2.0).exp()).collect();

        let settings = CurveFitSettings {
            max_iterations: 1,
            ..Default::default()
        };
        let report = curve_fit(
            &ExpDecay,
            &x,
            &y,
            None,
            SVector::<f64, 2>::new(1.0, 1.0),
            &settings,
        )
        .unwrap();

        assert!(!report.converged);
        assert_eq!(report.iterations, 1);
    }

    #[test]
    fn test_too_few_points_is_an_error() {
        let result = curve_fit(
            &Line,
            &[1.0],
            &[2.0],
            None,
            SVector::<f64, 2>::zeros(),
            &CurveFitSettings::default(),
        );

        assert!(matches!(
            result,
            Err(BolfitError::CurveFitFailed { .. })
        ));
    }

    #[test]
    fn test_covariance_matches_noisy_linear_regression() {
        // Fixed pseudo-noise so the closed-form ordinary-least-squares answer
        // is reproducible.
        let x: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let noise = [
            0.021, -0.034, 0.012, 0.044, -0.018, 0.007, -0.041, 0.029, 0.015, -0.026, 0.038,
            -0.009,
        ];
        let y: Vec<f64> = x
            .iter()
            .zip(noise)
            .map(|(&xi, n)| 2.0 + 0.5 * xi + n)
            .collect();

        let report = curve_fit(
            &Line,
            &x,
            &y,
            None,
            SVector::<f64, 2>::zeros(),
            &CurveFitSettings::default(),
        )
        .unwrap();

        // Closed-form OLS slope/intercept.
        let n = x.len() as f64;
        let sx: f64 = x.iter().sum();
        let sy: f64 = y.iter().sum();
        let sxx: f64 = x.iter().map(|v| v * v).sum();
        let sxy: f64 = x.iter().zip(&y).map(|(a, b)| a * b).sum();
        let slope = (n * sxy - sx * sy) / (n * sxx - sx * sx);
        let intercept = (sy - slope * sx) / n;

        assert!((report.params[0] - intercept).abs() < 1e-8);
        assert!((report.params[1] - slope).abs() < 1e-8);

        let errors = report.parameter_errors();
        assert!(errors[0].is_finite() && errors[0] > 0.0);
        assert!(errors[1].is_finite() && errors[1] > 0.0);
    }
}
