//! # Gaussian-Process Light-Curve Interpolation
//!
//! Two-dimensional (time × wavelength) Gaussian-process regression over the
//! normalized photometry, producing a dense flux and uncertainty estimate at
//! every observation epoch for every observed filter.
//!
//! ## Overview
//! -----------------
//! This module provides:
//! - The kernel and marginal-likelihood machinery in [`kernel`], optimized
//!   with L-BFGS and a More-Thuente line search.
//! - The driver [`interpolate`], which optionally seeds the regression with
//!   an [`AlignedTemplate`] as mean function, optimizes the hyperparameters
//!   and fills the [`DenseLightCurve`].
//!
//! ## Units & Conventions
//! -----------------
//! - **Inputs:** epochs in days since the first surviving observation,
//!   wavelengths in normalized kilo-Angstrom; the initial squared length
//!   scales (50 days², 0.5 kÅ²) are tuned to these units.
//! - **Mean function:** the aligned template is a surface over *physical*
//!   wavelength, so queries restore Angstroms through the normalization
//!   context before evaluating it.
//! - **Output:** predictive means stay on the normalized log-flux scale;
//!   predictive variances exclude the per-point noise and are returned as
//!   standard deviations.
//!
//! ## Error Handling
//! -----------------
//! A covariance matrix that loses positive definiteness, during the
//! hyperparameter search or at the optimum, is fatal for the light curve.
//! There is no fallback regression model.
use argmin::core::{Executor, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use nalgebra::{DMatrix, DVector};

use crate::bolfit_errors::BolfitError;
use crate::constants::{Day, KiloAngstrom};
use crate::photometry::PhotometrySet;
use crate::templates::AlignedTemplate;

pub mod kernel;

use kernel::{GpProblem, INITIAL_TIME_METRIC, INITIAL_WAVELENGTH_METRIC};

/// L-BFGS memory length.
const GP_LBFGS_MEMORY: usize = 7;

/// Dense flux/uncertainty surface produced by the interpolation.
///
/// One row per *original observation* (epochs repeat when several filters
/// share one), one column per unique filter wavelength, ascending.
#[derive(Debug, Clone)]
pub struct DenseLightCurve {
    /// Epochs in observation order, one per input observation.
    pub epochs: Vec<Day>,
    /// Unique normalized filter wavelengths, ascending.
    pub wavelengths: Vec<KiloAngstrom>,
    /// Predictive mean log-flux, `epochs.len()` rows by `wavelengths.len()` columns.
    pub fluxes: DMatrix<f64>,
    /// Predictive standard deviation, same shape as `fluxes`.
    pub sigmas: DMatrix<f64>,
}

impl DenseLightCurve {
    pub fn n_epochs(&self) -> usize {
        self.epochs.len()
    }

    pub fn n_filters(&self) -> usize {
        self.wavelengths.len()
    }
}

/// Interpolate the photometry onto the dense epoch × filter grid.
///
/// Fits the squared-exponential hyperparameters by maximizing the log
/// marginal likelihood (via L-BFGS on its negative), then queries the
/// posterior at every observation epoch paired with every unique filter
/// wavelength.
///
/// Arguments
/// -----------------
/// * `photometry` – Normalized observation set.
/// * `mean` – Optional aligned template used as the GP mean function; `None`
///   regresses around zero.
/// * `max_iters` – Iteration cap for the L-BFGS hyperparameter search.
///
/// Return
/// ----------
/// * The [`DenseLightCurve`], or a fatal [`BolfitError`] when the covariance
///   turns singular or the optimizer aborts.
///
/// See also
/// ------------
/// * [`GpProblem`] – Likelihood and analytic gradient.
/// * [`AlignedTemplate::log_flux`] – Mean-function evaluation.
pub fn interpolate(
    photometry: &PhotometrySet,
    mean: Option<&AlignedTemplate>,
    max_iters: u64,
) -> Result<DenseLightCurve, BolfitError> {
    let observations = &photometry.observations;
    let n = observations.len();
    let wavelengths = photometry.unique_wavelengths();

    let inputs: Vec<[f64; 2]> = observations
        .iter()
        .map(|obs| [obs.time, obs.filter_wavelength])
        .collect();
    let uncertainties: Vec<f64> = observations.iter().map(|obs| obs.uncertainty).collect();

    // The template surface lives over physical wavelength; queries restore
    // Angstroms through the normalization context.
    let mean_at = |time: f64, wavelength: f64| -> f64 {
        match mean {
            Some(template) => template.log_flux(
                time,
                wavelength * 1000.0 + photometry.context.wavelength_correction,
            ),
            None => 0.0,
        }
    };

    let residuals = DVector::from_iterator(
        n,
        observations
            .iter()
            .map(|obs| obs.log_flux - mean_at(obs.time, obs.filter_wavelength)),
    );

    let problem = GpProblem::new(&inputs, &uncertainties, residuals.clone());

    // Degenerate all-equal flux sets keep a positive kernel amplitude.
    let variance = photometry.flux_variance().max(f64::MIN_POSITIVE);
    let theta0 = vec![
        variance.ln(),
        INITIAL_TIME_METRIC.ln(),
        INITIAL_WAVELENGTH_METRIC.ln(),
    ];

    let linesearch = MoreThuenteLineSearch::new();
    let solver = LBFGS::new(linesearch, GP_LBFGS_MEMORY);
    let initial = theta0.clone();
    let result = Executor::new(problem.clone(), solver)
        .configure(|state| state.param(initial).max_iters(max_iters))
        .run()
        .map_err(|err| BolfitError::GpSolverError(err.to_string()))?;
    let theta = result.state().get_best_param().cloned().unwrap_or(theta0);

    tracing::info!(
        amplitude = theta[0].exp(),
        time_metric = theta[1].exp(),
        wavelength_metric = theta[2].exp(),
        iterations = result.state().get_iter(),
        nll = result.state().get_best_cost(),
        "gaussian process hyperparameters optimized"
    );

    let chol = problem.factorized_covariance(&theta)?;
    let alpha = chol.solve(&residuals);
    let (amplitude, m_t, m_w) = (theta[0].exp(), theta[1].exp(), theta[2].exp());

    let mut fluxes = DMatrix::<f64>::zeros(n, wavelengths.len());
    let mut sigmas = DMatrix::<f64>::zeros(n, wavelengths.len());

    for (jj, obs) in observations.iter().enumerate() {
        for (k, &wavelength) in wavelengths.iter().enumerate() {
            let kstar = DVector::from_iterator(
                n,
                inputs.iter().map(|input| {
                    let dt = input[0] - obs.time;
                    let dw = input[1] - wavelength;
                    amplitude * (-0.5 * (dt * dt / m_t + dw * dw / m_w)).exp()
                }),
            );

            fluxes[(jj, k)] = mean_at(obs.time, wavelength) + kstar.dot(&alpha);

            // Noise-free predictive variance; clipped at zero against
            // round-off before the square root.
            let solved = chol.solve(&kstar);
            let variance = amplitude - kstar.dot(&solved);
            sigmas[(jj, k)] = variance.max(0.0).sqrt();
        }
    }

    Ok(DenseLightCurve {
        epochs: observations.iter().map(|obs| obs.time).collect(),
        wavelengths,
        fluxes,
        sigmas,
    })
}
