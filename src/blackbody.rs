//! # Per-Epoch Blackbody Fitting
//!
//! Turns each epoch of the dense light curve into a blackbody temperature and
//! radius, then into a bolometric luminosity through Stefan-Boltzmann. The
//! flux reconstruction and the fitted spectrum follow the SuperBol approach
//! (Nicholl 2018, RNAAS 2, 230).
//!
//! ## Overview
//! -----------------
//! This module provides:
//! - The Planck spectrum model [`BlackbodySpectrum`] with analytic
//!   derivatives, fit per epoch with [`crate::fitting::curve_fit`].
//! - The two-arm epoch result [`BlackbodyFit`] and the per-run container
//!   [`BlackbodyCurve`].
//! - The driver [`fit_blackbody_curve`], which undoes the flux normalization,
//!   rebuilds physical spectral flux densities and runs the weighted fits.
//!
//! ## Units & Conventions
//! -----------------
//! - Dense light-curve values plus the flux correction are `-1` times the AB
//!   magnitude; magnitudes are absolute, so fluxes are reconstructed at the
//!   10-parsec fiducial distance.
//! - Spectra are fit in `F_lambda` (erg/s/cm), wavelengths in physical
//!   Angstrom, temperatures in Kelvin, radii in centimeters.
//!
//! ## Error Handling
//! -----------------
//! Non-convergence is epoch-local: the epoch is marked
//! [`BlackbodyFit::NonConvergent`] and the run continues. Inputs that cannot
//! support any fit at all (fewer filters than parameters) are fatal.
use nalgebra::SVector;
use tracing::{debug, warn};

use crate::{
    bolfit_errors::BolfitError,
    constants::{
        Angstrom, Centimeter, ErgPerSec, Kelvin, LogFlux, ANG_TO_CM, AB_MAG_OFFSET,
        BOLTZMANN_CGS, DPI, LN10_OVER_2P5, PLANCK_CGS, STEFAN_BOLTZMANN_CGS, TEN_PARSEC_CM,
        VLIGHT_CGS,
    },
    fitting::{curve_fit, CurveFitModel, CurveFitSettings},
    gaussian_process::DenseLightCurve,
};

/// Initial temperature guess, in Kelvin.
const BB_INITIAL_TEMPERATURE: Kelvin = 9000.0;

/// Initial radius guess, in centimeters.
const BB_INITIAL_RADIUS: Centimeter = 1e15;

/// Spectral radiance prefactor times geometry, `L_lambda(λ; T, R)` in erg/s/cm.
///
/// `L_lambda = 4πR² · (2πhc²/λ⁵) / (exp(hc/(λ k_B T)) − 1)` with `λ` in cm.
pub struct BlackbodySpectrum;

/// `(2πhc²/λ⁵) / (exp(hc/(λ k_B T)) − 1)`, the surface flux density in
/// erg/s/cm²/cm. Overflow of the exponential collapses to zero flux.
fn planck_radiance(lam_cm: Centimeter, temperature: Kelvin) -> f64 {
    let x = PLANCK_CGS * VLIGHT_CGS / (lam_cm * BOLTZMANN_CGS * temperature);
    DPI * PLANCK_CGS * VLIGHT_CGS * VLIGHT_CGS / lam_cm.powi(5) / x.exp_m1()
}

impl CurveFitModel<2> for BlackbodySpectrum {
    /// Model value at `wavelength` (Angstrom) for parameters `(T, R)`.
    fn value(&self, wavelength: f64, params: &SVector<f64, 2>) -> f64 {
        let radius = params[1];
        2.0 * DPI * radius * radius * planck_radiance(wavelength * ANG_TO_CM, params[0])
    }

    /// Analytic `(∂L/∂T, ∂L/∂R)`.
    ///
    /// The temperature derivative is written as
    /// `L · (x/T) / (1 − e^{−x})` so it underflows to zero together with the
    /// model value instead of producing `inf/inf` on the Wien tail.
    fn jacobian_row(&self, wavelength: f64, params: &SVector<f64, 2>) -> SVector<f64, 2> {
        let (temperature, radius) = (params[0], params[1]);
        let lam_cm = wavelength * ANG_TO_CM;
        let x = PLANCK_CGS * VLIGHT_CGS / (lam_cm * BOLTZMANN_CGS * temperature);
        let radiance = planck_radiance(lam_cm, temperature);

        let value = 2.0 * DPI * radius * radius * radiance;
        let d_temperature = value * (x / temperature) / -(-x).exp_m1();
        let d_radius = 4.0 * DPI * radius * radiance;
        SVector::<f64, 2>::new(d_temperature, d_radius)
    }
}

/// Outcome of one epoch's blackbody fit.
///
/// The radius sign is unphysical in the spectrum (it only enters squared), so
/// the converged arm stores its absolute value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlackbodyFit {
    Converged {
        temperature: Kelvin,
        radius: Centimeter,
        temperature_err: Kelvin,
        radius_err: Centimeter,
    },
    NonConvergent,
}

impl BlackbodyFit {
    /// Bolometric luminosity and its 1-sigma error, in erg/s.
    ///
    /// `L = 4πR²σT⁴` and
    /// `ΔL = 4πσ·sqrt((2RT⁴ΔR)² + (4T³R²ΔT)²)`. A non-convergent epoch
    /// yields `(NaN, NaN)`.
    pub fn luminosity(&self) -> (ErgPerSec, ErgPerSec) {
        match *self {
            BlackbodyFit::Converged {
                temperature,
                radius,
                temperature_err,
                radius_err,
            } => {
                let lum = 2.0
                    * DPI
                    * radius.powi(2)
                    * STEFAN_BOLTZMANN_CGS
                    * temperature.powi(4);
                let err = 2.0
                    * DPI
                    * STEFAN_BOLTZMANN_CGS
                    * ((2.0 * radius * temperature.powi(4) * radius_err).powi(2)
                        + (4.0 * temperature.powi(3) * radius.powi(2) * temperature_err)
                            .powi(2))
                    .sqrt();
                (lum, err)
            }
            BlackbodyFit::NonConvergent => (f64::NAN, f64::NAN),
        }
    }

    pub fn temperature(&self) -> Kelvin {
        match *self {
            BlackbodyFit::Converged { temperature, .. } => temperature,
            BlackbodyFit::NonConvergent => f64::NAN,
        }
    }

    pub fn radius(&self) -> Centimeter {
        match *self {
            BlackbodyFit::Converged { radius, .. } => radius,
            BlackbodyFit::NonConvergent => f64::NAN,
        }
    }

    pub fn temperature_err(&self) -> Kelvin {
        match *self {
            BlackbodyFit::Converged {
                temperature_err, ..
            } => temperature_err,
            BlackbodyFit::NonConvergent => f64::NAN,
        }
    }

    pub fn radius_err(&self) -> Centimeter {
        match *self {
            BlackbodyFit::Converged { radius_err, .. } => radius_err,
            BlackbodyFit::NonConvergent => f64::NAN,
        }
    }
}

/// Per-epoch blackbody fits plus the derived bolometric curve.
///
/// Entries are index-aligned with the dense light curve's epochs. Luminosities
/// are computed once here, never refit downstream.
#[derive(Debug, Clone)]
pub struct BlackbodyCurve {
    pub fits: Vec<BlackbodyFit>,
    pub luminosity: Vec<ErgPerSec>,
    pub luminosity_err: Vec<ErgPerSec>,
}

impl BlackbodyCurve {
    pub fn len(&self) -> usize {
        self.fits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fits.is_empty()
    }
}

/// Fit one blackbody per dense epoch.
///
/// Re-adds `flux_correction` so values read `-AB magnitude`, reconstructs
/// `F_nu` at the 10-parsec fiducial, converts to `F_lambda` at each filter's
/// physical wavelength, then runs the weighted 2-parameter fit.
///
/// Arguments
/// -----------------
/// * `dense` – GP-interpolated light curve (normalized log-flux scale).
/// * `wavelengths` – Physical effective wavelength of each dense column, Å.
/// * `flux_correction` – Offset removed during normalization.
/// * `max_iterations` – Iteration budget per epoch fit.
///
/// Return
/// ----------
/// * A [`BlackbodyCurve`] with one entry per epoch, or a fatal
///   [`BolfitError`] when the filter set cannot constrain the fit at all.
///
/// See also
/// ------------
/// * [`BlackbodyFit::luminosity`] – Stefan-Boltzmann conversion per epoch.
pub fn fit_blackbody_curve(
    dense: &DenseLightCurve,
    wavelengths: &[Angstrom],
    flux_correction: LogFlux,
    max_iterations: usize,
) -> Result<BlackbodyCurve, BolfitError> {
    let nfilts = dense.n_filters();
    if wavelengths.len() != nfilts {
        return Err(BolfitError::CurveFitFailed {
            stage: "blackbody setup".to_string(),
            detail: format!(
                "{} reference wavelengths for {} dense filter columns",
                wavelengths.len(),
                nfilts
            ),
        });
    }

    let area_scale = 2.0 * DPI * TEN_PARSEC_CM.powi(2);
    let settings = CurveFitSettings {
        max_iterations,
        ..Default::default()
    };

    let mut fits = Vec::with_capacity(dense.n_epochs());
    let mut luminosity = Vec::with_capacity(dense.n_epochs());
    let mut luminosity_err = Vec::with_capacity(dense.n_epochs());

    for (epoch, &time) in dense.epochs.iter().enumerate() {
        let mut flam = Vec::with_capacity(nfilts);
        let mut flam_err = Vec::with_capacity(nfilts);
        for (k, &wavelength) in wavelengths.iter().enumerate() {
            // Stored value is -AB magnitude once the offset is restored.
            let value = dense.fluxes[(epoch, k)] + flux_correction;
            let sigma = dense.sigmas[(epoch, k)];

            let fnu = 10f64.powf((value - AB_MAG_OFFSET) / 2.5) * area_scale;
            let fnu_err =
                (LN10_OVER_2P5 * 10f64.powf(0.4 * value - 19.44)).abs() * sigma * area_scale;

            let lam_cm2 = (wavelength * ANG_TO_CM).powi(2);
            flam.push(fnu * VLIGHT_CGS / lam_cm2);
            flam_err.push(fnu_err * VLIGHT_CGS / lam_cm2);
        }

        let report = curve_fit(
            &BlackbodySpectrum,
            wavelengths,
            &flam,
            Some(&flam_err),
            SVector::<f64, 2>::new(BB_INITIAL_TEMPERATURE, BB_INITIAL_RADIUS),
            &settings,
        )?;

        let fit = if report.converged {
            let errors = report.parameter_errors();
            debug!(
                time,
                temperature = report.params[0],
                radius = report.params[1].abs(),
                chi2 = report.chi2,
                "blackbody epoch fit"
            );
            BlackbodyFit::Converged {
                temperature: report.params[0],
                radius: report.params[1].abs(),
                temperature_err: errors[0],
                radius_err: errors[1],
            }
        } else {
            warn!(time, "blackbody fit did not converge, epoch dropped");
            BlackbodyFit::NonConvergent
        };

        let (lum, err) = fit.luminosity();
        fits.push(fit);
        luminosity.push(lum);
        luminosity_err.push(err);
    }

    Ok(BlackbodyCurve {
        fits,
        luminosity,
        luminosity_err,
    })
}

#[cfg(test)]
mod test_blackbody {
    use super::*;
    use nalgebra::DMatrix;

    /// Invert the reconstruction chain: the stored value whose `F_lambda`
    /// equals the model spectrum at `wavelength`.
    fn stored_value(temperature: f64, radius: f64, wavelength: f64) -> f64 {
        let spectrum = BlackbodySpectrum;
        let flam = spectrum.value(
            wavelength,
            &SVector::<f64, 2>::new(temperature, radius),
        );
        let lam_cm2 = (wavelength * ANG_TO_CM).powi(2);
        let fnu = flam * lam_cm2 / VLIGHT_CGS / (2.0 * DPI * TEN_PARSEC_CM.powi(2));
        2.5 * fnu.log10() + AB_MAG_OFFSET
    }

    fn dense_from_rows(values: &[Vec<f64>], sigmas: &[Vec<f64>], wavelengths: &[f64]) -> DenseLightCurve {
        let n = values.len();
        let nfilts = wavelengths.len();
        DenseLightCurve {
            epochs: (0..n).map(|i| i as f64).collect(),
            wavelengths: wavelengths.iter().map(|w| w / 1000.0).collect(),
            fluxes: DMatrix::from_fn(n, nfilts, |i, k| values[i][k]),
            sigmas: DMatrix::from_fn(n, nfilts, |i, k| sigmas[i][k]),
        }
    }

    #[test]
    fn test_jacobian_matches_finite_differences() {
        let spectrum = BlackbodySpectrum;
        let params = SVector::<f64, 2>::new(7500.0, 1.8e15);
        for &wavelength in &[3600.0, 5000.0, 8000.0] {
            let analytic = spectrum.jacobian_row(wavelength, &params);
            let mut numeric = SVector::<f64, 2>::zeros();
            for j in 0..2 {
                let h = 1e-7 * params[j].abs();
                let mut fwd = params;
                let mut bwd = params;
                fwd[j] += h;
                bwd[j] -= h;
                numeric[j] =
                    (spectrum.value(wavelength, &fwd) - spectrum.value(wavelength, &bwd))
                        / (2.0 * h);
            }
            for j in 0..2 {
                let tol = 1e-5 * numeric[j].abs().max(1e-30);
                assert!(
                    (analytic[j] - numeric[j]).abs() < tol,
                    "wavelength {wavelength}, parameter {j}"
                );
            }
        }
    }

    #[test]
    fn test_wien_tail_underflows_without_nan() {
        let spectrum = BlackbodySpectrum;
        // hc/(λ k_B T) far beyond exp overflow
        let params = SVector::<f64, 2>::new(10.0, 1e15);
        let value = spectrum.value(1000.0, &params);
        let row = spectrum.jacobian_row(1000.0, &params);
        assert_eq!(value, 0.0);
        assert!(row[0].is_finite() && row[1].is_finite());
    }

    #[test]
    fn test_noiseless_recovery_below_one_percent() {
        let (t_true, r_true) = (8000.0, 2e15);
        let wavelengths = [3600.0, 4700.0, 6200.0, 7600.0];
        let row: Vec<f64> = wavelengths
            .iter()
            .map(|&w| stored_value(t_true, r_true, w))
            .collect();
        let sigma_row = vec![0.02; wavelengths.len()];

        let dense = dense_from_rows(
            &[row.clone(), row.clone(), row],
            &[sigma_row.clone(), sigma_row.clone(), sigma_row],
            &wavelengths,
        );
        let curve = fit_blackbody_curve(&dense, &wavelengths, 0.0, 200).unwrap();

        assert_eq!(curve.len(), 3);
        for fit in &curve.fits {
            assert!((fit.temperature() - t_true).abs() / t_true < 0.01);
            assert!((fit.radius() - r_true).abs() / r_true < 0.01);
            assert!(fit.temperature_err().is_finite());
            assert!(fit.radius_err().is_finite());
        }
    }

    #[test]
    fn test_flux_correction_is_restored_before_fitting() {
        // Same spectrum, but stored on the normalized scale: shifting every
        // value down by the correction must reproduce the same fit.
        let (t_true, r_true) = (9500.0, 1.2e15);
        let wavelengths = [3600.0, 4700.0, 6200.0, 7600.0];
        let correction = -14.5;
        let row: Vec<f64> = wavelengths
            .iter()
            .map(|&w| stored_value(t_true, r_true, w) - correction)
            .collect();
        let sigma_row = vec![0.02; wavelengths.len()];

        let dense = dense_from_rows(&[row], &[sigma_row], &wavelengths);
        let curve = fit_blackbody_curve(&dense, &wavelengths, correction, 200).unwrap();

        assert!((curve.fits[0].temperature() - t_true).abs() / t_true < 0.01);
        assert!((curve.fits[0].radius() - r_true).abs() / r_true < 0.01);
    }

    #[test]
    fn test_closed_form_luminosity() {
        let fit = BlackbodyFit::Converged {
            temperature: 1e4,
            radius: 1e15,
            temperature_err: 0.0,
            radius_err: 0.0,
        };
        let (lum, err) = fit.luminosity();
        let expected = 2.0 * DPI * 1e30 * STEFAN_BOLTZMANN_CGS * 1e16;
        assert!((lum - expected).abs() / expected < 1e-12);
        assert_eq!(err, 0.0);
    }

    #[test]
    fn test_luminosity_error_propagation() {
        let (t, r, dt, dr) = (9000.0f64, 1.5e15f64, 300.0f64, 5e13f64);
        let fit = BlackbodyFit::Converged {
            temperature: t,
            radius: r,
            temperature_err: dt,
            radius_err: dr,
        };
        let (_, err) = fit.luminosity();
        let expected = 2.0
            * DPI
            * STEFAN_BOLTZMANN_CGS
            * ((2.0 * r * t.powi(4) * dr).powi(2) + (4.0 * t.powi(3) * r.powi(2) * dt).powi(2))
                .sqrt();
        assert!((err - expected).abs() / expected < 1e-12);
    }

    #[test]
    fn test_non_convergent_epoch_is_localized() {
        let (t_true, r_true) = (8000.0, 2e15);
        let wavelengths = [3600.0, 4700.0, 6200.0, 7600.0];
        let good_row: Vec<f64> = wavelengths
            .iter()
            .map(|&w| stored_value(t_true, r_true, w))
            .collect();
        let good_sigma = vec![0.02; wavelengths.len()];
        // Zero uncertainties poison the weighted normal equations for this
        // epoch only.
        let bad_sigma = vec![0.0; wavelengths.len()];

        let dense = dense_from_rows(
            &[good_row.clone(), good_row.clone(), good_row],
            &[good_sigma.clone(), bad_sigma, good_sigma],
            &wavelengths,
        );
        let curve = fit_blackbody_curve(&dense, &wavelengths, 0.0, 200).unwrap();

        assert_eq!(curve.fits[1], BlackbodyFit::NonConvergent);
        assert!(curve.luminosity[1].is_nan());
        assert!(matches!(curve.fits[0], BlackbodyFit::Converged { .. }));
        assert!(matches!(curve.fits[2], BlackbodyFit::Converged { .. }));
        assert!(curve.luminosity[0].is_finite());
    }

    #[test]
    fn test_single_filter_is_fatal() {
        let dense = dense_from_rows(&[vec![17.0]], &[vec![0.02]], &[5500.0]);
        let result = fit_blackbody_curve(&dense, &[5500.0], 0.0, 200);
        assert!(matches!(result, Err(BolfitError::CurveFitFailed { .. })));
    }
}
