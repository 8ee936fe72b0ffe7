//! # Template Alignment
//!
//! Fits the three alignment parameters (amplitude, time shift, time stretch)
//! that map a class template onto observed photometry, and searches across
//! classes when the transient type is unknown.
//!
//! ## Overview
//! -----------------
//! For every observed filter independently, `log_flux(t) = template(t/t_s +
//! t_c, λ) + A` is fit against that filter's own measurements. Each candidate
//! parameter set is then scored by an aggregate chi-square that re-evaluates
//! the candidate's measurements against the aligned template at *every*
//! observed filter wavelength; this penalizes alignments that only work for
//! the filter they were fit on. The candidate with the lowest aggregate
//! chi-square becomes the template's canonical alignment.
//!
//! The alignment is carried as an explicit value object, [`AlignedTemplate`],
//! whose evaluation is a pure function of `(time, wavelength)`; downstream
//! stages never see the fit machinery.
//!
//! ## Error Handling
//! -----------------
//! A non-converged fit for any candidate filter is fatal: silently skipping a
//! candidate would change the minimum search space without telling the user.
use camino::Utf8Path;
use nalgebra::SVector;

use crate::bolfit_errors::BolfitError;
use crate::constants::{Angstrom, Day, LogFlux};
use crate::fitting::{curve_fit, CurveFitModel, CurveFitSettings};
use crate::photometry::PhotometrySet;
use crate::templates::{load_template, spline::BicubicSpline, TemplateGrid, TransientClass};

/// Best-fit alignment parameters for one template class.
#[derive(Debug, Clone, Copy)]
pub struct TemplateFit {
    /// Additive log-flux offset `A`.
    pub amplitude: f64,
    /// Additive time offset `t_c` in template days.
    pub time_shift: Day,
    /// Multiplicative time stretch `t_s`, constrained non-negative.
    pub time_stretch: f64,
    /// Aggregate chi-square of the winning candidate.
    pub chi2: f64,
}

/// A template surface together with its fitted alignment.
///
/// Evaluation is pure: the observed epoch is mapped into template time via
/// `t/t_s + t_c` and the fitted amplitude is added to the template's log-flux.
#[derive(Debug, Clone)]
pub struct AlignedTemplate {
    pub class: TransientClass,
    pub fit: TemplateFit,
    spline: BicubicSpline,
}

impl AlignedTemplate {
    /// Fit the alignment of `grid` against `photometry`.
    ///
    /// Arguments
    /// -----------------
    /// * `grid` – Decimated template surface for the chosen class.
    /// * `photometry` – Normalized observation set.
    /// * `redshift` – Heliocentric redshift, seeding the stretch at `1 + z`.
    /// * `max_iterations` – Iteration budget per candidate fit; the chi-square
    ///   surface is shallow along the stretch axis and needs more room than
    ///   the solver default.
    ///
    /// Return
    /// ----------
    /// * The aligned template, or a fatal [`BolfitError::CurveFitFailed`]
    ///   when any per-filter candidate fit does not converge.
    pub fn build(
        grid: &TemplateGrid,
        photometry: &PhotometrySet,
        redshift: f64,
        max_iterations: usize,
    ) -> Result<Self, BolfitError> {
        let spline = grid.spline();
        let fit = fit_alignment(&spline, photometry, redshift, max_iterations)?;
        Ok(Self {
            class: grid.class,
            fit,
            spline,
        })
    }

    /// Template log-flux at an observed epoch and physical wavelength.
    ///
    /// Arguments
    /// -----------------
    /// * `time` – Epoch in days since the first surviving observation.
    /// * `wavelength` – Physical wavelength in Angstrom.
    pub fn log_flux(&self, time: Day, wavelength: Angstrom) -> LogFlux {
        self.spline
            .eval(time / self.fit.time_stretch + self.fit.time_shift, wavelength)
            + self.fit.amplitude
    }
}

/// The per-filter alignment model `template(t/t_s + t_c, λ) + A` with
/// parameters `[A, t_c, t_s]`.
struct AlignmentModel<'a> {
    template: &'a BicubicSpline,
    wavelength: Angstrom,
}

impl CurveFitModel<3> for AlignmentModel<'_> {
    fn value(&self, time: f64, params: &SVector<f64, 3>) -> f64 {
        self.template
            .eval(time / params[2] + params[1], self.wavelength)
            + params[0]
    }

    fn constrain(&self, params: &mut SVector<f64, 3>) {
        params[2] = params[2].max(0.0);
    }
}

/// Fit the alignment parameters of a template spline against the photometry.
///
/// One candidate fit per observed filter, each scored by the aggregate
/// chi-square across all filter wavelengths; the first minimum wins ties.
///
/// Arguments
/// -----------------
/// * `template` – Template log-flux surface.
/// * `photometry` – Normalized observation set.
/// * `redshift` – Heliocentric redshift, seeding the stretch at `1 + z`.
/// * `max_iterations` – Iteration budget per candidate fit.
///
/// Return
/// ----------
/// * The winning [`TemplateFit`], or a fatal error when a candidate fit does
///   not converge.
pub fn fit_alignment(
    template: &BicubicSpline,
    photometry: &PhotometrySet,
    redshift: f64,
    max_iterations: usize,
) -> Result<TemplateFit, BolfitError> {
    let normalized = photometry.unique_wavelengths();
    let physical = photometry.unique_wavelengths_angstrom();

    let settings = CurveFitSettings {
        max_iterations,
        ..Default::default()
    };
    let initial = SVector::<f64, 3>::new(20.0, 0.0, 1.0 + redshift);

    let mut candidate_chi2 = Vec::with_capacity(physical.len());
    let mut best: Option<TemplateFit> = None;

    for (&u, &wavelength) in normalized.iter().zip(&physical) {
        // The candidate filter's own measurements, jointly sorted in time so
        // fluxes and uncertainties stay paired with their epochs.
        let mut samples: Vec<(f64, f64, f64)> = photometry
            .observations
            .iter()
            .filter(|obs| obs.filter_wavelength.total_cmp(&u).is_eq())
            .map(|obs| (obs.time, obs.log_flux, obs.uncertainty))
            .collect();
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));

        let times: Vec<f64> = samples.iter().map(|s| s.0).collect();
        let fluxes: Vec<f64> = samples.iter().map(|s| s.1).collect();

        let model = AlignmentModel {
            template,
            wavelength,
        };
        let report = curve_fit(&model, &times, &fluxes, None, initial, &settings)?;
        if !report.converged {
            return Err(BolfitError::CurveFitFailed {
                stage: "template alignment".to_string(),
                detail: format!(
                    "candidate fit against the filter at {wavelength:.1} A did not converge"
                ),
            });
        }

        let (amplitude, time_shift, time_stretch) =
            (report.params[0], report.params[1], report.params[2]);

        // Score this candidate against every filter wavelength, not just the
        // one it was fit on.
        let mut chi2 = 0.0;
        for &other in &physical {
            for &(t, flux, err) in &samples {
                let model_flux =
                    template.eval(t / time_stretch + time_shift, other) + amplitude;
                chi2 += ((model_flux - flux) / err).powi(2);
            }
        }
        candidate_chi2.push(chi2);

        if best.as_ref().is_none_or(|b| chi2 < b.chi2) {
            best = Some(TemplateFit {
                amplitude,
                time_shift,
                time_stretch,
                chi2,
            });
        }
    }

    tracing::debug!(?candidate_chi2, "aggregate chi2 per candidate filter");

    let fit = best.ok_or_else(|| {
        BolfitError::EmptyPhotometry("no filter candidate for template alignment".to_string())
    })?;
    tracing::info!(
        chi2 = fit.chi2,
        amplitude = fit.amplitude,
        time_shift = fit.time_shift,
        time_stretch = fit.time_stretch,
        "template alignment selected"
    );
    Ok(fit)
}

/// Search all template classes for the lowest aggregate chi-square alignment.
///
/// Used when the transient type is unknown; every class template is loaded,
/// aligned and scored, and the first minimum wins ties.
///
/// Arguments
/// -----------------
/// * `template_dir` – Directory holding the `smoothed_sn<tag>.dat` files.
/// * `photometry` – Normalized observation set.
/// * `redshift` – Heliocentric redshift.
/// * `max_iterations` – Iteration budget per candidate fit.
///
/// Return
/// ----------
/// * The winning [`TransientClass`]; any class failing to load or align is
///   fatal for the whole search.
pub fn select_template_class(
    template_dir: &Utf8Path,
    photometry: &PhotometrySet,
    redshift: f64,
    max_iterations: usize,
) -> Result<TransientClass, BolfitError> {
    let physical = photometry.unique_wavelengths_angstrom();

    let mut best: Option<(TransientClass, f64)> = None;
    for class in TransientClass::ALL {
        let grid = load_template(template_dir, class, &physical)?;
        let fit = fit_alignment(&grid.spline(), photometry, redshift, max_iterations)?;
        tracing::info!(class = %class, chi2 = fit.chi2, "template class candidate");

        if best.as_ref().is_none_or(|(_, c)| fit.chi2 < *c) {
            best = Some((class, fit.chi2));
        }
    }

    let (class, chi2) = best.ok_or_else(|| {
        BolfitError::InvalidTransientClass("no template class available".to_string())
    })?;
    tracing::info!(class = %class, chi2, "template class selected");
    Ok(class)
}
