//! # Estimation Pipeline Driver
//!
//! Chains the stages of a bolometric estimation run in order:
//!
//! 1. Parse the photometry file and resolve the distance scale.
//! 2. Normalize the rows into a [`PhotometrySet`].
//! 3. Optionally align (or search for) a class template.
//! 4. Interpolate the dense light curve with the Gaussian process.
//! 5. Fit a blackbody per dense epoch and integrate the luminosity.
//! 6. Write the output table and, on request, the three charts.
//!
//! Each stage reports fatal conditions through [`BolfitError`]; per-epoch
//! blackbody non-convergence is carried as data, not as an error.
use camino::{Utf8Path, Utf8PathBuf};

use crate::blackbody::{fit_blackbody_curve, BlackbodyCurve};
use crate::bolfit::Bolfit;
use crate::bolfit_errors::BolfitError;
use crate::cosmology::{resolve_distance, ResolvedDistance};
use crate::estimator::{EstimatorParams, TemplateMode};
use crate::gaussian_process::{interpolate, DenseLightCurve};
use crate::output::write_estimation_table;
use crate::photometry::{read_photometry_file, PhotometrySet};
use crate::plot;
use crate::templates::{load_template, select_template_class, AlignedTemplate};

/// Everything one estimation run produced, for callers that want more than
/// the files on disk.
#[derive(Debug, Clone)]
pub struct EstimationReport {
    /// Run name, taken from the input file stem.
    pub name: String,
    /// Normalized observations and their normalization context.
    pub photometry: PhotometrySet,
    /// Distance scale applied during normalization.
    pub distance: ResolvedDistance,
    /// Aligned template, when a template mode was active.
    pub template: Option<AlignedTemplate>,
    /// Dense interpolated light curve.
    pub dense: DenseLightCurve,
    /// Per-epoch blackbody fits and the bolometric curve.
    pub blackbody: BlackbodyCurve,
    /// Path of the written output table.
    pub output_table: Utf8PathBuf,
}

/// Distance scale for the run: explicit inputs win over the file header.
///
/// The header redshift is consulted only when none of the three distance
/// inputs was supplied; a header redshift of zero then selects absolute
/// magnitudes, exactly as an explicit `redshift = 0` would.
fn resolve_run_distance(
    params: &EstimatorParams,
    header_redshift: f64,
) -> Result<ResolvedDistance, BolfitError> {
    let supplied = params.redshift.is_some()
        || params.distance_mpc.is_some()
        || params.distance_modulus.is_some();
    if supplied {
        resolve_distance(params.redshift, params.distance_mpc, params.distance_modulus)
    } else {
        resolve_distance(Some(header_redshift), None, None)
    }
}

/// Run the full estimation pipeline on one photometry file.
///
/// Arguments
/// -----------------
/// * `state` – Shared environment state; resolves filter identifiers, caching
///   any Filter Profile Service lookups across runs.
/// * `input` – Path to the photometry file.
/// * `params` – Validated run configuration.
///
/// Return
/// ----------
/// * An [`EstimationReport`] with the in-memory results and written paths, or
///   the first fatal [`BolfitError`] of the run.
///
/// See also
/// ------------
/// * [`EstimatorParams`] – Knobs and their defaults.
/// * [`write_estimation_table`](crate::output::write_estimation_table) – Table layout.
pub fn run_estimation(
    state: &mut Bolfit,
    input: &Utf8Path,
    params: &EstimatorParams,
) -> Result<EstimationReport, BolfitError> {
    let name = input.file_stem().unwrap_or("transient").to_string();
    tracing::info!(run = %name, %params, "estimation run configured");

    let file = read_photometry_file(input)?;
    if file.reddening != 0.0 {
        tracing::info!(
            ebv = file.reddening,
            "reddening header parsed but not applied; correct extinction upstream"
        );
    }

    let distance = resolve_run_distance(params, file.redshift)?;
    tracing::info!(
        redshift = distance.redshift,
        distance_mpc = distance.distance_mpc,
        distance_modulus = distance.distance_modulus,
        "distance scale resolved"
    );

    let photometry = PhotometrySet::from_rows(
        state,
        &file.rows,
        distance.distance_modulus,
        distance.redshift,
        params.time_window,
        params.snr_threshold,
    )?;
    tracing::info!(
        observations = photometry.len(),
        filters = photometry.unique_wavelengths().len(),
        "photometry normalized"
    );

    let template = match params.template_mode {
        TemplateMode::Disabled => None,
        TemplateMode::Fixed(class) => Some(class),
        TemplateMode::AutoSelect => Some(select_template_class(
            &params.template_dir,
            &photometry,
            distance.redshift,
            params.fit_max_iters,
        )?),
    }
    .map(|class| {
        let grid = load_template(
            &params.template_dir,
            class,
            &photometry.unique_wavelengths_angstrom(),
        )?;
        AlignedTemplate::build(&grid, &photometry, distance.redshift, params.fit_max_iters)
    })
    .transpose()?;

    let dense = interpolate(&photometry, template.as_ref(), params.gp_max_iters)?;

    let blackbody = fit_blackbody_curve(
        &dense,
        &photometry.unique_wavelengths_angstrom(),
        photometry.context.flux_correction,
        params.fit_max_iters,
    )?;
    let converged = blackbody
        .fits
        .iter()
        .filter(|fit| fit.temperature().is_finite())
        .count();
    tracing::info!(
        epochs = blackbody.len(),
        converged,
        "blackbody curve fitted"
    );

    std::fs::create_dir_all(&params.output_dir)?;
    let output_table =
        write_estimation_table(&params.output_dir, &name, &photometry, &dense, &blackbody)?;
    tracing::info!(path = %output_table, "output table written");

    if params.plot {
        let lc = plot::render_light_curves(
            &params.output_dir,
            &name,
            &photometry,
            &dense,
            template.as_ref(),
            params.show_template,
        )?;
        let ev = plot::render_blackbody_evolution(&params.output_dir, &name, &dense, &blackbody)?;
        let bol = plot::render_bolometric_curve(&params.output_dir, &name, &dense, &blackbody)?;
        tracing::info!(light_curves = %lc, evolution = %ev, bolometric = %bol, "charts rendered");
    }

    Ok(EstimationReport {
        name,
        photometry,
        distance,
        template,
        dense,
        blackbody,
        output_table,
    })
}
