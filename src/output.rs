//! # Output Table
//!
//! Writes the per-epoch estimation results to `<output_dir>/<name>.txt` as a
//! space-delimited table with one header row. Headers containing spaces are
//! quoted, so the file reads back with any whitespace-aware CSV parser.
//!
//! Layout
//! -----------------
//! One row per dense epoch, columns in order:
//!
//! 1. `Time (MJD)` – days since the first surviving observation.
//! 2. Per filter, ascending effective wavelength: `<filter>` and
//!    `<filter>_err`, the interpolated AB magnitude and its 1-sigma
//!    uncertainty (both positive magnitudes of error, not negated).
//! 3. `Temp./1e3 (K)`, `Temp. Err.` – blackbody temperature and error, both
//!    in units of 1000 K.
//! 4. `Radius/1e15 (cm)`, `Radius Err.` – photospheric radius and error,
//!    both in units of 1e15 cm.
//! 5. `Log10(Bol. Lum)`, `Log10(Bol. Err)` – decimal log of the bolometric
//!    luminosity and of its propagated error, in erg/s.
//!
//! Every value is rendered with three decimals; epochs whose blackbody fit
//! did not converge carry `nan` in the four blackbody columns and in both
//! luminosity columns.
use camino::{Utf8Path, Utf8PathBuf};
use itertools::izip;

use crate::blackbody::BlackbodyCurve;
use crate::bolfit_errors::BolfitError;
use crate::gaussian_process::DenseLightCurve;
use crate::photometry::PhotometrySet;

/// Render one table cell with three decimals, `nan` for missing values.
fn cell(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{value:.3}")
    }
}

/// Write the estimation table for one run.
///
/// Arguments
/// -----------------
/// * `output_dir` – Destination directory, assumed to exist.
/// * `name` – Run name; the file is `<name>.txt`.
/// * `photometry` – Supplies the filter labels and the flux correction that
///   restores absolute AB magnitudes.
/// * `dense` – Interpolated light curve; its epochs index the rows.
/// * `blackbody` – Per-epoch fits and the bolometric curve.
///
/// Return
/// ----------
/// * The path of the written file, or a [`BolfitError`] when the filter count
///   disagrees with the dense grid or the write fails.
pub fn write_estimation_table(
    output_dir: &Utf8Path,
    name: &str,
    photometry: &PhotometrySet,
    dense: &DenseLightCurve,
    blackbody: &BlackbodyCurve,
) -> Result<Utf8PathBuf, BolfitError> {
    let labels = photometry.unique_filter_labels();
    if labels.len() != dense.n_filters() || dense.n_epochs() != blackbody.len() {
        return Err(BolfitError::InvalidConfig(format!(
            "output table shape mismatch: {} filters / {} dense columns, {} epochs / {} fits",
            labels.len(),
            dense.n_filters(),
            dense.n_epochs(),
            blackbody.len()
        )));
    }
    let flux_correction = photometry.context.flux_correction;

    let mut headers: Vec<String> = vec!["Time (MJD)".to_string()];
    for label in &labels {
        headers.push(label.clone());
        headers.push(format!("{label}_err"));
    }
    headers.extend(
        [
            "Temp./1e3 (K)",
            "Temp. Err.",
            "Radius/1e15 (cm)",
            "Radius Err.",
            "Log10(Bol. Lum)",
            "Log10(Bol. Err)",
        ]
        .map(str::to_string),
    );

    let path = output_dir.join(format!("{name}.txt"));
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b' ')
        .from_path(path.as_std_path())?;
    writer.write_record(&headers)?;

    for (row, &time, fit, &lum, &lum_err) in izip!(
        0..dense.n_epochs(),
        &dense.epochs,
        &blackbody.fits,
        &blackbody.luminosity,
        &blackbody.luminosity_err
    ) {
        let mut record: Vec<String> = Vec::with_capacity(headers.len());
        record.push(cell(time));
        for col in 0..dense.n_filters() {
            // Restore the flux correction, then negate back to AB magnitudes.
            record.push(cell(-(dense.fluxes[(row, col)] + flux_correction)));
            record.push(cell(dense.sigmas[(row, col)]));
        }
        record.push(cell(fit.temperature() / 1.0e3));
        record.push(cell(fit.temperature_err() / 1.0e3));
        record.push(cell(fit.radius() / 1.0e15));
        record.push(cell(fit.radius_err() / 1.0e15));
        record.push(cell(lum.log10()));
        record.push(cell(lum_err.log10()));
        writer.write_record(&record)?;
    }
    writer.flush()?;

    Ok(path)
}
