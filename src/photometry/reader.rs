//! # Photometry File Reader
//!
//! Parser for the whitespace-delimited photometry files consumed by the
//! bolometric pipeline, turning them into [`RawPhotometryRow`] values ready for
//! normalization by [`PhotometrySet::from_rows`](crate::photometry::PhotometrySet::from_rows).
//!
//! ## Overview
//! -----------------
//! This module provides:
//! - The raw per-line sample type [`RawPhotometryRow`] (time, magnitude,
//!   uncertainty, filter identifier, magnitude system).
//! - The file-level container [`PhotometryFile`] carrying the two header
//!   quantities (redshift and Milky Way reddening) together with all data rows.
//! - The batch routine [`read_photometry_file`] that reads an entire file and
//!   fails fast on the first malformed line.
//!
//! ## File Format
//! -----------------
//! The expected layout, after dropping blank lines and `#` comments:
//!
//! ```text
//! 0.087                                  <- line 1: heliocentric redshift
//! 0.0224                                 <- line 2: E(B-V) reddening
//! 57462.5 18.61 0.05 SLOAN/SDSS.g AB     <- data rows, 5 whitespace fields
//! 57462.5 18.27 0.04 SLOAN/SDSS.r AB
//! ...
//! ```
//!
//! Data fields are `time magnitude uncertainty filter_id magnitude_system`.
//! Times are in **MJD (days)**, magnitudes and their 1-sigma uncertainties in
//! **mag**, the filter identifier is an SVO-style `Facility/Instrument.band`
//! label and the system is `AB` or a native system name (anything else).
//!
//! ## Error Handling
//! -----------------
//! Any malformed line is fatal and surfaces as
//! [`BolfitError::PhotometryParseError`] carrying the file name, the
//! **1-based physical line number** and a human-readable reason. A file with
//! headers but no data rows yields [`BolfitError::EmptyPhotometry`].
//!
//! ## See also
//! ------------
//! * [`PhotometrySet`](crate::photometry::PhotometrySet) – Normalized, filtered observation set.
//! * [`Bolfit::get_filter_band`](crate::Bolfit::get_filter_band) – Resolution of the filter labels read here.
use camino::Utf8Path;

use crate::bolfit_errors::BolfitError;

/// One photometric measurement exactly as read from the input file.
///
/// No unit conversion or filtering has been applied yet: `magnitude` is in the
/// system named by `system`, and `filter_id` is the unresolved SVO-style label.
///
/// See also
/// ------------
/// * [`PhotometrySet::from_rows`](crate::photometry::PhotometrySet::from_rows) – Normalization into pipeline units.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPhotometryRow {
    /// Observation epoch in MJD (days).
    pub time: f64,
    /// Apparent magnitude in the system named by `system`.
    pub magnitude: f64,
    /// 1-sigma magnitude uncertainty.
    pub uncertainty: f64,
    /// SVO-style filter identifier, e.g. `SLOAN/SDSS.g`.
    pub filter_id: String,
    /// Magnitude system label; `AB` selects the AB zero point.
    pub system: String,
}

/// A fully parsed photometry file: the two header scalars plus all data rows,
/// in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotometryFile {
    /// Heliocentric redshift from header line 1.
    pub redshift: f64,
    /// Milky Way reddening E(B-V) from header line 2.
    ///
    /// Parsed and reported, but not applied to the fluxes; extinction
    /// correction is expected upstream of this pipeline.
    pub reddening: f64,
    /// All data rows in file order.
    pub rows: Vec<RawPhotometryRow>,
}

/// Read a photometry file from disk and parse it into a [`PhotometryFile`].
///
/// Blank lines and lines starting with `#` are skipped. The first two
/// remaining lines are the redshift and reddening headers; every following
/// line must carry exactly five whitespace-separated fields.
///
/// Arguments
/// -----------------
/// * `path` – Path to the photometry file.
///
/// Return
/// ----------
/// * A [`PhotometryFile`] with headers and rows, or a [`BolfitError`] naming
///   the offending line on the first parse failure.
///
/// See also
/// ------------
/// * [`RawPhotometryRow`] – Per-line sample type.
/// * [`PhotometryFile`] – File-level container.
pub fn read_photometry_file(path: &Utf8Path) -> Result<PhotometryFile, BolfitError> {
    let content = std::fs::read_to_string(path)?;
    parse_photometry(&content, path.as_str())
}

/// Parse the full content of a photometry file (crate-private helper).
///
/// Split out from [`read_photometry_file`] so the grammar can be tested
/// without touching the filesystem.
fn parse_photometry(content: &str, file: &str) -> Result<PhotometryFile, BolfitError> {
    let parse_error = |line: usize, reason: String| BolfitError::PhotometryParseError {
        file: file.to_string(),
        line,
        reason,
    };

    let parse_float = |line: usize, what: &str, token: &str| {
        token
            .parse::<f64>()
            .map_err(|_| parse_error(line, format!("invalid {what}: {token:?}")))
    };

    let mut lines = content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

    let (lineno, header) = lines
        .next()
        .ok_or_else(|| parse_error(1, "missing redshift header line".to_string()))?;
    let redshift = parse_float(lineno, "redshift", header)?;

    let (lineno, header) = lines
        .next()
        .ok_or_else(|| parse_error(2, "missing reddening header line".to_string()))?;
    let reddening = parse_float(lineno, "reddening", header)?;

    let mut rows = Vec::new();
    for (lineno, line) in lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(parse_error(
                lineno,
                format!(
                    "expected 5 fields `time magnitude uncertainty filter system`, found {}",
                    fields.len()
                ),
            ));
        }

        rows.push(RawPhotometryRow {
            time: parse_float(lineno, "time", fields[0])?,
            magnitude: parse_float(lineno, "magnitude", fields[1])?,
            uncertainty: parse_float(lineno, "uncertainty", fields[2])?,
            filter_id: fields[3].to_string(),
            system: fields[4].to_string(),
        });
    }

    if rows.is_empty() {
        return Err(BolfitError::EmptyPhotometry(format!(
            "{file} contains headers but no data row"
        )));
    }

    Ok(PhotometryFile {
        redshift,
        reddening,
        rows,
    })
}
