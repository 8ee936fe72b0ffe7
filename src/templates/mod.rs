//! # Transient Brightness Templates
//!
//! Loading, decimation and interpolation of the precomputed per-class
//! brightness templates, plus their alignment to observed photometry.
//!
//! ## Overview
//! -----------------
//! This module provides:
//! - [`TransientClass`], the four supported template classes and their on-disk
//!   tags (`1a`, `1bc`, `2p`, `2l`).
//! - [`TemplateGrid`], the decimated rectangular (time × wavelength) log-flux
//!   surface built from a raw template file by [`load_template`].
//! - The spline machinery in [`spline`] turning a grid into a continuous,
//!   twice-differentiable interpolant.
//! - The alignment fit in [`alignment`] producing an [`AlignedTemplate`] that
//!   serves as the mean function of the Gaussian-process stage.
//!
//! ## Template Files
//! -----------------
//! One whitespace-delimited file per class, named `smoothed_sn<tag>.dat`,
//! with rows of `time wavelength f_lambda` (days, Angstrom, erg/s/cm²/Å).
//! The raw surfaces are oversampled, so loading applies a fixed decimation:
//! wavelengths strictly inside the observed filter span, every second day,
//! every twentieth Angstrom, and the dim early rise (`t < 1`) dropped. The
//! survivors must form a strictly rectangular grid; flux is then converted to
//! the pipeline's log-flux scale via `2.5·log10(λ²·f_λ)`.
//!
//! ## Error Handling
//! -----------------
//! A missing file, a malformed line, a non-rectangular grid after decimation
//! and a grid too sparse for bicubic interpolation are all fatal for the
//! requested class; there is no fallback template.
//!
//! ## See also
//! ------------
//! * [`AlignedTemplate`] – Template with fitted amplitude/shift/stretch.
//! * [`select_template_class`] – Chi-square class search across all four classes.
use std::str::FromStr;

use camino::Utf8Path;
use nalgebra::DMatrix;

use crate::bolfit_errors::BolfitError;
use crate::constants::{Angstrom, Day};

pub mod alignment;
pub mod spline;

pub use alignment::{select_template_class, AlignedTemplate, TemplateFit};
pub use spline::BicubicSpline;

/// Supernova classes with a precomputed brightness template.
///
/// The on-disk tag of each class names its template file,
/// `smoothed_sn<tag>.dat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransientClass {
    /// Thermonuclear (type Ia), tag `1a`.
    Ia,
    /// Stripped-envelope core collapse (type Ib/c), tag `1bc`.
    Ibc,
    /// Plateau core collapse (type II-P), tag `2p`.
    IIP,
    /// Linearly declining core collapse (type II-L), tag `2l`.
    IIL,
}

impl TransientClass {
    /// All classes, in the order the class search evaluates them.
    pub const ALL: [TransientClass; 4] = [
        TransientClass::Ia,
        TransientClass::Ibc,
        TransientClass::IIP,
        TransientClass::IIL,
    ];

    /// On-disk tag naming the class's template file.
    pub fn tag(&self) -> &'static str {
        match self {
            TransientClass::Ia => "1a",
            TransientClass::Ibc => "1bc",
            TransientClass::IIP => "2p",
            TransientClass::IIL => "2l",
        }
    }
}

impl FromStr for TransientClass {
    type Err = BolfitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1a" => Ok(TransientClass::Ia),
            "1bc" => Ok(TransientClass::Ibc),
            "2p" => Ok(TransientClass::IIP),
            "2l" => Ok(TransientClass::IIL),
            other => Err(BolfitError::InvalidTransientClass(other.to_string())),
        }
    }
}

impl std::fmt::Display for TransientClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Decimated rectangular template surface for one class.
///
/// `log_flux` holds `2.5·log10(λ²·f_λ)` with one row per entry of `times` and
/// one column per entry of `wavelengths`, both strictly ascending.
#[derive(Debug, Clone)]
pub struct TemplateGrid {
    pub class: TransientClass,
    /// Template epochs in days, strictly ascending.
    pub times: Vec<Day>,
    /// Template wavelengths in Angstrom, strictly ascending.
    pub wavelengths: Vec<Angstrom>,
    /// Log-flux surface, `times.len()` rows by `wavelengths.len()` columns.
    pub log_flux: DMatrix<f64>,
}

impl TemplateGrid {
    /// Build the decimated grid from raw `(time, wavelength, f_lambda)` rows.
    ///
    /// Applies, in order: the strict wavelength-span cut against the observed
    /// filters, the every-second-day and every-twentieth-Angstrom decimation,
    /// and the early-rise cut (`t < 1`). The survivors must tile a strictly
    /// rectangular grid with at least 4 knots per axis.
    ///
    /// Arguments
    /// -----------------
    /// * `class` – Template class the rows belong to.
    /// * `triples` – Raw `(time, wavelength, f_lambda)` rows.
    /// * `filter_wavelengths` – Effective wavelengths (Angstrom) of the
    ///   observed filters; only template wavelengths strictly inside their
    ///   span survive.
    ///
    /// Return
    /// ----------
    /// * The rectangular [`TemplateGrid`], or a fatal
    ///   [`BolfitError::NonRectangularTemplate`] /
    ///   [`BolfitError::DegenerateTemplateGrid`].
    pub fn from_triples(
        class: TransientClass,
        triples: &[(f64, f64, f64)],
        filter_wavelengths: &[Angstrom],
    ) -> Result<Self, BolfitError> {
        let wv_min = filter_wavelengths.iter().copied().fold(f64::INFINITY, f64::min);
        let wv_max = filter_wavelengths
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        let mut kept: Vec<(f64, f64, f64)> = triples
            .iter()
            .copied()
            .filter(|&(t, wv, _)| {
                wv > wv_min && wv < wv_max && t % 2.0 == 0.0 && wv % 20.0 == 0.0 && t >= 1.0
            })
            .collect();
        kept.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let mut times: Vec<f64> = kept.iter().map(|&(t, _, _)| t).collect();
        times.dedup();
        let mut wavelengths: Vec<f64> = kept.iter().map(|&(_, wv, _)| wv).collect();
        wavelengths.sort_by(f64::total_cmp);
        wavelengths.dedup();

        if times.len() < 4 || wavelengths.len() < 4 {
            return Err(BolfitError::DegenerateTemplateGrid {
                class: class.to_string(),
                detail: format!(
                    "{} epochs x {} wavelengths after decimation, need at least 4 x 4",
                    times.len(),
                    wavelengths.len()
                ),
            });
        }

        let mut log_flux = DMatrix::<f64>::zeros(times.len(), wavelengths.len());
        for (i, block) in kept.chunk_by(|a, b| a.0 == b.0).enumerate() {
            if block.len() != wavelengths.len() {
                return Err(BolfitError::NonRectangularTemplate {
                    class: class.to_string(),
                    detail: format!(
                        "epoch {} carries {} wavelength samples, expected {}",
                        block[0].0,
                        block.len(),
                        wavelengths.len()
                    ),
                });
            }
            for (j, &(_, wv, f_lambda)) in block.iter().enumerate() {
                if wv != wavelengths[j] {
                    return Err(BolfitError::NonRectangularTemplate {
                        class: class.to_string(),
                        detail: format!(
                            "epoch {} samples wavelength {} where {} was expected",
                            block[0].0, wv, wavelengths[j]
                        ),
                    });
                }
                log_flux[(i, j)] = 2.5 * (wv * wv * f_lambda).log10();
            }
        }

        Ok(Self {
            class,
            times,
            wavelengths,
            log_flux,
        })
    }

    /// Continuous interpolant over the grid.
    pub fn spline(&self) -> BicubicSpline {
        BicubicSpline::new(&self.times, &self.wavelengths, &self.log_flux)
    }
}

/// Load and decimate the template for `class` from `template_dir`.
///
/// Arguments
/// -----------------
/// * `template_dir` – Directory holding the `smoothed_sn<tag>.dat` files.
/// * `class` – Template class to load.
/// * `filter_wavelengths` – Effective wavelengths (Angstrom) of the observed
///   filters, bounding the retained template wavelengths.
///
/// Return
/// ----------
/// * The decimated [`TemplateGrid`], or a fatal [`BolfitError`] when the file
///   is missing, malformed, non-rectangular or too sparse.
pub fn load_template(
    template_dir: &Utf8Path,
    class: TransientClass,
    filter_wavelengths: &[Angstrom],
) -> Result<TemplateGrid, BolfitError> {
    let path = template_dir.join(format!("smoothed_sn{}.dat", class.tag()));
    let content = std::fs::read_to_string(&path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => BolfitError::TemplateFileNotFound(path.to_string()),
        _ => BolfitError::IoError(err),
    })?;

    let triples = parse_template(&content, path.as_str())?;
    TemplateGrid::from_triples(class, &triples, filter_wavelengths)
}

/// Parse the rows of a template file (crate-private helper).
fn parse_template(content: &str, file: &str) -> Result<Vec<(f64, f64, f64)>, BolfitError> {
    let parse_error = |line: usize, reason: String| BolfitError::TemplateParseError {
        file: file.to_string(),
        line,
        reason,
    };

    let mut triples = Vec::new();
    for (idx, raw_line) in content.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(parse_error(
                lineno,
                format!(
                    "expected 3 fields `time wavelength f_lambda`, found {}",
                    fields.len()
                ),
            ));
        }

        let mut parse = |what: &str, token: &str| {
            token
                .parse::<f64>()
                .map_err(|_| parse_error(lineno, format!("invalid {what}: {token:?}")))
        };
        triples.push((
            parse("time", fields[0])?,
            parse("wavelength", fields[1])?,
            parse("f_lambda", fields[2])?,
        ));
    }

    Ok(triples)
}

#[cfg(test)]
mod test_template_grid {
    use super::*;

    /// Rectangular synthetic template: 13 days x 301 wavelengths, positive flux.
    fn synthetic_triples() -> Vec<(f64, f64, f64)> {
        let mut triples = Vec::new();
        for t in 0..13 {
            for k in 0..=300 {
                let wv = 4000.0 + 10.0 * k as f64;
                let f_lambda = 1e-15 * (1.0 + t as f64) * (wv / 5000.0);
                triples.push((t as f64, wv, f_lambda));
            }
        }
        triples
    }

    #[test]
    fn test_class_tags_round_trip() {
        for class in TransientClass::ALL {
            assert_eq!(TransientClass::from_str(class.tag()).unwrap(), class);
        }
        assert_eq!(
            TransientClass::from_str("99x"),
            Err(BolfitError::InvalidTransientClass("99x".to_string()))
        );
    }

    #[test]
    fn test_decimation_keeps_even_days_and_coarse_wavelengths() {
        let grid = TemplateGrid::from_triples(
            TransientClass::Ia,
            &synthetic_triples(),
            &[4500.0, 6500.0],
        )
        .unwrap();

        // Even days only, early rise (t < 1) dropped.
        assert_eq!(grid.times, vec![2.0, 4.0, 6.0, 8.0, 10.0, 12.0]);
        // Multiples of 20 A strictly inside (4500, 6500).
        assert_eq!(grid.wavelengths.first(), Some(&4520.0));
        assert_eq!(grid.wavelengths.last(), Some(&6480.0));
        assert_eq!(grid.wavelengths.len(), 99);
        assert!(grid.wavelengths.windows(2).all(|w| w[1] - w[0] == 20.0));

        // Log-flux conversion on a spot-checked cell.
        let f_lambda = 1e-15 * 3.0 * (4520.0 / 5000.0);
        let expected = 2.5 * (4520.0_f64 * 4520.0 * f_lambda).log10();
        assert!((grid.log_flux[(0, 0)] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_span_cut_is_strict() {
        let grid = TemplateGrid::from_triples(
            TransientClass::Ia,
            &synthetic_triples(),
            &[4520.0, 6480.0],
        )
        .unwrap();

        // Wavelengths equal to either span bound are excluded.
        assert_eq!(grid.wavelengths.first(), Some(&4540.0));
        assert_eq!(grid.wavelengths.last(), Some(&6460.0));
    }

    #[test]
    fn test_missing_cell_is_fatal() {
        let mut triples = synthetic_triples();
        // Remove one surviving cell (t = 4, wv = 5000).
        triples.retain(|&(t, wv, _)| !(t == 4.0 && wv == 5000.0));

        let result =
            TemplateGrid::from_triples(TransientClass::IIP, &triples, &[4500.0, 6500.0]);
        assert!(matches!(
            result,
            Err(BolfitError::NonRectangularTemplate { .. })
        ));
    }

    #[test]
    fn test_sparse_grid_is_fatal() {
        // A span this narrow leaves fewer than 4 wavelength columns.
        let result = TemplateGrid::from_triples(
            TransientClass::Ibc,
            &synthetic_triples(),
            &[4990.0, 5050.0],
        );
        assert!(matches!(
            result,
            Err(BolfitError::DegenerateTemplateGrid { .. })
        ));
    }

    #[test]
    fn test_grid_spline_matches_grid_values() {
        let grid = TemplateGrid::from_triples(
            TransientClass::Ia,
            &synthetic_triples(),
            &[4500.0, 6500.0],
        )
        .unwrap();
        let spline = grid.spline();

        assert!(
            (spline.eval(grid.times[2], grid.wavelengths[10]) - grid.log_flux[(2, 10)]).abs()
                < 1e-9
        );
    }

    #[test]
    fn test_parse_template_rejects_malformed_rows() {
        let content = "\
# smoothed type Ia surface
0 4000 1.0e-15
1 4000
";
        let result = parse_template(content, "smoothed_sn1a.dat");
        assert_eq!(
            result,
            Err(BolfitError::TemplateParseError {
                file: "smoothed_sn1a.dat".to_string(),
                line: 3,
                reason: "expected 3 fields `time wavelength f_lambda`, found 2".to_string(),
            })
        );
    }

    #[test]
    fn test_missing_template_file_is_reported_as_such() {
        let dir = tempfile::tempdir().unwrap();
        let dir_path = Utf8Path::from_path(dir.path()).unwrap();

        let result = load_template(dir_path, TransientClass::IIL, &[4000.0, 7000.0]);
        assert!(matches!(
            result,
            Err(BolfitError::TemplateFileNotFound(_))
        ));
    }

    #[test]
    fn test_load_template_from_disk() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smoothed_sn1a.dat");
        let mut file = std::fs::File::create(&path).unwrap();
        for (t, wv, f) in synthetic_triples() {
            writeln!(file, "{t} {wv} {f:e}").unwrap();
        }

        let dir_path = Utf8Path::from_path(dir.path()).unwrap();
        let grid = load_template(dir_path, TransientClass::Ia, &[4500.0, 6500.0]).unwrap();
        assert_eq!(grid.times.len(), 6);
        assert_eq!(grid.wavelengths.len(), 99);
    }
}
