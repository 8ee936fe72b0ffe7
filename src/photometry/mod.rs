//! # Photometry normalization
//!
//! Utilities to turn raw magnitude records into the **normalized observation tensor** every
//! downstream stage consumes: `(time, log-flux, normalized wavelength, uncertainty, bandwidth)`.
//!
//! ## Overview
//! -----------------
//! This module provides:
//! - The [`Observation`] sample type and the [`PhotometrySet`] container.
//! - The [`NormContext`] pair of offsets needed to invert results back to physical units.
//! - The normalization routine [`PhotometrySet::from_rows`], which resolves filters through
//!   the [`Bolfit`](crate::bolfit::Bolfit) facade and applies the exact filtering order the
//!   regression downstream depends on.
//!
//! ## Units & Conventions
//! -----------------
//! - **Time:** days, rebased so the earliest surviving observation sits at `t = 0`.
//! - **Flux:** base-10 log-flux anchored at the AB zero-point,
//!   `2.5·(log10(f) − log10(3631 Jy))`, minus the per-curve flux correction.
//! - **Wavelength:** effective wavelength centered on the redshift-deflated mean, then
//!   expressed in kilo-Angstrom. The Gaussian-process kernel length scales are tuned to
//!   this unit; changing it would silently detune the regression.
//! - **Uncertainty:** the raw magnitude error; its inverse is the signal-to-noise ratio
//!   used for quality filtering.
//!
//! ## Filtering order
//! -----------------
//! Signal-to-noise filtering runs **before** the time rebase and the window cut, because
//! the zero-time anchor must be defined by surviving points only. The offsets of
//! [`NormContext`], on the other hand, are computed over **all** parsed rows. Output
//! preserves input insertion order; nothing here sorts by time.
pub mod reader;

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    bolfit::Bolfit,
    bolfit_errors::BolfitError,
    constants::{
        Angstrom, Day, FilterId, KiloAngstrom, LogFlux, Observations, AB_ZERO_POINT_JY,
    },
    filters::FilterBand,
};

pub use reader::{read_photometry_file, PhotometryFile, RawPhotometryRow};

/// Calibration system of one raw magnitude record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagnitudeSystem {
    /// AB-calibrated: the global 3631 Jy zero-point applies.
    Ab,
    /// Native system of the filter: the filter's own zero-point applies.
    Native,
}

impl MagnitudeSystem {
    /// Map the magnitude-system column of the input file. Only the literal `"AB"` selects
    /// the AB zero-point; anything else defers to the filter metadata.
    pub fn from_label(label: &str) -> Self {
        if label == "AB" {
            MagnitudeSystem::Ab
        } else {
            MagnitudeSystem::Native
        }
    }
}

/// One normalized photometric measurement.
///
/// # Fields
///
/// * `time` - Days since the first surviving observation
/// * `log_flux` - Offset-corrected log-flux (see module docs for the scale)
/// * `filter_wavelength` - Centered effective wavelength in kilo-Angstrom
/// * `uncertainty` - Magnitude error, strictly positive, inverse of the SNR
/// * `bandwidth` - Effective filter width in Angstrom
/// * `filter_id` - Identifier of the originating filter
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub time: Day,
    pub log_flux: LogFlux,
    pub filter_wavelength: KiloAngstrom,
    pub uncertainty: f64,
    pub bandwidth: Angstrom,
    pub filter_id: FilterId,
}

/// Offsets removed from every observation during normalization.
///
/// Both are computed once per light curve, over all parsed rows, and must be retained to
/// map results back to physical units at output time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormContext {
    /// Mean of the redshift-deflated raw effective wavelengths, in Angstrom.
    pub wavelength_correction: Angstrom,
    /// Minimum log-flux minus a margin of 1.0.
    pub flux_correction: LogFlux,
}

/// Normalized observations of one transient plus the offsets that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotometrySet {
    pub observations: Observations,
    pub context: NormContext,
}

impl PhotometrySet {
    /// Normalize raw rows into a [`PhotometrySet`].
    ///
    /// Applies, in order: filter resolution, magnitude→log-flux conversion, offset
    /// computation and subtraction, signal-to-noise filtering, time rebasing, and the
    /// accepted-window cut. See the module docs for why this order is load-bearing.
    ///
    /// Arguments
    /// -----------------
    /// * `state`: Facade used to resolve filter identifiers (results are cached there).
    /// * `rows`: Raw records in file order.
    /// * `distance_modulus`: Subtracted from every magnitude (0 for absolute magnitudes).
    /// * `redshift`: Used to inflate fluxes and deflate wavelengths (0 when unknown).
    /// * `window`: Accepted `(start, end)` time range, in days relative to the rebased zero.
    /// * `snr_threshold`: Minimum `1/uncertainty` for a row to survive.
    ///
    /// Return
    /// ----------
    /// * The normalized set, or a fatal [`BolfitError`]: unresolved filter, or an empty
    ///   set after one of the cuts.
    pub fn from_rows(
        state: &mut Bolfit,
        rows: &[RawPhotometryRow],
        distance_modulus: f64,
        redshift: f64,
        window: (Day, Day),
        snr_threshold: f64,
    ) -> Result<Self, BolfitError> {
        if rows.is_empty() {
            return Err(BolfitError::EmptyPhotometry(
                "input file contains no photometry rows".into(),
            ));
        }

        let bands: Vec<Arc<FilterBand>> = rows
            .iter()
            .map(|row| state.get_filter_band(&row.filter_id))
            .collect::<Result<_, _>>()?;

        // Magnitude -> log-flux, anchored at the AB zero-point
        let log_fluxes: Vec<LogFlux> = rows
            .iter()
            .zip(&bands)
            .map(|(row, band)| {
                let mag = row.magnitude - distance_modulus;
                let zero_point = match MagnitudeSystem::from_label(&row.system) {
                    MagnitudeSystem::Ab => AB_ZERO_POINT_JY,
                    MagnitudeSystem::Native => band.zero_point,
                };
                let flux = 10f64.powf(mag / -2.5) * zero_point * (1.0 + redshift);
                2.5 * (flux.log10() - AB_ZERO_POINT_JY.log10())
            })
            .collect();

        let n = rows.len() as f64;
        let wavelength_correction = bands
            .iter()
            .map(|b| b.wavelength_eff / (1.0 + redshift))
            .sum::<f64>()
            / n;
        let flux_correction = log_fluxes.iter().cloned().fold(f64::INFINITY, f64::min) - 1.0;
        let context = NormContext {
            wavelength_correction,
            flux_correction,
        };

        // Signal-to-noise cut first: the zero-time anchor below must only see survivors
        let mut kept: Vec<(usize, Day)> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| 1.0 / row.uncertainty >= snr_threshold)
            .map(|(i, row)| (i, row.time))
            .collect();
        if kept.is_empty() {
            return Err(BolfitError::EmptyPhotometry(format!(
                "signal-to-noise filter (threshold {snr_threshold}) removed every observation"
            )));
        }

        let t0 = kept
            .iter()
            .map(|&(_, t)| t)
            .fold(f64::INFINITY, f64::min);
        for entry in &mut kept {
            entry.1 -= t0;
        }

        let (start, end) = window;
        let observations: Observations = kept
            .into_iter()
            .filter(|&(_, t)| t >= start && t <= end)
            .map(|(i, t)| Observation {
                time: t,
                log_flux: log_fluxes[i] - flux_correction,
                filter_wavelength: (bands[i].wavelength_eff - wavelength_correction) / 1000.0,
                uncertainty: rows[i].uncertainty,
                bandwidth: bands[i].width_eff,
                filter_id: rows[i].filter_id.clone(),
            })
            .collect();
        if observations.is_empty() {
            return Err(BolfitError::EmptyPhotometry(format!(
                "accepted time window [{start}, {end}] removed every observation"
            )));
        }

        info!(
            "normalized {} of {} rows across {} bands",
            observations.len(),
            rows.len(),
            state.resolved_band_count()
        );
        debug!(
            "wavelength correction {:.2} Å, flux correction {:.4}",
            context.wavelength_correction, context.flux_correction
        );

        Ok(PhotometrySet {
            observations,
            context,
        })
    }

    /// Number of observation epochs (one per surviving input row).
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Unique normalized wavelengths, ascending. One entry per filter present in the set.
    pub fn unique_wavelengths(&self) -> Vec<KiloAngstrom> {
        let mut wavelengths: Vec<KiloAngstrom> = self
            .observations
            .iter()
            .map(|obs| obs.filter_wavelength)
            .collect();
        wavelengths.sort_by(|a, b| a.total_cmp(b));
        wavelengths.dedup();
        wavelengths
    }

    /// Unique wavelengths mapped back to physical Angstrom, ascending.
    pub fn unique_wavelengths_angstrom(&self) -> Vec<Angstrom> {
        self.unique_wavelengths()
            .iter()
            .map(|w| w * 1000.0 + self.context.wavelength_correction)
            .collect()
    }

    /// Filter identifier of each unique wavelength, in the same ascending-wavelength order
    /// as [`unique_wavelengths`](Self::unique_wavelengths). The first observation carrying
    /// a wavelength names its column.
    pub fn unique_filter_labels(&self) -> Vec<FilterId> {
        self.unique_wavelengths()
            .iter()
            .map(|&w| {
                self.observations
                    .iter()
                    .find(|obs| obs.filter_wavelength == w)
                    .map(|obs| obs.filter_id.clone())
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Population variance of the normalized log-fluxes, the amplitude seed of the
    /// Gaussian-process kernel.
    pub fn flux_variance(&self) -> f64 {
        let n = self.observations.len() as f64;
        let mean = self.observations.iter().map(|o| o.log_flux).sum::<f64>() / n;
        self.observations
            .iter()
            .map(|o| (o.log_flux - mean).powi(2))
            .sum::<f64>()
            / n
    }
}

#[cfg(test)]
mod test_normalizer {
    use super::*;

    fn raw(time: f64, magnitude: f64, uncertainty: f64, filter_id: &str) -> RawPhotometryRow {
        RawPhotometryRow {
            time,
            magnitude,
            uncertainty,
            filter_id: filter_id.to_string(),
            system: "AB".to_string(),
        }
    }

    fn normalize(rows: &[RawPhotometryRow], snr: f64) -> Result<PhotometrySet, BolfitError> {
        let mut state = Bolfit::new();
        PhotometrySet::from_rows(&mut state, rows, 0.0, 0.0, (0.0, 200.0), snr)
    }

    #[test]
    fn test_snr_filter_strictly_holds() {
        let rows = vec![
            raw(100.0, 19.0, 0.05, "SLOAN/SDSS.g"),
            raw(101.0, 19.1, 0.5, "SLOAN/SDSS.g"), // SNR 2, below threshold
            raw(102.0, 19.2, 0.1, "SLOAN/SDSS.r"),
        ];
        let set = normalize(&rows, 4.0).unwrap();
        assert_eq!(set.len(), 2);
        for obs in &set.observations {
            assert!(1.0 / obs.uncertainty >= 4.0);
        }
    }

    #[test]
    fn test_time_rebased_to_zero() {
        let rows = vec![
            raw(55100.0, 19.0, 0.05, "SLOAN/SDSS.g"),
            raw(55102.5, 19.1, 0.05, "SLOAN/SDSS.r"),
            raw(55110.0, 19.4, 0.05, "SLOAN/SDSS.g"),
        ];
        let set = normalize(&rows, 4.0).unwrap();
        let min_time = set
            .observations
            .iter()
            .map(|o| o.time)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(min_time, 0.0);
        assert!(set.observations.iter().all(|o| o.time >= 0.0));
        assert_eq!(set.observations[1].time, 2.5);
    }

    #[test]
    fn test_rebase_anchor_ignores_low_snr_rows() {
        // The earliest row fails the SNR cut, so the anchor is the second row
        let rows = vec![
            raw(55100.0, 19.0, 1.0, "SLOAN/SDSS.g"),
            raw(55105.0, 19.1, 0.05, "SLOAN/SDSS.g"),
            raw(55107.0, 19.2, 0.05, "SLOAN/SDSS.g"),
        ];
        let set = normalize(&rows, 4.0).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.observations[0].time, 0.0);
        assert_eq!(set.observations[1].time, 2.0);
    }

    #[test]
    fn test_log_flux_round_trip() {
        let rows = vec![
            raw(100.0, 18.0, 0.05, "SLOAN/SDSS.g"),
            raw(101.0, 21.0, 0.05, "SLOAN/SDSS.g"),
        ];
        let set = normalize(&rows, 4.0).unwrap();
        // Undo the offset, then invert the log-flux formula back to linear flux in Jy
        for (obs, mag) in set.observations.iter().zip([18.0f64, 21.0]) {
            let restored = obs.log_flux + set.context.flux_correction;
            let flux = 10f64.powf(restored / 2.5) * AB_ZERO_POINT_JY;
            let expected = 10f64.powf(mag / -2.5) * AB_ZERO_POINT_JY;
            assert!((flux - expected).abs() / expected < 1e-12);
        }
    }

    #[test]
    fn test_flux_correction_keeps_fluxes_above_one() {
        let rows = vec![
            raw(100.0, 18.0, 0.05, "SLOAN/SDSS.g"),
            raw(101.0, 22.0, 0.05, "SLOAN/SDSS.r"),
            raw(102.0, 20.0, 0.05, "SLOAN/SDSS.i"),
        ];
        let set = normalize(&rows, 4.0).unwrap();
        let min_flux = set
            .observations
            .iter()
            .map(|o| o.log_flux)
            .fold(f64::INFINITY, f64::min);
        // The dimmest point sits exactly one unit above zero
        assert!((min_flux - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_insertion_order_preserved() {
        // Deliberately unsorted in time: output must keep file order
        let rows = vec![
            raw(105.0, 19.0, 0.05, "SLOAN/SDSS.r"),
            raw(100.0, 19.5, 0.05, "SLOAN/SDSS.g"),
            raw(103.0, 19.2, 0.05, "SLOAN/SDSS.r"),
        ];
        let set = normalize(&rows, 4.0).unwrap();
        assert_eq!(set.observations[0].time, 5.0);
        assert_eq!(set.observations[1].time, 0.0);
        assert_eq!(set.observations[2].time, 3.0);
    }

    #[test]
    fn test_window_cut_is_inclusive() {
        let rows = vec![
            raw(100.0, 19.0, 0.05, "SLOAN/SDSS.g"),
            raw(150.0, 19.5, 0.05, "SLOAN/SDSS.g"),
            raw(350.0, 20.0, 0.05, "SLOAN/SDSS.g"),
        ];
        let mut state = Bolfit::new();
        let set =
            PhotometrySet::from_rows(&mut state, &rows, 0.0, 0.0, (0.0, 50.0), 4.0).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.observations[1].time, 50.0);
    }

    #[test]
    fn test_all_rows_below_snr_is_fatal() {
        let rows = vec![raw(100.0, 19.0, 1.0, "SLOAN/SDSS.g")];
        let err = normalize(&rows, 4.0).unwrap_err();
        assert!(matches!(err, BolfitError::EmptyPhotometry(_)));
    }

    #[test]
    fn test_unique_wavelengths_sorted_with_labels() {
        let rows = vec![
            raw(100.0, 19.0, 0.05, "SLOAN/SDSS.i"),
            raw(101.0, 19.5, 0.05, "SLOAN/SDSS.g"),
            raw(102.0, 19.2, 0.05, "SLOAN/SDSS.i"),
        ];
        let set = normalize(&rows, 4.0).unwrap();
        let wavelengths = set.unique_wavelengths();
        assert_eq!(wavelengths.len(), 2);
        assert!(wavelengths[0] < wavelengths[1]);
        assert_eq!(
            set.unique_filter_labels(),
            vec!["SLOAN/SDSS.g".to_string(), "SLOAN/SDSS.i".to_string()]
        );

        // Back to physical units: g sits near its catalog wavelength
        let angstrom = set.unique_wavelengths_angstrom();
        assert!((angstrom[0] - 4700.33).abs() < 1e-9);
        assert!((angstrom[1] - 7533.62).abs() < 1e-9);
    }

    #[test]
    fn test_native_zero_point_changes_flux() {
        let ab_row = raw(100.0, 19.0, 0.05, "Generic/Johnson.V");
        let mut vega_row = raw(100.0, 19.0, 0.05, "Generic/Johnson.V");
        vega_row.system = "Vega".into();

        let ab =
            normalize(&[ab_row, raw(101.0, 20.0, 0.05, "Generic/Johnson.V")], 4.0).unwrap();
        let vega =
            normalize(&[vega_row, raw(101.0, 20.0, 0.05, "Generic/Johnson.V")], 4.0).unwrap();
        // Johnson V zero-point (3562.52 Jy) is below 3631 Jy, so the Vega-system flux is lower
        let ab_flux = ab.observations[0].log_flux + ab.context.flux_correction;
        let vega_flux = vega.observations[0].log_flux + vega.context.flux_correction;
        assert!(vega_flux < ab_flux);
    }
}
