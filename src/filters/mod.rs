//! # Photometric filter metadata
//!
//! This module resolves filter identifiers into the **band metadata** the normalizer needs:
//! effective wavelength, effective width, and zero-point flux.
//!
//! ## Public API
//!
//! ### [`crate::filters::FilterBand`]
//! One photometric band, in the SVO Filter Profile Service convention:
//!
//! ```text
//! FilterBand { id, wavelength_eff (Å), width_eff (Å), zero_point (Jy) }
//! ```
//!
//! ### Resolution order
//!
//! 1. **Embedded index** – a curated subset of the SVO FPS index distributed with the crate,
//!    covering the surveys most transient photometry comes from (Swift/UVOT, SDSS,
//!    Pan-STARRS, ZTF, Gaia, Johnson/Cousins, 2MASS).
//! 2. **Live SVO query** – for identifiers outside the embedded index, a VOTable request to
//!    `fps.php?ID=<filterID>` through the shared HTTP agent (bounded timeout).
//! 3. An identifier unknown to both is a fatal
//!    [`BolfitError::UnknownFilter`](crate::bolfit_errors::BolfitError::UnknownFilter).
//!
//! Resolved bands are cached on the [`Bolfit`](crate::bolfit::Bolfit) facade for the duration
//! of the run, so repeated rows of the same filter cost one lookup.
//!
//! ## Typical usage
//!
//! ```rust, no_run
//! use bolfit::bolfit::Bolfit;
//!
//! let mut state = Bolfit::new();
//! let band = state.get_filter_band("Swift/UVOT.U").unwrap();
//! println!("{}: {} Å", band.id, band.wavelength_eff);
//! ```
mod svo;

use std::collections::HashMap;

use crate::bolfit_errors::BolfitError;
use crate::constants::{Angstrom, FilterId};

pub(crate) use svo::query_svo_filter;

static FILTER_INDEX: &str = include_str!("data/filter_index.csv");

/// Metadata of one photometric band.
///
/// Wavelength and width are in Angstrom; the zero-point is the flux of a zeroth-magnitude
/// source in the band's native system, in Jansky. AB-calibrated rows never consult
/// `zero_point` (the AB zero-point is a global constant) but still need the wavelengths.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterBand {
    pub id: FilterId,
    pub wavelength_eff: Angstrom,
    pub width_eff: Angstrom,
    pub zero_point: f64,
}

/// Parse the embedded filter index into a lookup map.
///
/// Return
/// ----------
/// * A map from filter identifier to [`FilterBand`], or a [`BolfitError::CsvError`]
///   if the embedded table is malformed (which would be a packaging defect).
pub(crate) fn read_filter_index() -> Result<HashMap<FilterId, FilterBand>, BolfitError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(FILTER_INDEX.as_bytes());

    let mut index = HashMap::new();
    for record in reader.records() {
        let record = record?;
        let id = record
            .get(0)
            .ok_or_else(|| BolfitError::InvalidConfig("filter index row too short".into()))?
            .to_string();
        let wavelength_eff = parse_index_field(&record, 1, &id)?;
        let width_eff = parse_index_field(&record, 2, &id)?;
        let zero_point = parse_index_field(&record, 3, &id)?;
        index.insert(
            id.clone(),
            FilterBand {
                id,
                wavelength_eff,
                width_eff,
                zero_point,
            },
        );
    }
    Ok(index)
}

fn parse_index_field(
    record: &csv::StringRecord,
    col: usize,
    id: &str,
) -> Result<f64, BolfitError> {
    record
        .get(col)
        .and_then(|s| s.trim().parse::<f64>().ok())
        .ok_or_else(|| {
            BolfitError::InvalidConfig(format!("filter index entry for {id}: bad column {col}"))
        })
}
