//! # Bolfit: environment and filter registry
//!
//! This module defines the [`Bolfit`](crate::bolfit::Bolfit) struct, the central façade that
//! wires together:
//!
//! 1. **Environment state** ([`BolfitEnv`](crate::env_state::BolfitEnv)) — the shared HTTP
//!    client used for live metadata lookups.
//! 2. **Filter registry** — resolution of filter identifiers into
//!    [`FilterBand`](crate::filters::FilterBand) metadata, with per-run caching.
//!
//! The design emphasizes *lazy initialization* and *idempotent caching*:
//! - The embedded filter index is parsed on first use via [`OnceCell`](once_cell::sync::OnceCell),
//!   then reused.
//! - Each identifier is resolved at most once per run; repeated photometry rows of the same
//!   band hit the cache.
//!
//! ## Key responsibilities
//!
//! - Single source of truth for **filter metadata** through
//!   [`get_filter_band`](crate::bolfit::Bolfit::get_filter_band)
//! - Escalation to the **SVO Filter Profile Service** for identifiers outside the embedded
//!   index, through the bounded-timeout HTTP agent
//!
//! ## Typical usage
//!
//! ```rust, no_run
//! use bolfit::bolfit::Bolfit;
//!
//! let mut state = Bolfit::new();
//!
//! // Resolve a band by its SVO identifier (cached afterwards)
//! let sdss_g = state.get_filter_band("SLOAN/SDSS.g").unwrap();
//! assert!(sdss_g.wavelength_eff > 4000.0);
//! ```
//!
//! ## Notes
//!
//! - An identifier unknown to both the embedded index and the SVO service aborts the run
//!   with [`BolfitError::UnknownFilter`](crate::bolfit_errors::BolfitError::UnknownFilter):
//!   a light curve with an unresolvable band cannot be normalized.
//! - Service timeouts surface as
//!   [`BolfitError::FilterServiceError`](crate::bolfit_errors::BolfitError::FilterServiceError),
//!   kept distinct so callers may retry.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::{
    bolfit_errors::BolfitError,
    constants::{FilterBandMap, FilterId},
    env_state::BolfitEnv,
    filters::{query_svo_filter, read_filter_index, FilterBand},
};

#[derive(Debug, Clone)]
pub struct Bolfit {
    env_state: BolfitEnv,
    filter_index: OnceCell<HashMap<FilterId, FilterBand>>,
    filter_cache: FilterBandMap,
}

impl Default for Bolfit {
    fn default() -> Self {
        Self::new()
    }
}

impl Bolfit {
    /// Construct a new [`Bolfit`] context.
    ///
    /// Initializes the HTTP environment. The embedded filter index is **not** parsed yet;
    /// it is lazily initialized the first time
    /// [`get_filter_band`](crate::bolfit::Bolfit::get_filter_band) is called.
    ///
    /// Return
    /// ----------
    /// * A new [`Bolfit`] instance.
    pub fn new() -> Self {
        Bolfit {
            env_state: BolfitEnv::new(),
            filter_index: OnceCell::new(),
            filter_cache: HashMap::new(),
        }
    }

    /// Get the lazily parsed embedded filter index.
    ///
    /// Return
    /// ----------
    /// * A reference to the index map, or a [`BolfitError`] if the embedded table cannot
    ///   be parsed (packaging defect).
    pub(crate) fn get_filter_index(
        &self,
    ) -> Result<&HashMap<FilterId, FilterBand>, BolfitError> {
        self.filter_index.get_or_try_init(read_filter_index)
    }

    /// Resolve a [`FilterBand`] from a filter identifier, caching the result for the run.
    ///
    /// Resolution order: run cache → embedded index → live SVO FPS query.
    ///
    /// Arguments
    /// -----------------
    /// * `filter_id`: The SVO filter identifier (e.g., `"Swift/UVOT.U"`).
    ///
    /// Return
    /// ----------
    /// * An `Arc<FilterBand>` for the requested band, or
    ///   [`BolfitError::UnknownFilter`] when neither source knows the identifier.
    ///
    /// See also
    /// ------------
    /// * [`query_svo_filter`](crate::filters::query_svo_filter) – The live lookup.
    pub fn get_filter_band(&mut self, filter_id: &str) -> Result<Arc<FilterBand>, BolfitError> {
        if let Some(band) = self.filter_cache.get(filter_id) {
            return Ok(band.clone());
        }

        let indexed: Option<FilterBand> = self.get_filter_index()?.get(filter_id).cloned();
        let band = match indexed {
            Some(band) => band,
            None => {
                tracing::debug!("filter {filter_id} not in the embedded index, querying SVO");
                query_svo_filter(&self.env_state, filter_id)?
            }
        };

        let band = Arc::new(band);
        self.filter_cache
            .insert(filter_id.to_string(), band.clone());
        Ok(band)
    }

    /// Number of distinct bands resolved so far in this run.
    pub fn resolved_band_count(&self) -> usize {
        self.filter_cache.len()
    }
}
