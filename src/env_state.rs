//! # Bolfit environment state
//!
//! This module defines [`crate::env_state::BolfitEnv`], the **shared environment object** used
//! across the `Bolfit` library. It provides access to a persistent **HTTP client** used to query
//! the SVO Filter Profile Service for filter metadata.
//!
//! ## Overview
//!
//! The main responsibilities of `BolfitEnv` are:
//!
//! 1. Manage a global [`ureq::Agent`] HTTP client with a bounded global timeout, so that a
//!    stalled metadata lookup surfaces as an error instead of hanging the run.
//! 2. Provide a simple utility for performing HTTP GET requests with error propagation.
//!
//! ## Structure
//!
//! ```text
//! BolfitEnv
//! └── http_client  (ureq::Agent)
//! ```
//!
//! ## Notes
//!
//! - The [`crate::env_state::BolfitEnv`] struct is meant to be reused and shared between
//!   different parts of the crate to avoid redundant HTTP session creation.
//! - Transport failures (including timeout expiry) map to
//!   [`BolfitError::FilterServiceError`](crate::bolfit_errors::BolfitError::FilterServiceError),
//!   which is fatal but explicitly retryable from the caller's side.
use std::convert::TryFrom;
use std::{fmt::Debug, time::Duration};
use ureq::{
    http::{self, Uri},
    Agent,
};

use crate::bolfit_errors::BolfitError;

/// This object is passed to the various functions in the library
/// to provide access to the state of the library
///
/// # Fields
///
/// * `http_client` - A ureq client used to make HTTP requests
#[derive(Debug, Clone)]
pub struct BolfitEnv {
    pub http_client: Agent,
}

impl Default for BolfitEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl BolfitEnv {
    /// Create a new environment object
    ///
    /// Return
    /// ------
    /// * A new `BolfitEnv`
    ///     - The HTTP client is created with a 10 second global timeout
    pub fn new() -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(10)))
            .build();
        let agent: Agent = config.into();

        BolfitEnv { http_client: agent }
    }

    /// Perform a GET request and return the response body as a string.
    ///
    /// Arguments
    /// ---------
    /// * `url`: the URL to fetch
    ///
    /// Return
    /// ------
    /// * The response body, or a [`BolfitError::FilterServiceError`] on any transport
    ///   failure (connection, timeout, non-2xx status).
    pub(crate) fn get_from_url<U>(&self, url: U) -> Result<String, BolfitError>
    where
        Uri: TryFrom<U>,
        <Uri as TryFrom<U>>::Error: Into<http::Error>,
    {
        let mut response = self.http_client.get(url).call()?;
        let body = response.body_mut().read_to_string()?;
        Ok(body)
    }
}
