//! # Constants and type definitions for Bolfit
//!
//! This module centralizes the **physical constants**, **conversion factors**, and **common type
//! definitions** used throughout the `Bolfit` library. It also defines the container types for
//! photometric observations.
//!
//! ## Overview
//!
//! - Radiative and photometric constants (CGS units throughout)
//! - Unit conversions (Angstrom ↔ cm, parsec-based fiducials)
//! - Core type aliases used across the crate
//!
//! These definitions are used by all main modules, including the normalizer, the Gaussian
//! process interpolator, and the blackbody fitter.

use crate::filters::FilterBand;
use crate::photometry::Observation;
use std::collections::HashMap;
use std::sync::Arc;

// -------------------------------------------------------------------------------------------------
// Physical constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for solid-angle and luminosity factors
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Speed of light in cm/s
pub const VLIGHT_CGS: f64 = 2.99792458e10;

/// Planck constant in erg·s
pub const PLANCK_CGS: f64 = 6.62607e-27;

/// Boltzmann constant in erg/K
pub const BOLTZMANN_CGS: f64 = 1.38064852e-16;

/// Stefan–Boltzmann constant in erg·cm⁻²·s⁻¹·K⁻⁴
pub const STEFAN_BOLTZMANN_CGS: f64 = 5.6704e-5;

/// Angstrom → centimeter
pub const ANG_TO_CM: f64 = 1e-8;

/// Zero-point flux of the AB magnitude system, in Jansky
pub const AB_ZERO_POINT_JY: f64 = 3631.0;

/// AB magnitude zero-point constant: m_AB = -2.5·log10(f_ν) - 48.6 (f_ν in erg·s⁻¹·cm⁻²·Hz⁻¹)
pub const AB_MAG_OFFSET: f64 = 48.6;

/// d(f_ν)/dm Jacobian prefactor, ln(10)/2.5
pub const LN10_OVER_2P5: f64 = 0.921034;

/// 10 parsec in centimeters, the fiducial distance at which absolute AB magnitudes
/// are converted to physical flux densities
pub const TEN_PARSEC_CM: f64 = 3.086e19;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Time in days (relative to the first surviving observation after normalization)
pub type Day = f64;
/// Wavelength in Angstrom
pub type Angstrom = f64;
/// Wavelength in kilo-Angstrom (normalized unit of the regression inputs)
pub type KiloAngstrom = f64;
/// Temperature in Kelvin
pub type Kelvin = f64;
/// Length in centimeters
pub type Centimeter = f64;
/// Luminosity in erg/s
pub type ErgPerSec = f64;
/// Base-10 log-flux scale anchored at the AB zero-point, 2.5·(log10(f) − log10(3631))
pub type LogFlux = f64;
/// Identifier of a photometric filter (SVO Filter Profile Service convention,
/// e.g. `"Swift/UVOT.U"`)
pub type FilterId = String;

/// Lookup table from filter identifier to [`FilterBand`] metadata
pub type FilterBandMap = HashMap<FilterId, Arc<FilterBand>>;

// -------------------------------------------------------------------------------------------------
// Data containers
// -------------------------------------------------------------------------------------------------

/// Normalized observations of a single transient, in input insertion order.
pub type Observations = Vec<Observation>;
