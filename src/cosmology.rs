//! # Flat ΛCDM Distance Relations
//!
//! Luminosity distance and distance modulus for the Planck 2013 flat
//! cosmology (`H0 = 67.77 km/s/Mpc`, `Ωm = 0.30712`), plus the inversions
//! needed to accept any one of redshift, distance or modulus as run input.
//!
//! ## Overview
//! -----------------
//! This module provides:
//! - [`luminosity_distance`] and [`distance_modulus`] by Simpson-rule
//!   integration of the inverse Hubble function.
//! - [`resolve_distance`], the exactly-one-of-three input rule that derives
//!   the missing quantities (Brent root bracketing for the inversions) or
//!   falls back to absolute-magnitude mode.
//!
//! ## Units & Conventions
//! -----------------
//! - Distances in megaparsec, moduli in magnitudes.
//! - Radiation density is neglected; below `z ~ 10` this is far smaller than
//!   the photometric uncertainties the moduli are combined with.
//!
//! ## Error Handling
//! -----------------
//! Contradictory inputs (more than one of the three set) or unphysical values
//! are [`BolfitError::InvalidConfig`]; a target outside the search bracket
//! surfaces as [`BolfitError::RootFindingError`].
use roots::{find_root_brent, SimpleConvergency};
use tracing::{debug, warn};

use crate::bolfit_errors::BolfitError;

/// Hubble constant, km/s/Mpc (Planck 2013).
const HUBBLE_CONSTANT: f64 = 67.77;

/// Present-day matter density parameter (Planck 2013).
const OMEGA_MATTER: f64 = 0.30712;

/// Speed of light in km/s.
const VLIGHT_KM_S: f64 = 299792.458;

/// Simpson panels for the comoving-distance integral.
const INTEGRATION_PANELS: usize = 200;

/// Redshift search bracket for the Brent inversions.
const REDSHIFT_BRACKET: (f64, f64) = (1e-8, 20.0);

/// Distance quantities of one run, all mutually consistent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedDistance {
    pub redshift: f64,
    pub distance_mpc: f64,
    pub distance_modulus: f64,
}

/// Dimensionless Hubble function `E(z)` for flat matter + Λ.
fn hubble_e(redshift: f64) -> f64 {
    (OMEGA_MATTER * (1.0 + redshift).powi(3) + (1.0 - OMEGA_MATTER)).sqrt()
}

/// Composite Simpson rule for `∫ f dz` over `[0, z]`.
fn simpson<F: Fn(f64) -> f64>(f: F, upper: f64, panels: usize) -> f64 {
    let h = upper / panels as f64;
    let mut acc = f(0.0) + f(upper);
    for i in 1..panels {
        let weight = if i % 2 == 0 { 2.0 } else { 4.0 };
        acc += weight * f(i as f64 * h);
    }
    acc * h / 3.0
}

/// Luminosity distance in Mpc, `(1 + z) · D_C(z)`.
pub fn luminosity_distance(redshift: f64) -> f64 {
    let hubble_distance = VLIGHT_KM_S / HUBBLE_CONSTANT;
    let comoving = hubble_distance * simpson(|z| 1.0 / hubble_e(z), redshift, INTEGRATION_PANELS);
    (1.0 + redshift) * comoving
}

/// Distance modulus in magnitudes, `5·log10(d_L / 10 pc)`.
///
/// With `d_L` in Mpc the ratio to 10 pc is `d_L · 1e5`.
pub fn distance_modulus(redshift: f64) -> f64 {
    5.0 * (luminosity_distance(redshift) * 1e5).log10()
}

/// Redshift whose luminosity distance equals `distance_mpc`.
pub fn redshift_at_distance(distance_mpc: f64) -> Result<f64, BolfitError> {
    invert(|z| luminosity_distance(z) - distance_mpc)
}

/// Redshift whose distance modulus equals `modulus`.
pub fn redshift_at_modulus(modulus: f64) -> Result<f64, BolfitError> {
    invert(|z| distance_modulus(z) - modulus)
}

fn invert<F: Fn(f64) -> f64>(f: F) -> Result<f64, BolfitError> {
    let mut convergency = SimpleConvergency {
        eps: 1e-10,
        max_iter: 200,
    };
    let root = find_root_brent(REDSHIFT_BRACKET.0, REDSHIFT_BRACKET.1, &f, &mut convergency)?;
    Ok(root)
}

/// Derive the full distance triple from at most one supplied quantity.
///
/// Exactly one of the three inputs may be set; the other two are derived from
/// the cosmology. With none set (or a redshift of exactly zero, which carries
/// no distance information) the run proceeds in absolute-magnitude mode with
/// `z = 0`, `dm = 0`.
///
/// Arguments
/// -----------------
/// * `redshift` – Heliocentric redshift, if known.
/// * `distance_mpc` – Luminosity distance in Mpc, if known.
/// * `modulus` – Distance modulus in magnitudes, if known.
///
/// Return
/// ----------
/// * The consistent [`ResolvedDistance`], or
///   [`BolfitError::InvalidConfig`] when more than one input is set or a
///   value is unphysical.
pub fn resolve_distance(
    redshift: Option<f64>,
    distance_mpc: Option<f64>,
    modulus: Option<f64>,
) -> Result<ResolvedDistance, BolfitError> {
    let supplied =
        usize::from(redshift.is_some()) + usize::from(distance_mpc.is_some()) + usize::from(modulus.is_some());
    if supplied > 1 {
        return Err(BolfitError::InvalidConfig(
            "at most one of redshift, distance and distance modulus may be given".into(),
        ));
    }

    if let Some(z) = redshift {
        if z < 0.0 {
            return Err(BolfitError::InvalidConfig(format!(
                "negative redshift {z}"
            )));
        }
        if z == 0.0 {
            debug!("redshift 0 carries no distance, using absolute magnitudes");
            return Ok(ResolvedDistance {
                redshift: 0.0,
                distance_mpc: 0.0,
                distance_modulus: 0.0,
            });
        }
        return Ok(ResolvedDistance {
            redshift: z,
            distance_mpc: luminosity_distance(z),
            distance_modulus: distance_modulus(z),
        });
    }

    if let Some(d) = distance_mpc {
        if d <= 0.0 {
            return Err(BolfitError::InvalidConfig(format!(
                "non-positive luminosity distance {d} Mpc"
            )));
        }
        let z = redshift_at_distance(d)?;
        return Ok(ResolvedDistance {
            redshift: z,
            distance_mpc: d,
            distance_modulus: distance_modulus(z),
        });
    }

    if let Some(dm) = modulus {
        let z = redshift_at_modulus(dm)?;
        return Ok(ResolvedDistance {
            redshift: z,
            distance_mpc: luminosity_distance(z),
            distance_modulus: dm,
        });
    }

    warn!("no distance information supplied, assuming absolute magnitudes");
    Ok(ResolvedDistance {
        redshift: 0.0,
        distance_mpc: 0.0,
        distance_modulus: 0.0,
    })
}
