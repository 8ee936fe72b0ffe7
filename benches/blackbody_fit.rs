//! Benchmarks for the per-epoch blackbody fits.
//!
//! Usage:
//!   cargo bench --bench blackbody_fit

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::DMatrix;

use bolfit::blackbody::fit_blackbody_curve;
use bolfit::constants::{
    AB_MAG_OFFSET, ANG_TO_CM, BOLTZMANN_CGS, DPI, PLANCK_CGS, TEN_PARSEC_CM, VLIGHT_CGS,
};
use bolfit::gaussian_process::DenseLightCurve;

const WAVELENGTHS: [f64; 4] = [3600.0, 4700.0, 6200.0, 7600.0];

/// Stored log-flux of a blackbody photosphere seen from 10 pc.
fn stored_value(temperature: f64, radius: f64, wavelength: f64) -> f64 {
    let lam_cm = wavelength * ANG_TO_CM;
    let x = PLANCK_CGS * VLIGHT_CGS / (lam_cm * BOLTZMANN_CGS * temperature);
    let radiance = DPI * PLANCK_CGS * VLIGHT_CGS.powi(2) / lam_cm.powi(5) / x.exp_m1();
    let luminosity_density = 2.0 * DPI * radius.powi(2) * radiance;
    let flux_density =
        luminosity_density * lam_cm.powi(2) / VLIGHT_CGS / (2.0 * DPI * TEN_PARSEC_CM.powi(2));
    2.5 * flux_density.log10() + AB_MAG_OFFSET
}

/// Dense curve of `n_epochs` epochs along a cooling, expanding trajectory.
fn make_dense(n_epochs: usize) -> DenseLightCurve {
    let n_filters = WAVELENGTHS.len();
    let epochs: Vec<f64> = (0..n_epochs).map(|i| i as f64).collect();
    let mut fluxes = DMatrix::zeros(n_epochs, n_filters);
    for (i, &t) in epochs.iter().enumerate() {
        let temperature = 11_000.0 - 150.0 * t;
        let radius = 8.0e14 + 6.0e13 * t;
        for (j, &wavelength) in WAVELENGTHS.iter().enumerate() {
            fluxes[(i, j)] = stored_value(temperature, radius, wavelength);
        }
    }
    DenseLightCurve {
        epochs,
        wavelengths: WAVELENGTHS.iter().map(|w| (w - 5525.0) / 1000.0).collect(),
        fluxes,
        sigmas: DMatrix::from_element(n_epochs, n_filters, 0.02),
    }
}

fn bench_ten_epochs(c: &mut Criterion) {
    let dense = make_dense(10);
    c.bench_function("blackbody_fit/10_epochs", |b| {
        b.iter(|| fit_blackbody_curve(black_box(&dense), &WAVELENGTHS, 0.0, 200).unwrap())
    });
}

fn bench_thirty_epochs(c: &mut Criterion) {
    let dense = make_dense(30);
    c.bench_function("blackbody_fit/30_epochs", |b| {
        b.iter(|| fit_blackbody_curve(black_box(&dense), &WAVELENGTHS, 0.0, 200).unwrap())
    });
}

criterion_group!(benches, bench_ten_epochs, bench_thirty_epochs);
criterion_main!(benches);
