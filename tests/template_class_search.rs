use std::io::Write;

use camino::Utf8Path;
use tempfile::tempdir;

use bolfit::bolfit::Bolfit;
use bolfit::estimator::{run_estimation, EstimatorParams, TemplateMode};
use bolfit::templates::TransientClass;

mod common;

const FILTERS: [(&str, f64); 2] = [("SLOAN/SDSS.g", 4700.33), ("SLOAN/SDSS.r", 6174.48)];

/// Smooth light-curve surface: quadratic in time around the day-20 peak with
/// a mild wavelength tilt; `rise` and `decline` set the curvature per side.
fn shape(t: f64, wavelength: f64, rise: f64, decline: f64) -> f64 {
    let dt = t - 20.0;
    let curvature = if dt < 0.0 { rise } else { decline };
    3.0 - curvature * dt * dt + 0.1 * (wavelength - 5500.0) / 1000.0
}

/// Write one template file per class. The generating class carries the
/// asymmetric shape the photometry is drawn from; every other class gets a
/// symmetric curve no time stretch can turn into it.
fn write_template_library(dir: &Utf8Path, generating: TransientClass) {
    for class in TransientClass::ALL {
        let (rise, decline) = if class == generating {
            (0.004, 0.001)
        } else {
            (0.002, 0.002)
        };
        let path = dir.join(format!("smoothed_sn{}.dat", class.tag()));
        let mut file = std::fs::File::create(path.as_std_path()).unwrap();
        for t in 0..=40 {
            for k in 0..=160 {
                let wavelength = 4000.0 + 20.0 * k as f64;
                let log_flux = shape(t as f64, wavelength, rise, decline);
                let f_lambda = 10f64.powf(log_flux / 2.5) / (wavelength * wavelength);
                writeln!(file, "{t} {wavelength} {f_lambda:e}").unwrap();
            }
        }
    }
}

#[test]
fn test_class_search_recovers_the_generating_class() {
    let dir = tempdir().unwrap();
    let dir_path = Utf8Path::from_path(dir.path()).unwrap();
    let library = dir_path.join("templates");
    std::fs::create_dir_all(library.as_std_path()).unwrap();
    write_template_library(&library, TransientClass::IIP);

    let mut rows = Vec::new();
    for &(id, wavelength) in &FILTERS {
        for step in 0..17 {
            let t = 2.0 + 2.0 * step as f64;
            rows.push((t, -shape(t, wavelength, 0.004, 0.001), 0.05, id));
        }
    }
    let input = common::write_photometry_file(dir_path, "tplsearch.dat", 0.0, 0.0, &rows);

    let params = EstimatorParams::builder()
        .template_mode(TemplateMode::AutoSelect)
        .template_dir(library)
        .output_dir(dir_path.join("products"))
        .build()
        .unwrap();
    let mut state = Bolfit::new();
    let report = run_estimation(&mut state, &input, &params).unwrap();

    let aligned = report
        .template
        .expect("auto-select should align the winning template");
    assert_eq!(aligned.class, TransientClass::IIP);
    assert!(report.output_table.as_std_path().exists());
}
