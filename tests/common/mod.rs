use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};

/// One photometry row: epoch (MJD), magnitude, uncertainty and filter id,
/// written in the AB system.
pub type PhotometryRow = (f64, f64, f64, &'static str);

/// Write a photometry file in the on-disk format: redshift and reddening
/// header lines, then one five-field row per observation.
pub fn write_photometry_file(
    dir: &Utf8Path,
    name: &str,
    redshift: f64,
    reddening: f64,
    rows: &[PhotometryRow],
) -> Utf8PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(path.as_std_path()).unwrap();
    writeln!(file, "{redshift}").unwrap();
    writeln!(file, "{reddening}").unwrap();
    for &(time, magnitude, uncertainty, filter_id) in rows {
        writeln!(file, "{time} {magnitude:.8} {uncertainty} {filter_id} AB").unwrap();
    }
    path
}
