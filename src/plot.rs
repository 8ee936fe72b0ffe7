//! # Chart Rendering
//!
//! Renders the three diagnostic charts of a run as PNG files, named after
//! the run:
//!
//! * `<name>_gp.png` – interpolated light curves per filter, with the 1-sigma
//!   band, the observed points and, on request, the aligned template sampled
//!   at integer days.
//! * `<name>_bb_ev.png` – blackbody temperature and radius evolution, two
//!   stacked panels sharing the time axis.
//! * `<name>_bb_bol.png` – the bolometric light curve on a log luminosity
//!   axis.
//!
//! Filters are colored by wavelength rank, blue hues for the bluest filter
//! through red for the reddest. Epochs whose blackbody fit did not converge
//! are left out of the blackbody charts. Any backend failure surfaces as
//! [`BolfitError::PlotError`].
use camino::{Utf8Path, Utf8PathBuf};
use itertools::{izip, Itertools};
use plotters::prelude::*;
use plotters::series::DashedLineSeries;

use crate::blackbody::BlackbodyCurve;
use crate::bolfit_errors::BolfitError;
use crate::gaussian_process::DenseLightCurve;
use crate::photometry::PhotometrySet;
use crate::templates::AlignedTemplate;

const CHART_SIZE: (u32, u32) = (1024, 768);

/// Wrap any drawing-backend failure into the crate error type.
fn chart_error(err: impl std::fmt::Display) -> BolfitError {
    BolfitError::PlotError(err.to_string())
}

/// Hue by wavelength rank: 0.63 (blue) for the bluest filter down to 0.0
/// (red) for the reddest.
fn filter_color(n_filters: usize, rank: usize) -> HSLColor {
    let t = if n_filters > 1 {
        rank as f64 / (n_filters - 1) as f64
    } else {
        0.0
    };
    HSLColor(0.63 * (1.0 - t), 0.9, 0.45)
}

/// Track finite values into a running (min, max) pair.
fn track_bounds(bounds: &mut (f64, f64), value: f64) {
    if value.is_finite() {
        bounds.0 = bounds.0.min(value);
        bounds.1 = bounds.1.max(value);
    }
}

/// Pad a (min, max) pair by a relative margin on both sides. Zero-width
/// spans pad relative to the value itself so single-point charts keep a
/// visible range.
fn pad_bounds(bounds: (f64, f64), margin: f64) -> (f64, f64) {
    let span = bounds.1 - bounds.0;
    let span = if span > 0.0 {
        span
    } else {
        bounds.1.abs().max(1.0)
    };
    (bounds.0 - span * margin, bounds.1 + span * margin)
}

/// Render `<name>_gp.png`, the per-filter interpolated light curves.
///
/// Every filter draws its time-sorted interpolated curve, a shaded 1-sigma
/// band and its observed points, all in the filter's wavelength color and
/// converted back to absolute AB magnitudes. With `show_template` and an
/// aligned template, the template is overlaid dashed at integer days. The
/// magnitude axis increases downward.
///
/// Arguments
/// -----------------
/// * `output_dir` – Destination directory, assumed to exist.
/// * `name` – Run name; also the chart title.
/// * `photometry` – Observed points, filter labels and the flux correction.
/// * `dense` – Interpolated light curve.
/// * `template` – Aligned template; its class names the title even when the
///   overlay is off.
/// * `show_template` – Draw the dashed template overlay.
///
/// Return
/// ----------
/// * The path of the written PNG, or [`BolfitError::PlotError`].
pub fn render_light_curves(
    output_dir: &Utf8Path,
    name: &str,
    photometry: &PhotometrySet,
    dense: &DenseLightCurve,
    template: Option<&AlignedTemplate>,
    show_template: bool,
) -> Result<Utf8PathBuf, BolfitError> {
    let path = output_dir.join(format!("{name}_gp.png"));
    let flux_correction = photometry.context.flux_correction;
    let labels = photometry.unique_filter_labels();
    let physical = photometry.unique_wavelengths_angstrom();
    let n_filters = dense.n_filters();

    let order: Vec<usize> = (0..dense.n_epochs())
        .sorted_by(|&a, &b| dense.epochs[a].total_cmp(&dense.epochs[b]))
        .collect();
    let magnitude = |row: usize, col: usize| -(dense.fluxes[(row, col)] + flux_correction);

    // Template overlay sampled at integer days across the observed span.
    let overlay: Vec<Vec<(f64, f64)>> = match template {
        Some(aligned) if show_template => {
            let first = dense.epochs[order[0]].round() as i64;
            let last = dense.epochs[order[order.len() - 1]].round() as i64;
            (0..n_filters)
                .map(|col| {
                    (first..last)
                        .map(|day| {
                            let t = day as f64;
                            (t, -(aligned.log_flux(t, physical[col]) + flux_correction))
                        })
                        .collect()
                })
                .collect()
        }
        _ => Vec::new(),
    };

    let mut t_bounds = (f64::INFINITY, f64::NEG_INFINITY);
    let mut m_bounds = (f64::INFINITY, f64::NEG_INFINITY);
    for &row in &order {
        track_bounds(&mut t_bounds, dense.epochs[row]);
        for col in 0..n_filters {
            track_bounds(&mut m_bounds, magnitude(row, col) - dense.sigmas[(row, col)]);
            track_bounds(&mut m_bounds, magnitude(row, col) + dense.sigmas[(row, col)]);
        }
    }
    for obs in &photometry.observations {
        track_bounds(&mut m_bounds, -(obs.log_flux + flux_correction));
    }
    for series in &overlay {
        for &(_, m) in series {
            track_bounds(&mut m_bounds, m);
        }
    }
    let (t_min, t_max) = pad_bounds(t_bounds, 0.03);
    let (m_min, m_max) = pad_bounds(m_bounds, 0.05);

    let title = match template {
        Some(aligned) => format!("{name} using sn{} template", aligned.class.tag()),
        None => name.to_string(),
    };

    let root = BitMapBackend::new(path.as_std_path(), CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_error)?;

    // Reversed magnitude range: brighter is up.
    let mut chart = ChartBuilder::on(&root)
        .caption(&title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(t_min..t_max, m_max..m_min)
        .map_err(chart_error)?;
    chart
        .configure_mesh()
        .x_desc("Time(days)")
        .y_desc("Absolute Magnitudes")
        .draw()
        .map_err(chart_error)?;

    for col in 0..n_filters {
        let color = filter_color(n_filters, col);
        let curve: Vec<(f64, f64)> = order
            .iter()
            .map(|&row| (dense.epochs[row], magnitude(row, col)))
            .collect();

        // 1-sigma band: upper edge forward, lower edge back.
        let band: Vec<(f64, f64)> = order
            .iter()
            .map(|&row| (dense.epochs[row], magnitude(row, col) - dense.sigmas[(row, col)]))
            .chain(order.iter().rev().map(|&row| {
                (dense.epochs[row], magnitude(row, col) + dense.sigmas[(row, col)])
            }))
            .collect();
        chart
            .draw_series(std::iter::once(Polygon::new(band, color.mix(0.2).filled())))
            .map_err(chart_error)?;

        let legend_label = labels[col].split('/').next_back().unwrap_or(&labels[col]).to_string();
        chart
            .draw_series(LineSeries::new(curve, color.stroke_width(2)))
            .map_err(chart_error)?
            .label(legend_label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 12, y)], color.stroke_width(2)));

        if let Some(series) = overlay.get(col) {
            chart
                .draw_series(DashedLineSeries::new(
                    series.iter().copied(),
                    6,
                    4,
                    color.stroke_width(1),
                ))
                .map_err(chart_error)?;
        }
    }

    for obs in &photometry.observations {
        let rank = dense
            .wavelengths
            .iter()
            .position(|w| w.total_cmp(&obs.filter_wavelength).is_eq())
            .unwrap_or(0);
        let color = filter_color(n_filters, rank);
        chart
            .draw_series(std::iter::once(Circle::new(
                (obs.time, -(obs.log_flux + flux_correction)),
                4,
                color.filled(),
            )))
            .map_err(chart_error)?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(chart_error)?;
    root.present().map_err(chart_error)?;

    Ok(path.clone())
}

/// Black scatter with vertical 1-sigma bars on one panel.
fn draw_error_scatter(
    area: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
    caption: &str,
    points: &[(f64, f64, f64)],
    x_desc: &str,
    y_desc: &str,
) -> Result<(), BolfitError> {
    let mut t_bounds = (f64::INFINITY, f64::NEG_INFINITY);
    let mut v_bounds = (f64::INFINITY, f64::NEG_INFINITY);
    for &(t, v, e) in points {
        track_bounds(&mut t_bounds, t);
        track_bounds(&mut v_bounds, v - e);
        track_bounds(&mut v_bounds, v + e);
    }
    let (t_min, t_max) = pad_bounds(t_bounds, 0.03);
    let (v_min, v_max) = pad_bounds(v_bounds, 0.08);

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 28))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(t_min..t_max, v_min..v_max)
        .map_err(chart_error)?;
    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .draw()
        .map_err(chart_error)?;

    for &(t, v, e) in points {
        chart
            .draw_series(LineSeries::new(vec![(t, v - e), (t, v + e)], &BLACK))
            .map_err(chart_error)?;
        chart
            .draw_series(std::iter::once(Circle::new((t, v), 3, BLACK.filled())))
            .map_err(chart_error)?;
    }

    Ok(())
}

/// Render `<name>_bb_ev.png`, temperature and radius evolution on two
/// stacked panels sharing the time span. Temperatures are in 1000 K and
/// radii in 1e15 cm, matching the output table scaling.
///
/// Arguments
/// -----------------
/// * `output_dir` – Destination directory, assumed to exist.
/// * `name` – Run name; titles the upper panel.
/// * `dense` – Supplies the epoch of each fit.
/// * `blackbody` – Per-epoch fits; non-convergent epochs are skipped.
///
/// Return
/// ----------
/// * The path of the written PNG, or [`BolfitError::PlotError`].
pub fn render_blackbody_evolution(
    output_dir: &Utf8Path,
    name: &str,
    dense: &DenseLightCurve,
    blackbody: &BlackbodyCurve,
) -> Result<Utf8PathBuf, BolfitError> {
    let path = output_dir.join(format!("{name}_bb_ev.png"));

    let temperatures: Vec<(f64, f64, f64)> = izip!(&dense.epochs, &blackbody.fits)
        .filter(|(_, fit)| fit.temperature().is_finite())
        .map(|(&t, fit)| (t, fit.temperature() / 1.0e3, fit.temperature_err() / 1.0e3))
        .collect();
    let radii: Vec<(f64, f64, f64)> = izip!(&dense.epochs, &blackbody.fits)
        .filter(|(_, fit)| fit.radius().is_finite())
        .map(|(&t, fit)| (t, fit.radius() / 1.0e15, fit.radius_err() / 1.0e15))
        .collect();

    let root = BitMapBackend::new(path.as_std_path(), CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_error)?;
    if temperatures.is_empty() {
        tracing::warn!(run = name, "no converged blackbody epochs, evolution chart left empty");
        root.present().map_err(chart_error)?;
        return Ok(path.clone());
    }

    let panels = root.split_evenly((2, 1));
    draw_error_scatter(&panels[0], name, &temperatures, "", "Temp. (1000 K)")?;
    draw_error_scatter(&panels[1], "", &radii, "Time (Days)", "Radius (10^15 cm)")?;
    root.present().map_err(chart_error)?;

    Ok(path.clone())
}

/// Render `<name>_bb_bol.png`, the bolometric light curve with error bars on
/// a decimal-log luminosity axis.
///
/// Arguments
/// -----------------
/// * `output_dir` – Destination directory, assumed to exist.
/// * `name` – Run name; also the chart title.
/// * `dense` – Supplies the epoch of each fit.
/// * `blackbody` – Bolometric curve; non-convergent epochs are skipped.
///
/// Return
/// ----------
/// * The path of the written PNG, or [`BolfitError::PlotError`].
pub fn render_bolometric_curve(
    output_dir: &Utf8Path,
    name: &str,
    dense: &DenseLightCurve,
    blackbody: &BlackbodyCurve,
) -> Result<Utf8PathBuf, BolfitError> {
    let path = output_dir.join(format!("{name}_bb_bol.png"));

    let points: Vec<(f64, f64, f64)> = izip!(
        &dense.epochs,
        &blackbody.luminosity,
        &blackbody.luminosity_err
    )
    .filter(|(_, lum, _)| lum.is_finite())
    .map(|(&t, &lum, &err)| (t, lum, err))
    .collect();

    let root = BitMapBackend::new(path.as_std_path(), CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_error)?;
    if points.is_empty() {
        tracing::warn!(run = name, "no converged blackbody epochs, bolometric chart left empty");
        root.present().map_err(chart_error)?;
        return Ok(path.clone());
    }

    let mut t_bounds = (f64::INFINITY, f64::NEG_INFINITY);
    let mut l_bounds = (f64::INFINITY, f64::NEG_INFINITY);
    for &(t, lum, _) in &points {
        track_bounds(&mut t_bounds, t);
        track_bounds(&mut l_bounds, lum);
    }
    let (t_min, t_max) = pad_bounds(t_bounds, 0.03);
    // Log axis: pad multiplicatively and keep the error bars positive.
    let (l_min, l_max) = (l_bounds.0 / 5.0, l_bounds.1 * 5.0);

    let mut chart = ChartBuilder::on(&root)
        .caption(name, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(t_min..t_max, (l_min..l_max).log_scale())
        .map_err(chart_error)?;
    chart
        .configure_mesh()
        .x_desc("Time (Days)")
        .y_desc("Bolometric Luminosity")
        .draw()
        .map_err(chart_error)?;

    for &(t, lum, err) in &points {
        let lo = (lum - err).max(l_min);
        let hi = (lum + err).min(l_max);
        chart
            .draw_series(LineSeries::new(vec![(t, lo), (t, hi)], &BLACK))
            .map_err(chart_error)?;
        chart
            .draw_series(std::iter::once(Circle::new((t, lum), 3, BLACK.filled())))
            .map_err(chart_error)?;
    }
    root.present().map_err(chart_error)?;

    Ok(path.clone())
}

#[cfg(test)]
mod test_plot {
    use super::*;

    #[test]
    fn test_filter_colors_span_blue_to_red() {
        let bluest = filter_color(4, 0);
        let reddest = filter_color(4, 3);
        assert!((bluest.0 - 0.63).abs() < 1e-12);
        assert_eq!(reddest.0, 0.0);
        // Single filter degenerates to the blue end without dividing by zero.
        assert!((filter_color(1, 0).0 - 0.63).abs() < 1e-12);
    }

    #[test]
    fn test_bounds_ignore_non_finite_values() {
        let mut bounds = (f64::INFINITY, f64::NEG_INFINITY);
        track_bounds(&mut bounds, 1.0);
        track_bounds(&mut bounds, f64::NAN);
        track_bounds(&mut bounds, -3.0);
        track_bounds(&mut bounds, f64::INFINITY);
        assert_eq!(bounds, (-3.0, 1.0));
    }

    #[test]
    fn test_padding_widens_degenerate_spans() {
        let (lo, hi) = pad_bounds((2.0, 2.0), 0.05);
        assert!(lo < 2.0 && hi > 2.0);
        let (lo, hi) = pad_bounds((0.0, 10.0), 0.1);
        assert_eq!((lo, hi), (-1.0, 11.0));
    }
}
