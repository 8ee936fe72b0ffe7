//! # Cubic Spline Interpolation
//!
//! Natural cubic splines in one dimension and their tensor-product extension
//! to rectangular (time × wavelength) grids.
//!
//! ## Overview
//! -----------------
//! This module provides:
//! - [`CubicSpline`], a twice-differentiable interpolant through strictly
//!   ascending knots, with natural boundary conditions (zero curvature at the
//!   ends) and polynomial extrapolation of the end panels.
//! - [`BicubicSpline`], the tensor-product surface used for template grids:
//!   one spline per wavelength column along the time axis, crossed at query
//!   time by a spline along the wavelength axis.
//!
//! ## Notes
//! -----------------
//! Queries outside the knot range evaluate the cubic polynomial of the nearest
//! end panel. Template alignment relies on this when the fitted time shift
//! pushes observation epochs slightly past the template's time coverage.
use nalgebra::DMatrix;

/// Natural cubic spline through `(x, y)` knots with strictly ascending `x`.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivatives at the knots; zero at both ends.
    second_derivs: Vec<f64>,
}

impl CubicSpline {
    /// Build the spline from parallel knot slices.
    ///
    /// Arguments
    /// -----------------
    /// * `xs` – Strictly ascending abscissae, at least two.
    /// * `ys` – Knot values, same length as `xs`.
    ///
    /// Return
    /// ----------
    /// * The interpolating spline. With exactly two knots it degenerates to
    ///   the connecting line.
    pub fn new(xs: &[f64], ys: &[f64]) -> Self {
        debug_assert_eq!(xs.len(), ys.len());
        debug_assert!(xs.len() >= 2);
        debug_assert!(xs.windows(2).all(|w| w[0] < w[1]));

        let n = xs.len();
        let mut second_derivs = vec![0.0; n];

        if n > 2 {
            // Tridiagonal system for the interior curvatures, natural ends.
            let m = n - 2;
            let mut lower = vec![0.0; m];
            let mut diag = vec![0.0; m];
            let mut upper = vec![0.0; m];
            let mut rhs = vec![0.0; m];

            for i in 1..n - 1 {
                let h_prev = xs[i] - xs[i - 1];
                let h_next = xs[i + 1] - xs[i];
                lower[i - 1] = h_prev / 6.0;
                diag[i - 1] = (h_prev + h_next) / 3.0;
                upper[i - 1] = h_next / 6.0;
                rhs[i - 1] =
                    (ys[i + 1] - ys[i]) / h_next - (ys[i] - ys[i - 1]) / h_prev;
            }

            let interior = solve_tridiagonal(&lower, &diag, &upper, &rhs);
            second_derivs[1..n - 1].copy_from_slice(&interior);
        }

        Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            second_derivs,
        }
    }

    /// Evaluate the spline at `x`.
    ///
    /// Outside the knot range this evaluates the end panel's cubic, which for
    /// a natural spline approaches linear extrapolation.
    pub fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        // Panel index, clamped so out-of-range queries use the end panels.
        let i = self
            .xs
            .partition_point(|&knot| knot <= x)
            .clamp(1, n - 1)
            - 1;

        let h = self.xs[i + 1] - self.xs[i];
        let a = (self.xs[i + 1] - x) / h;
        let b = (x - self.xs[i]) / h;

        a * self.ys[i]
            + b * self.ys[i + 1]
            + ((a * a * a - a) * self.second_derivs[i]
                + (b * b * b - b) * self.second_derivs[i + 1])
                * h
                * h
                / 6.0
    }
}

/// Tensor-product bicubic spline over a rectangular grid.
///
/// Grid values are `grid[(i, j)] = f(xs[i], ys[j])`. One column spline along
/// `xs` is prebuilt per `ys[j]`; each query evaluates all columns at the query
/// abscissa and splines the results across `ys`.
#[derive(Debug, Clone)]
pub struct BicubicSpline {
    ys: Vec<f64>,
    column_splines: Vec<CubicSpline>,
}

impl BicubicSpline {
    /// Build the surface from a rectangular grid.
    ///
    /// Arguments
    /// -----------------
    /// * `xs` – Strictly ascending first-axis knots (rows of `grid`).
    /// * `ys` – Strictly ascending second-axis knots (columns of `grid`).
    /// * `grid` – Values with `xs.len()` rows and `ys.len()` columns.
    pub fn new(xs: &[f64], ys: &[f64], grid: &DMatrix<f64>) -> Self {
        debug_assert_eq!(grid.nrows(), xs.len());
        debug_assert_eq!(grid.ncols(), ys.len());

        let column_splines = (0..ys.len())
            .map(|j| {
                let column: Vec<f64> = grid.column(j).iter().copied().collect();
                CubicSpline::new(xs, &column)
            })
            .collect();

        Self {
            ys: ys.to_vec(),
            column_splines,
        }
    }

    /// Evaluate the surface at `(x, y)`.
    pub fn eval(&self, x: f64, y: f64) -> f64 {
        let cross: Vec<f64> = self
            .column_splines
            .iter()
            .map(|spline| spline.eval(x))
            .collect();
        CubicSpline::new(&self.ys, &cross).eval(y)
    }
}

/// Thomas algorithm for a tridiagonal system; diagonally dominant inputs only.
fn solve_tridiagonal(lower: &[f64], diag: &[f64], upper: &[f64], rhs: &[f64]) -> Vec<f64> {
    let n = diag.len();
    let mut scratch = vec![0.0; n];
    let mut solution = vec![0.0; n];

    scratch[0] = upper[0] / diag[0];
    solution[0] = rhs[0] / diag[0];
    for i in 1..n {
        let denom = diag[i] - lower[i] * scratch[i - 1];
        scratch[i] = upper[i] / denom;
        solution[i] = (rhs[i] - lower[i] * solution[i - 1]) / denom;
    }

    for i in (0..n - 1).rev() {
        solution[i] -= scratch[i] * solution[i + 1];
    }

    solution
}
