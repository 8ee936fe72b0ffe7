//! # Estimation Run Configuration & Pipeline
//!
//! This module gathers everything a bolometric estimation run needs:
//! - [`EstimatorParams`] – every knob of the pipeline, immutable once built,
//!   with a validating fluent builder.
//! - [`TemplateMode`] – whether and how an empirical template seeds the
//!   Gaussian-process mean.
//! - The pipeline driver in [`pipeline`], which chains normalization,
//!   template alignment, GP interpolation, blackbody fitting and output.
//!
//! Parameter semantics
//! -----------------
//!
//! **Pipeline**
//! * `template_mode` – `Disabled` regresses around a zero mean; `Fixed(class)`
//!   aligns the named class template; `AutoSelect` searches all classes for
//!   the lowest aggregate chi-square.
//! * `time_window` – accepted `(start, end)` range in days relative to the
//!   rebased zero; observations outside are dropped after the SNR cut.
//! * `snr_threshold` – minimum `1/uncertainty` for a row to survive.
//!
//! **Distance** (at most one of the three; none means absolute magnitudes)
//! * `redshift` – heliocentric redshift.
//! * `distance_mpc` – luminosity distance in Mpc.
//! * `distance_modulus` – distance modulus in magnitudes.
//!
//! **Numerics**
//! * `gp_max_iters` – L-BFGS cap for the GP hyperparameter search.
//! * `fit_max_iters` – damped least-squares cap for the template and
//!   blackbody fits (the alignment chi-square surface is shallow along the
//!   stretch axis and dominates this budget).
//!
//! **Assets & output**
//! * `template_dir` – directory holding the `smoothed_sn<tag>.dat` files.
//! * `output_dir` – destination for the table and charts, created if absent.
//! * `plot` / `show_template` – chart rendering toggles.
//!
//! Defaults
//! -----------------
//! ```rust,no_run
//! use bolfit::estimator::EstimatorParams;
//! let params = EstimatorParams::default();
//! ```
//!
//! * `template_mode`: `Disabled`
//! * `time_window`: (0, 200) d
//! * `snr_threshold`: 4
//! * `redshift` / `distance_mpc` / `distance_modulus`: unset
//! * `gp_max_iters`: 100
//! * `fit_max_iters`: 2000
//! * `template_dir`: `templates`
//! * `output_dir`: `products`
//! * `plot`: false, `show_template`: false
use std::cmp::Ordering::{Equal, Greater, Less};
use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;

use crate::bolfit_errors::BolfitError;
use crate::constants::Day;
use crate::templates::TransientClass;

pub mod pipeline;

pub use pipeline::{run_estimation, EstimationReport};

/// How the Gaussian-process mean function is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateMode {
    /// Zero mean; the GP regresses the raw normalized fluxes.
    Disabled,
    /// Align the named class template and use it as the mean.
    Fixed(TransientClass),
    /// Try every class, keep the lowest aggregate chi-square.
    AutoSelect,
}

impl FromStr for TemplateMode {
    type Err = BolfitError;

    /// Parse the CLI spelling: `0` disables the template, `test` (or `auto`)
    /// turns on the class search, a class tag fixes the class.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(TemplateMode::Disabled),
            "test" | "auto" => Ok(TemplateMode::AutoSelect),
            tag => Ok(TemplateMode::Fixed(tag.parse()?)),
        }
    }
}

impl fmt::Display for TemplateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateMode::Disabled => write!(f, "disabled"),
            TemplateMode::Fixed(class) => write!(f, "{class}"),
            TemplateMode::AutoSelect => write!(f, "auto-select"),
        }
    }
}

/// Configuration of one estimation run. See the module docs for the meaning
/// and defaults of each field.
#[derive(Debug, Clone)]
pub struct EstimatorParams {
    // --- Pipeline ---
    pub template_mode: TemplateMode,
    pub time_window: (Day, Day),
    pub snr_threshold: f64,

    // --- Distance (at most one set) ---
    pub redshift: Option<f64>,
    pub distance_mpc: Option<f64>,
    pub distance_modulus: Option<f64>,

    // --- Numerics ---
    /// L-BFGS iteration cap for the GP hyperparameter search.
    pub gp_max_iters: u64,
    /// Damped least-squares iteration cap for template and blackbody fits.
    pub fit_max_iters: usize,

    // --- Assets & output ---
    pub template_dir: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    pub plot: bool,
    pub show_template: bool,
}

impl EstimatorParams {
    /// Construct [`EstimatorParams`] with the documented default values.
    ///
    /// Equivalent to [`EstimatorParams::default()`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new [`EstimatorParamsBuilder`] to override defaults step by
    /// step before a run.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use bolfit::estimator::{EstimatorParams, TemplateMode};
    ///
    /// let params = EstimatorParams::builder()
    ///     .template_mode(TemplateMode::AutoSelect)
    ///     .redshift(Some(0.102))
    ///     .snr_threshold(5.0)
    ///     .build().unwrap();
    /// ```
    pub fn builder() -> EstimatorParamsBuilder {
        EstimatorParamsBuilder::new()
    }
}

impl Default for EstimatorParams {
    fn default() -> Self {
        EstimatorParams {
            template_mode: TemplateMode::Disabled,
            time_window: (0.0, 200.0),
            snr_threshold: 4.0,

            redshift: None,
            distance_mpc: None,
            distance_modulus: None,

            gp_max_iters: 100,
            fit_max_iters: 2000,

            template_dir: Utf8PathBuf::from("templates"),
            output_dir: Utf8PathBuf::from("products"),
            plot: false,
            show_template: false,
        }
    }
}

/// Builder for [`EstimatorParams`], with validation.
#[derive(Debug, Clone)]
pub struct EstimatorParamsBuilder {
    params: EstimatorParams,
}

impl Default for EstimatorParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EstimatorParamsBuilder {
    /// Create a new builder initialized with default values.
    pub fn new() -> Self {
        Self {
            params: EstimatorParams::default(),
        }
    }

    // --- Pipeline ---
    pub fn template_mode(mut self, v: TemplateMode) -> Self {
        self.params.template_mode = v;
        self
    }
    pub fn time_window(mut self, start: Day, end: Day) -> Self {
        self.params.time_window = (start, end);
        self
    }
    pub fn snr_threshold(mut self, v: f64) -> Self {
        self.params.snr_threshold = v;
        self
    }

    // --- Distance ---
    pub fn redshift(mut self, v: Option<f64>) -> Self {
        self.params.redshift = v;
        self
    }
    pub fn distance_mpc(mut self, v: Option<f64>) -> Self {
        self.params.distance_mpc = v;
        self
    }
    pub fn distance_modulus(mut self, v: Option<f64>) -> Self {
        self.params.distance_modulus = v;
        self
    }

    // --- Numerics ---
    pub fn gp_max_iters(mut self, v: u64) -> Self {
        self.params.gp_max_iters = v;
        self
    }
    pub fn fit_max_iters(mut self, v: usize) -> Self {
        self.params.fit_max_iters = v;
        self
    }

    // --- Assets & output ---
    pub fn template_dir(mut self, v: impl Into<Utf8PathBuf>) -> Self {
        self.params.template_dir = v.into();
        self
    }
    pub fn output_dir(mut self, v: impl Into<Utf8PathBuf>) -> Self {
        self.params.output_dir = v.into();
        self
    }
    pub fn plot(mut self, v: bool) -> Self {
        self.params.plot = v;
        self
    }
    pub fn show_template(mut self, v: bool) -> Self {
        self.params.show_template = v;
        self
    }

    // ---- Numeric helpers for PartialOrd (handle NaN as invalid) ----

    /// Return true iff x >= 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn ge0(x: f64) -> bool {
        matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal))
    }

    /// Return true iff a <= b and comparable (i.e., not NaN).
    #[inline]
    fn le(a: f64, b: f64) -> bool {
        matches!(a.partial_cmp(&b), Some(Less) | Some(Equal))
    }

    /// Finalize the builder and produce an [`EstimatorParams`] instance.
    ///
    /// Validation rules
    /// -----------------
    /// * `time_window.0 <= time_window.1`, both finite.
    /// * `snr_threshold >= 0.0`.
    /// * At most one of `redshift`, `distance_mpc`, `distance_modulus` set;
    ///   a set redshift must be non-negative, a set distance positive.
    /// * `gp_max_iters >= 1`, `fit_max_iters >= 1`.
    ///
    /// Returns
    /// -----------------
    /// * `Ok(EstimatorParams)` when every rule holds.
    /// * `Err(BolfitError::InvalidConfig)` naming the first violated rule.
    pub fn build(self) -> Result<EstimatorParams, BolfitError> {
        let p = &self.params;

        let (start, end) = p.time_window;
        if !start.is_finite() || !end.is_finite() || !Self::le(start, end) {
            return Err(BolfitError::InvalidConfig(
                "time_window must be finite with start <= end".into(),
            ));
        }
        if !Self::ge0(p.snr_threshold) {
            return Err(BolfitError::InvalidConfig(
                "snr_threshold must be non-negative".into(),
            ));
        }

        let supplied = usize::from(p.redshift.is_some())
            + usize::from(p.distance_mpc.is_some())
            + usize::from(p.distance_modulus.is_some());
        if supplied > 1 {
            return Err(BolfitError::InvalidConfig(
                "at most one of redshift, distance and distance modulus may be given".into(),
            ));
        }
        if p.redshift.is_some_and(|z| !Self::ge0(z)) {
            return Err(BolfitError::InvalidConfig(
                "redshift must be non-negative".into(),
            ));
        }
        if p.distance_mpc.is_some_and(|d| !Self::le(f64::MIN_POSITIVE, d)) {
            return Err(BolfitError::InvalidConfig(
                "distance must be positive".into(),
            ));
        }
        if p.distance_modulus.is_some_and(|dm| !dm.is_finite()) {
            return Err(BolfitError::InvalidConfig(
                "distance modulus must be finite".into(),
            ));
        }

        if p.gp_max_iters == 0 {
            return Err(BolfitError::InvalidConfig(
                "gp_max_iters must be >= 1".into(),
            ));
        }
        if p.fit_max_iters == 0 {
            return Err(BolfitError::InvalidConfig(
                "fit_max_iters must be >= 1".into(),
            ));
        }

        Ok(self.params)
    }
}

impl fmt::Display for EstimatorParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 44; // width reserved for "name = value"
            writeln!(f, "Bolometric Estimation Parameters")?;
            writeln!(f, "--------------------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            let option = |v: Option<f64>| match v {
                Some(x) => format!("{x:.4}"),
                None => "unset".to_string(),
            };

            // --- Pipeline ---
            writeln!(f, "[Pipeline]")?;
            line!(
                "template_mode    = {}",
                self.template_mode,
                "Gaussian-process mean function"
            )?;
            line!(
                "time_window      = {:?} d",
                self.time_window,
                "Accepted range after rebasing"
            )?;
            line!(
                "snr_threshold    = {:.2}",
                self.snr_threshold,
                "Minimum signal-to-noise kept"
            )?;

            // --- Distance ---
            writeln!(f, "\n[Distance]")?;
            line!("redshift         = {}", option(self.redshift), "Heliocentric")?;
            line!(
                "distance         = {}",
                option(self.distance_mpc),
                "Luminosity distance (Mpc)"
            )?;
            line!(
                "distance_modulus = {}",
                option(self.distance_modulus),
                "Magnitudes"
            )?;

            // --- Numerics ---
            writeln!(f, "\n[Numerics]")?;
            line!(
                "gp_max_iters     = {}",
                self.gp_max_iters,
                "L-BFGS cap, GP hyperparameters"
            )?;
            line!(
                "fit_max_iters    = {}",
                self.fit_max_iters,
                "Damped least-squares cap"
            )?;

            // --- Assets & output ---
            writeln!(f, "\n[Assets & output]")?;
            line!("template_dir     = {}", self.template_dir, "Class template files")?;
            line!("output_dir       = {}", self.output_dir, "Table and chart destination")?;
            line!(
                "plot             = {}",
                self.plot,
                "Render the three charts"
            )?;
            line!(
                "show_template    = {}",
                self.show_template,
                "Overlay the aligned template"
            )?;

            Ok(())
        } else {
            write!(
                f,
                "EstimatorParams(template={}, window=[{:.1},{:.1}]d, snr>={:.1}, z={:?}, d={:?}Mpc, dm={:?}, gp_iters={}, fit_iters={})",
                self.template_mode,
                self.time_window.0,
                self.time_window.1,
                self.snr_threshold,
                self.redshift,
                self.distance_mpc,
                self.distance_modulus,
                self.gp_max_iters,
                self.fit_max_iters,
            )
        }
    }
}
