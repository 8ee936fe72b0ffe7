//! Bolometric light-curve estimation from broadband photometry.
//!
//! Reads a photometry file (redshift and E(B-V) header lines, then one
//! observation per line), interpolates every filter onto a common time grid
//! with a Gaussian process, fits a blackbody per epoch and writes the
//! temperature, radius and bolometric luminosity table, plus optional charts.
//!
//! Usage:
//! ```
//! cargo run --release -- Gaia16apd.dat --plot
//! cargo run --release -- Gaia16apd.dat --mean 1a --show-template --plot
//! cargo run --release -- Gaia16apd.dat --mean test --redshift 0.102
//! ```

use camino::Utf8PathBuf;
use clap::Parser;

use bolfit::bolfit::Bolfit;
use bolfit::bolfit_errors::BolfitError;
use bolfit::estimator::{run_estimation, EstimatorParams, TemplateMode};

#[derive(Parser)]
#[command(name = "bolfit")]
#[command(about = "Bolometric light-curve estimation from broadband photometry")]
#[command(version)]
struct Args {
    /// Photometry file: redshift and E(B-V) header lines, then
    /// time magnitude uncertainty filter system
    input: Utf8PathBuf,

    /// Gaussian-process mean: a template class (1a, 1bc, 2p, 2l),
    /// 0 for no template, or test (alias: auto) to search every class
    #[arg(short, long, default_value = "0")]
    mean: String,

    /// Luminosity distance in Mpc (exclusive with --redshift and --dm)
    #[arg(short, long, value_name = "MPC")]
    dist: Option<f64>,

    /// Heliocentric redshift (exclusive with --dist and --dm)
    #[arg(short = 'z', long)]
    redshift: Option<f64>,

    /// Distance modulus in magnitudes (exclusive with --dist and --redshift)
    #[arg(long)]
    dm: Option<f64>,

    /// Earliest accepted epoch, days relative to the first observation
    #[arg(short, long, default_value_t = 0.0)]
    start: f64,

    /// Latest accepted epoch, days relative to the first observation
    #[arg(short, long, default_value_t = 200.0)]
    end: f64,

    /// Minimum signal-to-noise ratio kept
    #[arg(long, default_value_t = 4.0)]
    snr: f64,

    /// Output directory, created if absent
    #[arg(long, default_value = "./products")]
    outdir: Utf8PathBuf,

    /// Directory holding the smoothed_sn<class>.dat template files
    #[arg(long, default_value = "templates")]
    template_dir: Utf8PathBuf,

    /// Render the light-curve, evolution and bolometric charts
    #[arg(long)]
    plot: bool,

    /// Overlay the aligned template on the light-curve chart
    #[arg(short = 't', long)]
    show_template: bool,

    /// Increase log verbosity to debug
    #[arg(long)]
    verbose: bool,
}

fn run(args: Args) -> Result<(), BolfitError> {
    let params = EstimatorParams::builder()
        .template_mode(args.mean.parse::<TemplateMode>()?)
        .time_window(args.start, args.end)
        .snr_threshold(args.snr)
        .redshift(args.redshift)
        .distance_mpc(args.dist)
        .distance_modulus(args.dm)
        .template_dir(args.template_dir)
        .output_dir(args.outdir)
        .plot(args.plot)
        .show_template(args.show_template)
        .build()?;
    tracing::debug!("run configuration:\n{params:#}");

    let mut state = Bolfit::new();
    let report = run_estimation(&mut state, &args.input, &params)?;
    tracing::info!(
        run = %report.name,
        epochs = report.dense.n_epochs(),
        table = %report.output_table,
        "estimation finished"
    );
    Ok(())
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    if let Err(err) = run(args) {
        tracing::error!("{err}");
        std::process::exit(1);
    }
}
