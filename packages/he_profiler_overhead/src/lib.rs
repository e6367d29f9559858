#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Measures how much power the background application poller of [`he_profiler`] costs.
//!
//! Each trial initializes a profiler, measures one event spanning a sleep and finishes the
//! profiler again. Trials run in pairs, one with the application poller and one without, and
//! the difference in the average power of the two events is the overhead of the poller.
//!
//! The `he-profiler-overhead` binary is a thin wrapper around [`run()`].

use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use energy_source::EnergySource;
use he_profiler::{Profiler, ProfilerConfig, StreamConfig};
use thiserror::Error;
use tracing::{debug, warn};

/// Stream that the application poller reports to.
const APP_STREAM: usize = 0;

/// Stream that the measured sleep is reported to.
const EVENT_STREAM: usize = 1;

/// Settings of an overhead measurement.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct OverheadOptions {
    /// Number of measured trial pairs, after one unmeasured warm-up pair.
    pub iterations: u32,

    /// How long each trial sleeps while its event is measured.
    pub sleep: Duration,

    /// Window size of the profiler streams.
    pub window_size: usize,

    /// Directory for the application stream log. `None` writes no log.
    pub log_dir: Option<PathBuf>,

    /// Name of the application stream, used for its log file.
    pub app_stream_name: String,
}

impl Default for OverheadOptions {
    fn default() -> Self {
        Self {
            iterations: 20,
            sleep: Duration::from_secs(1),
            window_size: he_profiler::DEFAULT_WINDOW_SIZE,
            log_dir: None,
            app_stream_name: "APPLICATION".to_string(),
        }
    }
}

/// Power differences measured by [`run()`].
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct OverheadReport {
    /// Power with the poller minus power without it, in watts, one entry per trial pair.
    pub differences: Vec<f64>,
}

impl OverheadReport {
    /// The mean of the differences, zero if there are none.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "trial counts are far below the f64 mantissa"
    )]
    pub fn average(&self) -> f64 {
        if self.differences.is_empty() {
            return 0.0;
        }

        self.differences.iter().sum::<f64>() / self.differences.len() as f64
    }
}

/// Errors that stop an overhead measurement.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// At least one trial pair must be measured.
    #[error("the number of iterations must be at least 1")]
    NoIterations,

    /// A profiler operation failed.
    #[error(transparent)]
    Profiler(#[from] he_profiler::Error),

    /// The results could not be written.
    #[error("failed to write results: {0}")]
    Output(#[from] std::io::Error),
}

/// A specialized `Result` type for overhead measurements.
pub type Result<T> = std::result::Result<T, Error>;

/// Measures the poller overhead with the best energy source on this machine, writing each
/// difference and finally `AVERAGE: <watts>` to `out`.
///
/// # Errors
///
/// Returns an error if the options are unusable, a trial fails or `out` cannot be written to.
/// A failed warm-up pair is logged and otherwise ignored.
pub fn run(options: &OverheadOptions, out: &mut impl Write) -> Result<OverheadReport> {
    run_with_energy_source(options, energy_source::acquire_default, out)
}

/// Like [`run()`] but every trial acquires its energy source through `acquire`.
///
/// # Errors
///
/// As for [`run()`].
pub fn run_with_energy_source<F>(
    options: &OverheadOptions,
    acquire: F,
    out: &mut impl Write,
) -> Result<OverheadReport>
where
    F: Fn() -> energy_source::Result<Box<dyn EnergySource>>,
{
    if options.iterations == 0 {
        return Err(Error::NoIterations);
    }

    let profiler = Profiler::new();

    if let Err(e) = power_difference(&profiler, options, &acquire) {
        warn!(error = %e, "warm-up trial failed");
    }

    let mut report = OverheadReport::default();

    for iteration in 0..options.iterations {
        let difference = power_difference(&profiler, options, &acquire)?;
        debug!(iteration, difference, "trial pair finished");

        writeln!(out, "{difference:.6}")?;
        report.differences.push(difference);
    }

    writeln!(out, "AVERAGE: {:.6}", report.average())?;

    Ok(report)
}

/// Runs one trial with the application poller and one without, returning the power of the
/// first minus the power of the second.
///
/// # Errors
///
/// Returns an error if either trial fails.
pub fn power_difference<F>(
    profiler: &Profiler,
    options: &OverheadOptions,
    acquire: &F,
) -> Result<f64>
where
    F: Fn() -> energy_source::Result<Box<dyn EnergySource>>,
{
    let with_app = trial(profiler, options, true, acquire)?;
    let without_app = trial(profiler, options, false, acquire)?;

    Ok(with_app - without_app)
}

/// Measures the average power of one event spanning a sleep.
///
/// The profiler is finished even if the measurement fails.
fn trial<F>(
    profiler: &Profiler,
    options: &OverheadOptions,
    use_app: bool,
    acquire: &F,
) -> Result<f64>
where
    F: Fn() -> energy_source::Result<Box<dyn EnergySource>>,
{
    profiler.init_with_energy_source(&trial_config(options, use_app), acquire)?;

    let measured = measure_sleep(profiler, options.sleep);
    let finished = profiler.finish();

    let watts = measured?;
    finished?;

    Ok(watts)
}

fn measure_sleep(profiler: &Profiler, sleep: Duration) -> Result<f64> {
    let mut event = profiler.begin()?;
    thread::sleep(sleep);
    profiler.end(EVENT_STREAM, 1, 0, &mut event)?;

    Ok(event.watts())
}

fn trial_config(options: &OverheadOptions, use_app: bool) -> ProfilerConfig {
    let app_stream = match (use_app, &options.log_dir) {
        (true, Some(_)) => StreamConfig::named(options.app_stream_name.clone()),
        _ => StreamConfig::anonymous(),
    };

    let mut builder = ProfilerConfig::builder()
        .stream(app_stream)
        .stream(StreamConfig::anonymous())
        .default_window_size(options.window_size);

    if use_app {
        builder = builder.app_stream(APP_STREAM);
    }

    if let Some(log_dir) = &options.log_dir {
        builder = builder.log_dir(log_dir.clone());
    }

    builder.build()
}
