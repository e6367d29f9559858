#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Binary entry point for the he-profiler-overhead tool.
//!
//! This module is excluded from mutation testing because testing process entry/exit behavior
//! is impractical - it requires spawning subprocesses and checking exit codes.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use argh::FromArgs;
use he_profiler_overhead::{OverheadOptions, run};
use tracing_subscriber::EnvFilter;

/// Measures the power overhead of the he_profiler background application poller.
///
/// Prints the power difference of each trial pair, then the average. Set `RUST_LOG` to see
/// diagnostics on stderr.
#[derive(FromArgs)]
struct Args {
    /// number of measured trial pairs (default 20)
    #[argh(option, default = "20")]
    iterations: u32,

    /// microseconds each trial sleeps while measured (default 1000000)
    #[argh(option, default = "1_000_000")]
    sleep_us: u64,

    /// window size of the profiler streams (default 20)
    #[argh(option, default = "20")]
    window_size: usize,

    /// directory to write the application stream log to (default: no log)
    #[argh(option)]
    log_dir: Option<PathBuf>,

    /// name of the application stream, used for its log file (default APPLICATION)
    #[argh(option, default = "String::from(\"APPLICATION\")")]
    app_stream_name: String,
}

// Binary entry point - mutations would require subprocess testing which is impractical.
#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Args = argh::from_env();

    let mut options = OverheadOptions::default();
    options.iterations = args.iterations;
    options.sleep = Duration::from_micros(args.sleep_us);
    options.window_size = args.window_size;
    options.log_dir = args.log_dir;
    options.app_stream_name = args.app_stream_name;

    match run(&options, &mut io::stdout().lock()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
