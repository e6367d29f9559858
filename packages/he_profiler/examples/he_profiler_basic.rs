//! Profiles a few units of CPU-bound work and prints the statistics of each.
//!
//! The heartbeat log is written to the system temporary directory. Set `RUST_LOG=debug` to see
//! the profiler's own diagnostics.
//!
//! Run with: `cargo run --example he_profiler_basic`.

use std::hint::black_box;
use std::time::Duration;

use he_profiler::{Profiler, ProfilerConfig, StreamConfig};
use tracing_subscriber::EnvFilter;

const UNITS: u64 = 5;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let log_dir = std::env::temp_dir();

    let profiler = Profiler::new();
    profiler
        .init(
            &ProfilerConfig::builder()
                .stream(StreamConfig::named("application"))
                .stream(StreamConfig::named("example").with_window_size(2))
                .app_stream(0)
                .app_min_sleep(Duration::from_millis(50))
                .log_dir(&log_dir)
                .build(),
        )
        .expect("profiler failed to initialize");

    let mut event = profiler.begin().expect("profiler is initialized");

    for id in 1..=UNITS {
        black_box(busy_work(id));

        profiler
            .end_then_begin(1, id, 1, &mut event)
            .expect("stream 1 exists");

        let record = profiler
            .last_heartbeat(1)
            .expect("stream 1 exists")
            .expect("a heartbeat was just reported");

        println!(
            "unit {id}: {} ns, {} uJ, {:.2} W (window: {:.2} W)",
            record.end_time.saturating_sub(record.start_time),
            record.end_energy.saturating_sub(record.start_energy),
            record.instant_power,
            record.window_power,
        );
    }

    println!(
        "application stream received {} heartbeats",
        profiler.heartbeats(0).expect("stream 0 exists")
    );

    profiler.finish().expect("profiler failed to finish");

    println!(
        "log written to {}",
        log_dir.join("heartbeat-example.log").display()
    );
}

fn busy_work(seed: u64) -> u64 {
    (0..5_000_000_u64).fold(seed, |acc, i| acc.wrapping_mul(31).wrapping_add(i))
}
