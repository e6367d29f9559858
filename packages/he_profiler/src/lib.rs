#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! In-process time and energy profiling of application work.
//!
//! A [`Profiler`] brackets units of work with snapshots of the wall clock and of a cumulative
//! energy counter, and reports each unit as a heartbeat to one of several streams. Every
//! stream keeps global, window and instant statistics over its heartbeats and, if it is named,
//! logs them to `heartbeat-<name>.log` in the configured log directory.
//!
//! Optionally, a background thread reports the energy of the whole application to one of the
//! streams at the rate the energy counter refreshes.
//!
//! # Example
//!
//! ```
//! use he_profiler::{Profiler, ProfilerConfig, StreamConfig};
//!
//! let log_dir = tempfile::tempdir().unwrap();
//!
//! let profiler = Profiler::new();
//! profiler
//!     .init(
//!         &ProfilerConfig::builder()
//!             .stream(StreamConfig::named("app"))
//!             .stream(StreamConfig::named("work"))
//!             .app_stream(0)
//!             .log_dir(log_dir.path())
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let mut event = profiler.begin().unwrap();
//!
//! for id in 1..=3 {
//!     // Do one unit of work...
//!     profiler.end_then_begin(1, id, 1, &mut event).unwrap();
//! }
//!
//! let last = profiler.last_heartbeat(1).unwrap().unwrap();
//! println!("unit {} drew {:.1} W", last.tag, last.instant_power);
//!
//! profiler.finish().unwrap();
//! assert!(log_dir.path().join("heartbeat-work.log").exists());
//! ```
//!
//! # Environment
//!
//! A configuration with an [environment prefix][ProfilerConfigBuilder::env_prefix] reads
//! `<prefix>WINDOW_SIZE` and `<prefix>MIN_SLEEP_US` when the profiler is initialized. See
//! [`ProfilerConfig`].

mod config;
mod container;
#[cfg(test)]
mod energy_mock;
mod error;
mod event;
mod event_profiler;
mod pal;
mod poller;
mod profiler;
mod stream;

pub use config::{
    DEFAULT_APP_MIN_SLEEP, DEFAULT_WINDOW_SIZE, ProfilerConfig, ProfilerConfigBuilder,
    StreamConfig,
};
pub use error::{Error, Result};
pub use event::{Event, Snapshot};
pub use event_profiler::{EventProfiler, NullProfiler};
pub use heartbeat_window::HeartbeatRecord;
pub use profiler::Profiler;
