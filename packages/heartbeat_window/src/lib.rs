#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Sliding-window performance and power statistics over a stream of heartbeats.
//!
//! A heartbeat marks the completion of a unit of work: it carries a caller-chosen tag, the
//! amount of work done, and the time and cumulative energy readings taken when the work started
//! and ended. A [`HeartbeatWindow`] turns each heartbeat into a [`HeartbeatRecord`] with:
//!
//! * global totals and rates over every heartbeat seen so far,
//! * window totals and rates over the last `window_size` heartbeats,
//! * instant rates for the heartbeat itself.
//!
//! Performance is reported as work per second and power in watts. Times are nanoseconds and
//! energy readings are microjoules.
//!
//! If the window is given a [`HeartbeatLog`], every completed window of records is appended to
//! the log. Records of a partially filled window are written by
//! [`HeartbeatWindow::flush_remaining()`] or [`HeartbeatWindow::finish()`].
//!
//! # Example
//!
//! ```
//! use std::num::NonZero;
//!
//! use heartbeat_window::HeartbeatWindow;
//!
//! let mut window = HeartbeatWindow::new(NonZero::new(20).unwrap(), None);
//!
//! // Tag 1: one unit of work that took 1 ms and 5000 uJ.
//! window.heartbeat(1, 1, 0, 1_000_000, 10_000, 15_000);
//!
//! let record = window.last().unwrap();
//! assert_eq!(record.instant_perf, 1000.0);
//! assert_eq!(record.instant_power, 5.0);
//! ```

mod log;
mod record;
mod window;

pub use log::{HeartbeatLog, LOG_COLUMNS};
pub use record::HeartbeatRecord;
pub use window::HeartbeatWindow;
