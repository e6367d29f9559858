use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::container::Container;
use crate::{Error, Result};

const THREAD_NAME: &str = "he-profiler-app";

/// Background thread that reports whole-application energy to one stream.
///
/// Every `interval` the poller ends the running event on its stream and begins the next one,
/// with a work amount of 1 and work IDs counting up from 0.
#[derive(Debug)]
pub(crate) struct AppPoller {
    stream: usize,
    run: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl AppPoller {
    pub(crate) fn start(container: Arc<Container>, stream: usize, interval: Duration) -> Result<Self> {
        let run = Arc::new(AtomicBool::new(true));
        let thread_run = Arc::clone(&run);

        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                debug!(stream, ?interval, "application poller started");
                let submitted = poll(&container, stream, interval, &thread_run);
                debug!(stream, submitted, "application poller exiting");
            })
            .map_err(|e| {
                error!(error = %e, "failed to start application poller thread");

                Error::ThreadFailure {
                    problem: format!("failed to spawn '{THREAD_NAME}': {e}"),
                }
            })?;

        Ok(Self {
            stream,
            run,
            thread,
        })
    }

    /// Signals the poller to stop and waits for it to exit.
    ///
    /// A poller in the middle of its sleep wakes up immediately and does not report the partial
    /// interval.
    pub(crate) fn stop(self) -> Result<()> {
        // Release pairs with the Acquire in the sleep loop so the poller sees the stop.
        self.run.store(false, Ordering::Release);
        self.thread.thread().unpark();

        self.thread.join().map_err(|_panic| {
            error!(stream = self.stream, "application poller thread panicked");

            Error::ThreadFailure {
                problem: format!("'{THREAD_NAME}' panicked"),
            }
        })
    }
}

/// The sampling interval: never faster than the energy counter refreshes, never faster than
/// the configured floor.
pub(crate) fn poll_interval(refresh_interval: Duration, min_sleep: Duration) -> Duration {
    refresh_interval.max(min_sleep)
}

/// Runs until `run` is cleared, returning the number of submissions.
fn poll(container: &Container, stream: usize, interval: Duration, run: &AtomicBool) -> u64 {
    let mut event = container.begin();
    let mut id: u64 = 0;
    let mut submitted: u64 = 0;

    while sleep_while_running(interval, run) {
        if let Err(e) = container.end_then_begin(stream, id, 1, &mut event) {
            warn!(stream, error = %e, "application poller cannot submit, stopping");
            break;
        }

        id = id.wrapping_add(1);
        submitted = submitted.wrapping_add(1);
    }

    submitted
}

/// Sleeps for `interval`, returning early if `run` is cleared.
///
/// Returns whether the poller should keep running.
#[cfg_attr(test, mutants::skip)] // Mutations here hang the poller or make it spin.
fn sleep_while_running(interval: Duration, run: &AtomicBool) -> bool {
    let Some(deadline) = Instant::now().checked_add(interval) else {
        // The interval is effectively forever.
        while run.load(Ordering::Acquire) {
            thread::park();
        }

        return false;
    };

    loop {
        if !run.load(Ordering::Acquire) {
            return false;
        }

        let remaining = deadline.saturating_duration_since(Instant::now());

        if remaining.is_zero() {
            return true;
        }

        // May wake up spuriously or on unpark from stop(), both handled by the loop.
        thread::park_timeout(remaining);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::AtomicU64;

    use heartbeat_window::HeartbeatWindow;
    use new_zealand::nz;
    use testing::with_watchdog;

    use super::*;
    use crate::energy_mock::{counting_energy, ticking_platform};
    use crate::stream::Stream;

    fn container(stream_count: usize) -> Arc<Container> {
        let streams = (0..stream_count)
            .map(|index| Stream::new(index, HeartbeatWindow::new(nz!(4), None)))
            .collect();

        Arc::new(Container::new(
            streams,
            Box::new(counting_energy(10, Arc::new(AtomicU64::new(0)))),
            ticking_platform(1_000, Arc::new(AtomicU64::new(0))),
        ))
    }

    #[test]
    fn interval_respects_refresh_and_floor() {
        assert_eq!(
            poll_interval(Duration::from_millis(1), Duration::from_millis(10)),
            Duration::from_millis(10)
        );
        assert_eq!(
            poll_interval(Duration::from_millis(50), Duration::from_millis(10)),
            Duration::from_millis(50)
        );
    }

    #[test]
    fn submits_with_sequential_ids() {
        with_watchdog(|| {
            let container = container(2);
            let poller =
                AppPoller::start(Arc::clone(&container), 1, Duration::from_millis(1)).unwrap();

            while container.beats(1).unwrap() < 3 {
                thread::sleep(Duration::from_millis(1));
            }

            poller.stop().unwrap();

            let beats = container.beats(1).unwrap();
            let last = container.last(1).unwrap().unwrap();
            assert_eq!(last.tag, beats - 1);
            assert_eq!(last.work, 1);
            assert_eq!(container.beats(0).unwrap(), 0);
        });
    }

    #[test]
    fn stop_interrupts_sleep_without_submitting() {
        with_watchdog(|| {
            let container = container(1);
            let poller =
                AppPoller::start(Arc::clone(&container), 0, Duration::from_secs(3600)).unwrap();

            thread::sleep(Duration::from_millis(10));
            poller.stop().unwrap();

            assert_eq!(container.beats(0).unwrap(), 0);
        });
    }

    #[test]
    fn forever_interval_still_stops() {
        with_watchdog(|| {
            let container = container(1);
            let poller = AppPoller::start(Arc::clone(&container), 0, Duration::MAX).unwrap();

            poller.stop().unwrap();

            assert_eq!(container.beats(0).unwrap(), 0);
        });
    }

    #[test]
    fn stops_when_stream_is_out_of_range() {
        with_watchdog(|| {
            let container = container(1);
            let poller =
                AppPoller::start(Arc::clone(&container), 5, Duration::from_millis(1)).unwrap();

            // The thread exits on its first submission attempt. Joining must still succeed.
            while !poller.thread.is_finished() {
                thread::sleep(Duration::from_millis(1));
            }

            poller.stop().unwrap();
        });
    }
}
