use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwapOption;
use energy_source::EnergySource;
use heartbeat_window::HeartbeatRecord;
use scopeguard::ScopeGuard;
use tracing::{debug, error};

use crate::container::Container;
use crate::pal::PlatformFacade;
use crate::poller::{AppPoller, poll_interval};
use crate::stream::{close_streams, open_streams};
use crate::{Error, Event, EventProfiler, ProfilerConfig, Result};

const UNINITIALIZED: u8 = 0;
const INITIALIZING: u8 = 1;
const ACTIVE: u8 = 2;
const FINISHING: u8 = 3;

/// Measures the time and energy of units of work and reports them to heartbeat streams.
///
/// A profiler starts uninitialized. [`init()`][Self::init] opens the configured streams, acquires
/// an energy source and optionally starts the application poller. [`finish()`][Self::finish]
/// tears everything down again, after which the profiler may be initialized anew. Dropping an
/// active profiler finishes it.
///
/// All operations take `&self` and may be called from any thread. Submissions to a single
/// stream should come from one thread at a time if the order of records matters.
///
/// # Example
///
/// ```
/// use he_profiler::{Profiler, ProfilerConfig, StreamConfig};
///
/// let profiler = Profiler::new();
/// profiler
///     .init(&ProfilerConfig::builder().stream(StreamConfig::anonymous()).build())
///     .unwrap();
///
/// let mut event = profiler.begin().unwrap();
/// // Do some work...
/// profiler.end(0, 1, 1, &mut event).unwrap();
///
/// profiler.finish().unwrap();
/// ```
#[derive(Debug)]
pub struct Profiler {
    state: AtomicU8,

    /// Present while the profiler is active. Swapped out at the start of teardown, so that new
    /// operations see an uninitialized profiler while in-flight ones finish on their own `Arc`.
    container: ArcSwapOption<Container>,

    poller: Mutex<Option<AppPoller>>,

    platform: PlatformFacade,
}

impl Profiler {
    /// Creates an uninitialized profiler.
    #[must_use]
    pub fn new() -> Self {
        Self::with_platform(PlatformFacade::real())
    }

    pub(crate) fn with_platform(platform: PlatformFacade) -> Self {
        Self {
            state: AtomicU8::new(UNINITIALIZED),
            container: ArcSwapOption::const_empty(),
            poller: Mutex::new(None),
            platform,
        }
    }

    /// Initializes the profiler with the best energy source available on this machine.
    ///
    /// # Errors
    ///
    /// * [`Error::AlreadyInitialized`] if the profiler is initialized or being initialized.
    /// * [`Error::InvalidConfig`] if the configuration is unusable after environment overrides.
    /// * [`Error::IoFailure`] if a heartbeat log cannot be created.
    /// * [`Error::BackendFailure`] if no energy source can be acquired.
    /// * [`Error::ThreadFailure`] if the application poller cannot be started.
    ///
    /// After any error other than [`Error::AlreadyInitialized`] the profiler is uninitialized
    /// and nothing it acquired is left behind.
    pub fn init(&self, config: &ProfilerConfig) -> Result<()> {
        self.init_with_energy_source(config, energy_source::acquire_default)
    }

    /// Initializes the profiler with the energy source returned by `acquire`.
    ///
    /// `acquire` is only called after the configuration is validated and the streams are open.
    ///
    /// # Errors
    ///
    /// As for [`init()`][Self::init].
    pub fn init_with_energy_source<F>(&self, config: &ProfilerConfig, acquire: F) -> Result<()>
    where
        F: FnOnce() -> energy_source::Result<Box<dyn EnergySource>>,
    {
        // Acquire on failure to see the state published by whoever initialized the profiler.
        if self
            .state
            .compare_exchange(UNINITIALIZED, INITIALIZING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            error!("profiler is already initialized");
            return Err(Error::AlreadyInitialized);
        }

        // Any early return below leaves the profiler uninitialized.
        let reset_state = scopeguard::guard((), |()| {
            self.state.store(UNINITIALIZED, Ordering::Release);
        });

        let config = config.resolve()?;
        let streams = open_streams(&config)?;

        let energy = acquire().map_err(|e| {
            error!(error = %e, "failed to acquire energy source");

            for failure in close_streams(&streams) {
                debug!(%failure, "failed to close stream after failed init");
            }

            Error::BackendFailure(e)
        })?;

        let energy_source_name = energy.source_name();
        let refresh_interval = energy.refresh_interval();
        let container = Arc::new(Container::new(streams, energy, self.platform.clone()));

        let poller = match config.app_stream {
            Some(stream) => {
                let interval = poll_interval(refresh_interval, config.app_min_sleep);

                match AppPoller::start(Arc::clone(&container), stream, interval) {
                    Ok(poller) => Some(poller),
                    Err(e) => {
                        for failure in container.teardown() {
                            debug!(%failure, "teardown failed after poller failed to start");
                        }

                        return Err(e);
                    }
                }
            }
            None => None,
        };

        *self.lock_poller() = poller;
        self.container.store(Some(container));

        ScopeGuard::into_inner(reset_state);

        // Release makes the container visible to anyone who observes the active state.
        self.state.store(ACTIVE, Ordering::Release);

        debug!(
            streams = config.streams.len(),
            app_stream = config.app_stream,
            energy_source = energy_source_name,
            "profiler initialized"
        );

        Ok(())
    }

    /// Whether the profiler is initialized and not being torn down.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.load(Ordering::Acquire) == ACTIVE
    }

    /// Takes a snapshot and returns an event that starts at it.
    ///
    /// A failed energy read does not fail the call. The snapshot is marked as degraded instead.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if the profiler is not initialized.
    pub fn begin(&self) -> Result<Event> {
        self.with_container(|container| Ok(container.begin()))
    }

    /// Takes the end snapshot of `event` and reports the event to `stream`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if the profiler is not initialized, [`Error::OutOfRange`] if
    /// `stream` is not a configured stream. The event is left unchanged on error.
    pub fn end(&self, stream: usize, id: u64, work: u64, event: &mut Event) -> Result<()> {
        self.with_container(|container| container.end(stream, id, work, event))
    }

    /// Like [`end()`][Self::end], then starts the next event where this one ended.
    ///
    /// One snapshot is taken per call, so back-to-back events leave no unmeasured gap.
    ///
    /// # Errors
    ///
    /// As for [`end()`][Self::end].
    pub fn end_then_begin(
        &self,
        stream: usize,
        id: u64,
        work: u64,
        event: &mut Event,
    ) -> Result<()> {
        self.with_container(|container| container.end_then_begin(stream, id, work, event))
    }

    /// Reports an already measured event to `stream` without taking a snapshot.
    ///
    /// # Errors
    ///
    /// As for [`end()`][Self::end].
    pub fn issue(&self, stream: usize, id: u64, work: u64, event: &Event) -> Result<()> {
        self.with_container(|container| container.issue(stream, id, work, event))
    }

    /// The number of events reported to `stream` since the profiler was initialized.
    ///
    /// # Errors
    ///
    /// As for [`end()`][Self::end].
    pub fn heartbeats(&self, stream: usize) -> Result<u64> {
        self.with_container(|container| container.beats(stream))
    }

    /// The statistics derived from the most recent event reported to `stream`.
    ///
    /// # Errors
    ///
    /// As for [`end()`][Self::end].
    pub fn last_heartbeat(&self, stream: usize) -> Result<Option<HeartbeatRecord>> {
        self.with_container(|container| container.last(stream))
    }

    /// Stops the application poller, flushes and closes every stream and releases the energy
    /// source.
    ///
    /// Finishing a profiler that is not initialized, or that another thread is already
    /// finishing, does nothing. Operations that race with `finish()` either complete before
    /// the streams are closed or fail with [`Error::InvalidState`] and leave their event
    /// unchanged.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidState`] if the profiler is in the middle of being initialized.
    /// * [`Error::TeardownFailed`] with every failed step if any step failed. Every step is
    ///   attempted regardless and the profiler is uninitialized afterwards.
    pub fn finish(&self) -> Result<()> {
        match self.state.compare_exchange(
            ACTIVE,
            FINISHING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {}
            Err(UNINITIALIZED | FINISHING) => return Ok(()),
            Err(_) => return Err(Error::InvalidState),
        }

        let mut failures = Vec::new();

        // The poller holds its own reference to the container, so stop it before tearing the
        // container down.
        let poller = self.lock_poller().take();
        if let Some(poller) = poller {
            if let Err(e) = poller.stop() {
                failures.push(e);
            }
        }

        if let Some(container) = self.container.swap(None) {
            failures.extend(container.teardown());
        }

        self.state.store(UNINITIALIZED, Ordering::Release);

        if failures.is_empty() {
            debug!("profiler finished");
            Ok(())
        } else {
            error!(failures = failures.len(), "profiler teardown failed");
            Err(Error::TeardownFailed { failures })
        }
    }

    fn with_container<R>(&self, f: impl FnOnce(&Container) -> Result<R>) -> Result<R> {
        // A profiler being finished accepts no new operations, even while its container is
        // still in place.
        if self.state.load(Ordering::Acquire) != ACTIVE {
            debug!("operation on inactive profiler");
            return Err(Error::InvalidState);
        }

        let container = self.container.load();

        let Some(container) = container.as_deref() else {
            debug!("operation on uninitialized profiler");
            return Err(Error::InvalidState);
        };

        f(container)
    }

    fn lock_poller(&self) -> MutexGuard<'_, Option<AppPoller>> {
        self.poller.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Profiler {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            error!(error = %e, "failed to finish profiler on drop");
        }
    }
}

impl EventProfiler for Profiler {
    fn init(&self, config: &ProfilerConfig) -> Result<()> {
        Self::init(self, config)
    }

    fn begin(&self) -> Result<Event> {
        Self::begin(self)
    }

    fn end(&self, stream: usize, id: u64, work: u64, event: &mut Event) -> Result<()> {
        Self::end(self, stream, id, work, event)
    }

    fn end_then_begin(&self, stream: usize, id: u64, work: u64, event: &mut Event) -> Result<()> {
        Self::end_then_begin(self, stream, id, work, event)
    }

    fn issue(&self, stream: usize, id: u64, work: u64, event: &Event) -> Result<()> {
        Self::issue(self, stream, id, work, event)
    }

    fn finish(&self) -> Result<()> {
        Self::finish(self)
    }
}
