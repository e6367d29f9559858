use std::time::Duration;

use energy_source::EnergySource;
use heartbeat_window::HeartbeatRecord;
use tracing::{debug, error, warn};

use crate::pal::{Platform, PlatformFacade};
use crate::stream::{Stream, close_streams};
use crate::{Error, Event, Result, Snapshot};

/// Everything an initialized profiler owns: the streams, the energy source and the clock.
///
/// Shared between the profiler handle and the application poller. Event operations only need
/// `&self`.
#[derive(Debug)]
pub(crate) struct Container {
    streams: Vec<Stream>,
    energy: Box<dyn EnergySource>,
    platform: PlatformFacade,
}

impl Container {
    pub(crate) fn new(
        streams: Vec<Stream>,
        energy: Box<dyn EnergySource>,
        platform: PlatformFacade,
    ) -> Self {
        Self {
            streams,
            energy,
            platform,
        }
    }

    pub(crate) fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub(crate) fn refresh_interval(&self) -> Duration {
        self.energy.refresh_interval()
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        let time = self.platform.now_nanos();

        match self.energy.read_uj() {
            Ok(energy) => Snapshot::new(time, energy),
            Err(e) => {
                warn!(source = self.energy.source_name(), error = %e, "energy read failed");
                Snapshot::without_energy(time)
            }
        }
    }

    pub(crate) fn begin(&self) -> Event {
        Event::starting_at(self.snapshot())
    }

    pub(crate) fn end(&self, stream: usize, id: u64, work: u64, event: &mut Event) -> Result<()> {
        self.stream(stream)?
            .end_and_submit(id, work, event, || self.snapshot())
    }

    pub(crate) fn end_then_begin(
        &self,
        stream: usize,
        id: u64,
        work: u64,
        event: &mut Event,
    ) -> Result<()> {
        self.end(stream, id, work, event)?;
        event.chain();

        Ok(())
    }

    pub(crate) fn issue(&self, stream: usize, id: u64, work: u64, event: &Event) -> Result<()> {
        self.stream(stream)?.submit(id, work, event)
    }

    pub(crate) fn beats(&self, stream: usize) -> Result<u64> {
        Ok(self.stream(stream)?.beats())
    }

    pub(crate) fn last(&self, stream: usize) -> Result<Option<HeartbeatRecord>> {
        Ok(self.stream(stream)?.last())
    }

    /// Closes every stream and releases the energy source, returning every failure.
    pub(crate) fn teardown(&self) -> Vec<Error> {
        let mut failures = close_streams(&self.streams);

        if let Err(e) = self.energy.release() {
            error!(source = self.energy.source_name(), error = %e, "failed to release energy source");
            failures.push(Error::BackendFailure(e));
        }

        failures
    }

    fn stream(&self, index: usize) -> Result<&Stream> {
        self.streams.get(index).ok_or_else(|| {
            debug!(index, count = self.streams.len(), "stream index out of range");

            Error::OutOfRange {
                index,
                count: self.streams.len(),
            }
        })
    }
}
