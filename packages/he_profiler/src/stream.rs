use std::sync::{Mutex, MutexGuard, PoisonError};

use heartbeat_window::{HeartbeatLog, HeartbeatRecord, HeartbeatWindow};
use tracing::{debug, error};

use crate::config::ResolvedConfig;
use crate::{Error, Event, Result, Snapshot};

/// One heartbeat stream: a window of statistics and, for named streams, its log.
///
/// The window is taken out when the stream is closed. Submissions that arrive after that fail
/// with [`Error::InvalidState`].
#[derive(Debug)]
pub(crate) struct Stream {
    index: usize,
    window: Mutex<Option<HeartbeatWindow>>,
}

impl Stream {
    pub(crate) fn new(index: usize, window: HeartbeatWindow) -> Self {
        Self {
            index,
            window: Mutex::new(Some(window)),
        }
    }

    /// Reports the work done between the start and end of `event` to the window.
    pub(crate) fn submit(&self, id: u64, work: u64, event: &Event) -> Result<()> {
        self.with_window(|window| heartbeat(window, id, work, event))
    }

    /// Ends `event` with the snapshot from `take_end` and reports it.
    ///
    /// The snapshot is taken while the stream is held open, so `event` is only changed if the
    /// submission succeeds.
    pub(crate) fn end_and_submit(
        &self,
        id: u64,
        work: u64,
        event: &mut Event,
        take_end: impl FnOnce() -> Snapshot,
    ) -> Result<()> {
        self.with_window(|window| {
            event.set_end(take_end());
            heartbeat(window, id, work, event);
        })
    }

    pub(crate) fn beats(&self) -> u64 {
        self.lock().as_ref().map_or(0, HeartbeatWindow::beats)
    }

    pub(crate) fn last(&self) -> Option<HeartbeatRecord> {
        self.lock().as_ref().and_then(HeartbeatWindow::last).cloned()
    }

    /// Flushes and closes the log of the stream. Closing a closed stream does nothing.
    pub(crate) fn close(&self) -> Result<()> {
        let Some(window) = self.lock().take() else {
            return Ok(());
        };

        let path = window.log_path().map(ToOwned::to_owned);
        let beats = window.beats();

        window.finish().map_err(|source| {
            // A window without a log has nothing that can fail.
            let path = path.unwrap_or_default();
            error!(stream = self.index, path = %path.display(), %source, "failed to finish heartbeat log");
            Error::IoFailure { path, source }
        })?;

        debug!(stream = self.index, beats, "stream closed");
        Ok(())
    }

    fn with_window<R>(&self, f: impl FnOnce(&mut HeartbeatWindow) -> R) -> Result<R> {
        let mut window = self.lock();

        let Some(window) = window.as_mut() else {
            debug!(stream = self.index, "operation on closed stream");
            return Err(Error::InvalidState);
        };

        Ok(f(window))
    }

    fn lock(&self) -> MutexGuard<'_, Option<HeartbeatWindow>> {
        // Poisoning only means a submitter panicked mid-heartbeat. The window stays usable.
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn heartbeat(window: &mut HeartbeatWindow, id: u64, work: u64, event: &Event) {
    let (start, end) = (event.start(), event.end());

    window.heartbeat(
        id,
        work,
        start.time(),
        end.time(),
        start.energy(),
        end.energy(),
    );
}

/// Opens every configured stream, creating the logs of named streams.
///
/// Either every stream is opened or none are. Streams opened before a failure are closed again.
pub(crate) fn open_streams(config: &ResolvedConfig) -> Result<Vec<Stream>> {
    let mut streams = Vec::with_capacity(config.streams.len());

    for (index, stream_config) in config.streams.iter().enumerate() {
        let log = match stream_config.log_path(&config.log_dir) {
            Some(path) => match HeartbeatLog::create(&path) {
                Ok(log) => Some(log),
                Err(source) => {
                    error!(stream = index, path = %path.display(), %source, "failed to create heartbeat log");

                    for failure in close_streams(&streams) {
                        debug!(%failure, "failed to close stream after failed init");
                    }

                    return Err(Error::IoFailure { path, source });
                }
            },
            None => None,
        };

        streams.push(Stream::new(
            index,
            HeartbeatWindow::new(stream_config.window_size, log),
        ));
    }

    Ok(streams)
}

/// Closes every stream, returning the failures. A failure does not stop the remaining streams
/// from being closed.
pub(crate) fn close_streams(streams: &[Stream]) -> Vec<Error> {
    streams
        .iter()
        .filter_map(|stream| stream.close().err())
        .collect()
}
