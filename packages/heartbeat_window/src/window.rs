use std::io;
use std::num::NonZero;
use std::path::Path;

use tracing::error;

use crate::record::{perf, power};
use crate::{HeartbeatLog, HeartbeatRecord};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Totals {
    work: u64,
    time: u64,
    energy: u64,
}

impl Totals {
    fn add(&mut self, work: u64, time: u64, energy: u64) {
        self.work = self.work.saturating_add(work);
        self.time = self.time.saturating_add(time);
        self.energy = self.energy.saturating_add(energy);
    }

    fn remove(&mut self, record: &HeartbeatRecord) {
        self.work = self.work.saturating_sub(record.work);
        self.time = self
            .time
            .saturating_sub(record.end_time.saturating_sub(record.start_time));
        self.energy = self
            .energy
            .saturating_sub(record.end_energy.saturating_sub(record.start_energy));
    }
}

/// Accumulates heartbeats and derives global, window and instant statistics from them.
///
/// The window keeps the last `window_size` records in a ring buffer. When a [`HeartbeatLog`] is
/// attached, the buffer is appended to the log every time it fills up.
///
/// Heartbeats are issued through `&mut self`; the window is a single-writer structure.
#[derive(Debug)]
pub struct HeartbeatWindow {
    window_size: NonZero<usize>,

    /// Ring buffer of the most recent records; slot `beats % window_size` is written next.
    records: Vec<HeartbeatRecord>,

    /// Slot of the first record of the current cycle not yet written to the log.
    unlogged_from: usize,

    beats: u64,
    global: Totals,
    window: Totals,

    log: Option<HeartbeatLog>,

    /// First log error raised while issuing heartbeats, reported by the next flush.
    deferred_log_error: Option<io::Error>,
}

impl HeartbeatWindow {
    /// Creates a window over the last `window_size` heartbeats, optionally logging records.
    #[must_use]
    pub fn new(window_size: NonZero<usize>, log: Option<HeartbeatLog>) -> Self {
        Self {
            window_size,
            records: Vec::with_capacity(window_size.get()),
            unlogged_from: 0,
            beats: 0,
            global: Totals::default(),
            window: Totals::default(),
            log,
            deferred_log_error: None,
        }
    }

    /// The number of heartbeats covered by window statistics.
    #[must_use]
    pub fn window_size(&self) -> NonZero<usize> {
        self.window_size
    }

    /// The number of heartbeats issued to this window so far.
    #[must_use]
    pub fn beats(&self) -> u64 {
        self.beats
    }

    /// The record of the most recent heartbeat, if any.
    #[must_use]
    pub fn last(&self) -> Option<&HeartbeatRecord> {
        let slot = self.slot_of(self.beats.checked_sub(1)?);
        self.records.get(slot)
    }

    /// The path of the attached log, if any.
    #[must_use]
    pub fn log_path(&self) -> Option<&Path> {
        self.log.as_ref().map(HeartbeatLog::path)
    }

    /// Issues a heartbeat for a unit of work.
    ///
    /// `start_time` and `end_time` are in nanoseconds, `start_energy` and `end_energy` are
    /// cumulative energy readings in microjoules. End values smaller than the start values are
    /// treated as a zero-length interval rather than an error.
    ///
    /// Errors writing a completed window to the log are logged and reported by the next
    /// [`flush_remaining()`][Self::flush_remaining] or [`finish()`][Self::finish].
    pub fn heartbeat(
        &mut self,
        tag: u64,
        work: u64,
        start_time: u64,
        end_time: u64,
        start_energy: u64,
        end_energy: u64,
    ) {
        let elapsed = end_time.saturating_sub(start_time);
        let energy = end_energy.saturating_sub(start_energy);

        let slot = self.slot_of(self.beats);

        if let Some(evicted) = self.records.get(slot) {
            self.window.remove(evicted);
        }

        self.global.add(work, elapsed, energy);
        self.window.add(work, elapsed, energy);

        let record = HeartbeatRecord {
            beat: self.beats,
            tag,
            global_work: self.global.work,
            window_work: self.window.work,
            work,
            global_time: self.global.time,
            window_time: self.window.time,
            start_time,
            end_time,
            global_perf: perf(self.global.work, self.global.time),
            window_perf: perf(self.window.work, self.window.time),
            instant_perf: perf(work, elapsed),
            global_energy: self.global.energy,
            window_energy: self.window.energy,
            start_energy,
            end_energy,
            global_power: power(self.global.energy, self.global.time),
            window_power: power(self.window.energy, self.window.time),
            instant_power: power(energy, elapsed),
        };

        if let Some(existing) = self.records.get_mut(slot) {
            *existing = record;
        } else {
            self.records.push(record);
        }

        self.beats = self.beats.wrapping_add(1);

        if slot.saturating_add(1) == self.window_size.get() {
            self.log_cycle_until(self.window_size.get());
            self.unlogged_from = 0;
        }
    }

    /// Writes the records of the partially filled window to the log.
    ///
    /// Records already written are not written again. Does nothing if there is no log.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the log fails now or failed while issuing heartbeats since
    /// the previous flush.
    pub fn flush_remaining(&mut self) -> io::Result<()> {
        let next_slot = self.slot_of(self.beats);
        self.log_cycle_until(next_slot);
        self.unlogged_from = next_slot;

        match self.deferred_log_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Writes the remaining records to the log, closes it and consumes the window.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered while flushing or closing the log.
    pub fn finish(mut self) -> io::Result<()> {
        let flushed = self.flush_remaining();

        let closed = match self.log.take() {
            Some(log) => log.close(),
            None => Ok(()),
        };

        flushed.and(closed)
    }

    fn slot_of(&self, beat: u64) -> usize {
        // The window size fits in usize, so the remainder does too.
        let window_size = u64::try_from(self.window_size.get()).unwrap_or(u64::MAX);
        usize::try_from(beat.checked_rem(window_size).unwrap_or_default()).unwrap_or_default()
    }

    fn log_cycle_until(&mut self, end_slot: usize) {
        let Some(log) = self.log.as_mut() else {
            return;
        };

        let pending = self.records.get(self.unlogged_from..end_slot).unwrap_or_default();

        if pending.is_empty() {
            return;
        }

        if let Err(e) = log.write_records(pending) {
            error!(path = %log.path().display(), error = %e, "failed to write heartbeat log");

            if self.deferred_log_error.is_none() {
                self.deferred_log_error = Some(e);
            }
        }
    }
}
