/// A point-in-time reading of the wall clock and the cumulative energy counter.
///
/// Time is in nanoseconds since the Unix epoch and energy is in microjoules since an arbitrary
/// origin chosen by the energy source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Snapshot {
    time: u64,
    energy: u64,
    degraded: bool,
}

impl Snapshot {
    /// Creates a snapshot from a time and an energy reading.
    #[must_use]
    pub const fn new(time: u64, energy: u64) -> Self {
        Self {
            time,
            energy,
            degraded: false,
        }
    }

    /// A snapshot whose energy reading failed. The energy reads as zero.
    #[must_use]
    pub(crate) const fn without_energy(time: u64) -> Self {
        Self {
            time,
            energy: 0,
            degraded: true,
        }
    }

    /// Nanoseconds since the Unix epoch.
    #[must_use]
    pub const fn time(&self) -> u64 {
        self.time
    }

    /// Cumulative energy in microjoules.
    #[must_use]
    pub const fn energy(&self) -> u64 {
        self.energy
    }

    /// Whether the energy reading failed when this snapshot was taken.
    ///
    /// The energy of a degraded snapshot is zero and carries no meaning.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }
}

/// A unit of work bracketed by two snapshots.
///
/// Events are owned by the caller. The profiler fills them in through
/// [`begin()`][crate::Profiler::begin], [`end()`][crate::Profiler::end] and
/// [`end_then_begin()`][crate::Profiler::end_then_begin], and reports them to a stream. An event
/// that has just begun ends where it starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Event {
    start: Snapshot,
    end: Snapshot,
}

impl Event {
    /// Creates an event from explicit snapshots, for example to report work measured elsewhere
    /// through [`issue()`][crate::Profiler::issue].
    #[must_use]
    pub const fn new(start: Snapshot, end: Snapshot) -> Self {
        Self { start, end }
    }

    pub(crate) const fn starting_at(start: Snapshot) -> Self {
        Self { start, end: start }
    }

    /// The snapshot taken when the work started.
    #[must_use]
    pub const fn start(&self) -> Snapshot {
        self.start
    }

    /// The snapshot taken when the work ended.
    #[must_use]
    pub const fn end(&self) -> Snapshot {
        self.end
    }

    pub(crate) fn set_end(&mut self, end: Snapshot) {
        self.end = end;
    }

    /// Moves the end snapshot into the start, beginning the next unit of work where this one
    /// ended.
    pub(crate) fn chain(&mut self) {
        self.start = self.end;
    }

    /// Nanoseconds between the start and end snapshots, zero if the clock went backwards.
    #[must_use]
    pub const fn elapsed_nanos(&self) -> u64 {
        self.end.time.saturating_sub(self.start.time)
    }

    /// Microjoules consumed between the start and end snapshots.
    ///
    /// Zero if either snapshot is degraded or the counter went backwards.
    #[must_use]
    pub const fn energy_uj(&self) -> u64 {
        if self.start.degraded || self.end.degraded {
            return 0;
        }

        self.end.energy.saturating_sub(self.start.energy)
    }

    /// Average power over the event in watts, zero for an event of zero length.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "power is a statistic, f64 precision is plenty"
    )]
    pub fn watts(&self) -> f64 {
        let elapsed = self.elapsed_nanos();

        if elapsed == 0 {
            return 0.0;
        }

        // uJ / ns = kW, so scale by 1000 to get W.
        self.energy_uj() as f64 * 1000.0 / elapsed as f64
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn new_event_has_given_snapshots() {
        let event = Event::new(Snapshot::new(10, 100), Snapshot::new(20, 300));

        assert_eq!(event.start(), Snapshot::new(10, 100));
        assert_eq!(event.end(), Snapshot::new(20, 300));
        assert_eq!(event.elapsed_nanos(), 10);
        assert_eq!(event.energy_uj(), 200);
    }

    #[test]
    fn started_event_ends_where_it_starts() {
        let event = Event::starting_at(Snapshot::new(5, 50));

        assert_eq!(event.start(), event.end());
        assert_eq!(event.elapsed_nanos(), 0);
        assert!(event.watts().abs() < f64::EPSILON);
    }

    #[test]
    fn chain_moves_end_into_start() {
        let mut event = Event::starting_at(Snapshot::new(5, 50));
        event.set_end(Snapshot::new(9, 70));

        event.chain();

        assert_eq!(event.start(), Snapshot::new(9, 70));
        assert_eq!(event.end(), Snapshot::new(9, 70));
    }

    #[test]
    fn watts_of_one_joule_per_second() {
        let event = Event::new(
            Snapshot::new(0, 0),
            Snapshot::new(1_000_000_000, 1_000_000),
        );

        assert!((event.watts() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn backwards_readings_are_zero_length() {
        let event = Event::new(Snapshot::new(20, 300), Snapshot::new(10, 100));

        assert_eq!(event.elapsed_nanos(), 0);
        assert_eq!(event.energy_uj(), 0);
    }

    #[test]
    fn degraded_snapshot_has_no_energy() {
        let event = Event::new(Snapshot::new(0, 500), Snapshot::without_energy(1_000));

        assert!(event.end().is_degraded());
        assert_eq!(event.end().energy(), 0);
        assert_eq!(event.energy_uj(), 0);
        assert!(event.watts().abs() < f64::EPSILON);
    }
}
