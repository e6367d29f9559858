/// Statistics derived from one heartbeat.
///
/// Times are nanoseconds, energies are microjoules, performance is work per second and power is
/// in watts. "Global" values cover every heartbeat issued to the window so far, "window" values
/// cover the most recent heartbeats up to the window size and "instant" values cover only this
/// heartbeat.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct HeartbeatRecord {
    /// Sequence number of the heartbeat within its window, starting from zero.
    pub beat: u64,

    /// The caller-defined tag of the heartbeat.
    pub tag: u64,

    /// Work done since the window was created.
    pub global_work: u64,

    /// Work done by the heartbeats currently in the window.
    pub window_work: u64,

    /// Work done by this heartbeat.
    pub work: u64,

    /// Sum of the durations of all heartbeats.
    pub global_time: u64,

    /// Sum of the durations of the heartbeats currently in the window.
    pub window_time: u64,

    /// Time at which the work of this heartbeat started.
    pub start_time: u64,

    /// Time at which the work of this heartbeat ended.
    pub end_time: u64,

    /// Global work per second.
    pub global_perf: f64,

    /// Window work per second.
    pub window_perf: f64,

    /// Work per second of this heartbeat.
    pub instant_perf: f64,

    /// Sum of the energy of all heartbeats.
    pub global_energy: u64,

    /// Sum of the energy of the heartbeats currently in the window.
    pub window_energy: u64,

    /// Cumulative energy reading when the work of this heartbeat started.
    pub start_energy: u64,

    /// Cumulative energy reading when the work of this heartbeat ended.
    pub end_energy: u64,

    /// Global average power.
    pub global_power: f64,

    /// Average power over the window.
    pub window_power: f64,

    /// Average power of this heartbeat.
    pub instant_power: f64,
}

impl HeartbeatRecord {
    /// The record formatted as log cells, in the order of [`LOG_COLUMNS`][crate::LOG_COLUMNS].
    pub(crate) fn to_cells(&self) -> [String; 19] {
        [
            self.beat.to_string(),
            self.tag.to_string(),
            self.global_work.to_string(),
            self.window_work.to_string(),
            self.work.to_string(),
            self.global_time.to_string(),
            self.window_time.to_string(),
            self.start_time.to_string(),
            self.end_time.to_string(),
            format!("{:.6}", self.global_perf),
            format!("{:.6}", self.window_perf),
            format!("{:.6}", self.instant_perf),
            self.global_energy.to_string(),
            self.window_energy.to_string(),
            self.start_energy.to_string(),
            self.end_energy.to_string(),
            format!("{:.6}", self.global_power),
            format!("{:.6}", self.window_power),
            format!("{:.6}", self.instant_power),
        ]
    }
}

/// Work per second over `nanos` nanoseconds; zero for an empty interval.
#[expect(
    clippy::cast_precision_loss,
    reason = "rates are statistics, rounding of huge counters is acceptable"
)]
pub(crate) fn perf(work: u64, nanos: u64) -> f64 {
    if nanos == 0 {
        return 0.0;
    }

    work as f64 * 1_000_000_000.0 / nanos as f64
}

/// Watts from microjoules over `nanos` nanoseconds; zero for an empty interval.
#[expect(
    clippy::cast_precision_loss,
    reason = "rates are statistics, rounding of huge counters is acceptable"
)]
pub(crate) fn power(energy_uj: u64, nanos: u64) -> f64 {
    if nanos == 0 {
        return 0.0;
    }

    energy_uj as f64 * 1000.0 / nanos as f64
}
