use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use energy_source::{EnergySource, Error, Result};

/// An energy source whose counter advances by a fixed step on every read.
///
/// Clone the [`ScriptedEnergy`] handle before handing the source to a profiler to observe reads
/// and releases or to make later calls fail.
#[derive(Debug)]
pub struct ScriptedEnergySource {
    state: Arc<ScriptedEnergy>,
}

/// Shared state of a [`ScriptedEnergySource`].
#[derive(Debug)]
pub struct ScriptedEnergy {
    step_uj: u64,
    refresh_interval: Duration,
    reads: AtomicU64,
    releases: AtomicU64,
    fail_reads: AtomicBool,
    fail_release: AtomicBool,
}

impl ScriptedEnergySource {
    /// A source that gains `step_uj` microjoules per read and refreshes every microsecond.
    #[must_use]
    pub fn new(step_uj: u64) -> Self {
        Self::with_refresh_interval(step_uj, Duration::from_micros(1))
    }

    /// A source that gains `step_uj` microjoules per read and claims the given refresh interval.
    #[must_use]
    pub fn with_refresh_interval(step_uj: u64, refresh_interval: Duration) -> Self {
        Self {
            state: Arc::new(ScriptedEnergy {
                step_uj,
                refresh_interval,
                reads: AtomicU64::new(0),
                releases: AtomicU64::new(0),
                fail_reads: AtomicBool::new(false),
                fail_release: AtomicBool::new(false),
            }),
        }
    }

    /// A handle to the shared state that stays usable after the source is boxed and moved.
    #[must_use]
    pub fn state(&self) -> Arc<ScriptedEnergy> {
        Arc::clone(&self.state)
    }

    /// Boxes the source, as expected by profiler `acquire` callbacks.
    #[must_use]
    pub fn boxed(self) -> Box<dyn EnergySource> {
        Box::new(self)
    }
}

impl ScriptedEnergy {
    /// How many reads were attempted, including failed ones.
    #[must_use]
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// How many times the source was released.
    #[must_use]
    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }

    /// Makes subsequent reads fail (or succeed again).
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// Makes subsequent releases fail (or succeed again).
    pub fn set_fail_release(&self, fail: bool) {
        self.fail_release.store(fail, Ordering::Relaxed);
    }
}

impl EnergySource for ScriptedEnergySource {
    fn source_name(&self) -> &'static str {
        "scripted"
    }

    fn read_uj(&self) -> Result<u64> {
        let previous = self.state.reads.fetch_add(1, Ordering::Relaxed);

        if self.state.fail_reads.load(Ordering::Relaxed) {
            return Err(Error::Released);
        }

        Ok(previous.wrapping_add(1).wrapping_mul(self.state.step_uj))
    }

    fn refresh_interval(&self) -> Duration {
        self.state.refresh_interval
    }

    fn release(&self) -> Result<()> {
        self.state.releases.fetch_add(1, Ordering::Relaxed);

        if self.state.fail_release.load(Ordering::Relaxed) {
            return Err(Error::Released);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_advances_per_read() {
        let source = ScriptedEnergySource::new(5);

        assert_eq!(source.read_uj().unwrap(), 5);
        assert_eq!(source.read_uj().unwrap(), 10);
        assert_eq!(source.state().reads(), 2);
    }

    #[test]
    fn failures_are_injectable() {
        let source = ScriptedEnergySource::new(5);
        let state = source.state();
        let source = source.boxed();

        state.set_fail_reads(true);
        state.set_fail_release(true);

        assert!(source.read_uj().is_err());
        assert!(source.release().is_err());
        assert_eq!(state.releases(), 1);
    }
}
