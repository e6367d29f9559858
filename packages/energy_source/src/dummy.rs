use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::{EnergySource, Error, Result};

const REFRESH_INTERVAL: Duration = Duration::from_micros(1);

/// An energy source for machines without energy counters.
///
/// Every reading is zero, which keeps timing data meaningful while reporting no energy use.
///
/// # Example
///
/// ```
/// use energy_source::{DummyEnergySource, EnergySource};
///
/// let source = DummyEnergySource::new();
/// assert_eq!(source.read_uj().unwrap(), 0);
/// ```
#[derive(Debug, Default)]
pub struct DummyEnergySource {
    released: AtomicBool,
}

impl DummyEnergySource {
    /// Creates a new dummy energy source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EnergySource for DummyEnergySource {
    fn source_name(&self) -> &'static str {
        "dummy"
    }

    fn read_uj(&self) -> Result<u64> {
        // Relaxed is enough, the flag does not guard any other data.
        if self.released.load(Ordering::Relaxed) {
            return Err(Error::Released);
        }

        Ok(0)
    }

    fn refresh_interval(&self) -> Duration {
        REFRESH_INTERVAL
    }

    fn release(&self) -> Result<()> {
        self.released.store(true, Ordering::Relaxed);
        Ok(())
    }
}
