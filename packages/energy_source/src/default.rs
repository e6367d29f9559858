use tracing::debug;
#[cfg(target_os = "linux")]
use tracing::warn;

#[cfg(target_os = "linux")]
use crate::Powercap;
use crate::{DummyEnergySource, EnergySource, Result};

/// Acquires the best energy source available on the current machine.
///
/// On Linux this is the powercap RAPL interface if it is present and readable. Everywhere else,
/// or if the hardware counters cannot be opened, a [`DummyEnergySource`] is returned instead and
/// a warning is logged.
///
/// # Errors
///
/// Reserved for backends whose acquisition failure cannot be covered by the dummy fallback.
/// The backends currently selected by this function always fall back successfully.
#[cfg_attr(test, mutants::skip)] // Result depends on the hardware of the machine running tests.
pub fn acquire_default() -> Result<Box<dyn EnergySource>> {
    #[cfg(target_os = "linux")]
    match Powercap::open() {
        Ok(powercap) => {
            debug!("using powercap energy source");
            return Ok(Box::new(powercap));
        }
        Err(error) => {
            warn!(%error, "powercap energy counters unavailable, energy readings will be zero");
        }
    }

    debug!("using dummy energy source");
    Ok(Box::new(DummyEnergySource::new()))
}
