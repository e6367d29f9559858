#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Cumulative energy readings for measuring the energy cost of units of work.
//!
//! An [`EnergySource`] reports a monotonically non-decreasing counter of the energy consumed by
//! the system, in microjoules, together with the interval at which that counter actually
//! refreshes. Two readings taken around a unit of work give the energy that work cost.
//!
//! Available backends:
//!
//! * [`Powercap`] - the Linux powercap interface to Intel RAPL package counters.
//! * [`DummyEnergySource`] - always reads zero; used when no hardware counters are available.
//!
//! Use [`acquire_default()`] to get the best backend available on the current machine.
//!
//! # Example
//!
//! ```
//! let source = energy_source::acquire_default().unwrap();
//!
//! let before = source.read_uj().unwrap();
//! // Do some work...
//! let after = source.read_uj().unwrap();
//!
//! assert!(after >= before);
//! source.release().unwrap();
//! ```

mod default;
mod dummy;
mod error;
#[cfg(target_os = "linux")]
mod powercap;
mod source;

pub use default::acquire_default;
pub use dummy::DummyEnergySource;
pub use error::{Error, Result};
#[cfg(target_os = "linux")]
pub use powercap::Powercap;
pub use source::EnergySource;
