use std::fmt::Debug;
use std::time::Duration;

use crate::Result;

/// A provider of cumulative energy readings.
///
/// Readings are in microjoules and never decrease for as long as the source is live, so the
/// difference between two readings is the energy consumed between them. Implementations must
/// be usable from many threads at once.
pub trait EnergySource: Debug + Send + Sync + 'static {
    /// A short human-readable name of the backend, for diagnostics.
    fn source_name(&self) -> &'static str;

    /// Reads the cumulative energy consumed, in microjoules.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying counter cannot be read or if the source has already
    /// been released.
    fn read_uj(&self) -> Result<u64>;

    /// The interval at which the underlying counter refreshes.
    ///
    /// Two reads closer together than this are likely to return the same value.
    fn refresh_interval(&self) -> Duration;

    /// Releases any resources held by the source.
    ///
    /// Reads after a release fail with [`Error::Released`][crate::Error::Released]. Releasing
    /// an already released source succeeds without doing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to shut down cleanly.
    fn release(&self) -> Result<()>;
}
