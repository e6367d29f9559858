use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when acquiring or reading an energy source.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The energy counter interface exists but exposes no usable energy zones.
    #[error("no energy zones found under '{}'", .root.display())]
    NoEnergyZones {
        /// The directory that was searched for energy zones.
        root: PathBuf,
    },

    /// An energy counter file could not be opened or read.
    #[error("failed to access '{}': {source}", .path.display())]
    Io {
        /// The file or directory that could not be accessed.
        path: PathBuf,

        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An energy counter file did not contain an unsigned integer.
    #[error("'{}' contains '{value}', which is not an energy counter value", .path.display())]
    Parse {
        /// The file that contained the unexpected value.
        path: PathBuf,

        /// The unexpected value, with surrounding whitespace removed.
        value: String,
    },

    /// The energy source was used after being released.
    #[error("the energy source has been released")]
    Released,
}

/// A specialized `Result` type for energy source operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
