use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by profiler operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// `init` was called on a profiler that is already initialized or initializing.
    #[error("the profiler is already initialized")]
    AlreadyInitialized,

    /// The profiler configuration cannot be used, after environment overrides were applied.
    #[error("invalid profiler configuration: {problem}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        problem: String,
    },

    /// A stream index does not name one of the configured streams.
    #[error("stream index {index} is out of range for a profiler with {count} streams")]
    OutOfRange {
        /// The stream index that was requested.
        index: usize,

        /// The number of streams the profiler was initialized with.
        count: usize,
    },

    /// The operation requires an active profiler but the profiler is not initialized.
    #[error("the profiler is not initialized")]
    InvalidState,

    /// A heartbeat log could not be created, written or closed.
    #[error("heartbeat log '{}' failed: {source}", .path.display())]
    IoFailure {
        /// The log file that failed.
        path: PathBuf,

        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The energy source could not be acquired or released.
    #[error("energy source failed: {0}")]
    BackendFailure(#[from] energy_source::Error),

    /// The application poller thread could not be started or ended abnormally.
    #[error("application poller thread failed: {problem}")]
    ThreadFailure {
        /// What went wrong with the thread.
        problem: String,
    },

    /// One or more teardown steps failed. Every other step was still carried out.
    #[error("profiler teardown failed: {}", describe_all(.failures))]
    TeardownFailed {
        /// The failure of each failed teardown step, in teardown order.
        failures: Vec<Error>,
    },
}

fn describe_all(failures: &[Error]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A specialized `Result` type for profiler operations, returning the crate's [`Error`] type as
/// the error value.
pub type Result<T> = std::result::Result<T, Error>;
