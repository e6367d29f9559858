use std::num::{NonZero, ParseIntError};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use crate::{Error, Result};

/// Window size used by streams that do not set their own and when the configuration does not
/// set a default.
pub const DEFAULT_WINDOW_SIZE: usize = 20;

/// The shortest interval between application poller samples unless configured otherwise.
pub const DEFAULT_APP_MIN_SLEEP: Duration = Duration::from_millis(10);

const WINDOW_SIZE_VAR: &str = "WINDOW_SIZE";
const MIN_SLEEP_US_VAR: &str = "MIN_SLEEP_US";

/// Configuration of one heartbeat stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamConfig {
    name: Option<String>,
    window_size: usize,
}

impl StreamConfig {
    /// A stream that logs its heartbeats to `heartbeat-<name>.log` in the log directory.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            window_size: 0,
        }
    }

    /// A stream that keeps statistics in memory without writing a log.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Sets the window size of the stream. Zero means the profiler default.
    #[must_use]
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// The name of the stream, if it is logged.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The window size of the stream, zero meaning the profiler default.
    #[must_use]
    pub fn window_size(&self) -> usize {
        self.window_size
    }
}

/// Configuration of a [`Profiler`][crate::Profiler], created through
/// [`ProfilerConfig::builder()`].
///
/// Environment overrides are applied when the profiler is initialized, not when the
/// configuration is built. With an environment prefix of `HE_`:
///
/// * `HE_WINDOW_SIZE` replaces the default window size. Streams with their own size keep it.
/// * `HE_MIN_SLEEP_US` replaces the minimum interval between application poller samples.
#[derive(Clone, Debug)]
pub struct ProfilerConfig {
    streams: Vec<StreamConfig>,
    default_window_size: usize,
    app_stream: Option<usize>,
    app_min_sleep: Duration,
    log_dir: Option<PathBuf>,
    env_prefix: Option<String>,
}

impl ProfilerConfig {
    /// Starts building a configuration with no streams and no application poller.
    #[must_use]
    pub fn builder() -> ProfilerConfigBuilder {
        ProfilerConfigBuilder::new()
    }

    /// The configured streams, in index order.
    #[must_use]
    pub fn streams(&self) -> &[StreamConfig] {
        &self.streams
    }

    /// The stream the application poller reports to, if any.
    #[must_use]
    pub fn app_stream(&self) -> Option<usize> {
        self.app_stream
    }

    /// The directory that heartbeat logs are created in. `None` means the working directory.
    #[must_use]
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    pub(crate) fn resolve(&self) -> Result<ResolvedConfig> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Applies environment overrides read through `lookup` and validates the result.
    pub(crate) fn resolve_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ResolvedConfig> {
        if self.streams.is_empty() {
            return Err(invalid("at least one stream is required"));
        }

        let mut default_window_size = self.default_window_size;
        let mut app_min_sleep = self.app_min_sleep;

        if let Some(prefix) = &self.env_prefix {
            let key = format!("{prefix}{WINDOW_SIZE_VAR}");
            if let Some(value) = lookup(&key) {
                default_window_size = parse_env::<usize>(&key, &value)?;
            }

            let key = format!("{prefix}{MIN_SLEEP_US_VAR}");
            if let Some(value) = lookup(&key) {
                app_min_sleep = Duration::from_micros(parse_env::<u64>(&key, &value)?);
            }
        }

        if app_min_sleep.is_zero() {
            app_min_sleep = DEFAULT_APP_MIN_SLEEP;
        }

        let streams = self
            .streams
            .iter()
            .enumerate()
            .map(|(index, stream)| -> Result<ResolvedStream> {
                let requested = match stream.window_size {
                    0 => default_window_size,
                    size => size,
                };

                let window_size = NonZero::new(requested).ok_or_else(|| {
                    invalid(format!("stream {index} has a window size of zero"))
                })?;

                if let Some(name) = &stream.name {
                    validate_name(index, name)?;
                }

                Ok(ResolvedStream {
                    name: stream.name.clone(),
                    window_size,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let app_stream = self.app_stream.filter(|&index| {
            let in_range = index < streams.len();

            if !in_range {
                debug!(
                    index,
                    count = streams.len(),
                    "application stream is out of range, poller disabled"
                );
            }

            in_range
        });

        Ok(ResolvedConfig {
            streams,
            app_stream,
            app_min_sleep,
            log_dir: self.log_dir.clone().unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}

/// Builds a [`ProfilerConfig`].
#[derive(Clone, Debug)]
#[must_use]
pub struct ProfilerConfigBuilder {
    config: ProfilerConfig,
}

impl ProfilerConfigBuilder {
    fn new() -> Self {
        Self {
            config: ProfilerConfig {
                streams: Vec::new(),
                default_window_size: DEFAULT_WINDOW_SIZE,
                app_stream: None,
                app_min_sleep: Duration::ZERO,
                log_dir: None,
                env_prefix: None,
            },
        }
    }

    /// Appends a stream. Streams are indexed in the order they are added.
    pub fn stream(mut self, stream: StreamConfig) -> Self {
        self.config.streams.push(stream);
        self
    }

    /// Appends several streams.
    pub fn streams(mut self, streams: impl IntoIterator<Item = StreamConfig>) -> Self {
        self.config.streams.extend(streams);
        self
    }

    /// Window size of streams that do not set their own. Defaults to [`DEFAULT_WINDOW_SIZE`].
    pub fn default_window_size(mut self, window_size: usize) -> Self {
        self.config.default_window_size = window_size;
        self
    }

    /// Reports the whole-application energy to the stream with this index from a background
    /// thread. An index that does not name a stream disables the poller.
    pub fn app_stream(mut self, index: usize) -> Self {
        self.config.app_stream = Some(index);
        self
    }

    /// Lower bound on the interval between application poller samples. Zero means
    /// [`DEFAULT_APP_MIN_SLEEP`].
    pub fn app_min_sleep(mut self, min_sleep: Duration) -> Self {
        self.config.app_min_sleep = min_sleep;
        self
    }

    /// Directory to create heartbeat logs in. Defaults to the working directory.
    pub fn log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = Some(log_dir.into());
        self
    }

    /// Prefix of the environment variables that override the configuration.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.env_prefix = Some(prefix.into());
        self
    }

    /// Finishes building. The configuration is validated when the profiler is initialized.
    #[must_use]
    pub fn build(self) -> ProfilerConfig {
        self.config
    }
}

/// A validated configuration with environment overrides applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ResolvedConfig {
    pub(crate) streams: Vec<ResolvedStream>,

    /// Only set if the index names one of `streams`.
    pub(crate) app_stream: Option<usize>,

    pub(crate) app_min_sleep: Duration,
    pub(crate) log_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ResolvedStream {
    pub(crate) name: Option<String>,
    pub(crate) window_size: NonZero<usize>,
}

impl ResolvedStream {
    pub(crate) fn log_path(&self, log_dir: &Path) -> Option<PathBuf> {
        self.name
            .as_ref()
            .map(|name| log_dir.join(format!("heartbeat-{name}.log")))
    }
}

fn validate_name(index: usize, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(format!("stream {index} has an empty name")));
    }

    // The name becomes part of a file name inside the log directory.
    if name.contains(['/', '\\']) {
        return Err(invalid(format!(
            "stream {index} name '{name}' contains a path separator"
        )));
    }

    Ok(())
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr<Err = ParseIntError>,
{
    value
        .trim()
        .parse()
        .map_err(|e| invalid(format!("{key} is '{value}', expected an unsigned integer: {e}")))
}

fn invalid(problem: impl Into<String>) -> Error {
    Error::InvalidConfig {
        problem: problem.into(),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::HashMap;

    use new_zealand::nz;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();

        move |key: &str| vars.get(key).cloned()
    }

    fn two_streams() -> ProfilerConfigBuilder {
        ProfilerConfig::builder()
            .stream(StreamConfig::named("app"))
            .stream(StreamConfig::named("test").with_window_size(5))
    }

    #[test]
    fn defaults() {
        let resolved = two_streams().build().resolve_with(no_env).unwrap();

        assert_eq!(resolved.streams.len(), 2);
        assert_eq!(resolved.streams[0].window_size, nz!(20));
        assert_eq!(resolved.streams[1].window_size, nz!(5));
        assert_eq!(resolved.app_stream, None);
        assert_eq!(resolved.app_min_sleep, DEFAULT_APP_MIN_SLEEP);
        assert_eq!(resolved.log_dir, PathBuf::from("."));
    }

    #[test]
    fn zero_streams_is_invalid() {
        let result = ProfilerConfig::builder().build().resolve_with(no_env);

        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn zero_window_size_is_invalid() {
        let result = two_streams()
            .default_window_size(0)
            .build()
            .resolve_with(no_env);

        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn env_window_size_overrides_default_only() {
        let resolved = two_streams()
            .env_prefix("HE_")
            .build()
            .resolve_with(env(&[("HE_WINDOW_SIZE", "7")]))
            .unwrap();

        assert_eq!(resolved.streams[0].window_size, nz!(7));
        assert_eq!(resolved.streams[1].window_size, nz!(5));
    }

    #[test]
    fn env_is_ignored_without_prefix() {
        let resolved = two_streams()
            .build()
            .resolve_with(env(&[("WINDOW_SIZE", "7")]))
            .unwrap();

        assert_eq!(resolved.streams[0].window_size, nz!(20));
    }

    #[test]
    fn unparseable_env_value_is_invalid() {
        let result = two_streams()
            .env_prefix("HE_")
            .build()
            .resolve_with(env(&[("HE_WINDOW_SIZE", "lots")]));

        let Err(Error::InvalidConfig { problem }) = result else {
            panic!("expected InvalidConfig, got {result:?}");
        };
        assert!(problem.contains("HE_WINDOW_SIZE"));
    }

    #[test]
    fn env_min_sleep_overrides_floor() {
        let resolved = two_streams()
            .app_min_sleep(Duration::from_secs(1))
            .env_prefix("HE_")
            .build()
            .resolve_with(env(&[("HE_MIN_SLEEP_US", "2500")]))
            .unwrap();

        assert_eq!(resolved.app_min_sleep, Duration::from_micros(2500));
    }

    #[test]
    fn zero_min_sleep_means_default() {
        let resolved = two_streams()
            .env_prefix("HE_")
            .build()
            .resolve_with(env(&[("HE_MIN_SLEEP_US", "0")]))
            .unwrap();

        assert_eq!(resolved.app_min_sleep, DEFAULT_APP_MIN_SLEEP);
    }

    #[test]
    fn out_of_range_app_stream_disables_poller() {
        let resolved = two_streams()
            .app_stream(2)
            .build()
            .resolve_with(no_env)
            .unwrap();

        assert_eq!(resolved.app_stream, None);
    }

    #[test]
    fn in_range_app_stream_is_kept() {
        let resolved = two_streams()
            .app_stream(0)
            .build()
            .resolve_with(no_env)
            .unwrap();

        assert_eq!(resolved.app_stream, Some(0));
    }

    #[test]
    fn names_must_be_usable_in_file_names() {
        for name in ["", "a/b", "a\\b"] {
            let result = ProfilerConfig::builder()
                .stream(StreamConfig::named(name))
                .build()
                .resolve_with(no_env);

            assert!(
                matches!(result, Err(Error::InvalidConfig { .. })),
                "name {name:?} was accepted"
            );
        }
    }

    #[test]
    fn log_path_only_for_named_streams() {
        let resolved = ProfilerConfig::builder()
            .stream(StreamConfig::named("app"))
            .stream(StreamConfig::anonymous())
            .log_dir("/tmp/logs")
            .build()
            .resolve_with(no_env)
            .unwrap();

        assert_eq!(
            resolved.streams[0].log_path(&resolved.log_dir),
            Some(PathBuf::from("/tmp/logs/heartbeat-app.log"))
        );
        assert_eq!(resolved.streams[1].log_path(&resolved.log_dir), None);
    }
}
