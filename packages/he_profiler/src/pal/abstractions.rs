use std::fmt::Debug;

pub(crate) trait Platform: Debug + Send + Sync + 'static {
    /// Wall clock time in nanoseconds since the Unix epoch.
    fn now_nanos(&self) -> u64;
}
