use std::fmt::Debug;

use crate::{Event, ProfilerConfig, Result};

/// The operations of a profiler, for code that should work with profiling switched on or off.
///
/// Implemented by [`Profiler`][crate::Profiler], which measures and reports events, and by
/// [`NullProfiler`], which accepts every call and does nothing.
pub trait EventProfiler: Debug + Send + Sync {
    /// See [`Profiler::init()`][crate::Profiler::init].
    ///
    /// # Errors
    ///
    /// Implementation-specific.
    fn init(&self, config: &ProfilerConfig) -> Result<()>;

    /// See [`Profiler::begin()`][crate::Profiler::begin].
    ///
    /// # Errors
    ///
    /// Implementation-specific.
    fn begin(&self) -> Result<Event>;

    /// See [`Profiler::end()`][crate::Profiler::end].
    ///
    /// # Errors
    ///
    /// Implementation-specific.
    fn end(&self, stream: usize, id: u64, work: u64, event: &mut Event) -> Result<()>;

    /// See [`Profiler::end_then_begin()`][crate::Profiler::end_then_begin].
    ///
    /// # Errors
    ///
    /// Implementation-specific.
    fn end_then_begin(&self, stream: usize, id: u64, work: u64, event: &mut Event)
    -> Result<()>;

    /// See [`Profiler::issue()`][crate::Profiler::issue].
    ///
    /// # Errors
    ///
    /// Implementation-specific.
    fn issue(&self, stream: usize, id: u64, work: u64, event: &Event) -> Result<()>;

    /// See [`Profiler::finish()`][crate::Profiler::finish].
    ///
    /// # Errors
    ///
    /// Implementation-specific.
    fn finish(&self) -> Result<()>;
}

/// A profiler that accepts every call, measures nothing and never fails.
///
/// Events returned by [`begin()`][EventProfiler::begin] are all-zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullProfiler;

impl EventProfiler for NullProfiler {
    fn init(&self, _config: &ProfilerConfig) -> Result<()> {
        Ok(())
    }

    fn begin(&self) -> Result<Event> {
        Ok(Event::default())
    }

    fn end(&self, _stream: usize, _id: u64, _work: u64, _event: &mut Event) -> Result<()> {
        Ok(())
    }

    fn end_then_begin(
        &self,
        _stream: usize,
        _id: u64,
        _work: u64,
        _event: &mut Event,
    ) -> Result<()> {
        Ok(())
    }

    fn issue(&self, _stream: usize, _id: u64, _work: u64, _event: &Event) -> Result<()> {
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::StreamConfig;

    fn run_workload(profiler: &dyn EventProfiler) -> Result<()> {
        profiler.init(&ProfilerConfig::builder().stream(StreamConfig::anonymous()).build())?;

        let mut event = profiler.begin()?;
        profiler.end_then_begin(0, 1, 1, &mut event)?;
        profiler.end(0, 2, 1, &mut event)?;
        profiler.issue(0, 3, 1, &event)?;

        profiler.finish()
    }

    #[test]
    fn null_profiler_accepts_everything() {
        run_workload(&NullProfiler).unwrap();

        // Even indexes that no real profiler would accept.
        let mut event = Event::default();
        NullProfiler.end(usize::MAX, 0, 0, &mut event).unwrap();
        assert_eq!(event, Event::default());
    }

    #[test]
    fn real_profiler_through_trait() {
        let profiler = crate::Profiler::new();

        run_workload(&profiler).unwrap();

        assert!(!profiler.is_active());
    }
}
