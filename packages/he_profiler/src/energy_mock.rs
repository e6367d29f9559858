#![cfg_attr(coverage_nightly, coverage(off))]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use energy_source::EnergySource;
use mockall::mock;

use crate::pal::{MockPlatform, PlatformFacade};

mock! {
    #[derive(Debug)]
    pub Energy {
    }

    impl EnergySource for Energy {
        fn source_name(&self) -> &'static str;
        fn read_uj(&self) -> energy_source::Result<u64>;
        fn refresh_interval(&self) -> Duration;
        fn release(&self) -> energy_source::Result<()>;
    }
}

/// An energy source that gains `step` microjoules on every read and counts the reads.
pub(crate) fn counting_energy(step: u64, reads: Arc<AtomicU64>) -> MockEnergy {
    let mut energy = MockEnergy::new();

    energy.expect_source_name().return_const("mock");
    energy
        .expect_refresh_interval()
        .return_const(Duration::from_micros(1));
    energy.expect_read_uj().returning(move || {
        let previous = reads.fetch_add(1, Ordering::Relaxed);
        Ok(previous.wrapping_add(1).wrapping_mul(step))
    });
    energy.expect_release().returning(|| Ok(()));

    energy
}

/// A platform whose clock advances by `step` nanoseconds on every read and counts the reads.
pub(crate) fn ticking_platform(step: u64, reads: Arc<AtomicU64>) -> PlatformFacade {
    let mut platform = MockPlatform::new();

    platform.expect_now_nanos().returning(move || {
        let previous = reads.fetch_add(1, Ordering::Relaxed);
        previous.wrapping_add(1).wrapping_mul(step)
    });

    PlatformFacade::from_mock(platform)
}
