use std::time::{SystemTime, UNIX_EPOCH};

use crate::pal::Platform;

#[derive(Debug)]
pub(crate) struct BuildTargetPlatform;

pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform;

impl Platform for BuildTargetPlatform {
    fn now_nanos(&self) -> u64 {
        // A clock set before the epoch reads as zero. Far-future values saturate.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |since_epoch| {
                u64::try_from(since_epoch.as_nanos()).unwrap_or(u64::MAX)
            })
    }
}
