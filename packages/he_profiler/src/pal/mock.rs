#![cfg_attr(coverage_nightly, coverage(off))]

use mockall::mock;

use crate::pal::Platform;

mock! {
    #[derive(Debug)]
    pub Platform {
    }

    impl Platform for Platform {
        fn now_nanos(&self) -> u64;
    }
}
