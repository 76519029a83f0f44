use cwait_common::{RetryBudget, TransportPolicy};
use std::time::Duration;

pub use cwait_common::testing::init_test_logging;

/// Short budget so end-to-end waits finish in milliseconds.
#[allow(dead_code)]
pub fn fast_budget(max_attempts: u32) -> RetryBudget {
    RetryBudget::new(max_attempts, Duration::from_millis(2))
}

#[allow(dead_code)]
pub fn fail_fast_budget(max_attempts: u32) -> RetryBudget {
    fast_budget(max_attempts).with_transport(TransportPolicy::FailFast)
}
