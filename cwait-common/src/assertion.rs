//! Caller-level checks on wait outcomes.
//!
//! A timeout still carries the last snapshot; these helpers turn any outcome
//! that does not match the target into an [`AssertionFailure`].

use crate::budget::RetryBudget;
use crate::error::{AssertionFailure, WaitError};
use crate::resource::StateSource;
use crate::snapshot::StateSnapshot;
use crate::target::WaitTarget;
use crate::waiter::{Converged, await_state};

/// Check a wait result against its target.
pub fn assert_converged(
    result: Result<Converged, WaitError>,
    target: &WaitTarget,
) -> Result<StateSnapshot, AssertionFailure> {
    match result {
        Ok(done) if target.matches(&done.snapshot) => Ok(done.snapshot),
        Ok(done) => Err(AssertionFailure {
            expected: target.to_string(),
            observed: Some(done.snapshot),
            cause: None,
        }),
        Err(err) => Err(AssertionFailure {
            expected: target.to_string(),
            observed: err.last_snapshot().cloned(),
            cause: Some(err),
        }),
    }
}

/// Wait for `target` and fail unless it was reached.
pub fn expect_state<S: StateSource + ?Sized>(
    source: &mut S,
    target: &WaitTarget,
    budget: &RetryBudget,
) -> Result<StateSnapshot, AssertionFailure> {
    assert_converged(await_state(source, target, budget), target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn converged(primary: &str, secondary: &str) -> Converged {
        Converged {
            snapshot: StateSnapshot::new(primary, secondary),
            attempts: 1,
            elapsed: Duration::ZERO,
            transport_errors: 0,
        }
    }

    #[test]
    fn test_matching_outcome_passes() {
        let target = WaitTarget::active("RUNNING");
        let snap = assert_converged(Ok(converged("ACTIVE", "RUNNING")), &target).unwrap();
        assert_eq!(snap.secondary(), "RUNNING");
    }

    #[test]
    fn test_mismatched_outcome_fails() {
        let target = WaitTarget::active("RUNNING");
        let failure = assert_converged(Ok(converged("ACTIVE", "BOOT")), &target).unwrap_err();
        assert_eq!(failure.expected, "ACTIVE/RUNNING");
        assert!(failure.cause.is_none());
    }

    #[test]
    fn test_timeout_keeps_partial_progress() {
        let target = WaitTarget::primary_only("DONE").unwrap();
        let timeout = WaitError::Timeout {
            last: Some(StateSnapshot::new("ACTIVE", "EPILOG")),
            attempts: 100,
            elapsed: Duration::from_secs(10),
            last_error: None,
        };
        let failure = assert_converged(Err(timeout), &target).unwrap_err();
        assert_eq!(failure.observed, Some(StateSnapshot::new("ACTIVE", "EPILOG")));
        assert!(failure.cause.as_ref().is_some_and(WaitError::is_timeout));
        assert!(failure.to_string().contains("ACTIVE/EPILOG"));
    }

    #[test]
    fn test_expect_state_with_stable_source() {
        let mut source = crate::resource::FnSource::new("stable", || {
            Ok(StateSnapshot::primary_only("HOLD"))
        });
        let target = WaitTarget::primary_only("HOLD").unwrap();
        let budget = RetryBudget::new(3, Duration::from_millis(1));
        assert_eq!(
            expect_state(&mut source, &target, &budget).unwrap(),
            StateSnapshot::primary_only("HOLD")
        );
    }
}
