//! Property tests for the convergence predicate and the attempt accounting.

use cwait_common::testing::ScriptedSource;
use cwait_common::{
    ACTIVE_STATE, ManualClock, RetryBudget, StateSnapshot, WaitTarget, await_state_with,
};
use proptest::prelude::*;
use std::time::Duration;

fn label() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(ACTIVE_STATE.to_string()),
        Just("-".to_string()),
        "[A-Z_]{1,12}",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_non_active_targets_ignore_secondary(
        primary in "[A-Z_]{1,12}",
        sub_a in label(),
        sub_b in label(),
    ) {
        prop_assume!(primary != ACTIVE_STATE);
        let target = WaitTarget::primary_only(primary.clone()).unwrap();
        prop_assert!(target.matches(&StateSnapshot::new(primary.clone(), sub_a)));
        prop_assert!(target.matches(&StateSnapshot::new(primary, sub_b)));
    }

    #[test]
    fn test_active_targets_require_exact_secondary(
        wanted in "[A-Z_]{1,12}",
        seen in "[A-Z_]{1,12}",
    ) {
        let target = WaitTarget::active(wanted.clone());
        let snapshot = StateSnapshot::new(ACTIVE_STATE, seen.clone());
        prop_assert_eq!(target.matches(&snapshot), wanted == seen);
    }

    #[test]
    fn test_abort_never_fires_on_a_match(secondary in "[A-Z_]{0,6}FAIL[A-Z_]{0,6}") {
        let target = WaitTarget::active(secondary.clone()).with_default_abort();
        let snapshot = StateSnapshot::new(ACTIVE_STATE, secondary);
        prop_assert!(target.matches(&snapshot));
        prop_assert!(!target.should_abort(&snapshot));
    }

    #[test]
    fn test_target_round_trips_through_display(
        primary in "[A-Z_]{1,12}",
        secondary in "[A-Z_]{1,12}",
    ) {
        let target = WaitTarget::active(secondary);
        let parsed: WaitTarget = target.to_string().parse().unwrap();
        prop_assert_eq!(parsed.to_string(), target.to_string());

        prop_assume!(primary != ACTIVE_STATE);
        let plain = WaitTarget::primary_only(primary.clone()).unwrap();
        prop_assert_eq!(plain.to_string(), primary);
    }

    #[test]
    fn test_converges_on_first_matching_fetch(
        max_attempts in 1u32..40,
        lead in 0usize..60,
    ) {
        let mut source = ScriptedSource::new("props")
            .then_repeat("PENDING", "-", lead)
            .then_state(ACTIVE_STATE, "RUNNING");
        let clock = ManualClock::new();
        let budget = RetryBudget::new(max_attempts, Duration::from_millis(100));
        let result = await_state_with(&mut source, &WaitTarget::active("RUNNING"), &budget, &clock);

        let needed = lead as u32 + 1;
        if needed <= max_attempts {
            let done = result.unwrap();
            prop_assert_eq!(done.attempts, needed);
            prop_assert_eq!(source.fetches(), needed);
        } else {
            let err = result.unwrap_err();
            prop_assert!(err.is_timeout());
            prop_assert_eq!(source.fetches(), max_attempts);
        }
        prop_assert_eq!(clock.sleep_count(), source.fetches() - 1);
        prop_assert!(clock.elapsed() <= budget.ceiling());
    }

    #[test]
    fn test_deadline_bounds_simulated_time(
        delay_ms in 1u64..500,
        deadline_ms in 1u64..5_000,
    ) {
        let mut source = ScriptedSource::from_states(&[("PENDING", "-")]);
        let clock = ManualClock::new();
        let budget = RetryBudget::new(10_000, Duration::from_millis(delay_ms))
            .with_deadline(Duration::from_millis(deadline_ms));
        let err = await_state_with(&mut source, &WaitTarget::active("RUNNING"), &budget, &clock)
            .unwrap_err();
        prop_assert!(err.is_timeout());
        prop_assert_eq!(clock.elapsed(), Duration::from_millis(deadline_ms));
    }
}
