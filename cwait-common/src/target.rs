//! Convergence goals.

use crate::error::TargetError;
use crate::snapshot::{ACTIVE_STATE, NO_SUB_STATE, StateSnapshot, is_placeholder};
use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// Abort pattern used by [`WaitTarget::with_default_abort`].
pub const DEFAULT_ABORT_PATTERN: &str = "FAIL";

/// The (primary, secondary) pair a wait converges on.
///
/// The secondary label is only compared when the primary is [`ACTIVE_STATE`].
#[derive(Debug, Clone)]
pub struct WaitTarget {
    primary: String,
    secondary: String,
    abort: Option<Regex>,
}

impl WaitTarget {
    /// An `ACTIVE` primary needs a real sub-state; any other primary ignores it.
    pub fn new(
        primary: impl Into<String>,
        secondary: impl Into<String>,
    ) -> Result<Self, TargetError> {
        let primary = primary.into();
        if primary.trim().is_empty() {
            return Err(TargetError::EmptyPrimary);
        }
        let secondary = secondary.into();
        if primary == ACTIVE_STATE && is_placeholder(secondary.trim()) {
            return Err(TargetError::MissingSubState);
        }
        Ok(Self {
            primary,
            secondary,
            abort: None,
        })
    }

    /// Target on a primary state only.
    pub fn primary_only(primary: impl Into<String>) -> Result<Self, TargetError> {
        Self::new(primary, NO_SUB_STATE)
    }

    /// `ACTIVE` with the given sub-state.
    pub fn active(secondary: impl Into<String>) -> Self {
        Self {
            primary: ACTIVE_STATE.to_string(),
            secondary: secondary.into(),
            abort: None,
        }
    }

    /// Stop waiting as soon as the visible state label matches `pattern`.
    pub fn abort_on(mut self, pattern: &str) -> Result<Self, TargetError> {
        let regex = Regex::new(pattern).map_err(|e| TargetError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        self.abort = Some(regex);
        Ok(self)
    }

    /// Abort on any state containing `FAIL`.
    pub fn with_default_abort(self) -> Self {
        // A plain literal always compiles.
        Self {
            abort: Regex::new(DEFAULT_ABORT_PATTERN).ok(),
            ..self
        }
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn secondary(&self) -> &str {
        &self.secondary
    }

    pub fn abort_pattern(&self) -> Option<&str> {
        self.abort.as_ref().map(Regex::as_str)
    }

    /// Whether the secondary label takes part in matching.
    pub fn checks_secondary(&self) -> bool {
        self.primary == ACTIVE_STATE
    }

    /// Convergence predicate.
    pub fn matches(&self, snapshot: &StateSnapshot) -> bool {
        snapshot.primary() == self.primary
            && (!self.checks_secondary() || snapshot.secondary() == self.secondary)
    }

    /// Whether a non-matching snapshot should end the wait early.
    pub fn should_abort(&self, snapshot: &StateSnapshot) -> bool {
        match &self.abort {
            Some(regex) => !self.matches(snapshot) && regex.is_match(snapshot.effective_label()),
            None => false,
        }
    }
}

impl fmt::Display for WaitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.checks_secondary() {
            write!(f, "{}/{}", self.primary, self.secondary)
        } else {
            write!(f, "{}", self.primary)
        }
    }
}

/// Parses `PRIMARY` or `PRIMARY/SECONDARY`.
impl FromStr for WaitTarget {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((primary, secondary)) => Self::new(primary.trim(), secondary.trim()),
            None => Self::primary_only(s.trim()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_primary_rejected() {
        assert_eq!(
            WaitTarget::new("", "RUNNING").unwrap_err(),
            TargetError::EmptyPrimary
        );
        assert_eq!(
            WaitTarget::primary_only("   ").unwrap_err(),
            TargetError::EmptyPrimary
        );
    }

    #[test]
    fn test_non_active_ignores_secondary() {
        let target = WaitTarget::new("DONE", "-").unwrap();
        assert!(target.matches(&StateSnapshot::new("DONE", "-")));
        assert!(target.matches(&StateSnapshot::new("DONE", "LCM_INIT")));
        assert!(target.matches(&StateSnapshot::new("DONE", "")));
        assert!(!target.matches(&StateSnapshot::new("ACTIVE", "RUNNING")));
    }

    #[test]
    fn test_active_requires_both_labels() {
        let target = WaitTarget::active("RUNNING");
        assert!(target.matches(&StateSnapshot::new("ACTIVE", "RUNNING")));
        assert!(!target.matches(&StateSnapshot::new("ACTIVE", "POWEROFF")));
        assert!(!target.matches(&StateSnapshot::new("ACTIVE", "BOOT")));
        assert!(!target.matches(&StateSnapshot::new("RUNNING", "RUNNING")));
    }

    #[test]
    fn test_poweroff_with_empty_secondary() {
        let target = WaitTarget::new("POWEROFF", "").unwrap();
        assert!(target.matches(&StateSnapshot::new("POWEROFF", "LCM_INIT")));
    }

    #[test]
    fn test_parse_target() {
        let target: WaitTarget = "ACTIVE/RUNNING".parse().unwrap();
        assert_eq!(target.primary(), "ACTIVE");
        assert_eq!(target.secondary(), "RUNNING");
        assert_eq!(target.to_string(), "ACTIVE/RUNNING");

        let target: WaitTarget = "HOLD".parse().unwrap();
        assert_eq!(target.secondary(), NO_SUB_STATE);
        assert_eq!(target.to_string(), "HOLD");

        assert!("/RUNNING".parse::<WaitTarget>().is_err());
    }

    #[test]
    fn test_active_without_sub_state_rejected() {
        for raw in ["ACTIVE", "ACTIVE/", "ACTIVE/-", " ACTIVE / "] {
            assert_eq!(
                raw.parse::<WaitTarget>().unwrap_err(),
                TargetError::MissingSubState,
                "{raw}"
            );
        }
        assert_eq!(
            WaitTarget::new(ACTIVE_STATE, "").unwrap_err(),
            TargetError::MissingSubState
        );
        assert_eq!(
            WaitTarget::primary_only(ACTIVE_STATE).unwrap_err(),
            TargetError::MissingSubState
        );
        assert!(WaitTarget::new(ACTIVE_STATE, "RUNNING").is_ok());
    }

    #[test]
    fn test_default_abort_pattern() {
        let target = WaitTarget::active("RUNNING").with_default_abort();
        assert_eq!(target.abort_pattern(), Some(DEFAULT_ABORT_PATTERN));
        assert!(target.should_abort(&StateSnapshot::new("ACTIVE", "BOOT_FAILURE")));
        assert!(target.should_abort(&StateSnapshot::primary_only("FAILED")));
        assert!(!target.should_abort(&StateSnapshot::new("ACTIVE", "PROLOG")));
        assert!(!target.should_abort(&StateSnapshot::primary_only("PENDING")));
    }

    #[test]
    fn test_abort_never_fires_on_match() {
        let target = WaitTarget::active("FAILURE").with_default_abort();
        assert!(!target.should_abort(&StateSnapshot::new("ACTIVE", "FAILURE")));
    }

    #[test]
    fn test_abort_pattern_only_sees_effective_label() {
        // Stale sub-state on an inactive resource must not trigger the abort.
        let target = WaitTarget::primary_only("DONE")
            .unwrap()
            .with_default_abort();
        assert!(!target.should_abort(&StateSnapshot::new("POWEROFF", "BOOT_FAILURE")));
    }

    #[test]
    fn test_invalid_abort_pattern() {
        let err = WaitTarget::active("RUNNING").abort_on("(").unwrap_err();
        assert!(matches!(err, TargetError::InvalidPattern { .. }));
    }

    #[test]
    fn test_no_abort_without_pattern() {
        let target = WaitTarget::active("RUNNING");
        assert!(target.abort_pattern().is_none());
        assert!(!target.should_abort(&StateSnapshot::new("ACTIVE", "BOOT_FAILURE")));
    }
}
