//! Error taxonomy for fetching and waiting.
//!
//! Fetch failures, non-convergence and caller-level assertion failures are
//! kept as separate kinds so a caller can apply a different policy to each.

use crate::snapshot::StateSnapshot;
use std::time::Duration;

/// Errors from a single state fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("remote call failed: {0}")]
    Rpc(String),

    #[error("malformed entity document: {0}")]
    Protocol(String),

    #[error("resource handle was invalidated")]
    Invalidated,
}

impl FetchError {
    /// Whether another round trip could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Invalid wait target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("target primary state must not be empty")]
    EmptyPrimary,

    #[error("target state ACTIVE needs a sub-state, e.g. ACTIVE/RUNNING")]
    MissingSubState,

    #[error("invalid abort pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Invalid retry budget.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BudgetError {
    #[error("max_attempts must be positive")]
    ZeroAttempts,

    #[error("delay must be positive")]
    ZeroDelay,

    #[error("deadline must be positive")]
    ZeroDeadline,
}

/// Reasons a wait ended without convergence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    #[error(
        "timed out after {attempts} attempts ({elapsed:?}); last state: {}",
        describe_last(.last)
    )]
    Timeout {
        last: Option<StateSnapshot>,
        attempts: u32,
        elapsed: Duration,
        last_error: Option<FetchError>,
    },

    #[error("fetch failed after {attempts} attempts: {source}")]
    Transport {
        #[source]
        source: FetchError,
        attempts: u32,
        last: Option<StateSnapshot>,
    },

    #[error("aborted at attempt {attempts}: state {snapshot} matches abort pattern")]
    Aborted {
        snapshot: StateSnapshot,
        attempts: u32,
    },

    #[error("invalid retry budget: {0}")]
    InvalidBudget(#[from] BudgetError),
}

impl WaitError {
    /// Last snapshot observed before the wait stopped, if any.
    pub fn last_snapshot(&self) -> Option<&StateSnapshot> {
        match self {
            Self::Timeout { last, .. } | Self::Transport { last, .. } => last.as_ref(),
            Self::Aborted { snapshot, .. } => Some(snapshot),
            Self::InvalidBudget(_) => None,
        }
    }

    /// Number of fetches performed before the wait stopped.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Timeout { attempts, .. }
            | Self::Transport { attempts, .. }
            | Self::Aborted { attempts, .. } => *attempts,
            Self::InvalidBudget(_) => 0,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

fn describe_last(last: &Option<StateSnapshot>) -> String {
    match last {
        Some(snapshot) => snapshot.to_string(),
        None => "never fetched".to_string(),
    }
}

/// Caller-level mismatch between a wait outcome and its target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected state {expected}, observed {}", describe_last(.observed))]
pub struct AssertionFailure {
    pub expected: String,
    pub observed: Option<StateSnapshot>,
    #[source]
    pub cause: Option<WaitError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::Transport("connection reset".into()).is_transient());
        assert!(!FetchError::Rpc("[one.vm.info] Error getting VM".into()).is_transient());
        assert!(!FetchError::Protocol("missing VM/STATE".into()).is_transient());
        assert!(!FetchError::Invalidated.is_transient());
    }

    #[test]
    fn test_timeout_display_includes_last_state() {
        let err = WaitError::Timeout {
            last: Some(StateSnapshot::new("ACTIVE", "RUNNING")),
            attempts: 5,
            elapsed: Duration::from_millis(500),
            last_error: None,
        };
        let display = err.to_string();
        assert!(display.contains("5 attempts"));
        assert!(display.contains("ACTIVE/RUNNING"));
    }

    #[test]
    fn test_timeout_display_without_snapshot() {
        let err = WaitError::Timeout {
            last: None,
            attempts: 2,
            elapsed: Duration::ZERO,
            last_error: Some(FetchError::Transport("refused".into())),
        };
        assert!(err.to_string().contains("never fetched"));
        assert!(err.last_snapshot().is_none());
    }

    #[test]
    fn test_accessors() {
        let aborted = WaitError::Aborted {
            snapshot: StateSnapshot::new("ACTIVE", "BOOT_FAILURE"),
            attempts: 3,
        };
        assert_eq!(aborted.attempts(), 3);
        assert_eq!(aborted.last_snapshot().unwrap().secondary(), "BOOT_FAILURE");
        assert!(!aborted.is_timeout());

        let budget: WaitError = BudgetError::ZeroAttempts.into();
        assert_eq!(budget.attempts(), 0);
        assert!(budget.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_transport_error_source_chain() {
        use std::error::Error as _;
        let err = WaitError::Transport {
            source: FetchError::Transport("timeout".into()),
            attempts: 4,
            last: None,
        };
        let source = err.source().expect("transport error has a source");
        assert!(source.to_string().contains("timeout"));
    }

    #[test]
    fn test_assertion_failure_display() {
        let failure = AssertionFailure {
            expected: "DONE".into(),
            observed: Some(StateSnapshot::new("ACTIVE", "RUNNING")),
            cause: None,
        };
        assert_eq!(
            failure.to_string(),
            "expected state DONE, observed ACTIVE/RUNNING"
        );
    }
}
