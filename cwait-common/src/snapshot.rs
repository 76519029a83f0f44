//! Point-in-time reads of remote resource state.
//!
//! A [`StateSnapshot`] is only ever produced by an explicit fetch. It is
//! replaced wholesale on every round trip and never merged with an older one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary state under which the secondary (sub-)state is meaningful.
pub const ACTIVE_STATE: &str = "ACTIVE";

/// Placeholder reported as the secondary label when the primary is not active.
pub const NO_SUB_STATE: &str = "-";

/// Primary/secondary state labels observed by one fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateSnapshot {
    primary: String,
    secondary: String,
}

impl StateSnapshot {
    pub fn new(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }

    /// Snapshot with only a primary label (secondary is [`NO_SUB_STATE`]).
    pub fn primary_only(primary: impl Into<String>) -> Self {
        Self::new(primary, NO_SUB_STATE)
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn secondary(&self) -> &str {
        &self.secondary
    }

    /// Whether the primary label is the active sentinel.
    pub fn is_active(&self) -> bool {
        self.primary == ACTIVE_STATE
    }

    /// The label a human would call "the state": the sub-state while active,
    /// the primary state otherwise.
    pub fn effective_label(&self) -> &str {
        if self.is_active() {
            &self.secondary
        } else {
            &self.primary
        }
    }
}

impl fmt::Display for StateSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_active() || !is_placeholder(&self.secondary) {
            write!(f, "{}/{}", self.primary, self.secondary)
        } else {
            write!(f, "{}", self.primary)
        }
    }
}

/// `"-"` and the empty string both mean "no sub-state".
pub fn is_placeholder(label: &str) -> bool {
    label.is_empty() || label == NO_SUB_STATE
}
