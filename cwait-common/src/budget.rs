//! Retry budgets for convergence waits.
//!
//! A budget bounds a wait by attempt count and, optionally, by a wall-clock
//! deadline. The delay between attempts is constant; there is no backoff.
//! Fetch failures are governed by a separate [`TransportPolicy`].

use crate::error::{BudgetError, FetchError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of fetches per wait.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;

/// Default delay between fetches.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(100);

/// Default number of consecutive transient fetch failures tolerated.
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 3;

/// How fetch failures interact with the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportPolicy {
    /// A failed fetch is a non-matching observation and consumes an attempt.
    CountAsAttempt,
    /// Any failed fetch ends the wait.
    FailFast,
    /// Transient failures consume attempts until `max_consecutive` of them
    /// happen in a row; non-transient failures end the wait.
    Tolerate { max_consecutive: u32 },
}

impl Default for TransportPolicy {
    fn default() -> Self {
        Self::Tolerate {
            max_consecutive: DEFAULT_MAX_CONSECUTIVE_ERRORS,
        }
    }
}

impl TransportPolicy {
    /// Whether the wait may continue after `error`, given how many failures
    /// (including this one) have happened back to back.
    pub fn allows(&self, error: &FetchError, consecutive: u32) -> bool {
        match self {
            Self::CountAsAttempt => true,
            Self::FailFast => false,
            Self::Tolerate { max_consecutive } => {
                error.is_transient() && consecutive <= *max_consecutive
            }
        }
    }
}

/// Bounds for one wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryBudget {
    /// Maximum fetches, including the first.
    pub max_attempts: u32,
    /// Constant delay between fetches.
    #[serde(with = "duration_serde")]
    pub delay: Duration,
    /// Optional wall-clock ceiling measured from the first fetch.
    #[serde(default, with = "duration_serde::option")]
    pub deadline: Option<Duration>,
    #[serde(default)]
    pub transport: TransportPolicy,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_DELAY,
            deadline: None,
            transport: TransportPolicy::default(),
        }
    }
}

impl RetryBudget {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            ..Self::default()
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_transport(mut self, transport: TransportPolicy) -> Self {
        self.transport = transport;
        self
    }

    pub fn validate(&self) -> Result<(), BudgetError> {
        if self.max_attempts == 0 {
            return Err(BudgetError::ZeroAttempts);
        }
        if self.delay.is_zero() {
            return Err(BudgetError::ZeroDelay);
        }
        if self.deadline.is_some_and(|d| d.is_zero()) {
            return Err(BudgetError::ZeroDeadline);
        }
        Ok(())
    }

    /// Upper bound on time spent sleeping, ignoring fetch latency.
    pub fn ceiling(&self) -> Duration {
        let sleeps = self.max_attempts.saturating_sub(1);
        let by_attempts = self.delay.saturating_mul(sleeps);
        match self.deadline {
            Some(deadline) => by_attempts.min(deadline),
            None => by_attempts,
        }
    }

    /// Delay before the next fetch, clipped so it never overshoots the deadline.
    pub fn next_delay(&self, elapsed: Duration) -> Duration {
        match self.deadline {
            Some(deadline) => self.delay.min(deadline.saturating_sub(elapsed)),
            None => self.delay,
        }
    }

    /// Whether the deadline (if any) has been reached.
    pub fn deadline_passed(&self, elapsed: Duration) -> bool {
        self.deadline.is_some_and(|deadline| elapsed >= deadline)
    }
}

/// Serde helpers for humantime strings (`"100ms"`, `"2m"`).
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(d) => super::serialize(d, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            raw.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
