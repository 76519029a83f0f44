//! Convergence waiting over eventually-consistent remote state.
//!
//! The loop is: fetch, compare against the target, stop on a match, stop when
//! the budget is spent, otherwise sleep a constant delay and fetch again.
//! [`ConvergenceTracker`] holds that state machine without doing any I/O so
//! the blocking ([`Waiter`]) and async ([`await_state_async`]) drivers share
//! one set of rules.

use crate::budget::RetryBudget;
use crate::clock::{Clock, SystemClock};
use crate::error::{FetchError, WaitError};
use crate::resource::StateSource;
use crate::snapshot::StateSnapshot;
use crate::target::WaitTarget;
use serde::Serialize;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Successful wait outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Converged {
    pub snapshot: StateSnapshot,
    /// Fetches performed, including the matching one.
    pub attempts: u32,
    pub elapsed: Duration,
    /// Fetches that failed along the way.
    pub transport_errors: u32,
}

/// What the driver should do after an observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Converged(Converged),
    Retry(Duration),
    Failed(WaitError),
}

/// Loop state for one wait.
#[derive(Debug)]
pub struct ConvergenceTracker<'a> {
    target: &'a WaitTarget,
    budget: &'a RetryBudget,
    started: Instant,
    attempts: u32,
    transport_errors: u32,
    consecutive_errors: u32,
    last: Option<StateSnapshot>,
    last_error: Option<FetchError>,
}

impl<'a> ConvergenceTracker<'a> {
    pub fn new(
        target: &'a WaitTarget,
        budget: &'a RetryBudget,
        started: Instant,
    ) -> Result<Self, WaitError> {
        budget.validate()?;
        Ok(Self {
            target,
            budget,
            started,
            attempts: 0,
            transport_errors: 0,
            consecutive_errors: 0,
            last: None,
            last_error: None,
        })
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_snapshot(&self) -> Option<&StateSnapshot> {
        self.last.as_ref()
    }

    /// Record one fetch result taken at `now`.
    pub fn observe(&mut self, fetched: Result<StateSnapshot, FetchError>, now: Instant) -> Step {
        self.attempts += 1;
        let elapsed = now.saturating_duration_since(self.started);

        match fetched {
            Ok(snapshot) => {
                self.consecutive_errors = 0;
                if self.target.matches(&snapshot) {
                    return Step::Converged(Converged {
                        snapshot,
                        attempts: self.attempts,
                        elapsed,
                        transport_errors: self.transport_errors,
                    });
                }
                if self.target.should_abort(&snapshot) {
                    return Step::Failed(WaitError::Aborted {
                        snapshot,
                        attempts: self.attempts,
                    });
                }
                self.last = Some(snapshot);
            }
            Err(error) => {
                self.transport_errors += 1;
                self.consecutive_errors += 1;
                if !self.budget.transport.allows(&error, self.consecutive_errors) {
                    return Step::Failed(WaitError::Transport {
                        source: error,
                        attempts: self.attempts,
                        last: self.last.take(),
                    });
                }
                self.last_error = Some(error);
            }
        }

        if self.attempts >= self.budget.max_attempts || self.budget.deadline_passed(elapsed) {
            return Step::Failed(WaitError::Timeout {
                last: self.last.take(),
                attempts: self.attempts,
                elapsed,
                last_error: self.last_error.take(),
            });
        }

        Step::Retry(self.budget.next_delay(elapsed))
    }
}

/// Blocking convergence waiter.
#[derive(Debug, Clone)]
pub struct Waiter<C: Clock = SystemClock> {
    budget: RetryBudget,
    clock: C,
}

impl Waiter<SystemClock> {
    pub fn new(budget: RetryBudget) -> Self {
        Self {
            budget,
            clock: SystemClock,
        }
    }
}

impl Default for Waiter<SystemClock> {
    fn default() -> Self {
        Self::new(RetryBudget::default())
    }
}

impl<C: Clock> Waiter<C> {
    pub fn with_clock<D: Clock>(self, clock: D) -> Waiter<D> {
        Waiter {
            budget: self.budget,
            clock,
        }
    }

    pub fn budget(&self) -> &RetryBudget {
        &self.budget
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Block until `source` reaches `target` or the budget runs out.
    pub fn await_state<S: StateSource + ?Sized>(
        &self,
        source: &mut S,
        target: &WaitTarget,
    ) -> Result<Converged, WaitError> {
        await_state_with(source, target, &self.budget, &self.clock)
    }
}

/// [`Waiter::await_state`] on the system clock.
pub fn await_state<S: StateSource + ?Sized>(
    source: &mut S,
    target: &WaitTarget,
    budget: &RetryBudget,
) -> Result<Converged, WaitError> {
    await_state_with(source, target, budget, &SystemClock)
}

/// Blocking wait driven by an explicit clock.
pub fn await_state_with<S: StateSource + ?Sized, C: Clock + ?Sized>(
    source: &mut S,
    target: &WaitTarget,
    budget: &RetryBudget,
    clock: &C,
) -> Result<Converged, WaitError> {
    let resource = source.describe();
    let mut tracker = ConvergenceTracker::new(target, budget, clock.now())?;
    debug!(
        %resource,
        %target,
        max_attempts = budget.max_attempts,
        delay_ms = budget.delay.as_millis() as u64,
        "Waiting for state"
    );

    loop {
        let fetched = source.fetch();
        log_observation(&resource, tracker.attempts() + 1, &fetched);
        match tracker.observe(fetched, clock.now()) {
            Step::Converged(done) => {
                log_converged(&resource, target, &done);
                return Ok(done);
            }
            Step::Retry(delay) => clock.sleep(delay),
            Step::Failed(err) => {
                log_failed(&resource, target, &err);
                return Err(err);
            }
        }
    }
}

/// Async wait; `fetch` is called once per attempt.
pub async fn await_state_async<F, Fut>(
    resource: &str,
    target: &WaitTarget,
    budget: &RetryBudget,
    mut fetch: F,
) -> Result<Converged, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<StateSnapshot, FetchError>>,
{
    let started = tokio::time::Instant::now().into_std();
    let mut tracker = ConvergenceTracker::new(target, budget, started)?;
    debug!(resource, %target, max_attempts = budget.max_attempts, "Waiting for state (async)");

    loop {
        let fetched = fetch().await;
        log_observation(resource, tracker.attempts() + 1, &fetched);
        match tracker.observe(fetched, tokio::time::Instant::now().into_std()) {
            Step::Converged(done) => {
                log_converged(resource, target, &done);
                return Ok(done);
            }
            Step::Retry(delay) => tokio::time::sleep(delay).await,
            Step::Failed(err) => {
                log_failed(resource, target, &err);
                return Err(err);
            }
        }
    }
}

fn log_observation(resource: &str, attempt: u32, fetched: &Result<StateSnapshot, FetchError>) {
    match fetched {
        Ok(snapshot) => debug!(resource, attempt, state = %snapshot, "Fetched state"),
        Err(err) => warn!(resource, attempt, error = %err, "State fetch failed"),
    }
}

fn log_converged(resource: &str, target: &WaitTarget, done: &Converged) {
    info!(
        resource,
        %target,
        attempts = done.attempts,
        elapsed_ms = done.elapsed.as_millis() as u64,
        "State converged"
    );
}

fn log_failed(resource: &str, target: &WaitTarget, err: &WaitError) {
    warn!(resource, %target, attempts = err.attempts(), error = %err, "Wait did not converge");
}
