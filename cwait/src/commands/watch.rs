//! `cwait watch`: poll a command until the entity reaches a state.

use crate::probe::CommandProbe;
use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use cwait_common::budget::DEFAULT_MAX_CONSECUTIVE_ERRORS;
use cwait_common::{
    Converged, ResourceKind, RetryBudget, StateMapping, StateSnapshot, TransportPolicy,
    WaitConfig, WaitError, WaitTarget, await_state_async,
};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

pub const EXIT_TIMEOUT: i32 = 2;
pub const EXIT_ABORTED: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MappingKind {
    /// `VM/STATE` and `VM/LCM_STATE` with numeric decoding
    Vm,
    /// `IMAGE/STATE` with numeric decoding
    Image,
    /// Labels read verbatim from `--primary-path` / `--secondary-path`
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportArg {
    Count,
    FailFast,
    Tolerate,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Target state, `PRIMARY` or `ACTIVE/SUBSTATE`
    #[arg(short, long)]
    pub state: WaitTarget,

    /// How to read state labels from the command output
    #[arg(long, value_enum, default_value_t = MappingKind::Vm)]
    pub mapping: MappingKind,

    /// Document path of the primary state (raw mapping)
    #[arg(long)]
    pub primary_path: Option<String>,

    /// Document path of the sub-state (raw mapping)
    #[arg(long)]
    pub secondary_path: Option<String>,

    /// Maximum number of fetches
    #[arg(short, long)]
    pub attempts: Option<u32>,

    /// Delay between fetches (e.g. `100ms`, `2s`)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub delay: Option<Duration>,

    /// Overall wall-clock limit (e.g. `5m`)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub deadline: Option<Duration>,

    /// Stop early when the visible state matches this regex (e.g. `FAIL`)
    #[arg(long)]
    pub abort: Option<String>,

    /// Resource kind used to pick per-kind budget overrides
    #[arg(short, long)]
    pub kind: Option<ResourceKind>,

    /// How failed fetches are treated
    #[arg(long, value_enum)]
    pub transport: Option<TransportArg>,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,

    /// Command that prints the entity document as JSON
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

impl WatchArgs {
    fn mapping(&self) -> Result<StateMapping> {
        match self.mapping {
            MappingKind::Vm => Ok(StateMapping::vm()),
            MappingKind::Image => Ok(StateMapping::image()),
            MappingKind::Raw => {
                let Some(primary) = &self.primary_path else {
                    bail!("--mapping raw requires --primary-path");
                };
                Ok(StateMapping::labels(primary.clone(), self.secondary_path.clone()))
            }
        }
    }

    fn kind(&self) -> Option<ResourceKind> {
        self.kind.or(match self.mapping {
            MappingKind::Vm => Some(ResourceKind::Vm),
            MappingKind::Image => Some(ResourceKind::Image),
            MappingKind::Raw => None,
        })
    }

    /// Configured budget for the kind, with command-line overrides applied.
    fn budget(&self, config: &WaitConfig) -> RetryBudget {
        let mut budget = config.budget_for(self.kind());
        if let Some(n) = self.attempts {
            budget.max_attempts = n;
        }
        if let Some(d) = self.delay {
            budget.delay = d;
        }
        if let Some(d) = self.deadline {
            budget.deadline = Some(d);
        }
        if let Some(t) = self.transport {
            budget.transport = match t {
                TransportArg::Count => TransportPolicy::CountAsAttempt,
                TransportArg::FailFast => TransportPolicy::FailFast,
                TransportArg::Tolerate => match budget.transport {
                    tolerate @ TransportPolicy::Tolerate { .. } => tolerate,
                    _ => TransportPolicy::Tolerate {
                        max_consecutive: DEFAULT_MAX_CONSECUTIVE_ERRORS,
                    },
                },
            };
        }
        budget
    }

    fn target(&self) -> Result<WaitTarget> {
        match &self.abort {
            Some(pattern) => self
                .state
                .clone()
                .abort_on(pattern)
                .context("invalid --abort pattern"),
            None => Ok(self.state.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum Report<'a> {
    Converged {
        state: String,
        #[serde(flatten)]
        detail: &'a Converged,
    },
    Timeout {
        attempts: u32,
        last: Option<&'a StateSnapshot>,
        error: String,
    },
    Aborted {
        attempts: u32,
        last: Option<&'a StateSnapshot>,
        error: String,
    },
    Failed {
        attempts: u32,
        last: Option<&'a StateSnapshot>,
        error: String,
    },
}

impl<'a> Report<'a> {
    fn new(outcome: &'a Result<Converged, WaitError>) -> Self {
        match outcome {
            Ok(done) => Self::Converged {
                state: done.snapshot.to_string(),
                detail: done,
            },
            Err(err @ WaitError::Timeout { .. }) => Self::Timeout {
                attempts: err.attempts(),
                last: err.last_snapshot(),
                error: err.to_string(),
            },
            Err(err @ WaitError::Aborted { .. }) => Self::Aborted {
                attempts: err.attempts(),
                last: err.last_snapshot(),
                error: err.to_string(),
            },
            Err(err) => Self::Failed {
                attempts: err.attempts(),
                last: err.last_snapshot(),
                error: err.to_string(),
            },
        }
    }
}

/// Exit status for a wait outcome.
pub fn exit_code(outcome: &Result<Converged, WaitError>) -> i32 {
    match outcome {
        Ok(_) => 0,
        Err(WaitError::Timeout { .. }) => EXIT_TIMEOUT,
        Err(WaitError::Aborted { .. }) => EXIT_ABORTED,
        Err(_) => 1,
    }
}

pub async fn run(args: WatchArgs, config: &WaitConfig) -> Result<i32> {
    let mapping = args.mapping()?;
    let target = args.target()?;
    let budget = args.budget(config);
    budget.validate().context("invalid retry budget")?;

    let probe = CommandProbe::new(&args.command, mapping).context("invalid command")?;
    let resource = probe.describe();
    debug!(%resource, ?budget, "Starting watch");

    let outcome = await_state_async(&resource, &target, &budget, || probe.fetch()).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&Report::new(&outcome))?);
    } else {
        match &outcome {
            Ok(done) => println!(
                "{} reached {} after {} attempt(s) in {}",
                resource,
                done.snapshot,
                done.attempts,
                humantime::format_duration(round_millis(done.elapsed))
            ),
            Err(err) => eprintln!("{resource}: {err}"),
        }
    }
    Ok(exit_code(&outcome))
}

fn round_millis(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}
