//! `cwait config`: show the resolved configuration and where each value came from.

use anyhow::Result;
use cwait_common::config::{BudgetSettings, Sourced};
use cwait_common::{TransportPolicy, WaitConfig};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub scope: String,
    pub key: &'static str,
    pub value: String,
    pub source: String,
}

fn row<T>(
    scope: &str,
    key: &'static str,
    value: &Sourced<T>,
    render: impl Fn(&T) -> String,
) -> Row {
    let source = match &value.env_var {
        Some(var) => format!("env:{var}"),
        None => value.source.to_string(),
    };
    Row {
        scope: scope.to_string(),
        key,
        value: render(&value.value),
        source,
    }
}

fn duration(d: &Duration) -> String {
    humantime::format_duration(*d).to_string()
}

fn transport(policy: &TransportPolicy) -> String {
    match policy {
        TransportPolicy::CountAsAttempt => "count".to_string(),
        TransportPolicy::FailFast => "fail-fast".to_string(),
        TransportPolicy::Tolerate { max_consecutive } => format!("tolerate({max_consecutive})"),
    }
}

fn budget_rows(scope: &str, settings: &BudgetSettings) -> Vec<Row> {
    vec![
        row(scope, "max_attempts", &settings.max_attempts, u32::to_string),
        row(scope, "delay", &settings.delay, duration),
        row(scope, "deadline", &settings.deadline, |d| {
            d.as_ref().map_or_else(|| "none".to_string(), duration)
        }),
        row(scope, "transport", &settings.transport, transport),
    ]
}

pub fn rows(config: &WaitConfig) -> Vec<Row> {
    let mut rows = vec![row("", "log_level", &config.log_level, String::clone)];
    rows.extend(budget_rows("defaults", &config.defaults));
    for (kind, settings) in &config.kinds {
        rows.extend(budget_rows(&format!("kinds.{kind}"), settings));
    }
    rows
}

pub fn run(config: &WaitConfig, json: bool) -> Result<()> {
    let rows = rows(config);
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    match &config.path {
        Some(path) => println!("# config file: {}", path.display()),
        None => println!("# config file: none"),
    }
    for r in &rows {
        let key = if r.scope.is_empty() {
            r.key.to_string()
        } else {
            format!("{}.{}", r.scope, r.key)
        };
        println!("{key:<28} {:<16} ({})", r.value, r.source);
    }
    Ok(())
}
