//! Environment variable parsing with type safety.
//!
//! Errors are collected rather than returned one at a time so every bad
//! variable can be reported at once.

use super::source::Sourced;
use crate::budget::TransportPolicy;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during environment variable parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    #[error("Invalid duration for {var}: {value}")]
    InvalidDuration { var: String, value: String },

    #[error("Value out of range for {var}: {value} (valid: {min}..={max})")]
    OutOfRange {
        var: String,
        value: String,
        min: String,
        max: String,
    },

    #[error("Invalid log level for {var}: {value}")]
    InvalidLogLevel { var: String, value: String },
}

/// Type-safe environment variable parser.
pub struct EnvParser {
    prefix: &'static str,
    errors: Vec<EnvError>,
}

impl EnvParser {
    /// Create a new parser with the `CWAIT_` prefix.
    pub fn new() -> Self {
        Self::with_prefix("CWAIT_")
    }

    pub fn with_prefix(prefix: &'static str) -> Self {
        Self {
            prefix,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[EnvError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Get a u32 value; `None` when unset or invalid.
    pub fn get_u32_range(&mut self, name: &str, min: u32, max: u32) -> Option<Sourced<u32>> {
        let var_name = self.var_name(name);
        let value = env::var(&var_name).ok()?;
        match value.trim().parse::<u32>() {
            Ok(n) if n >= min && n <= max => Some(Sourced::from_env(n, var_name)),
            Ok(n) => {
                self.errors.push(EnvError::OutOfRange {
                    var: var_name,
                    value: n.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
                None
            }
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "unsigned 32-bit integer".to_string(),
                    value,
                });
                None
            }
        }
    }

    /// Get a humantime duration (`250ms`, `2m`); bare integers are milliseconds.
    pub fn get_duration(&mut self, name: &str) -> Option<Sourced<Duration>> {
        let var_name = self.var_name(name);
        let value = env::var(&var_name).ok()?;
        match parse_duration(&value) {
            Some(d) if !d.is_zero() => Some(Sourced::from_env(d, var_name)),
            _ => {
                self.errors.push(EnvError::InvalidDuration {
                    var: var_name,
                    value,
                });
                None
            }
        }
    }

    /// Get a transport policy name (`count`, `fail-fast`, `tolerate`).
    ///
    /// `tolerate` picks up `max_consecutive` from the caller.
    pub fn get_transport(
        &mut self,
        name: &str,
        max_consecutive: u32,
    ) -> Option<Sourced<TransportPolicy>> {
        let var_name = self.var_name(name);
        let value = env::var(&var_name).ok()?;
        match parse_transport(&value, max_consecutive) {
            Some(policy) => Some(Sourced::from_env(policy, var_name)),
            None => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "count | fail-fast | tolerate".to_string(),
                    value,
                });
                None
            }
        }
    }

    /// Get a log level value with validation.
    pub fn get_log_level(&mut self, name: &str, default: &str) -> Sourced<String> {
        let var_name = self.var_name(name);
        match env::var(&var_name) {
            Ok(value) => {
                let lower = value.to_lowercase();
                match lower.as_str() {
                    "trace" | "debug" | "info" | "warn" | "error" | "off" => {
                        Sourced::from_env(lower, var_name)
                    }
                    _ => {
                        self.errors.push(EnvError::InvalidLogLevel {
                            var: var_name.clone(),
                            value: value.clone(),
                        });
                        Sourced::from_env(default.to_string(), var_name)
                    }
                }
            }
            Err(_) => Sourced::default_value(default.to_string()),
        }
    }

    /// Get an optional string (None if not set or empty).
    pub fn get_optional_string(&mut self, name: &str) -> Option<Sourced<String>> {
        let var_name = self.var_name(name);
        match env::var(&var_name) {
            Ok(value) if value.is_empty() => None,
            Ok(value) => Some(Sourced::from_env(value, var_name)),
            Err(_) => None,
        }
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<u64>() {
        return Some(Duration::from_millis(ms));
    }
    humantime::parse_duration(raw).ok()
}

pub(crate) fn parse_transport(raw: &str, max_consecutive: u32) -> Option<TransportPolicy> {
    match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
        "count" | "count-as-attempt" => Some(TransportPolicy::CountAsAttempt),
        "fail-fast" | "fail" => Some(TransportPolicy::FailFast),
        "tolerate" => Some(TransportPolicy::Tolerate { max_consecutive }),
        _ => None,
    }
}
