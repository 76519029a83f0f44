//! Wait configuration: built-in defaults, a TOML file, then the environment.
//!
//! ```toml
//! log_level = "debug"
//!
//! [defaults]
//! max_attempts = 100
//! delay = "100ms"
//! transport = "tolerate"
//! max_consecutive_errors = 3
//!
//! [kinds.image]
//! max_attempts = 600
//! delay = "1s"
//! deadline = "10m"
//! ```

use super::env::{EnvError, EnvParser, parse_transport};
use super::source::Sourced;
use crate::budget::{
    DEFAULT_MAX_CONSECUTIVE_ERRORS, RetryBudget, TransportPolicy, duration_serde,
};
use crate::error::BudgetError;
use crate::resource::ResourceKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{path}: unknown resource kind '{kind}'")]
    UnknownKind { path: PathBuf, kind: String },

    #[error("{path}: invalid transport policy '{value}'")]
    InvalidTransport { path: PathBuf, value: String },

    #[error("invalid budget for {scope}: {source}")]
    InvalidBudget {
        scope: String,
        #[source]
        source: BudgetError,
    },

    #[error("invalid environment: {}", join_env_errors(.0))]
    Env(Vec<EnvError>),
}

fn join_env_errors(errors: &[EnvError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// One budget section as written in the file; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetOverride {
    pub max_attempts: Option<u32>,
    #[serde(default, with = "duration_serde::option")]
    pub delay: Option<Duration>,
    #[serde(default, with = "duration_serde::option")]
    pub deadline: Option<Duration>,
    pub transport: Option<String>,
    pub max_consecutive_errors: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    log_level: Option<String>,
    #[serde(default)]
    defaults: BudgetOverride,
    #[serde(default)]
    kinds: HashMap<String, BudgetOverride>,
}

/// Budget fields with their origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSettings {
    pub max_attempts: Sourced<u32>,
    pub delay: Sourced<Duration>,
    pub deadline: Sourced<Option<Duration>>,
    pub transport: Sourced<TransportPolicy>,
}

impl Default for BudgetSettings {
    fn default() -> Self {
        let budget = RetryBudget::default();
        Self {
            max_attempts: Sourced::default_value(budget.max_attempts),
            delay: Sourced::default_value(budget.delay),
            deadline: Sourced::default_value(budget.deadline),
            transport: Sourced::default_value(budget.transport),
        }
    }
}

impl BudgetSettings {
    pub fn budget(&self) -> RetryBudget {
        RetryBudget {
            max_attempts: self.max_attempts.value,
            delay: self.delay.value,
            deadline: self.deadline.value,
            transport: self.transport.value,
        }
    }

    fn apply_file(&mut self, section: &BudgetOverride, path: &Path) -> Result<(), ConfigError> {
        if let Some(n) = section.max_attempts {
            self.max_attempts = Sourced::from_file(n, path);
        }
        if let Some(d) = section.delay {
            self.delay = Sourced::from_file(d, path);
        }
        if let Some(d) = section.deadline {
            self.deadline = Sourced::from_file(Some(d), path);
        }
        let max_consecutive = section
            .max_consecutive_errors
            .or_else(|| tolerated(&self.transport.value))
            .unwrap_or(DEFAULT_MAX_CONSECUTIVE_ERRORS);
        match &section.transport {
            Some(raw) => {
                let policy = parse_transport(raw, max_consecutive).ok_or_else(|| {
                    ConfigError::InvalidTransport {
                        path: path.to_path_buf(),
                        value: raw.clone(),
                    }
                })?;
                self.transport = Sourced::from_file(policy, path);
            }
            None if section.max_consecutive_errors.is_some() => {
                self.transport = Sourced::from_file(
                    TransportPolicy::Tolerate { max_consecutive },
                    path,
                );
            }
            None => {}
        }
        Ok(())
    }

    fn apply_env(&mut self, overlay: &EnvOverlay) {
        if let Some(v) = &overlay.max_attempts {
            self.max_attempts = v.clone();
        }
        if let Some(v) = &overlay.delay {
            self.delay = v.clone();
        }
        if let Some(v) = &overlay.deadline {
            self.deadline = Sourced {
                value: Some(v.value),
                source: v.source.clone(),
                env_var: v.env_var.clone(),
            };
        }
        if let Some(v) = &overlay.transport {
            self.transport = v.clone();
        } else if let Some(n) = &overlay.max_consecutive {
            self.transport = Sourced {
                value: TransportPolicy::Tolerate {
                    max_consecutive: n.value,
                },
                source: n.source.clone(),
                env_var: n.env_var.clone(),
            };
        }
    }
}

fn tolerated(policy: &TransportPolicy) -> Option<u32> {
    match policy {
        TransportPolicy::Tolerate { max_consecutive } => Some(*max_consecutive),
        _ => None,
    }
}

/// Values read from `CWAIT_*` variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverlay {
    pub max_attempts: Option<Sourced<u32>>,
    pub delay: Option<Sourced<Duration>>,
    pub deadline: Option<Sourced<Duration>>,
    pub transport: Option<Sourced<TransportPolicy>>,
    pub max_consecutive: Option<Sourced<u32>>,
    pub log_level: Option<Sourced<String>>,
}

impl EnvOverlay {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut parser = EnvParser::new();
        let max_consecutive = parser.get_u32_range("MAX_CONSECUTIVE_ERRORS", 0, 100_000);
        let tolerate = max_consecutive
            .as_ref()
            .map_or(DEFAULT_MAX_CONSECUTIVE_ERRORS, |n| n.value);
        let level = parser.get_log_level("LOG_LEVEL", DEFAULT_LOG_LEVEL);
        let overlay = Self {
            max_attempts: parser.get_u32_range("MAX_ATTEMPTS", 1, u32::MAX),
            delay: parser.get_duration("DELAY"),
            deadline: parser.get_duration("DEADLINE"),
            transport: parser.get_transport("TRANSPORT", tolerate),
            max_consecutive,
            log_level: (!level.is_default()).then_some(level),
        };
        if parser.has_errors() {
            return Err(ConfigError::Env(parser.take_errors()));
        }
        Ok(overlay)
    }
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaitConfig {
    /// File the values were read from, if one was found.
    pub path: Option<PathBuf>,
    pub log_level: Sourced<String>,
    pub defaults: BudgetSettings,
    pub kinds: BTreeMap<ResourceKind, BudgetSettings>,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            path: None,
            log_level: Sourced::default_value(DEFAULT_LOG_LEVEL.to_string()),
            defaults: BudgetSettings::default(),
            kinds: BTreeMap::new(),
        }
    }
}

impl WaitConfig {
    /// Parse file contents; `path` is only used for source tracking.
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        };
        if let Some(level) = file.log_level {
            config.log_level = Sourced::from_file(level.to_lowercase(), path);
        }
        config.defaults.apply_file(&file.defaults, path)?;

        for (name, section) in &file.kinds {
            let kind: ResourceKind = name.parse().map_err(|_| ConfigError::UnknownKind {
                path: path.to_path_buf(),
                kind: name.clone(),
            })?;
            let mut settings = config.defaults.clone();
            settings.apply_file(section, path)?;
            config.kinds.insert(kind, settings);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw, path)
    }

    /// Overlay environment values on the defaults and every kind section.
    pub fn apply_env(&mut self, overlay: &EnvOverlay) {
        if let Some(level) = &overlay.log_level {
            self.log_level = level.clone();
        }
        self.defaults.apply_env(overlay);
        for settings in self.kinds.values_mut() {
            settings.apply_env(overlay);
        }
    }

    /// Load from `explicit`, `$CWAIT_CONFIG`, or the user config directory,
    /// then apply the environment.
    ///
    /// A missing file is an error only when its path was given explicitly.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let overlay = EnvOverlay::from_env()?;
        let mut parser = EnvParser::new();
        let from_env = parser.get_optional_string("CONFIG").map(|s| PathBuf::from(s.value));

        let mut config = match (explicit.map(Path::to_path_buf).or(from_env), default_path()) {
            (Some(path), _) => Self::load(&path)?,
            (None, Some(path)) if path.is_file() => Self::load(&path)?,
            (None, _) => Self::default(),
        };
        config.apply_env(&overlay);
        config.validate()?;
        debug!(path = ?config.path, "Resolved wait configuration");
        Ok(config)
    }

    pub fn settings_for(&self, kind: Option<ResourceKind>) -> &BudgetSettings {
        kind.and_then(|k| self.kinds.get(&k))
            .unwrap_or(&self.defaults)
    }

    /// Effective budget for one resource kind.
    pub fn budget_for(&self, kind: Option<ResourceKind>) -> RetryBudget {
        self.settings_for(kind).budget()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.defaults
            .budget()
            .validate()
            .map_err(|source| ConfigError::InvalidBudget {
                scope: "defaults".to_string(),
                source,
            })?;
        for (kind, settings) in &self.kinds {
            settings
                .budget()
                .validate()
                .map_err(|source| ConfigError::InvalidBudget {
                    scope: format!("kinds.{kind}"),
                    source,
                })?;
        }
        Ok(())
    }
}

/// `<config dir>/cwait/config.toml`.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("cwait").join(CONFIG_FILE_NAME))
}
