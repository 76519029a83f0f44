//! Configuration for waits.
//!
//! Values come from built-in defaults, an optional TOML file, then `CWAIT_*`
//! environment variables, each later layer overriding the earlier one. Every
//! value remembers where it came from.

pub mod env;
pub mod file;
pub mod source;

pub use env::{EnvError, EnvParser};
pub use file::{BudgetOverride, BudgetSettings, ConfigError, EnvOverlay, WaitConfig, default_path};
pub use source::{ConfigSource, Sourced};

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
