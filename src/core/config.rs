//! Configuration for the channel registry and the global log buffer
//!
//! Values come from builder calls or from `KETTLE_*` environment variables.
//! Malformed environment values never fail start-up: they are reported on
//! stderr and replaced by the default.

use super::error::{LogChannelError, Result};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_REGISTRY_SIZE: usize = 10_000;
pub const DEFAULT_PURGE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_LOG_LINES: usize = 5_000;

pub const ENV_MAX_REGISTRY_SIZE: &str = "KETTLE_MAX_LOGGING_REGISTRY_SIZE";
pub const ENV_PURGE_TIMEOUT: &str = "KETTLE_LOGGING_REGISTRY_PURGE_TIMEOUT";
pub const ENV_MAX_LOG_LINES: &str = "KETTLE_MAX_LOG_SIZE_IN_LINES";
pub const ENV_MAX_LOG_TIMEOUT: &str = "KETTLE_MAX_LOG_TIMEOUT_IN_MINUTES";

/// Read and parse an environment variable, substituting `default` when it is
/// missing or cannot be parsed.
pub(crate) fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                eprintln!(
                    "[LOG REGISTRY WARNING] Invalid value '{}' for {}, using default {}",
                    raw, name, default
                );
                default
            }
        },
        _ => default,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Registry size the purge cycle shrinks below; 0 disables size-based purging
    pub max_size: usize,
    /// Interval between purge cycles
    pub purge_timeout: Duration,
    /// Purge-eligible records older than this are purged regardless of size
    pub max_age: Option<Duration>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_REGISTRY_SIZE,
            purge_timeout: DEFAULT_PURGE_TIMEOUT,
            max_age: None,
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let max_size = env_or(ENV_MAX_REGISTRY_SIZE, DEFAULT_MAX_REGISTRY_SIZE);
        let timeout_ms = env_or(ENV_PURGE_TIMEOUT, DEFAULT_PURGE_TIMEOUT.as_millis() as u64);
        let config = Self {
            max_size,
            purge_timeout: Duration::from_millis(timeout_ms),
            max_age: None,
        };
        match config.validate() {
            Ok(()) => config,
            Err(e) => {
                eprintln!("[LOG REGISTRY WARNING] {}. Falling back to defaults.", e);
                Self::default()
            }
        }
    }

    #[must_use]
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    #[must_use]
    pub fn with_purge_timeout(mut self, timeout: Duration) -> Self {
        self.purge_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.purge_timeout.is_zero() {
            return Err(LogChannelError::config(
                "RegistryConfig",
                "purge_timeout must be greater than zero",
            ));
        }
        if matches!(self.max_age, Some(age) if age.is_zero()) {
            return Err(LogChannelError::config(
                "RegistryConfig",
                "max_age must be greater than zero when set",
            ));
        }
        Ok(())
    }
}

/// 0 means no limit; a value too large to express in seconds is ignored.
fn minutes_to_duration(minutes: u64) -> Option<Duration> {
    if minutes == 0 {
        return None;
    }
    match minutes.checked_mul(60) {
        Some(secs) => Some(Duration::from_secs(secs)),
        None => {
            eprintln!(
                "[LOG REGISTRY WARNING] Invalid value '{}' for {}, using no limit",
                minutes, ENV_MAX_LOG_TIMEOUT
            );
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBufferConfig {
    /// 0 keeps every line
    pub max_lines: usize,
    /// Lines older than this are dropped by the registry's purge cycle
    pub max_age: Option<Duration>,
}

impl Default for LogBufferConfig {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LOG_LINES,
            max_age: None,
        }
    }
}

impl LogBufferConfig {
    pub fn from_env() -> Self {
        let max_lines = env_or(ENV_MAX_LOG_LINES, DEFAULT_MAX_LOG_LINES);
        let minutes = env_or(ENV_MAX_LOG_TIMEOUT, 0u64);
        Self {
            max_lines,
            max_age: minutes_to_duration(minutes),
        }
    }

    #[must_use]
    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines;
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.max_size, 10_000);
        assert_eq!(config.purge_timeout, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_purge_timeout_rejected() {
        let config = RegistryConfig::new().with_purge_timeout(Duration::ZERO);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, LogChannelError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        std::env::set_var("LOG_CHANNEL_TEST_GARBAGE_SIZE", "ten thousand");
        assert_eq!(env_or("LOG_CHANNEL_TEST_GARBAGE_SIZE", 77usize), 77);
        std::env::set_var("LOG_CHANNEL_TEST_GARBAGE_SIZE", " 12 ");
        assert_eq!(env_or("LOG_CHANNEL_TEST_GARBAGE_SIZE", 77usize), 12);
        std::env::remove_var("LOG_CHANNEL_TEST_GARBAGE_SIZE");
        assert_eq!(env_or("LOG_CHANNEL_TEST_GARBAGE_SIZE", 77usize), 77);
    }

    #[test]
    fn test_minutes_overflow_means_no_limit() {
        assert_eq!(minutes_to_duration(0), None);
        assert_eq!(minutes_to_duration(10), Some(Duration::from_secs(600)));
        assert_eq!(minutes_to_duration(u64::MAX), None);
    }

    #[test]
    fn test_buffer_config_builder() {
        let config = LogBufferConfig::default()
            .with_max_lines(10)
            .with_max_age(Duration::from_secs(600));
        assert_eq!(config.max_lines, 10);
        assert_eq!(config.max_age, Some(Duration::from_secs(600)));
    }
}
