//! Log level definitions
//!
//! Levels are ordered by verbosity: a channel configured at `Detailed` shows
//! `Error`, `Minimal`, `Basic` and `Detailed` messages but hides `Debug` and
//! `Rowlevel` ones. `Nothing` hides everything.

use super::error::LogChannelError;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum LogLevel {
    Nothing = 0,
    Error = 1,
    Minimal = 2,
    #[default]
    Basic = 3,
    Detailed = 4,
    Debug = 5,
    Rowlevel = 6,
}

impl LogLevel {
    pub const ALL: [LogLevel; 7] = [
        LogLevel::Nothing,
        LogLevel::Error,
        LogLevel::Minimal,
        LogLevel::Basic,
        LogLevel::Detailed,
        LogLevel::Debug,
        LogLevel::Rowlevel,
    ];

    pub fn to_str(&self) -> &'static str {
        match self {
            LogLevel::Nothing => "NOTHING",
            LogLevel::Error => "ERROR",
            LogLevel::Minimal => "MINIMAL",
            LogLevel::Basic => "BASIC",
            LogLevel::Detailed => "DETAILED",
            LogLevel::Debug => "DEBUG",
            LogLevel::Rowlevel => "ROWLEVEL",
        }
    }

    /// Whether a message at this level passes a channel configured at `filter`
    #[inline]
    pub fn is_visible(&self, filter: LogLevel) -> bool {
        *self != LogLevel::Nothing && filter >= *self
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        *self == LogLevel::Error
    }

    #[cfg(feature = "console")]
    pub fn color_code(&self) -> colored::Color {
        use colored::Color::*;
        match self {
            LogLevel::Nothing => White,
            LogLevel::Error => Red,
            LogLevel::Minimal => Green,
            LogLevel::Basic => Green,
            LogLevel::Detailed => Blue,
            LogLevel::Debug => BrightBlack,
            LogLevel::Rowlevel => BrightBlack,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for LogLevel {
    type Err = LogChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NOTHING" | "NONE" => Ok(LogLevel::Nothing),
            "ERROR" => Ok(LogLevel::Error),
            "MINIMAL" => Ok(LogLevel::Minimal),
            "BASIC" => Ok(LogLevel::Basic),
            "DETAILED" | "DETAIL" => Ok(LogLevel::Detailed),
            "DEBUG" => Ok(LogLevel::Debug),
            "ROWLEVEL" | "ROW LEVEL" => Ok(LogLevel::Rowlevel),
            _ => Err(LogChannelError::InvalidLogLevel(s.to_string())),
        }
    }
}

pub const ENV_LOG_LEVEL: &str = "KETTLE_LOG_LEVEL";

static DEFAULT_LOG_LEVEL: RwLock<LogLevel> = parking_lot::const_rwlock(LogLevel::Basic);

/// `KETTLE_LOG_LEVEL` is applied once, before the default is first read or set
static ENV_DEFAULT_APPLIED: Lazy<()> = Lazy::new(apply_env_level);

fn apply_env_level() {
    let raw = match std::env::var(ENV_LOG_LEVEL) {
        Ok(raw) if !raw.trim().is_empty() => raw,
        _ => return,
    };
    match raw.parse::<LogLevel>() {
        Ok(level) => *DEFAULT_LOG_LEVEL.write() = level,
        Err(e) => eprintln!(
            "[LOG REGISTRY WARNING] Ignoring {}: {}. Keeping {}.",
            ENV_LOG_LEVEL,
            e,
            *DEFAULT_LOG_LEVEL.read()
        ),
    }
}

/// Process-wide level used by channels that have none configured
pub fn default_log_level() -> LogLevel {
    Lazy::force(&ENV_DEFAULT_APPLIED);
    *DEFAULT_LOG_LEVEL.read()
}

pub fn set_default_log_level(level: LogLevel) {
    Lazy::force(&ENV_DEFAULT_APPLIED);
    *DEFAULT_LOG_LEVEL.write() = level;
}

/// Re-read `KETTLE_LOG_LEVEL` into the process-wide default, keeping the
/// current value when the variable is unset or malformed.
pub fn init_default_log_level_from_env() -> LogLevel {
    Lazy::force(&ENV_DEFAULT_APPLIED);
    apply_env_level();
    *DEFAULT_LOG_LEVEL.read()
}
