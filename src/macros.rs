//! Logging macros for ergonomic log message formatting.
//!
//! These macros format their arguments like `format!` and hand the result to
//! a [`Channel`](crate::core::Channel). Each expands to the channel's
//! `println`, so level and substring filtering still apply.
//!
//! # Examples
//!
//! ```
//! use rust_log_channel_system::prelude::*;
//! use rust_log_channel_system::log_basic;
//!
//! let channel = Channel::new("load_orders");
//!
//! log_basic!(channel, "Transformation started");
//!
//! let rows = 1250;
//! log_basic!(channel, "Read {} rows from {}", rows, "orders");
//! ```

/// Log a message at an explicit level.
///
/// # Examples
///
/// ```
/// # use rust_log_channel_system::prelude::*;
/// # let channel = Channel::new("macro_doc");
/// use rust_log_channel_system::log_at;
/// log_at!(channel, LogLevel::Basic, "Simple message");
/// log_at!(channel, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log_at {
    ($channel:expr, $level:expr, $($arg:tt)+) => {
        $channel.println(format!($($arg)+), $level)
    };
}

#[macro_export]
macro_rules! log_error {
    ($channel:expr, $($arg:tt)+) => {
        $crate::log_at!($channel, $crate::LogLevel::Error, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_minimal {
    ($channel:expr, $($arg:tt)+) => {
        $crate::log_at!($channel, $crate::LogLevel::Minimal, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_basic {
    ($channel:expr, $($arg:tt)+) => {
        $crate::log_at!($channel, $crate::LogLevel::Basic, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_detailed {
    ($channel:expr, $($arg:tt)+) => {
        $crate::log_at!($channel, $crate::LogLevel::Detailed, $($arg)+)
    };
}

/// Log a debug-level message.
///
/// # Examples
///
/// ```
/// # use rust_log_channel_system::prelude::*;
/// # let channel = Channel::new("macro_doc_debug");
/// # channel.set_log_level(LogLevel::Debug);
/// use rust_log_channel_system::log_debug;
/// log_debug!(channel, "Lookup cache size: {}", 10);
/// ```
#[macro_export]
macro_rules! log_debug {
    ($channel:expr, $($arg:tt)+) => {
        $crate::log_at!($channel, $crate::LogLevel::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_rowlevel {
    ($channel:expr, $($arg:tt)+) => {
        $crate::log_at!($channel, $crate::LogLevel::Rowlevel, $($arg)+)
    };
}
