//! Error types for the log channel system
//!
//! Registry and buffer operations never fail: lookups miss with `None` and a
//! purge cycle that cannot progress reports zero. Errors are only produced by
//! configuration, level parsing and buffer listeners.

pub type Result<T> = std::result::Result<T, LogChannelError>;

#[derive(Debug, thiserror::Error)]
pub enum LogChannelError {
    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Buffer listener failed to handle an event
    #[error("Listener '{name}' failed: {message}")]
    ListenerError { name: String, message: String },

    /// Unparseable log level name
    #[error("Invalid log level: '{0}'")]
    InvalidLogLevel(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LogChannelError {
    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LogChannelError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a listener error
    pub fn listener(name: impl Into<String>, message: impl Into<String>) -> Self {
        LogChannelError::ListenerError {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LogChannelError::Other(msg.into())
    }
}
