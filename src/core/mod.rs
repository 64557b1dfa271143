//! Core registry, buffer and channel types

pub mod channel;
pub mod config;
pub mod error;
pub mod file_writer_buffer;
pub mod hooks;
pub mod log_buffer;
pub mod log_event;
pub mod log_level;
pub mod logging_object;
pub mod metrics;
pub mod object_type;
pub mod registry;
pub mod registry_stats;

pub use channel::{Channel, ChannelBuilder};
pub use config::{
    LogBufferConfig, RegistryConfig, DEFAULT_MAX_LOG_LINES, DEFAULT_MAX_REGISTRY_SIZE,
    DEFAULT_PURGE_TIMEOUT,
};
pub use error::{LogChannelError, Result};
pub use file_writer_buffer::FileWriterBuffer;
pub use hooks::{HookFn, LogHooks};
pub use log_buffer::{BufferLine, LogBuffer, LogBufferListener};
pub use log_event::{format_template, LogEvent};
pub use log_level::{
    default_log_level, init_default_log_level_from_env, set_default_log_level, LogLevel,
    ENV_LOG_LEVEL,
};
pub use logging_object::{LoggingObject, LoggingSource, SimpleLoggingObject, WithHooks};
pub use metrics::{
    Metric, MetricsDuration, MetricsRegistry, MetricsSnapshot, MetricsSnapshotType, SnapshotMap,
    SnapshotQueue,
};
pub use object_type::LoggingObjectType;
pub use registry::ChannelRegistry;
pub use registry_stats::RegistryStats;
