//! # Rust Log Channel System
//!
//! Hierarchical log-channel registry with bounded, thread-safe log and
//! metrics buffering for data-integration engines.
//!
//! ## Features
//!
//! - **Channel Registry**: Idempotent registration of jobs, transformations and
//!   steps, linked parent to child, purged in the background
//! - **Bounded Log Buffer**: Global ring of numbered log lines with listeners
//! - **File Writer Buffers**: Per-run capture that also protects a run's
//!   channels from purging
//! - **Metrics**: Per-channel snapshot queues and aggregates
//!
//! ## Example
//!
//! ```
//! use rust_log_channel_system::prelude::*;
//!
//! let job = SimpleLoggingObject::new("nightly_load", LoggingObjectType::Job);
//! let channel = Channel::new(&job);
//! channel.log_basic("Job started");
//!
//! let step = SimpleLoggingObject::new("Table input", LoggingObjectType::Step);
//! let child = Channel::with_parent(&step, &channel);
//! assert!(ChannelRegistry::instance()
//!     .get_log_channel_children(channel.log_channel_id())
//!     .contains(&child.log_channel_id().to_string()));
//! ```

pub mod core;
pub mod listeners;
pub mod macros;

pub mod prelude {
    pub use crate::core::{
        BufferLine, Channel, ChannelBuilder, ChannelRegistry, FileWriterBuffer, LogBuffer,
        LogBufferConfig, LogBufferListener, LogChannelError, LogEvent, LogHooks, LogLevel,
        LoggingObject, LoggingObjectType, LoggingSource, Metric, MetricsRegistry,
        MetricsSnapshotType, RegistryConfig, Result, SimpleLoggingObject,
    };
    #[cfg(feature = "console")]
    pub use crate::listeners::ConsoleListener;
    pub use crate::listeners::JsonListener;
}

#[cfg(feature = "console")]
pub use listeners::ConsoleListener;
pub use listeners::JsonListener;
pub use core::{
    BufferLine, Channel, ChannelBuilder, ChannelRegistry, FileWriterBuffer, LogBuffer,
    LogBufferConfig, LogBufferListener, LogChannelError, LogEvent, LogHooks, LogLevel,
    LoggingObject, LoggingObjectType, LoggingSource, Metric, MetricsDuration, MetricsRegistry,
    MetricsSnapshot, MetricsSnapshotType, RegistryConfig, RegistryStats, Result,
    SimpleLoggingObject, WithHooks,
};
