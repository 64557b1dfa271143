//! Logging facade bound to one registered subject

use super::file_writer_buffer::FileWriterBuffer;
use super::hooks::LogHooks;
use super::log_buffer::LogBuffer;
use super::log_event::LogEvent;
use super::log_level::{default_log_level, LogLevel};
use super::logging_object::{LoggingSource, SimpleLoggingObject};
use super::metrics::{Metric, MetricsRegistry, MetricsSnapshot};
use super::object_type::LoggingObjectType;
use super::registry::ChannelRegistry;
use parking_lot::RwLock;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A log channel: the handle a unit of work writes its log lines through.
///
/// Construction registers the subject with a [`ChannelRegistry`] (reusing the
/// id of an identical live registration). Accepted lines go to the
/// [`LogBuffer`] and to the [`FileWriterBuffer`] covering the channel, if any.
pub struct Channel {
    log_channel_id: String,
    subject: String,
    object_type: LoggingObjectType,
    parent_channel_id: Option<String>,
    container_object_id: Option<String>,
    level: RwLock<Option<LogLevel>>,
    filter: RwLock<Option<String>>,
    hooks: RwLock<LogHooks>,
    gathering_metrics: AtomicBool,
    /// Last resolved file writer buffer, re-resolved once it goes inactive
    file_writer: RwLock<Option<Arc<FileWriterBuffer>>>,
    registry: Arc<ChannelRegistry>,
    log_buffer: Arc<LogBuffer>,
    metrics: Arc<MetricsRegistry>,
}

impl Channel {
    /// Register `subject` with the global registry and bind a channel to it
    pub fn new(subject: &(impl LoggingSource + ?Sized)) -> Self {
        ChannelBuilder::new().build(subject)
    }

    /// Register `subject` as a child of `parent`, inheriting the parent's level
    /// when the subject has none.
    pub fn with_parent(
        subject: &(impl LoggingSource + ?Sized),
        parent: &(impl LoggingSource + ?Sized),
    ) -> Self {
        ChannelBuilder::new().parent(parent).build(subject)
    }

    pub fn builder() -> ChannelBuilder {
        ChannelBuilder::new()
    }

    pub fn log_channel_id(&self) -> &str {
        &self.log_channel_id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Effective level: the channel's own, or the process-wide default
    pub fn log_level(&self) -> LogLevel {
        (*self.level.read()).unwrap_or_else(default_log_level)
    }

    pub fn set_log_level(&self, level: LogLevel) {
        *self.level.write() = Some(level);
    }

    /// Fall back to the process-wide default level
    pub fn clear_log_level(&self) {
        *self.level.write() = None;
    }

    pub fn filter(&self) -> Option<String> {
        self.filter.read().clone()
    }

    /// Only lines whose subject or message contain `filter` are kept; errors
    /// always pass. An empty filter disables filtering.
    pub fn set_filter(&self, filter: Option<String>) {
        *self.filter.write() = filter.filter(|f| !f.is_empty());
    }

    pub fn hooks(&self) -> LogHooks {
        self.hooks.read().clone()
    }

    pub fn set_hooks(&self, hooks: LogHooks) {
        *self.hooks.write() = hooks;
    }

    pub fn is_gathering_metrics(&self) -> bool {
        self.gathering_metrics.load(Ordering::Relaxed)
    }

    pub fn set_gathering_metrics(&self, enabled: bool) {
        self.gathering_metrics.store(enabled, Ordering::Relaxed);
    }

    fn accepts(&self, message: &str, level: LogLevel) -> bool {
        if !level.is_visible(self.log_level()) {
            return false;
        }
        if level.is_error() {
            return true;
        }
        match *self.filter.read() {
            Some(ref filter) => {
                self.subject.contains(filter.as_str()) || message.contains(filter.as_str())
            }
            None => true,
        }
    }

    /// Write `message` at `level`. Returns whether the line was accepted.
    pub fn println(&self, message: impl Into<String>, level: LogLevel) -> bool {
        let message = message.into();
        if !self.accepts(&message, level) {
            return false;
        }
        self.emit(LogEvent::new(level, message));
        true
    }

    /// Write a `{0}`-style template with its arguments
    pub fn println_with_args(
        &self,
        template: &str,
        args: &[&dyn fmt::Display],
        level: LogLevel,
    ) -> bool {
        let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        let event = LogEvent::with_args(level, template, args);
        if !self.accepts(&event.message, level) {
            return false;
        }
        self.emit(event);
        true
    }

    fn emit(&self, event: LogEvent) {
        let event = Arc::new(
            event
                .with_channel(self.log_channel_id.clone())
                .with_subject(self.subject.clone()),
        );
        let hooks = self.hooks();

        run_hook("before", || hooks.call_before_log());
        self.log_buffer.add_shared_event(Arc::clone(&event));
        if let Some(writer) = self.file_writer() {
            writer.add_shared_event(event);
        }
        run_hook("after", || hooks.call_after_log());
    }

    fn file_writer(&self) -> Option<Arc<FileWriterBuffer>> {
        if let Some(ref cached) = *self.file_writer.read() {
            if cached.is_active() {
                return Some(Arc::clone(cached));
            }
        }
        let resolved = self.registry.get_file_writer_buffer(&self.log_channel_id);
        *self.file_writer.write() = resolved.clone();
        resolved
    }

    pub fn log_minimal(&self, message: impl Into<String>) -> bool {
        self.println(message, LogLevel::Minimal)
    }

    pub fn log_basic(&self, message: impl Into<String>) -> bool {
        self.println(message, LogLevel::Basic)
    }

    pub fn log_detailed(&self, message: impl Into<String>) -> bool {
        self.println(message, LogLevel::Detailed)
    }

    pub fn log_debug(&self, message: impl Into<String>) -> bool {
        self.println(message, LogLevel::Debug)
    }

    pub fn log_rowlevel(&self, message: impl Into<String>) -> bool {
        self.println(message, LogLevel::Rowlevel)
    }

    pub fn log_error(&self, message: impl Into<String>) -> bool {
        self.println(message, LogLevel::Error)
    }

    /// Log an error together with its source chain
    pub fn log_error_with(&self, message: impl Into<String>, error: &dyn Error) -> bool {
        let mut text = format!("{}: {}", message.into(), error);
        let mut source = error.source();
        while let Some(cause) = source {
            text.push_str(&format!("\n  caused by: {}", cause));
            source = cause.source();
        }
        self.println(text, LogLevel::Error)
    }

    pub fn is_basic(&self) -> bool {
        LogLevel::Basic.is_visible(self.log_level())
    }

    pub fn is_detailed(&self) -> bool {
        LogLevel::Detailed.is_visible(self.log_level())
    }

    pub fn is_debug(&self) -> bool {
        LogLevel::Debug.is_visible(self.log_level())
    }

    pub fn is_rowlevel(&self) -> bool {
        LogLevel::Rowlevel.is_visible(self.log_level())
    }

    pub fn is_error(&self) -> bool {
        LogLevel::Error.is_visible(self.log_level())
    }

    /// Record a metrics snapshot for this channel; ignored unless the channel
    /// gathers metrics.
    pub fn snap(&self, metric: &Metric, value: Option<i64>) {
        self.record_snapshot(metric, None, value);
    }

    pub fn snap_subject(&self, metric: &Metric, subject: &str, value: Option<i64>) {
        self.record_snapshot(metric, Some(subject.to_string()), value);
    }

    fn record_snapshot(&self, metric: &Metric, subject: Option<String>, value: Option<i64>) {
        if !self.is_gathering_metrics() {
            return;
        }
        self.metrics.add_snapshot(MetricsSnapshot::new(
            *metric,
            subject,
            value,
            self.log_channel_id.clone(),
        ));
    }
}

fn run_hook(stage: &str, hook: impl FnOnce()) {
    if let Err(panic_info) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(hook)) {
        let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        eprintln!("[LOG REGISTRY CRITICAL] The {} log hook panicked: {}", stage, panic_msg);
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("log_channel_id", &self.log_channel_id)
            .field("subject", &self.subject)
            .field("object_type", &self.object_type)
            .field("level", &self.log_level())
            .finish()
    }
}

impl LoggingSource for Channel {
    fn object_name(&self) -> Option<&str> {
        Some(&self.subject)
    }

    fn object_type(&self) -> LoggingObjectType {
        self.object_type
    }

    fn parent_channel_id(&self) -> Option<&str> {
        self.parent_channel_id.as_deref()
    }

    fn log_channel_id(&self) -> Option<&str> {
        Some(&self.log_channel_id)
    }

    fn log_level(&self) -> Option<LogLevel> {
        Some(Channel::log_level(self))
    }

    fn container_object_id(&self) -> Option<&str> {
        self.container_object_id.as_deref()
    }

    fn is_gathering_metrics(&self) -> bool {
        Channel::is_gathering_metrics(self)
    }

    fn hooks(&self) -> Option<LogHooks> {
        Some(Channel::hooks(self))
    }
}

/// Builder for channels bound to explicit registries
#[derive(Default)]
pub struct ChannelBuilder {
    registry: Option<Arc<ChannelRegistry>>,
    log_buffer: Option<Arc<LogBuffer>>,
    metrics: Option<Arc<MetricsRegistry>>,
    parent_channel_id: Option<String>,
    parent_level: Option<LogLevel>,
    parent_container_id: Option<String>,
    level: Option<LogLevel>,
    purgeable: Option<bool>,
    gathering_metrics: Option<bool>,
}

impl ChannelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn registry(mut self, registry: Arc<ChannelRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Defaults to the registry's attached buffer, then [`LogBuffer::instance`]
    #[must_use]
    pub fn log_buffer(mut self, buffer: Arc<LogBuffer>) -> Self {
        self.log_buffer = Some(buffer);
        self
    }

    #[must_use]
    pub fn metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn parent(mut self, parent: &(impl LoggingSource + ?Sized)) -> Self {
        self.parent_channel_id = parent.log_channel_id().map(str::to_string);
        self.parent_level = parent.log_level();
        self.parent_container_id = parent.container_object_id().map(str::to_string);
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    #[must_use]
    pub fn purgeable(mut self, purgeable: bool) -> Self {
        self.purgeable = Some(purgeable);
        self
    }

    #[must_use]
    pub fn gathering_metrics(mut self, enabled: bool) -> Self {
        self.gathering_metrics = Some(enabled);
        self
    }

    pub fn build(self, subject: &(impl LoggingSource + ?Sized)) -> Channel {
        let registry = self.registry.unwrap_or_else(ChannelRegistry::instance);
        let log_buffer = self
            .log_buffer
            .or_else(|| registry.log_buffer())
            .unwrap_or_else(LogBuffer::instance);
        let metrics = self.metrics.unwrap_or_else(MetricsRegistry::instance);

        let mut source = SimpleLoggingObject::from_source(subject);
        if let Some(parent_id) = self.parent_channel_id {
            source = source.with_parent_id(parent_id);
        }
        if source.container_object_id().is_none() {
            if let Some(container) = self.parent_container_id {
                source = source.with_container_object_id(container);
            }
        }
        let level = self
            .level
            .or_else(|| source.log_level())
            .or(self.parent_level);
        if let Some(level) = level {
            source = source.with_log_level(level);
        }
        let gathering_metrics = self
            .gathering_metrics
            .unwrap_or_else(|| source.is_gathering_metrics());
        source = source.gathering_metrics(gathering_metrics);

        let log_channel_id =
            registry.register_logging_source(&source, self.purgeable.unwrap_or(true));
        let subject_name = registry
            .get_logging_object(&log_channel_id)
            .map(|object| object.generated_name())
            .unwrap_or_else(|| source.object_name().unwrap_or("-").to_string());

        Channel {
            log_channel_id,
            subject: subject_name,
            object_type: source.object_type(),
            parent_channel_id: source.parent_channel_id().map(str::to_string),
            container_object_id: source.container_object_id().map(str::to_string),
            level: RwLock::new(level),
            filter: RwLock::new(None),
            hooks: RwLock::new(subject.hooks().unwrap_or_default()),
            gathering_metrics: AtomicBool::new(gathering_metrics),
            file_writer: RwLock::new(None),
            registry,
            log_buffer,
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RegistryConfig;
    use crate::core::logging_object::WithHooks;
    use crate::core::metrics::{MetricsSnapshotType, METRIC_STEP_INIT_START};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct Fixture {
        registry: Arc<ChannelRegistry>,
        buffer: Arc<LogBuffer>,
        metrics: Arc<MetricsRegistry>,
    }

    impl Fixture {
        fn new() -> Self {
            let registry = ChannelRegistry::new(
                RegistryConfig::new().with_purge_timeout(Duration::from_secs(3600)),
            );
            let buffer = Arc::new(LogBuffer::new(0));
            registry.attach_log_buffer(Arc::clone(&buffer));
            Self {
                registry,
                buffer,
                metrics: Arc::new(MetricsRegistry::new()),
            }
        }

        fn builder(&self) -> ChannelBuilder {
            Channel::builder()
                .registry(Arc::clone(&self.registry))
                .metrics(Arc::clone(&self.metrics))
        }
    }

    #[test]
    fn test_level_filtering() {
        let fx = Fixture::new();
        let channel = fx.builder().log_level(LogLevel::Basic).build("load_customers");

        assert!(channel.log_basic("kept"));
        assert!(channel.log_minimal("kept too"));
        assert!(!channel.log_detailed("dropped"));
        assert!(!channel.log_rowlevel("dropped"));
        assert_eq!(fx.buffer.nr_lines(), 2);
        assert!(channel.is_basic());
        assert!(!channel.is_debug());
    }

    #[test]
    fn test_substring_filter_lets_errors_through() {
        let fx = Fixture::new();
        let channel = fx.builder().log_level(LogLevel::Debug).build("sort_rows");
        channel.set_filter(Some("rows".to_string()));

        assert!(channel.log_basic("anything"), "subject matches filter");
        channel.set_filter(Some("needle".to_string()));
        assert!(!channel.log_basic("haystack"));
        assert!(channel.log_basic("a needle here"));
        assert!(channel.log_error("haystack failure"));
        assert_eq!(fx.buffer.nr_lines(), 3);
    }

    #[test]
    fn test_events_carry_channel_and_subject() {
        let fx = Fixture::new();
        let channel = fx.builder().build("Spoon");
        channel.println_with_args("Read {0} rows from {1}", &[&42, &"orders"], LogLevel::Basic);

        let line = fx.buffer.buffer_iter().next().expect("one line");
        assert_eq!(line.channel_id(), Some(channel.log_channel_id()));
        assert_eq!(line.event().subject.as_deref(), Some("Spoon"));
        assert_eq!(line.event().message, "Read 42 rows from orders");
        assert_eq!(line.event().args, vec!["42", "orders"]);
    }

    #[test]
    fn test_hooks_wrap_accepted_lines_only() {
        let fx = Fixture::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let subject = WithHooks::new(
            SimpleLoggingObject::new("trans", LoggingObjectType::Trans),
            LogHooks::new().before(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let channel = fx.builder().log_level(LogLevel::Minimal).build(&subject);

        channel.log_minimal("yes");
        channel.log_debug("no");

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_hook_does_not_stop_logging() {
        let fx = Fixture::new();
        let channel = fx.builder().build("fragile");
        channel.set_hooks(LogHooks::new().after(|| panic!("hook failure")));

        assert!(channel.log_basic("still logged"));
        assert_eq!(fx.buffer.nr_lines(), 1);
    }

    #[test]
    fn test_file_writer_buffer_receives_child_lines() {
        let fx = Fixture::new();
        let job = fx
            .builder()
            .build(&SimpleLoggingObject::new("job", LoggingObjectType::Job));
        let step = fx
            .builder()
            .parent(&job)
            .build(&SimpleLoggingObject::new("step", LoggingObjectType::Step));

        step.log_basic("before buffer");
        let writer = Arc::new(FileWriterBuffer::new(job.log_channel_id()));
        fx.registry.register_file_writer_buffer(Arc::clone(&writer));
        step.log_basic("after buffer");

        assert_eq!(writer.nr_events(), 1);

        fx.registry.remove_file_writer_buffer(job.log_channel_id());
        step.log_basic("after removal");
        assert_eq!(writer.nr_events(), 1);
        assert_eq!(fx.buffer.nr_lines(), 3);
    }

    #[test]
    fn test_child_inherits_parent_level() {
        let fx = Fixture::new();
        let job = fx
            .builder()
            .log_level(LogLevel::Rowlevel)
            .build(&SimpleLoggingObject::new("job", LoggingObjectType::Job));
        let entry = fx
            .builder()
            .parent(&job)
            .build(&SimpleLoggingObject::new("entry", LoggingObjectType::JobEntry));

        assert_eq!(entry.log_level(), LogLevel::Rowlevel);
        assert_eq!(
            fx.registry.get_child_ids(job.log_channel_id()),
            vec![entry.log_channel_id().to_string()]
        );
    }

    #[test]
    fn test_same_subject_reuses_channel_id() {
        let fx = Fixture::new();
        let a = fx.builder().build("shared");
        let b = fx.builder().build("shared");
        assert_eq!(a.log_channel_id(), b.log_channel_id());
    }

    #[test]
    fn test_error_chain_is_appended() {
        #[derive(Debug)]
        struct Outer(std::io::Error);
        impl fmt::Display for Outer {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "lookup failed")
            }
        }
        impl Error for Outer {
            fn source(&self) -> Option<&(dyn Error + 'static)> {
                Some(&self.0)
            }
        }

        let fx = Fixture::new();
        let channel = fx.builder().build("db");
        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "connection reset"));
        channel.log_error_with("Step failed", &err);

        let line = fx.buffer.buffer_iter().next().expect("one line");
        assert_eq!(
            line.event().message,
            "Step failed: lookup failed\n  caused by: connection reset"
        );
        assert_eq!(line.event().level, LogLevel::Error);
    }

    #[test]
    fn test_snap_requires_gathering_metrics() {
        let fx = Fixture::new();
        let quiet = fx.builder().build("quiet");
        quiet.snap(&METRIC_STEP_INIT_START, None);
        assert!(fx.metrics.get_snapshot_lists().is_empty());

        let busy = fx.builder().gathering_metrics(true).build("busy");
        busy.snap_subject(&METRIC_STEP_INIT_START, "Sort", None);
        let rows = Metric::new(MetricsSnapshotType::Max, "ROWS", "Rows");
        busy.snap(&rows, Some(10));
        busy.snap(&rows, Some(3));

        let queue = fx.metrics.get_snapshot_list(busy.log_channel_id());
        assert_eq!(queue.len(), 1);
        let map = fx.metrics.get_snapshot_map(busy.log_channel_id());
        assert_eq!(map.get("ROWS").and_then(|s| s.value), Some(10));
    }
}
