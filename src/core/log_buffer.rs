//! Bounded, thread-safe store of recent log lines across all channels
//!
//! Lines live in a `VecDeque` behind a short-lived `RwLock`; listeners are
//! notified after the lock is released, each isolated with `catch_unwind`
//! so a failing listener never disturbs the producer or other listeners.

use super::config::LogBufferConfig;
use super::error::Result;
use super::log_event::LogEvent;
use super::object_type::LoggingObjectType;
use super::registry::ChannelRegistry;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

static GLOBAL_BUFFER: Lazy<Arc<LogBuffer>> =
    Lazy::new(|| Arc::new(LogBuffer::with_config(LogBufferConfig::from_env())));

/// One buffered event with its line number
#[derive(Debug, Clone)]
pub struct BufferLine {
    nr: u64,
    event: Arc<LogEvent>,
}

impl BufferLine {
    pub fn nr(&self) -> u64 {
        self.nr
    }

    pub fn event(&self) -> &LogEvent {
        &self.event
    }

    pub fn shared_event(&self) -> Arc<LogEvent> {
        Arc::clone(&self.event)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.event.timestamp
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.event.channel_id.as_deref()
    }
}

/// Receives every line added to a [`LogBuffer`]
pub trait LogBufferListener: Send + Sync {
    fn event_added(&self, line: &BufferLine) -> Result<()>;
    fn name(&self) -> &str;
}

pub struct LogBuffer {
    max_lines: AtomicUsize,
    max_age: RwLock<Option<Duration>>,
    lines: RwLock<VecDeque<BufferLine>>,
    last_line_nr: AtomicU64,
    listeners: RwLock<Vec<Arc<dyn LogBufferListener>>>,
}

impl LogBuffer {
    /// `max_lines == 0` keeps every line
    pub fn new(max_lines: usize) -> Self {
        Self::with_config(LogBufferConfig::default().with_max_lines(max_lines))
    }

    pub fn with_config(config: LogBufferConfig) -> Self {
        Self {
            max_lines: AtomicUsize::new(config.max_lines),
            max_age: RwLock::new(config.max_age),
            lines: RwLock::new(VecDeque::new()),
            last_line_nr: AtomicU64::new(0),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// The process-wide buffer, created on first access
    pub fn instance() -> Arc<LogBuffer> {
        Arc::clone(&GLOBAL_BUFFER)
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines.load(Ordering::Relaxed)
    }

    /// Change the capacity; a smaller value evicts the oldest lines at once.
    pub fn set_max_lines(&self, max_lines: usize) {
        self.max_lines.store(max_lines, Ordering::Relaxed);
        if max_lines > 0 {
            let mut lines = self.lines.write();
            while lines.len() > max_lines {
                lines.pop_front();
            }
        }
    }

    pub fn max_age(&self) -> Option<Duration> {
        *self.max_age.read()
    }

    pub fn set_max_age(&self, max_age: Option<Duration>) {
        *self.max_age.write() = max_age;
    }

    /// Append an event and return its line number.
    pub fn add_event(&self, event: LogEvent) -> u64 {
        self.add_shared_event(Arc::new(event))
    }

    pub fn add_shared_event(&self, event: Arc<LogEvent>) -> u64 {
        let line = {
            let mut lines = self.lines.write();
            // Numbered under the lock so deque order matches line order
            let nr = self.last_line_nr.fetch_add(1, Ordering::Relaxed) + 1;
            let line = BufferLine { nr, event };
            lines.push_back(line.clone());

            let max = self.max_lines.load(Ordering::Relaxed);
            if max > 0 {
                while lines.len() > max {
                    lines.pop_front();
                }
            }
            line
        };

        self.notify_listeners(&line);
        line.nr
    }

    fn notify_listeners(&self, line: &BufferLine) {
        let listeners: Vec<Arc<dyn LogBufferListener>> = {
            let guard = self.listeners.read();
            if guard.is_empty() {
                return;
            }
            guard.clone()
        };

        for listener in listeners.iter() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.event_added(line)
            }));

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    eprintln!(
                        "[LOG REGISTRY ERROR] Listener '{}' failed: {}",
                        listener.name(),
                        e
                    );
                }
                Err(panic_info) => {
                    let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    eprintln!(
                        "[LOG REGISTRY CRITICAL] Listener '{}' panicked: {}. \
                         Other listeners continue to function.",
                        listener.name(),
                        panic_msg
                    );
                }
            }
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn LogBufferListener>) {
        self.listeners.write().push(listener);
    }

    /// Remove every listener registered under `name`; returns how many
    pub fn remove_listener(&self, name: &str) -> usize {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| l.name() != name);
        before - listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn nr_lines(&self) -> usize {
        self.lines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.read().is_empty()
    }

    /// Number of the most recently added line, 0 if none was ever added.
    /// Unaffected by eviction and `clear()`.
    pub fn last_buffer_line_nr(&self) -> u64 {
        self.last_line_nr.load(Ordering::Relaxed)
    }

    /// Iterator over a snapshot of the current contents. Each call starts over.
    pub fn buffer_iter(&self) -> std::vec::IntoIter<BufferLine> {
        let lines: Vec<BufferLine> = self.lines.read().iter().cloned().collect();
        lines.into_iter()
    }

    /// Lines whose event timestamp is strictly before `timestamp`
    pub fn get_buffer_lines_before(&self, timestamp: DateTime<Utc>) -> Vec<BufferLine> {
        self.lines
            .read()
            .iter()
            .filter(|line| line.timestamp() < timestamp)
            .cloned()
            .collect()
    }

    /// Drop lines whose event timestamp is strictly before `timestamp`
    pub fn remove_buffer_lines_before(&self, timestamp: DateTime<Utc>) -> usize {
        let mut lines = self.lines.write();
        let before = lines.len();
        lines.retain(|line| line.timestamp() >= timestamp);
        before - lines.len()
    }

    /// Apply the configured `max_age`, if any
    pub fn remove_expired_lines(&self, now: DateTime<Utc>) -> usize {
        let Some(max_age) = self.max_age() else {
            return 0;
        };
        let boundary = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| now.checked_sub_signed(age));
        match boundary {
            Some(boundary) => self.remove_buffer_lines_before(boundary),
            None => 0,
        }
    }

    /// Drop every line; line numbering continues where it left off.
    pub fn clear(&self) {
        self.lines.write().clear();
    }

    pub fn remove_channel_lines(&self, channel_id: &str) -> usize {
        let mut lines = self.lines.write();
        let before = lines.len();
        lines.retain(|line| line.channel_id() != Some(channel_id));
        before - lines.len()
    }

    pub(crate) fn remove_lines_for_channels(&self, channel_ids: &HashSet<String>) -> usize {
        if channel_ids.is_empty() {
            return 0;
        }
        let mut lines = self.lines.write();
        let before = lines.len();
        lines.retain(|line| !line.channel_id().is_some_and(|id| channel_ids.contains(id)));
        before - lines.len()
    }

    /// Lines numbered in `(from, to]` that belong to `channel_ids`, or to a
    /// general channel when `include_general` is set.
    pub fn get_log_buffer_from_to(
        &self,
        registry: &ChannelRegistry,
        channel_ids: &[String],
        include_general: bool,
        from: u64,
        to: u64,
    ) -> Vec<BufferLine> {
        let wanted: HashSet<&str> = channel_ids.iter().map(String::as_str).collect();
        self.lines
            .read()
            .iter()
            .filter(|line| line.nr > from && line.nr <= to)
            .filter(|line| match line.channel_id() {
                Some(id) if wanted.contains(id) => true,
                Some(id) => include_general && is_general(registry, id),
                None => include_general,
            })
            .cloned()
            .collect()
    }

    /// Rendered text of everything logged by `parent_id` and its descendants
    pub fn get_buffer(
        &self,
        registry: &ChannelRegistry,
        parent_id: &str,
        include_general: bool,
    ) -> String {
        let ids = registry.get_log_channel_children(parent_id);
        let lines = self.get_log_buffer_from_to(
            registry,
            &ids,
            include_general,
            0,
            self.last_buffer_line_nr(),
        );
        let mut out = String::new();
        for line in lines {
            out.push_str(&line.event().render());
            out.push('\n');
        }
        out
    }

    /// Remove the lines of `parent_id` and its descendants
    pub fn discard_lines(
        &self,
        registry: &ChannelRegistry,
        parent_id: &str,
        include_general: bool,
    ) -> usize {
        let ids: HashSet<String> = registry
            .get_log_channel_children(parent_id)
            .into_iter()
            .collect();
        let mut lines = self.lines.write();
        let before = lines.len();
        lines.retain(|line| match line.channel_id() {
            Some(id) if ids.contains(id) => false,
            Some(id) => !(include_general && is_general(registry, id)),
            None => !include_general,
        });
        before - lines.len()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_config(LogBufferConfig::default())
    }
}

fn is_general(registry: &ChannelRegistry, channel_id: &str) -> bool {
    registry
        .get_logging_object(channel_id)
        .is_some_and(|object| object.object_type() == LoggingObjectType::General)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_level::LogLevel;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicUsize;

    fn event_at(millis: i64) -> LogEvent {
        LogEvent::new(LogLevel::Basic, format!("line {}", millis)).with_timestamp_millis(millis)
    }

    struct CountingListener {
        seen: AtomicUsize,
    }

    impl LogBufferListener for CountingListener {
        fn event_added(&self, _line: &BufferLine) -> Result<()> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    struct PanickingListener;

    impl LogBufferListener for PanickingListener {
        fn event_added(&self, _line: &BufferLine) -> Result<()> {
            panic!("listener exploded");
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[test]
    fn test_capacity_keeps_last_lines() {
        let buffer = LogBuffer::new(10);
        for i in 1..=20 {
            buffer.add_event(event_at(i));
        }

        assert_eq!(buffer.nr_lines(), 10);
        let nrs: Vec<u64> = buffer.buffer_iter().map(|l| l.nr()).collect();
        assert_eq!(nrs, (11..=20).collect::<Vec<u64>>());
        assert_eq!(buffer.last_buffer_line_nr(), 20);
    }

    #[test]
    fn test_clear_keeps_line_counter() {
        let buffer = LogBuffer::new(0);
        for i in 0..5 {
            buffer.add_event(event_at(i));
        }
        buffer.clear();

        assert_eq!(buffer.nr_lines(), 0);
        assert_eq!(buffer.buffer_iter().count(), 0);
        assert_eq!(buffer.add_event(event_at(99)), 6);
    }

    #[test]
    fn test_lines_before_is_strict() {
        let buffer = LogBuffer::new(0);
        for i in 1..=10 {
            buffer.add_event(event_at(i));
        }

        let threshold = Utc.timestamp_millis_opt(10).unwrap();
        let before = buffer.get_buffer_lines_before(threshold);
        assert_eq!(before.len(), 9);
        assert!(before.iter().all(|l| l.timestamp() < threshold));

        let just_above_one = Utc.timestamp_millis_opt(2).unwrap();
        assert_eq!(buffer.get_buffer_lines_before(just_above_one).len(), 1);
    }

    #[test]
    fn test_remove_lines_before() {
        let buffer = LogBuffer::new(0);
        for i in 1..=10 {
            buffer.add_event(event_at(i));
        }

        let removed = buffer.remove_buffer_lines_before(Utc.timestamp_millis_opt(6).unwrap());
        assert_eq!(removed, 5);
        assert_eq!(buffer.nr_lines(), 5);
        assert_eq!(buffer.buffer_iter().next().map(|l| l.nr()), Some(6));
    }

    #[test]
    fn test_shrinking_capacity_evicts() {
        let buffer = LogBuffer::new(0);
        for i in 0..8 {
            buffer.add_event(event_at(i));
        }
        buffer.set_max_lines(3);
        assert_eq!(buffer.nr_lines(), 3);
    }

    #[test]
    fn test_listener_isolation() {
        let buffer = LogBuffer::new(0);
        let counting = Arc::new(CountingListener {
            seen: AtomicUsize::new(0),
        });
        buffer.add_listener(Arc::new(PanickingListener));
        buffer.add_listener(counting.clone());

        buffer.add_event(event_at(1));
        buffer.add_event(event_at(2));

        assert_eq!(counting.seen.load(Ordering::SeqCst), 2);
        assert_eq!(buffer.nr_lines(), 2);
        assert_eq!(buffer.remove_listener("panicking"), 1);
        assert_eq!(buffer.listener_count(), 1);
    }

    #[test]
    fn test_remove_channel_lines() {
        let buffer = LogBuffer::new(0);
        buffer.add_event(event_at(1).with_channel("a"));
        buffer.add_event(event_at(2).with_channel("b"));
        buffer.add_event(event_at(3).with_channel("a"));

        assert_eq!(buffer.remove_channel_lines("a"), 2);
        assert_eq!(buffer.nr_lines(), 1);
    }
}
