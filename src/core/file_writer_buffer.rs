//! Per-run accumulation of events destined for a dedicated log file
//!
//! The buffer only collects; writing to disk is done by whoever owns the run,
//! reading [`FileWriterBuffer::get_buffer`] or draining with
//! [`FileWriterBuffer::take_events`].

use super::log_event::LogEvent;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct FileWriterBuffer {
    log_channel_id: String,
    events: Mutex<Vec<Arc<LogEvent>>>,
    active: AtomicBool,
}

impl FileWriterBuffer {
    pub fn new(log_channel_id: impl Into<String>) -> Self {
        Self {
            log_channel_id: log_channel_id.into(),
            events: Mutex::new(Vec::new()),
            active: AtomicBool::new(true),
        }
    }

    pub fn log_channel_id(&self) -> &str {
        &self.log_channel_id
    }

    pub fn add_event(&self, event: LogEvent) {
        self.add_shared_event(Arc::new(event));
    }

    pub fn add_shared_event(&self, event: Arc<LogEvent>) {
        self.events.lock().push(event);
    }

    pub fn nr_events(&self) -> usize {
        self.events.lock().len()
    }

    /// Rendered content, one line per event
    pub fn get_buffer(&self) -> String {
        let events = self.events.lock();
        let mut out = String::with_capacity(events.len() * 64);
        for event in events.iter() {
            out.push_str(&event.render());
            out.push('\n');
        }
        out
    }

    /// Remove and return everything accumulated so far
    pub fn take_events(&self) -> Vec<Arc<LogEvent>> {
        std::mem::take(&mut *self.events.lock())
    }

    /// False once the registry no longer lists this buffer
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_level::LogLevel;

    #[test]
    fn test_accumulates_and_renders() {
        let buffer = FileWriterBuffer::new("trans-1");
        buffer.add_event(
            LogEvent::new(LogLevel::Basic, "Start")
                .with_subject("load_orders")
                .with_timestamp_millis(0),
        );
        buffer.add_event(
            LogEvent::new(LogLevel::Basic, "End")
                .with_subject("load_orders")
                .with_timestamp_millis(1000),
        );

        assert_eq!(buffer.nr_events(), 2);
        assert_eq!(
            buffer.get_buffer(),
            "1970/01/01 00:00:00 - load_orders - Start\n1970/01/01 00:00:01 - load_orders - End\n"
        );
    }

    #[test]
    fn test_take_events_drains() {
        let buffer = FileWriterBuffer::new("job-1");
        buffer.add_event(LogEvent::new(LogLevel::Minimal, "hello"));

        let taken = buffer.take_events();
        assert_eq!(taken.len(), 1);
        assert_eq!(buffer.nr_events(), 0);
        assert!(buffer.get_buffer().is_empty());
    }

    #[test]
    fn test_deactivate() {
        let buffer = FileWriterBuffer::new("job-1");
        assert!(buffer.is_active());
        buffer.deactivate();
        assert!(!buffer.is_active());
    }
}
