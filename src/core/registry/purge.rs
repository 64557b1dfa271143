//! Periodic reclamation of finished channels
//!
//! A purge cycle walks the purge queue from the oldest registration. It stops
//! as soon as the registry is below its size cap and the front record is not
//! older than `max_age`. Records covered by a file writer buffer, on
//! themselves or an ancestor, are put back on the queue untouched, so a cycle
//! where every candidate is covered removes nothing.

use super::ChannelRegistry;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;
use std::thread;
use std::time::Duration;

static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

/// Background thread that calls [`ChannelRegistry::purge`] at a fixed interval.
///
/// The thread holds only a weak reference and exits when its stop channel is
/// closed or the registry has been dropped.
pub(crate) struct PurgeTimer {
    id: u64,
    stop: Option<Sender<()>>,
}

impl PurgeTimer {
    pub(crate) fn start(registry: Weak<ChannelRegistry>, interval: Duration) -> Self {
        let id = NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed);
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let spawned = thread::Builder::new()
            .name(format!("log-registry-purge-{}", id))
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let Some(registry) = registry.upgrade() else {
                            break;
                        };
                        let tick = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                            registry.purge()
                        }));
                        if tick.is_err() {
                            eprintln!(
                                "[LOG REGISTRY CRITICAL] Purge cycle panicked; \
                                 the timer keeps running."
                            );
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            });

        if let Err(e) = spawned {
            eprintln!(
                "[LOG REGISTRY ERROR] Failed to start purge timer: {}. \
                 Channels are only purged on explicit purge() calls.",
                e
            );
        }

        Self {
            id,
            stop: Some(stop_tx),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Signal the thread to exit without waiting for it; a tick already in
    /// progress runs to completion.
    pub(crate) fn stop(mut self) {
        self.stop.take();
    }
}

impl ChannelRegistry {
    /// Run one purge cycle and return the number of records removed.
    pub fn purge(&self) -> usize {
        let now = Utc::now();
        let max_size = self.max_size();
        // An age reaching past the representable range makes nothing stale
        let stale_before: Option<DateTime<Utc>> = self
            .max_age()
            .and_then(|age| chrono::Duration::from_std(age).ok())
            .and_then(|age| now.checked_sub_signed(age));

        let mut deferred: Vec<String> = Vec::new();
        let mut removed: HashSet<String> = HashSet::new();

        loop {
            let Some(id) = self.purge_queue.lock().pop_front() else {
                break;
            };
            let Some(object) = self.get_logging_object(&id) else {
                // Already removed by a cascade
                continue;
            };

            let over_size = max_size > 0 && self.size() >= max_size;
            let stale = stale_before.is_some_and(|boundary| object.last_modified() < boundary);
            if !over_size && !stale {
                self.purge_queue.lock().push_front(id);
                break;
            }

            if self.get_file_writer_buffer(&id).is_some() {
                deferred.push(id);
                continue;
            }

            if self.remove_record(&id).is_some() {
                removed.insert(id);
            }
        }

        if !deferred.is_empty() {
            self.stats.record_blocked(deferred.len() as u64);
            let mut queue = self.purge_queue.lock();
            for id in deferred.into_iter().rev() {
                queue.push_front(id);
            }
        }

        if let Some(buffer) = self.log_buffer() {
            buffer.remove_lines_for_channels(&removed);
            buffer.remove_expired_lines(now);
        }

        let purged = removed.len();
        self.stats.record_purge_cycle();
        if purged > 0 {
            self.stats.record_purged(purged as u64);
        }
        purged
    }

    /// Cumulative number of records removed by purge cycles
    pub fn purged_object_count(&self) -> u64 {
        self.stats.purged_objects()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{LogBufferConfig, RegistryConfig};
    use crate::core::file_writer_buffer::FileWriterBuffer;
    use crate::core::log_buffer::LogBuffer;
    use crate::core::log_event::LogEvent;
    use crate::core::log_level::LogLevel;
    use crate::core::logging_object::SimpleLoggingObject;
    use crate::core::object_type::LoggingObjectType;
    use std::sync::Arc;

    fn registry(max_size: usize) -> Arc<ChannelRegistry> {
        ChannelRegistry::new(
            RegistryConfig::new()
                .with_max_size(max_size)
                .with_purge_timeout(Duration::from_secs(3600)),
        )
    }

    fn register_steps(registry: &ChannelRegistry, count: usize) -> Vec<String> {
        (0..count)
            .map(|i| {
                registry.register(&SimpleLoggingObject::new(
                    format!("step-{}", i),
                    LoggingObjectType::Step,
                ))
            })
            .collect()
    }

    #[test]
    fn test_purge_shrinks_below_max_size() {
        let registry = registry(10);
        let ids = register_steps(&registry, 20);

        let purged = registry.purge();

        assert!(registry.size() < 10);
        assert_eq!(purged, 20 - registry.size());
        assert_eq!(registry.purged_object_count(), purged as u64);
        // Oldest registrations go first
        assert!(!registry.contains(&ids[0]));
        assert!(registry.contains(&ids[19]));
    }

    #[test]
    fn test_purge_blocked_by_file_writer_buffers() {
        let registry = registry(10);
        let ids = register_steps(&registry, 20);
        for id in &ids {
            registry.register_file_writer_buffer(Arc::new(FileWriterBuffer::new(id.clone())));
        }

        assert_eq!(registry.purge(), 0);
        assert_eq!(registry.size(), 20);
        assert_eq!(registry.purged_object_count(), 0);
        assert_eq!(registry.purge_queue_ids(), ids);
        assert_eq!(registry.stats().blocked_candidates(), 20);
    }

    #[test]
    fn test_buffer_on_ancestor_protects_descendants() {
        let registry = registry(3);
        let job = registry.register(&SimpleLoggingObject::new("job", LoggingObjectType::Job));
        let trans = registry.register(
            &SimpleLoggingObject::new("trans", LoggingObjectType::Trans).with_parent_id(&job),
        );
        let loose = register_steps(&registry, 3);
        registry.register_file_writer_buffer(Arc::new(FileWriterBuffer::new(job.clone())));

        let purged = registry.purge();

        assert!(registry.contains(&job));
        assert!(registry.contains(&trans));
        assert_eq!(purged, 3);
        assert!(loose.iter().all(|id| !registry.contains(id)));
        assert_eq!(registry.purge_queue_ids(), vec![job, trans]);
    }

    #[test]
    fn test_non_purgeable_records_survive() {
        let registry = registry(2);
        let kept: Vec<String> = (0..4)
            .map(|i| registry.register_logging_source(&format!("server-{}", i), false))
            .collect();

        assert_eq!(registry.purge(), 0);
        assert!(kept.iter().all(|id| registry.contains(id)));
    }

    #[test]
    fn test_purge_under_limit_is_noop() {
        let registry = registry(100);
        register_steps(&registry, 5);
        assert_eq!(registry.purge(), 0);
        assert_eq!(registry.purge_queue_len(), 5);
    }

    #[test]
    fn test_stale_records_are_purged() {
        let registry = registry(0);
        let ids = register_steps(&registry, 3);
        registry.set_max_age(Some(Duration::from_millis(1)));
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(registry.purge(), 3);
        assert!(ids.iter().all(|id| !registry.contains(id)));
    }

    #[test]
    fn test_purge_drops_buffered_lines() {
        let registry = registry(1);
        let buffer = Arc::new(LogBuffer::new(0));
        registry.attach_log_buffer(Arc::clone(&buffer));

        let ids = register_steps(&registry, 2);
        for id in &ids {
            buffer.add_event(LogEvent::new(LogLevel::Basic, "row").with_channel(id.clone()));
        }

        assert_eq!(registry.purge(), 2);
        assert_eq!(buffer.nr_lines(), 0);
    }

    #[test]
    fn test_purge_drops_expired_buffer_lines() {
        let registry = registry(0);
        let buffer = Arc::new(LogBuffer::with_config(
            LogBufferConfig::default()
                .with_max_lines(0)
                .with_max_age(Duration::from_secs(60)),
        ));
        registry.attach_log_buffer(Arc::clone(&buffer));

        let old = Utc::now().timestamp_millis() - 10 * 60 * 1000;
        for i in 0..3 {
            buffer.add_event(LogEvent::new(LogLevel::Basic, "old").with_timestamp_millis(old + i));
        }
        buffer.add_event(LogEvent::new(LogLevel::Basic, "fresh"));
        assert_eq!(buffer.nr_lines(), 4);

        assert_eq!(registry.purge(), 0);
        assert_eq!(buffer.nr_lines(), 1);
        let kept: Vec<String> = buffer
            .buffer_iter()
            .map(|l| l.event().message.clone())
            .collect();
        assert_eq!(kept, vec!["fresh".to_string()]);
    }

    #[test]
    fn test_huge_max_age_keeps_everything() {
        let registry = registry(0);
        let buffer = Arc::new(LogBuffer::new(0));
        registry.attach_log_buffer(Arc::clone(&buffer));
        let huge = Duration::from_secs(1_000_000 * 365 * 86_400);
        registry.set_max_age(Some(huge));
        buffer.set_max_age(Some(huge));

        let ids = register_steps(&registry, 3);
        buffer.add_event(LogEvent::new(LogLevel::Basic, "ancient").with_timestamp_millis(0));

        assert_eq!(registry.purge(), 0);
        assert!(ids.iter().all(|id| registry.contains(id)));
        assert_eq!(buffer.nr_lines(), 1);
        assert_eq!(buffer.remove_expired_lines(Utc::now()), 0);
    }

    #[test]
    fn test_timer_purges_in_background() {
        let registry = ChannelRegistry::new(
            RegistryConfig::new()
                .with_max_size(5)
                .with_purge_timeout(Duration::from_millis(20)),
        );
        register_steps(&registry, 12);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while registry.size() >= 5 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(registry.size() < 5);
    }
}
