//! Process-wide registry of log channels
//!
//! Records are kept in an arena keyed by channel id; the hierarchy lives in a
//! separate parent id -> child ids index. An identity index answers
//! "was this unit of work registered before" without scanning the arena.
//!
//! All maps are `DashMap`s. No code path holds a guard on one map while
//! taking a guard on another, except registration, which holds its identity
//! index entry while inserting into the arena, the children index and the
//! purge queue, always in that order.

mod purge;

use purge::PurgeTimer;

use super::config::RegistryConfig;
use super::file_writer_buffer::FileWriterBuffer;
use super::log_buffer::LogBuffer;
use super::logging_object::{IdentityKey, LoggingObject, LoggingSource};
use super::registry_stats::RegistryStats;
use chrono::{DateTime, TimeZone, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

static GLOBAL_REGISTRY: Lazy<Arc<ChannelRegistry>> = Lazy::new(|| {
    let registry = ChannelRegistry::new(RegistryConfig::from_env());
    registry.attach_log_buffer(LogBuffer::instance());
    registry
});

/// Upper bound on parent hops when resolving ancestors
const MAX_ANCESTOR_DEPTH: usize = 1024;

pub struct ChannelRegistry {
    weak_self: Weak<ChannelRegistry>,
    objects: DashMap<String, LoggingObject>,
    children: DashMap<String, Vec<String>>,
    index: DashMap<IdentityKey, String>,
    file_writer_buffers: DashMap<String, Arc<FileWriterBuffer>>,
    /// Purge-eligible ids in registration order
    purge_queue: Mutex<VecDeque<String>>,
    max_size: AtomicUsize,
    purge_timeout_ms: AtomicU64,
    max_age: RwLock<Option<Duration>>,
    /// Microseconds since the epoch; 0 until the first modification
    last_modification: AtomicI64,
    log_buffer: RwLock<Option<Arc<LogBuffer>>>,
    timer: Mutex<Option<PurgeTimer>>,
    stats: RegistryStats,
}

impl ChannelRegistry {
    /// Create an independent registry and start its purge timer.
    pub fn new(config: RegistryConfig) -> Arc<Self> {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                eprintln!("[LOG REGISTRY WARNING] {}. Falling back to defaults.", e);
                RegistryConfig::default()
            }
        };

        let registry = Arc::new_cyclic(|weak| ChannelRegistry {
            weak_self: weak.clone(),
            objects: DashMap::new(),
            children: DashMap::new(),
            index: DashMap::new(),
            file_writer_buffers: DashMap::new(),
            purge_queue: Mutex::new(VecDeque::new()),
            max_size: AtomicUsize::new(config.max_size),
            purge_timeout_ms: AtomicU64::new(config.purge_timeout.as_millis() as u64),
            max_age: RwLock::new(config.max_age),
            last_modification: AtomicI64::new(0),
            log_buffer: RwLock::new(None),
            timer: Mutex::new(None),
            stats: RegistryStats::new(),
        });
        registry.install_purge_timer();
        registry
    }

    /// The process-wide registry, created on first access and wired to
    /// [`LogBuffer::instance`].
    pub fn instance() -> Arc<ChannelRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Buffer whose lines are dropped together with purged channels
    pub fn attach_log_buffer(&self, buffer: Arc<LogBuffer>) {
        *self.log_buffer.write() = Some(buffer);
    }

    pub fn log_buffer(&self) -> Option<Arc<LogBuffer>> {
        self.log_buffer.read().clone()
    }

    /// Register a purge-eligible source
    pub fn register(&self, source: &(impl LoggingSource + ?Sized)) -> String {
        self.register_logging_source(source, true)
    }

    /// Return the channel id for `source`, reusing the id of an identical live
    /// registration (same type, name, copy, filename, object id, container
    /// and parent channel).
    pub fn register_logging_source(
        &self,
        source: &(impl LoggingSource + ?Sized),
        purgeable: bool,
    ) -> String {
        let Some(key) = IdentityKey::of(source) else {
            return self.insert_record(source, purgeable);
        };

        match self.index.entry(key) {
            Entry::Occupied(mut entry) => {
                let now = self.stamp_modification();
                if let Some(mut existing) = self.objects.get_mut(entry.get()) {
                    existing.touch(now);
                    self.stats.record_reused();
                    return entry.get().clone();
                }
                // Index entry outlived its record; the removal path will not
                // touch it again once it points at a new id.
                let id = self.insert_record(source, purgeable);
                entry.insert(id.clone());
                id
            }
            Entry::Vacant(entry) => {
                let id = self.insert_record(source, purgeable);
                entry.insert(id.clone());
                id
            }
        }
    }

    fn insert_record(&self, source: &(impl LoggingSource + ?Sized), purgeable: bool) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let now = self.stamp_modification();
        let object = LoggingObject::from_source(id.clone(), source, purgeable, now);
        let parent = object.parent_channel_id().map(str::to_string);

        self.objects.insert(id.clone(), object);
        if let Some(parent) = parent {
            self.children.entry(parent).or_default().push(id.clone());
        }
        if purgeable {
            self.purge_queue.lock().push_back(id.clone());
        }
        self.stats.record_registration();
        id
    }

    /// A live record registered for the same identity as `source`
    pub fn find_existing_logging_source(
        &self,
        source: &(impl LoggingSource + ?Sized),
    ) -> Option<LoggingObject> {
        let key = IdentityKey::of(source)?;
        let id = self.index.get(&key).map(|entry| entry.value().clone())?;
        self.get_logging_object(&id)
    }

    pub fn get_logging_object(&self, id: &str) -> Option<LoggingObject> {
        self.objects.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    pub fn size(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Snapshot of every record keyed by channel id
    pub fn logging_objects(&self) -> HashMap<String, LoggingObject> {
        self.objects
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Direct children of `id`
    pub fn get_child_ids(&self, id: &str) -> Vec<String> {
        self.children
            .get(id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// `id` followed by all of its descendants in pre-order
    pub fn get_log_channel_children(&self, id: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![id.to_string()];

        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let kids = self.get_child_ids(&current);
            result.push(current);
            stack.extend(kids.into_iter().rev());
        }
        result
    }

    /// Remove `id` and every descendant, together with their file writer
    /// buffers. Returns the ids that were actually registered.
    pub fn remove_including_children(&self, id: &str) -> Vec<String> {
        let ids = self.get_log_channel_children(id);
        let mut removed = Vec::with_capacity(ids.len());

        for channel_id in &ids {
            if let Some((_, buffer)) = self.file_writer_buffers.remove(channel_id) {
                buffer.deactivate();
            }
            if self.remove_record(channel_id).is_some() {
                removed.push(channel_id.clone());
            }
            self.children.remove(channel_id);
        }

        if !removed.is_empty() {
            let gone: HashSet<&str> = removed.iter().map(String::as_str).collect();
            self.purge_queue.lock().retain(|queued| !gone.contains(queued.as_str()));
            self.stats.record_cascade_removed(removed.len() as u64);
            self.stamp_modification();
        }
        removed
    }

    /// Drop one record from the arena, the identity index and its parent's
    /// child list. The record's own child list is dropped too.
    fn remove_record(&self, id: &str) -> Option<LoggingObject> {
        let (_, object) = self.objects.remove(id)?;

        if let Some(key) = IdentityKey::of(&object) {
            self.index.remove_if(&key, |_, mapped| mapped == id);
        }
        self.children.remove(id);

        if let Some(parent) = object.parent_channel_id() {
            if let Some(mut siblings) = self.children.get_mut(parent) {
                siblings.retain(|child| child != id);
            }
            self.children.remove_if(parent, |_, siblings| siblings.is_empty());
        }
        Some(object)
    }

    pub fn register_file_writer_buffer(&self, buffer: Arc<FileWriterBuffer>) {
        let id = buffer.log_channel_id().to_string();
        if let Some(previous) = self.file_writer_buffers.insert(id, buffer) {
            previous.deactivate();
        }
    }

    pub fn remove_file_writer_buffer(&self, id: &str) -> Option<Arc<FileWriterBuffer>> {
        let (_, buffer) = self.file_writer_buffers.remove(id)?;
        buffer.deactivate();
        Some(buffer)
    }

    /// The buffer registered on `id`, or on its nearest ancestor
    pub fn get_file_writer_buffer(&self, id: &str) -> Option<Arc<FileWriterBuffer>> {
        if self.file_writer_buffers.is_empty() {
            return None;
        }

        let mut current = id.to_string();
        for _ in 0..MAX_ANCESTOR_DEPTH {
            if let Some(buffer) = self.file_writer_buffers.get(&current) {
                return Some(Arc::clone(buffer.value()));
            }
            let parent = self
                .objects
                .get(&current)
                .and_then(|object| object.parent_channel_id().map(str::to_string))?;
            current = parent;
        }
        None
    }

    pub fn file_writer_buffer_ids(&self) -> Vec<String> {
        self.file_writer_buffers
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Strictly increasing modification stamp
    fn stamp_modification(&self) -> DateTime<Utc> {
        let now = Utc::now().timestamp_micros();
        let previous = self
            .last_modification
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or(now);
        let stamped = now.max(previous + 1);
        Utc.timestamp_micros(stamped).single().unwrap_or_else(Utc::now)
    }

    /// Time of the latest registration, re-registration or removal
    pub fn get_last_modification_time(&self) -> Option<DateTime<Utc>> {
        match self.last_modification.load(Ordering::SeqCst) {
            0 => None,
            micros => Utc.timestamp_micros(micros).single(),
        }
    }

    /// Diagnostic listing, one line per record in registration order:
    /// `id [TYPE] name <- [TYPE] parent <- ...`.
    ///
    /// Without `include_gone`, records with a purged or removed ancestor are
    /// skipped; with it they are listed and the missing link is shown as
    /// `<gone:ID>`.
    pub fn dump(&self, include_gone: bool) -> Vec<String> {
        let snapshot = self.logging_objects();
        let mut records: Vec<&LoggingObject> = snapshot.values().collect();
        records.sort_by_key(|object| object.registration_date());

        let mut lines = Vec::with_capacity(records.len());
        for object in records {
            let mut line = format!(
                "{} [{}] {}",
                object.log_channel_id(),
                object.object_type(),
                object.generated_name()
            );
            let mut broken = false;
            let mut parent = object.parent_channel_id();
            let mut depth = 0;

            while let Some(parent_id) = parent {
                depth += 1;
                if depth > MAX_ANCESTOR_DEPTH {
                    break;
                }
                match snapshot.get(parent_id) {
                    Some(p) => {
                        line.push_str(&format!(" <- [{}] {}", p.object_type(), p.generated_name()));
                        parent = p.parent_channel_id();
                    }
                    None => {
                        line.push_str(&format!(" <- <gone:{}>", parent_id));
                        broken = true;
                        break;
                    }
                }
            }

            if include_gone || !broken {
                lines.push(line);
            }
        }
        lines
    }

    pub fn max_size(&self) -> usize {
        self.max_size.load(Ordering::Relaxed)
    }

    /// 0 disables size-based purging
    pub fn set_max_size(&self, max_size: usize) {
        self.max_size.store(max_size, Ordering::Relaxed);
    }

    pub fn purge_timeout(&self) -> Duration {
        Duration::from_millis(self.purge_timeout_ms.load(Ordering::Relaxed))
    }

    /// Change the purge interval; the timer is replaced. Zero is ignored.
    pub fn set_purge_timeout(&self, timeout: Duration) {
        if timeout.is_zero() {
            eprintln!("[LOG REGISTRY WARNING] Ignoring zero purge timeout");
            return;
        }
        self.purge_timeout_ms
            .store(timeout.as_millis() as u64, Ordering::Relaxed);
        self.install_purge_timer();
    }

    pub fn max_age(&self) -> Option<Duration> {
        *self.max_age.read()
    }

    pub fn set_max_age(&self, max_age: Option<Duration>) {
        *self.max_age.write() = max_age.filter(|age| !age.is_zero());
    }

    pub fn purge_queue_ids(&self) -> Vec<String> {
        self.purge_queue.lock().iter().cloned().collect()
    }

    pub fn is_queued_for_purge(&self, id: &str) -> bool {
        self.purge_queue.lock().iter().any(|queued| queued == id)
    }

    pub fn purge_queue_len(&self) -> usize {
        self.purge_queue.lock().len()
    }

    /// Identity of the installed purge timer; changes on every replacement
    pub fn purge_timer_id(&self) -> Option<u64> {
        self.timer.lock().as_ref().map(PurgeTimer::id)
    }

    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }

    /// Forget every channel and buffer, and replace the purge timer.
    pub fn reset(&self) {
        for entry in self.file_writer_buffers.iter() {
            entry.value().deactivate();
        }
        self.file_writer_buffers.clear();
        self.objects.clear();
        self.children.clear();
        self.index.clear();
        self.purge_queue.lock().clear();
        self.last_modification.store(0, Ordering::SeqCst);
        self.stats.reset();
        self.install_purge_timer();
    }

    fn install_purge_timer(&self) {
        let timer = PurgeTimer::start(self.weak_self.clone(), self.purge_timeout());
        let previous = self.timer.lock().replace(timer);
        if let Some(previous) = previous {
            previous.stop();
        }
    }
}

impl Drop for ChannelRegistry {
    fn drop(&mut self) {
        // Never join here: the last strong reference may be the timer's own.
        if let Some(timer) = self.timer.get_mut().take() {
            timer.stop();
        }
    }
}
