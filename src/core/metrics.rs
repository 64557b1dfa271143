//! Per-channel performance snapshots
//!
//! START/STOP snapshots are appended to a per-channel [`SnapshotQueue`];
//! MIN/MAX/SUM/COUNT snapshots are folded into a per-channel [`SnapshotMap`]
//! keyed by metric code and subject. Both are created on first access.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

static GLOBAL_METRICS: Lazy<Arc<MetricsRegistry>> = Lazy::new(|| Arc::new(MetricsRegistry::new()));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricsSnapshotType {
    Start,
    Stop,
    Min,
    Max,
    Sum,
    Count,
}

impl MetricsSnapshotType {
    /// Whether snapshots of this type go to the queue rather than the map
    pub fn is_event(&self) -> bool {
        matches!(self, MetricsSnapshotType::Start | MetricsSnapshotType::Stop)
    }
}

/// A named measurement point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Metric {
    pub code: &'static str,
    pub description: &'static str,
    pub snapshot_type: MetricsSnapshotType,
}

impl Metric {
    pub const fn new(
        snapshot_type: MetricsSnapshotType,
        code: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            code,
            description,
            snapshot_type,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.code, self.snapshot_type)
    }
}

pub const METRIC_TRANS_EXECUTION_START: Metric =
    Metric::new(MetricsSnapshotType::Start, "TRANS_EXECUTION", "Execute a transformation");
pub const METRIC_TRANS_EXECUTION_STOP: Metric =
    Metric::new(MetricsSnapshotType::Stop, "TRANS_EXECUTION", "Execute a transformation");
pub const METRIC_STEP_INIT_START: Metric =
    Metric::new(MetricsSnapshotType::Start, "STEP_INIT", "Initialize a step");
pub const METRIC_STEP_INIT_STOP: Metric =
    Metric::new(MetricsSnapshotType::Stop, "STEP_INIT", "Initialize a step");
pub const METRIC_JOB_EXECUTION_START: Metric =
    Metric::new(MetricsSnapshotType::Start, "JOB_EXECUTION", "Execute a job");
pub const METRIC_JOB_EXECUTION_STOP: Metric =
    Metric::new(MetricsSnapshotType::Stop, "JOB_EXECUTION", "Execute a job");

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub metric: Metric,
    pub subject: Option<String>,
    pub value: Option<i64>,
    pub date: DateTime<Utc>,
    pub log_channel_id: String,
}

impl MetricsSnapshot {
    pub fn new(
        metric: Metric,
        subject: Option<String>,
        value: Option<i64>,
        log_channel_id: impl Into<String>,
    ) -> Self {
        Self {
            metric,
            subject,
            value,
            date: Utc::now(),
            log_channel_id: log_channel_id.into(),
        }
    }

    #[must_use]
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    /// `CODE` or `CODE / subject`
    pub fn key(&self) -> String {
        snapshot_key(&self.metric, self.subject.as_deref())
    }
}

pub fn snapshot_key(metric: &Metric, subject: Option<&str>) -> String {
    match subject {
        Some(subject) => format!("{} / {}", metric.code, subject),
        None => metric.code.to_string(),
    }
}

/// Unbounded, thread-safe, insertion-ordered queue of event snapshots
#[derive(Debug, Default)]
pub struct SnapshotQueue {
    inner: Mutex<Vec<MetricsSnapshot>>,
}

impl SnapshotQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, snapshot: MetricsSnapshot) {
        self.inner.lock().push(snapshot);
    }

    /// Copy of the current contents in insertion order
    pub fn snapshot(&self) -> Vec<MetricsSnapshot> {
        self.inner.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

/// Aggregated snapshots keyed by [`MetricsSnapshot::key`]
#[derive(Debug, Default)]
pub struct SnapshotMap {
    inner: DashMap<String, MetricsSnapshot>,
}

impl SnapshotMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `snapshot` into the stored aggregate for its key.
    ///
    /// MIN and MAX keep the extreme value (and its date), SUM adds, COUNT adds
    /// the value or 1 when none is given. Event types replace the entry.
    pub fn apply(&self, snapshot: MetricsSnapshot) {
        let key = snapshot.key();
        match self.inner.entry(key) {
            Entry::Vacant(entry) => {
                let mut snapshot = snapshot;
                if snapshot.metric.snapshot_type == MetricsSnapshotType::Count {
                    snapshot.value = Some(snapshot.value.unwrap_or(1));
                }
                entry.insert(snapshot);
            }
            Entry::Occupied(mut entry) => {
                let stored = entry.get_mut();
                match snapshot.metric.snapshot_type {
                    MetricsSnapshotType::Min => {
                        if let Some(value) = snapshot.value {
                            if stored.value.map_or(true, |current| value < current) {
                                stored.value = Some(value);
                                stored.date = snapshot.date;
                            }
                        }
                    }
                    MetricsSnapshotType::Max => {
                        if let Some(value) = snapshot.value {
                            if stored.value.map_or(true, |current| value > current) {
                                stored.value = Some(value);
                                stored.date = snapshot.date;
                            }
                        }
                    }
                    MetricsSnapshotType::Sum => {
                        if let Some(value) = snapshot.value {
                            stored.value = Some(stored.value.unwrap_or(0).saturating_add(value));
                            stored.date = snapshot.date;
                        }
                    }
                    MetricsSnapshotType::Count => {
                        let increment = snapshot.value.unwrap_or(1);
                        stored.value = Some(stored.value.unwrap_or(0).saturating_add(increment));
                        stored.date = snapshot.date;
                    }
                    MetricsSnapshotType::Start | MetricsSnapshotType::Stop => {
                        *stored = snapshot;
                    }
                }
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<MetricsSnapshot> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    pub fn values(&self) -> Vec<MetricsSnapshot> {
        self.inner.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Time spent between matching START and STOP snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsDuration {
    pub code: &'static str,
    pub description: &'static str,
    pub subject: Option<String>,
    pub log_channel_id: String,
    /// START date of the first pair
    pub date: DateTime<Utc>,
    /// STOP date of the last pair
    pub end_date: DateTime<Utc>,
    pub duration_ms: i64,
    pub count: u64,
}

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    snapshot_lists: DashMap<String, Arc<SnapshotQueue>>,
    snapshot_maps: DashMap<String, Arc<SnapshotMap>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, created on first access
    pub fn instance() -> Arc<MetricsRegistry> {
        Arc::clone(&GLOBAL_METRICS)
    }

    /// The queue for `channel_id`, created if absent. Concurrent first callers
    /// all receive the same queue.
    pub fn get_snapshot_list(&self, channel_id: &str) -> Arc<SnapshotQueue> {
        if let Some(queue) = self.snapshot_lists.get(channel_id) {
            return Arc::clone(queue.value());
        }
        Arc::clone(
            self.snapshot_lists
                .entry(channel_id.to_string())
                .or_default()
                .value(),
        )
    }

    pub fn get_snapshot_map(&self, channel_id: &str) -> Arc<SnapshotMap> {
        if let Some(map) = self.snapshot_maps.get(channel_id) {
            return Arc::clone(map.value());
        }
        Arc::clone(
            self.snapshot_maps
                .entry(channel_id.to_string())
                .or_default()
                .value(),
        )
    }

    pub fn get_snapshot_lists(&self) -> HashMap<String, Arc<SnapshotQueue>> {
        self.snapshot_lists
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    pub fn get_snapshot_maps(&self) -> HashMap<String, Arc<SnapshotMap>> {
        self.snapshot_maps
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    /// Route a snapshot to the queue or the map of its channel
    pub fn add_snapshot(&self, snapshot: MetricsSnapshot) {
        if snapshot.metric.snapshot_type.is_event() {
            self.get_snapshot_list(&snapshot.log_channel_id).push(snapshot);
        } else {
            let map = self.get_snapshot_map(&snapshot.log_channel_id);
            map.apply(snapshot);
        }
    }

    /// Pair START and STOP snapshots of `channel_id` per metric code and
    /// subject, in queue order. Unmatched STARTs are ignored.
    pub fn get_durations(&self, channel_id: &str) -> Vec<MetricsDuration> {
        let Some(queue) = self
            .snapshot_lists
            .get(channel_id)
            .map(|entry| Arc::clone(entry.value()))
        else {
            return Vec::new();
        };

        let mut open: HashMap<(&'static str, Option<String>), Vec<MetricsSnapshot>> =
            HashMap::new();
        let mut order: Vec<(&'static str, Option<String>)> = Vec::new();
        let mut totals: HashMap<(&'static str, Option<String>), MetricsDuration> = HashMap::new();

        for snapshot in queue.snapshot() {
            let key = (snapshot.metric.code, snapshot.subject.clone());
            match snapshot.metric.snapshot_type {
                MetricsSnapshotType::Start => open.entry(key).or_default().push(snapshot),
                MetricsSnapshotType::Stop => {
                    let Some(start) = open.get_mut(&key).and_then(|starts| {
                        (!starts.is_empty()).then(|| starts.remove(0))
                    }) else {
                        continue;
                    };
                    let elapsed = (snapshot.date - start.date).num_milliseconds();
                    match totals.get_mut(&key) {
                        Some(total) => {
                            total.duration_ms += elapsed;
                            total.count += 1;
                            total.end_date = snapshot.date;
                        }
                        None => {
                            order.push(key.clone());
                            totals.insert(
                                key,
                                MetricsDuration {
                                    code: start.metric.code,
                                    description: start.metric.description,
                                    subject: start.subject.clone(),
                                    log_channel_id: channel_id.to_string(),
                                    date: start.date,
                                    end_date: snapshot.date,
                                    duration_ms: elapsed,
                                    count: 1,
                                },
                            );
                        }
                    }
                }
                _ => {}
            }
        }

        order
            .into_iter()
            .filter_map(|key| totals.remove(&key))
            .collect()
    }

    /// Forget every tracked channel
    pub fn reset(&self) {
        self.snapshot_lists.clear();
        self.snapshot_maps.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ROWS_MAX: Metric = Metric::new(MetricsSnapshotType::Max, "ROWS", "Rows in buffer");
    const ROWS_MIN: Metric = Metric::new(MetricsSnapshotType::Min, "ROWS", "Rows in buffer");
    const ROWS_SUM: Metric = Metric::new(MetricsSnapshotType::Sum, "ROWS_READ", "Rows read");
    const CALLS: Metric = Metric::new(MetricsSnapshotType::Count, "CALLS", "Lookups");

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn test_snapshot_list_is_shared() {
        let registry = MetricsRegistry::new();
        let a = registry.get_snapshot_list("chan");
        let b = registry.get_snapshot_list("chan");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &registry.get_snapshot_list("other")));
    }

    #[test]
    fn test_aggregates() {
        let registry = MetricsRegistry::new();
        for value in [5, 2, 9] {
            registry.add_snapshot(MetricsSnapshot::new(ROWS_MAX, None, Some(value), "c"));
            registry.add_snapshot(MetricsSnapshot::new(
                ROWS_MIN,
                Some("in".into()),
                Some(value),
                "c",
            ));
            registry.add_snapshot(MetricsSnapshot::new(ROWS_SUM, None, Some(value), "c"));
            registry.add_snapshot(MetricsSnapshot::new(CALLS, None, None, "c"));
        }

        let map = registry.get_snapshot_map("c");
        assert_eq!(map.get("ROWS").and_then(|s| s.value), Some(9));
        assert_eq!(map.get("ROWS / in").and_then(|s| s.value), Some(2));
        assert_eq!(map.get("ROWS_READ").and_then(|s| s.value), Some(16));
        assert_eq!(map.get("CALLS").and_then(|s| s.value), Some(3));
        assert!(registry.get_snapshot_list("c").is_empty());
    }

    #[test]
    fn test_durations_pair_start_and_stop() {
        let registry = MetricsRegistry::new();
        let events = [
            (METRIC_STEP_INIT_START, "Sort", 0),
            (METRIC_STEP_INIT_START, "Join", 5),
            (METRIC_STEP_INIT_STOP, "Sort", 40),
            (METRIC_STEP_INIT_STOP, "Join", 25),
            (METRIC_STEP_INIT_START, "Sort", 100),
            (METRIC_STEP_INIT_STOP, "Sort", 110),
        ];
        for (metric, subject, millis) in events {
            registry.add_snapshot(
                MetricsSnapshot::new(metric, Some(subject.into()), None, "trans")
                    .with_date(at(millis)),
            );
        }

        let durations = registry.get_durations("trans");
        assert_eq!(durations.len(), 2);
        assert_eq!(durations[0].subject.as_deref(), Some("Sort"));
        assert_eq!(durations[0].duration_ms, 50);
        assert_eq!(durations[0].count, 2);
        assert_eq!(durations[1].duration_ms, 20);
        assert!(registry.get_durations("unknown").is_empty());
    }

    #[test]
    fn test_reset_clears_everything() {
        let registry = MetricsRegistry::new();
        registry.get_snapshot_list("a").push(MetricsSnapshot::new(
            METRIC_JOB_EXECUTION_START,
            None,
            None,
            "a",
        ));
        registry.get_snapshot_map("b");

        registry.reset();

        assert!(registry.get_snapshot_lists().is_empty());
        assert!(registry.get_snapshot_maps().is_empty());
    }
}
