//! Identity records for log channels
//!
//! Anything that wants a channel implements [`LoggingSource`]. The registry
//! copies the source into a [`LoggingObject`] record at registration time and
//! only ever refers to parents by channel id, so records never point at each
//! other directly.

use super::hooks::LogHooks;
use super::log_level::LogLevel;
use super::object_type::LoggingObjectType;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Capability set of an object that can own a log channel
pub trait LoggingSource: Send + Sync {
    fn object_name(&self) -> Option<&str>;

    fn object_type(&self) -> LoggingObjectType;

    /// Copy number for steps that run in several parallel copies
    fn object_copy(&self) -> Option<&str> {
        None
    }

    fn parent_channel_id(&self) -> Option<&str> {
        None
    }

    /// Channel id already assigned to this source, if any
    fn log_channel_id(&self) -> Option<&str> {
        None
    }

    fn log_level(&self) -> Option<LogLevel> {
        None
    }

    /// Execution id of the container (e.g. a server run) hosting this object
    fn container_object_id(&self) -> Option<&str> {
        None
    }

    fn filename(&self) -> Option<&str> {
        None
    }

    fn repository_path(&self) -> Option<&str> {
        None
    }

    fn object_id(&self) -> Option<&str> {
        None
    }

    fn is_gathering_metrics(&self) -> bool {
        false
    }

    fn hooks(&self) -> Option<LogHooks> {
        None
    }
}

impl LoggingSource for str {
    fn object_name(&self) -> Option<&str> {
        Some(self)
    }

    fn object_type(&self) -> LoggingObjectType {
        LoggingObjectType::General
    }
}

impl LoggingSource for String {
    fn object_name(&self) -> Option<&str> {
        Some(self.as_str())
    }

    fn object_type(&self) -> LoggingObjectType {
        LoggingObjectType::General
    }
}

/// Key under which the registry recognizes a previously registered source.
///
/// The parent is part of the key by channel id, and a parent's own id was
/// resolved through its key, so equal keys imply equal parent chains.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct IdentityKey {
    object_type: LoggingObjectType,
    name: Option<String>,
    copy: Option<String>,
    filename: Option<String>,
    repository_path: Option<String>,
    object_id: Option<String>,
    container_object_id: Option<String>,
    parent_id: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|s| !s.is_empty()).map(str::to_string)
}

impl IdentityKey {
    /// Returns `None` for anonymous sources, which are never deduplicated.
    pub(crate) fn of(source: &(impl LoggingSource + ?Sized)) -> Option<Self> {
        let key = Self {
            object_type: source.object_type(),
            name: non_empty(source.object_name()),
            copy: non_empty(source.object_copy()),
            filename: non_empty(source.filename()),
            repository_path: non_empty(source.repository_path()),
            object_id: non_empty(source.object_id()),
            container_object_id: non_empty(source.container_object_id()),
            parent_id: non_empty(source.parent_channel_id()),
        };
        if key.name.is_none() && key.filename.is_none() && key.object_id.is_none() {
            return None;
        }
        Some(key)
    }
}

/// The registry's record of one channel
#[derive(Debug, Clone, Serialize)]
pub struct LoggingObject {
    log_channel_id: String,
    parent_channel_id: Option<String>,
    object_type: LoggingObjectType,
    object_name: Option<String>,
    object_copy: Option<String>,
    filename: Option<String>,
    repository_path: Option<String>,
    object_id: Option<String>,
    container_object_id: Option<String>,
    log_level: Option<LogLevel>,
    gathering_metrics: bool,
    purgeable: bool,
    registration_date: DateTime<Utc>,
    last_modified: DateTime<Utc>,
}

impl LoggingObject {
    pub(crate) fn from_source(
        log_channel_id: String,
        source: &(impl LoggingSource + ?Sized),
        purgeable: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            log_channel_id,
            parent_channel_id: non_empty(source.parent_channel_id()),
            object_type: source.object_type(),
            object_name: source.object_name().map(str::to_string),
            object_copy: non_empty(source.object_copy()),
            filename: non_empty(source.filename()),
            repository_path: non_empty(source.repository_path()),
            object_id: non_empty(source.object_id()),
            container_object_id: non_empty(source.container_object_id()),
            log_level: source.log_level(),
            gathering_metrics: source.is_gathering_metrics(),
            purgeable,
            registration_date: now,
            last_modified: now,
        }
    }

    pub fn log_channel_id(&self) -> &str {
        &self.log_channel_id
    }

    pub fn parent_channel_id(&self) -> Option<&str> {
        self.parent_channel_id.as_deref()
    }

    pub fn object_type(&self) -> LoggingObjectType {
        self.object_type
    }

    pub fn object_name(&self) -> Option<&str> {
        self.object_name.as_deref()
    }

    pub fn object_copy(&self) -> Option<&str> {
        self.object_copy.as_deref()
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn repository_path(&self) -> Option<&str> {
        self.repository_path.as_deref()
    }

    pub fn is_purgeable(&self) -> bool {
        self.purgeable
    }

    pub fn registration_date(&self) -> DateTime<Utc> {
        self.registration_date
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.last_modified = now;
    }

    /// Display name: `name`, or `name.copy` for step copies
    pub fn generated_name(&self) -> String {
        let name = self.object_name.as_deref().unwrap_or("-");
        match self.object_copy {
            Some(ref copy) => format!("{}.{}", name, copy),
            None => name.to_string(),
        }
    }
}

impl PartialEq for LoggingObject {
    fn eq(&self, other: &Self) -> bool {
        self.log_channel_id == other.log_channel_id
            && self.filename == other.filename
            && self.parent_channel_id == other.parent_channel_id
            && self.object_type == other.object_type
            && self.generated_name() == other.generated_name()
    }
}

impl Eq for LoggingObject {}

impl LoggingSource for LoggingObject {
    fn object_name(&self) -> Option<&str> {
        self.object_name.as_deref()
    }

    fn object_type(&self) -> LoggingObjectType {
        self.object_type
    }

    fn object_copy(&self) -> Option<&str> {
        self.object_copy.as_deref()
    }

    fn parent_channel_id(&self) -> Option<&str> {
        self.parent_channel_id.as_deref()
    }

    fn log_channel_id(&self) -> Option<&str> {
        Some(&self.log_channel_id)
    }

    fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    fn container_object_id(&self) -> Option<&str> {
        self.container_object_id.as_deref()
    }

    fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    fn repository_path(&self) -> Option<&str> {
        self.repository_path.as_deref()
    }

    fn object_id(&self) -> Option<&str> {
        self.object_id.as_deref()
    }

    fn is_gathering_metrics(&self) -> bool {
        self.gathering_metrics
    }
}

/// General-purpose source for callers that have no richer object of their own
#[derive(Debug, Clone, Default)]
pub struct SimpleLoggingObject {
    name: Option<String>,
    object_type: LoggingObjectType,
    copy: Option<String>,
    parent_id: Option<String>,
    log_channel_id: Option<String>,
    log_level: Option<LogLevel>,
    container_object_id: Option<String>,
    filename: Option<String>,
    repository_path: Option<String>,
    object_id: Option<String>,
    gathering_metrics: bool,
}

impl SimpleLoggingObject {
    pub fn new(name: impl Into<String>, object_type: LoggingObjectType) -> Self {
        Self {
            name: Some(name.into()),
            object_type,
            ..Default::default()
        }
    }

    /// Owned copy of every identity field of `source`
    pub fn from_source(source: &(impl LoggingSource + ?Sized)) -> Self {
        Self {
            name: source.object_name().map(str::to_string),
            object_type: source.object_type(),
            copy: source.object_copy().map(str::to_string),
            parent_id: source.parent_channel_id().map(str::to_string),
            log_channel_id: source.log_channel_id().map(str::to_string),
            log_level: source.log_level(),
            container_object_id: source.container_object_id().map(str::to_string),
            filename: source.filename().map(str::to_string),
            repository_path: source.repository_path().map(str::to_string),
            object_id: source.object_id().map(str::to_string),
            gathering_metrics: source.is_gathering_metrics(),
        }
    }

    /// Attach to a parent, inheriting its channel id, level and container id
    #[must_use]
    pub fn with_parent(mut self, parent: &(impl LoggingSource + ?Sized)) -> Self {
        self.parent_id = parent.log_channel_id().map(str::to_string);
        if self.log_level.is_none() {
            self.log_level = parent.log_level();
        }
        if self.container_object_id.is_none() {
            self.container_object_id = parent.container_object_id().map(str::to_string);
        }
        self
    }

    #[must_use]
    pub fn with_parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    #[must_use]
    pub fn with_copy(mut self, copy: impl Into<String>) -> Self {
        self.copy = Some(copy.into());
        self
    }

    #[must_use]
    pub fn with_log_channel_id(mut self, id: impl Into<String>) -> Self {
        self.log_channel_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    #[must_use]
    pub fn with_container_object_id(mut self, id: impl Into<String>) -> Self {
        self.container_object_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    #[must_use]
    pub fn with_repository_path(mut self, path: impl Into<String>) -> Self {
        self.repository_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_object_id(mut self, id: impl Into<String>) -> Self {
        self.object_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn gathering_metrics(mut self, enabled: bool) -> Self {
        self.gathering_metrics = enabled;
        self
    }

    /// Record the id the registry handed out for this object
    pub fn set_log_channel_id(&mut self, id: impl Into<String>) {
        self.log_channel_id = Some(id.into());
    }
}

impl LoggingSource for SimpleLoggingObject {
    fn object_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn object_type(&self) -> LoggingObjectType {
        self.object_type
    }

    fn object_copy(&self) -> Option<&str> {
        self.copy.as_deref()
    }

    fn parent_channel_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    fn log_channel_id(&self) -> Option<&str> {
        self.log_channel_id.as_deref()
    }

    fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    fn container_object_id(&self) -> Option<&str> {
        self.container_object_id.as_deref()
    }

    fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    fn repository_path(&self) -> Option<&str> {
        self.repository_path.as_deref()
    }

    fn object_id(&self) -> Option<&str> {
        self.object_id.as_deref()
    }

    fn is_gathering_metrics(&self) -> bool {
        self.gathering_metrics
    }
}

/// Adapts any source into one that carries log hooks
#[derive(Debug, Clone)]
pub struct WithHooks<S> {
    inner: S,
    hooks: LogHooks,
}

impl<S: LoggingSource> WithHooks<S> {
    pub fn new(inner: S, hooks: LogHooks) -> Self {
        Self { inner, hooks }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: LoggingSource> LoggingSource for WithHooks<S> {
    fn object_name(&self) -> Option<&str> {
        self.inner.object_name()
    }

    fn object_type(&self) -> LoggingObjectType {
        self.inner.object_type()
    }

    fn object_copy(&self) -> Option<&str> {
        self.inner.object_copy()
    }

    fn parent_channel_id(&self) -> Option<&str> {
        self.inner.parent_channel_id()
    }

    fn log_channel_id(&self) -> Option<&str> {
        self.inner.log_channel_id()
    }

    fn log_level(&self) -> Option<LogLevel> {
        self.inner.log_level()
    }

    fn container_object_id(&self) -> Option<&str> {
        self.inner.container_object_id()
    }

    fn filename(&self) -> Option<&str> {
        self.inner.filename()
    }

    fn repository_path(&self) -> Option<&str> {
        self.inner.repository_path()
    }

    fn object_id(&self) -> Option<&str> {
        self.inner.object_id()
    }

    fn is_gathering_metrics(&self) -> bool {
        self.inner.is_gathering_metrics()
    }

    fn hooks(&self) -> Option<LogHooks> {
        Some(self.hooks.clone())
    }
}
