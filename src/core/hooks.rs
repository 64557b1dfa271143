//! Callbacks fired around every accepted log write of a channel

use std::fmt;
use std::sync::Arc;

/// Callback type for log hooks
pub type HookFn = Arc<dyn Fn() + Send + Sync>;

/// Optional before/after callbacks attached to a channel.
///
/// Hooks fire only for messages that pass the channel's level and substring
/// filters: `before` right before the line is buffered, `after` once it has
/// reached both the global buffer and the channel's file writer buffer.
#[derive(Clone, Default)]
pub struct LogHooks {
    before: Option<HookFn>,
    after: Option<HookFn>,
}

impl LogHooks {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn before(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.before = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn after(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.after = Some(Arc::new(hook));
        self
    }

    pub fn has_before(&self) -> bool {
        self.before.is_some()
    }

    pub fn has_after(&self) -> bool {
        self.after.is_some()
    }

    #[inline]
    pub fn call_before_log(&self) {
        if let Some(ref hook) = self.before {
            hook();
        }
    }

    #[inline]
    pub fn call_after_log(&self) {
        if let Some(ref hook) = self.after {
            hook();
        }
    }
}

impl fmt::Debug for LogHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogHooks")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}
