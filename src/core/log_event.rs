//! Log event structure

use super::log_level::LogLevel;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Date layout used when rendering buffered lines as text
pub const RENDER_DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub channel_id: Option<String>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    pub subject: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl LogEvent {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            channel_id: None,
            level,
            message: message.into(),
            args: Vec::new(),
            subject: None,
            timestamp: Utc::now(),
        }
    }

    /// Build an event from a `{0}`-style template; the rendered text is kept
    /// in `message` and the raw arguments in `args`.
    pub fn with_args(level: LogLevel, template: &str, args: Vec<String>) -> Self {
        let mut event = Self::new(level, format_template(template, &args));
        event.args = args;
        event
    }

    #[must_use]
    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the timestamp from epoch milliseconds; out-of-range values keep the
    /// current timestamp.
    #[must_use]
    pub fn with_timestamp_millis(mut self, millis: i64) -> Self {
        if let Some(ts) = Utc.timestamp_millis_opt(millis).single() {
            self.timestamp = ts;
        }
        self
    }

    /// `2024/05/01 10:00:00 - subject - message`
    pub fn render(&self) -> String {
        let date = self.timestamp.format(RENDER_DATE_FORMAT);
        match self.subject {
            Some(ref subject) => format!("{} - {} - {}", date, subject, self.message),
            None => format!("{} - {}", date, self.message),
        }
    }
}

/// Substitute `{0}`, `{1}`, ... placeholders. Placeholders without a matching
/// argument are left untouched.
pub fn format_template(template: &str, args: &[String]) -> String {
    if args.is_empty() {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len() + 16 * args.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let replaced = tail.find('}').and_then(|end| {
            let index: usize = tail[..end].parse().ok()?;
            Some((args.get(index)?, end))
        });
        match replaced {
            Some((arg, end)) => {
                out.push_str(arg);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}
