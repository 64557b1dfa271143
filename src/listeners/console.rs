//! Console listener implementation

use crate::core::{BufferLine, LogBufferListener, LogEvent, LogLevel, Result};
use colored::Colorize;

pub struct ConsoleListener {
    use_colors: bool,
    min_level: LogLevel,
}

impl ConsoleListener {
    pub fn new() -> Self {
        Self {
            use_colors: true,
            min_level: LogLevel::Rowlevel,
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self {
            use_colors,
            ..Self::new()
        }
    }

    /// Print only events visible at `level`
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_channel_system::listeners::ConsoleListener;
    /// use rust_log_channel_system::LogLevel;
    ///
    /// let listener = ConsoleListener::new().with_min_level(LogLevel::Basic);
    /// ```
    #[must_use]
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    fn format_line(&self, event: &LogEvent) -> String {
        let level_str = if self.use_colors {
            format!("{:8}", event.level.to_str())
                .color(event.level.color_code())
                .to_string()
        } else {
            format!("{:8}", event.level.to_str())
        };
        format!("[{}] {}", level_str, event.render())
    }
}

impl Default for ConsoleListener {
    fn default() -> Self {
        Self::new()
    }
}

impl LogBufferListener for ConsoleListener {
    fn event_added(&self, line: &BufferLine) -> Result<()> {
        let event = line.event();
        if !event.level.is_visible(self.min_level) {
            return Ok(());
        }

        let output = self.format_line(event);
        // Errors go to stderr, everything else to stdout
        if event.level.is_error() {
            eprintln!("{}", output);
        } else {
            println!("{}", output);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_format() {
        let listener = ConsoleListener::with_colors(false);
        let event = LogEvent::new(LogLevel::Basic, "Finished")
            .with_subject("load_dim")
            .with_timestamp_millis(0);
        assert_eq!(
            listener.format_line(&event),
            "[BASIC   ] 1970/01/01 00:00:00 - load_dim - Finished"
        );
    }
}
