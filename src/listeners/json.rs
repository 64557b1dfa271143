//! JSON listener for structured log shipping
//!
//! Writes each buffered line as a single-line JSON object (JSONL), carrying
//! the line number next to the event fields.

use crate::core::{BufferLine, LogBufferListener, LogEvent, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::io::{self, Write};

#[derive(Serialize)]
struct JsonLine<'a> {
    nr: u64,
    #[serde(flatten)]
    event: &'a LogEvent,
}

pub struct JsonListener {
    writer: Mutex<Box<dyn Write + Send>>,
    pretty: bool,
    name: String,
}

impl JsonListener {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
            pretty: false,
            name: "json".to_string(),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Listener name, as passed to
    /// [`LogBuffer::remove_listener`](crate::core::LogBuffer::remove_listener)
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn flush(&self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }
}

impl LogBufferListener for JsonListener {
    fn event_added(&self, line: &BufferLine) -> Result<()> {
        let record = JsonLine {
            nr: line.nr(),
            event: line.event(),
        };
        let json = if self.pretty {
            serde_json::to_string_pretty(&record)?
        } else {
            serde_json::to_string(&record)?
        };

        let mut writer = self.writer.lock();
        writeln!(writer, "{}", json)?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
