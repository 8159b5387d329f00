//! In-memory buffer of the current run's log.
//!
//! Lines accumulate while a sequence runs and are handed to a
//! [`LogStore`](crate::persistence::LogStore) when it ends. Appending to a
//! closed buffer is a no-op, so late events from cancelled axis threads are
//! dropped.

use chrono::{DateTime, Local};
use gecko_common::prelude::*;
use parking_lot::Mutex;

/// Timestamp format of run-log lines.
pub const LINE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Run-log buffer.
#[derive(Default)]
pub struct RunLog {
    lines: Mutex<Option<Vec<String>>>,
}

impl RunLog {
    /// Closed buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh buffer, discarding anything left over.
    pub fn open(&self) {
        *self.lines.lock() = Some(Vec::new());
    }

    /// Whether a run is being recorded.
    pub fn is_open(&self) -> bool {
        self.lines.lock().is_some()
    }

    /// Append a raw line.
    pub fn append(&self, line: impl Into<String>) {
        if let Some(lines) = self.lines.lock().as_mut() {
            lines.push(line.into());
        }
    }

    /// Append `timestamp | force | text`.
    pub fn record(&self, at: DateTime<Local>, force: &ForceReading, text: &str) {
        if let Some(lines) = self.lines.lock().as_mut() {
            lines.push(format!(
                "{} | {} | {}",
                at.format(LINE_TIMESTAMP_FORMAT),
                force,
                text
            ));
        }
    }

    /// Close the buffer and take its lines.
    pub fn close(&self) -> Option<Vec<String>> {
        self.lines.lock().take()
    }
}
