//! Warning sinks
//!
//! Non-fatal diagnostics (for example reading a call's return value from a
//! `before` hook) go to a [`WarningSink`]. There is one process-wide slot,
//! initialised with [`StderrSink`]; a [`Runtime`](crate::Runtime) may carry
//! its own sink which takes precedence.

use std::sync::{Arc, LazyLock};

use parking_lot::{Mutex, RwLock};

/// Receiver for human-readable warning lines
pub trait WarningSink: Send + Sync {
    /// Accept one warning
    fn warn(&self, message: &str);
}

/// Writes `WARNING: <message>` to standard error
#[derive(Debug, Clone)]
pub struct StderrSink {
    prefix: String,
}

impl StderrSink {
    /// Sink with a custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Format one line as it would be written
    pub fn format(&self, message: &str) -> String {
        format!("{}{}", self.prefix, message)
    }
}

impl Default for StderrSink {
    fn default() -> Self {
        Self::with_prefix("WARNING: ")
    }
}

impl WarningSink for StderrSink {
    fn warn(&self, message: &str) {
        eprintln!("{}", self.format(message));
    }
}

/// Forwards warnings to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl WarningSink for LogSink {
    fn warn(&self, message: &str) {
        log::warn!(target: "waylay", "{}", message);
    }
}

/// Collects warnings in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every message received so far
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Drain the collected messages
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.lock())
    }

    /// Number of messages received
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Check if no message was received
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

impl WarningSink for MemorySink {
    fn warn(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

static WARNING_SINK: LazyLock<RwLock<Option<Arc<dyn WarningSink>>>> =
    LazyLock::new(|| RwLock::new(Some(Arc::new(StderrSink::default()))));

/// The process-wide sink; `None` when warnings are silenced
pub fn warning_sink() -> Option<Arc<dyn WarningSink>> {
    WARNING_SINK.read().clone()
}

/// Replace the process-wide sink, returning the previous one.
///
/// Passing `None` silences warnings that no runtime-level sink picks up.
pub fn set_warning_sink(sink: Option<Arc<dyn WarningSink>>) -> Option<Arc<dyn WarningSink>> {
    std::mem::replace(&mut *WARNING_SINK.write(), sink)
}

/// Send a warning to the process-wide sink
pub fn warn(message: &str) {
    // Clone out of the lock so a sink may itself swap the global slot.
    if let Some(sink) = warning_sink() {
        sink.warn(message);
    }
}
