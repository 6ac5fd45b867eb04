use std::sync::{Arc, Mutex, PoisonError};

use crate::logging::entry::LogEntry;
use crate::logging::level::Level;

/// A leveled log sink.
///
/// The request logger only builds entries and messages; formatting and
/// transport are up to the implementation.
pub trait Logger: Send + Sync {
    fn trace(&self, entry: &LogEntry, message: &str) {
        self.debug(entry, message)
    }

    fn debug(&self, entry: &LogEntry, message: &str);

    fn info(&self, entry: &LogEntry, message: &str);

    fn warn(&self, entry: &LogEntry, message: &str);

    fn error(&self, entry: &LogEntry, message: &str);

    fn fatal(&self, entry: &LogEntry, message: &str) {
        self.error(entry, message)
    }

    fn log(&self, level: Level, entry: &LogEntry, message: &str) {
        let log = level.method::<Self>();
        log(self, entry, message)
    }
}

impl<L: Logger + ?Sized> Logger for Arc<L> {
    fn trace(&self, entry: &LogEntry, message: &str) {
        (**self).trace(entry, message)
    }

    fn debug(&self, entry: &LogEntry, message: &str) {
        (**self).debug(entry, message)
    }

    fn info(&self, entry: &LogEntry, message: &str) {
        (**self).info(entry, message)
    }

    fn warn(&self, entry: &LogEntry, message: &str) {
        (**self).warn(entry, message)
    }

    fn error(&self, entry: &LogEntry, message: &str) {
        (**self).error(entry, message)
    }

    fn fatal(&self, entry: &LogEntry, message: &str) {
        (**self).fatal(entry, message)
    }
}

impl<L: Logger + ?Sized> Logger for &L {
    fn trace(&self, entry: &LogEntry, message: &str) {
        (**self).trace(entry, message)
    }

    fn debug(&self, entry: &LogEntry, message: &str) {
        (**self).debug(entry, message)
    }

    fn info(&self, entry: &LogEntry, message: &str) {
        (**self).info(entry, message)
    }

    fn warn(&self, entry: &LogEntry, message: &str) {
        (**self).warn(entry, message)
    }

    fn error(&self, entry: &LogEntry, message: &str) {
        (**self).error(entry, message)
    }

    fn fatal(&self, entry: &LogEntry, message: &str) {
        (**self).fatal(entry, message)
    }
}

/// Sends entries to `tracing`, with the entry attached as a JSON field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

fn to_json(entry: &LogEntry) -> String {
    serde_json::to_string(entry).unwrap_or_else(|err| format!("{{\"serializeError\":\"{err}\"}}"))
}

impl Logger for TracingLogger {
    fn trace(&self, entry: &LogEntry, message: &str) {
        tracing::trace!(target: "request_logger", kind = entry.kind(), entry = %to_json(entry), "{}", message);
    }

    fn debug(&self, entry: &LogEntry, message: &str) {
        tracing::debug!(target: "request_logger", kind = entry.kind(), entry = %to_json(entry), "{}", message);
    }

    fn info(&self, entry: &LogEntry, message: &str) {
        tracing::info!(target: "request_logger", kind = entry.kind(), entry = %to_json(entry), "{}", message);
    }

    fn warn(&self, entry: &LogEntry, message: &str) {
        tracing::warn!(target: "request_logger", kind = entry.kind(), entry = %to_json(entry), "{}", message);
    }

    fn error(&self, entry: &LogEntry, message: &str) {
        tracing::error!(target: "request_logger", kind = entry.kind(), entry = %to_json(entry), "{}", message);
    }

    // tracing has nothing above ERROR
    fn fatal(&self, entry: &LogEntry, message: &str) {
        tracing::error!(target: "request_logger", fatal = true, kind = entry.kind(), entry = %to_json(entry), "{}", message);
    }
}

/// One call made to a [`MemoryLogger`].
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    pub entry: LogEntry,
    pub message: String,
}

/// Keeps every entry in memory. Handy in tests and for inspecting traffic.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn take(&self) -> Vec<LogRecord> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn push(&self, level: Level, entry: &LogEntry, message: &str) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogRecord {
                level,
                entry: entry.clone(),
                message: message.to_string(),
            });
    }
}

impl Logger for MemoryLogger {
    fn trace(&self, entry: &LogEntry, message: &str) {
        self.push(Level::Trace, entry, message)
    }

    fn debug(&self, entry: &LogEntry, message: &str) {
        self.push(Level::Debug, entry, message)
    }

    fn info(&self, entry: &LogEntry, message: &str) {
        self.push(Level::Info, entry, message)
    }

    fn warn(&self, entry: &LogEntry, message: &str) {
        self.push(Level::Warn, entry, message)
    }

    fn error(&self, entry: &LogEntry, message: &str) {
        self.push(Level::Error, entry, message)
    }

    fn fatal(&self, entry: &LogEntry, message: &str) {
        self.push(Level::Fatal, entry, message)
    }
}
