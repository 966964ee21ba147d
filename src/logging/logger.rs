// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logger handle and output sinks

use super::{Facility, Severity};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// A single log record as handed to a sink
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Wall-clock timestamp of the call site
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Severity of the message
    pub severity: Severity,
    /// Component that produced the message
    pub facility: Facility,
    /// Message text
    pub message: String,
    /// Optional key-value context pairs
    pub kvs: Vec<(String, String)>,
}

impl LogEntry {
    /// Create a new entry stamped with the current wall-clock time
    pub fn new(severity: Severity, facility: Facility, message: &str) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            severity,
            facility,
            message: message.to_string(),
            kvs: Vec::new(),
        }
    }

    /// Attach a key-value pair
    pub fn add_kv(&mut self, key: &str, value: &str) {
        self.kvs.push((key.to_string(), value.to_string()));
    }
}

/// Destination for log entries
pub trait LogSink: Send + Sync {
    fn write(&self, entry: LogEntry);
}

/// Sink that writes one JSON object per entry to stderr
pub struct StderrJsonSink;

impl LogSink for StderrJsonSink {
    fn write(&self, entry: LogEntry) {
        let log_msg = serde_json::json!({
            "timestamp": entry.timestamp.to_rfc3339(),
            "level": format!("{:?}", entry.severity),
            "facility": format!("{:?}", entry.facility),
            "message": entry.message,
        });
        eprintln!("{}", log_msg);
        // No flush() - let stderr buffer naturally
    }
}

/// In-memory sink for tests: captured entries can be drained and asserted on
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all captured entries, leaving the sink empty
    pub fn drain(&self) -> Vec<LogEntry> {
        std::mem::take(&mut *self.entries.lock().unwrap())
    }

    /// Number of captured entries
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// True if nothing has been captured
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemorySink {
    fn write(&self, entry: LogEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}

/// Logger handle for writing log entries
///
/// This is a lightweight handle that can be cloned and passed around.
/// The actual sink is shared via Arc.
pub struct Logger {
    sink: Arc<dyn LogSink>,
    /// Global minimum log level (default: Info)
    global_min_level: Arc<AtomicU8>,
    /// Per-facility minimum log levels
    facility_min_levels: Arc<RwLock<HashMap<Facility, Severity>>>,
}

impl Logger {
    /// Create a logger over an arbitrary sink
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            global_min_level: Arc::new(AtomicU8::new(Severity::Info as u8)),
            facility_min_levels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a logger that writes JSON directly to stderr
    pub fn stderr_json() -> Self {
        Self::new(Arc::new(StderrJsonSink))
    }

    /// Create a logger capturing into a shared [`MemorySink`]
    pub fn memory() -> (Self, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (Self::new(Arc::clone(&sink) as Arc<dyn LogSink>), sink)
    }

    /// Check if a log message should be written based on severity filtering
    #[inline]
    fn should_log(&self, severity: Severity, facility: Facility) -> bool {
        // Facility-specific level overrides global when set
        let levels = self.facility_min_levels.read().unwrap();
        if let Some(&min_level) = levels.get(&facility) {
            return severity <= min_level;
        }
        drop(levels);

        let global_min = self.global_min_level.load(Ordering::Relaxed);
        (severity as u8) <= global_min
    }

    /// Write a log entry
    #[inline]
    pub fn log(&self, severity: Severity, facility: Facility, message: &str) {
        if !self.should_log(severity, facility) {
            return;
        }
        self.sink.write(LogEntry::new(severity, facility, message));
    }

    /// Write a log entry with key-value pairs
    #[inline]
    pub fn log_kv(
        &self,
        severity: Severity,
        facility: Facility,
        message: &str,
        kvs: &[(&str, &str)],
    ) {
        if !self.should_log(severity, facility) {
            return;
        }
        let mut entry = LogEntry::new(severity, facility, message);
        for (key, value) in kvs {
            entry.add_kv(key, value);
        }
        self.sink.write(entry);
    }

    /// Log with emergency severity
    #[inline]
    pub fn emergency(&self, facility: Facility, message: &str) {
        self.log(Severity::Emergency, facility, message);
    }

    /// Log with alert severity
    #[inline]
    pub fn alert(&self, facility: Facility, message: &str) {
        self.log(Severity::Alert, facility, message);
    }

    /// Log with critical severity
    #[inline]
    pub fn critical(&self, facility: Facility, message: &str) {
        self.log(Severity::Critical, facility, message);
    }

    /// Log with error severity
    #[inline]
    pub fn error(&self, facility: Facility, message: &str) {
        self.log(Severity::Error, facility, message);
    }

    /// Log with warning severity
    #[inline]
    pub fn warning(&self, facility: Facility, message: &str) {
        self.log(Severity::Warning, facility, message);
    }

    /// Log with notice severity
    #[inline]
    pub fn notice(&self, facility: Facility, message: &str) {
        self.log(Severity::Notice, facility, message);
    }

    /// Log with info severity
    #[inline]
    pub fn info(&self, facility: Facility, message: &str) {
        self.log(Severity::Info, facility, message);
    }

    /// Log with debug severity
    #[inline]
    pub fn debug(&self, facility: Facility, message: &str) {
        self.log(Severity::Debug, facility, message);
    }

    /// Set the global minimum log level
    pub fn set_global_level(&self, level: Severity) {
        self.global_min_level.store(level as u8, Ordering::Relaxed);
    }

    /// Set the minimum log level for a specific facility
    pub fn set_facility_level(&self, facility: Facility, level: Severity) {
        self.facility_min_levels
            .write()
            .unwrap()
            .insert(facility, level);
    }

    /// Clear the facility-specific log level (fall back to global)
    pub fn clear_facility_level(&self, facility: Facility) {
        self.facility_min_levels.write().unwrap().remove(&facility);
    }
}

impl Clone for Logger {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            global_min_level: Arc::clone(&self.global_min_level),
            facility_min_levels: Arc::clone(&self.facility_min_levels),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_basic() {
        let (logger, sink) = Logger::memory();
        logger.info(Facility::Test, "Test message");
        logger.error(Facility::Test, "Error message");
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_logger_with_kvs() {
        let (logger, sink) = Logger::memory();
        logger.log_kv(
            Severity::Info,
            Facility::Test,
            "Test with context",
            &[("sg", "(*,224.1.1.1)"), ("state", "Joined")],
        );
        let entries = sink.drain();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kvs.len(), 2);
        assert_eq!(entries[0].kvs[0].0, "sg");
    }

    #[test]
    fn test_logger_clone_shares_sink() {
        let (logger1, sink) = Logger::memory();
        let logger2 = logger1.clone();

        logger1.info(Facility::Test, "From logger1");
        logger2.info(Facility::Test, "From logger2");
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_global_log_level_filtering() {
        let (logger, sink) = Logger::memory();
        logger.set_global_level(Severity::Warning);

        // These pass (Warning and above)
        logger.emergency(Facility::Test, "Emergency");
        logger.error(Facility::Test, "Error");
        logger.warning(Facility::Test, "Warning");

        // These are filtered out (below Warning)
        logger.notice(Facility::Test, "Notice");
        logger.info(Facility::Test, "Info");
        logger.debug(Facility::Test, "Debug");

        assert_eq!(sink.len(), 3, "Expected 3 log entries to pass the filter");
    }

    #[test]
    fn test_facility_level_overrides_global() {
        let (logger, sink) = Logger::memory();
        logger.set_global_level(Severity::Error);
        logger.set_facility_level(Facility::Wheel, Severity::Debug);

        // Wheel facility allows Debug
        logger.debug(Facility::Wheel, "Wheel debug");
        // Upstream facility uses global level (Error)
        logger.debug(Facility::Upstream, "Upstream debug");
        logger.error(Facility::Upstream, "Upstream error");

        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_clear_facility_level() {
        let (logger, sink) = Logger::memory();
        logger.set_global_level(Severity::Warning);
        logger.set_facility_level(Facility::Test, Severity::Debug);

        logger.info(Facility::Test, "Passes with override");
        logger.clear_facility_level(Facility::Test);
        logger.info(Facility::Test, "Filtered after clear");

        assert_eq!(sink.len(), 1);
    }
}
