//! Logging setup: a stderr `fmt` layer plus a bounded in-memory buffer of
//! recent events that diagnostics print after an error.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt as _};
use tracing_subscriber::util::SubscriberInitExt as _;

/// Default number of lines kept in the recent-log buffer.
pub const DEFAULT_CAPACITY: usize = 200;

/// Bounded ring buffer of formatted log lines. Cloning shares the buffer.
#[derive(Debug, Clone)]
pub struct RecentLogs {
    /// Maximum number of lines retained.
    capacity: usize,
    /// Retained lines, oldest first.
    entries: Arc<Mutex<VecDeque<String>>>,
}

impl RecentLogs {
    /// Whether the buffer holds no lines.
    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// Number of lines currently retained.
    pub fn len(&self) -> usize {
        return self.entries.lock().unwrap_or_else(PoisonError::into_inner).len();
    }

    /// An empty buffer holding at most `capacity` lines.
    pub fn new(capacity: usize) -> Self {
        return Self {
            capacity,
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        };
    }

    /// Append a line, evicting the oldest lines past capacity.
    pub fn push(&self, line: String) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(line);
    }

    /// Copy of the retained lines, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        return self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
    }
}

/// Layer that formats every event it sees into a [`RecentLogs`] buffer.
pub struct RecentLogsLayer {
    /// Destination buffer.
    logs: RecentLogs,
}

impl RecentLogsLayer {
    /// A layer writing into `logs`.
    pub const fn new(logs: RecentLogs) -> Self {
        return Self { logs };
    }
}

impl<S: Subscriber> Layer<S> for RecentLogsLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let meta = event.metadata();
        let time = chrono::Utc::now().format("%H:%M:%S%.3f");
        let mut line = format!("{time} {:>5} {}: {}", meta.level(), meta.target(), visitor.message);
        if !visitor.fields.is_empty() {
            let _ = write!(line, " {}", visitor.fields);
        }
        self.logs.push(line);
    }
}

/// Collects an event's message and its other fields as `key=value` pairs.
#[derive(Default)]
struct LineVisitor {
    /// Space-separated `key=value` pairs.
    fields: String,
    /// The `message` field.
    message: String,
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
            return;
        }
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={value:?}", field.name());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
            return;
        }
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={value}", field.name());
    }
}

/// Install the global subscriber: warnings (or everything from debug up when
/// `verbose`) to stderr, and every debug-or-higher event into the returned buffer.
///
/// A second call leaves the first subscriber in place and returns a fresh,
/// unconnected buffer.
pub fn init(verbose: bool, capacity: usize) -> RecentLogs {
    let logs = RecentLogs::new(capacity);
    let stderr_level = if verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };

    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_level);
    let recent = RecentLogsLayer::new(logs.clone()).with_filter(LevelFilter::DEBUG);

    let _ = tracing_subscriber::registry().with(stderr).with(recent).try_init();
    return logs;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt as _;

    #[test]
    fn evicts_oldest_past_capacity() {
        let logs = RecentLogs::new(3);
        for i in 0..5 {
            logs.push(format!("line {i}"));
        }
        assert_eq!(logs.len(), 3);
        assert_eq!(logs.snapshot(), vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let logs = RecentLogs::new(0);
        logs.push("dropped".to_string());
        assert!(logs.is_empty());
    }

    #[test]
    fn clones_share_the_buffer() {
        let logs = RecentLogs::new(4);
        logs.clone().push("shared".to_string());
        assert_eq!(logs.snapshot(), vec!["shared"]);
    }

    #[test]
    fn layer_records_message_and_fields() {
        let logs = RecentLogs::new(10);
        let subscriber = tracing_subscriber::registry().with(RecentLogsLayer::new(logs.clone()));
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(doc = "a.md", "stale anchor");
        });

        let lines = logs.snapshot();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("WARN"), "{}", lines[0]);
        assert!(lines[0].contains("stale anchor"), "{}", lines[0]);
        assert!(lines[0].contains("doc=a.md"), "{}", lines[0]);
    }
}
