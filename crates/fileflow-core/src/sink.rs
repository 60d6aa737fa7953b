//! Error reporting sinks.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, IndexError};

/// Where a recoverable error happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext(IndexMap<String, String>);

impl ErrorContext {
    /// Create a context for the named operation.
    pub fn new(operation: impl Into<String>) -> Self {
        let mut fields = IndexMap::new();
        fields.insert("operation".to_string(), operation.into());
        Self(fields)
    }

    /// Add a field.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.0.insert(key.into(), value.to_string());
        self
    }

    /// Look up a field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// The operation this context was created for.
    pub fn operation(&self) -> &str {
        self.get("operation").unwrap_or("unknown")
    }

    /// Iterate over fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (key, value) in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{key}={value}")?;
            first = false;
        }
        Ok(())
    }
}

/// Receives recoverable errors from the engine and the stores.
///
/// Implementations must not panic; the returned string is the user-facing
/// message for the error.
pub trait ErrorSink: Send + Sync {
    /// Report an error with its context.
    fn report(&self, error: &IndexError, context: &ErrorContext) -> String;
}

/// Sink that logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, error: &IndexError, context: &ErrorContext) -> String {
        log_error(error, context);
        error.user_message()
    }
}

fn log_error(error: &IndexError, context: &ErrorContext) {
    if error.is_fatal() {
        tracing::error!(kind = %error.kind(), %context, "{error}");
    } else {
        tracing::warn!(kind = %error.kind(), %context, "{error}");
    }
}

/// A reported error as retained by [`RecordingSink`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// When the error was reported.
    pub at: DateTime<Utc>,
    /// Classification.
    pub kind: ErrorKind,
    /// Full error text.
    pub message: String,
    /// User-facing message.
    pub user_message: String,
    /// Where it happened.
    pub context: ErrorContext,
}

/// Sink that logs and keeps every report in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<ErrorEntry>>,
}

impl RecordingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded entries.
    pub fn entries(&self) -> Vec<ErrorEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<ErrorEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries of a given kind.
    pub fn count(&self, kind: ErrorKind) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, error: &IndexError, context: &ErrorContext) -> String {
        log_error(error, context);
        let user_message = error.user_message();

        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ErrorEntry {
                at: Utc::now(),
                kind: error.kind(),
                message: error.to_string(),
                user_message: user_message.clone(),
                context: context.clone(),
            });

        user_message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_context_fields_keep_order() {
        let ctx = ErrorContext::new("collect_files").with("directory", "/data");
        assert_eq!(ctx.operation(), "collect_files");
        assert_eq!(ctx.get("directory"), Some("/data"));
        assert_eq!(ctx.to_string(), "operation=collect_files, directory=/data");
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        assert!(sink.is_empty());

        let err = IndexError::NotADirectory {
            path: PathBuf::from("/etc/hosts"),
        };
        let message = sink.report(&err, &ErrorContext::new("index_directory"));

        assert_eq!(message, err.user_message());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.count(ErrorKind::Directory), 1);
        assert_eq!(sink.count(ErrorKind::Task), 0);

        let latest = sink.latest().unwrap();
        assert_eq!(latest.context.operation(), "index_directory");
    }
}
