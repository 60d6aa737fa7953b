//! Error types for indexing operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use thiserror::Error;

/// Errors that can occur while indexing.
///
/// Only the directory variants abort a scan. Everything else is recovered
/// locally and surfaces through an [`ErrorSink`](crate::ErrorSink).
#[derive(Debug, Error)]
pub enum IndexError {
    /// Target directory does not exist.
    #[error("Directory does not exist: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Target path exists but is not a directory.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// A single file could not be read or stat'ed.
    #[error("Cannot access {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing persisted state failed.
    #[error("I/O error on {path}: {source}")]
    PersistenceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted state could not be encoded or decoded.
    #[error("Malformed state in {path}: {message}")]
    PersistenceFormat { path: PathBuf, message: String },

    /// A persisted checkpoint was written for another target directory.
    #[error("Checkpoint was recorded for {recorded}, not {requested}")]
    CheckpointMismatch {
        recorded: PathBuf,
        requested: PathBuf,
    },

    /// A worker pool task returned an error.
    #[error("Task {index} failed: {source}")]
    Task {
        index: usize,
        #[source]
        source: Box<IndexError>,
    },

    /// A worker pool task panicked.
    #[error("Task {index} panicked: {message}")]
    TaskPanicked { index: usize, message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

/// Coarse classification of an [`IndexError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Target path missing or not a directory. Fatal.
    Directory,
    /// Per-file read/stat failure.
    FileAccess,
    /// Checkpoint or index read/write failure.
    Persistence,
    /// A pool task failed.
    Task,
    /// Anything else.
    Other,
}

impl IndexError {
    /// Create a file access error.
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            source,
        }
    }

    /// Create a persistence I/O error.
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PersistenceIo {
            path: path.into(),
            source,
        }
    }

    /// Create a persistence format error from a JSON error.
    pub fn malformed(path: impl Into<PathBuf>, source: &serde_json::Error) -> Self {
        Self::PersistenceFormat {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DirectoryNotFound { .. } | Self::NotADirectory { .. } => ErrorKind::Directory,
            Self::FileAccess { .. } => ErrorKind::FileAccess,
            Self::PersistenceIo { .. }
            | Self::PersistenceFormat { .. }
            | Self::CheckpointMismatch { .. } => ErrorKind::Persistence,
            Self::Task { .. } | Self::TaskPanicked { .. } => ErrorKind::Task,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Whether this error aborts a scan.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Directory
    }

    /// Innermost error, looking through task wrappers.
    pub fn root_cause(&self) -> &IndexError {
        match self {
            Self::Task { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Message suitable for showing to a user.
    pub fn user_message(&self) -> String {
        match self.root_cause() {
            Self::DirectoryNotFound { path } => {
                format!("Directory not found: {}. Please check the path.", path.display())
            }
            Self::NotADirectory { path } => {
                format!("{} is not a directory.", path.display())
            }
            Self::FileAccess { path, source }
                if source.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                format!(
                    "Permission denied: {}. Please check file permissions.",
                    path.display()
                )
            }
            Self::FileAccess { path, source } if source.kind() == std::io::ErrorKind::NotFound => {
                format!("File not found: {}. It may have been removed during the scan.", path.display())
            }
            Self::FileAccess { path, source } => {
                format!("Could not read {}: {source}", path.display())
            }
            Self::PersistenceIo { path, .. } | Self::PersistenceFormat { path, .. } => {
                format!(
                    "Saved state at {} could not be used and was ignored.",
                    path.display()
                )
            }
            Self::CheckpointMismatch { recorded, .. } => {
                format!(
                    "Discarded an unfinished scan of {}; starting over.",
                    recorded.display()
                )
            }
            other => format!("Indexing error: {other}"),
        }
    }
}
