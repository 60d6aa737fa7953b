//! Persistence of the finalized index.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use fileflow_core::{ErrorContext, ErrorSink, FileRecord, Index, IndexError};

use crate::json;

/// Index file name inside the configuration directory.
pub const INDEX_FILENAME: &str = "index.json";

/// Persists the index of the last completed scan.
#[derive(Clone)]
pub struct IndexStore {
    path: PathBuf,
    sink: Arc<dyn ErrorSink>,
}

impl IndexStore {
    /// Create a store for `config_dir`, reporting failures to `sink`.
    pub fn new(config_dir: impl AsRef<Path>, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            path: config_dir.as_ref().join(INDEX_FILENAME),
            sink,
        }
    }

    /// Location of the index file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the index wholesale with `records`.
    pub fn try_save(&self, records: Vec<FileRecord>) -> Result<Index, IndexError> {
        let index = Index::new(records);
        json::write_atomic(&self.path, &index)?;
        Ok(index)
    }

    /// Read the index.
    pub fn try_load(&self) -> Result<Option<Index>, IndexError> {
        json::read(&self.path)
    }

    /// Save, reporting failure. Returns whether the write succeeded.
    pub fn save(&self, records: Vec<FileRecord>) -> bool {
        let count = records.len();
        match self.try_save(records) {
            Ok(_) => {
                tracing::debug!(files = count, path = %self.path.display(), "index saved");
                true
            }
            Err(e) => {
                self.report(&e, "save_index");
                false
            }
        }
    }

    /// Load, treating unreadable or malformed state as absent.
    pub fn load(&self) -> Option<Index> {
        self.try_load()
            .map_err(|e| self.report(&e, "load_index"))
            .ok()
            .flatten()
    }

    /// Whether an index file exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// When the stored index was written.
    pub fn indexed_at(&self) -> Option<DateTime<Utc>> {
        self.load().map(|index| index.indexed_at)
    }

    /// Number of files in the stored index, 0 when there is none.
    pub fn file_count(&self) -> usize {
        self.load().map_or(0, |index| index.file_count)
    }

    fn report(&self, error: &IndexError, operation: &str) {
        let context = ErrorContext::new(operation).with("path", self.path.display());
        self.sink.report(error, &context);
    }
}

impl std::fmt::Debug for IndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
