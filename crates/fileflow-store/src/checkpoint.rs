//! Single-slot checkpoint persistence.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fileflow_core::{ErrorContext, ErrorSink, IndexError, ScanCheckpoint};

use crate::json;

/// Checkpoint file name inside the configuration directory.
pub const CHECKPOINT_FILENAME: &str = "checkpoint.json";

/// Persists the one in-progress scan for a configuration directory.
///
/// Absence of a checkpoint means "no scan in progress", not "last scan
/// succeeded"; consult the [`IndexStore`](crate::IndexStore) for that.
#[derive(Clone)]
pub struct CheckpointStore {
    path: PathBuf,
    sink: Arc<dyn ErrorSink>,
}

impl CheckpointStore {
    /// Create a store for `config_dir`, reporting failures to `sink`.
    pub fn new(config_dir: impl AsRef<Path>, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            path: config_dir.as_ref().join(CHECKPOINT_FILENAME),
            sink,
        }
    }

    /// Location of the checkpoint file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replace the checkpoint.
    pub fn try_save(&self, checkpoint: &ScanCheckpoint) -> Result<(), IndexError> {
        json::write_atomic(&self.path, checkpoint)
    }

    /// Read the checkpoint, rejecting one whose bookkeeping is inconsistent.
    pub fn try_load(&self) -> Result<Option<ScanCheckpoint>, IndexError> {
        match json::read::<ScanCheckpoint>(&self.path)? {
            Some(checkpoint) if !checkpoint.is_consistent() => Err(IndexError::PersistenceFormat {
                path: self.path.clone(),
                message: format!(
                    "{} processed paths but {} fingerprints",
                    checkpoint.processed_paths.len(),
                    checkpoint.fingerprints.len()
                ),
            }),
            other => Ok(other),
        }
    }

    /// Remove the checkpoint.
    pub fn try_clear(&self) -> Result<(), IndexError> {
        json::remove(&self.path)
    }

    /// Save, reporting failure. Returns whether the write succeeded.
    pub fn save(&self, checkpoint: &ScanCheckpoint) -> bool {
        self.try_save(checkpoint)
            .map_err(|e| self.report(&e, "save_checkpoint"))
            .is_ok()
    }

    /// Load, treating unreadable or malformed state as absent.
    pub fn load(&self) -> Option<ScanCheckpoint> {
        self.try_load()
            .map_err(|e| self.report(&e, "load_checkpoint"))
            .ok()
            .flatten()
    }

    /// Clear, reporting failure. Returns whether the slot is now empty.
    pub fn clear(&self) -> bool {
        self.try_clear()
            .map_err(|e| self.report(&e, "clear_checkpoint"))
            .is_ok()
    }

    /// Whether a checkpoint file exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn report(&self, error: &IndexError, operation: &str) {
        let context = ErrorContext::new(operation).with("path", self.path.display());
        self.sink.report(error, &context);
    }
}

impl std::fmt::Debug for CheckpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
