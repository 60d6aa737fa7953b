//! Resumable scan state.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Status of a persisted checkpoint.
///
/// A checkpoint only ever exists while a scan is unfinished; completion is
/// signalled by its removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    InProgress,
}

/// The in-progress state of one logical scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanCheckpoint {
    /// When the logical scan began. Preserved across resumes.
    pub started_at: DateTime<Utc>,

    /// Files enumerated when the scan (or its latest resume) started.
    pub total_files: usize,

    /// Mirror of `processed_paths.len()`, kept for readers of the file.
    #[serde(default)]
    pub processed_files: usize,

    /// Relative paths in the order they were committed.
    pub processed_paths: Vec<String>,

    /// Fingerprint of every processed path.
    #[serde(rename = "file_hashes")]
    pub fingerprints: IndexMap<String, String>,

    /// Batches committed so far.
    pub current_batch: usize,

    /// Batches planned for the whole scan.
    pub total_batches: usize,

    pub status: CheckpointStatus,

    /// Absolute scan root this checkpoint belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

impl ScanCheckpoint {
    /// Start a fresh checkpoint for `root`.
    pub fn new(root: impl Into<PathBuf>, total_files: usize, total_batches: usize) -> Self {
        Self {
            started_at: Utc::now(),
            total_files,
            processed_files: 0,
            processed_paths: Vec::new(),
            fingerprints: IndexMap::new(),
            current_batch: 0,
            total_batches,
            status: CheckpointStatus::InProgress,
            root: Some(root.into()),
        }
    }

    /// Commit a processed path. Returns `false` if it was already recorded.
    pub fn record(&mut self, relative_path: impl Into<String>, fingerprint: impl Into<String>) -> bool {
        let relative_path = relative_path.into();
        if self.fingerprints.contains_key(&relative_path) {
            return false;
        }
        self.fingerprints
            .insert(relative_path.clone(), fingerprint.into());
        self.processed_paths.push(relative_path);
        self.processed_files = self.processed_paths.len();
        true
    }

    /// Whether a path has already been processed.
    pub fn contains(&self, relative_path: &str) -> bool {
        self.fingerprints.contains_key(relative_path)
    }

    /// Stored fingerprint for a path.
    pub fn fingerprint(&self, relative_path: &str) -> Option<&str> {
        self.fingerprints.get(relative_path).map(String::as_str)
    }

    /// Number of processed files, which is also the resume offset.
    pub fn processed_count(&self) -> usize {
        self.processed_paths.len()
    }

    /// Keep only paths accepted by `keep`. Returns how many were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let before = self.processed_paths.len();
        self.processed_paths.retain(|p| keep(p));
        let fingerprints = &self.fingerprints;
        let kept: IndexMap<String, String> = self
            .processed_paths
            .iter()
            .filter_map(|p| fingerprints.get(p).map(|h| (p.clone(), h.clone())))
            .collect();
        self.fingerprints = kept;
        self.processed_files = self.processed_paths.len();
        before - self.processed_paths.len()
    }

    /// Whether this checkpoint may be resumed against `root`.
    ///
    /// Checkpoints written without a root are accepted.
    pub fn belongs_to(&self, root: &Path) -> bool {
        self.root.as_deref().is_none_or(|r| r == root)
    }

    /// Check the path/fingerprint bookkeeping is consistent.
    pub fn is_consistent(&self) -> bool {
        self.processed_paths.len() == self.fingerprints.len()
            && self.processed_paths.iter().all(|p| self.fingerprints.contains_key(p))
    }

    /// Percentage of files processed (0 when there are none).
    pub fn percent(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            self.processed_count() as f64 / self.total_files as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_lengths_equal() {
        let mut cp = ScanCheckpoint::new("/data", 3, 1);
        assert!(cp.record("a.txt", "h1"));
        assert!(cp.record("b.txt", "h2"));
        assert!(!cp.record("a.txt", "h3"));

        assert_eq!(cp.processed_count(), 2);
        assert_eq!(cp.fingerprints.len(), 2);
        assert_eq!(cp.processed_files, 2);
        assert_eq!(cp.fingerprint("a.txt"), Some("h1"));
        assert!(cp.is_consistent());
    }

    #[test]
    fn test_retain_drops_both_sides() {
        let mut cp = ScanCheckpoint::new("/data", 3, 1);
        cp.record("a.txt", "h1");
        cp.record("gone.txt", "h2");
        cp.record("c.txt", "h3");

        let dropped = cp.retain(|p| p != "gone.txt");

        assert_eq!(dropped, 1);
        assert_eq!(cp.processed_paths, vec!["a.txt", "c.txt"]);
        assert!(!cp.contains("gone.txt"));
        assert!(cp.is_consistent());
    }

    #[test]
    fn test_belongs_to() {
        let mut cp = ScanCheckpoint::new("/data", 0, 0);
        assert!(cp.belongs_to(Path::new("/data")));
        assert!(!cp.belongs_to(Path::new("/other")));

        cp.root = None;
        assert!(cp.belongs_to(Path::new("/other")));
    }

    #[test]
    fn test_wire_format() {
        let mut cp = ScanCheckpoint::new("/data", 2, 1);
        cp.record("a.txt", "h1");
        let json = serde_json::to_value(&cp).unwrap();

        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["processed_files"], 1);
        assert_eq!(json["file_hashes"]["a.txt"], "h1");
        assert_eq!(json["processed_paths"][0], "a.txt");
        assert_eq!(json["total_batches"], 1);
    }

    #[test]
    fn test_reads_checkpoint_without_root() {
        let json = r#"{
            "started_at": "2025-01-01T10:00:00Z",
            "total_files": 2,
            "processed_files": 1,
            "processed_paths": ["a.txt"],
            "file_hashes": {"a.txt": "h1"},
            "current_batch": 1,
            "total_batches": 2,
            "status": "in_progress"
        }"#;
        let cp: ScanCheckpoint = serde_json::from_str(json).unwrap();

        assert!(cp.root.is_none());
        assert!(cp.is_consistent());
        assert_eq!(cp.percent(), 50.0);
    }
}
