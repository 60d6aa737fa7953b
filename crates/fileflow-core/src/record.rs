//! Indexed file records and the finalized index.

use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// One indexed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the scan root. Unique within an index.
    #[serde(rename = "path")]
    pub relative_path: String,

    /// File name (last path component).
    pub name: CompactString,

    /// Size in bytes.
    #[serde(rename = "size")]
    pub size_bytes: u64,

    /// Last modification time.
    #[serde(rename = "modified")]
    pub modified_time: DateTime<Utc>,

    /// Opaque content signature.
    #[serde(rename = "hash")]
    pub fingerprint: String,

    /// Lower-cased extension including the leading dot, or empty.
    pub extension: CompactString,

    /// Always false; kept for the on-disk format.
    #[serde(default)]
    pub is_directory: bool,
}

impl FileRecord {
    /// Build a record from a relative path, file metadata and a fingerprint.
    pub fn new(
        relative_path: impl Into<String>,
        size_bytes: u64,
        modified: SystemTime,
        fingerprint: impl Into<String>,
    ) -> Self {
        let relative_path = relative_path.into();
        let path = Path::new(&relative_path);
        let name = path
            .file_name()
            .map(|n| CompactString::new(n.to_string_lossy()))
            .unwrap_or_else(|| CompactString::new(&relative_path));
        let extension = extension_of(path);

        Self {
            relative_path,
            name,
            size_bytes,
            modified_time: DateTime::<Utc>::from(modified),
            fingerprint: fingerprint.into(),
            extension,
            is_directory: false,
        }
    }
}

/// Lower-cased `.ext` suffix of a path, empty when there is none.
pub fn extension_of(path: &Path) -> CompactString {
    match path.extension() {
        Some(ext) if !ext.is_empty() => {
            let mut out = CompactString::new(".");
            out.push_str(&ext.to_string_lossy().to_lowercase());
            out
        }
        _ => CompactString::default(),
    }
}

/// The persisted result of a completed scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    /// When the index was written.
    pub indexed_at: DateTime<Utc>,

    /// Number of records.
    pub file_count: usize,

    /// Records ordered by path.
    pub files: Vec<FileRecord>,
}

impl Index {
    /// Wrap records into an index stamped with the current time.
    pub fn new(files: Vec<FileRecord>) -> Self {
        Self {
            indexed_at: Utc::now(),
            file_count: files.len(),
            files,
        }
    }

    /// Total size of all indexed files.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }

    /// Find a record by relative path.
    pub fn get(&self, relative_path: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.relative_path == relative_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_name_and_extension() {
        let record = FileRecord::new("docs/Report.PDF", 10, SystemTime::UNIX_EPOCH, "abc");
        assert_eq!(record.name, "Report.PDF");
        assert_eq!(record.extension, ".pdf");
        assert!(!record.is_directory);
    }

    #[test]
    fn test_extension_edge_cases() {
        assert_eq!(extension_of(Path::new("Makefile")), "");
        assert_eq!(extension_of(Path::new(".bashrc")), "");
        assert_eq!(extension_of(Path::new("a/b.tar.GZ")), ".gz");
    }

    #[test]
    fn test_record_wire_names() {
        let record = FileRecord::new("a.txt", 5, SystemTime::UNIX_EPOCH, "ff");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["path"], "a.txt");
        assert_eq!(json["size"], 5);
        assert_eq!(json["hash"], "ff");
        assert_eq!(json["extension"], ".txt");
        assert_eq!(json["is_directory"], false);
        assert!(json.get("modified").is_some());
    }

    #[test]
    fn test_index_counts() {
        let index = Index::new(vec![
            FileRecord::new("a.txt", 5, SystemTime::UNIX_EPOCH, "1"),
            FileRecord::new("b.txt", 7, SystemTime::UNIX_EPOCH, "2"),
        ]);
        assert_eq!(index.file_count, 2);
        assert_eq!(index.total_size(), 12);
        assert_eq!(index.get("b.txt").map(|r| r.size_bytes), Some(7));
        assert!(index.get("c.txt").is_none());
    }
}
