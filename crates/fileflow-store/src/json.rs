//! JSON document helpers shared by the stores.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use fileflow_core::IndexError;

/// Write `value` to `path` so readers only ever see the old or the new file.
///
/// The document goes to a temporary file in the same directory, is synced,
/// and is then renamed over the target.
pub(crate) fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), IndexError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| IndexError::persistence(dir, e))?;

    let temp = NamedTempFile::new_in(dir).map_err(|e| IndexError::persistence(dir, e))?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)
            .map_err(|e| IndexError::malformed(path, &e))?;
        writer
            .flush()
            .map_err(|e| IndexError::persistence(path, e))?;
    }
    temp.as_file()
        .sync_all()
        .map_err(|e| IndexError::persistence(path, e))?;
    temp.persist(path)
        .map_err(|e| IndexError::persistence(path, e.error))?;

    Ok(())
}

/// Read a JSON document. A missing file is `Ok(None)`.
pub(crate) fn read<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, IndexError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(IndexError::persistence(path, e)),
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| IndexError::malformed(path, &e))
}

/// Remove a file. A missing file is not an error.
pub(crate) fn remove(path: &Path) -> Result<(), IndexError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(IndexError::persistence(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/doc.json");
        let mut doc = BTreeMap::new();
        doc.insert("key".to_string(), 7u32);

        write_atomic(&path, &doc).unwrap();
        let loaded: Option<BTreeMap<String, u32>> = read(&path).unwrap();

        assert_eq!(loaded, Some(doc));
    }

    #[test]
    fn test_overwrite_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");

        write_atomic(&path, &vec![1, 2, 3]).unwrap();
        write_atomic(&path, &vec![4]).unwrap();

        let loaded: Option<Vec<u32>> = read(&path).unwrap();
        assert_eq!(loaded, Some(vec![4]));
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_and_malformed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");

        let missing: Option<Vec<u32>> = read(&path).unwrap();
        assert!(missing.is_none());

        fs::write(&path, "{ not json").unwrap();
        let err = read::<Vec<u32>>(&path).unwrap_err();
        assert!(matches!(err, IndexError::PersistenceFormat { .. }));

        remove(&path).unwrap();
        remove(&path).unwrap();
        assert!(!path.exists());
    }
}
