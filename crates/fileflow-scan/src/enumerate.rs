//! Deterministic enumeration of the regular files under a scan root.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use jwalk::{Parallelism, WalkDir};

use fileflow_core::{ErrorContext, ErrorSink, IndexError};
use fileflow_store::CONFIG_DIR_NAME;

/// A file selected for indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path.
    pub path: PathBuf,
    /// Path relative to the scan root, the key used in checkpoints and the index.
    pub relative: String,
}

/// Resolve `root` to an absolute directory path.
pub fn resolve_root(root: &Path) -> Result<PathBuf, IndexError> {
    let resolved = root.canonicalize().map_err(|_| IndexError::DirectoryNotFound {
        path: root.to_path_buf(),
    })?;
    if !resolved.is_dir() {
        return Err(IndexError::NotADirectory { path: resolved });
    }
    Ok(resolved)
}

/// Compile ignore patterns into a matcher.
pub fn build_ignore_set(patterns: &[String]) -> Result<GlobSet, IndexError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| IndexError::Other {
            message: format!("Invalid ignore pattern '{pattern}': {e}"),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| IndexError::Other {
        message: format!("Invalid ignore patterns: {e}"),
    })
}

/// List every readable regular file under `root`, sorted by path.
///
/// `root` must already be resolved. The walk uses up to `threads` threads
/// (0 walks serially). Configuration directories are never descended into.
/// Files the caller cannot open are skipped silently; directories that
/// cannot be read are reported to `sink` and skipped.
pub fn collect_files(
    root: &Path,
    ignore: &GlobSet,
    threads: usize,
    sink: &dyn ErrorSink,
) -> Vec<FileEntry> {
    let parallelism = match threads {
        0 | 1 => Parallelism::Serial,
        n => Parallelism::RayonNewPool(n),
    };

    let walker = WalkDir::new(root)
        .parallelism(parallelism)
        .skip_hidden(false)
        .follow_links(false)
        .process_read_dir(|_depth, _path, _state, children| {
            children.retain(|child| {
                child.as_ref().map_or(true, |entry| {
                    !(entry.file_type().is_dir() && entry.file_name() == CONFIG_DIR_NAME)
                })
            });
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                let context = ErrorContext::new("collect_files").with("path", path.display());
                let error = IndexError::file_access(path, io::Error::other(err.to_string()));
                sink.report(&error, &context);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        if !ignore.is_empty() && ignore.is_match(relative) {
            continue;
        }
        if File::open(&path).is_err() {
            tracing::debug!(path = %path.display(), "skipping unreadable file");
            continue;
        }

        let relative = relative.to_string_lossy().into_owned();
        files.push(FileEntry { path, relative });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}
