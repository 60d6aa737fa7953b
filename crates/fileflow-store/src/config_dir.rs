//! Per-project configuration directory discovery.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the hidden per-project directory holding settings and state.
pub const CONFIG_DIR_NAME: &str = ".fileflow";

/// Find the configuration directory for `working_dir`, creating it if needed.
///
/// Looks in `working_dir` first, then walks up its ancestors. When no
/// directory is found one is created in `working_dir`.
pub fn discover_config_dir(working_dir: &Path) -> io::Result<PathBuf> {
    let working_dir = working_dir.canonicalize()?;

    if let Some(existing) = find_config_dir(&working_dir) {
        return Ok(existing);
    }

    let created = working_dir.join(CONFIG_DIR_NAME);
    fs::create_dir_all(&created)?;
    tracing::info!(path = %created.display(), "created configuration directory");
    Ok(created)
}

/// Find an existing configuration directory in `start` or an ancestor.
pub fn find_config_dir(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .find(|candidate| candidate.is_dir())
}
