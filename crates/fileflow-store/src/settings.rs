//! Project settings stored as `config.json` in the configuration directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use fileflow_core::{ConfigProvider, DEFAULT_BATCH_SIZE, DEFAULT_WORKER_COUNT, IndexError};

use crate::json;

/// Settings file name inside the configuration directory.
pub const SETTINGS_FILENAME: &str = "config.json";

/// Persistent project settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Files per batch.
    #[serde(deserialize_with = "count_or_zero")]
    pub batch_size: usize,
    /// Worker thread count.
    #[serde(deserialize_with = "count_or_zero")]
    pub thread_count: usize,
    /// Glob patterns to leave out of scans.
    pub ignore_patterns: Vec<String>,
    /// Keys this version does not know about, kept as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            thread_count: DEFAULT_WORKER_COUNT,
            ignore_patterns: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }
}

impl Settings {
    /// Path of the settings file in `config_dir`.
    pub fn path(config_dir: &Path) -> PathBuf {
        config_dir.join(SETTINGS_FILENAME)
    }

    /// Load settings from `config_dir`.
    ///
    /// A missing file is created with defaults. A malformed file is left
    /// untouched and defaults are used.
    pub fn load(config_dir: &Path) -> Self {
        let path = Self::path(config_dir);
        match json::read::<Settings>(&path) {
            Ok(Some(settings)) => settings.sanitized(),
            Ok(None) => {
                let settings = Self::default();
                if let Err(e) = settings.save(config_dir) {
                    tracing::warn!("could not write default settings: {e}");
                }
                settings
            }
            Err(e) => {
                tracing::warn!("could not load settings, using defaults: {e}");
                Self::default()
            }
        }
    }

    /// Save settings to `config_dir`.
    pub fn save(&self, config_dir: &Path) -> Result<(), IndexError> {
        json::write_atomic(&Self::path(config_dir), self)
    }

    /// Clamp values the engine cannot run with.
    fn sanitized(mut self) -> Self {
        // Negative counts arrive here as 0.
        if self.batch_size == 0 {
            tracing::warn!("batch_size must be at least 1, using 1");
            self.batch_size = 1;
        }
        if self.thread_count == 0 {
            tracing::warn!("thread_count must be at least 1, using 1");
            self.thread_count = 1;
        }
        self
    }
}

/// Read a count that may be written as a negative number, mapping it to 0.
fn count_or_zero<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    if raw <= 0 {
        return Ok(0);
    }
    Ok(usize::try_from(raw).unwrap_or(usize::MAX))
}

impl ConfigProvider for Settings {
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn worker_count(&self) -> usize {
        self.thread_count
    }

    fn ignore_patterns(&self) -> &[String] {
        &self.ignore_patterns
    }
}
