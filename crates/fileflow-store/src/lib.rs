//! Persistence for fileflow.
//!
//! Everything lives in one hidden per-project configuration directory:
//!
//! - `config.json`: [`Settings`]
//! - `checkpoint.json`: the single resumable scan, see [`CheckpointStore`]
//! - `index.json`: the last completed scan, see [`IndexStore`]
//!
//! Writes go through a temporary file and a rename so a reader never sees
//! a half-written document. Read and write failures are reported to an
//! [`ErrorSink`](fileflow_core::ErrorSink) and the store then behaves as if
//! it were empty.

mod checkpoint;
mod config_dir;
mod index;
mod json;
mod settings;

pub use checkpoint::{CHECKPOINT_FILENAME, CheckpointStore};
pub use config_dir::{CONFIG_DIR_NAME, discover_config_dir, find_config_dir};
pub use index::{INDEX_FILENAME, IndexStore};
pub use settings::{SETTINGS_FILENAME, Settings};
