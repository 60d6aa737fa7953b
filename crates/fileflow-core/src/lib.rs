//! Core types and traits for fileflow.
//!
//! This crate provides the data model shared by the fileflow crates: file
//! records, the resumable scan checkpoint, the finalized index, progress
//! events, the error taxonomy, and the narrow collaborator contracts
//! ([`ConfigProvider`], [`ErrorSink`]) the engine depends on.

mod checkpoint;
mod config;
mod error;
mod progress;
mod record;
mod sink;

pub use checkpoint::{CheckpointStatus, ScanCheckpoint};
pub use config::{
    ConfigProvider, DEFAULT_BATCH_SIZE, DEFAULT_WORKER_COUNT, IndexConfig, IndexConfigBuilder,
};
pub use error::{ErrorKind, IndexError};
pub use progress::{CancelReason, IndexEvent, IndexProgress, IndexSummary, ScanPhase};
pub use record::{FileRecord, Index, extension_of};
pub use sink::{ErrorContext, ErrorEntry, ErrorSink, LogSink, RecordingSink};
