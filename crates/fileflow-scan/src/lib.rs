//! Resumable parallel indexing engine for fileflow.
//!
//! # Overview
//!
//! `fileflow-scan` enumerates a directory tree, fingerprints every file on a
//! bounded worker pool, and persists a checkpoint after each batch so an
//! interrupted scan picks up where it left off. Key pieces:
//!
//! - **Fingerprinting** via blake3 with a bounded read per file
//! - **Parallel batches** on a rayon pool with submission-ordered results
//! - **Checkpoints** written before each progress event is yielded
//! - **Cooperative control** through [`ScanControl`] (cancel, pause, deadline)
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fileflow_scan::{IndexConfig, IndexEvent, IndexingEngine, LogSink, ScanControl};
//!
//! let config = IndexConfig::default();
//! let engine = IndexingEngine::new(&config, ".fileflow", Arc::new(LogSink)).unwrap();
//! let run = engine.resume_indexing("/path/to/scan", ScanControl::new()).unwrap();
//!
//! for event in run {
//!     match event {
//!         IndexEvent::BatchCompleted(p) => println!("{:.1}%", p.percent()),
//!         IndexEvent::ScanCompleted(summary) => println!("{}", summary.summary()),
//!         IndexEvent::ScanCancelled { reason, .. } => println!("stopped: {reason}"),
//!     }
//! }
//! ```
//!
//! # Background Execution
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use fileflow_scan::{IndexConfig, IndexingEngine, LogSink, ScanControl};
//! # async fn demo() {
//! # let engine = IndexingEngine::new(&IndexConfig::default(), ".fileflow", Arc::new(LogSink)).unwrap();
//! let run = engine.resume_indexing("/path/to/scan", ScanControl::new()).unwrap();
//! let mut events = fileflow_scan::spawn_indexing(run);
//! while let Some(event) = events.recv().await {
//!     println!("{:.1}%", event.progress().percent());
//! }
//! # }
//! ```

mod control;
mod driver;
mod engine;
mod enumerate;
mod fingerprint;
mod pool;

pub use control::ScanControl;
pub use driver::{EVENT_CHANNEL_SIZE, spawn_indexing};
pub use engine::{IndexRun, IndexingEngine};
pub use enumerate::{FileEntry, build_ignore_set, collect_files, resolve_root};
pub use fingerprint::{DEFAULT_CHUNK_SIZE, Fingerprint, FingerprintKind, Fingerprinter};
pub use pool::{PoolProgress, PoolProgressHandle, WorkerPool};

// Re-export core types for convenience
pub use fileflow_core::{
    CancelReason, ConfigProvider, ErrorSink, FileRecord, Index, IndexConfig, IndexError,
    IndexEvent, IndexProgress, IndexSummary, LogSink, RecordingSink, ScanCheckpoint, ScanPhase,
};
